use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apilink")]
#[command(about = "Named API connections with host failover", long_about = None)]
pub struct Cli {
    #[arg(short, long, help = "Path to the connection configuration file", default_value = "config/api.toml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the configured connections and their hosts
    Connections,
    /// Resolve a connection, trying its hosts until one answers, and report the latency
    Probe {
        #[arg(short, long, help = "Connection name. If not provided, the default connection is used")]
        connection: Option<String>,
    },
    /// Send a request through a connection and print the result
    Request {
        #[arg(help = "HTTP method (GET, POST, PUT, PATCH, DELETE, ...)")]
        method: String,
        #[arg(help = "Path relative to the connection's host")]
        path: String,
        #[arg(short, long, help = "Connection name. If not provided, the default connection is used")]
        connection: Option<String>,
        #[arg(
            short = 'H',
            long = "header",
            help = "Request header in NAME:VALUE format. Can be specified multiple times."
        )]
        headers: Vec<String>,
        #[arg(
            short,
            long = "query",
            help = "Query parameter in KEY=VALUE format. Can be specified multiple times."
        )]
        query: Vec<String>,
        #[arg(short, long, help = "JSON request body")]
        json: Option<String>,
        #[arg(long, help = "Decode the response body as JSON")]
        expects_json: bool,
        #[arg(long, help = "Record the request without sending it and print the request log")]
        pretend: bool,
    },
}

/// Splits `NAME<sep>VALUE`, trimming both sides. The name must not be empty.
pub fn parse_pair(input: &str, separator: char) -> anyhow::Result<(String, String)> {
    let (name, value) = input
        .split_once(separator)
        .ok_or_else(|| anyhow!("Expected NAME{separator}VALUE, got '{input}'"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Missing name in '{input}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
