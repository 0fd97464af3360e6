use std::io::Write;

use anyhow::Context;
use apilink::{
    ApiManager, Payload,
    cli::{Cli, Commands, parse_pair},
    config::load_configuration,
    connection::{Connection, RequestRecord},
    log::init_logging,
};
use clap::Parser;
use log::info;
use reqwest::Method;
use serde_json::{Map, Value, json};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging()?;

    let config = load_configuration(&cli.config)?;
    let manager = ApiManager::new(config);

    match cli.command {
        Commands::Connections => {
            let config = manager.config();
            for (name, connection) in &config.connections {
                let marker = if *name == config.default { "*" } else { " " };
                let driver = connection.driver.as_deref().unwrap_or(manager.default_driver());
                println!("{marker} {name} [{driver}] {}", connection.hosts().join(", "));
            }
            Ok(())
        },
        Commands::Probe { connection } => {
            let connection = manager.connection(connection.as_deref())?;
            let client = connection.client().await?;
            let latency = client.latency().await.unwrap_or_default();
            info!(host:% = client.base_url(), latency_ms = latency.as_millis() as u64; "Probe complete");
            println!("Connected to {} in {:?}", client.base_url(), latency);
            Ok(())
        },
        Commands::Request {
            method,
            path,
            connection,
            headers,
            query,
            json,
            expects_json,
            pretend,
        } => {
            let connection = manager.connection(connection.as_deref())?;
            let method: Method = method
                .to_uppercase()
                .parse()
                .with_context(|| format!("Invalid HTTP method '{method}'"))?;

            let mut builder = connection.request()?;
            builder.path(path).method(method);
            for header in &headers {
                let (name, value) = parse_pair(header, ':')?;
                builder.add_header(&name, value)?;
            }
            if !query.is_empty() {
                let mut params = Map::new();
                for pair in &query {
                    let (key, value) = parse_pair(pair, '=')?;
                    params.insert(key, Value::String(value));
                }
                builder.query(Value::Object(params));
            }
            if let Some(body) = json {
                builder.json(serde_json::from_str(&body).context("Request body is not valid JSON")?);
            }
            if expects_json {
                builder.expects_json(true)?;
            }

            if pretend {
                let log = connection
                    .pretend(async |_: &Connection| {
                        builder.run().await?;
                        Ok(())
                    })
                    .await?;
                let records: Vec<Value> = log.iter().map(record_to_json).collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }

            match builder.run().await? {
                Payload::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Payload::Text(text) => println!("{text}"),
                Payload::Bytes(bytes) => std::io::stdout().write_all(&bytes)?,
            }
            Ok(())
        },
    }
}

fn record_to_json(record: &RequestRecord) -> Value {
    json!({
        "url": record.url,
        "method": record.method.as_str(),
        "options": record.options.to_json(),
        "time": record.elapsed_ms,
    })
}
