// Step definitions that drive the apilink binary.

use std::process::Command;

use cucumber::{given, then, when};
use tempfile::TempDir;

use super::common::ApiWorld;

#[given(regex = r#"^a configuration file with the connection "([^"]*)"$"#)]
async fn configuration_file(world: &mut ApiWorld, name: String) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("api.toml");
    std::fs::write(
        &config_path,
        format!(
            "default = \"{name}\"\n\n[connections.{name}]\ndriver = \"http\"\nhost = [\"http://127.0.0.1:1\", \"http://127.0.0.1:2\"]\n"
        ),
    )
    .expect("Failed to write configuration");

    world.config_path = Some(config_path);
    world.temp_dir = Some(temp_dir);
}

#[when("I run the connections command")]
async fn run_connections(world: &mut ApiWorld) {
    let config_path = world.config_path.as_ref().expect("Configuration file not written");
    let temp_dir = world.temp_dir.as_ref().expect("Temp directory not set up");

    let output = Command::new(env!("CARGO_BIN_EXE_apilink"))
        .arg("--config")
        .arg(config_path)
        .arg("connections")
        .current_dir(temp_dir.path())
        .output()
        .expect("Failed to run apilink");

    world.last_command_output = Some(String::from_utf8_lossy(&output.stdout).to_string());
    world.last_command_exit_code = output.status.code();
}

#[then(regex = r#"^the output should list "([^"]*)"$"#)]
async fn output_lists(world: &mut ApiWorld, name: String) {
    assert_eq!(world.last_command_exit_code, Some(0));
    let output = world.last_command_output.as_ref().expect("No command output");
    assert!(
        output.contains(&format!("* {name} [http] http://127.0.0.1:1, http://127.0.0.1:2")),
        "Unexpected output: {output}"
    );
}
