// Step definitions for building and sending requests, pretend mode and events.

use apilink::{ApiError, Connection, ConnectionConfig, Payload};
use cucumber::{given, then, when};
use reqwest::Method;
use serde_json::json;

use super::common::ApiWorld;

#[given(regex = r#"^a connection "([^"]*)" with the reachable host and a default header "([^"]*)" of "([^"]*)"$"#)]
async fn connection_with_default_header(world: &mut ApiWorld, name: String, header: String, value: String) {
    let host = world.server_uri();
    let config = ConnectionConfig::new("http", host).with_option("headers", json!({ header: value }));
    world.add_connection(&name, config);
}

#[given(regex = r#"^a connection "([^"]*)" with the unknown option "([^"]*)"$"#)]
async fn connection_with_unknown_option(world: &mut ApiWorld, name: String, option: String) {
    let config = ConnectionConfig::new("http", "http://127.0.0.1:1").with_option(option, json!(true));
    world.add_connection(&name, config);
}

#[when(regex = r#"^I pretend to send a GET to "([^"]*)" and a POST to "([^"]*)" on "([^"]*)"$"#)]
async fn pretend_requests(world: &mut ApiWorld, get_path: String, post_path: String, name: String) {
    let connection = world
        .manager()
        .connection(Some(&name))
        .expect("Connection should be configured");

    world.request_log = connection
        .pretend(async |c: &Connection| {
            c.request()?.path(get_path.as_str()).get(None).await?;
            c.request()?
                .path(post_path.as_str())
                .post(Some(json!({"name": "gear"})))
                .await?;
            Ok(())
        })
        .await
        .expect("Pretending should not fail");
}

#[when(regex = r#"^I fetch "([^"]*)" as JSON from "([^"]*)"$"#)]
async fn fetch_json(world: &mut ApiWorld, path: String, name: String) {
    let connection = world
        .manager()
        .connection(Some(&name))
        .expect("Connection should be configured");

    let mut builder = connection.request().expect("Configured options should be valid");
    builder.path(path).expects_json(true).expect("Accept header should merge");
    match builder.get(None).await {
        Ok(payload) => world.last_payload = Some(payload),
        Err(e) => world.last_error = Some(e),
    }
}

#[when(regex = r#"^I build a request on "([^"]*)"$"#)]
async fn build_request(world: &mut ApiWorld, name: String) {
    let connection = world
        .manager()
        .connection(Some(&name))
        .expect("Connection should be configured");
    world.last_error = connection.request().err();
}

#[then(regex = r#"^the request log should contain (\d+) entries$"#)]
async fn request_log_entries(world: &mut ApiWorld, count: usize) {
    assert_eq!(world.request_log.len(), count);
    assert_eq!(world.request_log[0].method, Method::GET);
    assert_eq!(world.request_log[1].method, Method::POST);
    assert!(world.request_log.iter().all(|r| r.elapsed_ms >= 0.0));
}

#[then(regex = r#"^request logging on "([^"]*)" should be disabled$"#)]
async fn logging_disabled(world: &mut ApiWorld, name: String) {
    let connection = world
        .manager()
        .connection(Some(&name))
        .expect("Connection should be configured");
    assert!(!connection.logging());
    assert!(!connection.pretending());
}

#[then(regex = r#"^the response should list (\d+) widgets$"#)]
async fn response_lists_widgets(world: &mut ApiWorld, count: usize) {
    assert!(world.last_error.is_none(), "Request failed: {:?}", world.last_error);
    let Some(Payload::Json(value)) = &world.last_payload else {
        panic!("Expected a JSON payload, got {:?}", world.last_payload);
    };
    assert_eq!(value.as_array().map(Vec::len), Some(count));
}

#[then(regex = r#"^an executed event should have been emitted for "([^"]*)"$"#)]
async fn event_emitted(world: &mut ApiWorld, name: String) {
    let events = world.drain_events();
    assert!(
        events
            .iter()
            .any(|e| e.connection_name.as_deref() == Some(name.as_str()) && e.url == "/widgets"),
        "No matching event in {events:?}"
    );
}

#[then("building should fail with an unsupported option error")]
async fn unsupported_option(world: &mut ApiWorld) {
    assert!(
        matches!(world.last_error, Some(ApiError::UnsupportedOption { .. })),
        "Unexpected result: {:?}",
        world.last_error
    );
}
