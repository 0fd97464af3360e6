// Step definitions for connection resolution, host failover and the connection cache.

use apilink::{ApiError, ConnectionConfig, config::HostList, request::RequestOptions};
use cucumber::{given, then, when};

use super::common::{ApiWorld, DEAD_HOSTS};

#[given(regex = r#"^a connection "([^"]*)" with two dead hosts and the reachable host$"#)]
async fn connection_with_failover_hosts(world: &mut ApiWorld, name: String) {
    let mut hosts: Vec<String> = DEAD_HOSTS.iter().map(|h| h.to_string()).collect();
    hosts.push(world.server_uri());
    world.add_connection(&name, ConnectionConfig::new("http", HostList::Many(hosts)));
}

#[given(regex = r#"^a connection "([^"]*)" with two dead hosts$"#)]
async fn connection_with_dead_hosts(world: &mut ApiWorld, name: String) {
    world.add_connection(&name, ConnectionConfig::new("http", DEAD_HOSTS));
}

#[given(regex = r#"^a connection "([^"]*)" with the reachable host$"#)]
async fn connection_with_reachable_host(world: &mut ApiWorld, name: String) {
    let host = world.server_uri();
    world.add_connection(&name, ConnectionConfig::new("http", host));
}

#[when(regex = r#"^I resolve the connection "([^"]*)" (\d+) times$"#)]
async fn resolve_repeatedly(world: &mut ApiWorld, name: String, times: usize) {
    for _ in 0..times {
        let manager = world.manager();
        manager.purge(Some(&name));
        let connection = manager.connection(Some(&name)).expect("Connection should be configured");
        let client = connection.client().await.expect("A reachable host should be found");
        world.resolved_hosts.push(client.base_url().to_string());
    }
}

#[when(regex = r#"^I send a GET request to "([^"]*)" on "([^"]*)"$"#)]
async fn send_get(world: &mut ApiWorld, path: String, name: String) {
    let connection = world
        .manager()
        .connection(Some(&name))
        .expect("Connection should be configured");
    world.last_error = connection.get(&path, &RequestOptions::new()).await.err();
}

#[when(regex = r#"^I purge the connection "([^"]*)"$"#)]
async fn purge(world: &mut ApiWorld, name: String) {
    world.manager().purge(Some(&name));
}

#[then("every resolution should use the reachable host")]
async fn resolutions_use_reachable_host(world: &mut ApiWorld) {
    let expected = format!("{}/", world.server_uri());
    assert!(!world.resolved_hosts.is_empty(), "No resolutions recorded");
    for host in &world.resolved_hosts {
        assert_eq!(host, &expected);
    }
}

#[then("the request should fail with a connect error")]
async fn fails_with_connect_error(world: &mut ApiWorld) {
    let error = world.last_error.as_ref().expect("The request should have failed");
    let ApiError::Request(error) = error else {
        panic!("Expected a request error, got {error:?}");
    };
    let ApiError::Connect(cause) = error.cause() else {
        panic!("Expected a connect error cause, got {:?}", error.cause());
    };
    assert!(DEAD_HOSTS.contains(&cause.host()));
}

#[then(regex = r#"^the host should have received (\d+) requests$"#)]
async fn host_received(world: &mut ApiWorld, count: usize) {
    assert_eq!(world.received_requests().await, count);
}
