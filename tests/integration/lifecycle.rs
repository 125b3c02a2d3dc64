//! Connection handling and shutdown behaviour

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use hookline::error::HooklineError;
use hookline::hooks::HookRegistry;
use hookline::server::HookServer;
use serde_json::json;

use super::helpers::{fixture_registry, start_server, test_config, RunnerConnection, MACHINES};

#[test]
fn test_shutdown_after_peer_closes_is_bounded() -> Result<()> {
    let server = start_server(fixture_registry());
    let mut conn = RunnerConnection::connect(server.local_addr())?;
    conn.request(&json!({"event": "beforeAll", "data": [{}]}))?;
    conn.close();

    let started = Instant::now();
    server.shutdown();
    server.join()?;

    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[test]
fn test_shutdown_waits_for_active_connection() -> Result<()> {
    let server = start_server(fixture_registry());
    let shutdown = server.shutdown_handle();
    let mut conn = RunnerConnection::connect(server.local_addr())?;
    conn.request(&json!({"event": "beforeEach", "data": {"name": MACHINES}}))?;

    shutdown.shutdown();
    thread::sleep(Duration::from_millis(200));

    // Still served: shutdown does not interrupt the current connection
    let reply = conn.request(&json!({"event": "afterEach", "data": {"name": MACHINES}}))?;
    assert_eq!(reply["data"]["fail"], "Yay! Failed!");

    conn.close();
    server.join()
}

#[test]
fn test_malformed_line_closes_connection_only() -> Result<()> {
    let server = start_server(fixture_registry());

    let mut conn = RunnerConnection::connect(server.local_addr())?;
    conn.write_line("{\"event\": \"beforeEach\", \"data\": ")?;
    assert_eq!(conn.read_line()?, None);

    let mut conn = RunnerConnection::connect(server.local_addr())?;
    let reply = conn.request(&json!({"event": "beforeEach", "data": {"name": "T"}}))?;
    assert_eq!(reply["data"]["hooks_modifications"], json!(["before each mod"]));

    conn.close();
    server.shutdown();
    server.join()
}

#[test]
fn test_wrong_payload_shape_closes_connection() -> Result<()> {
    let server = start_server(fixture_registry());

    let mut conn = RunnerConnection::connect(server.local_addr())?;
    conn.write_line(r#"{"event": "beforeAll", "data": {"name": "not a list"}}"#)?;
    assert_eq!(conn.read_line()?, None);

    conn.close();
    server.shutdown();
    server.join()
}

#[test]
fn test_connections_are_served_one_after_another() -> Result<()> {
    let server = start_server(fixture_registry());

    for name in ["first", "second", "third"] {
        let mut conn = RunnerConnection::connect(server.local_addr())?;
        let reply = conn.request(&json!({"event": "beforeEach", "data": {"name": name}}))?;
        assert_eq!(reply["data"]["name"], name);
        conn.close();
    }

    server.shutdown();
    server.join()
}

#[test]
fn test_bind_fails_when_port_taken() -> Result<()> {
    let first = HookServer::bind(test_config(), HookRegistry::new().into())?;
    let mut config = test_config();
    config.port = first.local_addr().port();

    let second = HookServer::bind(config, HookRegistry::new().into());

    assert!(matches!(second, Err(HooklineError::Bind { .. })));
    Ok(())
}
