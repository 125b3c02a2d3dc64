//! Hook ordering and payload round-trips over the wire

use anyhow::{bail, Result};
use serde_json::json;

use super::helpers::{fixture_registry, mark, start_server, RunnerConnection, MACHINES};
use hookline::hooks::HookRegistry;

#[test]
fn test_full_suite_on_one_connection() -> Result<()> {
    let server = start_server(fixture_registry());
    let mut conn = RunnerConnection::connect(server.local_addr())?;

    let reply = conn.request(&json!({"event": "beforeAll", "data": [{}]}))?;
    assert_eq!(
        reply,
        json!({"event": "beforeAll", "data": [{"hooks_modifications": ["before all mod"]}]})
    );

    let reply = conn.request(&json!({"event": "beforeEach", "data": {"name": MACHINES}}))?;
    assert_eq!(
        reply,
        json!({
            "event": "beforeEach",
            "data": {"name": MACHINES, "hooks_modifications": ["before each mod", "before mod"]}
        })
    );

    let reply = conn.request(&json!({"event": "beforeEachValidation", "data": {"name": MACHINES}}))?;
    assert_eq!(
        reply,
        json!({
            "event": "beforeEachValidation",
            "data": {
                "name": MACHINES,
                "hooks_modifications": ["before each validation mod", "before validation mod"]
            }
        })
    );

    let reply = conn.request(&json!({"event": "afterEach", "data": {"name": MACHINES}}))?;
    assert_eq!(
        reply,
        json!({
            "event": "afterEach",
            "data": {
                "name": MACHINES,
                "hooks_modifications": ["after mod", "after each mod"],
                "fail": "Yay! Failed!"
            }
        })
    );

    let reply = conn.request(&json!({"event": "afterAll", "data": [{}]}))?;
    assert_eq!(
        reply,
        json!({"event": "afterAll", "data": [{"hooks_modifications": ["after all mod"]}]})
    );

    conn.close();
    server.shutdown();
    server.join()
}

#[test]
fn test_after_hook_sets_fail() -> Result<()> {
    let mut registry = HookRegistry::new();
    registry.after("A", |t| {
        t.insert("fail".to_string(), json!("boom"));
        Ok(())
    });
    let server = start_server(registry);
    let mut conn = RunnerConnection::connect(server.local_addr())?;

    let reply = conn.request(&json!({"event": "afterEach", "data": {"name": "A"}}))?;

    assert_eq!(
        reply,
        json!({"event": "afterEach", "data": {"name": "A", "fail": "boom"}})
    );

    conn.close();
    server.shutdown();
    server.join()
}

#[test]
fn test_named_hooks_do_not_fire_for_other_names() -> Result<()> {
    let server = start_server(fixture_registry());
    let mut conn = RunnerConnection::connect(server.local_addr())?;

    let reply = conn.request(&json!({
        "event": "afterEach",
        "data": {"name": "Machines > Machines collection > Get Machine"}
    }))?;

    assert_eq!(reply["data"]["hooks_modifications"], json!(["after each mod"]));
    assert!(reply["data"].get("fail").is_none());

    conn.close();
    server.shutdown();
    server.join()
}

#[test]
fn test_untouched_fields_and_envelope_extras_round_trip() -> Result<()> {
    let server = start_server(HookRegistry::new());
    let mut conn = RunnerConnection::connect(server.local_addr())?;
    let message = json!({
        "uuid": "6b4c4e0a-1c7f-4ad4-9d36-2f3f3f5bb1c2",
        "event": "beforeEach",
        "data": {
            "name": MACHINES,
            "request": {"method": "GET", "uri": "/machines", "headers": {}, "body": ""},
            "expected": {"statusCode": "200"},
            "unicode": "žluťoučký kůň",
            "numbers": [1, 2.5, -3]
        }
    });

    let reply = conn.request(&message)?;

    assert_eq!(reply, message);

    conn.close();
    server.shutdown();
    server.join()
}

#[test]
fn test_unknown_event_is_echoed() -> Result<()> {
    let server = start_server(fixture_registry());
    let mut conn = RunnerConnection::connect(server.local_addr())?;
    let message = json!({"event": "beforeSomethingNew", "data": {"name": MACHINES}});

    let reply = conn.request(&message)?;

    assert_eq!(reply, message);

    conn.close();
    server.shutdown();
    server.join()
}

#[test]
fn test_failing_hook_still_gets_reply() -> Result<()> {
    let mut registry = HookRegistry::new();
    registry
        .after("A", |_| bail!("named hook failed"))
        .after_each(|_| panic!("generic hook panicked"))
        .after_each(|t| mark(t, "survivor"));
    let server = start_server(registry);
    let mut conn = RunnerConnection::connect(server.local_addr())?;

    let reply = conn.request(&json!({"event": "afterEach", "data": {"name": "A"}}))?;
    assert_eq!(reply["data"]["hooks_modifications"], json!(["survivor"]));

    // The connection stays usable after hook failures
    let reply = conn.request(&json!({"event": "afterEach", "data": {"name": "B"}}))?;
    assert_eq!(reply["data"]["hooks_modifications"], json!(["survivor"]));

    conn.close();
    server.shutdown();
    server.join()
}

#[test]
fn test_untouched_numbers_and_key_order_survive_exactly() -> Result<()> {
    let mut registry = HookRegistry::new();
    registry.before_each(|t| mark(t, "touched"));
    let server = start_server(registry);
    let mut conn = RunnerConnection::connect(server.local_addr())?;

    conn.write_line(
        r#"{"event":"beforeEach","data":{"name":"T","zeta":1,"id":123456789012345678901234567890,"ratio":2.50,"alpha":{"b":1,"a":2}}}"#,
    )?;
    let reply = conn.read_line()?;

    assert_eq!(
        reply.as_deref(),
        Some(
            r#"{"event":"beforeEach","data":{"name":"T","zeta":1,"id":123456789012345678901234567890,"ratio":2.50,"alpha":{"b":1,"a":2},"hooks_modifications":["touched"]}}"#
        )
    );

    conn.close();
    server.shutdown();
    server.join()
}
