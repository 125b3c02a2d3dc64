//! Shared test helpers for hook server integration tests

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use anyhow::{Context, Result};
use hookline::config::ServerConfig;
use hookline::hooks::{HookRegistry, Transaction};
use hookline::server::{HookServer, ServerHandle};
use serde_json::{json, Value};
use std::sync::Arc;

/// Transaction name used by the fixture hooks
pub const MACHINES: &str = "Machines > Machines collection > Get Machines";

/// Server configuration bound to an ephemeral local port
pub fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        ..ServerConfig::default()
    }
}

/// Bind and spawn a server for `registry` on its own thread
pub fn start_server(registry: HookRegistry) -> ServerHandle {
    HookServer::bind(test_config(), Arc::new(registry))
        .expect("Failed to bind hook server")
        .spawn()
        .expect("Failed to spawn hook server")
}

/// Append `marker` to the transaction's `hooks_modifications` list
pub fn mark(transaction: &mut Transaction, marker: &str) -> Result<()> {
    let mods = transaction
        .entry("hooks_modifications")
        .or_insert_with(|| json!([]));
    mods.as_array_mut()
        .context("hooks_modifications is not an array")?
        .push(json!(marker));
    Ok(())
}

/// Registry mirroring a typical hook file: one hook per phase
pub fn fixture_registry() -> HookRegistry {
    let mut registry = HookRegistry::new();
    registry
        .before_all(|transactions| mark(&mut transactions[0], "before all mod"))
        .after_all(|transactions| mark(&mut transactions[0], "after all mod"))
        .before_each(|t| mark(t, "before each mod"))
        .before_each_validation(|t| mark(t, "before each validation mod"))
        .after_each(|t| mark(t, "after each mod"))
        .before_validation(MACHINES, |t| mark(t, "before validation mod"))
        .before(MACHINES, |t| mark(t, "before mod"))
        .after(MACHINES, |t| {
            mark(t, "after mod")?;
            t.insert("fail".to_string(), json!("Yay! Failed!"));
            Ok(())
        });
    registry
}

/// Test runner side of the connection
pub struct RunnerConnection {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl RunnerConnection {
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).context("Failed to connect to hook server")?;
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .context("Failed to set read timeout")?;
        let reader = BufReader::new(stream.try_clone().context("Failed to clone stream")?);
        Ok(Self { stream, reader })
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.stream
            .write_all(format!("{line}\n").as_bytes())
            .context("Failed to write line")
    }

    /// Read one reply line; `None` when the server closed the connection
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .context("Failed to read line")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end().to_string()))
    }

    /// Send one envelope and parse the reply
    pub fn request(&mut self, message: &Value) -> Result<Value> {
        self.write_line(&serde_json::to_string(message)?)?;
        let reply = self
            .read_line()?
            .context("Hook server closed the connection without replying")?;
        serde_json::from_str(&reply).context("Reply is not valid JSON")
    }

    pub fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
