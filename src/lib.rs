pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod server;
pub mod utils;

use std::sync::Arc;

use anyhow::Result;

use config::ServerConfig;
use hooks::HookRegistry;
use loader::{load_hook_files, FileLoader};
use server::HookServer;

/// Load hook files matched by `patterns` and bind the server.
///
/// The registry is complete before the listener accepts anything; startup
/// errors (load, config, bind) are returned here.
pub fn prepare(patterns: &[String], config: ServerConfig) -> Result<HookServer> {
    let mut registry = HookRegistry::new();
    load_hook_files(patterns, &FileLoader, &mut registry)?;
    let server = HookServer::bind(config, Arc::new(registry))?;
    Ok(server)
}

/// Load hook files, bind, then serve until the server is shut down.
///
/// `on_ready` runs once the listener is bound and before the first accept.
/// It is where the caller takes a [`ShutdownHandle`](server::ShutdownHandle)
/// (for a Ctrl-C handler, say) and learns the bound address.
pub fn run<F>(patterns: &[String], config: ServerConfig, on_ready: F) -> Result<()>
where
    F: FnOnce(&HookServer) -> Result<()>,
{
    let server = prepare(patterns, config)?;
    on_ready(&server)?;
    server.serve()
}
