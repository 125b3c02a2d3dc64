//! HookServer lifecycle methods: bind, serve, spawn.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use super::connection::handle_connection;
use super::core::{
    HookServer, ServerHandle, ShutdownHandle, ACCEPT_ERROR_BACKOFF_MS, ACCEPT_POLL_INTERVAL_MS,
};
use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::HooklineError;
use crate::hooks::HookRegistry;

/// How the accept loop reacts to a failed `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AcceptFailure {
    /// The pending connection went away; try the next one.
    Retry,
    /// The process is short on resources; wait before trying again.
    Backoff,
    /// The listener itself is unusable.
    Fatal,
}

pub(super) fn classify_accept_error(error: &io::Error) -> AcceptFailure {
    match error.kind() {
        ErrorKind::Interrupted
        | ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionRefused
        | ErrorKind::TimedOut => AcceptFailure::Retry,
        ErrorKind::InvalidInput | ErrorKind::NotConnected | ErrorKind::Unsupported => {
            AcceptFailure::Fatal
        }
        _ => AcceptFailure::Backoff,
    }
}

impl HookServer {
    /// Bind the listener for `config` and take ownership of the registry.
    ///
    /// # Returns
    /// A server ready to [`serve`](Self::serve), or a bind/config error
    pub fn bind(config: ServerConfig, registry: Arc<HookRegistry>) -> Result<Self, HooklineError> {
        config.validate()?;

        let addr = config.address();
        let listener = TcpListener::bind(&addr).map_err(|source| HooklineError::Bind {
            addr: addr.clone(),
            source,
        })?;

        // Non-blocking so the accept loop can observe the shutdown flag
        listener
            .set_nonblocking(true)
            .map_err(|source| HooklineError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| HooklineError::Bind { addr, source })?;

        tracing::info!(
            %local_addr,
            hooks = registry.len(),
            "Hook server listening"
        );

        Ok(Self {
            config,
            local_addr,
            dispatcher: Dispatcher::new(registry),
            shutdown: ShutdownHandle::new(listener),
        })
    }

    /// Accept and serve connections, one at a time, until shutdown.
    ///
    /// Returns once the shutdown flag is set and no connection is active.
    /// Failures of a single connection are logged and never end the loop.
    pub fn serve(&self) -> Result<()> {
        let delimiter = self.config.delimiter.as_bytes();

        while !self.shutdown.is_shutdown() {
            let Some(accepted) = self.shutdown.listener.accept() else {
                break;
            };

            match accepted {
                Ok((stream, peer)) => self.serve_connection(stream, peer, delimiter),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    // No connection available, sleep briefly
                    thread::sleep(Duration::from_millis(ACCEPT_POLL_INTERVAL_MS));
                }
                Err(e) => match classify_accept_error(&e) {
                    AcceptFailure::Retry => {
                        tracing::debug!("Pending connection dropped before accept: {e}");
                    }
                    AcceptFailure::Backoff => {
                        tracing::warn!("Failed to accept connection, retrying: {e}");
                        thread::sleep(Duration::from_millis(ACCEPT_ERROR_BACKOFF_MS));
                    }
                    AcceptFailure::Fatal => {
                        self.shutdown.listener.close();
                        return Err(e).context("Failed to accept connection");
                    }
                },
            }
        }

        self.shutdown.listener.close();
        tracing::info!("Hook server stopped");
        Ok(())
    }

    fn serve_connection(&self, stream: TcpStream, peer: SocketAddr, delimiter: &[u8]) {
        tracing::info!(%peer, "Test runner connected");

        // Accepted sockets inherit non-blocking mode from the listener
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!(%peer, "Dropping connection, cannot switch to blocking mode: {e}");
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, "Failed to set TCP_NODELAY: {e}");
        }

        match handle_connection(stream, &self.dispatcher, delimiter) {
            Ok(served) => {
                tracing::info!(%peer, messages = served, "Test runner disconnected");
            }
            Err(e) => {
                tracing::warn!(%peer, "Closing connection: {e}");
            }
        }
    }

    /// Run [`serve`](Self::serve) on a dedicated worker thread.
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr;
        let shutdown = self.shutdown_handle();

        let thread = thread::Builder::new()
            .name("hookline-server".to_string())
            .spawn(move || self.serve())
            .context("Failed to spawn hook server thread")?;

        Ok(ServerHandle {
            local_addr,
            shutdown,
            thread,
        })
    }
}
