//! Core HookServer struct and shutdown handles.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;

/// Interval between accept attempts while no runner is connected.
pub(super) const ACCEPT_POLL_INTERVAL_MS: u64 = 50;

/// Pause after an accept failure that is likely to repeat immediately
/// (descriptor or memory exhaustion).
pub(super) const ACCEPT_ERROR_BACKOFF_MS: u64 = 250;

/// Line-protocol server that feeds runner events to the dispatcher.
///
/// Serves one connection at a time. The listener is bound eagerly by
/// [`HookServer::bind`] so bind failures surface before serving starts.
pub struct HookServer {
    pub(super) config: ServerConfig,
    pub(super) local_addr: SocketAddr,
    pub(super) dispatcher: Dispatcher,
    pub(super) shutdown: ShutdownHandle,
}

impl HookServer {
    /// Address the listener is bound to (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// A handle that can stop this server from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }
}

/// The listening socket, shared so a shutdown can close it from any thread.
#[derive(Debug, Clone)]
pub(super) struct ListenerSlot(Arc<Mutex<Option<TcpListener>>>);

impl ListenerSlot {
    pub(super) fn new(listener: TcpListener) -> Self {
        Self(Arc::new(Mutex::new(Some(listener))))
    }

    /// Try one accept. `None` once the listener has been closed.
    pub(super) fn accept(&self) -> Option<io::Result<(TcpStream, SocketAddr)>> {
        self.lock().as_ref().map(TcpListener::accept)
    }

    pub(super) fn close(&self) {
        if self.lock().take().is_some() {
            tracing::debug!("Listening socket closed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<TcpListener>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable stop signal for a running [`HookServer`].
///
/// Shutting down closes the listening socket, so later runners are refused
/// rather than queued, and makes the accept loop return. A connection that
/// is already being served is not interrupted; the loop exits once the
/// runner closes it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    pub(super) shutdown_flag: Arc<AtomicBool>,
    pub(super) listener: ListenerSlot,
}

impl ShutdownHandle {
    pub(super) fn new(listener: TcpListener) -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            listener: ListenerSlot::new(listener),
        }
    }

    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        self.listener.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }
}

/// A server running on its own worker thread.
pub struct ServerHandle {
    pub(super) local_addr: SocketAddr,
    pub(super) shutdown: ShutdownHandle,
    pub(super) thread: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the serving loop to stop after the current connection ends.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Wait for the serving thread to return.
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| anyhow!("Hook server thread panicked"))?
    }
}
