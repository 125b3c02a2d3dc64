//! Hook server for line-delimited JSON over TCP.

mod connection;
mod core;
mod lifecycle;
mod protocol;


pub use self::core::{HookServer, ServerHandle, ShutdownHandle};
pub use protocol::{read_envelope, read_frame, write_message, Envelope};
