//! Client connection handling.

use std::io::BufReader;
use std::net::TcpStream;

use super::protocol::{read_envelope, write_message};
use crate::dispatcher::Dispatcher;
use crate::error::ProtocolError;

/// Serve one runner connection until it closes.
///
/// Each request is fully dispatched and answered before the next is read.
///
/// # Returns
/// The number of messages answered, or the error that closed the connection
pub fn handle_connection(
    stream: TcpStream,
    dispatcher: &Dispatcher,
    delimiter: &[u8],
) -> Result<usize, ProtocolError> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut served = 0;

    while let Some(mut envelope) = read_envelope(&mut reader, delimiter)? {
        let report = dispatcher.dispatch(&mut envelope)?;
        if report.failed > 0 {
            tracing::warn!(
                event = %envelope.event,
                failed = report.failed,
                invoked = report.invoked,
                "Replying with partial hook modifications"
            );
        }

        write_message(&mut writer, &envelope, delimiter)?;
        served += 1;
    }

    Ok(served)
}
