use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{BufRead, ErrorKind, Write};

use crate::config::MAX_MESSAGE_BYTES;
use crate::error::ProtocolError;
use crate::utils::value_kind;

/// One request or reply exchanged with the test runner.
///
/// Fields other than `event` and `data` (the runner's `uuid`, for example)
/// are carried through to the reply untouched. Decoding goes through a plain
/// JSON object so numbers keep their exact text and keys keep their order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Envelope {
    pub event: String,
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            extra: Map::new(),
        }
    }
}

impl TryFrom<Map<String, Value>> for Envelope {
    type Error = String;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let event = match fields.shift_remove("event") {
            Some(Value::String(event)) => event,
            Some(other) => {
                return Err(format!(
                    "`event` must be a string, got {}",
                    value_kind(&other)
                ))
            }
            None => return Err("missing field `event`".to_string()),
        };
        let data = fields
            .shift_remove("data")
            .ok_or_else(|| "missing field `data`".to_string())?;

        Ok(Self {
            event,
            data,
            extra: fields,
        })
    }
}

/// Read one delimited frame from a buffered stream.
///
/// Format: message bytes followed by `delimiter`; the delimiter is stripped.
///
/// # Returns
/// `Ok(Some(bytes))` for a complete frame, `Ok(None)` at end of stream. Bytes
/// left without a trailing delimiter when the stream ends are discarded.
pub fn read_frame<R: BufRead>(
    reader: &mut R,
    delimiter: &[u8],
) -> Result<Option<Vec<u8>>, ProtocolError> {
    debug_assert!(!delimiter.is_empty());
    let mut frame = Vec::new();

    loop {
        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        if available.is_empty() {
            if !frame.is_empty() {
                tracing::debug!(
                    bytes = frame.len(),
                    "Discarding unterminated message at end of stream"
                );
            }
            return Ok(None);
        }

        // The delimiter may straddle two reads, so search from just before
        // the bytes appended in this round.
        let search_from = frame.len().saturating_sub(delimiter.len() - 1);
        let read = available.len();
        frame.extend_from_slice(available);

        if let Some(offset) = find(&frame[search_from..], delimiter) {
            let end = search_from + offset;
            let unused = frame.len() - (end + delimiter.len());
            reader.consume(read - unused);
            frame.truncate(end);
            return Ok(Some(frame));
        }

        reader.consume(read);
        if frame.len() > MAX_MESSAGE_BYTES {
            return Err(ProtocolError::TooLarge(frame.len()));
        }
    }
}

/// Read and decode one envelope.
///
/// # Returns
/// `Ok(None)` when the peer closed the connection, an error if the frame is
/// not UTF-8 or not a valid envelope
pub fn read_envelope<R: BufRead>(
    reader: &mut R,
    delimiter: &[u8],
) -> Result<Option<Envelope>, ProtocolError> {
    let Some(frame) = read_frame(reader, delimiter)? else {
        return Ok(None);
    };
    let text = String::from_utf8(frame)?;
    let envelope = serde_json::from_str(&text)?;
    Ok(Some(envelope))
}

/// Write a delimited JSON message and flush it immediately.
pub fn write_message<T: Serialize, W: Write>(
    stream: &mut W,
    message: &T,
    delimiter: &[u8],
) -> Result<(), ProtocolError> {
    let mut json = serde_json::to_vec(message)?;
    json.extend_from_slice(delimiter);

    stream.write_all(&json)?;
    stream.flush()?;

    Ok(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
