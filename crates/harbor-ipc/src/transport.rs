//! Channel primitives between a unit and the host.
//!
//! Host to unit traffic is already-built [`Envelope`]s. Unit to host traffic
//! is raw JSON, because the host must validate it before trusting any of it,
//! plus out-of-band faults reported by whatever runs the unit.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::IpcResult;

/// Something that happened on a unit's outbound channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A message the unit sent.
    Message(Value),
    /// The unit failed outside the protocol, e.g. it exited or wrote
    /// unreadable output.
    Fault(String),
}

/// The unit's ends of a channel pair.
#[derive(Debug)]
pub struct UnitPort {
    /// Envelopes from the host.
    pub inbound: mpsc::Receiver<Envelope>,
    /// Messages and faults to the host.
    pub outbound: mpsc::Sender<ChannelEvent>,
}

/// Create a bounded channel pair.
///
/// Returns the host's sender, the host's event receiver and the unit's port.
#[must_use]
pub fn unit_channel(
    capacity: usize,
) -> (
    mpsc::Sender<Envelope>,
    mpsc::Receiver<ChannelEvent>,
    UnitPort,
) {
    let (to_unit, inbound) = mpsc::channel(capacity.max(1));
    let (outbound, from_unit) = mpsc::channel(capacity.max(1));
    (to_unit, from_unit, UnitPort { inbound, outbound })
}

/// Longest line either side of a stdio channel accepts, newline excluded.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Encode an envelope as one line of newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if the envelope cannot be serialized.
pub fn encode_line(envelope: &Envelope) -> IpcResult<String> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line of newline-delimited JSON. Surrounding whitespace is
/// ignored.
///
/// # Errors
///
/// Returns an error if the line is not valid JSON.
pub fn decode_line(line: &str) -> IpcResult<Value> {
    Ok(serde_json::from_str(line.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::MessageType;

    #[test]
    fn lines_are_newline_terminated_and_decode_back() {
        let envelope = Envelope::heartbeat("core.files");
        let line = encode_line(&envelope).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let decoded = Envelope::from_value(decode_line(&line).unwrap()).unwrap();
        assert_eq!(decoded.kind, MessageType::Heartbeat);
        assert_eq!(decoded.request_id, envelope.request_id);
    }

    #[test]
    fn garbage_lines_fail() {
        assert!(decode_line("not json").is_err());
    }

    #[tokio::test]
    async fn channel_pair_is_connected() {
        let (to_unit, mut from_unit, mut port) = unit_channel(4);

        to_unit.send(Envelope::terminate("core.files")).await.unwrap();
        assert_eq!(
            port.inbound.recv().await.unwrap().kind,
            MessageType::Terminate
        );

        port.outbound
            .send(ChannelEvent::Fault("exited".into()))
            .await
            .unwrap();
        assert_eq!(
            from_unit.recv().await.unwrap(),
            ChannelEvent::Fault("exited".into())
        );
    }
}
