//! Newline-delimited JSON over the process's stdin and stdout.
//!
//! Stdout belongs to the protocol. Unit logs must go to stderr.

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use harbor_ipc::{ChannelEvent, Envelope, MAX_LINE_BYTES, decode_line};

const CAPACITY: usize = 64;

pub(crate) fn spawn() -> (mpsc::Sender<ChannelEvent>, mpsc::Receiver<Envelope>) {
    let (outbound, mut to_host) = mpsc::channel::<ChannelEvent>(CAPACITY);
    let (from_host, inbound) = mpsc::channel(CAPACITY);

    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = to_host.recv().await {
            let value = match event {
                ChannelEvent::Message(value) => value,
                ChannelEvent::Fault(reason) => {
                    warn!(%reason, "Faults cannot be sent over stdio");
                    continue;
                },
            };
            let mut line = value.to_string();
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                warn!(error = %e, "Failed to write to stdout");
                break;
            }
            if let Err(e) = stdout.flush().await {
                warn!(error = %e, "Failed to flush stdout");
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut lines = FramedRead::new(
            tokio::io::stdin(),
            LinesCodec::new_with_max_length(MAX_LINE_BYTES),
        );
        loop {
            let line = match lines.next().await {
                Some(Ok(line)) => line,
                None => {
                    debug!("Host closed stdin");
                    break;
                },
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!(limit = MAX_LINE_BYTES, "Host wrote an oversized line");
                    break;
                },
                Some(Err(LinesCodecError::Io(e))) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                },
            };
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(&line).and_then(Envelope::from_value) {
                Ok(envelope) => {
                    if from_host.send(envelope).await.is_err() {
                        break;
                    }
                },
                Err(e) => warn!(error = %e, "Unreadable line from host"),
            }
        }
    });

    (outbound, inbound)
}
