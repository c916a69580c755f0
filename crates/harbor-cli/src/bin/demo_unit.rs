//! A minimal process unit for trying `harbor run`.
//!
//! Waits for `INIT`, posts a notification when `ui.notify` was granted,
//! tries a file read to show a denial, then idles until the host
//! terminates it. Logs go to stderr; stdout carries the protocol.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]

use anyhow::Result;
use tracing::{info, warn};

use harbor_capabilities::Capability;
use harbor_sdk::{Bridge, BridgeError};
use harbor_telemetry::{LogConfig, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::new("info")
        .with_format(LogFormat::Compact)
        .without_ansi();
    harbor_telemetry::setup_logging(&log_config)?;

    let bridge = Bridge::stdio();
    bridge.ready().await?;
    let app_id = bridge.app_id().unwrap_or_default();
    info!(%app_id, "Unit ready");

    if bridge.has_capability(Capability::Notify) {
        let body = format!("{app_id} is up");
        bridge.notify("Hello from Harbor", Some(body.as_str())).await?;
    }

    match bridge.read_file("/etc/hostname").await {
        Ok(contents) => info!(%contents, "Read file"),
        Err(BridgeError::CapabilityDenied(capability)) => {
            info!(%capability, "Not granted, skipped read");
        },
        Err(e) => warn!(error = %e, "Read refused"),
    }

    bridge.closed().await;
    info!("Host closed the session");
    Ok(())
}
