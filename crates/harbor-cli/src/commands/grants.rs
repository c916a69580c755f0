//! `harbor grants`: preview capability granting for a manifest.

use std::path::Path;

use anyhow::Result;
use serde_json::json;

use harbor_capabilities::{GrantOutcome, grant};
use harbor_config::Config;
use harbor_runtime::{AppManifest, validate_manifest};

use crate::config_bridge;
use crate::theme::Theme;

/// Evaluate the manifest's requested capabilities under the configured
/// trust prefixes and the builtin policies.
pub(crate) fn run_grants(
    path: &Path,
    config_path: Option<&Path>,
    is_admin: bool,
    as_json: bool,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let manifest = AppManifest::load(path)?;
    validate_manifest(&manifest)?;

    let options = config_bridge::host_options(&config);
    let trust = options.trust.classify(&manifest.app_id);
    let outcome = grant(
        &options.policies,
        &manifest.requested_capabilities,
        trust,
        is_admin,
    );

    if as_json {
        let report = json!({
            "appId": manifest.app_id,
            "trustLevel": trust,
            "isAdmin": is_admin,
            "granted": outcome.granted_list(),
            "denied": outcome.denied,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", Theme::header(&format!("Capabilities for {}", manifest.app_id)));
    println!("  {}", Theme::kv("trust", trust.as_str()));
    println!("  {}", Theme::kv("admin", if is_admin { "yes" } else { "no" }));
    println!("{}", Theme::separator());
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &GrantOutcome) {
    if outcome.granted.is_empty() && outcome.denied.is_empty() {
        println!("{}", Theme::dimmed("nothing requested"));
        return;
    }
    for capability in &outcome.granted {
        println!("{}", Theme::success(capability.as_str()));
    }
    for (name, reason) in &outcome.denied {
        println!("{}", Theme::error(&format!("{name}: {reason}")));
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn previews_grants() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(
            br#"{"appId":"com.example.notes","name":"Notes","version":"1.0.0","entry":"notes/main","runtime":"process","requestedCapabilities":["ui.notify","fs.write","camera.capture"]}"#,
        )
        .unwrap();

        run_grants(file.path(), None, false, true).unwrap();
        run_grants(file.path(), None, true, false).unwrap();
    }

    #[test]
    fn invalid_manifest_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(
            br#"{"appId":"","name":"Notes","version":"1.0.0","entry":"notes/main","runtime":"process"}"#,
        )
        .unwrap();

        assert!(run_grants(file.path(), None, false, false).is_err());
    }
}
