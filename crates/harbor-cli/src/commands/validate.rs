//! `harbor validate`: structural manifest checks.

use std::path::Path;

use anyhow::{Result, bail};

use harbor_runtime::{AppManifest, validate_manifest};

use crate::theme::Theme;

/// Load and validate a manifest, printing a summary.
pub(crate) fn run_validate(path: &Path) -> Result<()> {
    let manifest = AppManifest::load(path)?;

    if let Err(e) = validate_manifest(&manifest) {
        println!("{}", Theme::error(&format!("{}: {e}", path.display())));
        bail!("invalid manifest: {e}");
    }

    println!("{}", Theme::success(&format!("{} is valid", path.display())));
    println!("  {}", Theme::kv("appId", &manifest.app_id));
    println!(
        "  {}",
        Theme::kv("name", &format!("{} {}", manifest.name, manifest.version))
    );
    println!("  {}", Theme::kv("runtime", manifest.runtime.as_str()));
    if !manifest.runtime.is_spawnable() {
        println!(
            "  {}",
            Theme::warning(&format!(
                "runtime '{}' is recognized but cannot be spawned",
                manifest.runtime
            ))
        );
    }
    if manifest.requested_capabilities.is_empty() {
        println!("  {}", Theme::dimmed("no capabilities requested"));
    } else {
        println!(
            "  {}",
            Theme::kv("requests", &manifest.requested_capabilities.join(", "))
        );
    }
    Ok(())
}
