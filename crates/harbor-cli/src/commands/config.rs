//! `harbor config`: inspect the resolved configuration.

use std::path::Path;

use anyhow::{Result, bail};

use harbor_config::{Config, ConfigSources};

use crate::theme::Theme;

/// Print the merged configuration as TOML or JSON.
pub(crate) fn show(config_path: Option<&Path>, format: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let rendered = match format {
        "toml" => config.to_toml()?,
        "json" => serde_json::to_string_pretty(&config)?,
        other => bail!("unknown format '{other}' (expected toml or json)"),
    };
    println!("{rendered}");
    Ok(())
}

/// Print where configuration layers are read from.
pub(crate) fn paths(config_path: Option<&Path>) {
    let sources = ConfigSources::discover(config_path);

    println!("{}", Theme::header("Configuration layers (lowest precedence first)"));
    println!("  1. {}", Theme::dimmed("embedded defaults"));

    let env: Vec<&str> = sources.env.keys().map(String::as_str).collect();
    if env.is_empty() {
        println!("  2. {}", Theme::dimmed("HARBOR_* environment (none set)"));
    } else {
        println!("  2. HARBOR_* environment: {}", env.join(", "));
    }

    match &sources.user_dir {
        Some(dir) => print_file(3, &dir.join("config.toml")),
        None => println!("  3. {}", Theme::dimmed("no user config directory")),
    }

    match &sources.explicit {
        Some(path) => print_file(4, path),
        None => println!("  4. {}", Theme::dimmed("no --config file")),
    }
}

fn print_file(layer: u8, path: &Path) {
    let marker = if path.exists() {
        Theme::success("found")
    } else {
        Theme::dimmed("not found")
    };
    println!("  {layer}. {} ({marker})", path.display());
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn show_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"[host]\nintent_timeout_ms = 2500\n").unwrap();

        show(Some(file.path()), "toml").unwrap();
        show(Some(file.path()), "json").unwrap();
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"").unwrap();

        let err = show(Some(file.path()), "yaml").unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(show(Some(Path::new("/nonexistent/harbor.toml")), "toml").is_err());
    }
}
