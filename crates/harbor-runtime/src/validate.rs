//! Structural manifest validation.

use thiserror::Error;

use crate::manifest::AppManifest;

/// Why a manifest was rejected. The `Display` text is the stable reason
/// returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidManifest {
    /// A required field is empty or whitespace.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// The runtime name is not recognized.
    #[error("unknown runtime '{0}'")]
    UnknownRuntime(String),

    /// A requested capability is empty or contains whitespace.
    #[error("requested capability #{index} is malformed: '{value}'")]
    MalformedCapability {
        /// Position in the requested list.
        index: usize,
        /// The offending value.
        value: String,
    },

    /// The entry climbs out of the application directory.
    #[error("entry '{0}' must not contain '..'")]
    EntryTraversal(String),

    /// The entry is an absolute path.
    #[error("entry '{0}' must be a relative path")]
    AbsoluteEntry(String),
}

/// Check that a manifest is structurally sound.
///
/// Pure: looks only at the manifest, never at the filesystem.
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate_manifest(manifest: &AppManifest) -> Result<(), InvalidManifest> {
    for (field, value) in [
        ("appId", &manifest.app_id),
        ("name", &manifest.name),
        ("version", &manifest.version),
        ("entry", &manifest.entry),
    ] {
        if value.trim().is_empty() {
            return Err(InvalidManifest::EmptyField(field));
        }
    }

    if !manifest.runtime.is_known() {
        return Err(InvalidManifest::UnknownRuntime(
            manifest.runtime.as_str().to_string(),
        ));
    }

    for (index, value) in manifest.requested_capabilities.iter().enumerate() {
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(InvalidManifest::MalformedCapability {
                index,
                value: value.clone(),
            });
        }
    }

    validate_entry(&manifest.entry)
}

fn validate_entry(entry: &str) -> Result<(), InvalidManifest> {
    if entry.split(['/', '\\']).any(|component| component == "..") {
        return Err(InvalidManifest::EntryTraversal(entry.to_string()));
    }

    if entry.starts_with(['/', '\\']) || has_drive_prefix(entry) {
        return Err(InvalidManifest::AbsoluteEntry(entry.to_string()));
    }

    Ok(())
}

// `C:` style prefixes.
fn has_drive_prefix(entry: &str) -> bool {
    let mut chars = entry.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::RuntimeKind;

    fn manifest() -> AppManifest {
        AppManifest::new("com.example.notes", "bin/notes").with_capabilities(["fs.read"])
    }

    #[test]
    fn well_formed_manifest_passes() {
        assert_eq!(validate_manifest(&manifest()), Ok(()));
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut m = manifest();
        m.name = "   ".into();
        assert_eq!(
            validate_manifest(&m),
            Err(InvalidManifest::EmptyField("name"))
        );

        let mut m = manifest();
        m.app_id = String::new();
        assert_eq!(
            validate_manifest(&m).unwrap_err().to_string(),
            "appId must not be empty"
        );
    }

    #[test]
    fn unknown_runtime_is_rejected_but_wasm_is_recognized() {
        let m = manifest().with_runtime(RuntimeKind::Unknown("jvm".into()));
        assert_eq!(
            validate_manifest(&m),
            Err(InvalidManifest::UnknownRuntime("jvm".into()))
        );

        let m = manifest().with_runtime(RuntimeKind::Wasm);
        assert!(validate_manifest(&m).is_ok());
    }

    #[test]
    fn malformed_capabilities_are_rejected() {
        for bad in ["", "fs read", "fs.read\n"] {
            let m = manifest().with_capabilities(["ui.notify", bad]);
            assert!(
                matches!(
                    validate_manifest(&m),
                    Err(InvalidManifest::MalformedCapability { index: 1, .. })
                ),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn unknown_capability_names_are_not_a_validation_error() {
        let m = manifest().with_capabilities(["camera.capture"]);
        assert!(validate_manifest(&m).is_ok());
    }

    #[test]
    fn traversal_is_rejected_with_either_separator() {
        for entry in ["../escape", "bin/../../etc/passwd", "bin\\..\\x", ".."] {
            let mut m = manifest();
            m.entry = entry.into();
            assert_eq!(
                validate_manifest(&m),
                Err(InvalidManifest::EntryTraversal(entry.into())),
                "{entry}"
            );
        }
    }

    #[test]
    fn dotted_names_are_not_traversal() {
        let mut m = manifest();
        m.entry = "bin/..notes".into();
        assert!(validate_manifest(&m).is_ok());
    }

    #[test]
    fn absolute_entries_are_rejected() {
        for entry in ["/usr/bin/env", "\\server\\share", "C:\\apps\\x.exe"] {
            let mut m = manifest();
            m.entry = entry.into();
            assert_eq!(
                validate_manifest(&m),
                Err(InvalidManifest::AbsoluteEntry(entry.into())),
                "{entry}"
            );
        }
    }
}
