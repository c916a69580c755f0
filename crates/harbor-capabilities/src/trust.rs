//! Trust classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier prefix reserved by the platform for first-party applications.
pub const DEFAULT_FIRST_PARTY_PREFIX: &str = "core.";

/// Coarse provenance classification that gates which capabilities an
/// application may ever hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustLevel {
    /// Shipped by the platform owner.
    FirstParty,
    /// Third-party and verified by the platform.
    ThirdPartyVerified,
    /// Third-party with no verification.
    ThirdPartyUnverified,
}

impl TrustLevel {
    /// Every trust level.
    pub const ALL: [Self; 3] = [
        Self::FirstParty,
        Self::ThirdPartyVerified,
        Self::ThirdPartyUnverified,
    ];

    /// Wire name of the trust level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstParty => "first-party",
            Self::ThirdPartyVerified => "third-party-verified",
            Self::ThirdPartyUnverified => "third-party-unverified",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives a [`TrustLevel`] from an application id.
///
/// First-party applications are recognized by a reserved id prefix. Every
/// other id is `third-party-unverified`; there is no verification mechanism
/// yet, so `third-party-verified` is never produced here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustClassifier {
    first_party_prefixes: Vec<String>,
}

impl TrustClassifier {
    /// Create a classifier from a set of reserved prefixes.
    ///
    /// Empty prefixes are discarded, since they would classify every id as
    /// first-party.
    #[must_use]
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            first_party_prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// The reserved prefixes in use.
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.first_party_prefixes
    }

    /// Classify an application id. Total and deterministic.
    #[must_use]
    pub fn classify(&self, app_id: &str) -> TrustLevel {
        let first_party = self
            .first_party_prefixes
            .iter()
            .any(|prefix| app_id.len() > prefix.len() && app_id.starts_with(prefix.as_str()));

        if first_party {
            TrustLevel::FirstParty
        } else {
            TrustLevel::ThirdPartyUnverified
        }
    }
}

impl Default for TrustClassifier {
    fn default() -> Self {
        Self::new([DEFAULT_FIRST_PARTY_PREFIX])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_prefix_is_first_party() {
        let c = TrustClassifier::default();
        assert_eq!(c.classify("core.files"), TrustLevel::FirstParty);
        assert_eq!(c.classify("core.settings.panel"), TrustLevel::FirstParty);
    }

    #[test]
    fn everything_else_is_unverified() {
        let c = TrustClassifier::default();
        assert_eq!(c.classify("com.example.notes"), TrustLevel::ThirdPartyUnverified);
        assert_eq!(c.classify("corefiles"), TrustLevel::ThirdPartyUnverified);
        assert_eq!(c.classify("xcore.files"), TrustLevel::ThirdPartyUnverified);
        assert_eq!(c.classify(""), TrustLevel::ThirdPartyUnverified);
    }

    #[test]
    fn bare_prefix_is_not_an_app() {
        let c = TrustClassifier::default();
        assert_eq!(c.classify("core."), TrustLevel::ThirdPartyUnverified);
    }

    #[test]
    fn empty_prefixes_are_ignored() {
        let c = TrustClassifier::new(["", "sys."]);
        assert_eq!(c.prefixes(), ["sys.".to_string()]);
        assert_eq!(c.classify("anything"), TrustLevel::ThirdPartyUnverified);
        assert_eq!(c.classify("sys.clock"), TrustLevel::FirstParty);
    }

    #[test]
    fn classification_is_deterministic() {
        let c = TrustClassifier::default();
        let first = c.classify("core.dock");
        for _ in 0..100 {
            assert_eq!(c.classify("core.dock"), first);
        }
    }
}
