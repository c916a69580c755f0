//! The static capability policy table.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::trust::TrustLevel;

/// A request budget: at most `count` requests per `window_ms` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    /// Requests allowed per window.
    pub count: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateLimit {
    /// Create a rate limit.
    #[must_use]
    pub const fn new(count: u32, window_ms: u64) -> Self {
        Self { count, window_ms }
    }
}

/// Policy attached to one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityPolicy {
    /// Trust levels that may hold the capability.
    pub allowed_trust_levels: BTreeSet<TrustLevel>,
    /// Whether the spawning caller must be an administrator.
    pub requires_admin: bool,
    /// Optional request budget enforced by the host per app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
    /// Optional path prefixes the operation handler must confine itself to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_restrictions: Option<Vec<String>>,
    /// Optional domains the operation handler may contact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_allowlist: Option<Vec<String>>,
}

impl CapabilityPolicy {
    /// A policy allowing the given trust levels, no admin requirement and
    /// no restrictions.
    #[must_use]
    pub fn new(levels: impl IntoIterator<Item = TrustLevel>) -> Self {
        Self {
            allowed_trust_levels: levels.into_iter().collect(),
            requires_admin: false,
            rate_limit: None,
            path_restrictions: None,
            domain_allowlist: None,
        }
    }

    /// A policy open to every trust level.
    #[must_use]
    pub fn any_trust() -> Self {
        Self::new(TrustLevel::ALL)
    }

    /// Require the caller to be an administrator.
    #[must_use]
    pub fn admin_only(mut self) -> Self {
        self.requires_admin = true;
        self
    }

    /// Attach a rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, count: u32, window_ms: u64) -> Self {
        self.rate_limit = Some(RateLimit::new(count, window_ms));
        self
    }

    /// Attach path restrictions.
    #[must_use]
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_restrictions = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Attach a domain allowlist.
    #[must_use]
    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_allowlist = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the trust level may hold this capability.
    #[must_use]
    pub fn allows_trust(&self, level: TrustLevel) -> bool {
        self.allowed_trust_levels.contains(&level)
    }
}

/// Maps each capability to its policy.
///
/// Built once at process start and shared read-only afterwards: the table
/// is assembled by value through [`PolicyTable::with_policy`] and exposes
/// no mutation once constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    policies: HashMap<Capability, CapabilityPolicy>,
}

impl PolicyTable {
    /// A table with no policies. Every capability is denied against it.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The platform's built-in policy table.
    #[must_use]
    pub fn builtin() -> Self {
        use TrustLevel::{FirstParty, ThirdPartyVerified};

        Self::empty()
            .with_policy(
                Capability::FsRead,
                CapabilityPolicy::any_trust().with_paths(["/apps", "/shared"]),
            )
            .with_policy(
                Capability::FsWrite,
                CapabilityPolicy::new([FirstParty]).with_paths(["/apps", "/shared"]),
            )
            .with_policy(
                Capability::TempStorage,
                CapabilityPolicy::any_trust()
                    .with_rate_limit(100, 60_000)
                    .with_paths(["/tmp"]),
            )
            .with_policy(
                Capability::SpawnProcess,
                CapabilityPolicy::new([FirstParty])
                    .admin_only()
                    .with_rate_limit(10, 60_000),
            )
            .with_policy(
                Capability::NetworkFetch,
                CapabilityPolicy::new([FirstParty, ThirdPartyVerified])
                    .with_rate_limit(60, 60_000)
                    .with_domains(Vec::<String>::new()),
            )
            .with_policy(Capability::OpenWindow, CapabilityPolicy::any_trust())
            .with_policy(
                Capability::Notify,
                CapabilityPolicy::any_trust().with_rate_limit(10, 60_000),
            )
            .with_policy(
                Capability::ReadAudit,
                CapabilityPolicy::any_trust().admin_only(),
            )
    }

    /// Add (or replace) the policy for a capability.
    #[must_use]
    pub fn with_policy(mut self, capability: Capability, policy: CapabilityPolicy) -> Self {
        self.policies.insert(capability, policy);
        self
    }

    /// Look up the policy for a capability.
    #[must_use]
    pub fn get(&self, capability: Capability) -> Option<&CapabilityPolicy> {
        self.policies.get(&capability)
    }

    /// Number of registered policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the table has no policies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Iterate over all policies.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, &CapabilityPolicy)> {
        self.policies.iter().map(|(cap, policy)| (*cap, policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_the_whole_vocabulary() {
        let table = PolicyTable::builtin();
        assert_eq!(table.len(), Capability::ALL.len());
        for cap in Capability::ALL {
            assert!(table.get(cap).is_some(), "missing policy for {cap}");
        }
    }

    #[test]
    fn audit_read_requires_admin_for_every_trust_level() {
        let table = PolicyTable::builtin();
        let policy = table.get(Capability::ReadAudit).unwrap();
        assert!(policy.requires_admin);
        for level in TrustLevel::ALL {
            assert!(policy.allows_trust(level));
        }
    }

    #[test]
    fn fs_write_is_first_party_only() {
        let table = PolicyTable::builtin();
        let policy = table.get(Capability::FsWrite).unwrap();
        assert!(policy.allows_trust(TrustLevel::FirstParty));
        assert!(!policy.allows_trust(TrustLevel::ThirdPartyVerified));
        assert!(!policy.allows_trust(TrustLevel::ThirdPartyUnverified));
    }

    #[test]
    fn rate_limits_are_attached() {
        let table = PolicyTable::builtin();
        assert_eq!(
            table.get(Capability::Notify).unwrap().rate_limit,
            Some(RateLimit::new(10, 60_000))
        );
        assert_eq!(table.get(Capability::OpenWindow).unwrap().rate_limit, None);
    }

    #[test]
    fn policy_serializes_camel_case() {
        let policy = CapabilityPolicy::new([TrustLevel::FirstParty]).with_rate_limit(5, 1000);
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["requiresAdmin"], false);
        assert_eq!(json["rateLimit"]["windowMs"], 1000);
        assert_eq!(json["allowedTrustLevels"][0], "first-party");
    }
}
