//! Capability granting.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::Capability;
use crate::policy::PolicyTable;
use crate::trust::TrustLevel;

/// Why a requested capability was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "trustLevel", rename_all = "snake_case")]
pub enum DenialReason {
    /// The name is not part of the capability vocabulary.
    UnknownCapability,
    /// The capability exists but no policy is registered for it.
    NoPolicy,
    /// The policy requires an administrator.
    RequiresAdmin,
    /// The policy does not allow the app's trust level.
    TrustLevel(TrustLevel),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCapability => f.write_str("unknown capability"),
            Self::NoPolicy => f.write_str("no policy registered"),
            Self::RequiresAdmin => f.write_str("requires admin privilege"),
            Self::TrustLevel(level) => write!(f, "not allowed for trust level {level}"),
        }
    }
}

/// Partition of requested capabilities into granted and denied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOutcome {
    /// Capabilities the instance may use.
    pub granted: BTreeSet<Capability>,
    /// Requested names that were refused, keyed by the requested name.
    pub denied: BTreeMap<String, DenialReason>,
}

impl GrantOutcome {
    /// Whether the capability was granted.
    #[must_use]
    pub fn is_granted(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    /// Granted capabilities as a sorted list.
    #[must_use]
    pub fn granted_list(&self) -> Vec<Capability> {
        self.granted.iter().copied().collect()
    }
}

/// Decide which requested capabilities an instance receives.
///
/// Each requested name is evaluated independently against `table`:
/// unknown names and capabilities without a policy are denied (fail
/// closed); an admin-only policy denies non-admin callers; a policy that
/// does not list `trust` denies. Everything else is granted.
///
/// The result depends only on the inputs. Evaluation order and duplicate
/// names do not change it.
pub fn grant<S: AsRef<str>>(
    table: &PolicyTable,
    requested: &[S],
    trust: TrustLevel,
    is_admin: bool,
) -> GrantOutcome {
    let mut outcome = GrantOutcome::default();

    for name in requested {
        let name = name.as_ref();
        match evaluate(table, name, trust, is_admin) {
            Ok(capability) => {
                outcome.granted.insert(capability);
            },
            Err(reason) => {
                debug!(capability = name, %trust, is_admin, %reason, "Capability denied");
                outcome.denied.insert(name.to_string(), reason);
            },
        }
    }

    outcome
}

fn evaluate(
    table: &PolicyTable,
    name: &str,
    trust: TrustLevel,
    is_admin: bool,
) -> Result<Capability, DenialReason> {
    let Ok(capability) = name.parse::<Capability>() else {
        warn!(capability = name, "Requested capability is not in the vocabulary");
        return Err(DenialReason::UnknownCapability);
    };

    let Some(policy) = table.get(capability) else {
        warn!(%capability, "No policy registered for capability");
        return Err(DenialReason::NoPolicy);
    };

    if policy.requires_admin && !is_admin {
        return Err(DenialReason::RequiresAdmin);
    }

    if !policy.allows_trust(trust) {
        return Err(DenialReason::TrustLevel(trust));
    }

    Ok(capability)
}
