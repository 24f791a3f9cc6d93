use std::collections::{BTreeMap, BTreeSet};

use guildhall_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Set of role names held by a member on the external platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// Creates an empty role set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a role set from role names.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Returns whether the set contains a role name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Returns whether the set intersects the given role names.
    #[must_use]
    pub fn contains_any(&self, names: &BTreeSet<String>) -> bool {
        names.iter().any(|name| self.0.contains(name))
    }

    /// Iterates role names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the number of roles in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Staff capability tier derived from platform role membership.
///
/// Tiers are strictly ordered; a higher tier implies every lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// No staff capability.
    None,
    /// May review and decide applications.
    Reviewer,
    /// Reviewer plus moderation duties.
    Moderator,
    /// Full administrative capability.
    Admin,
}

impl Capability {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Reviewer => "reviewer",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    /// Returns whether this tier satisfies a required tier.
    #[must_use]
    pub fn allows(&self, required: Capability) -> bool {
        *self >= required
    }
}

/// Configured staff role lists checked in descending precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRolePolicy {
    /// Role names granting admin capability.
    pub admin_roles: BTreeSet<String>,
    /// Role names granting moderator capability.
    pub moderator_roles: BTreeSet<String>,
    /// Role names granting reviewer capability.
    pub reviewer_roles: BTreeSet<String>,
    /// Role names that elevate application review priority while held.
    pub priority_roles: BTreeSet<String>,
}

impl StaffRolePolicy {
    /// Maps a role set to its capability tier. Pure, no I/O.
    #[must_use]
    pub fn capability_for(&self, roles: &RoleSet) -> Capability {
        if roles.contains_any(&self.admin_roles) {
            Capability::Admin
        } else if roles.contains_any(&self.moderator_roles) {
            Capability::Moderator
        } else if roles.contains_any(&self.reviewer_roles) {
            Capability::Reviewer
        } else {
            Capability::None
        }
    }

    /// Returns whether the role set carries elevated review priority.
    ///
    /// The same predicate is used at submission time and by reactive
    /// priority recomputation.
    #[must_use]
    pub fn grants_priority(&self, roles: &RoleSet) -> bool {
        roles.contains_any(&self.priority_roles)
    }
}

/// Reapplication policy for one application type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTypePolicy {
    /// Minimum days between a terminal application and a new submission.
    pub cooldown_days: u32,
    /// When true, an approved application permanently blocks new submissions.
    pub unique_approved: bool,
    /// When true, a member may hold several pending applications at once.
    pub allow_multiple_pending: bool,
}

/// Registry of per-type reapplication policies, loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTypeRegistry(BTreeMap<String, ApplicationTypePolicy>);

impl ApplicationTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a policy under a type key.
    pub fn register(&mut self, type_key: impl Into<String>, policy: ApplicationTypePolicy) {
        self.0.insert(type_key.into(), policy);
    }

    /// Returns the policy for a type key.
    ///
    /// An unknown key is a configuration error, never a silent default.
    pub fn policy_for(&self, type_key: &str) -> AppResult<ApplicationTypePolicy> {
        self.0.get(type_key).copied().ok_or_else(|| {
            AppError::Validation(format!(
                "application type '{type_key}' is not configured"
            ))
        })
    }

    /// Iterates configured type keys.
    pub fn type_keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplicationTypePolicy, ApplicationTypeRegistry, Capability, RoleSet, StaffRolePolicy};

    fn staff_policy() -> StaffRolePolicy {
        StaffRolePolicy {
            admin_roles: ["Owner".to_owned()].into(),
            moderator_roles: ["Moderator".to_owned()].into(),
            reviewer_roles: ["Staff".to_owned()].into(),
            priority_roles: ["Supporter".to_owned()].into(),
        }
    }

    #[test]
    fn capability_follows_descending_precedence() {
        let policy = staff_policy();

        let admin = RoleSet::from_names(["Owner", "Staff"]);
        assert_eq!(policy.capability_for(&admin), Capability::Admin);

        let moderator = RoleSet::from_names(["Moderator"]);
        assert_eq!(policy.capability_for(&moderator), Capability::Moderator);

        let reviewer = RoleSet::from_names(["Staff"]);
        assert_eq!(policy.capability_for(&reviewer), Capability::Reviewer);

        let plain = RoleSet::from_names(["Supporter"]);
        assert_eq!(policy.capability_for(&plain), Capability::None);
    }

    #[test]
    fn higher_tiers_imply_lower_tiers() {
        assert!(Capability::Admin.allows(Capability::Reviewer));
        assert!(Capability::Moderator.allows(Capability::Reviewer));
        assert!(!Capability::Reviewer.allows(Capability::Moderator));
        assert!(!Capability::None.allows(Capability::Reviewer));
    }

    #[test]
    fn priority_predicate_checks_configured_roles() {
        let policy = staff_policy();
        assert!(policy.grants_priority(&RoleSet::from_names(["Supporter"])));
        assert!(!policy.grants_priority(&RoleSet::from_names(["Staff"])));
    }

    #[test]
    fn unknown_type_key_is_a_configuration_error() {
        let mut registry = ApplicationTypeRegistry::new();
        registry.register(
            "whitelist",
            ApplicationTypePolicy {
                cooldown_days: 14,
                unique_approved: true,
                allow_multiple_pending: false,
            },
        );

        assert!(registry.policy_for("whitelist").is_ok());
        assert!(registry.policy_for("staff").is_err());
    }
}
