use chrono::{DateTime, Utc};

use crate::application::{ApplicationStatus, MembershipApplication};
use crate::policy::ApplicationTypePolicy;

/// Reason a new submission is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapplicationBlock {
    /// An approved application of this type exists and the type is unique.
    AlreadyApproved,
    /// A pending application of this type exists and duplicates are not allowed.
    PendingExists,
    /// The per-type cooldown since the last terminal decision has not elapsed.
    Cooldown {
        /// Whole days until a new submission becomes possible, minimum 1.
        days_remaining: u32,
    },
}

impl ReapplicationBlock {
    /// Returns stable user-facing reason value.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AlreadyApproved => "already approved",
            Self::PendingExists => "pending exists",
            Self::Cooldown { .. } => "cooldown",
        }
    }
}

/// Outcome of a reapplication eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapplicationDecision {
    /// The member may submit a new application of this type.
    Eligible,
    /// Submission is blocked.
    Blocked(ReapplicationBlock),
}

impl ReapplicationDecision {
    /// Returns whether submission is allowed.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Decides whether a member may submit a new application of one type.
///
/// Pure over the provided history; rules apply in order and the first match
/// wins: unique-approved block, duplicate-pending block, cooldown, eligible.
/// Exactly `cooldown_days` elapsed whole days is eligible again.
#[must_use]
pub fn evaluate_reapplication(
    policy: ApplicationTypePolicy,
    type_key: &str,
    history: &[MembershipApplication],
    now: DateTime<Utc>,
) -> ReapplicationDecision {
    let of_type: Vec<&MembershipApplication> = history
        .iter()
        .filter(|application| application.type_key() == type_key)
        .collect();

    if policy.unique_approved
        && of_type
            .iter()
            .any(|application| application.status() == ApplicationStatus::Approved)
    {
        return ReapplicationDecision::Blocked(ReapplicationBlock::AlreadyApproved);
    }

    if !policy.allow_multiple_pending
        && of_type
            .iter()
            .any(|application| application.status() == ApplicationStatus::Pending)
    {
        return ReapplicationDecision::Blocked(ReapplicationBlock::PendingExists);
    }

    if policy.cooldown_days > 0 {
        let latest_terminal = of_type
            .iter()
            .filter(|application| application.status().is_terminal())
            .max_by_key(|application| application.last_edited_at());

        if let Some(application) = latest_terminal {
            let elapsed_days = (now - application.last_edited_at()).num_days().max(0);
            let elapsed_days = u32::try_from(elapsed_days).unwrap_or(u32::MAX);
            if elapsed_days < policy.cooldown_days {
                let days_remaining = (policy.cooldown_days - elapsed_days).max(1);
                return ReapplicationDecision::Blocked(ReapplicationBlock::Cooldown {
                    days_remaining,
                });
            }
        }
    }

    ReapplicationDecision::Eligible
}
