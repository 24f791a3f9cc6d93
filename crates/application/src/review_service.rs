use std::sync::Arc;

use guildhall_core::{AppError, AppResult, MemberId};
use guildhall_domain::{
    ActivityLogEntry, ApplicationTypeRegistry, Capability, MembershipApplication, Priority,
    RoleSet, StaffRolePolicy,
};
use tracing::warn;

use crate::dispatch_service::NotificationDispatcher;
use crate::review_ports::{ActivityLog, ApplicationStore, Clock};
use crate::role_service::RoleResolver;

mod moderate;
mod queries;
mod submit;

pub use moderate::{BulkAction, BulkOutcome, DecisionOutcome};
pub use submit::SubmitApplication;

/// Principal performing a review operation.
///
/// `System` is the trusted internal principal used only by reactive
/// priority recomputation; it is constructible solely inside this process and
/// bypasses the human capability check while every lifecycle invariant still
/// applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewActor {
    /// A human staff member; capability is resolved on every call.
    Staff {
        /// Acting member id.
        member_id: MemberId,
        /// Acting member display name.
        display_name: String,
    },
    /// Trusted in-process principal.
    System,
}

impl ReviewActor {
    /// Creates a staff actor.
    #[must_use]
    pub fn staff(member_id: MemberId, display_name: impl Into<String>) -> Self {
        Self::Staff {
            member_id,
            display_name: display_name.into(),
        }
    }

    fn audit_identity(&self) -> (String, String) {
        match self {
            Self::Staff {
                member_id,
                display_name,
            } => (member_id.to_string(), display_name.clone()),
            Self::System => ("system".to_owned(), "System".to_owned()),
        }
    }
}

/// Application lifecycle manager.
///
/// Owns every mutating entry point the UI/API layer may call; collaborators
/// never mutate application records directly.
pub struct ReviewService {
    store: Arc<dyn ApplicationStore>,
    activity_log: Arc<dyn ActivityLog>,
    role_resolver: Arc<RoleResolver>,
    dispatcher: Arc<NotificationDispatcher>,
    staff_policy: StaffRolePolicy,
    type_registry: ApplicationTypeRegistry,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    /// Creates a review service.
    #[must_use]
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        activity_log: Arc<dyn ActivityLog>,
        role_resolver: Arc<RoleResolver>,
        dispatcher: Arc<NotificationDispatcher>,
        staff_policy: StaffRolePolicy,
        type_registry: ApplicationTypeRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            activity_log,
            role_resolver,
            dispatcher,
            staff_policy,
            type_registry,
            clock,
        }
    }

    /// Resolves the actor's current capability tier.
    ///
    /// A resolver `Unavailable` degrades to no staff role rather than
    /// failing the request outright.
    pub async fn capability_of(&self, member: &MemberId) -> Capability {
        let roles = match self.role_resolver.roles_for(member).await {
            Ok(roles) => roles,
            Err(error) => {
                warn!(
                    member = %member,
                    error = %error,
                    "role resolution failed, assuming no staff capability"
                );
                RoleSet::new()
            }
        };

        self.staff_policy.capability_for(&roles)
    }

    /// Ensures a human staff actor with the required tier; returns identity.
    async fn require_staff(
        &self,
        actor: &ReviewActor,
        required: Capability,
    ) -> AppResult<(MemberId, String)> {
        match actor {
            ReviewActor::Staff {
                member_id,
                display_name,
            } => {
                let capability = self.capability_of(member_id).await;
                if !capability.allows(required) {
                    return Err(AppError::Forbidden(format!(
                        "member '{member_id}' holds capability '{}' but '{}' is required",
                        capability.as_str(),
                        required.as_str()
                    )));
                }

                Ok((member_id.clone(), display_name.clone()))
            }
            ReviewActor::System => Err(AppError::Forbidden(
                "the system principal cannot perform this operation".to_owned(),
            )),
        }
    }

    async fn load_all(&self) -> AppResult<Vec<MembershipApplication>> {
        self.store.list_applications().await
    }

    async fn persist(&self, applications: Vec<MembershipApplication>) -> AppResult<()> {
        self.store.save_applications(applications).await
    }

    /// Best-effort audit append; failures are logged and swallowed.
    async fn record_activity(&self, entry: ActivityLogEntry) {
        if let Err(error) = self.activity_log.append(entry).await {
            warn!(error = %error, "failed to append activity log entry");
        }
    }

    fn default_priority(&self, roles: &RoleSet) -> Priority {
        if self.staff_policy.grants_priority(roles) {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

#[cfg(test)]
mod tests;
