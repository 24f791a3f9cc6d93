use std::sync::Arc;

use guildhall_core::AppResult;
use guildhall_domain::{Priority, StaffRolePolicy};
use tracing::{info, warn};

use crate::dispatch_service::NotificationDispatcher;
use crate::review_ports::{RoleChangeEvent, RoleChangeFeed};
use crate::review_service::{ReviewActor, ReviewService};

/// What one role-change event resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorOutcome {
    /// Priority-role membership did not change; nothing was touched.
    Unchanged,
    /// Membership changed but the member has no pending application.
    NoPendingApplication,
    /// The pending application already sat at the target priority.
    PriorityAlreadyCorrect,
    /// Priority was updated and a broadcast was queued.
    PrioritySynced,
}

/// Long-lived listener that recomputes review priority when a member's role
/// set changes on the platform.
///
/// Every handler error is logged and swallowed; a missed update must never
/// crash the listener or block subsequent events.
pub struct RoleChangeReactor {
    feed: Arc<dyn RoleChangeFeed>,
    review_service: Arc<ReviewService>,
    dispatcher: Arc<NotificationDispatcher>,
    staff_policy: StaffRolePolicy,
    announce_channel_id: String,
}

impl RoleChangeReactor {
    /// Creates a reactor.
    #[must_use]
    pub fn new(
        feed: Arc<dyn RoleChangeFeed>,
        review_service: Arc<ReviewService>,
        dispatcher: Arc<NotificationDispatcher>,
        staff_policy: StaffRolePolicy,
        announce_channel_id: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            review_service,
            dispatcher,
            staff_policy,
            announce_channel_id: announce_channel_id.into(),
        }
    }

    /// Consumes the feed until it closes.
    pub async fn run(&self) {
        while let Some(event) = self.feed.next_change().await {
            match self.handle_role_change(&event).await {
                Ok(ReactorOutcome::PrioritySynced) => {
                    info!(member = %event.member_id, "review priority synced after role change");
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(
                        member = %event.member_id,
                        error = %error,
                        "role change handling failed, continuing"
                    );
                }
            }
        }
    }

    /// Handles one member-roles-changed event.
    pub async fn handle_role_change(&self, event: &RoleChangeEvent) -> AppResult<ReactorOutcome> {
        let had_priority = self.staff_policy.grants_priority(&event.old_roles);
        let has_priority = self.staff_policy.grants_priority(&event.new_roles);
        // Cheap comparison first; no lookup happens for unrelated role edits.
        if had_priority == has_priority {
            return Ok(ReactorOutcome::Unchanged);
        }

        let Some(application) = self
            .review_service
            .find_pending_for(&event.member_id)
            .await?
        else {
            return Ok(ReactorOutcome::NoPendingApplication);
        };

        let target = if has_priority {
            Priority::High
        } else {
            Priority::Normal
        };
        if application.priority() == target {
            return Ok(ReactorOutcome::PriorityAlreadyCorrect);
        }

        self.review_service
            .set_priority(application.id(), target, &ReviewActor::System)
            .await?;

        self.dispatcher
            .enqueue_broadcast(
                self.announce_channel_id.as_str(),
                format!(
                    "Review priority for {}'s {} application is now {} after a role change.",
                    event.member_name,
                    application.type_key(),
                    target.as_str()
                ),
            )
            .await?;

        Ok(ReactorOutcome::PrioritySynced)
    }
}
