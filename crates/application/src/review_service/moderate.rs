use guildhall_core::{AppError, AppResult, ApplicationId, MemberId};
use guildhall_domain::{
    ActivityKind, ActivityLogEntry, ApplicationNote, Capability, DecisionKind,
    MembershipApplication, Priority,
};
use tracing::warn;

use super::{ReviewActor, ReviewService};

/// Result of a decision, including the non-fatal notification status.
///
/// Queue problems never roll back a recorded decision; the flag lets callers
/// warn that the applicant message could not be queued.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    /// The decided application.
    pub application: MembershipApplication,
    /// Whether the applicant notification was queued.
    pub notification_queued: bool,
}

/// Uniform operation applied by `bulk_action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkAction {
    /// Sets review priority on each application.
    SetPriority(Priority),
    /// Assigns or unassigns a reviewer on each application.
    Assign(Option<MemberId>),
    /// Audit-only no-op over already-terminal applications.
    Archive,
}

/// Per-id tally for one bulk operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Applications the action applied to.
    pub applied: usize,
    /// Applications skipped because the action was illegal or the id unknown.
    pub skipped: usize,
}

impl ReviewService {
    /// Applies a terminal decision to a pending application.
    ///
    /// Requires a staff actor with reviewer capability. The decision is
    /// persisted before the notification is queued; a queue failure is
    /// reported through the outcome, never as an error.
    pub async fn decide(
        &self,
        id: ApplicationId,
        kind: DecisionKind,
        reason: Option<String>,
        actor: &ReviewActor,
    ) -> AppResult<DecisionOutcome> {
        let (reviewer_id, reviewer_name) = self.require_staff(actor, Capability::Reviewer).await?;
        let now = self.clock.now();

        let mut applications = self.load_all().await?;
        let application = find_mut(&mut applications, id)?;
        application.decide(kind, reason.clone(), reviewer_id.clone(), now)?;
        let decided = application.clone();
        self.persist(applications).await?;

        let notification_queued = match self
            .dispatcher
            .enqueue_decision(
                decided.member_id().clone(),
                kind,
                decided.type_key(),
                reason,
            )
            .await
        {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    application = %decided.id(),
                    error = %error,
                    "decision recorded but applicant notification could not be queued"
                );
                false
            }
        };

        self.record_activity(ActivityLogEntry {
            kind: ActivityKind::ApplicationDecided,
            actor_id: reviewer_id.to_string(),
            actor_name: reviewer_name,
            target_id: Some(decided.id().to_string()),
            target_name: Some(decided.member_name().to_owned()),
            details: format!(
                "{} {} application",
                kind.as_str(),
                decided.type_key()
            ),
            occurred_at: now,
        })
        .await;

        Ok(DecisionOutcome {
            application: decided,
            notification_queued,
        })
    }

    /// Changes review priority on a pending application.
    ///
    /// Staff actors need reviewer capability; the system principal bypasses
    /// that check but is bound by the same pending-only rule. Returns false
    /// when the priority already matched; nothing is persisted or audited in
    /// that case.
    pub async fn set_priority(
        &self,
        id: ApplicationId,
        priority: Priority,
        actor: &ReviewActor,
    ) -> AppResult<bool> {
        let (actor_id, actor_name) = match actor {
            ReviewActor::System => actor.audit_identity(),
            ReviewActor::Staff { .. } => {
                let (member_id, display_name) =
                    self.require_staff(actor, Capability::Reviewer).await?;
                (member_id.to_string(), display_name)
            }
        };
        let now = self.clock.now();

        let mut applications = self.load_all().await?;
        let application = find_mut(&mut applications, id)?;
        if !application.set_priority(priority, now)? {
            return Ok(false);
        }
        let updated = application.clone();
        self.persist(applications).await?;

        let kind = match actor {
            ReviewActor::System => ActivityKind::PrioritySynced,
            ReviewActor::Staff { .. } => ActivityKind::PriorityChanged,
        };
        self.record_activity(ActivityLogEntry {
            kind,
            actor_id,
            actor_name,
            target_id: Some(updated.id().to_string()),
            target_name: Some(updated.member_name().to_owned()),
            details: format!("priority set to {}", priority.as_str()),
            occurred_at: now,
        })
        .await;

        Ok(true)
    }

    /// Assigns or unassigns a reviewer on a non-terminal application.
    pub async fn assign(
        &self,
        id: ApplicationId,
        assignee: Option<MemberId>,
        actor: &ReviewActor,
    ) -> AppResult<MembershipApplication> {
        let (actor_id, actor_name) = self.require_staff(actor, Capability::Reviewer).await?;
        let now = self.clock.now();

        let mut applications = self.load_all().await?;
        let application = find_mut(&mut applications, id)?;
        application.assign(assignee.clone(), now)?;
        let updated = application.clone();
        self.persist(applications).await?;

        self.record_activity(ActivityLogEntry {
            kind: ActivityKind::ApplicationAssigned,
            actor_id: actor_id.to_string(),
            actor_name,
            target_id: Some(updated.id().to_string()),
            target_name: Some(updated.member_name().to_owned()),
            details: match assignee {
                Some(assignee) => format!("assigned to {assignee}"),
                None => "unassigned".to_owned(),
            },
            occurred_at: now,
        })
        .await;

        Ok(updated)
    }

    /// Appends a reviewer note. Legal in any lifecycle state.
    pub async fn add_note(
        &self,
        id: ApplicationId,
        content: impl Into<String>,
        actor: &ReviewActor,
    ) -> AppResult<MembershipApplication> {
        let (author_id, author_name) = self.require_staff(actor, Capability::Reviewer).await?;
        let now = self.clock.now();
        let note = ApplicationNote::new(author_id.clone(), author_name.clone(), content, now)?;

        let mut applications = self.load_all().await?;
        let application = find_mut(&mut applications, id)?;
        application.add_note(note, now);
        let updated = application.clone();
        self.persist(applications).await?;

        self.record_activity(ActivityLogEntry {
            kind: ActivityKind::NoteAdded,
            actor_id: author_id.to_string(),
            actor_name: author_name,
            target_id: Some(updated.id().to_string()),
            target_name: Some(updated.member_name().to_owned()),
            details: "note added".to_owned(),
            occurred_at: now,
        })
        .await;

        Ok(updated)
    }

    /// Applies one action uniformly across several applications.
    ///
    /// Per-id failures are tallied, not propagated; the store is written once.
    pub async fn bulk_action(
        &self,
        ids: &[ApplicationId],
        action: BulkAction,
        actor: &ReviewActor,
    ) -> AppResult<BulkOutcome> {
        let (actor_id, actor_name) = self.require_staff(actor, Capability::Reviewer).await?;
        let now = self.clock.now();

        let mut applications = self.load_all().await?;
        let mut outcome = BulkOutcome::default();

        for id in ids {
            let Some(application) = applications
                .iter_mut()
                .find(|application| application.id() == *id)
            else {
                outcome.skipped += 1;
                continue;
            };

            let applied = match &action {
                BulkAction::SetPriority(priority) => {
                    application.set_priority(*priority, now).is_ok()
                }
                BulkAction::Assign(assignee) => application.assign(assignee.clone(), now).is_ok(),
                // Terminal applications are already out of the active view;
                // archiving only records the intent.
                BulkAction::Archive => application.status().is_terminal(),
            };

            if applied {
                outcome.applied += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        self.persist(applications).await?;

        self.record_activity(ActivityLogEntry {
            kind: ActivityKind::BulkActionApplied,
            actor_id: actor_id.to_string(),
            actor_name,
            target_id: None,
            target_name: None,
            details: format!(
                "bulk {} over {} application(s): {} applied, {} skipped",
                describe_action(&action),
                ids.len(),
                outcome.applied,
                outcome.skipped
            ),
            occurred_at: now,
        })
        .await;

        Ok(outcome)
    }
}

fn find_mut(
    applications: &mut [MembershipApplication],
    id: ApplicationId,
) -> AppResult<&mut MembershipApplication> {
    applications
        .iter_mut()
        .find(|application| application.id() == id)
        .ok_or_else(|| AppError::NotFound(format!("application '{id}' does not exist")))
}

fn describe_action(action: &BulkAction) -> String {
    match action {
        BulkAction::SetPriority(priority) => format!("priority={}", priority.as_str()),
        BulkAction::Assign(Some(assignee)) => format!("assign={assignee}"),
        BulkAction::Assign(None) => "unassign".to_owned(),
        BulkAction::Archive => "archive".to_owned(),
    }
}
