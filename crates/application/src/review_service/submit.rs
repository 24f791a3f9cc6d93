use guildhall_core::{AppError, AppResult, MemberId};
use guildhall_domain::{
    ActivityKind, ActivityLogEntry, MembershipApplication, Priority, ReapplicationBlock,
    ReapplicationDecision, SubmitApplicationInput, evaluate_reapplication,
};
use serde_json::Value;
use tracing::debug;

use super::ReviewService;

/// Submission payload accepted from the UI/API layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitApplication {
    /// Application type key into the configured registry.
    pub type_key: String,
    /// Submitting member id.
    pub member_id: MemberId,
    /// Submitting member display name.
    pub member_name: String,
    /// Form answers as a JSON object.
    pub answers: Value,
}

impl ReviewService {
    /// Creates a new pending application for a member.
    ///
    /// Fails with `NotEligible` when the per-type reapplication policy blocks
    /// the member. Initial priority is derived from the submitter's current
    /// roles; a role lookup failure degrades to normal priority.
    pub async fn submit(&self, input: SubmitApplication) -> AppResult<MembershipApplication> {
        let policy = self.type_registry.policy_for(input.type_key.as_str())?;
        let now = self.clock.now();

        let mut applications = self.load_all().await?;
        let history: Vec<MembershipApplication> = applications
            .iter()
            .filter(|application| application.member_id() == &input.member_id)
            .cloned()
            .collect();

        if let ReapplicationDecision::Blocked(block) =
            evaluate_reapplication(policy, input.type_key.as_str(), &history, now)
        {
            return Err(AppError::NotEligible(describe_block(block)));
        }

        let priority = match self.role_resolver.roles_for(&input.member_id).await {
            Ok(roles) => self.default_priority(&roles),
            Err(error) => {
                debug!(
                    member = %input.member_id,
                    error = %error,
                    "role lookup failed at submission, defaulting to normal priority"
                );
                Priority::Normal
            }
        };

        let application = MembershipApplication::new(SubmitApplicationInput {
            type_key: input.type_key,
            member_id: input.member_id.clone(),
            member_name: input.member_name.clone(),
            answers: input.answers,
            priority,
            submitted_at: now,
        })?;

        applications.push(application.clone());
        self.persist(applications).await?;

        self.record_activity(ActivityLogEntry {
            kind: ActivityKind::ApplicationSubmitted,
            actor_id: input.member_id.to_string(),
            actor_name: input.member_name,
            target_id: Some(application.id().to_string()),
            target_name: Some(application.type_key().to_owned()),
            details: format!(
                "submitted {} application at priority {}",
                application.type_key(),
                application.priority().as_str()
            ),
            occurred_at: now,
        })
        .await;

        Ok(application)
    }

    /// Answers whether a member may submit a new application of one type.
    pub async fn can_reapply(
        &self,
        member: &MemberId,
        type_key: &str,
    ) -> AppResult<ReapplicationDecision> {
        let policy = self.type_registry.policy_for(type_key)?;
        let history: Vec<MembershipApplication> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|application| application.member_id() == member)
            .collect();

        Ok(evaluate_reapplication(
            policy,
            type_key,
            &history,
            self.clock.now(),
        ))
    }
}

fn describe_block(block: ReapplicationBlock) -> String {
    match block {
        ReapplicationBlock::Cooldown { days_remaining } => {
            format!("cooldown: {days_remaining} day(s) remaining")
        }
        other => other.reason().to_owned(),
    }
}
