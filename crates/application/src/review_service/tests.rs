use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use guildhall_core::{AppError, AppResult, ApplicationId, MemberId};
use guildhall_domain::{
    ActivityKind, ActivityLogEntry, ApplicationStatus, ApplicationTypePolicy,
    ApplicationTypeRegistry, DecisionKind, MembershipApplication, Priority,
    ReapplicationDecision, RoleSet, StaffRolePolicy,
};

use crate::dispatch_service::NotificationDispatcher;
use crate::review_ports::{ActivityLog, ApplicationStore, ChatGateway, Clock};
use crate::role_service::RoleResolver;

use super::{BulkAction, ReviewActor, ReviewService, SubmitApplication};

struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    fn advance(&self, delta: Duration) {
        if let Ok(mut now) = self.now.try_lock() {
            *now = *now + delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.try_lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

#[derive(Default)]
struct FakeStore {
    applications: Mutex<Vec<MembershipApplication>>,
    fail_saves: AtomicBool,
}

#[async_trait]
impl ApplicationStore for FakeStore {
    async fn list_applications(&self) -> AppResult<Vec<MembershipApplication>> {
        Ok(self.applications.lock().await.clone())
    }

    async fn save_applications(&self, applications: Vec<MembershipApplication>) -> AppResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("store write failed".to_owned()));
        }

        *self.applications.lock().await = applications;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingActivityLog {
    entries: Mutex<Vec<ActivityLogEntry>>,
    failing: AtomicBool,
}

impl RecordingActivityLog {
    async fn count_of(&self, kind: ActivityKind) -> usize {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }
}

#[async_trait]
impl ActivityLog for RecordingActivityLog {
    async fn append(&self, entry: ActivityLogEntry) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("log write failed".to_owned()));
        }

        self.entries.lock().await.push(entry);
        Ok(())
    }
}

struct FakeGateway {
    roles: HashMap<String, RoleSet>,
}

#[async_trait]
impl ChatGateway for FakeGateway {
    fn is_connection_ready(&self) -> bool {
        true
    }

    async fn fetch_member_roles(&self, member: &MemberId) -> AppResult<RoleSet> {
        Ok(self.roles.get(member.as_str()).cloned().unwrap_or_default())
    }

    async fn send_direct_message(&self, _member: &MemberId, _text: &str) -> AppResult<()> {
        Ok(())
    }

    async fn send_channel_message(&self, _channel_id: &str, _text: &str) -> AppResult<()> {
        Ok(())
    }
}

struct Harness {
    service: ReviewService,
    store: Arc<FakeStore>,
    activity: Arc<RecordingActivityLog>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<ManualClock>,
}

fn member(value: &str) -> MemberId {
    MemberId::new(value).unwrap_or_else(|_| unreachable!("valid member id"))
}

fn staff_policy() -> StaffRolePolicy {
    StaffRolePolicy {
        admin_roles: ["Owner".to_owned()].into(),
        moderator_roles: ["Moderator".to_owned()].into(),
        reviewer_roles: ["Staff".to_owned()].into(),
        priority_roles: ["Supporter".to_owned()].into(),
    }
}

fn type_registry() -> ApplicationTypeRegistry {
    let mut registry = ApplicationTypeRegistry::new();
    registry.register(
        "whitelist",
        ApplicationTypePolicy {
            cooldown_days: 14,
            unique_approved: true,
            allow_multiple_pending: false,
        },
    );
    registry.register(
        "staff",
        ApplicationTypePolicy {
            cooldown_days: 0,
            unique_approved: false,
            allow_multiple_pending: true,
        },
    );
    registry
}

fn harness(roles: &[(&str, &[&str])]) -> Harness {
    let clock = ManualClock::starting_at(Utc::now());
    let gateway = Arc::new(FakeGateway {
        roles: roles
            .iter()
            .map(|(id, names)| ((*id).to_owned(), RoleSet::from_names(names.iter().copied())))
            .collect(),
    });
    let store = Arc::new(FakeStore::default());
    let activity = Arc::new(RecordingActivityLog::default());
    let resolver = Arc::new(RoleResolver::new(gateway.clone(), clock.clone()));
    let dispatcher = Arc::new(NotificationDispatcher::new(gateway, clock.clone()));

    let service = ReviewService::new(
        store.clone(),
        activity.clone(),
        resolver,
        dispatcher.clone(),
        staff_policy(),
        type_registry(),
        clock.clone(),
    );

    Harness {
        service,
        store,
        activity,
        dispatcher,
        clock,
    }
}

fn reviewer() -> ReviewActor {
    ReviewActor::staff(member("900"), "Sam")
}

fn whitelist_submission(member_id: &str) -> SubmitApplication {
    SubmitApplication {
        type_key: "whitelist".to_owned(),
        member_id: member(member_id),
        member_name: format!("member-{member_id}"),
        answers: json!({"age": 24}),
    }
}

async fn submitted(harness: &Harness, member_id: &str) -> MembershipApplication {
    harness
        .service
        .submit(whitelist_submission(member_id))
        .await
        .unwrap_or_else(|_| unreachable!("valid submission"))
}

#[tokio::test]
async fn submit_rejects_unconfigured_type() {
    let harness = harness(&[]);
    let result = harness
        .service
        .submit(SubmitApplication {
            type_key: "vendor".to_owned(),
            member_id: member("100"),
            member_name: "Avery".to_owned(),
            answers: json!({}),
        })
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn priority_role_holder_submits_at_high_priority() {
    let harness = harness(&[("100", &["Supporter"]), ("101", &[])]);

    let elevated = submitted(&harness, "100").await;
    assert_eq!(elevated.priority(), Priority::High);

    let plain = submitted(&harness, "101").await;
    assert_eq!(plain.priority(), Priority::Normal);
}

#[tokio::test]
async fn decide_requires_reviewer_capability() {
    let harness = harness(&[("100", &[]), ("999", &[])]);
    let application = submitted(&harness, "100").await;

    let outsider = ReviewActor::staff(member("999"), "Riley");
    let result = harness
        .service
        .decide(application.id(), DecisionKind::Approved, None, &outsider)
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn system_principal_cannot_decide() {
    let harness = harness(&[("100", &[])]);
    let application = submitted(&harness, "100").await;

    let result = harness
        .service
        .decide(
            application.id(),
            DecisionKind::Approved,
            None,
            &ReviewActor::System,
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn decide_records_decision_and_queues_notification() {
    let harness = harness(&[("100", &[]), ("900", &["Staff"])]);
    let application = submitted(&harness, "100").await;

    let outcome = harness
        .service
        .decide(
            application.id(),
            DecisionKind::Approved,
            Some("solid answers".to_owned()),
            &reviewer(),
        )
        .await;

    assert!(outcome.is_ok());
    if let Ok(outcome) = outcome {
        assert!(outcome.notification_queued);
        assert_eq!(outcome.application.status(), ApplicationStatus::Approved);
        assert_eq!(outcome.application.reviewed_by(), Some(&member("900")));
    }

    assert_eq!(harness.dispatcher.queue_depths().await, (1, 0));
    assert_eq!(
        harness.activity.count_of(ActivityKind::ApplicationDecided).await,
        1
    );
}

#[tokio::test]
async fn set_priority_is_idempotent_including_audit() {
    let harness = harness(&[("100", &[]), ("900", &["Staff"])]);
    let application = submitted(&harness, "100").await;
    let version_before = application.version();

    let first = harness
        .service
        .set_priority(application.id(), Priority::High, &reviewer())
        .await;
    assert_eq!(first.ok(), Some(true));

    let second = harness
        .service
        .set_priority(application.id(), Priority::High, &reviewer())
        .await;
    assert_eq!(second.ok(), Some(false));

    let stored = harness.service.find(application.id()).await;
    assert!(stored.is_ok());
    if let Ok(stored) = stored {
        assert_eq!(stored.version(), version_before + 1);
    }

    assert_eq!(
        harness.activity.count_of(ActivityKind::PriorityChanged).await,
        1
    );
}

#[tokio::test]
async fn system_principal_sets_priority_without_capability() {
    let harness = harness(&[("100", &[])]);
    let application = submitted(&harness, "100").await;

    let changed = harness
        .service
        .set_priority(application.id(), Priority::High, &ReviewActor::System)
        .await;
    assert_eq!(changed.ok(), Some(true));

    assert_eq!(
        harness.activity.count_of(ActivityKind::PrioritySynced).await,
        1
    );
}

#[tokio::test]
async fn activity_log_failure_never_fails_the_operation() {
    let harness = harness(&[("100", &[])]);
    harness.activity.failing.store(true, Ordering::SeqCst);

    let result = harness.service.submit(whitelist_submission("100")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn persistence_failure_aborts_the_decision() {
    let harness = harness(&[("100", &[]), ("900", &["Staff"])]);
    let application = submitted(&harness, "100").await;

    harness.store.fail_saves.store(true, Ordering::SeqCst);
    let result = harness
        .service
        .decide(application.id(), DecisionKind::Denied, None, &reviewer())
        .await;

    assert!(matches!(result, Err(AppError::Persistence(_))));
    // The stored record is still pending and no notification was queued.
    let stored = harness.service.find(application.id()).await;
    assert!(stored.is_ok());
    if let Ok(stored) = stored {
        assert_eq!(stored.status(), ApplicationStatus::Pending);
    }
    assert_eq!(harness.dispatcher.queue_depths().await, (0, 0));
}

#[tokio::test]
async fn notes_append_after_terminal_decision() {
    let harness = harness(&[("100", &[]), ("900", &["Staff"])]);
    let application = submitted(&harness, "100").await;

    let decided = harness
        .service
        .decide(application.id(), DecisionKind::Approved, None, &reviewer())
        .await;
    assert!(decided.is_ok());

    let noted = harness
        .service
        .add_note(application.id(), "welcome aboard", &reviewer())
        .await;
    assert!(noted.is_ok());
    if let Ok(noted) = noted {
        assert_eq!(noted.notes().len(), 1);
    }
}

#[tokio::test]
async fn bulk_archive_applies_to_terminal_applications_only() {
    let harness = harness(&[("100", &[]), ("101", &[]), ("900", &["Staff"])]);
    let decided_application = submitted(&harness, "100").await;
    let pending_application = submitted(&harness, "101").await;

    let outcome = harness
        .service
        .decide(
            decided_application.id(),
            DecisionKind::Approved,
            None,
            &reviewer(),
        )
        .await;
    assert!(outcome.is_ok());

    let bulk = harness
        .service
        .bulk_action(
            &[
                decided_application.id(),
                pending_application.id(),
                ApplicationId::new(),
            ],
            BulkAction::Archive,
            &reviewer(),
        )
        .await;

    assert!(bulk.is_ok());
    if let Ok(bulk) = bulk {
        assert_eq!(bulk.applied, 1);
        assert_eq!(bulk.skipped, 2);
    }
    assert_eq!(
        harness.activity.count_of(ActivityKind::BulkActionApplied).await,
        1
    );
}

#[tokio::test]
async fn bulk_priority_updates_every_pending_application() {
    let harness = harness(&[("100", &[]), ("101", &[]), ("900", &["Staff"])]);
    let first = submitted(&harness, "100").await;
    let second = submitted(&harness, "101").await;

    let bulk = harness
        .service
        .bulk_action(
            &[first.id(), second.id()],
            BulkAction::SetPriority(Priority::Urgent),
            &reviewer(),
        )
        .await;

    assert!(bulk.is_ok());
    if let Ok(bulk) = bulk {
        assert_eq!(bulk.applied, 2);
    }

    let active = harness.service.list_active().await;
    assert!(active.is_ok());
    if let Ok(active) = active {
        assert!(active
            .iter()
            .all(|application| application.priority() == Priority::Urgent));
    }
}

#[tokio::test]
async fn denied_application_enters_cooldown_then_becomes_eligible() {
    let harness = harness(&[("100", &[]), ("900", &["Staff"])]);
    let application = submitted(&harness, "100").await;

    let outcome = harness
        .service
        .decide(
            application.id(),
            DecisionKind::Denied,
            Some("try again later".to_owned()),
            &reviewer(),
        )
        .await;
    assert!(outcome.is_ok());

    let blocked = harness.service.can_reapply(&member("100"), "whitelist").await;
    assert_eq!(
        blocked.ok(),
        Some(ReapplicationDecision::Blocked(
            guildhall_domain::ReapplicationBlock::Cooldown { days_remaining: 14 }
        ))
    );

    let resubmit = harness.service.submit(whitelist_submission("100")).await;
    assert!(matches!(resubmit, Err(AppError::NotEligible(_))));

    harness.clock.advance(Duration::days(15));
    let eligible = harness.service.can_reapply(&member("100"), "whitelist").await;
    assert_eq!(eligible.ok(), Some(ReapplicationDecision::Eligible));

    let resubmitted = harness.service.submit(whitelist_submission("100")).await;
    assert!(resubmitted.is_ok());
}

#[tokio::test]
async fn archived_projection_lists_terminal_applications() {
    let harness = harness(&[("100", &[]), ("900", &["Staff"])]);
    let application = submitted(&harness, "100").await;

    let outcome = harness
        .service
        .decide(application.id(), DecisionKind::Approved, None, &reviewer())
        .await;
    assert!(outcome.is_ok());

    let active = harness.service.list_active().await;
    assert_eq!(active.map(|list| list.len()).ok(), Some(0));
    let archived = harness.service.list_archived().await;
    assert_eq!(archived.map(|list| list.len()).ok(), Some(1));
}
