use chrono::{DateTime, Utc};
use guildhall_core::{AppError, AppResult, ApplicationId, MemberId, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of one membership application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Awaiting staff review.
    Pending,
    /// Approved by a reviewer; terminal.
    Approved,
    /// Denied by a reviewer; terminal.
    Denied,
}

impl ApplicationStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            _ => Err(AppError::Validation(format!(
                "unknown application status '{value}'"
            ))),
        }
    }

    /// Returns whether the status admits no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Denied)
    }
}

/// Review priority, ordered by escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Deprioritized review.
    Low,
    /// Default review priority.
    Normal,
    /// Elevated review priority.
    High,
    /// Immediate review required.
    Urgent,
}

impl Priority {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(AppError::Validation(format!("unknown priority '{value}'"))),
        }
    }
}

/// Terminal review outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Application accepted.
    Approved,
    /// Application rejected.
    Denied,
}

impl DecisionKind {
    /// Returns the terminal status produced by this decision.
    #[must_use]
    pub fn status(&self) -> ApplicationStatus {
        match self {
            Self::Approved => ApplicationStatus::Approved,
            Self::Denied => ApplicationStatus::Denied,
        }
    }

    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }
}

/// One append-only reviewer note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationNote {
    author_id: MemberId,
    author_name: String,
    content: NonEmptyString,
    created_at: DateTime<Utc>,
}

impl ApplicationNote {
    /// Creates a validated note.
    pub fn new(
        author_id: MemberId,
        author_name: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            author_id,
            author_name: author_name.into(),
            content: NonEmptyString::new(content)?,
            created_at,
        })
    }

    /// Returns the note author's member id.
    #[must_use]
    pub fn author_id(&self) -> &MemberId {
        &self.author_id
    }

    /// Returns the note author's display name.
    #[must_use]
    pub fn author_name(&self) -> &str {
        self.author_name.as_str()
    }

    /// Returns the note content.
    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    /// Returns when the note was written.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Input payload used to construct a validated pending application.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitApplicationInput {
    /// Application type key into the type registry.
    pub type_key: String,
    /// Submitting member id.
    pub member_id: MemberId,
    /// Submitting member display name.
    pub member_name: String,
    /// Form answers captured at submission.
    pub answers: Value,
    /// Initial priority derived from the submitter's roles.
    pub priority: Priority,
    /// Submission timestamp.
    pub submitted_at: DateTime<Utc>,
}

/// One submitted membership request under staff review.
///
/// Status transitions are one-way terminal: pending may become approved or
/// denied and nothing else. Once terminal, the only legal mutation is a note
/// append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipApplication {
    id: ApplicationId,
    type_key: NonEmptyString,
    member_id: MemberId,
    member_name: String,
    answers: Value,
    status: ApplicationStatus,
    status_reason: Option<String>,
    priority: Priority,
    assigned_to: Option<MemberId>,
    notes: Vec<ApplicationNote>,
    reviewed_by: Option<MemberId>,
    reviewed_at: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
    last_edited_at: DateTime<Utc>,
}

impl MembershipApplication {
    /// Creates a new pending application.
    pub fn new(input: SubmitApplicationInput) -> AppResult<Self> {
        let SubmitApplicationInput {
            type_key,
            member_id,
            member_name,
            answers,
            priority,
            submitted_at,
        } = input;

        if !answers.is_object() {
            return Err(AppError::Validation(
                "application answers must be a JSON object".to_owned(),
            ));
        }

        if member_name.trim().is_empty() {
            return Err(AppError::Validation(
                "member_name must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            id: ApplicationId::new(),
            type_key: NonEmptyString::new(type_key)?,
            member_id,
            member_name,
            answers,
            status: ApplicationStatus::Pending,
            status_reason: None,
            priority,
            assigned_to: None,
            notes: Vec::new(),
            reviewed_by: None,
            reviewed_at: None,
            version: 1,
            created_at: submitted_at,
            last_edited_at: submitted_at,
        })
    }

    /// Returns the application identifier.
    #[must_use]
    pub fn id(&self) -> ApplicationId {
        self.id
    }

    /// Returns the application type key.
    #[must_use]
    pub fn type_key(&self) -> &str {
        self.type_key.as_str()
    }

    /// Returns the submitting member id.
    #[must_use]
    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    /// Returns the submitting member display name.
    #[must_use]
    pub fn member_name(&self) -> &str {
        self.member_name.as_str()
    }

    /// Returns the captured form answers.
    #[must_use]
    pub fn answers(&self) -> &Value {
        &self.answers
    }

    /// Returns current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    /// Returns the free-text status reason when one was recorded.
    #[must_use]
    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    /// Returns current review priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the assigned reviewer, if any.
    #[must_use]
    pub fn assigned_to(&self) -> Option<&MemberId> {
        self.assigned_to.as_ref()
    }

    /// Returns the append-only note list.
    #[must_use]
    pub fn notes(&self) -> &[ApplicationNote] {
        &self.notes
    }

    /// Returns the deciding reviewer once terminal.
    #[must_use]
    pub fn reviewed_by(&self) -> Option<&MemberId> {
        self.reviewed_by.as_ref()
    }

    /// Returns the decision timestamp once terminal.
    #[must_use]
    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }

    /// Returns the mutation version counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the submission timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last mutation timestamp.
    #[must_use]
    pub fn last_edited_at(&self) -> DateTime<Utc> {
        self.last_edited_at
    }

    /// Returns whether the application belongs to the archived projection.
    ///
    /// Archiving is a read-side view of terminal applications, not a state.
    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a terminal decision. Legal only from pending.
    pub fn decide(
        &mut self,
        kind: DecisionKind,
        reason: Option<String>,
        reviewer: MemberId,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "application '{}' is already {}",
                self.id,
                self.status.as_str()
            )));
        }

        self.status = kind.status();
        self.status_reason = reason.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Changes review priority. Legal only while pending.
    ///
    /// Returns false without mutating anything when the priority is already
    /// the requested value, so repeated calls are idempotent.
    pub fn set_priority(&mut self, priority: Priority, now: DateTime<Utc>) -> AppResult<bool> {
        if self.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "priority of application '{}' is frozen after decision",
                self.id
            )));
        }

        if self.priority == priority {
            return Ok(false);
        }

        self.priority = priority;
        self.touch(now);
        Ok(true)
    }

    /// Assigns or unassigns a reviewer. Legal only while non-terminal.
    pub fn assign(&mut self, assignee: Option<MemberId>, now: DateTime<Utc>) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "application '{}' can no longer be assigned",
                self.id
            )));
        }

        self.assigned_to = assignee;
        self.touch(now);
        Ok(())
    }

    /// Appends one note. Legal in any state.
    pub fn add_note(&mut self, note: ApplicationNote, now: DateTime<Utc>) {
        self.notes.push(note);
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version = self.version.saturating_add(1);
        self.last_edited_at = now;
    }
}
