use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable activity kinds emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Emitted when a member submits a new application.
    ApplicationSubmitted,
    /// Emitted when a reviewer decides an application.
    ApplicationDecided,
    /// Emitted when review priority changes.
    PriorityChanged,
    /// Emitted when an application is assigned or unassigned.
    ApplicationAssigned,
    /// Emitted when a reviewer appends a note.
    NoteAdded,
    /// Emitted once per bulk operation.
    BulkActionApplied,
    /// Emitted when reactive role-change handling adjusts priority.
    PrioritySynced,
}

impl ActivityKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationSubmitted => "application.submitted",
            Self::ApplicationDecided => "application.decided",
            Self::PriorityChanged => "application.priority_changed",
            Self::ApplicationAssigned => "application.assigned",
            Self::NoteAdded => "application.note_added",
            Self::BulkActionApplied => "application.bulk_action",
            Self::PrioritySynced => "application.priority_synced",
        }
    }
}

/// Immutable append-only audit record.
///
/// Writes are best-effort; a failed append must never abort the action that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    /// Activity kind.
    pub kind: ActivityKind,
    /// Acting principal id ("system" for internal callers).
    pub actor_id: String,
    /// Acting principal display name.
    pub actor_name: String,
    /// Optional target record id.
    pub target_id: Option<String>,
    /// Optional target display name.
    pub target_name: Option<String>,
    /// Free-text detail payload.
    pub details: String,
    /// Event timestamp.
    pub occurred_at: DateTime<Utc>,
}
