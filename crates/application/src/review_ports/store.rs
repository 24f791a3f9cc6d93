use async_trait::async_trait;
use guildhall_core::AppResult;
use guildhall_domain::{ActivityLogEntry, MembershipApplication};

/// Persistence port for the application collection.
///
/// The store contract is whole-collection last-writer-wins overwrite; there
/// are no partial-write guarantees, so services load, mutate, and save the
/// full list.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Loads every persisted application.
    async fn list_applications(&self) -> AppResult<Vec<MembershipApplication>>;

    /// Overwrites the full application collection.
    async fn save_applications(&self, applications: Vec<MembershipApplication>) -> AppResult<()>;
}

/// Port for appending audit records.
///
/// Callers treat append failures as best-effort: log and continue.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Persists one activity entry.
    async fn append(&self, entry: ActivityLogEntry) -> AppResult<()>;
}
