use async_trait::async_trait;
use guildhall_application::{ActivityLog, ApplicationStore};
use guildhall_core::AppResult;
use guildhall_domain::{ActivityLogEntry, MembershipApplication};
use tokio::sync::RwLock;

/// In-memory application store for tests and local runs.
#[derive(Default)]
pub struct InMemoryApplicationStore {
    applications: RwLock<Vec<MembershipApplication>>,
}

impl InMemoryApplicationStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn list_applications(&self) -> AppResult<Vec<MembershipApplication>> {
        Ok(self.applications.read().await.clone())
    }

    async fn save_applications(&self, applications: Vec<MembershipApplication>) -> AppResult<()> {
        *self.applications.write().await = applications;
        Ok(())
    }
}

/// In-memory activity log adapter.
#[derive(Default)]
pub struct InMemoryActivityLog {
    entries: RwLock<Vec<ActivityLogEntry>>,
}

impl InMemoryActivityLog {
    /// Creates an empty in-memory activity log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every appended entry.
    pub async fn entries(&self) -> Vec<ActivityLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn append(&self, entry: ActivityLogEntry) -> AppResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}
