use std::path::{Path, PathBuf};

use async_trait::async_trait;
use guildhall_application::{ActivityLog, ApplicationStore};
use guildhall_core::{AppError, AppResult};
use guildhall_domain::{ActivityLogEntry, MembershipApplication};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// JSON-file persistence adapter.
///
/// One file per collection under the data directory, whole-file overwrite
/// with last-writer-wins semantics. Writes land in a temp file first and are
/// renamed into place so a crash never leaves a half-written collection.
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at the given data directory.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{collection}.json"))
    }

    async fn read_collection<T: DeserializeOwned>(&self, collection: &str) -> AppResult<Vec<T>> {
        let path = self.collection_path(collection);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(AppError::Persistence(format!(
                    "failed to read collection '{collection}': {error}"
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|error| {
            AppError::Persistence(format!(
                "failed to decode collection '{collection}': {error}"
            ))
        })
    }

    async fn write_collection<T: Serialize>(&self, collection: &str, items: &[T]) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to create data directory '{}': {error}",
                    self.data_dir.display()
                ))
            })?;

        let payload = serde_json::to_vec_pretty(items).map_err(|error| {
            AppError::Persistence(format!(
                "failed to encode collection '{collection}': {error}"
            ))
        })?;

        let path = self.collection_path(collection);
        let staging_path = staging_path_for(&path);
        tokio::fs::write(&staging_path, payload)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to write collection '{collection}': {error}"
                ))
            })?;

        tokio::fs::rename(&staging_path, &path)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to replace collection '{collection}': {error}"
                ))
            })
    }
}

fn staging_path_for(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}

#[async_trait]
impl ApplicationStore for JsonFileStore {
    async fn list_applications(&self) -> AppResult<Vec<MembershipApplication>> {
        self.read_collection("applications").await
    }

    async fn save_applications(&self, applications: Vec<MembershipApplication>) -> AppResult<()> {
        self.write_collection("applications", &applications).await
    }
}

#[async_trait]
impl ActivityLog for JsonFileStore {
    async fn append(&self, entry: ActivityLogEntry) -> AppResult<()> {
        let mut entries: Vec<ActivityLogEntry> = self.read_collection("activity_log").await?;
        entries.push(entry);
        self.write_collection("activity_log", &entries).await
    }
}
