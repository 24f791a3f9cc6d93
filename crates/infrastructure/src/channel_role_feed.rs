use async_trait::async_trait;
use guildhall_application::{RoleChangeEvent, RoleChangeFeed};
use guildhall_core::{AppError, AppResult};
use tokio::sync::{Mutex, mpsc};

/// Creates a bounded in-process role-change feed.
///
/// The publisher side is handed to whatever ingests platform gateway events;
/// the feed side is consumed by the role-change reactor.
#[must_use]
pub fn role_change_channel(capacity: usize) -> (RoleChangePublisher, ChannelRoleChangeFeed) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        RoleChangePublisher { sender },
        ChannelRoleChangeFeed {
            receiver: Mutex::new(receiver),
        },
    )
}

/// Producing half of the role-change channel.
#[derive(Clone)]
pub struct RoleChangePublisher {
    sender: mpsc::Sender<RoleChangeEvent>,
}

impl RoleChangePublisher {
    /// Publishes one role-change event, waiting for channel capacity.
    pub async fn publish(&self, event: RoleChangeEvent) -> AppResult<()> {
        self.sender.send(event).await.map_err(|_| {
            AppError::Unavailable("role change feed consumer has shut down".to_owned())
        })
    }
}

/// Consuming half of the role-change channel.
pub struct ChannelRoleChangeFeed {
    receiver: Mutex<mpsc::Receiver<RoleChangeEvent>>,
}

#[async_trait]
impl RoleChangeFeed for ChannelRoleChangeFeed {
    async fn next_change(&self) -> Option<RoleChangeEvent> {
        self.receiver.lock().await.recv().await
    }
}
