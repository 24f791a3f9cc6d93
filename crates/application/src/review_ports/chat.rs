use async_trait::async_trait;
use guildhall_core::{AppResult, MemberId};
use guildhall_domain::RoleSet;

/// Client port for the external identity and chat platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Returns whether the platform connection is currently established.
    fn is_connection_ready(&self) -> bool;

    /// Fetches the member's current role names. Bounded time.
    async fn fetch_member_roles(&self, member: &MemberId) -> AppResult<RoleSet>;

    /// Sends a direct message to one member.
    async fn send_direct_message(&self, member: &MemberId, text: &str) -> AppResult<()>;

    /// Sends a message to a channel.
    async fn send_channel_message(&self, channel_id: &str, text: &str) -> AppResult<()>;
}

/// One member-roles-changed event from the platform's update stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChangeEvent {
    /// Member whose roles changed.
    pub member_id: MemberId,
    /// Member display name at event time.
    pub member_name: String,
    /// Role set before the change.
    pub old_roles: RoleSet,
    /// Role set after the change.
    pub new_roles: RoleSet,
}

/// Long-lived subscription to member role changes.
#[async_trait]
pub trait RoleChangeFeed: Send + Sync {
    /// Awaits the next role change. Returns `None` when the feed closes.
    async fn next_change(&self) -> Option<RoleChangeEvent>;
}
