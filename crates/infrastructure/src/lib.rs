//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod channel_role_feed;
mod http_chat_gateway;
mod in_memory_store;
mod json_file_store;

pub use channel_role_feed::{ChannelRoleChangeFeed, RoleChangePublisher, role_change_channel};
pub use http_chat_gateway::{ConnectionState, HttpChatGateway};
pub use in_memory_store::{InMemoryActivityLog, InMemoryApplicationStore};
pub use json_file_store::JsonFileStore;
