use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use guildhall_application::ChatGateway;
use guildhall_core::{AppError, AppResult, MemberId};
use guildhall_domain::RoleSet;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shared readiness flag for the chat connection.
///
/// The runtime flips this from its connection checks; services observe it
/// synchronously before attempting deliveries or role fetches.
#[derive(Clone, Default)]
pub struct ConnectionState {
    ready: Arc<AtomicBool>,
}

impl ConnectionState {
    /// Creates a state that starts offline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the connection as usable.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Marks the connection as unusable.
    pub fn mark_offline(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Returns whether the connection is currently usable.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[derive(Debug, Deserialize)]
struct GuildMemberResponse {
    roles: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OpenDirectChannelRequest<'a> {
    recipient_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DirectChannelResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    content: &'a str,
}

/// Chat-platform gateway backed by the platform's HTTP API.
pub struct HttpChatGateway {
    http_client: reqwest::Client,
    api_base_url: String,
    bot_token: String,
    guild_id: String,
    connection_state: ConnectionState,
}

impl HttpChatGateway {
    /// Creates a gateway for one guild.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        api_base_url: impl Into<String>,
        bot_token: impl Into<String>,
        guild_id: impl Into<String>,
        connection_state: ConnectionState,
    ) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        Self {
            http_client,
            api_base_url,
            bot_token: bot_token.into(),
            guild_id: guild_id.into(),
            connection_state,
        }
    }

    /// Probes the platform API and updates the shared readiness flag.
    pub async fn check_connection(&self) -> bool {
        let endpoint = format!("{}/users/@me", self.api_base_url);
        let reachable = self
            .http_client
            .get(endpoint)
            .header(header::AUTHORIZATION, self.authorization_value())
            .send()
            .await
            .is_ok_and(|response| response.status().is_success());

        if reachable != self.connection_state.is_ready() {
            debug!(reachable, "chat platform connection state changed");
        }
        if reachable {
            self.connection_state.mark_ready();
        } else {
            self.connection_state.mark_offline();
        }
        reachable
    }

    fn authorization_value(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> AppResult<()> {
        let endpoint = format!("{}/channels/{channel_id}/messages", self.api_base_url);
        let response = self
            .http_client
            .post(endpoint)
            .header(header::AUTHORIZATION, self.authorization_value())
            .json(&CreateMessageRequest { content: text })
            .send()
            .await
            .map_err(|error| {
                AppError::DeliveryFailed(format!(
                    "failed to call message endpoint for channel '{channel_id}': {error}"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::DeliveryFailed(format!(
                "message endpoint for channel '{channel_id}' returned status {}: {body}",
                status.as_u16()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    fn is_connection_ready(&self) -> bool {
        self.connection_state.is_ready()
    }

    async fn fetch_member_roles(&self, member: &MemberId) -> AppResult<RoleSet> {
        let endpoint = format!(
            "{}/guilds/{}/members/{}",
            self.api_base_url,
            self.guild_id,
            member.as_str()
        );
        let response = self
            .http_client
            .get(endpoint)
            .header(header::AUTHORIZATION, self.authorization_value())
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!(
                    "failed to call guild member endpoint for '{member}': {error}"
                ))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "member '{member}' is not in the guild"
            )));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Unavailable(format!(
                "guild member endpoint returned status {}: {body}",
                status.as_u16()
            )));
        }

        let body = response
            .json::<GuildMemberResponse>()
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to parse guild member response for '{member}': {error}"
                ))
            })?;

        Ok(RoleSet::from_names(body.roles.iter().map(String::as_str)))
    }

    async fn send_direct_message(&self, member: &MemberId, text: &str) -> AppResult<()> {
        let endpoint = format!("{}/users/@me/channels", self.api_base_url);
        let response = self
            .http_client
            .post(endpoint)
            .header(header::AUTHORIZATION, self.authorization_value())
            .json(&OpenDirectChannelRequest {
                recipient_id: member.as_str(),
            })
            .send()
            .await
            .map_err(|error| {
                AppError::DeliveryFailed(format!(
                    "failed to open direct channel for '{member}': {error}"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::DeliveryFailed(format!(
                "direct channel endpoint for '{member}' returned status {}: {body}",
                status.as_u16()
            )));
        }

        let channel = response
            .json::<DirectChannelResponse>()
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to parse direct channel response for '{member}': {error}"
                ))
            })?;

        self.post_message(channel.id.as_str(), text).await
    }

    async fn send_channel_message(&self, channel_id: &str, text: &str) -> AppResult<()> {
        self.post_message(channel_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState;

    #[test]
    fn connection_state_starts_offline_and_toggles() {
        let state = ConnectionState::new();
        assert!(!state.is_ready());

        state.mark_ready();
        assert!(state.is_ready());

        state.mark_offline();
        assert!(!state.is_ready());
    }

    #[test]
    fn connection_state_clones_share_the_flag() {
        let state = ConnectionState::new();
        let observer = state.clone();

        state.mark_ready();
        assert!(observer.is_ready());
    }
}
