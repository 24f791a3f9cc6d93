//! Guildhall review daemon runtime.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use guildhall_application::{
    ActivityLog, ApplicationStore, NotificationDispatcher, ReviewService, RoleChangeEvent,
    RoleChangeFeed, RoleChangeReactor, RoleResolver, SystemClock,
};
use guildhall_core::{AppError, AppResult, MemberId};
use guildhall_domain::{ApplicationTypeRegistry, RoleSet, StaffRolePolicy};
use guildhall_infrastructure::{
    ConnectionState, HttpChatGateway, JsonFileStore, RoleChangePublisher, role_change_channel,
};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct ReviewdConfig {
    data_dir: String,
    api_base_url: String,
    bot_token: String,
    guild_id: String,
    announce_channel_id: String,
    policy_path: String,
    dispatch_tick_ms: u64,
    role_sweep_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ReviewPolicyFile {
    staff_roles: StaffRolePolicy,
    application_types: ApplicationTypeRegistry,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ReviewdConfig::load()?;
    let policy = load_policy(config.policy_path.as_str()).await?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let connection_state = ConnectionState::new();
    let gateway = Arc::new(HttpChatGateway::new(
        http_client,
        config.api_base_url.as_str(),
        config.bot_token.as_str(),
        config.guild_id.as_str(),
        connection_state,
    ));
    let store = Arc::new(JsonFileStore::new(config.data_dir.as_str()));
    let clock = Arc::new(SystemClock);

    let role_resolver = Arc::new(RoleResolver::new(gateway.clone(), clock.clone()));
    let dispatcher = Arc::new(NotificationDispatcher::new(gateway.clone(), clock.clone()));
    let review_service = Arc::new(ReviewService::new(
        store.clone() as Arc<dyn ApplicationStore>,
        store as Arc<dyn ActivityLog>,
        role_resolver.clone(),
        dispatcher.clone(),
        policy.staff_roles.clone(),
        policy.application_types,
        clock,
    ));

    let (publisher, feed) = role_change_channel(64);
    let reactor = RoleChangeReactor::new(
        Arc::new(feed) as Arc<dyn RoleChangeFeed>,
        review_service.clone(),
        dispatcher.clone(),
        policy.staff_roles,
        config.announce_channel_id.as_str(),
    );

    info!(
        api_base_url = %config.api_base_url,
        guild_id = %config.guild_id,
        announce_channel_id = %config.announce_channel_id,
        dispatch_tick_ms = config.dispatch_tick_ms,
        role_sweep_interval_ms = config.role_sweep_interval_ms,
        "reviewd started"
    );

    tokio::spawn(run_dispatch_loop(
        gateway.clone(),
        dispatcher,
        config.dispatch_tick_ms,
    ));
    tokio::spawn(run_role_sweep(
        review_service,
        role_resolver,
        publisher,
        config.role_sweep_interval_ms,
    ));

    reactor.run().await;
    Ok(())
}

/// Ticks the notification queues, refreshing connection readiness first so a
/// platform outage pauses delivery instead of burning retry budget.
async fn run_dispatch_loop(
    gateway: Arc<HttpChatGateway>,
    dispatcher: Arc<NotificationDispatcher>,
    tick_ms: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms));
    loop {
        ticker.tick().await;
        if !gateway.check_connection().await {
            warn!("chat platform unreachable, notification queues paused");
            continue;
        }

        let stats = dispatcher.drain_once().await;
        if stats.delivered > 0 || stats.retried > 0 || stats.dropped > 0 {
            info!(
                delivered = stats.delivered,
                retried = stats.retried,
                dropped = stats.dropped,
                "notification queues drained"
            );
        }
    }
}

/// Periodically samples role sets for members with open applications and
/// publishes a change event whenever a sample differs from the previous one.
async fn run_role_sweep(
    review_service: Arc<ReviewService>,
    role_resolver: Arc<RoleResolver>,
    publisher: RoleChangePublisher,
    interval_ms: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    let mut snapshots: HashMap<MemberId, RoleSet> = HashMap::new();

    loop {
        ticker.tick().await;
        let active = match review_service.list_active().await {
            Ok(applications) => applications,
            Err(error) => {
                warn!(error = %error, "role sweep could not list open applications");
                continue;
            }
        };

        let mut next_snapshots: HashMap<MemberId, RoleSet> = HashMap::new();
        for application in &active {
            let member = application.member_id();
            if next_snapshots.contains_key(member) {
                continue;
            }

            let roles = match role_resolver.roles_for(member).await {
                Ok(roles) => roles,
                Err(error) => {
                    warn!(member = %member, error = %error, "role sweep lookup failed");
                    // Carry the old sample forward so an outage never reads
                    // as a role change.
                    if let Some(previous) = snapshots.get(member) {
                        next_snapshots.insert(member.clone(), previous.clone());
                    }
                    continue;
                }
            };

            if let Some(previous) = snapshots.get(member)
                && *previous != roles
            {
                let event = RoleChangeEvent {
                    member_id: member.clone(),
                    member_name: application.member_name().to_owned(),
                    old_roles: previous.clone(),
                    new_roles: roles.clone(),
                };
                if let Err(error) = publisher.publish(event).await {
                    warn!(member = %member, error = %error, "role change event dropped");
                }
            }
            next_snapshots.insert(member.clone(), roles);
        }

        snapshots = next_snapshots;
    }
}

async fn load_policy(path: &str) -> AppResult<ReviewPolicyFile> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| {
            AppError::Validation(format!("failed to read policy file '{path}': {error}"))
        })?;

    serde_json::from_slice(&bytes).map_err(|error| {
        AppError::Validation(format!("failed to parse policy file '{path}': {error}"))
    })
}

impl ReviewdConfig {
    fn load() -> AppResult<Self> {
        let data_dir = env::var("GUILDHALL_DATA_DIR").unwrap_or_else(|_| "./data".to_owned());
        let api_base_url = env::var("GUILDHALL_API_BASE_URL")
            .unwrap_or_else(|_| "https://discord.com/api/v10".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let bot_token = required_env("GUILDHALL_BOT_TOKEN")?;
        let guild_id = required_env("GUILDHALL_GUILD_ID")?;
        let announce_channel_id = required_env("GUILDHALL_ANNOUNCE_CHANNEL_ID")?;
        let policy_path =
            env::var("GUILDHALL_POLICY_PATH").unwrap_or_else(|_| "./policy.json".to_owned());
        let dispatch_tick_ms = parse_env_u64("GUILDHALL_DISPATCH_TICK_MS", 30_000)?;
        let role_sweep_interval_ms = parse_env_u64("GUILDHALL_ROLE_SWEEP_INTERVAL_MS", 30_000)?;

        if dispatch_tick_ms == 0 {
            return Err(AppError::Validation(
                "GUILDHALL_DISPATCH_TICK_MS must be greater than zero".to_owned(),
            ));
        }

        if role_sweep_interval_ms == 0 {
            return Err(AppError::Validation(
                "GUILDHALL_ROLE_SWEEP_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            data_dir,
            api_base_url,
            bot_token,
            guild_id,
            announce_channel_id,
            policy_path,
            dispatch_tick_ms,
            role_sweep_interval_ms,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
