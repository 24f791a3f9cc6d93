use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use guildhall_core::{AppError, AppResult, MemberId};
use guildhall_domain::RoleSet;
use tokio::sync::RwLock;
use tracing::debug;

use crate::review_ports::{ChatGateway, Clock};

/// Default cache entry lifetime.
const ROLE_CACHE_TTL_SECONDS: i64 = 120;
/// Total bound on waiting for the platform connection before falling back.
const READY_WAIT: Duration = Duration::from_secs(1);
/// Single readiness poll step.
const READY_POLL_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
struct RoleCacheEntry {
    roles: RoleSet,
    fetched_at: DateTime<Utc>,
}

/// Resolves member role sets with a short-lived cache over the chat gateway.
///
/// An expired entry is never served as authoritative, but it is kept as a
/// degraded fallback when the live lookup cannot complete. `Unavailable` is
/// raised only when no entry has ever been fetched for the member.
pub struct RoleResolver {
    gateway: Arc<dyn ChatGateway>,
    clock: Arc<dyn Clock>,
    cache: RwLock<HashMap<MemberId, RoleCacheEntry>>,
    ttl: chrono::Duration,
}

impl RoleResolver {
    /// Creates a resolver with the default 2 minute TTL.
    #[must_use]
    pub fn new(gateway: Arc<dyn ChatGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            clock,
            cache: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::seconds(ROLE_CACHE_TTL_SECONDS),
        }
    }

    /// Overrides the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the member's role set, preferring a fresh cache entry.
    pub async fn roles_for(&self, member: &MemberId) -> AppResult<RoleSet> {
        let now = self.clock.now();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(member)
                && now - entry.fetched_at < self.ttl
            {
                return Ok(entry.roles.clone());
            }
        }

        match self.fetch_live(member).await {
            Ok(roles) => {
                let mut cache = self.cache.write().await;
                // Concurrent refreshes race; last writer wins, which is fine
                // for eventually-consistent role data.
                cache.insert(
                    member.clone(),
                    RoleCacheEntry {
                        roles: roles.clone(),
                        fetched_at: self.clock.now(),
                    },
                );
                Ok(roles)
            }
            Err(error) => {
                let cache = self.cache.read().await;
                if let Some(entry) = cache.get(member) {
                    debug!(
                        member = %member,
                        error = %error,
                        "live role fetch failed, serving stale cache entry"
                    );
                    return Ok(entry.roles.clone());
                }

                Err(AppError::Unavailable(format!(
                    "no role data available for member '{member}': {error}"
                )))
            }
        }
    }

    async fn fetch_live(&self, member: &MemberId) -> AppResult<RoleSet> {
        let mut waited = Duration::ZERO;
        while !self.gateway.is_connection_ready() {
            if waited >= READY_WAIT {
                return Err(AppError::Unavailable(
                    "platform connection did not become ready in time".to_owned(),
                ));
            }

            tokio::time::sleep(READY_POLL_STEP).await;
            waited += READY_POLL_STEP;
        }

        self.gateway.fetch_member_roles(member).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use guildhall_core::{AppError, AppResult, MemberId};
    use guildhall_domain::RoleSet;
    use tokio::sync::Mutex;

    use crate::review_ports::{ChatGateway, Clock};

    use super::RoleResolver;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        fn advance(&self, delta: Duration) {
            if let Ok(mut now) = self.now.try_lock() {
                *now = *now + delta;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.now.try_lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
        }
    }

    struct FakeGateway {
        ready: AtomicBool,
        healthy: AtomicBool,
        fetch_calls: AtomicUsize,
        roles: RoleSet,
    }

    impl FakeGateway {
        fn new(roles: RoleSet) -> Self {
            Self {
                ready: AtomicBool::new(true),
                healthy: AtomicBool::new(true),
                fetch_calls: AtomicUsize::new(0),
                roles,
            }
        }
    }

    #[async_trait]
    impl ChatGateway for FakeGateway {
        fn is_connection_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn fetch_member_roles(&self, _member: &MemberId) -> AppResult<RoleSet> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(self.roles.clone())
            } else {
                Err(AppError::Internal("platform request failed".to_owned()))
            }
        }

        async fn send_direct_message(&self, _member: &MemberId, _text: &str) -> AppResult<()> {
            Ok(())
        }

        async fn send_channel_message(&self, _channel_id: &str, _text: &str) -> AppResult<()> {
            Ok(())
        }
    }

    fn member(value: &str) -> MemberId {
        MemberId::new(value).unwrap_or_else(|_| unreachable!("valid member id"))
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_a_live_call() {
        let clock = ManualClock::starting_at(Utc::now());
        let gateway = Arc::new(FakeGateway::new(RoleSet::from_names(["Supporter"])));
        let resolver = RoleResolver::new(gateway.clone(), clock.clone());

        let first = resolver.roles_for(&member("100")).await;
        assert!(first.is_ok());
        assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::seconds(90));
        let second = resolver.roles_for(&member("100")).await;
        assert!(second.is_ok());
        assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_a_live_refresh() {
        let clock = ManualClock::starting_at(Utc::now());
        let gateway = Arc::new(FakeGateway::new(RoleSet::from_names(["Supporter"])));
        let resolver = RoleResolver::new(gateway.clone(), clock.clone());

        let first = resolver.roles_for(&member("100")).await;
        assert!(first.is_ok());

        clock.advance(Duration::seconds(130));
        let second = resolver.roles_for(&member("100")).await;
        assert!(second.is_ok());
        assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_entry_is_served_when_live_fetch_fails() {
        let clock = ManualClock::starting_at(Utc::now());
        let gateway = Arc::new(FakeGateway::new(RoleSet::from_names(["Supporter"])));
        let resolver = RoleResolver::new(gateway.clone(), clock.clone());

        let first = resolver.roles_for(&member("100")).await;
        assert!(first.is_ok());

        clock.advance(Duration::seconds(300));
        gateway.healthy.store(false, Ordering::SeqCst);

        let fallback = resolver.roles_for(&member("100")).await;
        assert_eq!(fallback.ok(), Some(RoleSet::from_names(["Supporter"])));
    }

    #[tokio::test]
    async fn unknown_member_without_cache_is_unavailable() {
        let clock = ManualClock::starting_at(Utc::now());
        let gateway = Arc::new(FakeGateway::new(RoleSet::new()));
        gateway.healthy.store(false, Ordering::SeqCst);
        let resolver = RoleResolver::new(gateway, clock);

        let result = resolver.roles_for(&member("100")).await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn unready_connection_without_cache_is_unavailable() {
        let clock = ManualClock::starting_at(Utc::now());
        let gateway = Arc::new(FakeGateway::new(RoleSet::new()));
        gateway.ready.store(false, Ordering::SeqCst);
        let resolver = RoleResolver::new(gateway.clone(), clock);

        let result = resolver.roles_for(&member("100")).await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));
        assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 0);
    }
}
