use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use guildhall_core::{AppResult, MemberId};
use guildhall_domain::{DecisionKind, NotificationJob, NotificationPayload};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::review_ports::{ChatGateway, Clock};

/// Retry bound per job; beyond it the job is dropped, never retried forever.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;
/// Bound on one delivery attempt, message construction included.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
/// Base step of the linear backoff schedule.
const BACKOFF_STEP_SECONDS: i64 = 5;

type BackoffFn = Box<dyn Fn(u32) -> chrono::Duration + Send + Sync>;

/// Per-tick delivery counters for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Jobs delivered and dequeued this tick.
    pub delivered: usize,
    /// Jobs that failed and were re-queued with backoff.
    pub retried: usize,
    /// Jobs dropped after exhausting the retry bound.
    pub dropped: usize,
}

impl DispatchStats {
    fn absorb(&mut self, other: DispatchStats) {
        self.delivered += other.delivered;
        self.retried += other.retried;
        self.dropped += other.dropped;
    }
}

/// At-least-once outbound delivery pipeline over two FIFO queues.
///
/// Direct decision messages and channel broadcasts are queued independently;
/// ordering holds within a queue, never across them. Queues are unbounded in
/// memory, an accepted simplification at tens of jobs per day. Retries may
/// duplicate a delivery when a success acknowledgment is lost; that window is
/// accepted, not hidden.
pub struct NotificationDispatcher {
    gateway: Arc<dyn ChatGateway>,
    clock: Arc<dyn Clock>,
    direct_queue: Mutex<VecDeque<NotificationJob>>,
    broadcast_queue: Mutex<VecDeque<NotificationJob>>,
    max_attempts: u32,
    attempt_timeout: Duration,
    backoff: BackoffFn,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with the default retry schedule.
    #[must_use]
    pub fn new(gateway: Arc<dyn ChatGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            clock,
            direct_queue: Mutex::new(VecDeque::new()),
            broadcast_queue: Mutex::new(VecDeque::new()),
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            attempt_timeout: ATTEMPT_TIMEOUT,
            backoff: Box::new(|retry_count| {
                chrono::Duration::seconds(BACKOFF_STEP_SECONDS * i64::from(retry_count))
            }),
        }
    }

    /// Overrides the backoff schedule.
    #[must_use]
    pub fn with_backoff(
        mut self,
        backoff: impl Fn(u32) -> chrono::Duration + Send + Sync + 'static,
    ) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Queues one direct message reporting a decision to the applicant.
    pub async fn enqueue_decision(
        &self,
        recipient: MemberId,
        kind: DecisionKind,
        type_key: impl Into<String>,
        reason: Option<String>,
    ) -> AppResult<()> {
        let payload = NotificationPayload::Direct {
            recipient,
            kind,
            type_key: type_key.into(),
            reason,
        };
        self.direct_queue
            .lock()
            .await
            .push_back(NotificationJob::new(payload, self.clock.now()));
        Ok(())
    }

    /// Queues one system-wide channel announcement.
    pub async fn enqueue_broadcast(
        &self,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> AppResult<()> {
        let payload = NotificationPayload::Broadcast {
            channel_id: channel_id.into(),
            text: text.into(),
        };
        self.broadcast_queue
            .lock()
            .await
            .push_back(NotificationJob::new(payload, self.clock.now()));
        Ok(())
    }

    /// Returns current (direct, broadcast) queue depths.
    pub async fn queue_depths(&self) -> (usize, usize) {
        (
            self.direct_queue.lock().await.len(),
            self.broadcast_queue.lock().await.len(),
        )
    }

    /// Runs one drain cycle over both queues.
    ///
    /// When the platform connection is not ready every job stays queued until
    /// the next tick; the dispatcher never spins waiting for readiness.
    pub async fn drain_once(&self) -> DispatchStats {
        let mut stats = DispatchStats::default();
        if !self.gateway.is_connection_ready() {
            return stats;
        }

        stats.absorb(self.drain_queue(&self.direct_queue).await);
        stats.absorb(self.drain_queue(&self.broadcast_queue).await);
        stats
    }

    async fn drain_queue(&self, queue: &Mutex<VecDeque<NotificationJob>>) -> DispatchStats {
        // The queue lock is not held across delivery attempts, so enqueues
        // during a drain never wait on the network.
        let batch: Vec<NotificationJob> = queue.lock().await.drain(..).collect();
        let mut stats = DispatchStats::default();
        let mut waiting: Vec<NotificationJob> = Vec::new();
        let mut retried: Vec<NotificationJob> = Vec::new();

        for mut job in batch {
            let now = self.clock.now();
            if !job.is_eligible(now) {
                waiting.push(job);
                continue;
            }

            let attempt = tokio::time::timeout(self.attempt_timeout, self.deliver(&job)).await;
            match attempt {
                Ok(Ok(())) => {
                    stats.delivered += 1;
                    info!(job = %job.payload().describe(), "notification delivered");
                }
                Ok(Err(error)) => {
                    self.record_failed_attempt(
                        &mut job,
                        error.to_string(),
                        &mut stats,
                        &mut retried,
                    );
                }
                Err(_) => {
                    self.record_failed_attempt(
                        &mut job,
                        "delivery attempt timed out".to_owned(),
                        &mut stats,
                        &mut retried,
                    );
                }
            }
        }

        let mut queue = queue.lock().await;
        // Jobs still waiting on backoff keep their place at the head; fresh
        // retries go to the tail.
        for job in waiting.into_iter().rev() {
            queue.push_front(job);
        }
        for job in retried {
            queue.push_back(job);
        }

        stats
    }

    fn record_failed_attempt(
        &self,
        job: &mut NotificationJob,
        error: String,
        stats: &mut DispatchStats,
        retried: &mut Vec<NotificationJob>,
    ) {
        let now = self.clock.now();
        let delay = (self.backoff)(job.retry_count().saturating_add(1));
        job.record_failure(delay, now);

        if job.is_exhausted(self.max_attempts) {
            stats.dropped += 1;
            warn!(
                job = %job.payload().describe(),
                retries = job.retry_count(),
                error = %error,
                "notification permanently failed, dropping job"
            );
        } else {
            stats.retried += 1;
            warn!(
                job = %job.payload().describe(),
                retries = job.retry_count(),
                error = %error,
                "notification attempt failed, re-queued with backoff"
            );
            retried.push(job.clone());
        }
    }

    async fn deliver(&self, job: &NotificationJob) -> AppResult<()> {
        match job.payload() {
            NotificationPayload::Direct {
                recipient,
                kind,
                type_key,
                reason,
            } => {
                let text = direct_message_text(*kind, type_key, reason.as_deref());
                self.gateway.send_direct_message(recipient, &text).await
            }
            NotificationPayload::Broadcast { channel_id, text } => {
                self.gateway.send_channel_message(channel_id, text).await
            }
        }
    }
}

fn direct_message_text(kind: DecisionKind, type_key: &str, reason: Option<&str>) -> String {
    let mut text = match kind {
        DecisionKind::Approved => {
            format!("Your {type_key} application has been approved. Welcome!")
        }
        DecisionKind::Denied => format!("Your {type_key} application has been denied."),
    };

    if let Some(reason) = reason {
        text.push_str("\nReason: ");
        text.push_str(reason);
    }

    text
}
