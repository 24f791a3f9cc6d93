use chrono::{DateTime, Duration, Utc};
use guildhall_core::MemberId;
use serde::{Deserialize, Serialize};

use crate::application::DecisionKind;

/// Outbound message content for one notification job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    /// Direct message to the applicant about a decision.
    Direct {
        /// Recipient member id.
        recipient: MemberId,
        /// Decision the message reports.
        kind: DecisionKind,
        /// Application type the decision concerns.
        type_key: String,
        /// Optional reviewer-provided reason.
        reason: Option<String>,
    },
    /// System-wide announcement to a channel.
    Broadcast {
        /// Target channel id.
        channel_id: String,
        /// Announcement text.
        text: String,
    },
}

impl NotificationPayload {
    /// Returns a short label for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Direct {
                recipient, kind, ..
            } => format!("direct/{} to {recipient}", kind.as_str()),
            Self::Broadcast { channel_id, .. } => format!("broadcast to {channel_id}"),
        }
    }
}

/// One queued unit of outbound delivery with bounded retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    payload: NotificationPayload,
    retry_count: u32,
    enqueued_at: DateTime<Utc>,
    eligible_at: DateTime<Utc>,
}

impl NotificationJob {
    /// Creates a job eligible for immediate delivery.
    #[must_use]
    pub fn new(payload: NotificationPayload, now: DateTime<Utc>) -> Self {
        Self {
            payload,
            retry_count: 0,
            enqueued_at: now,
            eligible_at: now,
        }
    }

    /// Returns the message content.
    #[must_use]
    pub fn payload(&self) -> &NotificationPayload {
        &self.payload
    }

    /// Returns how many attempts have failed so far.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns when the job entered the queue.
    #[must_use]
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Returns the earliest time the next attempt may run.
    #[must_use]
    pub fn eligible_at(&self) -> DateTime<Utc> {
        self.eligible_at
    }

    /// Returns whether the job may be attempted at the given time.
    #[must_use]
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.eligible_at <= now
    }

    /// Records one failed attempt and schedules the next one after a delay.
    pub fn record_failure(&mut self, backoff: Duration, now: DateTime<Utc>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.eligible_at = now + backoff;
    }

    /// Returns whether the retry bound has been reached.
    #[must_use]
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.retry_count >= max_attempts
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use guildhall_core::MemberId;

    use crate::application::DecisionKind;

    use super::{NotificationJob, NotificationPayload};

    #[test]
    fn failure_schedules_backoff_and_counts_retries() {
        let now = Utc::now();
        let recipient = MemberId::new("100").unwrap_or_else(|_| unreachable!("valid member id"));
        let mut job = NotificationJob::new(
            NotificationPayload::Direct {
                recipient,
                kind: DecisionKind::Approved,
                type_key: "whitelist".to_owned(),
                reason: None,
            },
            now,
        );

        assert!(job.is_eligible(now));
        job.record_failure(Duration::seconds(5), now);

        assert_eq!(job.retry_count(), 1);
        assert!(!job.is_eligible(now));
        assert!(job.is_eligible(now + Duration::seconds(5)));
        assert!(!job.is_exhausted(3));

        job.record_failure(Duration::seconds(10), now);
        job.record_failure(Duration::seconds(15), now);
        assert!(job.is_exhausted(3));
    }
}
