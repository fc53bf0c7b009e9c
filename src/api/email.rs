//! Email outbox: verification and invitation emails are queued in
//! `email_outbox` inside the same transaction as the change they announce,
//! and a background worker delivers them.
//!
//! The worker locks a batch with `FOR UPDATE SKIP LOCKED`, hands each row to
//! an [`EmailSender`], and records the outcome. Failures are retried with
//! exponential backoff and jitter until `max_attempts`, then marked `failed`.
//! [`LogEmailSender`] is the only sender shipped; it logs the rendered link.

use anyhow::{Context, Result};
use rand::Rng;
use serde_json::{json, Value};
use sqlx::{PgExecutor, PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use super::handlers::db_span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmailTemplate {
    VerifyEmail,
    CarerInvite,
}

impl EmailTemplate {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::CarerInvite => "carer_invite",
        }
    }
}

/// A message about to be queued.
#[derive(Clone, Debug)]
pub struct OutboundEmail {
    pub to_email: String,
    pub template: EmailTemplate,
    pub payload: Value,
}

impl OutboundEmail {
    #[must_use]
    pub fn verify_email(to_email: &str, first_name: &str, verify_url: &str) -> Self {
        Self {
            to_email: to_email.to_string(),
            template: EmailTemplate::VerifyEmail,
            payload: json!({
                "firstName": first_name,
                "verifyUrl": verify_url,
            }),
        }
    }

    #[must_use]
    pub fn carer_invite(
        to_email: &str,
        coordinator_name: &str,
        patient_name: &str,
        invite_url: &str,
    ) -> Self {
        Self {
            to_email: to_email.to_string(),
            template: EmailTemplate::CarerInvite,
            payload: json!({
                "coordinatorName": coordinator_name,
                "patientName": patient_name,
                "inviteUrl": invite_url,
            }),
        }
    }
}

/// Queue a message as `pending`. Pass a transaction to tie it to other writes.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn enqueue<'e, E>(executor: E, email: &OutboundEmail) -> Result<()>
where
    E: PgExecutor<'e>,
{
    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3)
    ";
    sqlx::query(query)
        .bind(&email.to_email)
        .bind(email.template.as_str())
        .bind(&email.payload)
        .execute(executor)
        .instrument(db_span("INSERT", query))
        .await
        .context("failed to enqueue email")?;
    Ok(())
}

/// A queued message as read back by the worker.
#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Email delivery abstraction used by the outbox worker.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to schedule a retry.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Logs the message instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email outbox delivery (log only)"
        );
        Ok(())
    }
}

/// Outbox worker tuning. Zero values are raised by [`EmailWorkerConfig::normalize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmailWorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl EmailWorkerConfig {
    #[must_use]
    pub fn normalize(self) -> Self {
        let second = Duration::from_secs(1);
        let backoff_base = self.backoff_base.max(second);
        Self {
            poll_interval: self.poll_interval.max(second),
            batch_size: self.batch_size.max(1),
            max_attempts: self.max_attempts.max(1),
            backoff_base,
            backoff_max: self.backoff_max.max(backoff_base),
        }
    }

    fn batch_limit(&self) -> i64 {
        i64::try_from(self.batch_size).unwrap_or(i64::MAX)
    }
}

/// What to record for a row after a delivery attempt.
#[derive(Debug, PartialEq, Eq)]
enum Delivery {
    Sent,
    Retry { delay: Duration, error: String },
    Failed { error: String },
}

impl Delivery {
    fn decide(attempt: u32, result: Result<()>, config: &EmailWorkerConfig) -> Self {
        match result {
            Ok(()) => Self::Sent,
            Err(err) if attempt >= config.max_attempts => Self::Failed {
                error: err.to_string(),
            },
            Err(err) => Self::Retry {
                delay: backoff_delay(attempt, config.backoff_base, config.backoff_max),
                error: err.to_string(),
            },
        }
    }
}

/// Spawn the background task that drains the outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: EmailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    let config = config.normalize();
    tokio::spawn(async move {
        let mut ticker = interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match process_outbox_batch(&pool, sender.as_ref(), &config).await {
                Ok(0) => {}
                Ok(count) => debug!(count, "email outbox batch processed"),
                Err(err) => error!("email outbox batch failed: {err:#}"),
            }
        }
    })
}

async fn process_outbox_batch(
    pool: &PgPool,
    sender: &dyn EmailSender,
    config: &EmailWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let rows = sqlx::query(query)
        .bind(config.batch_limit())
        .fetch_all(&mut *tx)
        .instrument(db_span("SELECT", query))
        .await
        .context("failed to load email outbox batch")?;

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let attempt = u32::try_from(attempts).unwrap_or(0).saturating_add(1);
        let message = EmailMessage {
            to_email: row.get("to_email"),
            template: row.get("template"),
            payload_json: row.get("payload_json"),
        };

        let delivery = Delivery::decide(attempt, sender.send(&message), config);
        record_delivery(&mut tx, id, attempt, &delivery).await?;
    }

    // Commit even on empty batches to release the row locks.
    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(row_count)
}

async fn record_delivery(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempt: u32,
    delivery: &Delivery,
) -> Result<()> {
    let (status, error, delay_ms) = match delivery {
        Delivery::Sent => ("sent", None, 0),
        Delivery::Failed { error } => ("failed", Some(error.as_str()), 0),
        Delivery::Retry { delay, error } => (
            "pending",
            Some(error.as_str()),
            i64::try_from(delay.as_millis()).unwrap_or(i64::MAX),
        ),
    };

    let query = r"
        UPDATE email_outbox
        SET status = $2,
            attempts = $3,
            last_error = $4,
            sent_at = CASE WHEN $2 = 'sent' THEN NOW() ELSE sent_at END,
            next_attempt_at = NOW() + ($5 * INTERVAL '1 millisecond')
        WHERE id = $1
    ";
    sqlx::query(query)
        .bind(id)
        .bind(status)
        .bind(i32::try_from(attempt).unwrap_or(i32::MAX))
        .bind(error)
        .bind(delay_ms)
        .execute(&mut **tx)
        .instrument(db_span("UPDATE", query))
        .await
        .with_context(|| format!("failed to record email outbox status {status}"))?;

    Ok(())
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let delay = base.checked_mul(1u32 << shift).unwrap_or(max).min(max);
    jitter_delay(delay)
}

/// Uniform in `[delay / 2, delay]`.
fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    Duration::from_millis(half + rand::thread_rng().gen_range(0..=half))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_fixes_zero_values() {
        let config = EmailWorkerConfig {
            poll_interval: Duration::ZERO,
            batch_size: 0,
            max_attempts: 0,
            backoff_base: Duration::from_secs(10),
            backoff_max: Duration::from_secs(2),
        }
        .normalize();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.backoff_base, Duration::from_secs(10));
        assert_eq!(config.backoff_max, Duration::from_secs(10));
        assert_eq!(config.batch_limit(), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(300);
        for (attempt, ceiling) in [(1, 5), (2, 10), (3, 20), (10, 300), (40, 300)] {
            let delay = backoff_delay(attempt, base, max);
            let ceiling = Duration::from_secs(ceiling);
            assert!(delay <= ceiling, "attempt {attempt}: {delay:?} > {ceiling:?}");
            assert!(delay >= ceiling / 2, "attempt {attempt}: {delay:?} < half");
        }
    }

    #[test]
    fn delivery_outcomes() {
        let config = EmailWorkerConfig {
            max_attempts: 3,
            ..EmailWorkerConfig::default()
        };
        assert_eq!(Delivery::decide(1, Ok(()), &config), Delivery::Sent);
        assert!(matches!(
            Delivery::decide(2, Err(anyhow::anyhow!("smtp down")), &config),
            Delivery::Retry { ref error, .. } if error == "smtp down"
        ));
        assert_eq!(
            Delivery::decide(3, Err(anyhow::anyhow!("smtp down")), &config),
            Delivery::Failed {
                error: "smtp down".to_string()
            }
        );
    }

    #[test]
    fn payloads_carry_links() {
        let verify = OutboundEmail::verify_email(
            "ada@example.com",
            "Ada",
            "http://localhost:3000/verify-email/tok",
        );
        assert_eq!(verify.template.as_str(), "verify_email");
        assert_eq!(
            verify.payload["verifyUrl"],
            "http://localhost:3000/verify-email/tok"
        );

        let invite = OutboundEmail::carer_invite(
            "bob@example.com",
            "Ada Lovelace",
            "Grace Hopper",
            "http://localhost:3000/add-carer/tok",
        );
        assert_eq!(invite.template, EmailTemplate::CarerInvite);
        assert_eq!(invite.payload["patientName"], "Grace Hopper");
    }
}
