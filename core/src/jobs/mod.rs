// storefront_core/src/jobs/mod.rs

//! Background jobs triggered by order creation.
//!
//! Jobs are enqueued on a [`JobQueue`] and executed out of the request path by
//! a [`JobWorker`]. Delivery is at-least-once, so both handlers tolerate
//! running twice for the same input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{self, keys, Cache};
use crate::error::{CoreError, CoreResult};
use crate::storage::Storage;

pub mod notifier;

pub use notifier::{LogNotifier, Notification, Notifier};

const NOTIFIED_MARKER_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Job {
  OrderCreatedNotification { order_id: Uuid },
  RefreshOrdersReport,
}

impl Job {
  pub fn name(&self) -> &'static str {
    match self {
      Job::OrderCreatedNotification { .. } => "order_created_notification",
      Job::RefreshOrdersReport => "refresh_orders_report",
    }
  }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
  /// Hands the job to the broker. Never waits for the job to run.
  async fn enqueue(&self, job: Job) -> CoreResult<()>;
}

/// Channel-backed queue feeding a [`JobWorker`] task.
#[derive(Clone)]
pub struct TaskQueue {
  sender: mpsc::UnboundedSender<Job>,
}

pub struct JobReceiver {
  inner: mpsc::UnboundedReceiver<Job>,
}

impl TaskQueue {
  pub fn channel() -> (Self, JobReceiver) {
    let (sender, inner) = mpsc::unbounded_channel();
    (Self { sender }, JobReceiver { inner })
  }
}

#[async_trait]
impl JobQueue for TaskQueue {
  async fn enqueue(&self, job: Job) -> CoreResult<()> {
    let name = job.name();
    self
      .sender
      .send(job)
      .map_err(|_| CoreError::Queue(format!("no worker is receiving jobs; dropped '{}'", name)))?;
    info!(job = name, "Job enqueued.");
    Ok(())
  }
}

impl JobReceiver {
  pub async fn recv(&mut self) -> Option<Job> {
    self.inner.recv().await
  }

  /// Jobs enqueued so far, without waiting.
  pub fn drain(&mut self) -> Vec<Job> {
    let mut jobs = Vec::new();
    while let Ok(job) = self.inner.try_recv() {
      jobs.push(job);
    }
    jobs
  }
}

pub struct JobWorker {
  storage: Arc<dyn Storage>,
  cache: Arc<dyn Cache>,
  notifier: Arc<dyn Notifier>,
  max_attempts: u32,
  retry_backoff: Duration,
}

impl JobWorker {
  pub fn new(storage: Arc<dyn Storage>, cache: Arc<dyn Cache>, notifier: Arc<dyn Notifier>) -> Self {
    Self {
      storage,
      cache,
      notifier,
      max_attempts: 3,
      retry_backoff: Duration::from_millis(500),
    }
  }

  /// Attempts per job (at least one) and the base delay between them; the
  /// delay grows linearly with the attempt number.
  pub fn with_retry(mut self, max_attempts: u32, retry_backoff: Duration) -> Self {
    self.max_attempts = max_attempts.max(1);
    self.retry_backoff = retry_backoff;
    self
  }

  /// Drains the receiver until every sender is dropped. Each job runs on its
  /// own task so a retrying job does not hold up the rest.
  pub async fn run(self: Arc<Self>, mut receiver: JobReceiver) {
    info!("Job worker started.");
    while let Some(job) = receiver.recv().await {
      let worker = Arc::clone(&self);
      tokio::spawn(async move {
        worker.execute(&job).await;
      });
    }
    info!("Job queue closed; job worker stopping.");
  }

  /// Runs a job with retries. Returns whether it eventually succeeded.
  #[instrument(name = "job_worker::execute", skip_all, fields(job = job.name()))]
  pub async fn execute(&self, job: &Job) -> bool {
    for attempt in 1..=self.max_attempts {
      match self.process(job).await {
        Ok(()) => {
          info!(attempt, "Job completed.");
          return true;
        }
        Err(e) if attempt < self.max_attempts => {
          warn!(attempt, error = %e, "Job failed; retrying.");
          tokio::time::sleep(self.retry_backoff * attempt).await;
        }
        Err(e) => {
          error!(attempt, error = %e, "Job failed permanently; giving up.");
        }
      }
    }
    false
  }

  /// A single attempt.
  pub async fn process(&self, job: &Job) -> CoreResult<()> {
    match job {
      Job::OrderCreatedNotification { order_id } => self.notify_order_created(*order_id).await,
      Job::RefreshOrdersReport => self.refresh_orders_report().await,
    }
  }

  async fn notify_order_created(&self, order_id: Uuid) -> CoreResult<()> {
    let marker = keys::order_notified(order_id);
    if cache::get_json::<String>(self.cache.as_ref(), &marker).await.is_some() {
      info!(%order_id, "Order notification already sent; skipping duplicate delivery.");
      return Ok(());
    }

    let Some(order) = self.storage.get_order(order_id).await? else {
      warn!(%order_id, "Order no longer exists; nothing to notify.");
      return Ok(());
    };
    let user = self
      .storage
      .get_user(order.user_id)
      .await?
      .ok_or_else(|| CoreError::NotFound(format!("Owner of order {} not found.", order_id)))?;

    let total = order.total_price.map_or_else(|| "pending".to_string(), |total| total.to_string());
    let notification = Notification {
      to: user.email.clone(),
      subject: format!("Your order #{} has been created", order_id),
      body: format!(
        "<p>Hi {},</p><p>We received your order #{} for a total of {}.</p><p>Thank you for your purchase!</p>",
        user.username, order_id, total
      ),
    };
    let message_id = self.notifier.send(&notification).await?;
    cache::set_json(self.cache.as_ref(), &marker, &message_id, Some(NOTIFIED_MARKER_TTL)).await;
    info!(%order_id, %message_id, "Order creation notification sent.");
    Ok(())
  }

  async fn refresh_orders_report(&self) -> CoreResult<()> {
    let report = self.storage.orders_report().await?;
    let raw = serde_json::to_string(&report).map_err(|e| CoreError::Internal(e.to_string()))?;
    self.cache.set(keys::ORDERS_REPORT, raw, None).await?;
    info!(
      order_count = report.order_count,
      revenue_total = %report.revenue_total,
      "Orders report refreshed."
    );
    Ok(())
  }
}
