// tests/job_tests.rs
mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::cache::{self, keys};
use storefront_core::jobs::Job;
use storefront_core::models::{LineItemInput, OrdersReport};
use storefront_core::{JobQueue, JobWorker, LogNotifier, Storage, TaskQueue};
use uuid::Uuid;

fn worker(h: &Harness, notifier: Arc<FlakyNotifier>) -> JobWorker {
  JobWorker::new(h.storage.clone(), h.cache.clone(), notifier).with_retry(3, Duration::from_millis(1))
}

async fn place_order(h: &Harness) -> Uuid {
  let (_, viewer) = seed_user(&h.storage, "alice", false).await;
  let lamp = seed_product(&h.storage, "Lamp", "4.00").await;
  let line = LineItemInput { product_id: lamp.id, quantity: dec("2"), price: None };
  h.orders.create_order(Some(&viewer), vec![line]).await.unwrap().order.id
}

#[tokio::test]
async fn notification_is_sent_to_the_order_owner() {
  let h = harness();
  let order_id = place_order(&h).await;
  let notifier = Arc::new(FlakyNotifier::default());

  assert!(worker(&h, notifier.clone()).execute(&Job::OrderCreatedNotification { order_id }).await);

  let delivered = notifier.delivered.lock().clone();
  assert_eq!(delivered.len(), 1);
  assert_eq!(delivered[0].to, "alice@example.com");
  assert!(delivered[0].subject.contains(&order_id.to_string()));
  assert!(delivered[0].body.contains("8.00"));
  assert!(h.cache.contains(&keys::order_notified(order_id)));
}

#[tokio::test]
async fn failed_sends_are_retried() {
  let h = harness();
  let order_id = place_order(&h).await;
  let notifier = Arc::new(FlakyNotifier::failing(2));

  assert!(worker(&h, notifier.clone()).execute(&Job::OrderCreatedNotification { order_id }).await);
  assert_eq!(notifier.attempts(), 3);
  assert_eq!(notifier.delivered.lock().len(), 1);
}

#[tokio::test]
async fn retries_stop_after_the_last_attempt() {
  let h = harness();
  let order_id = place_order(&h).await;
  let notifier = Arc::new(FlakyNotifier::failing(10));

  assert!(!worker(&h, notifier.clone()).execute(&Job::OrderCreatedNotification { order_id }).await);
  assert_eq!(notifier.attempts(), 3);
  assert!(!h.cache.contains(&keys::order_notified(order_id)));
}

#[tokio::test]
async fn duplicate_deliveries_send_one_notification() {
  let h = harness();
  let order_id = place_order(&h).await;
  let notifier = Arc::new(FlakyNotifier::default());
  let worker = worker(&h, notifier.clone());
  let job = Job::OrderCreatedNotification { order_id };

  assert!(worker.execute(&job).await);
  assert!(worker.execute(&job).await);
  assert_eq!(notifier.delivered.lock().len(), 1);
}

#[tokio::test]
async fn notification_for_a_deleted_order_is_a_no_op() {
  let h = harness();
  let notifier = Arc::new(FlakyNotifier::default());
  let job = Job::OrderCreatedNotification { order_id: Uuid::new_v4() };

  assert!(worker(&h, notifier.clone()).execute(&job).await);
  assert_eq!(notifier.attempts(), 0);
}

#[tokio::test]
async fn orders_report_is_stored_in_the_cache() {
  let h = harness();
  place_order(&h).await;
  let notifier = Arc::new(FlakyNotifier::default());

  assert!(worker(&h, notifier).execute(&Job::RefreshOrdersReport).await);

  let report: OrdersReport = cache::get_json(&*h.cache, keys::ORDERS_REPORT).await.unwrap();
  assert_eq!(report.order_count, 1);
  assert_eq!(report.revenue_total, dec("8.00"));
}

#[tokio::test]
async fn worker_drains_the_queue_in_the_background() {
  let mut h = harness();
  let order_id = place_order(&h).await;
  let (queue, receiver) = TaskQueue::channel();
  let notifier = Arc::new(LogNotifier::new("shop@example.com"));
  let worker = Arc::new(JobWorker::new(h.storage.clone(), h.cache.clone(), notifier));

  // Replay what order creation enqueued onto a queue the worker listens to.
  for job in h.jobs.drain() {
    queue.enqueue(job).await.unwrap();
  }
  drop(queue);
  worker.run(receiver).await;

  let marker = keys::order_notified(order_id);
  for _ in 0..50 {
    if h.cache.contains(&marker) && h.cache.contains(keys::ORDERS_REPORT) {
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert!(h.cache.contains(&marker));
  assert!(h.cache.contains(keys::ORDERS_REPORT));
  assert_eq!(h.storage.list_orders(None).await.unwrap().len(), 1);
}
