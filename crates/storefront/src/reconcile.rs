//! Pending-order reconciliation.
//!
//! Paid orders whose creation upstream failed during checkout stay in the
//! pending-order ledger. The `Reconciler` retries them on an interval and
//! removes each record once the order exists. Records claimed by a checkout
//! that is still retrying are left alone.
//!
//! Each sweep also drops unpaid records nobody has touched for
//! [`DEFAULT_UNPAID_RETENTION_HOURS`]: abandoned card checkouts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::commerce::OrderBackend;
use crate::db::{PendingOrderStore, RepositoryError, claim_deadline};

/// Records examined per sweep.
const DEFAULT_BATCH_SIZE: i64 = 50;

/// Attempts after which a record is escalated on every failure.
const ESCALATE_AFTER_ATTEMPTS: i32 = 5;

/// Age after which an untouched unpaid record is dropped.
pub const DEFAULT_UNPAID_RETENTION_HOURS: i64 = 24;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub attempted: usize,
    pub created: usize,
    pub failed: usize,
    /// Paid records claimed by someone else.
    pub skipped: usize,
    /// Abandoned unpaid records removed.
    pub expired: u64,
}

/// Retries order creation for paid pending orders.
#[derive(Clone)]
pub struct Reconciler {
    orders: Arc<dyn OrderBackend>,
    pending: Arc<dyn PendingOrderStore>,
    batch_size: i64,
    unpaid_retention: TimeDelta,
}

impl Reconciler {
    /// Create a reconciler over an order backend and pending-order store.
    #[must_use]
    pub fn new(orders: Arc<dyn OrderBackend>, pending: Arc<dyn PendingOrderStore>) -> Self {
        Self {
            orders,
            pending,
            batch_size: DEFAULT_BATCH_SIZE,
            unpaid_retention: TimeDelta::hours(DEFAULT_UNPAID_RETENTION_HOURS),
        }
    }

    /// Set how many records one sweep examines.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set how long unpaid records are kept after their last update.
    #[must_use]
    pub const fn with_unpaid_retention(mut self, retention: TimeDelta) -> Self {
        self.unpaid_retention = retention;
        self
    }

    /// Run a single sweep over paid pending orders, then drop abandoned
    /// unpaid ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the ledger cannot be read. Failures on
    /// individual records are recorded on the record and counted instead.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<ReconcileSummary, RepositoryError> {
        let paid = self.pending.list(true, self.batch_size).await?;
        let mut summary = ReconcileSummary::default();

        for record in paid {
            if !self.pending.claim(record.reference, claim_deadline()).await? {
                debug!(reference = %record.reference, "Pending order claimed elsewhere");
                summary.skipped += 1;
                continue;
            }
            summary.attempted += 1;
            let request = record.finalized_request();

            match self.orders.create_order(&request).await {
                Ok(order) => {
                    summary.created += 1;
                    info!(
                        reference = %record.reference,
                        order_id = %order.id,
                        order_number = %order.number,
                        "Reconciled pending order"
                    );
                    if let Err(e) = self.pending.delete(record.reference).await {
                        // A leftover record would be retried into a duplicate order.
                        error!(
                            reference = %record.reference,
                            error = %e,
                            "Failed to delete reconciled pending order"
                        );
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    let attempts = record.attempts + 1;
                    if attempts >= ESCALATE_AFTER_ATTEMPTS {
                        error!(
                            reference = %record.reference,
                            attempts,
                            error = %e,
                            "Pending order still failing"
                        );
                    } else {
                        warn!(
                            reference = %record.reference,
                            attempts,
                            error = %e,
                            "Pending order retry failed"
                        );
                    }
                    if let Err(e) = self
                        .pending
                        .record_failure(record.reference, &e.to_string())
                        .await
                    {
                        warn!(reference = %record.reference, error = %e, "Failed to record failure");
                    }
                }
            }
        }

        let cutoff = Utc::now() - self.unpaid_retention;
        match self.pending.delete_unpaid_before(cutoff).await {
            Ok(0) => {}
            Ok(expired) => {
                info!(expired, "Dropped abandoned unpaid pending orders");
                summary.expired = expired;
            }
            Err(e) => warn!(error = %e, "Failed to drop abandoned pending orders"),
        }

        Ok(summary)
    }

    /// Spawn the reconciler as a background task running every `interval`.
    ///
    /// Returns a handle that can be used to abort the task.
    #[must_use]
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                match self.run_once().await {
                    Ok(summary) if summary.attempted > 0 || summary.skipped > 0 => {
                        info!(
                            attempted = summary.attempted,
                            created = summary.created,
                            failed = summary.failed,
                            skipped = summary.skipped,
                            "Reconciliation sweep finished"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        })
    }
}

/// Spawn a background reconciler.
#[must_use]
pub fn spawn_reconciler(
    orders: Arc<dyn OrderBackend>,
    pending: Arc<dyn PendingOrderStore>,
    interval: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Starting pending-order reconciler");
    Reconciler::new(orders, pending).spawn(interval)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use threadline_core::{OrderId, ProductId};

    use super::*;
    use crate::commerce::{
        BillingAddress, CommerceError, CreateOrderRequest, OrderLineItem, OrderSummary,
        ShippingAddress,
    };
    use crate::db::{MemoryPendingOrderStore, PendingOrder};

    /// Order backend that fails a fixed number of times, then succeeds.
    pub(crate) struct FlakyOrders {
        pub(crate) failures_left: AtomicUsize,
        pub(crate) calls: AtomicUsize,
        pub(crate) requests: tokio::sync::Mutex<Vec<CreateOrderRequest>>,
    }

    impl FlakyOrders {
        pub(crate) fn new(failures: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
                requests: tokio::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OrderBackend for FlakyOrders {
        async fn create_order(
            &self,
            request: &CreateOrderRequest,
        ) -> Result<OrderSummary, CommerceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().await.push(request.clone());
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CommerceError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            let id = i64::try_from(call).unwrap_or(0) + 100;
            Ok(OrderSummary {
                id: OrderId::new(id),
                number: id.to_string(),
                status: "processing".to_string(),
                total: "0.00".to_string(),
            })
        }
    }

    pub(crate) fn order_request() -> CreateOrderRequest {
        CreateOrderRequest {
            payment_method: "stripe".to_string(),
            payment_method_title: "Credit/Debit Card (Stripe)".to_string(),
            set_paid: true,
            billing: BillingAddress::default(),
            shipping: ShippingAddress::default(),
            line_items: vec![OrderLineItem {
                product_id: ProductId::new(3),
                quantity: 1,
            }],
            customer_note: None,
            meta_data: Vec::new(),
        }
    }

    async fn paid_record(store: &MemoryPendingOrderStore, intent: &str) -> PendingOrder {
        let mut record = PendingOrder::new(order_request());
        record.payment_intent_id = Some(intent.to_string());
        record.paid = true;
        store.insert(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_run_once_creates_and_deletes_paid_records() {
        let store = Arc::new(MemoryPendingOrderStore::new());
        let orders = Arc::new(FlakyOrders::new(0));
        let record = paid_record(&store, "pi_1").await;
        let unpaid = PendingOrder::new(order_request());
        store.insert(&unpaid).await.unwrap();

        let reconciler = Reconciler::new(orders.clone(), store.clone());
        let summary = reconciler.run_once().await.unwrap();

        assert_eq!(
            summary,
            ReconcileSummary {
                attempted: 1,
                created: 1,
                failed: 0,
                skipped: 0,
                expired: 0,
            }
        );
        assert!(store.get(record.reference).await.unwrap().is_none());
        assert!(store.get(unpaid.reference).await.unwrap().is_some());

        let sent = orders.requests.lock().await;
        assert_eq!(sent[0].meta("_stripe_payment_intent_id"), Some("pi_1"));
    }

    #[tokio::test]
    async fn test_run_once_records_failure_and_retries_later() {
        let store = Arc::new(MemoryPendingOrderStore::new());
        let orders = Arc::new(FlakyOrders::new(1));
        let record = paid_record(&store, "pi_2").await;
        let reconciler = Reconciler::new(orders, store.clone());

        let first = reconciler.run_once().await.unwrap();
        assert_eq!(first.failed, 1);
        let kept = store.get(record.reference).await.unwrap().unwrap();
        assert_eq!(kept.attempts, 1);
        assert!(kept.last_error.is_some());

        let second = reconciler.run_once().await.unwrap();
        assert_eq!(second.created, 1);
        assert!(store.get(record.reference).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_once_skips_claimed_records() {
        let store = Arc::new(MemoryPendingOrderStore::new());
        let orders = Arc::new(FlakyOrders::new(0));
        let mut record = PendingOrder::new(order_request());
        record.paid = true;
        record.claimed_until = Some(claim_deadline());
        store.insert(&record).await.unwrap();

        let reconciler = Reconciler::new(orders.clone(), store.clone());
        let summary = reconciler.run_once().await.unwrap();

        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(orders.calls.load(Ordering::SeqCst), 0);
        assert!(store.get(record.reference).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_run_once_drops_abandoned_unpaid_records() {
        let store = Arc::new(MemoryPendingOrderStore::new());
        let orders = Arc::new(FlakyOrders::new(0));
        let mut abandoned = PendingOrder::new(order_request());
        abandoned.updated_at = Utc::now() - TimeDelta::hours(DEFAULT_UNPAID_RETENTION_HOURS + 1);
        let recent = PendingOrder::new(order_request());
        store.insert(&abandoned).await.unwrap();
        store.insert(&recent).await.unwrap();

        let summary = Reconciler::new(orders, store.clone()).run_once().await.unwrap();

        assert_eq!(summary.expired, 1);
        assert!(store.get(abandoned.reference).await.unwrap().is_none());
        assert!(store.get(recent.reference).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_spawn_and_abort() {
        let store = Arc::new(MemoryPendingOrderStore::new());
        let orders = Arc::new(FlakyOrders::new(0));
        let record = paid_record(&store, "pi_3").await;

        let handle = spawn_reconciler(orders, store.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok());
        assert!(store.get(record.reference).await.unwrap().is_none());
    }
}
