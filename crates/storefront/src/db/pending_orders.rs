//! Pending-order ledger.
//!
//! A record is written before a card payment intent is created and removed
//! once the order exists upstream. Records flagged `paid` whose order could
//! not be created are retried by the reconciler.
//!
//! Whoever is submitting a paid record (the checkout or the reconciler)
//! holds a claim on it until `claimed_until`. A claimed record is skipped by
//! everyone else; a failure releases the claim and an expired claim lapses.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::RepositoryError;
use crate::commerce::{CreateOrderRequest, MetaData};

/// Metadata key linking an order to its payment intent.
pub const PAYMENT_INTENT_META_KEY: &str = "_stripe_payment_intent_id";

/// How long a claim on a paid record lasts when not released.
pub const CLAIM_LEASE_SECS: i64 = 300;

/// End of a claim taken now.
#[must_use]
pub fn claim_deadline() -> DateTime<Utc> {
    Utc::now() + TimeDelta::seconds(CLAIM_LEASE_SECS)
}

/// An order awaiting creation on the commerce platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub reference: Uuid,
    pub order_request: CreateOrderRequest,
    pub payment_intent_id: Option<String>,
    pub paid: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub claimed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingOrder {
    /// New unpaid record for an order request.
    #[must_use]
    pub fn new(order_request: CreateOrderRequest) -> Self {
        let now = Utc::now();
        Self {
            reference: Uuid::new_v4(),
            order_request,
            payment_intent_id: None,
            paid: false,
            attempts: 0,
            last_error: None,
            claimed_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a claim is held at `now`.
    #[must_use]
    pub fn is_claimed(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.is_some_and(|until| until > now)
    }

    /// The order request to submit, carrying the payment intent id when known.
    #[must_use]
    pub fn finalized_request(&self) -> CreateOrderRequest {
        let mut request = self.order_request.clone();
        if let Some(intent_id) = &self.payment_intent_id
            && request.meta(PAYMENT_INTENT_META_KEY).is_none()
        {
            request.meta_data.push(MetaData {
                key: PAYMENT_INTENT_META_KEY.to_string(),
                value: intent_id.clone(),
            });
        }
        request
    }
}

/// Persistence for pending orders.
#[async_trait]
pub trait PendingOrderStore: Send + Sync {
    /// Store a new record.
    async fn insert(&self, order: &PendingOrder) -> Result<(), RepositoryError>;

    /// Fetch a record by reference.
    async fn get(&self, reference: Uuid) -> Result<Option<PendingOrder>, RepositoryError>;

    /// Fetch the record linked to a payment intent.
    async fn find_by_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<PendingOrder>, RepositoryError>;

    /// Link a payment intent to a record.
    async fn attach_payment_intent(
        &self,
        reference: Uuid,
        intent_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Flag a record as paid and claim it until `claim_until`.
    async fn mark_paid(
        &self,
        reference: Uuid,
        claim_until: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Claim an unclaimed paid record. Returns `false` if it is unpaid,
    /// missing, or someone else holds the claim.
    async fn claim(&self, reference: Uuid, until: DateTime<Utc>) -> Result<bool, RepositoryError>;

    /// Count a failed creation attempt and release the claim.
    async fn record_failure(&self, reference: Uuid, error: &str) -> Result<(), RepositoryError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, reference: Uuid) -> Result<bool, RepositoryError>;

    /// Remove a record unless it is paid. Returns whether it was removed.
    async fn delete_unpaid(&self, reference: Uuid) -> Result<bool, RepositoryError>;

    /// Remove unpaid records last touched before `cutoff`. Returns the count.
    async fn delete_unpaid_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;

    /// Records oldest first, optionally only paid ones.
    async fn list(&self, paid_only: bool, limit: i64) -> Result<Vec<PendingOrder>, RepositoryError>;
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(sqlx::FromRow)]
struct PendingOrderRow {
    reference: Uuid,
    order_request: Json<CreateOrderRequest>,
    payment_intent_id: Option<String>,
    paid: bool,
    attempts: i32,
    last_error: Option<String>,
    claimed_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PendingOrderRow> for PendingOrder {
    fn from(row: PendingOrderRow) -> Self {
        Self {
            reference: row.reference,
            order_request: row.order_request.0,
            payment_intent_id: row.payment_intent_id,
            paid: row.paid,
            attempts: row.attempts,
            last_error: row.last_error,
            claimed_until: row.claimed_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT reference, order_request, payment_intent_id, paid, attempts, \
     last_error, claimed_until, created_at, updated_at FROM storefront.pending_order";

/// `PostgreSQL`-backed store.
#[derive(Clone)]
pub struct PgPendingOrderStore {
    pool: PgPool,
}

impl PgPendingOrderStore {
    /// Create a store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn expect_updated(result: &sqlx::postgres::PgQueryResult) -> Result<(), RepositoryError> {
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(db_err.message().to_string());
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl PendingOrderStore for PgPendingOrderStore {
    async fn insert(&self, order: &PendingOrder) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.pending_order
                (reference, order_request, payment_intent_id, paid, attempts,
                 last_error, claimed_until, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(order.reference)
        .bind(Json(&order.order_request))
        .bind(order.payment_intent_id.as_deref())
        .bind(order.paid)
        .bind(order.attempts)
        .bind(order.last_error.as_deref())
        .bind(order.claimed_until)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn get(&self, reference: Uuid) -> Result<Option<PendingOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, PendingOrderRow>(&format!(
            "{SELECT_COLUMNS} WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PendingOrder::from))
    }

    async fn find_by_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<PendingOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, PendingOrderRow>(&format!(
            "{SELECT_COLUMNS} WHERE payment_intent_id = $1"
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PendingOrder::from))
    }

    async fn attach_payment_intent(
        &self,
        reference: Uuid,
        intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.pending_order
            SET payment_intent_id = $2, updated_at = NOW()
            WHERE reference = $1
            ",
        )
        .bind(reference)
        .bind(intent_id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;
        Self::expect_updated(&result)
    }

    async fn mark_paid(
        &self,
        reference: Uuid,
        claim_until: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.pending_order
            SET paid = TRUE, claimed_until = $2, updated_at = NOW()
            WHERE reference = $1
            ",
        )
        .bind(reference)
        .bind(claim_until)
        .execute(&self.pool)
        .await?;
        Self::expect_updated(&result)
    }

    async fn claim(&self, reference: Uuid, until: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.pending_order
            SET claimed_until = $2, updated_at = NOW()
            WHERE reference = $1
              AND paid
              AND (claimed_until IS NULL OR claimed_until <= NOW())
            ",
        )
        .bind(reference)
        .bind(until)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_failure(&self, reference: Uuid, error: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.pending_order
            SET attempts = attempts + 1, last_error = $2, claimed_until = NULL,
                updated_at = NOW()
            WHERE reference = $1
            ",
        )
        .bind(reference)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Self::expect_updated(&result)
    }

    async fn delete(&self, reference: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.pending_order WHERE reference = $1")
            .bind(reference)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_unpaid(&self, reference: Uuid) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM storefront.pending_order WHERE reference = $1 AND NOT paid")
                .bind(reference)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_unpaid_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM storefront.pending_order WHERE NOT paid AND updated_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list(&self, paid_only: bool, limit: i64) -> Result<Vec<PendingOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, PendingOrderRow>(&format!(
            "{SELECT_COLUMNS} WHERE ($1 = FALSE OR paid) ORDER BY created_at ASC LIMIT $2"
        ))
        .bind(paid_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PendingOrder::from).collect())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local store used when no database is configured.
///
/// Records do not survive a restart.
#[derive(Default)]
pub struct MemoryPendingOrderStore {
    orders: Mutex<HashMap<Uuid, PendingOrder>>,
}

impl MemoryPendingOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, reference: Uuid, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut PendingOrder) + Send,
    {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&reference).ok_or(RepositoryError::NotFound)?;
        apply(order);
        order.updated_at = Utc::now();
        drop(orders);
        Ok(())
    }
}

#[async_trait]
impl PendingOrderStore for MemoryPendingOrderStore {
    async fn insert(&self, order: &PendingOrder) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        if orders.contains_key(&order.reference) {
            return Err(RepositoryError::Conflict(format!(
                "pending order {} already exists",
                order.reference
            )));
        }
        orders.insert(order.reference, order.clone());
        drop(orders);
        Ok(())
    }

    async fn get(&self, reference: Uuid) -> Result<Option<PendingOrder>, RepositoryError> {
        Ok(self.orders.lock().await.get(&reference).cloned())
    }

    async fn find_by_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<PendingOrder>, RepositoryError> {
        Ok(self
            .orders
            .lock()
            .await
            .values()
            .find(|o| o.payment_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn attach_payment_intent(
        &self,
        reference: Uuid,
        intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let intent_id = intent_id.to_string();
        self.update(reference, move |o| o.payment_intent_id = Some(intent_id))
            .await
    }

    async fn mark_paid(
        &self,
        reference: Uuid,
        claim_until: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.update(reference, move |o| {
            o.paid = true;
            o.claimed_until = Some(claim_until);
        })
        .await
    }

    async fn claim(&self, reference: Uuid, until: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let mut orders = self.orders.lock().await;
        let Some(order) = orders.get_mut(&reference) else {
            return Ok(false);
        };
        if !order.paid || order.is_claimed(now) {
            return Ok(false);
        }
        order.claimed_until = Some(until);
        order.updated_at = now;
        drop(orders);
        Ok(true)
    }

    async fn record_failure(&self, reference: Uuid, error: &str) -> Result<(), RepositoryError> {
        let error = error.to_string();
        self.update(reference, move |o| {
            o.attempts += 1;
            o.last_error = Some(error);
            o.claimed_until = None;
        })
        .await
    }

    async fn delete(&self, reference: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.orders.lock().await.remove(&reference).is_some())
    }

    async fn delete_unpaid(&self, reference: Uuid) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.lock().await;
        if orders.get(&reference).is_some_and(|o| !o.paid) {
            orders.remove(&reference);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_unpaid_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut orders = self.orders.lock().await;
        let before = orders.len();
        orders.retain(|_, o| o.paid || o.updated_at >= cutoff);
        let removed = before - orders.len();
        drop(orders);
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn list(&self, paid_only: bool, limit: i64) -> Result<Vec<PendingOrder>, RepositoryError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let mut orders: Vec<PendingOrder> = self
            .orders
            .lock()
            .await
            .values()
            .filter(|o| !paid_only || o.paid)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders.truncate(limit);
        Ok(orders)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commerce::{BillingAddress, OrderLineItem, ShippingAddress};
    use threadline_core::ProductId;

    fn sample_request() -> CreateOrderRequest {
        CreateOrderRequest {
            payment_method: "stripe".to_string(),
            payment_method_title: "Credit/Debit Card (Stripe)".to_string(),
            set_paid: true,
            billing: BillingAddress::default(),
            shipping: ShippingAddress::default(),
            line_items: vec![OrderLineItem {
                product_id: ProductId::new(1),
                quantity: 2,
            }],
            customer_note: None,
            meta_data: Vec::new(),
        }
    }

    #[test]
    fn test_finalized_request_adds_intent_meta_once() {
        let mut order = PendingOrder::new(sample_request());
        assert!(order.finalized_request().meta(PAYMENT_INTENT_META_KEY).is_none());

        order.payment_intent_id = Some("pi_123".to_string());
        let request = order.finalized_request();
        assert_eq!(request.meta(PAYMENT_INTENT_META_KEY), Some("pi_123"));

        order.order_request = request;
        assert_eq!(order.finalized_request().meta_data.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryPendingOrderStore::new();
        let order = PendingOrder::new(sample_request());
        let reference = order.reference;

        store.insert(&order).await.unwrap();
        assert!(matches!(
            store.insert(&order).await,
            Err(RepositoryError::Conflict(_))
        ));

        store.attach_payment_intent(reference, "pi_abc").await.unwrap();
        let found = store.find_by_payment_intent("pi_abc").await.unwrap().unwrap();
        assert_eq!(found.reference, reference);

        assert!(store.list(true, 10).await.unwrap().is_empty());
        store.mark_paid(reference, claim_deadline()).await.unwrap();
        store.record_failure(reference, "upstream 500").await.unwrap();

        let paid = store.list(true, 10).await.unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].attempts, 1);
        assert_eq!(paid[0].last_error.as_deref(), Some("upstream 500"));

        assert!(store.delete(reference).await.unwrap());
        assert!(!store.delete(reference).await.unwrap());
        assert!(store.get(reference).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_missing_record() {
        let store = MemoryPendingOrderStore::new();
        assert!(matches!(
            store.mark_paid(Uuid::new_v4(), claim_deadline()).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_claim_excludes_other_submitters_until_released() {
        let store = MemoryPendingOrderStore::new();
        let order = PendingOrder::new(sample_request());
        let reference = order.reference;
        store.insert(&order).await.unwrap();

        // Unpaid records are never claimed.
        assert!(!store.claim(reference, claim_deadline()).await.unwrap());

        store.mark_paid(reference, claim_deadline()).await.unwrap();
        assert!(!store.claim(reference, claim_deadline()).await.unwrap());

        store.record_failure(reference, "timeout").await.unwrap();
        let released = store.get(reference).await.unwrap().unwrap();
        assert!(released.claimed_until.is_none());

        assert!(store.claim(reference, claim_deadline()).await.unwrap());
        assert!(!store.claim(reference, claim_deadline()).await.unwrap());
        assert!(!store.claim(Uuid::new_v4(), claim_deadline()).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_claim_can_be_taken() {
        let store = MemoryPendingOrderStore::new();
        let order = PendingOrder::new(sample_request());
        store.insert(&order).await.unwrap();
        store
            .mark_paid(order.reference, Utc::now() - TimeDelta::seconds(1))
            .await
            .unwrap();

        assert!(store.claim(order.reference, claim_deadline()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unpaid_deletes_leave_paid_records() {
        let store = MemoryPendingOrderStore::new();
        let unpaid = PendingOrder::new(sample_request());
        let mut stale = PendingOrder::new(sample_request());
        stale.updated_at = Utc::now() - TimeDelta::days(2);
        let mut paid = PendingOrder::new(sample_request());
        paid.paid = true;
        paid.updated_at = Utc::now() - TimeDelta::days(2);
        for order in [&unpaid, &stale, &paid] {
            store.insert(order).await.unwrap();
        }

        assert!(!store.delete_unpaid(paid.reference).await.unwrap());
        let removed = store
            .delete_unpaid_before(Utc::now() - TimeDelta::days(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(stale.reference).await.unwrap().is_none());
        assert!(store.get(paid.reference).await.unwrap().is_some());

        assert!(store.delete_unpaid(unpaid.reference).await.unwrap());
        assert!(store.get(unpaid.reference).await.unwrap().is_none());
    }
}
