//! One-shot pending-order reconciliation.
//!
//! Runs the same sweep the storefront's background task runs, using the
//! commerce credentials from the storefront environment.

use std::sync::Arc;

use threadline_storefront::commerce::{CommerceClient, OrderBackend};
use threadline_storefront::config::StorefrontConfig;
use threadline_storefront::db::{PendingOrderStore, PgPendingOrderStore};
use threadline_storefront::reconcile::Reconciler;

use super::{CliError, connect};

/// Retry order creation for every unclaimed paid pending order (up to
/// `limit`) and drop abandoned unpaid ones.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the database is
/// unreachable, or the ledger cannot be read.
pub async fn run(limit: i64) -> Result<(), CliError> {
    let config = StorefrontConfig::from_env()?;
    let pool = connect().await?;

    let orders: Arc<dyn OrderBackend> = Arc::new(CommerceClient::new(&config.commerce));
    let pending: Arc<dyn PendingOrderStore> = Arc::new(PgPendingOrderStore::new(pool));

    let summary = Reconciler::new(orders, pending)
        .with_batch_size(limit)
        .run_once()
        .await?;

    tracing::info!(
        attempted = summary.attempted,
        created = summary.created,
        failed = summary.failed,
        skipped = summary.skipped,
        expired = summary.expired,
        "Reconciliation complete"
    );
    Ok(())
}
