//! Inspect and prune the pending-order ledger.

use threadline_storefront::db::{PendingOrder, PendingOrderStore, PgPendingOrderStore};
use uuid::Uuid;

use super::{CliError, connect};

fn describe(order: &PendingOrder) -> String {
    format!(
        "{}  paid={}  attempts={}  intent={}  lines={}  email={}  updated={}  claimed_until={}  last_error={}",
        order.reference,
        order.paid,
        order.attempts,
        order.payment_intent_id.as_deref().unwrap_or("-"),
        order.order_request.line_items.len(),
        order.order_request.billing.email,
        order.updated_at.to_rfc3339(),
        order
            .claimed_until
            .map_or_else(|| "-".to_string(), |until| until.to_rfc3339()),
        order.last_error.as_deref().unwrap_or("-"),
    )
}

/// Print pending orders, oldest first.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the ledger cannot be
/// read.
pub async fn list(paid_only: bool, limit: i64) -> Result<(), CliError> {
    let store = PgPendingOrderStore::new(connect().await?);
    let orders = store.list(paid_only, limit).await?;

    #[allow(clippy::print_stdout)]
    {
        if orders.is_empty() {
            println!("No pending orders");
        }
        for order in &orders {
            println!("{}", describe(order));
        }
    }
    Ok(())
}

/// Delete one pending order.
///
/// # Errors
///
/// Returns `NotFound` if no record has this reference, or a database error.
pub async fn delete(reference: Uuid) -> Result<(), CliError> {
    let store = PgPendingOrderStore::new(connect().await?);
    if !store.delete(reference).await? {
        return Err(CliError::NotFound(reference));
    }
    tracing::info!(%reference, "Pending order deleted");
    Ok(())
}
