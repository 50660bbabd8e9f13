//! Status enums for commerce entities.

use serde::{Deserialize, Serialize};

/// Product stock status.
///
/// Unknown upstream values deserialize to [`StockStatus::OutOfStock`] so a
/// product is never offered for sale on the strength of an unrecognized
/// flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    #[default]
    InStock,
    OnBackorder,
    #[serde(other)]
    OutOfStock,
}

impl StockStatus {
    /// Parse an upstream stock status string.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "instock" => Self::InStock,
            "onbackorder" => Self::OnBackorder,
            _ => Self::OutOfStock,
        }
    }

    /// Whether the item can currently be added to a cart.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        matches!(self, Self::InStock | Self::OnBackorder)
    }
}

/// Order status as tracked by the commerce platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    Trash,
}

impl OrderStatus {
    /// Wire name (`"on-hold"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::OnHold => "on-hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
            Self::Trash => "trash",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "on-hold" => Ok(Self::OnHold),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            "failed" => Ok(Self::Failed),
            "trash" => Ok(Self::Trash),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_status_unknown_is_out_of_stock() {
        assert_eq!(StockStatus::from_wire("instock"), StockStatus::InStock);
        assert_eq!(StockStatus::from_wire("discontinued"), StockStatus::OutOfStock);
        let parsed: StockStatus = serde_json::from_str("\"preorder\"").unwrap();
        assert_eq!(parsed, StockStatus::OutOfStock);
    }

    #[test]
    fn test_stock_status_serde_wire_names() {
        for (wire, status) in [
            ("\"instock\"", StockStatus::InStock),
            ("\"onbackorder\"", StockStatus::OnBackorder),
            ("\"outofstock\"", StockStatus::OutOfStock),
            ("\"discontinued\"", StockStatus::OutOfStock),
        ] {
            assert_eq!(serde_json::from_str::<StockStatus>(wire).unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&StockStatus::OnBackorder).unwrap(),
            "\"onbackorder\""
        );
    }

    #[test]
    fn test_order_status_round_trips_wire_name() {
        let status: OrderStatus = "on-hold".parse().unwrap();
        assert_eq!(status, OrderStatus::OnHold);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"on-hold\"");
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
