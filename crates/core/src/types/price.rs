//! Type-safe price representation using decimal arithmetic.
//!
//! Upstream commerce APIs send prices as strings; they are parsed once into
//! [`Decimal`] at the data-access boundary and never touch floating point
//! afterwards.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paisa).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Amount in the currency's minor unit.
    #[must_use]
    pub fn minor_units(&self) -> i64 {
        self.currency_code.to_minor_units(self.amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_price(self.amount, self.currency_code))
    }
}

/// ISO 4217 currency codes the store can be configured with.
///
/// The store runs in a single currency at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    PKR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::PKR => "Rs ",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Lowercase code as payment processors expect it (`"pkr"`).
    #[must_use]
    pub const fn processor_code(&self) -> &'static str {
        match self {
            Self::PKR => "pkr",
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
        }
    }

    /// Convert an amount to minor units (x100, rounded).
    ///
    /// Every supported currency has two decimal places. Amounts that do not
    /// fit in an `i64` saturate.
    #[must_use]
    pub fn to_minor_units(&self, amount: Decimal) -> i64 {
        let minor = (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        minor.to_i64().unwrap_or(if minor.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PKR" => Ok(Self::PKR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// Whole-number discount percentage between a list price and a sale price.
///
/// Rounds half away from zero. A sale price above the list price yields a
/// negative percentage; a zero list price yields `0`.
#[must_use]
pub fn discount_percentage(price: Decimal, sale_price: Decimal) -> i64 {
    if price.is_zero() {
        return 0;
    }
    ((price - sale_price) / price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Whether a product should be shown as discounted.
#[must_use]
pub fn has_discount(price: Decimal, sale_price: Option<Decimal>) -> bool {
    sale_price.is_some_and(|sale| sale < price)
}

/// Format an amount for display, e.g. `Rs 1,234.00`.
#[must_use]
pub fn format_price(amount: Decimal, currency: CurrencyCode) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!(
        "{}{}{grouped}.{fraction}",
        if negative { "-" } else { "" },
        currency.symbol()
    )
}
