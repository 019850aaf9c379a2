//! Line-level sales and order-level vouchers.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use satchel_core::{Money, MoneyError, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// How much a discount takes off.
///
/// Deserialization rejects percentages outside `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "value",
    rename_all = "snake_case",
    try_from = "DiscountValueRecord"
)]
pub enum DiscountValue {
    /// Percentage of the price, `0..=100`.
    Percentage(Decimal),
    /// Fixed amount off.
    Fixed(Money),
}

impl DiscountValue {
    /// A percentage discount.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPercentage`] outside `0..=100`.
    pub fn percentage(pct: Decimal) -> std::result::Result<Self, ValidationError> {
        check_percentage(pct)?;
        Ok(Self::Percentage(pct))
    }

    /// Apply to `price`, never going below zero.
    ///
    /// # Errors
    ///
    /// - `Validation(InvalidPercentage)` for a percentage outside `0..=100`
    /// - `CurrencyMismatch` for a fixed amount in another currency
    pub fn apply(&self, price: Money) -> Result<Money> {
        let discounted = match self {
            Self::Percentage(pct) => {
                check_percentage(*pct)?;
                let off = price
                    .amount()
                    .checked_mul(*pct)
                    .ok_or(MoneyError::Overflow)?
                    / Decimal::ONE_HUNDRED;
                price.checked_sub(Money::new(off, price.currency()))?
            }
            Self::Fixed(amount) => price.checked_sub(*amount)?,
        };
        Ok(discounted.floor_at_zero())
    }
}

fn check_percentage(pct: Decimal) -> std::result::Result<(), ValidationError> {
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(ValidationError::InvalidPercentage(pct));
    }
    Ok(())
}

/// Wire form of [`DiscountValue`], checked on the way in.
#[derive(Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum DiscountValueRecord {
    Percentage(Decimal),
    Fixed(Money),
}

impl TryFrom<DiscountValueRecord> for DiscountValue {
    type Error = ValidationError;

    fn try_from(record: DiscountValueRecord) -> std::result::Result<Self, Self::Error> {
        match record {
            DiscountValueRecord::Percentage(pct) => Self::percentage(pct),
            DiscountValueRecord::Fixed(amount) => Ok(Self::Fixed(amount)),
        }
    }
}

/// Which variants a sale covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "variants", rename_all = "snake_case")]
pub enum DiscountScope {
    AllVariants,
    Variants(BTreeSet<VariantId>),
}

/// An active sale that lowers the unit price of eligible lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    /// Display name, e.g. "Summer sale".
    pub name: String,
    pub value: DiscountValue,
    pub scope: DiscountScope,
}

impl Discount {
    /// Whether lines of `variant` are eligible.
    #[must_use]
    pub fn applies_to(&self, variant: VariantId) -> bool {
        match &self.scope {
            DiscountScope::AllVariants => true,
            DiscountScope::Variants(ids) => ids.contains(&variant),
        }
    }
}

/// An order-level discount granted by a voucher code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherDiscount {
    /// Code as entered by the shopper.
    pub code: String,
    /// Display name shown next to the discount line.
    pub name: Option<String>,
    /// Amount taken off the checkout total.
    pub amount: Money,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use satchel_core::CurrencyCode;

    use super::*;
    use crate::error::CheckoutError;

    fn inr(minor: i64) -> Money {
        Money::from_minor(minor, CurrencyCode::INR)
    }

    #[test]
    fn test_percentage_discount() {
        let value = DiscountValue::Percentage(Decimal::from(25));
        assert_eq!(value.apply(inr(1000)).unwrap(), inr(750));
    }

    #[test]
    fn test_discounts_floor_at_zero() {
        let fixed = DiscountValue::Fixed(inr(5000));
        assert_eq!(fixed.apply(inr(1000)).unwrap(), inr(0));

        let pct = DiscountValue::Percentage(Decimal::ONE_HUNDRED);
        assert_eq!(pct.apply(inr(1000)).unwrap(), inr(0));
    }

    #[test]
    fn test_out_of_range_percentage_is_rejected() {
        assert!(DiscountValue::percentage(Decimal::from(150)).is_err());
        assert!(DiscountValue::percentage(Decimal::NEGATIVE_ONE).is_err());
        assert!(DiscountValue::percentage(Decimal::ZERO).is_ok());

        assert!(matches!(
            DiscountValue::Percentage(Decimal::MAX).apply(inr(1000)),
            Err(CheckoutError::Validation(ValidationError::InvalidPercentage(_)))
        ));
    }

    #[test]
    fn test_out_of_range_percentage_fails_to_deserialize() {
        let result: serde_json::Result<DiscountValue> =
            serde_json::from_str(r#"{"type": "percentage", "value": "120"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_fixed_discount_in_foreign_currency_fails() {
        let fixed = DiscountValue::Fixed(Money::from_minor(100, CurrencyCode::USD));
        assert!(matches!(
            fixed.apply(inr(1000)),
            Err(CheckoutError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_scope() {
        let sale = Discount {
            name: "Sale".to_string(),
            value: DiscountValue::Percentage(Decimal::TEN),
            scope: DiscountScope::Variants([VariantId::new(1)].into_iter().collect()),
        };
        assert!(sale.applies_to(VariantId::new(1)));
        assert!(!sale.applies_to(VariantId::new(2)));
    }

    #[test]
    fn test_deserialize_adjacently_tagged() {
        let discount: Discount = serde_json::from_str(
            r#"{"name": "Spring", "value": {"type": "percentage", "value": "10"},
                "scope": {"type": "all_variants"}}"#,
        )
        .unwrap();
        assert_eq!(discount.value, DiscountValue::Percentage(Decimal::TEN));
        assert_eq!(discount.scope, DiscountScope::AllVariants);
    }
}
