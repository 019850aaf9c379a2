//! Error types for the checkout engine.
//!
//! Every operation returns [`Result<T>`]. Nothing here is retried or
//! recovered locally: the caller decides how to present a failure. The one
//! deliberate exception is a negative payable total, which the totalizer
//! floors at zero instead of reporting.

use core::fmt;

use rust_decimal::Decimal;
use satchel_core::{CurrencyCode, MoneyError, Permission, ShippingMethodId};
use thiserror::Error;

/// Input that violates a checkout invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Line quantities must be positive.
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(u32),

    /// Delivery time slots are limited in length.
    #[error("time slot must be at most {max} characters, got {len}")]
    TimeSlotTooLong {
        /// Length of the rejected slot, in characters.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// The voucher code is unknown or its conditions are not met.
    #[error("voucher {0:?} is not applicable to this checkout")]
    VoucherNotApplicable(String),

    /// The shipping method cannot be used for this checkout's destination,
    /// weight or value.
    #[error("shipping method {0} is not applicable to this checkout")]
    ShippingMethodNotApplicable(ShippingMethodId),

    /// The gift card is deactivated or outside its validity window.
    #[error("gift card {0:?} is inactive or expired")]
    GiftCardInactive(String),

    /// A monetary amount failed validation.
    #[error("invalid amount: {0}")]
    InvalidAmount(MoneyError),

    /// Percentage discounts must lie in `0..=100`.
    #[error("discount percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(Decimal),

    /// The combined weight of the lines does not fit.
    #[error("total weight is too large")]
    WeightOverflow,
}

/// Kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Checkout,
    Line,
    Variant,
    ShippingMethod,
    GiftCard,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkout => write!(f, "checkout"),
            Self::Line => write!(f, "checkout line"),
            Self::Variant => write!(f, "product variant"),
            Self::ShippingMethod => write!(f, "shipping method"),
            Self::GiftCard => write!(f, "gift card"),
        }
    }
}

/// Failure reported by a persistence collaborator.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The store could not be reached or is in a broken state.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be turned back into a domain value.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Failure reported by the tax collaborator.
#[derive(Debug, Clone, Error)]
#[error("tax calculation failed: {0}")]
pub struct TaxError(pub String);

/// Unified error type for checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Input violated an invariant.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Operands of one monetary computation carry different currencies.
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency the computation is carried out in.
        expected: CurrencyCode,
        /// Currency of the offending operand.
        found: CurrencyCode,
    },

    /// A referenced checkout, line, variant, shipping method or gift card
    /// does not exist.
    #[error("Not found: {entity} {id}")]
    NotFound {
        /// What was looked up.
        entity: Entity,
        /// The identifier that was looked up.
        id: String,
    },

    /// The actor lacks a permission the operation requires.
    #[error("Permission denied: requires {0}")]
    PermissionDenied(Permission),

    /// Persistence collaborator failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Tax collaborator failed.
    #[error("Tax error: {0}")]
    Tax(#[from] TaxError),
}

impl CheckoutError {
    /// Shorthand for a [`CheckoutError::NotFound`].
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<MoneyError> for CheckoutError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::CurrencyMismatch { expected, found } => {
                Self::CurrencyMismatch { expected, found }
            }
            other => Self::Validation(ValidationError::InvalidAmount(other)),
        }
    }
}

/// Result type alias for `CheckoutError`.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CheckoutError::not_found(Entity::Variant, 12);
        assert_eq!(err.to_string(), "Not found: product variant 12");

        let err = CheckoutError::from(ValidationError::InvalidQuantity(0));
        assert_eq!(
            err.to_string(),
            "Validation error: quantity must be a positive integer, got 0"
        );

        let err = CheckoutError::PermissionDenied(Permission::ManageOrders);
        assert_eq!(err.to_string(), "Permission denied: requires manage_orders");
    }

    #[test]
    fn test_money_error_conversion() {
        let err = CheckoutError::from(MoneyError::CurrencyMismatch {
            expected: CurrencyCode::INR,
            found: CurrencyCode::USD,
        });
        assert!(matches!(
            err,
            CheckoutError::CurrencyMismatch {
                expected: CurrencyCode::INR,
                found: CurrencyCode::USD,
            }
        ));

        let err = CheckoutError::from(MoneyError::TooManyDigits(rust_decimal::Decimal::MAX));
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::InvalidAmount(_))
        ));
    }
}
