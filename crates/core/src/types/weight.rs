//! Shipping weight.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A physical weight in kilograms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weight(Decimal);

impl Weight {
    /// Weightless; used for digital goods.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a weight from kilograms.
    #[must_use]
    pub const fn from_kg(kg: Decimal) -> Self {
        Self(kg)
    }

    /// Create a weight from grams.
    #[must_use]
    pub fn from_grams(grams: u32) -> Self {
        Self(Decimal::from(grams) / Decimal::ONE_THOUSAND)
    }

    /// The weight in kilograms.
    #[must_use]
    pub const fn kg(&self) -> Decimal {
        self.0
    }

    /// Weight of `quantity` identical items, `None` on overflow.
    #[must_use]
    pub fn checked_times(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// Combined weight, `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kg", self.0.normalize())
    }
}
