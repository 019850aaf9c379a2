//! Gift cards: stored-value credit redeemable against a checkout total.
//!
//! Gift cards are shared records. A checkout only references them by
//! [`GiftCardId`]; balances are read through the gift card repository when
//! the total is computed.

use chrono::NaiveDate;
use satchel_core::{GiftCardId, Money, MoneyError};
use serde::{Deserialize, Serialize};

/// A gift card with its balances.
///
/// ## Invariants
///
/// - Both balances share one currency and are non-negative
/// - `current_balance <= initial_balance`
/// - Both fit twelve digits with two decimal places
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GiftCardRecord", into = "GiftCardRecord")]
pub struct GiftCard {
    id: GiftCardId,
    code: String,
    initial_balance: Money,
    current_balance: Money,
    is_active: bool,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

/// Errors constructing a [`GiftCard`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GiftCardError {
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("current balance {current} exceeds initial balance {initial}")]
    BalanceAboveInitial { current: Money, initial: Money },
    #[error("gift card code cannot be empty")]
    EmptyCode,
}

impl GiftCard {
    /// Create an active gift card with no validity window.
    ///
    /// # Errors
    ///
    /// Returns [`GiftCardError`] if any invariant is violated.
    pub fn new(
        id: GiftCardId,
        code: impl Into<String>,
        initial_balance: Money,
        current_balance: Money,
    ) -> Result<Self, GiftCardError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(GiftCardError::EmptyCode);
        }
        current_balance.ensure_currency(initial_balance.currency())?;
        initial_balance.validate_stored()?;
        current_balance.validate_stored()?;
        if current_balance.amount() > initial_balance.amount() {
            return Err(GiftCardError::BalanceAboveInitial {
                current: current_balance,
                initial: initial_balance,
            });
        }
        Ok(Self {
            id,
            code,
            initial_balance: initial_balance.quantize(),
            current_balance: current_balance.quantize(),
            is_active: true,
            start_date: None,
            end_date: None,
        })
    }

    /// Restrict usage to `start..=end`; either bound may be open.
    #[must_use]
    pub fn with_validity(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Deactivate the card.
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    #[must_use]
    pub const fn id(&self) -> GiftCardId {
        self.id
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub const fn initial_balance(&self) -> Money {
        self.initial_balance
    }

    #[must_use]
    pub const fn current_balance(&self) -> Money {
        self.current_balance
    }

    /// Whether the card can be redeemed on `date`.
    #[must_use]
    pub fn is_usable_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.start_date.is_none_or(|start| start <= date)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Serialized form of a [`GiftCard`]; validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftCardRecord {
    pub id: GiftCardId,
    pub code: String,
    pub initial_balance: Money,
    pub current_balance: Money,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

const fn default_active() -> bool {
    true
}

impl TryFrom<GiftCardRecord> for GiftCard {
    type Error = GiftCardError;

    fn try_from(record: GiftCardRecord) -> Result<Self, Self::Error> {
        let mut card = Self::new(
            record.id,
            record.code,
            record.initial_balance,
            record.current_balance,
        )?
        .with_validity(record.start_date, record.end_date);
        card.is_active = record.is_active;
        Ok(card)
    }
}

impl From<GiftCard> for GiftCardRecord {
    fn from(card: GiftCard) -> Self {
        Self {
            id: card.id,
            code: card.code,
            initial_balance: card.initial_balance,
            current_balance: card.current_balance,
            is_active: card.is_active,
            start_date: card.start_date,
            end_date: card.end_date,
        }
    }
}
