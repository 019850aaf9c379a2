//! Type-safe money representation using decimal arithmetic.
//!
//! A monetary amount is always an `(amount, currency)` pair. Arithmetic
//! between two amounts is only defined when their currencies match, so
//! every binary operation is checked and returns [`MoneyError`] instead of
//! silently mixing currencies.
//!
//! Amounts are stored with two decimal places, matching a database column
//! of `max_digits = 12, decimal_places = 2`.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors produced by monetary arithmetic and validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Two operands of one computation carry different currencies.
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency of the left-hand operand.
        expected: CurrencyCode,
        /// Currency of the offending operand.
        found: CurrencyCode,
    },
    /// The amount is negative where only non-negative amounts are allowed.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// A taxed amount whose gross is lower than its net.
    #[error("gross amount {gross} is lower than net amount {net}")]
    GrossBelowNet {
        /// Net component.
        net: Decimal,
        /// Gross component.
        gross: Decimal,
    },
    /// The amount does not fit the storage precision.
    #[error("amount {0} exceeds {max} digits", max = Money::MAX_DIGITS)]
    TooManyDigits(Decimal),
    /// The currency code is not three ASCII letters.
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),
    /// The result does not fit a decimal.
    #[error("arithmetic overflow")]
    Overflow,
}

/// ISO 4217 currency code (e.g. `INR`, `USD`).
///
/// Stored as three uppercase ASCII letters; parsing upper-cases its input.
///
/// ```
/// use satchel_core::CurrencyCode;
///
/// let inr = CurrencyCode::parse("inr").unwrap();
/// assert_eq!(inr.as_str(), "INR");
/// assert!(CurrencyCode::parse("RUPEE").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// Indian rupee, the default store currency.
    pub const INR: Self = Self(*b"INR");
    /// US dollar.
    pub const USD: Self = Self(*b"USD");
    /// Euro.
    pub const EUR: Self = Self(*b"EUR");

    /// Parse a currency code.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidCurrency`] unless the input is exactly
    /// three ASCII letters.
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        let bytes = s.trim().as_bytes();
        match bytes {
            [a, b, c] if bytes.iter().all(u8::is_ascii_alphabetic) => Ok(Self([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(MoneyError::InvalidCurrency(s.to_owned())),
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ever constructed from ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::INR
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = MoneyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_owned()
    }
}

/// A monetary amount tagged with its currency.
///
/// ```
/// use rust_decimal::Decimal;
/// use satchel_core::{CurrencyCode, Money};
///
/// let ten = Money::new(Decimal::new(1000, 2), CurrencyCode::INR);
/// let five = Money::new(Decimal::new(500, 2), CurrencyCode::INR);
/// assert_eq!(ten.checked_add(five).unwrap().amount(), Decimal::new(1500, 2));
///
/// let dollars = Money::new(Decimal::ONE, CurrencyCode::USD);
/// assert!(ten.checked_add(dollars).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: CurrencyCode,
}

impl Money {
    /// Decimal places kept for every stored amount.
    pub const DECIMAL_PLACES: u32 = 2;
    /// Total significant digits a stored amount may carry.
    pub const MAX_DIGITS: u32 = 12;

    /// Create a new amount. The value is kept as given; call
    /// [`Money::quantize`] to round it to storage precision.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Create an amount from minor units (e.g. paise or cents).
    #[must_use]
    pub fn from_minor(minor: i64, currency: CurrencyCode) -> Self {
        Self::new(Decimal::new(minor, Self::DECIMAL_PLACES), currency)
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// The currency code.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Round to two decimal places, midpoints away from zero.
    #[must_use]
    pub fn quantize(self) -> Self {
        Self {
            amount: self
                .amount
                .round_dp_with_strategy(Self::DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero),
            ..self
        }
    }

    /// Fail unless the amount is in `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] when the currencies differ.
    pub fn ensure_currency(&self, expected: CurrencyCode) -> Result<(), MoneyError> {
        if self.currency == expected {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                expected,
                found: self.currency,
            })
        }
    }

    /// Fail unless the amount is non-negative and fits the storage precision.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] or [`MoneyError::TooManyDigits`].
    pub fn validate_stored(&self) -> Result<(), MoneyError> {
        if self.is_negative() {
            return Err(MoneyError::Negative(self.amount));
        }
        let limit = Decimal::from(10_i64.pow(Self::MAX_DIGITS - Self::DECIMAL_PLACES));
        if self.amount.trunc() >= limit {
            return Err(MoneyError::TooManyDigits(self.amount));
        }
        Ok(())
    }

    /// Add two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] when the currencies differ
    /// and [`MoneyError::Overflow`] when the sum does not fit.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        other.ensure_currency(self.currency)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Subtract an amount of the same currency. The result may be negative.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] when the currencies differ
    /// and [`MoneyError::Overflow`] when the difference does not fit.
    pub fn checked_sub(self, other: Self) -> Result<Self, MoneyError> {
        other.ensure_currency(self.currency)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Multiply by a line quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the product does not fit.
    pub fn times(self, quantity: u32) -> Result<Self, MoneyError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Clamp a negative amount to zero.
    #[must_use]
    pub fn floor_at_zero(self) -> Self {
        if self.is_negative() {
            Self::zero(self.currency)
        } else {
            self
        }
    }

    /// Sum amounts that must all be in `currency`. An empty input sums to zero.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] on the first foreign amount.
    pub fn sum<I>(currency: CurrencyCode, amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::zero(currency), Self::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

/// A monetary amount expressed as both pre-tax (net) and post-tax (gross).
///
/// [`TaxedMoney::new`] enforces `gross >= net >= 0` and matching currencies.
/// Intermediate results of subtraction may break the lower bound until
/// [`TaxedMoney::floor_at_zero`] is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxedMoney {
    net: Money,
    gross: Money,
}

impl TaxedMoney {
    /// Create a taxed amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the currencies differ, the net amount is negative,
    /// or gross is below net.
    pub fn new(net: Money, gross: Money) -> Result<Self, MoneyError> {
        gross.ensure_currency(net.currency)?;
        if net.is_negative() {
            return Err(MoneyError::Negative(net.amount));
        }
        if gross.amount < net.amount {
            return Err(MoneyError::GrossBelowNet {
                net: net.amount,
                gross: gross.amount,
            });
        }
        Ok(Self { net, gross })
    }

    /// A tax-free amount: net and gross are equal.
    #[must_use]
    pub const fn untaxed(amount: Money) -> Self {
        Self {
            net: amount,
            gross: amount,
        }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self::untaxed(Money::zero(currency))
    }

    /// The pre-tax amount.
    #[must_use]
    pub const fn net(&self) -> Money {
        self.net
    }

    /// The tax-inclusive amount.
    #[must_use]
    pub const fn gross(&self) -> Money {
        self.gross
    }

    /// The tax portion (`gross - net`).
    #[must_use]
    pub fn tax(&self) -> Money {
        Money::new(self.gross.amount - self.net.amount, self.net.currency)
    }

    /// Currency shared by both components.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.net.currency
    }

    /// Round both components to two decimal places.
    #[must_use]
    pub fn quantize(self) -> Self {
        Self {
            net: self.net.quantize(),
            gross: self.gross.quantize(),
        }
    }

    /// Add two taxed amounts component-wise.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] when the currencies differ.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        Ok(Self {
            net: self.net.checked_add(other.net)?,
            gross: self.gross.checked_add(other.gross)?,
        })
    }

    /// Subtract a plain amount from both net and gross.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] when the currencies differ.
    pub fn checked_sub_money(self, amount: Money) -> Result<Self, MoneyError> {
        Ok(Self {
            net: self.net.checked_sub(amount)?,
            gross: self.gross.checked_sub(amount)?,
        })
    }

    /// Clamp each component at zero. Preserves `gross >= net`.
    #[must_use]
    pub fn floor_at_zero(self) -> Self {
        Self {
            net: self.net.floor_at_zero(),
            gross: self.gross.floor_at_zero(),
        }
    }

    /// Sum taxed amounts that must all be in `currency`, without re-rounding.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] on the first foreign amount.
    pub fn sum<I>(currency: CurrencyCode, amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::zero(currency), Self::checked_add)
    }
}

impl fmt::Display for TaxedMoney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (net {})", self.gross, self.net)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inr(minor: i64) -> Money {
        Money::from_minor(minor, CurrencyCode::INR)
    }

    #[test]
    fn test_currency_parse_uppercases() {
        assert_eq!(CurrencyCode::parse("usd").unwrap(), CurrencyCode::USD);
        assert_eq!(CurrencyCode::parse(" eur ").unwrap(), CurrencyCode::EUR);
    }

    #[test]
    fn test_currency_parse_rejects_bad_codes() {
        assert!(CurrencyCode::parse("").is_err());
        assert!(CurrencyCode::parse("IN").is_err());
        assert!(CurrencyCode::parse("IN1").is_err());
        assert!(CurrencyCode::parse("INRR").is_err());
    }

    #[test]
    fn test_currency_serializes_as_string() {
        let json = serde_json::to_string(&CurrencyCode::INR).unwrap();
        assert_eq!(json, "\"INR\"");
        let parsed: CurrencyCode = serde_json::from_str("\"usd\"").unwrap();
        assert_eq!(parsed, CurrencyCode::USD);
        assert!(serde_json::from_str::<CurrencyCode>("\"dollars\"").is_err());
    }

    #[test]
    fn test_add_rejects_currency_mismatch() {
        let err = inr(100)
            .checked_add(Money::from_minor(100, CurrencyCode::USD))
            .unwrap_err();
        assert_eq!(
            err,
            MoneyError::CurrencyMismatch {
                expected: CurrencyCode::INR,
                found: CurrencyCode::USD,
            }
        );
    }

    #[test]
    fn test_quantize_rounds_midpoint_away_from_zero() {
        let m = Money::new(Decimal::new(12345, 3), CurrencyCode::INR).quantize();
        assert_eq!(m.amount(), Decimal::new(1235, 2));
        let m = Money::new(Decimal::new(12344, 3), CurrencyCode::INR).quantize();
        assert_eq!(m.amount(), Decimal::new(1234, 2));
    }

    #[test]
    fn test_times_multiplies_by_quantity() {
        assert_eq!(inr(1000).times(3).unwrap(), inr(3000));
    }

    #[test]
    fn test_arithmetic_overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX, CurrencyCode::INR);
        assert_eq!(huge.times(2), Err(MoneyError::Overflow));
        assert_eq!(huge.checked_add(huge), Err(MoneyError::Overflow));
        let negative = Money::new(Decimal::MIN, CurrencyCode::INR);
        assert_eq!(negative.checked_sub(huge), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_floor_at_zero() {
        assert_eq!(inr(-500).floor_at_zero(), inr(0));
        assert_eq!(inr(500).floor_at_zero(), inr(500));
    }

    #[test]
    fn test_validate_stored_limits() {
        assert!(inr(0).validate_stored().is_ok());
        assert!(inr(999_999_999_999).validate_stored().is_ok());
        assert!(matches!(
            inr(1_000_000_000_000).validate_stored(),
            Err(MoneyError::TooManyDigits(_))
        ));
        assert!(matches!(
            inr(-1).validate_stored(),
            Err(MoneyError::Negative(_))
        ));
    }

    #[test]
    fn test_sum_of_empty_is_zero() {
        let total = Money::sum(CurrencyCode::INR, Vec::new()).unwrap();
        assert!(total.is_zero());
        assert_eq!(total.currency(), CurrencyCode::INR);
    }

    #[test]
    fn test_display() {
        assert_eq!(inr(2500).to_string(), "25.00 INR");
    }

    #[test]
    fn test_taxed_money_rejects_gross_below_net() {
        assert!(matches!(
            TaxedMoney::new(inr(1000), inr(900)),
            Err(MoneyError::GrossBelowNet { .. })
        ));
    }

    #[test]
    fn test_taxed_money_rejects_negative_net() {
        assert!(matches!(
            TaxedMoney::new(inr(-1), inr(0)),
            Err(MoneyError::Negative(_))
        ));
    }

    #[test]
    fn test_taxed_money_rejects_mixed_currency() {
        assert!(TaxedMoney::new(inr(100), Money::from_minor(110, CurrencyCode::USD)).is_err());
    }

    #[test]
    fn test_taxed_money_tax_portion() {
        let taxed = TaxedMoney::new(inr(1000), inr(1180)).unwrap();
        assert_eq!(taxed.tax(), inr(180));
    }

    #[test]
    fn test_sub_then_floor_keeps_gross_above_net() {
        let taxed = TaxedMoney::new(inr(1000), inr(1200)).unwrap();
        let floored = taxed.checked_sub_money(inr(1100)).unwrap().floor_at_zero();
        assert_eq!(floored.net(), inr(0));
        assert_eq!(floored.gross(), inr(100));
    }

    #[test]
    fn test_taxed_sum_does_not_reround() {
        let parts = vec![
            TaxedMoney::untaxed(inr(333)),
            TaxedMoney::untaxed(inr(333)),
            TaxedMoney::untaxed(inr(334)),
        ];
        let total = TaxedMoney::sum(CurrencyCode::INR, parts).unwrap();
        assert_eq!(total.gross(), inr(1000));
    }
}
