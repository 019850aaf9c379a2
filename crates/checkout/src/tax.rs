//! Flat-rate tax calculator.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use satchel_core::{CountryCode, Money, TaxedMoney};

use crate::config::CheckoutConfig;
use crate::error::TaxError;
use crate::ports::{TaxCalculator, TaxContext};

/// Applies one percentage rate, optionally overridden per destination
/// country.
///
/// When `prices_include_tax` is set, incoming prices are treated as gross
/// and the net amount is backed out; otherwise they are net and tax is added
/// on top. Both components are rounded to two decimal places.
#[derive(Debug, Clone, Default)]
pub struct FlatRateTax {
    rate: Decimal,
    country_rates: BTreeMap<CountryCode, Decimal>,
    prices_include_tax: bool,
}

impl FlatRateTax {
    /// A calculator with one rate, in percent.
    #[must_use]
    pub fn new(rate: Decimal, prices_include_tax: bool) -> Self {
        Self {
            rate,
            country_rates: BTreeMap::new(),
            prices_include_tax,
        }
    }

    /// Build from the engine configuration.
    #[must_use]
    pub fn from_config(config: &CheckoutConfig) -> Self {
        Self::new(config.tax_rate, config.prices_include_tax)
    }

    /// Override the rate for one destination country.
    #[must_use]
    pub fn with_country_rate(mut self, country: CountryCode, rate: Decimal) -> Self {
        self.country_rates.insert(country, rate);
        self
    }

    fn rate_for(&self, context: &TaxContext) -> Decimal {
        context
            .country
            .and_then(|country| self.country_rates.get(&country).copied())
            .unwrap_or(self.rate)
    }
}

impl TaxCalculator for FlatRateTax {
    fn apply(&self, price: Money, context: &TaxContext) -> Result<TaxedMoney, TaxError> {
        let rate = self.rate_for(context);
        if rate.is_sign_negative() && !rate.is_zero() {
            return Err(TaxError(format!("negative tax rate {rate}")));
        }
        let overflow = || TaxError(format!("tax on {price} at {rate}% overflows"));
        let factor = Decimal::ONE
            .checked_add(rate / Decimal::ONE_HUNDRED)
            .ok_or_else(overflow)?;
        let currency = price.currency();

        let (net, gross) = if self.prices_include_tax {
            (price.amount() / factor, price.amount())
        } else {
            let gross = price.amount().checked_mul(factor).ok_or_else(overflow)?;
            (price.amount(), gross)
        };

        TaxedMoney::new(
            Money::new(net, currency).quantize(),
            Money::new(gross, currency).quantize(),
        )
        .map_err(|e| TaxError(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use satchel_core::CurrencyCode;

    use super::*;

    fn inr(minor: i64) -> Money {
        Money::from_minor(minor, CurrencyCode::INR)
    }

    #[test]
    fn test_zero_rate_is_untaxed() {
        let tax = FlatRateTax::default();
        let taxed = tax.apply(inr(1000), &TaxContext::default()).unwrap();
        assert_eq!(taxed, TaxedMoney::untaxed(inr(1000)));
    }

    #[test]
    fn test_tax_added_on_top() {
        let tax = FlatRateTax::new(Decimal::from(18), false);
        let taxed = tax.apply(inr(1000), &TaxContext::default()).unwrap();
        assert_eq!(taxed.net(), inr(1000));
        assert_eq!(taxed.gross(), inr(1180));
    }

    #[test]
    fn test_tax_backed_out_of_gross_prices() {
        let tax = FlatRateTax::new(Decimal::from(18), true);
        let taxed = tax.apply(inr(1180), &TaxContext::default()).unwrap();
        assert_eq!(taxed.net(), inr(1000));
        assert_eq!(taxed.gross(), inr(1180));
    }

    #[test]
    fn test_country_override() {
        let de = CountryCode::parse("DE").unwrap();
        let tax = FlatRateTax::new(Decimal::from(18), false).with_country_rate(de, Decimal::from(19));
        let taxed = tax
            .apply(inr(1000), &TaxContext { country: Some(de) })
            .unwrap();
        assert_eq!(taxed.gross(), inr(1190));
    }

    #[test]
    fn test_negative_rate_is_an_error() {
        let tax = FlatRateTax::new(Decimal::from(-5), false);
        assert!(tax.apply(inr(1000), &TaxContext::default()).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let tax = FlatRateTax::new(Decimal::from(18), false);
        let huge = Money::new(Decimal::MAX, CurrencyCode::INR);
        assert!(tax.apply(huge, &TaxContext::default()).is_err());
    }
}
