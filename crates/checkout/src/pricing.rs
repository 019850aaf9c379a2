//! Line pricing.

use satchel_core::{Money, TaxedMoney};

use crate::checkout::{Checkout, CheckoutLine};
use crate::discount::Discount;
use crate::error::{CheckoutError, Entity, Result, ValidationError};
use crate::ports::{TaxCalculator, TaxContext, VariantCatalog, VariantInfo};

/// Computes the total price of a checkout line.
#[derive(Clone, Copy)]
pub struct LinePricer<'a> {
    catalog: &'a dyn VariantCatalog,
    taxes: &'a dyn TaxCalculator,
}

impl<'a> LinePricer<'a> {
    #[must_use]
    pub const fn new(catalog: &'a dyn VariantCatalog, taxes: &'a dyn TaxCalculator) -> Self {
        Self { catalog, taxes }
    }

    /// Price one line of `checkout`.
    ///
    /// The unit price is lowered by the best eligible discount (the one
    /// yielding the lowest price), multiplied by the quantity, rounded to two
    /// decimal places and then taxed for the checkout's destination.
    ///
    /// # Errors
    ///
    /// - `Validation(InvalidQuantity)` for a zero quantity
    /// - `NotFound` for an unknown variant
    /// - `CurrencyMismatch` if the variant or a fixed discount is priced in a
    ///   currency other than the checkout's
    /// - `Validation(InvalidPercentage)` for an out-of-range sale
    /// - `Validation(InvalidAmount(Overflow))` when the line total does not fit
    pub fn price(
        &self,
        checkout: &Checkout,
        line: &CheckoutLine,
        discounts: &[Discount],
    ) -> Result<TaxedMoney> {
        if line.quantity == 0 {
            return Err(ValidationError::InvalidQuantity(line.quantity).into());
        }

        let variant = self.variant(line)?;
        variant.unit_price.ensure_currency(checkout.currency())?;

        let unit_price = Self::discounted_unit_price(line, variant.unit_price, discounts)?;
        let net = unit_price.times(line.quantity)?.quantize();

        let taxed = self.taxes.apply(net, &TaxContext::for_checkout(checkout))?;
        Ok(taxed.quantize())
    }

    /// Catalog entry for the line's variant.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown variant.
    pub fn variant(&self, line: &CheckoutLine) -> Result<VariantInfo> {
        self.catalog
            .variant(line.variant_id)
            .ok_or_else(|| CheckoutError::not_found(Entity::Variant, line.variant_id))
    }

    fn discounted_unit_price(
        line: &CheckoutLine,
        unit_price: Money,
        discounts: &[Discount],
    ) -> Result<Money> {
        let mut best = unit_price;
        for discount in discounts.iter().filter(|d| d.applies_to(line.variant_id)) {
            let candidate = discount.value.apply(unit_price)?;
            if candidate.amount() < best.amount() {
                best = candidate;
            }
        }
        Ok(best)
    }
}
