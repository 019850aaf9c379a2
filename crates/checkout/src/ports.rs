//! Collaborators the engine calls into.
//!
//! Catalog lookups, tax calculation, voucher validation and persistence are
//! owned by other services. The engine only sees these traits; in-memory
//! implementations live in [`crate::memory`].
//!
//! All traits are `Send + Sync` so one [`CheckoutService`](crate::CheckoutService)
//! can be shared across request tasks.

use satchel_core::{
    CheckoutToken, CountryCode, GiftCardId, Money, ShippingMethodId, TaxedMoney, VariantId, Weight,
};
use serde::{Deserialize, Serialize};

use crate::checkout::Checkout;
use crate::error::{RepositoryError, TaxError};
use crate::gift_card::GiftCard;
use crate::discount::VoucherDiscount;
use crate::shipping::ShippingMethod;

/// What the catalog knows about a product variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantInfo {
    pub unit_price: Money,
    #[serde(default)]
    pub weight: Weight,
    /// Physical goods need shipping; digital goods and services do not.
    #[serde(default = "default_requires_shipping")]
    pub requires_shipping: bool,
}

const fn default_requires_shipping() -> bool {
    true
}

/// Product variant lookups.
pub trait VariantCatalog: Send + Sync {
    /// Look up a variant; `None` if it does not exist.
    fn variant(&self, id: VariantId) -> Option<VariantInfo>;
}

/// Jurisdiction a tax calculation is carried out for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaxContext {
    /// Destination country, when an address is known.
    pub country: Option<CountryCode>,
}

impl TaxContext {
    /// Taxes follow the shipping destination, falling back to the billing
    /// address.
    #[must_use]
    pub fn for_checkout(checkout: &Checkout) -> Self {
        Self {
            country: checkout
                .shipping_address()
                .or_else(|| checkout.billing_address())
                .map(|address| address.country),
        }
    }
}

/// Turns a price into net and gross amounts.
pub trait TaxCalculator: Send + Sync {
    /// Apply taxes to `price` for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`TaxError`] if the calculation cannot be carried out.
    fn apply(&self, price: Money, context: &TaxContext) -> Result<TaxedMoney, TaxError>;
}

/// The set of shipping methods a store offers.
pub trait ShippingMethodCatalog: Send + Sync {
    /// Every configured method.
    fn methods(&self) -> Vec<ShippingMethod>;

    /// Look up one method.
    fn method(&self, id: ShippingMethodId) -> Option<ShippingMethod> {
        self.methods().into_iter().find(|method| method.id == id)
    }
}

/// Validates voucher codes.
pub trait VoucherResolver: Send + Sync {
    /// Resolve `code` against `checkout`, given its current subtotal.
    ///
    /// Returns `None` if the code is unknown or its conditions are not met.
    fn resolve(
        &self,
        checkout: &Checkout,
        code: &str,
        subtotal: &TaxedMoney,
    ) -> Option<VoucherDiscount>;
}

/// Checkout persistence.
///
/// A checkout is stored together with its lines and delivery schedule;
/// `delete` removes all of them at once.
pub trait CheckoutRepository: Send + Sync {
    /// Load a checkout by token.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the store fails.
    fn get(&self, token: CheckoutToken) -> Result<Option<Checkout>, RepositoryError>;

    /// Insert or replace a checkout.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the store fails.
    fn save(&self, checkout: &Checkout) -> Result<(), RepositoryError>;

    /// Delete a checkout; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the store fails.
    fn delete(&self, token: CheckoutToken) -> Result<bool, RepositoryError>;

    /// All checkouts, most recently changed first.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the store fails.
    fn list(&self) -> Result<Vec<Checkout>, RepositoryError>;
}

/// Gift card lookups.
pub trait GiftCardRepository: Send + Sync {
    /// Load a gift card by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the store fails.
    fn get(&self, id: GiftCardId) -> Result<Option<GiftCard>, RepositoryError>;

    /// Load a gift card by its code, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the store fails.
    fn by_code(&self, code: &str) -> Result<Option<GiftCard>, RepositoryError>;
}
