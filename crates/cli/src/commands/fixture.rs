//! YAML checkout fixtures.
//!
//! A fixture describes a catalog, the store's shipping methods, gift cards,
//! vouchers and sales, plus one checkout to build on top of them:
//!
//! ```yaml
//! variants:
//!   - id: 1
//!     unit_price: { amount: "10.00", currency: INR }
//!     weight: "0.5"
//! shipping_methods:
//!   - id: 1
//!     name: Standard
//!     price: { amount: "5.00", currency: INR }
//!     rule: { type: price_based }
//! checkout:
//!   lines:
//!     - { variant_id: 1, quantity: 2 }
//!   shipping_address: { country: IN }
//!   shipping_method: 1
//! ```

use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use satchel_checkout::memory::{
    MemoryCatalog, MemoryShippingMethods, MemoryStore, MemoryVouchers, Voucher,
};
use satchel_checkout::ports::VariantInfo;
use satchel_checkout::{
    Checkout, CheckoutConfig, CheckoutService, Collaborators, Discount, FlatRateTax, GiftCard,
    ShippingMethod,
};
use satchel_core::{
    Address, CurrencyCode, Email, Money, ShippingMethodId, VariantId, Weight,
};

use super::CommandError;

/// Everything needed to evaluate one checkout.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    /// Checkout currency; the configured default when absent.
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    /// Overrides `SATCHEL_TAX_RATE`.
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    /// Overrides `SATCHEL_PRICES_INCLUDE_TAX`.
    #[serde(default)]
    pub prices_include_tax: Option<bool>,
    #[serde(default)]
    pub variants: Vec<VariantEntry>,
    #[serde(default)]
    pub shipping_methods: Vec<ShippingMethod>,
    #[serde(default)]
    pub gift_cards: Vec<GiftCard>,
    #[serde(default)]
    pub vouchers: Vec<Voucher>,
    #[serde(default)]
    pub sales: Vec<Discount>,
    pub checkout: CheckoutFixture,
}

/// One catalog entry.
#[derive(Debug, Deserialize)]
pub struct VariantEntry {
    pub id: VariantId,
    pub unit_price: Money,
    #[serde(default)]
    pub weight: Weight,
    #[serde(default = "default_requires_shipping")]
    pub requires_shipping: bool,
}

const fn default_requires_shipping() -> bool {
    true
}

/// The checkout to build.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutFixture {
    #[serde(default)]
    pub lines: Vec<LineEntry>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub shipping_method: Option<ShippingMethodId>,
    /// Voucher or gift card codes, applied in order.
    #[serde(default)]
    pub promo_codes: Vec<String>,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub note: Option<String>,
}

/// One checkout line.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LineEntry {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// Read and parse a fixture file.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or malformed.
pub async fn load(path: &Path) -> Result<Fixture, CommandError> {
    if !path.exists() {
        return Err(CommandError::FixtureNotFound(path.display().to_string()));
    }

    info!(path = %path.display(), "Loading checkout fixture");
    let content = tokio::fs::read_to_string(path).await?;
    let fixture = parse(&content)?;
    info!(
        variants = fixture.variants.len(),
        shipping_methods = fixture.shipping_methods.len(),
        lines = fixture.checkout.lines.len(),
        "Parsed fixture"
    );
    Ok(fixture)
}

/// Parse fixture YAML.
///
/// # Errors
///
/// Returns [`CommandError::Yaml`] for malformed input.
pub fn parse(content: &str) -> Result<Fixture, CommandError> {
    Ok(serde_yaml::from_str(content)?)
}

impl Fixture {
    /// Build an in-memory service from the fixture and replay the checkout
    /// into it.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment configuration is invalid or any
    /// checkout mutation is rejected.
    pub fn open(self) -> Result<(CheckoutService, Checkout), CommandError> {
        let mut config = CheckoutConfig::from_env()?;
        if let Some(rate) = self.tax_rate {
            config.tax_rate = rate;
        }
        if let Some(included) = self.prices_include_tax {
            config.prices_include_tax = included;
        }
        Ok(self.open_with(config)?)
    }

    /// Same as [`Self::open`] with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any checkout mutation is rejected.
    pub fn open_with(
        self,
        config: CheckoutConfig,
    ) -> satchel_checkout::Result<(CheckoutService, Checkout)> {
        let catalog: MemoryCatalog = self
            .variants
            .into_iter()
            .map(|entry| {
                (
                    entry.id,
                    VariantInfo {
                        unit_price: entry.unit_price,
                        weight: entry.weight,
                        requires_shipping: entry.requires_shipping,
                    },
                )
            })
            .collect();
        let store = Arc::new(
            self.gift_cards
                .into_iter()
                .fold(MemoryStore::new(), MemoryStore::with_gift_card),
        );

        let collaborators = Collaborators {
            catalog: Arc::new(catalog),
            taxes: Arc::new(FlatRateTax::from_config(&config)),
            shipping_methods: Arc::new(MemoryShippingMethods::new(self.shipping_methods)),
            vouchers: Arc::new(MemoryVouchers::new(self.vouchers)),
            checkouts: store.clone(),
            gift_cards: store,
            sales: self.sales,
        };
        let service = CheckoutService::new(config, collaborators);

        let wanted = self.checkout;
        let token = service.create_checkout(self.currency)?.token();
        let lines: Vec<_> = wanted
            .lines
            .iter()
            .map(|line| (line.variant_id, line.quantity))
            .collect();
        service.add_lines(token, &lines)?;
        if let Some(address) = wanted.billing_address {
            service.update_billing_address(token, address)?;
        }
        if let Some(address) = wanted.shipping_address {
            service.update_shipping_address(token, address)?;
        }
        if wanted.shipping_method.is_some() {
            service.update_shipping_method(token, wanted.shipping_method)?;
        }
        for code in &wanted.promo_codes {
            service.add_promo_code(token, code)?;
        }
        if let Some(email) = wanted.email {
            service.update_email(token, email)?;
        }
        if let Some(note) = &wanted.note {
            service.update_note(token, note)?;
        }

        let checkout = service.checkout(token)?;
        Ok((service, checkout))
    }
}
