//! Integration tests for Satchel.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p satchel-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `valuation_scenarios` - Subtotal, shipping, vouchers, gift cards, totals
//! - `shipping_eligibility` - Which methods apply to which checkouts
//! - `delivery_schedule` - Scheduling through the service and the trait
//! - `checkout_mutations` - Persisted mutations and permissions
//!
//! Every test runs against the in-memory collaborators and a fixed clock,
//! built with [`TestContext`].

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use satchel_checkout::memory::{
    MemoryCatalog, MemoryShippingMethods, MemoryStore, MemoryVouchers, Voucher,
};
use satchel_checkout::ports::VariantInfo;
use satchel_checkout::{
    CheckoutConfig, CheckoutService, Collaborators, Discount, FixedClock, FlatRateTax, GiftCard,
    ShippingMethod, ShippingRule,
};
use satchel_core::{CountryCode, CurrencyCode, Money, ShippingMethodId, VariantId, Weight};

/// A physical variant: 10.00, 0.5 kg.
pub const SHIRT: VariantId = VariantId::new(1);
/// A physical variant: 3.33, 0.2 kg.
pub const MUG: VariantId = VariantId::new(2);
/// A digital variant: 20.00.
pub const EBOOK: VariantId = VariantId::new(3);
/// A digital variant: 10.00.
pub const COURSE: VariantId = VariantId::new(4);
/// A digital variant: 5.00.
pub const WALLPAPER: VariantId = VariantId::new(5);

/// Flat 5.00, any order, any country.
pub const STANDARD: ShippingMethodId = ShippingMethodId::new(1);
/// Free from 50.00, India only.
pub const FREE_OVER_50: ShippingMethodId = ShippingMethodId::new(2);
/// 2.00 up to 1 kg.
pub const LIGHT_PARCEL: ShippingMethodId = ShippingMethodId::new(3);

/// Amount in INR minor units.
#[must_use]
pub fn inr(minor: i64) -> Money {
    Money::from_minor(minor, CurrencyCode::INR)
}

/// Parse a country code known to be valid.
///
/// # Panics
///
/// Panics on an invalid code.
#[must_use]
#[allow(clippy::expect_used)]
pub fn country(code: &str) -> CountryCode {
    CountryCode::parse(code).expect("valid country code")
}

/// The instant every test runs at.
///
/// # Panics
///
/// Never; the date is fixed and valid.
#[must_use]
#[allow(clippy::expect_used)]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

/// [`now`] as a calendar date.
#[must_use]
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// The default catalog.
#[must_use]
pub fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_variant_info(
            SHIRT,
            VariantInfo {
                unit_price: inr(1000),
                weight: Weight::from_grams(500),
                requires_shipping: true,
            },
        )
        .with_variant_info(
            MUG,
            VariantInfo {
                unit_price: inr(333),
                weight: Weight::from_grams(200),
                requires_shipping: true,
            },
        )
        .with_variant(EBOOK, inr(2000), false)
        .with_variant(COURSE, inr(1000), false)
        .with_variant(WALLPAPER, inr(500), false)
}

/// The default shipping methods.
#[must_use]
pub fn shipping_methods() -> Vec<ShippingMethod> {
    vec![
        ShippingMethod {
            id: STANDARD,
            name: "Standard".to_string(),
            price: inr(500),
            rule: ShippingRule::PriceBased {
                min_order_price: None,
                max_order_price: None,
            },
            countries: BTreeSet::new(),
        },
        ShippingMethod {
            id: FREE_OVER_50,
            name: "Free over 50".to_string(),
            price: inr(0),
            rule: ShippingRule::PriceBased {
                min_order_price: Some(inr(5000)),
                max_order_price: None,
            },
            countries: [country("IN")].into_iter().collect(),
        },
        ShippingMethod {
            id: LIGHT_PARCEL,
            name: "Light parcel".to_string(),
            price: inr(200),
            rule: ShippingRule::WeightBased {
                min_weight: None,
                max_weight: Some(Weight::from_grams(1000)),
            },
            countries: BTreeSet::new(),
        },
    ]
}

/// Builder for a [`CheckoutService`] over in-memory collaborators.
pub struct TestContext {
    pub config: CheckoutConfig,
    pub catalog: MemoryCatalog,
    pub shipping_methods: Vec<ShippingMethod>,
    pub vouchers: Vec<Voucher>,
    pub gift_cards: Vec<GiftCard>,
    pub sales: Vec<Discount>,
    pub clock: FixedClock,
}

impl Default for TestContext {
    fn default() -> Self {
        Self {
            config: CheckoutConfig::default(),
            catalog: catalog(),
            shipping_methods: shipping_methods(),
            vouchers: Vec::new(),
            gift_cards: Vec::new(),
            sales: Vec::new(),
            clock: FixedClock(now()),
        }
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_voucher(mut self, voucher: Voucher) -> Self {
        self.vouchers.push(voucher);
        self
    }

    #[must_use]
    pub fn with_gift_card(mut self, card: GiftCard) -> Self {
        self.gift_cards.push(card);
        self
    }

    #[must_use]
    pub fn with_sale(mut self, sale: Discount) -> Self {
        self.sales.push(sale);
        self
    }

    #[must_use]
    pub fn with_tax_rate(mut self, rate: rust_decimal::Decimal) -> Self {
        self.config.tax_rate = rate;
        self
    }

    /// Build the service.
    #[must_use]
    pub fn build(self) -> CheckoutService {
        let store = Arc::new(
            self.gift_cards
                .into_iter()
                .fold(MemoryStore::new(), MemoryStore::with_gift_card),
        );
        let collaborators = Collaborators {
            catalog: Arc::new(self.catalog),
            taxes: Arc::new(FlatRateTax::from_config(&self.config)),
            shipping_methods: Arc::new(MemoryShippingMethods::new(self.shipping_methods)),
            vouchers: Arc::new(MemoryVouchers::new(self.vouchers)),
            checkouts: store.clone(),
            gift_cards: store,
            sales: self.sales,
        };
        CheckoutService::with_clock(self.config, collaborators, Arc::new(self.clock))
    }
}
