//! Satchel Checkout - checkout valuation and eligibility engine.
//!
//! Given a checkout (lines, addresses, vouchers, gift cards), this crate
//! computes line totals, the subtotal, the shipping price and the amount
//! payable, decides which shipping methods apply, and attaches a delivery
//! schedule.
//!
//! # Architecture
//!
//! The engine components ([`LinePricer`], [`ShippingEvaluator`],
//! [`Totalizer`], [`DeliveryScheduler`]) are pure computations over a loaded
//! [`Checkout`]. Catalog, tax, voucher and persistence concerns are reached
//! through the traits in [`ports`]; [`memory`] provides in-process versions
//! of all of them. [`CheckoutService`] ties everything together behind the
//! [`PricedCheckout`] and [`ScheduledCheckout`] capabilities.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod clock;
pub mod config;
pub mod discount;
pub mod error;
pub mod gift_card;
pub mod memory;
pub mod ports;
pub mod pricing;
pub mod schedule;
pub mod service;
pub mod shipping;
pub mod tax;
pub mod totals;

pub use checkout::{Checkout, CheckoutLine, Customer, MetadataScope};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CheckoutConfig, ConfigError, PaymentGateway};
pub use discount::{Discount, DiscountScope, DiscountValue, VoucherDiscount};
pub use error::{CheckoutError, Entity, RepositoryError, Result, TaxError, ValidationError};
pub use gift_card::{GiftCard, GiftCardError, GiftCardRecord};
pub use pricing::LinePricer;
pub use schedule::{DeliverySchedule, DeliveryScheduler, TimeSlot};
pub use service::{CheckoutService, Collaborators, PricedCheckout, ScheduledCheckout};
pub use shipping::{ShippingEvaluator, ShippingMethod, ShippingRule};
pub use tax::FlatRateTax;
pub use totals::{Totalizer, Valuation};
