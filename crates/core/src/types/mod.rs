//! Core types for Satchel.
//!
//! This module provides type-safe wrappers for checkout domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod metadata;
pub mod money;
pub mod permission;
pub mod weight;

pub use address::{Address, CountryCode, CountryCodeError};
pub use email::{Email, EmailError};
pub use id::*;
pub use metadata::Metadata;
pub use money::{CurrencyCode, Money, MoneyError, TaxedMoney};
pub use permission::{Permission, Permissions};
pub use weight::Weight;
