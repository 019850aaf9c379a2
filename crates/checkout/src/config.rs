//! Engine configuration, passed explicitly into [`CheckoutService`].
//!
//! # Environment Variables
//!
//! All optional:
//! - `SATCHEL_DEFAULT_CURRENCY` - ISO 4217 code for new checkouts (default: INR)
//! - `SATCHEL_PAYMENT_GATEWAYS` - Comma-separated gateways offered at checkout (default: dummy)
//! - `SATCHEL_TAX_RATE` - Flat tax rate in percent (default: 0)
//! - `SATCHEL_PRICES_INCLUDE_TAX` - Whether catalog prices are gross (default: false)
//!
//! [`CheckoutService`]: crate::CheckoutService

use std::str::FromStr;

use rust_decimal::Decimal;
use satchel_core::CurrencyCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// A payment gateway a shopper may pick at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    Dummy,
    Braintree,
    Razorpay,
    Stripe,
}

impl std::fmt::Display for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "dummy"),
            Self::Braintree => write!(f, "braintree"),
            Self::Razorpay => write!(f, "razorpay"),
            Self::Stripe => write!(f, "stripe"),
        }
    }
}

impl FromStr for PaymentGateway {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dummy" => Ok(Self::Dummy),
            "braintree" => Ok(Self::Braintree),
            "razorpay" => Ok(Self::Razorpay),
            "stripe" => Ok(Self::Stripe),
            other => Err(format!("unknown payment gateway: {other}")),
        }
    }
}

/// Checkout engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Currency assigned to new checkouts
    pub default_currency: CurrencyCode,
    /// Gateways offered to shoppers, in display order
    pub payment_gateways: Vec<PaymentGateway>,
    /// Flat tax rate in percent, applied by `FlatRateTax`
    pub tax_rate: Decimal,
    /// Whether catalog and shipping prices already include tax
    pub prices_include_tax: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            default_currency: CurrencyCode::INR,
            payment_gateways: vec![PaymentGateway::Dummy],
            tax_rate: Decimal::ZERO,
            prices_include_tax: false,
        }
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let default_currency = get_optional_env("SATCHEL_DEFAULT_CURRENCY")
            .map(|v| parse_env("SATCHEL_DEFAULT_CURRENCY", &v))
            .transpose()?
            .unwrap_or(defaults.default_currency);

        let payment_gateways = match get_optional_env("SATCHEL_PAYMENT_GATEWAYS") {
            Some(v) => v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_env("SATCHEL_PAYMENT_GATEWAYS", s))
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.payment_gateways,
        };

        let tax_rate: Decimal = get_optional_env("SATCHEL_TAX_RATE")
            .map(|v| parse_env("SATCHEL_TAX_RATE", &v))
            .transpose()?
            .unwrap_or(defaults.tax_rate);
        if tax_rate.is_sign_negative() && !tax_rate.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "SATCHEL_TAX_RATE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let prices_include_tax = get_optional_env("SATCHEL_PRICES_INCLUDE_TAX")
            .map(|v| parse_env("SATCHEL_PRICES_INCLUDE_TAX", &v))
            .transpose()?
            .unwrap_or(defaults.prices_include_tax);

        Ok(Self {
            default_currency,
            payment_gateways,
            tax_rate,
            prices_include_tax,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a value read from `key`.
fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
