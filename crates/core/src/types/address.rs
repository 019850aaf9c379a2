//! Postal addresses used for billing and shipping destinations.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error parsing a [`CountryCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid country code: {0:?}")]
pub struct CountryCodeError(String);

/// ISO 3166-1 alpha-2 country code (e.g. `IN`, `US`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    /// Parse a two-letter country code, upper-casing it.
    ///
    /// # Errors
    ///
    /// Returns [`CountryCodeError`] unless the input is two ASCII letters.
    pub fn parse(s: &str) -> Result<Self, CountryCodeError> {
        match s.trim().as_bytes() {
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                Ok(Self([a.to_ascii_uppercase(), b.to_ascii_uppercase()]))
            }
            _ => Err(CountryCodeError(s.to_owned())),
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ever constructed from ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountryCode({})", self.as_str())
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CountryCode {
    type Err = CountryCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.as_str().to_owned()
    }
}

/// Mailing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: String,
    /// Company name.
    #[serde(default)]
    pub company_name: String,
    /// First street line.
    #[serde(default)]
    pub street_address_1: String,
    /// Second street line.
    #[serde(default)]
    pub street_address_2: String,
    /// City.
    #[serde(default)]
    pub city: String,
    /// District or neighbourhood.
    #[serde(default)]
    pub city_area: String,
    /// Postal/ZIP code.
    #[serde(default)]
    pub postal_code: String,
    /// Destination country; drives shipping zones and tax.
    pub country: CountryCode,
    /// State or province.
    #[serde(default)]
    pub country_area: String,
    /// Phone number.
    #[serde(default)]
    pub phone: String,
}

impl Address {
    /// An address with only the country filled in.
    #[must_use]
    pub fn in_country(country: CountryCode) -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            company_name: String::new(),
            street_address_1: String::new(),
            street_address_2: String::new(),
            city: String::new(),
            city_area: String::new(),
            postal_code: String::new(),
            country,
            country_area: String::new(),
            phone: String::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_country_code_parse() {
        assert_eq!(CountryCode::parse("in").unwrap().as_str(), "IN");
        assert!(CountryCode::parse("IND").is_err());
        assert!(CountryCode::parse("1N").is_err());
    }

    #[test]
    fn test_address_deserializes_with_defaults() {
        let address: Address = serde_json::from_str(r#"{"country": "de", "city": "Berlin"}"#).unwrap();
        assert_eq!(address.country.as_str(), "DE");
        assert_eq!(address.city, "Berlin");
        assert!(address.postal_code.is_empty());
    }
}
