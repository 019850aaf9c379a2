//! Shipping methods and shipping eligibility.
//!
//! Eligibility is computed apart from totals so it can be re-evaluated on
//! its own, e.g. when the shipping address changes and the selected method
//! may have become invalid.

use std::collections::BTreeSet;

use satchel_core::{CountryCode, Money, ShippingMethodId, TaxedMoney, Weight};
use serde::{Deserialize, Serialize};

use crate::checkout::Checkout;
use crate::discount::Discount;
use crate::error::{Result, ValidationError};
use crate::ports::ShippingMethodCatalog;
use crate::pricing::LinePricer;

/// Threshold rule deciding which orders a method can serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShippingRule {
    /// Available for order subtotals (gross) within the bounds.
    PriceBased {
        #[serde(default)]
        min_order_price: Option<Money>,
        #[serde(default)]
        max_order_price: Option<Money>,
    },
    /// Available for order weights within the bounds.
    WeightBased {
        #[serde(default)]
        min_weight: Option<Weight>,
        #[serde(default)]
        max_weight: Option<Weight>,
    },
}

/// A carrier/service option with its price and eligibility rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub price: Money,
    pub rule: ShippingRule,
    /// Destination countries served; empty means everywhere.
    #[serde(default)]
    pub countries: BTreeSet<CountryCode>,
}

impl ShippingMethod {
    /// Whether this method serves an order to `country` worth `subtotal`
    /// and weighing `weight`.
    ///
    /// A method priced in another currency than the order never applies,
    /// and neither does a price threshold in another currency.
    #[must_use]
    pub fn applies_to(&self, country: CountryCode, subtotal: Money, weight: Weight) -> bool {
        if !self.countries.is_empty() && !self.countries.contains(&country) {
            return false;
        }
        if self.price.currency() != subtotal.currency() {
            return false;
        }
        match &self.rule {
            ShippingRule::PriceBased {
                min_order_price,
                max_order_price,
            } => {
                let above_min = min_order_price.is_none_or(|min| {
                    min.currency() == subtotal.currency() && min.amount() <= subtotal.amount()
                });
                let below_max = max_order_price.is_none_or(|max| {
                    max.currency() == subtotal.currency() && subtotal.amount() <= max.amount()
                });
                above_min && below_max
            }
            ShippingRule::WeightBased {
                min_weight,
                max_weight,
            } => {
                min_weight.is_none_or(|min| min <= weight) && max_weight.is_none_or(|max| weight <= max)
            }
        }
    }
}

/// Decides whether a checkout needs shipping and which methods may carry it.
#[derive(Clone, Copy)]
pub struct ShippingEvaluator<'a> {
    pricer: LinePricer<'a>,
    methods: &'a dyn ShippingMethodCatalog,
}

impl<'a> ShippingEvaluator<'a> {
    #[must_use]
    pub const fn new(pricer: LinePricer<'a>, methods: &'a dyn ShippingMethodCatalog) -> Self {
        Self { pricer, methods }
    }

    /// Whether any line holds a variant that must be physically delivered.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown variant.
    pub fn is_shipping_required(&self, checkout: &Checkout) -> Result<bool> {
        for line in checkout.lines() {
            if self.pricer.variant(line)?.requires_shipping {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Combined weight of every line.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown variant and
    /// `Validation(WeightOverflow)` when the sum does not fit.
    pub fn total_weight(&self, checkout: &Checkout) -> Result<Weight> {
        checkout.lines().iter().try_fold(Weight::ZERO, |total, line| -> Result<Weight> {
            self.pricer
                .variant(line)?
                .weight
                .checked_times(line.quantity)
                .and_then(|weight| total.checked_add(weight))
                .ok_or_else(|| ValidationError::WeightOverflow.into())
        })
    }

    /// Shipping methods usable for this checkout, cheapest first.
    ///
    /// Empty when shipping is not required or no shipping address is set.
    /// Ties on price are broken by id, so the order is stable across calls.
    ///
    /// # Errors
    ///
    /// Propagates line pricing errors (unknown variant, currency mismatch,
    /// invalid quantity).
    pub fn valid_shipping_methods(
        &self,
        checkout: &Checkout,
        discounts: &[Discount],
    ) -> Result<Vec<ShippingMethod>> {
        let Some(address) = checkout.shipping_address() else {
            return Ok(Vec::new());
        };
        if !self.is_shipping_required(checkout)? {
            return Ok(Vec::new());
        }

        let subtotal = TaxedMoney::sum(
            checkout.currency(),
            checkout
                .lines()
                .iter()
                .map(|line| self.pricer.price(checkout, line, discounts))
                .collect::<Result<Vec<_>>>()?,
        )?;
        let weight = self.total_weight(checkout)?;

        let mut valid: Vec<ShippingMethod> = self
            .methods
            .methods()
            .into_iter()
            .filter(|method| {
                let applies = method.applies_to(address.country, subtotal.gross(), weight);
                if !applies {
                    tracing::debug!(
                        method_id = %method.id,
                        country = %address.country,
                        subtotal = %subtotal.gross(),
                        weight = %weight,
                        "Shipping method not applicable"
                    );
                }
                applies
            })
            .collect();
        valid.sort_by(|a, b| {
            a.price
                .amount()
                .cmp(&b.price.amount())
                .then(a.id.cmp(&b.id))
        });
        Ok(valid)
    }

    /// Whether the checkout's selected method is among the valid ones.
    /// A checkout without a selection is trivially valid.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::valid_shipping_methods`].
    pub fn is_valid_shipping_method(
        &self,
        checkout: &Checkout,
        discounts: &[Discount],
    ) -> Result<bool> {
        let Some(selected) = checkout.shipping_method() else {
            return Ok(true);
        };
        Ok(self
            .valid_shipping_methods(checkout, discounts)?
            .iter()
            .any(|method| method.id == selected))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use satchel_core::{Address, CurrencyCode, VariantId};

    use super::*;
    use crate::error::{CheckoutError, Entity};
    use crate::memory::{MemoryCatalog, MemoryShippingMethods};
    use crate::ports::VariantInfo;
    use crate::tax::FlatRateTax;

    fn inr(minor: i64) -> Money {
        Money::from_minor(minor, CurrencyCode::INR)
    }

    fn country(code: &str) -> CountryCode {
        CountryCode::parse(code).unwrap()
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with_variant_info(
                VariantId::new(1),
                VariantInfo {
                    unit_price: inr(1000),
                    weight: Weight::from_grams(500),
                    requires_shipping: true,
                },
            )
            .with_variant(VariantId::new(2), inr(500), false)
    }

    fn methods() -> MemoryShippingMethods {
        MemoryShippingMethods::new(vec![
            ShippingMethod {
                id: ShippingMethodId::new(1),
                name: "Express".to_string(),
                price: inr(1500),
                rule: ShippingRule::PriceBased {
                    min_order_price: None,
                    max_order_price: None,
                },
                countries: BTreeSet::new(),
            },
            ShippingMethod {
                id: ShippingMethodId::new(2),
                name: "Free over 50".to_string(),
                price: inr(0),
                rule: ShippingRule::PriceBased {
                    min_order_price: Some(inr(5000)),
                    max_order_price: None,
                },
                countries: BTreeSet::new(),
            },
            ShippingMethod {
                id: ShippingMethodId::new(3),
                name: "Light parcel".to_string(),
                price: inr(500),
                rule: ShippingRule::WeightBased {
                    min_weight: None,
                    max_weight: Some(Weight::from_grams(1000)),
                },
                countries: [country("IN")].into_iter().collect(),
            },
            ShippingMethod {
                id: ShippingMethodId::new(4),
                name: "Dollar post".to_string(),
                price: Money::from_minor(100, CurrencyCode::USD),
                rule: ShippingRule::PriceBased {
                    min_order_price: None,
                    max_order_price: None,
                },
                countries: BTreeSet::new(),
            },
        ])
    }

    fn checkout_to(code: &str, lines: &[(i32, u32)]) -> Checkout {
        let now = Utc::now();
        let mut checkout = Checkout::new(CurrencyCode::INR, now);
        for (variant, quantity) in lines {
            checkout.add_line(VariantId::new(*variant), *quantity, now).unwrap();
        }
        checkout.set_shipping_address(Some(Address::in_country(country(code))), now);
        checkout
    }

    fn ids(methods: &[ShippingMethod]) -> Vec<i32> {
        methods.iter().map(|m| m.id.as_i32()).collect()
    }

    #[test]
    fn test_shipping_required_if_any_line_is_physical() {
        let (catalog, tax, methods) = (catalog(), FlatRateTax::default(), methods());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);

        assert!(!evaluator.is_shipping_required(&checkout_to("IN", &[(2, 1)])).unwrap());
        assert!(evaluator.is_shipping_required(&checkout_to("IN", &[(1, 1), (2, 1)])).unwrap());
        assert!(!evaluator.is_shipping_required(&checkout_to("IN", &[])).unwrap());
    }

    #[test]
    fn test_no_methods_without_shipping_requirement_or_address() {
        let (catalog, tax, methods) = (catalog(), FlatRateTax::default(), methods());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);

        let digital = checkout_to("IN", &[(2, 1)]);
        assert!(evaluator.valid_shipping_methods(&digital, &[]).unwrap().is_empty());

        let mut no_address = checkout_to("IN", &[(1, 1)]);
        no_address.set_shipping_address(None, Utc::now());
        assert!(evaluator.valid_shipping_methods(&no_address, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_filters_by_country_price_and_weight() {
        let (catalog, tax, methods) = (catalog(), FlatRateTax::default(), methods());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);

        // 1 kg, 20.00: light parcel (IN only) and express.
        let checkout = checkout_to("IN", &[(1, 2)]);
        assert_eq!(ids(&evaluator.valid_shipping_methods(&checkout, &[]).unwrap()), [3, 1]);

        // Abroad: light parcel is IN-only.
        let checkout = checkout_to("US", &[(1, 2)]);
        assert_eq!(ids(&evaluator.valid_shipping_methods(&checkout, &[]).unwrap()), [1]);

        // 3 kg, 60.00: free shipping threshold reached, too heavy for light parcel.
        let checkout = checkout_to("IN", &[(1, 6)]);
        assert_eq!(ids(&evaluator.valid_shipping_methods(&checkout, &[]).unwrap()), [2, 1]);
    }

    #[test]
    fn test_discounts_lower_the_price_threshold_input() {
        let (catalog, tax, methods) = (catalog(), FlatRateTax::default(), methods());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);
        let checkout = checkout_to("US", &[(1, 6)]);
        let half_off = [Discount {
            name: "Half".to_string(),
            value: crate::discount::DiscountValue::Percentage(Decimal::from(50)),
            scope: crate::discount::DiscountScope::AllVariants,
        }];

        assert_eq!(ids(&evaluator.valid_shipping_methods(&checkout, &[]).unwrap()), [2, 1]);
        assert_eq!(
            ids(&evaluator.valid_shipping_methods(&checkout, &half_off).unwrap()),
            [1]
        );
    }

    #[test]
    fn test_valid_methods_are_idempotent() {
        let (catalog, tax, methods) = (catalog(), FlatRateTax::default(), methods());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);
        let checkout = checkout_to("IN", &[(1, 2)]);

        let first = evaluator.valid_shipping_methods(&checkout, &[]).unwrap();
        let second = evaluator.valid_shipping_methods(&checkout, &[]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_total_weight() {
        let (catalog, tax, methods) = (catalog(), FlatRateTax::default(), methods());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);
        let checkout = checkout_to("IN", &[(1, 3), (2, 4)]);
        assert_eq!(evaluator.total_weight(&checkout).unwrap(), Weight::from_grams(1500));
    }

    #[test]
    fn test_unknown_variant_is_not_found() {
        let (catalog, tax, methods) = (catalog(), FlatRateTax::default(), methods());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);
        let checkout = checkout_to("IN", &[(42, 1)]);
        assert!(matches!(
            evaluator.is_shipping_required(&checkout),
            Err(CheckoutError::NotFound { entity: Entity::Variant, .. })
        ));
    }

    #[test]
    fn test_selected_method_validity() {
        let (catalog, tax, methods) = (catalog(), FlatRateTax::default(), methods());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);
        let mut checkout = checkout_to("US", &[(1, 2)]);
        assert!(evaluator.is_valid_shipping_method(&checkout, &[]).unwrap());

        checkout.select_shipping_method(Some(ShippingMethodId::new(3)), Utc::now());
        assert!(!evaluator.is_valid_shipping_method(&checkout, &[]).unwrap());

        checkout.select_shipping_method(Some(ShippingMethodId::new(1)), Utc::now());
        assert!(evaluator.is_valid_shipping_method(&checkout, &[]).unwrap());
    }

    #[test]
    fn test_weight_overflow_is_an_error() {
        let catalog = MemoryCatalog::new().with_variant_info(
            VariantId::new(1),
            VariantInfo {
                unit_price: inr(1000),
                weight: Weight::from_kg(Decimal::MAX),
                requires_shipping: true,
            },
        );
        let (methods, tax) = (methods(), FlatRateTax::default());
        let evaluator = ShippingEvaluator::new(LinePricer::new(&catalog, &tax), &methods);
        let checkout = checkout_to("IN", &[(1, 2)]);

        assert!(matches!(
            evaluator.total_weight(&checkout),
            Err(CheckoutError::Validation(ValidationError::WeightOverflow))
        ));
    }
}
