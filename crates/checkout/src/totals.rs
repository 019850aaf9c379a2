//! Checkout totals.

use chrono::NaiveDate;
use satchel_core::{Money, TaxedMoney};
use serde::Serialize;

use crate::checkout::Checkout;
use crate::discount::Discount;
use crate::error::{CheckoutError, Entity, Result};
use crate::ports::{GiftCardRepository, ShippingMethodCatalog, TaxCalculator, TaxContext};
use crate::pricing::LinePricer;
use crate::shipping::ShippingEvaluator;

/// Every figure of a checkout summary, computed in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Valuation {
    pub subtotal: TaxedMoney,
    pub shipping_price: TaxedMoney,
    pub discount: Money,
    pub gift_card_balance: Money,
    pub total: TaxedMoney,
    pub shipping_required: bool,
}

/// Computes subtotal, shipping price and payable total.
///
/// Gift card validity windows are checked against `today`.
#[derive(Clone, Copy)]
pub struct Totalizer<'a> {
    pricer: LinePricer<'a>,
    shipping: ShippingEvaluator<'a>,
    methods: &'a dyn ShippingMethodCatalog,
    taxes: &'a dyn TaxCalculator,
    gift_cards: &'a dyn GiftCardRepository,
    today: NaiveDate,
}

impl<'a> Totalizer<'a> {
    #[must_use]
    pub const fn new(
        pricer: LinePricer<'a>,
        methods: &'a dyn ShippingMethodCatalog,
        taxes: &'a dyn TaxCalculator,
        gift_cards: &'a dyn GiftCardRepository,
        today: NaiveDate,
    ) -> Self {
        Self {
            pricer,
            shipping: ShippingEvaluator::new(pricer, methods),
            methods,
            taxes,
            gift_cards,
            today,
        }
    }

    /// Sum of the line totals. Each line is already rounded; the sum is not
    /// rounded again.
    ///
    /// # Errors
    ///
    /// Propagates line pricing errors.
    pub fn subtotal(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<TaxedMoney> {
        let lines = checkout
            .lines()
            .iter()
            .map(|line| self.pricer.price(checkout, line, discounts))
            .collect::<Result<Vec<_>>>()?;
        Ok(TaxedMoney::sum(checkout.currency(), lines)?)
    }

    /// Taxed price of the selected shipping method.
    ///
    /// Zero when shipping is not required or no method is selected.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the selected method is not in the catalog
    /// - `CurrencyMismatch` if it is priced in another currency
    pub fn shipping_price(&self, checkout: &Checkout) -> Result<TaxedMoney> {
        let zero = TaxedMoney::zero(checkout.currency());
        let Some(method_id) = checkout.shipping_method() else {
            return Ok(zero);
        };
        if !self.shipping.is_shipping_required(checkout)? {
            return Ok(zero);
        }

        let method = self
            .methods
            .method(method_id)
            .ok_or_else(|| CheckoutError::not_found(Entity::ShippingMethod, method_id))?;
        method.price.ensure_currency(checkout.currency())?;

        let taxed = self
            .taxes
            .apply(method.price, &TaxContext::for_checkout(checkout))?;
        Ok(taxed.quantize())
    }

    /// Combined current balance of the checkout's gift cards that are
    /// usable today.
    ///
    /// # Errors
    ///
    /// - `NotFound` if a referenced card no longer exists
    /// - `CurrencyMismatch` if a card holds another currency
    pub fn gift_card_balance(&self, checkout: &Checkout) -> Result<Money> {
        let mut balances = Vec::with_capacity(checkout.gift_cards().len());
        for &id in checkout.gift_cards() {
            let card = self
                .gift_cards
                .get(id)?
                .ok_or_else(|| CheckoutError::not_found(Entity::GiftCard, id))?;
            if card.is_usable_on(self.today) {
                balances.push(card.current_balance());
            } else {
                tracing::debug!(gift_card_id = %id, "Skipping unusable gift card");
            }
        }
        Ok(Money::sum(checkout.currency(), balances)?)
    }

    /// Amount payable: subtotal plus shipping minus the voucher discount,
    /// floored at zero, then minus gift card balances, floored again.
    ///
    /// # Errors
    ///
    /// Propagates errors from the subtotal, shipping price and gift card
    /// lookups.
    pub fn total(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<TaxedMoney> {
        let subtotal = self.subtotal(checkout, discounts)?;
        let shipping_price = self.shipping_price(checkout)?;
        let gift_card_balance = self.gift_card_balance(checkout)?;
        Self::combine(checkout, subtotal, shipping_price, gift_card_balance)
    }

    /// All summary figures at once.
    ///
    /// # Errors
    ///
    /// Same as [`Self::total`].
    pub fn valuate(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<Valuation> {
        let subtotal = self.subtotal(checkout, discounts)?;
        let shipping_price = self.shipping_price(checkout)?;
        let gift_card_balance = self.gift_card_balance(checkout)?;
        let total = Self::combine(checkout, subtotal, shipping_price, gift_card_balance)?;

        Ok(Valuation {
            subtotal,
            shipping_price,
            discount: checkout.discount_amount(),
            gift_card_balance,
            total,
            shipping_required: self.shipping.is_shipping_required(checkout)?,
        })
    }

    fn combine(
        checkout: &Checkout,
        subtotal: TaxedMoney,
        shipping_price: TaxedMoney,
        gift_card_balance: Money,
    ) -> Result<TaxedMoney> {
        let discount = checkout.discount_amount();
        discount.ensure_currency(checkout.currency())?;

        let before_gift_cards = subtotal
            .checked_add(shipping_price)?
            .checked_sub_money(discount)?
            .floor_at_zero();

        Ok(before_gift_cards
            .checked_sub_money(gift_card_balance)?
            .floor_at_zero())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use satchel_core::{
        Address, CountryCode, CurrencyCode, GiftCardId, ShippingMethodId, VariantId,
    };

    use super::*;
    use crate::discount::VoucherDiscount;
    use crate::gift_card::GiftCard;
    use crate::memory::{MemoryCatalog, MemoryShippingMethods, MemoryStore};
    use crate::shipping::{ShippingMethod, ShippingRule};
    use crate::tax::FlatRateTax;

    fn inr(minor: i64) -> Money {
        Money::from_minor(minor, CurrencyCode::INR)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    struct Fixture {
        catalog: MemoryCatalog,
        methods: MemoryShippingMethods,
        tax: FlatRateTax,
        store: MemoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                catalog: MemoryCatalog::new()
                    .with_variant(VariantId::new(1), inr(1000), true)
                    .with_variant(VariantId::new(2), inr(999), false),
                methods: MemoryShippingMethods::new(vec![ShippingMethod {
                    id: ShippingMethodId::new(1),
                    name: "Standard".to_string(),
                    price: inr(500),
                    rule: ShippingRule::PriceBased {
                        min_order_price: None,
                        max_order_price: None,
                    },
                    countries: BTreeSet::new(),
                }]),
                tax: FlatRateTax::default(),
                store: MemoryStore::new(),
            }
        }

        fn totalizer(&self) -> Totalizer<'_> {
            Totalizer::new(
                LinePricer::new(&self.catalog, &self.tax),
                &self.methods,
                &self.tax,
                &self.store,
                today(),
            )
        }
    }

    fn shipped_checkout(lines: &[(i32, u32)]) -> Checkout {
        let now = Utc::now();
        let mut checkout = Checkout::new(CurrencyCode::INR, now);
        for (variant, quantity) in lines {
            checkout.add_line(VariantId::new(*variant), *quantity, now).unwrap();
        }
        checkout.set_shipping_address(
            Some(Address::in_country(CountryCode::parse("IN").unwrap())),
            now,
        );
        checkout.select_shipping_method(Some(ShippingMethodId::new(1)), now);
        checkout
    }

    #[test]
    fn test_empty_checkout_is_zero() {
        let fixture = Fixture::new();
        let checkout = Checkout::new(CurrencyCode::INR, Utc::now());
        let totals = fixture.totalizer();

        assert_eq!(totals.subtotal(&checkout, &[]).unwrap(), TaxedMoney::zero(CurrencyCode::INR));
        assert_eq!(totals.total(&checkout, &[]).unwrap(), TaxedMoney::zero(CurrencyCode::INR));
    }

    #[test]
    fn test_subtotal_plus_shipping() {
        let fixture = Fixture::new();
        let checkout = shipped_checkout(&[(1, 2)]);

        let total = fixture.totalizer().total(&checkout, &[]).unwrap();
        assert_eq!(total, TaxedMoney::untaxed(inr(2500)));
    }

    #[test]
    fn test_subtotal_is_sum_of_line_totals() {
        let fixture = Fixture::new();
        let checkout = shipped_checkout(&[(1, 2), (2, 3)]);
        let totals = fixture.totalizer();
        let pricer = LinePricer::new(&fixture.catalog, &fixture.tax);

        let lines = checkout
            .lines()
            .iter()
            .map(|line| pricer.price(&checkout, line, &[]).unwrap());
        let expected = TaxedMoney::sum(CurrencyCode::INR, lines).unwrap();
        assert_eq!(totals.subtotal(&checkout, &[]).unwrap(), expected);
        assert_eq!(expected.gross(), inr(4997));
    }

    #[test]
    fn test_shipping_is_free_when_not_required() {
        let fixture = Fixture::new();
        let checkout = shipped_checkout(&[(2, 1)]);

        let totals = fixture.totalizer();
        assert_eq!(
            totals.shipping_price(&checkout).unwrap(),
            TaxedMoney::zero(CurrencyCode::INR)
        );
        assert_eq!(totals.total(&checkout, &[]).unwrap().gross(), inr(999));
    }

    #[test]
    fn test_unknown_shipping_method_is_not_found() {
        let fixture = Fixture::new();
        let mut checkout = shipped_checkout(&[(1, 1)]);
        checkout.select_shipping_method(Some(ShippingMethodId::new(7)), Utc::now());

        assert!(matches!(
            fixture.totalizer().shipping_price(&checkout),
            Err(CheckoutError::NotFound { entity: Entity::ShippingMethod, .. })
        ));
    }

    #[test]
    fn test_shipping_is_taxed() {
        let mut fixture = Fixture::new();
        fixture.tax = FlatRateTax::new(Decimal::from(10), false);
        let checkout = shipped_checkout(&[(1, 1)]);

        let shipping = fixture.totalizer().shipping_price(&checkout).unwrap();
        assert_eq!(shipping.net(), inr(500));
        assert_eq!(shipping.gross(), inr(550));
    }

    #[test]
    fn test_discount_larger_than_total_floors_at_zero() {
        let fixture = Fixture::new();
        let mut checkout = shipped_checkout(&[(1, 1)]);
        checkout
            .apply_voucher(
                VoucherDiscount {
                    code: "BIG".to_string(),
                    name: None,
                    amount: inr(10_000),
                },
                Utc::now(),
            )
            .unwrap();

        let total = fixture.totalizer().total(&checkout, &[]).unwrap();
        assert_eq!(total, TaxedMoney::zero(CurrencyCode::INR));
    }

    #[test]
    fn test_gift_card_covers_total() {
        let fixture = Fixture::new();
        let card = GiftCard::new(GiftCardId::new(1), "GIFT-30", inr(3000), inr(3000)).unwrap();
        fixture.store.insert_gift_card(card);
        let mut checkout = shipped_checkout(&[(1, 2)]);
        checkout.add_gift_card(GiftCardId::new(1), Utc::now());

        let valuation = fixture.totalizer().valuate(&checkout, &[]).unwrap();
        assert_eq!(valuation.subtotal.gross(), inr(2000));
        assert_eq!(valuation.shipping_price.gross(), inr(500));
        assert_eq!(valuation.gift_card_balance, inr(3000));
        assert_eq!(valuation.total, TaxedMoney::zero(CurrencyCode::INR));
        assert!(valuation.shipping_required);
    }

    #[test]
    fn test_expired_gift_card_is_ignored() {
        let fixture = Fixture::new();
        let card = GiftCard::new(GiftCardId::new(1), "OLD", inr(3000), inr(3000))
            .unwrap()
            .with_validity(None, NaiveDate::from_ymd_opt(2026, 2, 1));
        fixture.store.insert_gift_card(card);
        let mut checkout = shipped_checkout(&[(1, 2)]);
        checkout.add_gift_card(GiftCardId::new(1), Utc::now());

        let totals = fixture.totalizer();
        assert_eq!(totals.gift_card_balance(&checkout).unwrap(), inr(0));
        assert_eq!(totals.total(&checkout, &[]).unwrap().gross(), inr(2500));
    }

    #[test]
    fn test_missing_gift_card_is_not_found() {
        let fixture = Fixture::new();
        let mut checkout = shipped_checkout(&[(1, 1)]);
        checkout.add_gift_card(GiftCardId::new(9), Utc::now());

        assert!(matches!(
            fixture.totalizer().total(&checkout, &[]),
            Err(CheckoutError::NotFound { entity: Entity::GiftCard, .. })
        ));
    }

    #[test]
    fn test_total_keeps_gross_above_net() {
        let mut fixture = Fixture::new();
        fixture.tax = FlatRateTax::new(Decimal::from(18), false);
        let mut checkout = shipped_checkout(&[(1, 1)]);
        checkout
            .apply_voucher(
                VoucherDiscount {
                    code: "TEN".to_string(),
                    name: Some("Ten off".to_string()),
                    amount: inr(1500),
                },
                Utc::now(),
            )
            .unwrap();

        // 15.00 net / 17.70 gross minus 15.00
        let total = fixture.totalizer().total(&checkout, &[]).unwrap();
        assert_eq!(total.net(), inr(0));
        assert_eq!(total.gross(), inr(270));
        assert!(total.gross().amount() >= total.net().amount());
    }
}
