//! In-memory collaborators.
//!
//! Used by the CLI, by tests, and by embedders that keep their catalog in
//! process. The store guards its maps with [`RwLock`]; saves are
//! last-writer-wins.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use satchel_core::{
    CheckoutToken, GiftCardId, Money, ShippingMethodId, TaxedMoney, VariantId, Weight,
};
use serde::{Deserialize, Serialize};

use crate::checkout::Checkout;
use crate::discount::{DiscountValue, VoucherDiscount};
use crate::error::RepositoryError;
use crate::gift_card::GiftCard;
use crate::ports::{
    CheckoutRepository, GiftCardRepository, ShippingMethodCatalog, VariantCatalog, VariantInfo,
    VoucherResolver,
};
use crate::shipping::ShippingMethod;

// =============================================================================
// Catalog
// =============================================================================

/// A fixed set of product variants.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    variants: BTreeMap<VariantId, VariantInfo>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a weightless variant.
    #[must_use]
    pub fn with_variant(self, id: VariantId, unit_price: Money, requires_shipping: bool) -> Self {
        self.with_variant_info(
            id,
            VariantInfo {
                unit_price,
                weight: Weight::ZERO,
                requires_shipping,
            },
        )
    }

    #[must_use]
    pub fn with_variant_info(mut self, id: VariantId, info: VariantInfo) -> Self {
        self.variants.insert(id, info);
        self
    }
}

impl FromIterator<(VariantId, VariantInfo)> for MemoryCatalog {
    fn from_iter<I: IntoIterator<Item = (VariantId, VariantInfo)>>(iter: I) -> Self {
        Self {
            variants: iter.into_iter().collect(),
        }
    }
}

impl VariantCatalog for MemoryCatalog {
    fn variant(&self, id: VariantId) -> Option<VariantInfo> {
        self.variants.get(&id).cloned()
    }
}

/// A fixed list of shipping methods.
#[derive(Debug, Clone, Default)]
pub struct MemoryShippingMethods {
    methods: Vec<ShippingMethod>,
}

impl MemoryShippingMethods {
    #[must_use]
    pub const fn new(methods: Vec<ShippingMethod>) -> Self {
        Self { methods }
    }
}

impl ShippingMethodCatalog for MemoryShippingMethods {
    fn methods(&self) -> Vec<ShippingMethod> {
        self.methods.clone()
    }

    fn method(&self, id: ShippingMethodId) -> Option<ShippingMethod> {
        self.methods.iter().find(|method| method.id == id).cloned()
    }
}

// =============================================================================
// Vouchers
// =============================================================================

/// A voucher definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    pub value: DiscountValue,
    /// Minimum subtotal (gross) the checkout must reach.
    #[serde(default)]
    pub min_spent: Option<Money>,
}

/// Voucher codes, matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct MemoryVouchers {
    vouchers: Vec<Voucher>,
}

impl MemoryVouchers {
    #[must_use]
    pub const fn new(vouchers: Vec<Voucher>) -> Self {
        Self { vouchers }
    }
}

impl VoucherResolver for MemoryVouchers {
    fn resolve(
        &self,
        checkout: &Checkout,
        code: &str,
        subtotal: &TaxedMoney,
    ) -> Option<VoucherDiscount> {
        let voucher = self
            .vouchers
            .iter()
            .find(|voucher| voucher.code.eq_ignore_ascii_case(code.trim()))?;

        let gross = subtotal.gross();
        if gross.currency() != checkout.currency() {
            return None;
        }
        if let Some(min_spent) = voucher.min_spent {
            if min_spent.currency() != gross.currency() || gross.amount() < min_spent.amount() {
                return None;
            }
        }

        // The discount can never exceed the subtotal.
        let discounted = voucher.value.apply(gross).ok()?;
        let amount = gross.checked_sub(discounted).ok()?.quantize();

        Some(VoucherDiscount {
            code: voucher.code.clone(),
            name: voucher.name.clone(),
            amount,
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Checkouts and gift cards held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    checkouts: RwLock<BTreeMap<CheckoutToken, Checkout>>,
    gift_cards: RwLock<BTreeMap<GiftCardId, GiftCard>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_gift_card(self, card: GiftCard) -> Self {
        self.insert_gift_card(card);
        self
    }

    /// Insert or replace a gift card.
    pub fn insert_gift_card(&self, card: GiftCard) {
        let mut cards = self
            .gift_cards
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        cards.insert(card.id(), card);
    }

    fn read_checkouts(
        &self,
    ) -> Result<RwLockReadGuard<'_, BTreeMap<CheckoutToken, Checkout>>, RepositoryError> {
        self.checkouts.read().map_err(poisoned)
    }

    fn write_checkouts(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<CheckoutToken, Checkout>>, RepositoryError> {
        self.checkouts.write().map_err(poisoned)
    }

    fn read_gift_cards(
        &self,
    ) -> Result<RwLockReadGuard<'_, BTreeMap<GiftCardId, GiftCard>>, RepositoryError> {
        self.gift_cards.read().map_err(poisoned)
    }
}

fn poisoned<T>(_: PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("in-memory store lock poisoned".to_string())
}

impl CheckoutRepository for MemoryStore {
    fn get(&self, token: CheckoutToken) -> Result<Option<Checkout>, RepositoryError> {
        Ok(self.read_checkouts()?.get(&token).cloned())
    }

    fn save(&self, checkout: &Checkout) -> Result<(), RepositoryError> {
        self.write_checkouts()?
            .insert(checkout.token(), checkout.clone());
        Ok(())
    }

    fn delete(&self, token: CheckoutToken) -> Result<bool, RepositoryError> {
        Ok(self.write_checkouts()?.remove(&token).is_some())
    }

    fn list(&self) -> Result<Vec<Checkout>, RepositoryError> {
        let mut checkouts: Vec<Checkout> = self.read_checkouts()?.values().cloned().collect();
        checkouts.sort_by(|a, b| b.last_change().cmp(&a.last_change()));
        Ok(checkouts)
    }
}

impl GiftCardRepository for MemoryStore {
    fn get(&self, id: GiftCardId) -> Result<Option<GiftCard>, RepositoryError> {
        Ok(self.read_gift_cards()?.get(&id).cloned())
    }

    fn by_code(&self, code: &str) -> Result<Option<GiftCard>, RepositoryError> {
        let code = code.trim();
        Ok(self
            .read_gift_cards()?
            .values()
            .find(|card| card.code().eq_ignore_ascii_case(code))
            .cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use satchel_core::CurrencyCode;

    use super::*;

    fn inr(minor: i64) -> Money {
        Money::from_minor(minor, CurrencyCode::INR)
    }

    fn vouchers() -> MemoryVouchers {
        MemoryVouchers::new(vec![
            Voucher {
                code: "SAVE10".to_string(),
                name: Some("Ten percent".to_string()),
                value: DiscountValue::Percentage(Decimal::TEN),
                min_spent: None,
            },
            Voucher {
                code: "FLAT500".to_string(),
                name: None,
                value: DiscountValue::Fixed(inr(50_000)),
                min_spent: Some(inr(2000)),
            },
        ])
    }

    #[test]
    fn test_voucher_code_is_case_insensitive() {
        let checkout = Checkout::new(CurrencyCode::INR, Utc::now());
        let subtotal = TaxedMoney::untaxed(inr(2555));

        let discount = vouchers().resolve(&checkout, "save10", &subtotal).unwrap();
        assert_eq!(discount.code, "SAVE10");
        assert_eq!(discount.amount, inr(256));
    }

    #[test]
    fn test_fixed_voucher_is_capped_at_subtotal() {
        let checkout = Checkout::new(CurrencyCode::INR, Utc::now());
        let subtotal = TaxedMoney::untaxed(inr(3000));

        let discount = vouchers().resolve(&checkout, "FLAT500", &subtotal).unwrap();
        assert_eq!(discount.amount, inr(3000));
    }

    #[test]
    fn test_voucher_minimum_spend() {
        let checkout = Checkout::new(CurrencyCode::INR, Utc::now());
        let subtotal = TaxedMoney::untaxed(inr(1999));

        assert!(vouchers().resolve(&checkout, "FLAT500", &subtotal).is_none());
        assert!(vouchers().resolve(&checkout, "NOPE", &subtotal).is_none());
    }

    #[test]
    fn test_store_roundtrip_and_delete() {
        let store = MemoryStore::new();
        let checkout = Checkout::new(CurrencyCode::INR, Utc::now());

        store.save(&checkout).unwrap();
        assert_eq!(CheckoutRepository::get(&store, checkout.token()).unwrap(), Some(checkout.clone()));
        assert!(store.delete(checkout.token()).unwrap());
        assert!(!store.delete(checkout.token()).unwrap());
        assert!(CheckoutRepository::get(&store, checkout.token()).unwrap().is_none());
    }

    #[test]
    fn test_list_most_recent_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let older = Checkout::new(CurrencyCode::INR, now - Duration::hours(1));
        let newer = Checkout::new(CurrencyCode::INR, now);
        store.save(&older).unwrap();
        store.save(&newer).unwrap();

        let tokens: Vec<_> = store.list().unwrap().iter().map(Checkout::token).collect();
        assert_eq!(tokens, [newer.token(), older.token()]);
    }

    #[test]
    fn test_gift_card_by_code() {
        let card = GiftCard::new(GiftCardId::new(1), "GIFT-ABC", inr(1000), inr(500)).unwrap();
        let store = MemoryStore::new().with_gift_card(card.clone());

        assert_eq!(store.by_code("gift-abc").unwrap(), Some(card));
        assert!(store.by_code("other").unwrap().is_none());
    }
}
