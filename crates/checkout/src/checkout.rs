//! The checkout aggregate.
//!
//! A [`Checkout`] is the aggregate root: it owns its lines and its delivery
//! schedule by value, so saving or deleting a checkout always saves or
//! deletes them together. Gift cards are shared records and are only
//! referenced by id.
//!
//! Mutations here only touch local state and stamp `last_change`. Anything
//! that needs the catalog, the shipping-method catalog or a voucher lookup
//! lives on [`CheckoutService`](crate::CheckoutService).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use satchel_core::{
    Address, CheckoutLineId, CheckoutToken, CurrencyCode, Email, GiftCardId, Metadata, Money,
    ShippingMethodId, UserId, VariantId,
};
use serde::{Deserialize, Serialize};

use crate::discount::VoucherDiscount;
use crate::error::{CheckoutError, Entity, Result, ValidationError};
use crate::schedule::DeliverySchedule;

/// One product variant in a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub id: CheckoutLineId,
    pub variant_id: VariantId,
    /// Always positive for lines created through [`Checkout::add_line`].
    pub quantity: u32,
}

/// The registered customer a checkout belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: UserId,
    pub email: Email,
}

/// Which metadata map an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataScope {
    /// Readable by anyone holding the checkout token.
    Public,
    /// Readable only by staff with `manage_orders`.
    Private,
}

/// An in-progress, unpaid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    token: CheckoutToken,
    currency: CurrencyCode,
    #[serde(default)]
    lines: Vec<CheckoutLine>,
    #[serde(default)]
    billing_address: Option<Address>,
    #[serde(default)]
    shipping_address: Option<Address>,
    #[serde(default)]
    shipping_method: Option<ShippingMethodId>,
    #[serde(default)]
    voucher_code: Option<String>,
    discount_amount: Money,
    #[serde(default)]
    discount_name: Option<String>,
    #[serde(default)]
    gift_cards: BTreeSet<GiftCardId>,
    #[serde(default)]
    note: String,
    #[serde(default)]
    customer: Option<Customer>,
    #[serde(default)]
    email: Option<Email>,
    created: DateTime<Utc>,
    last_change: DateTime<Utc>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    private_metadata: Metadata,
    #[serde(default)]
    delivery_schedule: Option<DeliverySchedule>,
}

impl Checkout {
    /// Start an empty guest checkout with a fresh token.
    #[must_use]
    pub fn new(currency: CurrencyCode, now: DateTime<Utc>) -> Self {
        Self {
            token: CheckoutToken::generate(),
            currency,
            lines: Vec::new(),
            billing_address: None,
            shipping_address: None,
            shipping_method: None,
            voucher_code: None,
            discount_amount: Money::zero(currency),
            discount_name: None,
            gift_cards: BTreeSet::new(),
            note: String::new(),
            customer: None,
            email: None,
            created: now,
            last_change: now,
            metadata: Metadata::new(),
            private_metadata: Metadata::new(),
            delivery_schedule: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub const fn token(&self) -> CheckoutToken {
        self.token
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    #[must_use]
    pub fn lines(&self) -> &[CheckoutLine] {
        &self.lines
    }

    /// Look up a line by id.
    #[must_use]
    pub fn line(&self, id: CheckoutLineId) -> Option<&CheckoutLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    /// Total number of items across all lines.
    #[must_use]
    pub fn quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    #[must_use]
    pub const fn billing_address(&self) -> Option<&Address> {
        self.billing_address.as_ref()
    }

    #[must_use]
    pub const fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    #[must_use]
    pub const fn shipping_method(&self) -> Option<ShippingMethodId> {
        self.shipping_method
    }

    #[must_use]
    pub fn voucher_code(&self) -> Option<&str> {
        self.voucher_code.as_deref()
    }

    #[must_use]
    pub const fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    #[must_use]
    pub fn discount_name(&self) -> Option<&str> {
        self.discount_name.as_deref()
    }

    #[must_use]
    pub const fn gift_cards(&self) -> &BTreeSet<GiftCardId> {
        &self.gift_cards
    }

    #[must_use]
    pub fn note(&self) -> &str {
        &self.note
    }

    #[must_use]
    pub const fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    #[must_use]
    pub const fn email(&self) -> Option<&Email> {
        self.email.as_ref()
    }

    /// The address to contact the shopper at: the registered customer's
    /// email when one is attached, otherwise the one given at checkout.
    #[must_use]
    pub fn customer_email(&self) -> Option<&Email> {
        self.customer
            .as_ref()
            .map(|customer| &customer.email)
            .or(self.email.as_ref())
    }

    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    #[must_use]
    pub const fn last_change(&self) -> DateTime<Utc> {
        self.last_change
    }

    /// Public metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Private metadata. Callers exposing this to an actor must check
    /// `Permission::ManageOrders` first.
    #[must_use]
    pub const fn private_metadata(&self) -> &Metadata {
        &self.private_metadata
    }

    #[must_use]
    pub const fn delivery_schedule(&self) -> Option<&DeliverySchedule> {
        self.delivery_schedule.as_ref()
    }

    // -------------------------------------------------------------------------
    // Lines
    // -------------------------------------------------------------------------

    /// Add `quantity` of `variant`, merging into an existing line for the
    /// same variant.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidQuantity`] for a zero quantity or
    /// when the merged quantity would not fit a `u32`.
    pub fn add_line(
        &mut self,
        variant_id: VariantId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<CheckoutLineId> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity(quantity).into());
        }

        let id = if let Some(line) = self.lines.iter_mut().find(|l| l.variant_id == variant_id) {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or(ValidationError::InvalidQuantity(quantity))?;
            line.id
        } else {
            let id = self.next_line_id();
            self.lines.push(CheckoutLine {
                id,
                variant_id,
                quantity,
            });
            id
        };

        self.touch(now);
        Ok(id)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line does not belong to this checkout.
    pub fn update_line_quantity(
        &mut self,
        line_id: CheckoutLineId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if quantity == 0 {
            return self.delete_line(line_id, now);
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| CheckoutError::not_found(Entity::Line, line_id))?;
        line.quantity = quantity;
        self.touch(now);
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line does not belong to this checkout.
    pub fn delete_line(&mut self, line_id: CheckoutLineId, now: DateTime<Utc>) -> Result<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        if self.lines.len() == before {
            return Err(CheckoutError::not_found(Entity::Line, line_id));
        }
        self.touch(now);
        Ok(())
    }

    fn next_line_id(&self) -> CheckoutLineId {
        let max = self.lines.iter().map(|l| l.id.as_i32()).max().unwrap_or(0);
        CheckoutLineId::new(max + 1)
    }

    // -------------------------------------------------------------------------
    // Addresses and shipping
    // -------------------------------------------------------------------------

    pub fn set_shipping_address(&mut self, address: Option<Address>, now: DateTime<Utc>) {
        self.shipping_address = address;
        self.touch(now);
    }

    pub fn set_billing_address(&mut self, address: Option<Address>, now: DateTime<Utc>) {
        self.billing_address = address;
        self.touch(now);
    }

    /// Record the selected shipping method without checking eligibility.
    pub fn select_shipping_method(&mut self, method: Option<ShippingMethodId>, now: DateTime<Utc>) {
        self.shipping_method = method;
        self.touch(now);
    }

    // -------------------------------------------------------------------------
    // Vouchers and gift cards
    // -------------------------------------------------------------------------

    /// Apply a resolved voucher, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the discount is negative or in another currency.
    pub fn apply_voucher(&mut self, voucher: VoucherDiscount, now: DateTime<Utc>) -> Result<()> {
        voucher.amount.ensure_currency(self.currency)?;
        if voucher.amount.is_negative() {
            return Err(ValidationError::VoucherNotApplicable(voucher.code).into());
        }
        self.voucher_code = Some(voucher.code);
        self.discount_amount = voucher.amount.quantize();
        self.discount_name = voucher.name;
        self.touch(now);
        Ok(())
    }

    /// Drop the voucher and its discount.
    pub fn remove_voucher(&mut self, now: DateTime<Utc>) {
        self.voucher_code = None;
        self.discount_amount = Money::zero(self.currency);
        self.discount_name = None;
        self.touch(now);
    }

    /// Reference a gift card. Returns `false` if it was already attached.
    pub fn add_gift_card(&mut self, id: GiftCardId, now: DateTime<Utc>) -> bool {
        let added = self.gift_cards.insert(id);
        if added {
            self.touch(now);
        }
        added
    }

    /// Drop a gift card reference. Returns `false` if it was not attached.
    pub fn remove_gift_card(&mut self, id: GiftCardId, now: DateTime<Utc>) -> bool {
        let removed = self.gift_cards.remove(&id);
        if removed {
            self.touch(now);
        }
        removed
    }

    // -------------------------------------------------------------------------
    // Customer details
    // -------------------------------------------------------------------------

    pub fn attach_customer(&mut self, customer: Customer, now: DateTime<Utc>) {
        self.customer = Some(customer);
        self.touch(now);
    }

    pub fn detach_customer(&mut self, now: DateTime<Utc>) {
        self.customer = None;
        self.touch(now);
    }

    pub fn set_email(&mut self, email: Option<Email>, now: DateTime<Utc>) {
        self.email = email;
        self.touch(now);
    }

    pub fn set_note(&mut self, note: impl Into<String>, now: DateTime<Utc>) {
        self.note = note.into();
        self.touch(now);
    }

    // -------------------------------------------------------------------------
    // Metadata and schedule
    // -------------------------------------------------------------------------

    /// Insert or overwrite metadata entries.
    pub fn update_metadata<I, K, V>(&mut self, scope: MetadataScope, entries: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata_mut(scope).update(entries);
        self.touch(now);
    }

    /// Remove metadata keys.
    pub fn clear_metadata<'a, I>(&mut self, scope: MetadataScope, keys: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.metadata_mut(scope).remove(keys);
        self.touch(now);
    }

    fn metadata_mut(&mut self, scope: MetadataScope) -> &mut Metadata {
        match scope {
            MetadataScope::Public => &mut self.metadata,
            MetadataScope::Private => &mut self.private_metadata,
        }
    }

    pub(crate) fn replace_delivery_schedule(
        &mut self,
        schedule: DeliverySchedule,
        now: DateTime<Utc>,
    ) {
        self.delivery_schedule = Some(schedule);
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_change = now;
    }
}
