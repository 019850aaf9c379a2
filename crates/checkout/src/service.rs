//! The checkout service: persisted operations over the engine.
//!
//! [`CheckoutService`] loads a checkout from the repository, runs the
//! requested mutation or computation, and saves the result. It is cheaply
//! cloneable and can be shared across request tasks.

use std::sync::Arc;

use chrono::NaiveDate;
use satchel_core::{
    Address, CheckoutLineId, CheckoutToken, CurrencyCode, Email, GiftCardId, Metadata, Permission,
    Permissions, ShippingMethodId, TaxedMoney, VariantId, Weight,
};
use tracing::instrument;

use crate::checkout::{Checkout, Customer, MetadataScope};
use crate::clock::{Clock, SystemClock};
use crate::config::{CheckoutConfig, PaymentGateway};
use crate::discount::Discount;
use crate::error::{CheckoutError, Entity, Result, ValidationError};
use crate::ports::{
    CheckoutRepository, GiftCardRepository, ShippingMethodCatalog, TaxCalculator, VariantCatalog,
    VoucherResolver,
};
use crate::pricing::LinePricer;
use crate::schedule::{DeliverySchedule, DeliveryScheduler};
use crate::shipping::{ShippingEvaluator, ShippingMethod};
use crate::totals::{Totalizer, Valuation};

// =============================================================================
// Capabilities
// =============================================================================

/// Price and shipping figures of a checkout.
pub trait PricedCheckout {
    /// Total of one line.
    ///
    /// # Errors
    ///
    /// `NotFound` for a line not in the checkout, plus line pricing errors.
    fn line_total(
        &self,
        checkout: &Checkout,
        line_id: CheckoutLineId,
        discounts: &[Discount],
    ) -> Result<TaxedMoney>;

    /// Whether any line needs physical delivery.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown variant.
    fn is_shipping_required(&self, checkout: &Checkout) -> Result<bool>;

    /// Usable shipping methods, cheapest first.
    ///
    /// # Errors
    ///
    /// Propagates line pricing errors.
    fn valid_shipping_methods(
        &self,
        checkout: &Checkout,
        discounts: &[Discount],
    ) -> Result<Vec<ShippingMethod>>;

    /// Sum of line totals.
    ///
    /// # Errors
    ///
    /// Propagates line pricing errors.
    fn subtotal(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<TaxedMoney>;

    /// Taxed price of the selected shipping method.
    ///
    /// # Errors
    ///
    /// `NotFound` for a method missing from the catalog.
    fn shipping_price(&self, checkout: &Checkout) -> Result<TaxedMoney>;

    /// Amount payable, never negative.
    ///
    /// # Errors
    ///
    /// Propagates errors of the component figures.
    fn total(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<TaxedMoney>;

    /// Every summary figure at once.
    ///
    /// # Errors
    ///
    /// Propagates errors of the component figures.
    fn valuate(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<Valuation>;
}

/// Delivery scheduling of a checkout.
pub trait ScheduledCheckout {
    /// Replace the checkout's delivery schedule.
    ///
    /// # Errors
    ///
    /// `Validation(TimeSlotTooLong)` for an overlong slot.
    fn set_schedule(
        &self,
        checkout: &mut Checkout,
        date: Option<NaiveDate>,
        time_slot: Option<&str>,
    ) -> Result<DeliverySchedule>;

    /// The current schedule, if any.
    fn schedule<'c>(&self, checkout: &'c Checkout) -> Option<&'c DeliverySchedule>;
}

// =============================================================================
// Service
// =============================================================================

/// Everything the service delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn VariantCatalog>,
    pub taxes: Arc<dyn TaxCalculator>,
    pub shipping_methods: Arc<dyn ShippingMethodCatalog>,
    pub vouchers: Arc<dyn VoucherResolver>,
    pub checkouts: Arc<dyn CheckoutRepository>,
    pub gift_cards: Arc<dyn GiftCardRepository>,
    /// Storewide sales applied when persisted operations price lines.
    pub sales: Vec<Discount>,
}

/// Checkout operations backed by a repository.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct CheckoutService {
    inner: Arc<CheckoutServiceInner>,
}

struct CheckoutServiceInner {
    config: CheckoutConfig,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
}

impl CheckoutService {
    /// Create a service using the system clock.
    #[must_use]
    pub fn new(config: CheckoutConfig, collaborators: Collaborators) -> Self {
        Self::with_clock(config, collaborators, Arc::new(SystemClock))
    }

    /// Create a service with an explicit clock.
    #[must_use]
    pub fn with_clock(
        config: CheckoutConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(CheckoutServiceInner {
                config,
                collaborators,
                clock,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    /// Storewide sales used by persisted operations.
    #[must_use]
    pub fn sales(&self) -> &[Discount] {
        &self.inner.collaborators.sales
    }

    /// Payment gateways a checkout can be paid through.
    #[must_use]
    pub fn available_payment_gateways(&self) -> &[PaymentGateway] {
        &self.inner.config.payment_gateways
    }

    /// Email to contact the shopper at.
    #[must_use]
    pub fn customer_email<'c>(&self, checkout: &'c Checkout) -> Option<&'c Email> {
        checkout.customer_email()
    }

    /// Staff-only metadata.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without [`Permission::ManageOrders`].
    pub fn private_metadata<'c>(
        &self,
        checkout: &'c Checkout,
        permissions: &Permissions,
    ) -> Result<&'c Metadata> {
        require(permissions, Permission::ManageOrders)?;
        Ok(checkout.private_metadata())
    }

    /// Combined weight of the checkout's lines.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown variant.
    pub fn total_weight(&self, checkout: &Checkout) -> Result<Weight> {
        self.evaluator().total_weight(checkout)
    }

    fn pricer(&self) -> LinePricer<'_> {
        let c = &self.inner.collaborators;
        LinePricer::new(c.catalog.as_ref(), c.taxes.as_ref())
    }

    fn evaluator(&self) -> ShippingEvaluator<'_> {
        ShippingEvaluator::new(
            self.pricer(),
            self.inner.collaborators.shipping_methods.as_ref(),
        )
    }

    fn totalizer(&self) -> Totalizer<'_> {
        let c = &self.inner.collaborators;
        Totalizer::new(
            self.pricer(),
            c.shipping_methods.as_ref(),
            c.taxes.as_ref(),
            c.gift_cards.as_ref(),
            self.inner.clock.today(),
        )
    }

    fn load(&self, token: CheckoutToken) -> Result<Checkout> {
        self.inner
            .collaborators
            .checkouts
            .get(token)?
            .ok_or_else(|| CheckoutError::not_found(Entity::Checkout, token))
    }

    fn store(&self, checkout: &Checkout) -> Result<()> {
        Ok(self.inner.collaborators.checkouts.save(checkout)?)
    }

    /// Drop the selected shipping method if it no longer applies.
    fn clean_shipping_method(&self, checkout: &mut Checkout) -> Result<()> {
        if self
            .evaluator()
            .is_valid_shipping_method(checkout, self.sales())?
        {
            return Ok(());
        }
        tracing::warn!(
            token = %checkout.token(),
            method_id = ?checkout.shipping_method(),
            "Selected shipping method is no longer valid, removing it"
        );
        checkout.select_shipping_method(None, self.inner.clock.now());
        Ok(())
    }

    /// Recompute the voucher discount for the current lines. A voucher whose
    /// conditions are no longer met is removed.
    fn refresh_voucher(&self, checkout: &mut Checkout) -> Result<()> {
        let Some(code) = checkout.voucher_code().map(str::to_owned) else {
            return Ok(());
        };
        let now = self.inner.clock.now();
        let subtotal = self.totalizer().subtotal(checkout, self.sales())?;

        if let Some(voucher) = self
            .inner
            .collaborators
            .vouchers
            .resolve(checkout, &code, &subtotal)
        {
            if checkout.apply_voucher(voucher, now).is_ok() {
                return Ok(());
            }
        }
        tracing::warn!(
            token = %checkout.token(),
            code = %code,
            "Voucher no longer applies, removing it"
        );
        checkout.remove_voucher(now);
        Ok(())
    }

    /// Re-check the voucher and the shipping method after the lines or the
    /// destination changed.
    fn revalidate(&self, checkout: &mut Checkout) -> Result<()> {
        self.refresh_voucher(checkout)?;
        self.clean_shipping_method(checkout)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Create and persist an empty checkout, in `currency` or the configured
    /// default.
    ///
    /// # Errors
    ///
    /// Returns a repository error if saving fails.
    #[instrument(skip(self))]
    pub fn create_checkout(&self, currency: Option<CurrencyCode>) -> Result<Checkout> {
        let currency = currency.unwrap_or(self.inner.config.default_currency);
        let checkout = Checkout::new(currency, self.inner.clock.now());
        self.store(&checkout)?;
        tracing::info!(token = %checkout.token(), %currency, "Checkout created");
        Ok(checkout)
    }

    /// Load a checkout.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown token.
    #[instrument(skip(self), fields(token = %token))]
    pub fn checkout(&self, token: CheckoutToken) -> Result<Checkout> {
        self.load(token)
    }

    /// Delete a checkout together with its lines and schedule.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown token.
    #[instrument(skip(self), fields(token = %token))]
    pub fn delete_checkout(&self, token: CheckoutToken) -> Result<()> {
        if self.inner.collaborators.checkouts.delete(token)? {
            Ok(())
        } else {
            Err(CheckoutError::not_found(Entity::Checkout, token))
        }
    }

    /// Every checkout, most recently changed first.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without [`Permission::ManageOrders`].
    #[instrument(skip_all)]
    pub fn list_checkouts(&self, permissions: &Permissions) -> Result<Vec<Checkout>> {
        require(permissions, Permission::ManageOrders)?;
        Ok(self.inner.collaborators.checkouts.list()?)
    }

    // -------------------------------------------------------------------------
    // Lines
    // -------------------------------------------------------------------------

    /// Add variants to a checkout, merging with existing lines.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown checkout or variant
    /// - `Validation(InvalidQuantity)` for a zero quantity
    #[instrument(skip(self, lines), fields(token = %token, count = lines.len()))]
    pub fn add_lines(&self, token: CheckoutToken, lines: &[(VariantId, u32)]) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        let now = self.inner.clock.now();
        let catalog = self.inner.collaborators.catalog.as_ref();
        for &(variant_id, quantity) in lines {
            if catalog.variant(variant_id).is_none() {
                return Err(CheckoutError::not_found(Entity::Variant, variant_id));
            }
            checkout.add_line(variant_id, quantity, now)?;
        }
        self.revalidate(&mut checkout)?;
        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout or line.
    #[instrument(skip(self), fields(token = %token, line_id = %line_id))]
    pub fn update_line(
        &self,
        token: CheckoutToken,
        line_id: CheckoutLineId,
        quantity: u32,
    ) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.update_line_quantity(line_id, quantity, self.inner.clock.now())?;
        self.revalidate(&mut checkout)?;
        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout or line.
    #[instrument(skip(self), fields(token = %token, line_id = %line_id))]
    pub fn delete_line(&self, token: CheckoutToken, line_id: CheckoutLineId) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.delete_line(line_id, self.inner.clock.now())?;
        self.revalidate(&mut checkout)?;
        self.store(&checkout)?;
        Ok(checkout)
    }

    // -------------------------------------------------------------------------
    // Addresses and shipping
    // -------------------------------------------------------------------------

    /// Set the shipping address. A selected method that no longer serves
    /// the new destination is removed, and the voucher discount is
    /// recomputed for the destination's taxes.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout.
    #[instrument(skip(self, address), fields(token = %token))]
    pub fn update_shipping_address(
        &self,
        token: CheckoutToken,
        address: Address,
    ) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.set_shipping_address(Some(address), self.inner.clock.now());
        self.revalidate(&mut checkout)?;
        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Set the billing address.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout.
    #[instrument(skip(self, address), fields(token = %token))]
    pub fn update_billing_address(
        &self,
        token: CheckoutToken,
        address: Address,
    ) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.set_billing_address(Some(address), self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Select a shipping method, or clear the selection with `None`.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown checkout or method
    /// - `Validation(ShippingMethodNotApplicable)` if the method cannot
    ///   serve this checkout
    #[instrument(skip(self), fields(token = %token))]
    pub fn update_shipping_method(
        &self,
        token: CheckoutToken,
        method_id: Option<ShippingMethodId>,
    ) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        if let Some(id) = method_id {
            if self.inner.collaborators.shipping_methods.method(id).is_none() {
                return Err(CheckoutError::not_found(Entity::ShippingMethod, id));
            }
            let valid = self.evaluator().valid_shipping_methods(&checkout, self.sales())?;
            if !valid.iter().any(|method| method.id == id) {
                return Err(ValidationError::ShippingMethodNotApplicable(id).into());
            }
        }
        checkout.select_shipping_method(method_id, self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    // -------------------------------------------------------------------------
    // Promo codes
    // -------------------------------------------------------------------------

    /// Apply a promo code: a voucher if one matches, otherwise a gift card.
    ///
    /// # Errors
    ///
    /// - `Validation(VoucherNotApplicable)` if neither matches
    /// - `Validation(GiftCardInactive)` for an inactive or expired card
    /// - `CurrencyMismatch` for a card in another currency
    #[instrument(skip(self), fields(token = %token))]
    pub fn add_promo_code(&self, token: CheckoutToken, code: &str) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        let now = self.inner.clock.now();
        let c = &self.inner.collaborators;

        let subtotal = self.totalizer().subtotal(&checkout, self.sales())?;
        if let Some(voucher) = c.vouchers.resolve(&checkout, code, &subtotal) {
            tracing::info!(
                token = %checkout.token(),
                code = %voucher.code,
                amount = %voucher.amount,
                "Voucher applied"
            );
            checkout.apply_voucher(voucher, now)?;
        } else if let Some(card) = c.gift_cards.by_code(code)? {
            if !card.is_usable_on(self.inner.clock.today()) {
                return Err(ValidationError::GiftCardInactive(card.code().to_string()).into());
            }
            card.current_balance().ensure_currency(checkout.currency())?;
            checkout.add_gift_card(card.id(), now);
        } else {
            return Err(ValidationError::VoucherNotApplicable(code.to_string()).into());
        }

        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Remove a promo code: the applied voucher if it matches, otherwise the
    /// gift card with that code. Unknown codes are ignored.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout.
    #[instrument(skip(self), fields(token = %token))]
    pub fn remove_promo_code(&self, token: CheckoutToken, code: &str) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        let now = self.inner.clock.now();
        let code = code.trim();

        if checkout
            .voucher_code()
            .is_some_and(|applied| applied.eq_ignore_ascii_case(code))
        {
            checkout.remove_voucher(now);
        } else if let Some(card) = self.inner.collaborators.gift_cards.by_code(code)? {
            checkout.remove_gift_card(card.id(), now);
        }

        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Detach a gift card by id.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout.
    #[instrument(skip(self), fields(token = %token, gift_card_id = %id))]
    pub fn remove_gift_card(&self, token: CheckoutToken, id: GiftCardId) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.remove_gift_card(id, self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    // -------------------------------------------------------------------------
    // Customer
    // -------------------------------------------------------------------------

    /// Attach a registered customer.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout.
    #[instrument(skip(self, customer), fields(token = %token, user_id = %customer.id))]
    pub fn attach_customer(&self, token: CheckoutToken, customer: Customer) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.attach_customer(customer, self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Detach the customer, leaving a guest checkout.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout.
    #[instrument(skip(self), fields(token = %token))]
    pub fn detach_customer(&self, token: CheckoutToken) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.detach_customer(self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Set the contact email.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout.
    #[instrument(skip(self, email), fields(token = %token))]
    pub fn update_email(&self, token: CheckoutToken, email: Email) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.set_email(Some(email), self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Set the shopper's note.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown checkout.
    #[instrument(skip(self, note), fields(token = %token))]
    pub fn update_note(&self, token: CheckoutToken, note: &str) -> Result<Checkout> {
        let mut checkout = self.load(token)?;
        checkout.set_note(note, self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// Merge entries into the public or private metadata.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` for private metadata without
    ///   [`Permission::ManageOrders`]
    /// - `NotFound` for an unknown checkout
    #[instrument(skip(self, entries, permissions), fields(token = %token))]
    pub fn update_metadata(
        &self,
        token: CheckoutToken,
        scope: MetadataScope,
        entries: Vec<(String, String)>,
        permissions: &Permissions,
    ) -> Result<Checkout> {
        if scope == MetadataScope::Private {
            require(permissions, Permission::ManageOrders)?;
        }
        let mut checkout = self.load(token)?;
        checkout.update_metadata(scope, entries, self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    /// Remove keys from the public or private metadata.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_metadata`].
    #[instrument(skip(self, keys, permissions), fields(token = %token))]
    pub fn clear_metadata(
        &self,
        token: CheckoutToken,
        scope: MetadataScope,
        keys: &[&str],
        permissions: &Permissions,
    ) -> Result<Checkout> {
        if scope == MetadataScope::Private {
            require(permissions, Permission::ManageOrders)?;
        }
        let mut checkout = self.load(token)?;
        checkout.clear_metadata(scope, keys.iter().copied(), self.inner.clock.now());
        self.store(&checkout)?;
        Ok(checkout)
    }

    // -------------------------------------------------------------------------
    // Delivery
    // -------------------------------------------------------------------------

    /// Set and persist the delivery schedule of a stored checkout.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown checkout
    /// - `Validation(TimeSlotTooLong)` for an overlong slot
    #[instrument(skip(self), fields(token = %token))]
    pub fn schedule_delivery(
        &self,
        token: CheckoutToken,
        date: Option<NaiveDate>,
        time_slot: Option<&str>,
    ) -> Result<DeliverySchedule> {
        let mut checkout = self.load(token)?;
        let schedule = self.set_schedule(&mut checkout, date, time_slot)?;
        self.store(&checkout)?;
        Ok(schedule)
    }
}

impl PricedCheckout for CheckoutService {
    fn line_total(
        &self,
        checkout: &Checkout,
        line_id: CheckoutLineId,
        discounts: &[Discount],
    ) -> Result<TaxedMoney> {
        let line = checkout
            .line(line_id)
            .ok_or_else(|| CheckoutError::not_found(Entity::Line, line_id))?;
        self.pricer().price(checkout, line, discounts)
    }

    fn is_shipping_required(&self, checkout: &Checkout) -> Result<bool> {
        self.evaluator().is_shipping_required(checkout)
    }

    fn valid_shipping_methods(
        &self,
        checkout: &Checkout,
        discounts: &[Discount],
    ) -> Result<Vec<ShippingMethod>> {
        self.evaluator().valid_shipping_methods(checkout, discounts)
    }

    fn subtotal(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<TaxedMoney> {
        self.totalizer().subtotal(checkout, discounts)
    }

    fn shipping_price(&self, checkout: &Checkout) -> Result<TaxedMoney> {
        self.totalizer().shipping_price(checkout)
    }

    fn total(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<TaxedMoney> {
        self.totalizer().total(checkout, discounts)
    }

    fn valuate(&self, checkout: &Checkout, discounts: &[Discount]) -> Result<Valuation> {
        self.totalizer().valuate(checkout, discounts)
    }
}

impl ScheduledCheckout for CheckoutService {
    fn set_schedule(
        &self,
        checkout: &mut Checkout,
        date: Option<NaiveDate>,
        time_slot: Option<&str>,
    ) -> Result<DeliverySchedule> {
        DeliveryScheduler::new(self.inner.clock.as_ref()).set_schedule(checkout, date, time_slot)
    }

    fn schedule<'c>(&self, checkout: &'c Checkout) -> Option<&'c DeliverySchedule> {
        DeliveryScheduler::schedule(checkout)
    }
}

fn require(permissions: &Permissions, permission: Permission) -> Result<()> {
    if permissions.has(permission) {
        Ok(())
    } else {
        Err(CheckoutError::PermissionDenied(permission))
    }
}
