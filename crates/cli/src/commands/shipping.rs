//! `satchel shipping`: shipping requirement and valid methods.

use std::path::Path;

use satchel_checkout::{PricedCheckout, ShippingMethod};
use satchel_core::Weight;
use serde::Serialize;

use super::{CommandError, fixture, print_json};

#[derive(Debug, Serialize)]
struct ShippingReport {
    shipping_required: bool,
    total_weight: Weight,
    methods: Vec<ShippingMethod>,
}

/// Load the fixture and print which shipping methods can serve it,
/// cheapest first.
///
/// # Errors
///
/// Returns an error if the fixture cannot be loaded or a line references an
/// unknown variant.
pub async fn run(path: &Path) -> Result<(), CommandError> {
    let (service, checkout) = fixture::load(path).await?.open()?;

    let report = ShippingReport {
        shipping_required: service.is_shipping_required(&checkout)?,
        total_weight: service.total_weight(&checkout)?,
        methods: service.valid_shipping_methods(&checkout, service.sales())?,
    };
    tracing::debug!(methods = report.methods.len(), "Valid shipping methods");

    print_json(&report)
}
