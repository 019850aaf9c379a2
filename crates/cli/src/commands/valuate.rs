//! `satchel valuate`: compute every figure of a checkout.

use std::path::Path;

use satchel_checkout::PricedCheckout;
use tracing::info;

use super::{CommandError, fixture, print_json};

/// Load the fixture and print its [`Valuation`](satchel_checkout::Valuation).
///
/// # Errors
///
/// Returns an error if the fixture cannot be loaded or the checkout cannot
/// be priced.
pub async fn run(path: &Path) -> Result<(), CommandError> {
    let (service, checkout) = fixture::load(path).await?.open()?;

    let valuation = service.valuate(&checkout, service.sales())?;
    info!(
        token = %checkout.token(),
        total = %valuation.total,
        "Checkout valuated"
    );

    print_json(&valuation)
}
