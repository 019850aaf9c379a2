//! `satchel schedule`: attach a delivery schedule.

use std::path::Path;

use chrono::NaiveDate;

use super::{CommandError, fixture, print_json};

/// Load the fixture, set the delivery schedule on its checkout and print it.
///
/// # Errors
///
/// Returns an error if the fixture cannot be loaded or the time slot is too
/// long.
pub async fn run(
    path: &Path,
    date: Option<NaiveDate>,
    slot: Option<&str>,
) -> Result<(), CommandError> {
    let (service, checkout) = fixture::load(path).await?.open()?;

    let schedule = service.schedule_delivery(checkout.token(), date, slot)?;

    print_json(&schedule)
}
