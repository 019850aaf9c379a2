//! Delivery scheduling: an optional delivery date and time slot per checkout.
//!
//! A checkout carries at most one [`DeliverySchedule`]. Setting a schedule
//! replaces the previous one wholesale; there is no way to unset it once
//! chosen.
//!
//! ```text
//! Unset ──set_schedule──▶ Scheduled(date, slot?) ──set_schedule──▶ Scheduled(date', slot'?)
//! ```

use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::checkout::Checkout;
use crate::clock::Clock;
use crate::error::{Result, ValidationError};

/// Free-text delivery window (e.g. "09:00-12:00"), interpreted by logistics.
///
/// Only the length is checked here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TimeSlot(String);

impl TimeSlot {
    /// Maximum length in characters.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a slot. Empty input means "no slot" and yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TimeSlotTooLong`] past 64 characters.
    pub fn parse(s: &str) -> std::result::Result<Option<Self>, ValidationError> {
        if s.is_empty() {
            return Ok(None);
        }
        let len = s.chars().count();
        if len > Self::MAX_LENGTH {
            return Err(ValidationError::TimeSlotTooLong {
                len,
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Some(Self(s.to_owned())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// When a checkout should be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySchedule {
    pub delivery_date: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_time_slot")]
    pub time_slot: Option<TimeSlot>,
}

fn deserialize_time_slot<'de, D>(deserializer: D) -> std::result::Result<Option<TimeSlot>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .as_deref()
        .map(TimeSlot::parse)
        .transpose()
        .map(Option::flatten)
        .map_err(serde::de::Error::custom)
}

/// Attaches delivery schedules to checkouts.
#[derive(Clone, Copy)]
pub struct DeliveryScheduler<'a> {
    clock: &'a dyn Clock,
}

impl<'a> DeliveryScheduler<'a> {
    #[must_use]
    pub const fn new(clock: &'a dyn Clock) -> Self {
        Self { clock }
    }

    /// Set the checkout's delivery schedule, replacing any previous one.
    ///
    /// `date` defaults to today's UTC date. An absent or empty `time_slot`
    /// is stored as no slot.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TimeSlotTooLong`] for slots past 64
    /// characters; the checkout is left untouched in that case.
    pub fn set_schedule(
        &self,
        checkout: &mut Checkout,
        date: Option<NaiveDate>,
        time_slot: Option<&str>,
    ) -> Result<DeliverySchedule> {
        let time_slot = time_slot.map(TimeSlot::parse).transpose()?.flatten();
        let schedule = DeliverySchedule {
            delivery_date: date.unwrap_or_else(|| self.clock.today()),
            time_slot,
        };

        tracing::info!(
            token = %checkout.token(),
            delivery_date = %schedule.delivery_date,
            time_slot = schedule.time_slot.as_ref().map_or("", TimeSlot::as_str),
            replaced = checkout.delivery_schedule().is_some(),
            "Delivery schedule set"
        );

        checkout.replace_delivery_schedule(schedule.clone(), self.clock.now());
        Ok(schedule)
    }

    /// The checkout's current schedule, if one was set.
    #[must_use]
    pub const fn schedule(checkout: &Checkout) -> Option<&DeliverySchedule> {
        checkout.delivery_schedule()
    }
}
