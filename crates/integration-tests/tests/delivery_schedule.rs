//! Delivery scheduling through the service.

#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use satchel_checkout::{CheckoutError, ScheduledCheckout, ValidationError};
use satchel_integration_tests::{SHIRT, TestContext, now, today};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// =============================================================================
// Setting a Schedule
// =============================================================================

#[test]
fn test_explicit_date_and_slot_round_trip() {
    let service = TestContext::new().build();
    let token = service.create_checkout(None).unwrap().token();

    let schedule = service
        .schedule_delivery(token, Some(date(2026, 3, 14)), Some("09:00-12:00"))
        .unwrap();
    assert_eq!(schedule.delivery_date, date(2026, 3, 14));
    assert_eq!(schedule.time_slot.as_ref().unwrap().as_str(), "09:00-12:00");

    let checkout = service.checkout(token).unwrap();
    assert_eq!(service.schedule(&checkout), Some(&schedule));
}

#[test]
fn test_date_defaults_to_today() {
    let service = TestContext::new().build();
    let token = service.create_checkout(None).unwrap().token();

    let schedule = service.schedule_delivery(token, None, None).unwrap();
    assert_eq!(schedule.delivery_date, today());
    assert!(schedule.time_slot.is_none());
}

#[test]
fn test_empty_slot_is_stored_as_none() {
    let service = TestContext::new().build();
    let token = service.create_checkout(None).unwrap().token();

    let schedule = service.schedule_delivery(token, None, Some("")).unwrap();
    assert!(schedule.time_slot.is_none());
}

#[test]
fn test_schedule_touches_last_change() {
    let service = TestContext::new().build();
    let token = service.create_checkout(None).unwrap().token();

    service.schedule_delivery(token, None, Some("evening")).unwrap();
    assert_eq!(service.checkout(token).unwrap().last_change(), now());
}

// =============================================================================
// Replacing a Schedule
// =============================================================================

#[test]
fn test_second_schedule_replaces_first() {
    let service = TestContext::new().build();
    let token = service.create_checkout(None).unwrap().token();

    service
        .schedule_delivery(token, Some(date(2026, 3, 10)), Some("morning"))
        .unwrap();
    let second = service
        .schedule_delivery(token, Some(date(2026, 3, 12)), None)
        .unwrap();

    let checkout = service.checkout(token).unwrap();
    let current = service.schedule(&checkout).unwrap();
    assert_eq!(current, &second);
    assert!(current.time_slot.is_none());
}

#[test]
fn test_overlong_slot_keeps_previous_schedule() {
    let service = TestContext::new().build();
    let token = service.create_checkout(None).unwrap().token();
    let first = service
        .schedule_delivery(token, Some(date(2026, 3, 10)), Some("morning"))
        .unwrap();

    let slot = "x".repeat(65);
    let result = service.schedule_delivery(token, None, Some(&slot));
    assert!(matches!(
        result,
        Err(CheckoutError::Validation(ValidationError::TimeSlotTooLong { len: 65, max: 64 }))
    ));

    let checkout = service.checkout(token).unwrap();
    assert_eq!(service.schedule(&checkout), Some(&first));
}

#[test]
fn test_slot_of_64_characters_is_accepted() {
    let service = TestContext::new().build();
    let token = service.create_checkout(None).unwrap().token();

    let slot = "é".repeat(64);
    let schedule = service.schedule_delivery(token, None, Some(&slot)).unwrap();
    assert_eq!(schedule.time_slot.unwrap().as_str(), slot);
}

// =============================================================================
// Aggregate Ownership
// =============================================================================

#[test]
fn test_in_memory_schedule_via_trait() {
    let service = TestContext::new().build();
    let mut checkout = service.create_checkout(None).unwrap();

    let schedule = service.set_schedule(&mut checkout, None, Some("noon")).unwrap();
    assert_eq!(service.schedule(&checkout), Some(&schedule));

    // Not persisted until saved through a service operation.
    let stored = service.checkout(checkout.token()).unwrap();
    assert!(service.schedule(&stored).is_none());
}

#[test]
fn test_deleting_checkout_deletes_schedule_and_lines() {
    let service = TestContext::new().build();
    let token = service.create_checkout(None).unwrap().token();
    service.add_lines(token, &[(SHIRT, 1)]).unwrap();
    service.schedule_delivery(token, None, None).unwrap();

    service.delete_checkout(token).unwrap();
    assert!(matches!(
        service.checkout(token),
        Err(CheckoutError::NotFound { .. })
    ));
}
