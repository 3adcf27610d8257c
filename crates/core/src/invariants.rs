//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Event};

/// Validate that an event's seat counter is within bounds
pub fn assert_event_invariants(event: &Event) {
    debug_assert!(
        event.total_seats >= 1,
        "Event {} has no seats",
        event.id
    );

    debug_assert!(
        event.available_seats <= event.total_seats,
        "Event {} has {} available seats but only {} total",
        event.id,
        event.available_seats,
        event.total_seats
    );

    debug_assert!(
        !event.price.is_negative(),
        "Event {} has negative price {}",
        event.id,
        event.price
    );
}

/// Validate that a booking is internally consistent
pub fn assert_booking_invariants(booking: &Booking) {
    debug_assert!(
        booking.seats_booked >= 1,
        "Booking {} reserves no seats",
        booking.id
    );

    debug_assert!(
        booking.user_id != Uuid::nil() && booking.event_id != Uuid::nil(),
        "Booking {} has a nil reference",
        booking.id
    );

    // A confirmed booking always carries its charge
    if booking.status == BookingStatus::Confirmed {
        debug_assert!(
            booking.payment_id.is_some(),
            "Confirmed booking {} has no payment id",
            booking.id
        );
        debug_assert!(
            booking.payment_details.amount_paid == booking.total_amount,
            "Booking {} paid {} but costs {}",
            booking.id,
            booking.payment_details.amount_paid,
            booking.total_amount
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventCategory, Money, NewEvent, User, UserRole};
    use crate::testing::booking_for;
    use chrono::{NaiveDate, Utc};

    fn make_event() -> Event {
        NewEvent {
            title: "Test Event".into(),
            description: String::new(),
            category: EventCategory::Other,
            location: "Here".into(),
            venue: "Hall".into(),
            date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            time: "10:00".into(),
            price: Money::from_major(10),
            total_seats: 4,
            available_seats: None,
            image_url: None,
        }
        .into_event(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_valid_event() {
        assert_event_invariants(&make_event());
    }

    #[test]
    #[should_panic(expected = "available seats")]
    fn test_oversized_counter_detected() {
        let mut event = make_event();
        event.available_seats = 5;
        assert_event_invariants(&event);
    }

    #[test]
    fn test_valid_booking() {
        let user = User::new("Ada".into(), "ada@example.com".into(), UserRole::User);
        let booking = booking_for(&user, &make_event(), 2, Utc::now());
        assert_booking_invariants(&booking);
    }

    #[test]
    #[should_panic(expected = "no payment id")]
    fn test_unpaid_confirmed_booking_detected() {
        let user = User::new("Ada".into(), "ada@example.com".into(), UserRole::User);
        let mut booking = booking_for(&user, &make_event(), 2, Utc::now());
        booking.payment_id = None;
        assert_booking_invariants(&booking);
    }
}
