//! Shared test fixtures

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Booking, BookingDetails, BookingStatus, Event, PaymentDetails, PaymentStatus, User,
};

pub fn contact_details() -> BookingDetails {
    BookingDetails {
        full_name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        phone: "+44 20 7946 0958".into(),
        emergency_contact: "Charles Babbage".into(),
        emergency_phone: "(020) 7946-0000".into(),
        special_requests: None,
    }
}

/// A paid, confirmed booking created at `at`
pub fn booking_for(user: &User, event: &Event, seats: u32, at: DateTime<Utc>) -> Booking {
    let amount = event
        .price
        .checked_times(seats)
        .expect("test amount fits");
    let transaction_id = format!("txn_{}", Uuid::new_v4().simple());
    Booking {
        id: Uuid::new_v4(),
        user_id: user.id,
        event_id: event.id,
        seats_booked: seats,
        total_amount: amount,
        status: BookingStatus::Confirmed,
        payment_id: Some(transaction_id.clone()),
        booking_date: at,
        booking_details: contact_details(),
        payment_details: PaymentDetails {
            method: "mock".into(),
            transaction_id: Some(transaction_id),
            status: PaymentStatus::Completed,
            amount_paid: amount,
            paid_at: Some(at),
            refunded_at: None,
        },
        created_at: at,
        updated_at: at,
    }
}
