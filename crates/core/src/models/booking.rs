//! Booking model - a user's reservation of seats at an event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EventSummary, Money, UserSummary};
use crate::error::{Error, Result};

/// Booking status.
///
/// Only `Confirmed` and `Cancelled` are produced by the booking lifecycle;
/// the remaining values are reserved for a staged payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Paid,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Paid => "paid",
            BookingStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "paid" => Some(BookingStatus::Paid),
            "refunded" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the money attached to a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// Who to reach about a booking. Immutable once the booking exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub emergency_contact: String,
    pub emergency_phone: String,
    #[serde(default)]
    pub special_requests: Option<String>,
}

impl BookingDetails {
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(Error::InvalidInput("Full name is required".into()));
        }
        if !looks_like_email(&self.email) {
            return Err(Error::InvalidInput("Please enter a valid email".into()));
        }
        if !looks_like_phone(&self.phone) {
            return Err(Error::InvalidInput(
                "Please enter a valid phone number".into(),
            ));
        }
        if self.emergency_contact.trim().is_empty() {
            return Err(Error::InvalidInput("Emergency contact is required".into()));
        }
        if !looks_like_phone(&self.emergency_phone) {
            return Err(Error::InvalidInput(
                "Please enter a valid emergency phone number".into(),
            ));
        }
        Ok(())
    }
}

/// `local@domain.tld` with no whitespace
pub(crate) fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain
                    .rsplit_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

/// Optional leading `+`, then at least 10 of: digits, spaces, `-`, `(`, `)`
fn looks_like_phone(s: &str) -> bool {
    let body = s.strip_prefix('+').unwrap_or(s);
    body.chars().count() >= 10
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
}

/// Payment instrument supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// e.g. "card", "bank_transfer", "mock"
    pub method: String,
    #[serde(default)]
    pub card_last_four: Option<String>,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self {
            method: "mock".to_string(),
            card_last_four: None,
        }
    }
}

/// Payment record owned by a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub method: String,
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub amount_paid: Money,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

/// A reservation of seats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub seats_booked: u32,
    /// Price times seats, frozen at booking time
    pub total_amount: Money,
    pub status: BookingStatus,
    pub payment_id: Option<String>,
    pub booking_date: DateTime<Utc>,
    pub booking_details: BookingDetails,
    pub payment_details: PaymentDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking joined with display projections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    /// `None` when the event has since been deleted
    pub event: Option<EventSummary>,
    pub user: Option<UserSummary>,
}

/// Returned to the caller after a successful charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub amount: Money,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub booking: BookingView,
    pub payment: PaymentReceipt,
}

/// Hard cap on seats in one booking, also enforced by the schema
pub const MAX_SEATS_PER_BOOKING: u32 = 10;

/// Optional filters for listing bookings, combined with AND
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub event_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl BookingFilter {
    pub fn for_user(user_id: Uuid, status: Option<BookingStatus>) -> Self {
        Self {
            status,
            event_id: None,
            user_id: Some(user_id),
        }
    }

    pub fn for_event(event_id: Uuid, status: Option<BookingStatus>) -> Self {
        Self {
            status,
            event_id: Some(event_id),
            user_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::contact_details as details;

    #[test]
    fn test_valid_details() {
        assert!(details().validate().is_ok());
    }

    #[test]
    fn test_invalid_email() {
        for email in ["ada", "ada@", "@example.com", "ada@example", "a da@x.io"] {
            let mut d = details();
            d.email = email.into();
            assert!(d.validate().is_err(), "{} should be rejected", email);
        }
    }

    #[test]
    fn test_invalid_phone() {
        let mut d = details();
        d.phone = "12345".into();
        assert!(d.validate().is_err());

        let mut d = details();
        d.emergency_phone = "call me maybe".into();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Paid,
            BookingStatus::Refunded,
        ] {
            assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::from_str("void"), None);
    }
}
