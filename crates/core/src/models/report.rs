//! Read-only aggregate views derived from the booking ledger

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BookingStatus, BookingView, EventCategory, EventSummary, Money, Page};

/// Headline counters for the admin dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub total_events: u64,
    /// Confirmed bookings only
    pub total_bookings: u64,
    /// Accounts with the `user` role
    pub total_users: u64,
    /// Sum of confirmed booking amounts
    pub total_revenue: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBookings {
    pub year: i32,
    pub month: u32,
    pub bookings: u64,
    pub revenue: Money,
    pub seats: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularEvent {
    pub event_id: Uuid,
    pub title: String,
    pub category: EventCategory,
    pub date: NaiveDate,
    pub total_bookings: u64,
    pub total_seats: u64,
    pub total_revenue: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: EventCategory,
    pub event_count: u64,
    /// Confirmed bookings across the category's events
    pub total_bookings: u64,
    pub total_revenue: Money,
}

/// Trailing window for the revenue series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenuePeriod {
    Week,
    #[default]
    Month,
    Year,
}

impl RevenuePeriod {
    pub fn granularity(&self) -> Granularity {
        match self {
            RevenuePeriod::Week | RevenuePeriod::Month => Granularity::Day,
            RevenuePeriod::Year => Granularity::Month,
        }
    }
}

/// Width of a revenue bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub year: i32,
    pub month: u32,
    /// Absent for month-level buckets
    pub day: Option<u32>,
    pub revenue: Money,
    pub bookings: u64,
    pub seats: u64,
}

/// Event with live seat counts, for the upcoming list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingEvent {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub available_seats: u32,
    pub total_seats: u32,
}

/// Everything the admin dashboard shows at once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub overview: DashboardOverview,
    pub monthly_bookings: Vec<MonthlyBookings>,
    pub popular_events: Vec<PopularEvent>,
    pub category_stats: Vec<CategoryStats>,
    pub recent_bookings: Vec<BookingView>,
    pub upcoming_events: Vec<UpcomingEvent>,
}

/// Per-status totals for one event's bookings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusStats {
    pub status: BookingStatus,
    pub count: u64,
    pub total_seats: u64,
    pub total_revenue: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBookingStats {
    pub event: EventSummary,
    pub bookings: Page<BookingView>,
    pub stats: Vec<StatusStats>,
}
