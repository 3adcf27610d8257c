//! Storage repository traits
//!
//! These traits define the storage interface the booking lifecycle and the
//! reporting engine are written against, allowing for different
//! implementations (SQLite, mock).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::EventDeletion;
use crate::error::Result;
use crate::models::{
    Booking, BookingFilter, BookingView, CategoryStats, DashboardOverview, Event, EventCategory,
    EventFilter, EventSort, Granularity, MonthlyBookings, PageRequest, PopularEvent, RevenuePoint,
    SortOrder, StatusStats, UpcomingEvent, User, UserRole,
};

/// User repository operations
pub trait UserRepository {
    /// Create a new user
    fn create_user(&self, user: &User) -> Result<()>;

    /// Find user by ID
    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Count users holding a role
    fn count_users_by_role(&self, role: UserRole) -> Result<u64>;
}

/// Event store operations
pub trait EventRepository {
    /// Create a new event
    fn create_event(&self, event: &Event) -> Result<()>;

    /// Find event by ID
    fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>>;

    /// Persist an edit and an optional new capacity atomically.
    /// False if the event is gone or the capacity is below the seats sold.
    fn update_event(&self, event: &Event, total_seats: Option<u32>) -> Result<bool>;

    /// Delete unless confirmed bookings remain
    fn delete_event(&self, id: Uuid) -> Result<EventDeletion>;

    /// Filtered, sorted page of events and the unpaged total
    fn list_events(
        &self,
        filter: &EventFilter,
        sort: EventSort,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<(Vec<Event>, u64)>;

    /// Distinct categories in use
    fn event_categories(&self) -> Result<Vec<EventCategory>>;

    /// Distinct locations in use
    fn event_locations(&self) -> Result<Vec<String>>;

    /// Soonest events from `from` onwards
    fn upcoming_events(&self, from: DateTime<Utc>, limit: u32) -> Result<Vec<UpcomingEvent>>;
}

/// Booking ledger operations
pub trait BookingRepository {
    /// Insert a booking and take its seats atomically
    fn commit_booking(&self, booking: &Booking) -> Result<()>;

    /// Cancel a confirmed booking and release its seats atomically
    fn commit_cancellation(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Mark a booking's payment refunded
    fn record_refund(&self, booking_id: Uuid, refunded_at: DateTime<Utc>) -> Result<bool>;

    /// Find booking by ID
    fn find_booking_by_id(&self, id: Uuid) -> Result<Option<Booking>>;

    /// Booking with event and user projections
    fn find_booking_view(&self, id: Uuid) -> Result<Option<BookingView>>;

    /// Whether the user holds a confirmed booking for the event
    fn has_confirmed_booking(&self, user_id: Uuid, event_id: Uuid) -> Result<bool>;

    /// Newest-first page of bookings and the unpaged total
    fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<(Vec<BookingView>, u64)>;

    /// Per-status totals for an event
    fn booking_status_stats(&self, event_id: Uuid) -> Result<Vec<StatusStats>>;
}

/// Aggregate queries for the reporting engine
pub trait ReportRepository {
    fn dashboard_overview(&self) -> Result<DashboardOverview>;

    fn monthly_trend(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyBookings>>;

    fn popular_events(&self, limit: u32) -> Result<Vec<PopularEvent>>;

    fn category_breakdown(&self) -> Result<Vec<CategoryStats>>;

    fn revenue_series(
        &self,
        since: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<RevenuePoint>>;

    fn recent_bookings(&self, limit: u32) -> Result<Vec<BookingView>>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
pub trait Storage: UserRepository + EventRepository + BookingRepository + ReportRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where
    T: UserRepository + EventRepository + BookingRepository + ReportRepository
{
}
