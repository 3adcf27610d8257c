//! SQLite storage layer for Boxoffice

mod bookings;
mod events;
mod migrations;
mod parse;
mod reports;
mod traits;
mod users;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Booking, BookingFilter, BookingView, CategoryStats, DashboardOverview, Event, EventCategory,
    EventFilter, EventSort, Granularity, MonthlyBookings, PageRequest, PopularEvent, RevenuePoint,
    SortOrder, StatusStats, UpcomingEvent, User, UserRole,
};

pub use bookings::BookingStore;
pub use events::{EventDeletion, EventStore};
pub use reports::ReportStore;
pub use traits::{BookingRepository, EventRepository, ReportRepository, Storage, UserRepository};
pub use users::UserStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    pub fn events(&self) -> EventStore<'_> {
        EventStore::new(&self.conn)
    }

    pub fn bookings(&self) -> BookingStore<'_> {
        BookingStore::new(&self.conn)
    }

    pub fn reports(&self) -> ReportStore<'_> {
        ReportStore::new(&self.conn)
    }
}

/// Store handle shared between tasks.
///
/// Closures passed to [`SharedStore::with`] run synchronously, so the lock
/// can never be held across an `.await`.
pub struct SharedStore<S = Database> {
    inner: Arc<Mutex<S>>,
}

impl<S> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with exclusive access to the store
    pub fn with<R>(&self, f: impl FnOnce(&S) -> Result<R>) -> Result<R> {
        let guard = self.inner.lock().map_err(|_| {
            error!("Store mutex poisoned");
            Error::Internal("store lock poisoned".into())
        })?;
        f(&guard)
    }
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl UserRepository for Database {
    fn create_user(&self, user: &User) -> Result<()> {
        self.users().create(user)
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.users().find_by_id(id)
    }

    fn count_users_by_role(&self, role: UserRole) -> Result<u64> {
        self.users().count_by_role(role)
    }
}

impl EventRepository for Database {
    fn create_event(&self, event: &Event) -> Result<()> {
        self.events().create(event)
    }

    fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        self.events().find_by_id(id)
    }

    fn update_event(&self, event: &Event, total_seats: Option<u32>) -> Result<bool> {
        self.events().update(event, total_seats)
    }

    fn delete_event(&self, id: Uuid) -> Result<EventDeletion> {
        self.events().delete(id)
    }

    fn list_events(
        &self,
        filter: &EventFilter,
        sort: EventSort,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<(Vec<Event>, u64)> {
        self.events().list(filter, sort, order, page)
    }

    fn event_categories(&self) -> Result<Vec<EventCategory>> {
        self.events().categories()
    }

    fn event_locations(&self) -> Result<Vec<String>> {
        self.events().locations()
    }

    fn upcoming_events(&self, from: DateTime<Utc>, limit: u32) -> Result<Vec<UpcomingEvent>> {
        self.events().upcoming(from, limit)
    }
}

impl BookingRepository for Database {
    fn commit_booking(&self, booking: &Booking) -> Result<()> {
        self.bookings().commit(booking)
    }

    fn commit_cancellation(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.bookings().cancel(booking_id, now)
    }

    fn record_refund(&self, booking_id: Uuid, refunded_at: DateTime<Utc>) -> Result<bool> {
        self.bookings().record_refund(booking_id, refunded_at)
    }

    fn find_booking_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        self.bookings().find_by_id(id)
    }

    fn find_booking_view(&self, id: Uuid) -> Result<Option<BookingView>> {
        self.bookings().find_view(id)
    }

    fn has_confirmed_booking(&self, user_id: Uuid, event_id: Uuid) -> Result<bool> {
        self.bookings().has_confirmed(user_id, event_id)
    }

    fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<(Vec<BookingView>, u64)> {
        self.bookings().list(filter, page)
    }

    fn booking_status_stats(&self, event_id: Uuid) -> Result<Vec<StatusStats>> {
        self.bookings().status_stats(event_id)
    }
}

impl ReportRepository for Database {
    fn dashboard_overview(&self) -> Result<DashboardOverview> {
        self.reports().overview()
    }

    fn monthly_trend(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyBookings>> {
        self.reports().monthly_trend(since)
    }

    fn popular_events(&self, limit: u32) -> Result<Vec<PopularEvent>> {
        self.reports().popular_events(limit)
    }

    fn category_breakdown(&self) -> Result<Vec<CategoryStats>> {
        self.reports().category_breakdown()
    }

    fn revenue_series(
        &self,
        since: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<RevenuePoint>> {
        self.reports().revenue_series(since, granularity)
    }

    fn recent_bookings(&self, limit: u32) -> Result<Vec<BookingView>> {
        self.bookings().recent_confirmed(limit)
    }
}
