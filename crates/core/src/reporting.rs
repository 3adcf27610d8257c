//! Reporting engine
//!
//! Read-only dashboards derived from the booking ledger. All operations are
//! admin only and read time through the injected clock.

use chrono::{DateTime, Duration, Months, Utc};
use std::sync::Arc;
use tracing::instrument;

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{
    Actor, CategoryStats, Dashboard, DashboardOverview, MonthlyBookings, PopularEvent,
    RevenuePeriod, RevenuePoint,
};
use crate::storage::{Database, SharedStore, Storage};

pub const TREND_MONTHS: u32 = 6;
pub const POPULAR_EVENTS: u32 = 5;
pub const RECENT_BOOKINGS: u32 = 10;
pub const UPCOMING_EVENTS: u32 = 5;

/// `now` moved back by whole calendar months, clamped to the month's last day
fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Start of the trailing window for a revenue period
pub fn window_start(period: RevenuePeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        RevenuePeriod::Week => now - Duration::days(7),
        RevenuePeriod::Month => months_before(now, 1),
        RevenuePeriod::Year => months_before(now, 12),
    }
}

pub struct Reports<S = Database> {
    store: SharedStore<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Storage> Reports<S> {
    pub fn new(store: SharedStore<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub fn overview(&self, actor: Actor) -> Result<DashboardOverview> {
        actor.require_admin()?;
        self.store.with(|db| db.dashboard_overview())
    }

    /// Confirmed bookings per month over the trailing `months_back` months
    pub fn monthly_trend(&self, actor: Actor, months_back: u32) -> Result<Vec<MonthlyBookings>> {
        actor.require_admin()?;
        let since = months_before(self.clock.now(), months_back);
        self.store.with(|db| db.monthly_trend(since))
    }

    pub fn popular_events(&self, actor: Actor, limit: u32) -> Result<Vec<PopularEvent>> {
        actor.require_admin()?;
        self.store.with(|db| db.popular_events(limit))
    }

    pub fn category_breakdown(&self, actor: Actor) -> Result<Vec<CategoryStats>> {
        actor.require_admin()?;
        self.store.with(|db| db.category_breakdown())
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub fn revenue_series(&self, actor: Actor, period: RevenuePeriod) -> Result<Vec<RevenuePoint>> {
        actor.require_admin()?;
        let since = window_start(period, self.clock.now());
        self.store
            .with(|db| db.revenue_series(since, period.granularity()))
    }

    /// Every dashboard section, read under one lock so the sections agree
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub fn dashboard(&self, actor: Actor) -> Result<Dashboard> {
        actor.require_admin()?;
        let now = self.clock.now();
        let since = months_before(now, TREND_MONTHS);
        self.store.with(|db| {
            Ok(Dashboard {
                overview: db.dashboard_overview()?,
                monthly_bookings: db.monthly_trend(since)?,
                popular_events: db.popular_events(POPULAR_EVENTS)?,
                category_stats: db.category_breakdown()?,
                recent_bookings: db.recent_bookings(RECENT_BOOKINGS)?,
                upcoming_events: db.upcoming_events(now, UPCOMING_EVENTS)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::Error;
    use crate::models::{EventCategory, Money, NewEvent, User, UserRole};
    use crate::testing::booking_for;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    fn setup() -> (Reports, SharedStore, Actor) {
        let db = Database::open_in_memory().unwrap();
        let admin = User::new("Org".into(), "org@example.com".into(), UserRole::Admin);
        db.users().create(&admin).unwrap();
        let store = SharedStore::new(db);
        let reports = Reports::new(store.clone(), Arc::new(FixedClock::new(now())));
        (reports, store, admin.actor())
    }

    fn seed(store: &SharedStore, owner: uuid::Uuid, stamps: &[DateTime<Utc>]) -> Vec<Money> {
        store
            .with(|db| {
                let event = NewEvent {
                    title: "Jazz Night".into(),
                    description: String::new(),
                    category: EventCategory::Concert,
                    location: "Berlin".into(),
                    venue: "Main Hall".into(),
                    date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                    time: "19:00".into(),
                    price: Money::from_cents(1999),
                    total_seats: 50,
                    available_seats: None,
                    image_url: None,
                }
                .into_event(owner, now());
                db.events().create(&event)?;

                let mut amounts = Vec::new();
                for (i, at) in stamps.iter().enumerate() {
                    let user = User::new(format!("u{}", i), format!("u{}@x.io", i), UserRole::User);
                    db.users().create(&user)?;
                    let booking = booking_for(&user, &event, (i % 3) as u32 + 1, *at);
                    amounts.push(booking.total_amount);
                    db.bookings().commit(&booking)?;
                }
                Ok(amounts)
            })
            .unwrap()
    }

    #[test]
    fn test_window_start() {
        let now = now();
        assert_eq!(
            window_start(RevenuePeriod::Week, now),
            Utc.with_ymd_and_hms(2026, 3, 24, 12, 0, 0).unwrap()
        );
        // March 31 minus one month clamps to the end of February
        assert_eq!(
            window_start(RevenuePeriod::Month, now),
            Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap()
        );
        assert_eq!(
            window_start(RevenuePeriod::Year, now),
            Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_non_admin_forbidden() {
        let (reports, _, _) = setup();
        let user = Actor::user(uuid::Uuid::new_v4());
        assert!(matches!(reports.overview(user), Err(Error::Forbidden(_))));
        assert!(matches!(reports.dashboard(user), Err(Error::Forbidden(_))));
        assert!(matches!(
            reports.revenue_series(user, RevenuePeriod::Week),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_empty_dashboard() {
        let (reports, _, admin) = setup();
        let dashboard = reports.dashboard(admin).unwrap();
        assert_eq!(dashboard.overview.total_events, 0);
        assert_eq!(dashboard.overview.total_bookings, 0);
        assert_eq!(dashboard.overview.total_users, 0);
        assert_eq!(dashboard.overview.total_revenue, Money::ZERO);
        assert!(dashboard.monthly_bookings.is_empty());
        assert!(dashboard.popular_events.is_empty());
        assert!(dashboard.category_stats.is_empty());
        assert!(dashboard.recent_bookings.is_empty());
        assert!(dashboard.upcoming_events.is_empty());
        assert!(reports
            .revenue_series(admin, RevenuePeriod::Year)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_revenue_reconciles_with_ledger() {
        let (reports, store, admin) = setup();
        let stamps: Vec<_> = (0..7)
            .map(|d| now() - Duration::days(d * 9))
            .collect();
        let amounts = seed(&store, admin.user_id, &stamps);

        let direct: i64 = store
            .with(|db| db.bookings().confirmed_amounts())
            .unwrap()
            .into_iter()
            .sum();
        let expected: Money = amounts.into_iter().sum();
        let overview = reports.overview(admin).unwrap();

        assert_eq!(overview.total_revenue, expected);
        assert_eq!(overview.total_revenue.cents(), direct);

        let trend: Money = reports
            .monthly_trend(admin, TREND_MONTHS)
            .unwrap()
            .into_iter()
            .map(|m| m.revenue)
            .sum();
        assert_eq!(trend, expected);
    }

    #[test]
    fn test_dashboard_is_idempotent() {
        let (reports, store, admin) = setup();
        let stamps: Vec<_> = (0..4).map(|d| now() - Duration::days(d)).collect();
        seed(&store, admin.user_id, &stamps);

        let first = serde_json::to_value(reports.dashboard(admin).unwrap()).unwrap();
        let second = serde_json::to_value(reports.dashboard(admin).unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first["recent_bookings"].as_array().map(Vec::len), Some(4));
        assert_eq!(first["upcoming_events"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_revenue_series_windows() {
        let (reports, store, admin) = setup();
        let stamps = [
            now() - Duration::days(2),
            now() - Duration::days(2),
            now() - Duration::days(20),
            now() - Duration::days(200),
        ];
        seed(&store, admin.user_id, &stamps);

        let week = reports.revenue_series(admin, RevenuePeriod::Week).unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].bookings, 2);
        assert_eq!(week[0].day, Some(29));

        let month = reports.revenue_series(admin, RevenuePeriod::Month).unwrap();
        assert_eq!(month.len(), 2);
        assert!(month[0].day < month[1].day || month[0].month < month[1].month);

        let year = reports.revenue_series(admin, RevenuePeriod::Year).unwrap();
        assert_eq!(year.iter().map(|p| p.bookings).sum::<u64>(), 4);
        assert!(year.iter().all(|p| p.day.is_none()));
    }
}
