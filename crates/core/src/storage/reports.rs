//! Aggregate queries over the booking ledger
//!
//! Read-only. Every query orders by its grouping key plus a unique tiebreak so
//! repeated calls over the same data return identical results.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;

use super::parse::{
    format_datetime, parse_category, parse_date, parse_uuid, to_money, to_u64,
};
use crate::error::Result;
use crate::models::{
    CategoryStats, DashboardOverview, Granularity, MonthlyBookings, PopularEvent, RevenuePoint,
};

/// Split a `YYYY-MM` or `YYYY-MM-DD` bucket key
fn parse_bucket(bucket: &str) -> rusqlite::Result<(i32, u32, Option<u32>)> {
    let invalid = || {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("invalid time bucket '{}'", bucket).into(),
        )
    };
    let mut parts = bucket.split('-');
    let year = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let month = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let day = match parts.next() {
        Some(p) => Some(p.parse().map_err(|_| invalid())?),
        None => None,
    };
    Ok((year, month, day))
}

pub struct ReportStore<'a> {
    conn: &'a Connection,
}

impl<'a> ReportStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self))]
    pub fn overview(&self) -> Result<DashboardOverview> {
        let overview = self.conn.query_row(
            "SELECT
                 (SELECT COUNT(*) FROM events),
                 (SELECT COUNT(*) FROM bookings WHERE status = 'confirmed'),
                 (SELECT COUNT(*) FROM users WHERE role = 'user'),
                 (SELECT COALESCE(SUM(total_amount_cents), 0) FROM bookings WHERE status = 'confirmed')",
            [],
            |row| {
                Ok(DashboardOverview {
                    total_events: to_u64(row.get(0)?)?,
                    total_bookings: to_u64(row.get(1)?)?,
                    total_users: to_u64(row.get(2)?)?,
                    total_revenue: to_money(row.get(3)?),
                })
            },
        )?;
        Ok(overview)
    }

    /// Confirmed bookings created at or after `since`, per calendar month
    #[instrument(skip(self))]
    pub fn monthly_trend(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyBookings>> {
        let mut stmt = self.conn.prepare(
            "SELECT substr(created_at, 1, 7) AS bucket, COUNT(*),
                    SUM(total_amount_cents), SUM(seats_booked)
             FROM bookings
             WHERE status = 'confirmed' AND created_at >= ?1
             GROUP BY bucket
             ORDER BY bucket ASC",
        )?;
        let months = stmt
            .query_map(params![format_datetime(&since)], |row| {
                let (year, month, _) = parse_bucket(&row.get::<_, String>(0)?)?;
                Ok(MonthlyBookings {
                    year,
                    month,
                    bookings: to_u64(row.get(1)?)?,
                    revenue: to_money(row.get(2)?),
                    seats: to_u64(row.get(3)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(months)
    }

    /// Events ranked by confirmed booking count. Deleted events drop out.
    #[instrument(skip(self))]
    pub fn popular_events(&self, limit: u32) -> Result<Vec<PopularEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.event_id, e.title, e.category, e.date, COUNT(*),
                    SUM(b.seats_booked), SUM(b.total_amount_cents)
             FROM bookings b
             JOIN events e ON e.id = b.event_id
             WHERE b.status = 'confirmed'
             GROUP BY b.event_id
             ORDER BY COUNT(*) DESC, b.event_id ASC
             LIMIT ?1",
        )?;
        let events = stmt
            .query_map(params![limit], |row| {
                Ok(PopularEvent {
                    event_id: parse_uuid(&row.get::<_, String>(0)?)?,
                    title: row.get(1)?,
                    category: parse_category(&row.get::<_, String>(2)?)?,
                    date: parse_date(&row.get::<_, String>(3)?)?,
                    total_bookings: to_u64(row.get(4)?)?,
                    total_seats: to_u64(row.get(5)?)?,
                    total_revenue: to_money(row.get(6)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Every category with at least one event, confirmed totals only
    #[instrument(skip(self))]
    pub fn category_breakdown(&self) -> Result<Vec<CategoryStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.category, COUNT(DISTINCT e.id), COUNT(b.id),
                    COALESCE(SUM(b.total_amount_cents), 0)
             FROM events e
             LEFT JOIN bookings b ON b.event_id = e.id AND b.status = 'confirmed'
             GROUP BY e.category
             ORDER BY COUNT(b.id) DESC, e.category ASC",
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(CategoryStats {
                    category: parse_category(&row.get::<_, String>(0)?)?,
                    event_count: to_u64(row.get(1)?)?,
                    total_bookings: to_u64(row.get(2)?)?,
                    total_revenue: to_money(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// Confirmed revenue since `since`, bucketed by day or month
    #[instrument(skip(self))]
    pub fn revenue_series(
        &self,
        since: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<RevenuePoint>> {
        let width = match granularity {
            Granularity::Day => 10,
            Granularity::Month => 7,
        };
        let mut stmt = self.conn.prepare(
            "SELECT substr(created_at, 1, ?2) AS bucket, SUM(total_amount_cents), COUNT(*),
                    SUM(seats_booked)
             FROM bookings
             WHERE status = 'confirmed' AND created_at >= ?1
             GROUP BY bucket
             ORDER BY bucket ASC",
        )?;
        let points = stmt
            .query_map(params![format_datetime(&since), width], |row| {
                let (year, month, day) = parse_bucket(&row.get::<_, String>(0)?)?;
                Ok(RevenuePoint {
                    year,
                    month,
                    day,
                    revenue: to_money(row.get(1)?),
                    bookings: to_u64(row.get(2)?)?,
                    seats: to_u64(row.get(3)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(points)
    }
}
