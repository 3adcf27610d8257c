//! Booking ledger operations
//!
//! A booking row and the seat counter it consumes are always written in the
//! same transaction, so the ledger and the event store cannot drift apart.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::events::EventStore;
use super::parse::{
    format_datetime, is_unique_violation, parse_booking_status, parse_category, parse_date,
    parse_datetime, parse_datetime_opt, parse_payment_status, parse_uuid, to_money, to_u32,
    to_u64, OptionalExt,
};
use crate::error::{Error, Result};
use crate::models::{
    Booking, BookingDetails, BookingFilter, BookingStatus, BookingView, EventSummary,
    PageRequest, PaymentDetails, StatusStats, UserSummary,
};

const BOOKING_COLUMNS: &str = "b.id, b.user_id, b.event_id, b.seats_booked, b.total_amount_cents,
     b.status, b.payment_id, b.booking_date, b.full_name, b.email, b.phone,
     b.emergency_contact, b.emergency_phone, b.special_requests, b.payment_method,
     b.payment_transaction_id, b.payment_status, b.amount_paid_cents, b.paid_at,
     b.refunded_at, b.created_at, b.updated_at";

/// Event projection columns, starting at index 22
const EVENT_PROJECTION: &str =
    "e.id, e.title, e.category, e.date, e.time, e.venue, e.location, e.price_cents";

/// User projection columns, starting at index 30
const USER_PROJECTION: &str = "u.id, u.name, u.email";

const VIEW_JOINS: &str = "FROM bookings b
     LEFT JOIN events e ON e.id = b.event_id
     LEFT JOIN users u ON u.id = b.user_id";

fn map_booking(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        user_id: parse_uuid(&row.get::<_, String>(1)?)?,
        event_id: parse_uuid(&row.get::<_, String>(2)?)?,
        seats_booked: to_u32(row.get(3)?)?,
        total_amount: to_money(row.get(4)?),
        status: parse_booking_status(&row.get::<_, String>(5)?)?,
        payment_id: row.get(6)?,
        booking_date: parse_datetime(&row.get::<_, String>(7)?)?,
        booking_details: BookingDetails {
            full_name: row.get(8)?,
            email: row.get(9)?,
            phone: row.get(10)?,
            emergency_contact: row.get(11)?,
            emergency_phone: row.get(12)?,
            special_requests: row.get(13)?,
        },
        payment_details: PaymentDetails {
            method: row.get(14)?,
            transaction_id: row.get(15)?,
            status: parse_payment_status(&row.get::<_, String>(16)?)?,
            amount_paid: to_money(row.get(17)?),
            paid_at: parse_datetime_opt(row.get(18)?)?,
            refunded_at: parse_datetime_opt(row.get(19)?)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(20)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(21)?)?,
    })
}

fn map_event_projection(row: &Row<'_>) -> rusqlite::Result<Option<EventSummary>> {
    let Some(id) = row.get::<_, Option<String>>(22)? else {
        return Ok(None);
    };
    Ok(Some(EventSummary {
        id: parse_uuid(&id)?,
        title: row.get(23)?,
        category: parse_category(&row.get::<_, String>(24)?)?,
        date: parse_date(&row.get::<_, String>(25)?)?,
        time: row.get(26)?,
        venue: row.get(27)?,
        location: row.get(28)?,
        price: to_money(row.get(29)?),
    }))
}

fn map_user_projection(row: &Row<'_>) -> rusqlite::Result<Option<UserSummary>> {
    let Some(id) = row.get::<_, Option<String>>(30)? else {
        return Ok(None);
    };
    Ok(Some(UserSummary {
        id: parse_uuid(&id)?,
        name: row.get(31)?,
        email: row.get(32)?,
    }))
}

fn map_view(row: &Row<'_>) -> rusqlite::Result<BookingView> {
    Ok(BookingView {
        booking: map_booking(row)?,
        event: map_event_projection(row)?,
        user: map_user_projection(row)?,
    })
}

/// Build `WHERE` conditions for a booking filter over alias `b`
fn filter_clauses(filter: &BookingFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("b.status = ?");
        values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(event_id) = filter.event_id {
        clauses.push("b.event_id = ?");
        values.push(Value::Text(event_id.to_string()));
    }
    if let Some(user_id) = filter.user_id {
        clauses.push("b.user_id = ?");
        values.push(Value::Text(user_id.to_string()));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

pub struct BookingStore<'a> {
    conn: &'a Connection,
}

impl<'a> BookingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Persist a confirmed booking and take its seats in one transaction.
    ///
    /// Fails with `Conflict` if the user already holds a confirmed booking for
    /// the event, `InsufficientCapacity` if the conditional decrement finds too
    /// few seats, `NotFound` if the event vanished. Nothing is written on error.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, event_id = %booking.event_id, seats = booking.seats_booked))]
    pub fn commit(&self, booking: &Booking) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO bookings (id, user_id, event_id, seats_booked, total_amount_cents,
                                   status, payment_id, booking_date, full_name, email, phone,
                                   emergency_contact, emergency_phone, special_requests,
                                   payment_method, payment_transaction_id, payment_status,
                                   amount_paid_cents, paid_at, refunded_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                booking.id.to_string(),
                booking.user_id.to_string(),
                booking.event_id.to_string(),
                booking.seats_booked,
                booking.total_amount.cents(),
                booking.status.as_str(),
                booking.payment_id,
                format_datetime(&booking.booking_date),
                booking.booking_details.full_name,
                booking.booking_details.email,
                booking.booking_details.phone,
                booking.booking_details.emergency_contact,
                booking.booking_details.emergency_phone,
                booking.booking_details.special_requests,
                booking.payment_details.method,
                booking.payment_details.transaction_id,
                booking.payment_details.status.as_str(),
                booking.payment_details.amount_paid.cents(),
                booking.payment_details.paid_at.as_ref().map(format_datetime),
                booking.payment_details.refunded_at.as_ref().map(format_datetime),
                format_datetime(&booking.created_at),
                format_datetime(&booking.updated_at),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("You already have a booking for this event".into())
            } else {
                Error::Database(e)
            }
        })?;

        let events = EventStore::new(&tx);
        if !events.reserve_seats(booking.event_id, booking.seats_booked)? {
            return match events.available_seats(booking.event_id)? {
                Some(available) => Err(Error::InsufficientCapacity { available }),
                None => Err(Error::NotFound("Event not found".into())),
            };
        }

        tx.commit()?;
        debug!("Booking committed");
        Ok(())
    }

    /// Flip a confirmed booking to cancelled and give its seats back.
    /// Returns false if the booking was not in the confirmed state.
    #[instrument(skip(self))]
    pub fn cancel(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let target: Option<(String, i64)> = tx
            .query_row(
                "SELECT event_id, seats_booked FROM bookings WHERE id = ?1 AND status = 'confirmed'",
                params![booking_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((event_id, seats)) = target else {
            return Ok(false);
        };

        let updated = tx.execute(
            "UPDATE bookings SET status = 'cancelled', updated_at = ?1
             WHERE id = ?2 AND status = 'confirmed'",
            params![format_datetime(&now), booking_id.to_string()],
        )?;
        if updated == 0 {
            return Ok(false);
        }

        EventStore::new(&tx).release_seats(parse_uuid(&event_id)?, to_u32(seats)?)?;

        tx.commit()?;
        Ok(true)
    }

    /// Record a completed refund. Only a completed payment can move to refunded.
    #[instrument(skip(self))]
    pub fn record_refund(&self, booking_id: Uuid, refunded_at: DateTime<Utc>) -> Result<bool> {
        let at = format_datetime(&refunded_at);
        let updated = self.conn.execute(
            "UPDATE bookings SET payment_status = 'refunded', refunded_at = ?1, updated_at = ?1
             WHERE id = ?2 AND payment_status = 'completed'",
            params![at, booking_id.to_string()],
        )?;
        Ok(updated == 1)
    }

    /// Find booking by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let booking = self
            .conn
            .query_row(
                &format!("SELECT {} FROM bookings b WHERE b.id = ?1", BOOKING_COLUMNS),
                params![id.to_string()],
                map_booking,
            )
            .optional()?;
        Ok(booking)
    }

    /// Booking joined with its event and user projections
    #[instrument(skip(self))]
    pub fn find_view(&self, id: Uuid) -> Result<Option<BookingView>> {
        let view = self
            .conn
            .query_row(
                &format!(
                    "SELECT {}, {}, {} {} WHERE b.id = ?1",
                    BOOKING_COLUMNS, EVENT_PROJECTION, USER_PROJECTION, VIEW_JOINS
                ),
                params![id.to_string()],
                map_view,
            )
            .optional()?;
        Ok(view)
    }

    pub fn has_confirmed(&self, user_id: Uuid, event_id: Uuid) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM bookings
                 WHERE user_id = ?1 AND event_id = ?2 AND status = 'confirmed'
             )",
            params![user_id.to_string(), event_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Newest-first page of bookings plus the unpaged total
    #[instrument(skip(self))]
    pub fn list(&self, filter: &BookingFilter, page: PageRequest) -> Result<(Vec<BookingView>, u64)> {
        let (where_sql, mut values) = filter_clauses(filter);

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM bookings b {}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {}, {}, {} {} {} ORDER BY b.created_at DESC, b.id DESC LIMIT ? OFFSET ?",
            BOOKING_COLUMNS, EVENT_PROJECTION, USER_PROJECTION, VIEW_JOINS, where_sql
        );
        values.push(Value::Integer(i64::from(page.limit())));
        values.push(Value::Integer(page.offset() as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let views = stmt
            .query_map(params_from_iter(values.iter()), map_view)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((views, to_u64(total)?))
    }

    /// Most recent confirmed bookings
    pub fn recent_confirmed(&self, limit: u32) -> Result<Vec<BookingView>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, {}, {} {} WHERE b.status = 'confirmed'
             ORDER BY b.created_at DESC, b.id DESC LIMIT ?1",
            BOOKING_COLUMNS, EVENT_PROJECTION, USER_PROJECTION, VIEW_JOINS
        ))?;
        let views = stmt
            .query_map(params![limit], map_view)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(views)
    }

    /// Per-status totals for one event, ordered by status name
    #[instrument(skip(self))]
    pub fn status_stats(&self, event_id: Uuid) -> Result<Vec<StatusStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*), COALESCE(SUM(seats_booked), 0),
                    COALESCE(SUM(total_amount_cents), 0)
             FROM bookings
             WHERE event_id = ?1
             GROUP BY status
             ORDER BY status ASC",
        )?;
        let stats = stmt
            .query_map(params![event_id.to_string()], |row| {
                Ok(StatusStats {
                    status: parse_booking_status(&row.get::<_, String>(0)?)?,
                    count: to_u64(row.get(1)?)?,
                    total_seats: to_u64(row.get(2)?)?,
                    total_revenue: to_money(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}

#[cfg(test)]
impl BookingStore<'_> {
    /// Confirmed amounts read row by row, independent of the report queries
    pub(crate) fn confirmed_amounts(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT total_amount_cents FROM bookings WHERE status = ?1")?;
        let amounts = stmt
            .query_map(params![BookingStatus::Confirmed.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(amounts)
    }
}
