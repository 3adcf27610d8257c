//! Event store operations
//!
//! `available_seats` is only ever changed through conditional statements
//! (`reserve_seats`, `release_seats`, `update`) so the check and the write
//! happen in one step.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    contains_pattern, format_date, format_datetime, parse_category, parse_date, parse_datetime,
    parse_uuid, to_money, to_u32, to_u64, OptionalExt,
};
use crate::error::Result;
use crate::models::{
    Event, EventCategory, EventFilter, EventSort, PageRequest, SortOrder, UpcomingEvent,
};

const EVENT_COLUMNS: &str = "id, title, description, category, location, venue, date, time,
     price_cents, total_seats, available_seats, image_url, created_by, created_at, updated_at";

fn map_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: parse_category(&row.get::<_, String>(3)?)?,
        location: row.get(4)?,
        venue: row.get(5)?,
        date: parse_date(&row.get::<_, String>(6)?)?,
        time: row.get(7)?,
        price: to_money(row.get(8)?),
        total_seats: to_u32(row.get(9)?)?,
        available_seats: to_u32(row.get(10)?)?,
        image_url: row.get(11)?,
        created_by: parse_uuid(&row.get::<_, String>(12)?)?,
        created_at: parse_datetime(&row.get::<_, String>(13)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(14)?)?,
    })
}

/// Result of a guarded delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDeletion {
    Deleted,
    NotFound,
    /// Confirmed bookings still reference the event
    HasActiveBookings,
}

pub struct EventStore<'a> {
    conn: &'a Connection,
}

impl<'a> EventStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new event
    #[instrument(skip(self, event), fields(event_id = %event.id, title = %event.title))]
    pub fn create(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, title, description, category, location, venue, date, time,
                                 price_cents, total_seats, available_seats, image_url, created_by,
                                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                event.id.to_string(),
                event.title,
                event.description,
                event.category.as_str(),
                event.location,
                event.venue,
                format_date(&event.date),
                event.time,
                event.price.cents(),
                event.total_seats,
                event.available_seats,
                event.image_url,
                event.created_by.to_string(),
                format_datetime(&event.created_at),
                format_datetime(&event.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Find event by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        let event = self
            .conn
            .query_row(
                &format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS),
                params![id.to_string()],
                map_event,
            )
            .optional()?;
        Ok(event)
    }

    /// Persist an edited event, resizing it first when `total_seats` is given.
    ///
    /// Both writes share one transaction. Returns false, with nothing written,
    /// if the event is missing or already sold more than the new total.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub fn update(&self, event: &Event, total_seats: Option<u32>) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let events = EventStore::new(&tx);

        if let Some(total) = total_seats {
            if !events.resize(event.id, total, event.updated_at)? {
                return Ok(false);
            }
        }
        events.update_details(event)?;

        tx.commit()?;
        Ok(true)
    }

    /// Seat counters are left untouched
    fn update_details(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "UPDATE events SET title = ?1, description = ?2, category = ?3, location = ?4,
                               venue = ?5, date = ?6, time = ?7, price_cents = ?8,
                               image_url = ?9, updated_at = ?10
             WHERE id = ?11",
            params![
                event.title,
                event.description,
                event.category.as_str(),
                event.location,
                event.venue,
                format_date(&event.date),
                event.time,
                event.price.cents(),
                event.image_url,
                format_datetime(&event.updated_at),
                event.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Change capacity, shifting `available_seats` by the same delta
    fn resize(&self, event_id: Uuid, total_seats: u32, now: DateTime<Utc>) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE events
             SET available_seats = available_seats + (?1 - total_seats),
                 total_seats = ?1,
                 updated_at = ?2
             WHERE id = ?3 AND total_seats - available_seats <= ?1",
            params![total_seats, format_datetime(&now), event_id.to_string()],
        )?;
        Ok(updated == 1)
    }

    /// Take `seats` from the counter if at least that many remain
    #[instrument(skip(self))]
    pub fn reserve_seats(&self, event_id: Uuid, seats: u32) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE events SET available_seats = available_seats - ?1
             WHERE id = ?2 AND available_seats >= ?1",
            params![seats, event_id.to_string()],
        )?;
        Ok(updated == 1)
    }

    /// Return `seats` to the counter, never exceeding capacity
    #[instrument(skip(self))]
    pub fn release_seats(&self, event_id: Uuid, seats: u32) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE events SET available_seats = MIN(total_seats, available_seats + ?1)
             WHERE id = ?2",
            params![seats, event_id.to_string()],
        )?;
        Ok(updated == 1)
    }

    /// Current counter value, `None` if the event is gone
    pub fn available_seats(&self, event_id: Uuid) -> Result<Option<u32>> {
        let seats = self
            .conn
            .query_row(
                "SELECT available_seats FROM events WHERE id = ?1",
                params![event_id.to_string()],
                |row| to_u32(row.get(0)?),
            )
            .optional()?;
        Ok(seats)
    }

    /// Delete unless a confirmed booking still references the event
    #[instrument(skip(self))]
    pub fn delete(&self, event_id: Uuid) -> Result<EventDeletion> {
        let id = event_id.to_string();
        let deleted = self.conn.execute(
            "DELETE FROM events
             WHERE id = ?1
               AND NOT EXISTS (
                   SELECT 1 FROM bookings WHERE event_id = ?1 AND status = 'confirmed'
               )",
            params![id],
        )?;
        if deleted == 1 {
            return Ok(EventDeletion::Deleted);
        }
        if self.find_by_id(event_id)?.is_some() {
            Ok(EventDeletion::HasActiveBookings)
        } else {
            Ok(EventDeletion::NotFound)
        }
    }

    /// Filtered, sorted page of events plus the unpaged total
    #[instrument(skip(self))]
    pub fn list(
        &self,
        filter: &EventFilter,
        sort: EventSort,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<(Vec<Event>, u64)> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(category) = filter.category {
            clauses.push("category = ?");
            values.push(Value::Text(category.as_str().to_string()));
        }
        if let Some(location) = &filter.location {
            clauses.push("LOWER(location) LIKE ? ESCAPE '\\'");
            values.push(Value::Text(contains_pattern(&location.to_lowercase())));
        }
        if let Some(date) = filter.date {
            clauses.push("date = ?");
            values.push(Value::Text(format_date(&date)));
        }
        if let Some(time) = &filter.time {
            clauses.push("time = ?");
            values.push(Value::Text(time.clone()));
        }
        if let Some(search) = &filter.search {
            let pattern = contains_pattern(search);
            clauses.push("(title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')");
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM events {}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        // Sort columns come from a closed enum, never from caller text.
        let order_sql = sort
            .column()
            .split(", ")
            .map(|c| format!("{} {}", c, order.keyword()))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "SELECT {} FROM events {} ORDER BY {}, id ASC LIMIT ? OFFSET ?",
            EVENT_COLUMNS, where_sql, order_sql
        );
        values.push(Value::Integer(i64::from(page.limit())));
        values.push(Value::Integer(page.offset() as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_from_iter(values.iter()), map_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((events, to_u64(total)?))
    }

    /// Distinct categories in use, sorted
    pub fn categories(&self) -> Result<Vec<EventCategory>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT category FROM events ORDER BY category")?;
        let categories = stmt
            .query_map([], |row| parse_category(&row.get::<_, String>(0)?))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Distinct locations in use, sorted
    pub fn locations(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT location FROM events ORDER BY location")?;
        let locations = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    /// Events starting at or after `from`, soonest first.
    /// Times are stored as `H:MM` or `HH:MM`, so they are padded before comparing.
    pub fn upcoming(&self, from: DateTime<Utc>, limit: u32) -> Result<Vec<UpcomingEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, date, time, venue, available_seats, total_seats
             FROM events
             WHERE date > ?1 OR (date = ?1 AND substr('0' || time, -5) >= ?3)
             ORDER BY date ASC, substr('0' || time, -5) ASC, id ASC
             LIMIT ?2",
        )?;
        let events = stmt
            .query_map(
                params![
                    format_date(&from.date_naive()),
                    limit,
                    from.format("%H:%M").to_string()
                ],
                |row| {
                    Ok(UpcomingEvent {
                        id: parse_uuid(&row.get::<_, String>(0)?)?,
                        title: row.get(1)?,
                        date: parse_date(&row.get::<_, String>(2)?)?,
                        time: row.get(3)?,
                        venue: row.get(4)?,
                        available_seats: to_u32(row.get(5)?)?,
                        total_seats: to_u32(row.get(6)?)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(to_u64(count)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventUpdate, Money, NewEvent, User, UserRole};
    use crate::storage::Database;
    use chrono::NaiveDate;

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let admin = User::new("Org".into(), "org@example.com".into(), UserRole::Admin);
        db.users().create(&admin).unwrap();
        (db, admin.id)
    }

    fn event(owner: Uuid, title: &str, category: EventCategory, location: &str, day: u32) -> Event {
        NewEvent {
            title: title.into(),
            description: format!("{} description", title),
            category,
            location: location.into(),
            venue: "Main Hall".into(),
            date: NaiveDate::from_ymd_opt(2030, 6, day).unwrap(),
            time: "19:00".into(),
            price: Money::from_major(day as i64),
            total_seats: 10,
            available_seats: None,
            image_url: None,
        }
        .into_event(owner, Utc::now())
    }

    #[test]
    fn test_create_and_find() {
        let (db, owner) = setup();
        let e = event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 1);
        db.events().create(&e).unwrap();

        let found = db.events().find_by_id(e.id).unwrap().unwrap();
        assert_eq!(found.title, "Jazz Night");
        assert_eq!(found.available_seats, 10);
        assert_eq!(found.date, e.date);
        assert_eq!(found.price, e.price);
    }

    #[test]
    fn test_reserve_is_conditional() {
        let (db, owner) = setup();
        let e = event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 1);
        db.events().create(&e).unwrap();

        assert!(db.events().reserve_seats(e.id, 7).unwrap());
        assert!(!db.events().reserve_seats(e.id, 4).unwrap());
        assert_eq!(db.events().available_seats(e.id).unwrap(), Some(3));
        assert!(db.events().reserve_seats(e.id, 3).unwrap());
        assert_eq!(db.events().available_seats(e.id).unwrap(), Some(0));
        assert!(!db.events().reserve_seats(Uuid::new_v4(), 1).unwrap());
    }

    #[test]
    fn test_release_never_exceeds_capacity() {
        let (db, owner) = setup();
        let e = event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 1);
        db.events().create(&e).unwrap();

        db.events().reserve_seats(e.id, 2).unwrap();
        db.events().release_seats(e.id, 5).unwrap();
        assert_eq!(db.events().available_seats(e.id).unwrap(), Some(10));
    }

    #[test]
    fn test_resize_keeps_sold_seats() {
        let (db, owner) = setup();
        let e = event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 1);
        db.events().create(&e).unwrap();
        db.events().reserve_seats(e.id, 6).unwrap();

        assert!(db.events().update(&e, Some(20)).unwrap());
        let found = db.events().find_by_id(e.id).unwrap().unwrap();
        assert_eq!((found.total_seats, found.available_seats), (20, 14));

        let mut renamed = found.clone();
        renamed.title = "Renamed".into();
        assert!(!db.events().update(&renamed, Some(5)).unwrap());
        let found = db.events().find_by_id(e.id).unwrap().unwrap();
        assert_eq!(found.title, "Jazz Night");

        assert!(db.events().update(&e, Some(6)).unwrap());
        let found = db.events().find_by_id(e.id).unwrap().unwrap();
        assert_eq!((found.total_seats, found.available_seats), (6, 0));
    }

    #[test]
    fn test_failed_details_write_rolls_back_resize() {
        let (db, owner) = setup();
        let mut e = event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 1);
        db.events().create(&e).unwrap();
        db.conn
            .execute_batch(
                "CREATE TRIGGER lock_titles BEFORE UPDATE OF title ON events
                 BEGIN SELECT RAISE(ABORT, 'titles are locked'); END;",
            )
            .unwrap();

        e.title = "Late Jazz".into();
        assert!(db.events().update(&e, Some(25)).is_err());

        let found = db.events().find_by_id(e.id).unwrap().unwrap();
        assert_eq!(found.title, "Jazz Night");
        assert_eq!((found.total_seats, found.available_seats), (10, 10));
    }

    #[test]
    fn test_upcoming_respects_start_time() {
        let (db, owner) = setup();
        let mut early = event(owner, "Breakfast Talk", EventCategory::Conference, "Berlin", 1);
        early.time = "8:00".into();
        let mut noon = event(owner, "Noon Recital", EventCategory::Concert, "Berlin", 1);
        noon.time = "12:00".into();
        let evening = event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 1);
        let next_day = event(owner, "Rust Workshop", EventCategory::Workshop, "Berlin", 2);
        for e in [&early, &noon, &evening, &next_day] {
            db.events().create(e).unwrap();
        }

        let from = NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        let titles: Vec<_> = db
            .events()
            .upcoming(from, 10)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Noon Recital", "Jazz Night", "Rust Workshop"]);

        let titles: Vec<_> = db
            .events()
            .upcoming(from - chrono::Duration::hours(5), 1)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Breakfast Talk"]);
    }

    #[test]
    fn test_update_details() {
        let (db, owner) = setup();
        let mut e = event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 1);
        db.events().create(&e).unwrap();

        EventUpdate {
            title: Some("Late Jazz".into()),
            price: Some(Money::from_major(5)),
            ..Default::default()
        }
        .apply_details(&mut e)
        .unwrap();
        assert!(db.events().update(&e, None).unwrap());

        let found = db.events().find_by_id(e.id).unwrap().unwrap();
        assert_eq!(found.title, "Late Jazz");
        assert_eq!(found.price, Money::from_major(5));
        assert_eq!(found.available_seats, 10);
    }

    #[test]
    fn test_list_filters_and_pagination() {
        let (db, owner) = setup();
        db.events()
            .create(&event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 3))
            .unwrap();
        db.events()
            .create(&event(owner, "Rock Night", EventCategory::Concert, "berlin-mitte", 1))
            .unwrap();
        db.events()
            .create(&event(owner, "Rust Workshop", EventCategory::Workshop, "Paris", 2))
            .unwrap();

        let filter = EventFilter {
            category: Some(EventCategory::Concert),
            location: Some("BERLIN".into()),
            ..Default::default()
        };
        let (events, total) = db
            .events()
            .list(&filter, EventSort::Date, SortOrder::Asc, PageRequest::default())
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(events[0].title, "Rock Night");
        assert_eq!(events[1].title, "Jazz Night");

        let search = EventFilter {
            search: Some("workshop".into()),
            ..Default::default()
        };
        let (events, _) = db
            .events()
            .list(&search, EventSort::Date, SortOrder::Asc, PageRequest::default())
            .unwrap();
        assert_eq!(events.len(), 1);

        let (events, total) = db
            .events()
            .list(
                &EventFilter::default(),
                EventSort::Price,
                SortOrder::Desc,
                PageRequest::new(Some(2), Some(2)),
            )
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Rock Night");
    }

    #[test]
    fn test_categories_and_locations() {
        let (db, owner) = setup();
        db.events()
            .create(&event(owner, "Jazz Night", EventCategory::Concert, "Berlin", 3))
            .unwrap();
        db.events()
            .create(&event(owner, "Rust Workshop", EventCategory::Workshop, "Amsterdam", 2))
            .unwrap();
        db.events()
            .create(&event(owner, "Go Workshop", EventCategory::Workshop, "Berlin", 4))
            .unwrap();

        assert_eq!(
            db.events().categories().unwrap(),
            vec![EventCategory::Concert, EventCategory::Workshop]
        );
        assert_eq!(db.events().locations().unwrap(), vec!["Amsterdam", "Berlin"]);
    }

    #[test]
    fn test_delete_missing_event() {
        let (db, _) = setup();
        assert_eq!(
            db.events().delete(Uuid::new_v4()).unwrap(),
            EventDeletion::NotFound
        );
    }
}
