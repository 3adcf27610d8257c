//! Event model - a schedulable happening with finite seating

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Money;
use crate::error::{Error, Result};

/// Fixed set of event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Conference,
    Workshop,
    Seminar,
    Concert,
    Sports,
    Exhibition,
    Networking,
    Other,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Conference => "conference",
            EventCategory::Workshop => "workshop",
            EventCategory::Seminar => "seminar",
            EventCategory::Concert => "concert",
            EventCategory::Sports => "sports",
            EventCategory::Exhibition => "exhibition",
            EventCategory::Networking => "networking",
            EventCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "conference" => Some(EventCategory::Conference),
            "workshop" => Some(EventCategory::Workshop),
            "seminar" => Some(EventCategory::Seminar),
            "concert" => Some(EventCategory::Concert),
            "sports" => Some(EventCategory::Sports),
            "exhibition" => Some(EventCategory::Exhibition),
            "networking" => Some(EventCategory::Networking),
            "other" => Some(EventCategory::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a start time in `HH:MM` form (hour may be a single digit)
pub fn parse_start_time(s: &str) -> Option<NaiveTime> {
    let (hour, minute) = s.split_once(':')?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return None;
    }
    if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Combine a calendar date and `HH:MM` time into a UTC instant
pub fn start_instant(date: NaiveDate, time: &str) -> Result<DateTime<Utc>> {
    let time = parse_start_time(time)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid time '{}', expected HH:MM", time)))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// A published event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub location: String,
    pub venue: String,
    pub date: NaiveDate,
    /// Start time, `HH:MM`
    pub time: String,
    pub price: Money,
    pub total_seats: u32,
    pub available_seats: u32,
    pub image_url: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn starts_at(&self) -> Result<DateTime<Utc>> {
        start_instant(self.date, &self.time)
    }

    pub fn seats_sold(&self) -> u32 {
        self.total_seats.saturating_sub(self.available_seats)
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            id: self.id,
            title: self.title.clone(),
            category: self.category,
            date: self.date,
            time: self.time.clone(),
            venue: self.venue.clone(),
            location: self.location.clone(),
            price: self.price,
        }
    }
}

/// Minimal event projection shown next to bookings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub title: String,
    pub category: EventCategory,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub location: String,
    pub price: Money,
}

/// Input for publishing an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub location: String,
    pub venue: String,
    pub date: NaiveDate,
    pub time: String,
    pub price: Money,
    pub total_seats: u32,
    /// Defaults to `total_seats`
    #[serde(default)]
    pub available_seats: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewEvent {
    /// Check field constraints. `now` is used for the future-date rule.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        validate_title(&self.title)?;
        require("location", &self.location)?;
        require("venue", &self.venue)?;
        if self.price.is_negative() {
            return Err(Error::InvalidInput("Price cannot be negative".into()));
        }
        if self.total_seats == 0 {
            return Err(Error::InvalidInput("Total seats must be at least 1".into()));
        }
        if let Some(available) = self.available_seats {
            if available > self.total_seats {
                return Err(Error::InvalidInput(
                    "Available seats cannot exceed total seats".into(),
                ));
            }
        }
        if start_instant(self.date, &self.time)? <= now {
            return Err(Error::InvalidInput("Event date must be in the future".into()));
        }
        Ok(())
    }

    pub fn into_event(self, created_by: Uuid, now: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            available_seats: self.available_seats.unwrap_or(self.total_seats),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            category: self.category,
            location: self.location.trim().to_string(),
            venue: self.venue.trim().to_string(),
            date: self.date,
            time: self.time,
            price: self.price,
            total_seats: self.total_seats,
            image_url: self.image_url,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial edit of an event. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<EventCategory>,
    pub location: Option<String>,
    pub venue: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub price: Option<Money>,
    pub total_seats: Option<u32>,
    pub image_url: Option<String>,
}

impl EventUpdate {
    /// Apply descriptive fields onto `event`. Seat totals are handled by the
    /// store so the available counter is adjusted atomically.
    pub fn apply_details(&self, event: &mut Event) -> Result<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
            event.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            event.description = description.trim().to_string();
        }
        if let Some(category) = self.category {
            event.category = category;
        }
        if let Some(location) = &self.location {
            require("location", location)?;
            event.location = location.trim().to_string();
        }
        if let Some(venue) = &self.venue {
            require("venue", venue)?;
            event.venue = venue.trim().to_string();
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(time) = &self.time {
            if parse_start_time(time).is_none() {
                return Err(Error::InvalidInput(format!(
                    "Invalid time '{}', expected HH:MM",
                    time
                )));
            }
            event.time = time.clone();
        }
        if let Some(price) = self.price {
            if price.is_negative() {
                return Err(Error::InvalidInput("Price cannot be negative".into()));
            }
            event.price = price;
        }
        if let Some(image_url) = &self.image_url {
            event.image_url = Some(image_url.clone());
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<()> {
    let len = title.trim().chars().count();
    if !(3..=100).contains(&len) {
        return Err(Error::InvalidInput(
            "Title must be between 3 and 100 characters".into(),
        ));
    }
    Ok(())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("Event {} is required", field)));
    }
    Ok(())
}

/// Optional filters for listing events, combined with AND
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    /// Case-insensitive substring of the location
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    /// Substring of title or description
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSort {
    #[default]
    Date,
    Price,
    Title,
    CreatedAt,
}

impl EventSort {
    pub fn column(&self) -> &'static str {
        match self {
            EventSort::Date => "date, time",
            EventSort::Price => "price_cents",
            EventSort::Title => "title",
            EventSort::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_event() -> NewEvent {
        NewEvent {
            title: "RustConf".into(),
            description: "A conference about Rust".into(),
            category: EventCategory::Conference,
            location: "Portland".into(),
            venue: "Convention Center".into(),
            date: NaiveDate::from_ymd_opt(2030, 9, 1).unwrap(),
            time: "09:30".into(),
            price: Money::from_major(100),
            total_seats: 50,
            available_seats: None,
            image_url: None,
        }
    }

    #[test]
    fn test_parse_start_time() {
        assert_eq!(parse_start_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_start_time("7:05"), NaiveTime::from_hms_opt(7, 5, 0));
        assert!(parse_start_time("24:00").is_none());
        assert!(parse_start_time("12:60").is_none());
        assert!(parse_start_time("12:5").is_none());
        assert!(parse_start_time("noon").is_none());
    }

    #[test]
    fn test_available_defaults_to_total() {
        let event = new_event().into_event(Uuid::new_v4(), Utc::now());
        assert_eq!(event.available_seats, 50);
        assert_eq!(event.seats_sold(), 0);
    }

    #[test]
    fn test_starts_at_combines_date_and_time() {
        let event = new_event().into_event(Uuid::new_v4(), Utc::now());
        let start = event.starts_at().unwrap();
        assert_eq!(start.to_rfc3339(), "2030-09-01T09:30:00+00:00");
    }

    #[test]
    fn test_validate_rejects_past_date() {
        let mut input = new_event();
        input.date = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        assert!(matches!(
            input.validate(Utc::now()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_available() {
        let mut input = new_event();
        input.available_seats = Some(51);
        assert!(input.validate(Utc::now()).is_err());
    }

    #[test]
    fn test_update_rejects_bad_time() {
        let mut event = new_event().into_event(Uuid::new_v4(), Utc::now());
        let update = EventUpdate {
            time: Some("25:00".into()),
            ..Default::default()
        };
        assert!(update.apply_details(&mut event).is_err());
        assert_eq!(event.time, "09:30");
    }
}
