//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Accounts
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'user',
                created_at TEXT NOT NULL
            );

            -- Event store. available_seats is the contended counter.
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                location TEXT NOT NULL,
                venue TEXT NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
                total_seats INTEGER NOT NULL CHECK (total_seats >= 1),
                available_seats INTEGER NOT NULL,
                image_url TEXT,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (available_seats >= 0 AND available_seats <= total_seats),
                FOREIGN KEY (created_by) REFERENCES users(id)
            );

            -- Booking ledger. event_id is deliberately not a foreign key:
            -- cancelled bookings outlive a deleted event.
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                event_id TEXT NOT NULL,
                seats_booked INTEGER NOT NULL CHECK (seats_booked >= 1 AND seats_booked <= 10),
                total_amount_cents INTEGER NOT NULL CHECK (total_amount_cents >= 0),
                status TEXT NOT NULL DEFAULT 'pending',
                payment_id TEXT,
                booking_date TEXT NOT NULL,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL,
                emergency_contact TEXT NOT NULL,
                emergency_phone TEXT NOT NULL,
                special_requests TEXT,
                payment_method TEXT NOT NULL DEFAULT 'mock',
                payment_transaction_id TEXT,
                payment_status TEXT NOT NULL DEFAULT 'pending',
                amount_paid_cents INTEGER NOT NULL DEFAULT 0,
                paid_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes and the one-confirmed-booking constraint",
        sql: r#"
            -- Event indexes
            CREATE INDEX IF NOT EXISTS idx_events_category_location_date
                ON events(category, location, date);
            CREATE INDEX IF NOT EXISTS idx_events_date ON events(date, time);

            -- Booking indexes
            CREATE INDEX IF NOT EXISTS idx_bookings_user_event ON bookings(user_id, event_id);
            CREATE INDEX IF NOT EXISTS idx_bookings_event ON bookings(event_id);
            CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);
            CREATE INDEX IF NOT EXISTS idx_bookings_created ON bookings(created_at);

            -- At most one confirmed booking per (user, event).
            -- Cancelled rows are excluded so re-booking stays possible.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_one_confirmed
                ON bookings(user_id, event_id) WHERE status = 'confirmed';
        "#,
    },
    Migration {
        version: 3,
        description: "Add refund tracking to bookings",
        sql: r#"
            ALTER TABLE bookings ADD COLUMN refunded_at TEXT;

            CREATE INDEX IF NOT EXISTS idx_bookings_status_created
                ON bookings(status, created_at);
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn.query_row(
        "SELECT MAX(version) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)?;
            record_migration(&tx, migration)?;
            tx.commit()?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

/// Get the latest migration version
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
