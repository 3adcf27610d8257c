//! Service configuration loaded from TOML
//!
//! Every field has a default, so an empty file (or no file) is valid.

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::lifecycle::BookingPolicy;
use crate::models::MAX_SEATS_PER_BOOKING;

pub const DEFAULT_PORT: u16 = 7341;

/// One hundred years
pub const MAX_CANCELLATION_WINDOW_HOURS: i64 = 24 * 365 * 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file; defaults to the platform data directory
    pub database_path: Option<PathBuf>,
    /// `0` picks an ephemeral port
    pub listen_port: u16,
    pub payment: PaymentConfig,
    pub booking: BookingConfig,
    pub refunds: RefundConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub latency_ms: u64,
    /// Probability in `[0, 1]` that the mock gateway declines a charge
    pub decline_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub cancellation_window_hours: i64,
    pub max_seats_per_booking: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundConfig {
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            listen_port: DEFAULT_PORT,
            payment: PaymentConfig::default(),
            booking: BookingConfig::default(),
            refunds: RefundConfig::default(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1000,
            decline_rate: 0.0,
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            cancellation_window_hours: 24,
            max_seats_per_booking: MAX_SEATS_PER_BOOKING,
        }
    }
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

impl Config {
    /// Read and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("No configuration file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let rate = self.payment.decline_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::Config(format!(
                "payment.decline_rate must be within [0, 1], got {}",
                rate
            )));
        }
        let max_seats = self.booking.max_seats_per_booking;
        if !(1..=MAX_SEATS_PER_BOOKING).contains(&max_seats) {
            return Err(Error::Config(format!(
                "booking.max_seats_per_booking must be within [1, {}], got {}",
                MAX_SEATS_PER_BOOKING, max_seats
            )));
        }
        let window = self.booking.cancellation_window_hours;
        if !(0..=MAX_CANCELLATION_WINDOW_HOURS).contains(&window) {
            return Err(Error::Config(format!(
                "booking.cancellation_window_hours must be within [0, {}], got {}",
                MAX_CANCELLATION_WINDOW_HOURS, window
            )));
        }
        if self.refunds.queue_capacity == 0 {
            return Err(Error::Config(
                "refunds.queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Configured database path, or `<data dir>/boxoffice.db`
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("dev", "onyx", "boxoffice").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;
        Ok(dirs.data_dir().join("boxoffice.db"))
    }

    pub fn payment_latency(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.payment.latency_ms)
    }

    pub fn booking_policy(&self) -> Result<BookingPolicy> {
        let hours = self.booking.cancellation_window_hours;
        let cancellation_window = Duration::try_hours(hours).ok_or_else(|| {
            Error::Config(format!(
                "booking.cancellation_window_hours is out of range: {}",
                hours
            ))
        })?;
        Ok(BookingPolicy {
            cancellation_window,
            max_seats_per_booking: self.booking.max_seats_per_booking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.booking_policy().unwrap(), BookingPolicy::default());
        assert_eq!(config.payment_latency(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
            listen_port = 0

            [payment]
            decline_rate = 0.25

            [booking]
            cancellation_window_hours = 48
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_port, 0);
        assert_eq!(config.payment.decline_rate, 0.25);
        assert_eq!(config.payment.latency_ms, 1000);
        assert_eq!(
            config.booking_policy().unwrap().cancellation_window,
            Duration::hours(48)
        );
        assert_eq!(config.booking.max_seats_per_booking, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for content in [
            "[payment]\ndecline_rate = 1.5",
            "[booking]\nmax_seats_per_booking = 0",
            "[booking]\ncancellation_window_hours = -1",
            "[booking]\ncancellation_window_hours = 9223372036854775807",
            "[booking]\ncancellation_window_hours = 876001",
            "[booking]\nmax_seats_per_booking = 11",
            "[booking]\nmax_seats_per_booking = 50",
            "[refunds]\nqueue_capacity = 0",
            "listen_port = \"eighty\"",
        ] {
            assert!(
                matches!(Config::from_toml(content), Err(Error::Config(_))),
                "{} should be rejected",
                content
            );
        }
    }

    #[test]
    fn test_unvalidated_window_is_config_error() {
        let mut config = Config::default();
        config.booking.cancellation_window_hours = i64::MAX;
        assert!(matches!(config.booking_policy(), Err(Error::Config(_))));

        config.booking.cancellation_window_hours = MAX_CANCELLATION_WINDOW_HOURS;
        assert!(config.validate().is_ok());
        assert_eq!(
            config.booking_policy().unwrap().cancellation_window,
            Duration::hours(MAX_CANCELLATION_WINDOW_HOURS)
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"/tmp/boxoffice-test.db\"").unwrap();
        let config = Config::load_or_default(Some(file.path())).unwrap();
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/boxoffice-test.db")
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
