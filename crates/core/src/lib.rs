//! Boxoffice Core Library
//!
//! Core models, storage, booking lifecycle and reporting for the Boxoffice
//! booking service.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod invariants;
pub mod lifecycle;
pub mod models;
pub mod payment;
pub mod reporting;
pub mod storage;

#[cfg(test)]
mod testing;

pub use catalog::EventCatalog;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use lifecycle::{
    BookingPolicy, BookingService, NewBooking, RefundJob, RefundQueue, RefundReason, RefundStats,
};
pub use models::*;
pub use payment::{ChargeOutcome, MockPaymentGateway, PaymentGateway};
pub use reporting::Reports;
pub use storage::{
    BookingRepository, Database, EventDeletion, EventRepository, ReportRepository, SharedStore,
    Storage, UserRepository,
};
