//! Data models for Boxoffice

mod booking;
mod event;
mod money;
mod page;
mod report;
mod user;

pub use booking::*;
pub use event::*;
pub use money::*;
pub use page::*;
pub use report::*;
pub use user::*;
