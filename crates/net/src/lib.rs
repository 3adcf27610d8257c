//! Boxoffice Network Library
//!
//! TCP front end for the booking service.
//!
//! # Architecture
//!
//! - **Server**: Accepts connections and dispatches requests to the core services
//! - **Client**: Sends requests and waits for the matching responses
//! - **Protocol**: Length-prefixed JSON messages, one response per request
//!
//! # Usage
//!
//! ```ignore
//! let (services, _refund_worker) = Services::new(store, gateway, clock, policy, 256);
//! let server = Server::start(DEFAULT_PORT, Arc::new(services)).await?;
//!
//! let mut client = Client::connect(addr).await?;
//! let response = client.call(Request::EventCategories).await?;
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use boxoffice_core::config::DEFAULT_PORT;
pub use client::Client;
pub use error::{Error, Result};
pub use frame::MAX_FRAME_SIZE;
pub use protocol::{ErrorBody, Paging, Request, Response};
pub use server::{Server, Services};
