//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire. Each
//! request frame gets exactly one response frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use boxoffice_core::{
    Actor, BookingFilter, BookingStatus, ErrorKind, EventFilter, EventSort, EventUpdate,
    NewBooking, NewEvent, PageRequest, RevenuePeriod, SortOrder, UserRole,
};

/// Optional paging parameters as sent by callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl Paging {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

/// Operations a caller can invoke
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Ping,

    RegisterUser {
        name: String,
        email: String,
        #[serde(default = "default_role")]
        role: UserRole,
    },

    // Bookings
    CreateBooking {
        actor: Actor,
        booking: NewBooking,
    },
    CancelBooking {
        actor: Actor,
        booking_id: Uuid,
    },
    GetBooking {
        actor: Actor,
        booking_id: Uuid,
    },
    ListUserBookings {
        actor: Actor,
        #[serde(default)]
        status: Option<BookingStatus>,
        #[serde(flatten)]
        paging: Paging,
    },
    ListAllBookings {
        actor: Actor,
        #[serde(default)]
        filter: BookingFilter,
        #[serde(flatten)]
        paging: Paging,
    },
    EventBookingStats {
        actor: Actor,
        event_id: Uuid,
        #[serde(default)]
        status: Option<BookingStatus>,
        #[serde(flatten)]
        paging: Paging,
    },

    // Events
    CreateEvent {
        actor: Actor,
        event: NewEvent,
    },
    GetEvent {
        event_id: Uuid,
    },
    UpdateEvent {
        actor: Actor,
        event_id: Uuid,
        update: EventUpdate,
    },
    DeleteEvent {
        actor: Actor,
        event_id: Uuid,
    },
    ListEvents {
        #[serde(default)]
        filter: EventFilter,
        #[serde(default)]
        sort: EventSort,
        #[serde(default)]
        order: SortOrder,
        #[serde(flatten)]
        paging: Paging,
    },
    EventCategories,
    EventLocations,

    // Reporting
    DashboardOverview {
        actor: Actor,
    },
    Dashboard {
        actor: Actor,
    },
    RevenueSeries {
        actor: Actor,
        #[serde(default)]
        period: RevenuePeriod,
    },
}

fn default_role() -> UserRole {
    UserRole::User
}

impl Request {
    /// Operation name, for logging
    pub fn op(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::RegisterUser { .. } => "register_user",
            Request::CreateBooking { .. } => "create_booking",
            Request::CancelBooking { .. } => "cancel_booking",
            Request::GetBooking { .. } => "get_booking",
            Request::ListUserBookings { .. } => "list_user_bookings",
            Request::ListAllBookings { .. } => "list_all_bookings",
            Request::EventBookingStats { .. } => "event_booking_stats",
            Request::CreateEvent { .. } => "create_event",
            Request::GetEvent { .. } => "get_event",
            Request::UpdateEvent { .. } => "update_event",
            Request::DeleteEvent { .. } => "delete_event",
            Request::ListEvents { .. } => "list_events",
            Request::EventCategories => "event_categories",
            Request::EventLocations => "event_locations",
            Request::DashboardOverview { .. } => "dashboard_overview",
            Request::Dashboard { .. } => "dashboard",
            Request::RevenueSeries { .. } => "revenue_series",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Tagged outcome of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Convert a core result, masking internal error details
    pub fn from_result<T: Serialize>(result: boxoffice_core::Result<T>) -> Self {
        match result.and_then(|v| serde_json::to_value(v).map_err(Into::into)) {
            Ok(data) => Self::ok(data),
            Err(e) => Self::error(e.kind(), e.public_message()),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
