//! Booking lifecycle
//!
//! Creates and cancels bookings while keeping the seat counter, the booking
//! ledger and the payment outcome consistent:
//!
//! - preconditions are checked against the latest stored state before money moves
//! - the payment call happens with no store lock held
//! - the booking insert and the conditional seat decrement commit together
//! - refunds go through [`RefundQueue`] and never fail a cancellation

mod refunds;

pub use refunds::{RefundJob, RefundQueue, RefundReason, RefundStats};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::invariants::{assert_booking_invariants, assert_event_invariants};
use crate::models::{
    Actor, Booking, BookingConfirmation, BookingDetails, BookingFilter, BookingStatus,
    BookingView, Event, EventBookingStats, Page, PageRequest, PaymentDetails, PaymentMethod,
    PaymentReceipt, MAX_SEATS_PER_BOOKING,
};
use crate::payment::{ChargeOutcome, PaymentGateway};
use crate::storage::{Database, SharedStore, Storage};

/// Tunable booking rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Cancellations closer than this to the event start are refused
    pub cancellation_window: Duration,
    pub max_seats_per_booking: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            cancellation_window: Duration::hours(24),
            max_seats_per_booking: MAX_SEATS_PER_BOOKING,
        }
    }
}

/// Booking request as submitted by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub event_id: Uuid,
    pub seats: u32,
    #[serde(default)]
    pub payment: PaymentMethod,
    pub details: BookingDetails,
}

pub struct BookingService<S = Database> {
    store: SharedStore<S>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    refunds: RefundQueue,
    policy: BookingPolicy,
}

impl<S: Storage> BookingService<S> {
    pub fn new(
        store: SharedStore<S>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        refunds: RefundQueue,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            refunds,
            policy,
        }
    }

    pub fn policy(&self) -> BookingPolicy {
        self.policy
    }

    pub fn refunds(&self) -> &RefundQueue {
        &self.refunds
    }

    /// Reserve seats for `actor` and charge for them
    #[instrument(skip(self, request), fields(user_id = %actor.user_id, event_id = %request.event_id, seats = request.seats))]
    pub async fn create_booking(
        &self,
        actor: Actor,
        request: NewBooking,
    ) -> Result<BookingConfirmation> {
        let max = self.policy.max_seats_per_booking;
        if request.seats == 0 || request.seats > max {
            return Err(Error::InvalidInput(format!(
                "Seats must be between 1 and {}",
                max
            )));
        }
        request.details.validate()?;

        let now = self.clock.now();
        let event = self
            .store
            .with(|db| check_bookable(db, actor.user_id, request.event_id, request.seats, now))
            .inspect_err(|e| warn!(reason = %e, "Booking rejected"))?;

        let amount = event
            .price
            .checked_times(request.seats)
            .ok_or_else(|| Error::InvalidInput("Booking amount is too large".into()))?;

        let (transaction_id, payment_status) =
            match self.gateway.charge(amount, &request.payment).await {
                ChargeOutcome::Approved {
                    transaction_id,
                    status,
                } => (transaction_id, status),
                ChargeOutcome::Declined { reason } => {
                    warn!(amount = amount.cents(), reason = %reason, "Payment declined");
                    return Err(Error::PaymentFailed(reason));
                }
            };

        let paid_at = self.clock.now();
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: actor.user_id,
            event_id: event.id,
            seats_booked: request.seats,
            total_amount: amount,
            status: BookingStatus::Confirmed,
            payment_id: Some(transaction_id.clone()),
            booking_date: paid_at,
            booking_details: request.details,
            payment_details: PaymentDetails {
                method: request.payment.method,
                transaction_id: Some(transaction_id.clone()),
                status: payment_status,
                amount_paid: amount,
                paid_at: Some(paid_at),
                refunded_at: None,
            },
            created_at: paid_at,
            updated_at: paid_at,
        };
        assert_booking_invariants(&booking);

        // State may have moved while the charge was in flight; the commit
        // re-checks seats and uniqueness atomically.
        if let Err(e) = self.store.with(|db| db.commit_booking(&booking)) {
            warn!(booking_id = %booking.id, reason = %e, "Booking lost at commit, refunding charge");
            self.refunds.enqueue(RefundJob {
                booking_id: booking.id,
                transaction_id,
                amount,
                reason: RefundReason::Compensation,
            });
            return Err(e);
        }

        let view = self.store.with(|db| {
            db.find_booking_view(booking.id)?
                .ok_or_else(|| Error::Internal("committed booking not readable".into()))
        })?;

        info!(
            booking_id = %booking.id,
            amount = amount.cents(),
            transaction_id = %transaction_id,
            "Booking confirmed"
        );

        Ok(BookingConfirmation {
            booking: view,
            payment: PaymentReceipt {
                transaction_id,
                amount,
                status: payment_status,
            },
        })
    }

    /// Cancel one of `actor`'s bookings and queue its refund
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn cancel_booking(&self, actor: Actor, booking_id: Uuid) -> Result<BookingView> {
        let now = self.clock.now();
        let window = self.policy.cancellation_window;

        let view = self
            .store
            .with(|db| {
                let booking = db
                    .find_booking_by_id(booking_id)?
                    .filter(|b| b.user_id == actor.user_id)
                    .ok_or_else(|| Error::NotFound("Booking not found".into()))?;

                if booking.status == BookingStatus::Cancelled {
                    return Err(Error::InvalidState("Booking is already cancelled".into()));
                }
                if booking.status != BookingStatus::Confirmed {
                    return Err(Error::InvalidState(format!(
                        "Cannot cancel a {} booking",
                        booking.status
                    )));
                }

                let event = db
                    .find_event_by_id(booking.event_id)?
                    .ok_or_else(|| Error::NotFound("Event not found".into()))?;
                if event.starts_at()? - now < window {
                    return Err(Error::InvalidState(format!(
                        "Cannot cancel within {} hours of event",
                        window.num_hours()
                    )));
                }

                if !db.commit_cancellation(booking_id, now)? {
                    return Err(Error::InvalidState("Booking is already cancelled".into()));
                }

                db.find_booking_view(booking_id)?
                    .ok_or_else(|| Error::Internal("cancelled booking not readable".into()))
            })
            .inspect_err(|e| warn!(booking_id = %booking_id, reason = %e, "Cancellation rejected"))?;

        let booking = &view.booking;
        info!(
            booking_id = %booking.id,
            event_id = %booking.event_id,
            seats = booking.seats_booked,
            "Booking cancelled"
        );

        if let Some(transaction_id) = &booking.payment_id {
            self.refunds.enqueue(RefundJob {
                booking_id: booking.id,
                transaction_id: transaction_id.clone(),
                amount: booking.total_amount,
                reason: RefundReason::Cancellation,
            });
        }

        Ok(view)
    }

    /// One of `actor`'s own bookings. Other users' bookings read as missing.
    pub fn get_booking(&self, actor: Actor, booking_id: Uuid) -> Result<BookingView> {
        self.store
            .with(|db| db.find_booking_view(booking_id))?
            .filter(|v| v.booking.user_id == actor.user_id)
            .ok_or_else(|| Error::NotFound("Booking not found".into()))
    }

    pub fn list_user_bookings(
        &self,
        actor: Actor,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Page<BookingView>> {
        let filter = BookingFilter::for_user(actor.user_id, status);
        let (items, total) = self.store.with(|db| db.list_bookings(&filter, page))?;
        Ok(Page {
            items,
            pagination: page.describe(total),
        })
    }

    /// Every booking, optionally filtered. Admin only.
    pub fn list_all_bookings(
        &self,
        actor: Actor,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<BookingView>> {
        actor.require_admin()?;
        let (items, total) = self.store.with(|db| db.list_bookings(&filter, page))?;
        Ok(Page {
            items,
            pagination: page.describe(total),
        })
    }

    /// An event's bookings with per-status totals. Admin only.
    pub fn event_booking_stats(
        &self,
        actor: Actor,
        event_id: Uuid,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<EventBookingStats> {
        actor.require_admin()?;
        self.store.with(|db| {
            let event = db
                .find_event_by_id(event_id)?
                .ok_or_else(|| Error::NotFound("Event not found".into()))?;
            let filter = BookingFilter::for_event(event_id, status);
            let (items, total) = db.list_bookings(&filter, page)?;
            let stats = db.booking_status_stats(event_id)?;
            Ok(EventBookingStats {
                event: event.summary(),
                bookings: Page {
                    items,
                    pagination: page.describe(total),
                },
                stats,
            })
        })
    }
}

/// Preconditions for a new booking, in reporting order
fn check_bookable<S: Storage>(
    db: &S,
    user_id: Uuid,
    event_id: Uuid,
    seats: u32,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Event> {
    if db.find_user_by_id(user_id)?.is_none() {
        return Err(Error::NotFound("User not found".into()));
    }
    let event = db
        .find_event_by_id(event_id)?
        .ok_or_else(|| Error::NotFound("Event not found".into()))?;
    assert_event_invariants(&event);

    if event.starts_at()? <= now {
        return Err(Error::InvalidState("Cannot book past events".into()));
    }
    if db.has_confirmed_booking(user_id, event_id)? {
        return Err(Error::Conflict(
            "You already have a booking for this event".into(),
        ));
    }
    if seats > event.available_seats {
        return Err(Error::InsufficientCapacity {
            available: event.available_seats,
        });
    }
    Ok(event)
}
