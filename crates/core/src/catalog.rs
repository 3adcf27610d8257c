//! Event management: publishing, editing and browsing events

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::invariants::assert_event_invariants;
use crate::models::{
    Actor, Event, EventCategory, EventFilter, EventSort, EventUpdate, NewEvent, Page,
    PageRequest, SortOrder,
};
use crate::storage::{Database, EventDeletion, SharedStore, Storage};

pub struct EventCatalog<S = Database> {
    store: SharedStore<S>,
    clock: Arc<dyn Clock>,
}

/// Owner or admin may modify an event
fn require_owner_or_admin(actor: Actor, event: &Event) -> Result<()> {
    if actor.is_admin() || event.created_by == actor.user_id {
        Ok(())
    } else {
        Err(Error::Forbidden("not the owner of this event".into()))
    }
}

impl<S: Storage> EventCatalog<S> {
    pub fn new(store: SharedStore<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Publish a new event. Admin only.
    #[instrument(skip(self, input), fields(user_id = %actor.user_id, title = %input.title))]
    pub fn create_event(&self, actor: Actor, input: NewEvent) -> Result<Event> {
        actor.require_admin()?;
        let now = self.clock.now();
        input.validate(now)?;

        let event = input.into_event(actor.user_id, now);
        assert_event_invariants(&event);
        self.store.with(|db| db.create_event(&event))?;

        info!(event_id = %event.id, seats = event.total_seats, "Event created");
        Ok(event)
    }

    pub fn get_event(&self, event_id: Uuid) -> Result<Event> {
        self.store
            .with(|db| db.find_event_by_id(event_id))?
            .ok_or_else(|| Error::NotFound("Event not found".into()))
    }

    /// Edit an event. A new seat total keeps already sold seats sold.
    #[instrument(skip(self, update), fields(user_id = %actor.user_id))]
    pub fn update_event(&self, actor: Actor, event_id: Uuid, update: EventUpdate) -> Result<Event> {
        let now = self.clock.now();
        self.store.with(|db| {
            let mut event = db
                .find_event_by_id(event_id)?
                .ok_or_else(|| Error::NotFound("Event not found".into()))?;
            require_owner_or_admin(actor, &event)?;

            update.apply_details(&mut event)?;
            if (update.date.is_some() || update.time.is_some()) && event.starts_at()? <= now {
                return Err(Error::InvalidInput("Event date must be in the future".into()));
            }
            event.updated_at = now;

            if update.total_seats == Some(0) {
                return Err(Error::InvalidInput("Total seats must be at least 1".into()));
            }
            if !db.update_event(&event, update.total_seats)? {
                warn!(event_id = %event_id, total = ?update.total_seats, "Resize below sold seats refused");
                return Err(Error::InvalidState(format!(
                    "Cannot reduce total seats below the {} already booked",
                    event.seats_sold()
                )));
            }

            let updated = db
                .find_event_by_id(event_id)?
                .ok_or_else(|| Error::NotFound("Event not found".into()))?;
            assert_event_invariants(&updated);
            info!(event_id = %event_id, "Event updated");
            Ok(updated)
        })
    }

    /// Delete an event that has no confirmed bookings
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub fn delete_event(&self, actor: Actor, event_id: Uuid) -> Result<()> {
        self.store.with(|db| {
            let event = db
                .find_event_by_id(event_id)?
                .ok_or_else(|| Error::NotFound("Event not found".into()))?;
            require_owner_or_admin(actor, &event)?;

            match db.delete_event(event_id)? {
                EventDeletion::Deleted => {
                    info!(event_id = %event_id, "Event deleted");
                    Ok(())
                }
                EventDeletion::NotFound => Err(Error::NotFound("Event not found".into())),
                EventDeletion::HasActiveBookings => Err(Error::Conflict(
                    "Event has confirmed bookings and cannot be deleted".into(),
                )),
            }
        })
    }

    pub fn list_events(
        &self,
        filter: &EventFilter,
        sort: EventSort,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<Event>> {
        let (items, total) = self
            .store
            .with(|db| db.list_events(filter, sort, order, page))?;
        Ok(Page {
            items,
            pagination: page.describe(total),
        })
    }

    pub fn categories(&self) -> Result<Vec<EventCategory>> {
        self.store.with(|db| db.event_categories())
    }

    pub fn locations(&self) -> Result<Vec<String>> {
        self.store.with(|db| db.event_locations())
    }
}
