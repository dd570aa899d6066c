use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Booking, BookingOffer};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingRescheduled,
    BookingExpired,
    OfferCreated,
    OfferProposed,
    OfferConfirmed,
    OfferCancelled,
}

/// Lifecycle change pushed to connected clients of the involved users.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub status: String,
    pub participants: [i64; 2],
    pub at: DateTime<Utc>,
}

impl BookingEvent {
    pub fn for_booking(kind: BookingEventKind, booking: &Booking) -> Self {
        Self {
            kind,
            booking_id: Some(booking.id),
            offer_id: booking.booking_offer_id.clone(),
            conversation_id: None,
            status: booking.status.as_str().to_string(),
            participants: [booking.tutor_id, booking.student_id],
            at: Utc::now(),
        }
    }

    pub fn for_offer(kind: BookingEventKind, offer: &BookingOffer) -> Self {
        Self {
            kind,
            booking_id: None,
            offer_id: Some(offer.id.clone()),
            conversation_id: Some(offer.conversation_id.clone()),
            status: offer.status.as_str().to_string(),
            participants: [offer.tutor_id, offer.tutee_id],
            at: Utc::now(),
        }
    }

    pub fn with_booking(mut self, booking_id: i64) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn concerns(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }
}

pub fn publish(state: &AppState, event: BookingEvent) {
    tracing::debug!(kind = ?event.kind, booking_id = ?event.booking_id, offer_id = ?event.offer_id, "booking event");
    // No subscribers is the common case.
    let _ = state.events.send(event);
}
