use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: i64,
    pub content: String,
    pub message_type: String,
    pub booking_offer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// System messages the booking flow drops into a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    BookingOffer,
    BookingProposal,
    BookingConfirmation,
    BookingCancellation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::BookingOffer => "booking_offer",
            MessageType::BookingProposal => "booking_proposal",
            MessageType::BookingConfirmation => "booking_confirmation",
            MessageType::BookingCancellation => "booking_cancellation",
        }
    }

    pub fn content(&self) -> &'static str {
        match self {
            MessageType::BookingOffer => "📅 Booking request sent",
            MessageType::BookingProposal => "📅 Booking proposal received",
            MessageType::BookingConfirmation => "✅ Booking confirmed!",
            MessageType::BookingCancellation => "❌ Booking request cancelled",
        }
    }
}
