use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{Message, MessageType};

/// Drops a booking system message into the conversation.
///
/// The booking write it describes has already committed, so a failure here is
/// logged and otherwise ignored.
pub fn post_booking_message(
    conn: &Connection,
    conversation_id: &str,
    sender_id: i64,
    kind: MessageType,
    booking_offer_id: &str,
) {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id,
        content: kind.content().to_string(),
        message_type: kind.as_str().to_string(),
        booking_offer_id: Some(booking_offer_id.to_string()),
        created_at: Utc::now(),
    };

    if let Err(e) = queries::insert_message(conn, &message) {
        tracing::error!(
            error = %e,
            conversation_id,
            message_type = kind.as_str(),
            "failed to create booking message"
        );
    }
}
