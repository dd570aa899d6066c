use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::models::{
    Booking, BookingOffer, BookingStatus, Conversation, MessageType, OfferStatus, UserType,
};
use crate::services::chat::post_booking_message;
use crate::services::events::{self, BookingEvent, BookingEventKind};
use crate::services::lifecycle::{next_offer_status, OfferAction};
use crate::services::scheduling;
use crate::state::AppState;

/// Sessions agreed in chat are booked for one hour.
const SESSION_LENGTH_MINUTES: i64 = 60;
const SESSION_SUBJECT: &str = "Tutoring session";
const SESSION_LEVEL: &str = "unspecified";

fn load_conversation(conn: &Connection, id: &str) -> AppResult<Conversation> {
    queries::get_conversation(conn, id)?
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))
}

fn load_offer(conn: &Connection, id: &str) -> AppResult<BookingOffer> {
    queries::get_offer(conn, id)?
        .ok_or_else(|| AppError::NotFound("Booking offer not found".to_string()))
}

/// Returns `(tutor_id, tutee_id)` for the conversation.
fn resolve_roles(conn: &Connection, conversation: &Conversation) -> AppResult<(i64, i64)> {
    let first = queries::get_user(conn, conversation.participant1_id)?;
    let second = queries::get_user(conn, conversation.participant2_id)?;
    let is_tutor = |u: &Option<crate::models::User>| {
        u.as_ref().is_some_and(|u| u.user_type == UserType::Tutor)
    };

    if is_tutor(&first) && !is_tutor(&second) {
        Ok((conversation.participant1_id, conversation.participant2_id))
    } else if is_tutor(&second) && !is_tutor(&first) {
        Ok((conversation.participant2_id, conversation.participant1_id))
    } else {
        Err(AppError::Validation(
            "Conversation must be between a tutor and a tutee".to_string(),
        ))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// POST /booking-offers
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub tutee_location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateOfferRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let conversation_id = non_empty(body.conversation_id)
        .ok_or_else(|| AppError::Validation("Conversation ID is required".to_string()))?;

    let offer = {
        let conn = state.db()?;
        let conversation = load_conversation(&conn, &conversation_id)?;
        let (tutor_id, tutee_id) = resolve_roles(&conn, &conversation)?;
        if tutee_id != user.id {
            return Err(AppError::Forbidden(
                "Only tutees can create booking offers".to_string(),
            ));
        }

        let now = Utc::now();
        let offer = BookingOffer {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            tutee_id,
            tutor_id,
            is_online: body.is_online.unwrap_or(false),
            tutee_location: non_empty(body.tutee_location),
            tutor_location: None,
            final_location: None,
            proposed_time: None,
            notes: non_empty(body.notes),
            status: OfferStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        queries::insert_offer(&conn, &offer)?;
        post_booking_message(&conn, &offer.conversation_id, tutee_id, MessageType::BookingOffer, &offer.id);
        offer
    };

    tracing::info!(offer_id = %offer.id, conversation_id = %offer.conversation_id, "booking offer created");
    events::publish(&state, BookingEvent::for_offer(BookingEventKind::OfferCreated, &offer));

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Booking offer created successfully",
            "bookingOffer": offer,
        })),
    ))
}

// GET /booking-offers/:conversation_id
pub async fn list_offers(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let offers = {
        let conn = state.db()?;
        let conversation = load_conversation(&conn, &conversation_id)?;
        if !conversation.has_participant(user.id) {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }
        queries::list_offers_for_conversation(&conn, &conversation_id)?
    };

    Ok(Json(serde_json::json!({ "bookingOffers": offers })))
}

// POST /booking-proposals
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    pub booking_offer_id: Option<String>,
    pub proposed_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tutor_location: Option<String>,
    #[serde(default)]
    pub final_location: Option<String>,
}

pub async fn create_proposal(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<ProposalRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let (Some(offer_id), Some(proposed_time)) = (non_empty(body.booking_offer_id), body.proposed_time)
    else {
        return Err(AppError::Validation(
            "Booking offer ID and proposed time are required".to_string(),
        ));
    };
    let now = Utc::now();
    if proposed_time <= now {
        return Err(AppError::Validation(
            "\"proposedTime\" must be in the future".to_string(),
        ));
    }
    let tutor_location = non_empty(body.tutor_location);
    let final_location = non_empty(body.final_location);

    let offer = {
        let conn = state.db()?;
        let offer = load_offer(&conn, &offer_id)?;
        if offer.tutor_id != user.id {
            return Err(AppError::Forbidden(
                "Only tutors can create booking proposals".to_string(),
            ));
        }
        let next = next_offer_status(offer.status, OfferAction::Propose)?;
        queries::update_offer_proposal(
            &conn,
            &offer_id,
            &proposed_time,
            tutor_location.as_deref(),
            final_location.as_deref(),
            next,
            &now,
        )?;
        post_booking_message(&conn, &offer.conversation_id, user.id, MessageType::BookingProposal, &offer_id);
        load_offer(&conn, &offer_id)?
    };

    tracing::info!(offer_id = %offer.id, proposed_time = %proposed_time, "booking proposal made");
    events::publish(&state, BookingEvent::for_offer(BookingEventKind::OfferProposed, &offer));

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Booking proposal created successfully",
            "bookingOffer": offer,
        })),
    ))
}

// POST /booking-confirmations
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub booking_offer_id: Option<String>,
}

pub async fn create_confirmation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<ConfirmationRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let offer_id = non_empty(body.booking_offer_id)
        .ok_or_else(|| AppError::Validation("Booking offer ID is required".to_string()))?;

    let (offer, booking) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let offer = load_offer(&tx, &offer_id)?;
        if offer.tutee_id != user.id {
            return Err(AppError::Forbidden(
                "Only tutees can confirm booking offers".to_string(),
            ));
        }
        let next = next_offer_status(offer.status, OfferAction::Confirm)?;
        let start = offer.proposed_time.ok_or_else(|| {
            AppError::InvalidTransition("Booking offer has no proposed time".to_string())
        })?;
        let end = start + Duration::minutes(SESSION_LENGTH_MINUTES);
        scheduling::check_conflicts(&tx, offer.tutor_id, &start, &end, None)?;

        let now = Utc::now();
        queries::set_offer_status(&tx, &offer_id, next, &now)?;
        let booking = queries::insert_booking(
            &tx,
            &Booking {
                id: 0,
                tutor_id: offer.tutor_id,
                student_id: offer.tutee_id,
                subject: SESSION_SUBJECT.to_string(),
                level: SESSION_LEVEL.to_string(),
                start_time: start,
                end_time: end,
                location: offer.final_location.clone(),
                is_online: offer.is_online,
                notes: offer.notes.clone(),
                hourly_rate: 0.0,
                total_amount: 0.0,
                status: BookingStatus::Confirmed,
                cancellation_reason: None,
                booking_offer_id: Some(offer.id.clone()),
                created_at: now,
                updated_at: now,
                confirmed_at: Some(now),
                cancelled_at: None,
                rescheduled_at: None,
            },
        )?;
        let offer = load_offer(&tx, &offer_id)?;
        tx.commit()?;

        post_booking_message(&conn, &offer.conversation_id, user.id, MessageType::BookingConfirmation, &offer_id);
        (offer, booking)
    };

    tracing::info!(offer_id = %offer.id, booking_id = booking.id, "booking offer confirmed");
    events::publish(
        &state,
        BookingEvent::for_offer(BookingEventKind::OfferConfirmed, &offer).with_booking(booking.id),
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Booking confirmed successfully",
            "bookingOffer": offer,
            "finalBooking": booking,
        })),
    ))
}

// POST /booking-offers/:id/cancel
pub async fn cancel_offer(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(offer_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let offer = {
        let conn = state.db()?;
        let offer = load_offer(&conn, &offer_id)?;
        if !offer.involves(user.id) {
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }
        let next = next_offer_status(offer.status, OfferAction::Cancel)?;
        queries::set_offer_status(&conn, &offer_id, next, &Utc::now())?;
        post_booking_message(&conn, &offer.conversation_id, user.id, MessageType::BookingCancellation, &offer_id);
        load_offer(&conn, &offer_id)?
    };

    tracing::info!(offer_id = %offer.id, cancelled_by = user.id, "booking offer cancelled");
    events::publish(&state, BookingEvent::for_offer(BookingEventKind::OfferCancelled, &offer));

    Ok(Json(serde_json::json!({
        "message": "Booking offer cancelled successfully",
        "bookingOffer": offer,
    })))
}
