use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::{Stream, StreamExt};

use crate::auth::{self, AuthUser};
use crate::db::queries::{self, BookingRole};
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::models::booking::{total_amount, MAX_NOTES_LEN};
use crate::models::{Booking, BookingStatus, NewBooking, User, UserType};
use crate::services::events::{self, BookingEvent, BookingEventKind};
use crate::services::lifecycle::{next_booking_status, BookingAction};
use crate::services::scheduling;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

fn load_booking(conn: &rusqlite::Connection, id: i64) -> AppResult<Booking> {
    queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

fn require_party(booking: &Booking, user: &AuthUser) -> AppResult<()> {
    if booking.involves(user.id) || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Forbidden".to_string()))
    }
}

fn require_user(
    conn: &rusqlite::Connection,
    id: i64,
    expected: UserType,
    label: &str,
) -> AppResult<User> {
    let user = queries::get_user(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("{label} not found")))?;
    if user.user_type != expected {
        return Err(AppError::Validation(format!(
            "User {id} is not a {}",
            expected.as_str()
        )));
    }
    Ok(user)
}

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<NewBooking>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    body.validate().map_err(AppError::Validation)?;
    if user.id != body.student_id && user.id != body.tutor_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "You can only create bookings you take part in".to_string(),
        ));
    }

    let booking = {
        let mut conn = state.db()?;
        require_user(&conn, body.tutor_id, UserType::Tutor, "Tutor")?;
        require_user(&conn, body.student_id, UserType::Student, "Student")?;

        let tx = conn.transaction()?;
        scheduling::validate_booking_time(&tx, body.tutor_id, &body.start_time, &body.end_time, None)?;

        let now = Utc::now();
        let booking = queries::insert_booking(
            &tx,
            &Booking {
                id: 0,
                tutor_id: body.tutor_id,
                student_id: body.student_id,
                subject: body.subject.trim().to_string(),
                level: body.level.trim().to_string(),
                start_time: body.start_time,
                end_time: body.end_time,
                location: body.location.clone(),
                is_online: body.is_online,
                notes: body.notes.clone(),
                hourly_rate: body.hourly_rate,
                total_amount: body.total_amount(),
                status: BookingStatus::Pending,
                cancellation_reason: None,
                booking_offer_id: None,
                created_at: now,
                updated_at: now,
                confirmed_at: None,
                cancelled_at: None,
                rescheduled_at: None,
            },
        )?;
        tx.commit()?;
        booking
    };

    tracing::info!(
        booking_id = booking.id,
        tutor_id = booking.tutor_id,
        student_id = booking.student_id,
        "booking created"
    );
    events::publish(&state, BookingEvent::for_booking(BookingEventKind::BookingCreated, &booking));

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Booking created successfully",
            "booking": booking,
        })),
    ))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let booking = {
        let conn = state.db()?;
        load_booking(&conn, id)?
    };
    require_party(&booking, &user)?;

    Ok(Json(serde_json::json!({ "booking": booking })))
}

// GET /bookings/student/:id and /bookings/tutor/:id
#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn list_for(
    state: &AppState,
    user: &AuthUser,
    role: BookingRole,
    user_id: i64,
    query: ListQuery,
) -> AppResult<Json<serde_json::Value>> {
    if user.id != user_id && !user.is_admin() {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.parse::<BookingStatus>()
                .map_err(|_| AppError::Validation(format!("Unknown booking status: {s}")))?,
        ),
        None => None,
    };
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(AppError::Validation("\"page\" must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::Validation(format!(
            "\"limit\" must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::Validation("\"page\" is too large".to_string()))?;

    let bookings = {
        let conn = state.db()?;
        queries::list_bookings(&conn, role, user_id, status, limit, offset)?
    };

    Ok(Json(serde_json::json!({
        "bookings": bookings,
        "page": page,
        "limit": limit,
    })))
}

pub async fn list_student_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(student_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    list_for(&state, &user, BookingRole::Student, student_id, query)
}

pub async fn list_tutor_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(tutor_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    list_for(&state, &user, BookingRole::Tutor, tutor_id, query)
}

// PUT /bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let booking = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let booking = load_booking(&tx, id)?;
        if booking.tutor_id != user.id {
            return Err(AppError::Forbidden(
                "Only the booking's tutor can confirm it".to_string(),
            ));
        }
        let next = next_booking_status(booking.status, BookingAction::Confirm)?;
        scheduling::check_conflicts(&tx, booking.tutor_id, &booking.start_time, &booking.end_time, Some(id))?;
        queries::set_booking_status(&tx, id, next, None, &Utc::now())?;
        let booking = load_booking(&tx, id)?;
        tx.commit()?;
        booking
    };

    tracing::info!(booking_id = id, "booking confirmed");
    events::publish(&state, BookingEvent::for_booking(BookingEventKind::BookingConfirmed, &booking));

    Ok(Json(serde_json::json!({
        "message": "Booking confirmed successfully",
        "booking": booking,
    })))
}

// PUT /bookings/:id/cancel
#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    body: Option<ApiJson<CancelRequest>>,
) -> AppResult<Json<serde_json::Value>> {
    let reason = body
        .and_then(|ApiJson(b)| b.reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if reason.as_ref().is_some_and(|r| r.chars().count() > MAX_NOTES_LEN) {
        return Err(AppError::Validation(format!(
            "\"reason\" length must be less than or equal to {MAX_NOTES_LEN} characters long"
        )));
    }

    let booking = {
        let conn = state.db()?;
        let booking = load_booking(&conn, id)?;
        if !booking.involves(user.id) {
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }
        let next = next_booking_status(booking.status, BookingAction::Cancel)?;
        queries::set_booking_status(&conn, id, next, reason.as_deref(), &Utc::now())?;
        load_booking(&conn, id)?
    };

    tracing::info!(booking_id = id, cancelled_by = user.id, "booking cancelled");
    events::publish(&state, BookingEvent::for_booking(BookingEventKind::BookingCancelled, &booking));

    Ok(Json(serde_json::json!({
        "message": "Booking cancelled successfully",
        "booking": booking,
    })))
}

// PUT /bookings/:id/reschedule
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub new_start_time: DateTime<Utc>,
    pub new_end_time: DateTime<Utc>,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<RescheduleRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let booking = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let booking = load_booking(&tx, id)?;
        if !booking.involves(user.id) {
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }
        next_booking_status(booking.status, BookingAction::Reschedule)?;
        scheduling::validate_booking_time(
            &tx,
            booking.tutor_id,
            &body.new_start_time,
            &body.new_end_time,
            Some(id),
        )?;
        let amount = total_amount(&body.new_start_time, &body.new_end_time, booking.hourly_rate);
        queries::reschedule_booking(
            &tx,
            id,
            &body.new_start_time,
            &body.new_end_time,
            amount,
            &Utc::now(),
        )?;
        let booking = load_booking(&tx, id)?;
        tx.commit()?;
        booking
    };

    tracing::info!(booking_id = id, rescheduled_by = user.id, "booking rescheduled");
    events::publish(&state, BookingEvent::for_booking(BookingEventKind::BookingRescheduled, &booking));

    Ok(Json(serde_json::json!({
        "message": "Booking rescheduled successfully",
        "booking": booking,
    })))
}

// GET /bookings/events — SSE stream
#[derive(Deserialize)]
pub struct EventsQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // EventSource cannot set headers, so the token travels in the query.
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;
    let user = auth::authenticate(token, &state.config.jwt_secret)?;
    let user_id = user.id;

    let live = BroadcastStream::new(state.events.subscribe()).filter_map(move |result| match result {
        Ok(event) if event.concerns(user_id) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("booking_event")))
        }
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(user_id, skipped, "booking event stream lagged");
            None
        }
    });

    let keepalive = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok(Event::default().comment("keepalive")));

    Ok(Sse::new(live.merge(keepalive)))
}
