use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::models::NewAvailabilitySlot;
use crate::state::AppState;

// GET /bookings/availability/:tutor_id
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(tutor_id): Path<i64>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let availability = {
        let db = state.db()?;
        queries::get_availability(&db, tutor_id, query.start_date, query.end_date)?
    };

    Ok(Json(serde_json::json!({ "availability": availability })))
}

// POST /bookings/availability
pub async fn create_availability(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<NewAvailabilitySlot>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    insert_slot(&state, &user, body)
}

// POST /bookings/availability/:tutor_id
pub async fn create_availability_for_tutor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(tutor_id): Path<i64>,
    ApiJson(body): ApiJson<NewAvailabilitySlot>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if user.is_tutor() && tutor_id != user.id {
        return Err(AppError::Forbidden(
            "Tutors can only set their own availability".to_string(),
        ));
    }
    insert_slot(&state, &user, body)
}

fn insert_slot(
    state: &AppState,
    user: &AuthUser,
    body: NewAvailabilitySlot,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if !user.is_tutor() {
        return Err(AppError::Forbidden(
            "Only tutors can set availability".to_string(),
        ));
    }
    let slot = body.normalized().map_err(AppError::Validation)?;

    let availability = {
        let db = state.db()?;
        if queries::get_user(&db, user.id)?.is_none() {
            return Err(AppError::NotFound("Tutor not found".to_string()));
        }
        queries::insert_availability_slot(&db, user.id, &slot, &Utc::now())?
    };
    tracing::info!(tutor_id = user.id, slot_id = availability.id, "availability slot added");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Availability updated successfully",
            "availability": availability,
        })),
    ))
}

// DELETE /bookings/availability/slot/:id (owner or admin)
pub async fn delete_availability(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let db = state.db()?;
    let slot = queries::get_availability_slot(&db, id)?
        .ok_or_else(|| AppError::NotFound("Availability slot not found".to_string()))?;
    if slot.tutor_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }
    queries::delete_availability_slot(&db, id)?;

    Ok(Json(serde_json::json!({ "message": "Availability removed successfully" })))
}
