use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::handlers::availability::{date_or_today, org_timezone, DayQuery};
use crate::models::{Booking, BookingStatus, VisitMode};
use crate::services::arrival::{recommend_arrival, ArrivalWindow};
use crate::services::clock::day_range_utc;
use crate::services::lifecycle;
use crate::services::reservation::{
    reschedule_booking, reserve_slot, ClaimSettings, RescheduleRequest, ReservationRequest,
};
use crate::state::AppState;

fn load_booking(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let conn = db::lock(&state.db);
    queries::get_booking_by_id(&conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

// POST /api/orgs/:org_id/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    Json(req): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let claims = ClaimSettings {
        locks: &state.claim_locks,
        timeout: state.claim_timeout(),
        now: Utc::now(),
    };
    let booking = reserve_slot(&state.db, &claims, &org_id, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/orgs/:org_id/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let conn = db::lock(&state.db);
    let tz = org_timezone(&conn, &org_id)?;
    let range = day_range_utc(tz, date_or_today(query.date, tz));
    let bookings = queries::get_bookings_in_range(&conn, &org_id, &range, false)?;
    Ok(Json(bookings))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(load_booking(&state, &id)?))
}

// PATCH /api/bookings/:id
pub async fn reschedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(changes): Json<RescheduleRequest>,
) -> Result<Json<Booking>, AppError> {
    let claims = ClaimSettings {
        locks: &state.claim_locks,
        timeout: state.claim_timeout(),
        now: Utc::now(),
    };
    let booking = reschedule_booking(&state.db, &claims, &id, changes).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/transition
#[derive(Deserialize)]
pub struct TransitionBody {
    pub status: BookingStatus,
}

pub async fn transition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<Booking>, AppError> {
    let conn = db::lock(&state.db);
    let booking = lifecycle::transition_booking(&conn, &id, body.status, Utc::now())?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize, Default)]
pub struct CancelBody {
    pub reason: Option<String>,
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> Result<Json<Booking>, AppError> {
    let Json(body) = body.unwrap_or_default();
    let conn = db::lock(&state.db);
    let booking = lifecycle::cancel_booking(&conn, &id, body.reason.as_deref(), Utc::now())?;
    Ok(Json(booking))
}

// GET /api/bookings/:id/arrival
#[derive(Deserialize)]
pub struct ArrivalQuery {
    pub mode: Option<VisitMode>,
}

#[derive(Serialize)]
pub struct ArrivalResponse {
    booking_id: String,
    status: BookingStatus,
    window: Option<ArrivalWindow>,
}

pub async fn arrival(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ArrivalQuery>,
) -> Result<Json<ArrivalResponse>, AppError> {
    let booking = load_booking(&state, &id)?;
    let window = recommend_arrival(&booking, query.mode, &state.config.arrival);
    Ok(Json(ArrivalResponse {
        booking_id: booking.id,
        status: booking.status,
        window,
    }))
}

// POST /api/bookings/:id/duration
#[derive(Deserialize)]
pub struct DurationBody {
    pub minutes: u32,
}

pub async fn record_duration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<DurationBody>,
) -> Result<StatusCode, AppError> {
    let conn = db::lock(&state.db);
    lifecycle::record_actual_duration(&conn, &id, body.minutes)?;
    Ok(StatusCode::NO_CONTENT)
}
