use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::{AppError, ValidationError};
use crate::models::{Buffers, Slot, TimeRange, WorkingDay};
use crate::services::availability::compute_free_slots;
use crate::services::clock::{day_range_utc, parse_timezone, SlotClock};
use crate::services::working_hours::resolve_working_day;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DayQuery {
    pub date: Option<NaiveDate>,
}

pub(crate) fn org_timezone(conn: &Connection, org_id: &str) -> Result<Tz, AppError> {
    let name = queries::get_org_timezone(conn, org_id)?
        .ok_or_else(|| AppError::NotFound(format!("organization {org_id}")))?;
    Ok(parse_timezone(&name)?)
}

fn service_buffers(conn: &Connection, org_id: &str, service_id: &str) -> Result<Buffers, AppError> {
    let service = queries::get_service(conn, service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;
    if service.org_id != org_id {
        return Err(ValidationError::new("service_id", "service belongs to another organization").into());
    }
    Ok(service.buffers())
}

/// Requested date, or today in the organization's timezone.
pub(crate) fn date_or_today(date: Option<NaiveDate>, tz: Tz) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive())
}

// GET /api/orgs/:org_id/working-day
#[derive(Serialize)]
pub struct WorkingDayResponse {
    date: NaiveDate,
    closed: bool,
    #[serde(flatten)]
    hours: WorkingDay,
}

pub async fn get_working_day(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    Query(query): Query<DayQuery>,
) -> Result<Json<WorkingDayResponse>, AppError> {
    let conn = db::lock(&state.db);
    let tz = org_timezone(&conn, &org_id)?;
    let date = date_or_today(query.date, tz);
    let day = resolve_working_day(&conn, &org_id, date)?;

    Ok(Json(WorkingDayResponse {
        date,
        closed: day.is_none(),
        hours: day.unwrap_or_else(WorkingDay::closed),
    }))
}

// GET /api/orgs/:org_id/slots
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: Option<NaiveDate>,
    pub granularity: Option<u32>,
    /// Keeps the service's buffers clear of other bookings.
    pub service_id: Option<String>,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    date: NaiveDate,
    timezone: String,
    granularity: u32,
    slots: Vec<Slot>,
}

pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let granularity = query.granularity.unwrap_or(state.config.slot_granularity_min);

    let (tz, date, day, bookings, buffers) = {
        let conn = db::lock(&state.db);
        let tz = org_timezone(&conn, &org_id)?;
        let buffers = match query.service_id.as_deref() {
            Some(service_id) => service_buffers(&conn, &org_id, service_id)?,
            None => Buffers::NONE,
        };
        let date = date_or_today(query.date, tz);
        let day = resolve_working_day(&conn, &org_id, date)?;
        let range: TimeRange<_> = day_range_utc(tz, date);
        let bookings = queries::get_bookings_in_range(&conn, &org_id, &range, true)?;
        (tz, date, day, bookings, buffers)
    };

    let clock = SlotClock::new(tz, Utc::now());
    let slots = compute_free_slots(date, day.as_ref(), &bookings, granularity, buffers, &clock)?;

    tracing::debug!(org_id = %org_id, %date, slots = slots.len(), "computed free slots");

    Ok(Json(SlotsResponse {
        date,
        timezone: tz.name().to_string(),
        granularity,
        slots,
    }))
}
