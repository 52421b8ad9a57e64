use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::{AppError, ValidationError};
use crate::models::{Category, Estimate, OptionsPayload};
use crate::services::estimator::{estimate_duration, EstimateRequest};
use crate::state::AppState;

// POST /api/estimate
#[derive(Deserialize)]
pub struct EstimateBody {
    pub service_id: String,
    /// Must match the service when given.
    #[serde(default)]
    pub category: Option<Category>,
    pub options: OptionsPayload,
    /// Groups requests from one form; only the newest one is kept.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct EstimateResponse {
    #[serde(flatten)]
    estimate: Estimate,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl EstimateResponse {
    fn new(estimate: Estimate, session_id: Option<String>) -> Self {
        Self {
            degraded: estimate.is_degraded(),
            estimate,
            session_id,
        }
    }
}

pub async fn estimate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EstimateBody>,
) -> Result<Json<EstimateResponse>, AppError> {
    let service = {
        let conn = db::lock(&state.db);
        queries::get_service(&conn, &body.service_id)?
            .ok_or_else(|| AppError::NotFound(format!("service {}", body.service_id)))?
    };
    if let Some(category) = body.category {
        if category != service.category {
            return Err(ValidationError::new(
                "category",
                format!("service {} is {}, not {category}", service.id, service.category),
            )
            .into());
        }
    }

    let ticket = body
        .session_id
        .as_deref()
        .map(|session| state.sessions.begin(session));

    let estimate = estimate_duration(
        &state.rules,
        state.history.as_ref(),
        &state.config.estimator,
        EstimateRequest {
            service_id: &service.id,
            category: service.category,
            options: &body.options,
            default_minutes: service.default_minutes,
        },
    )
    .await?;

    if let (Some(session), Some(ticket)) = (body.session_id.as_deref(), ticket) {
        if !state.sessions.complete(session, ticket, &estimate) {
            tracing::debug!(session, ticket, "discarding superseded estimate");
            return Err(AppError::Superseded);
        }
    }

    Ok(Json(EstimateResponse::new(estimate, body.session_id)))
}

// GET /api/estimate/:session_id
pub async fn latest_estimate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<EstimateResponse>, AppError> {
    let estimate = state
        .sessions
        .latest(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("estimate session {session_id}")))?;
    Ok(Json(EstimateResponse::new(estimate, Some(session_id))))
}

// DELETE /api/estimate/:session_id
pub async fn forget_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> StatusCode {
    state.sessions.forget(&session_id);
    StatusCode::NO_CONTENT
}
