use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::db;
use crate::errors::AppError;
use crate::services::working_hours::{self, SetWorkingHours};
use crate::state::AppState;

// PUT /api/orgs/:org_id/working-hours
pub async fn set_working_hours(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    Json(req): Json<SetWorkingHours>,
) -> Result<Json<serde_json::Value>, AppError> {
    let conn = db::lock(&state.db);
    let updated = working_hours::set_working_hours(&conn, &org_id, &req)?;
    Ok(Json(serde_json::json!({
        "org_id": org_id,
        "effective_from": req.effective_from,
        "effective_to": req.effective_to,
        "updated_days": updated,
    })))
}
