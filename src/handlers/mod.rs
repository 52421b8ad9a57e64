pub mod availability;
pub mod bookings;
pub mod calendar;
pub mod estimate;
pub mod health;
pub mod settings;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/orgs/:org_id/working-day",
            get(availability::get_working_day),
        )
        .route(
            "/api/orgs/:org_id/working-hours",
            put(settings::set_working_hours),
        )
        .route("/api/orgs/:org_id/slots", get(availability::get_slots))
        .route(
            "/api/orgs/:org_id/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/estimate", post(estimate::estimate))
        .route(
            "/api/estimate/:session_id",
            get(estimate::latest_estimate).delete(estimate::forget_session),
        )
        .route(
            "/api/bookings/:id",
            get(bookings::get_booking).patch(bookings::reschedule),
        )
        .route("/api/bookings/:id/transition", post(bookings::transition))
        .route("/api/bookings/:id/cancel", post(bookings::cancel))
        .route("/api/bookings/:id/arrival", get(bookings::arrival))
        .route("/api/bookings/:id/duration", post(bookings::record_duration))
        .route("/calendar/:booking_id", get(calendar::download_ics))
        .with_state(state)
}
