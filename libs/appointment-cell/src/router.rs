use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::handlers;
use crate::services::{AvailabilityService, SchedulingService};

pub fn appointment_routes(service: Arc<SchedulingService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::book_appointment))
        .route("/stats", get(handlers::get_appointment_stats))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::reschedule_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .with_state(service)
}

/// Status routes live under `/doctors` and are merged into the doctor router by the binary.
pub fn doctor_status_routes(service: Arc<AvailabilityService>) -> Router {
    Router::new()
        .route("/status", get(handlers::list_doctor_statuses))
        .route("/{doctor_id}/status", get(handlers::get_doctor_status))
        .with_state(service)
}
