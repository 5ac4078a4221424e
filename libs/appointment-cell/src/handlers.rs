use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::timezone::{parse_absolute_instant, CallerTimezone};

use crate::models::{
    AppointmentError, AppointmentQuery, AppointmentStatus, CreateAppointmentRequest, StatusQuery,
};
use crate::services::{AvailabilityService, SchedulingService};

pub(crate) fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        e @ AppointmentError::ConflictDetected { .. } => AppError::Conflict(e.to_string()),
        e @ (AppointmentError::InvalidStatusTransition { .. }
        | AppointmentError::NotReschedulable(_)
        | AppointmentError::NotDeletable(_)) => AppError::InvalidState(e.to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn parse_at(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    raw.map(parse_absolute_instant)
        .transpose()
        .map_err(AppError::ValidationError)
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(service): State<Arc<SchedulingService>>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let timezone = query.tz.as_deref()
        .map(CallerTimezone::parse)
        .transpose()
        .map_err(AppError::ValidationError)?;

    let appointments = service.list_appointments(query.q.as_deref(), timezone).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(service): State<Arc<SchedulingService>>,
) -> Result<Json<Value>, AppError> {
    let stats = service.appointment_stats().await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(service): State<Arc<SchedulingService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = service.get_appointment(appointment_id).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(service): State<Arc<SchedulingService>>,
    payload: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let appointment = service.create_appointment(request).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

/// Body is the new instant as a bare JSON string.
#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(service): State<Arc<SchedulingService>>,
    Path(appointment_id): Path<Uuid>,
    payload: Result<Json<String>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(new_instant) = payload?;
    let appointment = service.reschedule_appointment(appointment_id, &new_instant).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

/// Body is the target status as a bare JSON string.
#[axum::debug_handler]
pub async fn update_appointment_status(
    State(service): State<Arc<SchedulingService>>,
    Path(appointment_id): Path<Uuid>,
    payload: Result<Json<String>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(new_status) = payload?;
    let new_status: AppointmentStatus = new_status.parse()
        .map_err(map_appointment_error)?;

    let appointment = service.transition_status(appointment_id, new_status).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": format!("Appointment marked as {}", new_status)
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(service): State<Arc<SchedulingService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    service.delete_appointment(appointment_id).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}

// ==============================================================================
// DOCTOR STATUS HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctor_statuses(
    State(service): State<Arc<AvailabilityService>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, AppError> {
    let at = parse_at(query.at.as_deref())?;
    let statuses = service.doctor_statuses(query.q.as_deref(), at).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "doctors": statuses,
        "total": statuses.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_status(
    State(service): State<Arc<AvailabilityService>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, AppError> {
    let at = parse_at(query.at.as_deref())?;
    let status = service.doctor_status(doctor_id, at).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(status)))
}
