use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{DoctorError, DoctorRequest, DoctorSearchQuery};
use crate::services::doctor::DoctorService;

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::HasActiveAppointments => AppError::Conflict(
            "Doctor still has scheduled appointments; complete or cancel them first".to_string(),
        ),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(service): State<Arc<DoctorService>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = service.list_doctors(query.q.as_deref()).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(service): State<Arc<DoctorService>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = service.get_doctor(doctor_id).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(service): State<Arc<DoctorService>>,
    payload: Result<Json<DoctorRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let doctor = service.create_doctor(request).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor registered successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(service): State<Arc<DoctorService>>,
    Path(doctor_id): Path<Uuid>,
    payload: Result<Json<DoctorRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let doctor = service.update_doctor(doctor_id, request).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(service): State<Arc<DoctorService>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    service.delete_doctor(doctor_id).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor deleted successfully"
    })))
}
