use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::store::AppointmentStore;

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";

/// Row shape of the `appointments` table.
#[derive(Debug, Deserialize)]
struct AppointmentRow {
    id: Uuid,
    patient_name: String,
    patient_document_id: String,
    doctor_id: Uuid,
    appointment_instant: DateTime<Utc>,
    status: AppointmentStatus,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Appointment {
            id: row.id,
            patient_name: row.patient_name,
            patient_document_id: row.patient_document_id,
            doctor_id: row.doctor_id,
            appointment_instant: row.appointment_instant,
            status: row.status,
        }
    }
}

fn to_row(appointment: &Appointment) -> Value {
    json!({
        "id": appointment.id,
        "patient_name": appointment.patient_name,
        "patient_document_id": appointment.patient_document_id,
        "doctor_id": appointment.doctor_id,
        "appointment_instant": appointment.appointment_instant.to_rfc3339(),
        "status": appointment.status.as_str(),
    })
}

fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<AppointmentRow>(row)
                .map(Appointment::from)
                .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
        })
        .collect()
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self.supabase
            .request_with_headers(method, path, body, Some(SupabaseClient::representation_headers()))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        parse_rows(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn list_appointments(&self) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Fetching all appointments");
        let path = format!("{}?order=appointment_instant.desc", APPOINTMENTS_PATH);
        self.fetch(Method::GET, &path, None).await
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Fetching appointments for doctor {}", doctor_id);
        let path = format!("{}?doctor_id=eq.{}", APPOINTMENTS_PATH, doctor_id);
        self.fetch(Method::GET, &path, None).await
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);
        Ok(self.fetch(Method::GET, &path, None).await?.into_iter().next())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        self.fetch(Method::POST, APPOINTMENTS_PATH, Some(to_row(&appointment)))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))
    }

    async fn update_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment.id);
        let patch = json!({
            "appointment_instant": appointment.appointment_instant.to_rfc3339(),
            "status": appointment.status.as_str(),
        });
        self.fetch(Method::PATCH, &path, Some(patch))
            .await?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> Result<bool, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);
        Ok(!self.fetch(Method::DELETE, &path, None).await?.is_empty())
    }
}
