use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError};
use crate::services::registry::DoctorRegistry;

const DOCTORS_PATH: &str = "/rest/v1/doctors";

/// Row shape of the `doctors` table.
#[derive(Debug, Deserialize)]
struct DoctorRow {
    id: Uuid,
    full_name: String,
    specialty: String,
    license_id: String,
    email: String,
    is_available: bool,
    shift_start: String,
    shift_end: String,
}

impl TryFrom<DoctorRow> for Doctor {
    type Error = DoctorError;

    fn try_from(row: DoctorRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let bad_shift = |e: DoctorError| {
            DoctorError::DatabaseError(format!("Doctor {} has an invalid shift: {}", id, e))
        };

        Ok(Doctor {
            id,
            shift_start: row.shift_start.parse().map_err(bad_shift)?,
            shift_end: row.shift_end.parse().map_err(bad_shift)?,
            full_name: row.full_name,
            specialty: row.specialty,
            license_id: row.license_id,
            email: row.email,
            is_available: row.is_available,
        })
    }
}

fn to_row(doctor: &Doctor) -> Value {
    json!({
        "id": doctor.id,
        "full_name": doctor.full_name,
        "specialty": doctor.specialty,
        "license_id": doctor.license_id,
        "email": doctor.email,
        "is_available": doctor.is_available,
        "shift_start": doctor.shift_start.to_string(),
        "shift_end": doctor.shift_end.to_string(),
    })
}

fn parse_rows(rows: Vec<Value>) -> Result<Vec<Doctor>, DoctorError> {
    rows.into_iter()
        .map(|row| {
            let row: DoctorRow = serde_json::from_value(row)
                .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;
            Doctor::try_from(row)
        })
        .collect()
}

pub struct SupabaseDoctorRegistry {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorRegistry {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Doctor>, DoctorError> {
        let rows: Vec<Value> = self.supabase
            .request_with_headers(method, path, body, Some(SupabaseClient::representation_headers()))
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        parse_rows(rows)
    }
}

#[async_trait]
impl DoctorRegistry for SupabaseDoctorRegistry {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Fetching all doctors");
        let path = format!("{}?order=full_name.asc", DOCTORS_PATH);
        self.fetch(Method::GET, &path, None).await
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);
        let path = format!("{}?id=eq.{}", DOCTORS_PATH, doctor_id);
        Ok(self.fetch(Method::GET, &path, None).await?.into_iter().next())
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        self.fetch(Method::POST, DOCTORS_PATH, Some(to_row(&doctor)))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Failed to create doctor profile".to_string()))
    }

    async fn update_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        let path = format!("{}?id=eq.{}", DOCTORS_PATH, doctor.id);
        self.fetch(Method::PATCH, &path, Some(to_row(&doctor)))
            .await?
            .into_iter()
            .next()
            .ok_or(DoctorError::NotFound)
    }

    async fn delete_doctor(&self, doctor_id: Uuid) -> Result<bool, DoctorError> {
        let path = format!("{}?id=eq.{}", DOCTORS_PATH, doctor_id);
        Ok(!self.fetch(Method::DELETE, &path, None).await?.is_empty())
    }
}
