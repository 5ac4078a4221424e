use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{Doctor, DoctorError, DoctorRequest, ShiftTime};
use crate::services::locks::DoctorLockGuard;
use crate::services::registry::DoctorRegistry;

const DEFAULT_SHIFT_START: &str = "08:00";
const DEFAULT_SHIFT_END: &str = "17:00";

/// Answers whether a doctor still has bookings that block removing the profile.
/// Implemented by the appointment cell over its store.
#[async_trait]
pub trait ActiveBookingLookup: Send + Sync {
    /// No booking for the doctor can be committed while the returned guard is alive.
    async fn hold_bookings(&self, doctor_id: Uuid) -> DoctorLockGuard;

    async fn has_active_appointments(&self, doctor_id: Uuid) -> Result<bool, DoctorError>;
}

pub struct DoctorService {
    registry: Arc<dyn DoctorRegistry>,
    booking_lookup: Option<Arc<dyn ActiveBookingLookup>>,
}

impl DoctorService {
    pub fn new(registry: Arc<dyn DoctorRegistry>) -> Self {
        Self {
            registry,
            booking_lookup: None,
        }
    }

    pub fn with_booking_lookup(mut self, lookup: Arc<dyn ActiveBookingLookup>) -> Self {
        self.booking_lookup = Some(lookup);
        self
    }

    /// List doctors, optionally filtered by a name/specialty search term
    pub async fn list_doctors(&self, search: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        let doctors = self.registry.list_doctors().await?;
        Ok(match search {
            Some(term) => doctors.into_iter().filter(|d| d.matches_search(term)).collect(),
            None => doctors,
        })
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);
        self.registry
            .get_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    /// Create a new doctor profile
    #[instrument(skip(self, request))]
    pub async fn create_doctor(&self, request: DoctorRequest) -> Result<Doctor, DoctorError> {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: required_text("fullName", request.full_name)?,
            specialty: required_text("specialty", request.specialty)?,
            license_id: required_text("licenseId", request.license_id)?,
            email: validate_email(required_text("email", request.email)?)?,
            is_available: request.is_available.unwrap_or(true),
            shift_start: parse_shift(request.shift_start.as_deref().unwrap_or(DEFAULT_SHIFT_START))?,
            shift_end: parse_shift(request.shift_end.as_deref().unwrap_or(DEFAULT_SHIFT_END))?,
        };

        let doctor = self.registry.insert_doctor(doctor).await?;
        info!("Doctor profile created successfully with ID: {}", doctor.id);
        Ok(doctor)
    }

    /// Update a doctor profile. Fields absent from the request keep their stored value.
    #[instrument(skip(self, request))]
    pub async fn update_doctor(&self, doctor_id: Uuid, request: DoctorRequest) -> Result<Doctor, DoctorError> {
        let mut doctor = self.get_doctor(doctor_id).await?;

        if let Some(name) = request.full_name {
            doctor.full_name = required_text("fullName", Some(name))?;
        }
        if let Some(specialty) = request.specialty {
            doctor.specialty = required_text("specialty", Some(specialty))?;
        }
        if let Some(license_id) = request.license_id {
            doctor.license_id = required_text("licenseId", Some(license_id))?;
        }
        if let Some(email) = request.email {
            doctor.email = validate_email(required_text("email", Some(email))?)?;
        }
        if let Some(available) = request.is_available {
            doctor.is_available = available;
        }
        if let Some(start) = request.shift_start {
            doctor.shift_start = parse_shift(&start)?;
        }
        if let Some(end) = request.shift_end {
            doctor.shift_end = parse_shift(&end)?;
        }

        let doctor = self.registry.update_doctor(doctor).await?;
        info!("Doctor profile {} updated", doctor.id);
        Ok(doctor)
    }

    /// Remove a doctor. Refused while the doctor still has scheduled appointments.
    #[instrument(skip(self))]
    pub async fn delete_doctor(&self, doctor_id: Uuid) -> Result<(), DoctorError> {
        let _hold = match &self.booking_lookup {
            Some(lookup) => Some(lookup.hold_bookings(doctor_id).await),
            None => None,
        };

        self.get_doctor(doctor_id).await?;

        if let Some(lookup) = &self.booking_lookup {
            if lookup.has_active_appointments(doctor_id).await? {
                warn!("Refusing to delete doctor {} with scheduled appointments", doctor_id);
                return Err(DoctorError::HasActiveAppointments);
            }
        }

        if !self.registry.delete_doctor(doctor_id).await? {
            return Err(DoctorError::NotFound);
        }

        info!("Doctor {} deleted", doctor_id);
        Ok(())
    }
}

fn required_text(field: &str, value: Option<String>) -> Result<String, DoctorError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DoctorError::ValidationError(format!("{} is required", field)))
}

fn validate_email(email: String) -> Result<String, DoctorError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(DoctorError::ValidationError(format!("Invalid email: {}", email))),
    }
}

fn parse_shift(raw: &str) -> Result<ShiftTime, DoctorError> {
    raw.parse()
}
