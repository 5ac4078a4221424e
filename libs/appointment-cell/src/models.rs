use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use shared_config::{AppConfig, DEFAULT_CONFLICT_WINDOW_MINUTES};
use shared_utils::timezone::parse_utc_offset;

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_name: String,
    #[serde(rename = "patientDNI")]
    pub patient_document_id: String,
    pub doctor_id: Uuid,
    pub appointment_instant: DateTime<Utc>,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Cancelled appointments no longer hold their slot.
    pub fn blocks_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.patient_name.to_lowercase().contains(&term)
            || self.patient_document_id.to_lowercase().contains(&term)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum AppointmentStatus {
    #[serde(alias = "scheduled")]
    Scheduled,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "cancelled")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            _ => Err(AppointmentError::ValidationError(format!(
                "Unknown appointment status '{}': expected Scheduled, Completed or Cancelled",
                raw
            ))),
        }
    }
}

/// Real-time state of a doctor as seen by the front desk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum DoctorStatus {
    /// Switched off by staff, regardless of shift or bookings.
    Inactive,
    OffShift,
    /// In shift with a booking inside the conflict window.
    Busy,
    Available,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Body of `POST /appointments`. Everything is optional here so that missing or blank fields
/// surface as validation errors instead of body rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub patient_name: Option<String>,
    #[serde(rename = "patientDNI")]
    pub patient_document_id: Option<String>,
    pub doctor_id: Option<String>,
    #[serde(alias = "appointmentDate")]
    pub appointment_instant: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    pub q: Option<String>,
    /// Caller's UTC offset, e.g. `-05:00`. Adds `localInstant` to every listed appointment.
    pub tz: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQuery {
    pub q: Option<String>,
    /// Evaluate at this instant instead of now.
    pub at: Option<String>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSnapshot {
    pub full_name: String,
    pub specialty: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    /// `None` once the doctor has been removed from the registry.
    pub doctor: Option<DoctorSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_instant: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppointmentStats {
    pub total: usize,
    pub scheduled: usize,
    pub completed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStatusView {
    pub doctor_id: Uuid,
    pub full_name: String,
    pub specialty: String,
    pub status: DoctorStatus,
    pub evaluated_at: DateTime<Utc>,
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingRules {
    /// Two bookings for a doctor collide when they are strictly closer than this.
    pub conflict_window: Duration,
    /// Offset of the clinic wall clock that doctor shifts are expressed in.
    pub clinic_offset: FixedOffset,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            conflict_window: Duration::minutes(DEFAULT_CONFLICT_WINDOW_MINUTES),
            clinic_offset: Utc.fix(),
        }
    }
}

impl SchedulingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();

        let conflict_window = match Some(config.conflict_window_minutes)
            .filter(|minutes| *minutes > 0)
            .and_then(Duration::try_minutes)
        {
            Some(window) => window,
            None => {
                warn!(
                    "Conflict window of {} minutes is out of range, using {}",
                    config.conflict_window_minutes, DEFAULT_CONFLICT_WINDOW_MINUTES
                );
                defaults.conflict_window
            }
        };

        let clinic_offset = parse_utc_offset(&config.clinic_utc_offset).unwrap_or_else(|e| {
            warn!("{}, using UTC for the clinic clock", e);
            defaults.clinic_offset
        });

        Self { conflict_window, clinic_offset }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Doctor {doctor_id} already has an appointment at {existing_instant}, within {window_minutes} minutes of the requested time")]
    ConflictDetected {
        doctor_id: Uuid,
        existing_instant: DateTime<Utc>,
        window_minutes: i64,
    },

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Only scheduled appointments can be rescheduled (current status: {0})")]
    NotReschedulable(AppointmentStatus),

    #[error("Only completed or cancelled appointments can be deleted (current status: {0})")]
    NotDeletable(AppointmentStatus),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DoctorError> for AppointmentError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for DoctorError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::ValidationError(msg) => DoctorError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => DoctorError::DatabaseError(msg),
            other => DoctorError::DatabaseError(other.to_string()),
        }
    }
}
