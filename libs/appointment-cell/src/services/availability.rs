use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::services::DoctorRegistry;

use crate::models::{
    Appointment, AppointmentError, DoctorStatus, DoctorStatusView, SchedulingRules,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::store::AppointmentStore;

/// Derives a doctor's real-time status from the shift, the on/off switch and the bookings.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityEngine {
    rules: SchedulingRules,
    conflicts: ConflictDetectionService,
}

impl AvailabilityEngine {
    pub fn new(rules: SchedulingRules) -> Self {
        Self {
            rules,
            conflicts: ConflictDetectionService::new(rules.conflict_window),
        }
    }

    /// Minute of day of `now` on the clinic wall clock.
    pub fn clinic_minute_of_day(&self, now: DateTime<Utc>) -> u16 {
        let local = now.with_timezone(&self.rules.clinic_offset);
        (local.hour() * 60 + local.minute()) as u16
    }

    /// Pure: the result depends only on the arguments and the configured rules.
    pub fn compute_status(
        &self,
        doctor: &Doctor,
        appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> DoctorStatus {
        if !doctor.is_available {
            return DoctorStatus::Inactive;
        }

        if !doctor.shift_window().contains(self.clinic_minute_of_day(now)) {
            return DoctorStatus::OffShift;
        }

        if self.conflicts.find_conflict(appointments, doctor.id, now, None).is_some() {
            DoctorStatus::Busy
        } else {
            DoctorStatus::Available
        }
    }
}

/// Loads a snapshot from the registry and the store and runs the engine over it.
pub struct AvailabilityService {
    doctors: Arc<dyn DoctorRegistry>,
    store: Arc<dyn AppointmentStore>,
    engine: AvailabilityEngine,
}

impl AvailabilityService {
    pub fn new(
        doctors: Arc<dyn DoctorRegistry>,
        store: Arc<dyn AppointmentStore>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            doctors,
            store,
            engine: AvailabilityEngine::new(rules),
        }
    }

    pub async fn doctor_status(
        &self,
        doctor_id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> Result<DoctorStatusView, AppointmentError> {
        let now = at.unwrap_or_else(Utc::now);
        let doctor = self.doctors
            .get_doctor(doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;
        let appointments = self.store.list_for_doctor(doctor_id).await?;

        Ok(self.view(doctor, &appointments, now))
    }

    /// Status of every doctor, optionally narrowed by a name/specialty search term.
    pub async fn doctor_statuses(
        &self,
        search: Option<&str>,
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<DoctorStatusView>, AppointmentError> {
        let now = at.unwrap_or_else(Utc::now);
        let doctors = self.doctors.list_doctors().await?;
        let appointments = self.store.list_appointments().await?;
        debug!("Computing status of {} doctors at {}", doctors.len(), now);

        Ok(doctors
            .into_iter()
            .filter(|doctor| search.map_or(true, |term| doctor.matches_search(term)))
            .map(|doctor| self.view(doctor, &appointments, now))
            .collect())
    }

    fn view(&self, doctor: Doctor, appointments: &[Appointment], now: DateTime<Utc>) -> DoctorStatusView {
        DoctorStatusView {
            status: self.engine.compute_status(&doctor, appointments, now),
            doctor_id: doctor.id,
            full_name: doctor.full_name,
            specialty: doctor.specialty,
            evaluated_at: now,
        }
    }
}
