use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use doctor_cell::services::{ActiveBookingLookup, DoctorLockGuard, DoctorLocks, DoctorRegistry};
use shared_utils::timezone::{parse_absolute_instant, CallerTimezone};

use crate::models::{
    Appointment, AppointmentError, AppointmentStats, AppointmentStatus, AppointmentView,
    CreateAppointmentRequest, DoctorSnapshot, SchedulingRules,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::AppointmentStore;

/// Commits bookings, reschedules and status changes. Every mutation holds the lock of the
/// appointment's doctor from the doctor lookup and conflict check until the write is stored.
/// Doctor removal takes the same lock through `ActiveBookingLookup::hold_bookings`.
pub struct SchedulingService {
    doctors: Arc<dyn DoctorRegistry>,
    store: Arc<dyn AppointmentStore>,
    conflicts: ConflictDetectionService,
    lifecycle: AppointmentLifecycleService,
    locks: DoctorLocks,
}

impl SchedulingService {
    pub fn new(
        doctors: Arc<dyn DoctorRegistry>,
        store: Arc<dyn AppointmentStore>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            doctors,
            store,
            conflicts: ConflictDetectionService::new(rules.conflict_window),
            lifecycle: AppointmentLifecycleService::new(),
            locks: DoctorLocks::new(),
        }
    }

    /// Book a new appointment
    #[instrument(skip(self, request))]
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let patient_name = required_text("patientName", request.patient_name)?;
        let patient_document_id = required_text("patientDNI", request.patient_document_id)?;
        let doctor_id = parse_doctor_id(required_text("doctorId", request.doctor_id)?)?;
        let instant = parse_instant(&required_text("appointmentInstant", request.appointment_instant)?)?;

        let _guard = self.locks.acquire(doctor_id).await;

        self.doctors
            .get_doctor(doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        let existing = self.store.list_for_doctor(doctor_id).await?;
        self.conflicts.check_conflicts(&existing, doctor_id, instant, None)?;

        let appointment = self.store
            .insert_appointment(Appointment {
                id: Uuid::new_v4(),
                patient_name,
                patient_document_id,
                doctor_id,
                appointment_instant: instant,
                status: AppointmentStatus::Scheduled,
            })
            .await?;

        info!("Appointment {} booked with doctor {} at {}", appointment.id, doctor_id, instant);
        Ok(appointment)
    }

    /// Move a scheduled appointment to a new instant, keeping its identity and status.
    #[instrument(skip(self))]
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_instant: &str,
    ) -> Result<Appointment, AppointmentError> {
        let instant = parse_instant(new_instant)?;
        let doctor_id = self.get_appointment(appointment_id).await?.doctor_id;

        let _guard = self.locks.acquire(doctor_id).await;
        let mut appointment = self.get_appointment(appointment_id).await?;
        self.lifecycle.can_reschedule(appointment.status)?;

        if appointment.appointment_instant == instant {
            debug!("Appointment {} already at {}", appointment_id, instant);
            return Ok(appointment);
        }

        let existing = self.store.list_for_doctor(doctor_id).await?;
        self.conflicts.check_conflicts(&existing, doctor_id, instant, Some(appointment_id))?;

        appointment.appointment_instant = instant;
        let appointment = self.store.update_appointment(appointment).await?;

        info!("Appointment {} rescheduled to {}", appointment_id, instant);
        Ok(appointment)
    }

    /// Apply a lifecycle transition. Asking for the current status is a no-op.
    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let doctor_id = self.get_appointment(appointment_id).await?.doctor_id;

        let _guard = self.locks.acquire(doctor_id).await;
        let mut appointment = self.get_appointment(appointment_id).await?;

        if appointment.status == new_status {
            debug!("Appointment {} already {}", appointment_id, new_status);
            return Ok(appointment);
        }

        self.lifecycle.validate_status_transition(appointment.status, new_status)?;

        appointment.status = new_status;
        let appointment = self.store.update_appointment(appointment).await?;

        info!("Appointment {} is now {}", appointment_id, new_status);
        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let doctor_id = self.get_appointment(appointment_id).await?.doctor_id;

        let _guard = self.locks.acquire(doctor_id).await;
        let appointment = self.get_appointment(appointment_id).await?;
        self.lifecycle.can_delete(appointment.status)?;

        if !self.store.delete_appointment(appointment_id).await? {
            return Err(AppointmentError::NotFound);
        }

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Newest first, each with the doctor it was booked with. When `timezone` is given the
    /// instant is also rendered on the caller's wall clock.
    pub async fn list_appointments(
        &self,
        search: Option<&str>,
        timezone: Option<CallerTimezone>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let doctors: HashMap<Uuid, DoctorSnapshot> = self.doctors
            .list_doctors()
            .await?
            .into_iter()
            .map(|d| (d.id, DoctorSnapshot { full_name: d.full_name, specialty: d.specialty }))
            .collect();

        let mut appointments = self.store.list_appointments().await?;
        appointments.retain(|a| search.map_or(true, |term| a.matches_search(term)));
        appointments.sort_by(|a, b| {
            b.appointment_instant
                .cmp(&a.appointment_instant)
                .then(a.id.cmp(&b.id))
        });

        Ok(appointments
            .into_iter()
            .map(|appointment| AppointmentView {
                doctor: doctors.get(&appointment.doctor_id).cloned(),
                local_instant: timezone.map(|tz| tz.render(appointment.appointment_instant)),
                appointment,
            })
            .collect())
    }

    pub async fn appointment_stats(&self) -> Result<AppointmentStats, AppointmentError> {
        let appointments = self.store.list_appointments().await?;

        let mut stats = AppointmentStats {
            total: appointments.len(),
            ..AppointmentStats::default()
        };
        for appointment in &appointments {
            match appointment.status {
                AppointmentStatus::Scheduled => stats.scheduled += 1,
                AppointmentStatus::Completed => stats.completed += 1,
                AppointmentStatus::Cancelled => stats.cancelled += 1,
            }
        }

        Ok(stats)
    }

    /// Whether the doctor still holds any `Scheduled` appointment.
    pub async fn has_scheduled_appointments(&self, doctor_id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.store
            .list_for_doctor(doctor_id)
            .await?
            .iter()
            .any(|a| a.status == AppointmentStatus::Scheduled))
    }
}

#[async_trait]
impl ActiveBookingLookup for SchedulingService {
    async fn hold_bookings(&self, doctor_id: Uuid) -> DoctorLockGuard {
        self.locks.acquire(doctor_id).await
    }

    async fn has_active_appointments(&self, doctor_id: Uuid) -> Result<bool, DoctorError> {
        self.has_scheduled_appointments(doctor_id)
            .await
            .map_err(DoctorError::from)
    }
}

fn required_text(field: &str, value: Option<String>) -> Result<String, AppointmentError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppointmentError::ValidationError(format!("{} is required", field)))
}

fn parse_doctor_id(raw: String) -> Result<Uuid, AppointmentError> {
    Uuid::parse_str(&raw)
        .map_err(|_| AppointmentError::ValidationError(format!("Invalid doctorId '{}'", raw)))
}

fn parse_instant(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, AppointmentError> {
    parse_absolute_instant(raw).map_err(AppointmentError::ValidationError)
}
