use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};

/// Finds bookings for a doctor that sit inside the conflict window of an instant.
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetectionService {
    window: Duration,
}

impl ConflictDetectionService {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Symmetric and strict: instants exactly one window apart do not collide.
    pub fn within_window(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        a - b < self.window && b - a < self.window
    }

    /// First slot-holding appointment of `doctor_id` colliding with `instant`.
    /// `exclude_appointment_id` lets a reschedule ignore the appointment being moved.
    pub fn find_conflict<'a>(
        &self,
        appointments: &'a [Appointment],
        doctor_id: Uuid,
        instant: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Option<&'a Appointment> {
        appointments.iter().find(|appointment| {
            appointment.doctor_id == doctor_id
                && Some(appointment.id) != exclude_appointment_id
                && appointment.blocks_slot()
                && self.within_window(appointment.appointment_instant, instant)
        })
    }

    /// Fail with `ConflictDetected` when `instant` collides with an existing booking.
    pub fn check_conflicts(
        &self,
        appointments: &[Appointment],
        doctor_id: Uuid,
        instant: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        debug!("Checking conflicts for doctor {} at {}", doctor_id, instant);

        match self.find_conflict(appointments, doctor_id, instant, exclude_appointment_id) {
            Some(existing) => {
                warn!(
                    "Conflict detected for doctor {}: appointment {} at {}",
                    doctor_id, existing.id, existing.appointment_instant
                );
                Err(AppointmentError::ConflictDetected {
                    doctor_id,
                    existing_instant: existing.appointment_instant,
                    window_minutes: self.window.num_minutes(),
                })
            }
            None => Ok(()),
        }
    }
}
