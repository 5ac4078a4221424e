use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};

/// Storage seam for appointment records.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn list_appointments(&self) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Replace a stored appointment. Fails with `NotFound` if it does not exist.
    async fn update_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Returns whether an appointment was removed.
    async fn delete_appointment(&self, appointment_id: Uuid) -> Result<bool, AppointmentError>;
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_appointments(appointments: impl IntoIterator<Item = Appointment>) -> Self {
        Self {
            appointments: RwLock::new(appointments.into_iter().map(|a| (a.id, a)).collect()),
        }
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn list_appointments(&self) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.values().cloned().collect())
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        self.appointments.write().await.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(appointment)
            }
            None => Err(AppointmentError::NotFound),
        }
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.appointments.write().await.remove(&appointment_id).is_some())
    }
}
