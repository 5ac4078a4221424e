use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Doctor, DoctorError};

/// Storage seam for doctor profiles.
#[async_trait]
pub trait DoctorRegistry: Send + Sync {
    /// All doctors, ordered by full name.
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DoctorError>;

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError>;

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError>;

    /// Replace a stored doctor. Fails with `NotFound` if it does not exist.
    async fn update_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError>;

    /// Returns whether a doctor was removed.
    async fn delete_doctor(&self, doctor_id: Uuid) -> Result<bool, DoctorError>;
}

#[derive(Default)]
pub struct InMemoryDoctorRegistry {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        Self {
            doctors: RwLock::new(doctors.into_iter().map(|d| (d.id, d)).collect()),
        }
    }
}

#[async_trait]
impl DoctorRegistry for InMemoryDoctorRegistry {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DoctorError> {
        let mut doctors: Vec<Doctor> = self.doctors.read().await.values().cloned().collect();
        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(doctors)
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        self.doctors.write().await.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn update_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        let mut doctors = self.doctors.write().await;
        match doctors.get_mut(&doctor.id) {
            Some(existing) => {
                *existing = doctor.clone();
                Ok(doctor)
            }
            None => Err(DoctorError::NotFound),
        }
    }

    async fn delete_doctor(&self, doctor_id: Uuid) -> Result<bool, DoctorError> {
        Ok(self.doctors.write().await.remove(&doctor_id).is_some())
    }
}
