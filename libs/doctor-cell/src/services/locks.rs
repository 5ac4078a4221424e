use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

type LockTable = Arc<StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>>;

/// One async mutex per doctor. Holding a doctor's guard serializes every check-then-write
/// on that doctor's bookings and profile within this process.
///
/// Entries only live while someone holds or waits for them.
#[derive(Default)]
pub struct DoctorLocks {
    locks: LockTable,
}

impl DoctorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, doctor_id: Uuid) -> DoctorLockGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(doctor_id).or_default())
        };
        debug!("Waiting for scheduling lock of doctor {}", doctor_id);
        let guard = Arc::clone(&lock).lock_owned().await;

        DoctorLockGuard {
            doctor_id,
            guard: Some(guard),
            lock: Some(lock),
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Releases the doctor's lock on drop and forgets the entry when nobody else wants it.
pub struct DoctorLockGuard {
    doctor_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Option<Arc<Mutex<()>>>,
    locks: LockTable,
}

impl Drop for DoctorLockGuard {
    fn drop(&mut self) {
        self.guard.take();

        // Waiters clone the entry under the table lock, so the count is stable here.
        // One reference is the table's, the other is ours.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = self.lock.take() {
            if Arc::strong_count(&lock) == 2 {
                locks.remove(&self.doctor_id);
            }
        }
    }
}
