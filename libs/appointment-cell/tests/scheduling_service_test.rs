use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, CreateAppointmentRequest, SchedulingRules,
};
use appointment_cell::services::{AppointmentStore, InMemoryAppointmentStore, SchedulingService};
use doctor_cell::models::{Doctor, DoctorError};
use doctor_cell::services::{DoctorRegistry, DoctorService, InMemoryDoctorRegistry};
use shared_utils::timezone::CallerTimezone;

struct TestContext {
    registry: Arc<InMemoryDoctorRegistry>,
    store: Arc<InMemoryAppointmentStore>,
    service: Arc<SchedulingService>,
    doctor: Doctor,
}

fn doctor(name: &str) -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        full_name: name.to_string(),
        specialty: "Pediatrics".to_string(),
        license_id: "CMP-777".to_string(),
        email: "doctor@clinic.pe".to_string(),
        is_available: true,
        shift_start: "08:00".parse().unwrap(),
        shift_end: "17:00".parse().unwrap(),
    }
}

fn setup() -> TestContext {
    let doctor = doctor("Rosa Quispe");
    let registry = Arc::new(InMemoryDoctorRegistry::with_doctors(vec![doctor.clone()]));
    let store = Arc::new(InMemoryAppointmentStore::new());
    let service = Arc::new(SchedulingService::new(
        registry.clone(),
        store.clone(),
        SchedulingRules::default(),
    ));
    TestContext { registry, store, service, doctor }
}

fn base_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap()
}

fn request(doctor_id: Uuid, instant: &str) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_name: Some("Lucia Ramos".to_string()),
        patient_document_id: Some("70123456".to_string()),
        doctor_id: Some(doctor_id.to_string()),
        appointment_instant: Some(instant.to_string()),
    }
}

#[tokio::test]
async fn test_booking_inside_window_is_rejected() {
    let ctx = setup();
    let t = base_instant();

    let first = ctx.service
        .create_appointment(request(ctx.doctor.id, &t.to_rfc3339()))
        .await
        .unwrap();
    assert_eq!(first.status, AppointmentStatus::Scheduled);
    assert_eq!(first.appointment_instant, t);

    let conflict = ctx.service
        .create_appointment(request(ctx.doctor.id, &(t + Duration::minutes(10)).to_rfc3339()))
        .await;
    assert_matches!(conflict, Err(AppointmentError::ConflictDetected { .. }));

    let later = ctx.service
        .create_appointment(request(ctx.doctor.id, &(t + Duration::minutes(25)).to_rfc3339()))
        .await;
    assert!(later.is_ok());

    assert_eq!(ctx.store.list_appointments().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_other_doctor_can_book_same_instant() {
    let ctx = setup();
    let other = ctx.registry.insert_doctor(doctor("Jorge Salas")).await.unwrap();
    let t = base_instant().to_rfc3339();

    ctx.service.create_appointment(request(ctx.doctor.id, &t)).await.unwrap();
    assert!(ctx.service.create_appointment(request(other.id, &t)).await.is_ok());
}

#[tokio::test]
async fn test_cancelled_booking_frees_the_slot() {
    let ctx = setup();
    let t = base_instant().to_rfc3339();

    let first = ctx.service.create_appointment(request(ctx.doctor.id, &t)).await.unwrap();
    ctx.service.transition_status(first.id, AppointmentStatus::Cancelled).await.unwrap();

    assert!(ctx.service.create_appointment(request(ctx.doctor.id, &t)).await.is_ok());
}

#[tokio::test]
async fn test_create_validation() {
    let ctx = setup();

    let mut missing_name = request(ctx.doctor.id, &base_instant().to_rfc3339());
    missing_name.patient_name = Some("   ".to_string());
    assert_matches!(
        ctx.service.create_appointment(missing_name).await,
        Err(AppointmentError::ValidationError(msg)) if msg.contains("patientName")
    );

    let naive = request(ctx.doctor.id, "2025-03-01T10:00:00");
    assert_matches!(
        ctx.service.create_appointment(naive).await,
        Err(AppointmentError::ValidationError(_))
    );

    let mut bad_doctor = request(ctx.doctor.id, &base_instant().to_rfc3339());
    bad_doctor.doctor_id = Some("not-a-uuid".to_string());
    assert_matches!(
        ctx.service.create_appointment(bad_doctor).await,
        Err(AppointmentError::ValidationError(_))
    );

    assert!(ctx.store.list_appointments().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_doctor_is_not_found() {
    let ctx = setup();
    let result = ctx.service
        .create_appointment(request(Uuid::new_v4(), &base_instant().to_rfc3339()))
        .await;
    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn test_offset_instants_are_normalized_to_utc() {
    let ctx = setup();
    let appointment = ctx.service
        .create_appointment(request(ctx.doctor.id, "2025-03-01T10:00:00-05:00"))
        .await
        .unwrap();
    assert_eq!(appointment.appointment_instant, base_instant());
}

#[tokio::test]
async fn test_reschedule_excludes_itself_from_conflicts() {
    let ctx = setup();
    let t = base_instant();
    let appointment = ctx.service.create_appointment(request(ctx.doctor.id, &t.to_rfc3339())).await.unwrap();

    let moved = ctx.service
        .reschedule_appointment(appointment.id, &(t + Duration::minutes(10)).to_rfc3339())
        .await
        .unwrap();

    assert_eq!(moved.id, appointment.id);
    assert_eq!(moved.status, AppointmentStatus::Scheduled);
    assert_eq!(moved.appointment_instant, t + Duration::minutes(10));
}

#[tokio::test]
async fn test_reschedule_into_other_booking_conflicts() {
    let ctx = setup();
    let t = base_instant();
    ctx.service.create_appointment(request(ctx.doctor.id, &t.to_rfc3339())).await.unwrap();
    let second = ctx.service
        .create_appointment(request(ctx.doctor.id, &(t + Duration::hours(2)).to_rfc3339()))
        .await
        .unwrap();

    let result = ctx.service
        .reschedule_appointment(second.id, &(t + Duration::minutes(5)).to_rfc3339())
        .await;
    assert_matches!(result, Err(AppointmentError::ConflictDetected { .. }));

    let unchanged = ctx.service.get_appointment(second.id).await.unwrap();
    assert_eq!(unchanged.appointment_instant, t + Duration::hours(2));
}

#[tokio::test]
async fn test_reschedule_requires_scheduled_status() {
    let ctx = setup();
    let appointment = ctx.service
        .create_appointment(request(ctx.doctor.id, &base_instant().to_rfc3339()))
        .await
        .unwrap();
    ctx.service.transition_status(appointment.id, AppointmentStatus::Completed).await.unwrap();

    let result = ctx.service
        .reschedule_appointment(appointment.id, &(base_instant() + Duration::days(1)).to_rfc3339())
        .await;
    assert_matches!(result, Err(AppointmentError::NotReschedulable(AppointmentStatus::Completed)));
}

#[tokio::test]
async fn test_reschedule_to_same_instant_is_noop() {
    let ctx = setup();
    let appointment = ctx.service
        .create_appointment(request(ctx.doctor.id, &base_instant().to_rfc3339()))
        .await
        .unwrap();

    let same = ctx.service
        .reschedule_appointment(appointment.id, "2025-03-01T10:00:00-05:00")
        .await
        .unwrap();
    assert_eq!(same, appointment);
}

#[tokio::test]
async fn test_reschedule_unknown_appointment() {
    let ctx = setup();
    let result = ctx.service
        .reschedule_appointment(Uuid::new_v4(), &base_instant().to_rfc3339())
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let ctx = setup();
    let appointment = ctx.service
        .create_appointment(request(ctx.doctor.id, &base_instant().to_rfc3339()))
        .await
        .unwrap();

    let completed = ctx.service
        .transition_status(appointment.id, AppointmentStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    let repeated = ctx.service
        .transition_status(appointment.id, AppointmentStatus::Completed)
        .await
        .unwrap();
    assert_eq!(repeated, completed);

    assert_matches!(
        ctx.service.transition_status(appointment.id, AppointmentStatus::Scheduled).await,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Scheduled,
        })
    );
    assert_matches!(
        ctx.service.transition_status(appointment.id, AppointmentStatus::Cancelled).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn test_delete_only_after_terminal() {
    let ctx = setup();
    let appointment = ctx.service
        .create_appointment(request(ctx.doctor.id, &base_instant().to_rfc3339()))
        .await
        .unwrap();

    assert_matches!(
        ctx.service.delete_appointment(appointment.id).await,
        Err(AppointmentError::NotDeletable(AppointmentStatus::Scheduled))
    );

    ctx.service.transition_status(appointment.id, AppointmentStatus::Cancelled).await.unwrap();
    ctx.service.delete_appointment(appointment.id).await.unwrap();

    assert_matches!(
        ctx.service.get_appointment(appointment.id).await,
        Err(AppointmentError::NotFound)
    );
}

#[tokio::test]
async fn test_concurrent_bookings_for_same_slot_admit_one() {
    let ctx = setup();
    let t = base_instant();

    let attempts = (0..16).map(|i| {
        let service = Arc::clone(&ctx.service);
        let instant = (t + Duration::minutes(i % 5)).to_rfc3339();
        let doctor_id = ctx.doctor.id;
        tokio::spawn(async move { service.create_appointment(request(doctor_id, &instant)).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let booked = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(booked, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppointmentError::ConflictDetected { .. })));
    assert_eq!(ctx.store.list_appointments().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_newest_first_with_doctor_snapshot() {
    let ctx = setup();
    let removed = ctx.registry.insert_doctor(doctor("Pedro Vargas")).await.unwrap();
    let t = base_instant();

    ctx.service.create_appointment(request(ctx.doctor.id, &t.to_rfc3339())).await.unwrap();
    ctx.service
        .create_appointment(request(removed.id, &(t + Duration::days(1)).to_rfc3339()))
        .await
        .unwrap();
    ctx.registry.delete_doctor(removed.id).await.unwrap();

    let views = ctx.service.list_appointments(None, None).await.unwrap();

    assert_eq!(views.len(), 2);
    assert_eq!(views[0].appointment.doctor_id, removed.id);
    assert!(views[0].doctor.is_none());
    assert_eq!(views[1].doctor.as_ref().unwrap().full_name, "Rosa Quispe");
    assert!(views[1].local_instant.is_none());
}

#[tokio::test]
async fn test_list_filters_by_patient() {
    let ctx = setup();
    let mut other_patient = request(ctx.doctor.id, &(base_instant() + Duration::hours(3)).to_rfc3339());
    other_patient.patient_name = Some("Mario Cruz".to_string());
    other_patient.patient_document_id = Some("40998877".to_string());

    ctx.service.create_appointment(request(ctx.doctor.id, &base_instant().to_rfc3339())).await.unwrap();
    ctx.service.create_appointment(other_patient).await.unwrap();

    let by_name = ctx.service.list_appointments(Some("lucia"), None).await.unwrap();
    assert_eq!(by_name.len(), 1);
    let by_document = ctx.service.list_appointments(Some("40998"), None).await.unwrap();
    assert_eq!(by_document[0].appointment.patient_name, "Mario Cruz");
}

#[tokio::test]
async fn test_local_wall_clock_round_trip() {
    let ctx = setup();
    let caller = CallerTimezone::parse("-05:00").unwrap();
    let entered = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(9, 30, 0).unwrap();

    ctx.service
        .create_appointment(request(ctx.doctor.id, &caller.to_utc(entered).to_rfc3339()))
        .await
        .unwrap();

    let views = ctx.service.list_appointments(None, Some(caller)).await.unwrap();
    assert_eq!(views[0].appointment.appointment_instant, Utc.with_ymd_and_hms(2025, 3, 1, 14, 30, 0).unwrap());
    assert_eq!(views[0].local_instant.as_deref(), Some("2025-03-01T09:30"));
    assert_eq!(caller.to_local(views[0].appointment.appointment_instant), entered);
}

#[tokio::test]
async fn test_stats_count_by_status() {
    let ctx = setup();
    let t = base_instant();
    let ids: Vec<Uuid> = {
        let mut ids = Vec::new();
        for hours in 0..3 {
            let appointment = ctx.service
                .create_appointment(request(ctx.doctor.id, &(t + Duration::hours(hours)).to_rfc3339()))
                .await
                .unwrap();
            ids.push(appointment.id);
        }
        ids
    };
    ctx.service.transition_status(ids[0], AppointmentStatus::Completed).await.unwrap();
    ctx.service.transition_status(ids[1], AppointmentStatus::Cancelled).await.unwrap();

    let stats = ctx.service.appointment_stats().await.unwrap();
    assert_eq!((stats.total, stats.scheduled, stats.completed, stats.cancelled), (3, 1, 1, 1));
}

#[tokio::test]
async fn test_doctor_with_scheduled_booking_cannot_be_deleted() {
    let ctx = setup();
    let doctors = DoctorService::new(ctx.registry.clone()).with_booking_lookup(ctx.service.clone());
    let appointment = ctx.service
        .create_appointment(request(ctx.doctor.id, &base_instant().to_rfc3339()))
        .await
        .unwrap();

    assert_matches!(
        doctors.delete_doctor(ctx.doctor.id).await,
        Err(DoctorError::HasActiveAppointments)
    );

    ctx.service.transition_status(appointment.id, AppointmentStatus::Completed).await.unwrap();
    doctors.delete_doctor(ctx.doctor.id).await.unwrap();
    assert!(ctx.registry.get_doctor(ctx.doctor.id).await.unwrap().is_none());
}

/// Registry whose first doctor lookup stalls, widening the gap between a booking's doctor
/// check and its insert.
struct StallingRegistry {
    inner: InMemoryDoctorRegistry,
    stalled: AtomicBool,
}

#[async_trait]
impl DoctorRegistry for StallingRegistry {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DoctorError> {
        self.inner.list_doctors().await
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        self.inner.get_doctor(doctor_id).await
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        self.inner.insert_doctor(doctor).await
    }

    async fn update_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        self.inner.update_doctor(doctor).await
    }

    async fn delete_doctor(&self, doctor_id: Uuid) -> Result<bool, DoctorError> {
        self.inner.delete_doctor(doctor_id).await
    }
}

#[tokio::test]
async fn test_doctor_removal_waits_for_in_flight_booking() {
    let rosa = doctor("Rosa Quispe");
    let registry = Arc::new(StallingRegistry {
        inner: InMemoryDoctorRegistry::with_doctors(vec![rosa.clone()]),
        stalled: AtomicBool::new(false),
    });
    let store = Arc::new(InMemoryAppointmentStore::new());
    let scheduling = Arc::new(SchedulingService::new(
        registry.clone(),
        store.clone(),
        SchedulingRules::default(),
    ));
    let doctors = DoctorService::new(registry.clone()).with_booking_lookup(scheduling.clone());

    let booking = {
        let scheduling = Arc::clone(&scheduling);
        let doctor_id = rosa.id;
        tokio::spawn(async move {
            scheduling
                .create_appointment(request(doctor_id, &base_instant().to_rfc3339()))
                .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let removal = doctors.delete_doctor(rosa.id).await;
    let booked = booking.await.unwrap();

    assert!(booked.is_ok());
    assert_matches!(removal, Err(DoctorError::HasActiveAppointments));
    assert!(registry.get_doctor(rosa.id).await.unwrap().is_some());

    let orphaned = store
        .list_appointments()
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.status == AppointmentStatus::Scheduled)
        .count();
    assert_eq!(orphaned, 1);
}

#[tokio::test]
async fn test_booking_after_doctor_removal_is_not_found() {
    let ctx = setup();
    let doctors = DoctorService::new(ctx.registry.clone()).with_booking_lookup(ctx.service.clone());

    doctors.delete_doctor(ctx.doctor.id).await.unwrap();

    assert_matches!(
        ctx.service.create_appointment(request(ctx.doctor.id, &base_instant().to_rfc3339())).await,
        Err(AppointmentError::DoctorNotFound)
    );
    assert!(ctx.store.list_appointments().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_reschedules_into_same_slot_admit_one() {
    let ctx = setup();
    let t = base_instant();

    let mut ids = Vec::new();
    for hours in 1..=6 {
        let appointment = ctx.service
            .create_appointment(request(ctx.doctor.id, &(t + Duration::hours(hours)).to_rfc3339()))
            .await
            .unwrap();
        ids.push(appointment.id);
    }

    let moves = ids.iter().enumerate().map(|(i, id)| {
        let service = Arc::clone(&ctx.service);
        let id = *id;
        let target = (t + Duration::minutes(i as i64 % 4)).to_rfc3339();
        tokio::spawn(async move { service.reschedule_appointment(id, &target).await })
    });

    let results: Vec<_> = join_all(moves)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppointmentError::ConflictDetected { .. })));

    let in_slot = ctx.store
        .list_appointments()
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.appointment_instant < t + Duration::minutes(20))
        .count();
    assert_eq!(in_slot, 1);
}
