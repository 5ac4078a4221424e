use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tracing::info;

use appointment_cell::models::SchedulingRules;
use appointment_cell::router::{appointment_routes, doctor_status_routes};
use appointment_cell::services::{
    AppointmentStore, AvailabilityService, InMemoryAppointmentStore, SchedulingService,
    SupabaseAppointmentStore,
};
use doctor_cell::router::doctor_routes;
use doctor_cell::services::{
    DoctorRegistry, DoctorService, InMemoryDoctorRegistry, SupabaseDoctorRegistry,
};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

/// Services shared by every request, wired over one registry and one appointment store.
pub struct ClinicServices {
    pub doctors: Arc<DoctorService>,
    pub scheduling: Arc<SchedulingService>,
    pub availability: Arc<AvailabilityService>,
}

impl ClinicServices {
    pub fn new(
        registry: Arc<dyn DoctorRegistry>,
        store: Arc<dyn AppointmentStore>,
        rules: SchedulingRules,
    ) -> Self {
        let scheduling = Arc::new(SchedulingService::new(registry.clone(), store.clone(), rules));
        let availability = Arc::new(AvailabilityService::new(registry.clone(), store, rules));
        let doctors = Arc::new(DoctorService::new(registry).with_booking_lookup(scheduling.clone()));

        Self { doctors, scheduling, availability }
    }

    /// Supabase backends when configured, process memory otherwise.
    pub fn from_config(config: &AppConfig) -> Self {
        let rules = SchedulingRules::from_config(config);

        if config.is_configured() {
            info!("Using Supabase backends at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(config));
            Self::new(
                Arc::new(SupabaseDoctorRegistry::new(supabase.clone())),
                Arc::new(SupabaseAppointmentStore::new(supabase)),
                rules,
            )
        } else {
            info!("Using in-memory backends");
            Self::new(
                Arc::new(InMemoryDoctorRegistry::new()),
                Arc::new(InMemoryAppointmentStore::new()),
                rules,
            )
        }
    }
}

pub fn create_router(services: ClinicServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest(
            "/doctors",
            doctor_routes(services.doctors).merge(doctor_status_routes(services.availability)),
        )
        .nest("/appointments", appointment_routes(services.scheduling))
}
