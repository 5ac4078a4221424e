pub mod availability;
pub mod conflict;
pub mod lifecycle;
pub mod scheduling;
pub mod store;
pub mod supabase;

pub use availability::{AvailabilityEngine, AvailabilityService};
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use scheduling::SchedulingService;
pub use store::{AppointmentStore, InMemoryAppointmentStore};
pub use supabase::SupabaseAppointmentStore;
