pub mod doctor;
pub mod locks;
pub mod registry;
pub mod supabase;

pub use doctor::{ActiveBookingLookup, DoctorService};
pub use locks::{DoctorLockGuard, DoctorLocks};
pub use registry::{DoctorRegistry, InMemoryDoctorRegistry};
pub use supabase::SupabaseDoctorRegistry;
