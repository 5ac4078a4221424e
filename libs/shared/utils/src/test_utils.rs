use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub conflict_window_minutes: i64,
    pub clinic_utc_offset: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            conflict_window_minutes: 20,
            clinic_utc_offset: "+00:00".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock PostgREST server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    /// Config with no Supabase settings, selecting the in-memory backends.
    pub fn in_memory() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            conflict_window_minutes: self.conflict_window_minutes,
            clinic_utc_offset: self.clinic_utc_offset.clone(),
            ..AppConfig::default()
        }
    }
}

/// Row shapes as PostgREST returns them from the `doctors` and `appointments` tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(
        doctor_id: &Uuid,
        full_name: &str,
        specialty: &str,
        shift_start: &str,
        shift_end: &str,
    ) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "full_name": full_name,
            "specialty": specialty,
            "license_id": "CMP-12345",
            "email": "doctor@example.com",
            "is_available": true,
            "shift_start": shift_start,
            "shift_end": shift_end
        })
    }

    pub fn appointment_row(
        appointment_id: &Uuid,
        doctor_id: &Uuid,
        appointment_instant: DateTime<Utc>,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_name": "Test Patient",
            "patient_document_id": "44556677",
            "doctor_id": doctor_id,
            "appointment_instant": appointment_instant.to_rfc3339(),
            "status": status
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
