use std::env;
use tracing::warn;

pub const DEFAULT_CONFLICT_WINDOW_MINUTES: i64 = 20;
pub const DEFAULT_CLINIC_UTC_OFFSET: &str = "+00:00";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Half-width of the window around an instant inside which two bookings collide.
    pub conflict_window_minutes: i64,
    /// Offset of the clinic's wall clock, used to place "now" inside doctor shifts.
    pub clinic_utc_offset: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            conflict_window_minutes: DEFAULT_CONFLICT_WINDOW_MINUTES,
            clinic_utc_offset: DEFAULT_CLINIC_UTC_OFFSET.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            conflict_window_minutes: parse_or_default(
                "CONFLICT_WINDOW_MINUTES",
                env::var("CONFLICT_WINDOW_MINUTES").ok(),
                DEFAULT_CONFLICT_WINDOW_MINUTES,
            ),
            clinic_utc_offset: env::var("CLINIC_UTC_OFFSET")
                .unwrap_or_else(|_| DEFAULT_CLINIC_UTC_OFFSET.to_string()),
            port: parse_or_default("PORT", env::var("PORT").ok(), DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Supabase not configured - doctors and appointments will be kept in memory");
        }

        config
    }

    /// True when both Supabase settings are present and the persistent backends can be used.
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match raw {
        None => default,
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("{} has invalid value '{}', using default {}", name, value, default);
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_in_memory() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.conflict_window_minutes, 20);
        assert_eq!(config.clinic_utc_offset, "+00:00");
    }

    #[test]
    fn test_parse_or_default_falls_back_on_garbage() {
        assert_eq!(parse_or_default("X", Some("abc".to_string()), 20i64), 20);
        assert_eq!(parse_or_default("X", Some(" 30 ".to_string()), 20i64), 30);
        assert_eq!(parse_or_default("X", None, 8080u16), 8080);
    }
}
