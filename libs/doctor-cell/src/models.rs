use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// ==============================================================================
// SHIFT TIMES
// ==============================================================================

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A time of day at minute resolution. Always within 00:00..=23:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShiftTime(u16);

impl ShiftTime {
    pub fn new(minute_of_day: u16) -> Option<Self> {
        (minute_of_day < MINUTES_PER_DAY).then_some(Self(minute_of_day))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Self::new((hour * 60 + minute) as u16)
    }

    pub fn minute_of_day(&self) -> u16 {
        self.0
    }

    pub fn hour(&self) -> u16 {
        self.0 / 60
    }

    pub fn minute(&self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for ShiftTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ShiftTime {
    type Err = DoctorError;

    /// Accepts `HH:MM` and, for rows coming back from a Postgres `time` column, `HH:MM:SS`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || DoctorError::ValidationError(format!(
            "Invalid shift time '{}': expected 24-hour HH:MM", raw
        ));

        let parts: Vec<&str> = raw.trim().split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid());
        }
        if parts.iter().any(|p| p.len() != 2 || !p.bytes().all(|b| b.is_ascii_digit())) {
            return Err(invalid());
        }

        let hour: u32 = parts[0].parse().map_err(|_| invalid())?;
        let minute: u32 = parts[1].parse().map_err(|_| invalid())?;
        if let Some(seconds) = parts.get(2) {
            let seconds: u32 = seconds.parse().map_err(|_| invalid())?;
            if seconds > 59 {
                return Err(invalid());
            }
        }

        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for ShiftTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShiftTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A daily recurring working interval, start-inclusive and end-exclusive.
/// When `start > end` the shift wraps past midnight; when `start == end` it is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    pub start: ShiftTime,
    pub end: ShiftTime,
}

impl ShiftWindow {
    pub fn new(start: ShiftTime, end: ShiftTime) -> Self {
        Self { start, end }
    }

    pub fn is_overnight(&self) -> bool {
        self.start > self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, minute_of_day: u16) -> bool {
        let (s, e) = (self.start.minute_of_day(), self.end.minute_of_day());
        if s <= e {
            s <= minute_of_day && minute_of_day < e
        } else {
            minute_of_day >= s || minute_of_day < e
        }
    }
}

// ==============================================================================
// DOCTOR
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
    #[serde(alias = "cmp")]
    pub license_id: String,
    pub email: String,
    /// Hard on/off switch, independent of the shift.
    pub is_available: bool,
    pub shift_start: ShiftTime,
    pub shift_end: ShiftTime,
}

impl Doctor {
    pub fn shift_window(&self) -> ShiftWindow {
        ShiftWindow::new(self.shift_start, self.shift_end)
    }

    /// Case-insensitive match on name or specialty, as used by the doctor search box.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.full_name.to_lowercase().contains(&term)
            || self.specialty.to_lowercase().contains(&term)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Body of `POST /doctors` and `PUT /doctors/{id}`. On update, absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRequest {
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    #[serde(alias = "cmp")]
    pub license_id: Option<String>,
    pub email: Option<String>,
    pub is_available: Option<bool>,
    pub shift_start: Option<String>,
    pub shift_end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchQuery {
    pub q: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Doctor still has scheduled appointments")]
    HasActiveAppointments,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
