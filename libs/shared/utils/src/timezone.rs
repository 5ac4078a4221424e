// libs/shared/utils/src/timezone.rs
//
// Instants cross the API boundary as RFC 3339 strings with an explicit offset and are stored in
// UTC. Wall-clock values only exist at the edges: parsing caller input and rendering for display.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, Utc};

/// Wall-clock format used by `datetime-local` form inputs.
pub const LOCAL_DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parse a UTC offset such as `Z`, `UTC`, `+05:30`, `-0500` or `-05`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, String> {
    let value = raw.trim();

    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let (sign, digits) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => return Err(format!("Invalid UTC offset '{}': expected +HH:MM or -HH:MM", raw)),
    };

    let compact: String = digits.chars().filter(|c| *c != ':').collect();
    if !compact.chars().all(|c| c.is_ascii_digit()) || !(compact.len() == 2 || compact.len() == 4) {
        return Err(format!("Invalid UTC offset '{}': expected +HH:MM or -HH:MM", raw));
    }

    let hours: i32 = compact[..2].parse().map_err(|_| format!("Invalid UTC offset '{}'", raw))?;
    let minutes: i32 = if compact.len() == 4 {
        compact[2..].parse().map_err(|_| format!("Invalid UTC offset '{}'", raw))?
    } else {
        0
    };

    if hours > 14 || minutes > 59 {
        return Err(format!("UTC offset '{}' is out of range", raw));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("UTC offset '{}' is out of range", raw))
}

/// Parse an absolute instant. The string must carry an explicit offset; it is normalized to UTC.
pub fn parse_absolute_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("Instant is required".to_string());
    }

    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|e| {
            format!(
                "Invalid instant '{}': expected ISO-8601 with an explicit offset such as 2025-03-01T14:30:00Z ({})",
                value, e
            )
        })
}

/// The timezone a caller enters and reads wall-clock values in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerTimezone {
    offset: FixedOffset,
}

impl CallerTimezone {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        parse_utc_offset(raw).map(Self::new)
    }

    /// Convert a wall-clock value entered by the caller into an absolute instant.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - Duration::seconds(self.offset.local_minus_utc() as i64)).and_utc()
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn render(&self, instant: DateTime<Utc>) -> String {
        self.to_local(instant).format(LOCAL_DISPLAY_FORMAT).to_string()
    }
}
