// 🏢 Company Entity - Named owner of a percent-change time series
//
// A company is identified by its name (case-insensitive). Entries are
// embedded: they are only ever read and written through their company.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ENTRY TYPE
// ============================================================================

/// Direction of a percent change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EntryType {
    #[default]
    Increased,
    Decreased,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Increased => "Increased",
            EntryType::Decreased => "Decreased",
        }
    }

    /// Lenient parse: anything that is not exactly "Decreased" is an increase.
    pub fn from_input(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("Decreased") => EntryType::Decreased,
            _ => EntryType::Increased,
        }
    }

    /// Strict parse for values read back from the store
    pub fn from_stored(raw: &str) -> Option<Self> {
        match raw {
            "Increased" => Some(EntryType::Increased),
            "Decreased" => Some(EntryType::Decreased),
            _ => None,
        }
    }

    /// Signed value of a magnitude in this direction (used by charts)
    pub fn signed(&self, percent: f64) -> f64 {
        match self {
            EntryType::Increased => percent.abs(),
            EntryType::Decreased => -percent.abs(),
        }
    }
}

// ============================================================================
// ENTRY
// ============================================================================

/// One percent change event, embedded in its company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Effective day, always at UTC midnight
    pub date: DateTime<Utc>,

    #[serde(rename = "type")]
    pub entry_type: EntryType,

    /// Magnitude only; direction lives in `entry_type`
    pub percent: f64,

    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Build an entry, normalizing the date and dropping the sign of `percent`
    pub fn new(date: DateTime<Utc>, entry_type: EntryType, percent: f64) -> Self {
        Entry {
            date: normalize_to_day(date),
            entry_type,
            percent: percent.abs(),
            created_at: Utc::now(),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

// ============================================================================
// COMPANY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    /// Stable identity (UUID)
    pub id: String,
    pub name: String,
    pub entries: Vec<Entry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Most recent entry by date, if any
    pub fn latest_entry(&self) -> Option<&Entry> {
        self.entries.iter().max_by_key(|e| e.date)
    }
}

/// Matching key for a company name: trimmed and lowercased
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// DATES
// ============================================================================

/// Truncate a timestamp to UTC midnight of its calendar day
pub fn normalize_to_day(date: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.date_naive().and_time(NaiveTime::MIN))
}

/// Parse a user supplied date.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 (any offset, converted to UTC) and
/// `YYYY-MM-DDTHH:MM[:SS]` which is read as UTC. The result is normalized.
pub fn parse_entry_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(normalize_to_day(dt.with_timezone(&Utc)));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| normalize_to_day(Utc.from_utc_datetime(&naive)))
}

/// Today at UTC midnight
pub fn today() -> DateTime<Utc> {
    normalize_to_day(Utc::now())
}
