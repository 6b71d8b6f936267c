// Ingestion boundary: loose request body → validated entry

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::company::{parse_entry_date, today, Company, Entry, EntryType};
use crate::db::{IngestOutcome, Store};
use crate::error::{AppError, AppResult};

/// Body of `POST /api/company` (and one CSV import row).
///
/// Every field is optional here so that missing fields become validation
/// errors instead of deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEntryRequest {
    /// Anything but a non-blank string is reported as missing
    #[serde(default)]
    pub name: Option<Value>,

    /// Anything but the string "Decreased" means Increased
    #[serde(default, rename = "type")]
    pub entry_type: Option<Value>,

    /// Number or numeric string
    #[serde(default)]
    pub percent: Option<Value>,

    #[serde(default)]
    pub date: Option<String>,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub name: String,
    pub entry: Entry,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: &'static str,
    pub company: Company,
}

impl NewEntryRequest {
    pub fn validate(self) -> AppResult<NewEntry> {
        let name = self
            .name
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::validation("name and percent are required"))?
            .to_string();

        let percent = parse_percent(self.percent.as_ref())?;

        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => today(),
            Some(raw) => parse_entry_date(raw)
                .ok_or_else(|| AppError::validation(format!("invalid date: {}", raw)))?,
        };

        let entry_type = EntryType::from_input(self.entry_type.as_ref().and_then(Value::as_str));

        Ok(NewEntry {
            name,
            entry: Entry::new(date, entry_type, percent),
        })
    }
}

fn parse_percent(raw: Option<&Value>) -> AppResult<f64> {
    let value = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(
            s.trim()
                .parse::<f64>()
                .map_err(|_| AppError::validation(format!("percent must be a number, got {:?}", s)))?,
        ),
        Some(Value::Null) | None => None,
        Some(Value::String(_)) => None,
        Some(other) => {
            return Err(AppError::validation(format!(
                "percent must be a number, got {}",
                other
            )))
        }
    };

    match value {
        Some(p) if p.is_finite() => Ok(p),
        Some(p) => Err(AppError::validation(format!("percent must be finite, got {}", p))),
        None => Err(AppError::validation("name and percent are required")),
    }
}

/// Validate and ingest one request
pub fn ingest(store: &Store, request: NewEntryRequest) -> AppResult<IngestResponse> {
    let NewEntry { name, entry } = request.validate()?;
    let (outcome, company) = store.ingest(&name, &entry)?;

    if outcome == IngestOutcome::Created {
        tracing::info!(company = %company.name, "created company");
    }

    Ok(IngestResponse {
        message: outcome.message(),
        company,
    })
}
