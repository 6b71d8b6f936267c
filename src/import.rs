// 📂 Bulk import - CSV rows through the ingestion path
//
// Expected headers: name,type,percent,date (date may be empty)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::db::{IngestOutcome, Store};
use crate::ingest::{NewEntry, NewEntryRequest};

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    percent: Option<String>,
    date: Option<String>,
}

impl From<CsvRow> for NewEntryRequest {
    fn from(row: CsvRow) -> Self {
        NewEntryRequest {
            name: row.name.map(serde_json::Value::String),
            entry_type: row.entry_type.map(serde_json::Value::String),
            percent: row.percent.map(serde_json::Value::String),
            date: row.date,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub appended: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.appended
    }
}

/// Read and validate every row; the first invalid row fails the whole load
pub fn load_csv(csv_path: &Path) -> Result<Vec<NewEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .context("Failed to open CSV file")?;

    let mut entries = Vec::new();

    for (idx, result) in rdr.deserialize::<CsvRow>().enumerate() {
        // Header is line 1
        let line = idx + 2;
        let row = result.with_context(|| format!("Failed to read CSV line {}", line))?;
        let entry = NewEntryRequest::from(row)
            .validate()
            .with_context(|| format!("Invalid CSV line {}", line))?;
        entries.push(entry);
    }

    Ok(entries)
}

pub fn import_entries(store: &Store, entries: &[NewEntry]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for new_entry in entries {
        let (outcome, _) = store.ingest(&new_entry.name, &new_entry.entry)?;
        match outcome {
            IngestOutcome::Created => summary.created += 1,
            IngestOutcome::Appended => summary.appended += 1,
        }
    }

    Ok(summary)
}
