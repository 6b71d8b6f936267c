// Company Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod company;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod ingest;
pub mod query;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use company::{normalize_to_day, parse_entry_date, Company, Entry, EntryType};
pub use config::Config;
pub use db::{IngestOutcome, Store, SUGGESTION_LIMIT};
pub use error::{AppError, AppResult};
pub use import::{import_entries, load_csv, ImportSummary};
pub use ingest::{IngestResponse, NewEntry, NewEntryRequest};
pub use query::{CompanyQuery, CompanyQueryParams, DateFilter, SortOrder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
