use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::company::{name_key, Company, Entry, EntryType};

/// Maximum number of names returned by [`Store::suggest_names`]
pub const SUGGESTION_LIMIT: usize = 10;

/// Outcome of an ingestion: whether the company was new
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Created,
    Appended,
}

impl IngestOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            IngestOutcome::Created => "Created company and added entry",
            IngestOutcome::Appended => "Appended to existing company",
        }
    }
}

/// Explicitly constructed store handle.
///
/// Owns the single SQLite connection. Open it on startup, pass it around,
/// and call [`Store::close`] on shutdown.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// Close the underlying connection, surfacing any close error
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        conn.close()
            .map_err(|(_, e)| e)
            .context("Failed to close database")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("store lock poisoned"))
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Create-or-append in one transaction.
    ///
    /// The UNIQUE name_key makes the insert a no-op when the company already
    /// exists, so two concurrent first ingests of one name append to the same row.
    pub fn ingest(&self, name: &str, entry: &Entry) -> Result<(IngestOutcome, Company)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let now = Utc::now().to_rfc3339();
        let key = name_key(name);

        let inserted = tx.execute(
            "INSERT INTO companies (company_uuid, name, name_key, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(name_key) DO NOTHING",
            params![uuid::Uuid::new_v4().to_string(), name.trim(), key, now],
        )?;

        let company_id: i64 = tx.query_row(
            "SELECT id FROM companies WHERE name_key = ?1",
            [&key],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO entries (company_id, date, entry_type, percent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                company_id,
                entry.date.to_rfc3339(),
                entry.entry_type.as_str(),
                entry.percent,
                entry.created_at.to_rfc3339(),
            ],
        )?;

        let outcome = if inserted == 1 {
            IngestOutcome::Created
        } else {
            tx.execute(
                "UPDATE companies SET updated_at = ?1 WHERE id = ?2",
                params![now, company_id],
            )?;
            IngestOutcome::Appended
        };

        let company = load_company(&tx, company_id)?
            .ok_or_else(|| anyhow!("company {} vanished during ingest", company_id))?;

        tx.commit().context("Failed to commit ingest")?;

        tracing::debug!(company = %company.name, entries = company.entries.len(), ?outcome, "ingested entry");

        Ok((outcome, company))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Companies whose name contains `fragment` (case-insensitive), in
    /// insertion order, with entries in insertion order.
    pub fn find_by_name_fragment(&self, fragment: &str) -> Result<Vec<Company>> {
        let conn = self.lock()?;
        let pattern = format!("%{}%", escape_like(&name_key(fragment)));

        let mut stmt = conn.prepare(
            "SELECT c.id, c.company_uuid, c.name, c.created_at, c.updated_at,
                    e.date, e.entry_type, e.percent, e.created_at
             FROM companies c
             LEFT JOIN entries e ON e.company_id = c.id
             WHERE c.name_key LIKE ?1 ESCAPE '\\'
             ORDER BY c.id, e.id",
        )?;

        let rows = stmt
            .query_map([pattern], CompanyRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(group_rows(rows))
    }

    pub fn get_all_companies(&self) -> Result<Vec<Company>> {
        self.find_by_name_fragment("")
    }

    /// Exact, case-insensitive lookup
    pub fn find_by_name(&self, name: &str) -> Result<Option<Company>> {
        let conn = self.lock()?;

        let company_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM companies WHERE name_key = ?1",
                [name_key(name)],
                |row| row.get(0),
            )
            .optional()?;

        match company_id {
            Some(id) => load_company(&conn, id),
            None => Ok(None),
        }
    }

    /// Names starting with `prefix` (case-insensitive), alphabetical, capped
    pub fn suggest_names(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let pattern = format!("{}%", escape_like(&name_key(prefix)));

        let mut stmt = conn.prepare(
            "SELECT name FROM companies
             WHERE name_key LIKE ?1 ESCAPE '\\'
             ORDER BY name_key, id
             LIMIT ?2",
        )?;

        let names = stmt
            .query_map(params![pattern, SUGGESTION_LIMIT as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    /// Full entry history, oldest first. Unknown name → empty.
    pub fn history(&self, name: &str) -> Result<Vec<Entry>> {
        let mut entries = match self.find_by_name(name)? {
            Some(company) => company.entries,
            None => return Ok(Vec::new()),
        };
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    pub fn count_companies(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_uuid TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            name_key TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL REFERENCES companies(id),
            date TEXT NOT NULL,
            entry_type TEXT NOT NULL,
            percent REAL NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_company ON entries(company_id)",
        [],
    )?;

    Ok(())
}

/// Escape LIKE metacharacters so user input is matched literally
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_timestamp(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_entry_type(raw: &str, idx: usize) -> rusqlite::Result<EntryType> {
    EntryType::from_stored(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown entry type {:?}", raw).into(),
        )
    })
}

/// One row of the companies ⟕ entries join
struct CompanyRow {
    row_id: i64,
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    entry: Option<Entry>,
}

impl CompanyRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(3)?;
        let updated_at: String = row.get(4)?;

        // LEFT JOIN: entry columns are NULL for a company with no entries
        let entry_date: Option<String> = row.get(5)?;
        let entry = match entry_date {
            Some(date) => {
                let entry_type: String = row.get(6)?;
                let entry_created: String = row.get(8)?;
                Some(Entry {
                    date: parse_timestamp(&date, 5)?,
                    entry_type: parse_entry_type(&entry_type, 6)?,
                    percent: row.get(7)?,
                    created_at: parse_timestamp(&entry_created, 8)?,
                })
            }
            None => None,
        };

        Ok(CompanyRow {
            row_id: row.get(0)?,
            id: row.get(1)?,
            name: row.get(2)?,
            created_at: parse_timestamp(&created_at, 3)?,
            updated_at: parse_timestamp(&updated_at, 4)?,
            entry,
        })
    }
}

/// Fold ordered join rows into companies, preserving row order
fn group_rows(rows: Vec<CompanyRow>) -> Vec<Company> {
    let mut companies: Vec<Company> = Vec::new();
    let mut last_row_id = None;

    for row in rows {
        if last_row_id != Some(row.row_id) {
            last_row_id = Some(row.row_id);
            companies.push(Company {
                id: row.id,
                name: row.name,
                entries: Vec::new(),
                created_at: row.created_at,
                updated_at: row.updated_at,
            });
        }
        if let (Some(entry), Some(company)) = (row.entry, companies.last_mut()) {
            company.entries.push(entry);
        }
    }

    companies
}

fn load_company(conn: &Connection, company_id: i64) -> Result<Option<Company>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.company_uuid, c.name, c.created_at, c.updated_at,
                e.date, e.entry_type, e.percent, e.created_at
         FROM companies c
         LEFT JOIN entries e ON e.company_id = c.id
         WHERE c.id = ?1
         ORDER BY e.id",
    )?;

    let rows = stmt
        .query_map([company_id], CompanyRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(group_rows(rows).into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::parse_entry_date;

    fn entry(date: &str, entry_type: EntryType, percent: f64) -> Entry {
        Entry::new(parse_entry_date(date).unwrap(), entry_type, percent)
    }

    #[test]
    fn test_ingest_creates_new_company() {
        let store = Store::open_in_memory().unwrap();
        let e = entry("2024-06-01", EntryType::Increased, 5.0);

        let (outcome, company) = store.ingest("Acme", &e).unwrap();

        assert_eq!(outcome, IngestOutcome::Created);
        assert_eq!(company.name, "Acme");
        assert_eq!(company.entries, vec![e]);
        assert_eq!(store.count_companies().unwrap(), 1);
    }

    #[test]
    fn test_ingest_appends_case_insensitively() {
        let store = Store::open_in_memory().unwrap();
        let first = entry("2024-06-01", EntryType::Increased, 5.0);
        let second = entry("2024-06-02", EntryType::Decreased, 2.0);

        store.ingest("Acme", &first).unwrap();
        let (outcome, company) = store.ingest("  ACME ", &second).unwrap();

        assert_eq!(outcome, IngestOutcome::Appended);
        assert_eq!(company.name, "Acme", "original spelling is kept");
        assert_eq!(company.entries.len(), 2);
        assert_eq!(company.entries[0], first, "prior entry unchanged");
        assert_eq!(company.entries[1], second);
        assert!(company.updated_at >= company.created_at);
        assert_eq!(store.count_companies().unwrap(), 1);
    }

    #[test]
    fn test_ingest_is_exact_not_substring() {
        let store = Store::open_in_memory().unwrap();
        store.ingest("Acme", &entry("2024-06-01", EntryType::Increased, 1.0)).unwrap();
        let (outcome, _) = store
            .ingest("Acme Corp", &entry("2024-06-01", EntryType::Increased, 1.0))
            .unwrap();

        assert_eq!(outcome, IngestOutcome::Created);
        assert_eq!(store.count_companies().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_first_ingest_creates_one_company() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::open_in_memory().unwrap());
        let threads = 16;

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let name = if i % 2 == 0 { "NewCo" } else { "newco" };
                    let (outcome, _) = store
                        .ingest(name, &entry("2024-06-01", EntryType::Increased, i as f64))
                        .unwrap();
                    outcome
                })
            })
            .collect();

        let outcomes: Vec<IngestOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let created = outcomes.iter().filter(|o| **o == IngestOutcome::Created).count();
        assert_eq!(created, 1, "exactly one thread creates the company");
        assert_eq!(store.count_companies().unwrap(), 1);
        assert_eq!(store.find_by_name("NEWCO").unwrap().unwrap().entries.len(), threads);
    }

    #[test]
    fn test_find_by_name_fragment() {
        let store = Store::open_in_memory().unwrap();
        for name in ["Acme", "Beta Acme", "Gamma"] {
            store.ingest(name, &entry("2024-01-01", EntryType::Increased, 1.0)).unwrap();
        }

        let found: Vec<String> = store
            .find_by_name_fragment("ACM")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(found, vec!["Acme", "Beta Acme"]);

        assert_eq!(store.get_all_companies().unwrap().len(), 3);
    }

    #[test]
    fn test_like_metacharacters_are_literal() {
        let store = Store::open_in_memory().unwrap();
        for name in ["100% Juice", "1000 Juice", "a_b", "axb"] {
            store.ingest(name, &entry("2024-01-01", EntryType::Increased, 1.0)).unwrap();
        }

        let pct = store.find_by_name_fragment("0%").unwrap();
        assert_eq!(pct.len(), 1);
        assert_eq!(pct[0].name, "100% Juice");

        assert_eq!(store.suggest_names("a_").unwrap(), vec!["a_b"]);
    }

    #[test]
    fn test_suggest_names_prefix_and_cap() {
        let store = Store::open_in_memory().unwrap();
        for i in (0..12).rev() {
            let name = format!("Acme {:02}", i);
            store.ingest(&name, &entry("2024-01-01", EntryType::Increased, 1.0)).unwrap();
        }
        store.ingest("Zacme", &entry("2024-01-01", EntryType::Increased, 1.0)).unwrap();

        let names = store.suggest_names("ac").unwrap();

        assert_eq!(names.len(), SUGGESTION_LIMIT);
        assert!(names.iter().all(|n| n.to_lowercase().starts_with("ac")));
        assert_eq!(names[0], "Acme 00");
        assert_eq!(names[9], "Acme 09");
    }

    #[test]
    fn test_history_sorted_ascending() {
        let store = Store::open_in_memory().unwrap();
        for date in ["2024-01-10", "2024-03-01", "2024-02-15"] {
            store.ingest("Acme", &entry(date, EntryType::Increased, 1.0)).unwrap();
        }

        let days: Vec<String> = store
            .history("acme")
            .unwrap()
            .iter()
            .map(|e| e.day().to_string())
            .collect();

        assert_eq!(days, vec!["2024-01-10", "2024-02-15", "2024-03-01"]);
    }

    #[test]
    fn test_history_unknown_company_is_empty() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.history("Nobody").unwrap().is_empty());
    }

    #[test]
    fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companies.db");

        let store = Store::open(&path).unwrap();
        store.ingest("Acme", &entry("2024-06-01", EntryType::Decreased, 3.5)).unwrap();
        store.close().unwrap();

        let reopened = Store::open(&path).unwrap();
        let company = reopened.find_by_name("acme").unwrap().unwrap();
        assert_eq!(company.entries.len(), 1);
        assert_eq!(company.entries[0].entry_type, EntryType::Decreased);
        assert_eq!(company.entries[0].percent, 3.5);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
