// 🔎 Query Engine - name search, date component filters, ordering
//
// Pipeline: name substring (store) → day/month/year filter → entries
// newest-first → companies by name.

use chrono::Datelike;
use serde::Deserialize;
use std::cmp::Ordering;

use crate::company::{Company, Entry};
use crate::db::Store;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NameAsc,
    NameDesc,
}

impl SortOrder {
    /// Unknown values fall back to ascending
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("name_desc") => SortOrder::NameDesc,
            _ => SortOrder::NameAsc,
        }
    }
}

/// Query string of `GET /api/companies`, as received
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyQueryParams {
    pub query: Option<String>,
    pub day: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    pub sort: Option<String>,
}

/// Filters on the UTC date components of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateFilter {
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl DateFilter {
    pub fn is_empty(&self) -> bool {
        self.day.is_none() && self.month.is_none() && self.year.is_none()
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        let d = entry.date;
        self.day.map_or(true, |day| d.day() == day)
            && self.month.map_or(true, |month| d.month() == month)
            && self.year.map_or(true, |year| d.year() == year)
    }
}

/// Parsed, typed form of [`CompanyQueryParams`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompanyQuery {
    pub name: String,
    pub dates: DateFilter,
    pub sort: SortOrder,
}

impl TryFrom<CompanyQueryParams> for CompanyQuery {
    type Error = AppError;

    fn try_from(params: CompanyQueryParams) -> AppResult<Self> {
        Ok(CompanyQuery {
            name: params.query.unwrap_or_default().trim().to_string(),
            dates: DateFilter {
                day: parse_component("day", params.day.as_deref())?,
                month: parse_component("month", params.month.as_deref())?,
                year: parse_component("year", params.year.as_deref())?,
            },
            sort: SortOrder::parse(params.sort.as_deref()),
        })
    }
}

/// Empty means absent; anything else must be an integer
fn parse_component<T: std::str::FromStr>(field: &str, raw: Option<&str>) -> AppResult<Option<T>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| AppError::validation(format!("{} must be an integer, got {:?}", field, s))),
    }
}

/// Apply date filters and ordering to companies already matched by name.
///
/// Companies keep their incoming relative order when names compare equal.
pub fn apply(mut companies: Vec<Company>, query: &CompanyQuery) -> Vec<Company> {
    if !query.dates.is_empty() {
        for company in &mut companies {
            company.entries.retain(|e| query.dates.matches(e));
        }
        companies.retain(|c| !c.entries.is_empty());
    }

    for company in &mut companies {
        company.entries.sort_by(|a, b| b.date.cmp(&a.date));
    }

    companies.sort_by(|a, b| compare_names(a, b, query.sort));
    companies
}

fn compare_names(a: &Company, b: &Company, sort: SortOrder) -> Ordering {
    let ord = a.name.to_lowercase().cmp(&b.name.to_lowercase());
    match sort {
        SortOrder::NameAsc => ord,
        SortOrder::NameDesc => ord.reverse(),
    }
}

/// Run a full search against the store
pub fn search(store: &Store, query: &CompanyQuery) -> AppResult<Vec<Company>> {
    let candidates = store.find_by_name_fragment(&query.name)?;
    Ok(apply(candidates, query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::{parse_entry_date, EntryType};
    use chrono::Utc;

    fn company(name: &str, dates: &[&str]) -> Company {
        let now = Utc::now();
        Company {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            entries: dates
                .iter()
                .map(|d| Entry::new(parse_entry_date(d).unwrap(), EntryType::Increased, 1.0))
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    fn fixture() -> Vec<Company> {
        vec![
            company("beta", &["2024-01-15", "2023-06-15", "2024-06-01"]),
            company("Alpha", &["2024-06-15", "2024-01-01"]),
            company("gamma", &["2022-03-03"]),
        ]
    }

    fn names(companies: &[Company]) -> Vec<&str> {
        companies.iter().map(|c| c.name.as_str()).collect()
    }

    fn query(day: Option<u32>, month: Option<u32>, year: Option<i32>) -> CompanyQuery {
        CompanyQuery {
            dates: DateFilter { day, month, year },
            ..Default::default()
        }
    }

    #[test]
    fn test_no_filters_reorders_without_dropping() {
        let result = apply(fixture(), &CompanyQuery::default());

        assert_eq!(names(&result), vec!["Alpha", "beta", "gamma"]);
        assert_eq!(result[1].entries.len(), 3);
        let beta_days: Vec<String> = result[1].entries.iter().map(|e| e.day().to_string()).collect();
        assert_eq!(beta_days, vec!["2024-06-01", "2024-01-15", "2023-06-15"]);
    }

    #[test]
    fn test_filters_hold_for_every_returned_entry() {
        let combos = [
            query(Some(15), None, None),
            query(None, Some(6), None),
            query(None, None, Some(2024)),
            query(Some(15), Some(6), None),
            query(Some(15), None, Some(2024)),
            query(None, Some(1), Some(2024)),
            query(Some(1), Some(6), Some(2024)),
            query(Some(31), Some(12), Some(1999)),
        ];

        for q in combos {
            let result = apply(fixture(), &q);
            for c in &result {
                assert!(!c.entries.is_empty(), "{} kept with no entries", c.name);
                assert!(c.entries.iter().all(|e| q.dates.matches(e)));
            }
            // Every company with a matching entry is present
            for c in fixture() {
                let has_match = c.entries.iter().any(|e| q.dates.matches(e));
                assert_eq!(has_match, result.iter().any(|r| r.name == c.name), "{:?}", q.dates);
            }
        }
    }

    #[test]
    fn test_day_filter_drops_empty_companies() {
        let result = apply(fixture(), &query(Some(15), None, None));
        assert_eq!(names(&result), vec!["Alpha", "beta"]);
        assert_eq!(result[1].entries.len(), 2);
    }

    #[test]
    fn test_sort_directions_case_insensitive() {
        let asc = apply(fixture(), &CompanyQuery::default());
        let desc = apply(
            fixture(),
            &CompanyQuery {
                sort: SortOrder::NameDesc,
                ..Default::default()
            },
        );

        let lower = |cs: &[Company]| cs.iter().map(|c| c.name.to_lowercase()).collect::<Vec<_>>();
        assert!(lower(&asc).windows(2).all(|w| w[0] <= w[1]));
        assert!(lower(&desc).windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(names(&desc), vec!["gamma", "beta", "Alpha"]);
    }

    #[test]
    fn test_equal_names_keep_store_order() {
        let mut first = company("Same", &["2024-01-01"]);
        first.id = "first".to_string();
        let mut second = company("same", &["2024-01-02"]);
        second.id = "second".to_string();

        let result = apply(vec![first, second], &CompanyQuery::default());
        assert_eq!(result[0].id, "first");
        assert_eq!(result[1].id, "second");
    }

    #[test]
    fn test_params_parsing() {
        let params = CompanyQueryParams {
            query: Some("  ac ".to_string()),
            day: Some("".to_string()),
            month: Some("6".to_string()),
            year: None,
            sort: Some("name_desc".to_string()),
        };
        let q = CompanyQuery::try_from(params).unwrap();

        assert_eq!(q.name, "ac");
        assert_eq!(q.dates, DateFilter { day: None, month: Some(6), year: None });
        assert_eq!(q.sort, SortOrder::NameDesc);
    }

    #[test]
    fn test_non_integer_filter_is_validation_error() {
        let params = CompanyQueryParams {
            year: Some("20x4".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            CompanyQuery::try_from(params),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_sort_is_ascending() {
        assert_eq!(SortOrder::parse(Some("oldest")), SortOrder::NameAsc);
        assert_eq!(SortOrder::parse(None), SortOrder::NameAsc);
    }

    #[test]
    fn test_search_against_store() {
        let store = Store::open_in_memory().unwrap();
        for (name, date) in [("Acme", "2024-06-01"), ("acme labs", "2023-06-01"), ("Other", "2024-06-01")] {
            let entry = Entry::new(parse_entry_date(date).unwrap(), EntryType::Increased, 1.0);
            store.ingest(name, &entry).unwrap();
        }

        let q = CompanyQuery {
            name: "ACME".to_string(),
            dates: DateFilter { year: Some(2024), ..Default::default() },
            sort: SortOrder::NameAsc,
        };
        let result = search(&store, &q).unwrap();
        assert_eq!(names(&result), vec!["Acme"]);
    }
}
