//! The raw data collaborator.
//!
//! Analyses never talk to a data source directly; they go through
//! [`DataFetcher`]. A failed fetch is terminal for that call and is not
//! retried here.

use crate::error::FetchError;
use crate::types::{RawResponse, ValueRecord};
use crate::util::split_list;
use std::collections::HashSet;
use tracing::debug;

pub trait DataFetcher {
    /// Rows for `kpi_id` restricted to `municipality_ids` and, when given,
    /// the comma-separated `year` list.
    fn fetch_raw(
        &self,
        kpi_id: &str,
        municipality_ids: &[String],
        year: Option<&str>,
    ) -> Result<RawResponse, FetchError>;
}

impl<F: DataFetcher + ?Sized> DataFetcher for &F {
    fn fetch_raw(
        &self,
        kpi_id: &str,
        municipality_ids: &[String],
        year: Option<&str>,
    ) -> Result<RawResponse, FetchError> {
        (**self).fetch_raw(kpi_id, municipality_ids, year)
    }
}

/// Serves rows from an in-memory export of the values endpoint.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFetcher {
    rows: Vec<ValueRecord>,
}

impl SnapshotFetcher {
    pub fn new(rows: Vec<ValueRecord>) -> Self {
        SnapshotFetcher { rows }
    }
}

impl DataFetcher for SnapshotFetcher {
    fn fetch_raw(
        &self,
        kpi_id: &str,
        municipality_ids: &[String],
        year: Option<&str>,
    ) -> Result<RawResponse, FetchError> {
        let wanted: HashSet<&str> = municipality_ids.iter().map(String::as_str).collect();
        let years: Option<HashSet<String>> = year.map(|y| split_list(y).into_iter().collect());

        let values: Vec<ValueRecord> = self
            .rows
            .iter()
            .filter(|r| r.kpi.as_deref() == Some(kpi_id))
            .filter(|r| {
                wanted.is_empty()
                    || r.municipality.as_deref().map_or(false, |m| wanted.contains(m))
            })
            .filter(|r| match (&years, &r.period) {
                (None, _) => true,
                (Some(ys), Some(p)) => ys.contains(&p.key()),
                (Some(_), None) => false,
            })
            .cloned()
            .collect();

        debug!(kpi_id, rows = values.len(), "snapshot fetch");
        Ok(RawResponse { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenderValue, Period};

    fn row(kpi: &str, m: &str, year: i64) -> ValueRecord {
        ValueRecord {
            kpi: Some(kpi.into()),
            municipality: Some(m.into()),
            period: Some(Period::Year(year)),
            values: vec![GenderValue { gender: "T".into(), value: Some(serde_json::json!(1)) }],
            municipality_name: None,
        }
    }

    fn fetcher() -> SnapshotFetcher {
        SnapshotFetcher::new(vec![
            row("N1", "0001", 2019),
            row("N1", "0001", 2020),
            row("N1", "0002", 2020),
            row("N2", "0001", 2020),
        ])
    }

    #[test]
    fn filters_by_kpi_municipality_and_year() {
        let f = fetcher();
        let all = f.fetch_raw("N1", &[], None).unwrap();
        assert_eq!(all.values.len(), 3);

        let one = f.fetch_raw("N1", &["0002".to_string()], None).unwrap();
        assert_eq!(one.values.len(), 1);

        let years = f.fetch_raw("N1", &["0001".to_string()], Some("2019, 2021")).unwrap();
        assert_eq!(years.values.len(), 1);
        assert_eq!(years.values[0].period, Some(Period::Year(2019)));
    }

    #[test]
    fn unknown_kpi_returns_no_rows() {
        assert!(fetcher().fetch_raw("X", &[], None).unwrap().values.is_empty());
    }
}
