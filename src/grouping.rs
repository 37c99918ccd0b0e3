//! Normalises raw fetched rows into per-municipality yearly series.

use crate::catalog::CatalogSnapshot;
use crate::types::{GroupedSeries, ValueRecord};
use crate::util::parse_value;
use tracing::debug;

/// Group raw rows into `municipality -> year -> value` for one gender split.
///
/// Rows missing a municipality or period are skipped, as are null or
/// unparseable values. Duplicate (municipality, period) rows overwrite each
/// other in input order.
pub fn group(rows: &[ValueRecord], gender: &str) -> GroupedSeries {
    let mut series = GroupedSeries::new();
    let mut skipped = 0usize;

    for row in rows {
        let (Some(municipality), Some(period)) =
            (row.municipality.as_deref(), row.period.as_ref())
        else {
            skipped += 1;
            continue;
        };
        if municipality.is_empty() {
            skipped += 1;
            continue;
        }
        let year = period.key();
        for sub in row.values.iter().filter(|v| v.gender == gender) {
            match sub.value.as_ref().and_then(parse_value) {
                Some(v) => {
                    series
                        .entry(municipality.to_string())
                        .or_default()
                        .insert(year.clone(), v);
                }
                None => skipped += 1,
            }
        }
    }

    debug!(
        rows = rows.len(),
        municipalities = series.len(),
        skipped,
        gender,
        "grouped raw rows"
    );
    series
}

/// Keep only municipalities whose catalog type equals `kind`.
///
/// With a type filter active, municipalities unknown to the catalog are
/// dropped as well. `None` keeps everything.
pub fn filter_by_type(
    series: GroupedSeries,
    catalog: &CatalogSnapshot,
    kind: Option<&str>,
) -> GroupedSeries {
    let Some(kind) = kind else {
        return series;
    };
    series
        .into_iter()
        .filter(|(id, _)| catalog.municipality(id).map_or(false, |m| m.kind == kind))
        .collect()
}
