//! Latest values and earliest-to-latest deltas per municipality.
//!
//! Years are ordered as strings. That is right for four-digit years and
//! wrong for anything else; callers relying on mixed-length year labels
//! will see them misordered.

use crate::catalog::CatalogSnapshot;
use crate::types::{DeltaEntry, GroupedSeries, MunicipalitySeries, TrendEntry};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trends {
    pub latest: Vec<TrendEntry>,
    pub deltas: Vec<DeltaEntry>,
}

pub fn display_name(catalog: &CatalogSnapshot, id: &str) -> String {
    match catalog.municipality_title(id) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => format!("Kommun {}", id),
    }
}

/// Requested years present in `values`, sorted lexically.
fn available_years(values: &BTreeMap<String, f64>, years: &[String]) -> Vec<String> {
    let mut available: Vec<String> = years
        .iter()
        .filter(|y| values.contains_key(y.as_str()))
        .cloned()
        .collect();
    available.sort();
    available
}

/// Latest value for every municipality with at least one requested year,
/// plus a delta entry for those with two or more.
pub fn trend_entries(
    series: &GroupedSeries,
    years: &[String],
    catalog: &CatalogSnapshot,
) -> Trends {
    let mut trends = Trends::default();

    for (id, values) in series {
        let available = available_years(values, years);
        let (Some(earliest), Some(latest)) = (available.first(), available.last()) else {
            continue;
        };
        let earliest_value = values[earliest];
        let latest_value = values[latest];
        let name = display_name(catalog, id);

        if available.len() >= 2 {
            trends.deltas.push(DeltaEntry {
                municipality_id: id.clone(),
                municipality_name: name.clone(),
                earliest_year: earliest.clone(),
                earliest_value,
                latest_year: latest.clone(),
                latest_value,
                delta_value: latest_value - earliest_value,
            });
        }
        trends.latest.push(TrendEntry {
            municipality_id: id.clone(),
            municipality_name: name,
            latest_year: latest.clone(),
            latest_value,
            years_in_data: available,
        });
    }
    trends
}

/// One entry per municipality in `series`, carrying its requested-year data
/// and, where available, latest/earliest values and the delta.
pub fn flat_with_delta(
    series: &GroupedSeries,
    years: &[String],
    catalog: &CatalogSnapshot,
) -> Vec<MunicipalitySeries> {
    series
        .iter()
        .map(|(id, values)| {
            let available = available_years(values, years);
            let mut entry = MunicipalitySeries {
                municipality_id: id.clone(),
                municipality_name: display_name(catalog, id),
                data: available.iter().map(|y| (y.clone(), values[y])).collect(),
                latest_year: None,
                latest_value: None,
                earliest_year: None,
                earliest_value: None,
                delta_value: None,
            };
            if let Some(latest) = available.last() {
                entry.latest_year = Some(latest.clone());
                entry.latest_value = Some(values[latest]);
                if available.len() >= 2 {
                    let earliest = &available[0];
                    entry.earliest_year = Some(earliest.clone());
                    entry.earliest_value = Some(values[earliest]);
                    entry.delta_value = Some(values[latest] - values[earliest]);
                }
            }
            entry
        })
        .collect()
}
