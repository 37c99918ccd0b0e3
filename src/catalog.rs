//! Read-only catalog snapshot: KPIs, municipalities and the derived lookup
//! structures. Built once, then shared by reference with every analysis.

use crate::error::AnalysisError;
use crate::search::SearchEntry;
use crate::types::{Kpi, Municipality, MunicipalityListing, OperatingAreaSummary};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    kpis: Vec<Kpi>,
    kpi_map: HashMap<String, Kpi>,
    municipalities: Vec<Municipality>,
    municipality_map: HashMap<String, Municipality>,
    search_index: Vec<SearchEntry>,
    operating_areas: Vec<OperatingAreaSummary>,
    loaded_at: DateTime<Utc>,
}

fn split_areas(field: &str) -> impl Iterator<Item = &str> {
    field.split(',').map(str::trim)
}

fn summarize_operating_areas(kpis: &[Kpi]) -> Vec<OperatingAreaSummary> {
    let mut grouped: BTreeMap<&str, usize> = BTreeMap::new();
    for kpi in kpis {
        for area in split_areas(&kpi.operating_area).filter(|a| !a.is_empty()) {
            *grouped.entry(area).or_default() += 1;
        }
    }
    grouped
        .into_iter()
        .map(|(area, kpi_count)| OperatingAreaSummary {
            operating_area: area.to_string(),
            kpi_count,
        })
        .collect()
}

impl CatalogSnapshot {
    /// Build the snapshot. Records without an id are dropped; for duplicate
    /// ids the last record wins in the lookup maps.
    pub fn build(kpis: Vec<Kpi>, municipalities: Vec<Municipality>) -> Self {
        let kpis: Vec<Kpi> = kpis.into_iter().filter(|k| !k.id.is_empty()).collect();
        let municipalities: Vec<Municipality> =
            municipalities.into_iter().filter(|m| !m.id.is_empty()).collect();

        let kpi_map = kpis.iter().map(|k| (k.id.clone(), k.clone())).collect();
        let municipality_map = municipalities
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect();
        let search_index = kpis.iter().map(SearchEntry::from_kpi).collect();
        let operating_areas = summarize_operating_areas(&kpis);

        CatalogSnapshot {
            kpis,
            kpi_map,
            municipalities,
            municipality_map,
            search_index,
            operating_areas,
            loaded_at: Utc::now(),
        }
    }

    pub fn kpis(&self) -> &[Kpi] {
        &self.kpis
    }

    pub fn municipalities(&self) -> &[Municipality] {
        &self.municipalities
    }

    pub fn search_index(&self) -> &[SearchEntry] {
        &self.search_index
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn kpi(&self, id: &str) -> Option<&Kpi> {
        self.kpi_map.get(id)
    }

    pub fn municipality(&self, id: &str) -> Option<&Municipality> {
        self.municipality_map.get(id)
    }

    pub fn municipality_title(&self, id: &str) -> Option<&str> {
        self.municipality(id).map(|m| m.title.as_str())
    }

    pub fn list_operating_areas(&self) -> &[OperatingAreaSummary] {
        &self.operating_areas
    }

    /// KPIs tagged with `area` (case-insensitive, exact match against any of
    /// the KPI's comma-separated areas).
    pub fn kpis_by_operating_area(&self, area: &str) -> Vec<&Kpi> {
        let target = area.trim().to_lowercase();
        self.kpis
            .iter()
            .filter(|k| {
                let field = k.operating_area.to_lowercase();
                let areas: HashSet<&str> = split_areas(&field).collect();
                areas.contains(target.as_str())
            })
            .collect()
    }

    pub fn kpi_metadata(&self, id: &str) -> Result<&Kpi, AnalysisError> {
        self.kpi(id).ok_or_else(|| {
            AnalysisError::NotFound(format!("No KPI metadata found in cache for ID: {}", id))
        })
    }

    /// Municipality ids of the given type in catalog order; all ids when no
    /// type is given.
    pub fn municipality_ids(&self, kind: Option<&str>) -> Vec<String> {
        self.municipalities
            .iter()
            .filter(|m| kind.map_or(true, |k| m.kind == k))
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn list_municipalities(&self, kind: Option<&str>) -> Vec<MunicipalityListing> {
        let mut listing: Vec<MunicipalityListing> = self
            .municipality_map
            .values()
            .filter(|m| kind.map_or(true, |k| m.kind == k))
            .map(|m| MunicipalityListing {
                id: m.id.clone(),
                name: if m.title.is_empty() {
                    format!("Municipality {}", m.id)
                } else {
                    m.title.clone()
                },
            })
            .collect();
        listing.sort_by(|a, b| a.id.cmp(&b.id));
        listing
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn kpi(id: &str, title: &str, area: &str) -> Kpi {
        Kpi {
            id: id.into(),
            title: title.into(),
            description: format!("{} description", title),
            operating_area: area.into(),
        }
    }

    pub(crate) fn municipality(id: &str, title: &str, kind: &str) -> Municipality {
        Municipality { id: id.into(), title: title.into(), kind: kind.into() }
    }

    fn sample() -> CatalogSnapshot {
        CatalogSnapshot::build(
            vec![
                kpi("N1", "Invånare", "Befolkning"),
                kpi("N2", "Förskola", "Förskola, Kostnader"),
                kpi("N3", "Skolresultat", "Grundskola,  kostnader ,"),
                kpi("", "Missing id", "Befolkning"),
            ],
            vec![
                municipality("0180", "Stockholm", "K"),
                municipality("0001", "Region Stockholm", "L"),
                municipality("1480", "", "K"),
            ],
        )
    }

    #[test]
    fn records_without_id_are_dropped() {
        let c = sample();
        assert_eq!(c.kpis().len(), 3);
        assert_eq!(c.search_index().len(), 3);
        assert!(c.kpi("").is_none());
    }

    #[test]
    fn operating_area_summary_is_sorted_and_trimmed() {
        let c = sample();
        let areas: Vec<(&str, usize)> = c
            .list_operating_areas()
            .iter()
            .map(|a| (a.operating_area.as_str(), a.kpi_count))
            .collect();
        assert_eq!(
            areas,
            vec![
                ("Befolkning", 1),
                ("Förskola", 1),
                ("Grundskola", 1),
                ("Kostnader", 1),
                ("kostnader", 1),
            ]
        );
    }

    #[test]
    fn kpis_by_area_is_case_insensitive() {
        let c = sample();
        let ids: Vec<&str> = c
            .kpis_by_operating_area(" KOSTNADER ")
            .iter()
            .map(|k| k.id.as_str())
            .collect();
        assert_eq!(ids, vec!["N2", "N3"]);
    }

    #[test]
    fn kpi_metadata_reports_unknown_ids() {
        let c = sample();
        assert_eq!(c.kpi_metadata("N1").unwrap().title, "Invånare");
        let err = c.kpi_metadata("X9").unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }

    #[test]
    fn list_municipalities_filters_and_sorts() {
        let c = sample();
        let list = c.list_municipalities(Some("K"));
        assert_eq!(
            list,
            vec![
                MunicipalityListing { id: "0180".into(), name: "Stockholm".into() },
                MunicipalityListing { id: "1480".into(), name: "Municipality 1480".into() },
            ]
        );
        assert_eq!(c.list_municipalities(None).len(), 3);
        assert_eq!(c.municipality_ids(Some("L")), vec!["0001"]);
    }
}
