use crate::catalog::CatalogSnapshot;
use crate::config::DataPaths;
use crate::error::LoadError;
use crate::fetcher::SnapshotFetcher;
use crate::types::{Kpi, Municipality, ValueRecord};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub kpis: usize,
    pub municipalities: usize,
    pub value_rows: usize,
    pub parse_errors: usize,
}

/// Either a page as served by the API (`{"values": [...]}`) or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document<T> {
    Page { values: Vec<T> },
    List(Vec<T>),
}

impl<T> Document<T> {
    fn into_values(self) -> Vec<T> {
        match self {
            Document::Page { values } => values,
            Document::List(values) => values,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, LoadError> {
    let text = std::fs::read_to_string(path)?;
    let doc: Document<T> = serde_json::from_str(&text)?;
    Ok(doc.into_values())
}

pub fn load_kpis(path: &Path) -> Result<Vec<Kpi>, LoadError> {
    read_json(path)
}

pub fn load_values(path: &Path) -> Result<Vec<ValueRecord>, LoadError> {
    read_json(path)
}

/// Municipalities from a CSV with `id,title,type` headers. Rows that fail
/// to parse are counted and skipped.
pub fn load_municipalities(path: &Path) -> Result<(Vec<Municipality>, usize), LoadError> {
    let mut rdr = ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_path(path)?;
    let mut parse_errors = 0usize;
    let mut out = Vec::new();

    for result in rdr.deserialize::<Municipality>() {
        match result {
            Ok(m) if !m.id.is_empty() => out.push(m),
            Ok(_) => parse_errors += 1,
            Err(e) => {
                warn!(error = %e, "skipping municipality row");
                parse_errors += 1;
            }
        }
    }
    Ok((out, parse_errors))
}

/// Load catalogs and the values export, and build the snapshot the engine
/// runs against.
pub fn load_snapshot(
    paths: &DataPaths,
) -> Result<(CatalogSnapshot, SnapshotFetcher, LoadReport), LoadError> {
    let kpis = load_kpis(&paths.kpis)?;
    let (municipalities, parse_errors) = load_municipalities(&paths.municipalities)?;
    let values = load_values(&paths.values)?;

    let catalog = CatalogSnapshot::build(kpis, municipalities);
    let report = LoadReport {
        kpis: catalog.kpis().len(),
        municipalities: catalog.municipalities().len(),
        value_rows: values.len(),
        parse_errors,
    };
    info!(
        kpis = report.kpis,
        municipalities = report.municipalities,
        value_rows = report.value_rows,
        "catalog snapshot loaded"
    );
    Ok((catalog, SnapshotFetcher::new(values), report))
}
