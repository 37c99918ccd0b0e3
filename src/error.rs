//! Error types.
//!
//! Analysis failures are values: every engine operation returns
//! `Result<_, AnalysisFailure>` and the failure serialises with an `error`
//! field next to whatever context had already been gathered.

use crate::types::Kpi;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Bad request parameters: empty query, no valid year, unknown operator.
    #[error("{0}")]
    Validation(String),

    /// Unknown KPI or municipality id, or a municipality of the wrong type.
    #[error("{0}")]
    NotFound(String),

    /// The data fetcher could not deliver rows for this call.
    #[error("{0}")]
    Fetch(String),

    /// Not enough overlapping data to compute the requested statistic.
    #[error("{0}")]
    InsufficientData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Fetch,
    InsufficientData,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Validation(_) => ErrorKind::Validation,
            AnalysisError::NotFound(_) => ErrorKind::NotFound,
            AnalysisError::Fetch(_) => ErrorKind::Fetch,
            AnalysisError::InsufficientData(_) => ErrorKind::InsufficientData,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

impl From<FetchError> for AnalysisError {
    fn from(err: FetchError) -> Self {
        AnalysisError::Fetch(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Header shared by every KPI comparison result, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonHeader {
    pub kpi1_info: Kpi,
    pub kpi2_info: Kpi,
    pub selected_years: Vec<String>,
    pub gender: String,
    pub municipality_type: Option<String>,
    pub multi_year: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FailureContext {
    Kpi { kpi_info: Kpi },
    Comparison(ComparisonHeader),
}

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{error}")]
pub struct AnalysisFailure {
    pub error: String,
    #[serde(rename = "error_kind")]
    pub kind: ErrorKind,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub context: Option<FailureContext>,
}

impl AnalysisFailure {
    pub fn with_kpi(self, kpi_info: Kpi) -> Self {
        AnalysisFailure { context: Some(FailureContext::Kpi { kpi_info }), ..self }
    }

    pub fn with_comparison(self, header: ComparisonHeader) -> Self {
        AnalysisFailure { context: Some(FailureContext::Comparison(header)), ..self }
    }
}

impl From<AnalysisError> for AnalysisFailure {
    fn from(err: AnalysisError) -> Self {
        AnalysisFailure { error: err.to_string(), kind: err.kind(), context: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_serialises_error_with_context() {
        let failure = AnalysisFailure::from(AnalysisError::Fetch("timeout".into()))
            .with_kpi(Kpi::unknown("N1"));
        let v = serde_json::to_value(&failure).unwrap();
        assert_eq!(v["error"], "timeout");
        assert_eq!(v["error_kind"], "fetch");
        assert_eq!(v["kpi_info"]["id"], "N1");
    }

    #[test]
    fn failure_without_context_has_only_error_fields() {
        let failure = AnalysisFailure::from(AnalysisError::Validation("bad".into()));
        let v = serde_json::to_value(&failure).unwrap();
        assert_eq!(v.as_object().unwrap().len(), 2);
    }

    #[test]
    fn fetch_error_maps_to_fetch_kind() {
        let err: AnalysisError = FetchError::Unavailable("down".into()).into();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert_eq!(err.to_string(), "Data source unavailable: down");
    }
}
