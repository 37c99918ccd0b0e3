use crate::util::format_cell;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

/// Per-municipality yearly values for one KPI and one gender split:
/// `municipality_id -> (year -> value)`.
pub type GroupedSeries = BTreeMap<String, BTreeMap<String, f64>>;

fn null_as_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Tabled)]
pub struct Kpi {
    #[serde(default, deserialize_with = "null_as_empty")]
    #[tabled(rename = "Id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[tabled(rename = "Title")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[tabled(skip)]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[tabled(rename = "OperatingArea")]
    pub operating_area: String,
}

impl Kpi {
    /// Placeholder info for an id the catalog does not know about.
    pub fn unknown(id: &str) -> Self {
        Kpi { id: id.to_string(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Municipality {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub kind: String,
}

/// The `period` of a raw row. The upstream API sends integers, but string
/// years show up in older exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Period {
    Year(i64),
    Label(String),
}

impl Period {
    /// String form used as the year key in grouped series.
    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn numeric(&self) -> Option<f64> {
        match self {
            Period::Year(y) => Some(*y as f64),
            Period::Label(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Numeric comparison when both sides are numbers, string order otherwise.
    pub fn is_later_than(&self, other: &Period) -> bool {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a > b,
            _ => self.key() > other.key(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Year(y) => write!(f, "{}", y),
            Period::Label(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenderValue {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub gender: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// One raw row as returned by the data fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub values: Vec<GenderValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub values: Vec<ValueRecord>,
}

/// Anything that can be placed in a ranking: it needs a stable id for
/// tie-breaking.
pub trait Ranked {
    fn rank_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct TrendEntry {
    #[tabled(rename = "Municipality")]
    pub municipality_id: String,
    #[tabled(rename = "Name")]
    pub municipality_name: String,
    #[tabled(rename = "LatestYear")]
    pub latest_year: String,
    #[tabled(rename = "LatestValue", display_with = "format_cell")]
    pub latest_value: f64,
    #[tabled(skip)]
    pub years_in_data: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DeltaEntry {
    #[tabled(rename = "Municipality")]
    pub municipality_id: String,
    #[tabled(rename = "Name")]
    pub municipality_name: String,
    #[tabled(rename = "EarliestYear")]
    pub earliest_year: String,
    #[tabled(rename = "EarliestValue", display_with = "format_cell")]
    pub earliest_value: f64,
    #[tabled(rename = "LatestYear")]
    pub latest_year: String,
    #[tabled(rename = "LatestValue", display_with = "format_cell")]
    pub latest_value: f64,
    #[tabled(rename = "Delta", display_with = "format_cell")]
    pub delta_value: f64,
}

/// Data for one explicitly requested municipality. Trend fields are only
/// present when enough years were available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalitySeries {
    pub municipality_id: String,
    pub municipality_name: String,
    pub data: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DifferenceEntry {
    #[tabled(rename = "Municipality")]
    pub municipality_id: String,
    #[tabled(rename = "Kpi1", display_with = "format_cell")]
    pub kpi1_value: f64,
    #[tabled(rename = "Kpi2", display_with = "format_cell")]
    pub kpi2_value: f64,
    #[tabled(rename = "Difference", display_with = "format_cell")]
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CorrelationEntry {
    #[tabled(rename = "Municipality")]
    pub municipality_id: String,
    #[tabled(rename = "Correlation", display_with = "format_cell")]
    pub correlation: f64,
    #[tabled(skip)]
    pub years_used: Vec<String>,
    #[tabled(rename = "Years")]
    pub n_years: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ThresholdMatch {
    #[tabled(rename = "Municipality")]
    pub municipality_id: String,
    #[tabled(rename = "Name")]
    pub municipality_name: String,
    #[tabled(rename = "Period")]
    pub period: Period,
    #[tabled(rename = "Value", display_with = "format_cell")]
    pub value: f64,
    #[tabled(rename = "Cutoff", display_with = "format_cell")]
    pub cutoff: f64,
    #[tabled(rename = "Difference", display_with = "format_cell")]
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct OperatingAreaSummary {
    #[tabled(rename = "OperatingArea")]
    pub operating_area: String,
    #[tabled(rename = "KpiCount")]
    pub kpi_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct MunicipalityListing {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub count: usize,
}

impl Ranked for TrendEntry {
    fn rank_id(&self) -> &str {
        &self.municipality_id
    }
}

impl Ranked for DeltaEntry {
    fn rank_id(&self) -> &str {
        &self.municipality_id
    }
}

impl Ranked for DifferenceEntry {
    fn rank_id(&self) -> &str {
        &self.municipality_id
    }
}

impl Ranked for CorrelationEntry {
    fn rank_id(&self) -> &str {
        &self.municipality_id
    }
}
