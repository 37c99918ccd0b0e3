//! Analysis operations combining the catalog snapshot, the data fetcher and
//! the analytics modules. Every operation returns either a result or an
//! [`AnalysisFailure`] carrying the context gathered so far.

use crate::catalog::CatalogSnapshot;
use crate::correlation::{compare_series, ComparisonDetail};
use crate::error::{AnalysisError, AnalysisFailure, ComparisonHeader};
use crate::fetcher::DataFetcher;
use crate::grouping::{filter_by_type, group};
use crate::ranking::{rank_slice, summary_stats, SortOrder};
use crate::threshold::{self, ThresholdOperator};
use crate::trend::{display_name, flat_with_delta, trend_entries};
use crate::types::{
    DeltaEntry, Kpi, MunicipalitySeries, RawResponse, SummaryStats, ThresholdMatch, TrendEntry,
};
use crate::util::split_list;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    pub kpi_id: String,
    /// Comma-separated years, e.g. `"2019,2020"`.
    pub year: String,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub gender: String,
    pub only_return_rate: bool,
    pub municipality_type: Option<String>,
    /// Comma-separated ids. When set, the result is a per-municipality list
    /// instead of rankings.
    pub municipality_ids: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(kpi_id: &str, year: &str) -> Self {
        AnalyzeRequest {
            kpi_id: kpi_id.to_string(),
            year: year.to_string(),
            sort_order: SortOrder::Desc,
            limit: 10,
            gender: "T".to_string(),
            only_return_rate: false,
            municipality_type: Some("K".to_string()),
            municipality_ids: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareRequest {
    pub kpi1_id: String,
    pub kpi2_id: String,
    pub year: String,
    pub gender: String,
    pub municipality_type: Option<String>,
    pub municipality_ids: Option<String>,
}

impl CompareRequest {
    pub fn new(kpi1_id: &str, kpi2_id: &str, year: &str) -> Self {
        CompareRequest {
            kpi1_id: kpi1_id.to_string(),
            kpi2_id: kpi2_id.to_string(),
            year: year.to_string(),
            gender: "T".to_string(),
            municipality_type: Some("K".to_string()),
            municipality_ids: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub kpi_id: String,
    pub cutoff: f64,
    pub operator: ThresholdOperator,
    pub year: Option<String>,
    pub municipality_type: Option<String>,
    pub gender: String,
}

impl FilterRequest {
    pub fn new(kpi_id: &str, cutoff: f64, operator: ThresholdOperator) -> Self {
        FilterRequest {
            kpi_id: kpi_id.to_string(),
            cutoff,
            operator,
            year: None,
            municipality_type: Some("K".to_string()),
            gender: "T".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingView {
    pub summary_stats: SummaryStats,
    pub top_municipalities: Vec<TrendEntry>,
    pub bottom_municipalities: Vec<TrendEntry>,
    pub median_municipalities: Vec<TrendEntry>,
    pub top_delta_municipalities: Vec<DeltaEntry>,
    pub bottom_delta_municipalities: Vec<DeltaEntry>,
    pub median_delta_municipalities: Vec<DeltaEntry>,
    pub multi_year_delta: bool,
    pub only_return_rate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisView {
    Municipalities { municipalities_data: Vec<MunicipalitySeries> },
    Ranking(RankingView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiAnalysis {
    pub kpi_info: Kpi,
    pub selected_years: Vec<String>,
    pub selected_gender: String,
    pub municipalities_count: usize,
    #[serde(flatten)]
    pub view: AnalysisView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiComparison {
    #[serde(flatten)]
    pub header: ComparisonHeader,
    #[serde(flatten)]
    pub detail: ComparisonDetail,
}

/// Empty strings mean "no type filter".
fn type_filter(kind: &Option<String>) -> Option<&str> {
    kind.as_deref().filter(|k| !k.is_empty())
}

pub struct AnalysisEngine<'a, F> {
    catalog: &'a CatalogSnapshot,
    fetcher: F,
}

impl<'a, F: DataFetcher> AnalysisEngine<'a, F> {
    pub fn new(catalog: &'a CatalogSnapshot, fetcher: F) -> Self {
        AnalysisEngine { catalog, fetcher }
    }

    fn kpi_info(&self, kpi_id: &str) -> Kpi {
        self.catalog.kpi(kpi_id).cloned().unwrap_or_else(|| Kpi::unknown(kpi_id))
    }

    /// Catalog KPIs matching `keyword`, most relevant first.
    pub fn search_kpis(&self, keyword: &str, limit: usize) -> Vec<Kpi> {
        let ids = crate::search::search(keyword, self.catalog.search_index(), limit);
        debug!(keyword, hits = ids.len(), "kpi search");
        ids.iter()
            .filter_map(|id| self.catalog.kpi(id).cloned())
            .collect()
    }

    /// Validate the municipality list against the catalog, then fetch and
    /// attach municipality names to the rows.
    pub fn fetch_data(
        &self,
        kpi_id: &str,
        municipality_ids: &str,
        year: Option<&str>,
        municipality_type: Option<&str>,
    ) -> Result<RawResponse, AnalysisError> {
        let ids = split_list(municipality_ids);
        if ids.is_empty() {
            return Err(AnalysisError::Validation("No valid municipality ID provided.".to_string()));
        }
        for id in &ids {
            let Some(m) = self.catalog.municipality(id) else {
                return Err(AnalysisError::NotFound(format!(
                    "Municipality ID '{}' not found in system.",
                    id
                )));
            };
            if let Some(kind) = municipality_type.filter(|k| !k.is_empty()) {
                if m.kind != kind {
                    return Err(AnalysisError::NotFound(format!(
                        "Municipality '{}' is not type '{}'.",
                        id, kind
                    )));
                }
            }
        }

        let year = year.filter(|y| !y.trim().is_empty());
        let mut data = self.fetcher.fetch_raw(kpi_id, &ids, year).map_err(|e| {
            warn!(kpi_id, error = %e, "fetch failed");
            AnalysisError::from(e)
        })?;
        for item in &mut data.values {
            let id = item.municipality.as_deref().unwrap_or("Unknown");
            item.municipality_name = Some(display_name(self.catalog, id));
        }
        Ok(data)
    }

    /// Municipality ids requested explicitly, or every catalog municipality
    /// of the requested type.
    fn resolve_ids(&self, explicit: &Option<String>, kind: Option<&str>) -> String {
        match explicit.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(ids) => ids.to_string(),
            None => self.catalog.municipality_ids(kind).join(","),
        }
    }

    /// Rank municipalities on a KPI's latest value and on its change over
    /// the requested years. With explicit municipality ids the per-municipality
    /// series are returned instead.
    pub fn analyze_kpi(&self, req: &AnalyzeRequest) -> Result<KpiAnalysis, AnalysisFailure> {
        let kpi_info = self.kpi_info(&req.kpi_id);
        let fail = |err: AnalysisError| AnalysisFailure::from(err).with_kpi(kpi_info.clone());

        let years = split_list(&req.year);
        if years.is_empty() {
            return Err(fail(AnalysisError::Validation("No valid year specified.".to_string())));
        }
        let kind = type_filter(&req.municipality_type);
        let ids = self.resolve_ids(&req.municipality_ids, kind);
        let data = self
            .fetch_data(&req.kpi_id, &ids, Some(req.year.as_str()), kind)
            .map_err(fail)?;

        let series = filter_by_type(group(&data.values, &req.gender), self.catalog, kind);

        if req.municipality_ids.as_deref().map_or(false, |s| !s.trim().is_empty()) {
            let list = flat_with_delta(&series, &years, self.catalog);
            info!(kpi_id = %req.kpi_id, municipalities = list.len(), "kpi series");
            return Ok(KpiAnalysis {
                kpi_info,
                selected_years: years,
                selected_gender: req.gender.clone(),
                municipalities_count: list.len(),
                view: AnalysisView::Municipalities { municipalities_data: list },
            });
        }

        let mut sorted_years = years.clone();
        sorted_years.sort();
        let trends = trend_entries(&series, &sorted_years, self.catalog);
        let latest_values: Vec<f64> = trends.latest.iter().map(|t| t.latest_value).collect();

        let main = rank_slice(&trends.latest, |t| t.latest_value, req.sort_order, req.limit);
        let delta = rank_slice(&trends.deltas, |d| d.delta_value, req.sort_order, req.limit);
        info!(
            kpi_id = %req.kpi_id,
            municipalities = trends.latest.len(),
            deltas = trends.deltas.len(),
            "kpi ranking"
        );

        Ok(KpiAnalysis {
            kpi_info,
            selected_gender: req.gender.clone(),
            municipalities_count: trends.latest.len(),
            view: AnalysisView::Ranking(RankingView {
                summary_stats: summary_stats(&latest_values),
                top_municipalities: main.top,
                bottom_municipalities: main.bottom,
                median_municipalities: main.median,
                top_delta_municipalities: delta.top,
                bottom_delta_municipalities: delta.bottom,
                median_delta_municipalities: delta.median,
                multi_year_delta: sorted_years.len() > 1,
                only_return_rate: req.only_return_rate,
            }),
            selected_years: years,
        })
    }

    /// Compare two KPIs: differences for a single year, correlations when
    /// several years are requested.
    pub fn compare_kpis(&self, req: &CompareRequest) -> Result<KpiComparison, AnalysisFailure> {
        let years = split_list(&req.year);
        let kind = type_filter(&req.municipality_type);
        let header = ComparisonHeader {
            kpi1_info: self.kpi_info(&req.kpi1_id),
            kpi2_info: self.kpi_info(&req.kpi2_id),
            selected_years: years.clone(),
            gender: req.gender.clone(),
            municipality_type: kind.map(str::to_string),
            multi_year: years.len() > 1,
        };
        let fail = |err: AnalysisError| AnalysisFailure::from(err).with_comparison(header.clone());

        let ids = self.resolve_ids(&req.municipality_ids, kind);
        let year = Some(req.year.as_str());
        let data1 = self.fetch_data(&req.kpi1_id, &ids, year, kind).map_err(fail)?;
        let data2 = self.fetch_data(&req.kpi2_id, &ids, year, kind).map_err(fail)?;

        let g1 = filter_by_type(group(&data1.values, &req.gender), self.catalog, kind);
        let g2 = filter_by_type(group(&data2.values, &req.gender), self.catalog, kind);

        let detail = compare_series(&g1, &g2, &years).map_err(|e| {
            info!(kpi1 = %req.kpi1_id, kpi2 = %req.kpi2_id, error = %e, "comparison failed");
            fail(e)
        })?;
        Ok(KpiComparison { header, detail })
    }

    /// Municipalities of the requested type whose latest (or year-pinned)
    /// value is strictly above/below the cutoff.
    pub fn filter_municipalities_by_kpi(
        &self,
        req: &FilterRequest,
    ) -> Result<Vec<ThresholdMatch>, AnalysisFailure> {
        let kind = type_filter(&req.municipality_type);
        let ids = self.catalog.municipality_ids(kind);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let year = req.year.as_deref().map(str::trim).filter(|y| !y.is_empty());
        let data = self
            .fetch_data(&req.kpi_id, &ids.join(","), year, None)
            .map_err(|e| AnalysisFailure::from(e).with_kpi(self.kpi_info(&req.kpi_id)))?;

        let matches = threshold::filter(
            &data.values,
            req.cutoff,
            req.operator,
            &req.gender,
            year,
            self.catalog,
        );
        info!(kpi_id = %req.kpi_id, matches = matches.len(), "threshold filter");
        Ok(matches)
    }
}
