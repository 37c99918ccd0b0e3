//! Pairwise KPI comparison: per-municipality differences for a single
//! year, Pearson correlations across years otherwise.

use crate::error::AnalysisError;
use crate::ranking::{sort_ranked, window, SortOrder};
use crate::types::{CorrelationEntry, DifferenceEntry, GroupedSeries};
use serde::Serialize;
use tracing::debug;

/// Window size for comparison rankings.
const COMPARISON_WINDOW: usize = 10;

/// Pearson correlation coefficient.
///
/// `None` for fewer than two pairs, mismatched lengths, or when either
/// sequence is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 || n != ys.len() || is_constant(xs) || is_constant(ys) {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let r = sxy / (sxx * syy).sqrt();
    r.is_finite().then_some(r)
}

// The mean of a constant non-integer sequence can round away from its
// values, so variance is not a reliable zero test.
fn is_constant(vs: &[f64]) -> bool {
    vs.iter().all(|v| *v == vs[0])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleYearComparison {
    pub municipality_differences: Vec<DifferenceEntry>,
    pub top_difference_municipalities: Vec<DifferenceEntry>,
    pub bottom_difference_municipalities: Vec<DifferenceEntry>,
    pub median_difference_municipalities: Vec<DifferenceEntry>,
    /// Correlation of the difference list with itself: 1.0, or `None` when
    /// all differences are equal or there is only one.
    pub overall_correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiYearComparison {
    pub municipality_correlations: Vec<CorrelationEntry>,
    pub top_correlation_municipalities: Vec<CorrelationEntry>,
    pub bottom_correlation_municipalities: Vec<CorrelationEntry>,
    pub median_correlation_municipalities: Vec<CorrelationEntry>,
    /// Correlation over every (kpi1, kpi2) pair pooled across qualifying
    /// municipalities.
    pub overall_correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComparisonDetail {
    SingleYear(SingleYearComparison),
    MultiYear(MultiYearComparison),
}

/// Differences `kpi2 - kpi1` for every municipality with a value for
/// `year` in both series.
pub fn compare_single_year(
    g1: &GroupedSeries,
    g2: &GroupedSeries,
    year: &str,
) -> Result<SingleYearComparison, AnalysisError> {
    let entries: Vec<DifferenceEntry> = g1
        .iter()
        .filter_map(|(id, vals1)| {
            let v1 = *vals1.get(year)?;
            let v2 = *g2.get(id)?.get(year)?;
            Some(DifferenceEntry {
                municipality_id: id.clone(),
                kpi1_value: v1,
                kpi2_value: v2,
                difference: v2 - v1,
            })
        })
        .collect();

    if entries.is_empty() {
        return Err(AnalysisError::InsufficientData(format!(
            "No overlapping data for single year {}.",
            year
        )));
    }

    let sorted = sort_ranked(&entries, |e| e.difference, SortOrder::Asc);
    let diffs: Vec<f64> = sorted.iter().map(|e| e.difference).collect();
    let slice = window(&sorted, COMPARISON_WINDOW);
    debug!(year, municipalities = sorted.len(), "single-year comparison");

    Ok(SingleYearComparison {
        // Ascending list: the window's bottom holds the largest differences.
        top_difference_municipalities: slice.bottom,
        bottom_difference_municipalities: slice.top,
        median_difference_municipalities: slice.median,
        overall_correlation: pearson(&diffs, &diffs),
        municipality_differences: sorted,
    })
}

/// Per-municipality correlation over the years both series share, plus an
/// aggregate correlation over all pooled pairs.
pub fn compare_multi_year(
    g1: &GroupedSeries,
    g2: &GroupedSeries,
) -> Result<MultiYearComparison, AnalysisError> {
    let mut correlations: Vec<CorrelationEntry> = Vec::new();
    let mut pooled_x: Vec<f64> = Vec::new();
    let mut pooled_y: Vec<f64> = Vec::new();

    for (id, vals1) in g1 {
        let Some(vals2) = g2.get(id) else {
            continue;
        };
        // BTreeMap keys come out sorted.
        let years: Vec<&String> = vals1.keys().filter(|y| vals2.contains_key(*y)).collect();
        if years.len() < 2 {
            continue;
        }
        let xs: Vec<f64> = years.iter().map(|y| vals1[*y]).collect();
        let ys: Vec<f64> = years.iter().map(|y| vals2[*y]).collect();
        let Some(r) = pearson(&xs, &ys) else {
            continue;
        };
        correlations.push(CorrelationEntry {
            municipality_id: id.clone(),
            correlation: r,
            n_years: years.len(),
            years_used: years.into_iter().cloned().collect(),
        });
        pooled_x.extend(xs);
        pooled_y.extend(ys);
    }

    if correlations.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "No municipality had 2+ overlapping data points to compute correlation.".to_string(),
        ));
    }

    let sorted = sort_ranked(&correlations, |e| e.correlation, SortOrder::Asc);
    let slice = window(&sorted, COMPARISON_WINDOW);
    debug!(municipalities = sorted.len(), pairs = pooled_x.len(), "multi-year comparison");

    Ok(MultiYearComparison {
        top_correlation_municipalities: slice.bottom,
        bottom_correlation_municipalities: slice.top,
        median_correlation_municipalities: slice.median,
        overall_correlation: pearson(&pooled_x, &pooled_y),
        municipality_correlations: sorted,
    })
}

/// Single-year mode for exactly one requested year, multi-year otherwise.
pub fn compare_series(
    g1: &GroupedSeries,
    g2: &GroupedSeries,
    years: &[String],
) -> Result<ComparisonDetail, AnalysisError> {
    match years {
        [] => Err(AnalysisError::Validation(
            "No valid year specified for single-year analysis.".to_string(),
        )),
        [year] => compare_single_year(g1, g2, year).map(ComparisonDetail::SingleYear),
        _ => compare_multi_year(g1, g2).map(ComparisonDetail::MultiYear),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn series(data: &[(&str, &[(&str, f64)])]) -> GroupedSeries {
        data.iter()
            .map(|(m, ys)| {
                (m.to_string(), ys.iter().map(|(y, v)| (y.to_string(), *v)).collect())
            })
            .collect()
    }

    #[test]
    fn pearson_identity_and_inverse() {
        let xs = [1.0, 2.0, 4.0, 7.0];
        let inv: Vec<f64> = xs.iter().map(|x| -x).collect();
        assert!((pearson(&xs, &xs).unwrap() - 1.0).abs() < EPS);
        assert!((pearson(&xs, &inv).unwrap() + 1.0).abs() < EPS);
    }

    #[test]
    fn pearson_degenerate_inputs() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[3.0]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), None);
    }

    #[test]
    fn pearson_constant_fractional_series() {
        assert_eq!(pearson(&[0.1; 3], &[1.0, 2.0, 4.0]), None);
        let ramp: Vec<f64> = (0..7).map(f64::from).collect();
        for c in [0.1, 0.7, 1.1, 12.3, 33.3, 98.6] {
            for n in 3..8 {
                assert_eq!(pearson(&vec![c; n], &ramp[..n]), None, "constant {} n={}", c, n);
                assert_eq!(pearson(&ramp[..n], &vec![c; n]), None, "constant {} n={}", c, n);
            }
        }
    }

    #[test]
    fn pearson_known_value() {
        // sxy = 6, sxx = 10, syy = 6
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [2.0, 4.0, 5.0, 4.0, 5.0];
        let r = pearson(&xs, &ys).unwrap();
        assert!((r - 0.7745966692414834).abs() < 1e-9);
    }

    #[test]
    fn single_year_orders_differences() {
        let g1 = series(&[
            ("A", &[("2020", 10.0)]),
            ("B", &[("2020", 10.0)]),
            ("C", &[("2020", 10.0)]),
            ("D", &[("2019", 10.0)]),
        ]);
        let g2 = series(&[
            ("A", &[("2020", 15.0)]),
            ("B", &[("2020", 4.0)]),
            ("C", &[("2020", 11.0)]),
            ("D", &[("2019", 11.0)]),
        ]);
        let c = compare_single_year(&g1, &g2, "2020").unwrap();
        let ids = |v: &[DifferenceEntry]| {
            v.iter().map(|e| e.municipality_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&c.municipality_differences), vec!["B", "C", "A"]);
        assert_eq!(ids(&c.top_difference_municipalities), vec!["A", "C", "B"]);
        assert_eq!(ids(&c.bottom_difference_municipalities), vec!["B", "C", "A"]);
        assert_eq!(ids(&c.median_difference_municipalities), vec!["B", "C", "A"]);
        assert_eq!(c.top_difference_municipalities[0].difference, 5.0);
        assert!((c.overall_correlation.unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn single_year_without_overlap_is_an_error() {
        let g1 = series(&[("A", &[("2020", 1.0)])]);
        let g2 = series(&[("B", &[("2020", 1.0)])]);
        let err = compare_single_year(&g1, &g2, "2020").unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientData("No overlapping data for single year 2020.".into())
        );
    }

    #[test]
    fn single_year_with_equal_differences_has_no_overall() {
        let g1 = series(&[("A", &[("2020", 1.0)]), ("B", &[("2020", 2.0)])]);
        let g2 = series(&[("A", &[("2020", 2.0)]), ("B", &[("2020", 3.0)])]);
        let c = compare_single_year(&g1, &g2, "2020").unwrap();
        assert_eq!(c.overall_correlation, None);
    }

    #[test]
    fn multi_year_ranks_and_pools() {
        let g1 = series(&[
            ("A", &[("2018", 1.0), ("2019", 2.0), ("2020", 3.0)]),
            ("B", &[("2018", 1.0), ("2019", 2.0), ("2020", 3.0)]),
            ("C", &[("2019", 5.0), ("2020", 5.0)]),
            ("D", &[("2020", 1.0)]),
        ]);
        let g2 = series(&[
            ("A", &[("2018", 10.0), ("2019", 20.0), ("2020", 30.0)]),
            ("B", &[("2018", 3.0), ("2019", 2.0), ("2020", 1.0)]),
            ("C", &[("2019", 1.0), ("2020", 2.0)]),
            ("D", &[("2019", 1.0), ("2020", 2.0)]),
        ]);
        let c = compare_multi_year(&g1, &g2).unwrap();
        // C is constant in kpi1, D has a single shared year.
        assert_eq!(c.municipality_correlations.len(), 2);
        assert_eq!(c.top_correlation_municipalities[0].municipality_id, "A");
        assert_eq!(c.bottom_correlation_municipalities[0].municipality_id, "B");
        assert_eq!(c.top_correlation_municipalities[0].years_used, vec!["2018", "2019", "2020"]);
        assert_eq!(c.top_correlation_municipalities[0].n_years, 3);

        let pooled = pearson(
            &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0],
            &[10.0, 20.0, 30.0, 3.0, 2.0, 1.0],
        );
        assert_eq!(c.overall_correlation, pooled);
    }

    #[test]
    fn multi_year_without_qualifying_municipality_is_an_error() {
        let g1 = series(&[("A", &[("2019", 1.0), ("2020", 1.0)])]);
        let g2 = series(&[("A", &[("2019", 1.0), ("2020", 2.0)])]);
        assert!(matches!(
            compare_multi_year(&g1, &g2),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn multi_year_skips_constant_fractional_series() {
        let g1 = series(&[
            ("A", &[("2018", 12.3), ("2019", 12.3), ("2020", 12.3)]),
            ("B", &[("2018", 1.0), ("2019", 2.0), ("2020", 4.0)]),
        ]);
        let g2 = series(&[
            ("A", &[("2018", 1.0), ("2019", 2.0), ("2020", 4.0)]),
            ("B", &[("2018", 2.0), ("2019", 4.0), ("2020", 8.0)]),
        ]);
        let c = compare_multi_year(&g1, &g2).unwrap();
        assert_eq!(c.municipality_correlations.len(), 1);
        assert_eq!(c.municipality_correlations[0].municipality_id, "B");
        assert_eq!(c.overall_correlation, pearson(&[1.0, 2.0, 4.0], &[2.0, 4.0, 8.0]));

        let only_constant = series(&[("A", &[("2018", 0.1), ("2019", 0.1), ("2020", 0.1)])]);
        assert!(matches!(
            compare_multi_year(&only_constant, &g2),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn mode_follows_year_count() {
        let g = series(&[
            ("A", &[("2019", 1.0), ("2020", 2.0)]),
            ("B", &[("2019", 3.0), ("2020", 1.0)]),
        ]);
        let one = compare_series(&g, &g, &["2020".to_string()]).unwrap();
        assert!(matches!(one, ComparisonDetail::SingleYear(_)));
        let two = compare_series(&g, &g, &["2019".to_string(), "2020".to_string()]).unwrap();
        assert!(matches!(two, ComparisonDetail::MultiYear(_)));
        assert!(matches!(compare_series(&g, &g, &[]), Err(AnalysisError::Validation(_))));
    }
}
