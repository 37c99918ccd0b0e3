//! Cutoff filtering on the most recent (or a pinned) value per municipality.

use crate::catalog::CatalogSnapshot;
use crate::error::AnalysisError;
use crate::types::{ThresholdMatch, ValueRecord};
use crate::util::parse_value;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOperator {
    Above,
    Below,
}

impl ThresholdOperator {
    /// Strict comparison; a value equal to the cutoff never matches.
    pub fn accepts(self, value: f64, cutoff: f64) -> bool {
        match self {
            ThresholdOperator::Above => value > cutoff,
            ThresholdOperator::Below => value < cutoff,
        }
    }
}

impl FromStr for ThresholdOperator {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "above" => Ok(ThresholdOperator::Above),
            "below" => Ok(ThresholdOperator::Below),
            other => Err(AnalysisError::Validation(format!(
                "Unknown operator '{}'. Use 'above' or 'below'.",
                other
            ))),
        }
    }
}

/// Pick one row per municipality: the one for `year` when given, otherwise
/// the one with the greatest period.
fn select_rows<'a>(
    rows: &'a [ValueRecord],
    year: Option<&str>,
) -> HashMap<&'a str, &'a ValueRecord> {
    let mut selected: HashMap<&str, &ValueRecord> = HashMap::new();
    for rec in rows {
        let (Some(m_id), Some(period)) = (rec.municipality.as_deref(), rec.period.as_ref())
        else {
            continue;
        };
        match year {
            Some(year) => {
                if period.key() == year {
                    selected.insert(m_id, rec);
                }
            }
            None => {
                let later = selected
                    .get(m_id)
                    .and_then(|cur| cur.period.as_ref())
                    .map_or(true, |cur| period.is_later_than(cur));
                if later {
                    selected.insert(m_id, rec);
                }
            }
        }
    }
    selected
}

/// Value of the first sub-value for `gender`; a null there is not replaced
/// by later entries.
fn gender_value(rec: &ValueRecord, gender: &str) -> Option<f64> {
    rec.values
        .iter()
        .find(|v| v.gender == gender)
        .and_then(|v| v.value.as_ref())
        .and_then(parse_value)
}

/// Municipalities whose selected value is strictly above/below `cutoff`,
/// ordered by municipality id.
pub fn filter(
    rows: &[ValueRecord],
    cutoff: f64,
    operator: ThresholdOperator,
    gender: &str,
    year: Option<&str>,
    catalog: &CatalogSnapshot,
) -> Vec<ThresholdMatch> {
    let mut matches: Vec<ThresholdMatch> = select_rows(rows, year)
        .into_iter()
        .filter_map(|(m_id, rec)| {
            let value = gender_value(rec, gender)?;
            if !operator.accepts(value, cutoff) {
                return None;
            }
            let municipality_name = match catalog.municipality_title(m_id) {
                Some(title) if !title.is_empty() => title.to_string(),
                _ => format!("Municipality {}", m_id),
            };
            Some(ThresholdMatch {
                municipality_id: m_id.to_string(),
                municipality_name,
                period: rec.period.clone()?,
                value,
                cutoff,
                difference: value - cutoff,
            })
        })
        .collect();
    matches.sort_by(|a, b| a.municipality_id.cmp(&b.municipality_id));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::municipality;
    use crate::types::{GenderValue, Period};
    use serde_json::{json, Value};

    fn row(m: &str, period: Period, values: &[(&str, Value)]) -> ValueRecord {
        ValueRecord {
            kpi: Some("N1".into()),
            municipality: Some(m.into()),
            period: Some(period),
            values: values
                .iter()
                .map(|(g, v)| GenderValue {
                    gender: g.to_string(),
                    value: if v.is_null() { None } else { Some(v.clone()) },
                })
                .collect(),
            municipality_name: None,
        }
    }

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::build(vec![], vec![municipality("A", "Alfa", "K")])
    }

    fn ids(m: &[ThresholdMatch]) -> Vec<&str> {
        m.iter().map(|x| x.municipality_id.as_str()).collect()
    }

    #[test]
    fn strictly_above_cutoff() {
        let rows = vec![
            row("C", Period::Year(2020), &[("T", json!(100))]),
            row("A", Period::Year(2020), &[("T", json!(150))]),
            row("B", Period::Year(2020), &[("T", json!(90))]),
        ];
        let res = filter(&rows, 100.0, ThresholdOperator::Above, "T", None, &catalog());
        assert_eq!(ids(&res), vec!["A"]);
        assert_eq!(res[0].difference, 50.0);
        assert_eq!(res[0].municipality_name, "Alfa");

        let below = filter(&rows, 100.0, ThresholdOperator::Below, "T", None, &catalog());
        assert_eq!(ids(&below), vec!["B"]);
        assert_eq!(below[0].difference, -10.0);
        assert_eq!(below[0].municipality_name, "Municipality B");
    }

    #[test]
    fn latest_period_is_compared_numerically() {
        let rows = vec![
            row("A", Period::Label("999".into()), &[("T", json!(500))]),
            row("A", Period::Year(1000), &[("T", json!(1))]),
            row("A", Period::Year(998), &[("T", json!(700))]),
        ];
        let res = filter(&rows, 100.0, ThresholdOperator::Below, "T", None, &catalog());
        assert_eq!(ids(&res), vec!["A"]);
        assert_eq!(res[0].period, Period::Year(1000));
    }

    #[test]
    fn pinned_year_only_uses_that_period() {
        let rows = vec![
            row("A", Period::Year(2019), &[("T", json!(150))]),
            row("A", Period::Year(2020), &[("T", json!(50))]),
            row("B", Period::Year(2020), &[("T", json!(150))]),
        ];
        let res = filter(&rows, 100.0, ThresholdOperator::Above, "T", Some("2019"), &catalog());
        assert_eq!(ids(&res), vec!["A"]);
        assert_eq!(res[0].period, Period::Year(2019));
    }

    #[test]
    fn first_gender_entry_wins_and_missing_is_excluded() {
        let rows = vec![
            row("A", Period::Year(2020), &[("T", Value::Null), ("T", json!(500))]),
            row("B", Period::Year(2020), &[("K", json!(500))]),
            row("C", Period::Year(2020), &[("T", json!("300"))]),
        ];
        let res = filter(&rows, 100.0, ThresholdOperator::Above, "T", None, &catalog());
        assert_eq!(ids(&res), vec!["C"]);
    }

    #[test]
    fn latest_row_without_value_excludes_municipality() {
        let rows = vec![
            row("A", Period::Year(2019), &[("T", json!(500))]),
            row("A", Period::Year(2020), &[("T", Value::Null)]),
        ];
        let res = filter(&rows, 100.0, ThresholdOperator::Above, "T", None, &catalog());
        assert!(res.is_empty());
    }

    #[test]
    fn operator_parsing() {
        assert_eq!("above".parse::<ThresholdOperator>().unwrap(), ThresholdOperator::Above);
        assert_eq!(" below ".parse::<ThresholdOperator>().unwrap(), ThresholdOperator::Below);
        assert!(matches!(
            "over".parse::<ThresholdOperator>(),
            Err(AnalysisError::Validation(_))
        ));
    }
}
