//! Keyword search over the KPI catalog.

use crate::types::Kpi;
use serde::Serialize;
use std::cmp::Ordering;

const WHOLE_QUERY_IN_TITLE: f64 = 5.0;
const WHOLE_QUERY_IN_DESCRIPTION: f64 = 2.0;
const TOKEN_IN_TITLE: f64 = 1.0;
const TOKEN_IN_DESCRIPTION: f64 = 0.5;

/// Lower-cased search fields for one KPI, built once with the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchEntry {
    pub id: String,
    pub title_lc: String,
    pub desc_lc: String,
}

impl SearchEntry {
    pub fn from_kpi(kpi: &Kpi) -> Self {
        SearchEntry {
            id: kpi.id.clone(),
            title_lc: kpi.title.to_lowercase(),
            desc_lc: kpi.description.to_lowercase(),
        }
    }
}

fn score_entry(query: &str, tokens: &[&str], entry: &SearchEntry) -> f64 {
    let mut score = 0.0;
    if entry.title_lc.contains(query) {
        score += WHOLE_QUERY_IN_TITLE;
    }
    if entry.desc_lc.contains(query) {
        score += WHOLE_QUERY_IN_DESCRIPTION;
    }
    for tok in tokens {
        if entry.title_lc.contains(tok) {
            score += TOKEN_IN_TITLE;
        } else if entry.desc_lc.contains(tok) {
            score += TOKEN_IN_DESCRIPTION;
        }
    }
    score
}

/// Score every index entry against `query`, best first.
///
/// Entries scoring zero are dropped; ties keep index order. An empty or
/// whitespace-only query matches nothing.
pub fn scored_search(query: &str, index: &[SearchEntry], limit: usize) -> Vec<(String, f64)> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    let tokens: Vec<&str> = query.split_whitespace().collect();

    let mut scored: Vec<(String, f64)> = index
        .iter()
        .filter(|entry| !entry.id.is_empty())
        .filter_map(|entry| {
            let score = score_entry(&query, &tokens, entry);
            (score > 0.0).then(|| (entry.id.clone(), score))
        })
        .collect();

    // Stable sort keeps index order among equal scores.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}

pub fn search(query: &str, index: &[SearchEntry], limit: usize) -> Vec<String> {
    scored_search(query, index, limit)
        .into_iter()
        .map(|(id, _)| id)
        .collect()
}
