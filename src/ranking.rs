//! Deterministic top / bottom / median window selection.

use crate::types::{Ranked, SummaryStats};
use crate::util::{average, median};
use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = std::convert::Infallible;

    // Anything other than "desc" sorts ascending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Ok(SortOrder::Asc)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankSlice<T> {
    pub top: Vec<T>,
    pub bottom: Vec<T>,
    pub median: Vec<T>,
}

impl<T> RankSlice<T> {
    fn empty() -> Self {
        RankSlice { top: Vec::new(), bottom: Vec::new(), median: Vec::new() }
    }
}

/// Sort by `(key, id)` ascending; `Desc` reverses the whole ordering,
/// id tie-break included.
pub fn sort_ranked<T, K>(entries: &[T], key: K, order: SortOrder) -> Vec<T>
where
    T: Ranked + Clone,
    K: Fn(&T) -> f64,
{
    let mut sorted: Vec<T> = entries.to_vec();
    sorted.sort_by(|a, b| {
        key(a)
            .partial_cmp(&key(b))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.rank_id().cmp(b.rank_id()))
    });
    if order == SortOrder::Desc {
        sorted.reverse();
    }
    sorted
}

/// Cut top, bottom and median windows out of an already sorted list.
///
/// The window size is `limit` clamped to `1..=n`. `bottom` is reversed so
/// its first element is the last-ranked entry overall.
pub fn window<T: Clone>(sorted: &[T], limit: usize) -> RankSlice<T> {
    let n = sorted.len();
    if n == 0 {
        return RankSlice::empty();
    }
    let size = limit.clamp(1, n);

    let top = sorted[..size].to_vec();
    let bottom = sorted[n - size..].iter().rev().cloned().collect();
    let start = ((n - 1) / 2).saturating_sub(size / 2).min(n - size);
    let median = sorted[start..start + size].to_vec();

    RankSlice { top, bottom, median }
}

pub fn rank_slice<T, K>(entries: &[T], key: K, order: SortOrder, limit: usize) -> RankSlice<T>
where
    T: Ranked + Clone,
    K: Fn(&T) -> f64,
{
    window(&sort_ranked(entries, key, order), limit)
}

pub fn summary_stats(values: &[f64]) -> SummaryStats {
    if values.is_empty() {
        return SummaryStats { min: None, max: None, mean: None, median: None, count: 0 };
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    SummaryStats {
        min: Some(min),
        max: Some(max),
        mean: Some(average(values)),
        median: Some(median(values.to_vec())),
        count: values.len(),
    }
}
