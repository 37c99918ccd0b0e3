//! Analytics and ranking over the Kolada KPI catalog: keyword search,
//! per-municipality time series, rankings with median windows, year-over-year
//! deltas, KPI-to-KPI correlation and threshold filtering.
//!
//! The engine works on an immutable [`CatalogSnapshot`] and rows supplied by
//! a [`DataFetcher`]; it does no I/O of its own.

pub mod catalog;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod grouping;
pub mod loader;
pub mod output;
pub mod ranking;
pub mod search;
pub mod threshold;
pub mod trend;
pub mod types;
pub mod util;

pub use catalog::CatalogSnapshot;
pub use engine::{AnalysisEngine, AnalyzeRequest, CompareRequest, FilterRequest};
pub use error::{AnalysisError, AnalysisFailure, FetchError, LoadError};
pub use fetcher::{DataFetcher, SnapshotFetcher};
pub use ranking::SortOrder;
pub use threshold::ThresholdOperator;
