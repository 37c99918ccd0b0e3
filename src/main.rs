// Entry point and interactive menu.
//
// Option [1] loads the catalog snapshot from disk; the other options run the
// analyses against it, print markdown previews and export the full results
// next to the configured output directory.
use kolada_analytics::config::AppConfig;
use kolada_analytics::engine::{AnalysisView, KpiAnalysis, KpiComparison};
use kolada_analytics::correlation::ComparisonDetail;
use kolada_analytics::util::{format_int, format_number, parse_f64_safe, parse_usize_safe};
use kolada_analytics::{
    loader, output, AnalysisEngine, AnalyzeRequest, CatalogSnapshot, CompareRequest,
    FilterRequest, SnapshotFetcher, SortOrder, ThresholdOperator,
};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Loaded once via option [1], then reused by every analysis in this run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { data: None }));

struct Loaded {
    catalog: CatalogSnapshot,
    fetcher: SnapshotFetcher,
}

struct AppState {
    data: Option<Arc<Loaded>>,
}

fn prompt(label: &str) -> String {
    print!("{}: ", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Prompt with a default shown in brackets; empty input keeps the default.
fn prompt_or(label: &str, default: &str) -> String {
    let answer = prompt(&format!("{} [{}]", label, default));
    if answer.is_empty() {
        default.to_string()
    } else {
        answer
    }
}

fn prompt_usize(label: &str, default: usize) -> usize {
    let answer = prompt_or(label, &default.to_string());
    parse_usize_safe(Some(answer.as_str())).unwrap_or(default)
}

fn optional(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn loaded() -> Option<Arc<Loaded>> {
    let state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    state.data.clone()
}

fn require_loaded() -> Option<Arc<Loaded>> {
    let data = loaded();
    if data.is_none() {
        println!("Error: No data loaded. Please load the catalog snapshot first (option 1).\n");
    }
    data
}

fn export<F>(config: &AppConfig, file: &str, write: F)
where
    F: FnOnce(&std::path::Path) -> Result<(), Box<dyn std::error::Error>>,
{
    let path = config.output_dir.join(file);
    match write(&path) {
        Ok(()) => println!("(Full result exported to {})\n", path.display()),
        Err(e) => error!("Write error for {}: {}", path.display(), e),
    }
}

fn handle_load(config: &AppConfig) {
    match loader::load_snapshot(&config.data) {
        Ok((catalog, fetcher, report)) => {
            println!(
                "Catalog loaded: {} KPIs, {} municipalities, {} value rows.",
                format_int(report.kpis),
                format_int(report.municipalities),
                format_int(report.value_rows)
            );
            if report.parse_errors > 0 {
                println!(
                    "Note: {} municipality rows skipped due to parse errors.",
                    format_int(report.parse_errors)
                );
            }
            println!(
                "Snapshot taken at {}.\n",
                catalog.loaded_at().format("%Y-%m-%d %H:%M:%S UTC")
            );
            let mut state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
            state.data = Some(Arc::new(Loaded { catalog, fetcher }));
        }
        Err(e) => {
            error!("Failed to load catalog snapshot: {}", e);
            eprintln!("Failed to load catalog snapshot: {}\n", e);
        }
    }
}

fn handle_search(config: &AppConfig) {
    let Some(data) = require_loaded() else { return };
    let engine = AnalysisEngine::new(&data.catalog, &data.fetcher);
    let keyword = prompt("Keyword");
    let limit = prompt_usize("Limit", config.defaults.search_limit);
    let hits = engine.search_kpis(&keyword, limit);
    let note = format!("{} hits", hits.len());
    output::preview_table("Matching KPIs", Some(note.as_str()), &hits, limit);
}

fn handle_operating_areas() {
    let Some(data) = require_loaded() else { return };
    let areas = data.catalog.list_operating_areas();
    output::preview_table("Operating areas", None, areas, areas.len());
    let area = prompt("Show KPIs for area (empty to skip)");
    if area.is_empty() {
        return;
    }
    let kpis: Vec<_> = data.catalog.kpis_by_operating_area(&area).into_iter().cloned().collect();
    output::preview_table(&format!("KPIs in {}", area), None, &kpis, kpis.len());
}

fn print_analysis(result: &KpiAnalysis) {
    println!("{} ({})", result.kpi_info.title, result.kpi_info.id);
    println!(
        "Years: {} | Gender: {} | Municipalities: {}\n",
        result.selected_years.join(", "),
        result.selected_gender,
        format_int(result.municipalities_count)
    );
    match &result.view {
        AnalysisView::Municipalities { municipalities_data } => {
            for m in municipalities_data {
                let delta = m
                    .delta_value
                    .map(|d| format_number(d, 2))
                    .unwrap_or_else(|| "-".to_string());
                println!("{} {}: delta {}", m.municipality_id, m.municipality_name, delta);
            }
            println!();
        }
        AnalysisView::Ranking(view) => {
            let stats = &view.summary_stats;
            let fmt = |v: Option<f64>| v.map(|x| format_number(x, 2)).unwrap_or_else(|| "-".into());
            println!(
                "Latest values: min {} | max {} | mean {} | median {}\n",
                fmt(stats.min),
                fmt(stats.max),
                fmt(stats.mean),
                fmt(stats.median)
            );
            output::preview_table("Top municipalities", None, &view.top_municipalities, 5);
            output::preview_table("Median municipalities", None, &view.median_municipalities, 5);
            output::preview_table("Bottom municipalities", None, &view.bottom_municipalities, 5);
            if view.multi_year_delta {
                output::preview_table("Top change", None, &view.top_delta_municipalities, 5);
                output::preview_table("Bottom change", None, &view.bottom_delta_municipalities, 5);
            }
        }
    }
}

fn handle_analyze(config: &AppConfig) {
    let Some(data) = require_loaded() else { return };
    let engine = AnalysisEngine::new(&data.catalog, &data.fetcher);

    let mut req = AnalyzeRequest::new(&prompt("KPI id"), &prompt("Year(s), comma-separated"));
    req.sort_order = prompt_or("Sort order (asc/desc)", "desc")
        .parse()
        .unwrap_or(SortOrder::Desc);
    req.limit = prompt_usize("Limit", config.defaults.limit);
    req.gender = prompt_or("Gender (T/M/K)", &config.defaults.gender);
    req.municipality_type =
        optional(prompt_or("Municipality type", &config.defaults.municipality_type));
    req.municipality_ids = optional(prompt("Municipality ids (empty for ranking)"));
    println!();

    match engine.analyze_kpi(&req) {
        Ok(result) => {
            print_analysis(&result);
            if let AnalysisView::Ranking(view) = &result.view {
                export(config, "delta_ranking.csv", |p| {
                    output::write_csv(p, &view.top_delta_municipalities)
                });
            }
            export(config, "analysis.json", |p| output::write_json(p, &result));
        }
        Err(failure) => {
            println!("Analysis failed: {}\n", failure);
            export(config, "analysis.json", |p| output::write_json(p, &failure));
        }
    }
}

fn print_comparison(result: &KpiComparison) {
    let overall = |v: Option<f64>| v.map(|x| format_number(x, 4)).unwrap_or_else(|| "n/a".into());
    match &result.detail {
        ComparisonDetail::SingleYear(c) => {
            println!("Overall correlation: {}\n", overall(c.overall_correlation));
            let largest = &c.top_difference_municipalities;
            output::preview_table("Largest differences", None, largest, 5);
            let median = &c.median_difference_municipalities;
            output::preview_table("Median differences", None, median, 5);
            let smallest = &c.bottom_difference_municipalities;
            output::preview_table("Smallest differences", None, smallest, 5);
        }
        ComparisonDetail::MultiYear(c) => {
            println!("Overall correlation: {}\n", overall(c.overall_correlation));
            let strongest = &c.top_correlation_municipalities;
            output::preview_table("Strongest correlation", None, strongest, 5);
            let median = &c.median_correlation_municipalities;
            output::preview_table("Median correlation", None, median, 5);
            let weakest = &c.bottom_correlation_municipalities;
            output::preview_table("Weakest correlation", None, weakest, 5);
        }
    }
}

fn handle_compare(config: &AppConfig) {
    let Some(data) = require_loaded() else { return };
    let engine = AnalysisEngine::new(&data.catalog, &data.fetcher);

    let mut req = CompareRequest::new(
        &prompt("First KPI id"),
        &prompt("Second KPI id"),
        &prompt("Year(s), comma-separated"),
    );
    req.gender = prompt_or("Gender (T/M/K)", &config.defaults.gender);
    req.municipality_type =
        optional(prompt_or("Municipality type", &config.defaults.municipality_type));
    req.municipality_ids = optional(prompt("Municipality ids (empty for all)"));
    println!();

    match engine.compare_kpis(&req) {
        Ok(result) => {
            print_comparison(&result);
            export(config, "comparison.json", |p| output::write_json(p, &result));
        }
        Err(failure) => {
            println!("Comparison failed: {}\n", failure);
            export(config, "comparison.json", |p| output::write_json(p, &failure));
        }
    }
}

fn handle_filter(config: &AppConfig) {
    let Some(data) = require_loaded() else { return };
    let engine = AnalysisEngine::new(&data.catalog, &data.fetcher);

    let kpi_id = prompt("KPI id");
    let Some(cutoff) = parse_f64_safe(Some(prompt("Cutoff").as_str())) else {
        println!("Invalid cutoff. Please enter a number.\n");
        return;
    };
    let operator: ThresholdOperator = match prompt_or("Operator (above/below)", "above").parse() {
        Ok(op) => op,
        Err(e) => {
            println!("{}\n", e);
            return;
        }
    };
    let mut req = FilterRequest::new(&kpi_id, cutoff, operator);
    req.year = optional(prompt("Year (empty for most recent)"));
    req.gender = prompt_or("Gender (T/M/K)", &config.defaults.gender);
    req.municipality_type =
        optional(prompt_or("Municipality type", &config.defaults.municipality_type));
    println!();

    match engine.filter_municipalities_by_kpi(&req) {
        Ok(matches) => {
            output::preview_table(
                "Municipalities past the cutoff",
                Some(format!("{} matches", format_int(matches.len())).as_str()),
                &matches,
                10,
            );
            export(config, "threshold_matches.csv", |p| output::write_csv(p, &matches));
        }
        Err(failure) => println!("Filter failed: {}\n", failure),
    }
}

fn main() {
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to read configuration, using defaults: {}", e);
            AppConfig::default()
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .init();
    info!("Starting kolada_analytics v{}", env!("CARGO_PKG_VERSION"));
    info!(output_dir = %config.output_dir.display(), "configuration ready");

    loop {
        println!("Select an option:");
        println!("[1] Load the catalog snapshot");
        println!("[2] Search KPIs");
        println!("[3] Operating areas");
        println!("[4] Analyze a KPI across municipalities");
        println!("[5] Compare two KPIs");
        println!("[6] Filter municipalities by KPI cutoff");
        println!("[0] Exit\n");
        match prompt("Enter choice").as_str() {
            "1" => handle_load(&config),
            "2" => handle_search(&config),
            "3" => handle_operating_areas(),
            "4" => handle_analyze(&config),
            "5" => handle_compare(&config),
            "6" => handle_filter(&config),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-6.\n"),
        }
    }
}
