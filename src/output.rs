use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Render up to `max_rows` rows as a markdown table.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> Option<String>
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return None;
    }
    Some(Table::new(slice).with(Style::markdown()).to_string())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    match render_table(rows, max_rows) {
        Some(table) => println!("{}\n", table),
        None => println!("(no rows)\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperatingAreaSummary;

    #[test]
    fn renders_markdown_and_handles_empty() {
        let rows = vec![
            OperatingAreaSummary { operating_area: "Skola".into(), kpi_count: 3 },
            OperatingAreaSummary { operating_area: "Vård".into(), kpi_count: 1 },
        ];
        let table = render_table(&rows, 1).unwrap();
        assert!(table.contains("OperatingArea"));
        assert!(table.contains("Skola"));
        assert!(!table.contains("Vård"));
        assert!(render_table::<OperatingAreaSummary>(&[], 5).is_none());
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let path = std::env::temp_dir().join(format!("kolada_output_{}.csv", std::process::id()));
        let rows = vec![OperatingAreaSummary { operating_area: "Skola".into(), kpi_count: 3 }];
        write_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "operating_area,kpi_count\nSkola,3\n");
    }
}
