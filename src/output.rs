use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use crate::calendar::DateWindow;
use crate::error::ReportError;

const UTF8_BOM: &str = "\u{feff}";

/// `<dataset>-<fromYYYYMMDD>_to_<toYYYYMMDD>.csv`
pub fn export_file_name(dataset: &str, window: &DateWindow) -> String {
    format!(
        "{}-{}_to_{}.csv",
        dataset,
        window.from.format("%Y%m%d"),
        window.to.format("%Y%m%d")
    )
}

/// CSV with a UTF-8 BOM so spreadsheet tools detect the encoding. Fields
/// containing commas, quotes or newlines are quoted.
pub fn write_csv_with_bom<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ReportError> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM.as_bytes())?;
    let mut wtr = csv::Writer::from_writer(file);
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProductWasteReport, WasteReportRow};
    use chrono::NaiveDate;

    #[test]
    fn file_name_pattern() {
        let w = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        assert_eq!(export_file_name("waste-report", &w), "waste-report-20240105_to_20240201.csv");
    }

    #[test]
    fn csv_has_bom_header_and_quoted_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let report = ProductWasteReport {
            product_id: "p1".into(),
            product_name: "Bread, White".into(),
            total_discarded: 1500.0,
            days_discarded: 2,
            avg_per_day: 750.0,
            total_produced: 3000.0,
            discard_rate: 50.0,
        };
        let rows = vec![WasteReportRow::from(&report)];
        write_csv_with_bom(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with('\u{feff}'));
        let mut lines = text.trim_start_matches('\u{feff}').lines();
        assert_eq!(
            lines.next().unwrap(),
            "Product,Total Discarded,Days Discarded,Avg per Day,Total Produced,Discard Rate (%)"
        );
        assert_eq!(lines.next().unwrap(), "\"Bread, White\",\"1,500\",2,750.0,\"3,000\",50.0");
    }

    #[test]
    fn json_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        write_json(&path, &serde_json::json!({"total": 3})).unwrap();
        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["total"], 3);
    }
}
