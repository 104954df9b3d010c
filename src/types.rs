use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tabled::Tabled;

use crate::util::format_number;

// ---------------------------------------------------------------------------
// Raw CSV rows. Every column is optional text so malformed rows can be counted
// instead of aborting the whole file.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawProductRow {
    pub id: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawProductionRow {
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub staff_name: Option<String>,
    pub date: Option<String>,
    pub quantity: Option<String>,
    pub shift: Option<String>,
    pub expiration_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawDisposalRow {
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub staff_name: Option<String>,
    pub date: Option<String>,
    pub quantity: Option<String>,
    pub shift: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Domain records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Work shift an entry was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
    /// Legacy two-shift schedule.
    Day,
    Unknown,
}

impl Shift {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Shift::Morning,
            "afternoon" => Shift::Afternoon,
            "night" => Shift::Night,
            "day" => Shift::Day,
            _ => Shift::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Afternoon => "afternoon",
            Shift::Night => "night",
            Shift::Day => "day",
            Shift::Unknown => "unknown",
        }
    }
}

impl From<String> for Shift {
    fn from(s: String) -> Self {
        Shift::parse(&s)
    }
}

impl From<Shift> for String {
    fn from(s: Shift) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionEntry {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub staff_name: String,
    /// Stored timestamp, interpreted through `calendar`.
    pub date: String,
    pub quantity: f64,
    pub shift: Shift,
    pub expiration_date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisposalEntry {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub staff_name: String,
    pub date: String,
    pub quantity: f64,
    pub shift: Shift,
    /// Free text, possibly several reasons joined by commas.
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DisposalEntry {
    /// Individual trimmed reasons, dropping empty fragments. A reason repeated
    /// within one entry, in any letter case, is kept once with its first spelling.
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::new();
        self.reason
            .split(',')
            .map(str::trim)
            .filter(move |r| !r.is_empty() && seen.insert(r.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Production,
    Disposal,
}

/// Borrowed view over either entry stream so filters and aggregations can run
/// over both without copying.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Production(&'a ProductionEntry),
    Disposal(&'a DisposalEntry),
}

impl<'a> Entry<'a> {
    pub fn kind(&self) -> EntryKind {
        match *self {
            Entry::Production(_) => EntryKind::Production,
            Entry::Disposal(_) => EntryKind::Disposal,
        }
    }

    pub fn id(&self) -> &'a str {
        match *self {
            Entry::Production(e) => &e.id,
            Entry::Disposal(e) => &e.id,
        }
    }

    pub fn product_id(&self) -> &'a str {
        match *self {
            Entry::Production(e) => &e.product_id,
            Entry::Disposal(e) => &e.product_id,
        }
    }

    pub fn product_name(&self) -> &'a str {
        match *self {
            Entry::Production(e) => &e.product_name,
            Entry::Disposal(e) => &e.product_name,
        }
    }

    pub fn staff_name(&self) -> &'a str {
        match *self {
            Entry::Production(e) => &e.staff_name,
            Entry::Disposal(e) => &e.staff_name,
        }
    }

    pub fn date(&self) -> &'a str {
        match *self {
            Entry::Production(e) => &e.date,
            Entry::Disposal(e) => &e.date,
        }
    }

    pub fn quantity(&self) -> f64 {
        match *self {
            Entry::Production(e) => e.quantity,
            Entry::Disposal(e) => e.quantity,
        }
    }

    pub fn shift(&self) -> Shift {
        match *self {
            Entry::Production(e) => e.shift,
            Entry::Disposal(e) => e.shift,
        }
    }

    pub fn notes(&self) -> Option<&'a str> {
        match *self {
            Entry::Production(e) => e.notes.as_deref(),
            Entry::Disposal(e) => e.notes.as_deref(),
        }
    }

    pub fn reason(&self) -> Option<&'a str> {
        match *self {
            Entry::Production(_) => None,
            Entry::Disposal(e) => Some(&e.reason),
        }
    }
}

/// Builds the combined entry stream, production first.
pub fn entries<'a>(production: &'a [ProductionEntry], disposal: &'a [DisposalEntry]) -> Vec<Entry<'a>> {
    production
        .iter()
        .map(Entry::Production)
        .chain(disposal.iter().map(Entry::Disposal))
        .collect()
}

/// Grouping dimension for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Product,
    Date,
    Shift,
    Category,
    Reason,
}

impl GroupBy {
    pub fn label(&self) -> &'static str {
        match self {
            GroupBy::Product => "Product",
            GroupBy::Date => "Date",
            GroupBy::Shift => "Shift",
            GroupBy::Category => "Category",
            GroupBy::Reason => "Reason",
        }
    }

    pub fn dataset_name(&self) -> &'static str {
        match self {
            GroupBy::Product => "waste-by-product",
            GroupBy::Date => "waste-by-date",
            GroupBy::Shift => "waste-by-shift",
            GroupBy::Category => "waste-by-category",
            GroupBy::Reason => "waste-by-reason",
        }
    }
}

// ---------------------------------------------------------------------------
// Derived report values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductWasteReport {
    pub product_id: String,
    pub product_name: String,
    pub total_discarded: f64,
    pub days_discarded: usize,
    pub avg_per_day: f64,
    pub total_produced: f64,
    pub discard_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: chrono::NaiveDate,
    pub produced: f64,
    pub discarded: f64,
    pub discard_rate: f64,
    pub discarded_moving_avg: f64,
    pub discard_rate_moving_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummaryRow {
    pub key: String,
    pub produced: f64,
    pub discarded: f64,
    pub discard_rate: f64,
    pub efficiency: f64,
}

// ---------------------------------------------------------------------------
// Export rows: human-readable headers, pre-formatted numbers.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WasteReportRow {
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "Total Discarded")]
    #[tabled(rename = "Total Discarded")]
    pub total_discarded: String,
    #[serde(rename = "Days Discarded")]
    #[tabled(rename = "Days Discarded")]
    pub days_discarded: usize,
    #[serde(rename = "Avg per Day")]
    #[tabled(rename = "Avg per Day")]
    pub avg_per_day: String,
    #[serde(rename = "Total Produced")]
    #[tabled(rename = "Total Produced")]
    pub total_produced: String,
    #[serde(rename = "Discard Rate (%)")]
    #[tabled(rename = "Discard Rate (%)")]
    pub discard_rate: String,
}

impl From<&ProductWasteReport> for WasteReportRow {
    fn from(r: &ProductWasteReport) -> Self {
        WasteReportRow {
            product: r.product_name.clone(),
            total_discarded: format_number(r.total_discarded, 0),
            days_discarded: r.days_discarded,
            avg_per_day: format_number(r.avg_per_day, 1),
            total_produced: format_number(r.total_produced, 0),
            discard_rate: format_number(r.discard_rate, 1),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DailySeriesRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Produced")]
    #[tabled(rename = "Produced")]
    pub produced: String,
    #[serde(rename = "Discarded")]
    #[tabled(rename = "Discarded")]
    pub discarded: String,
    #[serde(rename = "Discard Rate (%)")]
    #[tabled(rename = "Discard Rate (%)")]
    pub discard_rate: String,
    #[serde(rename = "Discarded (Moving Avg)")]
    #[tabled(rename = "Discarded (Moving Avg)")]
    pub discarded_moving_avg: String,
}

impl From<&DailyPoint> for DailySeriesRow {
    fn from(p: &DailyPoint) -> Self {
        DailySeriesRow {
            date: p.date.format("%Y-%m-%d").to_string(),
            produced: format_number(p.produced, 0),
            discarded: format_number(p.discarded, 0),
            discard_rate: format_number(p.discard_rate, 1),
            discarded_moving_avg: format_number(p.discarded_moving_avg, 1),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupSummaryExportRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub key: String,
    #[serde(rename = "Produced")]
    #[tabled(rename = "Produced")]
    pub produced: String,
    #[serde(rename = "Discarded")]
    #[tabled(rename = "Discarded")]
    pub discarded: String,
    #[serde(rename = "Discard Rate (%)")]
    #[tabled(rename = "Discard Rate (%)")]
    pub discard_rate: String,
    #[serde(rename = "Efficiency (%)")]
    #[tabled(rename = "Efficiency (%)")]
    pub efficiency: String,
}

impl From<&GroupSummaryRow> for GroupSummaryExportRow {
    fn from(r: &GroupSummaryRow) -> Self {
        GroupSummaryExportRow {
            key: r.key.clone(),
            produced: format_number(r.produced, 0),
            discarded: format_number(r.discarded, 0),
            discard_rate: format_number(r.discard_rate, 1),
            efficiency: format_number(r.efficiency, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_parses_known_and_legacy_values() {
        assert_eq!(Shift::parse("Morning"), Shift::Morning);
        assert_eq!(Shift::parse(" afternoon "), Shift::Afternoon);
        assert_eq!(Shift::parse("NIGHT"), Shift::Night);
        assert_eq!(Shift::parse("day"), Shift::Day);
        assert_eq!(Shift::parse("swing"), Shift::Unknown);
        assert_eq!(Shift::parse(""), Shift::Unknown);
    }

    #[test]
    fn shift_deserializes_unknown_values_without_error() {
        let s: Shift = serde_json::from_str("\"Evening\"").unwrap();
        assert_eq!(s, Shift::Unknown);
        assert_eq!(serde_json::to_string(&Shift::Night).unwrap(), "\"night\"");
    }

    #[test]
    fn disposal_reasons_split_on_commas() {
        let e = DisposalEntry {
            id: "d1".into(),
            product_id: "p1".into(),
            product_name: "Bread".into(),
            staff_name: "Ana".into(),
            date: "2024-01-01".into(),
            quantity: 3.0,
            shift: Shift::Morning,
            reason: "Expired, Damaged,, ".into(),
            notes: None,
        };
        let reasons: Vec<&str> = e.reasons().collect();
        assert_eq!(reasons, vec!["Expired", "Damaged"]);
        assert_eq!(Entry::Disposal(&e).reason(), Some("Expired, Damaged,, "));

        let repeated = DisposalEntry { reason: "Expired, expired, Damaged, EXPIRED".into(), ..e };
        let reasons: Vec<&str> = repeated.reasons().collect();
        assert_eq!(reasons, vec!["Expired", "Damaged"]);
    }
}
