use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::aggregate::{aggregate_by, sanitize_quantity};
use crate::calendar::{DateWindow, ReferenceZone};
use crate::filter::within_window;
use crate::metrics::{
    detect_anomalies, discard_rate, efficiency, moving_average, period_change, round1, series_slope,
    trend_with_dead_zone, AnomalyFlag, PeriodChange, Thresholds, Trend,
};
use crate::types::{
    entries, DailyPoint, DisposalEntry, Entry, EntryKind, GroupBy, GroupSummaryRow, Product, ProductWasteReport,
    ProductionEntry,
};

// ---------------------------------------------------------------------------
// Per-product waste report
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WasteAcc {
    discarded: f64,
    produced: f64,
    days: HashSet<NaiveDate>,
}

/// One row per catalog product over `window`, most discarded first.
///
/// Entries are matched to products by id, falling back to a case-insensitive
/// name match. Only disposals with a positive quantity count as a discard day.
pub fn build_waste_report(
    production: &[ProductionEntry],
    disposal: &[DisposalEntry],
    products: &[Product],
    window: DateWindow,
    zone: &ReferenceZone,
) -> Vec<ProductWasteReport> {
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (idx, p) in products.iter().enumerate() {
        by_id.insert(p.id.as_str(), idx);
        by_name.entry(p.name.trim().to_lowercase()).or_insert(idx);
    }
    let mut accs: Vec<WasteAcc> = products.iter().map(|_| WasteAcc::default()).collect();

    let all = entries(production, disposal);
    for entry in &all {
        let Some(day) = zone.to_calendar_date(entry.date()) else {
            tracing::warn!(entry_id = entry.id(), raw_date = entry.date(), "waste report: unreadable date");
            continue;
        };
        if !window.contains(day) {
            continue;
        }
        let idx = by_id
            .get(entry.product_id())
            .or_else(|| by_name.get(&entry.product_name().trim().to_lowercase()));
        let Some(&idx) = idx else {
            tracing::warn!(entry_id = entry.id(), product = entry.product_name(), "waste report: no catalog match");
            continue;
        };
        let qty = sanitize_quantity(entry.id(), entry.quantity());
        let acc = &mut accs[idx];
        match entry {
            Entry::Production(_) => acc.produced += qty,
            Entry::Disposal(_) => {
                acc.discarded += qty;
                if qty > 0.0 {
                    acc.days.insert(day);
                }
            }
        }
    }

    let mut rows: Vec<ProductWasteReport> = products
        .iter()
        .zip(accs)
        .map(|(p, acc)| {
            let days_discarded = acc.days.len();
            let avg_per_day = if days_discarded > 0 {
                acc.discarded / days_discarded as f64
            } else {
                0.0
            };
            ProductWasteReport {
                product_id: p.id.clone(),
                product_name: p.name.clone(),
                total_discarded: acc.discarded,
                days_discarded,
                avg_per_day,
                total_produced: acc.produced,
                discard_rate: discard_rate(acc.discarded, acc.produced),
            }
        })
        .collect();

    sort_waste_report(&mut rows, WasteColumn::TotalDiscarded, SortDirection::Descending);
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasteColumn {
    ProductName,
    TotalDiscarded,
    DaysDiscarded,
    AvgPerDay,
    TotalProduced,
    DiscardRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Stable sort by any column. Names compare case-insensitively first so
/// "apple" and "Apple" sit together; product name breaks numeric ties.
pub fn sort_waste_report(rows: &mut [ProductWasteReport], column: WasteColumn, direction: SortDirection) {
    fn num(a: f64, b: f64) -> Ordering {
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }
    fn text(a: &str, b: &str) -> Ordering {
        a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
    }

    rows.sort_by(|a, b| {
        let primary = match column {
            WasteColumn::ProductName => text(&a.product_name, &b.product_name),
            WasteColumn::TotalDiscarded => num(a.total_discarded, b.total_discarded),
            WasteColumn::DaysDiscarded => a.days_discarded.cmp(&b.days_discarded),
            WasteColumn::AvgPerDay => num(a.avg_per_day, b.avg_per_day),
            WasteColumn::TotalProduced => num(a.total_produced, b.total_produced),
            WasteColumn::DiscardRate => num(a.discard_rate, b.discard_rate),
        };
        let primary = match direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary.then_with(|| text(&a.product_name, &b.product_name))
    });
}

// ---------------------------------------------------------------------------
// Daily chart series
// ---------------------------------------------------------------------------

/// One point per calendar day of `window`, zero-filled.
pub fn build_daily_series(
    production: &[ProductionEntry],
    disposal: &[DisposalEntry],
    window: DateWindow,
    zone: &ReferenceZone,
    moving_average_window: usize,
) -> Vec<DailyPoint> {
    let all = entries(production, disposal);
    let scoped = within_window(&all, window, zone);
    let by_day = aggregate_by(&scoped.entries, GroupBy::Date, &[], zone);

    let days: Vec<NaiveDate> = window.iter_days().collect();
    let totals: Vec<(f64, f64)> = days
        .iter()
        .map(|d| {
            by_day
                .get(&d.format("%Y-%m-%d").to_string())
                .map(|t| (t.production, t.disposal))
                .unwrap_or((0.0, 0.0))
        })
        .collect();
    let discarded: Vec<f64> = totals.iter().map(|(_, d)| *d).collect();
    let rates: Vec<f64> = totals.iter().map(|(p, d)| discard_rate(*d, *p)).collect();
    let discarded_ma = moving_average(&discarded, moving_average_window);
    let rate_ma = moving_average(&rates, moving_average_window);

    days.into_iter()
        .enumerate()
        .map(|(i, date)| DailyPoint {
            date,
            produced: totals[i].0,
            discarded: totals[i].1,
            discard_rate: rates[i],
            discarded_moving_avg: round1(discarded_ma[i]),
            discard_rate_moving_avg: round1(rate_ma[i]),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Group summaries
// ---------------------------------------------------------------------------

/// Totals per group over `window`, most discarded first, then key ascending.
pub fn build_group_summary(
    production: &[ProductionEntry],
    disposal: &[DisposalEntry],
    products: &[Product],
    window: DateWindow,
    zone: &ReferenceZone,
    group: GroupBy,
) -> Vec<GroupSummaryRow> {
    let all = entries(production, disposal);
    let scoped = within_window(&all, window, zone);
    aggregate_by(&scoped.entries, group, products, zone)
        .sorted_by_disposal_desc()
        .into_iter()
        .map(|(key, t)| GroupSummaryRow {
            key,
            produced: t.production,
            discarded: t.disposal,
            discard_rate: discard_rate(t.disposal, t.production),
            efficiency: efficiency(t.production, t.disposal),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dashboard headline numbers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub window: DateWindow,
    pub total_produced: f64,
    pub total_discarded: f64,
    pub discard_rate: f64,
    pub efficiency: f64,
    pub production_entries: usize,
    pub disposal_entries: usize,
    /// Entries skipped because their date could not be read.
    pub invalid_dates: usize,
    pub top_reason: Option<String>,
    pub most_discarded_product: Option<String>,
    /// Discarded quantity versus the preceding window of equal length.
    pub discarded_change: PeriodChange,
}

pub fn build_dashboard_summary(
    production: &[ProductionEntry],
    disposal: &[DisposalEntry],
    products: &[Product],
    window: DateWindow,
    zone: &ReferenceZone,
) -> DashboardSummary {
    let all = entries(production, disposal);
    let current = within_window(&all, window, zone);
    let previous = within_window(&all, window.preceding(), zone);

    let by_product = aggregate_by(&current.entries, GroupBy::Product, products, zone);
    let totals = by_product.grand_total();
    let previous_discarded = aggregate_by(&previous.entries, GroupBy::Product, products, zone)
        .grand_total()
        .disposal;

    let top_reason = aggregate_by(&current.entries, GroupBy::Reason, products, zone)
        .sorted_by_disposal_desc()
        .into_iter()
        .find(|(_, t)| t.disposal > 0.0)
        .map(|(k, _)| k);
    let most_discarded_product = by_product
        .sorted_by_disposal_desc()
        .into_iter()
        .find(|(_, t)| t.disposal > 0.0)
        .map(|(k, _)| k);

    let production_entries = current.entries.iter().filter(|e| e.kind() == EntryKind::Production).count();

    DashboardSummary {
        window,
        total_produced: totals.production,
        total_discarded: totals.disposal,
        discard_rate: discard_rate(totals.disposal, totals.production),
        efficiency: efficiency(totals.production, totals.disposal),
        production_entries,
        disposal_entries: current.entries.len() - production_entries,
        invalid_dates: current.invalid_dates,
        top_reason,
        most_discarded_product,
        discarded_change: period_change(totals.disposal, previous_discarded),
    }
}

// ---------------------------------------------------------------------------
// Insights: trend, anomalies, recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub window: DateWindow,
    /// Least-squares slope of daily discarded quantity (units per day).
    pub daily_waste_slope: f64,
    pub trend: Trend,
    pub anomalous_days: Vec<AnomalyFlag<NaiveDate>>,
    /// Products whose discard rate stands out against the rest of the catalog.
    pub product_anomalies: Vec<AnomalyFlag<String>>,
    pub recommendations: Vec<String>,
}

pub fn build_insights(
    production: &[ProductionEntry],
    disposal: &[DisposalEntry],
    products: &[Product],
    window: DateWindow,
    zone: &ReferenceZone,
    thresholds: &Thresholds,
) -> Insights {
    let daily = build_daily_series(production, disposal, window, zone, thresholds.moving_average_window);
    let discarded: Vec<f64> = daily.iter().map(|p| p.discarded).collect();
    let slope = series_slope(&discarded);
    let trend = trend_with_dead_zone(slope, thresholds.trend_dead_zone);

    let day_series: Vec<(NaiveDate, f64)> = daily.iter().map(|p| (p.date, p.discarded)).collect();
    let anomalous_days = detect_anomalies(&day_series, thresholds.anomaly_z);

    let waste = build_waste_report(production, disposal, products, window, zone);
    let rate_series: Vec<(String, f64)> = waste
        .iter()
        .filter(|r| r.total_produced > 0.0)
        .map(|r| (r.product_name.clone(), r.discard_rate))
        .collect();
    let product_anomalies = detect_anomalies(&rate_series, thresholds.anomaly_z);

    let reasons = build_group_summary(production, disposal, products, window, zone, GroupBy::Reason);

    let mut recommendations = Vec::new();
    if let Some(worst) = waste
        .iter()
        .filter(|r| r.discard_rate > 0.0)
        .max_by(|a, b| a.discard_rate.partial_cmp(&b.discard_rate).unwrap_or(Ordering::Equal))
    {
        recommendations.push(format!(
            "Review production volume for {}: {:.1}% of output was discarded.",
            worst.product_name, worst.discard_rate
        ));
    }
    if let Some(top) = reasons.iter().find(|r| r.discarded > 0.0) {
        recommendations.push(format!(
            "Most common disposal reason is \"{}\" ({} units).",
            top.key,
            crate::util::format_number(top.discarded, 0)
        ));
    }
    match trend {
        Trend::Increasing => recommendations.push(format!(
            "Daily waste is trending up by {:.2} units per day.",
            slope
        )),
        Trend::Decreasing => recommendations.push(format!(
            "Daily waste is trending down by {:.2} units per day.",
            slope.abs()
        )),
        Trend::Stable => {}
    }
    for day in anomalous_days.iter().filter(|a| a.z_score > 0.0) {
        recommendations.push(format!(
            "Unusually high waste on {} ({} units).",
            day.key.format("%Y-%m-%d"),
            crate::util::format_number(day.value, 0)
        ));
    }

    Insights {
        window,
        daily_waste_slope: slope,
        trend,
        anomalous_days,
        product_anomalies,
        recommendations,
    }
}
