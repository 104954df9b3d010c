// Entry point and interactive console flow.
//
// - Option [1] loads the CSV files into the in-memory repository and prints
//   diagnostics.
// - Option [2] asks for a date window, then writes the waste report, daily
//   series and group summaries as CSV plus a JSON dashboard/insights file.
// - After generating reports, the user can go back to the menu or exit.
use bakery_report::calendar::{DateWindow, ReferenceZone};
use bakery_report::config::AppConfig;
use bakery_report::metrics::Thresholds;
use bakery_report::reports::{self, DashboardSummary, Insights};
use bakery_report::types::{DailySeriesRow, GroupBy, GroupSummaryExportRow, WasteReportRow};
use bakery_report::{loader, logging, output, util, BakeryRepository, Dataset, InMemoryRepository, ReportError};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::{self, Write};

/// Console session state. The repository is owned here and handed to the
/// pipeline as a snapshot on every report run.
struct App {
    config: AppConfig,
    zone: ReferenceZone,
    repo: InMemoryRepository,
    loaded: bool,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    dashboard: &'a DashboardSummary,
    insights: &'a Insights,
}

/// Read one trimmed line after printing `prompt`.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match read_line("Back to Report Selection (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Blank input selects the default; invalid input re-prompts.
fn prompt_date(label: &str) -> Option<NaiveDate> {
    loop {
        let s = read_line(&format!("{} (YYYY-MM-DD, blank for default): ", label));
        if s.is_empty() {
            return None;
        }
        match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(d) => return Some(d),
            Err(_) => println!("Invalid date. Please use YYYY-MM-DD."),
        }
    }
}

/// Last `default_window_days` days ending on the latest readable entry date
/// (today when nothing is dated).
fn default_window(data: &Dataset, zone: &ReferenceZone, days: u32) -> DateWindow {
    let latest = data
        .entries()
        .iter()
        .filter_map(|e| zone.to_calendar_date(e.date()))
        .max()
        .unwrap_or_else(|| chrono::Utc::now().with_timezone(&zone.tz()).date_naive());
    DateWindow::last_n_days(latest, days)
}

fn handle_load(app: &mut App) {
    let clear = app
        .repo
        .clear_products()
        .and_then(|_| app.repo.clear_production_entries())
        .and_then(|_| app.repo.clear_disposal_entries());
    if let Err(e) = clear {
        eprintln!("Failed to reset data: {}\n", e);
        return;
    }

    match loader::load_into(&app.repo, &app.config.data_dir) {
        Ok(report) => {
            println!(
                "Processing dataset... ({} rows read, {} loaded)",
                util::format_int(report.total_rows),
                util::format_int(report.loaded_rows)
            );
            println!(
                "Note: {} rows skipped due to parse/validation errors.",
                util::format_int(report.parse_errors)
            );
            if report.duplicate_products > 0 {
                println!(
                    "Info: {} duplicate products skipped.",
                    util::format_int(report.duplicate_products)
                );
            }
            if report.coerced_quantities > 0 {
                println!(
                    "Info: {} invalid quantities recorded as 0.",
                    util::format_int(report.coerced_quantities)
                );
            }
            println!();
            app.loaded = true;
        }
        Err(e) => {
            eprintln!("Failed to load data from {}: {}\n", app.config.data_dir.display(), e);
        }
    }
}

fn generate_reports(app: &App, window: Option<DateWindow>) -> Result<(), ReportError> {
    if !app.loaded {
        return Err(ReportError::NoData);
    }
    let data = Dataset::snapshot(&app.repo)?;
    let zone = &app.zone;
    let window = window.unwrap_or_else(|| default_window(&data, zone, app.config.default_window_days));
    let thresholds: Thresholds = app.config.thresholds();
    std::fs::create_dir_all(&app.config.output_dir)?;
    let out = |dataset: &str| app.config.output_dir.join(output::export_file_name(dataset, &window));

    println!("Generating reports for {}...\n", window);

    let waste = reports::build_waste_report(&data.production, &data.disposal, &data.products, window, zone);
    let waste_rows: Vec<WasteReportRow> = waste.iter().map(WasteReportRow::from).collect();
    let file = out("waste-report");
    output::write_csv_with_bom(&file, &waste_rows)?;
    println!("Report 1: Product Waste Report\n");
    output::preview_table_rows(&waste_rows, 5);
    println!("(Full table exported to {})\n", file.display());

    let daily = reports::build_daily_series(
        &data.production,
        &data.disposal,
        window,
        zone,
        thresholds.moving_average_window,
    );
    let daily_rows: Vec<DailySeriesRow> = daily.iter().map(DailySeriesRow::from).collect();
    let file = out("daily-waste");
    output::write_csv_with_bom(&file, &daily_rows)?;
    println!("Report 2: Daily Production and Waste\n");
    output::preview_table_rows(&daily_rows, 7);
    println!("(Full table exported to {})\n", file.display());

    for (n, group) in [GroupBy::Category, GroupBy::Shift, GroupBy::Reason].into_iter().enumerate() {
        let rows = reports::build_group_summary(&data.production, &data.disposal, &data.products, window, zone, group);
        let export: Vec<GroupSummaryExportRow> = rows.iter().map(GroupSummaryExportRow::from).collect();
        let file = out(group.dataset_name());
        output::write_csv_with_bom(&file, &export)?;
        println!("Report {}: Waste by {}\n", n + 3, group.label());
        output::preview_table_rows(&export, 5);
        println!("(Full table exported to {})\n", file.display());
    }

    let dashboard = reports::build_dashboard_summary(&data.production, &data.disposal, &data.products, window, zone);
    let insights = reports::build_insights(&data.production, &data.disposal, &data.products, window, zone, &thresholds);
    let summary_path = app.config.output_dir.join("summary.json");
    output::write_json(&summary_path, &SummaryFile { dashboard: &dashboard, insights: &insights })?;

    println!("Summary ({}):", summary_path.display());
    println!(
        "Produced {} | Discarded {} | Discard rate {}% | Efficiency {}%",
        util::format_number(dashboard.total_produced, 0),
        util::format_number(dashboard.total_discarded, 0),
        util::format_number(dashboard.discard_rate, 1),
        util::format_number(dashboard.efficiency, 1)
    );
    println!(
        "Change vs previous period: {}%  | Trend: {}",
        util::format_number(dashboard.discarded_change.percent, 1),
        insights.trend
    );
    for r in &insights.recommendations {
        println!("- {}", r);
    }
    println!();
    Ok(())
}

fn handle_generate_reports(app: &App) {
    if !app.loaded {
        println!("Error: No data loaded. Please load the data first (option 1).\n");
        return;
    }
    let window = match (prompt_date("Start date"), prompt_date("End date")) {
        (Some(from), Some(to)) => Some(DateWindow::new(from, to)),
        (Some(from), None) => Some(DateWindow::single_day(from)),
        (None, Some(to)) => Some(DateWindow::last_n_days(to, app.config.default_window_days)),
        (None, None) => None,
    };
    if let Err(e) = generate_reports(app, window) {
        eprintln!("Report error: {}\n", e);
    }
}

fn main() {
    logging::init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    // validate() already checked the zone.
    let zone = config.zone().unwrap_or_default();
    tracing::info!(data_dir = %config.data_dir.display(), timezone = %zone, "starting");

    let mut app = App {
        config,
        zone,
        repo: InMemoryRepository::new(),
        loaded: false,
    };

    loop {
        println!("Bakery Waste Reports:");
        println!("[1] Load data");
        println!("[2] Generate Reports\n");
        match read_choice().as_str() {
            "1" => handle_load(&mut app),
            "2" => {
                println!();
                handle_generate_reports(&app);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}
