// End-to-end checks of the reporting pipeline through the public API.

use bakery_report::aggregate::aggregate;
use bakery_report::filter::{filter_entries, FilterCriteria};
use bakery_report::logging;
use bakery_report::metrics::{discard_rate, efficiency, linear_regression_slope, moving_average, Point};
use bakery_report::reports::build_waste_report;
use bakery_report::types::{entries, DisposalEntry, Entry, Product, ProductionEntry, Shift};
use bakery_report::{BakeryRepository, DateWindow, Dataset, InMemoryRepository, ReferenceZone};
use chrono::NaiveDate;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn bread() -> Product {
    Product {
        id: "p1".into(),
        name: "Bread".into(),
        category: "Loaves".into(),
        unit: "pcs".into(),
        description: None,
    }
}

fn production(product_id: &str, quantity: f64, date: &str) -> ProductionEntry {
    ProductionEntry {
        id: String::new(),
        product_id: product_id.into(),
        product_name: "Bread".into(),
        staff_name: "Sam".into(),
        date: date.into(),
        quantity,
        shift: Shift::Morning,
        expiration_date: date.into(),
        notes: None,
    }
}

fn disposal(product_id: &str, quantity: f64, date: &str) -> DisposalEntry {
    DisposalEntry {
        id: String::new(),
        product_id: product_id.into(),
        product_name: "Bread".into(),
        staff_name: "Sam".into(),
        date: date.into(),
        quantity,
        shift: Shift::Night,
        reason: "Expired".into(),
        notes: None,
    }
}

#[test]
fn scenario_a_single_day_report() {
    logging::init_test();
    let rows = build_waste_report(
        &[production("p1", 100.0, "2024-01-01")],
        &[disposal("p1", 20.0, "2024-01-01")],
        &[bread()],
        DateWindow::new(day("2024-01-01"), day("2024-01-01")),
        &ReferenceZone::default(),
    );
    assert_eq!(rows.len(), 1);
    let r = &rows[0];
    assert_eq!(r.total_produced, 100.0);
    assert_eq!(r.total_discarded, 20.0);
    assert_eq!(r.discard_rate, 20.0);
    assert_eq!(r.days_discarded, 1);
    assert_eq!(r.avg_per_day, 20.0);
}

#[test]
fn scenario_b_zero_quantity_disposal_is_not_a_discard_day() {
    let rows = build_waste_report(
        &[production("p1", 100.0, "2024-01-01")],
        &[disposal("p1", 0.0, "2024-01-01")],
        &[bread()],
        DateWindow::single_day(day("2024-01-01")),
        &ReferenceZone::default(),
    );
    assert_eq!(rows[0].days_discarded, 0);
    assert_eq!(rows[0].avg_per_day, 0.0);
    assert_eq!(rows[0].discard_rate, 0.0);
}

#[test]
fn scenario_c_two_discard_days() {
    let rows = build_waste_report(
        &[],
        &[disposal("p1", 10.0, "2024-01-01"), disposal("p1", 30.0, "2024-01-02")],
        &[bread()],
        DateWindow::new(day("2024-01-01"), day("2024-01-07")),
        &ReferenceZone::default(),
    );
    assert_eq!(rows[0].days_discarded, 2);
    assert_eq!(rows[0].avg_per_day, 20.0);
    assert_eq!(rows[0].total_discarded, 40.0);
    assert_eq!(rows[0].discard_rate, 0.0);
}

#[test]
fn scenario_d_moving_average() {
    assert_eq!(moving_average(&[10.0, 20.0, 30.0], 3), vec![10.0, 15.0, 20.0]);
}

#[test]
fn scenario_e_regression_slope() {
    let pts = [Point::new(0.0, 0.0), Point::new(1.0, 2.0), Point::new(2.0, 4.0)];
    assert_eq!(linear_regression_slope(&pts), 2.0);
}

#[test]
fn negative_quantities_never_reduce_sums() {
    let prod = vec![production("p1", -50.0, "2024-01-01"), production("p1", 7.0, "2024-01-01")];
    let disp = vec![disposal("p1", -3.0, "2024-01-01")];
    let all = entries(&prod, &disp);
    let agg = aggregate(&all, |_| "all");
    let t = agg.get(&"all").unwrap();
    assert_eq!(t.production, 7.0);
    assert_eq!(t.disposal, 0.0);
}

#[test]
fn discard_rate_and_efficiency_bounds() {
    for d in [0.0, 1.0, 1e12, f64::MAX] {
        assert_eq!(discard_rate(d, 0.0), 0.0);
        assert_eq!(discard_rate(d, -1.0), 0.0);
        for p in [0.0, 0.5, 10.0, 1e12, f64::MAX] {
            let e = efficiency(p, d);
            assert!((0.0..=100.0).contains(&e), "efficiency({p}, {d}) = {e}");
        }
    }
}

#[test]
fn date_filter_is_idempotent() {
    let prod = vec![
        production("p1", 1.0, "2024-01-01"),
        production("p1", 1.0, "2024-01-03T12:00:00-05:00"),
        production("p1", 1.0, "2024-01-05"),
        production("p1", 1.0, "broken"),
    ];
    let all = entries(&prod, &[]);
    let zone = ReferenceZone::default();
    let criteria = FilterCriteria::new().with_dates(Some(day("2024-01-02")), Some(day("2024-01-05")));
    let once = filter_entries(&all, &criteria, &[], &zone);
    let twice = filter_entries(&once.entries, &criteria, &[], &zone);
    fn dates(es: &[Entry<'_>]) -> Vec<String> {
        es.iter().map(|e| e.date().to_string()).collect()
    }
    assert_eq!(dates(&once.entries), dates(&twice.entries));
    assert_eq!(once.entries.len(), 2);
    assert_eq!(once.invalid_dates, 1);
    assert_eq!(twice.invalid_dates, 0);
}

#[test]
fn every_catalog_product_gets_a_row() {
    let repo = InMemoryRepository::new();
    repo.create_product(bread()).unwrap();
    for name in ["Bagel", "Croissant", "Muffin"] {
        repo.create_product(Product {
            id: String::new(),
            name: name.into(),
            category: "Pastry".into(),
            unit: "pcs".into(),
            description: None,
        })
        .unwrap();
    }
    repo.create_production_entry(production("p1", 40.0, "2024-03-01")).unwrap();
    repo.create_disposal_entry(disposal("p1", 4.0, "2024-03-01")).unwrap();

    let data = Dataset::snapshot(&repo).unwrap();
    let rows = build_waste_report(
        &data.production,
        &data.disposal,
        &data.products,
        DateWindow::new(day("2024-03-01"), day("2024-03-31")),
        &ReferenceZone::default(),
    );
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].product_name, "Bread");
    assert_eq!(rows[0].discard_rate, 10.0);
    assert!(rows[1..].iter().all(|r| r.total_discarded == 0.0 && r.total_produced == 0.0));
}
