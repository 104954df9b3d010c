use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

use crate::aggregate::sanitize_quantity;
use crate::error::{ReportError, RepositoryError};
use crate::repository::BakeryRepository;
use crate::types::{
    DisposalEntry, Product, ProductionEntry, RawDisposalRow, RawProductRow, RawProductionRow, Shift,
};
use crate::util::{non_blank, parse_f64_safe};

pub const PRODUCTS_FILE: &str = "products.csv";
pub const PRODUCTION_FILE: &str = "production.csv";
pub const DISPOSAL_FILE: &str = "disposal.csv";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub duplicate_products: usize,
    pub coerced_quantities: usize,
}

struct RawRows<T> {
    rows: Vec<T>,
    total: usize,
    errors: usize,
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<RawRows<T>, ReportError> {
    let mut rdr = ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_path(path)?;
    let mut out = RawRows { rows: Vec::new(), total: 0, errors: 0 };
    for result in rdr.deserialize::<T>() {
        out.total += 1;
        match result {
            Ok(r) => out.rows.push(r),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed row");
                out.errors += 1;
            }
        }
    }
    Ok(out)
}

/// Catalog names keyed both ways so entry rows can carry either reference.
struct CatalogIndex {
    name_by_id: HashMap<String, String>,
    id_by_name: HashMap<String, String>,
}

impl CatalogIndex {
    fn new(products: &[Product]) -> Self {
        CatalogIndex {
            name_by_id: products.iter().map(|p| (p.id.clone(), p.name.clone())).collect(),
            id_by_name: products.iter().map(|p| (p.name.trim().to_lowercase(), p.id.clone())).collect(),
        }
    }

    /// (product_id, product_name); `None` if neither column is usable.
    fn resolve(&self, id: Option<String>, name: Option<String>) -> Option<(String, String)> {
        match (id, name) {
            (Some(id), Some(name)) => Some((id, name)),
            (Some(id), None) => {
                let name = self.name_by_id.get(&id).cloned()?;
                Some((id, name))
            }
            (None, Some(name)) => {
                let id = self.id_by_name.get(&name.to_lowercase()).cloned().unwrap_or_default();
                Some((id, name))
            }
            (None, None) => None,
        }
    }
}

fn parse_quantity(raw: Option<&str>, row_id: &str, report: &mut LoadReport) -> f64 {
    match parse_f64_safe(raw) {
        Some(q) if q.is_finite() && q >= 0.0 => q,
        Some(q) => {
            report.coerced_quantities += 1;
            sanitize_quantity(row_id, q)
        }
        None => {
            tracing::warn!(entry_id = row_id, raw = raw.unwrap_or(""), "non-numeric quantity, using 0");
            report.coerced_quantities += 1;
            0.0
        }
    }
}

/// Load the three CSV files from `data_dir` into `repo`.
///
/// Malformed rows are counted and skipped. A missing products file is an
/// error; missing entry files are treated as empty.
pub fn load_into(repo: &dyn BakeryRepository, data_dir: &Path) -> Result<LoadReport, ReportError> {
    let mut report = LoadReport::default();

    let raw_products: RawRows<RawProductRow> = read_rows(&data_dir.join(PRODUCTS_FILE))?;
    report.total_rows += raw_products.total;
    report.parse_errors += raw_products.errors;
    for row in raw_products.rows {
        let Some(name) = non_blank(row.name.as_deref()) else {
            report.parse_errors += 1;
            continue;
        };
        let product = Product {
            id: non_blank(row.id.as_deref()).unwrap_or_default(),
            name,
            category: non_blank(row.category.as_deref()).unwrap_or_else(|| "Uncategorized".to_string()),
            unit: non_blank(row.unit.as_deref()).unwrap_or_else(|| "pcs".to_string()),
            description: non_blank(row.description.as_deref()),
        };
        match repo.create_product(product) {
            Ok(_) => report.loaded_rows += 1,
            Err(RepositoryError::DuplicateProductName(name)) | Err(RepositoryError::DuplicateId { id: name, .. }) => {
                tracing::warn!(product = %name, "duplicate product skipped");
                report.duplicate_products += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let catalog = CatalogIndex::new(&repo.products()?);

    let production_path = data_dir.join(PRODUCTION_FILE);
    if production_path.exists() {
        let raw: RawRows<RawProductionRow> = read_rows(&production_path)?;
        report.total_rows += raw.total;
        report.parse_errors += raw.errors;
        for row in raw.rows {
            let Some((product_id, product_name)) =
                catalog.resolve(non_blank(row.product_id.as_deref()), non_blank(row.product_name.as_deref()))
            else {
                report.parse_errors += 1;
                continue;
            };
            let id = non_blank(row.id.as_deref()).unwrap_or_default();
            let quantity = parse_quantity(row.quantity.as_deref(), &id, &mut report);
            let entry = ProductionEntry {
                id,
                product_id,
                product_name,
                staff_name: non_blank(row.staff_name.as_deref()).unwrap_or_else(|| "Unknown".to_string()),
                date: row.date.unwrap_or_default(),
                quantity,
                shift: Shift::parse(row.shift.as_deref().unwrap_or("")),
                expiration_date: row.expiration_date.unwrap_or_default(),
                notes: non_blank(row.notes.as_deref()),
            };
            match repo.create_production_entry(entry) {
                Ok(_) => report.loaded_rows += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "production row rejected");
                    report.parse_errors += 1;
                }
            }
        }
    } else {
        tracing::warn!(path = %production_path.display(), "production file not found");
    }

    let disposal_path = data_dir.join(DISPOSAL_FILE);
    if disposal_path.exists() {
        let raw: RawRows<RawDisposalRow> = read_rows(&disposal_path)?;
        report.total_rows += raw.total;
        report.parse_errors += raw.errors;
        for row in raw.rows {
            let Some((product_id, product_name)) =
                catalog.resolve(non_blank(row.product_id.as_deref()), non_blank(row.product_name.as_deref()))
            else {
                report.parse_errors += 1;
                continue;
            };
            let id = non_blank(row.id.as_deref()).unwrap_or_default();
            let quantity = parse_quantity(row.quantity.as_deref(), &id, &mut report);
            let entry = DisposalEntry {
                id,
                product_id,
                product_name,
                staff_name: non_blank(row.staff_name.as_deref()).unwrap_or_else(|| "Unknown".to_string()),
                date: row.date.unwrap_or_default(),
                quantity,
                shift: Shift::parse(row.shift.as_deref().unwrap_or("")),
                reason: non_blank(row.reason.as_deref()).unwrap_or_else(|| "Unspecified".to_string()),
                notes: non_blank(row.notes.as_deref()),
            };
            match repo.create_disposal_entry(entry) {
                Ok(_) => report.loaded_rows += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "disposal row rejected");
                    report.parse_errors += 1;
                }
            }
        }
    } else {
        tracing::warn!(path = %disposal_path.display(), "disposal file not found");
    }

    tracing::info!(
        total = report.total_rows,
        loaded = report.loaded_rows,
        errors = report.parse_errors,
        "data loaded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn loads_and_counts_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            PRODUCTS_FILE,
            "id,name,category,unit,description\np1,Bread,Loaves,pcs,\np2,bread,Loaves,pcs,dup\np3,,Cakes,pcs,\n",
        );
        write(
            dir.path(),
            PRODUCTION_FILE,
            "id,product_id,product_name,staff_name,date,quantity,shift,expiration_date,notes\n\
             a1,p1,,Ana,2024-01-01,\"1,200\",Morning,2024-01-03,\n\
             a2,,Bread,Ana,2024-01-02,lots,night,2024-01-04,\n\
             a3,,,Ana,2024-01-02,5,night,2024-01-04,\n",
        );
        write(
            dir.path(),
            DISPOSAL_FILE,
            "id,product_id,product_name,staff_name,date,quantity,shift,reason,notes\n\
             d1,p1,Bread,Tom,2024-01-01T20:00:00,-4,evening,\"Expired,Damaged\",\n",
        );

        let repo = InMemoryRepository::new();
        let report = load_into(&repo, dir.path()).unwrap();
        assert_eq!(report.total_rows, 7);
        assert_eq!(report.loaded_rows, 4);
        assert_eq!(report.duplicate_products, 1);
        assert_eq!(report.parse_errors, 2);
        assert_eq!(report.coerced_quantities, 2);

        let production = repo.production_entries().unwrap();
        assert_eq!(production[0].quantity, 1200.0);
        assert_eq!(production[0].product_name, "Bread");
        assert_eq!(production[1].product_id, "p1");
        assert_eq!(production[1].quantity, 0.0);
        assert_eq!(production[1].shift, Shift::Night);

        let disposal = repo.disposal_entries().unwrap();
        assert_eq!(disposal[0].quantity, 0.0);
        assert_eq!(disposal[0].shift, Shift::Unknown);
        assert_eq!(disposal[0].reason, "Expired,Damaged");
    }

    #[test]
    fn missing_products_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemoryRepository::new();
        assert!(load_into(&repo, dir.path()).is_err());
    }

    #[test]
    fn missing_entry_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), PRODUCTS_FILE, "id,name,category,unit,description\np1,Bread,Loaves,pcs,\n");
        let repo = InMemoryRepository::new();
        let report = load_into(&repo, dir.path()).unwrap();
        assert_eq!(report.loaded_rows, 1);
        assert!(repo.production_entries().unwrap().is_empty());
    }
}
