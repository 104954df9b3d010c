//! Persistence contract consumed by the report pipeline, plus an in-memory
//! implementation. Reads hand out fresh snapshots; nothing downstream holds a
//! reference into the store.

use std::sync::RwLock;

use crate::error::RepositoryError;
use crate::types::{DisposalEntry, Entry, Product, ProductionEntry};

pub trait BakeryRepository {
    fn products(&self) -> Result<Vec<Product>, RepositoryError>;
    fn production_entries(&self) -> Result<Vec<ProductionEntry>, RepositoryError>;
    fn disposal_entries(&self) -> Result<Vec<DisposalEntry>, RepositoryError>;

    /// Stores the entry and returns it with its assigned id.
    fn create_production_entry(&self, entry: ProductionEntry) -> Result<ProductionEntry, RepositoryError>;
    fn create_disposal_entry(&self, entry: DisposalEntry) -> Result<DisposalEntry, RepositoryError>;
    fn delete_production_entry(&self, id: &str) -> Result<(), RepositoryError>;
    fn delete_disposal_entry(&self, id: &str) -> Result<(), RepositoryError>;

    fn create_product(&self, product: Product) -> Result<Product, RepositoryError>;
    fn update_product(&self, product: Product) -> Result<Product, RepositoryError>;
    fn delete_product(&self, id: &str) -> Result<(), RepositoryError>;

    fn clear_products(&self) -> Result<(), RepositoryError>;
    fn clear_production_entries(&self) -> Result<(), RepositoryError>;
    fn clear_disposal_entries(&self) -> Result<(), RepositoryError>;
}

/// Point-in-time copy of every collection, fed to the report builders.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub products: Vec<Product>,
    pub production: Vec<ProductionEntry>,
    pub disposal: Vec<DisposalEntry>,
}

impl Dataset {
    pub fn snapshot(repo: &dyn BakeryRepository) -> Result<Self, RepositoryError> {
        Ok(Dataset {
            products: repo.products()?,
            production: repo.production_entries()?,
            disposal: repo.disposal_entries()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.production.is_empty() && self.disposal.is_empty()
    }

    pub fn entries(&self) -> Vec<Entry<'_>> {
        crate::types::entries(&self.production, &self.disposal)
    }
}

#[derive(Default)]
struct Store {
    products: Vec<Product>,
    production: Vec<ProductionEntry>,
    disposal: Vec<DisposalEntry>,
    next_id: u64,
}

impl Store {
    fn assign_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn name_taken(&self, name: &str, except_id: Option<&str>) -> bool {
        let wanted = name.trim().to_lowercase();
        self.products
            .iter()
            .any(|p| Some(p.id.as_str()) != except_id && p.name.trim().to_lowercase() == wanted)
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Store) -> T) -> Result<T, RepositoryError> {
        let guard = self.store.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(f(&*guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Store) -> Result<T, RepositoryError>) -> Result<T, RepositoryError> {
        let mut guard = self.store.write().map_err(|_| RepositoryError::LockPoisoned)?;
        f(&mut *guard)
    }
}

fn check_quantity(quantity: f64) -> Result<(), RepositoryError> {
    if quantity.is_finite() && quantity >= 0.0 {
        Ok(())
    } else {
        Err(RepositoryError::Validation {
            field: "quantity",
            message: format!("must be a non-negative number, got {}", quantity),
        })
    }
}

fn check_required(field: &'static str, value: &str) -> Result<(), RepositoryError> {
    if value.trim().is_empty() {
        Err(RepositoryError::Validation {
            field,
            message: "must not be empty".to_string(),
        })
    } else {
        Ok(())
    }
}

impl BakeryRepository for InMemoryRepository {
    fn products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.read(|s| s.products.clone())
    }

    fn production_entries(&self) -> Result<Vec<ProductionEntry>, RepositoryError> {
        self.read(|s| s.production.clone())
    }

    fn disposal_entries(&self) -> Result<Vec<DisposalEntry>, RepositoryError> {
        self.read(|s| s.disposal.clone())
    }

    fn create_production_entry(&self, mut entry: ProductionEntry) -> Result<ProductionEntry, RepositoryError> {
        check_required("product_name", &entry.product_name)?;
        check_quantity(entry.quantity)?;
        self.write(|s| {
            if entry.id.trim().is_empty() {
                entry.id = s.assign_id("prod");
            } else if s.production.iter().any(|e| e.id == entry.id) {
                return Err(RepositoryError::DuplicateId { entity: "production entry", id: entry.id.clone() });
            }
            s.production.push(entry.clone());
            tracing::debug!(id = %entry.id, product = %entry.product_name, "production entry created");
            Ok(entry)
        })
    }

    fn create_disposal_entry(&self, mut entry: DisposalEntry) -> Result<DisposalEntry, RepositoryError> {
        check_required("product_name", &entry.product_name)?;
        check_quantity(entry.quantity)?;
        self.write(|s| {
            if entry.id.trim().is_empty() {
                entry.id = s.assign_id("disp");
            } else if s.disposal.iter().any(|e| e.id == entry.id) {
                return Err(RepositoryError::DuplicateId { entity: "disposal entry", id: entry.id.clone() });
            }
            s.disposal.push(entry.clone());
            tracing::debug!(id = %entry.id, product = %entry.product_name, "disposal entry created");
            Ok(entry)
        })
    }

    fn delete_production_entry(&self, id: &str) -> Result<(), RepositoryError> {
        self.write(|s| {
            let before = s.production.len();
            s.production.retain(|e| e.id != id);
            if s.production.len() == before {
                return Err(RepositoryError::NotFound { entity: "production entry", id: id.to_string() });
            }
            Ok(())
        })
    }

    fn delete_disposal_entry(&self, id: &str) -> Result<(), RepositoryError> {
        self.write(|s| {
            let before = s.disposal.len();
            s.disposal.retain(|e| e.id != id);
            if s.disposal.len() == before {
                return Err(RepositoryError::NotFound { entity: "disposal entry", id: id.to_string() });
            }
            Ok(())
        })
    }

    fn create_product(&self, mut product: Product) -> Result<Product, RepositoryError> {
        check_required("name", &product.name)?;
        self.write(|s| {
            if s.name_taken(&product.name, None) {
                return Err(RepositoryError::DuplicateProductName(product.name.trim().to_string()));
            }
            if product.id.trim().is_empty() {
                product.id = s.assign_id("product");
            } else if s.products.iter().any(|p| p.id == product.id) {
                return Err(RepositoryError::DuplicateId { entity: "product", id: product.id.clone() });
            }
            s.products.push(product.clone());
            Ok(product)
        })
    }

    fn update_product(&self, product: Product) -> Result<Product, RepositoryError> {
        check_required("name", &product.name)?;
        self.write(|s| {
            let idx = s
                .products
                .iter()
                .position(|p| p.id == product.id)
                .ok_or_else(|| RepositoryError::NotFound { entity: "product", id: product.id.clone() })?;
            if s.name_taken(&product.name, Some(&product.id)) {
                return Err(RepositoryError::DuplicateProductName(product.name.trim().to_string()));
            }
            s.products[idx] = product.clone();
            Ok(product)
        })
    }

    fn delete_product(&self, id: &str) -> Result<(), RepositoryError> {
        self.write(|s| {
            let before = s.products.len();
            s.products.retain(|p| p.id != id);
            if s.products.len() == before {
                return Err(RepositoryError::NotFound { entity: "product", id: id.to_string() });
            }
            Ok(())
        })
    }

    fn clear_products(&self) -> Result<(), RepositoryError> {
        self.write(|s| {
            s.products.clear();
            Ok(())
        })
    }

    fn clear_production_entries(&self) -> Result<(), RepositoryError> {
        self.write(|s| {
            s.production.clear();
            Ok(())
        })
    }

    fn clear_disposal_entries(&self) -> Result<(), RepositoryError> {
        self.write(|s| {
            s.disposal.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Shift;

    fn product(id: &str, name: &str) -> Product {
        Product {
            id: id.into(),
            name: name.into(),
            category: "Bread".into(),
            unit: "loaf".into(),
            description: None,
        }
    }

    fn production(qty: f64) -> ProductionEntry {
        ProductionEntry {
            id: String::new(),
            product_id: "p1".into(),
            product_name: "Sourdough".into(),
            staff_name: "Kim".into(),
            date: "2024-05-01".into(),
            quantity: qty,
            shift: Shift::Morning,
            expiration_date: "2024-05-03".into(),
            notes: None,
        }
    }

    #[test]
    fn product_names_are_unique_ignoring_case() {
        let repo = InMemoryRepository::new();
        repo.create_product(product("p1", "Sourdough")).unwrap();
        let err = repo.create_product(product("p2", "  sourDOUGH ")).unwrap_err();
        assert_eq!(err, RepositoryError::DuplicateProductName("sourDOUGH".into()));

        // Renaming a product to its own name is fine.
        repo.update_product(product("p1", "SOURDOUGH")).unwrap();
        repo.create_product(product("p2", "Rye")).unwrap();
        assert!(matches!(
            repo.update_product(product("p2", "sourdough")),
            Err(RepositoryError::DuplicateProductName(_))
        ));
    }

    #[test]
    fn updating_unknown_product_reports_not_found_before_name_clash() {
        let repo = InMemoryRepository::new();
        repo.create_product(product("p1", "Sourdough")).unwrap();
        let err = repo.update_product(product("ghost", "Sourdough")).unwrap_err();
        assert_eq!(err, RepositoryError::NotFound { entity: "product", id: "ghost".into() });
    }

    #[test]
    fn missing_ids_are_assigned_and_snapshots_are_copies() {
        let repo = InMemoryRepository::new();
        let a = repo.create_production_entry(production(10.0)).unwrap();
        let b = repo.create_production_entry(production(5.0)).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("prod-"));

        let mut snapshot = repo.production_entries().unwrap();
        snapshot.clear();
        assert_eq!(repo.production_entries().unwrap().len(), 2);
    }

    #[test]
    fn invalid_quantities_are_rejected() {
        let repo = InMemoryRepository::new();
        assert!(matches!(
            repo.create_production_entry(production(-1.0)),
            Err(RepositoryError::Validation { field: "quantity", .. })
        ));
        assert!(repo.create_production_entry(production(f64::NAN)).is_err());
    }

    #[test]
    fn deletes_report_missing_ids() {
        let repo = InMemoryRepository::new();
        repo.create_product(product("p1", "Sourdough")).unwrap();
        repo.delete_product("p1").unwrap();
        assert!(matches!(repo.delete_product("p1"), Err(RepositoryError::NotFound { .. })));
        assert!(repo.delete_disposal_entry("nope").is_err());
        assert!(repo.update_product(product("ghost", "Ghost")).is_err());
    }

    #[test]
    fn clear_and_snapshot() {
        let repo = InMemoryRepository::new();
        repo.create_product(product("p1", "Sourdough")).unwrap();
        repo.create_production_entry(production(3.0)).unwrap();
        let data = Dataset::snapshot(&repo).unwrap();
        assert_eq!(data.products.len(), 1);
        assert_eq!(data.entries().len(), 1);

        repo.clear_production_entries().unwrap();
        repo.clear_products().unwrap();
        repo.clear_disposal_entries().unwrap();
        assert!(Dataset::snapshot(&repo).unwrap().is_empty());
        // The earlier snapshot is unaffected.
        assert_eq!(data.production.len(), 1);
    }
}
