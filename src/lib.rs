//! Bakery production and disposal reporting.
//!
//! Raw entries flow one way through the pipeline:
//! `filter` -> `aggregate` -> `metrics` -> `reports`, with `output` turning
//! report rows into CSV/JSON files and console previews. Data comes in
//! through a `repository::BakeryRepository` snapshot.

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod reports;
pub mod repository;
pub mod types;
pub mod util;

pub use calendar::{DateWindow, ReferenceZone};
pub use error::{ConfigError, ReportError, RepositoryError};
pub use repository::{BakeryRepository, Dataset, InMemoryRepository};
