use thiserror::Error;

/// Failures of the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("{entity} not found: id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("product name already exists: {0}")]
    DuplicateProductName(String),

    #[error("duplicate id for {entity}: {id}")]
    DuplicateId { entity: &'static str, id: String },

    #[error("validation failed (field={field}): {message}")]
    Validation { field: &'static str, message: String },

    #[error("repository lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown timezone {name}: {reason}")]
    InvalidTimezone { name: String, reason: String },

    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Errors surfaced by loading data and writing report files.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no data loaded")]
    NoData,
}
