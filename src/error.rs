//! Error types for dashboard operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a dataset from the configured source file.
///
/// Always fatal to a dashboard render: without a dataset there is nothing
/// meaningful to show, so the page degrades to an error notice.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("dataset file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read dataset file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported dataset format '{extension}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("dataset file {} contains no header row", path.display())]
    Empty { path: PathBuf },

    #[error("failed to parse dataset file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

impl DataLoadError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            DataLoadError::NotFound { path }
        } else {
            DataLoadError::Unreadable { path, source }
        }
    }

    /// Path of the file that failed to load.
    pub fn path(&self) -> &std::path::Path {
        match self {
            DataLoadError::NotFound { path }
            | DataLoadError::Unreadable { path, .. }
            | DataLoadError::UnsupportedFormat { path, .. }
            | DataLoadError::Empty { path }
            | DataLoadError::Parse { path, .. } => path,
        }
    }
}

/// A chart could not be drawn even though its column requirement held.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("column '{column}' is not present in the dataset")]
    UnknownColumn { column: String },

    #[error("column '{column}' has no numeric values to plot")]
    NotNumeric { column: String },

    #[error("{chart} chart cannot be drawn from {columns}")]
    ColumnSpecMismatch { chart: String, columns: String },

    #[error("no data points available for {chart}")]
    NoData { chart: String },

    #[error("chart drawing failed: {reason}")]
    Draw { reason: String },

    #[error("chart renderer panicked: {reason}")]
    Panicked { reason: String },
}

/// The backend cache refused or failed to clear.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheClearError {
    #[error("backend cache clear failed: {reason}")]
    Backend { reason: String },
}

/// Invalid visualization registry declaration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("row {row} holds {len} slots; rows hold between 1 and 3")]
    RowWidth { row: usize, len: usize },

    #[error("duplicate visualization id '{id}'")]
    DuplicateId { id: String },

    #[error("visualization '{id}' declares no required columns")]
    NoRequiredColumns { id: String },
}

/// Invalid configuration value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
