//! Error types for the climate pipeline.

use thiserror::Error;

/// Result type alias using ClimateError.
pub type ClimateResult<T> = Result<T, ClimateError>;

/// Primary error type for pipeline operations.
#[derive(Debug, Error)]
pub enum ClimateError {
    // === Source Errors ===
    #[error("Unreadable or malformed source: {0}")]
    Format(String),

    #[error("No conversion from unit '{unit}' for measurement '{measurement}'")]
    UnsupportedUnit { unit: String, measurement: String },

    #[error("Unknown measurement: {0}")]
    UnknownMeasurement(String),

    #[error("Required data missing: {0}")]
    MissingData(String),

    // === Geometry Errors ===
    #[error("Coordinate out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Incompatible grids: {0}")]
    IncompatibleGrid(String),

    // === Storage Errors ===
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // === Rendering Errors ===
    #[error("Rendering failed: {0}")]
    Render(String),

    // === Infrastructure Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClimateError {
    /// Short machine-readable name of the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClimateError::Format(_) => "FormatError",
            ClimateError::UnsupportedUnit { .. } => "UnsupportedUnitError",
            ClimateError::UnknownMeasurement(_) => "UnknownMeasurementError",
            ClimateError::MissingData(_) => "MissingDataError",
            ClimateError::OutOfBounds(_) => "OutOfBoundsError",
            ClimateError::IncompatibleGrid(_) => "IncompatibleGridError",
            ClimateError::NotFound(_) => "NotFoundError",
            ClimateError::Catalog(_) => "CatalogError",
            ClimateError::Storage(_) => "StorageError",
            ClimateError::Render(_) => "RenderError",
            ClimateError::Config(_) => "ConfigError",
            ClimateError::Io(_) => "IoError",
        }
    }

    /// Process exit code for a batch invocation that failed with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ClimateError::Config(_) => 2,

            ClimateError::Format(_)
            | ClimateError::UnsupportedUnit { .. }
            | ClimateError::UnknownMeasurement(_) => 3,

            ClimateError::MissingData(_) | ClimateError::NotFound(_) => 4,

            ClimateError::OutOfBounds(_) | ClimateError::IncompatibleGrid(_) => 5,

            ClimateError::Catalog(_) => 6,

            _ => 1,
        }
    }
}

impl From<serde_json::Error> for ClimateError {
    fn from(err: serde_json::Error) -> Self {
        ClimateError::Format(format!("JSON error: {}", err))
    }
}
