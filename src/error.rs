use thiserror::Error;

#[derive(Error, Debug)]
pub enum TdsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Required sheet not found: {0}")]
    MissingSheet(String),

    #[error("No recognizable column codes or headers in sheet '{0}'")]
    NoColumns(String),

    #[error("Unsupported challan input format: {0}")]
    UnknownFormat(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TdsError>;
