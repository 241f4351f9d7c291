use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlattenError {
    #[error("Workbook part missing: {0}")]
    MissingPart(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Required header cell {cell} is empty or unreadable ({what})")]
    MissingHeader { cell: String, what: String },

    #[error("Cannot parse reporting period from '{0}'")]
    InvalidPeriod(String),

    #[error("Header row marker '{0}' not found")]
    HeaderRowNotFound(String),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Converter '{binary}' is not available: {details}")]
    ConverterUnavailable { binary: String, details: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] calamine::XlsxError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlattenError>;
