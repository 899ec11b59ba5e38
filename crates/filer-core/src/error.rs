//! Error types for filer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid file content: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sheet {0} not found")]
    SheetNotFound(String),

    #[error("File store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
