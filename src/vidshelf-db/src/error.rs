//! Catalog error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("catalog lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, CatalogError>;
