use thiserror::Error;

use coursefinder_core::errors::{CatalogError, StoreError};

pub mod catalog;
pub mod user_courses;

pub use catalog::SqlCourseCatalog;
pub use user_courses::SqlUserStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

impl From<RepositoryError> for CatalogError {
    fn from(error: RepositoryError) -> Self {
        CatalogError::Unavailable(error.to_string())
    }
}
