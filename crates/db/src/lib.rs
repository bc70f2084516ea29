pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoCatalog, SeedResult, SeededCourse, VerificationResult};
pub use repositories::{RepositoryError, SqlCourseCatalog, SqlUserStore};
