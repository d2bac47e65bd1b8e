pub mod config;
pub mod database;
pub mod health_repository;
pub mod listing_repository;
pub mod source_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use health_repository::HealthRepository;
pub use listing_repository::ListingRepository;
pub use source_repository::SourceRepository;
