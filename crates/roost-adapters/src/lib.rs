//! Concrete source adapters: direct HTML scraping, run-based scraping
//! services, and first-party listing APIs, plus the shared HTTP layer.

pub mod api;
pub mod direct;
pub mod factory;
pub mod http;
pub mod parse;
pub mod robots;
pub mod run_service;

pub use api::ApiAdapter;
pub use direct::DirectHtmlAdapter;
pub use factory::{AnyAdapter, DefaultAdapterFactory};
pub use http::HttpFetcher;
pub use robots::RobotsCache;
pub use run_service::RunServiceAdapter;
