mod common;
mod health_tests;
mod listing_tests;
mod source_tests;
