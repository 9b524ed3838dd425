// The binary is the product; the library exists for integration tests.
pub mod adapters;
pub mod cache;
pub mod cli;
pub mod config;
pub mod extraction;
pub mod logging;
pub mod rasterize;
pub mod response;
pub mod tasks;
pub mod types;
