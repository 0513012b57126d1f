//! Libraryd - library management service
//!
//! This crate provides the account side of the library service: the
//! organisation hierarchy, reader accounts and the batch import pipeline that
//! creates them from CSV or spreadsheet files.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod import;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
