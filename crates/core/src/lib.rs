//! Core types and shared functionality for vestibule.
//!
//! This crate provides:
//! - Versioned cache store with SQLite backend
//! - Request identity types
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheDb, StoredEntry};
pub use error::Error;
pub use request::ResourceRequest;
