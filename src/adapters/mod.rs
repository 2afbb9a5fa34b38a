//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Memory: process-local user store
//! - File store: JSON document on disk with atomic replace
//! - CLI: Command-line interface handlers

pub mod memory;
pub mod file_store;
pub mod cli;

pub use memory::InMemoryUserStore;
pub use file_store::JsonFileStore;
pub use cli::CliApp;
