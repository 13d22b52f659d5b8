//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cache`] - Cache management (clear, stats)
//! - [`config`] - Configuration management (path, show, init)
//! - [`get`] - Single preview download through the cache
//! - [`warm`] - Bulk warm-up and refresh

pub mod cache;
pub mod common;
pub mod config;
pub mod get;
pub mod warm;
