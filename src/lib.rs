// ABOUTME: Library root for ferry - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod archive;
pub mod compose;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod inspect;
pub mod migrate;
pub mod output;
pub mod runtime;
pub mod ssh;
pub mod types;
