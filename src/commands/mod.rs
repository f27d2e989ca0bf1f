// ABOUTME: Command module aggregator for the ferry CLI.
// ABOUTME: Re-exports migrate, resume and archive command handlers.

pub mod archive;
mod migrate;
mod resume;
mod runtime_connection;

pub use migrate::migrate;
pub use resume::resume;
