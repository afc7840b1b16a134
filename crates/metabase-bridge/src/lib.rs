//! # Metabase Bridge
//!
//! MCP-to-Metabase bridge that exposes native Metabase queries as a single
//! Model Context Protocol tool.
//!
//! ## Features
//!
//! - **RMCP Protocol Support**: MCP over stdio using the official rmcp crate
//! - **One Tool**: `metabase-tool` runs a native (SQL) query through `POST /api/dataset`
//! - **Raw Fallback**: responses that are not datasets are surfaced with status and body
//! - **Tool-Level Errors**: validation, transport and timeout failures never fail the protocol call
//!
//! ## Quick Start
//!
//! ```no_run
//! use metabase_bridge::{start_bridge, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BridgeConfig::builder()
//!         .database_id(31)
//!         .base_url("https://metabase.example.com")
//!         .credential("metabase.SESSION=...")
//!         .build()?;
//!
//!     start_bridge(config).await?;
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod rmcp_server;

// Re-export main types for convenience
pub use args::QueryArgs;
pub use client::{DatasetBackend, MetabaseClient};
pub use config::{BridgeConfig, BridgeConfigBuilder, Credential};
pub use error::{ArgumentError, BridgeError, ConfigError};
pub use query::{NativeDatasetQuery, QueryOutcome, QueryResult, RawResponse};
pub use rmcp_server::{query_tool, MetabaseBridge, SERVER_NAME, TOOL_NAME};

use anyhow::Result;

/// Start a bridge for the given configuration on stdin/stdout.
///
/// Runs until the MCP client closes the connection.
pub async fn start_bridge(config: BridgeConfig) -> Result<()> {
    rmcp_server::run(config).await
}
