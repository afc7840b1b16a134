//! RMCP-based MCP server for the Metabase bridge
//!
//! Uses the official rmcp crate to implement Model Context Protocol over stdio.
//! The server exposes a single tool, `metabase-tool`, which runs a native query
//! against the configured database.
//!
//! ## Usage Example
//!
//! ```json
//! { "name": "metabase-tool", "arguments": { "query": "SELECT COUNT(*) FROM users" } }
//! ```
//!
//! Every failure (bad arguments, unreachable host, timeout) comes back as a
//! tool result with `isError: true`; the JSON-RPC call itself only fails for
//! an unknown tool name.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use serde_json::Map as JsonObject;
use tokio::io::{stdin, stdout};
use tracing::{debug, error, info, warn};

use crate::args::{QueryArgs, QUERY_ARG};
use crate::client::{DatasetBackend, MetabaseClient};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::query::NativeDatasetQuery;

/// Name of the exposed tool
pub const TOOL_NAME: &str = "metabase-tool";

/// Description of the exposed tool
pub const TOOL_DESCRIPTION: &str = "Metabase mcp can access dashboards, execute queries";

/// Name reported in the MCP handshake
pub const SERVER_NAME: &str = "metabase-mcp";

/// Tool definition advertised in `tools/list`
pub fn query_tool() -> Tool {
    let schema = serde_json::json!({
        "type": "object",
        "properties": {
            QUERY_ARG: {
                "type": "string",
                "description": "The query to execute against the db"
            }
        },
        "required": [QUERY_ARG]
    });
    let schema = if let serde_json::Value::Object(obj) = schema {
        Arc::new(obj)
    } else {
        Arc::new(JsonObject::new())
    };

    Tool::new(TOOL_NAME, TOOL_DESCRIPTION, schema)
}

/// Metabase bridge service
pub struct MetabaseBridge<B = MetabaseClient> {
    backend: Arc<B>,
}

impl<B: DatasetBackend> MetabaseBridge<B> {
    /// Create a bridge over a backend
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Get the backend reference
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Handle one `metabase-tool` call
    ///
    /// `cancelled` resolves when the caller gives up; the outbound request is
    /// dropped at that point. Panics are caught and reported as tool errors.
    pub async fn handle_query<F>(
        &self,
        arguments: Option<&JsonObject<String, serde_json::Value>>,
        cancelled: F,
    ) -> CallToolResult
    where
        F: Future<Output = ()>,
    {
        let outcome = AssertUnwindSafe(self.run_query(arguments, cancelled))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(BridgeError::panicked(panic.as_ref())));

        match outcome {
            Ok(text) => CallToolResult::success(vec![Content::text(text)]),
            Err(e) => {
                warn!("{} failed: {}", TOOL_NAME, e);
                e.into_tool_result()
            }
        }
    }

    async fn run_query<F>(
        &self,
        arguments: Option<&JsonObject<String, serde_json::Value>>,
        cancelled: F,
    ) -> Result<String, BridgeError>
    where
        F: Future<Output = ()>,
    {
        let args = QueryArgs::from_arguments(arguments)?;
        let query = NativeDatasetQuery::new(self.backend.database_id(), args.query);
        debug!("Running native query on database {}", query.database);

        // A cancelled client has already abandoned the request; the result
        // below only unwinds the handler and is never read.
        let outcome = tokio::select! {
            outcome = self.backend.execute(query) => outcome?,
            () = cancelled => {
                info!("{} call cancelled by client", TOOL_NAME);
                return Err(BridgeError::Cancelled);
            }
        };

        outcome
            .to_pretty_json()
            .map_err(|e| BridgeError::serialization("format response", e))
    }
}

impl<B: DatasetBackend + 'static> ServerHandler for MetabaseBridge<B> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                title: Some("Metabase MCP Bridge".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Runs native (SQL) queries against a Metabase database via the metabase-tool tool"
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: vec![query_tool()],
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        if request.name != TOOL_NAME {
            return Err(ErrorData::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ));
        }

        Ok(self
            .handle_query(request.arguments.as_ref(), context.ct.cancelled())
            .await)
    }
}

/// Run the bridge over stdio until the client disconnects
pub async fn run(config: BridgeConfig) -> Result<()> {
    use rmcp::serve_server;

    info!(
        "Starting {} for database {} at {}",
        SERVER_NAME, config.database_id, config.base_url
    );

    let client = MetabaseClient::new(config)?;
    let service = MetabaseBridge::new(client);

    let transport = (stdin(), stdout());
    let server = serve_server(service, transport).await.map_err(|e| {
        error!("Failed to start server: {:?}", e);
        anyhow::anyhow!("Failed to start server: {:?}", e)
    })?;
    info!("MCP server started, waiting for requests");

    let quit_reason = server.waiting().await.map_err(|e| {
        error!("Server error: {:?}", e);
        anyhow::anyhow!("Server error: {:?}", e)
    })?;

    info!("Server shutdown with reason: {:?}", quit_reason);
    Ok(())
}
