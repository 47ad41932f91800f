//! MCP Server implementation
//!
//! Implements the Model Context Protocol server over newline-delimited
//! JSON-RPC on stdio.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::Result;
use crate::mcp::tools::ToolHandler;
use crate::mcp::types::*;

/// MCP Server info
const SERVER_NAME: &str = "outlook-mcp-server";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP Server for Outlook
pub struct McpServer {
    /// Tool handler
    tool_handler: ToolHandler,

    /// Whether the client sent `notifications/initialized`
    initialized: bool,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(tool_handler: ToolHandler) -> Self {
        Self {
            tool_handler,
            initialized: false,
        }
    }

    /// Whether the initialization handshake completed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the server on stdio
    pub async fn run_stdio(&mut self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve requests from `reader` until end of input, one at a time
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("Outlook MCP server started");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            match self.handle_message(&line).await {
                Ok(Some(response)) => {
                    let mut frame = serde_json::to_string(&response)?;
                    frame.push('\n');
                    writer.write_all(frame.as_bytes()).await?;
                    writer.flush().await?;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Error handling message: {}", e);
                }
            }
        }

        tracing::info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle an incoming JSON-RPC message
    pub async fn handle_message(&mut self, message: &str) -> Result<Option<JsonRpcResponse>> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                return Ok(Some(JsonRpcResponse::unidentified_error(
                    JsonRpcError::parse_error(e.to_string()),
                )));
            }
        };

        // Notifications get no reply
        let id = match request.id.clone() {
            Some(id) => id,
            None => {
                if request.method == methods::INITIALIZED {
                    self.initialized = true;
                } else {
                    tracing::debug!(method = %request.method, "Ignoring notification");
                }
                return Ok(None);
            }
        };

        tracing::debug!(method = %request.method, "Request received");

        let response = match request.method.as_str() {
            methods::INITIALIZE => JsonRpcResponse::success(id, self.handle_initialize()?),
            methods::PING => JsonRpcResponse::success(id, serde_json::json!({})),
            methods::LIST_TOOLS => JsonRpcResponse::success(id, self.handle_list_tools()?),
            methods::CALL_TOOL => self.handle_call_tool(id, &request).await?,
            _ => JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method)),
        };

        Ok(Some(response))
    }

    /// Handle initialize request
    fn handle_initialize(&self) -> Result<Value> {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {}),
            },
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request
    fn handle_list_tools(&self) -> Result<Value> {
        let result = ListToolsResult {
            tools: self.tool_handler.list_tools(),
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request
    ///
    /// A Graph client that cannot be built is reported as a JSON-RPC internal
    /// error rather than a tool result.
    async fn handle_call_tool(
        &self,
        id: RequestId,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse> {
        let params: CallToolParams = match request.params.clone().map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return Ok(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid tool parameters: {}", e)),
                ));
            }
            None => {
                return Ok(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tool parameters"),
                ));
            }
        };

        let arguments = params.arguments.unwrap_or(Value::Null);
        match self.tool_handler.call_tool(&params.name, arguments).await {
            Ok(result) => Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?)),
            Err(e) => Ok(JsonRpcResponse::error(
                id,
                JsonRpcError::internal_error(e.to_string()),
            )),
        }
    }
}
