//! MCP server on stdio, exposing the orchestrator's tools to an LLM host.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::protocol::{
    error_codes, InitializeResult, McpRequest, McpResponse, ServerInfo, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;

/// MCP server for one orchestrator.
pub struct OrchestratorMcpServer {
    registry: ToolRegistry,
    server_info: ServerInfo,
    initialized: AtomicBool,
}

impl OrchestratorMcpServer {
    /// Create a server exposing the tools for the orchestrator's role.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            registry: ToolRegistry::new(orchestrator),
            server_info: ServerInfo::default(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> Result<()> {
        info!("starting orchestrator MCP server on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve on arbitrary streams.
    ///
    /// Requests are handled concurrently with reading, so end of input cancels
    /// workflows that are still running. Replies are written as they complete.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut pending = FuturesUnordered::new();
        let mut reading = true;

        while reading || !pending.is_empty() {
            tokio::select! {
                line = lines.next_line(), if reading => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        debug!(message = %line, "received");
                        pending.push(self.handle_line(line));
                    }
                    None => {
                        info!("input closed; cancelling running workflows");
                        self.registry.context().shutdown.cancel();
                        reading = false;
                    }
                },
                Some(response) = pending.next(), if !pending.is_empty() => {
                    if let Some(response) = response {
                        let response_json = serde_json::to_string(&response)?;
                        debug!(message = %response_json, "sending");

                        writer.write_all(response_json.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_line(&self, line: String) -> Option<McpResponse> {
        self.handle_message(&line).await
    }

    /// Handle one message. Notifications produce no reply.
    pub async fn handle_message(&self, message: &str) -> Option<McpResponse> {
        let request: McpRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                error!(error = %e, "failed to parse request");
                return Some(McpResponse::error(None, error_codes::PARSE_ERROR, e.to_string()));
            }
        };

        if request.is_notification() {
            if request.method == "notifications/initialized" || request.method == "initialized" {
                self.initialized.store(true, Ordering::SeqCst);
                info!("MCP session initialized");
            } else {
                debug!(method = %request.method, "ignoring notification");
            }
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request).await,
            "tools/list" => self.handle_tools_list(&request),
            "tools/call" => self.handle_tools_call(&request).await,
            "ping" => McpResponse::success(request.id.clone(), json!({})),
            _ => McpResponse::error(
                request.id.clone(),
                error_codes::METHOD_NOT_FOUND,
                format!("unknown method: {}", request.method),
            ),
        };
        Some(response)
    }

    async fn handle_initialize(&self, request: &McpRequest) -> McpResponse {
        let orchestrator = &self.registry.context().orchestrator;
        let agents = orchestrator.registry().await.agents_summary();
        let workflows = orchestrator
            .available_workflows()
            .iter()
            .map(|k| format!("{:?}", k))
            .collect::<Vec<_>>()
            .join(", ");

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: json!({ "tools": { "listChanged": false } }),
            server_info: self.server_info.clone(),
            instructions: Some(format!(
                "Role: {:?} orchestrator. Workflows: {}. Use the workflow tools for complete \
                 runs and send_message for single tasks.\nAvailable agents:\n{}",
                orchestrator.role(),
                workflows,
                agents
            )),
        };

        match serde_json::to_value(result) {
            Ok(value) => McpResponse::success(request.id.clone(), value),
            Err(e) => McpResponse::error(
                request.id.clone(),
                error_codes::INTERNAL_ERROR,
                e.to_string(),
            ),
        }
    }

    fn handle_tools_list(&self, request: &McpRequest) -> McpResponse {
        McpResponse::success(
            request.id.clone(),
            json!({ "tools": self.registry.definitions() }),
        )
    }

    async fn handle_tools_call(&self, request: &McpRequest) -> McpResponse {
        let Some(name) = request.params.get("name").and_then(Value::as_str) else {
            return McpResponse::error(
                request.id.clone(),
                error_codes::INVALID_PARAMS,
                "missing tool name",
            );
        };
        let arguments = request
            .params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        if !self.initialized.load(Ordering::SeqCst) {
            warn!(tool = %name, "tool called before initialized notification");
        }
        info!(tool = %name, "calling tool");

        let outcome = self
            .registry
            .execute(name, arguments)
            .await
            .and_then(|result| serde_json::to_value(result).map_err(Into::into));

        match outcome {
            Ok(value) => McpResponse::success(request.id.clone(), value),
            Err(e) => {
                error!(tool = %name, error = %e, "tool execution failed");
                let code = match e {
                    crate::error::Error::InvalidParams(_) => error_codes::INVALID_PARAMS,
                    _ => error_codes::INTERNAL_ERROR,
                };
                McpResponse::error(request.id.clone(), code, e.to_string())
            }
        }
    }
}
