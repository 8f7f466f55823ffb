//! MCP tools exposing the orchestrator to the LLM host.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Role;
use crate::error::{Error, Result};
use crate::orchestrator::Orchestrator;
use crate::protocol::{ToolCallResult, ToolDefinition};
use crate::workflow::{StepTemplate, WorkflowKind, WorkflowTemplate};

/// An MCP tool.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult>;
}

/// Context passed to tools during execution.
pub struct ToolContext {
    pub orchestrator: Arc<Orchestrator>,
    /// Fires on server shutdown; running workflows stop at the next step boundary.
    pub shutdown: CancellationToken,
}

impl ToolContext {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    context: Arc<ToolContext>,
}

impl ToolRegistry {
    /// Tools for the orchestrator's role.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self::with_context(ToolContext::new(orchestrator))
    }

    /// Tools for the context's role.
    pub fn with_context(context: ToolContext) -> Self {
        let workflows = context.orchestrator.available_workflows();
        let mut registry = Self {
            tools: BTreeMap::new(),
            context: Arc::new(context),
        };

        registry.register(Arc::new(SendMessageTool));
        registry.register(Arc::new(ListAgentsTool));
        registry.register(Arc::new(StatusTool));
        registry.register(Arc::new(CustomWorkflowTool));
        registry.register(Arc::new(ReloadAgentsTool));
        for kind in workflows {
            registry.register(Arc::new(WorkflowTool { kind }));
        }
        registry
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    /// All tool definitions, by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Names of the registered tools.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Shared tool context.
    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::InvalidParams(format!("unknown tool: {}", name)))?;

        tool.execute(arguments, &self.context).await
    }
}

/// Sends a task to one named remote agent.
pub struct SendMessageTool;

#[derive(Debug, Deserialize)]
struct SendMessageArgs {
    agent_name: String,
    task: String,
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    context_id: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[async_trait::async_trait]
impl Tool for SendMessageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "send_message".into(),
            description: "Send a task to a specific remote agent by name. \
                          Include all context the agent needs."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "agent_name": {
                        "type": "string",
                        "description": "Name of the remote agent, as listed by list_remote_agents"
                    },
                    "task": {
                        "type": "string",
                        "description": "Full task description and context for the agent"
                    },
                    "task_id": {
                        "type": "string",
                        "description": "Continue this remote task; kept for later sends"
                    },
                    "context_id": {
                        "type": "string",
                        "description": "Continue this conversation context; kept for later sends"
                    },
                    "metadata": {
                        "type": "object",
                        "description": "Inbound message metadata; a message_id entry is reused"
                    }
                },
                "required": ["agent_name", "task"]
            }),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: SendMessageArgs =
            serde_json::from_value(arguments).map_err(|e| Error::InvalidParams(e.to_string()))?;

        if args.task_id.is_some() || args.context_id.is_some() {
            context
                .orchestrator
                .set_task_context(args.task_id, args.context_id)
                .await;
        }
        if let Some(metadata) = args.metadata {
            context
                .orchestrator
                .set_input_message_metadata(metadata)
                .await;
        }

        match context
            .orchestrator
            .send_message(&args.agent_name, &args.task)
            .await
        {
            Ok(Some(task)) => Ok(ToolCallResult::text(serde_json::to_string_pretty(&task)?)),
            Ok(None) => Ok(ToolCallResult::text(format!(
                "{} returned no result",
                args.agent_name
            ))),
            Err(e) if e.is_hard() => Ok(ToolCallResult::error_text(e.to_string())),
            Err(e) => Err(e),
        }
    }
}

/// Runs one of the predefined workflows.
pub struct WorkflowTool {
    kind: WorkflowKind,
}

#[derive(Debug, Deserialize)]
struct WorkflowArgs {
    #[serde(alias = "workflow_request", alias = "monitoring_request")]
    request: String,
}

impl WorkflowTool {
    fn name(&self) -> &'static str {
        match self.kind {
            WorkflowKind::Buyer => "execute_buyer_workflow",
            WorkflowKind::Supplier => "execute_supplier_workflow",
            WorkflowKind::OrderMonitoring => "execute_order_monitoring_workflow",
            WorkflowKind::Custom => "execute_custom_workflow",
        }
    }

    fn description(&self) -> &'static str {
        match self.kind {
            WorkflowKind::Buyer => {
                "Run the buyer workflow: Inventory Management → Purchase Validation → \
                 Purchase Order generation."
            }
            WorkflowKind::Supplier => {
                "Run the supplier workflow: Order Intelligence → Production Queue Management."
            }
            WorkflowKind::OrderMonitoring => {
                "Monitor incoming emails for new purchase orders and queue any found orders \
                 for production."
            }
            WorkflowKind::Custom => "Run a custom workflow.",
        }
    }
}

#[async_trait::async_trait]
impl Tool for WorkflowTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().into(),
            description: self.description().into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "request": {
                        "type": "string",
                        "description": "The overall workflow request and context"
                    }
                },
                "required": ["request"]
            }),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: WorkflowArgs =
            serde_json::from_value(arguments).map_err(|e| Error::InvalidParams(e.to_string()))?;
        let template = WorkflowTemplate::predefined(self.kind)
            .ok_or_else(|| Error::Workflow(format!("no predefined workflow for {:?}", self.kind)))?;

        let run = context
            .orchestrator
            .execute_workflow_with_cancel(&template, &args.request, &context.shutdown)
            .await;
        info!(workflow_id = %run.workflow_id, status = ?run.status, "workflow tool finished");

        Ok(ToolCallResult::text(serde_json::to_string_pretty(&run)?))
    }
}

/// Runs an ad-hoc sequence of agent calls.
pub struct CustomWorkflowTool;

#[derive(Debug, Deserialize)]
struct CustomWorkflowArgs {
    #[serde(default)]
    name: Option<String>,
    request: String,
    steps: Vec<CustomStepDef>,
}

#[derive(Debug, Deserialize)]
struct CustomStepDef {
    agent_name: String,
    task: String,
}

#[async_trait::async_trait]
impl Tool for CustomWorkflowTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "execute_custom_workflow".into(),
            description: "Run an ordered sequence of agent tasks. Task text may use {request}, \
                          {prev} and {stepN} to embed the request and earlier results."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Workflow name" },
                    "request": { "type": "string", "description": "The overall request" },
                    "steps": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "agent_name": { "type": "string" },
                                "task": { "type": "string" }
                            },
                            "required": ["agent_name", "task"]
                        }
                    }
                },
                "required": ["request", "steps"]
            }),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: CustomWorkflowArgs =
            serde_json::from_value(arguments).map_err(|e| Error::InvalidParams(e.to_string()))?;
        if args.steps.is_empty() {
            return Err(Error::InvalidParams("workflow needs at least one step".into()));
        }

        let template = args.steps.into_iter().fold(
            WorkflowTemplate::new(
                args.name.unwrap_or_else(|| "custom workflow".into()),
                WorkflowKind::Custom,
            ),
            |template, step| template.step(StepTemplate::text(step.agent_name, step.task)),
        );

        let run = context
            .orchestrator
            .execute_workflow_with_cancel(&template, &args.request, &context.shutdown)
            .await;

        Ok(ToolCallResult::text(serde_json::to_string_pretty(&run)?))
    }
}

/// Lists the remote agents the orchestrator can delegate to.
pub struct ListAgentsTool;

#[async_trait::async_trait]
impl Tool for ListAgentsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_remote_agents".into(),
            description: "List the available remote agents you can use to delegate tasks.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let agents = context.orchestrator.list_remote_agents().await;
        Ok(ToolCallResult::text(serde_json::to_string_pretty(&agents)?))
    }
}

/// Reports role, active agent, and call statistics.
pub struct StatusTool;

#[async_trait::async_trait]
impl Tool for StatusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "orchestrator_status".into(),
            description: "Get the orchestrator's role, active agent, registered agents \
                          and call statistics."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let status = context.orchestrator.status().await;

        let agents = if status.agents.is_empty() {
            "No agents registered".to_string()
        } else {
            status
                .agents
                .iter()
                .map(|a| {
                    let line = format!("- **{}**: {}", a.name, a.description);
                    match status.agent_stats.get(&a.name) {
                        Some(s) => format!(
                            "{} ({} calls, {} tasks, {} no result, {} failed)",
                            line, s.total_requests, s.tasks, s.no_result, s.failures
                        ),
                        None => line,
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(ToolCallResult::text(format!(
            "# Orchestrator Status\n\n**Role:** {}\n**Session:** {}\n**Active agent:** {}\n\
             **Workflows:** {} completed, {} failed\n\n## Agents\n\n{}",
            role_label(status.role),
            status.session_id,
            status.active_agent.as_deref().unwrap_or("None"),
            status.workflows_completed,
            status.workflows_failed,
            agents
        )))
    }
}

/// Re-runs agent discovery and swaps in the new registry.
pub struct ReloadAgentsTool;

#[async_trait::async_trait]
impl Tool for ReloadAgentsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "reload_agents".into(),
            description: "Re-fetch the configured agent cards. Running workflows keep the agents \
                          they started with."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let count = context.orchestrator.reload().await?;
        let agents = context.orchestrator.registry().await.agents_summary();
        Ok(ToolCallResult::text(format!("{} agents registered\n{}", count, agents)))
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Buyer => "buyer",
        Role::Supplier => "supplier",
    }
}
