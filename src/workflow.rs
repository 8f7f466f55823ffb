//! Workflow data model and the predefined buyer/supplier pipelines.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::a2a::Task;

/// Agent names used by the predefined workflows.
pub mod agents {
    pub const INVENTORY_MANAGEMENT: &str = "Inventory Management Agent";
    pub const PURCHASE_VALIDATION: &str = "Purchase Validation Agent";
    pub const PURCHASE_ORDER: &str = "Purchase Order Agent";
    pub const ORDER_INTELLIGENCE: &str = "Order Intelligence Agent";
    pub const PRODUCTION_QUEUE_MANAGEMENT: &str = "Production Queue Management Agent";
}

/// Outcome of one remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskResult {
    /// The agent returned a task.
    Task(Task),
    /// The agent answered without a usable task.
    NoResult,
    /// The call failed hard.
    Failure { reason: String },
}

impl TaskResult {
    /// The task, if any.
    pub fn task(&self) -> Option<&Task> {
        match self {
            TaskResult::Task(task) => Some(task),
            _ => None,
        }
    }

    /// Whether this is a hard failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskResult::Failure { .. })
    }
}

impl From<Option<Task>> for TaskResult {
    fn from(task: Option<Task>) -> Self {
        task.map_or(TaskResult::NoResult, TaskResult::Task)
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskResult::Task(task) => write!(f, "{}", task),
            TaskResult::NoResult => write!(f, "no result"),
            TaskResult::Failure { reason } => write!(f, "Failure({:?})", reason),
        }
    }
}

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Starting,
    Completed,
    Failed,
}

/// Which pipeline a run executed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Buyer,
    Supplier,
    OrderMonitoring,
    Custom,
}

impl WorkflowKind {
    /// Parse a kind from its tool/CLI spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "buyer" => Some(WorkflowKind::Buyer),
            "supplier" => Some(WorkflowKind::Supplier),
            "order_monitoring" | "monitoring" => Some(WorkflowKind::OrderMonitoring),
            "custom" => Some(WorkflowKind::Custom),
            _ => None,
        }
    }
}

/// A step that was attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// 1-based position in the run.
    #[serde(rename = "step")]
    pub index: usize,
    /// Agent the task was sent to.
    #[serde(rename = "agent")]
    pub agent_name: String,
    /// Task text as sent.
    #[serde(rename = "task")]
    pub task_text: String,
    /// Outcome of the call.
    pub result: TaskResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One invocation of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub workflow_id: String,
    pub workflow_type: WorkflowKind,
    pub status: WorkflowStatus,
    pub steps: Vec<WorkflowStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowRun {
    /// Start a new run.
    pub fn start(kind: WorkflowKind) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            workflow_type: kind,
            status: WorkflowStatus::Starting,
            steps: Vec::new(),
            summary: None,
            error: None,
        }
    }

    /// Mark the run completed.
    pub fn complete(&mut self, summary: impl Into<String>) {
        self.status = WorkflowStatus::Completed;
        self.summary = Some(summary.into());
    }

    /// Mark the run failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = WorkflowStatus::Failed;
        self.error = Some(error.into());
    }

    /// Whether the run has left `Starting`.
    pub fn is_terminal(&self) -> bool {
        self.status != WorkflowStatus::Starting
    }

    /// Results of the attempted steps, in order.
    pub fn results(&self) -> Vec<TaskResult> {
        self.steps.iter().map(|s| s.result.clone()).collect()
    }

    /// Human-readable report.
    pub fn report(&self) -> String {
        let mut out = format!(
            "# Workflow {}\n\n**Type:** {:?}\n**Status:** {:?}\n",
            self.workflow_id, self.workflow_type, self.status
        );
        if let Some(summary) = &self.summary {
            out.push_str(&format!("**Summary:** {}\n", summary));
        }
        if let Some(error) = &self.error {
            out.push_str(&format!("**Error:** {}\n", error));
        }
        for step in &self.steps {
            out.push_str(&format!(
                "\n## Step {}: {}\n\n**Task:** {}\n\n**Result:** {}\n",
                step.index, step.agent_name, step.task_text, step.result
            ));
        }
        out
    }
}

/// What a running workflow can see when rendering the next step.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// The overall workflow request.
    pub request: &'a str,
    /// Results of the steps attempted so far.
    pub results: &'a [TaskResult],
}

impl<'a> StepContext<'a> {
    /// Result of the previous step.
    pub fn prev(&self) -> Option<&'a TaskResult> {
        self.results.last()
    }

    /// Result of step `n` (1-based).
    pub fn step(&self, n: usize) -> Option<&'a TaskResult> {
        n.checked_sub(1).and_then(|i| self.results.get(i))
    }

    /// Rendered previous result, or the "no result" marker before the first step.
    pub fn prev_text(&self) -> String {
        self.prev().map_or_else(|| TaskResult::NoResult.to_string(), ToString::to_string)
    }

    /// Rendered result of step `n`, or the "no result" marker.
    pub fn step_text(&self, n: usize) -> String {
        self.step(n).map_or_else(|| TaskResult::NoResult.to_string(), ToString::to_string)
    }
}

/// How a step reacts to an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and mark it failed.
    Abort,
    /// Record the outcome and carry on.
    Continue,
}

type RenderFn = dyn Fn(&StepContext<'_>) -> String + Send + Sync;
type ConditionFn = dyn Fn(&StepContext<'_>) -> bool + Send + Sync;

/// Declarative description of one step.
#[derive(Clone)]
pub struct StepTemplate {
    agent_name: String,
    render: Arc<RenderFn>,
    condition: Option<Arc<ConditionFn>>,
    /// Reaction to a hard error (transport, timeout, unknown agent).
    pub on_error: FailurePolicy,
    /// Reaction to the agent returning no task.
    pub on_no_result: FailurePolicy,
}

impl StepTemplate {
    /// Step whose text is produced by `render`.
    pub fn new<F>(agent_name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&StepContext<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            agent_name: agent_name.into(),
            render: Arc::new(render),
            condition: None,
            on_error: FailurePolicy::Abort,
            on_no_result: FailurePolicy::Continue,
        }
    }

    /// Step whose text is a template with `{request}`, `{prev}` and `{stepN}` placeholders.
    pub fn text(agent_name: impl Into<String>, template: impl Into<String>) -> Self {
        let template = template.into();
        Self::new(agent_name, move |ctx| render_placeholders(&template, ctx))
    }

    /// Only run the step when `condition` holds; skipped steps leave no trace in the run.
    pub fn run_if<F>(mut self, condition: F) -> Self
    where
        F: Fn(&StepContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Set the reaction to hard errors.
    pub fn on_error(mut self, policy: FailurePolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Set the reaction to absent results.
    pub fn on_no_result(mut self, policy: FailurePolicy) -> Self {
        self.on_no_result = policy;
        self
    }

    /// Agent this step targets.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Produce the task text.
    pub fn render(&self, ctx: &StepContext<'_>) -> String {
        (self.render)(ctx)
    }

    /// Whether the step should run.
    pub fn should_run(&self, ctx: &StepContext<'_>) -> bool {
        self.condition.as_ref().map_or(true, |c| c(ctx))
    }
}

impl fmt::Debug for StepTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepTemplate")
            .field("agent_name", &self.agent_name)
            .field("conditional", &self.condition.is_some())
            .field("on_error", &self.on_error)
            .field("on_no_result", &self.on_no_result)
            .finish()
    }
}

/// Ordered list of steps plus the summary reported on success.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    pub name: String,
    pub kind: WorkflowKind,
    pub steps: Vec<StepTemplate>,
    pub summary: String,
}

impl WorkflowTemplate {
    /// Create an empty template.
    pub fn new(name: impl Into<String>, kind: WorkflowKind) -> Self {
        let name = name.into();
        Self {
            summary: format!("{} completed", name),
            name,
            kind,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: StepTemplate) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the success summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Inventory analysis → purchase validation → purchase order generation.
    pub fn buyer() -> Self {
        Self::new("buyer workflow", WorkflowKind::Buyer)
            .step(StepTemplate::new(agents::INVENTORY_MANAGEMENT, |ctx| {
                format!(
                    "Analyze current inventory levels and demand patterns. Context: {}",
                    ctx.request
                )
            }))
            .step(StepTemplate::new(agents::PURCHASE_VALIDATION, |ctx| {
                format!(
                    "Validate purchase requirements based on inventory analysis: {}. Original request: {}",
                    ctx.step_text(1),
                    ctx.request
                )
            }))
            .step(StepTemplate::new(agents::PURCHASE_ORDER, |ctx| {
                format!(
                    "Generate purchase orders based on validation results: {}. Inventory context: {}",
                    ctx.step_text(2),
                    ctx.step_text(1)
                )
            }))
            .with_summary("Buyer workflow completed successfully across all three agents")
    }

    /// Order intelligence → production queue management.
    pub fn supplier() -> Self {
        Self::new("supplier workflow", WorkflowKind::Supplier)
            .step(StepTemplate::new(agents::ORDER_INTELLIGENCE, |ctx| {
                format!(
                    "Process incoming orders and extract order details. Context: {}",
                    ctx.request
                )
            }))
            .step(StepTemplate::new(agents::PRODUCTION_QUEUE_MANAGEMENT, |ctx| {
                format!(
                    "Record extracted orders and manage production queue based on order intelligence results: {}. Original request: {}",
                    ctx.step_text(1),
                    ctx.request
                )
            }))
            .with_summary("Supplier workflow completed successfully across both agents")
    }

    /// Monitor for new orders, then queue production only if monitoring produced a usable task.
    pub fn order_monitoring() -> Self {
        Self::new("order monitoring workflow", WorkflowKind::OrderMonitoring)
            .step(StepTemplate::new(agents::ORDER_INTELLIGENCE, |ctx| {
                format!(
                    "Monitor incoming emails for new purchase orders. {}",
                    ctx.request
                )
            }))
            .step(
                StepTemplate::new(agents::PRODUCTION_QUEUE_MANAGEMENT, |ctx| {
                    format!(
                        "Process any new orders found during monitoring: {}",
                        ctx.step_text(1)
                    )
                })
                .run_if(|ctx| {
                    ctx.step(1)
                        .and_then(TaskResult::task)
                        .is_some_and(|task| !task.is_failed())
                }),
            )
            .with_summary("Order monitoring workflow completed successfully")
    }

    /// Predefined template for a kind. `Custom` has no predefined steps.
    pub fn predefined(kind: WorkflowKind) -> Option<Self> {
        match kind {
            WorkflowKind::Buyer => Some(Self::buyer()),
            WorkflowKind::Supplier => Some(Self::supplier()),
            WorkflowKind::OrderMonitoring => Some(Self::order_monitoring()),
            WorkflowKind::Custom => None,
        }
    }
}

/// Substitute `{request}`, `{prev}` and `{stepN}` in a text template.
pub fn render_placeholders(template: &str, ctx: &StepContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let key = &after[..close];
        let replacement = match key {
            "request" => Some(ctx.request.to_string()),
            "prev" => Some(ctx.prev_text()),
            _ => key
                .strip_prefix("step")
                .and_then(|n| n.parse::<usize>().ok())
                .map(|n| ctx.step_text(n)),
        };

        match replacement {
            Some(text) => out.push_str(&text),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
