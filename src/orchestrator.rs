//! Workflow orchestrator over remote A2A agents.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::a2a::Task;
use crate::config::{OrchestratorConfig, Role};
use crate::connection::SendOptions;
use crate::error::{Error, Result};
use crate::registry::{AgentRegistry, AgentSummary, CardResolver};
use crate::stats::{AgentStats, CallOutcome, CallStats};
use crate::workflow::{
    FailurePolicy, StepContext, TaskResult, WorkflowKind, WorkflowRun, WorkflowStep,
    WorkflowTemplate,
};

/// In-memory conversation state shared by all calls of one orchestrator.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier.
    pub session_id: String,
    /// Agent most recently sent a message.
    pub active_agent: Option<String>,
    /// Task id to continue; a fresh one is generated per call when unset.
    pub task_id: Option<String>,
    /// Context id to continue; a fresh one is generated per call when unset.
    pub context_id: Option<String>,
    /// Metadata of the inbound message, forwarded on outbound messages.
    pub input_message_metadata: Map<String, Value>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            active_agent: None,
            task_id: None,
            context_id: None,
            input_message_metadata: Map::new(),
        }
    }
}

impl Session {
    fn send_options(&self) -> SendOptions {
        SendOptions {
            task_id: Some(
                self.task_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
            context_id: Some(
                self.context_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
            message_id: self
                .input_message_metadata
                .get("message_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            metadata: self.input_message_metadata.clone(),
        }
    }
}

/// Coordinates remote agents: single sends and fixed multi-step workflows.
#[derive(Clone)]
pub struct Orchestrator {
    /// Current registry snapshot. Runs clone the inner `Arc` once and keep it.
    registry: Arc<RwLock<Arc<AgentRegistry>>>,
    /// Conversation state.
    session: Arc<RwLock<Session>>,
    /// Call accounting.
    stats: Arc<RwLock<CallStats>>,
    /// Configuration.
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator over an already built registry.
    pub fn new(registry: AgentRegistry, config: OrchestratorConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Arc::new(registry))),
            session: Arc::new(RwLock::new(Session::default())),
            stats: Arc::new(RwLock::new(CallStats::new())),
            config,
        }
    }

    /// Discover the configured agents over HTTP and build an orchestrator.
    ///
    /// Agents that cannot be resolved are left out; an empty registry is not an error.
    pub async fn connect(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let registry = discover(&config).await?;
        info!(
            role = ?config.role,
            agents = registry.len(),
            configured = config.agent_urls.len(),
            "orchestrator ready"
        );
        Ok(Self::new(registry, config))
    }

    /// Re-run discovery and swap in the new registry. Running workflows keep their snapshot.
    pub async fn reload(&self) -> Result<usize> {
        let registry = discover(&self.config).await?;
        Ok(self.replace_registry(registry).await)
    }

    /// Swap in a registry built elsewhere. Returns the number of agents now registered.
    pub async fn replace_registry(&self, registry: AgentRegistry) -> usize {
        let count = registry.len();
        *self.registry.write().await = Arc::new(registry);
        info!(agents = count, "agent registry replaced");
        count
    }

    /// Current registry snapshot.
    pub async fn registry(&self) -> Arc<AgentRegistry> {
        self.registry.read().await.clone()
    }

    /// Role of this orchestrator.
    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Workflows this orchestrator's role offers.
    pub fn available_workflows(&self) -> Vec<WorkflowKind> {
        match self.config.role {
            Role::Buyer => vec![WorkflowKind::Buyer],
            Role::Supplier => vec![WorkflowKind::Supplier, WorkflowKind::OrderMonitoring],
        }
    }

    /// Name and description of every registered agent.
    pub async fn list_remote_agents(&self) -> Vec<AgentSummary> {
        self.registry().await.list_remote_agents()
    }

    /// Snapshot of the session state.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Continue an existing task and context on subsequent sends.
    pub async fn set_task_context(&self, task_id: Option<String>, context_id: Option<String>) {
        let mut session = self.session.write().await;
        session.task_id = task_id;
        session.context_id = context_id;
    }

    /// Metadata of the inbound message; a `message_id` entry is reused as the outbound message id.
    pub async fn set_input_message_metadata(&self, metadata: Map<String, Value>) {
        self.session.write().await.input_message_metadata = metadata;
    }

    /// Send a task to one remote agent.
    ///
    /// Unknown agents fail before any network call. An answer that is not a task
    /// yields `Ok(None)`.
    pub async fn send_message(&self, agent_name: &str, task: &str) -> Result<Option<Task>> {
        let registry = self.registry().await;
        self.dispatch(&registry, agent_name, task).await
    }

    async fn dispatch(
        &self,
        registry: &AgentRegistry,
        agent_name: &str,
        task: &str,
    ) -> Result<Option<Task>> {
        let connection = registry.connection(agent_name)?;

        let options = {
            let mut session = self.session.write().await;
            session.active_agent = Some(agent_name.to_string());
            session.send_options()
        };

        let start = Instant::now();
        let outcome = connection.send(task, options).await;

        let call = match &outcome {
            Ok(Some(_)) => CallOutcome::Task,
            Ok(None) => CallOutcome::NoResult,
            Err(_) => CallOutcome::Failure,
        };
        self.stats
            .write()
            .await
            .record(agent_name, call, start.elapsed());

        outcome
    }

    /// Run a workflow to completion or first hard failure.
    pub async fn execute_workflow(
        &self,
        template: &WorkflowTemplate,
        request: &str,
    ) -> WorkflowRun {
        self.execute_workflow_with_cancel(template, request, &CancellationToken::new())
            .await
    }

    /// Run a workflow that stops when `cancel` fires.
    ///
    /// Steps run strictly in order. A hard error records a failure on the step
    /// and, under the default policy, ends the run; a missing result is recorded
    /// and carried into the next step's text.
    pub async fn execute_workflow_with_cancel(
        &self,
        template: &WorkflowTemplate,
        request: &str,
        cancel: &CancellationToken,
    ) -> WorkflowRun {
        let registry = self.registry().await;
        let mut run = WorkflowRun::start(template.kind);
        let mut results: Vec<TaskResult> = Vec::with_capacity(template.steps.len());

        info!(
            workflow_id = %run.workflow_id,
            workflow = %template.name,
            steps = template.steps.len(),
            "starting workflow"
        );

        for step in &template.steps {
            let ctx = StepContext {
                request,
                results: &results,
            };
            if !step.should_run(&ctx) {
                debug!(
                    workflow_id = %run.workflow_id,
                    agent = %step.agent_name(),
                    "step condition not met; skipping"
                );
                continue;
            }

            let index = run.steps.len() + 1;
            let task_text = step.render(&ctx);
            let started_at = Utc::now();
            info!(
                workflow_id = %run.workflow_id,
                step = index,
                agent = %step.agent_name(),
                "executing step"
            );

            let outcome = if cancel.is_cancelled() {
                Err(cancelled(&run, index))
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(cancelled(&run, index)),
                    sent = self.dispatch(&registry, step.agent_name(), &task_text) => sent,
                }
            };

            let (result, abort) = match outcome {
                Ok(task) => {
                    let result = TaskResult::from(task);
                    let abort = (result == TaskResult::NoResult
                        && step.on_no_result == FailurePolicy::Abort)
                        .then(|| format!("{} returned no result", step.agent_name()));
                    (result, abort)
                }
                Err(e) => {
                    warn!(
                        workflow_id = %run.workflow_id,
                        step = index,
                        agent = %step.agent_name(),
                        error = %e,
                        "step failed"
                    );
                    let abort = (step.on_error == FailurePolicy::Abort
                        || matches!(e, Error::Cancelled(_)))
                    .then(|| e.to_string());
                    (TaskResult::Failure { reason: e.to_string() }, abort)
                }
            };

            run.steps.push(WorkflowStep {
                index,
                agent_name: step.agent_name().to_string(),
                task_text,
                result: result.clone(),
                started_at,
                finished_at: Utc::now(),
            });
            results.push(result);

            if let Some(error) = abort {
                warn!(
                    workflow_id = %run.workflow_id,
                    step = index,
                    error = %error,
                    "workflow failed"
                );
                run.fail(error);
                self.stats.write().await.record_workflow(false);
                return run;
            }
        }

        run.complete(template.summary.clone());
        self.stats.write().await.record_workflow(true);
        info!(workflow_id = %run.workflow_id, steps = run.steps.len(), "workflow completed");
        run
    }

    /// Run one of the predefined workflows.
    pub async fn execute_predefined(
        &self,
        kind: WorkflowKind,
        request: &str,
    ) -> Result<WorkflowRun> {
        let template = WorkflowTemplate::predefined(kind)
            .ok_or_else(|| Error::InvalidParams(format!("no predefined workflow for {:?}", kind)))?;
        Ok(self.execute_workflow(&template, request).await)
    }

    /// Orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let registry = self.registry().await;
        let session = self.session.read().await;
        let stats = self.stats.read().await;
        let (workflows_completed, workflows_failed) = stats.workflow_counts();

        OrchestratorStatus {
            role: self.config.role,
            session_id: session.session_id.clone(),
            active_agent: session.active_agent.clone(),
            agents: registry.list_remote_agents(),
            agent_stats: stats.agents().clone(),
            workflows_completed,
            workflows_failed,
        }
    }
}

fn cancelled(run: &WorkflowRun, index: usize) -> Error {
    Error::Cancelled(format!("workflow {} cancelled at step {}", run.workflow_id, index))
}

async fn discover(config: &OrchestratorConfig) -> Result<AgentRegistry> {
    let discovery_client = reqwest::Client::builder()
        .timeout(config.discovery_timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
    let message_client = reqwest::Client::builder()
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

    let resolver = CardResolver::new(discovery_client).with_card_path(config.card_path.clone());
    Ok(AgentRegistry::discover_http(
        &resolver,
        &config.agent_urls,
        message_client,
        config.request_timeout,
    )
    .await)
}

/// Orchestrator status.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub role: Role,
    pub session_id: String,
    pub active_agent: Option<String>,
    pub agents: Vec<AgentSummary>,
    pub agent_stats: BTreeMap<String, AgentStats>,
    pub workflows_completed: u64,
    pub workflows_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::{AgentCard, SendMessageRequest, SendMessageResponse};
    use crate::connection::{AgentTransport, HttpTransport, RemoteAgentConnection};
    use crate::workflow::{agents, StepTemplate, WorkflowStatus};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fake agent that replays scripted replies and records what it was sent.
    #[derive(Default)]
    struct FakeAgent {
        replies: Mutex<VecDeque<Result<SendMessageResponse>>>,
        seen: Mutex<Vec<SendMessageRequest>>,
    }

    impl FakeAgent {
        fn replying(replies: Vec<Result<SendMessageResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn texts(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.params.message.text())
                .collect()
        }
    }

    #[async_trait]
    impl AgentTransport for FakeAgent {
        async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse> {
            self.seen.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Transport("no scripted reply".into())))
        }
    }

    /// Fake agent that never answers.
    struct Silent;

    #[async_trait]
    impl AgentTransport for Silent {
        async fn send_message(&self, _request: SendMessageRequest) -> Result<SendMessageResponse> {
            futures::future::pending().await
        }
    }

    fn task(id: &str) -> Result<SendMessageResponse> {
        Ok(SendMessageResponse::success(json!({
            "kind": "task",
            "id": id
        })))
    }

    fn card(name: &str) -> AgentCard {
        serde_json::from_value(json!({ "name": name, "description": "test agent" })).unwrap()
    }

    fn register(
        registry: AgentRegistry,
        name: &str,
        transport: Arc<dyn AgentTransport>,
    ) -> AgentRegistry {
        let connection = RemoteAgentConnection::new(
            name,
            format!("http://{}", name.replace(' ', "-").to_lowercase()),
            transport,
            Duration::from_secs(5),
        );
        registry.with_agent(card(name), connection)
    }

    fn orchestrator(registry: AgentRegistry) -> Orchestrator {
        Orchestrator::new(registry, OrchestratorConfig::default())
    }

    fn two_step() -> WorkflowTemplate {
        WorkflowTemplate::new("pair", WorkflowKind::Custom)
            .step(StepTemplate::text("AgentA", "do X: {prev}"))
            .step(StepTemplate::text("AgentB", "do Y: {prev}"))
    }

    #[tokio::test]
    async fn test_send_message_single_call() {
        let agent = FakeAgent::replying(vec![task("t1")]);
        let orch = orchestrator(register(AgentRegistry::new(), "AgentA", agent.clone()));

        let result = orch.send_message("AgentA", "check stock").await.unwrap();
        assert_eq!(result.unwrap().id, "t1");
        assert_eq!(agent.calls(), 1);

        let session = orch.session().await;
        assert_eq!(session.active_agent.as_deref(), Some("AgentA"));
    }

    #[tokio::test]
    async fn test_send_message_non_success_is_none() {
        let agent = FakeAgent::replying(vec![Ok(SendMessageResponse::failure(-32603, "boom"))]);
        let orch = orchestrator(register(AgentRegistry::new(), "AgentA", agent.clone()));

        let result = orch.send_message("AgentA", "x").await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(agent.calls(), 1);
    }

    #[tokio::test]
    async fn test_send_message_unknown_agent() {
        let agent = FakeAgent::replying(vec![task("t1")]);
        let orch = orchestrator(register(AgentRegistry::new(), "AgentA", agent.clone()));

        let err = orch.send_message("AgentZ", "x").await.unwrap_err();
        assert!(matches!(err, Error::AgentNotFound(ref n) if n == "AgentZ"));
        assert_eq!(agent.calls(), 0);
    }

    #[tokio::test]
    async fn test_send_message_placeholder() {
        let orch = orchestrator(AgentRegistry::new().with_placeholder(card("AgentA")));
        let err = orch.send_message("AgentA", "x").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionUnavailable(_)));
    }

    #[tokio::test]
    async fn test_session_ids_forwarded() {
        let agent = FakeAgent::replying(vec![task("t1"), task("t2")]);
        let orch = orchestrator(register(AgentRegistry::new(), "AgentA", agent.clone()));

        orch.send_message("AgentA", "first").await.unwrap();
        orch.set_task_context(Some("task-9".into()), Some("ctx-9".into()))
            .await;
        let mut metadata = Map::new();
        metadata.insert("message_id".into(), json!("inbound-1"));
        orch.set_input_message_metadata(metadata).await;
        orch.send_message("AgentA", "second").await.unwrap();

        let seen = agent.seen.lock().unwrap();
        let first = &seen[0].params.message;
        assert!(first.task_id.is_some());
        assert!(first.context_id.is_some());

        let second = &seen[1].params.message;
        assert_eq!(second.task_id.as_deref(), Some("task-9"));
        assert_eq!(second.context_id.as_deref(), Some("ctx-9"));
        assert_eq!(second.message_id, "inbound-1");
        assert_eq!(second.metadata["message_id"], "inbound-1");
    }

    #[tokio::test]
    async fn test_workflow_threads_results() {
        let a = FakeAgent::replying(vec![task("t1")]);
        let b = FakeAgent::replying(vec![task("t2")]);
        let registry = register(
            register(AgentRegistry::new(), "AgentA", a.clone()),
            "AgentB",
            b.clone(),
        );
        let orch = orchestrator(registry);

        let run = orch.execute_workflow(&two_step(), "restock").await;

        assert_eq!(run.status, WorkflowStatus::Completed);
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].index, 1);
        assert_eq!(run.steps[0].task_text, "do X: no result");
        assert_eq!(run.steps[0].result.task().unwrap().id, "t1");
        assert!(run.steps[1].task_text.contains(r#"do Y: Task{id:"t1"}"#));
        assert_eq!(run.steps[1].result.task().unwrap().id, "t2");
        assert_eq!(b.texts(), vec![run.steps[1].task_text.clone()]);
        assert!(run.summary.is_some());
        assert!(run.error.is_none());
    }

    #[tokio::test]
    async fn test_workflow_transport_failure_stops() {
        let a = FakeAgent::replying(vec![task("t1")]);
        let b = FakeAgent::replying(vec![Err(Error::Transport("timeout".into()))]);
        let c = FakeAgent::replying(vec![task("t3")]);
        let registry = register(
            register(register(AgentRegistry::new(), "AgentA", a.clone()), "AgentB", b.clone()),
            "AgentC",
            c.clone(),
        );
        let orch = orchestrator(registry);

        let template = two_step().step(StepTemplate::text("AgentC", "do Z: {prev}"));
        let run = orch.execute_workflow(&template, "restock").await;

        assert_eq!(run.status, WorkflowStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("timeout"));
        assert_eq!(run.steps.len(), 2);
        assert!(run.steps[0].result.task().is_some());
        assert!(run.steps[1].result.is_failure());
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_workflow_first_step_failure() {
        let a = FakeAgent::replying(vec![Err(Error::Transport("timeout".into()))]);
        let b = FakeAgent::replying(vec![task("t2")]);
        let registry = register(register(AgentRegistry::new(), "AgentA", a), "AgentB", b.clone());
        let orch = orchestrator(registry);

        let run = orch.execute_workflow(&two_step(), "r").await;

        assert_eq!(run.status, WorkflowStatus::Failed);
        assert!(run.error.unwrap().contains("timeout"));
        assert_eq!(run.steps.len(), 1);
        assert!(matches!(run.steps[0].result, TaskResult::Failure { .. }));
        assert_eq!(b.calls(), 0);

        let (completed, failed) = orch.stats.read().await.workflow_counts();
        assert_eq!((completed, failed), (0, 1));
    }

    #[tokio::test]
    async fn test_workflow_http_error_stops() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let a = HttpTransport::new(reqwest::Client::new(), format!("{}/", server.url()));
        let b = FakeAgent::replying(vec![task("t2")]);
        let registry = register(
            register(AgentRegistry::new(), "AgentA", Arc::new(a)),
            "AgentB",
            b.clone(),
        );
        let orch = orchestrator(registry);

        let run = orch.execute_workflow(&two_step(), "r").await;

        assert_eq!(run.status, WorkflowStatus::Failed);
        assert_eq!(run.steps.len(), 1);
        assert!(run.steps[0].result.is_failure());
        assert!(run.error.unwrap().contains("502"));
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_workflow_soft_failure_continues() {
        let a = FakeAgent::replying(vec![Ok(SendMessageResponse::failure(
            -32001,
            "task not found",
        ))]);
        let b = FakeAgent::replying(vec![task("t2")]);
        let registry = register(register(AgentRegistry::new(), "AgentA", a), "AgentB", b);
        let orch = orchestrator(registry);

        let run = orch.execute_workflow(&two_step(), "r").await;

        assert_eq!(run.status, WorkflowStatus::Completed);
        assert_eq!(run.steps[0].result, TaskResult::NoResult);
        assert_eq!(run.steps[1].task_text, "do Y: no result");
    }

    #[tokio::test]
    async fn test_workflow_explicit_policies() {
        let a = FakeAgent::replying(vec![Ok(SendMessageResponse::failure(-32001, "nope"))]);
        let b = FakeAgent::replying(vec![task("t2")]);
        let registry = register(register(AgentRegistry::new(), "AgentA", a), "AgentB", b.clone());
        let orch = orchestrator(registry);

        let strict = WorkflowTemplate::new("strict", WorkflowKind::Custom)
            .step(StepTemplate::text("AgentA", "x").on_no_result(FailurePolicy::Abort))
            .step(StepTemplate::text("AgentB", "y"));
        let run = orch.execute_workflow(&strict, "r").await;
        assert_eq!(run.status, WorkflowStatus::Failed);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(b.calls(), 0);

        let lenient = WorkflowTemplate::new("lenient", WorkflowKind::Custom)
            .step(StepTemplate::text("Missing Agent", "x").on_error(FailurePolicy::Continue))
            .step(StepTemplate::text("AgentB", "after {prev}"));
        let run = orch.execute_workflow(&lenient, "r").await;
        assert_eq!(run.status, WorkflowStatus::Completed);
        assert!(run.steps[0].result.is_failure());
        assert!(run.steps[1].task_text.starts_with("after Failure("));
    }

    #[tokio::test]
    async fn test_workflow_unknown_agent_fails_without_calls() {
        let orch = orchestrator(AgentRegistry::new());
        let run = orch.execute_workflow(&WorkflowTemplate::buyer(), "Q3 restock").await;

        assert_eq!(run.status, WorkflowStatus::Failed);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].agent_name, agents::INVENTORY_MANAGEMENT);
        assert!(run.error.unwrap().contains("agent not found"));
    }

    #[tokio::test]
    async fn test_buyer_workflow() {
        let inventory = FakeAgent::replying(vec![task("inv-1")]);
        let validation = FakeAgent::replying(vec![task("val-1")]);
        let po = FakeAgent::replying(vec![task("po-1")]);
        let registry = register(
            register(
                register(AgentRegistry::new(), agents::INVENTORY_MANAGEMENT, inventory.clone()),
                agents::PURCHASE_VALIDATION,
                validation.clone(),
            ),
            agents::PURCHASE_ORDER,
            po.clone(),
        );
        let orch = orchestrator(registry);

        let run = orch
            .execute_predefined(WorkflowKind::Buyer, "restock widgets")
            .await
            .unwrap();

        assert_eq!(run.status, WorkflowStatus::Completed);
        assert_eq!(run.steps.len(), 3);
        assert_eq!(
            inventory.texts()[0],
            "Analyze current inventory levels and demand patterns. Context: restock widgets"
        );
        assert!(validation.texts()[0].contains(r#"inventory analysis: Task{id:"inv-1"}"#));
        assert!(po.texts()[0].contains(r#"validation results: Task{id:"val-1"}"#));
        assert!(po.texts()[0].contains(r#"Inventory context: Task{id:"inv-1"}"#));
        assert_eq!(
            run.summary.as_deref(),
            Some("Buyer workflow completed successfully across all three agents")
        );
    }

    #[tokio::test]
    async fn test_order_monitoring_skips_processing_without_result() {
        let intel = FakeAgent::replying(vec![Ok(SendMessageResponse::failure(
            -32603,
            "mailbox down",
        ))]);
        let queue = FakeAgent::replying(vec![task("q-1")]);
        let registry = register(
            register(AgentRegistry::new(), agents::ORDER_INTELLIGENCE, intel),
            agents::PRODUCTION_QUEUE_MANAGEMENT,
            queue.clone(),
        );
        let orch = orchestrator(registry);

        let run = orch
            .execute_predefined(WorkflowKind::OrderMonitoring, "Check the last hour.")
            .await
            .unwrap();

        assert_eq!(run.status, WorkflowStatus::Completed);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(queue.calls(), 0);
    }

    #[tokio::test]
    async fn test_order_monitoring_processes_found_orders() {
        let intel = FakeAgent::replying(vec![task("orders-1")]);
        let queue = FakeAgent::replying(vec![task("q-1")]);
        let registry = register(
            register(AgentRegistry::new(), agents::ORDER_INTELLIGENCE, intel),
            agents::PRODUCTION_QUEUE_MANAGEMENT,
            queue.clone(),
        );
        let orch = orchestrator(registry);

        let run = orch
            .execute_predefined(WorkflowKind::OrderMonitoring, "Check the last hour.")
            .await
            .unwrap();

        assert_eq!(run.steps.len(), 2);
        assert_eq!(
            queue.texts()[0],
            r#"Process any new orders found during monitoring: Task{id:"orders-1"}"#
        );
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let a = FakeAgent::replying(vec![task("t1")]);
        let orch = orchestrator(register(AgentRegistry::new(), "AgentA", a.clone()));

        let token = CancellationToken::new();
        token.cancel();
        let run = orch
            .execute_workflow_with_cancel(&two_step(), "r", &token)
            .await;

        assert_eq!(run.status, WorkflowStatus::Failed);
        assert_eq!(run.steps.len(), 1);
        assert!(run.error.unwrap().contains("cancelled"));
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_in_flight() {
        let orch = orchestrator(register(AgentRegistry::new(), "AgentA", Arc::new(Silent)));

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let run = orch
            .execute_workflow_with_cancel(&two_step(), "r", &token)
            .await;
        assert_eq!(run.status, WorkflowStatus::Failed);
        assert_eq!(run.steps.len(), 1);
        assert!(run.steps[0].result.is_failure());
    }

    #[tokio::test]
    async fn test_reload_does_not_affect_running_snapshot() {
        let a = FakeAgent::replying(vec![task("t1")]);
        let orch = orchestrator(register(AgentRegistry::new(), "AgentA", a));

        let snapshot = orch.registry().await;
        let count = orch.replace_registry(AgentRegistry::new()).await;

        assert_eq!(count, 0);
        assert!(snapshot.contains("AgentA"));
        assert!(orch.registry().await.is_empty());
        assert!(matches!(
            orch.send_message("AgentA", "x").await,
            Err(Error::AgentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_discovers_agents() {
        let mut server = mockito::Server::new_async().await;
        let card_mock = server
            .mock("GET", "/.well-known/agent.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "name": agents::PURCHASE_ORDER, "description": "Drafts purchase orders" })
                    .to_string(),
            )
            .create_async()
            .await;

        let config = OrchestratorConfig {
            agent_urls: vec![server.url()],
            ..Default::default()
        };
        let orch = Orchestrator::new(AgentRegistry::new(), config);
        let before = orch.registry().await;

        assert_eq!(orch.reload().await.unwrap(), 1);
        assert!(orch.registry().await.contains(agents::PURCHASE_ORDER));
        assert!(before.is_empty());
        card_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_reports_stats() {
        let a = FakeAgent::replying(vec![task("t1"), Err(Error::Transport("reset".into()))]);
        let orch = orchestrator(register(AgentRegistry::new(), "AgentA", a));

        orch.send_message("AgentA", "1").await.unwrap();
        assert!(orch.send_message("AgentA", "2").await.is_err());

        let status = orch.status().await;
        assert_eq!(status.active_agent.as_deref(), Some("AgentA"));
        assert_eq!(status.agents.len(), 1);
        let stats = &status.agent_stats["AgentA"];
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.tasks, 1);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_available_workflows() {
        let supplier = Orchestrator::new(
            AgentRegistry::new(),
            OrchestratorConfig {
                role: Role::Supplier,
                ..Default::default()
            },
        );
        assert_eq!(
            supplier.available_workflows(),
            vec![WorkflowKind::Supplier, WorkflowKind::OrderMonitoring]
        );
    }
}
