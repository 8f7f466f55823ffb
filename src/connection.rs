//! Per-agent connections and the transport they send through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::a2a::{Message, SendMessageRequest, SendMessageResponse, Task};
use crate::error::{Error, Result};

/// Moves a single `message/send` request to a remote agent and back.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Send the request and return the agent's JSON-RPC response.
    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse>;
}

/// JSON-RPC over HTTP POST to the agent's base URL.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Create a transport for one agent endpoint.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Transport(format!("{} rejected message: {}", self.url, e)))?;

        let body = response.text().await?;
        serde_json::from_str::<SendMessageResponse>(&body).map_err(|e| {
            debug!(url = %self.url, error = %e, "unparseable agent response");
            Error::Protocol(format!("unparseable response from {}: {}", self.url, e))
        })
    }
}

/// Caller-supplied identifiers for an outbound message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Task to continue, if any.
    pub task_id: Option<String>,
    /// Conversation context, if any.
    pub context_id: Option<String>,
    /// Message id to reuse instead of generating one.
    pub message_id: Option<String>,
    /// Metadata forwarded on the message.
    pub metadata: Map<String, Value>,
}

/// Connection to one remote agent.
#[derive(Clone)]
pub struct RemoteAgentConnection {
    agent_name: String,
    base_url: String,
    transport: Arc<dyn AgentTransport>,
    timeout: Duration,
}

impl RemoteAgentConnection {
    /// Create a connection over the given transport.
    pub fn new(
        agent_name: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<dyn AgentTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            base_url: base_url.into(),
            transport,
            timeout,
        }
    }

    /// Name of the remote agent.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Base URL the agent was discovered at.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send task text to the agent.
    ///
    /// Returns `Ok(None)` when the agent answers but not with a task; transport
    /// failures and deadline expiry are returned as errors.
    pub async fn send(&self, task_text: &str, options: SendOptions) -> Result<Option<Task>> {
        let mut message = Message::user_text(task_text, options.message_id);
        message.task_id = options.task_id;
        message.context_id = options.context_id;
        message.metadata = options.metadata;

        let request = SendMessageRequest::new(message);
        debug!(agent = %self.agent_name, message_id = %request.id, "sending message");

        let response = tokio::time::timeout(self.timeout, self.transport.send_message(request))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} did not respond within {}s",
                    self.agent_name,
                    self.timeout.as_secs_f64()
                ))
            })??;

        Ok(self.classify(response))
    }

    fn classify(&self, response: SendMessageResponse) -> Option<Task> {
        if let Some(error) = &response.error {
            warn!(
                agent = %self.agent_name,
                code = error.code,
                message = %error.message,
                "received non-success response"
            );
            return None;
        }

        let Some(result) = response.result.as_ref() else {
            warn!(agent = %self.agent_name, "received non-success response without result");
            return None;
        };

        match Task::from_result(result) {
            Some(task) => {
                debug!(
                    agent = %self.agent_name,
                    task_id = %task.id,
                    state = ?task.state(),
                    "received task"
                );
                Some(task)
            }
            None => {
                warn!(agent = %self.agent_name, "received non-task response");
                None
            }
        }
    }
}

impl std::fmt::Debug for RemoteAgentConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAgentConnection")
            .field("agent_name", &self.agent_name)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        response: Mutex<Option<Result<SendMessageResponse>>>,
        seen: Mutex<Vec<SendMessageRequest>>,
    }

    impl Scripted {
        fn new(response: Result<SendMessageResponse>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AgentTransport for Scripted {
        async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse> {
            self.seen.lock().unwrap().push(request);
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Error::Transport("script exhausted".into())))
        }
    }

    struct Stalled;

    #[async_trait]
    impl AgentTransport for Stalled {
        async fn send_message(&self, _request: SendMessageRequest) -> Result<SendMessageResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SendMessageResponse::default())
        }
    }

    fn connection(transport: Arc<dyn AgentTransport>) -> RemoteAgentConnection {
        RemoteAgentConnection::new(
            "Inventory Management Agent",
            "http://localhost:8001",
            transport,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_send_returns_task() {
        let transport = Scripted::new(Ok(SendMessageResponse::success(json!({
            "kind": "task",
            "id": "t1",
            "status": { "state": "completed" }
        }))));
        let conn = connection(transport.clone());

        let options = SendOptions {
            task_id: Some("task-7".into()),
            context_id: Some("ctx-7".into()),
            message_id: Some("msg-7".into()),
            ..Default::default()
        };
        let task = conn.send("check stock", options).await.unwrap().unwrap();
        assert_eq!(task.id, "t1");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let message = &seen[0].params.message;
        assert_eq!(message.message_id, "msg-7");
        assert_eq!(message.task_id.as_deref(), Some("task-7"));
        assert_eq!(message.context_id.as_deref(), Some("ctx-7"));
        assert_eq!(message.text(), "check stock");
    }

    #[tokio::test]
    async fn test_send_generates_message_id() {
        let transport = Scripted::new(Ok(SendMessageResponse::success(json!({
            "id": "t",
            "status": { "state": "submitted" }
        }))));
        let conn = connection(transport.clone());
        conn.send("x", SendOptions::default()).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert!(!seen[0].params.message.message_id.is_empty());
        assert!(seen[0].params.message.task_id.is_none());
    }

    #[tokio::test]
    async fn test_error_envelope_is_absent() {
        let transport = Scripted::new(Ok(SendMessageResponse::failure(-32001, "task not found")));
        let result = connection(transport).send("x", SendOptions::default()).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_non_task_result_is_absent() {
        let transport = Scripted::new(Ok(SendMessageResponse::success(json!({
            "kind": "message",
            "role": "agent",
            "messageId": "m",
            "parts": []
        }))));
        let result = connection(transport).send("x", SendOptions::default()).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = Scripted::new(Err(Error::Transport("connection refused".into())));
        let err = connection(transport)
            .send("x", SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m.contains("refused")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_enforced() {
        let conn = RemoteAgentConnection::new(
            "Slow Agent",
            "http://localhost:9",
            Arc::new(Stalled),
            Duration::from_secs(2),
        );
        let err = conn.send("x", SendOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_hard());
    }

    #[tokio::test]
    async fn test_http_transport_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({ "method": "message/send" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":"1","result":{"kind":"task","id":"po-1","status":{"state":"completed"}}}"#,
            )
            .create_async()
            .await;

        let transport = HttpTransport::new(reqwest::Client::new(), format!("{}/", server.url()));
        let task = connection(Arc::new(transport))
            .send("generate PO", SendOptions::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(task.id, "po-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_status_is_hard() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let transport = HttpTransport::new(reqwest::Client::new(), format!("{}/", server.url()));
        let err = connection(Arc::new(transport))
            .send("x", SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m.contains("502")));
        assert!(err.is_hard());
    }

    #[tokio::test]
    async fn test_http_unparseable_body_is_hard() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let transport = HttpTransport::new(reqwest::Client::new(), format!("{}/", server.url()));
        let err = connection(Arc::new(transport))
            .send("x", SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.is_hard());
    }
}
