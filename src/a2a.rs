//! A2A (agent-to-agent) wire types.
//!
//! Only the subset the orchestrator needs: agent cards for discovery and the
//! JSON-RPC `message/send` exchange. Task payloads are kept mostly opaque.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// JSON-RPC method used to hand a task to a remote agent.
pub const SEND_MESSAGE_METHOD: &str = "message/send";

/// Well-known path of the agent card, relative to the agent's base URL.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Capability descriptor published by a remote agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Self-reported agent name, used as the registry key.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Endpoint advertised by the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Agent version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Declared skills, in card order.
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

/// A skill declared on an agent card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One content part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    File { file: Value },
    Data { data: Value },
}

impl Part {
    /// Text of this part, if it is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A message exchanged with a remote agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Message {
    /// Build a user message carrying a single text part.
    pub fn user_text(text: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
            message_id: message_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            task_id: None,
            context_id: None,
            metadata: Map::new(),
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parameters of a `message/send` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSendParams {
    pub message: Message,
}

/// JSON-RPC request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest<P> {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Method parameters.
    pub params: P,
}

/// A `message/send` request.
pub type SendMessageRequest = JsonRpcRequest<MessageSendParams>;

impl SendMessageRequest {
    /// Wrap a message in a `message/send` envelope. The request id mirrors the message id.
    pub fn new(message: Message) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Value::String(message.message_id.clone()),
            method: SEND_MESSAGE_METHOD.into(),
            params: MessageSendParams { message },
        }
    }
}

/// JSON-RPC response envelope as returned by a remote agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    /// Present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on application-level failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl SendMessageResponse {
    /// Build a success envelope.
    pub fn success(result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: None,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error envelope.
    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: None,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Whether this is a success envelope.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Task object returned by a remote agent.
///
/// Only `id` is required; everything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Task with only an identifier.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: None,
            status: None,
            artifacts: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Set the status state.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.status = Some(TaskStatus {
            state: state.into(),
            message: None,
        });
        self
    }

    /// Attach a text artifact.
    pub fn with_text_artifact(mut self, text: impl Into<String>) -> Self {
        self.artifacts.push(Artifact {
            artifact_id: None,
            name: None,
            parts: vec![Part::Text { text: text.into() }],
        });
        self
    }

    /// Recognize a task inside a `message/send` result.
    ///
    /// A result counts as a task when it is tagged `kind: "task"`, or untagged
    /// with both an `id` and a `status`. Messages and anything else yield `None`.
    pub fn from_result(result: &Value) -> Option<Task> {
        let object = result.as_object()?;
        let looks_like_task = match object.get("kind").and_then(Value::as_str) {
            Some(kind) => kind == "task",
            None => object.contains_key("id") && object.contains_key("status"),
        };
        if !looks_like_task {
            return None;
        }
        serde_json::from_value(result.clone()).ok()
    }

    /// Status state, if reported.
    pub fn state(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.state.as_str())
    }

    /// Whether the agent reported the task as failed or rejected.
    pub fn is_failed(&self) -> bool {
        matches!(self.state(), Some("failed" | "rejected"))
    }

    /// Text carried by the status message and artifacts.
    pub fn output_text(&self) -> String {
        let status_text = self
            .status
            .as_ref()
            .and_then(|s| s.message.as_ref())
            .map(Message::text);
        status_text
            .into_iter()
            .chain(self.artifacts.iter().map(Artifact::text))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task{{id:{:?}", self.id)?;
        if let Some(context_id) = &self.context_id {
            write!(f, ", context_id:{:?}", context_id)?;
        }
        if let Some(state) = self.state() {
            write!(f, ", status:{:?}", state)?;
        }
        let output = self.output_text();
        if !output.is_empty() {
            write!(f, ", output:{:?}", output)?;
        }
        write!(f, "}}")
    }
}

/// Task status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

/// Output artifact of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Artifact {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
