//! Agent card discovery and the frozen name → connection registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::a2a::{AgentCard, AGENT_CARD_PATH};
use crate::connection::{AgentTransport, HttpTransport, RemoteAgentConnection};
use crate::error::{Error, Result};

/// Fetches agent cards from base URLs.
#[derive(Clone)]
pub struct CardResolver {
    client: reqwest::Client,
    card_path: String,
}

impl CardResolver {
    /// Create a resolver sharing the given client across all lookups.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            card_path: AGENT_CARD_PATH.into(),
        }
    }

    /// Use a non-default card path.
    pub fn with_card_path(mut self, path: impl Into<String>) -> Self {
        self.card_path = path.into();
        self
    }

    /// Full card URL for a base address.
    pub fn card_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.card_path.trim_start_matches('/')
        )
    }

    /// Resolve the card published at `base_url`. One request, no retry.
    pub async fn resolve(&self, base_url: &str) -> Result<AgentCard> {
        let url = self.card_url(base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::UnreachableAgent {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnreachableAgent {
                url,
                reason: format!("HTTP {}", status),
            });
        }

        let body = response.text().await.map_err(|e| Error::UnreachableAgent {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&body).map_err(|e| Error::MalformedDescriptor {
            url,
            reason: e.to_string(),
        })
    }
}

/// Registered agent: its card and, unless it is a placeholder, a connection.
#[derive(Debug, Clone)]
pub struct RegisteredAgent {
    pub card: AgentCard,
    pub connection: Option<RemoteAgentConnection>,
}

/// Name and description, as advertised to the LLM host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
}

/// Immutable registry of remote agents keyed by self-reported name.
///
/// Built once by [`AgentRegistry::discover`] (or by hand in tests) and then
/// only read. Replacing it means building a new value.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, RegisteredAgent>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent with a live connection. A duplicate name replaces the earlier entry.
    pub fn with_agent(mut self, card: AgentCard, connection: RemoteAgentConnection) -> Self {
        self.insert(card, Some(connection));
        self
    }

    /// Add an agent whose connection is not usable.
    pub fn with_placeholder(mut self, card: AgentCard) -> Self {
        self.insert(card, None);
        self
    }

    fn insert(&mut self, card: AgentCard, connection: Option<RemoteAgentConnection>) {
        let name = card.name.clone();
        let previous = self
            .agents
            .insert(name.clone(), RegisteredAgent { card, connection });
        if let Some(previous) = previous {
            warn!(
                agent = %name,
                previous_url = ?previous.connection.as_ref().map(|c| c.base_url().to_string()),
                "duplicate agent name; earlier registration replaced"
            );
        }
    }

    /// Resolve every address concurrently and build a registry from the ones that answer.
    ///
    /// An address that fails to resolve is logged and left out; it does not abort the others.
    pub async fn discover<F>(resolver: &CardResolver, addresses: &[String], connect: F) -> Self
    where
        F: Fn(&AgentCard, &str) -> RemoteAgentConnection,
    {
        let lookups = addresses.iter().map(|address| async move {
            (address.as_str(), resolver.resolve(address).await)
        });

        let mut registry = Self::new();
        for (address, outcome) in join_all(lookups).await {
            match outcome {
                Ok(card) => {
                    info!(
                        agent = %card.name,
                        url = %address,
                        skills = card.skills.len(),
                        "discovered agent"
                    );
                    let connection = connect(&card, address);
                    registry.insert(card, Some(connection));
                }
                Err(e) => {
                    error!(url = %address, error = %e, "failed to resolve agent card");
                }
            }
        }
        registry
    }

    /// Discover agents and connect to each over HTTP.
    ///
    /// `client` carries the message traffic; per-call deadlines come from `timeout`.
    pub async fn discover_http(
        resolver: &CardResolver,
        addresses: &[String],
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self::discover(resolver, addresses, |card, address| {
            let transport: Arc<dyn AgentTransport> =
                Arc::new(HttpTransport::new(client.clone(), address));
            RemoteAgentConnection::new(card.name.clone(), address, transport, timeout)
        })
        .await
    }

    /// Look up the connection for an agent.
    ///
    /// Unknown names yield `AgentNotFound`; placeholders yield `ConnectionUnavailable`.
    pub fn connection(&self, agent_name: &str) -> Result<&RemoteAgentConnection> {
        let agent = self
            .agents
            .get(agent_name)
            .ok_or_else(|| Error::AgentNotFound(agent_name.to_string()))?;
        agent
            .connection
            .as_ref()
            .ok_or_else(|| Error::ConnectionUnavailable(agent_name.to_string()))
    }

    /// Card of a registered agent.
    pub fn card(&self, agent_name: &str) -> Option<&AgentCard> {
        self.agents.get(agent_name).map(|a| &a.card)
    }

    /// Whether an agent is registered under this name.
    pub fn contains(&self, agent_name: &str) -> bool {
        self.agents.contains_key(agent_name)
    }

    /// Registered agent names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Name and description of every registered agent.
    pub fn list_remote_agents(&self) -> Vec<AgentSummary> {
        self.agents
            .values()
            .map(|a| AgentSummary {
                name: a.card.name.clone(),
                description: a.card.description.clone(),
            })
            .collect()
    }

    /// One JSON object per line, for embedding in host instructions.
    pub fn agents_summary(&self) -> String {
        self.list_remote_agents()
            .iter()
            .filter_map(|s| serde_json::to_string(s).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
