//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::a2a::AGENT_CARD_PATH;
use crate::error::{Error, Result};

/// Which side of the supply chain the orchestrator coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Inventory management, purchase validation, purchase order generation.
    Buyer,
    /// Order intelligence and production queue management.
    Supplier,
}

impl Role {
    /// Environment variables and fallback URLs for this role's remote agents.
    pub fn default_agent_urls(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Role::Buyer => &[
                ("INVENTORY_AGENT_URL", "http://localhost:8001"),
                ("PURCHASE_VALIDATION_AGENT_URL", "http://localhost:8002"),
                ("PURCHASE_ORDER_AGENT_URL", "http://localhost:8003"),
            ],
            Role::Supplier => &[
                ("ORDER_INTELLIGENCE_AGENT_URL", "http://localhost:8004"),
                ("PRODUCTION_QUEUE_AGENT_URL", "http://localhost:8005"),
            ],
        }
    }

    /// Agent URLs for this role, read from the environment with defaults.
    pub fn agent_urls_from_env(self) -> Vec<String> {
        self.default_agent_urls()
            .iter()
            .map(|(var, default)| std::env::var(var).unwrap_or_else(|_| (*default).to_string()))
            .collect()
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Side of the workflow this orchestrator runs.
    pub role: Role,
    /// Base URLs of the remote agents to discover.
    pub agent_urls: Vec<String>,
    /// Deadline for each remote call.
    pub request_timeout: Duration,
    /// Deadline for agent card discovery requests.
    pub discovery_timeout: Duration,
    /// Card path relative to each base URL.
    pub card_path: String,
}

impl OrchestratorConfig {
    /// Default configuration for a role, with agent URLs from the environment.
    pub fn for_role(role: Role) -> Self {
        Self {
            role,
            agent_urls: role.agent_urls_from_env(),
            ..Default::default()
        }
    }

    /// Check the configuration before use.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be non-zero".into()));
        }
        if self.discovery_timeout.is_zero() {
            return Err(Error::Config("discovery timeout must be non-zero".into()));
        }
        if let Some(bad) = self
            .agent_urls
            .iter()
            .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
        {
            return Err(Error::Config(format!("agent URL must be http(s): {}", bad)));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            role: Role::Buyer,
            agent_urls: Vec::new(),
            request_timeout: Duration::from_secs(120),
            discovery_timeout: Duration::from_secs(30),
            card_path: AGENT_CARD_PATH.into(),
        }
    }
}
