//! Buyer/supplier workflow orchestrator for remote A2A agents
//!
//! This crate coordinates LLM-backed business agents that speak the
//! agent-to-agent (A2A) protocol over HTTP. It:
//!
//! - Discovers remote agent cards and builds a frozen name → connection registry
//! - Sends tasks to a single agent (`send_message`)
//! - Runs fixed multi-step workflows, threading each result into the next step's text
//! - Aborts on hard failures and carries soft failures forward as "no result"
//! - Exposes all of this to an LLM host as MCP tools over stdio
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 LLM host (decides which tool)               │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │ MCP (JSON-RPC over stdio)
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      a2a-orchestrator                       │
//! │  ┌────────────┐ ┌──────────────┐ ┌────────────┐ ┌────────┐  │
//! │  │ Tools      │ │ Orchestrator │ │ Registry   │ │ Stats  │  │
//! │  └────────────┘ └──────────────┘ └────────────┘ └────────┘  │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │ A2A message/send (JSON-RPC over HTTP)
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//! ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//! │ Inventory Mgmt  │  │ Purchase        │  │ Purchase Order  │
//! │ Order Intel     │  │ Validation      │  │ Production Queue│
//! └─────────────────┘  └─────────────────┘  └─────────────────┘
//! ```
//!
//! # Workflows
//!
//! | Role | Workflow | Steps |
//! |------|----------|-------|
//! | buyer | `execute_buyer_workflow` | inventory → validation → purchase order |
//! | supplier | `execute_supplier_workflow` | order intelligence → production queue |
//! | supplier | `execute_order_monitoring_workflow` | monitor → production queue (if orders found) |

pub mod a2a;
pub mod config;
pub mod connection;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;
pub mod tools;
pub mod workflow;

pub use config::{OrchestratorConfig, Role};
pub use connection::{AgentTransport, HttpTransport, RemoteAgentConnection, SendOptions};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use registry::{AgentRegistry, CardResolver};
pub use server::OrchestratorMcpServer;
pub use workflow::{
    FailurePolicy, StepTemplate, TaskResult, WorkflowKind, WorkflowRun, WorkflowStatus,
    WorkflowStep, WorkflowTemplate,
};
