use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilityConstraint};

pub const DEFAULT_RATE_LIMIT_MINUTES: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Authorization rules attached to an agent definition.
pub struct AuthorizationRules {
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub allowed_teams: Vec<String>,
    #[serde(default)]
    pub trigger_labels: Vec<String>,
    #[serde(default)]
    pub rate_limit_minutes: Option<u64>,
}

impl AuthorizationRules {
    pub fn rate_limit_minutes(&self) -> u64 {
        self.rate_limit_minutes.unwrap_or(DEFAULT_RATE_LIMIT_MINUTES)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Single capability entry; declaration order is preserved across the run.
pub struct CapabilityEntry {
    pub capability: Capability,
    #[serde(default)]
    pub constraint: CapabilityConstraint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Immutable per-run agent definition loaded by an external collaborator.
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityEntry>,
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    #[serde(default)]
    pub authorization: AuthorizationRules,
    #[serde(default)]
    pub instructions: String,
}
