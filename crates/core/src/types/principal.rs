use serde::{Deserialize, Serialize};

/// Identity of the caller, constructed fresh per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// External agent identifier.
    pub agent_id: String,

    /// Platform the agent is registered on (e.g. "openai", "bedrock").
    pub provider: String,

    /// Deployment environment the invocation targets.
    pub environment: String,

    /// Owning organization.
    pub organization_id: String,

    /// Roles attached to the invoking user, if any.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    /// Build a principal with no roles.
    pub fn new(
        agent_id: impl Into<String>,
        provider: impl Into<String>,
        environment: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            provider: provider.into(),
            environment: environment.into(),
            organization_id: organization_id.into(),
            roles: Vec::new(),
        }
    }

    /// Attach roles to the principal.
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }
}
