//! Agent registry
//!
//! Immutable catalog of council members. Declaration order matters: it is
//! the tie-break for selection and the order interjection draws are taken.

use std::collections::HashSet;

use crate::core::config::ToolsConfig;
use crate::core::{AgentId, CouncilError, Result, ToolDefinition};
use crate::tools::ToolBinding;

/// One council member
#[derive(Debug, Clone)]
pub struct Agent {
    /// Stable lowercase id
    pub id: AgentId,
    /// Display name
    pub name: String,
    /// Role description, also matched against role signals
    pub role: String,
    /// Persona text sent as the system prompt
    pub persona: String,
    /// Short description of how the agent talks
    pub interaction_style: String,
    /// Trigger keywords, lowercase
    pub triggers: Vec<String>,
    /// Tool bindings in declaration order
    pub tools: Vec<ToolBinding>,
    /// Multiplier applied to the relevance score
    pub relevance_weight: f64,
}

impl Agent {
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    /// Binding for a tool name, if this agent owns one
    pub fn binding(&self, tool: &str) -> Option<&ToolBinding> {
        self.tools.iter().find(|b| b.name == tool)
    }

    /// Tool definitions offered to the model for this agent
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolBinding::definition).collect()
    }
}

/// Builder for creating agents
pub struct AgentBuilder {
    id: AgentId,
    name: Option<String>,
    role: String,
    persona: Option<String>,
    interaction_style: String,
    triggers: Vec<String>,
    tools: Vec<ToolBinding>,
    relevance_weight: f64,
}

impl AgentBuilder {
    /// Create a new builder with the given id
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: AgentId::new(id),
            name: None,
            role: String::new(),
            persona: None,
            interaction_style: "direct".to_string(),
            triggers: Vec::new(),
            tools: Vec::new(),
            relevance_weight: 1.0,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.interaction_style = style.into();
        self
    }

    /// Set trigger keywords (lowercased)
    pub fn triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.triggers = triggers
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    pub fn tool(mut self, binding: ToolBinding) -> Self {
        self.tools.push(binding);
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.relevance_weight = weight;
        self
    }

    /// Build the agent
    pub fn build(self) -> Agent {
        let name = self.name.unwrap_or_else(|| self.id.to_string());
        Agent {
            persona: self
                .persona
                .unwrap_or_else(|| format!("You are {}, a member of an engineering team.", name)),
            id: self.id,
            name,
            role: self.role,
            interaction_style: self.interaction_style,
            triggers: self.triggers,
            tools: self.tools,
            relevance_weight: self.relevance_weight,
        }
    }
}

/// Catalog of agents in declaration order
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    /// Create a registry, rejecting empty rosters, duplicate ids and
    /// duplicate tool names within one agent
    pub fn new(agents: Vec<Agent>) -> Result<Self> {
        if agents.is_empty() {
            return Err(CouncilError::registry("no agents defined"));
        }

        let mut ids = HashSet::new();
        for agent in &agents {
            if agent.id.as_str().is_empty() {
                return Err(CouncilError::registry("agent with empty id"));
            }
            if agent.id.as_str() == "all" {
                return Err(CouncilError::registry("'all' is reserved for broadcast"));
            }
            if !ids.insert(agent.id.clone()) {
                return Err(CouncilError::registry(format!("duplicate agent id '{}'", agent.id)));
            }
            if !agent.relevance_weight.is_finite() || agent.relevance_weight < 0.0 {
                return Err(CouncilError::registry(format!(
                    "agent '{}' has invalid relevance weight {}",
                    agent.id, agent.relevance_weight
                )));
            }

            let mut tools = HashSet::new();
            for binding in &agent.tools {
                if !tools.insert(binding.name.as_str()) {
                    return Err(CouncilError::registry(format!(
                        "agent '{}' binds tool '{}' twice",
                        agent.id, binding.name
                    )));
                }
            }
        }

        Ok(Self { agents })
    }

    /// Check that every remote descriptor names a configured server
    pub fn check_servers(&self, tools: &ToolsConfig) -> Result<()> {
        for agent in &self.agents {
            for binding in &agent.tools {
                if let Some(remote) = binding.backend.remote() {
                    if !tools.servers.contains_key(&remote.server) {
                        return Err(CouncilError::registry(format!(
                            "tool '{}' of agent '{}' uses unknown server '{}'",
                            binding.name, agent.id, remote.server
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.id == id)
    }

    /// Find an agent by id or display name, ignoring case
    pub fn resolve(&self, name: &str) -> Option<&Agent> {
        let wanted = name.trim().to_lowercase();
        self.agents
            .iter()
            .find(|a| a.id.as_str() == wanted || a.name.to_lowercase() == wanted)
    }

    /// Declaration index, used for deterministic ordering
    pub fn position(&self, id: &AgentId) -> Option<usize> {
        self.agents.iter().position(|a| &a.id == id)
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|a| a.id.clone()).collect()
    }

    /// Agents without tools, in declaration order
    pub fn generalists(&self) -> Vec<AgentId> {
        self.agents
            .iter()
            .filter(|a| !a.has_tools())
            .map(|a| a.id.clone())
            .collect()
    }

    /// Display name for an id, falling back to the id itself
    pub fn display_name(&self, id: &AgentId) -> String {
        self.get(id).map(|a| a.name.clone()).unwrap_or_else(|| id.to_string())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
