//! Tool bindings - how an agent reaches a named capability
//!
//! A binding is remote (tool server method), local (command template), or
//! both, in which case the local template is the fallback.

use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::core::{ToolDefinition, ToolFailure};

/// Remote tool-server method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescriptor {
    pub server: String,
    pub method: String,
}

/// Local command template with `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDescriptor {
    pub template: String,
}

impl LocalDescriptor {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut names = Vec::new();
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else { break };
            let name = &after[..close];
            if !name.is_empty() && seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
            rest = &after[close + 1..];
        }
        names
    }

    /// Substitute placeholders and split into program + arguments
    ///
    /// Substitution happens per word after splitting, so argument values
    /// can never inject extra words into the command line.
    pub fn render(&self, arguments: &Map<String, Value>) -> Result<Vec<String>, ToolFailure> {
        let words = shell_words::split(&self.template)
            .map_err(|e| ToolFailure::Template(format!("{}: {}", self.template, e)))?;

        let mut argv = Vec::with_capacity(words.len());
        for word in words {
            let mut out = String::new();
            let mut rest = word.as_str();
            while let Some(open) = rest.find('{') {
                out.push_str(&rest[..open]);
                let after = &rest[open + 1..];
                let Some(close) = after.find('}') else {
                    return Err(ToolFailure::Template(format!("unclosed placeholder in '{}'", word)));
                };
                let name = &after[..close];
                let value = arguments
                    .get(name)
                    .ok_or_else(|| ToolFailure::Template(format!("missing argument '{}'", name)))?;
                match value {
                    Value::String(s) => out.push_str(s),
                    Value::Null => {
                        return Err(ToolFailure::Template(format!("missing argument '{}'", name)))
                    }
                    other => out.push_str(&other.to_string()),
                }
                rest = &after[close + 1..];
            }
            out.push_str(rest);
            argv.push(out);
        }

        if argv.is_empty() {
            return Err(ToolFailure::Template("empty command".to_string()));
        }
        Ok(argv)
    }
}

/// How a binding is executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolBackend {
    Remote(RemoteDescriptor),
    Local(LocalDescriptor),
    Both {
        remote: RemoteDescriptor,
        local: LocalDescriptor,
    },
}

impl ToolBackend {
    pub fn remote(&self) -> Option<&RemoteDescriptor> {
        match self {
            ToolBackend::Remote(r) | ToolBackend::Both { remote: r, .. } => Some(r),
            ToolBackend::Local(_) => None,
        }
    }

    pub fn local(&self) -> Option<&LocalDescriptor> {
        match self {
            ToolBackend::Local(l) | ToolBackend::Both { local: l, .. } => Some(l),
            ToolBackend::Remote(_) => None,
        }
    }
}

/// A named capability owned by one agent
#[derive(Debug, Clone)]
pub struct ToolBinding {
    pub name: String,
    pub description: String,
    pub backend: ToolBackend,
    /// Explicit parameter schema; derived from placeholders when absent
    pub schema: Option<Value>,
    /// Per-binding timeout; the configured default applies when absent
    pub timeout: Option<Duration>,
}

impl ToolBinding {
    /// A local-only binding
    pub fn local(name: impl Into<String>, description: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            backend: ToolBackend::Local(LocalDescriptor::new(template)),
            schema: None,
            timeout: None,
        }
    }

    /// A remote-only binding
    pub fn remote(
        name: impl Into<String>,
        description: impl Into<String>,
        server: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            backend: ToolBackend::Remote(RemoteDescriptor {
                server: server.into(),
                method: method.into(),
            }),
            schema: None,
            timeout: None,
        }
    }

    /// Add a local fallback to a remote binding
    pub fn with_fallback(mut self, template: impl Into<String>) -> Self {
        let local = LocalDescriptor::new(template);
        self.backend = match self.backend {
            ToolBackend::Remote(remote) | ToolBackend::Both { remote, .. } => {
                ToolBackend::Both { remote, local }
            }
            ToolBackend::Local(_) => ToolBackend::Local(local),
        };
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Effective timeout given the configured default
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    /// Definition offered to the model
    pub fn definition(&self) -> ToolDefinition {
        let schema = self.schema.clone().unwrap_or_else(|| {
            let names = self
                .backend
                .local()
                .map(LocalDescriptor::placeholders)
                .unwrap_or_default();
            let properties: Map<String, Value> = names
                .iter()
                .map(|n| (n.clone(), json!({ "type": "string" })))
                .collect();
            json!({
                "type": "object",
                "properties": properties,
                "required": names,
            })
        });
        ToolDefinition::new(&self.name, &self.description, schema)
    }
}
