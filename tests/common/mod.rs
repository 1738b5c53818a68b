//! Shared fakes for the integration tests
//!
//! A scripted LLM provider that records every request, an in-memory tool
//! server connector, and a fixed interjection source.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use council::agent::{Agent, AgentBuilder, AgentRegistry, RandomSource};
use council::core::config::RemoteServerConfig;
use council::core::{AgentId, CouncilError, Result};
use council::llm::{Completion, CompletionRequest, LLMProvider, ModelTier};
use council::tools::{ConnectionPool, RemoteConnection, RemoteConnector, StdioConnector, ToolExecutor};
use council::{Config, Council};

type Script = dyn Fn(&CompletionRequest) -> Result<Completion> + Send + Sync;

/// LLM fake answering from a closure
pub struct ScriptedProvider {
    script: Box<Script>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: impl Fn(&CompletionRequest) -> Result<Completion> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Every agent answers "<Name> here"; the oracle names nobody
    pub fn echo() -> Arc<Self> {
        Self::new(|request| {
            Ok(Completion::text(match speaker(request) {
                Some(name) => format!("{} here", name),
                None => String::new(),
            }))
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, filter: impl Fn(&CompletionRequest) -> bool) -> usize {
        self.requests.lock().iter().filter(|r| filter(r)).count()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.requests.lock().push(request.clone());
        (self.script)(&request)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Display name of the persona a request speaks as
pub fn speaker(request: &CompletionRequest) -> Option<&str> {
    request
        .system
        .as_deref()?
        .strip_prefix("You are ")?
        .split(',')
        .next()
}

pub fn first_prompt(request: &CompletionRequest) -> &str {
    request.messages.first().map(|m| m.content.as_str()).unwrap_or_default()
}

pub fn is_oracle(request: &CompletionRequest) -> bool {
    request.tier == ModelTier::Fast && request.system.is_none() && first_prompt(request).contains("Who is most relevant")
}

pub fn is_continuation(request: &CompletionRequest) -> bool {
    first_prompt(request).starts_with("Continue your previous response")
}

pub fn is_interjection(request: &CompletionRequest) -> bool {
    request.tier == ModelTier::Fast && request.system.is_some()
}

/// Every draw returns the same value
pub struct FixedSource(pub f64);

impl RandomSource for FixedSource {
    fn draw(&self, _agent: &AgentId, _turn_id: u64) -> f64 {
        self.0
    }
}

/// Draw that never wins against the default probability
pub const NEVER: f64 = 0.99;
/// Draw that always wins
pub const ALWAYS: f64 = 0.0;

pub fn agent(id: &str, name: &str, role: &str, triggers: &[&str]) -> AgentBuilder {
    AgentBuilder::new(id)
        .name(name)
        .role(role)
        .triggers(triggers.iter().copied())
}

/// Executor with no remote servers
pub fn local_executor() -> ToolExecutor {
    let pool = ConnectionPool::new(Arc::new(StdioConnector), Vec::new(), Duration::from_secs(30));
    ToolExecutor::new(pool, Duration::from_secs(10))
}

pub fn council(agents: Vec<Agent>, llm: Arc<ScriptedProvider>, draw: f64) -> Council {
    let registry = AgentRegistry::new(agents).expect("valid roster");
    Council::new(Config::default(), registry, llm, local_executor(), Arc::new(FixedSource(draw)))
        .expect("valid council")
}

/// In-memory tool server
///
/// Calls answer `"<method> ok"` after `delay`. While `refuse` is set every
/// connection attempt fails.
#[derive(Default)]
pub struct MemoryConnector {
    pub refuse: AtomicBool,
    pub delay: Duration,
    pub connects: AtomicUsize,
    pub cancels: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            refuse: AtomicBool::new(true),
            ..Default::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(&self, server_id: &str, _config: &RemoteServerConfig) -> Result<Box<dyn RemoteConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(CouncilError::protocol(format!("{} refused the connection", server_id)));
        }
        Ok(Box::new(MemoryConnection {
            delay: self.delay,
            cancels: self.cancels.clone(),
        }))
    }
}

struct MemoryConnection {
    delay: Duration,
    cancels: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteConnection for MemoryConnection {
    async fn call(&mut self, method: &str, _arguments: &Map<String, Value>) -> Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "content": [{ "type": "text", "text": format!("{} ok", method) }] }))
    }

    async fn cancel_in_flight(&mut self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn is_alive(&mut self) -> bool {
        true
    }

    async fn close(&mut self) {}
}

pub fn server(id: &str) -> (String, RemoteServerConfig) {
    (
        id.to_string(),
        RemoteServerConfig {
            command: "unused".to_string(),
            args: Vec::new(),
            env: Default::default(),
            description: String::new(),
        },
    )
}
