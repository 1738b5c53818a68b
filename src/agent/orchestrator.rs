//! Council orchestrator
//!
//! One cycle per user message: select agents, draft their turns
//! concurrently, run the interjection pass, then commit the user message and
//! every finished turn to the window in selection order. A cycle that is
//! cancelled by `reset` or `exit` commits nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::agent::assembler::{AssemblerSettings, ResponseAssembler, TurnContext};
use crate::agent::context::ContextManager;
use crate::agent::interjection::{InterjectionPolicy, RandomSource, SeededSource};
use crate::agent::registry::{Agent, AgentRegistry};
use crate::agent::roster::default_roster;
use crate::agent::selector::{RelevanceSelector, Selection};
use crate::core::{AgentId, AgentTurn, Config, CouncilError, Message, Result};
use crate::llm::{AnthropicClient, CompletionRequest, LLMProvider, ModelTier};
use crate::tools::{StdioConnector, ToolExecutor};

/// An agent whose turn failed; the rest of the cycle is unaffected
#[derive(Debug, Clone)]
pub struct TurnFailure {
    pub agent: AgentId,
    pub error: String,
}

/// Everything one cycle produced
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub selection: Selection,
    /// Primary turns in selection order, then interjections
    pub turns: Vec<AgentTurn>,
    pub failures: Vec<TurnFailure>,
}

/// Window statistics for status displays
#[derive(Debug, Clone, Copy)]
pub struct ContextStatus {
    pub messages: usize,
    pub capacity: usize,
    pub complexity: f64,
    pub summaries: usize,
}

/// The council: registry, model access, tools and the shared window
pub struct Council {
    config: Config,
    registry: Arc<AgentRegistry>,
    llm: Arc<dyn LLMProvider>,
    selector: RelevanceSelector,
    assembler: ResponseAssembler,
    tools: Arc<ToolExecutor>,
    interjections: InterjectionPolicy,
    context: Mutex<ContextManager>,
    cycle: Mutex<CancellationToken>,
    /// Held shared by every running cycle; reset and shutdown take it
    /// exclusively to wait for them to finish
    inflight: RwLock<()>,
    next_turn: AtomicU64,
}

impl Council {
    /// Assemble a council from its parts
    pub fn new(
        config: Config,
        registry: AgentRegistry,
        llm: Arc<dyn LLMProvider>,
        tools: ToolExecutor,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        config.validate()?;
        let tools = Arc::new(tools);

        Ok(Self {
            selector: RelevanceSelector::new(llm.clone(), config.council.oracle_max_tokens),
            assembler: ResponseAssembler::new(llm.clone(), tools.clone(), AssemblerSettings::from(&config.council)),
            interjections: InterjectionPolicy::new(config.council.interjection_probability, random),
            context: Mutex::new(ContextManager::new(&config.context)),
            cycle: Mutex::new(CancellationToken::new()),
            inflight: RwLock::new(()),
            next_turn: AtomicU64::new(1),
            registry: Arc::new(registry),
            llm,
            tools,
            config,
        })
    }

    /// Build the default council: Anthropic client, built-in roster, stdio tool servers
    ///
    /// Missing credentials or an invalid roster are session-fatal.
    pub fn from_config(config: Config) -> Result<Self> {
        let llm: Arc<dyn LLMProvider> = Arc::new(AnthropicClient::from_config(&config)?);
        let registry = AgentRegistry::new(default_roster())?;
        registry.check_servers(&config.tools)?;
        let tools = ToolExecutor::from_config(&config.tools, Arc::new(StdioConnector));
        Self::new(config, registry, llm, tools, Arc::new(SeededSource::from_entropy()))
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.llm.name()
    }

    pub fn context_status(&self) -> ContextStatus {
        let ctx = self.context.lock();
        ContextStatus {
            messages: ctx.len(),
            capacity: ctx.capacity(),
            complexity: ctx.complexity(),
            summaries: ctx.summaries().len(),
        }
    }

    /// Snapshot of the committed window
    pub fn window(&self) -> Vec<Message> {
        self.context.lock().current_window()
    }

    fn next_turn_id(&self) -> u64 {
        self.next_turn.fetch_add(1, Ordering::Relaxed)
    }

    /// Run one orchestration cycle for a user message
    ///
    /// Returns `CouncilError::Cancelled` if `reset`, `interrupt` or `shutdown`
    /// fired while the cycle was in flight; the window is left untouched in
    /// that case.
    pub async fn process(&self, message: &str) -> Result<CycleOutcome> {
        let _running = self.inflight.read().await;
        let cancel = self.cycle.lock().clone();

        let (window, summaries, complexity) = {
            let mut ctx = self.context.lock();
            ctx.resize();
            (ctx.current_window(), ctx.summaries(), ctx.complexity())
        };

        let selection = tokio::select! {
            selection = self.selector.select(message, &self.registry, &window) => selection,
            () = cancel.cancelled() => return Err(CouncilError::Cancelled),
        };
        let selected: Vec<&Agent> = selection
            .agents(&self.registry)
            .iter()
            .filter_map(|id| self.registry.get(id))
            .collect();

        let ctx = TurnContext {
            message: &selection.text,
            window: &window,
            summaries: &summaries,
            registry: &self.registry,
            complexity,
        };

        let primaries = join_all(selected.iter().map(|agent| {
            let turn_id = self.next_turn_id();
            let ctx = &ctx;
            let cancel = &cancel;
            async move { (agent.id.clone(), self.assembler.assemble(agent, turn_id, ctx, cancel).await) }
        }))
        .await;

        let (mut turns, mut failures) = Self::partition(primaries)?;

        let interjectors = self.draw_interjectors(&selected, &turns);
        if !interjectors.is_empty() {
            let earlier = turns.clone();
            let interjected = join_all(interjectors.iter().map(|agent| {
                let turn_id = self.next_turn_id();
                let ctx = &ctx;
                let cancel = &cancel;
                let earlier = &earlier;
                async move {
                    (
                        agent.id.clone(),
                        self.assembler.interject(agent, turn_id, ctx, earlier, cancel).await,
                    )
                }
            }))
            .await;
            let (extra, extra_failures) = Self::partition(interjected)?;
            turns.extend(extra);
            failures.extend(extra_failures);
        }

        self.commit(message, &turns, &cancel)?;
        self.maybe_summarize(&cancel).await;

        Ok(CycleOutcome {
            selection,
            turns,
            failures,
        })
    }

    /// Split per-agent results; a cancelled agent cancels the whole cycle
    fn partition(results: Vec<(AgentId, Result<AgentTurn>)>) -> Result<(Vec<AgentTurn>, Vec<TurnFailure>)> {
        let mut turns = Vec::new();
        let mut failures = Vec::new();
        for (agent, result) in results {
            match result {
                Ok(turn) => turns.push(turn),
                Err(CouncilError::Cancelled) => return Err(CouncilError::Cancelled),
                Err(e) => {
                    warn!(agent = %agent, error = %e, "agent turn failed");
                    failures.push(TurnFailure {
                        agent,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok((turns, failures))
    }

    /// Idle agents that win their draw after each primary turn; each agent
    /// interjects at most once per cycle
    fn draw_interjectors<'a>(&'a self, selected: &[&Agent], primaries: &[AgentTurn]) -> Vec<&'a Agent> {
        let mut interjectors: Vec<&Agent> = Vec::new();
        for turn in primaries {
            for agent in self.registry.agents() {
                let idle = !selected.iter().any(|s| s.id == agent.id);
                let already = interjectors.iter().any(|a| a.id == agent.id);
                if idle && !already && self.interjections.should_interject(&agent.id, turn.turn_id) {
                    debug!(agent = %agent.id, after = %turn.agent, "interjection drawn");
                    interjectors.push(agent);
                }
            }
        }
        interjectors
    }

    /// Append the user message and all turns under one lock, unless cancelled
    fn commit(&self, message: &str, turns: &[AgentTurn], cancel: &CancellationToken) -> Result<()> {
        let mut ctx = self.context.lock();
        if cancel.is_cancelled() {
            return Err(CouncilError::Cancelled);
        }

        ctx.append(Message::user(message.trim()));
        for turn in turns {
            if !turn.verify_provenance() {
                error!(agent = %turn.agent, turn_id = turn.turn_id, "turn carries foreign tool results, not committed");
                continue;
            }
            for msg in turn.to_messages() {
                ctx.append(msg);
            }
        }
        debug!(messages = ctx.len(), capacity = ctx.capacity(), "cycle committed");
        Ok(())
    }

    /// Condense evicted messages once enough have piled up; failures are ignored
    async fn maybe_summarize(&self, cancel: &CancellationToken) {
        let Some(batch) = self.context.lock().take_summary_batch() else {
            return;
        };

        let transcript = batch
            .iter()
            .map(|m| match &m.agent {
                Some(id) => format!("{}: {}", self.registry.display_name(id), m.content),
                None => format!("User: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let request = CompletionRequest::simple(
            ModelTier::Fast,
            format!("Summarize the key points of this conversation in 2-3 sentences:\n\n{}", transcript),
            self.config.council.interjection_max_tokens,
        );

        let result = tokio::select! {
            result = self.llm.complete(request) => result,
            () = cancel.cancelled() => return,
        };
        match result {
            Ok(completion) if !completion.text.is_empty() => {
                let mut ctx = self.context.lock();
                if !cancel.is_cancelled() {
                    ctx.add_summary(completion.text);
                    debug!(summarized = batch.len(), "added context summary");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "summary request failed"),
        }
    }

    /// Signal in-flight cycles to abort without waiting for them
    ///
    /// Cycles started afterwards get a fresh token.
    pub fn interrupt(&self) {
        let mut token = self.cycle.lock();
        token.cancel();
        *token = CancellationToken::new();
    }

    /// Abort any in-flight cycle, wait until its tool calls are torn down,
    /// then clear the window to its minimum capacity
    pub async fn reset(&self) {
        self.interrupt();
        let _drained = self.inflight.write().await;
        self.context.lock().reset();
        info!("council reset");
    }

    /// Abort any in-flight cycle and close all tool server connections
    pub async fn shutdown(&self) {
        self.cycle.lock().cancel();
        let _drained = self.inflight.write().await;
        self.tools.shutdown().await;
        info!("council shut down");
    }
}
