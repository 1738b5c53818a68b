//! Response assembler - drives one agent's turn to completion
//!
//! Drafting, then any number of tool rounds up to the cap, then at most one
//! continuation when the draft was cut off. Interjections take a short path:
//! one fast-tier completion without tools or continuation.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::loop_state::TurnState;
use crate::agent::registry::{Agent, AgentRegistry};
use crate::core::config::CouncilConfig;
use crate::core::{
    AgentId, AgentTurn, CouncilError, Message, Result, Role, ToolCall, ToolInvocationRequest, ToolResult,
    TurnPhase,
};
use crate::llm::{Completion, CompletionRequest, LLMProvider, ModelTier, PromptMessage};
use crate::tools::ToolExecutor;

/// Characters of tool output folded into a follow-up prompt
pub const TOOL_OUTPUT_LIMIT: usize = 500;

/// Characters of the draft quoted back in a continuation request
const CONTINUATION_QUOTE: usize = 100;

/// Words that mean the model stopped mid-thought when they end a draft
const CUTOFF_INDICATORS: &[&str] = &[
    "Additionally,",
    "Furthermore,",
    "However,",
    "Also,",
    "First,",
    "Second,",
    "Third,",
    "Finally,",
];

/// Whether `text` looks cut off: one of the dangling connectives appears
/// in its last three words
pub fn looks_cut_off(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    let tail = words[words.len().saturating_sub(3)..].join(" ");
    CUTOFF_INDICATORS.iter().any(|indicator| tail.contains(indicator))
}

/// Limits applied while assembling turns
#[derive(Debug, Clone)]
pub struct AssemblerSettings {
    pub max_tokens: u32,
    pub interjection_max_tokens: u32,
    pub max_tool_rounds: usize,
}

impl From<&CouncilConfig> for AssemblerSettings {
    fn from(config: &CouncilConfig) -> Self {
        Self {
            max_tokens: config.max_response_tokens,
            interjection_max_tokens: config.interjection_max_tokens,
            max_tool_rounds: config.max_tool_rounds,
        }
    }
}

/// Everything an agent sees of the conversation for one turn
pub struct TurnContext<'a> {
    pub message: &'a str,
    pub window: &'a [Message],
    pub summaries: &'a [String],
    pub registry: &'a AgentRegistry,
    pub complexity: f64,
}

impl TurnContext<'_> {
    /// Render the window for `agent`, leaving out its own messages
    pub fn render_for(&self, agent: &AgentId) -> String {
        let mut parts = Vec::new();

        if !self.summaries.is_empty() {
            parts.push(format!("Previous context summary: {}", self.summaries.join(" ")));
        }

        for message in self.window {
            if message.agent.as_ref() == Some(agent) {
                continue;
            }
            let mut line = match (message.role, &message.agent) {
                (Role::User, _) | (_, None) => format!("User: {}", message.content),
                (Role::Agent, Some(id)) => format!("{}: {}", self.registry.display_name(id), message.content),
                (Role::ToolResult, Some(id)) => match &message.tool_result {
                    Some(result) => format!(
                        "[{} ran {}] {}",
                        self.registry.display_name(id),
                        result.tool_name,
                        result.summarize(TOOL_OUTPUT_LIMIT)
                    ),
                    None => format!("[{} tool output] {}", self.registry.display_name(id), message.content),
                },
            };
            if !message.complete {
                line.push_str(" [INCOMPLETE]");
            }
            parts.push(line);
        }

        if parts.is_empty() {
            "(no earlier conversation)".to_string()
        } else {
            parts.join("\n")
        }
    }
}

/// Builds complete agent turns
pub struct ResponseAssembler {
    llm: Arc<dyn LLMProvider>,
    tools: Arc<ToolExecutor>,
    settings: AssemblerSettings,
}

impl ResponseAssembler {
    pub fn new(llm: Arc<dyn LLMProvider>, tools: Arc<ToolExecutor>, settings: AssemblerSettings) -> Self {
        Self { llm, tools, settings }
    }

    /// Run a primary turn for `agent`
    pub async fn assemble(
        &self,
        agent: &Agent,
        turn_id: u64,
        ctx: &TurnContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<AgentTurn> {
        let mut state = TurnState::new(turn_id, self.settings.max_tool_rounds);
        let prompt = self.build_prompt(agent, ctx);
        let base = CompletionRequest {
            tier: ModelTier::Primary,
            system: Some(agent.persona.clone()),
            messages: vec![PromptMessage::user(prompt.clone())],
            max_tokens: self.settings.max_tokens,
            tools: agent.tool_definitions(),
        };

        debug!(agent = %agent.id, turn_id, tools = base.tools.len(), "drafting");
        let mut completion = self.complete(base.clone(), cancel).await?;

        while !completion.tool_calls.is_empty() {
            if !state.can_call_tools() {
                info!(agent = %agent.id, rounds = state.round, "tool round cap reached, synthesizing");
                let mut synthesis = self.follow_up(&base, &prompt, &completion, &state);
                synthesis.tools.clear();
                completion = self.complete(synthesis, cancel).await?;
                completion.tool_calls.clear();
                break;
            }

            state.enter(TurnPhase::ToolPending);
            let results = self.dispatch(agent, &completion.tool_calls, &mut state, cancel).await;
            if cancel.is_cancelled() {
                return Err(CouncilError::Cancelled);
            }
            state.add_observations(results);

            let request = self.follow_up(&base, &prompt, &completion, &state);
            completion = self.complete(request, cancel).await?;
        }

        let draft_truncated = completion.truncated || looks_cut_off(&completion.text);
        let mut text = completion.text;
        let mut continued = false;
        let mut incomplete = draft_truncated;

        if draft_truncated {
            state.enter(TurnPhase::Finalizing);
            continued = true;
            match self.continuation(agent, &text, cancel).await {
                Ok(rest) => {
                    incomplete = rest.truncated || looks_cut_off(&rest.text);
                    if !rest.text.is_empty() {
                        text = format!("{} {}", text.trim_end(), rest.text.trim_start());
                    }
                }
                Err(CouncilError::Cancelled) => return Err(CouncilError::Cancelled),
                Err(e) => warn!(agent = %agent.id, error = %e, "continuation failed, keeping draft"),
            }
        }

        state.enter(TurnPhase::Complete);
        info!(
            agent = %agent.id,
            turn_id,
            tools = state.observations.len(),
            continued,
            incomplete,
            "turn complete"
        );

        Ok(AgentTurn {
            turn_id,
            agent: agent.id.clone(),
            text,
            tool_results: state.observations,
            interjection: false,
            truncated: draft_truncated,
            continued,
            incomplete,
            phases: state.phases,
            issued: state.issued,
        })
    }

    /// Run an abbreviated interjection turn: no tools, no continuation
    pub async fn interject(
        &self,
        agent: &Agent,
        turn_id: u64,
        ctx: &TurnContext<'_>,
        earlier: &[AgentTurn],
        cancel: &CancellationToken,
    ) -> Result<AgentTurn> {
        let replies = earlier
            .iter()
            .map(|t| format!("{}: {}", ctx.registry.display_name(&t.agent), t.text))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Previous conversation:\n{}\n\nBased on the ongoing discussion about: '{}'\n\n\
             Your colleagues just answered:\n{}\n\n\
             As {} ({}), add one short, relevant comment from your own expertise. Be {}. \
             One sentence only.",
            ctx.render_for(&agent.id),
            ctx.message,
            replies,
            agent.name,
            agent.role,
            agent.interaction_style
        );

        let request = CompletionRequest::simple(ModelTier::Fast, prompt, self.settings.interjection_max_tokens)
            .with_system(agent.persona.clone());

        debug!(agent = %agent.id, turn_id, "interjecting");
        let completion = self.complete(request, cancel).await?;
        let truncated = completion.truncated || looks_cut_off(&completion.text);

        Ok(AgentTurn {
            turn_id,
            agent: agent.id.clone(),
            text: completion.text,
            tool_results: Vec::new(),
            interjection: true,
            truncated,
            continued: false,
            incomplete: truncated,
            phases: vec![TurnPhase::Drafting, TurnPhase::Complete],
            issued: Vec::new(),
        })
    }

    fn build_prompt(&self, agent: &Agent, ctx: &TurnContext<'_>) -> String {
        format!(
            "Previous conversation:\n{}\n\nCurrent message: {}\n\n\
             Conversation complexity: {:.1}x\n\n\
             Respond as {}, {}. Be {}.\n\
             - Maximum 2 sentences\n\
             - Get straight to the actionable point\n\
             - Use your tools when live data would help, and incorporate their results\n\
             - You can refer to your colleagues by name",
            ctx.render_for(&agent.id),
            ctx.message,
            ctx.complexity,
            agent.name,
            agent.role,
            agent.interaction_style
        )
    }

    fn follow_up(
        &self,
        base: &CompletionRequest,
        prompt: &str,
        last: &Completion,
        state: &TurnState,
    ) -> CompletionRequest {
        let draft = if last.text.is_empty() {
            "(checking with tools)".to_string()
        } else {
            last.text.clone()
        };
        let mut request = base.clone();
        request.messages = vec![
            PromptMessage::user(prompt.to_string()),
            PromptMessage::assistant(draft),
            PromptMessage::user(format!(
                "{}\nNow give your final answer.",
                state.format_observations(TOOL_OUTPUT_LIMIT)
            )),
        ];
        request
    }

    async fn continuation(&self, agent: &Agent, draft: &str, cancel: &CancellationToken) -> Result<Completion> {
        let quote: String = {
            let chars: Vec<char> = draft.chars().collect();
            chars[chars.len().saturating_sub(CONTINUATION_QUOTE)..].iter().collect()
        };
        let prompt = format!(
            "Continue your previous response. You were saying:\n\"{}\"\n\nPlease continue from where you left off.",
            quote
        );
        let request = CompletionRequest::simple(ModelTier::Primary, prompt, self.settings.max_tokens)
            .with_system(agent.persona.clone());
        debug!(agent = %agent.id, "requesting continuation");
        self.complete(request, cancel).await
    }

    /// Execute every requested call concurrently, results in request order
    async fn dispatch(
        &self,
        agent: &Agent,
        calls: &[ToolCall],
        state: &mut TurnState,
        cancel: &CancellationToken,
    ) -> Vec<ToolResult> {
        let now = Instant::now();
        let jobs: Vec<_> = calls
            .iter()
            .map(|call| {
                let binding = agent.binding(&call.name);
                let timeout = binding.map(|b| self.tools.timeout_for(b)).unwrap_or_default();
                let attempts = binding.map(ToolExecutor::attempts_for).unwrap_or(1);
                let request = ToolInvocationRequest {
                    id: state.issue(),
                    tool: call.name.clone(),
                    arguments: call.argument_map(),
                    agent: agent.id.clone(),
                    deadline: now + timeout * attempts,
                };
                (request, binding, timeout)
            })
            .collect();

        info!(agent = %agent.id, count = jobs.len(), "dispatching tool calls");

        join_all(jobs.iter().map(|(request, binding, timeout)| async move {
            match binding {
                Some(binding) => self.tools.execute(request, binding, *timeout, cancel).await,
                None => ToolExecutor::unknown_tool(request),
            }
        }))
        .await
    }

    async fn complete(&self, request: CompletionRequest, cancel: &CancellationToken) -> Result<Completion> {
        tokio::select! {
            result = self.llm.complete(request) => result,
            () = cancel.cancelled() => Err(CouncilError::Cancelled),
        }
    }
}
