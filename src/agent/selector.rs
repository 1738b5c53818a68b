//! Relevance selection - decides which agents answer a user message
//!
//! Order of precedence: explicit `@agent` / `@all` addressing, keyword and
//! role-signal scoring, then a classification call to the fast model tier.
//! If that call fails the tool-less generalists answer.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agent::registry::{Agent, AgentRegistry};
use crate::core::{AgentId, Message, Role};
use crate::llm::{CompletionRequest, LLMProvider, ModelTier};

/// Most agents a selection may name
pub const MAX_SELECTED: usize = 3;

const TRIGGER_WEIGHT: f64 = 2.0;
const ROLE_SIGNAL_WEIGHT: f64 = 1.5;

/// Score thresholds for the first, second and third candidate
const RANK_THRESHOLDS: [f64; MAX_SELECTED] = [0.0, 1.0, 2.0];

/// Keywords that hint at a role, keyed by a word appearing in the role text
const ROLE_SIGNALS: &[(&str, &[&str])] = &[
    ("infrastructure", &["deploy", "server", "cloud", "aws", "scale", "performance", "latency"]),
    ("devops", &["ci/cd", "pipeline", "docker", "kubernetes", "build", "deploy", "slow", "slowly", "outage", "latency"]),
    ("backend", &["api", "database", "service", "logic", "algorithm", "data"]),
    ("frontend", &["ui", "user", "interface", "design", "component", "react"]),
    ("security", &["security", "auth", "vulnerability", "hack", "breach", "encrypt"]),
    ("project", &["deadline", "timeline", "budget", "client", "planning", "meeting"]),
];

/// Who should answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Between one and three agents, no duplicates
    Agents(Vec<AgentId>),
    /// `@all`: every registered agent
    All,
}

/// How a selection was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
    Addressed,
    Broadcast,
    Keywords,
    Oracle,
    Fallback,
}

/// Outcome of selection for one user message
#[derive(Debug, Clone)]
pub struct Selection {
    pub target: Target,
    pub method: SelectionMethod,
    /// The message with a leading address removed
    pub text: String,
}

impl Selection {
    /// Expand the target into concrete agent ids
    pub fn agents(&self, registry: &AgentRegistry) -> Vec<AgentId> {
        match &self.target {
            Target::Agents(ids) => ids.clone(),
            Target::All => registry.ids(),
        }
    }
}

/// Lowercase word tokens; `/` and `-` stay inside words
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '/' || c == '-' || c == '@'))
        .map(|t| t.trim_matches(|c| c == '/' || c == '-').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

enum Address {
    All,
    Agents(Vec<AgentId>),
}

/// Find `@name` addresses; unknown names are ignored
fn parse_addresses(message: &str, registry: &AgentRegistry) -> Option<Address> {
    let mut agents: Vec<AgentId> = Vec::new();
    for word in message.split_whitespace() {
        let Some(name) = word.strip_prefix('@') else { continue };
        let name = name.trim_end_matches(|c: char| !c.is_alphanumeric());
        if name.eq_ignore_ascii_case("all") {
            return Some(Address::All);
        }
        if let Some(agent) = registry.resolve(name) {
            if !agents.contains(&agent.id) {
                agents.push(agent.id.clone());
            }
        }
    }
    agents.truncate(MAX_SELECTED);
    (!agents.is_empty()).then_some(Address::Agents(agents))
}

/// Drop every leading `@name` from the text handed to the agents
fn strip_leading_address(message: &str) -> String {
    let mut rest = message.trim();
    while rest.starts_with('@') {
        rest = match rest.split_once(char::is_whitespace) {
            Some((_, text)) => text.trim_start(),
            None => "",
        };
    }
    rest.trim_end().to_string()
}

/// Relevance score of one agent for a tokenized message
pub fn score(agent: &Agent, tokens: &[String]) -> f64 {
    let words: HashSet<&str> = tokens.iter().map(String::as_str).collect();

    let trigger_matches = agent.triggers.iter().filter(|t| words.contains(t.as_str())).count();

    let role = agent.role.to_lowercase();
    let signal_matches: usize = ROLE_SIGNALS
        .iter()
        .filter(|(key, _)| role.contains(key))
        .map(|(_, signals)| signals.iter().filter(|s| words.contains(*s)).count())
        .sum();

    (trigger_matches as f64 * TRIGGER_WEIGHT + signal_matches as f64 * ROLE_SIGNAL_WEIGHT)
        * agent.relevance_weight
}

/// Keyword selection: up to three candidates above their rank threshold,
/// returned in registry declaration order
pub fn keyword_candidates(message: &str, registry: &AgentRegistry) -> Vec<AgentId> {
    let tokens = tokenize(message);
    let mut scored: Vec<(usize, f64)> = registry
        .agents()
        .iter()
        .enumerate()
        .map(|(index, agent)| (index, score(agent, &tokens)))
        .collect();
    // Stable sort keeps declaration order among equal scores
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut picked: Vec<usize> = scored
        .iter()
        .zip(RANK_THRESHOLDS)
        .take_while(|((_, score), threshold)| {
            if *threshold == 0.0 {
                *score > 0.0
            } else {
                *score >= *threshold
            }
        })
        .map(|((index, _), _)| *index)
        .collect();
    picked.sort_unstable();

    picked
        .into_iter()
        .map(|index| registry.agents()[index].id.clone())
        .collect()
}

/// Chooses the agents that answer each user message
pub struct RelevanceSelector {
    llm: Arc<dyn LLMProvider>,
    oracle_max_tokens: u32,
}

impl RelevanceSelector {
    pub fn new(llm: Arc<dyn LLMProvider>, oracle_max_tokens: u32) -> Self {
        Self { llm, oracle_max_tokens }
    }

    /// Select 1..=3 agents (or `@all`) for `message`
    ///
    /// Never fails: an unusable oracle answer degrades to the generalists.
    pub async fn select(&self, message: &str, registry: &AgentRegistry, recent: &[Message]) -> Selection {
        match parse_addresses(message, registry) {
            Some(Address::All) => {
                info!("broadcast to all agents");
                return Selection {
                    target: Target::All,
                    method: SelectionMethod::Broadcast,
                    text: strip_leading_address(message),
                };
            }
            Some(Address::Agents(ids)) => {
                info!(agents = ?ids, "explicitly addressed");
                return Selection {
                    target: Target::Agents(ids),
                    method: SelectionMethod::Addressed,
                    text: strip_leading_address(message),
                };
            }
            None => {}
        }

        let text = message.trim().to_string();

        let candidates = keyword_candidates(message, registry);
        if !candidates.is_empty() {
            info!(agents = ?candidates, "selected by keywords");
            return Selection {
                target: Target::Agents(candidates),
                method: SelectionMethod::Keywords,
                text,
            };
        }

        match self.ask_oracle(message, registry, recent).await {
            Some(ids) => {
                info!(agents = ?ids, "selected by relevance oracle");
                Selection {
                    target: Target::Agents(ids),
                    method: SelectionMethod::Oracle,
                    text,
                }
            }
            None => {
                let mut ids = registry.generalists();
                if ids.is_empty() {
                    ids = registry.ids();
                }
                ids.truncate(MAX_SELECTED);
                info!(agents = ?ids, "falling back to generalists");
                Selection {
                    target: Target::Agents(ids),
                    method: SelectionMethod::Fallback,
                    text,
                }
            }
        }
    }

    async fn ask_oracle(&self, message: &str, registry: &AgentRegistry, recent: &[Message]) -> Option<Vec<AgentId>> {
        let roster = registry
            .agents()
            .iter()
            .map(|a| {
                let triggers: Vec<&str> = a.triggers.iter().take(3).map(String::as_str).collect();
                format!("- {} ({}): {}", a.name, a.role, triggers.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n");

        let context = recent
            .iter()
            .rev()
            .filter(|m| m.role != Role::ToolResult)
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|m| match &m.agent {
                Some(id) => format!("{}: {}", registry.display_name(id), m.content),
                None => format!("User: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Recent conversation:\n{}\n\nNew message: \"{}\"\n\nAvailable specialists:\n{}\n\n\
             Who is most relevant? Reply with one to three names, most relevant first, \
             comma-separated (for example: Rick,Wednesday). Reply with names only.",
            if context.is_empty() { "(none)" } else { context.as_str() },
            message.trim(),
            roster
        );

        let request = CompletionRequest::simple(ModelTier::Fast, prompt, self.oracle_max_tokens);
        let completion = match self.llm.complete(request).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "relevance oracle failed");
                return None;
            }
        };

        let ids = parse_oracle_ranking(&completion.text, registry);
        if ids.is_empty() {
            debug!(answer = %completion.text, "oracle named no known agent");
            return None;
        }
        Some(ids)
    }
}

/// Known agent names from an oracle answer, in ranked order
fn parse_oracle_ranking(answer: &str, registry: &AgentRegistry) -> Vec<AgentId> {
    let mut ids = Vec::new();
    for name in answer.split(|c: char| c == ',' || c == '\n' || c.is_whitespace()) {
        let name = name.trim_matches(|c: char| !c.is_alphanumeric());
        if let Some(agent) = registry.resolve(name) {
            if !ids.contains(&agent.id) {
                ids.push(agent.id.clone());
            }
        }
        if ids.len() == MAX_SELECTED {
            break;
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::registry::AgentBuilder;
    use crate::agent::roster::default_roster;
    use crate::core::{CouncilError, Result};
    use crate::llm::Completion;
    use async_trait::async_trait;

    struct Oracle(Option<&'static str>);

    #[async_trait]
    impl LLMProvider for Oracle {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            self.0
                .map(Completion::text)
                .ok_or_else(|| CouncilError::llm("overloaded"))
        }

        fn name(&self) -> &str {
            "oracle"
        }
    }

    fn selector(answer: Option<&'static str>) -> RelevanceSelector {
        RelevanceSelector::new(Arc::new(Oracle(answer)), 30)
    }

    fn roster() -> AgentRegistry {
        AgentRegistry::new(default_roster()).unwrap()
    }

    #[test]
    fn test_every_leading_address_is_stripped() {
        assert_eq!(strip_leading_address("@rick @judy check x"), "check x");
        assert_eq!(strip_leading_address("  @all   status please "), "status please");
        assert_eq!(strip_leading_address("ping @saul later"), "ping @saul later");
        assert_eq!(strip_leading_address("@saul"), "");
    }

    #[test]
    fn test_tokenize_keeps_compound_words() {
        assert_eq!(tokenize("Fix the CI/CD pipeline, now!"), vec!["fix", "the", "ci/cd", "pipeline", "now"]);
    }

    #[test]
    fn test_substrings_do_not_match() {
        let registry = roster();
        // "capital" contains "api" but is not the word
        assert!(keyword_candidates("capital letters", &registry).is_empty());
    }

    #[test]
    fn test_keyword_selection_in_declaration_order() {
        let registry = AgentRegistry::new(vec![
            AgentBuilder::new("rick").role("Senior Backend Engineer").triggers(["API", "backend"]).build(),
            AgentBuilder::new("judy").role("Senior DevOps Engineer").triggers(["kubernetes", "pods"]).build(),
        ])
        .unwrap();
        assert_eq!(
            keyword_candidates("Our API is responding slowly", &registry),
            vec![AgentId::new("rick"), AgentId::new("judy")]
        );
    }

    #[tokio::test]
    async fn test_address_overrides_keywords() {
        let selection = selector(None)
            .select("@saul the kubernetes API is down", &roster(), &[])
            .await;
        assert_eq!(selection.target, Target::Agents(vec![AgentId::new("saul")]));
        assert_eq!(selection.method, SelectionMethod::Addressed);
        assert_eq!(selection.text, "the kubernetes API is down");
    }

    #[tokio::test]
    async fn test_at_all_is_broadcast() {
        let registry = roster();
        let selection = selector(None).select("@all status report", &registry, &[]).await;
        assert_eq!(selection.target, Target::All);
        assert_eq!(selection.agents(&registry).len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_address_falls_through_to_scoring() {
        let selection = selector(None).select("@morty check the database", &roster(), &[]).await;
        assert_eq!(selection.method, SelectionMethod::Keywords);
        assert!(matches!(&selection.target, Target::Agents(ids) if ids.contains(&AgentId::new("rick"))));
    }

    #[tokio::test]
    async fn test_oracle_ranking_is_capped_and_deduplicated() {
        let selection = selector(Some("Rick, Rick, Judy, Elliot, Saul"))
            .select("thoughts?", &roster(), &[])
            .await;
        assert_eq!(selection.method, SelectionMethod::Oracle);
        assert_eq!(
            selection.target,
            Target::Agents(vec![AgentId::new("rick"), AgentId::new("judy"), AgentId::new("elliot")])
        );
    }

    #[tokio::test]
    async fn test_oracle_failure_selects_generalists() {
        let selection = selector(None).select("thoughts?", &roster(), &[]).await;
        assert_eq!(selection.method, SelectionMethod::Fallback);
        assert_eq!(selection.target, Target::Agents(vec![AgentId::new("saul")]));
    }

    #[tokio::test]
    async fn test_oracle_nonsense_selects_generalists() {
        let selection = selector(Some("nobody")).select("thoughts?", &roster(), &[]).await;
        assert_eq!(selection.method, SelectionMethod::Fallback);
    }

    #[test]
    fn test_never_more_than_three() {
        let registry = roster();
        let ids = keyword_candidates(
            "aws kubernetes api react security deadline server docker database ui auth budget",
            &registry,
        );
        assert!(ids.len() <= MAX_SELECTED);
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
