//! Turn state management
//!
//! Tracks one agent's turn through its phases, the tool rounds it has used,
//! and the tool results gathered so far.

use crate::core::{InvocationId, ToolResult, TurnPhase};

/// State of one agent's turn
#[derive(Debug, Clone)]
pub struct TurnState {
    /// Turn id shared by every invocation issued in this turn
    pub turn_id: u64,
    /// Tool round-trips completed
    pub round: usize,
    /// Maximum allowed tool round-trips
    pub max_rounds: usize,
    /// Phase trace, starting at `Drafting`
    pub phases: Vec<TurnPhase>,
    /// Tool results in issue order
    pub observations: Vec<ToolResult>,
    /// Invocations issued so far
    pub issued: Vec<InvocationId>,
    next_seq: u32,
}

impl TurnState {
    /// Create a new turn state with the given round cap
    pub fn new(turn_id: u64, max_rounds: usize) -> Self {
        Self {
            turn_id,
            round: 0,
            max_rounds,
            phases: vec![TurnPhase::Drafting],
            observations: Vec::new(),
            issued: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phases.last().copied().unwrap_or(TurnPhase::Drafting)
    }

    /// Move to `phase`; repeated entries of the current phase are not recorded
    pub fn enter(&mut self, phase: TurnPhase) {
        if self.phase() != phase {
            self.phases.push(phase);
        }
    }

    /// Whether another tool round is allowed
    pub fn can_call_tools(&self) -> bool {
        self.round < self.max_rounds
    }

    /// Allocate the id for the next invocation of this turn
    pub fn issue(&mut self) -> InvocationId {
        let id = InvocationId {
            turn: self.turn_id,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.issued.push(id);
        id
    }

    /// Add results from a finished round
    pub fn add_observations(&mut self, results: Vec<ToolResult>) {
        self.observations.extend(results);
        self.round += 1;
    }

    /// Format observations for inclusion in the next prompt, each output
    /// capped at `limit` characters
    pub fn format_observations(&self, limit: usize) -> String {
        if self.observations.is_empty() {
            return String::new();
        }

        let mut output = String::from("TOOL EXECUTION RESULTS (incorporate these into your response):\n");
        for result in &self.observations {
            output.push('\n');
            output.push_str(&result.summarize(limit));
            output.push('\n');
        }
        output
    }
}
