//! Agent module - selection, turn assembly and orchestration
//!
//! Contains the agent registry, the relevance selector, the conversation
//! window, and the council that coordinates LLM calls and tool execution.

pub mod assembler;
pub mod context;
pub mod interjection;
pub mod loop_state;
pub mod orchestrator;
pub mod registry;
pub mod roster;
pub mod selector;

pub use assembler::{AssemblerSettings, ResponseAssembler, TurnContext};
pub use context::ContextManager;
pub use interjection::{InterjectionPolicy, RandomSource, SeededSource};
pub use loop_state::TurnState;
pub use orchestrator::{ContextStatus, Council, CycleOutcome, TurnFailure};
pub use registry::{Agent, AgentBuilder, AgentRegistry};
pub use roster::default_roster;
pub use selector::{RelevanceSelector, Selection, SelectionMethod, Target};
