//! Council - a multi-agent engineering chat
//!
//! A roster of opinionated engineering personas shares one conversation.
//! Each user message is routed to the most relevant members, who draft
//! their replies concurrently, may call tools on remote MCP servers or
//! local commands, and occasionally interject on each other's answers.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: LLM provider abstraction with an Anthropic implementation
//! - **Tools**: Tool bindings, the stdio MCP client, and the executor with local fallback
//! - **Agent**: Registry, relevance selection, context window, turn assembly and orchestration
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use council::{Config, Council};
//!
//! #[tokio::main]
//! async fn main() -> council::Result<()> {
//!     let council = Council::from_config(Config::load())?;
//!
//!     let outcome = council.process("@judy why are the pods restarting?").await?;
//!     for turn in &outcome.turns {
//!         println!("{}: {}", turn.agent, turn.text);
//!     }
//!     council.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{Council, CycleOutcome};
pub use cli::Repl;
pub use core::{Config, CouncilError, Result};
