//! Tools module - tool bindings and their execution backends
//!
//! Contains the binding model, the remote connection pool with its stdio
//! transport, the local command runner, and the executor tying them together.

pub mod binding;
pub mod executor;
pub mod local;
pub mod mcp;
pub mod remote;

pub use binding::{LocalDescriptor, RemoteDescriptor, ToolBackend, ToolBinding};
pub use executor::ToolExecutor;
pub use mcp::StdioConnector;
pub use remote::{ConnectionPool, RemoteConnection, RemoteConnector};
