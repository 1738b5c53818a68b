//! Tool executor - runs one invocation through the remote or local path
//!
//! Remote first when the binding has a remote descriptor, then a single
//! local retry when the remote path fails and a local template exists.
//! Every outcome, failures included, comes back as a [`ToolResult`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::ToolsConfig;
use crate::core::{ToolFailure, ToolInvocationRequest, ToolOrigin, ToolPayload, ToolResult};
use crate::tools::binding::{LocalDescriptor, RemoteDescriptor, ToolBinding};
use crate::tools::local::run_command;
use crate::tools::remote::{ConnectionPool, RemoteConnector};

/// Executes tool invocations against pooled remote servers and local commands
pub struct ToolExecutor {
    pool: ConnectionPool,
    default_timeout: Duration,
}

impl ToolExecutor {
    pub fn new(pool: ConnectionPool, default_timeout: Duration) -> Self {
        Self { pool, default_timeout }
    }

    /// Build an executor for the configured servers
    pub fn from_config(config: &ToolsConfig, connector: Arc<dyn RemoteConnector>) -> Self {
        let pool = ConnectionPool::new(
            connector,
            config.servers.iter().map(|(id, server)| (id.clone(), server.clone())),
            config.reconnect_cooldown(),
        );
        Self::new(pool, config.default_timeout())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Timeout that applies to `binding`
    pub fn timeout_for(&self, binding: &ToolBinding) -> Duration {
        binding.timeout_or(self.default_timeout)
    }

    /// Number of attempts `binding` may make (remote plus fallback)
    pub fn attempts_for(binding: &ToolBinding) -> u32 {
        match (binding.backend.remote(), binding.backend.local()) {
            (Some(_), Some(_)) => 2,
            _ => 1,
        }
    }

    /// Execute one invocation; each attempt is bounded by `timeout` and by
    /// the request deadline, whichever comes first
    pub async fn execute(
        &self,
        request: &ToolInvocationRequest,
        binding: &ToolBinding,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let started = Instant::now();
        debug!(
            agent = %request.agent,
            tool = %request.tool,
            turn = request.id.turn,
            ?timeout,
            "executing tool"
        );

        let mut failure = None;

        if let Some(remote) = binding.backend.remote() {
            match self.call_remote(request, remote, timeout, cancel).await {
                Ok(value) => {
                    return ToolResult::success(request, ToolOrigin::Remote, ToolPayload::Structured(value), started.elapsed());
                }
                Err(ToolFailure::Cancelled) => {
                    return ToolResult::failure(request, ToolFailure::Cancelled, started.elapsed());
                }
                Err(e) => {
                    if binding.backend.local().is_some() {
                        info!(tool = %request.tool, server = %remote.server, reason = %e, "remote failed, falling back to local");
                    }
                    failure = Some(e);
                }
            }
        }

        if let Some(local) = binding.backend.local() {
            return match self.call_local(request, local, timeout, cancel).await {
                Ok(text) => ToolResult::success(request, ToolOrigin::Local, ToolPayload::Text(text), started.elapsed()),
                Err(e) => {
                    warn!(tool = %request.tool, error = %e, "local command failed");
                    ToolResult::failure(request, e, started.elapsed())
                }
            };
        }

        let failure = failure.unwrap_or_else(|| ToolFailure::UnknownTool(request.tool.clone()));
        warn!(tool = %request.tool, error = %failure, "tool failed with no fallback");
        ToolResult::failure(request, failure, started.elapsed())
    }

    /// Result for a call naming a tool the agent does not bind
    pub fn unknown_tool(request: &ToolInvocationRequest) -> ToolResult {
        warn!(agent = %request.agent, tool = %request.tool, "model requested an unbound tool");
        ToolResult::failure(request, ToolFailure::UnknownTool(request.tool.clone()), Duration::ZERO)
    }

    /// Close all pooled connections
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    fn budget(request: &ToolInvocationRequest, timeout: Duration) -> Option<Duration> {
        let remaining = request.deadline.saturating_duration_since(Instant::now());
        let budget = remaining.min(timeout);
        (!budget.is_zero()).then_some(budget)
    }

    async fn call_remote(
        &self,
        request: &ToolInvocationRequest,
        remote: &RemoteDescriptor,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ToolFailure> {
        let budget = Self::budget(request, timeout).ok_or(ToolFailure::Timeout)?;
        self.pool
            .call(&remote.server, &remote.method, &request.arguments, budget, cancel)
            .await
    }

    async fn call_local(
        &self,
        request: &ToolInvocationRequest,
        local: &LocalDescriptor,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, ToolFailure> {
        let argv = local.render(&request.arguments)?;
        let budget = Self::budget(request, timeout).ok_or(ToolFailure::Timeout)?;
        let output = run_command(&argv, budget, cancel).await?;
        Ok(output.stdout.trim_end().to_string())
    }
}
