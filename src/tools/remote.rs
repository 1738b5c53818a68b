//! Remote tool-server connection pool
//!
//! Connections are opened lazily per server id, reused across calls and
//! closed explicitly on teardown. Each server has its own lock, so one call
//! is in flight per connection while different servers never block each
//! other. A failed server is skipped for a cool-down window and then probed
//! again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::RemoteServerConfig;
use crate::core::{CouncilError, Result, ToolFailure};

/// One open connection to a tool server
#[async_trait]
pub trait RemoteConnection: Send {
    /// Invoke `method` and wait for its result
    async fn call(&mut self, method: &str, arguments: &Map<String, Value>) -> Result<Value>;

    /// Tell the server to abandon the request that was in flight, if any
    async fn cancel_in_flight(&mut self);

    /// Whether the connection can still carry requests
    fn is_alive(&mut self) -> bool;

    /// Release the connection
    async fn close(&mut self);
}

/// Opens connections to tool servers
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, server_id: &str, config: &RemoteServerConfig) -> Result<Box<dyn RemoteConnection>>;
}

#[derive(Default)]
struct ServerSlot {
    connection: Option<Box<dyn RemoteConnection>>,
    unreachable_until: Option<Instant>,
}

/// Pool of long-lived connections keyed by server id
pub struct ConnectionPool {
    connector: Arc<dyn RemoteConnector>,
    servers: HashMap<String, RemoteServerConfig>,
    slots: HashMap<String, Arc<Mutex<ServerSlot>>>,
    cooldown: Duration,
}

impl ConnectionPool {
    pub fn new(
        connector: Arc<dyn RemoteConnector>,
        servers: impl IntoIterator<Item = (String, RemoteServerConfig)>,
        cooldown: Duration,
    ) -> Self {
        let servers: HashMap<String, RemoteServerConfig> = servers.into_iter().collect();
        let slots = servers
            .keys()
            .map(|id| (id.clone(), Arc::new(Mutex::new(ServerSlot::default()))))
            .collect();
        Self {
            connector,
            servers,
            slots,
            cooldown,
        }
    }

    /// Whether the server is currently inside its cool-down window
    pub async fn is_cooling_down(&self, server_id: &str) -> bool {
        match self.slots.get(server_id) {
            Some(slot) => slot
                .lock()
                .await
                .unreachable_until
                .is_some_and(|until| Instant::now() < until),
            None => true,
        }
    }

    /// Invoke a method on a server, bounded by `timeout` and `cancel`
    pub async fn call(
        &self,
        server_id: &str,
        method: &str,
        arguments: &Map<String, Value>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<Value, ToolFailure> {
        let (Some(slot), Some(config)) = (self.slots.get(server_id), self.servers.get(server_id)) else {
            return Err(ToolFailure::Unreachable(server_id.to_string()));
        };

        let deadline = Instant::now() + timeout;
        let mut slot = tokio::select! {
            guard = slot.lock() => guard,
            () = tokio::time::sleep_until(deadline.into()) => return Err(ToolFailure::Timeout),
            () = cancel.cancelled() => return Err(ToolFailure::Cancelled),
        };

        if let Some(until) = slot.unreachable_until {
            if Instant::now() < until {
                debug!(server_id, "server cooling down, skipping remote call");
                return Err(ToolFailure::Unreachable(server_id.to_string()));
            }
            slot.unreachable_until = None;
        }

        if let Some(conn) = slot.connection.as_mut() {
            if !conn.is_alive() {
                warn!(server_id, "pooled connection died, reconnecting");
                conn.close().await;
                slot.connection = None;
            }
        }

        if slot.connection.is_none() {
            let connected = tokio::select! {
                res = self.connector.connect(server_id, config) => res,
                () = tokio::time::sleep_until(deadline.into()) => Err(CouncilError::protocol("connect timed out")),
                () = cancel.cancelled() => return Err(ToolFailure::Cancelled),
            };
            match connected {
                Ok(conn) => {
                    info!(server_id, "connected to tool server");
                    slot.connection = Some(conn);
                }
                Err(e) => {
                    warn!(server_id, error = %e, cooldown = ?self.cooldown, "tool server unreachable");
                    slot.unreachable_until = Some(Instant::now() + self.cooldown);
                    return Err(ToolFailure::Unreachable(server_id.to_string()));
                }
            }
        }

        let Some(conn) = slot.connection.as_mut() else {
            return Err(ToolFailure::Unreachable(server_id.to_string()));
        };

        enum Outcome {
            Done(Result<Value>),
            TimedOut,
            Cancelled,
        }

        let outcome = tokio::select! {
            res = conn.call(method, arguments) => Outcome::Done(res),
            () = tokio::time::sleep_until(deadline.into()) => Outcome::TimedOut,
            () = cancel.cancelled() => Outcome::Cancelled,
        };

        match outcome {
            Outcome::Done(Ok(value)) => Ok(value),
            Outcome::Done(Err(e)) => {
                warn!(server_id, method, error = %e, "remote call failed");
                if !conn.is_alive() {
                    conn.close().await;
                    slot.connection = None;
                    slot.unreachable_until = Some(Instant::now() + self.cooldown);
                }
                Err(ToolFailure::Protocol(e.to_string()))
            }
            Outcome::TimedOut => {
                warn!(server_id, method, ?timeout, "remote call timed out, cancelling");
                conn.cancel_in_flight().await;
                Err(ToolFailure::Timeout)
            }
            Outcome::Cancelled => {
                debug!(server_id, method, "remote call cancelled");
                conn.cancel_in_flight().await;
                Err(ToolFailure::Cancelled)
            }
        }
    }

    /// Close every open connection and forget cool-downs
    pub async fn shutdown(&self) {
        for (server_id, slot) in &self.slots {
            let mut slot = slot.lock().await;
            if let Some(mut conn) = slot.connection.take() {
                conn.close().await;
                info!(server_id = %server_id, "closed tool server connection");
            }
            slot.unreachable_until = None;
        }
    }

    /// Number of currently open connections
    pub async fn open_connections(&self) -> usize {
        let mut open = 0;
        for slot in self.slots.values() {
            if slot.lock().await.connection.is_some() {
                open += 1;
            }
        }
        open
    }
}
