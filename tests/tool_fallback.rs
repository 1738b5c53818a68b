//! Tool execution through the connection pool and local fallback

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use common::*;
use council::core::{AgentId, InvocationId, ToolFailure, ToolInvocationRequest, ToolOrigin, ToolPayload};
use council::tools::{ConnectionPool, ToolBinding, ToolExecutor};

fn executor(connector: Arc<MemoryConnector>, cooldown: Duration) -> ToolExecutor {
    let pool = ConnectionPool::new(connector, [server("judy_k8s")], cooldown);
    ToolExecutor::new(pool, Duration::from_secs(5))
}

fn request(tool: &str, budget: Duration) -> ToolInvocationRequest {
    ToolInvocationRequest {
        id: InvocationId { turn: 1, seq: 0 },
        tool: tool.to_string(),
        arguments: Map::new(),
        agent: AgentId::new("judy"),
        deadline: Instant::now() + budget,
    }
}

fn cluster_health() -> ToolBinding {
    ToolBinding::remote("analyze_cluster_health", "Cluster health", "judy_k8s", "analyze_cluster_health")
}

#[tokio::test]
async fn test_remote_success_is_structured() {
    let connector = Arc::new(MemoryConnector::default());
    let executor = executor(connector.clone(), Duration::from_secs(30));
    let binding = cluster_health().with_fallback("echo local");

    let result = executor
        .execute(&request("analyze_cluster_health", Duration::from_secs(5)), &binding, Duration::from_secs(5), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.origin, ToolOrigin::Remote);
    assert!(matches!(result.payload, ToolPayload::Structured(_)));
    assert_eq!(result.payload.render(), "analyze_cluster_health ok");
}

#[tokio::test]
async fn test_unreachable_server_falls_back_to_local() {
    let connector = MemoryConnector::refusing();
    let executor = executor(connector.clone(), Duration::from_secs(30));
    let binding = cluster_health().with_fallback("echo pods-from-kubectl");

    let result = executor
        .execute(&request("analyze_cluster_health", Duration::from_secs(10)), &binding, Duration::from_secs(5), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.origin, ToolOrigin::Local);
    assert_eq!(result.payload, ToolPayload::Text("pods-from-kubectl".into()));
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_failure_without_fallback_is_an_error_result() {
    let executor = executor(MemoryConnector::refusing(), Duration::from_secs(30));

    let result = executor
        .execute(&request("analyze_cluster_health", Duration::from_secs(5)), &cluster_health(), Duration::from_secs(5), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.origin, ToolOrigin::Error);
    assert_eq!(result.failure, Some(ToolFailure::Unreachable("judy_k8s".into())));
}

#[tokio::test]
async fn test_slow_local_command_times_out() {
    let executor = executor(Arc::new(MemoryConnector::default()), Duration::from_secs(30));
    let binding = ToolBinding::local("nap", "Wait", "sleep 5");
    let timeout = Duration::from_millis(300);

    let started = Instant::now();
    let result = executor
        .execute(&request("nap", Duration::from_secs(10)), &binding, timeout, &CancellationToken::new())
        .await;

    assert!(started.elapsed() < timeout + Duration::from_secs(1));
    assert_eq!(result.origin, ToolOrigin::Error);
    assert_eq!(result.failure, Some(ToolFailure::Timeout));
}

#[tokio::test]
async fn test_slow_remote_call_is_cancelled_on_the_server() {
    let connector = MemoryConnector::slow(Duration::from_secs(5));
    let executor = executor(connector.clone(), Duration::from_secs(30));
    let timeout = Duration::from_millis(200);

    let started = Instant::now();
    let result = executor
        .execute(&request("analyze_cluster_health", Duration::from_secs(10)), &cluster_health(), timeout, &CancellationToken::new())
        .await;

    assert!(started.elapsed() < timeout + Duration::from_secs(1));
    assert_eq!(result.failure, Some(ToolFailure::Timeout));
    assert_eq!(connector.cancels(), 1);
    // The connection survives a timeout and is reused
    assert_eq!(executor.pool().open_connections().await, 1);
}

#[tokio::test]
async fn test_fallback_gets_its_own_budget_within_the_deadline() {
    let connector = MemoryConnector::slow(Duration::from_secs(5));
    let executor = executor(connector, Duration::from_secs(30));
    let binding = cluster_health().with_fallback("echo fallback");
    let timeout = Duration::from_millis(200);

    let result = executor
        .execute(&request("analyze_cluster_health", timeout * 2), &binding, timeout, &CancellationToken::new())
        .await;

    assert_eq!(result.origin, ToolOrigin::Local);
    assert_eq!(result.payload, ToolPayload::Text("fallback".into()));
}

#[tokio::test]
async fn test_cancelled_call_does_not_fall_back() {
    let connector = MemoryConnector::slow(Duration::from_secs(5));
    let executor = executor(connector, Duration::from_secs(30));
    let binding = cluster_health().with_fallback("echo fallback");
    let cancel = CancellationToken::new();
    let req = request("analyze_cluster_health", Duration::from_secs(10));

    let (result, ()) = tokio::join!(
        executor.execute(&req, &binding, Duration::from_secs(5), &cancel),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    );

    assert_eq!(result.origin, ToolOrigin::Error);
    assert_eq!(result.failure, Some(ToolFailure::Cancelled));
}

#[tokio::test]
async fn test_unreachable_server_cools_down_then_is_probed_again() {
    let connector = MemoryConnector::refusing();
    let pool = ConnectionPool::new(connector.clone(), [server("judy_k8s")], Duration::from_millis(200));
    let cancel = CancellationToken::new();
    let args: Map<String, Value> = Map::new();

    let first = pool.call("judy_k8s", "analyze_cluster_health", &args, Duration::from_secs(1), &cancel).await;
    assert_eq!(assert_err!(first), ToolFailure::Unreachable("judy_k8s".into()));
    assert!(pool.is_cooling_down("judy_k8s").await);

    // Inside the cool-down the server is not contacted at all
    let second = pool.call("judy_k8s", "analyze_cluster_health", &args, Duration::from_secs(1), &cancel).await;
    assert_err!(second);
    assert_eq!(connector.connects(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    connector.refuse.store(false, Ordering::SeqCst);

    let third = pool.call("judy_k8s", "analyze_cluster_health", &args, Duration::from_secs(1), &cancel).await;
    assert_ok!(third);
    assert_eq!(connector.connects(), 2);
    assert!(!pool.is_cooling_down("judy_k8s").await);
}

#[tokio::test]
async fn test_connections_are_reused_and_closed_on_shutdown() {
    let connector = Arc::new(MemoryConnector::default());
    let executor = executor(connector.clone(), Duration::from_secs(30));
    let binding = cluster_health();

    for seq in 0..3 {
        let mut req = request("analyze_cluster_health", Duration::from_secs(5));
        req.id.seq = seq;
        let result = executor.execute(&req, &binding, Duration::from_secs(5), &CancellationToken::new()).await;
        assert!(result.success);
    }
    assert_eq!(connector.connects(), 1);
    assert_eq!(executor.pool().open_connections().await, 1);

    executor.shutdown().await;
    assert_eq!(executor.pool().open_connections().await, 0);
}

#[tokio::test]
async fn test_different_servers_run_concurrently() {
    let delay = Duration::from_millis(300);
    let pool = ConnectionPool::new(
        MemoryConnector::slow(delay),
        [server("gilfoyle_aws"), server("judy_k8s")],
        Duration::from_secs(30),
    );
    let cancel = CancellationToken::new();
    let args: Map<String, Value> = Map::new();

    let started = Instant::now();
    let (aws, k8s) = tokio::join!(
        pool.call("gilfoyle_aws", "describe_instances", &args, Duration::from_secs(5), &cancel),
        pool.call("judy_k8s", "analyze_cluster_health", &args, Duration::from_secs(5), &cancel),
    );

    assert_ok!(aws);
    assert_ok!(k8s);
    assert!(started.elapsed() < delay * 2, "calls to different servers blocked each other");
}

#[tokio::test]
async fn test_same_server_calls_are_serialized() {
    let delay = Duration::from_millis(300);
    let pool = ConnectionPool::new(MemoryConnector::slow(delay), [server("judy_k8s")], Duration::from_secs(30));
    let cancel = CancellationToken::new();
    let args: Map<String, Value> = Map::new();

    let started = Instant::now();
    let (first, second) = tokio::join!(
        pool.call("judy_k8s", "analyze_cluster_health", &args, Duration::from_secs(5), &cancel),
        pool.call("judy_k8s", "optimize_resources", &args, Duration::from_secs(5), &cancel),
    );

    assert_ok!(first);
    assert_ok!(second);
    assert!(started.elapsed() >= delay * 2);
    assert_eq!(pool.open_connections().await, 1);
}
