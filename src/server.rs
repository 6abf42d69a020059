//! HTTP surface: router, shared state and the non-streaming lookups

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ApiError;
use crate::kubernetes::{ClusterRuntime, WorkloadDirectory};
use crate::resolver::TargetResolver;
use crate::session::{stream_capp_logs, stream_pod_logs};
use crate::source::LogSource;
use crate::types::{Container, ContainersResponse, PodSummary, PodsResponse};
use crate::utils::{capp_selector, format_age};

/// Knobs shared by every log session
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub tail_lines: Option<i64>,
    pub throttle: Duration,
    pub capp_label: String,
    pub token_header: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            tail_lines: Some(10),
            throttle: Duration::from_secs(1),
            capp_label: "rcs.dana.io/parent-capp".to_string(),
            token_header: "Sec-WebSocket-Protocol".to_string(),
        }
    }
}

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: TargetResolver,
    pub source: LogSource,
    pub directory: Arc<dyn WorkloadDirectory>,
    pub runtime: Arc<dyn ClusterRuntime>,
    pub settings: Arc<StreamSettings>,
    /// Cancelled on server shutdown; every session holds a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        directory: Arc<dyn WorkloadDirectory>,
        runtime: Arc<dyn ClusterRuntime>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            resolver: TargetResolver::new(
                directory.clone(),
                runtime.clone(),
                settings.capp_label.clone(),
            ),
            source: LogSource::new(runtime.clone(), settings.tail_lines),
            directory,
            runtime,
            settings: Arc::new(settings),
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        // WebSocket upgrade routes
        .route("/v1/logs/pod/{namespace}/{pod_name}", get(stream_pod_logs))
        .route("/v1/logs/capp/{namespace}/{capp_name}", get(stream_capp_logs))
        .route(
            "/v1/namespaces/{namespace}/pods/{pod_name}/containers",
            get(list_containers),
        )
        .route("/v1/capps/{namespace}/{capp_name}/pods", get(list_capp_pods))
        .with_state(state)
}

/// Serve until ctrl-c, then cancel all live sessions.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    info!(addr = %addr, "Starting log stream server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down, closing log sessions");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

async fn list_containers(
    State(state): State<AppState>,
    Path((namespace, pod_name)): Path<(String, String)>,
) -> Result<Json<ContainersResponse>, ApiError> {
    let pod = state.runtime.get_pod(&namespace, &pod_name).await?;
    let containers: Vec<Container> = pod
        .containers
        .into_iter()
        .map(|container_name| Container { container_name })
        .collect();

    Ok(Json(ContainersResponse {
        count: containers.len(),
        containers,
    }))
}

async fn list_capp_pods(
    State(state): State<AppState>,
    Path((namespace, capp_name)): Path<(String, String)>,
) -> Result<Json<PodsResponse>, ApiError> {
    let selector = capp_selector(&state.settings.capp_label, &capp_name);
    let pods: Vec<PodSummary> = state
        .directory
        .pods_for_selector(&namespace, &selector)
        .await?
        .into_iter()
        .map(|pod| PodSummary {
            age: format_age(pod.created),
            pod_name: pod.name,
            phase: pod.phase,
            restarts: pod.restarts,
            containers: pod.containers,
        })
        .collect();

    Ok(Json(PodsResponse {
        count: pods.len(),
        pods,
    }))
}
