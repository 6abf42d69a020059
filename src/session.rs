//! WebSocket log sessions
//!
//! Validates and upgrades log streaming requests, resolves the target, and
//! runs the relay until either side ends. Failures after the upgrade are
//! reported as a text frame on the socket, since the HTTP exchange is over.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ApiError, StreamError};
use crate::kubernetes::LogStream;
use crate::relay::{error_frame, relay};
use crate::server::AppState;
use crate::types::LogTarget;

#[derive(Debug, Default, Deserialize)]
pub struct PodLogQuery {
    container: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CappLogQuery {
    container: Option<String>,
    #[serde(rename = "podName")]
    pod_name: Option<String>,
}

pub async fn stream_pod_logs(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    Path((namespace, pod_name)): Path<(String, String)>,
    Query(query): Query<PodLogQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let target = LogTarget::pod(&namespace, &pod_name, query.container);
    upgrade(ws, state, &headers, target)
}

pub async fn stream_capp_logs(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    Path((namespace, capp_name)): Path<(String, String)>,
    Query(query): Query<CappLogQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let target = LogTarget::capp(&namespace, &capp_name, query.pod_name, query.container);
    upgrade(ws, state, &headers, target)
}

fn upgrade(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    state: AppState,
    headers: &HeaderMap,
    target: LogTarget,
) -> Result<Response, ApiError> {
    let ws = ws.map_err(|rejection| {
        warn!(
            kind = %target.kind,
            identifier = %target.identifier,
            reason = %rejection.body_text(),
            "Rejected non-websocket log request"
        );
        ApiError::HandshakeRejected(rejection.body_text())
    })?;

    let token = session_token(headers, &state.settings.token_header).ok_or_else(|| {
        warn!(identifier = %target.identifier, "Log request without token");
        ApiError::Unauthorized
    })?;

    // Echo the token as the negotiated subprotocol so the client can tie it to this socket
    Ok(ws
        .protocols([token])
        .on_upgrade(move |socket| run_session(socket, state, target))
        .into_response())
}

/// Token from the configured header (first listed value), else a bearer token.
fn session_token(headers: &HeaderMap, token_header: &str) -> Option<String> {
    let from_header = headers
        .get(token_header)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let from_authorization = || {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
            .filter(|v| !v.is_empty())
    };

    from_header.or_else(from_authorization).map(str::to_string)
}

async fn open_stream(state: &AppState, target: &LogTarget) -> Result<LogStream, StreamError> {
    let resolved = state.resolver.resolve(target).await?;
    state.source.open(&target.namespace, &resolved).await
}

async fn run_session(socket: WebSocket, state: AppState, target: LogTarget) {
    let (mut sender, receiver) = socket.split();

    info!(
        namespace = %target.namespace,
        kind = %target.kind,
        identifier = %target.identifier,
        "Log session started"
    );

    let source = match open_stream(&state, &target).await {
        Ok(source) => source,
        Err(e) => {
            warn!(
                namespace = %target.namespace,
                identifier = %target.identifier,
                error = %e,
                "Failed to open log session"
            );
            let message = format!("Error streaming {} logs: {}", target.kind, e);
            let _ = sender.send(error_frame(message)).await;
            let _ = sender.close().await;
            return;
        }
    };

    let cancel = state.shutdown.child_token();
    let watcher = tokio::spawn(watch_disconnect(receiver, cancel.clone()));

    let end = relay(
        source,
        &mut sender,
        &cancel,
        state.settings.throttle,
        |line| target.format_line(line),
    )
    .await;

    cancel.cancel();
    let _ = watcher.await;
    let _ = sender.close().await;

    info!(
        namespace = %target.namespace,
        identifier = %target.identifier,
        end = ?end,
        "Log session ended"
    );
}

/// Cancel `cancel` once the client closes or the socket errors.
async fn watch_disconnect(mut receiver: SplitStream<WebSocket>, cancel: CancellationToken) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return,
            msg = receiver.next() => msg,
        };
        match msg {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                debug!(error = %e, "Client socket read failed");
                break;
            }
            // Clients have nothing to say on a log stream
            Some(Ok(_)) => {}
        }
    }
    debug!("Client disconnected");
    cancel.cancel();
}
