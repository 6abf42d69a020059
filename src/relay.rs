//! Forwards log lines from an upstream stream to a WebSocket sink.

use crate::kubernetes::LogStream;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// Upstream closed cleanly
    Exhausted,
    /// Client went away or the server is shutting down
    Cancelled,
    /// Upstream read failed; an error frame was sent
    UpstreamError,
    /// Writing to the client failed; nothing more can be sent
    TransportFailure,
}

/// Text frame reporting a failure to the client.
pub fn error_frame(message: impl Display) -> Message {
    Message::Text(format!("error: {}", message).into())
}

/// Forward every line of `source` to `sink` until one side ends or `cancel` fires.
///
/// At most one line is forwarded per `throttle`. Cancellation is checked while
/// waiting for a line, while a write to `sink` is pending and while waiting out
/// the throttle. `source` is dropped,
/// closing the upstream request, before this returns. Closing `sink` is left
/// to the caller.
pub async fn relay<K, F>(
    mut source: LogStream,
    sink: &mut K,
    cancel: &CancellationToken,
    throttle: Duration,
    format_line: F,
) -> RelayEnd
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
    F: Fn(&str) -> String,
{
    let mut forwarded: u64 = 0;
    let end = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break RelayEnd::Cancelled,
            next = source.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                warn!(error = %e, "Log stream read failed");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break RelayEnd::Cancelled,
                    _ = sink.send(error_frame(&e)) => break RelayEnd::UpstreamError,
                }
            }
            None => break RelayEnd::Exhausted,
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break RelayEnd::Cancelled,
            sent = sink.send(Message::Text(format_line(&line).into())) => sent,
        };
        if let Err(e) = sent {
            debug!(error = %e, "Client write failed");
            break RelayEnd::TransportFailure;
        }
        forwarded += 1;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break RelayEnd::Cancelled,
            _ = tokio::time::sleep(throttle) => {}
        }
    };

    drop(source);
    debug!(forwarded, end = ?end, "Relay finished");
    end
}
