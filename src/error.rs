//! Error types for cluster lookups, log sessions and the HTTP surface

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failure talking to the cluster runtime
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The named pod does not exist
    #[error("pods \"{0}\" not found")]
    PodNotFound(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl ClusterError {
    /// Map a kube error for `pod`, folding 404s into `PodNotFound`.
    pub fn for_pod(err: kube::Error, pod: &str) -> Self {
        if matches!(&err, kube::Error::Api(resp) if resp.code == 404) {
            ClusterError::PodNotFound(pod.to_string())
        } else {
            ClusterError::Kube(err)
        }
    }
}

/// Reasons a log session could not be established.
///
/// Display strings are sent verbatim to the client inside the error frame.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("no pods found for Capp {capp} in namespace {namespace}")]
    NoPodsForWorkload { capp: String, namespace: String },

    #[error("pod '{pod}' not found for Capp {capp} in namespace {namespace}")]
    PodNotInWorkload {
        pod: String,
        capp: String,
        namespace: String,
    },

    #[error("error fetching Capp pods: {0}")]
    WorkloadLookupFailed(#[source] ClusterError),

    #[error(
        "error opening log stream: pod {pod} has multiple containers, please specify the container name"
    )]
    AmbiguousContainer { pod: String },

    #[error("error opening log stream: failed to get pod: {source}")]
    PodLookupFailed {
        pod: String,
        #[source]
        source: ClusterError,
    },

    #[error("error opening log stream: container {container} not found in the pod {pod}")]
    ContainerNotFound { pod: String, container: String },

    #[error("error opening log stream: {0}")]
    OpenFailed(#[source] ClusterError),
}

/// Errors returned as plain HTTP responses, before or instead of an upgrade
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request to a streaming route that is not a WebSocket upgrade
    #[error("websocket handshake rejected: {0}")]
    HandshakeRejected(String),

    /// No session token on the request
    #[error("token not found")]
    Unauthorized,

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::HandshakeRejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Cluster(ClusterError::PodNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Cluster(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_not_found_message() {
        let err = StreamError::PodLookupFailed {
            pod: "test-invalid-pod".to_string(),
            source: ClusterError::PodNotFound("test-invalid-pod".to_string()),
        };
        assert_eq!(
            err.to_string(),
            r#"error opening log stream: failed to get pod: pods "test-invalid-pod" not found"#
        );
    }

    #[test]
    fn test_api_error_status_codes() {
        let resp = ApiError::HandshakeRejected("missing upgrade".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = ApiError::Cluster(ClusterError::PodNotFound("p".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
