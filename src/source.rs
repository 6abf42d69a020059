use crate::error::StreamError;
use crate::kubernetes::{ClusterRuntime, LogStream};
use crate::types::ResolvedTarget;
use std::sync::Arc;
use tracing::info;

/// Opens following log streams after checking the container exists.
#[derive(Clone)]
pub struct LogSource {
    runtime: Arc<dyn ClusterRuntime>,
    tail_lines: Option<i64>,
}

impl LogSource {
    pub fn new(runtime: Arc<dyn ClusterRuntime>, tail_lines: Option<i64>) -> Self {
        Self {
            runtime,
            tail_lines,
        }
    }

    pub async fn open(
        &self,
        namespace: &str,
        target: &ResolvedTarget,
    ) -> Result<LogStream, StreamError> {
        let pod = self
            .runtime
            .get_pod(namespace, &target.pod)
            .await
            .map_err(|source| StreamError::PodLookupFailed {
                pod: target.pod.clone(),
                source,
            })?;

        if !pod.containers.iter().any(|c| c == &target.container) {
            return Err(StreamError::ContainerNotFound {
                pod: target.pod.clone(),
                container: target.container.clone(),
            });
        }

        let stream = self
            .runtime
            .log_stream(namespace, &target.pod, &target.container, self.tail_lines)
            .await
            .map_err(StreamError::OpenFailed)?;

        info!(
            namespace = %namespace,
            pod = %target.pod,
            container = %target.container,
            "Opened log stream"
        );
        Ok(stream)
    }
}
