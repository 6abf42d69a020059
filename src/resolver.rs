use crate::error::StreamError;
use crate::kubernetes::{ClusterRuntime, WorkloadDirectory};
use crate::types::{LogTarget, ResolvedTarget, TargetKind};
use crate::utils::capp_selector;
use std::sync::Arc;
use tracing::debug;

/// Turns a requested target into the pod and container to read from.
#[derive(Clone)]
pub struct TargetResolver {
    directory: Arc<dyn WorkloadDirectory>,
    runtime: Arc<dyn ClusterRuntime>,
    capp_label: String,
}

impl TargetResolver {
    pub fn new(
        directory: Arc<dyn WorkloadDirectory>,
        runtime: Arc<dyn ClusterRuntime>,
        capp_label: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            runtime,
            capp_label: capp_label.into(),
        }
    }

    /// Read-only; safe to call repeatedly for the same target.
    pub async fn resolve(&self, target: &LogTarget) -> Result<ResolvedTarget, StreamError> {
        let resolved = match target.kind {
            TargetKind::Pod => self.resolve_pod(target).await?,
            TargetKind::Capp => self.resolve_capp(target).await?,
        };
        debug!(
            namespace = %target.namespace,
            kind = %target.kind,
            identifier = %target.identifier,
            pod = %resolved.pod,
            container = %resolved.container,
            "Resolved log target"
        );
        Ok(resolved)
    }

    async fn resolve_pod(&self, target: &LogTarget) -> Result<ResolvedTarget, StreamError> {
        let pod = target.pod.as_deref().unwrap_or(&target.identifier);

        if let Some(container) = &target.container {
            return Ok(ResolvedTarget {
                pod: pod.to_string(),
                container: container.clone(),
            });
        }

        let record = self
            .runtime
            .get_pod(&target.namespace, pod)
            .await
            .map_err(|source| StreamError::PodLookupFailed {
                pod: pod.to_string(),
                source,
            })?;

        match record.containers.as_slice() {
            [only] => Ok(ResolvedTarget {
                pod: pod.to_string(),
                container: only.clone(),
            }),
            _ => Err(StreamError::AmbiguousContainer {
                pod: pod.to_string(),
            }),
        }
    }

    async fn resolve_capp(&self, target: &LogTarget) -> Result<ResolvedTarget, StreamError> {
        let selector = capp_selector(&self.capp_label, &target.identifier);
        let candidates = self
            .directory
            .pods_for_selector(&target.namespace, &selector)
            .await
            .map_err(StreamError::WorkloadLookupFailed)?;

        if candidates.is_empty() {
            return Err(StreamError::NoPodsForWorkload {
                capp: target.identifier.clone(),
                namespace: target.namespace.clone(),
            });
        }

        // First in list order when no pod is named. The API does not promise a stable order.
        let pod = match &target.pod {
            Some(wanted) => candidates
                .iter()
                .find(|p| &p.name == wanted)
                .ok_or_else(|| StreamError::PodNotInWorkload {
                    pod: wanted.clone(),
                    capp: target.identifier.clone(),
                    namespace: target.namespace.clone(),
                })?,
            None => &candidates[0],
        };

        Ok(ResolvedTarget {
            pod: pod.name.clone(),
            container: target
                .container
                .clone()
                .unwrap_or_else(|| target.identifier.clone()),
        })
    }
}
