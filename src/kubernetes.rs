use crate::error::ClusterError;
use crate::types::PodRecord;
use crate::utils::labels_to_selector;
use async_trait::async_trait;
use futures::io::{AsyncBufRead, AsyncBufReadExt};
use futures::stream::{self, BoxStream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams};
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeMap;
use tracing::debug;

/// Lines read from a container's log. Dropping it closes the upstream request.
pub type LogStream = BoxStream<'static, std::io::Result<String>>;

/// Finds the pods backing a workload.
#[async_trait]
pub trait WorkloadDirectory: Send + Sync {
    /// Pods in `namespace` carrying every label in `selector`, in API order.
    async fn pods_for_selector(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<PodRecord>, ClusterError>;
}

/// Pod lookups and log streams against the cluster runtime.
#[async_trait]
pub trait ClusterRuntime: Send + Sync {
    async fn get_pod(&self, namespace: &str, pod_name: &str) -> Result<PodRecord, ClusterError>;

    /// Open a following log stream, seeded with the last `tail_lines` lines.
    async fn log_stream(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        tail_lines: Option<i64>,
    ) -> Result<LogStream, ClusterError>;
}

/// Collaborators backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl WorkloadDirectory for KubeCluster {
    async fn pods_for_selector(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<PodRecord>, ClusterError> {
        let selector = labels_to_selector(selector);
        let lp = ListParams::default().labels(&selector);
        let list = self.pods(namespace).list(&lp).await?;
        debug!(
            namespace = %namespace,
            selector = %selector,
            count = list.items.len(),
            "Listed pods for selector"
        );
        Ok(list.items.iter().map(pod_record).collect())
    }
}

#[async_trait]
impl ClusterRuntime for KubeCluster {
    async fn get_pod(&self, namespace: &str, pod_name: &str) -> Result<PodRecord, ClusterError> {
        let pod = self
            .pods(namespace)
            .get(pod_name)
            .await
            .map_err(|e| ClusterError::for_pod(e, pod_name))?;
        Ok(pod_record(&pod))
    }

    async fn log_stream(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        tail_lines: Option<i64>,
    ) -> Result<LogStream, ClusterError> {
        let lp = LogParams {
            follow: true,
            container: Some(container.to_string()),
            tail_lines,
            ..Default::default()
        };
        let reader = self
            .pods(namespace)
            .log_stream(pod_name, &lp)
            .await
            .map_err(|e| ClusterError::for_pod(e, pod_name))?;
        Ok(lossy_lines(reader))
    }
}

/// Split `reader` on newlines, replacing invalid UTF-8 instead of failing.
///
/// Container output is arbitrary bytes; a bad sequence only affects its own line.
pub fn lossy_lines<R>(reader: R) -> LogStream
where
    R: AsyncBufRead + Send + 'static,
{
    stream::unfold(Some((Box::pin(reader), Vec::new())), |state| async move {
        let (mut reader, mut buf) = state?;
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    buf.pop();
                    if buf.ends_with(b"\r") {
                        buf.pop();
                    }
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                Some((Ok(line), Some((reader, buf))))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

fn pod_record(pod: &Pod) -> PodRecord {
    PodRecord {
        name: pod.name_any(),
        containers: pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default(),
        labels: pod.labels().clone(),
        phase: pod
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        restarts: get_restart_count(pod),
        created: creation_time(pod),
    }
}

fn get_restart_count(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(|cs| cs.restart_count).sum())
        .unwrap_or(0)
}

// Go through the RFC 3339 wire form so we don't depend on k8s-openapi's time backend
fn creation_time(pod: &Pod) -> Option<chrono::DateTime<chrono::Utc>> {
    let ts = pod.metadata.creation_timestamp.as_ref()?;
    let raw = serde_json::to_value(ts).ok()?;
    chrono::DateTime::parse_from_rfc3339(raw.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&chrono::Utc))
}
