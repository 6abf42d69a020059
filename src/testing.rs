//! In-memory cluster used by unit and session tests

use crate::error::ClusterError;
use crate::kubernetes::{ClusterRuntime, LogStream, WorkloadDirectory};
use crate::types::PodRecord;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

pub const CAPP_LABEL: &str = "rcs.dana.io/parent-capp";

/// What a fake log stream does after its canned lines run out
#[derive(Debug, Clone, Copy)]
pub enum StreamEnd {
    Close,
    Hang,
    Fail,
}

pub struct FakeCluster {
    pods: Vec<(String, PodRecord)>,
    logs: HashMap<(String, String), Vec<String>>,
    end: StreamEnd,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub tails: Mutex<Vec<Option<i64>>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            pods: Vec::new(),
            logs: HashMap::new(),
            end: StreamEnd::Close,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            tails: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pod(
        mut self,
        namespace: &str,
        name: &str,
        capp: Option<&str>,
        containers: &[&str],
    ) -> Self {
        let mut labels = BTreeMap::new();
        if let Some(capp) = capp {
            labels.insert(CAPP_LABEL.to_string(), capp.to_string());
        }
        self.pods.push((
            namespace.to_string(),
            PodRecord {
                name: name.to_string(),
                containers: containers.iter().map(|c| c.to_string()).collect(),
                labels,
                phase: "Running".to_string(),
                ..Default::default()
            },
        ));
        self
    }

    /// Lines served for one pod/container. Anything not registered serves `fake logs`.
    pub fn with_logs(mut self, pod: &str, container: &str, lines: &[&str]) -> Self {
        self.logs.insert(
            (pod.to_string(), container.to_string()),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    pub fn ending(mut self, end: StreamEnd) -> Self {
        self.end = end;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkloadDirectory for FakeCluster {
    async fn pods_for_selector(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<PodRecord>, ClusterError> {
        Ok(self
            .pods
            .iter()
            .filter(|(ns, pod)| ns == namespace && matches_labels(&pod.labels, selector))
            .map(|(_, pod)| pod.clone())
            .collect())
    }
}

#[async_trait]
impl ClusterRuntime for FakeCluster {
    async fn get_pod(&self, namespace: &str, pod_name: &str) -> Result<PodRecord, ClusterError> {
        self.pods
            .iter()
            .find(|(ns, pod)| ns == namespace && pod.name == pod_name)
            .map(|(_, pod)| pod.clone())
            .ok_or_else(|| ClusterError::PodNotFound(pod_name.to_string()))
    }

    async fn log_stream(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        tail_lines: Option<i64>,
    ) -> Result<LogStream, ClusterError> {
        self.get_pod(namespace, pod_name).await?;
        if let Ok(mut tails) = self.tails.lock() {
            tails.push(tail_lines);
        }
        let lines = self
            .logs
            .get(&(pod_name.to_string(), container.to_string()))
            .cloned()
            .unwrap_or_else(|| vec!["fake logs".to_string()]);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(tracked(lines, self.end, self.closed.clone()))
    }
}

/// Check if pod labels carry every key/value of the selector.
pub fn matches_labels(
    pod_labels: &BTreeMap<String, String>,
    selector: &BTreeMap<String, String>,
) -> bool {
    selector
        .iter()
        .all(|(key, value)| pod_labels.get(key) == Some(value))
}

/// Build a stream of `lines` that counts its own drop in `closed`.
pub fn tracked(lines: Vec<String>, end: StreamEnd, closed: Arc<AtomicUsize>) -> LogStream {
    let head = stream::iter(lines.into_iter().map(Ok));
    let inner: LogStream = match end {
        StreamEnd::Close => head.boxed(),
        StreamEnd::Hang => head.chain(stream::pending()).boxed(),
        StreamEnd::Fail => head
            .chain(stream::once(async {
                Err(std::io::Error::other("connection reset by peer"))
            }))
            .boxed(),
    };
    TrackedStream { inner, closed }.boxed()
}

struct TrackedStream {
    inner: LogStream,
    closed: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
    type Item = std::io::Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
