use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Which kind of object a log request names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Pod,
    Capp,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Pod => f.write_str("Pod"),
            TargetKind::Capp => f.write_str("Capp"),
        }
    }
}

/// A log request as received from the client, before any cluster lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub namespace: String,
    pub kind: TargetKind,
    /// Pod name for `Pod` targets, Capp name for `Capp` targets.
    pub identifier: String,
    pub pod: Option<String>,
    pub container: Option<String>,
}

impl LogTarget {
    pub fn pod(namespace: &str, pod_name: &str, container: Option<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind: TargetKind::Pod,
            identifier: pod_name.to_string(),
            pod: None,
            container: non_empty(container),
        }
    }

    pub fn capp(
        namespace: &str,
        capp_name: &str,
        pod: Option<String>,
        container: Option<String>,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind: TargetKind::Capp,
            identifier: capp_name.to_string(),
            pod: non_empty(pod),
            container: non_empty(container),
        }
    }

    /// Text frame sent to the client for one log line.
    pub fn format_line(&self, line: &str) -> String {
        format!("{}: {} line: {}", self.kind, self.identifier, line)
    }
}

// Query strings like `?container=` arrive as empty strings
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Concrete pod and container a session reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub pod: String,
    pub container: String,
}

/// What the cluster knows about a pod, as far as log streaming cares.
#[derive(Debug, Clone, Default)]
pub struct PodRecord {
    pub name: String,
    pub containers: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub phase: String,
    pub restarts: i32,
    pub created: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub container_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContainersResponse {
    pub count: usize,
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub pod_name: String,
    pub phase: String,
    pub age: String,
    pub restarts: i32,
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PodsResponse {
    pub count: usize,
    pub pods: Vec<PodSummary>,
}
