use std::collections::BTreeMap;

/// Render labels as a selector string for listing.
pub fn labels_to_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Labels every pod owned by the given Capp carries.
pub fn capp_selector(label_key: &str, capp_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(label_key.to_string(), capp_name.to_string())])
}

/// Human readable age, kubectl style.
pub fn format_age(created: Option<chrono::DateTime<chrono::Utc>>) -> String {
    created
        .map(|created| {
            let now = chrono::Utc::now();
            // Clock skew can put the creation time ahead of us
            let total_secs = now.signed_duration_since(created).num_seconds().max(0);
            if total_secs < 60 {
                format!("{}s", total_secs)
            } else if total_secs < 3600 {
                format!("{}m", total_secs / 60)
            } else if total_secs < 86400 {
                format!("{}h", total_secs / 3600)
            } else {
                format!("{}d", total_secs / 86400)
            }
        })
        .unwrap_or_else(|| "unknown".to_string())
}
