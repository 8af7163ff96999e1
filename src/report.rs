use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
    Serializer,
};
use ssh_batch_plugin_orchestrator::Report;
use std::collections::BTreeMap;

/// Outcome of one metrics collection. On failure `metrics` holds a single
/// `error` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub id: i64,
    pub success: bool,
    pub metrics: BTreeMap<String, String>,
    #[serde(serialize_with = "rfc3339_seconds")]
    pub polled_at: DateTime<Utc>,
}

impl MetricsResult {
    pub fn success(id: i64, metrics: BTreeMap<String, String>) -> Self {
        Self {
            id,
            success: true,
            metrics,
            polled_at: Utc::now(),
        }
    }

    pub fn failure(id: i64, cause: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            metrics: BTreeMap::from([("error".to_string(), cause.into())]),
            polled_at: Utc::now(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            self.metrics.get("error").map(String::as_str)
        }
    }
}

impl Report for MetricsResult {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Outcome of one discovery pass. `step` is empty on success and otherwise
/// names the first gate that failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub id: i64,
    pub success: bool,
    pub step: String,
}

impl DiscoveryResult {
    pub fn success(id: i64) -> Self {
        Self {
            id,
            success: true,
            step: String::new(),
        }
    }

    pub fn failure(id: i64, step: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            step: step.into(),
        }
    }
}

impl Report for DiscoveryResult {
    fn id(&self) -> i64 {
        self.id
    }
}

fn rfc3339_seconds<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
}
