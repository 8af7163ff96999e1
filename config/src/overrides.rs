use serde::Deserialize;
use std::collections::BTreeMap;

/// User supplied values as read from file and environment. Every field is
/// optional; absent or empty values fall back to the built-in defaults.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Overrides {
    #[serde(default)]
    pub(crate) ssh: SshOverrides,
    #[serde(default)]
    pub(crate) metrics: MetricsOverrides,
    #[serde(default)]
    pub(crate) encryption: EncryptionOverrides,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SshOverrides {
    #[serde(default)]
    pub(crate) timeout: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MetricsOverrides {
    #[serde(default)]
    pub(crate) commands: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EncryptionOverrides {
    #[serde(default)]
    pub(crate) key: Option<String>,
}
