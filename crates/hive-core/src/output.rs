//! Output format selection and the versioned JSON envelope.

use serde::Serialize;

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text on stdout
    #[default]
    Human,
    /// Machine-readable JSON envelope on stdout
    Json,
}

impl OutputFormat {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    pub const fn is_human(self) -> bool {
        matches!(self, Self::Human)
    }
}

/// Wraps a command's JSON output with schema identification so consumers
/// can detect format changes.
#[derive(Debug, Serialize)]
pub struct SchemaEnvelope<T: Serialize> {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub _schema_version: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SchemaEnvelope<T> {
    /// Wraps `data` under the schema named by `command`, e.g.
    /// `hive://next/v1`.
    pub fn new(command: &str, data: T) -> Self {
        Self {
            schema: format!("hive://{command}/v1"),
            _schema_version: "1.0".to_string(),
            data,
        }
    }
}
