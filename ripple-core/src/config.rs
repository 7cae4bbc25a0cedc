//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust,ignore
/// let config = RuntimeConfig::from_json(r#"{ "max_flush_passes": 10 }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many times one `flush` re-drains jobs that were queued by jobs of
    /// the same flush before giving up with `FlushLimit`.
    pub max_flush_passes: usize,

    /// Emit a `warn` event when a write through a read-only wrapper is
    /// rejected.
    pub warn_on_readonly_write: bool,

    /// Longest sequence a write through an observed wrapper may produce.
    /// Indexes at or past it, and longer lengths, are refused with an error.
    pub max_sequence_len: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: 100,
            warn_on_readonly_write: true,
            max_sequence_len: u32::MAX as usize,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
