use crate::types::DataLayout;
use crate::{GraphError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub data_layout: DataLayout,
    /// Rewrite forward chains to point straight at the canonical node while resolving.
    pub compress_paths: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            data_layout: DataLayout::default(),
            compress_paths: true,
        }
    }
}

impl GraphConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GraphError::Config(e.to_string()))
    }

    pub fn with_pointer_size(mut self, bytes: u32) -> Self {
        self.data_layout.pointer_size = bytes;
        self
    }
}
