use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    dedup::DedupParams, gate::GateParams, score::ScorerParams, stitch::StitchParams, Error,
    Result,
};

/// Every tunable threshold of the reconciliation stages.
///
/// Missing tables or keys fall back to their defaults, so a config file only needs
/// the values it recalibrates:
///
/// ```toml
/// [stitch]
/// horizontal_max_dx = 260.0
///
/// [scorer.priorities]
/// annotation = 0.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub gate: GateParams,
    pub dedup: DedupParams,
    pub stitch: StitchParams,
    pub scorer: ScorerParams,
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loading pipeline config from {}", path.display());
        Self::from_toml(&content)
    }
}
