use std::path::Path;

use anyhow::Context;
use holdall_containers::StoreConfig;
use holdall_externalize::ExternalizationConfig;
use serde::{Deserialize, Serialize};

/// Contents of a holdall TOML file: `[store]` and `[externalization]`
/// tables, each optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldallConfig {
    pub store: StoreConfig,
    pub externalization: ExternalizationConfig,
}

impl HoldallConfig {
    /// Load from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
