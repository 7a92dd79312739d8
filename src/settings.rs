// dgb_node_rust/src/settings.rs

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::chainparams::ChainParams;
use crate::error::ChainResult;

const SETTINGS_FILE: &str = "dgb_node";
const ENV_PREFIX: &str = "DGB";

/// Runtime settings: defaults, then `dgb_node.toml` if present, then
/// `DGB_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub network: String,
    /// File of hex-encoded 80-byte headers, one per line, replayed at startup.
    pub headers_file: Option<String>,
    pub multi_algo_diff_change_target: Option<u32>,
    pub work_computation_change_target: Option<u32>,
    pub odo_height: Option<u32>,
}

impl Settings {
    pub fn load() -> ChainResult<Self> {
        let config = Config::builder()
            .set_default("network", "main")?
            .add_source(File::with_name(SETTINGS_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> ChainResult<Self> {
        Ok(config.try_deserialize()?)
    }

    /// Network preset with any configured height overrides applied.
    pub fn chain_params(&self) -> ChainResult<ChainParams> {
        let mut params = ChainParams::for_network(&self.network)?;
        if let Some(height) = self.multi_algo_diff_change_target {
            params.multi_algo_diff_change_target = height;
        }
        if let Some(height) = self.work_computation_change_target {
            params.work_computation_change_target = height;
        }
        if let Some(height) = self.odo_height {
            params.odo_height = height;
        }
        Ok(params)
    }
}
