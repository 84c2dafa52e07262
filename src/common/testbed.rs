//! Testbed description: controller/topology config and the node list.
//!
//! Both files are YAML and live next to `solution.toml`:
//! - `global_config.yaml` is owned by the node manager and passed on untouched
//! - `nodes.yaml` lists the node addresses under `ip_address_list`

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use super::error::ConfigError;
use crate::testbed::NodeId;

pub const GLOBAL_CONFIG_FILE: &str = "global_config.yaml";
pub const NODES_FILE: &str = "nodes.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct NodeList {
    pub ip_address_list: Vec<String>,
}

impl NodeList {
    /// Node ids in list order, starting at 1.
    pub fn node_ids(&self) -> Vec<NodeId> {
        (1..=self.ip_address_list.len() as NodeId).collect()
    }
}

#[derive(Debug, Clone)]
pub struct TestbedConfig {
    pub global: serde_yaml::Value,
    pub nodes: NodeList,
}

impl TestbedConfig {
    /// Load both YAML files from `config_dir`.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let global: serde_yaml::Value = load_yaml(&config_dir.join(GLOBAL_CONFIG_FILE))?;
        let nodes: NodeList = load_yaml(&config_dir.join(NODES_FILE))?;
        if nodes.ip_address_list.is_empty() {
            return Err(ConfigError::Validation(format!("{} lists no nodes", NODES_FILE)));
        }
        Ok(Self { global, nodes })
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&data).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
