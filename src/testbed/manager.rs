//! Narrow interface to the external MAC and application managers.
//!
//! The managers own everything radio-specific; the solution only relies on
//! the operation names below and on their success/failure signaling.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::telemetry::MacStatsEvent;

/// Node identifier as used by the node manager (1-based).
pub type NodeId = u32;

/// Named integer parameters pushed to or read from nodes.
pub type ParameterMap = BTreeMap<String, i64>;

/// Receives raw MAC statistics events on the manager's own thread.
pub type MacStatsCallback = Box<dyn FnMut(MacStatsEvent) + Send>;

pub const TIMESLOT_LENGTH: &str = "IEEE802154e_macTsTimeslotLength";
pub const SLOTFRAME_SIZE: &str = "IEEE802154e_macSlotframeSize";
pub const PACKET_GENERATOR_ACTIVE: &str = "TAISC_PG_ACTIVE";
pub const APP_SEND_INTERVAL: &str = "app_send_interval";
pub const APP_ACTIVATE: &str = "app_activate";

/// Active medium-access scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MacMode {
    #[default]
    Tsch,
    LteCoexistence,
}

impl MacMode {
    /// Radio program name understood by the MAC manager.
    pub fn radio_program(&self) -> &'static str {
        match self {
            MacMode::Tsch => "TSCH",
            MacMode::LteCoexistence => "LTE_COEXISTENCE",
        }
    }
}

impl std::fmt::Display for MacMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.radio_program())
    }
}

/// Role pushed through `app_activate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRole {
    Inactive = 0,
    Server = 1,
    Client = 2,
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{operation} failed: {reason}")]
    Failed { operation: &'static str, reason: String },
    #[error("node {node} did not report {parameter}")]
    MissingParameter { node: NodeId, parameter: String },
}

/// MAC (TAISC) manager operations.
pub trait MacManager {
    fn activate_radio_program(&mut self, mode: MacMode) -> Result<(), ManagerError>;

    fn update_slotframe(&mut self, file: &str, mode: MacMode) -> Result<(), ManagerError>;

    fn update_mac_configuration(&mut self, parameters: &ParameterMap) -> Result<(), ManagerError>;

    fn read_mac_configuration(&mut self, keys: &[&str], node: NodeId) -> Result<ParameterMap, ManagerError>;

    /// Each inner list is one batch of target channels.
    fn whitelist_channels(&mut self, channels: &[Vec<u32>]) -> Result<(), ManagerError>;

    fn blacklist_channels(&mut self, channels: &[Vec<u32>]) -> Result<(), ManagerError>;

    /// Route MAC statistics events to `callback`.
    fn subscribe_mac_stats(&mut self, callback: MacStatsCallback) -> Result<(), ManagerError>;
}

/// Application manager operations plus the node population it addresses.
pub trait AppManager {
    /// Ids of the connected nodes, in node-manager order.
    fn mac_addresses(&self) -> Vec<NodeId>;

    fn update_configuration(&mut self, parameters: &ParameterMap, nodes: &[NodeId]) -> Result<(), ManagerError>;

    /// Make `node` the RPL border router for `prefix`.
    fn set_border_router(&mut self, prefix: [u8; 8], node: NodeId) -> Result<(), ManagerError>;

    fn set_role(&mut self, role: AppRole, nodes: &[NodeId]) -> Result<(), ManagerError> {
        let parameters = ParameterMap::from([(APP_ACTIVATE.to_string(), role as i64)]);
        self.update_configuration(&parameters, nodes)
    }

    fn set_send_interval(&mut self, interval: i64, nodes: &[NodeId]) -> Result<(), ManagerError> {
        let parameters = ParameterMap::from([(APP_SEND_INTERVAL.to_string(), interval)]);
        self.update_configuration(&parameters, nodes)
    }
}
