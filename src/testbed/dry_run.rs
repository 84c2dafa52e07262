//! Testbed backend that performs no radio I/O.
//!
//! Every manager call is logged and appended to a call log, and MAC
//! parameters live in an in-memory table. MAC statistics reach the
//! subscriber only through `emit_mac_stats`.

use super::manager::{
    AppManager, MacManager, MacMode, MacStatsCallback, ManagerError, NodeId, ParameterMap, TIMESLOT_LENGTH,
};
use crate::common::TestbedConfig;
use crate::telemetry::MacStatsEvent;

/// Timeslot length (µs) reported until something overrides it.
const DEFAULT_TIMESLOT_LENGTH: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestbedCall {
    ActivateRadioProgram(MacMode),
    UpdateSlotframe { file: String, mode: MacMode },
    UpdateMacConfiguration(ParameterMap),
    ReadMacConfiguration { keys: Vec<String>, node: NodeId },
    WhitelistChannels(Vec<Vec<u32>>),
    BlacklistChannels(Vec<Vec<u32>>),
    SubscribeMacStats,
    UpdateConfiguration { parameters: ParameterMap, nodes: Vec<NodeId> },
    SetBorderRouter { prefix: [u8; 8], node: NodeId },
}

pub struct DryRunTestbed {
    nodes: Vec<NodeId>,
    mac_parameters: ParameterMap,
    calls: Vec<TestbedCall>,
    stats_callback: Option<MacStatsCallback>,
    failing: Option<&'static str>,
}

impl DryRunTestbed {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes,
            mac_parameters: ParameterMap::from([(TIMESLOT_LENGTH.to_string(), DEFAULT_TIMESLOT_LENGTH)]),
            calls: Vec::new(),
            stats_callback: None,
            failing: None,
        }
    }

    pub fn from_config(config: &TestbedConfig) -> Self {
        log::info!(
            "Dry-run testbed with {} nodes: {:?}",
            config.nodes.ip_address_list.len(),
            config.nodes.ip_address_list
        );
        log::debug!("Testbed global configuration: {:?}", config.global);
        Self::new(config.nodes.node_ids())
    }

    pub fn calls(&self) -> &[TestbedCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<TestbedCall> {
        std::mem::take(&mut self.calls)
    }

    /// Make every call to `operation` fail until cleared with `None`.
    pub fn fail_operation(&mut self, operation: Option<&'static str>) {
        self.failing = operation;
    }

    /// Hand an event to the subscriber. Returns false when nobody subscribed.
    pub fn emit_mac_stats(&mut self, event: MacStatsEvent) -> bool {
        match self.stats_callback.as_mut() {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    fn record(&mut self, operation: &'static str, call: TestbedCall) -> Result<(), ManagerError> {
        log::debug!("[dry-run] {:?}", call);
        self.calls.push(call);
        if self.failing == Some(operation) {
            return Err(ManagerError::Failed {
                operation,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl MacManager for DryRunTestbed {
    fn activate_radio_program(&mut self, mode: MacMode) -> Result<(), ManagerError> {
        self.record("activate_radio_program", TestbedCall::ActivateRadioProgram(mode))
    }

    fn update_slotframe(&mut self, file: &str, mode: MacMode) -> Result<(), ManagerError> {
        self.record(
            "update_slotframe",
            TestbedCall::UpdateSlotframe {
                file: file.to_string(),
                mode,
            },
        )
    }

    fn update_mac_configuration(&mut self, parameters: &ParameterMap) -> Result<(), ManagerError> {
        self.record("update_mac_configuration", TestbedCall::UpdateMacConfiguration(parameters.clone()))?;
        self.mac_parameters.extend(parameters.iter().map(|(k, v)| (k.clone(), *v)));
        Ok(())
    }

    fn read_mac_configuration(&mut self, keys: &[&str], node: NodeId) -> Result<ParameterMap, ManagerError> {
        self.record(
            "read_mac_configuration",
            TestbedCall::ReadMacConfiguration {
                keys: keys.iter().map(|k| k.to_string()).collect(),
                node,
            },
        )?;
        keys.iter()
            .map(|key| {
                self.mac_parameters
                    .get(*key)
                    .map(|value| (key.to_string(), *value))
                    .ok_or_else(|| ManagerError::MissingParameter {
                        node,
                        parameter: key.to_string(),
                    })
            })
            .collect()
    }

    fn whitelist_channels(&mut self, channels: &[Vec<u32>]) -> Result<(), ManagerError> {
        self.record("whitelist_channels", TestbedCall::WhitelistChannels(channels.to_vec()))
    }

    fn blacklist_channels(&mut self, channels: &[Vec<u32>]) -> Result<(), ManagerError> {
        self.record("blacklist_channels", TestbedCall::BlacklistChannels(channels.to_vec()))
    }

    fn subscribe_mac_stats(&mut self, callback: MacStatsCallback) -> Result<(), ManagerError> {
        self.record("subscribe_mac_stats", TestbedCall::SubscribeMacStats)?;
        self.stats_callback = Some(callback);
        Ok(())
    }
}

impl AppManager for DryRunTestbed {
    fn mac_addresses(&self) -> Vec<NodeId> {
        self.nodes.clone()
    }

    fn update_configuration(&mut self, parameters: &ParameterMap, nodes: &[NodeId]) -> Result<(), ManagerError> {
        self.record(
            "update_configuration",
            TestbedCall::UpdateConfiguration {
                parameters: parameters.clone(),
                nodes: nodes.to_vec(),
            },
        )
    }

    fn set_border_router(&mut self, prefix: [u8; 8], node: NodeId) -> Result<(), ManagerError> {
        self.record("set_border_router", TestbedCall::SetBorderRouter { prefix, node })
    }
}
