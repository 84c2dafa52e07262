//! Fixed-interval mode control loop.
//!
//! Each tick drains the control event queue, then in order applies pending
//! whitelist and blacklist batches, reacts to a traffic type change and
//! performs the TSCH → LTE coexistence transition once per rising edge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use super::types::{ControlEventReceiver, ControlState};
use crate::common::config::ControlLoopConfig;
use crate::control::ReportSink;
use crate::testbed::manager::{PACKET_GENERATOR_ACTIVE, SLOTFRAME_SIZE, TIMESLOT_LENGTH};
use crate::testbed::{AppManager, AppRole, MacManager, MacMode, ManagerError, NodeId, ParameterMap};

/// Node acting as application server and RPL border router.
pub const SERVER_NODE: NodeId = 1;
/// Client node used while coexisting with LTE.
pub const LTE_CLIENT_NODE: NodeId = 3;
/// Send interval pushed while coexisting with LTE.
pub const LTE_SEND_INTERVAL: i64 = 30;
/// RPL prefix fd00::1 announced by the border router.
pub const BORDER_ROUTER_PREFIX: [u8; 8] = [0xfd, 0, 0, 0, 0, 0, 0, 1];
/// Event reported to the controller after switching to LTE coexistence.
pub const LTE_COEXISTENCE_EVENT: &str = "LTE_COEXISTENCE";

pub struct ModeControlLoop<T: MacManager + AppManager> {
    testbed: T,
    config: ControlLoopConfig,
    events: ControlEventReceiver,
    state: ControlState,
    // Traffic type last pushed successfully to the nodes.
    applied_traffic_type: u8,
    reports: Option<Arc<dyn ReportSink>>,
}

impl<T: MacManager + AppManager> ModeControlLoop<T> {
    pub fn new(testbed: T, config: ControlLoopConfig, events: ControlEventReceiver) -> Self {
        Self {
            testbed,
            config,
            events,
            state: ControlState::default(),
            applied_traffic_type: 0,
            reports: None,
        }
    }

    /// Report mode transitions through `sink`.
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.reports = Some(sink);
        self
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn testbed(&self) -> &T {
        &self.testbed
    }

    pub fn testbed_mut(&mut self) -> &mut T {
        &mut self.testbed
    }

    /// Put the network into TSCH with node 1 as border router.
    pub fn configure(&mut self) -> Result<(), ManagerError> {
        let node_count = self.testbed.mac_addresses().len() as i64;
        log::info!("Configuring TSCH for {} nodes", node_count);

        self.testbed.activate_radio_program(MacMode::Tsch)?;
        self.testbed.update_slotframe(&self.config.slotframe_file, MacMode::Tsch)?;
        self.testbed
            .update_mac_configuration(&ParameterMap::from([(SLOTFRAME_SIZE.to_string(), node_count + 1)]))?;
        self.testbed.set_border_router(BORDER_ROUTER_PREFIX, SERVER_NODE)?;
        self.state.mac_mode = MacMode::Tsch;
        Ok(())
    }

    /// Move every queued control event into the state. Returns the number drained.
    pub fn drain_events(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.events.try_receive() {
            self.state.apply(event);
            drained += 1;
        }
        drained
    }

    pub fn tick(&mut self) {
        self.drain_events();
        self.step();
    }

    /// The ordered tick actions, without draining the queue first.
    pub fn step(&mut self) {
        if !self.state.pending_whitelist.is_empty() {
            let channels = std::mem::take(&mut self.state.pending_whitelist);
            if let Err(err) = self.testbed.whitelist_channels(&channels) {
                log::error!("Whitelisting {:?} failed: {}", channels, err);
            }
        }

        if !self.state.pending_blacklist.is_empty() {
            let channels = std::mem::take(&mut self.state.pending_blacklist);
            if let Err(err) = self.testbed.blacklist_channels(&channels) {
                log::error!("Blacklisting {:?} failed: {}", channels, err);
            }
        }

        if self.state.traffic_type != self.applied_traffic_type {
            let traffic_type = self.state.traffic_type;
            match self.control_traffic(traffic_type) {
                Ok(()) => self.applied_traffic_type = traffic_type,
                Err(err) => log::error!("Applying traffic type {} failed, retrying next tick: {}", traffic_type, err),
            }
        }

        if self.state.coexistence_requested && self.state.mac_mode != MacMode::LteCoexistence {
            self.enter_lte_coexistence();
        }
    }

    /// Tick at the configured interval until `shutdown` is set. A tick in
    /// progress always completes.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let interval = self.config.tick_interval();
        log::info!("Mode control loop running every {:?}", interval);
        while !shutdown.load(Ordering::SeqCst) {
            self.tick();
            thread::sleep(interval);
        }
        log::info!("Mode control loop stopped in {} mode", self.state.mac_mode);
    }

    fn enter_lte_coexistence(&mut self) {
        log::info!("Switching from {} to {}", self.state.mac_mode, MacMode::LteCoexistence);
        self.state.mac_mode = MacMode::LteCoexistence;

        if let Err(err) = self.testbed.activate_radio_program(MacMode::LteCoexistence) {
            log::error!("Activating {} failed: {}", MacMode::LteCoexistence, err);
        }
        if let Err(err) = self.control_traffic(0) {
            log::error!("Deactivating traffic failed: {}", err);
        }
        let traffic_type = self.state.traffic_type;
        match self.control_traffic(traffic_type) {
            Ok(()) => self.applied_traffic_type = traffic_type,
            Err(err) => {
                // Traffic is off now; the next tick retries the requested type.
                self.applied_traffic_type = 0;
                log::error!("Re-applying traffic type {} failed: {}", traffic_type, err);
            }
        }

        if let Some(sink) = &self.reports {
            sink.event(LTE_COEXISTENCE_EVENT);
        }
    }

    fn control_traffic(&mut self, traffic_type: u8) -> Result<(), ManagerError> {
        let nodes = self.testbed.mac_addresses();
        if traffic_type == 0 {
            log::info!("Deactivating traffic on {:?}", nodes);
            return self.testbed.set_role(AppRole::Inactive, &nodes);
        }

        let (interval, clients) = match self.state.mac_mode {
            MacMode::Tsch => {
                let clients: Vec<NodeId> = nodes.iter().copied().filter(|&node| node != SERVER_NODE).collect();
                (self.tsch_send_interval(traffic_type, nodes.len())?, clients)
            }
            MacMode::LteCoexistence => {
                self.testbed
                    .update_mac_configuration(&ParameterMap::from([(PACKET_GENERATOR_ACTIVE.to_string(), 1)]))?;
                let clients: Vec<NodeId> = nodes.iter().copied().filter(|&node| node == LTE_CLIENT_NODE).collect();
                (LTE_SEND_INTERVAL, clients)
            }
        };

        log::info!(
            "Traffic type {} in {}: interval {}, server {}, clients {:?}",
            traffic_type,
            self.state.mac_mode,
            interval,
            SERVER_NODE,
            clients
        );
        self.testbed.set_send_interval(interval, &nodes)?;
        self.testbed.set_role(AppRole::Server, &[SERVER_NODE])?;
        self.testbed.set_role(AppRole::Client, &clients)
    }

    /// floor(slotLength × (nodes + 2) / 1000 × 3 / trafficType), `traffic_type` > 0.
    fn tsch_send_interval(&mut self, traffic_type: u8, node_count: usize) -> Result<i64, ManagerError> {
        let parameters = self.testbed.read_mac_configuration(&[TIMESLOT_LENGTH], SERVER_NODE)?;
        let slot_length = parameters.get(TIMESLOT_LENGTH).copied().ok_or_else(|| ManagerError::MissingParameter {
            node: SERVER_NODE,
            parameter: TIMESLOT_LENGTH.to_string(),
        })?;
        let interval = slot_length as f64 * (node_count + 2) as f64 / 1000.0 * 3.0 / traffic_type as f64;
        Ok(interval.floor() as i64)
    }
}
