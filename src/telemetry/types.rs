//! Raw MAC statistics events and the per-node counter window.

use thiserror::Error;

use crate::testbed::NodeId;

/// Address whose events carry the global received-packet counter.
pub const AGGREGATE_ADDRESS: NodeId = 1;

/// Measurement window length in µs (aggregate events).
pub const WINDOW_DURATION_FIELD: usize = 0;
/// Cumulative transmissions requested by the node.
pub const REQUESTED_FIELD: usize = 1;
/// Cumulative transmissions that succeeded.
pub const SUCCEEDED_FIELD: usize = 4;
/// Cumulative packets received by the sink (aggregate events).
pub const RECEIVED_FIELD: usize = 10;

/// Application packet size on the air, in bits.
pub const PACKET_BITS: f64 = 128.0 * 8.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("event from {address} has no {name} field (index {index}, {len} values)")]
    MissingField {
        address: NodeId,
        name: &'static str,
        index: usize,
        len: usize,
    },
}

/// One `IEEE802154_event_macStats` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacStatsEvent {
    pub mac_address: NodeId,
    pub values: Vec<i64>,
}

impl MacStatsEvent {
    pub fn new(mac_address: NodeId, values: Vec<i64>) -> Self {
        Self { mac_address, values }
    }

    pub fn is_aggregate(&self) -> bool {
        self.mac_address == AGGREGATE_ADDRESS
    }

    pub fn field(&self, index: usize, name: &'static str) -> Result<i64, TelemetryError> {
        self.values.get(index).copied().ok_or(TelemetryError::MissingField {
            address: self.mac_address,
            name,
            index,
            len: self.values.len(),
        })
    }
}

/// Sliding two-sample window over a node's cumulative counters.
///
/// Only deltas are meaningful; absolute totals are never reconstructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterWindow {
    pub requested_prev: i64,
    pub succeeded_prev: i64,
    pub requested_cur: i64,
    pub succeeded_cur: i64,
}

impl CounterWindow {
    /// Move the current sample to `prev` and store the new one.
    pub fn shift(&mut self, requested: i64, succeeded: i64) {
        self.requested_prev = self.requested_cur;
        self.succeeded_prev = self.succeeded_cur;
        self.requested_cur = requested;
        self.succeeded_cur = succeeded;
    }

    pub fn requested_delta(&self) -> i64 {
        self.requested_cur - self.requested_prev
    }

    pub fn succeeded_delta(&self) -> i64 {
        self.succeeded_cur - self.succeeded_prev
    }
}

/// Values published once per aggregate event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceReport {
    /// kbit/s over the last window.
    pub throughput: f64,
    /// Packet error rate in percent, never negative.
    pub packet_error_rate: f64,
}

impl PerformanceReport {
    /// Monitor value in the controller's `{technology: {THR, PER}}` layout.
    pub fn monitor_value(&self, technology: &str) -> serde_json::Value {
        let mut value = serde_json::Map::new();
        value.insert(
            technology.to_string(),
            serde_json::json!({
                "THR": self.throughput,
                "PER": self.packet_error_rate,
            }),
        );
        serde_json::Value::Object(value)
    }
}
