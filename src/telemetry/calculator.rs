//! Throughput and carried packet-error-rate from raw MAC counters.
//!
//! Ordinary node events only slide that node's counter window. The
//! aggregate event closes a measurement window: deltas of all tracked
//! windows are summed into a PER and the global received counter gives the
//! throughput.
//!
//! A window where more packets succeeded than were requested yields a
//! negative error. That negative value is banked as the carry and offset
//! against the next positive windows; PER is reported as 0 until the carry
//! is used up.

use std::collections::BTreeMap;

use super::types::{
    CounterWindow, MacStatsEvent, PACKET_BITS, PerformanceReport, RECEIVED_FIELD, REQUESTED_FIELD, SUCCEEDED_FIELD,
    TelemetryError, WINDOW_DURATION_FIELD,
};
use crate::testbed::NodeId;

pub struct TelemetryCalculator {
    windows: BTreeMap<NodeId, CounterWindow>,
    max_tracked_nodes: usize,
    per_carry: f64,
    received_prev: i64,
}

impl TelemetryCalculator {
    pub fn new(max_tracked_nodes: usize) -> Self {
        Self {
            windows: BTreeMap::new(),
            max_tracked_nodes,
            per_carry: 0.0,
            received_prev: 0,
        }
    }

    /// Feed one raw event. Returns a report for aggregate events only.
    pub fn on_event(&mut self, event: &MacStatsEvent) -> Result<Option<PerformanceReport>, TelemetryError> {
        if event.is_aggregate() {
            self.close_window(event).map(Some)
        } else {
            self.update_node(event)?;
            Ok(None)
        }
    }

    /// Negative error currently banked (0 when nothing is carried).
    pub fn carry(&self) -> f64 {
        self.per_carry
    }

    pub fn window(&self, node: NodeId) -> Option<&CounterWindow> {
        self.windows.get(&node)
    }

    pub fn tracked_nodes(&self) -> usize {
        self.windows.len()
    }

    /// PER for one window, applying and updating the carry.
    pub fn packet_error_rate(&mut self, requested: i64, transmitted: i64) -> f64 {
        if requested == 0 {
            return 0.0;
        }
        let per = (requested - transmitted) as f64 * 100.0 / requested as f64 + self.per_carry;
        if per < 0.0 {
            self.per_carry = per;
            0.0
        } else {
            self.per_carry = 0.0;
            per
        }
    }

    fn update_node(&mut self, event: &MacStatsEvent) -> Result<(), TelemetryError> {
        let requested = event.field(REQUESTED_FIELD, "requested")?;
        let succeeded = event.field(SUCCEEDED_FIELD, "succeeded")?;

        if !self.windows.contains_key(&event.mac_address) && self.windows.len() >= self.max_tracked_nodes {
            log::warn!(
                "Counter table full ({} nodes), ignoring statistics from node {}",
                self.max_tracked_nodes,
                event.mac_address
            );
            return Ok(());
        }
        self.windows.entry(event.mac_address).or_default().shift(requested, succeeded);
        Ok(())
    }

    fn close_window(&mut self, event: &MacStatsEvent) -> Result<PerformanceReport, TelemetryError> {
        let window_duration = event.field(WINDOW_DURATION_FIELD, "window duration")?;
        let received = event.field(RECEIVED_FIELD, "received count")?;

        let (requested, transmitted) = self
            .windows
            .values()
            .fold((0, 0), |(r, t), w| (r + w.requested_delta(), t + w.succeeded_delta()));
        let packet_error_rate = self.packet_error_rate(requested, transmitted);

        let throughput = if received < self.received_prev {
            log::warn!(
                "Received counter went back from {} to {}, taking it as the new baseline",
                self.received_prev,
                received
            );
            0.0
        } else if window_duration > 0 {
            (received - self.received_prev) as f64 * PACKET_BITS * 1_000_000.0 / window_duration as f64 / 1024.0
        } else {
            log::warn!("Aggregate statistics with zero window duration, reporting no throughput");
            0.0
        };
        self.received_prev = received;

        log::debug!(
            "Window closed: requested={} transmitted={} PER={:.2}% THR={:.2}kbps carry={:.2}",
            requested,
            transmitted,
            packet_error_rate,
            throughput,
            self.per_carry
        );

        Ok(PerformanceReport {
            throughput,
            packet_error_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::types::AGGREGATE_ADDRESS;

    fn node_event(node: NodeId, requested: i64, succeeded: i64) -> MacStatsEvent {
        let mut values = vec![0; 11];
        values[REQUESTED_FIELD] = requested;
        values[SUCCEEDED_FIELD] = succeeded;
        MacStatsEvent::new(node, values)
    }

    fn aggregate_event(window_us: i64, received: i64) -> MacStatsEvent {
        let mut values = vec![0; 11];
        values[WINDOW_DURATION_FIELD] = window_us;
        values[RECEIVED_FIELD] = received;
        MacStatsEvent::new(AGGREGATE_ADDRESS, values)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_carry_law() {
        let mut calc = TelemetryCalculator::new(8);

        assert_close(calc.packet_error_rate(100, 80), 20.0);
        assert_close(calc.carry(), 0.0);

        assert_close(calc.packet_error_rate(100, 130), 0.0);
        assert_close(calc.carry(), -30.0);

        assert_close(calc.packet_error_rate(100, 90), 0.0);
        assert_close(calc.carry(), -20.0);

        assert_close(calc.packet_error_rate(100, 75), 5.0);
        assert_close(calc.carry(), 0.0);
    }

    #[test]
    fn test_idle_window_leaves_carry_untouched() {
        let mut calc = TelemetryCalculator::new(8);
        calc.packet_error_rate(100, 130);
        assert_close(calc.packet_error_rate(0, 0), 0.0);
        assert_close(calc.carry(), -30.0);
    }

    #[test]
    fn test_node_events_only_slide_windows() {
        let mut calc = TelemetryCalculator::new(8);
        assert_eq!(calc.on_event(&node_event(2, 10, 9)).unwrap(), None);
        assert_eq!(calc.on_event(&node_event(2, 30, 25)).unwrap(), None);

        let window = calc.window(2).unwrap();
        assert_eq!(window.requested_delta(), 20);
        assert_eq!(window.succeeded_delta(), 16);
    }

    #[test]
    fn test_aggregate_sums_all_windows() {
        let mut calc = TelemetryCalculator::new(8);
        calc.on_event(&node_event(2, 0, 0)).unwrap();
        calc.on_event(&node_event(3, 0, 0)).unwrap();
        calc.on_event(&node_event(2, 60, 50)).unwrap();
        calc.on_event(&node_event(3, 40, 30)).unwrap();

        let report = calc.on_event(&aggregate_event(1_000_000, 0)).unwrap().unwrap();
        // 100 requested, 80 transmitted
        assert_close(report.packet_error_rate, 20.0);
    }

    #[test]
    fn test_throughput_uses_received_delta_and_window() {
        let mut calc = TelemetryCalculator::new(8);
        let first = calc.on_event(&aggregate_event(1_000_000, 10)).unwrap().unwrap();
        // 10 packets * 1024 bits over one second
        assert_close(first.throughput, 10.0);

        let second = calc.on_event(&aggregate_event(500_000, 15)).unwrap().unwrap();
        assert_close(second.throughput, 10.0);
    }

    #[test]
    fn test_received_counter_reset_starts_new_baseline() {
        let mut calc = TelemetryCalculator::new(8);
        calc.on_event(&aggregate_event(1_000_000, 500)).unwrap();

        let reset = calc.on_event(&aggregate_event(1_000_000, 3)).unwrap().unwrap();
        assert_close(reset.throughput, 0.0);

        let next = calc.on_event(&aggregate_event(1_000_000, 8)).unwrap().unwrap();
        assert_close(next.throughput, 5.0);
    }

    #[test]
    fn test_zero_window_duration_is_guarded() {
        let mut calc = TelemetryCalculator::new(8);
        let report = calc.on_event(&aggregate_event(0, 50)).unwrap().unwrap();
        assert_close(report.throughput, 0.0);
    }

    #[test]
    fn test_table_is_capped() {
        let mut calc = TelemetryCalculator::new(2);
        calc.on_event(&node_event(2, 1, 1)).unwrap();
        calc.on_event(&node_event(3, 1, 1)).unwrap();
        calc.on_event(&node_event(4, 1, 1)).unwrap();
        assert_eq!(calc.tracked_nodes(), 2);
        assert!(calc.window(4).is_none());

        calc.on_event(&node_event(3, 5, 4)).unwrap();
        assert_eq!(calc.window(3).unwrap().requested_cur, 5);
    }

    #[test]
    fn test_short_payload_is_rejected() {
        let mut calc = TelemetryCalculator::new(8);
        let result = calc.on_event(&MacStatsEvent::new(AGGREGATE_ADDRESS, vec![1000]));
        assert!(matches!(result, Err(TelemetryError::MissingField { .. })));
        assert!(calc.on_event(&MacStatsEvent::new(5, vec![1, 2])).is_err());
        assert_eq!(calc.tracked_nodes(), 0);
    }
}
