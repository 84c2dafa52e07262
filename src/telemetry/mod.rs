//! Telemetry derived from raw MAC statistics.
//!
//! - `types`: raw event layout, counter window and the report values
//! - `calculator`: throughput and carried PER computation
//!
//! `monitor_reporter` glues the calculator to a report sink; the resulting
//! callback runs on whatever thread the MAC manager delivers events on.

pub mod calculator;
pub mod types;

use std::sync::Arc;

pub use calculator::TelemetryCalculator;
pub use types::{MacStatsEvent, PerformanceReport, TelemetryError};

use crate::common::config::TelemetryConfig;
use crate::control::ReportSink;
use crate::testbed::MacStatsCallback;

pub const MONITOR_UNIT: &str = "kbps/%";

/// Callback emitting one monitor report per aggregate statistics event.
pub fn monitor_reporter(config: TelemetryConfig, sink: Arc<dyn ReportSink>) -> MacStatsCallback {
    let mut calculator = TelemetryCalculator::new(config.max_tracked_nodes);
    Box::new(move |event| match calculator.on_event(&event) {
        Ok(Some(report)) => {
            sink.monitor_report(&config.monitor_type, report.monitor_value(&config.technology), MONITOR_UNIT)
        }
        Ok(None) => {}
        Err(err) => log::warn!("Ignoring MAC statistics event: {}", err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::fake_controller::FakeController;
    use crate::control::{ControllerProxy, SolutionIdentity};
    use crate::testbed::{DryRunTestbed, MacManager};
    use std::sync::Mutex;
    use types::{AGGREGATE_ADDRESS, RECEIVED_FIELD, REQUESTED_FIELD, SUCCEEDED_FIELD, WINDOW_DURATION_FIELD};

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<(String, serde_json::Value, String)>>,
    }

    impl ReportSink for RecordingSink {
        fn monitor_report(&self, monitor_type: &str, value: serde_json::Value, unit: &str) {
            self.reports
                .lock()
                .unwrap()
                .push((monitor_type.to_string(), value, unit.to_string()));
        }

        fn event(&self, _event_type: &str) {}
    }

    #[test]
    fn test_one_report_per_aggregate_event() {
        let sink = Arc::new(RecordingSink::default());
        let mut callback = monitor_reporter(TelemetryConfig::default(), sink.clone());

        let mut node = vec![0; 11];
        callback(MacStatsEvent::new(2, node.clone()));
        node[REQUESTED_FIELD] = 100;
        node[SUCCEEDED_FIELD] = 80;
        callback(MacStatsEvent::new(2, node));
        assert!(sink.reports.lock().unwrap().is_empty());

        let mut aggregate = vec![0; 11];
        aggregate[WINDOW_DURATION_FIELD] = 1_000_000;
        aggregate[RECEIVED_FIELD] = 4;
        callback(MacStatsEvent::new(AGGREGATE_ADDRESS, aggregate));
        callback(MacStatsEvent::new(AGGREGATE_ADDRESS, vec![1]));

        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        let (monitor_type, value, unit) = &reports[0];
        assert_eq!(monitor_type, "performance");
        assert_eq!(unit, MONITOR_UNIT);
        assert_eq!(value["Zigbee"]["PER"], 20.0);
        assert_eq!(value["Zigbee"]["THR"], 4.0);
    }

    #[test]
    fn test_testbed_statistics_reach_the_controller() {
        let mut controller = FakeController::bind();
        let identity = SolutionIdentity {
            network_name: "network_zigbee".to_string(),
            solution_name: "blacklisting".to_string(),
            command_list: Vec::new(),
            event_list: vec!["6lowpan-THR".to_string(), "6lowpan-PER".to_string()],
        };
        let proxy = Arc::new(ControllerProxy::new(identity, controller.config(1000)));
        proxy.connect().unwrap();

        let mut testbed = DryRunTestbed::new(vec![2, 3]);
        testbed
            .subscribe_mac_stats(monitor_reporter(TelemetryConfig::default(), proxy.clone()))
            .unwrap();

        for node in [2, 3] {
            assert!(testbed.emit_mac_stats(MacStatsEvent::new(node, vec![0; 11])));
        }
        let mut node = vec![0; 11];
        node[REQUESTED_FIELD] = 50;
        node[SUCCEEDED_FIELD] = 45;
        testbed.emit_mac_stats(MacStatsEvent::new(2, node.clone()));
        testbed.emit_mac_stats(MacStatsEvent::new(3, node));

        let mut aggregate = vec![0; 11];
        aggregate[WINDOW_DURATION_FIELD] = 2_000_000;
        aggregate[RECEIVED_FIELD] = 6;
        testbed.emit_mac_stats(MacStatsEvent::new(AGGREGATE_ADDRESS, aggregate));

        let report = controller.next_request();
        assert_eq!(report["type"], "monitorReport");
        assert_eq!(report["monitorType"], "performance");
        assert_eq!(report["monitorUnit"], MONITOR_UNIT);
        // 100 requested, 90 transmitted; 6 packets over two seconds
        assert_eq!(report["monitorValue"]["Zigbee"]["PER"], 10.0);
        assert_eq!(report["monitorValue"]["Zigbee"]["THR"], 3.0);
    }
}
