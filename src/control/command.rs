//! Command and message type definitions for the control module.

use serde::{Deserialize, Serialize};

/// Commands this solution accepts from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolutionCommand {
    /// Blacklist the TSCH channels overlapping the interfering channel.
    Blacklist,
    /// Whitelist the same channels again.
    Whitelist,
    TrafficOff,
    TrafficLow,
    TrafficMedium,
    TrafficHigh,
    /// Switch the MAC to LTE/WiFi/ZigBee coexistence.
    LteWifiCoexistence,
}

impl SolutionCommand {
    /// Every supported command, in registration order.
    pub const ALL: [SolutionCommand; 7] = [
        SolutionCommand::Blacklist,
        SolutionCommand::Whitelist,
        SolutionCommand::TrafficOff,
        SolutionCommand::TrafficLow,
        SolutionCommand::TrafficMedium,
        SolutionCommand::TrafficHigh,
        SolutionCommand::LteWifiCoexistence,
    ];

    /// Name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            SolutionCommand::Blacklist => "6LOWPAN_BLACKLIST",
            SolutionCommand::Whitelist => "6LOWPAN_WHITELIST",
            SolutionCommand::TrafficOff => "TRAFFIC_OFF",
            SolutionCommand::TrafficLow => "TRAFFIC_LOW",
            SolutionCommand::TrafficMedium => "TRAFFIC_MEDIUM",
            SolutionCommand::TrafficHigh => "TRAFFIC_HIGH",
            SolutionCommand::LteWifiCoexistence => "LTE_WIFI_ZIGBEE",
        }
    }

    /// Look up a wire name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }

    /// Traffic type selected by the traffic commands (0 = inactive).
    pub fn traffic_type(&self) -> Option<u8> {
        match self {
            SolutionCommand::TrafficOff => Some(0),
            SolutionCommand::TrafficLow => Some(1),
            SolutionCommand::TrafficMedium => Some(2),
            SolutionCommand::TrafficHigh => Some(3),
            _ => None,
        }
    }
}

impl std::fmt::Display for SolutionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-tagged JSON bodies exchanged over the request socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControllerMessage {
    #[serde(rename_all = "camelCase")]
    RegisterRequest {
        solution: String,
        command_list: Vec<String>,
        event_list: Vec<String>,
    },
    RegisterResponse {},
    #[serde(rename_all = "camelCase")]
    MonitorReport {
        monitor_type: String,
        monitor_value: serde_json::Value,
        monitor_unit: String,
    },
    #[serde(rename_all = "camelCase")]
    EventReport { solution: String, event_type: String },
}

/// Command list in a push: either a bare name or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandList {
    One(String),
    Many(Vec<String>),
}

impl Default for CommandList {
    fn default() -> Self {
        CommandList::Many(Vec::new())
    }
}

impl CommandList {
    /// Normalize to an ordered list of names.
    pub fn into_names(self) -> Vec<String> {
        match self {
            CommandList::One(name) => vec![name],
            CommandList::Many(names) => names,
        }
    }
}

/// Command broadcast received on the subscribe socket.
///
/// Identified by its fields rather than a `type` tag; anything without
/// `involvedSolutions` addresses nobody.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPush {
    #[serde(default)]
    pub involved_solutions: Vec<String>,
    #[serde(default)]
    pub command_list: CommandList,
}

impl CommandPush {
    /// Command names addressed to `solution_name`, in the order given.
    pub fn commands_for(self, solution_name: &str) -> Vec<String> {
        if self.involved_solutions.iter().any(|s| s == solution_name) {
            self.command_list.into_names()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_names_round_trip() {
        for command in SolutionCommand::ALL {
            assert_eq!(SolutionCommand::from_name(command.name()), Some(command));
        }
        assert_eq!(SolutionCommand::from_name("REBOOT"), None);
    }

    #[test]
    fn test_register_request_wire_shape() {
        let msg = ControllerMessage::RegisterRequest {
            solution: "blacklisting".to_string(),
            command_list: vec!["6LOWPAN_BLACKLIST".to_string()],
            event_list: vec!["6lowpan-THR".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "registerRequest",
                "solution": "blacklisting",
                "commandList": ["6LOWPAN_BLACKLIST"],
                "eventList": ["6lowpan-THR"],
            })
        );
    }

    #[test]
    fn test_monitor_and_event_report_wire_shape() {
        let monitor = ControllerMessage::MonitorReport {
            monitor_type: "performance".to_string(),
            monitor_value: json!(12.5),
            monitor_unit: "kbps".to_string(),
        };
        let value = serde_json::to_value(&monitor).unwrap();
        assert_eq!(value["type"], "monitorReport");
        assert_eq!(value["monitorType"], "performance");
        assert_eq!(value["monitorUnit"], "kbps");

        let event = ControllerMessage::EventReport {
            solution: "blacklisting".to_string(),
            event_type: "LTE_COEXISTENCE".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "eventReport");
        assert_eq!(value["eventType"], "LTE_COEXISTENCE");
    }

    #[test]
    fn test_bare_string_and_singleton_list_are_equivalent() {
        let bare: CommandPush =
            serde_json::from_value(json!({"involvedSolutions": ["x"], "commandList": "6LOWPAN_BLACKLIST"})).unwrap();
        let list: CommandPush =
            serde_json::from_value(json!({"involvedSolutions": ["x"], "commandList": ["6LOWPAN_BLACKLIST"]})).unwrap();
        assert_eq!(bare.commands_for("x"), list.commands_for("x"));
    }

    #[test]
    fn test_push_for_other_solution_is_empty() {
        let push: CommandPush =
            serde_json::from_value(json!({"involvedSolutions": ["other"], "commandList": ["TRAFFIC_LOW"]})).unwrap();
        assert!(push.commands_for("x").is_empty());

        let untargeted: CommandPush = serde_json::from_value(json!({"type": "monitorReport"})).unwrap();
        assert!(untargeted.commands_for("x").is_empty());
    }
}
