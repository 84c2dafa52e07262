//! Command handlers posting control events to the mode control loop.

use super::types::{ControlEvent, ControlEventSender};
use crate::control::{CommandDispatcher, HandlerError, SolutionCommand};

/// Bind every supported command to a handler that enqueues its control event.
///
/// `interfering_targets` are the TSCH channels overlapping the interfering
/// external channel; blacklist and whitelist both queue that batch.
pub fn bind_commands(dispatcher: &mut CommandDispatcher, sender: ControlEventSender, interfering_targets: Vec<u32>) {
    for command in SolutionCommand::ALL {
        let event = match command {
            SolutionCommand::Blacklist => ControlEvent::Blacklist(interfering_targets.clone()),
            SolutionCommand::Whitelist => ControlEvent::Whitelist(interfering_targets.clone()),
            SolutionCommand::LteWifiCoexistence => ControlEvent::CoexistenceRequested(true),
            traffic => match traffic.traffic_type() {
                Some(traffic_type) => ControlEvent::Traffic(traffic_type),
                None => continue,
            },
        };
        let sender = sender.clone();
        dispatcher.bind(command, move || sender.try_send(event.clone()).map_err(|_| HandlerError::QueueFull));
    }
}
