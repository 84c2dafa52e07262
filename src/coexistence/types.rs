//! Control state and the queue feeding it.
//!
//! Command handlers never touch `ControlState` directly: they post
//! `ControlEvent`s onto a bounded queue that the mode control loop drains at
//! the start of every tick. The loop is the only owner of the state.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::testbed::MacMode;

/// Depth of the handler→loop queue. Commands arrive at human pace; a full
/// queue means the loop is stuck and the command is rejected.
pub const CONTROL_EVENT_QUEUE_SIZE: usize = 16;
/// Bounded channel carrying state mutations to the mode control loop.
pub type ControlEventQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, ControlEvent, CONTROL_EVENT_QUEUE_SIZE>;
/// Sender side, held by the command handlers.
pub type ControlEventSender =
    embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, ControlEvent, CONTROL_EVENT_QUEUE_SIZE>;
/// Receiver side, owned by the mode control loop.
pub type ControlEventReceiver =
    embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, ControlEvent, CONTROL_EVENT_QUEUE_SIZE>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Queue one batch of channels for blacklisting.
    Blacklist(Vec<u32>),
    /// Queue one batch of channels for whitelisting.
    Whitelist(Vec<u32>),
    /// Select the traffic type (0 = inactive).
    Traffic(u8),
    CoexistenceRequested(bool),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlState {
    pub mac_mode: MacMode,
    /// Last requested traffic type, 0 = inactive.
    pub traffic_type: u8,
    pub coexistence_requested: bool,
    /// Channel batches awaiting blacklisting, cleared once applied.
    pub pending_blacklist: Vec<Vec<u32>>,
    /// Channel batches awaiting whitelisting, cleared once applied.
    pub pending_whitelist: Vec<Vec<u32>>,
}

impl ControlState {
    pub fn apply(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Blacklist(channels) => {
                self.pending_blacklist.push(channels);
                log::info!("BLACKLIST {:?}", self.pending_blacklist);
            }
            ControlEvent::Whitelist(channels) => {
                self.pending_whitelist.push(channels);
                log::info!("WHITELIST {:?}", self.pending_whitelist);
            }
            ControlEvent::Traffic(traffic_type) => {
                self.traffic_type = traffic_type;
                log::info!("Traffic type {}", traffic_type);
            }
            ControlEvent::CoexistenceRequested(enabled) => {
                self.coexistence_requested = enabled;
                log::info!("lte_wifi_coexistence {}", enabled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_batches_accumulate_in_order() {
        let mut state = ControlState::default();
        state.apply(ControlEvent::Blacklist(vec![15, 20, 25]));
        state.apply(ControlEvent::Blacklist(vec![11]));
        state.apply(ControlEvent::Whitelist(vec![26]));
        assert_eq!(state.pending_blacklist, vec![vec![15, 20, 25], vec![11]]);
        assert_eq!(state.pending_whitelist, vec![vec![26]]);
    }

    #[test]
    fn test_defaults() {
        let state = ControlState::default();
        assert_eq!(state.mac_mode, MacMode::Tsch);
        assert_eq!(state.traffic_type, 0);
        assert!(!state.coexistence_requested);
    }
}
