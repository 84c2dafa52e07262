//! TSCH / LTE coexistence control.
//!
//! - `types`: control state and the bounded event queue feeding it
//! - `handlers`: command handlers posting control events
//! - `mode_loop`: the fixed-interval loop driving the testbed managers

pub mod handlers;
pub mod mode_loop;
pub mod types;

pub use handlers::bind_commands;
pub use mode_loop::ModeControlLoop;
pub use types::ControlEventQueue;
