//! Control module coordinating this solution with the global solution controller.
//!
//! - `transport`: ZeroMQ DEALER/SUB sockets to the controller
//! - `envelope`: keyed envelope codec on top of the frames
//! - `command`: command names and JSON message bodies
//! - `dispatcher`: command name to handler mapping
//! - `client`: the controller proxy (registration, command listener, reports)

pub mod client;
pub mod command;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake_controller;

pub use client::{ControllerProxy, ReportSink, SolutionIdentity};
pub use command::SolutionCommand;
pub use dispatcher::{CommandDispatcher, HandlerError};
