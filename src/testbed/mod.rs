//! External testbed managers.
//!
//! - `manager`: traits for the MAC and application managers the control loop drives
//! - `dry_run`: logging backend used when no radio testbed is attached

pub mod dry_run;
pub mod manager;

pub use dry_run::{DryRunTestbed, TestbedCall};
pub use manager::{AppManager, AppRole, MacManager, MacMode, MacStatsCallback, ManagerError, NodeId, ParameterMap};
