//! Startup inputs shared by the control and coexistence modules.

pub mod channel_map;
pub mod config;
pub mod error;
pub mod testbed;

pub use channel_map::ChannelMap;
pub use config::SolutionConfig;
pub use testbed::TestbedConfig;
