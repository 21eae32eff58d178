//! Admin surface: the partition sensor, node
//! configuration, and tracing setup shared across a running node.

mod config;
mod logging;
mod partition;

pub use config::Config;
pub use logging::init_tracing;
pub use partition::PartitionSensor;
