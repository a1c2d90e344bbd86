pub mod config;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{LatticeConfig, OutputConfig, OutputFormat, RunConfig, SimulationConfig, UpdateMode};
pub use sim_params::LatticeParams;
pub use snapshot::{Snapshot, SnapshotFile};
