use serde::{Deserialize, Serialize};

/// The lattice state and activity at a specific step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of completed update steps when the snapshot was taken.
    pub step: u64,
    /// Excited cells in the interior columns `[1, cols - 2]`.
    pub active_cells: u64,
    /// Row-major cell states. Only present when grids are being recorded.
    /// Never skipped when `None`: bincode is not self-describing.
    #[serde(default)]
    pub state: Option<Vec<u16>>,
}

/// Everything a downstream consumer needs to render a recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub row_size: usize,
    pub col_size: usize,
    pub refractory_period: u32,
    pub driving_period: u32,
    /// Full per-step activity history of the run, independent of the record interval.
    pub activity: Vec<u64>,
    pub snapshots: Vec<Snapshot>,
}

impl SnapshotFile {
    /// Number of snapshots that carry a full grid.
    pub fn frames_with_state(&self) -> usize {
        self.snapshots.iter().filter(|s| s.state.is_some()).count()
    }
}
