//! One synchronous update of the lattice.
//!
//! Every function here reads a frozen snapshot of the current state and writes
//! only into a separate next-state buffer, so no cell ever observes a value
//! produced earlier in the same step.

use crate::lattice::{CellState, Direction, Topology, EXCITED, RESTING};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Column forced into excitation on pacing steps.
pub const PACED_COLUMN: usize = 1;

/// Timing parameters of the transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleParams {
    pub refractory_period: u32,
    pub driving_period: u32,
}

impl RuleParams {
    /// Next value of a refractory cell; `refractory_period + 1` wraps to resting.
    #[inline(always)]
    pub fn advance_refractory(&self, value: CellState) -> CellState {
        ((value as u32 + 1) % (self.refractory_period + 2)) as CellState
    }

    #[inline(always)]
    pub fn is_pacing_step(&self, time_step: u64) -> bool {
        time_step % self.driving_period as u64 == 0
    }
}

/// Columns whose cells are updated by the rule and counted as activity.
#[inline(always)]
pub fn is_interior(col: usize, cols: usize) -> bool {
    col >= 1 && col + 1 < cols
}

/// Whether a conduction attempt into a cell with the given defect value succeeds.
/// Only defective cells consume a random draw.
#[inline(always)]
fn conducts<R: Rng + ?Sized>(defect: f64, rng: &mut R) -> bool {
    defect == 0.0 || rng.random::<f64>() < defect
}

/// Computes `next` from `current` using a single random stream.
///
/// Cells are visited in row-major order over the interior columns, and each
/// excited cell tries its neighbours east, west, south, north. Edge columns are
/// never advanced themselves but can still be excited by an interior neighbour.
pub fn transition<R: Rng + ?Sized>(
    topology: &Topology,
    rule: &RuleParams,
    current: &[CellState],
    next: &mut [CellState],
    time_step: u64,
    rng: &mut R,
) {
    debug_assert_eq!(current.len(), next.len());
    next.copy_from_slice(current);

    let cols = topology.cols();
    for r in 0..topology.rows() {
        for c in 1..cols - 1 {
            let idx = topology.index(r, c);
            let value = current[idx];

            if value == EXCITED {
                next[idx] += 1;
                for direction in Direction::FIRING_ORDER {
                    if !topology.is_connected(r, c, direction) {
                        continue;
                    }
                    let (nr, nc) = topology.neighbor(r, c, direction);
                    let n_idx = topology.index(nr, nc);
                    if current[n_idx] == RESTING && conducts(topology.defect(nr, nc), rng) {
                        next[n_idx] = EXCITED;
                    }
                }
            } else if value > EXCITED {
                next[idx] = rule.advance_refractory(value);
            }
        }
    }

    if rule.is_pacing_step(time_step) {
        pace(topology, next);
    }
}

/// Row-parallel version of [`transition`].
///
/// Each cell gathers the conduction attempts aimed at it instead of excited
/// cells scattering them, so every row of `next` is written by exactly one
/// task. Row `r` of step `t` draws from its own generator seeded from
/// `(seed, t, r)`. Identical to [`transition`] when no defect is ever
/// consulted, statistically equivalent otherwise.
pub fn transition_parallel(
    topology: &Topology,
    rule: &RuleParams,
    current: &[CellState],
    next: &mut [CellState],
    time_step: u64,
    seed: u64,
) {
    debug_assert_eq!(current.len(), next.len());
    let cols = topology.cols();

    next.par_chunks_mut(cols)
        .enumerate()
        .for_each(|(r, row_out)| {
            let mut rng = StdRng::seed_from_u64(row_seed(seed, time_step, r));
            for (c, out) in row_out.iter_mut().enumerate() {
                *out = gathered_value(topology, rule, current, r, c, &mut rng);
            }
        });

    if rule.is_pacing_step(time_step) {
        pace(topology, next);
    }
}

fn gathered_value<R: Rng + ?Sized>(
    topology: &Topology,
    rule: &RuleParams,
    current: &[CellState],
    r: usize,
    c: usize,
    rng: &mut R,
) -> CellState {
    let (rows, cols) = (topology.rows(), topology.cols());
    let value = current[topology.index(r, c)];

    if is_interior(c, cols) {
        if value == EXCITED {
            return value + 1;
        }
        if value > EXCITED {
            return rule.advance_refractory(value);
        }
    }
    if value != RESTING {
        return value;
    }

    // Each source paired with the link it would fire along to reach (r, c).
    let sources = [
        c.checked_sub(1).map(|sc| (r, sc, Direction::East)),
        (c + 1 < cols).then(|| (r, c + 1, Direction::West)),
        Some(((r + rows - 1) % rows, c, Direction::South)),
        Some(((r + 1) % rows, c, Direction::North)),
    ];

    let defect = topology.defect(r, c);
    for (sr, sc, link) in sources.into_iter().flatten() {
        if !is_interior(sc, cols)
            || current[topology.index(sr, sc)] != EXCITED
            || !topology.is_connected(sr, sc, link)
        {
            continue;
        }
        if conducts(defect, rng) {
            return EXCITED;
        }
    }
    RESTING
}

/// Mixes the run seed, step and row into a per-row generator seed.
fn row_seed(seed: u64, time_step: u64, row: usize) -> u64 {
    let mut z = seed
        ^ time_step.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (row as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Pacing stimulus: excites the whole paced column, overriding conduction.
pub fn pace(topology: &Topology, next: &mut [CellState]) {
    for r in 0..topology.rows() {
        next[topology.index(r, PACED_COLUMN)] = EXCITED;
    }
}

/// Number of excited cells in the interior columns `[1, cols - 2]`.
pub fn interior_activity(topology: &Topology, state: &[CellState]) -> u64 {
    let cols = topology.cols();
    state
        .chunks(cols)
        .map(|row| row[1..cols - 1].iter().filter(|&&v| v == EXCITED).count() as u64)
        .sum()
}
