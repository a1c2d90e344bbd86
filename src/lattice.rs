use crate::error::{LatticeError, Result};
use crate::rule::{self, RuleParams};
use fibrillation_common::LatticeParams;
use log::debug;
use rand::distr::{Bernoulli, Distribution};
use rand::Rng;
use std::fmt;

/// Excitation state of a single cell.
///
/// `0` is resting, `1` excited, and `2..=refractory_period + 1` refractory.
pub type CellState = u16;

pub const RESTING: CellState = 0;
pub const EXCITED: CellState = 1;

/// Coupling directions, in the order the connectivity mask stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    /// Order in which an excited cell attempts to excite its neighbours.
    /// Only matters for which random draw goes to which neighbour.
    pub const FIRING_ORDER: [Direction; 4] =
        [Direction::East, Direction::West, Direction::South, Direction::North];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Structural data fixed at construction: connectivity mask and defect map.
#[derive(Debug, Clone)]
pub struct Topology {
    rows: usize,
    cols: usize,
    connections: Vec<[bool; 4]>,
    defects: Vec<f64>,
}

impl Topology {
    fn sample<R: Rng + ?Sized>(params: &LatticeParams, rng: &mut R) -> Result<Self> {
        let (rows, cols) = (params.row_size, params.col_size);
        let num_cells = rows * cols;

        let vertical = Bernoulli::new(params.prob_con)
            .map_err(|e| LatticeError::InvalidConfiguration(format!("prob_con: {}", e)))?;
        let defective = Bernoulli::new(params.prob_def)
            .map_err(|e| LatticeError::InvalidConfiguration(format!("prob_def: {}", e)))?;

        // East and west are always coupled; north and south independently.
        let connections: Vec<[bool; 4]> = (0..num_cells)
            .map(|_| {
                let north = vertical.sample(rng);
                let south = vertical.sample(rng);
                [north, true, south, true]
            })
            .collect();

        let fire_probability = 1.0 - params.prob_not_fire;
        let defects: Vec<f64> = (0..num_cells)
            .map(|_| if defective.sample(rng) { fire_probability } else { 0.0 })
            .collect();

        Ok(Self { rows, cols, connections, defects })
    }

    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline(always)]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row-major index of `(row, col)`.
    #[inline(always)]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn connections(&self, row: usize, col: usize) -> [bool; 4] {
        self.connections[self.index(row, col)]
    }

    #[inline(always)]
    pub fn is_connected(&self, row: usize, col: usize, direction: Direction) -> bool {
        self.connections[self.index(row, col)][direction.index()]
    }

    /// Probability that conduction into `(row, col)` succeeds; `0.0` means it always does.
    #[inline(always)]
    pub fn defect(&self, row: usize, col: usize) -> f64 {
        self.defects[self.index(row, col)]
    }

    /// Coordinates of the neighbour of `(row, col)` in `direction`.
    ///
    /// Rows wrap in both directions: north of row 0 is the last row and south
    /// of the last row is row 0. Columns do not wrap, so east and west are only
    /// defined for interior columns.
    #[inline(always)]
    pub fn neighbor(&self, row: usize, col: usize, direction: Direction) -> (usize, usize) {
        match direction {
            Direction::North => ((row + self.rows - 1) % self.rows, col),
            Direction::South => ((row + 1) % self.rows, col),
            Direction::East => {
                debug_assert!(col + 1 < self.cols, "no east neighbour for column {}", col);
                (row, col + 1)
            }
            Direction::West => {
                debug_assert!(col > 0, "no west neighbour for column 0");
                (row, col - 1)
            }
        }
    }

    /// Fraction of cells coupled to their northern neighbour.
    pub fn vertical_coupling_fraction(&self) -> f64 {
        if self.connections.is_empty() {
            return 0.0;
        }
        let coupled = self
            .connections
            .iter()
            .filter(|c| c[Direction::North.index()])
            .count();
        coupled as f64 / self.connections.len() as f64
    }

    pub fn defect_count(&self) -> usize {
        self.defects.iter().filter(|&&d| d != 0.0).count()
    }
}

/// The cellular automaton grid: current state, scratch buffer for the next
/// state, the fixed structure, and the number of completed steps.
#[derive(Debug, Clone)]
pub struct Lattice {
    params: LatticeParams,
    rule: RuleParams,
    topology: Topology,

    // --- Ping-pong buffers: `state` is read during a step, `scratch` written ---
    state: Vec<CellState>,
    scratch: Vec<CellState>,

    steps: u64,
}

impl Lattice {
    /// Validates `params` and builds a resting lattice with randomly sampled structure.
    pub fn new<R: Rng + ?Sized>(params: &LatticeParams, rng: &mut R) -> Result<Self> {
        let rule = validate(params)?;
        let topology = Topology::sample(params, rng)?;
        let num_cells = params.row_size * params.col_size;

        debug!(
            "Sampled lattice structure: vertical coupling {:.4} (target {:.4}), {} defective cells.",
            topology.vertical_coupling_fraction(),
            params.prob_con,
            topology.defect_count()
        );

        let mut params = params.clone();
        params.driving_period = Some(rule.driving_period);

        Ok(Self {
            params,
            rule,
            topology,
            state: vec![RESTING; num_cells],
            scratch: vec![RESTING; num_cells],
            steps: 0,
        })
    }

    /// Parameters the lattice was built from, with the driving period resolved.
    pub fn params(&self) -> &LatticeParams {
        &self.params
    }

    pub fn rule(&self) -> RuleParams {
        self.rule
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn rows(&self) -> usize {
        self.topology.rows
    }

    pub fn cols(&self) -> usize {
        self.topology.cols
    }

    pub fn refractory_period(&self) -> u32 {
        self.rule.refractory_period
    }

    pub fn driving_period(&self) -> u32 {
        self.rule.driving_period
    }

    /// Row-major view of the current state.
    pub fn current_state(&self) -> &[CellState] {
        &self.state
    }

    /// The current state split into rows.
    pub fn state_rows(&self) -> impl Iterator<Item = &[CellState]> + '_ {
        self.state.chunks(self.topology.cols)
    }

    pub fn cell(&self, row: usize, col: usize) -> CellState {
        self.state[self.topology.index(row, col)]
    }

    pub fn connections(&self, row: usize, col: usize) -> [bool; 4] {
        self.topology.connections(row, col)
    }

    pub fn defect(&self, row: usize, col: usize) -> f64 {
        self.topology.defect(row, col)
    }

    /// Number of completed update steps.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Excited cells in the interior columns of the current state.
    pub fn active_cells(&self) -> u64 {
        rule::interior_activity(&self.topology, &self.state)
    }

    /// Overwrites one cell of the current state, e.g. to seed a pattern before a run.
    pub fn set_cell(&mut self, row: usize, col: usize, value: CellState) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(LatticeError::InvalidArgument(format!(
                "cell ({}, {}) is outside the {}x{} lattice",
                row,
                col,
                self.rows(),
                self.cols()
            )));
        }
        if value as u32 > self.rule.refractory_period + 1 {
            return Err(LatticeError::InvalidArgument(format!(
                "cell value {} exceeds refractory_period + 1 = {}",
                value,
                self.rule.refractory_period + 1
            )));
        }
        let idx = self.topology.index(row, col);
        self.state[idx] = value;
        Ok(())
    }

    /// Runs `update` from the frozen current state into the scratch buffer,
    /// then makes the scratch buffer current.
    pub(crate) fn advance<F>(&mut self, update: F)
    where
        F: FnOnce(&Topology, &[CellState], &mut [CellState]),
    {
        update(&self.topology, &self.state, &mut self.scratch);
        self.swap_buffers();
        self.steps += 1;
    }

    /// Swaps the current and scratch buffers.
    fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.state, &mut self.scratch);
    }
}

impl fmt::Display for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lattice(row_size={}, col_size={}, refractory_period={}, driving_period={})",
            self.rows(),
            self.cols(),
            self.refractory_period(),
            self.driving_period()
        )
    }
}

fn validate(params: &LatticeParams) -> Result<RuleParams> {
    let invalid = |msg: String| Err(LatticeError::InvalidConfiguration(msg));

    if params.row_size == 0 {
        return invalid("row_size must be at least 1".to_string());
    }
    if params.col_size < 2 {
        return invalid(format!("col_size must be at least 2, got {}", params.col_size));
    }
    if params.refractory_period < 1 {
        return invalid("refractory_period must be at least 1".to_string());
    }
    // The largest refractory value, refractory_period + 1, has to fit in a cell.
    if params.refractory_period >= CellState::MAX as u32 {
        return invalid(format!(
            "refractory_period must be below {}, got {}",
            CellState::MAX,
            params.refractory_period
        ));
    }
    for (name, p) in [
        ("prob_con", params.prob_con),
        ("prob_def", params.prob_def),
        ("prob_not_fire", params.prob_not_fire),
    ] {
        if !(0.0..=1.0).contains(&p) {
            return invalid(format!("{} must lie in [0, 1], got {}", name, p));
        }
    }

    let driving_period = params.resolved_driving_period();
    if driving_period == 0 {
        return invalid("driving_period must be at least 1".to_string());
    }

    Ok(RuleParams {
        refractory_period: params.refractory_period,
        driving_period,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reference_params() -> LatticeParams {
        LatticeParams::new(200, 200, 50)
            .with_driving_period(220)
            .with_probabilities(0.09, 0.05, 0.05)
    }

    #[test]
    fn initial_state_is_resting() {
        let mut rng = StdRng::seed_from_u64(1);
        let lattice = Lattice::new(&reference_params(), &mut rng).unwrap();
        assert_eq!(lattice.current_state().len(), 200 * 200);
        assert!(lattice.current_state().iter().all(|&v| v == RESTING));
        assert_eq!(lattice.state_rows().count(), 200);
        assert!(lattice.state_rows().all(|row| row.len() == 200));
        assert_eq!(lattice.step_count(), 0);
    }

    #[test]
    fn horizontal_coupling_is_always_present() {
        let mut rng = StdRng::seed_from_u64(2);
        let params = LatticeParams::new(30, 40, 5).with_probabilities(0.0, 0.0, 0.05);
        let lattice = Lattice::new(&params, &mut rng).unwrap();
        for r in 0..30 {
            for c in 0..40 {
                let conn = lattice.connections(r, c);
                assert!(conn[Direction::East.index()] && conn[Direction::West.index()]);
                assert!(!conn[Direction::North.index()] && !conn[Direction::South.index()]);
            }
        }
    }

    #[test]
    fn vertical_coupling_fraction_tracks_prob_con() {
        let mut rng = StdRng::seed_from_u64(3);
        let lattice = Lattice::new(&reference_params(), &mut rng).unwrap();
        let fraction = lattice.topology().vertical_coupling_fraction();
        // 40 000 samples: standard error is about 0.0014.
        assert!((fraction - 0.09).abs() < 0.01, "vertical coupling fraction {}", fraction);

        let south = (0..200)
            .flat_map(|r| (0..200).map(move |c| (r, c)))
            .filter(|&(r, c)| lattice.connections(r, c)[Direction::South.index()])
            .count() as f64
            / 40_000.0;
        assert!((south - 0.09).abs() < 0.01, "south coupling fraction {}", south);
    }

    #[test]
    fn defects_carry_fire_probability() {
        let mut rng = StdRng::seed_from_u64(4);
        let params = LatticeParams::new(100, 100, 10).with_probabilities(1.0, 0.2, 0.25);
        let lattice = Lattice::new(&params, &mut rng).unwrap();
        let topology = lattice.topology();
        for r in 0..100 {
            for c in 0..100 {
                let d = topology.defect(r, c);
                assert!(d == 0.0 || d == 0.75, "unexpected defect value {}", d);
            }
        }
        let fraction = topology.defect_count() as f64 / 10_000.0;
        assert!((fraction - 0.2).abs() < 0.02, "defect fraction {}", fraction);
    }

    #[test]
    fn driving_period_is_resolved() {
        let mut rng = StdRng::seed_from_u64(5);
        let lattice = Lattice::new(&LatticeParams::new(4, 4, 3), &mut rng).unwrap();
        assert_eq!(lattice.driving_period(), 6);
        assert_eq!(lattice.params().driving_period, Some(6));
        assert_eq!(
            lattice.to_string(),
            "Lattice(row_size=4, col_size=4, refractory_period=3, driving_period=6)"
        );
    }

    #[test]
    fn rejects_invalid_configurations() {
        let mut rng = StdRng::seed_from_u64(6);
        let base = LatticeParams::new(10, 10, 3);
        let cases = [
            LatticeParams { row_size: 0, ..base.clone() },
            LatticeParams { col_size: 1, ..base.clone() },
            LatticeParams { refractory_period: 0, ..base.clone() },
            LatticeParams { refractory_period: 70_000, ..base.clone() },
            LatticeParams { driving_period: Some(0), ..base.clone() },
            base.clone().with_probabilities(1.5, 0.0, 0.05),
            base.clone().with_probabilities(1.0, -0.1, 0.05),
            base.clone().with_probabilities(1.0, 0.0, f64::NAN),
        ];
        for params in cases {
            match Lattice::new(&params, &mut rng) {
                Err(LatticeError::InvalidConfiguration(_)) => {}
                other => panic!("expected InvalidConfiguration for {:?}, got {:?}", params, other),
            }
        }
    }

    #[test]
    fn smallest_lattice_is_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        let lattice = Lattice::new(&LatticeParams::new(1, 2, 1), &mut rng).unwrap();
        assert_eq!(lattice.current_state(), &[0, 0]);
    }

    #[test]
    fn north_of_first_row_is_last_row() {
        let mut rng = StdRng::seed_from_u64(8);
        let lattice = Lattice::new(&LatticeParams::new(6, 5, 2), &mut rng).unwrap();
        let topology = lattice.topology();
        assert_eq!(topology.neighbor(0, 2, Direction::North), (5, 2));
        assert_eq!(topology.neighbor(5, 2, Direction::South), (0, 2));
        assert_eq!(topology.neighbor(3, 2, Direction::North), (2, 2));
        assert_eq!(topology.neighbor(3, 2, Direction::East), (3, 3));
        assert_eq!(topology.neighbor(3, 2, Direction::West), (3, 1));
    }

    #[test]
    fn set_cell_checks_bounds_and_range() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut lattice = Lattice::new(&LatticeParams::new(3, 3, 2), &mut rng).unwrap();
        lattice.set_cell(1, 1, 3).unwrap();
        assert_eq!(lattice.cell(1, 1), 3);
        assert!(matches!(lattice.set_cell(1, 1, 4), Err(LatticeError::InvalidArgument(_))));
        assert!(matches!(lattice.set_cell(3, 0, 1), Err(LatticeError::InvalidArgument(_))));
        assert_eq!(lattice.cell(1, 1), 3);
    }
}
