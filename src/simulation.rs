use crate::error::{LatticeError, Result};
use crate::lattice::{CellState, Lattice};
use crate::rule;
use fibrillation_common::{LatticeParams, SimulationConfig, UpdateMode};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Drives a [`Lattice`] through repeated updates and records the activity history.
pub struct Simulation {
    lattice: Lattice,
    /// Owned random stream used for construction and sequential updates.
    rng: StdRng,
    mode: UpdateMode,
    /// Base seed for the per-row streams of parallel updates.
    row_stream_seed: u64,
    /// Interior activity after each completed step, oldest first.
    activity: Vec<u64>,
}

impl Simulation {
    /// Builds a lattice from `params`, seeding the random stream from `seed`
    /// or from OS entropy when `seed` is `None`.
    pub fn new(params: &LatticeParams, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(params, rng)
    }

    /// Builds a lattice using an explicitly provided random stream.
    pub fn with_rng(params: &LatticeParams, mut rng: StdRng) -> Result<Self> {
        let lattice = Lattice::new(params, &mut rng)?;
        let row_stream_seed = rng.random();
        Ok(Self {
            lattice,
            rng,
            mode: UpdateMode::Sequential,
            row_stream_seed,
            activity: Vec::new(),
        })
    }

    /// Builds the simulation described by the [lattice] and [run] sections.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        let sim = Self::new(&config.get_lattice_params(), config.run.seed)?;
        Ok(sim.with_mode(config.run.mode))
    }

    pub fn with_mode(mut self, mode: UpdateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Mutable access for seeding patterns between runs.
    pub fn lattice_mut(&mut self) -> &mut Lattice {
        &mut self.lattice
    }

    pub fn current_state(&self) -> &[CellState] {
        self.lattice.current_state()
    }

    pub fn step_count(&self) -> u64 {
        self.lattice.step_count()
    }

    /// Interior activity after every step run so far.
    pub fn activity_history(&self) -> &[u64] {
        &self.activity
    }

    /// Advances the lattice by `num_steps` updates.
    pub fn run(&mut self, num_steps: u64) -> Result<()> {
        self.run_observed(num_steps, |_, _| {})
    }

    /// Like [`Simulation::run`], calling `observer` with the lattice and its
    /// interior activity after every completed step.
    pub fn run_observed<F>(&mut self, num_steps: u64, mut observer: F) -> Result<()>
    where
        F: FnMut(&Lattice, u64),
    {
        if num_steps == 0 {
            return Err(LatticeError::InvalidArgument(
                "number of steps must be positive, got 0".to_string(),
            ));
        }

        debug!(
            "Running {} steps from step {} ({:?} update).",
            num_steps,
            self.lattice.step_count(),
            self.mode
        );
        for _ in 0..num_steps {
            let active = self.step();
            observer(&self.lattice, active);
        }
        Ok(())
    }

    /// Performs one update using the cumulative step count as the time index,
    /// appends the resulting interior activity and returns it.
    pub fn step(&mut self) -> u64 {
        let time_step = self.lattice.step_count();
        let rule = self.lattice.rule();

        match self.mode {
            UpdateMode::Sequential => {
                let rng = &mut self.rng;
                self.lattice.advance(|topology, current, next| {
                    rule::transition(topology, &rule, current, next, time_step, rng)
                });
            }
            UpdateMode::Parallel => {
                let seed = self.row_stream_seed;
                self.lattice.advance(|topology, current, next| {
                    rule::transition_parallel(topology, &rule, current, next, time_step, seed)
                });
            }
        }

        let active = self.lattice.active_cells();
        self.activity.push(active);
        trace!("Step {} complete | Active cells: {}", time_step + 1, active);
        active
    }
}
