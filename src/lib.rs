//! Stochastic cellular automaton of atrial fibrillation.
//!
//! A [`Lattice`] holds the excitation state of a `rows x cols` grid together
//! with its fixed structure (vertical coupling and defective cells). The
//! [`rule`] module computes one synchronous update of that grid, and a
//! [`Simulation`] drives repeated updates while recording how many interior
//! cells are excited after each step.

pub mod error;
pub mod lattice;
pub mod rule;
pub mod simulation;

pub use error::{LatticeError, Result};
pub use fibrillation_common::{LatticeParams, UpdateMode};
pub use lattice::{CellState, Direction, Lattice, Topology};
pub use simulation::Simulation;
