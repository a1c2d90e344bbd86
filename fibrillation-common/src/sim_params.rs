use serde::{Deserialize, Serialize};

/// Lattice parameters resolved from the configuration, consumed by the engine at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeParams {
    // Grid
    pub row_size: usize,
    pub col_size: usize,

    // Dynamics
    pub refractory_period: u32,
    pub driving_period: Option<u32>, // None -> 2 * refractory_period

    // Structure
    pub prob_con: f64,      // Fraction of vertically connected cell pairs
    pub prob_def: f64,      // Fraction of defective cells
    pub prob_not_fire: f64, // Chance a defective cell fails to excite
}

impl LatticeParams {
    pub fn new(row_size: usize, col_size: usize, refractory_period: u32) -> Self {
        Self {
            row_size,
            col_size,
            refractory_period,
            ..Self::default()
        }
    }

    pub fn with_driving_period(mut self, driving_period: u32) -> Self {
        self.driving_period = Some(driving_period);
        self
    }

    pub fn with_probabilities(mut self, prob_con: f64, prob_def: f64, prob_not_fire: f64) -> Self {
        self.prob_con = prob_con;
        self.prob_def = prob_def;
        self.prob_not_fire = prob_not_fire;
        self
    }

    /// The pacing period, falling back to twice the refractory period when unset.
    pub fn resolved_driving_period(&self) -> u32 {
        self.driving_period
            .unwrap_or_else(|| self.refractory_period.saturating_mul(2))
    }
}

impl Default for LatticeParams {
    fn default() -> Self {
        Self {
            row_size: 100,
            col_size: 100,
            refractory_period: 100,
            driving_period: None,
            prob_con: 1.0,
            prob_def: 0.0,
            prob_not_fire: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driving_period_defaults_to_twice_refractory() {
        let params = LatticeParams::new(10, 10, 7);
        assert_eq!(params.resolved_driving_period(), 14);

        let params = params.with_driving_period(5);
        assert_eq!(params.resolved_driving_period(), 5);
    }
}
