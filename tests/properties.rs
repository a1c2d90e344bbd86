use fibrillation_engine::rule::{self, RuleParams};
use fibrillation_engine::{Lattice, LatticeParams};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn params_strategy() -> impl Strategy<Value = LatticeParams> {
    (
        1usize..12,
        2usize..12,
        1u32..8,
        1u32..10,
        0.0f64..=1.0,
        0.0f64..=1.0,
        0.0f64..=1.0,
    )
        .prop_map(|(rows, cols, refractory, driving, con, def, not_fire)| {
            LatticeParams::new(rows, cols, refractory)
                .with_driving_period(driving)
                .with_probabilities(con, def, not_fire)
        })
}

proptest! {
    #[test]
    fn cell_values_stay_in_range(params in params_strategy(), seed in any::<u64>(), steps in 1usize..40) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut lattice = Lattice::new(&params, &mut rng).unwrap();
        prop_assert!(lattice.current_state().iter().all(|&v| v == 0));

        let max = params.refractory_period as u16 + 1;
        let rule = lattice.rule();
        let mut current = lattice.current_state().to_vec();
        let mut next = vec![0; current.len()];
        for t in 0..steps as u64 {
            rule::transition(lattice.topology(), &rule, &current, &mut next, t, &mut rng);
            prop_assert!(next.iter().all(|&v| v <= max));
            std::mem::swap(&mut current, &mut next);
        }

        // Seed a random pattern and check the parallel update too.
        for (i, v) in current.iter().enumerate() {
            lattice.set_cell(i / params.col_size, i % params.col_size, *v).unwrap();
        }
        rule::transition_parallel(lattice.topology(), &rule, lattice.current_state(), &mut next, steps as u64, seed);
        prop_assert!(next.iter().all(|&v| v <= max));
    }

    #[test]
    fn repeated_pacing_changes_nothing(params in params_strategy(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let lattice = Lattice::new(&params, &mut rng).unwrap();
        let rule = RuleParams { driving_period: 1, ..lattice.rule() };
        let mut next = vec![0; lattice.current_state().len()];
        rule::transition(lattice.topology(), &rule, lattice.current_state(), &mut next, 0, &mut rng);
        let once = next.clone();
        rule::pace(lattice.topology(), &mut next);
        prop_assert_eq!(once, next);
    }
}
