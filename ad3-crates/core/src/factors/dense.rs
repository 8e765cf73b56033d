use itertools::Itertools;

use super::GenericFactor;

/// A factor over multi-state variables with one log-potential per joint state.
///
/// The variables of the factor are the states of its multi-state variables, in order; the
/// additional variables are the joint states, row-major with the last variable changing
/// fastest.
#[derive(Clone, Debug)]
pub struct DenseFactor {
    num_states: Box<[usize]>,
    /// The index of the first state of every multi-state variable.
    offsets: Box<[usize]>,
}

impl DenseFactor {
    pub fn new(num_states: Vec<usize>) -> Self {
        let offsets = num_states
            .iter()
            .scan(0, |offset, &states| {
                let current = *offset;
                *offset += states;
                Some(current)
            })
            .collect();

        DenseFactor {
            num_states: num_states.into(),
            offsets,
        }
    }

    pub fn num_joint_states(&self) -> usize {
        self.num_states.iter().product()
    }

    fn joint_index(&self, states: &[usize]) -> usize {
        states
            .iter()
            .zip(self.num_states.iter())
            .fold(0, |index, (&state, &num_states)| index * num_states + state)
    }
}

impl GenericFactor for DenseFactor {
    type Configuration = Vec<usize>;

    fn num_variables(&self) -> usize {
        self.num_states.iter().sum()
    }

    fn num_additionals(&self) -> usize {
        self.num_joint_states()
    }

    fn maximize(&self, variable_scores: &[f64], additional_scores: &[f64]) -> (Vec<usize>, f64) {
        let mut best = (vec![0; self.num_states.len()], f64::NEG_INFINITY);

        for states in self
            .num_states
            .iter()
            .map(|&num_states| 0..num_states)
            .multi_cartesian_product()
        {
            let score = self.evaluate(variable_scores, additional_scores, &states);
            if score > best.1 {
                best = (states, score);
            }
        }

        best
    }

    fn evaluate(
        &self,
        variable_scores: &[f64],
        additional_scores: &[f64],
        configuration: &Vec<usize>,
    ) -> f64 {
        configuration
            .iter()
            .zip(self.offsets.iter())
            .map(|(state, offset)| variable_scores[offset + state])
            .sum::<f64>()
            + additional_scores[self.joint_index(configuration)]
    }

    fn add_posteriors(
        &self,
        configuration: &Vec<usize>,
        weight: f64,
        variable_posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    ) {
        for (state, offset) in configuration.iter().zip(self.offsets.iter()) {
            variable_posteriors[offset + state] += weight;
        }
        additional_posteriors[self.joint_index(configuration)] += weight;
    }

    fn active_variables(&self, configuration: &Vec<usize>) -> Vec<usize> {
        configuration
            .iter()
            .zip(self.offsets.iter())
            .map(|(state, offset)| offset + state)
            .collect()
    }

    fn count_common_values(&self, first: &Vec<usize>, second: &Vec<usize>) -> usize {
        first
            .iter()
            .zip(second.iter())
            .filter(|(a, b)| a == b)
            .count()
    }

    fn configuration_from_assignment(&self, assignment: &[bool]) -> Option<Vec<usize>> {
        self.num_states
            .iter()
            .zip(self.offsets.iter())
            .map(|(&num_states, &offset)| {
                assignment[offset..offset + num_states]
                    .iter()
                    .positions(|value| *value)
                    .exactly_one()
                    .ok()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::*;
    use crate::factors::active_set::optimality_violation;
    use crate::factors::ActiveSetFactor;

    #[test]
    fn joint_states_are_row_major() {
        let factor = DenseFactor::new(vec![2, 3]);

        assert_eq!(factor.joint_index(&[0, 0]), 0);
        assert_eq!(factor.joint_index(&[0, 2]), 2);
        assert_eq!(factor.joint_index(&[1, 0]), 3);
        assert_eq!(factor.joint_index(&[1, 2]), 5);
        assert_eq!(factor.num_variables(), 5);
    }

    #[test]
    fn map_combines_unary_and_joint_scores() {
        let factor = DenseFactor::new(vec![2, 2]);
        let unaries = [1.0, 0.0, 0.0, 1.0];
        let joint = [0.0, 0.0, 0.0, 2.5];

        let (configuration, value) = factor.maximize(&unaries, &joint);

        assert_eq!(configuration, vec![1, 1]);
        assert_eq!(value, 3.5);
    }

    #[test]
    fn assignments_must_select_one_state_per_variable() {
        let factor = DenseFactor::new(vec![2, 3]);

        assert_eq!(
            factor.configuration_from_assignment(&[false, true, false, false, true]),
            Some(vec![1, 2])
        );
        assert_eq!(
            factor.configuration_from_assignment(&[true, true, false, false, true]),
            None
        );
        assert_eq!(
            factor.configuration_from_assignment(&[true, false, false, false, false]),
            None
        );
    }

    #[test]
    fn edge_marginals_are_consistent_with_the_state_marginals() {
        let mut factor = ActiveSetFactor::new(DenseFactor::new(vec![2, 2]));

        let solution = factor
            .solve_qp(&[0.4, 0.5, 0.6, 0.3], &[0.1, 0.0, 0.0, 0.2])
            .expect("valid lengths");

        let joint = &solution.additional_posteriors;
        let states = &solution.variable_posteriors;
        assert!((joint[0] + joint[1] - states[0]).abs() < 1e-9);
        assert!((joint[2] + joint[3] - states[1]).abs() < 1e-9);
        assert!((joint[0] + joint[2] - states[2]).abs() < 1e-9);
        assert!((joint.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn projection_is_optimal_when_the_candidate_is_affinely_dependent() {
        let mut factor = ActiveSetFactor::new(DenseFactor::new(vec![2, 2]));
        let unaries = [-0.363, -0.390, 0.924, 0.842];
        let joint = [-0.214, 0.544, 0.715, 0.845];

        let solution = factor.solve_qp(&unaries, &joint).expect("valid lengths");

        let violation = optimality_violation(factor.factor(), &unaries, &joint, &solution);
        assert!(violation <= 1e-6, "violation {violation} for {solution:?}");
    }

    #[test]
    fn projections_satisfy_the_optimality_conditions() {
        let mut rng = SmallRng::seed_from_u64(5);

        for num_states in [vec![2, 2], vec![2, 3]] {
            for _ in 0..200 {
                let mut factor = ActiveSetFactor::new(DenseFactor::new(num_states.clone()));
                let mut unaries = (0..factor.factor().num_variables())
                    .map(|_| rng.gen_range(-1.0..1.0))
                    .collect::<Vec<f64>>();
                let joint = (0..factor.factor().num_additionals())
                    .map(|_| rng.gen_range(-1.0..1.0))
                    .collect::<Vec<f64>>();

                // the second solve is warm-started from the active set of the first
                for _ in 0..2 {
                    let solution = factor.solve_qp(&unaries, &joint).expect("valid lengths");

                    let violation =
                        optimality_violation(factor.factor(), &unaries, &joint, &solution);
                    assert!(
                        violation <= 1e-6,
                        "violation {violation} for {num_states:?}, {unaries:?}, {joint:?}"
                    );

                    unaries
                        .iter_mut()
                        .for_each(|score| *score += rng.gen_range(-0.3..0.3));
                }
            }
        }
    }
}
