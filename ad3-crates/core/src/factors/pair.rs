use super::GenericFactor;

/// A pairwise interaction between two literals: the single additional variable is the
/// conjunction of both literals and carries the edge log-potential.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairFactor;

impl PairFactor {
    fn score(variable_scores: &[f64], additional_scores: &[f64], (first, second): (bool, bool)) -> f64 {
        let mut score = 0.0;
        if first {
            score += variable_scores[0];
        }
        if second {
            score += variable_scores[1];
        }
        if first && second {
            score += additional_scores[0];
        }
        score
    }
}

impl GenericFactor for PairFactor {
    type Configuration = (bool, bool);

    fn num_variables(&self) -> usize {
        2
    }

    fn num_additionals(&self) -> usize {
        1
    }

    fn maximize(&self, variable_scores: &[f64], additional_scores: &[f64]) -> ((bool, bool), f64) {
        [(false, false), (true, false), (false, true), (true, true)]
            .into_iter()
            .map(|configuration| {
                (
                    configuration,
                    PairFactor::score(variable_scores, additional_scores, configuration),
                )
            })
            .fold(((false, false), f64::NEG_INFINITY), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            })
    }

    fn evaluate(
        &self,
        variable_scores: &[f64],
        additional_scores: &[f64],
        configuration: &(bool, bool),
    ) -> f64 {
        PairFactor::score(variable_scores, additional_scores, *configuration)
    }

    fn add_posteriors(
        &self,
        &(first, second): &(bool, bool),
        weight: f64,
        variable_posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    ) {
        if first {
            variable_posteriors[0] += weight;
        }
        if second {
            variable_posteriors[1] += weight;
        }
        if first && second {
            additional_posteriors[0] += weight;
        }
    }

    fn active_variables(&self, &(first, second): &(bool, bool)) -> Vec<usize> {
        [first, second]
            .into_iter()
            .enumerate()
            .filter(|(_, value)| *value)
            .map(|(index, _)| index)
            .collect()
    }

    fn count_common_values(&self, first: &(bool, bool), second: &(bool, bool)) -> usize {
        usize::from(first.0 && second.0) + usize::from(first.1 && second.1)
    }

    fn configuration_from_assignment(&self, assignment: &[bool]) -> Option<(bool, bool)> {
        Some((assignment[0], assignment[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::ActiveSetFactor;

    #[test]
    fn attractive_edge_turns_both_literals_on() {
        let (configuration, value) = PairFactor.maximize(&[-0.5, -0.5], &[2.0]);

        assert_eq!(configuration, (true, true));
        assert_eq!(value, 1.0);
    }

    #[test]
    fn repulsive_edge_keeps_the_better_literal() {
        let (configuration, value) = PairFactor.maximize(&[1.0, 2.0], &[-5.0]);

        assert_eq!(configuration, (false, true));
        assert_eq!(value, 2.0);
    }

    #[test]
    fn projection_satisfies_the_local_marginal_constraints() {
        let mut factor = ActiveSetFactor::new(PairFactor);

        let solution = factor.solve_qp(&[0.6, 0.7], &[0.3]).expect("valid lengths");

        let [first, second] = [
            solution.variable_posteriors[0],
            solution.variable_posteriors[1],
        ];
        let edge = solution.additional_posteriors[0];
        assert!(edge <= first.min(second) + 1e-9);
        assert!(edge + 1e-9 >= first + second - 1.0);
        assert!((solution.distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
