use super::GenericFactor;

/// A semi-Markov segmentation of a sequence of `length` positions.
///
/// There is one binary variable per interval `[start, end]`, ordered by start and then by end,
/// and a configuration is a set of non-overlapping active intervals (segments). Every interval
/// with `start >= 1` also has an additional transition variable, which is on when that segment
/// is active and directly follows another active segment ending at `start - 1`.
#[derive(Clone, Debug)]
pub struct SegmentationFactor {
    length: usize,
}

impl SegmentationFactor {
    pub fn new(length: usize) -> Self {
        SegmentationFactor { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// The number of intervals, `length * (length + 1) / 2`.
    pub fn num_intervals(length: usize) -> usize {
        length * (length + 1) / 2
    }

    /// The number of transitions, `length * (length - 1) / 2`.
    pub fn num_transitions(length: usize) -> usize {
        length * length.saturating_sub(1) / 2
    }

    /// The variable index of the interval `[start, end]`.
    pub fn interval_index(&self, start: usize, end: usize) -> usize {
        start * self.length - start * start.saturating_sub(1) / 2 + (end - start)
    }

    /// The additional index of the transition into `[start, end]`, for `start >= 1`.
    pub fn transition_index(&self, start: usize, end: usize) -> usize {
        self.interval_index(start, end) - self.length
    }

    fn intervals(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.length).flat_map(move |start| (start..self.length).map(move |end| (start, end)))
    }

    /// Calls `visit` with every segment and whether it directly follows the previous one.
    fn for_each_segment(
        configuration: &[(usize, usize)],
        mut visit: impl FnMut((usize, usize), bool),
    ) {
        let mut previous_end = None;
        for &(start, end) in configuration {
            let follows = start >= 1 && previous_end == Some(start - 1);
            visit((start, end), follows);
            previous_end = Some(end);
        }
    }
}

impl GenericFactor for SegmentationFactor {
    /// The active segments in increasing order.
    type Configuration = Vec<(usize, usize)>;

    fn num_variables(&self) -> usize {
        SegmentationFactor::num_intervals(self.length)
    }

    fn num_additionals(&self) -> usize {
        SegmentationFactor::num_transitions(self.length)
    }

    fn maximize(
        &self,
        variable_scores: &[f64],
        additional_scores: &[f64],
    ) -> (Vec<(usize, usize)>, f64) {
        let length = self.length;
        // best[position][closed]: the best score of the prefix [0, position), where `closed`
        // tells whether position - 1 ends an active segment
        let mut best = vec![[f64::NEG_INFINITY; 2]; length + 1];
        // the state and the segment (if any) the optimum of a state was reached from
        let mut backpointer = vec![[None::<(usize, usize, Option<usize>)>; 2]; length + 1];
        best[0][0] = 0.0;

        for position in 0..length {
            for closed in 0..2 {
                let score = best[position][closed];
                if score == f64::NEG_INFINITY {
                    continue;
                }

                if score > best[position + 1][0] {
                    best[position + 1][0] = score;
                    backpointer[position + 1][0] = Some((position, closed, None));
                }

                for end in position..length {
                    let mut candidate = score + variable_scores[self.interval_index(position, end)];
                    if closed == 1 && position >= 1 {
                        candidate += additional_scores[self.transition_index(position, end)];
                    }
                    if candidate > best[end + 1][1] {
                        best[end + 1][1] = candidate;
                        backpointer[end + 1][1] = Some((position, closed, Some(end)));
                    }
                }
            }
        }

        let mut closed = usize::from(best[length][1] > best[length][0]);
        let value = best[length][closed];

        let mut configuration = Vec::new();
        let mut position = length;
        while let Some((previous, previous_closed, end)) = backpointer[position][closed] {
            if let Some(end) = end {
                configuration.push((previous, end));
            }
            position = previous;
            closed = previous_closed;
        }
        configuration.reverse();

        (configuration, value)
    }

    fn evaluate(
        &self,
        variable_scores: &[f64],
        additional_scores: &[f64],
        configuration: &Vec<(usize, usize)>,
    ) -> f64 {
        let mut score = 0.0;
        SegmentationFactor::for_each_segment(configuration, |(start, end), follows| {
            score += variable_scores[self.interval_index(start, end)];
            if follows {
                score += additional_scores[self.transition_index(start, end)];
            }
        });
        score
    }

    fn add_posteriors(
        &self,
        configuration: &Vec<(usize, usize)>,
        weight: f64,
        variable_posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    ) {
        SegmentationFactor::for_each_segment(configuration, |(start, end), follows| {
            variable_posteriors[self.interval_index(start, end)] += weight;
            if follows {
                additional_posteriors[self.transition_index(start, end)] += weight;
            }
        });
    }

    fn active_variables(&self, configuration: &Vec<(usize, usize)>) -> Vec<usize> {
        configuration
            .iter()
            .map(|&(start, end)| self.interval_index(start, end))
            .collect()
    }

    fn configuration_from_assignment(
        &self,
        assignment: &[bool],
    ) -> Option<Vec<(usize, usize)>> {
        let configuration = self
            .intervals()
            .filter(|&(start, end)| assignment[self.interval_index(start, end)])
            .collect::<Vec<_>>();

        configuration
            .windows(2)
            .all(|pair| pair[1].0 > pair[0].1)
            .then_some(configuration)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rand::rngs::SmallRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::*;
    use crate::factors::active_set::optimality_violation;
    use crate::factors::ActiveSetFactor;

    #[test]
    fn intervals_are_indexed_start_major() {
        let factor = SegmentationFactor::new(3);

        let indices = factor
            .intervals()
            .map(|(start, end)| factor.interval_index(start, end))
            .collect::<Vec<_>>();

        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(factor.transition_index(1, 1), 0);
        assert_eq!(factor.transition_index(2, 2), 2);
        assert_eq!(factor.num_additionals(), 3);
    }

    #[test]
    fn map_matches_enumeration() {
        let mut rng = SmallRng::seed_from_u64(11);

        for length in 1..=5 {
            let factor = SegmentationFactor::new(length);
            let intervals = factor.intervals().collect::<Vec<_>>();

            for _ in 0..10 {
                let unary = (0..factor.num_variables())
                    .map(|_| rng.gen_range(-1.0..1.0))
                    .collect::<Vec<f64>>();
                let transitions = (0..factor.num_additionals())
                    .map(|_| rng.gen_range(-1.0..1.0))
                    .collect::<Vec<f64>>();

                let expected = intervals
                    .iter()
                    .copied()
                    .powerset()
                    .filter(|segments| segments.windows(2).all(|pair| pair[1].0 > pair[0].1))
                    .map(|segments| factor.evaluate(&unary, &transitions, &segments))
                    .fold(f64::NEG_INFINITY, f64::max);

                let (configuration, value) = factor.maximize(&unary, &transitions);

                assert!((value - expected).abs() < 1e-9, "length {length}");
                assert!(
                    (factor.evaluate(&unary, &transitions, &configuration) - value).abs() < 1e-9
                );
            }
        }
    }

    #[test]
    fn transitions_are_only_counted_for_adjacent_segments() {
        let factor = SegmentationFactor::new(4);
        let mut variables = vec![0.0; factor.num_variables()];
        let mut transitions = vec![0.0; factor.num_additionals()];

        factor.add_posteriors(&vec![(0, 1), (2, 2)], 1.0, &mut variables, &mut transitions);
        assert_eq!(transitions[factor.transition_index(2, 2)], 1.0);

        transitions.iter_mut().for_each(|value| *value = 0.0);
        factor.add_posteriors(&vec![(0, 0), (2, 3)], 1.0, &mut variables, &mut transitions);
        assert!(transitions.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn warm_started_solutions_are_distributions() {
        let mut factor = ActiveSetFactor::new(SegmentationFactor::new(3));
        let transitions = [0.1, -0.2, 0.05];

        let first = factor
            .solve_qp(&[0.3, -0.1, 0.2, 0.4, 0.0, 0.6], &transitions)
            .expect("valid lengths");
        let second = factor
            .solve_qp(&[0.35, -0.1, 0.2, 0.4, 0.0, 0.55], &transitions)
            .expect("valid lengths");

        for solution in [first, second] {
            assert!((solution.distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(solution.variable_posteriors.iter().all(|value| (-1e-9..=1.0 + 1e-9).contains(value)));
            // positions are covered at most once
            let coverage = solution.variable_posteriors[0]
                + solution.variable_posteriors[1]
                + solution.variable_posteriors[2];
            assert!(coverage <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn projections_satisfy_the_optimality_conditions() {
        let mut rng = SmallRng::seed_from_u64(23);

        for length in 3..=5 {
            for _ in 0..40 {
                let mut factor = ActiveSetFactor::new(SegmentationFactor::new(length));
                let mut unary = (0..factor.factor().num_variables())
                    .map(|_| rng.gen_range(-1.0..1.0))
                    .collect::<Vec<f64>>();
                let transitions = (0..factor.factor().num_additionals())
                    .map(|_| rng.gen_range(-1.0..1.0))
                    .collect::<Vec<f64>>();

                for _ in 0..2 {
                    let solution = factor
                        .solve_qp(&unary, &transitions)
                        .expect("valid lengths");

                    let violation =
                        optimality_violation(factor.factor(), &unary, &transitions, &solution);
                    assert!(violation <= 1e-6, "length {length}: violation {violation}");

                    unary
                        .iter_mut()
                        .for_each(|score| *score += rng.gen_range(-0.3..0.3));
                }
            }
        }
    }
}
