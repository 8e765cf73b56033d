mod assignment;

use assignment::solve_assignment;

use super::GenericFactor;

/// A bipartite matching between `num_rows` rows and `num_columns` columns, over one binary
/// variable per (row, column) pair in row-major order.
///
/// Every element of the smaller side is matched: a permutation when the sides are equally
/// large, a partial matching of the larger side otherwise.
#[derive(Clone, Debug)]
pub struct MatchingFactor {
    num_rows: usize,
    num_columns: usize,
}

impl MatchingFactor {
    pub fn new(num_rows: usize, num_columns: usize) -> Self {
        MatchingFactor {
            num_rows,
            num_columns,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    fn index(&self, row: usize, column: usize) -> usize {
        row * self.num_columns + column
    }
}

impl GenericFactor for MatchingFactor {
    /// The matched column of every row.
    type Configuration = Vec<Option<usize>>;

    fn num_variables(&self) -> usize {
        self.num_rows * self.num_columns
    }

    fn num_additionals(&self) -> usize {
        0
    }

    fn maximize(
        &self,
        variable_scores: &[f64],
        _additional_scores: &[f64],
    ) -> (Vec<Option<usize>>, f64) {
        let mut configuration = vec![None; self.num_rows];

        if self.num_rows <= self.num_columns {
            let costs = variable_scores.iter().map(|score| -score).collect::<Vec<_>>();
            let columns = solve_assignment(&costs, self.num_rows, self.num_columns);
            for (row, column) in columns.into_iter().enumerate() {
                configuration[row] = Some(column);
            }
        } else {
            let transposed_costs = (0..self.num_columns)
                .flat_map(|column| {
                    (0..self.num_rows).map(move |row| (row, column))
                })
                .map(|(row, column)| -variable_scores[self.index(row, column)])
                .collect::<Vec<_>>();
            let rows = solve_assignment(&transposed_costs, self.num_columns, self.num_rows);
            for (column, row) in rows.into_iter().enumerate() {
                configuration[row] = Some(column);
            }
        }

        let value = self.evaluate(variable_scores, &[], &configuration);
        (configuration, value)
    }

    fn evaluate(
        &self,
        variable_scores: &[f64],
        _additional_scores: &[f64],
        configuration: &Vec<Option<usize>>,
    ) -> f64 {
        configuration
            .iter()
            .enumerate()
            .filter_map(|(row, column)| column.map(|column| variable_scores[self.index(row, column)]))
            .sum()
    }

    fn add_posteriors(
        &self,
        configuration: &Vec<Option<usize>>,
        weight: f64,
        variable_posteriors: &mut [f64],
        _additional_posteriors: &mut [f64],
    ) {
        for (row, column) in configuration.iter().enumerate() {
            if let Some(column) = column {
                variable_posteriors[self.index(row, *column)] += weight;
            }
        }
    }

    fn active_variables(&self, configuration: &Vec<Option<usize>>) -> Vec<usize> {
        configuration
            .iter()
            .enumerate()
            .filter_map(|(row, column)| column.map(|column| self.index(row, column)))
            .collect()
    }

    fn count_common_values(
        &self,
        first: &Vec<Option<usize>>,
        second: &Vec<Option<usize>>,
    ) -> usize {
        first
            .iter()
            .zip(second.iter())
            .filter(|(a, b)| a.is_some() && a == b)
            .count()
    }

    fn configuration_from_assignment(
        &self,
        assignment: &[bool],
    ) -> Option<Vec<Option<usize>>> {
        let mut configuration = vec![None; self.num_rows];
        let mut column_used = vec![false; self.num_columns];
        let mut num_matched = 0;

        for row in 0..self.num_rows {
            for column in 0..self.num_columns {
                if !assignment[self.index(row, column)] {
                    continue;
                }
                if configuration[row].is_some() || column_used[column] {
                    return None;
                }
                configuration[row] = Some(column);
                column_used[column] = true;
                num_matched += 1;
            }
        }

        (num_matched == self.num_rows.min(self.num_columns)).then_some(configuration)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rand::rngs::SmallRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::*;
    use crate::factors::ActiveSetFactor;

    fn best_by_enumeration(factor: &MatchingFactor, scores: &[f64]) -> f64 {
        let (rows, columns) = (factor.num_rows(), factor.num_columns());
        if rows <= columns {
            (0..columns)
                .permutations(rows)
                .map(|matched| {
                    matched
                        .iter()
                        .enumerate()
                        .map(|(row, &column)| scores[row * columns + column])
                        .sum::<f64>()
                })
                .fold(f64::NEG_INFINITY, f64::max)
        } else {
            (0..rows)
                .permutations(columns)
                .map(|matched| {
                    matched
                        .iter()
                        .enumerate()
                        .map(|(column, &row)| scores[row * columns + column])
                        .sum::<f64>()
                })
                .fold(f64::NEG_INFINITY, f64::max)
        }
    }

    #[test]
    fn map_is_the_optimal_matching() {
        let mut rng = SmallRng::seed_from_u64(3);

        for (rows, columns) in [(3, 3), (2, 4), (4, 2), (1, 3)] {
            let factor = MatchingFactor::new(rows, columns);
            let scores = (0..rows * columns)
                .map(|_| rng.gen_range(-1.0..1.0))
                .collect::<Vec<f64>>();

            let (configuration, value) = factor.maximize(&scores, &[]);

            assert!((value - best_by_enumeration(&factor, &scores)).abs() < 1e-9);
            let assignment = (0..rows * columns)
                .map(|index| factor.active_variables(&configuration).contains(&index))
                .collect::<Vec<_>>();
            assert_eq!(
                factor.configuration_from_assignment(&assignment),
                Some(configuration)
            );
        }
    }

    #[test]
    fn assignments_which_leave_the_smaller_side_unmatched_are_infeasible() {
        let factor = MatchingFactor::new(2, 3);

        assert!(factor
            .configuration_from_assignment(&[true, false, false, false, false, false])
            .is_none());
        assert!(factor
            .configuration_from_assignment(&[true, false, false, true, false, false])
            .is_none());
        assert!(factor
            .configuration_from_assignment(&[false, false, true, true, false, false])
            .is_some());
    }

    #[test]
    fn projection_is_doubly_stochastic() {
        let mut factor = ActiveSetFactor::new(MatchingFactor::new(3, 3));
        let scores = [0.9, 0.1, 0.4, 0.5, 0.8, 0.2, 0.3, 0.6, 0.7];

        let solution = factor.solve_qp(&scores, &[]).expect("valid lengths");

        for row in 0..3 {
            let total: f64 = solution.variable_posteriors[row * 3..row * 3 + 3].iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
        for column in 0..3 {
            let total: f64 = (0..3)
                .map(|row| solution.variable_posteriors[row * 3 + column])
                .sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }
}
