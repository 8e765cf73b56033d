//! The active-set solver for the proximal subproblem of factors which only provide a MAP oracle.
//!
//! For a factor with configurations `c`, each with a binary variable vector `v_c` and a score
//! `s_c = a . v_c + b . r_c`, the subproblem
//!
//! ```text
//! maximise  b . r - 1/2 |q - a|^2   over (q, r) in the marginal polytope
//! ```
//!
//! is solved as a quadratic program over a distribution `alpha` on a small set of active
//! configurations: `max s . alpha - 1/2 alpha^T M alpha` subject to `sum(alpha) = 1` and
//! `alpha >= 0`, with `M_cd = v_c . v_d`. The inverse of the bordered KKT matrix
//! `[[0, 1^T], [1, M]]` is cached and updated by rank-one bordering when a configuration enters
//! the active set and by the Schur complement downdate when one leaves it.

use std::fmt::Debug;

use log::trace;

use super::Subproblem;
use crate::ad3_assert_advanced;
use crate::ad3_assert_moderate;
use crate::basic_types::ConstructionError;

/// The number of active-set iterations used by [`ActiveSetFactor::solve_qp`].
const DIRECT_SOLVE_ITERATION_LIMIT: usize = 1000;
/// A new configuration is only added when it improves the objective by more than this.
const OPTIMALITY_TOLERANCE: f64 = 1e-9;
/// Pivots smaller than this are treated as singular.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// A factor which is described by its configurations and a MAP oracle over them.
///
/// The proximal subproblem of such a factor is solved by [`ActiveSetFactor`].
pub trait GenericFactor {
    type Configuration: Clone + PartialEq + Debug;

    /// The number of binary variables the factor is declared over.
    fn num_variables(&self) -> usize;

    /// The number of additional (edge) variables of the factor.
    fn num_additionals(&self) -> usize;

    /// Returns the configuration maximising `variable_scores . v_c + additional_scores . r_c`
    /// together with that score.
    fn maximize(
        &self,
        variable_scores: &[f64],
        additional_scores: &[f64],
    ) -> (Self::Configuration, f64);

    /// Returns the score of `configuration`.
    fn evaluate(
        &self,
        variable_scores: &[f64],
        additional_scores: &[f64],
        configuration: &Self::Configuration,
    ) -> f64;

    /// Adds `weight` times the variable and additional indicator vectors of `configuration` to
    /// the posteriors.
    fn add_posteriors(
        &self,
        configuration: &Self::Configuration,
        weight: f64,
        variable_posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    );

    /// The indices of the variables which are true in `configuration`, in increasing order.
    fn active_variables(&self, configuration: &Self::Configuration) -> Vec<usize>;

    /// The number of variables which are true in both configurations.
    fn count_common_values(
        &self,
        first: &Self::Configuration,
        second: &Self::Configuration,
    ) -> usize {
        let first = self.active_variables(first);
        let second = self.active_variables(second);

        let mut count = 0;
        let (mut i, mut j) = (0, 0);
        while i < first.len() && j < second.len() {
            match first[i].cmp(&second[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    count += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        count
    }

    /// Returns the configuration corresponding to a 0/1 assignment of the variables, or `None`
    /// if the assignment is infeasible for the factor.
    fn configuration_from_assignment(&self, assignment: &[bool]) -> Option<Self::Configuration>;
}

/// The warm-start state of the active-set solver.
///
/// `inverse` is the row-major inverse of the `(k + 1) x (k + 1)` bordered matrix
/// `[[0, 1^T], [1, M]]` for the `k` active configurations.
#[derive(Clone, Debug)]
pub struct ActiveSetCache<Configuration> {
    active_set: Vec<Configuration>,
    distribution: Vec<f64>,
    inverse: Vec<f64>,
}

impl<Configuration> Default for ActiveSetCache<Configuration> {
    fn default() -> Self {
        ActiveSetCache {
            active_set: Vec::default(),
            distribution: Vec::default(),
            inverse: Vec::default(),
        }
    }
}

impl<Configuration: Clone + PartialEq + Debug> ActiveSetCache<Configuration> {
    pub fn active_set(&self) -> &[Configuration] {
        &self.active_set
    }

    pub fn distribution(&self) -> &[f64] {
        &self.distribution
    }

    pub fn inverse(&self) -> &[f64] {
        &self.inverse
    }

    pub fn is_empty(&self) -> bool {
        self.active_set.is_empty()
    }

    pub fn clear(&mut self) {
        self.active_set.clear();
        self.distribution.clear();
        self.inverse.clear();
    }

    fn dimension(&self) -> usize {
        self.active_set.len() + 1
    }

    fn reset_to<F: GenericFactor<Configuration = Configuration>>(
        &mut self,
        factor: &F,
        configuration: Configuration,
    ) {
        let size = factor.count_common_values(&configuration, &configuration) as f64;

        self.active_set = vec![configuration];
        self.distribution = vec![1.0];
        self.inverse = vec![-size, 1.0, 1.0, 0.0];
    }

    /// Solves the equality constrained KKT system, returning the multiplier of the simplex
    /// constraint and the unconstrained optimal distribution.
    fn solve_kkt(&self, scores: &[f64]) -> (f64, Vec<f64>) {
        let dimension = self.dimension();
        let mut solution = vec![0.0; dimension];
        for (row, value) in solution.iter_mut().enumerate() {
            let row_start = row * dimension;
            *value = self.inverse[row_start]
                + scores
                    .iter()
                    .enumerate()
                    .map(|(column, score)| self.inverse[row_start + column + 1] * score)
                    .sum::<f64>();
        }

        let tau = solution[0];
        let _ = solution.remove(0);
        (tau, solution)
    }

    /// Adds `configuration` to the active set with weight zero. If the bordered matrix would
    /// become singular nothing changes and the affine coefficients of `configuration` in terms
    /// of the active configurations are returned instead.
    fn insert<F: GenericFactor<Configuration = Configuration>>(
        &mut self,
        factor: &F,
        configuration: Configuration,
    ) -> Insertion {
        let dimension = self.dimension();

        let mut border = Vec::with_capacity(dimension);
        border.push(1.0);
        border.extend(
            self.active_set
                .iter()
                .map(|active| factor.count_common_values(&configuration, active) as f64),
        );
        let diagonal = factor.count_common_values(&configuration, &configuration) as f64;

        let product = (0..dimension)
            .map(|row| {
                (0..dimension)
                    .map(|column| self.inverse[row * dimension + column] * border[column])
                    .sum::<f64>()
            })
            .collect::<Vec<_>>();
        let schur = diagonal
            - border
                .iter()
                .zip(product.iter())
                .map(|(a, b)| a * b)
                .sum::<f64>();

        if schur.abs() < PIVOT_TOLERANCE {
            trace!("configuration {configuration:?} is affinely dependent on the active set");
            // The column `[1; m]` is in the range of the bordered matrix, so the tail of its
            // preimage expresses the configuration in terms of the active ones.
            return Insertion::Dependent(product[1..].to_vec());
        }

        let new_dimension = dimension + 1;
        let mut inverse = vec![0.0; new_dimension * new_dimension];
        for row in 0..dimension {
            for column in 0..dimension {
                inverse[row * new_dimension + column] = self.inverse[row * dimension + column]
                    + product[row] * product[column] / schur;
            }
            inverse[row * new_dimension + dimension] = -product[row] / schur;
            inverse[dimension * new_dimension + row] = -product[row] / schur;
        }
        inverse[dimension * new_dimension + dimension] = 1.0 / schur;

        self.inverse = inverse;
        self.active_set.push(configuration);
        self.distribution.push(0.0);
        Insertion::Inserted
    }

    /// Brings an affinely dependent `configuration` into the active set by moving weight onto
    /// it along `coefficients` until an active configuration reaches zero weight, which is then
    /// dropped. The averaged marginals are unchanged. Returns `false` if no exchange is
    /// possible.
    fn exchange<F: GenericFactor<Configuration = Configuration>>(
        &mut self,
        factor: &F,
        configuration: Configuration,
        coefficients: &[f64],
    ) -> bool {
        ad3_assert_moderate!(
            (coefficients.iter().sum::<f64>() - 1.0).abs() < 1e-6,
            "affine coefficients must sum to one"
        );

        let Some((blocking_index, step)) = coefficients
            .iter()
            .zip(self.distribution.iter())
            .enumerate()
            .filter(|(_, (coefficient, _))| **coefficient > PIVOT_TOLERANCE)
            .map(|(index, (coefficient, weight))| (index, weight / coefficient))
            .min_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return false;
        };

        for (weight, coefficient) in self.distribution.iter_mut().zip(coefficients) {
            *weight = (*weight - step * coefficient).max(0.0);
        }
        self.distribution[blocking_index] = 0.0;
        self.remove(factor, blocking_index);

        let inserted = matches!(self.insert(factor, configuration), Insertion::Inserted);
        if inserted {
            if let Some(weight) = self.distribution.last_mut() {
                *weight = step;
            }
        }
        self.normalise_distribution();
        inserted
    }

    /// Removes the configuration at `index` from the active set.
    fn remove<F: GenericFactor<Configuration = Configuration>>(&mut self, factor: &F, index: usize) {
        let dimension = self.dimension();
        let pivot_index = index + 1;
        let pivot = self.inverse[pivot_index * dimension + pivot_index];

        let _ = self.active_set.remove(index);
        let _ = self.distribution.remove(index);

        if pivot.abs() < PIVOT_TOLERANCE {
            trace!("rebuilding the active set inverse after a singular downdate");
            self.rebuild(factor);
            return;
        }

        let mut inverse = Vec::with_capacity((dimension - 1) * (dimension - 1));
        for row in (0..dimension).filter(|row| *row != pivot_index) {
            for column in (0..dimension).filter(|column| *column != pivot_index) {
                inverse.push(
                    self.inverse[row * dimension + column]
                        - self.inverse[row * dimension + pivot_index]
                            * self.inverse[pivot_index * dimension + column]
                            / pivot,
                );
            }
        }
        self.inverse = inverse;
    }

    /// Recomputes the inverse from scratch; if the bordered matrix is singular only the
    /// configuration with the largest weight is kept.
    fn rebuild<F: GenericFactor<Configuration = Configuration>>(&mut self, factor: &F) {
        if self.active_set.is_empty() {
            self.clear();
            return;
        }

        let dimension = self.dimension();
        let mut matrix = vec![0.0; dimension * dimension];
        for (i, first) in self.active_set.iter().enumerate() {
            matrix[i + 1] = 1.0;
            matrix[(i + 1) * dimension] = 1.0;
            for (j, second) in self.active_set.iter().enumerate() {
                matrix[(i + 1) * dimension + j + 1] =
                    factor.count_common_values(first, second) as f64;
            }
        }

        if let Some(inverse) = invert(&matrix, dimension) {
            self.inverse = inverse;
            return;
        }

        let heaviest = self
            .distribution
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(index, _)| index)
            .unwrap_or(0);
        let configuration = self.active_set.swap_remove(heaviest);
        self.reset_to(factor, configuration);
    }

    fn normalise_distribution(&mut self) {
        let total: f64 = self.distribution.iter().sum();
        if total > 0.0 {
            self.distribution.iter_mut().for_each(|weight| *weight /= total);
        }
    }
}

/// The result of [`ActiveSetCache::insert`].
#[derive(Clone, Debug, PartialEq)]
enum Insertion {
    Inserted,
    /// The configuration is the affine combination of the active configurations with these
    /// coefficients.
    Dependent(Vec<f64>),
}

/// Inverts a square row-major matrix by Gauss-Jordan elimination with partial pivoting.
fn invert(matrix: &[f64], dimension: usize) -> Option<Vec<f64>> {
    let width = 2 * dimension;
    let mut augmented = vec![0.0; dimension * width];
    for row in 0..dimension {
        augmented[row * width..row * width + dimension]
            .copy_from_slice(&matrix[row * dimension..(row + 1) * dimension]);
        augmented[row * width + dimension + row] = 1.0;
    }

    for column in 0..dimension {
        let pivot_row = (column..dimension).max_by(|a, b| {
            augmented[a * width + column]
                .abs()
                .total_cmp(&augmented[b * width + column].abs())
        })?;
        let pivot = augmented[pivot_row * width + column];
        if pivot.abs() < PIVOT_TOLERANCE {
            return None;
        }

        if pivot_row != column {
            for k in 0..width {
                augmented.swap(pivot_row * width + k, column * width + k);
            }
        }
        for k in 0..width {
            augmented[column * width + k] /= pivot;
        }
        for row in (0..dimension).filter(|row| *row != column) {
            let factor = augmented[row * width + column];
            if factor != 0.0 {
                for k in 0..width {
                    augmented[row * width + k] -= factor * augmented[column * width + k];
                }
            }
        }
    }

    Some(
        (0..dimension)
            .flat_map(|row| {
                augmented[row * width + dimension..(row + 1) * width]
                    .iter()
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect(),
    )
}

/// Runs at most `max_iterations` iterations of the active-set method, warm-started from
/// `cache`, and writes the resulting posteriors. Returns the number of iterations performed.
pub(crate) fn solve_active_set<F: GenericFactor>(
    factor: &F,
    cache: &mut ActiveSetCache<F::Configuration>,
    target: &[f64],
    additional_scores: &[f64],
    max_iterations: usize,
    variable_posteriors: &mut [f64],
    additional_posteriors: &mut [f64],
) -> usize {
    if cache.is_empty() {
        let (configuration, _) = factor.maximize(target, additional_scores);
        cache.reset_to(factor, configuration);
    }

    let mut average = vec![0.0; factor.num_variables()];
    let mut scratch = vec![0.0; factor.num_additionals()];
    let mut shifted = vec![0.0; factor.num_variables()];

    let mut num_iterations = 0;
    while num_iterations < max_iterations {
        num_iterations += 1;

        let scores = cache
            .active_set
            .iter()
            .map(|configuration| factor.evaluate(target, additional_scores, configuration))
            .collect::<Vec<_>>();
        let (tau, solution) = cache.solve_kkt(&scores);
        ad3_assert_moderate!(
            tau.is_finite() && solution.iter().all(|weight| weight.is_finite()),
            "the active set KKT system produced a non-finite solution"
        );

        // Ratio test: move towards the unconstrained solution until a weight hits zero.
        let blocking = solution
            .iter()
            .zip(cache.distribution.iter())
            .enumerate()
            .filter(|(_, (new, _))| **new < -PIVOT_TOLERANCE)
            .map(|(index, (new, old))| (index, old / (old - new)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((blocking_index, step)) = blocking {
            for (weight, new) in cache.distribution.iter_mut().zip(solution.iter()) {
                *weight = (*weight + step * (new - *weight)).max(0.0);
            }
            cache.remove(factor, blocking_index);
            cache.normalise_distribution();
            continue;
        }

        cache.distribution = solution.iter().map(|weight| weight.max(0.0)).collect();
        cache.normalise_distribution();

        average.iter_mut().for_each(|value| *value = 0.0);
        scratch.iter_mut().for_each(|value| *value = 0.0);
        for (configuration, weight) in cache.active_set.iter().zip(cache.distribution.iter()) {
            factor.add_posteriors(configuration, *weight, &mut average, &mut scratch);
        }
        for ((value, target), average) in shifted.iter_mut().zip(target).zip(average.iter()) {
            *value = target - average;
        }

        let (candidate, value) = factor.maximize(&shifted, additional_scores);
        if value <= tau + OPTIMALITY_TOLERANCE || cache.active_set.contains(&candidate) {
            break;
        }
        if let Insertion::Dependent(coefficients) = cache.insert(factor, candidate.clone()) {
            if !cache.exchange(factor, candidate, &coefficients) {
                break;
            }
        }
    }

    ad3_assert_advanced!(
        cache.active_set.is_empty()
            || (cache.distribution.iter().sum::<f64>() - 1.0).abs() < 1e-6,
        "the active set distribution is not normalised"
    );

    variable_posteriors.iter_mut().for_each(|value| *value = 0.0);
    additional_posteriors
        .iter_mut()
        .for_each(|value| *value = 0.0);
    for (configuration, weight) in cache.active_set.iter().zip(cache.distribution.iter()) {
        factor.add_posteriors(
            configuration,
            *weight,
            variable_posteriors,
            additional_posteriors,
        );
    }

    num_iterations
}

/// The solution of a single proximal subproblem solved by [`ActiveSetFactor::solve_qp`].
#[derive(Clone, Debug, PartialEq)]
pub struct QpSolution {
    pub variable_posteriors: Vec<f64>,
    pub additional_posteriors: Vec<f64>,
    /// The active configurations, each given by the indices of its true variables.
    pub active_set: Vec<Box<[usize]>>,
    /// The weight of every active configuration; the posteriors are the corresponding convex
    /// combination.
    pub distribution: Vec<f64>,
    /// The row-major inverse of the bordered matrix `[[0, 1^T], [1, M]]`.
    pub inverse_a: Vec<f64>,
    pub num_iterations: usize,
}

/// A [`GenericFactor`] together with the warm-start state of its active-set solver.
#[derive(Clone, Debug)]
pub struct ActiveSetFactor<F: GenericFactor> {
    factor: F,
    cache: ActiveSetCache<F::Configuration>,
    max_iterations: usize,
}

impl<F: GenericFactor> ActiveSetFactor<F> {
    /// The number of active-set iterations per proximal step inside the consensus loop.
    pub const DEFAULT_MAX_ITERATIONS: usize = 10;

    pub fn new(factor: F) -> Self {
        ActiveSetFactor {
            factor,
            cache: ActiveSetCache::default(),
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn factor(&self) -> &F {
        &self.factor
    }

    pub fn cache(&self) -> &ActiveSetCache<F::Configuration> {
        &self.cache
    }

    pub(crate) fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations.max(1);
    }

    /// Solves `max b . r - 1/2 |q - a|^2` over the marginal polytope of the factor, where `a`
    /// are the `variable_scores` and `b` the `additional_scores`.
    ///
    /// The solver is warm-started from the active set of the previous call, so repeated calls
    /// with a slowly moving target are cheap.
    pub fn solve_qp(
        &mut self,
        variable_scores: &[f64],
        additional_scores: &[f64],
    ) -> Result<QpSolution, ConstructionError> {
        if variable_scores.len() != self.factor.num_variables() {
            return Err(ConstructionError::LengthMismatch {
                what: "variable scores",
                expected: self.factor.num_variables(),
                actual: variable_scores.len(),
            });
        }
        if additional_scores.len() != self.factor.num_additionals() {
            return Err(ConstructionError::LengthMismatch {
                what: "additional scores",
                expected: self.factor.num_additionals(),
                actual: additional_scores.len(),
            });
        }

        let mut variable_posteriors = vec![0.0; self.factor.num_variables()];
        let mut additional_posteriors = vec![0.0; self.factor.num_additionals()];
        let num_iterations = solve_active_set(
            &self.factor,
            &mut self.cache,
            variable_scores,
            additional_scores,
            DIRECT_SOLVE_ITERATION_LIMIT,
            &mut variable_posteriors,
            &mut additional_posteriors,
        );

        Ok(QpSolution {
            variable_posteriors,
            additional_posteriors,
            active_set: self
                .cache
                .active_set
                .iter()
                .map(|configuration| self.factor.active_variables(configuration).into())
                .collect(),
            distribution: self.cache.distribution.clone(),
            inverse_a: self.cache.inverse.clone(),
            num_iterations,
        })
    }
}

impl<F: GenericFactor> Subproblem for ActiveSetFactor<F> {
    fn project(
        &mut self,
        target: &[f64],
        additional_scores: &[f64],
        posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    ) -> usize {
        solve_active_set(
            &self.factor,
            &mut self.cache,
            target,
            additional_scores,
            self.max_iterations,
            posteriors,
            additional_posteriors,
        )
    }

    fn maximize(&self, scores: &[f64], additional_scores: &[f64]) -> f64 {
        self.factor.maximize(scores, additional_scores).1
    }

    fn evaluate(
        &self,
        assignment: &[bool],
        additional_scores: &[f64],
        additional_posteriors: &mut [f64],
    ) -> Option<f64> {
        let configuration = self.factor.configuration_from_assignment(assignment)?;

        let zeros = vec![0.0; self.factor.num_variables()];
        let mut variable_posteriors = zeros.clone();
        additional_posteriors
            .iter_mut()
            .for_each(|value| *value = 0.0);
        self.factor.add_posteriors(
            &configuration,
            1.0,
            &mut variable_posteriors,
            additional_posteriors,
        );

        Some(
            self.factor
                .evaluate(&zeros, additional_scores, &configuration),
        )
    }

    fn reset(&mut self) {
        self.cache.clear();
    }
}

/// The largest violation of the optimality conditions of a [`QpSolution`] over the vertices of
/// the marginal polytope, `max_s (a - q) . (s_q - q) + b . (s_r - r)`.
///
/// The vertices are enumerated through every assignment of the variables.
#[cfg(test)]
pub(crate) fn optimality_violation<F: GenericFactor>(
    factor: &F,
    variable_scores: &[f64],
    additional_scores: &[f64],
    solution: &QpSolution,
) -> f64 {
    let num_variables = factor.num_variables();
    let gradient = variable_scores
        .iter()
        .zip(solution.variable_posteriors.iter())
        .map(|(score, posterior)| score - posterior)
        .collect::<Vec<_>>();
    let current = gradient
        .iter()
        .zip(solution.variable_posteriors.iter())
        .chain(
            additional_scores
                .iter()
                .zip(solution.additional_posteriors.iter()),
        )
        .map(|(a, b)| a * b)
        .sum::<f64>();

    (0..1_usize << num_variables)
        .filter_map(|mask| {
            let assignment = (0..num_variables)
                .map(|index| (mask >> index) & 1 == 1)
                .collect::<Vec<_>>();
            factor.configuration_from_assignment(&assignment)
        })
        .map(|vertex| factor.evaluate(&gradient, additional_scores, &vertex) - current)
        .fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::projections::project_onto_simplex;

    /// Exactly one of the variables is true; its marginal polytope is the simplex.
    struct OneHot {
        size: usize,
    }

    impl GenericFactor for OneHot {
        type Configuration = usize;

        fn num_variables(&self) -> usize {
            self.size
        }

        fn num_additionals(&self) -> usize {
            0
        }

        fn maximize(&self, variable_scores: &[f64], _: &[f64]) -> (usize, f64) {
            variable_scores
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .expect("non-empty factor")
        }

        fn evaluate(&self, variable_scores: &[f64], _: &[f64], configuration: &usize) -> f64 {
            variable_scores[*configuration]
        }

        fn add_posteriors(
            &self,
            configuration: &usize,
            weight: f64,
            variable_posteriors: &mut [f64],
            _: &mut [f64],
        ) {
            variable_posteriors[*configuration] += weight;
        }

        fn active_variables(&self, configuration: &usize) -> Vec<usize> {
            vec![*configuration]
        }

        fn configuration_from_assignment(&self, assignment: &[bool]) -> Option<usize> {
            let mut true_indices = assignment
                .iter()
                .enumerate()
                .filter(|(_, value)| **value)
                .map(|(index, _)| index);
            let index = true_indices.next()?;
            true_indices.next().is_none().then_some(index)
        }
    }

    #[test]
    fn active_set_projection_matches_the_simplex_projection() {
        let target = vec![0.9, 0.8, -0.1, 0.3, 0.75];
        let mut factor = ActiveSetFactor::new(OneHot { size: 5 });

        let solution = factor.solve_qp(&target, &[]).expect("valid lengths");

        let mut expected = target.clone();
        project_onto_simplex(&mut expected);
        for (actual, expected) in solution.variable_posteriors.iter().zip(expected.iter()) {
            assert!((actual - expected).abs() < 1e-9, "{solution:?}");
        }
        assert!((solution.distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(solution.active_set.len(), solution.distribution.len());
    }

    #[test]
    fn warm_start_removes_configurations_which_lose_their_weight() {
        let mut factor = ActiveSetFactor::new(OneHot { size: 3 });

        let _ = factor.solve_qp(&[0.5, 0.5, 0.0], &[]).expect("valid lengths");
        assert_eq!(factor.cache().active_set().len(), 2);

        let solution = factor.solve_qp(&[5.0, 0.0, 0.0], &[]).expect("valid lengths");

        assert_eq!(solution.active_set, vec![vec![0].into_boxed_slice()]);
        assert!((solution.variable_posteriors[0] - 1.0).abs() < 1e-9);
        assert_eq!(solution.inverse_a.len(), 4);
    }

    #[test]
    fn projection_respects_the_iteration_limit() {
        let mut factor = ActiveSetFactor::new(OneHot { size: 5 }).with_max_iterations(1);
        let mut posteriors = [0.0; 5];

        let num_iterations =
            factor.project(&[0.9, 0.8, -0.1, 0.3, 0.75], &[], &mut posteriors, &mut []);

        assert!(num_iterations <= 1);
        assert!(posteriors
            .iter()
            .all(|posterior| (0.0..=1.0 + 1e-9).contains(posterior)));
    }

    #[test]
    fn solve_qp_rejects_mismatched_lengths() {
        let mut factor = ActiveSetFactor::new(OneHot { size: 3 });

        let result = factor.solve_qp(&[0.5, 0.5], &[]);

        assert_eq!(
            result.map(|_| ()),
            Err(ConstructionError::LengthMismatch {
                what: "variable scores",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn cached_inverse_matches_a_fresh_inversion() {
        let factor = OneHot { size: 3 };
        let mut cache = ActiveSetCache::default();
        cache.reset_to(&factor, 0);
        assert_eq!(cache.insert(&factor, 2), Insertion::Inserted);
        assert_eq!(cache.insert(&factor, 1), Insertion::Inserted);
        cache.remove(&factor, 1);

        let cached = cache.inverse().to_vec();
        cache.rebuild(&factor);

        for (cached, fresh) in cached.iter().zip(cache.inverse().iter()) {
            assert!((cached - fresh).abs() < 1e-9);
        }
    }

    #[test]
    fn affinely_dependent_candidates_replace_an_active_configuration() {
        let factor = OneHot { size: 3 };
        let mut cache = ActiveSetCache::default();
        cache.reset_to(&factor, 0);
        assert_eq!(cache.insert(&factor, 1), Insertion::Inserted);
        cache.distribution = vec![0.25, 0.75];

        // a second copy of configuration 1 is the combination 0 * c0 + 1 * c1
        let coefficients = match cache.insert(&factor, 1) {
            Insertion::Dependent(coefficients) => coefficients,
            Insertion::Inserted => panic!("a repeated configuration cannot be inserted"),
        };
        assert!(coefficients[0].abs() < 1e-9);
        assert!((coefficients[1] - 1.0).abs() < 1e-9);

        assert!(cache.exchange(&factor, 1, &coefficients));
        assert_eq!(cache.active_set(), &[0, 1]);
        assert!((cache.distribution()[0] - 0.25).abs() < 1e-9);
        assert!((cache.distribution()[1] - 0.75).abs() < 1e-9);
        assert_eq!(cache.inverse().len(), 9);
    }
}
