//! The consensus iterations of the alternating directions dual decomposition.
//!
//! Every binary variable `i` has a consensus value `p_i` and every factor `f` a local copy
//! `q_fi` of it together with a multiplier `lambda_fi`. One iteration projects every factor,
//! averages the local copies into the consensus and moves the multipliers against the
//! disagreement. The dual function evaluated at the multipliers is an upper bound on the MAP
//! value; it is tracked every iteration so that integral solutions can be certified.

use log::debug;
use log::info;
use rayon::prelude::*;

use super::solver_statistics::EngineStatistics;
use super::SolverOptions;
use crate::ad3_assert_eq_simple;
use crate::containers::StorageKey;
use crate::factors::Factor;

/// Values within this distance of 0 or 1 are considered integral.
pub(crate) const INTEGRALITY_TOLERANCE: f64 = 1e-6;
/// Relative gap under which an integral solution is certified optimal by the dual bound.
const GAP_THRESHOLD: f64 = 1e-6;
/// The step size is only reconsidered every this many iterations.
const ETA_ADAPTATION_INTERVAL: u64 = 10;
/// The step size changes when one residual exceeds the other by this factor.
const RESIDUAL_BALANCE_RATIO: f64 = 10.0;
const ETA_SCALING: f64 = 2.0;
const MIN_ETA: f64 = 1e-3;
const MAX_ETA: f64 = 1e3;

/// A 0/1 assignment of all binary variables which is feasible for every factor.
#[derive(Clone, Debug)]
pub(crate) struct IntegralAssignment {
    pub(crate) assignment: Vec<bool>,
    pub(crate) value: f64,
}

/// The outcome of solving the relaxation once.
#[derive(Clone, Debug)]
pub(crate) struct Relaxation {
    /// The consensus value of every binary variable.
    pub(crate) consensus: Vec<f64>,
    /// The objective value of the consensus and the current additional posteriors.
    pub(crate) value: f64,
    /// The best dual bound encountered.
    pub(crate) upper_bound: f64,
    /// A feasible rounding of the consensus, if the consensus is integral or its rounding is
    /// certified by the dual bound.
    pub(crate) integral: Option<IntegralAssignment>,
    /// Whether the integral assignment matches the dual bound, which proves it optimal.
    pub(crate) certified: bool,
    pub(crate) num_iterations: u64,
}

/// Computes the objective value of a 0/1 assignment, or `None` if a factor is violated.
pub(crate) fn evaluate_assignment(
    factors: &[Factor],
    log_potentials: &[f64],
    assignment: &[bool],
) -> Option<f64> {
    let mut value: f64 = log_potentials
        .iter()
        .zip(assignment.iter())
        .filter(|(_, value)| **value)
        .map(|(log_potential, _)| log_potential)
        .sum();

    for factor in factors {
        let local_assignment = factor
            .variables
            .iter()
            .map(|variable| assignment[variable.index()])
            .collect::<Vec<_>>();
        let mut additional_posteriors = vec![0.0; factor.num_additionals()];
        value += factor.evaluate(&local_assignment, &mut additional_posteriors)?;
    }

    Some(value)
}

/// Solves the relaxation of the MAP problem over `factors`, where the variables with a value in
/// `fixed` are clamped to it.
pub(crate) fn solve_relaxation(
    factors: &mut [Factor],
    log_potentials: &[f64],
    fixed: &[Option<bool>],
    options: &SolverOptions,
    statistics: &mut EngineStatistics,
) -> Relaxation {
    let num_variables = log_potentials.len();
    ad3_assert_eq_simple!(fixed.len(), num_variables);

    let mut degrees = vec![0_usize; num_variables];
    for factor in factors.iter_mut() {
        for variable in factor.variables.iter() {
            degrees[variable.index()] += 1;
        }
        factor.reset(options.max_active_set_iterations);
    }
    let num_edges: usize = degrees.iter().sum();

    let mut consensus = (0..num_variables)
        .map(|variable| match fixed[variable] {
            Some(value) => f64::from(u8::from(value)),
            None if degrees[variable] == 0 => f64::from(u8::from(log_potentials[variable] > 0.0)),
            None => 0.5,
        })
        .collect::<Vec<_>>();

    let mut eta = options.eta.clamp(MIN_ETA, MAX_ETA);
    let mut upper_bound = f64::INFINITY;
    let mut value = f64::NEG_INFINITY;
    let mut certified_assignment = None;
    let mut num_iterations = 0;

    let mut sums = vec![0.0; num_variables];
    let mut multiplier_sums = vec![0.0; num_variables];

    statistics.num_relaxations += 1;

    while num_iterations < options.max_iterations {
        num_iterations += 1;

        if options.parallel {
            factors.par_iter_mut().for_each(|factor| {
                factor.solve_proximal_step(&consensus, log_potentials, &degrees, eta)
            });
        } else {
            for factor in factors.iter_mut() {
                factor.solve_proximal_step(&consensus, log_potentials, &degrees, eta);
            }
        }

        // consensus
        sums.iter_mut().for_each(|sum| *sum = 0.0);
        for factor in factors.iter() {
            for (variable, posterior) in factor.variables.iter().zip(factor.dual.posteriors.iter())
            {
                sums[variable.index()] += posterior;
            }
        }
        let mut dual_residual = 0.0;
        for variable in 0..num_variables {
            if fixed[variable].is_some() || degrees[variable] == 0 {
                continue;
            }
            let updated = sums[variable] / degrees[variable] as f64;
            let change = updated - consensus[variable];
            dual_residual += degrees[variable] as f64 * change * change;
            consensus[variable] = updated;
        }

        // multipliers
        let mut primal_residual = 0.0;
        multiplier_sums.iter_mut().for_each(|sum| *sum = 0.0);
        for factor in factors.iter_mut() {
            let dual = &mut factor.dual;
            for (index, variable) in factor.variables.iter().enumerate() {
                let difference = dual.posteriors[index] - consensus[variable.index()];
                primal_residual += difference * difference;
                dual.multipliers[index] -= eta * difference;
                multiplier_sums[variable.index()] += dual.multipliers[index];
            }
        }

        let (primal_residual, dual_residual) = if num_edges > 0 {
            (
                (primal_residual / num_edges as f64).sqrt(),
                eta * (dual_residual / num_edges as f64).sqrt(),
            )
        } else {
            (0.0, 0.0)
        };

        let dual_value = dual_objective(
            factors,
            log_potentials,
            fixed,
            &degrees,
            &multiplier_sums,
            options.parallel,
        );
        upper_bound = upper_bound.min(dual_value);
        value = primal_objective(factors, log_potentials, &consensus);

        if options.verbosity >= 2 {
            debug!(
                "iteration {num_iterations}: value {value:.6}, upper bound {upper_bound:.6}, \
                 primal residual {primal_residual:.3e}, dual residual {dual_residual:.3e}, \
                 eta {eta:.3e}"
            );
        }

        let rounded = consensus.iter().map(|value| *value >= 0.5).collect::<Vec<_>>();
        if let Some(rounded_value) = evaluate_assignment(factors, log_potentials, &rounded) {
            if upper_bound - rounded_value <= GAP_THRESHOLD * upper_bound.abs().max(1.0) {
                certified_assignment = Some(IntegralAssignment {
                    assignment: rounded,
                    value: rounded_value,
                });
                break;
            }
        }

        if primal_residual < options.residual_threshold && dual_residual < options.residual_threshold
        {
            break;
        }

        if options.adapt_eta && num_iterations % ETA_ADAPTATION_INTERVAL == 0 {
            let previous_eta = eta;
            if primal_residual > RESIDUAL_BALANCE_RATIO * dual_residual {
                eta = (eta * ETA_SCALING).min(MAX_ETA);
            } else if dual_residual > RESIDUAL_BALANCE_RATIO * primal_residual {
                eta = (eta / ETA_SCALING).max(MIN_ETA);
            }
            if eta != previous_eta {
                statistics.num_eta_adaptations += 1;
            }
        }
    }

    statistics.num_iterations += num_iterations;
    statistics.num_inner_iterations += factors
        .iter()
        .map(|factor| factor.dual.num_inner_iterations)
        .sum::<u64>();
    statistics.final_eta = eta;

    let certified = certified_assignment.is_some();
    let integral = certified_assignment.or_else(|| {
        let is_integral = consensus
            .iter()
            .all(|value| (value - value.round()).abs() <= INTEGRALITY_TOLERANCE);
        if !is_integral {
            return None;
        }
        let assignment = consensus.iter().map(|value| *value >= 0.5).collect::<Vec<_>>();
        evaluate_assignment(factors, log_potentials, &assignment)
            .map(|value| IntegralAssignment { assignment, value })
    });

    if options.verbosity >= 1 {
        info!(
            "relaxation finished after {num_iterations} iterations: value {value:.6}, upper \
             bound {upper_bound:.6}, {}",
            if integral.is_some() { "integral" } else { "fractional" }
        );
    }

    Relaxation {
        consensus,
        value,
        upper_bound,
        integral,
        certified,
        num_iterations,
    }
}

/// The objective of the consensus, with the additional posteriors of the factors.
fn primal_objective(factors: &[Factor], log_potentials: &[f64], consensus: &[f64]) -> f64 {
    let unary: f64 = log_potentials
        .iter()
        .zip(consensus.iter())
        .map(|(log_potential, value)| log_potential * value)
        .sum();
    let additional: f64 = factors
        .iter()
        .map(|factor| {
            factor
                .additional_log_potentials
                .iter()
                .zip(factor.dual.additional_posteriors.iter())
                .map(|(log_potential, posterior)| log_potential * posterior)
                .sum::<f64>()
        })
        .sum();

    unary + additional
}

/// The Lagrangian dual function at the current multipliers.
fn dual_objective(
    factors: &[Factor],
    log_potentials: &[f64],
    fixed: &[Option<bool>],
    degrees: &[usize],
    multiplier_sums: &[f64],
    parallel: bool,
) -> f64 {
    let local_value = |factor: &Factor| {
        let scores = factor
            .variables
            .iter()
            .zip(factor.dual.multipliers.iter())
            .map(|(variable, multiplier)| {
                let variable = variable.index();
                log_potentials[variable] / degrees[variable] as f64 + multiplier
            })
            .collect::<Vec<_>>();
        factor.maximize(&scores)
    };

    // collected first so the sum does not depend on how the work was split
    let local_values = if parallel {
        factors.par_iter().map(local_value).collect::<Vec<_>>()
    } else {
        factors.iter().map(local_value).collect::<Vec<_>>()
    };

    let mut value: f64 = local_values.iter().sum();
    for variable in 0..log_potentials.len() {
        let multiplier_sum = multiplier_sums[variable];
        value += match (fixed[variable], degrees[variable]) {
            (Some(true), 0) => log_potentials[variable],
            (Some(false), 0) => 0.0,
            (None, 0) => log_potentials[variable].max(0.0),
            (Some(true), _) => -multiplier_sum,
            (Some(false), _) => 0.0,
            (None, _) => (-multiplier_sum).max(0.0),
        };
    }
    value
}
