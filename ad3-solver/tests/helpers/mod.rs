//! Helpers which are shared by the integration tests of the factor graph.
#![allow(
    dead_code,
    reason = "is used in integration tests but unable to find a way to silence these warnings"
)]

use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::time::Duration;

use ad3_solver::options::SolverOptions;
use ad3_solver::BinaryVariable;
use ad3_solver::FactorGraph;
use ad3_solver::Literal;
use wait_timeout::ChildExt;

pub(crate) const TOLERANCE: f64 = 1e-6;

/// Creates one binary variable per log-potential.
pub(crate) fn create_binary_variables(
    graph: &mut FactorGraph,
    log_potentials: &[f64],
) -> Vec<BinaryVariable> {
    log_potentials
        .iter()
        .map(|&log_potential| {
            let variable = graph.create_binary_variable();
            graph
                .set_log_potential(variable, log_potential)
                .expect("the variable was just created");
            variable
        })
        .collect()
}

pub(crate) fn positive_literals(variables: &[BinaryVariable]) -> Vec<Literal> {
    variables.iter().map(|variable| variable.literal()).collect()
}

pub(crate) fn exact_options() -> SolverOptions {
    SolverOptions {
        branch_and_bound: true,
        ..SolverOptions::default()
    }
}

pub(crate) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= TOLERANCE * expected.abs().max(1.0),
        "expected {expected}, got {actual}"
    );
}

pub(crate) fn assert_all_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} != {expected:?}");
    for (&actual, &expected) in actual.iter().zip(expected) {
        assert_close(actual, expected);
    }
}

/// Enumerates every assignment of `num_variables` binary variables and returns the best one
/// according to `score`, which returns `None` for infeasible assignments.
pub(crate) fn brute_force(
    num_variables: usize,
    score: impl Fn(&[bool]) -> Option<f64>,
) -> Option<(Vec<bool>, f64)> {
    let mut best: Option<(Vec<bool>, f64)> = None;
    for bits in 0..1_u64 << num_variables {
        let assignment = (0..num_variables)
            .map(|index| bits >> index & 1 == 1)
            .collect::<Vec<_>>();
        let Some(value) = score(&assignment) else {
            continue;
        };
        let improves = match &best {
            Some((_, best_value)) => value > *best_value,
            None => true,
        };
        if improves {
            best = Some((assignment, value));
        }
    }
    best
}

/// The sum of the log-potentials of the true variables.
pub(crate) fn unary_score(log_potentials: &[f64], assignment: &[bool]) -> f64 {
    log_potentials
        .iter()
        .zip(assignment)
        .filter(|(_, value)| **value)
        .map(|(log_potential, _)| log_potential)
        .sum()
}

/// The outcome of running the solver binary on an instance.
#[derive(Debug)]
pub(crate) struct SolverRun {
    pub(crate) success: bool,
    pub(crate) stdout: String,
}

impl SolverRun {
    /// Whether stdout contains `line` as a complete line.
    pub(crate) fn has_line(&self, line: &str) -> bool {
        self.stdout.lines().any(|output_line| output_line == line)
    }
}

pub(crate) fn instance_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("instances")
        .join(name)
}

/// Runs the solver binary on `instance_path` with the given extra arguments, collecting its
/// standard output in a log file next to the instance.
pub(crate) fn run_solver<'a>(
    instance_path: impl AsRef<Path>,
    args: impl IntoIterator<Item = &'a str>,
) -> SolverRun {
    const TEST_TIMEOUT: Duration = Duration::from_secs(60);

    let instance_path = instance_path.as_ref();
    let solver = PathBuf::from(env!("CARGO_BIN_EXE_ad3-solver"));
    let log_file_path = instance_path.with_extension("log");

    let mut command = Command::new(solver);
    for arg in args {
        let _ = command.arg(arg);
    }

    let mut child = command
        .arg(instance_path)
        .stdout(File::create(&log_file_path).expect("Failed to create log file."))
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn()
        .expect("Failed to run solver.");

    let status = match child.wait_timeout(TEST_TIMEOUT) {
        Ok(None) => panic!("solver took more than {} seconds", TEST_TIMEOUT.as_secs()),
        Ok(Some(status)) => status,
        Err(e) => panic!("error starting solver: {e}"),
    };

    let stdout = std::fs::read_to_string(&log_file_path).expect("Failed to read log file.");
    std::fs::remove_file(&log_file_path).expect("Failed to remove log file.");

    SolverRun {
        success: status.success(),
        stdout,
    }
}
