mod parser;
mod result;

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use ad3_solver::asserts::AD3_ASSERT_LEVEL_DEFINITION;
use ad3_solver::asserts::AD3_ASSERT_MODERATE;
use ad3_solver::convert_case::Case;
use ad3_solver::options::SolverOptions;
use ad3_solver::options::VariableSelection;
use ad3_solver::results::SolverResult;
use ad3_solver::statistics::configure_statistic_logging;
use ad3_solver::termination::TimeBudget;
use clap::Parser;
use log::error;
use log::info;
use log::warn;
use log::LevelFilter;
use parser::parse_factor_graph;
use parser::NamedVariable;
use result::Ad3Result;
use result::Ad3SolverError;

#[derive(Debug, Parser)]
#[command(
    help_template = "\
{before-help}{name} {version}
Authors: {author}
About: {about}

{usage-heading}\n{tab}{usage}

{all-args}{after-help}
",
    author,
    version,
    about,
    arg_required_else_help = true
)]
struct Args {
    /// The factor graph to solve, given in the line-based '*.fg' format.
    ///
    /// Every line declares a variable ('binary', 'multi') or a factor ('xor', 'xorout',
    /// 'atmostone', 'or', 'orout', 'andout', 'imply', 'pair', 'budget', 'knapsack', 'dense',
    /// 'matching', 'segmentation'); '#' starts a comment.
    #[clap(verbatim_doc_comment)]
    instance_path: PathBuf,

    /// The initial step size of the consensus iterations.
    ///
    /// Possible values: f64
    #[arg(long = "eta", default_value_t = 0.1, verbatim_doc_comment)]
    eta: f64,

    /// Keeps the step size fixed instead of balancing it from the primal and dual residuals.
    ///
    /// Possible values: bool
    #[arg(long = "no-adapt", verbatim_doc_comment)]
    no_adapt: bool,

    /// The maximum number of consensus iterations of every relaxation.
    ///
    /// Possible values: u64
    #[arg(long = "max-iterations", default_value_t = 1000, verbatim_doc_comment)]
    max_iterations: u64,

    /// A relaxation has converged once both residuals are below this threshold.
    ///
    /// Possible values: f64
    #[arg(long = "residual-threshold", default_value_t = 1e-6, verbatim_doc_comment)]
    residual_threshold: f64,

    /// The number of active-set iterations per proximal step of the factors which are solved
    /// with the active-set method.
    ///
    /// Possible values: usize
    #[arg(
        long = "max-active-set-iterations",
        default_value_t = 10,
        verbatim_doc_comment
    )]
    max_active_set_iterations: usize,

    /// Searches for an exact solution with branch-and-bound when the relaxation is fractional.
    ///
    /// Possible values: bool
    #[arg(long = "exact", verbatim_doc_comment)]
    exact: bool,

    /// The maximum number of nodes explored by the branch-and-bound search.
    ///
    /// Possible values: u64
    #[arg(long = "node-limit", default_value_t = 100_000, verbatim_doc_comment)]
    node_limit: u64,

    /// The time budget for the branch-and-bound search, given in milliseconds.
    ///
    /// Possible values: u64
    #[arg(short = 't', long = "time-limit", verbatim_doc_comment)]
    time_limit: Option<u64>,

    /// Projects the factors in parallel.
    ///
    /// Possible values: bool
    #[arg(long = "parallel", verbatim_doc_comment)]
    parallel: bool,

    /// The variable which the branch-and-bound search branches on.
    #[arg(long = "variable-selection", value_enum, default_value_t)]
    variable_selection: VariableSelection,

    /// Enables log message output from the solver; pass it twice to also log every iteration.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enables logging of statistics from the solver.
    ///
    /// Possible values: bool
    #[arg(short = 's', long = "log-statistics", verbatim_doc_comment)]
    log_statistics: bool,
}

fn configure_logging(verbosity: u8, log_statistics: bool) -> std::io::Result<()> {
    if log_statistics {
        configure_statistic_logging("c STAT", None, Some(Case::Camel), None);
    }
    let level_filter = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::new()
        .format(move |buf, record| {
            write!(buf, "c ")?;

            writeln!(buf, "{}", record.args())
        })
        .filter_level(level_filter)
        .target(env_logger::Target::Stdout)
        .init();
    info!("Logging successfully configured");
    Ok(())
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            error!("Execution failed, error: {e}");
            std::process::exit(1);
        }
    }
}

fn run() -> Ad3Result<()> {
    let args = Args::parse();

    configure_logging(args.verbose, args.log_statistics)?;

    if AD3_ASSERT_LEVEL_DEFINITION >= AD3_ASSERT_MODERATE {
        warn!(
            "Potential performance degradation: the AD3 assert level is set to {}, meaning many debug asserts are active which may result in performance degradation.",
            AD3_ASSERT_LEVEL_DEFINITION
        );
    };

    if args.instance_path.extension().and_then(|ext| ext.to_str()) != Some("fg") {
        return Err(Ad3SolverError::invalid_instance(
            args.instance_path.display(),
        ));
    }

    let options = SolverOptions {
        eta: args.eta,
        adapt_eta: !args.no_adapt,
        max_iterations: args.max_iterations,
        residual_threshold: args.residual_threshold,
        branch_and_bound: args.exact,
        variable_selection: args.variable_selection,
        max_nodes: args.node_limit,
        max_active_set_iterations: args.max_active_set_iterations,
        parallel: args.parallel,
        verbosity: args.verbose,
    };

    if args.time_limit.is_some() && !args.exact {
        warn!("The time limit only bounds the branch-and-bound search, which is not enabled.");
    }
    let mut termination = args
        .time_limit
        .map(|milliseconds| TimeBudget::starting_now(Duration::from_millis(milliseconds)));

    let mut parsed = parse_factor_graph(File::open(&args.instance_path)?)?;
    info!(
        "Parsed {} binary variables and {} factors",
        parsed.graph.num_binary_variables(),
        parsed.graph.num_factors()
    );

    let result = parsed
        .graph
        .solve_with_termination(options, &mut termination);
    parsed.graph.log_statistics();

    print_result(&result, &parsed.variables);

    Ok(())
}

fn print_result(result: &SolverResult, variables: &[(String, NamedVariable)]) {
    println!("s {}", result.status.to_string().to_uppercase());
    println!("o {}", result.value);
    println!("b {}", result.upper_bound);

    for (name, variable) in variables {
        match variable {
            NamedVariable::Binary(variable) => println!("v {name} {}", result.marginal(*variable)),
            NamedVariable::Multi(variable) => {
                let marginals = result
                    .state_marginals(*variable)
                    .iter()
                    .map(|marginal| marginal.to_string())
                    .collect::<Vec<_>>();
                println!("v {name} {}", marginals.join(" "));
            }
        }
    }
}
