//! The global sink which statistics are written to, as lines of the form `{prefix} {name}={value}`.

use std::fmt::Display;
use std::io::stdout;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::RwLock;

use convert_case::Case;
use convert_case::Casing;
use log::debug;

/// Describes how statistics are written once [`configure_statistic_logging`] has been called.
pub struct StatisticOptions<'a> {
    /// Starts every statistic line.
    statistic_prefix: &'a str,
    /// Written after every block of statistics.
    after_statistics: Option<&'a str>,
    /// The case which statistic names are converted to.
    statistics_casing: Option<Case>,
    statistics_writer: Box<dyn Write + Send + Sync>,
}

impl std::fmt::Debug for StatisticOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticOptions")
            .field("statistic_prefix", &self.statistic_prefix)
            .field("after_statistics", &self.after_statistics)
            .field("statistics_casing", &self.statistics_casing)
            .finish_non_exhaustive()
    }
}

static STATISTIC_OPTIONS: OnceLock<RwLock<StatisticOptions<'static>>> = OnceLock::new();

/// Enables the logging of statistics; until this is called, [`log_statistic`] does nothing.
///
/// Only the first call has an effect. Statistics go to standard output unless a `writer` is
/// provided.
pub fn configure_statistic_logging(
    prefix: &'static str,
    after: Option<&'static str>,
    casing: Option<Case>,
    writer: Option<Box<dyn Write + Send + Sync>>,
) {
    let _ = STATISTIC_OPTIONS.get_or_init(|| {
        RwLock::new(StatisticOptions {
            statistic_prefix: prefix,
            after_statistics: after,
            statistics_casing: casing,
            statistics_writer: writer.unwrap_or_else(|| Box::new(stdout())),
        })
    });
}

/// Runs `action` on the options if statistic logging is configured and the lock is not poisoned.
fn with_options(action: impl FnOnce(&mut StatisticOptions<'static>)) {
    let Some(lock) = STATISTIC_OPTIONS.get() else {
        return;
    };
    if let Ok(mut options) = lock.write() {
        action(&mut options);
    }
}

pub fn log_statistic(name: impl Display, value: impl Display) {
    with_options(|options| {
        let name = match options.statistics_casing {
            Some(casing) => name.to_string().to_case(casing),
            None => name.to_string(),
        };
        let line = format!("{} {name}={value}", options.statistic_prefix);
        if let Err(e) = writeln!(options.statistics_writer, "{line}") {
            debug!("Could not write statistic: {e}");
        }
    });
}

/// Closes a block of statistics with the configured postfix line, if there is one.
pub fn log_statistic_postfix() {
    with_options(|options| {
        let Some(postfix) = options.after_statistics else {
            return;
        };
        if let Err(e) = writeln!(options.statistics_writer, "{postfix}") {
            debug!("Could not write statistic: {e}");
        }
    });
}

pub fn should_log_statistics() -> bool {
    STATISTIC_OPTIONS.get().is_some()
}
