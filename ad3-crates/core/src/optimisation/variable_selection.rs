use std::fmt::Display;
use std::fmt::Formatter;

/// The strategy which picks the variable to branch on in a fractional node.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum VariableSelection {
    /// Branch on the unfixed variable whose consensus value is closest to 0.5.
    #[default]
    MostFractional,
    /// Branch on the first unfixed variable with a fractional consensus value.
    FirstFractional,
}

impl VariableSelection {
    /// Returns the index of the variable to branch on, or `None` if every unfixed variable has
    /// an integral value within `tolerance`.
    pub(crate) fn select(
        &self,
        consensus: &[f64],
        fixed: &[Option<bool>],
        tolerance: f64,
    ) -> Option<usize> {
        let mut candidates = consensus
            .iter()
            .zip(fixed.iter())
            .enumerate()
            .filter(|(_, (_, fixed))| fixed.is_none())
            .map(|(index, (value, _))| (index, (value - value.round()).abs()))
            .filter(|(_, fractionality)| *fractionality > tolerance);

        match self {
            VariableSelection::FirstFractional => candidates.next().map(|(index, _)| index),
            VariableSelection::MostFractional => candidates
                .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(index, _)| index),
        }
    }
}

impl Display for VariableSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableSelection::MostFractional => write!(f, "most-fractional"),
            VariableSelection::FirstFractional => write!(f, "first-fractional"),
        }
    }
}
