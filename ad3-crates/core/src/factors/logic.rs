use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use super::projections::clip_to_unit_box;
use super::projections::project_onto_budget_polytope;
use super::projections::project_onto_covering_polytope;
use super::projections::project_onto_or_output_polytope;
use super::projections::project_onto_simplex;
use super::Subproblem;

/// The hard logic constraints which can be declared over a list of literals.
///
/// For the operators with an output (`XorOut`, `OrOut`, `AndOut`) and for `Imply` the last
/// literal plays the special role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicOperator {
    /// Exactly one literal is true.
    Xor,
    /// The inputs sum to the output, i.e. at most one input is true and the output is true iff
    /// one of them is.
    XorOut,
    /// At most one literal is true.
    AtMostOne,
    /// At least one literal is true.
    Or,
    /// The output is the disjunction of the inputs.
    OrOut,
    /// The output is the conjunction of the inputs.
    AndOut,
    /// The conjunction of the first literals implies the last one.
    Imply,
}

impl LogicOperator {
    /// The smallest number of literals a factor with this operator can be declared over.
    pub fn minimum_arity(&self) -> usize {
        match self {
            LogicOperator::Xor | LogicOperator::AtMostOne | LogicOperator::Or => 1,
            LogicOperator::XorOut
            | LogicOperator::OrOut
            | LogicOperator::AndOut
            | LogicOperator::Imply => 2,
        }
    }
}

impl Display for LogicOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogicOperator::Xor => "XOR",
            LogicOperator::XorOut => "XOROUT",
            LogicOperator::AtMostOne => "ATMOSTONE",
            LogicOperator::Or => "OR",
            LogicOperator::OrOut => "OROUT",
            LogicOperator::AndOut => "ANDOUT",
            LogicOperator::Imply => "IMPLY",
        };
        write!(f, "{name}")
    }
}

impl FromStr for LogicOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xor" => Ok(LogicOperator::Xor),
            "xorout" => Ok(LogicOperator::XorOut),
            "atmostone" => Ok(LogicOperator::AtMostOne),
            "or" => Ok(LogicOperator::Or),
            "orout" => Ok(LogicOperator::OrOut),
            "andout" => Ok(LogicOperator::AndOut),
            "imply" => Ok(LogicOperator::Imply),
            _ => Err(format!("unknown logic operator '{s}'")),
        }
    }
}

/// Every operator is one of these four constraints once some of its literals are negated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Constraint {
    ExactlyOne,
    AtMostOne,
    AtLeastOne,
    /// The last literal is the disjunction of the others.
    OrOutput,
}

/// A hard logic constraint with a closed-form projection and MAP oracle.
#[derive(Clone, Debug)]
pub(crate) struct LogicFactor {
    constraint: Constraint,
    /// Literals which are negated when rewriting the operator to its [`Constraint`].
    flipped: Box<[bool]>,
}

impl LogicFactor {
    pub(crate) fn new(operator: LogicOperator, arity: usize) -> Self {
        let last = arity.saturating_sub(1);
        let (constraint, flipped): (Constraint, Box<[bool]>) = match operator {
            LogicOperator::Xor => (Constraint::ExactlyOne, vec![false; arity].into()),
            LogicOperator::AtMostOne => (Constraint::AtMostOne, vec![false; arity].into()),
            LogicOperator::Or => (Constraint::AtLeastOne, vec![false; arity].into()),
            LogicOperator::OrOut => (Constraint::OrOutput, vec![false; arity].into()),
            LogicOperator::XorOut => (
                Constraint::ExactlyOne,
                (0..arity).map(|index| index == last).collect(),
            ),
            LogicOperator::Imply => (
                Constraint::AtLeastOne,
                (0..arity).map(|index| index != last).collect(),
            ),
            LogicOperator::AndOut => (Constraint::OrOutput, vec![true; arity].into()),
        };

        LogicFactor {
            constraint,
            flipped,
        }
    }

    fn is_satisfied(&self, values: &[bool]) -> bool {
        let num_true = values.iter().filter(|value| **value).count();
        match self.constraint {
            Constraint::ExactlyOne => num_true == 1,
            Constraint::AtMostOne => num_true <= 1,
            Constraint::AtLeastOne => num_true >= 1,
            Constraint::OrOutput => match values.split_last() {
                Some((output, inputs)) => *output == inputs.iter().any(|input| *input),
                None => true,
            },
        }
    }
}

/// The value of the best assignment which sets at least one literal to true.
fn best_covering_value(scores: &[f64]) -> f64 {
    let positive_sum: f64 = scores.iter().filter(|score| **score > 0.0).sum();
    if scores.iter().any(|score| *score > 0.0) {
        positive_sum
    } else {
        scores.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

impl Subproblem for LogicFactor {
    fn project(
        &mut self,
        target: &[f64],
        _additional_scores: &[f64],
        posteriors: &mut [f64],
        _additional_posteriors: &mut [f64],
    ) -> usize {
        for ((posterior, &value), &flipped) in
            posteriors.iter_mut().zip(target).zip(self.flipped.iter())
        {
            *posterior = if flipped { 1.0 - value } else { value };
        }

        match self.constraint {
            Constraint::ExactlyOne => project_onto_simplex(posteriors),
            Constraint::AtMostOne => project_onto_budget_polytope(posteriors, 1.0),
            Constraint::AtLeastOne => project_onto_covering_polytope(posteriors),
            Constraint::OrOutput => {
                if let Some((output, inputs)) = posteriors.split_last_mut() {
                    project_onto_or_output_polytope(inputs, output);
                }
            }
        }
        // guard against round-off leaving the box
        clip_to_unit_box(posteriors);

        for (posterior, &flipped) in posteriors.iter_mut().zip(self.flipped.iter()) {
            if flipped {
                *posterior = 1.0 - *posterior;
            }
        }

        0
    }

    fn maximize(&self, scores: &[f64], _additional_scores: &[f64]) -> f64 {
        let mut constant = 0.0;
        let literal_scores = scores
            .iter()
            .zip(self.flipped.iter())
            .map(|(&score, &flipped)| {
                if flipped {
                    constant += score;
                    -score
                } else {
                    score
                }
            })
            .collect::<Vec<_>>();

        let best_single = literal_scores
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let value = match self.constraint {
            Constraint::ExactlyOne => best_single,
            Constraint::AtMostOne => best_single.max(0.0),
            Constraint::AtLeastOne => best_covering_value(&literal_scores),
            Constraint::OrOutput => match literal_scores.split_last() {
                Some((output, inputs)) => (output + best_covering_value(inputs)).max(0.0),
                None => 0.0,
            },
        };

        constant + value
    }

    fn evaluate(
        &self,
        assignment: &[bool],
        _additional_scores: &[f64],
        _additional_posteriors: &mut [f64],
    ) -> Option<f64> {
        let values = assignment
            .iter()
            .zip(self.flipped.iter())
            .map(|(&value, &flipped)| value != flipped)
            .collect::<Vec<_>>();

        self.is_satisfied(&values).then_some(0.0)
    }
}
