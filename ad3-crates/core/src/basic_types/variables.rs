use std::fmt::Display;
use std::fmt::Formatter;
use std::ops::Not;

use crate::containers::StorageKey;

/// A handle to a binary variable of a [`FactorGraph`](crate::FactorGraph).
///
/// Every state of a [`MultiVariable`] is itself a [`BinaryVariable`]; the handle is only
/// meaningful for the graph which created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinaryVariable {
    id: u32,
}

impl BinaryVariable {
    pub(crate) fn new(id: u32) -> Self {
        BinaryVariable { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// The positive [`Literal`] over this variable.
    pub fn literal(self) -> Literal {
        Literal::new(self, false)
    }

    /// The negative [`Literal`] over this variable; equivalent to `!variable`.
    pub fn negated(self) -> Literal {
        Literal::new(self, true)
    }
}

impl StorageKey for BinaryVariable {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        BinaryVariable { id: index as u32 }
    }
}

impl Display for BinaryVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.id)
    }
}

impl Not for BinaryVariable {
    type Output = Literal;

    fn not(self) -> Self::Output {
        self.negated()
    }
}

/// A [`BinaryVariable`] which is possibly negated.
///
/// Factors are declared over literals; a negated literal contributes `1 - x` wherever the factor
/// would otherwise use `x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    variable: BinaryVariable,
    negated: bool,
}

impl Literal {
    pub fn new(variable: BinaryVariable, negated: bool) -> Self {
        Literal { variable, negated }
    }

    pub fn variable(&self) -> BinaryVariable {
        self.variable
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Returns the truth value of the literal when its variable takes `value`.
    pub fn evaluate(&self, value: bool) -> bool {
        value != self.negated
    }
}

impl From<BinaryVariable> for Literal {
    fn from(variable: BinaryVariable) -> Self {
        variable.literal()
    }
}

impl Not for Literal {
    type Output = Literal;

    fn not(self) -> Self::Output {
        Literal {
            variable: self.variable,
            negated: !self.negated,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "!{}", self.variable)
        } else {
            write!(f, "{}", self.variable)
        }
    }
}

/// A handle to a variable with `num_states` mutually exclusive states.
///
/// The states are consecutive [`BinaryVariable`]s; exactly one of them is true in any
/// feasible assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MultiVariable {
    id: u32,
    first_state: BinaryVariable,
    num_states: u32,
}

impl MultiVariable {
    pub(crate) fn new(id: u32, first_state: BinaryVariable, num_states: u32) -> Self {
        MultiVariable {
            id,
            first_state,
            num_states,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn num_states(&self) -> usize {
        self.num_states as usize
    }

    /// Returns the binary variable which indicates whether this variable takes state `state`.
    ///
    /// # Panics
    /// If `state` is not smaller than [`MultiVariable::num_states`].
    pub fn state(&self, state: usize) -> BinaryVariable {
        assert!(
            state < self.num_states(),
            "state {state} is out of range for a variable with {} states",
            self.num_states
        );
        BinaryVariable::new(self.first_state.id + state as u32)
    }

    /// Returns the binary variable of state `state` if it exists.
    pub fn get_state(&self, state: usize) -> Option<BinaryVariable> {
        (state < self.num_states()).then(|| BinaryVariable::new(self.first_state.id + state as u32))
    }

    pub fn states(&self) -> impl Iterator<Item = BinaryVariable> + '_ {
        (0..self.num_states).map(|offset| BinaryVariable::new(self.first_state.id + offset))
    }

    pub(crate) fn first_state(&self) -> BinaryVariable {
        self.first_state
    }
}

/// A handle to a factor declared in a [`FactorGraph`](crate::FactorGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactorId {
    id: u32,
}

impl FactorId {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl StorageKey for FactorId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        FactorId { id: index as u32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_negation_restores_the_literal() {
        let variable = BinaryVariable::new(3);

        assert!((!variable).is_negated());
        assert_eq!(!!variable, variable.literal());
        assert_eq!(Literal::from(variable), variable.literal());
    }

    #[test]
    fn literal_evaluation_respects_negation() {
        let variable = BinaryVariable::new(0);

        assert!(variable.literal().evaluate(true));
        assert!(!variable.literal().evaluate(false));
        assert!((!variable).evaluate(false));
    }

    #[test]
    fn states_of_a_multi_variable_are_consecutive() {
        let multi = MultiVariable::new(0, BinaryVariable::new(4), 3);

        let states = multi.states().map(|state| state.id()).collect::<Vec<_>>();

        assert_eq!(states, vec![4, 5, 6]);
        assert_eq!(multi.state(2).id(), 6);
        assert_eq!(multi.get_state(3), None);
    }

    #[test]
    #[should_panic]
    fn out_of_range_state_panics() {
        let multi = MultiVariable::new(0, BinaryVariable::new(0), 2);

        let _ = multi.state(2);
    }
}
