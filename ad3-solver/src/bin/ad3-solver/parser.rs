//! A parser for the line-based `.fg` format of factor graphs.
//!
//! Every non-empty line declares a variable or a factor; everything after a `#` is a comment.
//!
//! ```text
//! binary <name> <log_potential>
//! multi <name> <lp_0> ... <lp_{k-1}>
//! xor|xorout|atmostone|or|orout|andout|imply <literal>...
//! pair <literal> <literal> <edge_log_potential>
//! budget <budget> <literal>...
//! knapsack <budget> <literal>:<cost>...
//! dense <multi>... : <weight>...
//! matching <rows> <cols> <literal>...
//! segmentation <length> <literal>... : <transition>...
//! ```
//!
//! A literal is the name of a binary variable or `name[k]` for state `k` of a multi-state
//! variable, optionally prefixed with `!` for its negation. Variables have to be declared before
//! they are used.
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::str::FromStr;

use ad3_solver::BinaryVariable;
use ad3_solver::ConstructionError;
use ad3_solver::FactorDefinition;
use ad3_solver::FactorGraph;
use ad3_solver::Literal;
use ad3_solver::LogicOperator;
use ad3_solver::MultiVariable;
use fnv::FnvHashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ParseError {
    #[error("failed to read file")]
    Io(#[from] std::io::Error),

    #[error("line {line}: '{keyword}' is not a known declaration")]
    UnknownDeclaration { line: usize, keyword: String },

    #[error("line {line}: '{token}' is not a valid {expected}")]
    InvalidNumber {
        line: usize,
        token: String,
        expected: &'static str,
    },

    #[error("line {line}: expected {expected} arguments, but got {actual}")]
    ArgumentCount {
        line: usize,
        expected: &'static str,
        actual: usize,
    },

    #[error("line {line}: '{token}' is an invalid literal")]
    InvalidLiteral { line: usize, token: String },

    #[error("line {line}: '{name}' is not a declared variable")]
    UnknownVariable { line: usize, name: String },

    #[error("line {line}: the name '{name}' is already in use")]
    DuplicateName { line: usize, name: String },

    #[error("line {line}: {source}")]
    Declaration {
        line: usize,
        #[source]
        source: ConstructionError,
    },
}

/// A variable as it is referred to in the file.
#[derive(Clone, Copy, Debug)]
pub(crate) enum NamedVariable {
    Binary(BinaryVariable),
    Multi(MultiVariable),
}

/// The parsed factor graph, together with the variables in declaration order.
#[derive(Debug)]
pub(crate) struct ParsedFactorGraph {
    pub(crate) graph: FactorGraph,
    pub(crate) variables: Vec<(String, NamedVariable)>,
}

pub(crate) fn parse_factor_graph(source: impl Read) -> Result<ParsedFactorGraph, ParseError> {
    let mut parser = Parser::default();

    for (index, line) in BufReader::new(source).lines().enumerate() {
        let line = line?;
        let content = match line.split_once('#') {
            Some((content, _)) => content,
            None => &line,
        };
        let tokens = content.split_whitespace().collect::<Vec<_>>();
        if let Some((keyword, arguments)) = tokens.split_first() {
            parser.line = index + 1;
            parser.parse_declaration(keyword, arguments)?;
        }
    }

    Ok(ParsedFactorGraph {
        graph: parser.graph,
        variables: parser.variables,
    })
}

#[derive(Debug, Default)]
struct Parser {
    graph: FactorGraph,
    variables: Vec<(String, NamedVariable)>,
    names: FnvHashMap<String, NamedVariable>,
    line: usize,
}

impl Parser {
    fn parse_declaration(&mut self, keyword: &str, arguments: &[&str]) -> Result<(), ParseError> {
        match keyword {
            "binary" => {
                let [name, log_potential] = arguments else {
                    return Err(self.argument_count("2", arguments.len()));
                };
                let log_potential = self.number(log_potential)?;

                let variable = self.graph.create_binary_variable();
                self.graph
                    .set_log_potential(variable, log_potential)
                    .map_err(|source| self.declaration_error(source))?;
                self.add_name(name, NamedVariable::Binary(variable))
            }
            "multi" => {
                let Some((name, log_potentials)) = arguments.split_first() else {
                    return Err(self.argument_count("at least 2", 0));
                };
                let log_potentials = self.numbers(log_potentials)?;

                let variable = self
                    .graph
                    .create_multi_variable(log_potentials.len())
                    .map_err(|source| self.declaration_error(source))?;
                for (state, log_potential) in log_potentials.into_iter().enumerate() {
                    self.graph
                        .set_state_log_potential(variable, state, log_potential)
                        .map_err(|source| self.declaration_error(source))?;
                }
                self.add_name(name, NamedVariable::Multi(variable))
            }
            "pair" => {
                let [first, second, edge_log_potential] = arguments else {
                    return Err(self.argument_count("3", arguments.len()));
                };
                let definition = FactorDefinition::Pair {
                    first: self.literal(first)?,
                    second: self.literal(second)?,
                    edge_log_potential: self.number(edge_log_potential)?,
                };
                self.declare(definition)
            }
            "budget" => {
                let Some((budget, literals)) = arguments.split_first() else {
                    return Err(self.argument_count("at least 1", 0));
                };
                let definition = FactorDefinition::Budget {
                    budget: self.integer(budget)?,
                    literals: self.literals(literals)?,
                };
                self.declare(definition)
            }
            "knapsack" => {
                let Some((budget, items)) = arguments.split_first() else {
                    return Err(self.argument_count("at least 1", 0));
                };
                let budget = self.number(budget)?;
                let mut literals = Vec::with_capacity(items.len());
                let mut costs = Vec::with_capacity(items.len());
                for item in items {
                    let Some((literal, cost)) = item.rsplit_once(':') else {
                        return Err(ParseError::InvalidLiteral {
                            line: self.line,
                            token: (*item).to_owned(),
                        });
                    };
                    literals.push(self.literal(literal)?);
                    costs.push(self.number(cost)?);
                }
                self.declare(FactorDefinition::Knapsack {
                    literals,
                    costs,
                    budget,
                })
            }
            "dense" => {
                let (variables, log_potentials) = self.split_at_colon(arguments)?;
                let variables = variables
                    .iter()
                    .map(|name| self.multi_variable(name))
                    .collect::<Result<Vec<_>, _>>()?;
                let definition = FactorDefinition::Dense {
                    variables,
                    log_potentials: self.numbers(log_potentials)?,
                };
                self.declare(definition)
            }
            "matching" => {
                let [num_rows, num_columns, variables @ ..] = arguments else {
                    return Err(self.argument_count("at least 2", arguments.len()));
                };
                let definition = FactorDefinition::Matching {
                    num_rows: self.integer(num_rows)?,
                    num_columns: self.integer(num_columns)?,
                    variables: self.binary_variables(variables)?,
                };
                self.declare(definition)
            }
            "segmentation" => {
                let Some((length, arguments)) = arguments.split_first() else {
                    return Err(self.argument_count("at least 1", 0));
                };
                let length = self.integer(length)?;
                let (variables, transitions) = self.split_at_colon(arguments)?;
                let definition = FactorDefinition::Segmentation {
                    variables: self.binary_variables(variables)?,
                    length,
                    transitions: self.numbers(transitions)?,
                };
                self.declare(definition)
            }
            keyword => match LogicOperator::from_str(keyword) {
                Ok(operator) => {
                    let definition = FactorDefinition::Logic {
                        operator,
                        literals: self.literals(arguments)?,
                    };
                    self.declare(definition)
                }
                Err(_) => Err(ParseError::UnknownDeclaration {
                    line: self.line,
                    keyword: keyword.to_owned(),
                }),
            },
        }
    }

    fn declare(&mut self, definition: FactorDefinition) -> Result<(), ParseError> {
        let _ = self
            .graph
            .declare_factor(definition)
            .map_err(|source| self.declaration_error(source))?;
        Ok(())
    }

    fn declaration_error(&self, source: ConstructionError) -> ParseError {
        ParseError::Declaration {
            line: self.line,
            source,
        }
    }

    fn argument_count(&self, expected: &'static str, actual: usize) -> ParseError {
        ParseError::ArgumentCount {
            line: self.line,
            expected,
            actual,
        }
    }

    fn add_name(&mut self, name: &str, variable: NamedVariable) -> Result<(), ParseError> {
        if self.names.contains_key(name) {
            return Err(ParseError::DuplicateName {
                line: self.line,
                name: name.to_owned(),
            });
        }
        let _ = self.names.insert(name.to_owned(), variable);
        self.variables.push((name.to_owned(), variable));
        Ok(())
    }

    fn number(&self, token: &str) -> Result<f64, ParseError> {
        token.parse().map_err(|_| ParseError::InvalidNumber {
            line: self.line,
            token: token.to_owned(),
            expected: "number",
        })
    }

    fn numbers(&self, tokens: &[&str]) -> Result<Vec<f64>, ParseError> {
        tokens.iter().map(|token| self.number(token)).collect()
    }

    fn integer(&self, token: &str) -> Result<usize, ParseError> {
        token.parse().map_err(|_| ParseError::InvalidNumber {
            line: self.line,
            token: token.to_owned(),
            expected: "non-negative integer",
        })
    }

    /// Splits the arguments around a single `:` token.
    fn split_at_colon<'a>(
        &self,
        arguments: &'a [&'a str],
    ) -> Result<(&'a [&'a str], &'a [&'a str]), ParseError> {
        match arguments.iter().position(|token| *token == ":") {
            Some(position) => Ok((&arguments[..position], &arguments[position + 1..])),
            None => Err(ParseError::InvalidLiteral {
                line: self.line,
                token: arguments.join(" "),
            }),
        }
    }

    fn lookup(&self, name: &str) -> Result<NamedVariable, ParseError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ParseError::UnknownVariable {
                line: self.line,
                name: name.to_owned(),
            })
    }

    fn multi_variable(&self, name: &str) -> Result<MultiVariable, ParseError> {
        match self.lookup(name)? {
            NamedVariable::Multi(variable) => Ok(variable),
            NamedVariable::Binary(_) => Err(ParseError::InvalidLiteral {
                line: self.line,
                token: name.to_owned(),
            }),
        }
    }

    fn literal(&self, token: &str) -> Result<Literal, ParseError> {
        let (negated, reference) = match token.strip_prefix('!') {
            Some(reference) => (true, reference),
            None => (false, token),
        };
        let invalid = || ParseError::InvalidLiteral {
            line: self.line,
            token: token.to_owned(),
        };

        let variable = match reference.strip_suffix(']').and_then(|r| r.split_once('[')) {
            Some((name, state)) => {
                let state = self.integer(state)?;
                let variable = self.multi_variable(name)?;
                variable
                    .get_state(state)
                    .ok_or_else(|| {
                        self.declaration_error(ConstructionError::StateOutOfRange {
                            state,
                            num_states: variable.num_states(),
                        })
                    })?
            }
            None => match self.lookup(reference)? {
                NamedVariable::Binary(variable) => variable,
                NamedVariable::Multi(_) => return Err(invalid()),
            },
        };

        Ok(Literal::new(variable, negated))
    }

    fn literals(&self, tokens: &[&str]) -> Result<Vec<Literal>, ParseError> {
        tokens.iter().map(|token| self.literal(token)).collect()
    }

    /// Parses literals which may not be negated.
    fn binary_variables(&self, tokens: &[&str]) -> Result<Vec<BinaryVariable>, ParseError> {
        tokens
            .iter()
            .map(|token| {
                let literal = self.literal(token)?;
                if literal.is_negated() {
                    Err(ParseError::InvalidLiteral {
                        line: self.line,
                        token: (*token).to_owned(),
                    })
                } else {
                    Ok(literal.variable())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ad3_solver::results::SolverStatus;
    use ad3_solver::SolverOptions;

    use super::*;

    fn parse(source: &str) -> Result<ParsedFactorGraph, ParseError> {
        parse_factor_graph(source.as_bytes())
    }

    #[test]
    fn variables_are_declared_in_order() {
        let parsed = parse("binary a 1.5\nmulti b 0 1 2\n").expect("valid instance");

        assert_eq!(parsed.graph.num_binary_variables(), 4);
        assert_eq!(parsed.graph.num_multi_variables(), 1);
        let names = parsed
            .variables
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let source = "# a comment\n\nbinary a 1 # trailing comment\n   \nbinary b -1\nor a b\n";
        let parsed = parse(source).expect("valid instance");

        assert_eq!(parsed.graph.num_binary_variables(), 2);
        assert_eq!(parsed.graph.num_factors(), 1);
    }

    #[test]
    fn literals_may_refer_to_states_and_be_negated() {
        let source = "multi m 0 0 0\nbinary a 0\nimply !m[2] a\n";
        let parsed = parse(source).expect("valid instance");

        assert_eq!(parsed.graph.num_factors(), 1);
    }

    #[test]
    fn every_factor_type_is_parsed() {
        let source = "\
binary a 1
binary b 2
binary c 3
multi x 0 1
multi y 1 0
xorout a b c
pair a !b 0.5
budget 2 a b c
knapsack 3 a:1 b:2 c:3
dense x y : 0 1 2 3
matching 1 3 a b c
binary s0 0
binary s1 0
binary s2 0
segmentation 2 s0 s1 s2 : 0.5
";
        let parsed = parse(source).expect("valid instance");

        assert_eq!(parsed.graph.num_factors(), 7);
    }

    #[test]
    fn non_numeric_parameters_are_reported() {
        let error = parse("binary a 1\nknapsack 3 a:cheap\n").expect_err("invalid cost");

        assert!(matches!(error, ParseError::InvalidNumber { line: 2, .. }));
    }

    #[test]
    fn wrong_argument_counts_are_reported() {
        let error = parse("binary a\n").expect_err("missing log-potential");

        assert!(matches!(
            error,
            ParseError::ArgumentCount {
                line: 1,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn undeclared_variables_are_reported() {
        let error = parse("binary a 1\nxor a b\n").expect_err("unknown variable");

        assert!(matches!(
            error,
            ParseError::UnknownVariable { line: 2, ref name } if name == "b"
        ));
    }

    #[test]
    fn names_are_unique() {
        let error = parse("binary a 1\nmulti a 1 2\n").expect_err("duplicate name");

        assert!(matches!(error, ParseError::DuplicateName { line: 2, .. }));
    }

    #[test]
    fn unknown_declarations_are_reported() {
        let error = parse("binary a 1\nnand a\n").expect_err("unknown keyword");

        assert!(matches!(
            error,
            ParseError::UnknownDeclaration { line: 2, ref keyword } if keyword == "nand"
        ));
    }

    #[test]
    fn declaration_errors_carry_the_line() {
        let error = parse("binary a 1\nbinary b 1\nknapsack 3 a:1 b:0.5\n").expect_err("bad cost");

        assert!(matches!(
            error,
            ParseError::Declaration {
                line: 3,
                source: ConstructionError::InvalidParameterType { .. }
            }
        ));
    }

    #[test]
    fn out_of_range_states_are_reported() {
        let error = parse("multi m 0 0\nbinary a 0\nor m[2] a\n").expect_err("no third state");

        assert!(matches!(
            error,
            ParseError::Declaration {
                line: 3,
                source: ConstructionError::StateOutOfRange {
                    state: 2,
                    num_states: 2
                }
            }
        ));
    }

    #[test]
    fn parsed_graph_can_be_solved() {
        let source = "binary a 1\nbinary b 2\nbinary c 0.5\nxor a b c\n";
        let mut parsed = parse(source).expect("valid instance");

        let result = parsed.graph.solve(SolverOptions::default());

        assert_eq!(result.status, SolverStatus::Integral);
        assert_eq!(result.marginals, vec![0.0, 1.0, 0.0]);
    }
}
