use serde::{Deserialize, Serialize};

use crate::problem::Algorithm;

/// A structural defect in a [`Problem`](crate::problem::Problem) definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProblemDefect {
    #[error("problem defines no variables")]
    NoVariables,
    #[error("problem defines no objectives")]
    NoObjectives,
    #[error("variable id `{id}` is defined more than once")]
    DuplicateVariableId { id: String },
    #[error("variable `{id}` has inverted bounds: min = {min}, max = {max}")]
    InvertedBounds { id: String, min: f64, max: f64 },
    #[error("variable `{id}` has a non-finite bound")]
    NonFiniteBound { id: String },
    #[error("discrete variable `{id}` has an empty value set")]
    EmptyDiscreteSet { id: String },
    #[error("discrete variable `{id}` contains a non-finite value")]
    NonFiniteDiscreteValue { id: String },
    #[error("current value {value} of variable `{id}` lies outside its domain")]
    InitialValueOutOfDomain { id: String, value: f64 },
    #[error("objective `{id}` has an invalid weight: {weight}")]
    InvalidWeight { id: String, weight: f64 },
    #[error("setting `{name}` has an invalid value: {value}")]
    InvalidSetting { name: &'static str, value: f64 },
}

impl ProblemDefect {
    pub(crate) fn invalid_setting(name: &'static str, value: impl Into<f64>) -> Self {
        Self::InvalidSetting {
            name,
            value: value.into(),
        }
    }
}

/// Fatal errors raised before any generation runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("InvalidProblem: {0}")]
    InvalidProblem(#[from] ProblemDefect),
    #[error("UnsupportedAlgorithm: {algorithm} cannot optimize {objectives} objective(s) as configured")]
    UnsupportedAlgorithm {
        algorithm: Algorithm,
        objectives: usize,
    },
}

/// An objective or constraint evaluator that misbehaved for one individual.
///
/// These never abort a run: the individual is penalized and flagged instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum EvaluationFailure {
    #[error("evaluator `{id}` panicked: {message}")]
    Panicked { id: String, message: String },
    #[error("evaluator `{id}` returned a non-finite value: {value}")]
    NonFinite { id: String, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_formats_problem_defects_inside_validation_errors() {
        let error: ValidationError = ProblemDefect::InvertedBounds {
            id: "diameter".to_string(),
            min: 2.0,
            max: 1.0,
        }
        .into();

        assert_eq!(
            error.to_string(),
            "InvalidProblem: variable `diameter` has inverted bounds: min = 2, max = 1"
        );
    }

    #[test]
    fn it_formats_unsupported_algorithm() {
        let error = ValidationError::UnsupportedAlgorithm {
            algorithm: Algorithm::Nsga2,
            objectives: 1,
        };

        assert!(error.to_string().starts_with("UnsupportedAlgorithm: NSGA-II"));
    }
}
