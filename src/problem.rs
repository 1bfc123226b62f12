pub mod settings;
pub mod variable;

use std::fmt::{Debug, Formatter};

use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};

pub use settings::{
    Algorithm, AlgorithmSettings, ConstraintHandling, ConvergenceCriteria, Parallelization,
    RunSettings, SelectionMethod,
};
pub use variable::{Domain, Variable, VariableKind};

/// An objective function over the variable vector, in variable declaration order.
///
/// Implementations must be deterministic and free of side effects: they are
/// called `population_size * generations` times, possibly from several threads.
pub trait ObjectiveFunction: DynClone + Send + Sync {
    fn evaluate(&self, variables: &[f64]) -> f64;
}

dyn_clone::clone_trait_object!(ObjectiveFunction);

impl<F> ObjectiveFunction for F
where
    F: Fn(&[f64]) -> f64 + Clone + Send + Sync,
{
    fn evaluate(&self, variables: &[f64]) -> f64 {
        self(variables)
    }
}

/// A constraint function over the variable vector.
///
/// A result `> 0` means the constraint is violated by that magnitude,
/// `<= 0` means it is satisfied.
pub trait ConstraintFunction: DynClone + Send + Sync {
    fn evaluate(&self, variables: &[f64]) -> f64;
}

dyn_clone::clone_trait_object!(ConstraintFunction);

impl<F> ConstraintFunction for F
where
    F: Fn(&[f64]) -> f64 + Clone + Send + Sync,
{
    fn evaluate(&self, variables: &[f64]) -> f64 {
        self(variables)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// Map a caller-facing value into the minimization space the engines work in.
    ///
    /// The mapping is its own inverse.
    pub(crate) fn normalize(&self, value: f64) -> f64 {
        match self {
            Direction::Minimize => value,
            Direction::Maximize => -value,
        }
    }
}

#[derive(Clone)]
pub struct Objective {
    id: String,
    direction: Direction,
    weight: Option<f64>,
    function: Box<dyn ObjectiveFunction>,
}

impl Objective {
    pub fn new<F>(id: impl Into<String>, direction: Direction, function: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Clone + Send + Sync + 'static,
    {
        Objective {
            id: id.into(),
            direction,
            weight: None,
            function: Box::new(function),
        }
    }

    pub fn minimize<F>(id: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Clone + Send + Sync + 'static,
    {
        Self::new(id, Direction::Minimize, function)
    }

    pub fn maximize<F>(id: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Clone + Send + Sync + 'static,
    {
        Self::new(id, Direction::Maximize, function)
    }

    /// Use a custom [`ObjectiveFunction`] implementation.
    pub fn from_function(
        id: impl Into<String>,
        direction: Direction,
        function: Box<dyn ObjectiveFunction>,
    ) -> Self {
        Objective {
            id: id.into(),
            direction,
            weight: None,
            function,
        }
    }

    /// Weight used when several objectives are aggregated into one fitness value
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    pub fn function(&self) -> &dyn ObjectiveFunction {
        self.function.as_ref()
    }
}

impl Debug for Objective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Objective")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Satisfied when `g(x) <= 0`
    Inequality,
    /// Satisfied when `|g(x)| <= equality_tolerance`
    Equality,
}

#[derive(Clone)]
pub struct Constraint {
    id: String,
    kind: ConstraintKind,
    function: Box<dyn ConstraintFunction>,
}

impl Constraint {
    pub fn inequality<F>(id: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Clone + Send + Sync + 'static,
    {
        Constraint {
            id: id.into(),
            kind: ConstraintKind::Inequality,
            function: Box::new(function),
        }
    }

    pub fn equality<F>(id: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Clone + Send + Sync + 'static,
    {
        Constraint {
            id: id.into(),
            kind: ConstraintKind::Equality,
            function: Box::new(function),
        }
    }

    pub fn from_function(
        id: impl Into<String>,
        kind: ConstraintKind,
        function: Box<dyn ConstraintFunction>,
    ) -> Self {
        Constraint {
            id: id.into(),
            kind,
            function,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn function(&self) -> &dyn ConstraintFunction {
        self.function.as_ref()
    }

    /// Violation magnitude for a raw constraint value; zero when satisfied
    pub(crate) fn violation(&self, value: f64, equality_tolerance: f64) -> f64 {
        match self.kind {
            ConstraintKind::Inequality => value.max(0.0),
            ConstraintKind::Equality => (value.abs() - equality_tolerance).max(0.0),
        }
    }
}

impl Debug for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Immutable description of an optimization problem.
///
/// ```no_run
/// use hvac_optimizer::{Constraint, Objective, Problem, Variable};
///
/// let problem = Problem::builder()
///     .variable(Variable::continuous("x", 0.0, 10.0))
///     .objective(Objective::minimize("f", |x: &[f64]| x[0] * x[0]))
///     .constraint(Constraint::inequality("x >= 5", |x: &[f64]| 5.0 - x[0]))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct Problem {
    variables: Vec<Variable>,
    objectives: Vec<Objective>,
    constraints: Vec<Constraint>,
    settings: AlgorithmSettings,
    convergence: ConvergenceCriteria,
}

impl Problem {
    pub fn builder() -> ProblemBuilder {
        ProblemBuilder::default()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn settings(&self) -> &AlgorithmSettings {
        &self.settings
    }

    pub fn convergence(&self) -> &ConvergenceCriteria {
        &self.convergence
    }

    /// Position of a variable in the variable vector handed to evaluators
    pub fn variable_index(&self, id: &str) -> Option<usize> {
        self.variables.iter().position(|variable| variable.id() == id)
    }

    /// The design formed by the variables' current values, if every variable has one
    pub(crate) fn initial_design(&self) -> Option<Vec<f64>> {
        self.variables.iter().map(Variable::value).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProblemBuilder {
    variables: Vec<Variable>,
    objectives: Vec<Objective>,
    constraints: Vec<Constraint>,
    settings: AlgorithmSettings,
    convergence: ConvergenceCriteria,
}

impl ProblemBuilder {
    pub fn variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn variables(mut self, variables: impl IntoIterator<Item = Variable>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn objective(mut self, objective: Objective) -> Self {
        self.objectives.push(objective);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn settings(mut self, settings: AlgorithmSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn convergence(mut self, convergence: ConvergenceCriteria) -> Self {
        self.convergence = convergence;
        self
    }

    /// Assemble the problem. Validation happens when the problem is optimized.
    pub fn build(self) -> Problem {
        Problem {
            variables: self.variables,
            objectives: self.objectives,
            constraints: self.constraints,
            settings: self.settings,
            convergence: self.convergence,
        }
    }
}
