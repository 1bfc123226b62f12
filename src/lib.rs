//! Metaheuristic optimization engine for engineering design problems.
//!
//! A caller describes design variables, objectives and constraints as a
//! [`Problem`], then hands it to [`optimize`]. One objective runs a genetic
//! algorithm (or a particle swarm), several objectives run NSGA-II and return
//! a Pareto front with its trade-off analysis.
//!
//! ```no_run
//! use hvac_optimizer::{optimize, Constraint, Objective, Problem, ValidationError, Variable};
//!
//! # fn main() -> Result<(), ValidationError> {
//! let problem = Problem::builder()
//!     .variable(Variable::continuous("diameter", 0.1, 0.8))
//!     .variable(Variable::discrete("roughness", [0.00015, 0.0009, 0.003]))
//!     .objective(Objective::minimize("pressure_loss", |x: &[f64]| {
//!         (1.0 + 100.0 * x[1]) / x[0].powi(5)
//!     }))
//!     .constraint(Constraint::inequality("velocity", |x: &[f64]| {
//!         0.5 / (std::f64::consts::FRAC_PI_4 * x[0] * x[0]) - 8.0
//!     }))
//!     .build();
//!
//! let result = optimize(&problem)?;
//! println!("{:?}", result.best_value("diameter"));
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod archive;
mod cancellation;
pub mod crowding;
mod ens_nondominating_sorting;
pub mod error;
mod evaluation;
pub mod individual;
mod operators;
pub mod optimizers;
pub mod orchestrator;
pub mod problem;
pub mod result;
pub mod termination;

pub use cancellation::CancellationToken;
pub use ens_nondominating_sorting::ens_nondominated_sorting;
pub use error::{EvaluationFailure, ProblemDefect, ValidationError};
pub use orchestrator::{optimize, optimize_with_cancellation, validate, OptimizerFactory};
pub use problem::{
    Algorithm, AlgorithmSettings, Constraint, ConstraintHandling, ConstraintKind, ConvergenceCriteria,
    Direction, Domain, Objective, Parallelization, Problem, ProblemBuilder, RunSettings, SelectionMethod, Variable,
    VariableKind,
};
pub use result::{OptimizationResult, ParetoFront, Solution, Statistics, Status, TradeoffAnalysis, Warning};
