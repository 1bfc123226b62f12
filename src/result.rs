use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EvaluationFailure;
use crate::individual::Individual;
use crate::problem::{Algorithm, Problem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The run converged
    Success,
    /// A usable best-effort answer: iteration limit, cancellation or no feasible design
    Partial,
    /// Every evaluation failed; the result carries no meaningful design
    Failed,
}

/// One evaluated design, reported in the caller's terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Variable values in declaration order
    pub variables: Vec<f64>,
    /// Objective values with the caller's sign, maximized objectives included
    pub objectives: Vec<f64>,
    /// Penalized scalar fitness (lower is better)
    pub fitness: f64,
    pub constraint_violation: f64,
    pub feasible: bool,
    pub failure: Option<EvaluationFailure>,
}

impl Solution {
    pub(crate) fn from_individual(problem: &Problem, individual: &Individual) -> Self {
        Solution {
            variables: individual.genome().to_vec(),
            objectives: individual
                .objectives()
                .iter()
                .zip(problem.objectives())
                .map(|(value, objective)| objective.direction().normalize(*value))
                .collect(),
            fitness: individual.fitness(),
            constraint_violation: individual.violation(),
            feasible: individual.is_feasible(),
            failure: individual.failure.clone(),
        }
    }
}

/// Mutually non-dominated designs with quality indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoFront {
    pub solutions: Vec<Solution>,
    /// Volume dominated by the front up to `reference_point`, in minimization space
    pub hypervolume: f64,
    /// Minimization-space reference point used for the hypervolume
    pub reference_point: Vec<f64>,
    /// Standard deviation of nearest-neighbour distances; 0 is perfectly even
    pub spacing: f64,
}

/// Trade-off summary of a Pareto front. Indices point into [`ParetoFront::solutions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeoffAnalysis {
    /// Best value of each objective over the front, caller's sign
    pub utopia_point: Vec<f64>,
    /// Worst value of each objective over the front, caller's sign
    pub nadir_point: Vec<f64>,
    /// Knee points, strongest first
    pub knee_points: Vec<usize>,
    /// Member closest to the utopia point
    pub compromise: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub execution_time: Duration,
    pub total_evaluations: usize,
    /// Generations evaluated, the initial population included
    pub generations_run: usize,
    pub failed_evaluations: usize,
    /// Seed of the run; pass it back through the settings to replay the run
    pub seed: u64,
    /// Best fitness (single objective) or archive hypervolume (multi-objective) per generation
    pub convergence_history: Vec<f64>,
}

/// Non-fatal conditions reported alongside the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// The iteration limit was reached before the run converged
    ConvergenceFailure { generations: usize },
    /// No evaluated design satisfied every constraint
    InfeasibleProblem { least_violation: f64 },
    /// Some evaluators panicked or returned non-finite values
    EvaluationFailures { count: usize },
    Cancelled { generation: usize },
}

/// Uniform outcome of every engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub status: Status,
    pub algorithm: Algorithm,
    pub variable_ids: Vec<String>,
    pub objective_ids: Vec<String>,
    /// The best design of a single-objective run, or the compromise member of a front
    pub best_solution: Option<Solution>,
    pub pareto_front: Option<ParetoFront>,
    pub statistics: Statistics,
    pub analysis: Option<TradeoffAnalysis>,
    pub warnings: Vec<Warning>,
}

impl OptimizationResult {
    /// Value of a variable in the best solution, looked up by id.
    pub fn best_value(&self, variable_id: &str) -> Option<f64> {
        let index = self.variable_ids.iter().position(|id| id == variable_id)?;

        self.best_solution
            .as_ref()
            .and_then(|solution| solution.variables.get(index).copied())
    }

    pub fn is_feasible(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|warning| matches!(warning, Warning::InfeasibleProblem { .. }))
    }
}
