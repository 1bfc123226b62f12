//! Single entry point: validate a [`Problem`], pick an engine, run it and
//! turn its outcome into an [`OptimizationResult`].

use std::collections::HashSet;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, instrument, warn};

use crate::analysis;
use crate::cancellation::CancellationToken;
use crate::error::{ProblemDefect, ValidationError};
use crate::individual::Individual;
use crate::optimizers::genetic::GeneticOptimizer;
use crate::optimizers::nsga2::NSGA2Optimizer;
use crate::optimizers::particle_swarm::ParticleSwarmOptimizer;
use crate::optimizers::{EngineOutcome, Optimizer};
use crate::problem::settings::validate_settings;
use crate::problem::{Algorithm, Problem, RunSettings};
use crate::result::{OptimizationResult, ParetoFront, Solution, Statistics, Status, TradeoffAnalysis, Warning};
use crate::termination::TerminationReason;

/// Check `problem` for structural defects and pick the algorithm to run.
///
/// Without an explicit algorithm one objective selects the genetic algorithm
/// and several objectives select NSGA-II.
pub fn validate(problem: &Problem) -> Result<Algorithm, ValidationError> {
    if problem.variables().is_empty() {
        return Err(ProblemDefect::NoVariables.into());
    }

    if problem.objectives().is_empty() {
        return Err(ProblemDefect::NoObjectives.into());
    }

    let mut ids = HashSet::with_capacity(problem.variables().len());
    for variable in problem.variables() {
        if !ids.insert(variable.id()) {
            return Err(ProblemDefect::DuplicateVariableId {
                id: variable.id().to_string(),
            }
            .into());
        }

        variable.validate()?;
    }

    for objective in problem.objectives() {
        if let Some(weight) = objective.weight() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ProblemDefect::InvalidWeight {
                    id: objective.id().to_string(),
                    weight,
                }
                .into());
            }
        }
    }

    validate_settings(problem.settings(), problem.convergence())?;

    let objectives = problem.objectives().len();
    let algorithm = problem.settings().algorithm.unwrap_or(if objectives > 1 {
        Algorithm::Nsga2
    } else {
        Algorithm::GeneticAlgorithm
    });

    let supported = match algorithm {
        Algorithm::Nsga2 => objectives >= 2,
        // Several objectives are only aggregated when every one carries a weight
        Algorithm::GeneticAlgorithm | Algorithm::ParticleSwarm => {
            objectives == 1 || problem.objectives().iter().all(|objective| objective.weight().is_some())
        }
    };

    if supported {
        Ok(algorithm)
    } else {
        Err(ValidationError::UnsupportedAlgorithm {
            algorithm,
            objectives,
        })
    }
}

/// Factory for creating engine instances based on the resolved settings
pub struct OptimizerFactory;

impl OptimizerFactory {
    pub fn create<'a>(problem: &'a Problem, settings: &'a RunSettings) -> Box<dyn Optimizer + 'a> {
        match settings.algorithm {
            Algorithm::GeneticAlgorithm => Box::new(GeneticOptimizer::new(problem, settings)),
            Algorithm::Nsga2 => Box::new(NSGA2Optimizer::new(problem, settings)),
            Algorithm::ParticleSwarm => Box::new(ParticleSwarmOptimizer::new(problem, settings)),
        }
    }
}

/// Optimize `problem` to termination.
///
/// Only a malformed problem is an error; evaluator failures, infeasibility
/// and non-convergence are reported through the result's status and warnings.
pub fn optimize(problem: &Problem) -> Result<OptimizationResult, ValidationError> {
    optimize_with_cancellation(problem, &CancellationToken::new())
}

/// Like [`optimize`], stopping early at the first generation boundary after
/// `cancellation` is triggered.
#[instrument(
    level = "info",
    skip_all,
    fields(
        variables = problem.variables().len(),
        objectives = problem.objectives().len(),
        constraints = problem.constraints().len()
    )
)]
pub fn optimize_with_cancellation(
    problem: &Problem,
    cancellation: &CancellationToken,
) -> Result<OptimizationResult, ValidationError> {
    let started = Instant::now();

    let settings = RunSettings::for_problem(problem).map_err(|error| {
        warn!(%error, "problem rejected");
        error
    })?;

    let mut optimizer = OptimizerFactory::create(problem, &settings);

    info!(
        algorithm = optimizer.name(),
        seed = settings.seed,
        workers = settings.workers,
        "starting optimization"
    );

    let outcome = optimizer.optimize(cancellation);

    let mut result = assemble(problem, &settings, outcome);
    result.statistics.execution_time = started.elapsed();

    info!(
        status = ?result.status,
        evaluations = result.statistics.total_evaluations,
        generations = result.statistics.generations_run,
        elapsed_ms = result.statistics.execution_time.as_millis() as u64,
        "optimization finished"
    );

    Ok(result)
}

struct Assembled {
    best_solution: Option<Solution>,
    pareto_front: Option<ParetoFront>,
    analysis: Option<TradeoffAnalysis>,
    feasible: bool,
    least_violation: f64,
}

fn assemble(problem: &Problem, settings: &RunSettings, outcome: EngineOutcome) -> OptimizationResult {
    let assembled = if settings.algorithm.is_multi_objective() {
        assemble_front(problem, settings, &outcome)
    } else {
        assemble_single(problem, &outcome)
    };

    let all_failed = outcome.evaluations > 0 && outcome.failed_evaluations == outcome.evaluations;
    let mut warnings = Vec::new();

    match outcome.termination {
        TerminationReason::Stagnation => (),
        TerminationReason::IterationLimit => warnings.push(Warning::ConvergenceFailure {
            generations: outcome.generations_run,
        }),
        TerminationReason::Cancelled => warnings.push(Warning::Cancelled {
            generation: outcome.generations_run,
        }),
    }

    if !assembled.feasible {
        warn!(
            least_violation = assembled.least_violation,
            "no feasible design found, returning the least infeasible"
        );
        warnings.push(Warning::InfeasibleProblem {
            least_violation: assembled.least_violation,
        });
    }

    if outcome.failed_evaluations > 0 {
        warnings.push(Warning::EvaluationFailures {
            count: outcome.failed_evaluations,
        });
    }

    let status = if all_failed {
        Status::Failed
    } else if !assembled.feasible || outcome.termination != TerminationReason::Stagnation {
        Status::Partial
    } else {
        Status::Success
    };

    OptimizationResult {
        status,
        algorithm: settings.algorithm,
        variable_ids: problem.variables().iter().map(|v| v.id().to_string()).collect(),
        objective_ids: problem.objectives().iter().map(|o| o.id().to_string()).collect(),
        best_solution: assembled.best_solution,
        pareto_front: assembled.pareto_front,
        statistics: Statistics {
            execution_time: Default::default(),
            total_evaluations: outcome.evaluations,
            generations_run: outcome.generations_run,
            failed_evaluations: outcome.failed_evaluations,
            seed: settings.seed,
            convergence_history: outcome.convergence_history,
        },
        analysis: assembled.analysis,
        warnings,
    }
}

fn assemble_single(problem: &Problem, outcome: &EngineOutcome) -> Assembled {
    let best = outcome.best.as_ref();

    Assembled {
        best_solution: best.map(|individual| Solution::from_individual(problem, individual)),
        pareto_front: None,
        analysis: None,
        feasible: best.map_or(false, Individual::is_feasible),
        least_violation: best.map_or(f64::INFINITY, Individual::violation),
    }
}

fn assemble_front(problem: &Problem, settings: &RunSettings, outcome: &EngineOutcome) -> Assembled {
    let mut members: Vec<&Individual> = outcome.front.iter().collect();
    members.sort_by(|a, b| {
        a.objectives
            .iter()
            .zip(&b.objectives)
            .map(|(x, y)| x.total_cmp(y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let points: Vec<Vec<f64>> = members.iter().map(|member| member.objectives.clone()).collect();
    let utopia = analysis::utopia_point(&points);
    let nadir = analysis::nadir_point(&points);

    let reference = outcome
        .reference_point
        .clone()
        .unwrap_or_else(|| analysis::reference_point(&utopia, &nadir, settings.reference_offset));

    let compromise = analysis::compromise_solution(&points, &settings.weights);
    let solutions: Vec<Solution> = members
        .iter()
        .map(|member| Solution::from_individual(problem, member))
        .collect();

    let to_caller = |point: Vec<f64>| -> Vec<f64> {
        point
            .into_iter()
            .zip(problem.objectives())
            .map(|(value, objective)| objective.direction().normalize(value))
            .collect()
    };

    Assembled {
        best_solution: compromise.and_then(|index| solutions.get(index).cloned()),
        analysis: Some(TradeoffAnalysis {
            utopia_point: to_caller(utopia),
            nadir_point: to_caller(nadir),
            knee_points: analysis::knee_points(&points),
            compromise,
        }),
        pareto_front: Some(ParetoFront {
            hypervolume: analysis::front_hypervolume(
                &points,
                &reference,
                &mut StdRng::seed_from_u64(settings.seed),
            ),
            spacing: analysis::spacing(&points),
            reference_point: reference,
            solutions,
        }),
        feasible: members.iter().any(|member| member.is_feasible()),
        least_violation: members
            .iter()
            .map(|member| member.violation)
            .fold(f64::INFINITY, f64::min),
    }
}
