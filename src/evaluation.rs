use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, warn};

use crate::error::EvaluationFailure;
use crate::individual::{Individual, EVALUATION_FAILURE_PENALTY, REJECTION_FITNESS};
use crate::problem::{ConstraintHandling, Problem, RunSettings};

/// Evaluates populations against the problem's objective and constraint functions.
///
/// Only individuals not yet evaluated are touched, so elites carried over
/// between generations are never re-evaluated. Results are written back by
/// index, which keeps the outcome independent of worker scheduling.
pub(crate) struct PopulationEvaluator<'a> {
    problem: &'a Problem,
    settings: &'a RunSettings,
    evaluations: usize,
    failures: usize,
}

impl<'a> PopulationEvaluator<'a> {
    pub fn new(problem: &'a Problem, settings: &'a RunSettings) -> Self {
        PopulationEvaluator {
            problem,
            settings,
            evaluations: 0,
            failures: 0,
        }
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Evaluate every pending individual. Returns once all of them are done.
    pub fn evaluate(&mut self, population: &mut [Individual]) {
        let mut pending: Vec<&mut Individual> = population
            .iter_mut()
            .filter(|individual| !individual.evaluated)
            .collect();

        if pending.is_empty() {
            return;
        }

        let workers = self.settings.workers.min(pending.len());

        if workers > 1 {
            self.evaluate_parallel(&mut pending, workers);
        }

        // Sequential mode, and anything a crashed worker left behind
        for individual in pending.iter_mut().filter(|individual| !individual.evaluated) {
            evaluate_individual(self.problem, self.settings, individual);
        }

        self.evaluations += pending.len();

        let failures = pending
            .iter()
            .filter(|individual| individual.failure.is_some())
            .count();

        if failures > 0 {
            warn!(failures, "evaluators failed, individuals penalized");
        }

        self.failures += failures;
    }

    fn evaluate_parallel(&self, pending: &mut [&mut Individual], workers: usize) {
        let chunk_size = (pending.len() + workers - 1) / workers;
        let problem = self.problem;
        let settings = self.settings;

        let outcome = crossbeam::thread::scope(|scope| {
            for chunk in pending.chunks_mut(chunk_size) {
                scope.spawn(move |_| {
                    for individual in chunk.iter_mut() {
                        evaluate_individual(problem, settings, individual);
                    }
                });
            }
        });

        if outcome.is_err() {
            error!("evaluation worker crashed, finishing the generation sequentially");
        }
    }
}

/// Evaluate one individual in place. Never panics on evaluator misbehaviour.
pub(crate) fn evaluate_individual(problem: &Problem, settings: &RunSettings, individual: &mut Individual) {
    match evaluate_genome(problem, settings, &individual.genome) {
        Ok((objectives, violation)) => {
            individual.fitness = penalized_fitness(settings, &objectives, violation);
            individual.objectives = objectives;
            individual.violation = violation;
            individual.failure = None;
        }
        Err(failure) => {
            individual.objectives = vec![EVALUATION_FAILURE_PENALTY; problem.objectives().len()];
            individual.violation = EVALUATION_FAILURE_PENALTY;
            individual.fitness = EVALUATION_FAILURE_PENALTY;
            individual.failure = Some(failure);
        }
    }

    individual.evaluated = true;
}

fn evaluate_genome(
    problem: &Problem,
    settings: &RunSettings,
    genome: &[f64],
) -> Result<(Vec<f64>, f64), EvaluationFailure> {
    let objectives = problem
        .objectives()
        .iter()
        .map(|objective| {
            guarded(objective.id(), || objective.function().evaluate(genome))
                .map(|value| objective.direction().normalize(value))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut violation = 0.0;
    for constraint in problem.constraints() {
        let value = guarded(constraint.id(), || constraint.function().evaluate(genome))?;

        violation += constraint.violation(value, settings.equality_tolerance);
    }

    Ok((objectives, violation))
}

/// Scalar fitness: weighted objective sum plus constraint handling.
pub(crate) fn penalized_fitness(settings: &RunSettings, objectives: &[f64], violation: f64) -> f64 {
    let weighted: f64 = objectives
        .iter()
        .zip(&settings.weights)
        .map(|(value, weight)| value * weight)
        .sum();

    let fitness = match settings.constraint_handling {
        ConstraintHandling::Penalty => weighted + settings.penalty_coefficient * violation,
        ConstraintHandling::Reject if violation > 0.0 => REJECTION_FITNESS + violation,
        ConstraintHandling::Reject => weighted,
    };

    if fitness.is_finite() {
        fitness
    } else {
        EVALUATION_FAILURE_PENALTY
    }
}

fn guarded(id: &str, evaluator: impl FnOnce() -> f64) -> Result<f64, EvaluationFailure> {
    match catch_unwind(AssertUnwindSafe(evaluator)) {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(value) => Err(EvaluationFailure::NonFinite {
            id: id.to_string(),
            value,
        }),
        Err(payload) => Err(EvaluationFailure::Panicked {
            id: id.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
