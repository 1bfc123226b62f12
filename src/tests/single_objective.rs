use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{EvaluationFailure, ProblemDefect, ValidationError};
use crate::problem::{
    Algorithm, AlgorithmSettings, Constraint, ConstraintHandling, ConvergenceCriteria, Objective,
    Parallelization, Problem, Variable,
};
use crate::result::{Status, Warning};
use crate::{optimize, optimize_with_cancellation, CancellationToken};

fn square(settings: AlgorithmSettings) -> Problem {
    Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0))
        .objective(Objective::minimize("x squared", |x: &[f64]| x[0] * x[0]))
        .settings(settings)
        .build()
}

#[test]
fn it_minimizes_a_parabola() {
    let problem = square(AlgorithmSettings {
        population_size: 20,
        max_iterations: 50,
        seed: Some(2024),
        ..Default::default()
    });

    let result = optimize(&problem).unwrap();
    let best = result.best_solution.as_ref().unwrap();

    assert_eq!(result.algorithm, Algorithm::GeneticAlgorithm);
    assert!(best.fitness < 1e-2, "fitness {}", best.fitness);
    assert!(result.best_value("x").unwrap() < 0.1);
    assert!(result.pareto_front.is_none());
    assert_ne!(result.status, Status::Failed);
}

#[test]
fn best_fitness_never_increases() {
    let problem = Problem::builder()
        .variables((0..4).map(|i| Variable::continuous(format!("x{}", i), -5.12, 5.12)))
        .objective(Objective::minimize("rastrigin", |x: &[f64]| {
            10.0 * x.len() as f64
                + x.iter()
                    .map(|x_i| x_i * x_i - 10.0 * (2.0 * std::f64::consts::PI * x_i).cos())
                    .sum::<f64>()
        }))
        .settings(AlgorithmSettings {
            max_iterations: 80,
            seed: Some(77),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();
    let history = &result.statistics.convergence_history;

    assert_eq!(history.len(), result.statistics.generations_run);
    assert!(history.windows(2).all(|pair| pair[1] <= pair[0]));
    assert!(history.last().unwrap() < history.first().unwrap());
}

#[test]
fn the_constraint_boundary_is_never_crossed() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0))
        .objective(Objective::minimize("x", |x: &[f64]| x[0]))
        .constraint(Constraint::inequality("x >= 5", |x: &[f64]| 5.0 - x[0]))
        .settings(AlgorithmSettings {
            seed: Some(5),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();
    let x = result.best_value("x").unwrap();

    assert!(x >= 5.0, "x = {}", x);
    assert!(x < 5.1, "x = {}", x);
    assert!(result.best_solution.as_ref().unwrap().feasible);
    assert!(result.is_feasible());
}

#[test]
fn rejection_keeps_infeasible_designs_out() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0))
        .objective(Objective::minimize("x", |x: &[f64]| x[0]))
        .constraint(Constraint::inequality("x >= 5", |x: &[f64]| 5.0 - x[0]))
        .settings(AlgorithmSettings {
            constraint_handling: ConstraintHandling::Reject,
            seed: Some(6),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();
    let best = result.best_solution.unwrap();

    assert!(best.feasible);
    assert!(best.variables[0] >= 5.0 && best.variables[0] < 5.2);
}

#[test]
fn equality_constraints_are_met_within_tolerance() {
    let problem = Problem::builder()
        .variables([
            Variable::continuous("supply", 0.0, 10.0),
            Variable::continuous("return", 0.0, 10.0),
        ])
        .objective(Objective::minimize("fan power", |x: &[f64]| x[0] * x[0] + x[1] * x[1]))
        .constraint(Constraint::equality("balance", |x: &[f64]| x[0] + x[1] - 6.0))
        .settings(AlgorithmSettings {
            population_size: 60,
            max_iterations: 200,
            equality_tolerance: 0.05,
            seed: Some(9),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();
    let best = result.best_solution.unwrap();

    assert!(best.feasible);
    assert!((best.variables[0] + best.variables[1] - 6.0).abs() <= 0.05 + 1e-12);
    assert!((best.variables[0] - 3.0).abs() < 0.5 && (best.variables[1] - 3.0).abs() < 0.5);
}

#[test]
fn infeasible_problems_return_the_least_infeasible_design() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0))
        .objective(Objective::minimize("x", |x: &[f64]| x[0]))
        .constraint(Constraint::inequality("x >= 20", |x: &[f64]| 20.0 - x[0]))
        .settings(AlgorithmSettings {
            seed: Some(10),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();
    let best = result.best_solution.as_ref().unwrap();

    assert_eq!(result.status, Status::Partial);
    assert!(!best.feasible);
    assert!(!result.is_feasible());
    assert!(result.warnings.iter().any(|warning| matches!(
        warning,
        Warning::InfeasibleProblem { least_violation } if *least_violation < 10.5
    )));
}

#[test]
fn maximized_objectives_are_reported_in_their_own_sign() {
    let problem = Problem::builder()
        .variable(Variable::continuous("airflow", 0.0, 10.0))
        .objective(Objective::maximize("efficiency", |x: &[f64]| 9.0 - (x[0] - 3.0).powi(2)))
        .settings(AlgorithmSettings {
            seed: Some(12),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();
    let best = result.best_solution.unwrap();

    assert!(best.objectives[0] > 8.9, "efficiency {}", best.objectives[0]);
    assert!(best.fitness < 0.0);
    assert!((best.variables[0] - 3.0).abs() < 0.4);
}

#[test]
fn discrete_choices_stay_in_their_sets() {
    let materials = [1.0, 2.0, 3.0, 5.0];
    let diameters = [100.0, 125.0, 160.0, 200.0, 250.0];

    let problem = Problem::builder()
        .variables([
            Variable::discrete("material", materials),
            Variable::discrete("diameter", diameters),
            Variable::continuous("damper", 0.0, 1.0),
        ])
        .objective(Objective::minimize("cost", |x: &[f64]| {
            (x[0] - 3.0).powi(2) + ((x[1] - 160.0) / 100.0).powi(2) + (x[2] - 0.5).powi(2)
        }))
        .settings(AlgorithmSettings {
            seed: Some(13),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();
    let best = result.best_solution.unwrap();

    assert_eq!(best.variables[0], 3.0);
    assert_eq!(best.variables[1], 160.0);
    assert!(materials.contains(&best.variables[0]));
    assert!(diameters.contains(&best.variables[1]));
}

#[test]
fn weighted_objectives_are_aggregated() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 1.0))
        .objective(Objective::minimize("f1", |x: &[f64]| x[0]).with_weight(1.0))
        .objective(Objective::minimize("f2", |x: &[f64]| (1.0 - x[0]) * 3.0).with_weight(1.0))
        .settings(AlgorithmSettings {
            algorithm: Some(Algorithm::GeneticAlgorithm),
            seed: Some(14),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();

    // f1 + f2 = 3 - 2x, smallest at the upper bound
    assert!(result.best_value("x").unwrap() > 0.99);
    assert_eq!(result.best_solution.unwrap().objectives.len(), 2);
}

#[test]
fn particle_swarm_solves_the_parabola() {
    let problem = square(AlgorithmSettings {
        algorithm: Some(Algorithm::ParticleSwarm),
        population_size: 20,
        max_iterations: 50,
        seed: Some(15),
        ..Default::default()
    });

    let result = optimize(&problem).unwrap();

    assert_eq!(result.algorithm, Algorithm::ParticleSwarm);
    assert!(result.best_solution.unwrap().fitness < 1e-2);
    assert_eq!(
        result.statistics.total_evaluations,
        20 * result.statistics.generations_run
    );
}

#[test]
fn the_current_design_seeds_the_population() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0).with_value(0.0))
        .objective(Objective::minimize("x squared", |x: &[f64]| x[0] * x[0]))
        .settings(AlgorithmSettings {
            max_iterations: 3,
            seed: Some(16),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();

    assert_eq!(result.statistics.convergence_history[0], 0.0);
    assert_eq!(result.best_solution.unwrap().fitness, 0.0);
}

#[test]
fn elites_are_not_evaluated_again() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0))
        .objective(Objective::minimize("x squared", |x: &[f64]| x[0] * x[0]))
        .settings(AlgorithmSettings {
            population_size: 20,
            elite_size: 4,
            seed: Some(17),
            ..Default::default()
        })
        .convergence(ConvergenceCriteria {
            max_iterations: Some(25),
            tolerance: 0.0,
            stagnation_limit: 0,
        })
        .build();

    let result = optimize(&problem).unwrap();

    assert_eq!(result.statistics.generations_run, 25);
    assert_eq!(result.statistics.total_evaluations, 20 + 24 * 16);
    assert_eq!(result.status, Status::Partial);
    assert!(result
        .warnings
        .contains(&Warning::ConvergenceFailure { generations: 25 }));
}

#[test]
fn stagnation_ends_the_run_successfully() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0))
        .objective(Objective::minimize("x squared", |x: &[f64]| x[0] * x[0]))
        .settings(AlgorithmSettings {
            max_iterations: 1000,
            seed: Some(18),
            ..Default::default()
        })
        .convergence(ConvergenceCriteria {
            tolerance: 1e-3,
            stagnation_limit: 10,
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();

    assert_eq!(result.status, Status::Success);
    assert!(result.statistics.generations_run < 1000);
    assert!(result.warnings.is_empty());
}

#[test]
fn failing_evaluators_are_penalized_not_fatal() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0))
        .objective(Objective::minimize("table lookup", |x: &[f64]| {
            if x[0] < 2.0 {
                panic!("duct table has no entry below 2");
            }
            if x[0] > 8.0 {
                return f64::NAN;
            }
            (x[0] - 4.0).abs()
        }))
        .settings(AlgorithmSettings {
            parallelization: Parallelization {
                enabled: true,
                max_workers: Some(3),
            },
            seed: Some(19),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();
    let best = result.best_solution.as_ref().unwrap();

    assert_ne!(result.status, Status::Failed);
    assert!(best.failure.is_none());
    assert!((best.variables[0] - 4.0).abs() < 0.1);
    assert!(result.statistics.failed_evaluations > 0);
    assert!(result.warnings.contains(&Warning::EvaluationFailures {
        count: result.statistics.failed_evaluations
    }));
}

#[test]
fn a_run_where_every_evaluation_fails_is_reported_as_failed() {
    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 1.0))
        .objective(Objective::minimize("broken", |_: &[f64]| f64::NAN))
        .settings(AlgorithmSettings {
            population_size: 10,
            max_iterations: 5,
            seed: Some(20),
            ..Default::default()
        })
        .build();

    let result = optimize(&problem).unwrap();

    assert_eq!(result.status, Status::Failed);
    assert_eq!(result.statistics.failed_evaluations, result.statistics.total_evaluations);
    assert!(matches!(
        result.best_solution.unwrap().failure,
        Some(EvaluationFailure::NonFinite { .. })
    ));
}

#[test]
fn invalid_problems_fail_before_any_evaluation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let problem = Problem::builder()
        .objective(Objective::minimize("f", move |_: &[f64]| {
            counter.fetch_add(1, Ordering::SeqCst);
            0.0
        }))
        .build();

    assert_eq!(
        optimize(&problem),
        Err(ValidationError::InvalidProblem(ProblemDefect::NoVariables))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn cancellation_completes_the_running_generation() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let problem = Problem::builder()
        .variable(Variable::continuous("x", 0.0, 10.0))
        .objective(Objective::minimize("x squared", move |x: &[f64]| {
            if counter.fetch_add(1, Ordering::SeqCst) == 100 {
                trigger.cancel();
            }
            x[0] * x[0]
        }))
        .settings(AlgorithmSettings {
            population_size: 20,
            elite_size: 2,
            max_iterations: 500,
            seed: Some(21),
            ..Default::default()
        })
        .convergence(ConvergenceCriteria {
            stagnation_limit: 0,
            ..Default::default()
        })
        .build();

    let result = optimize_with_cancellation(&problem, &token).unwrap();
    let generations = result.statistics.generations_run;

    assert_eq!(result.status, Status::Partial);
    assert!(result.warnings.contains(&Warning::Cancelled { generation: generations }));
    // The generation holding evaluation 101 ran to completion, nothing after it
    assert_eq!(generations, 6);
    assert_eq!(result.statistics.total_evaluations, 20 + (generations - 1) * 18);
    assert_eq!(calls.load(Ordering::SeqCst), result.statistics.total_evaluations);
}
