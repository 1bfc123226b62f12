use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProblemDefect, ValidationError};
use crate::problem::Problem;

/// Algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    GeneticAlgorithm,
    Nsga2,
    ParticleSwarm,
}

impl Algorithm {
    pub fn is_multi_objective(&self) -> bool {
        matches!(self, Algorithm::Nsga2)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::GeneticAlgorithm => write!(f, "GA"),
            Algorithm::Nsga2 => write!(f, "NSGA-II"),
            Algorithm::ParticleSwarm => write!(f, "PSO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintHandling {
    /// Add `penalty_coefficient * violation` to the fitness
    Penalty,
    /// Rank every infeasible individual behind every feasible one
    Reject,
}

/// Parent selection for the single-objective engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMethod {
    Tournament,
    /// Fitness-proportional selection
    Roulette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parallelization {
    pub enabled: bool,
    /// Worker threads; defaults to the number of logical CPUs
    pub max_workers: Option<usize>,
}

/// Algorithm settings as supplied by the caller.
///
/// Use struct update syntax to override individual values:
/// ```no_run
/// use hvac_optimizer::AlgorithmSettings;
///
/// let settings = AlgorithmSettings {
///     population_size: 80,
///     seed: Some(42),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSettings {
    /// `None` picks GA for one objective and NSGA-II otherwise
    pub algorithm: Option<Algorithm>,
    pub population_size: usize,
    pub max_iterations: usize,
    pub crossover_rate: f64,
    /// Per-gene mutation probability
    pub mutation_rate: f64,
    /// Standard deviation of continuous mutation, as a fraction of the variable range
    pub mutation_scale: f64,
    pub elite_size: usize,
    pub selection: SelectionMethod,
    pub tournament_size: usize,
    pub constraint_handling: ConstraintHandling,
    pub penalty_coefficient: f64,
    /// Equality constraints count as satisfied within this distance from zero
    pub equality_tolerance: f64,
    /// Capacity of the Pareto archive; 0 means the population size
    pub archive_size: usize,
    /// Minimum normalized objective-space distance between archive members; 0 disables
    pub diversity_threshold: f64,
    /// Hypervolume reference point offset, as a fraction of each objective's range
    pub reference_offset: f64,
    pub parallelization: Parallelization,
    pub seed: Option<u64>,
}

impl Default for AlgorithmSettings {
    fn default() -> Self {
        AlgorithmSettings {
            algorithm: None,
            population_size: 50,
            max_iterations: 100,
            crossover_rate: 0.9,
            mutation_rate: 0.1,
            mutation_scale: 0.1,
            elite_size: 2,
            selection: SelectionMethod::Tournament,
            tournament_size: 2,
            constraint_handling: ConstraintHandling::Penalty,
            penalty_coefficient: 1.0e3,
            equality_tolerance: 1.0e-6,
            archive_size: 0,
            diversity_threshold: 0.0,
            reference_offset: 0.1,
            parallelization: Parallelization::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceCriteria {
    /// Overrides [`AlgorithmSettings::max_iterations`] when set
    pub max_iterations: Option<usize>,
    pub tolerance: f64,
    /// Consecutive generations without improvement before stopping; 0 disables
    pub stagnation_limit: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        ConvergenceCriteria {
            max_iterations: None,
            tolerance: 1.0e-6,
            stagnation_limit: 20,
        }
    }
}

/// Settings after validation and normalization, shared read-only by an engine for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub algorithm: Algorithm,
    pub population_size: usize,
    pub max_iterations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub mutation_scale: f64,
    pub elite_size: usize,
    pub selection: SelectionMethod,
    pub tournament_size: usize,
    pub constraint_handling: ConstraintHandling,
    pub penalty_coefficient: f64,
    pub equality_tolerance: f64,
    pub archive_size: usize,
    pub diversity_threshold: f64,
    pub reference_offset: f64,
    pub tolerance: f64,
    pub stagnation_limit: usize,
    pub workers: usize,
    pub seed: u64,
    /// One aggregation weight per objective
    pub weights: Vec<f64>,
}

impl RunSettings {
    /// Validate `problem` and merge its algorithm settings with its convergence criteria.
    pub fn for_problem(problem: &Problem) -> Result<Self, ValidationError> {
        let algorithm = crate::orchestrator::validate(problem)?;

        Ok(Self::resolve(problem, algorithm))
    }

    pub(crate) fn resolve(problem: &Problem, algorithm: Algorithm) -> Self {
        let settings = problem.settings();
        let convergence = problem.convergence();

        let workers = if settings.parallelization.enabled {
            settings
                .parallelization
                .max_workers
                .unwrap_or_else(num_cpus::get)
                .max(1)
        } else {
            1
        };

        let archive_size = if settings.archive_size == 0 {
            settings.population_size
        } else {
            settings.archive_size
        };

        RunSettings {
            algorithm,
            population_size: settings.population_size,
            max_iterations: convergence
                .max_iterations
                .unwrap_or(settings.max_iterations)
                .max(1),
            crossover_rate: settings.crossover_rate,
            mutation_rate: settings.mutation_rate,
            mutation_scale: settings.mutation_scale,
            elite_size: settings.elite_size.min(settings.population_size - 1),
            selection: settings.selection,
            tournament_size: settings.tournament_size,
            constraint_handling: settings.constraint_handling,
            penalty_coefficient: settings.penalty_coefficient,
            equality_tolerance: settings.equality_tolerance,
            archive_size,
            diversity_threshold: settings.diversity_threshold,
            reference_offset: settings.reference_offset,
            tolerance: convergence.tolerance,
            stagnation_limit: convergence.stagnation_limit,
            workers,
            seed: settings.seed.unwrap_or_else(rand::random),
            weights: problem
                .objectives()
                .iter()
                .map(|objective| objective.weight().unwrap_or(1.0))
                .collect(),
        }
    }
}

pub(crate) fn validate_settings(
    settings: &AlgorithmSettings,
    convergence: &ConvergenceCriteria,
) -> Result<(), ProblemDefect> {
    let unit_interval = [
        ("crossover_rate", settings.crossover_rate),
        ("mutation_rate", settings.mutation_rate),
    ];

    for (name, value) in unit_interval {
        if !(0.0..=1.0).contains(&value) {
            return Err(ProblemDefect::invalid_setting(name, value));
        }
    }

    let non_negative = [
        ("mutation_scale", settings.mutation_scale),
        ("equality_tolerance", settings.equality_tolerance),
        ("diversity_threshold", settings.diversity_threshold),
        ("reference_offset", settings.reference_offset),
        ("tolerance", convergence.tolerance),
    ];

    for (name, value) in non_negative {
        if !value.is_finite() || value < 0.0 {
            return Err(ProblemDefect::invalid_setting(name, value));
        }
    }

    if settings.population_size < 2 {
        return Err(ProblemDefect::invalid_setting(
            "population_size",
            settings.population_size as f64,
        ));
    }

    if settings.tournament_size == 0 {
        return Err(ProblemDefect::invalid_setting("tournament_size", 0.0));
    }

    if settings.constraint_handling == ConstraintHandling::Penalty
        && (!settings.penalty_coefficient.is_finite() || settings.penalty_coefficient <= 0.0)
    {
        return Err(ProblemDefect::invalid_setting(
            "penalty_coefficient",
            settings.penalty_coefficient,
        ));
    }

    if settings.parallelization.enabled && settings.parallelization.max_workers == Some(0) {
        return Err(ProblemDefect::invalid_setting("parallelization.max_workers", 0.0));
    }

    Ok(())
}
