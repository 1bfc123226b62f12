use std::cmp::Ordering;

use rand::Rng;

use crate::error::EvaluationFailure;
use crate::problem::Variable;

/// Stand-in value for objectives, violation and fitness of an individual whose evaluation failed.
///
/// Large enough to rank behind any sane design, finite so that sorting and
/// arithmetic on it stay well defined.
pub const EVALUATION_FAILURE_PENALTY: f64 = 1.0e15;

/// Base fitness of infeasible individuals under [`ConstraintHandling::Reject`](crate::problem::ConstraintHandling::Reject).
pub const REJECTION_FITNESS: f64 = 1.0e12;

/// A candidate design together with its evaluation.
#[derive(Debug, Clone)]
pub struct Individual {
    pub(crate) genome: Vec<f64>,
    /// Objective values in minimization space
    pub(crate) objectives: Vec<f64>,
    pub(crate) fitness: f64,
    pub(crate) violation: f64,
    pub(crate) evaluated: bool,
    pub(crate) failure: Option<EvaluationFailure>,
    pub(crate) rank: usize,
    pub(crate) crowding_distance: f64,
}

impl Individual {
    pub(crate) fn new(genome: Vec<f64>) -> Self {
        Individual {
            genome,
            objectives: Vec::new(),
            fitness: f64::INFINITY,
            violation: 0.0,
            evaluated: false,
            failure: None,
            rank: usize::MAX,
            crowding_distance: 0.0,
        }
    }

    /// Sample every gene uniformly from its variable's domain.
    pub(crate) fn random<R: Rng>(variables: &[Variable], rng: &mut R) -> Self {
        Self::new(variables.iter().map(|variable| variable.sample(rng)).collect())
    }

    /// Build the initial population, seeding it with `initial_design` when present.
    pub(crate) fn initial_population<R: Rng>(
        variables: &[Variable],
        size: usize,
        initial_design: Option<Vec<f64>>,
        rng: &mut R,
    ) -> Vec<Self> {
        let mut population = Vec::with_capacity(size);

        if let Some(design) = initial_design {
            population.push(Self::new(design));
        }

        while population.len() < size {
            population.push(Self::random(variables, rng));
        }

        population
    }

    pub fn genome(&self) -> &[f64] {
        &self.genome
    }

    pub fn objectives(&self) -> &[f64] {
        &self.objectives
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn violation(&self) -> f64 {
        self.violation
    }

    pub fn is_feasible(&self) -> bool {
        self.failure.is_none() && self.violation <= 0.0
    }

    /// Constrained dominance.
    ///
    /// Feasible beats infeasible; between infeasible individuals the lower
    /// violation wins, and equal violations fall back to Pareto dominance.
    pub(crate) fn constrained_dominates(&self, other: &Individual) -> bool {
        match self.violation.total_cmp(&other.violation) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => dominates(&self.objectives, &other.objectives),
        }
    }

    /// Single-objective preference order: feasible first, then lower fitness.
    /// Infeasible individuals are ordered by violation before fitness.
    pub(crate) fn preference(&self, other: &Individual) -> Ordering {
        match (self.is_feasible(), other.is_feasible()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => self.fitness.total_cmp(&other.fitness),
            (false, false) => self
                .violation
                .total_cmp(&other.violation)
                .then_with(|| self.fitness.total_cmp(&other.fitness)),
        }
    }

    pub(crate) fn is_better_than(&self, other: &Individual) -> bool {
        self.preference(other) == Ordering::Less
    }
}

/// Pareto dominance between two objective vectors in minimization space.
///
/// `a` dominates `b` when it is no worse in every objective and strictly
/// better in at least one.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;

    for (a_i, b_i) in a.iter().zip(b) {
        match a_i.total_cmp(b_i) {
            Ordering::Less => strictly_better = true,
            Ordering::Greater => return false,
            Ordering::Equal => (),
        }
    }

    strictly_better
}
