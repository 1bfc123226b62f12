use crate::cancellation::CancellationToken;
use crate::individual::Individual;
use crate::termination::TerminationReason;

pub mod genetic;
pub mod nsga2;
pub mod particle_swarm;

/// A search engine bound to one problem and one set of resolved settings.
pub trait Optimizer {
    fn name(&self) -> &str;

    /// Run the search to termination.
    ///
    /// `cancellation` is checked between generations only.
    fn optimize(&mut self, cancellation: &CancellationToken) -> EngineOutcome;
}

/// What an engine hands back to the orchestrator, still in minimization space.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub termination: TerminationReason,
    /// Best individual of a single-objective run
    pub best: Option<Individual>,
    /// Final archive of a multi-objective run
    pub front: Vec<Individual>,
    pub generations_run: usize,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub convergence_history: Vec<f64>,
    /// Hypervolume reference point of a multi-objective run
    pub reference_point: Option<Vec<f64>>,
}

/// Best individual of a population under the single-objective preference order.
pub(crate) fn best_of(population: &[Individual]) -> Option<&Individual> {
    population.iter().min_by(|a, b| a.preference(b))
}

/// Best individual seen during a single-objective run.
///
/// Feasible designs always win over infeasible ones, so the incumbent's
/// fitness only decreases once a feasible design has been found. Before that
/// its violation only decreases.
#[derive(Debug, Clone, Default)]
pub(crate) struct Incumbent {
    best: Option<Individual>,
}

impl Incumbent {
    /// Offer a candidate. Returns `true` when it is the first feasible design
    /// to become the incumbent.
    pub(crate) fn offer(&mut self, candidate: Option<&Individual>) -> bool {
        let candidate = match candidate {
            Some(candidate) => candidate,
            None => return false,
        };

        match &self.best {
            Some(current) if !candidate.is_better_than(current) => false,
            current => {
                let first_feasible =
                    candidate.is_feasible() && !current.as_ref().map_or(false, Individual::is_feasible);
                self.best = Some(candidate.clone());

                first_feasible
            }
        }
    }

    pub(crate) fn best(&self) -> Option<&Individual> {
        self.best.as_ref()
    }

    pub(crate) fn fitness(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, Individual::fitness)
    }

    pub(crate) fn into_best(self) -> Option<Individual> {
        self.best
    }
}
