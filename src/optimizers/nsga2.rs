use peeking_take_while::PeekableExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument, trace, warn};

use crate::analysis::{hypervolume, reference_point, EXACT_HYPERVOLUME_MAX_OBJECTIVES};
use crate::archive::ParetoArchive;
use crate::cancellation::CancellationToken;
use crate::crowding::assign_crowding_distances;
use crate::ens_nondominating_sorting::{assign_ranks, ens_nondominated_sorting};
use crate::evaluation::PopulationEvaluator;
use crate::individual::Individual;
use crate::operators::{crossover, mutate};
use crate::optimizers::{EngineOutcome, Optimizer};
use crate::problem::{Problem, RunSettings};
use crate::termination::{StagnationTermination, TerminationCondition, TerminationReason};

/// NSGA-II optimizer
pub struct NSGA2Optimizer<'a> {
    problem: &'a Problem,
    settings: &'a RunSettings,
    rng: StdRng,
    archive: ParetoArchive,
}

impl<'a> Optimizer for NSGA2Optimizer<'a> {
    fn name(&self) -> &str {
        "NSGA-II"
    }

    /// Evolve the population until the archive stops improving.
    ///
    /// The archive collects every rank-1 individual seen; the outcome's front
    /// is the archive at termination.
    #[instrument(
        name = "nsga2",
        level = "info",
        skip_all,
        fields(
            variables = self.problem.variables().len(),
            objectives = self.problem.objectives().len(),
            population_size = self.settings.population_size,
            seed = self.settings.seed
        )
    )]
    fn optimize(&mut self, cancellation: &CancellationToken) -> EngineOutcome {
        let problem = self.problem;
        let settings = self.settings;
        // Beyond the exact range progress is measured by the archive size
        let track_hypervolume = problem.objectives().len() <= EXACT_HYPERVOLUME_MAX_OBJECTIVES;

        let mut evaluator = PopulationEvaluator::new(problem, settings);
        let mut termination = StagnationTermination::new(
            settings.max_iterations,
            settings.tolerance,
            settings.stagnation_limit,
        );
        let mut bounds = ObjectiveBounds::new(problem.objectives().len());

        let mut pop = Individual::initial_population(
            problem.variables(),
            settings.population_size,
            problem.initial_design(),
            &mut self.rng,
        );
        evaluator.evaluate(&mut pop);
        bounds.observe(&pop);

        let mut parent_pop = self.nondominating_sort(pop);
        self.update_archive(&parent_pop);

        // Fixed for the whole run so that successive values are comparable
        let progress_reference = bounds.reference_point(settings.reference_offset);

        let mut history = vec![self.progress(track_hypervolume, progress_reference.as_deref())];
        let mut generations_run = 1;

        let reason = loop {
            let progress = history.last().copied().unwrap_or(0.0);

            // The termination condition minimizes, both measures grow with progress
            if let Some(reason) = termination.can_terminate(generations_run, -progress) {
                break reason;
            }

            if cancellation.is_cancelled() {
                warn!(generation = generations_run, "optimization cancelled");
                break TerminationReason::Cancelled;
            }

            let mut child_pop = self.offspring(&parent_pop);
            evaluator.evaluate(&mut child_pop);
            bounds.observe(&child_pop);

            parent_pop.append(&mut child_pop);
            parent_pop = self.environmental_selection(parent_pop);
            self.update_archive(&parent_pop);
            generations_run += 1;

            let progress = self.progress(track_hypervolume, progress_reference.as_deref());
            history.push(progress);

            debug!(
                generation = generations_run,
                archive_size = self.archive.len(),
                progress,
                "generation evaluated"
            );
        };

        info!(
            ?reason,
            generations_run,
            evaluations = evaluator.evaluations(),
            archive_size = self.archive.len(),
            "NSGA-II finished"
        );

        EngineOutcome {
            termination: reason,
            best: None,
            front: self.archive.members().to_vec(),
            generations_run,
            evaluations: evaluator.evaluations(),
            failed_evaluations: evaluator.failures(),
            convergence_history: history,
            reference_point: bounds.reference_point(settings.reference_offset),
        }
    }
}

impl<'a> NSGA2Optimizer<'a> {
    pub fn new(problem: &'a Problem, settings: &'a RunSettings) -> Self {
        NSGA2Optimizer {
            problem,
            settings,
            rng: StdRng::seed_from_u64(settings.seed),
            archive: ParetoArchive::new(settings.archive_size, settings.diversity_threshold),
        }
    }

    fn update_archive(&mut self, sorted: &[Individual]) {
        let accepted = self
            .archive
            .update(sorted.iter().take_while(|individual| individual.rank == 0));

        trace!(accepted, archive_size = self.archive.len(), "archive updated");
    }

    /// Archive hypervolume, or archive size when hypervolume is not tracked.
    fn progress(&self, track_hypervolume: bool, reference: Option<&[f64]>) -> f64 {
        match reference {
            Some(reference) if track_hypervolume => {
                let points: Vec<Vec<f64>> = self
                    .archive
                    .members()
                    .iter()
                    .map(|member| member.objectives.clone())
                    .collect();

                hypervolume(&points, reference)
            }
            _ => self.archive.len() as f64,
        }
    }

    fn offspring(&mut self, parent_pop: &[Individual]) -> Vec<Individual> {
        let pop_size = self.settings.population_size;
        let variables = self.problem.variables();
        let mut child_pop = Vec::with_capacity(pop_size);

        while child_pop.len() < pop_size {
            let p1 = self.tournament(parent_pop);
            let p2 = self.tournament(parent_pop);

            let (mut c1, mut c2) = if self.rng.gen_bool(self.settings.crossover_rate) {
                crossover(&mut self.rng, variables, &parent_pop[p1].genome, &parent_pop[p2].genome)
            } else {
                (parent_pop[p1].genome.clone(), parent_pop[p2].genome.clone())
            };

            mutate(
                &mut self.rng,
                variables,
                &mut c1,
                self.settings.mutation_rate,
                self.settings.mutation_scale,
            );
            mutate(
                &mut self.rng,
                variables,
                &mut c2,
                self.settings.mutation_rate,
                self.settings.mutation_scale,
            );

            child_pop.push(Individual::new(c1));
            if child_pop.len() < pop_size {
                child_pop.push(Individual::new(c2));
            }
        }

        child_pop
    }

    /// Binary crowded tournament: lower front wins, then larger crowding
    /// distance, then a coin flip.
    fn tournament(&mut self, pop: &[Individual]) -> usize {
        let p1 = self.rng.gen_range(0..pop.len());
        let p2 = self.rng.gen_range(0..pop.len());

        if pop[p1].rank < pop[p2].rank {
            p1
        } else if pop[p2].rank < pop[p1].rank {
            p2
        } else if pop[p1].crowding_distance > pop[p2].crowding_distance {
            p1
        } else if pop[p2].crowding_distance > pop[p1].crowding_distance {
            p2
        } else if self.rng.gen_bool(0.5) {
            p1
        } else {
            p2
        }
    }

    /// Keep whole fronts while they fit, then fill up from the crossing
    /// front by descending crowding distance.
    fn environmental_selection(&self, combined: Vec<Individual>) -> Vec<Individual> {
        let pop_size = self.settings.population_size;
        let mut remaining = self.nondominating_sort(combined).into_iter().peekable();
        let mut selected = Vec::with_capacity(pop_size);

        while let Some(rank) = remaining.peek().map(|individual| individual.rank) {
            let front: Vec<Individual> = remaining
                .peeking_take_while(|individual| individual.rank == rank)
                .collect();

            if selected.len() + front.len() > pop_size {
                let room = pop_size - selected.len();
                trace!(rank, front_size = front.len(), room, "truncating crossing front");

                selected.extend(front.into_iter().take(room));
                break;
            }

            selected.extend(front);
        }

        // Crowding of the survivors, for the next tournament
        self.nondominating_sort(selected)
    }

    /// Rank `pop` and order it by front, then by descending crowding distance.
    fn nondominating_sort(&self, mut pop: Vec<Individual>) -> Vec<Individual> {
        let fronts = ens_nondominated_sorting(&pop);
        debug_assert!(!fronts.is_empty());

        assign_ranks(&mut pop, &fronts);
        assign_crowding_distances(&mut pop, &fronts);

        pop.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| b.crowding_distance.total_cmp(&a.crowding_distance))
        });

        pop
    }
}

/// Per-objective best and worst values observed over a run, failed evaluations excluded.
#[derive(Debug, Clone)]
struct ObjectiveBounds {
    best: Vec<f64>,
    worst: Vec<f64>,
    observed: bool,
}

impl ObjectiveBounds {
    fn new(objectives: usize) -> Self {
        ObjectiveBounds {
            best: vec![f64::INFINITY; objectives],
            worst: vec![f64::NEG_INFINITY; objectives],
            observed: false,
        }
    }

    fn observe(&mut self, pop: &[Individual]) {
        for individual in pop.iter().filter(|individual| individual.failure.is_none()) {
            for (obj, value) in individual.objectives.iter().enumerate() {
                self.best[obj] = self.best[obj].min(*value);
                self.worst[obj] = self.worst[obj].max(*value);
            }
            self.observed = true;
        }
    }

    fn reference_point(&self, offset: f64) -> Option<Vec<f64>> {
        self.observed
            .then(|| reference_point(&self.best, &self.worst, offset))
    }
}
