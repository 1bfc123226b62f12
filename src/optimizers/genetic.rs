use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument, warn};

use crate::cancellation::CancellationToken;
use crate::evaluation::PopulationEvaluator;
use crate::individual::Individual;
use crate::operators::{crossover, mutate, roulette, tournament};
use crate::optimizers::{best_of, EngineOutcome, Incumbent, Optimizer};
use crate::problem::{Problem, RunSettings, SelectionMethod};
use crate::termination::{StagnationTermination, TerminationCondition, TerminationReason};

/// Generational genetic algorithm with elitism for a single aggregated objective.
pub struct GeneticOptimizer<'a> {
    problem: &'a Problem,
    settings: &'a RunSettings,
    rng: StdRng,
}

impl<'a> GeneticOptimizer<'a> {
    pub fn new(problem: &'a Problem, settings: &'a RunSettings) -> Self {
        GeneticOptimizer {
            problem,
            settings,
            rng: StdRng::seed_from_u64(settings.seed),
        }
    }

    fn select(&mut self, fitness: &[f64]) -> usize {
        match self.settings.selection {
            SelectionMethod::Tournament => tournament(&mut self.rng, fitness, self.settings.tournament_size),
            SelectionMethod::Roulette => roulette(&mut self.rng, fitness),
        }
    }

    /// Breed the next generation: elites first, unchanged and already
    /// evaluated, then offspring of selected parent pairs.
    fn next_generation(&mut self, population: &[Individual]) -> Vec<Individual> {
        let pop_size = self.settings.population_size;
        let variables = self.problem.variables();

        let mut ranked: Vec<&Individual> = population.iter().collect();
        ranked.sort_by(|a, b| a.preference(b));

        let mut next: Vec<Individual> = ranked
            .into_iter()
            .take(self.settings.elite_size)
            .cloned()
            .collect();

        let fitness: Vec<f64> = population.iter().map(Individual::fitness).collect();

        while next.len() < pop_size {
            let lhs = self.select(&fitness);
            let rhs = self.select(&fitness);

            let (mut first, mut second) = if self.rng.gen_bool(self.settings.crossover_rate) {
                crossover(&mut self.rng, variables, &population[lhs].genome, &population[rhs].genome)
            } else {
                (population[lhs].genome.clone(), population[rhs].genome.clone())
            };

            mutate(
                &mut self.rng,
                variables,
                &mut first,
                self.settings.mutation_rate,
                self.settings.mutation_scale,
            );
            mutate(
                &mut self.rng,
                variables,
                &mut second,
                self.settings.mutation_rate,
                self.settings.mutation_scale,
            );

            next.push(Individual::new(first));
            if next.len() < pop_size {
                next.push(Individual::new(second));
            }
        }

        next
    }
}

impl<'a> Optimizer for GeneticOptimizer<'a> {
    fn name(&self) -> &str {
        "GA"
    }

    #[instrument(
        name = "genetic_algorithm",
        level = "info",
        skip_all,
        fields(
            variables = self.problem.variables().len(),
            population_size = self.settings.population_size,
            seed = self.settings.seed
        )
    )]
    fn optimize(&mut self, cancellation: &CancellationToken) -> EngineOutcome {
        let problem = self.problem;
        let settings = self.settings;

        let mut evaluator = PopulationEvaluator::new(problem, settings);
        let mut termination = StagnationTermination::new(
            settings.max_iterations,
            settings.tolerance,
            settings.stagnation_limit,
        );

        let mut population = Individual::initial_population(
            problem.variables(),
            settings.population_size,
            problem.initial_design(),
            &mut self.rng,
        );
        evaluator.evaluate(&mut population);

        let mut incumbent = Incumbent::default();
        incumbent.offer(best_of(&population));
        let mut history = vec![incumbent.fitness()];
        let mut generations_run = 1;

        let reason = loop {
            if let Some(reason) = termination.can_terminate(generations_run, incumbent.fitness()) {
                break reason;
            }

            if cancellation.is_cancelled() {
                warn!(generation = generations_run, "optimization cancelled");
                break TerminationReason::Cancelled;
            }

            population = self.next_generation(&population);
            evaluator.evaluate(&mut population);
            generations_run += 1;

            if incumbent.offer(best_of(&population)) {
                debug!(generation = generations_run, "first feasible design found");
                termination.reset();
            }
            history.push(incumbent.fitness());

            debug!(generation = generations_run, best_fitness = incumbent.fitness(), "generation evaluated");
        };

        info!(
            ?reason,
            generations_run,
            evaluations = evaluator.evaluations(),
            best_fitness = incumbent.fitness(),
            "genetic algorithm finished"
        );

        EngineOutcome {
            termination: reason,
            best: incumbent.into_best(),
            front: Vec::new(),
            generations_run,
            evaluations: evaluator.evaluations(),
            failed_evaluations: evaluator.failures(),
            convergence_history: history,
            reference_point: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{AlgorithmSettings, Constraint, ConvergenceCriteria, Objective, Variable};

    fn sphere(settings: AlgorithmSettings, convergence: ConvergenceCriteria) -> Problem {
        Problem::builder()
            .variables([
                Variable::continuous("x", -5.0, 5.0),
                Variable::continuous("y", -5.0, 5.0),
            ])
            .objective(Objective::minimize("sphere", |v: &[f64]| v[0] * v[0] + v[1] * v[1]))
            .settings(settings)
            .convergence(convergence)
            .build()
    }

    #[test]
    fn it_keeps_the_elites_unchanged() {
        let problem = sphere(
            AlgorithmSettings {
                population_size: 10,
                elite_size: 3,
                seed: Some(4),
                ..Default::default()
            },
            ConvergenceCriteria::default(),
        );
        let settings = RunSettings::for_problem(&problem).unwrap();
        let mut optimizer = GeneticOptimizer::new(&problem, &settings);

        let mut population = Individual::initial_population(problem.variables(), 10, None, &mut optimizer.rng);
        PopulationEvaluator::new(&problem, &settings).evaluate(&mut population);

        let mut ranked = population.clone();
        ranked.sort_by(|a, b| a.preference(b));

        let next = optimizer.next_generation(&population);

        assert_eq!(next.len(), 10);
        for (elite, kept) in ranked.iter().zip(&next).take(3) {
            assert_eq!(elite.genome, kept.genome);
            assert!(kept.evaluated);
        }
        assert!(next[3..].iter().all(|child| !child.evaluated));
    }

    #[test]
    fn it_counts_evaluations_saved_by_elitism() {
        let problem = sphere(
            AlgorithmSettings {
                population_size: 12,
                elite_size: 2,
                seed: Some(8),
                ..Default::default()
            },
            ConvergenceCriteria {
                max_iterations: Some(15),
                tolerance: 0.0,
                stagnation_limit: 0,
            },
        );
        let settings = RunSettings::for_problem(&problem).unwrap();

        let outcome = GeneticOptimizer::new(&problem, &settings).optimize(&CancellationToken::new());

        assert_eq!(outcome.termination, TerminationReason::IterationLimit);
        assert_eq!(outcome.generations_run, 15);
        assert_eq!(outcome.evaluations, 12 + 14 * 10);
        assert_eq!(outcome.convergence_history.len(), 15);
    }

    #[test]
    fn it_minimizes_the_sphere() {
        let problem = sphere(
            AlgorithmSettings {
                population_size: 40,
                max_iterations: 150,
                seed: Some(17),
                ..Default::default()
            },
            ConvergenceCriteria {
                stagnation_limit: 0,
                ..Default::default()
            },
        );
        let settings = RunSettings::for_problem(&problem).unwrap();

        let outcome = GeneticOptimizer::new(&problem, &settings).optimize(&CancellationToken::new());
        let best = outcome.best.unwrap();

        assert!(best.fitness() < 0.05, "fitness {}", best.fitness());
        assert!(outcome
            .convergence_history
            .windows(2)
            .all(|pair| pair[1] <= pair[0]));
    }

    #[test]
    fn the_history_follows_the_returned_best() {
        // A weak penalty makes infeasible designs look better than any feasible one
        let problem = Problem::builder()
            .variable(Variable::continuous("x", 0.0, 10.0))
            .objective(Objective::minimize("x", |v: &[f64]| v[0]))
            .constraint(Constraint::inequality("x >= 5", |v: &[f64]| 5.0 - v[0]))
            .settings(AlgorithmSettings {
                penalty_coefficient: 0.5,
                max_iterations: 60,
                seed: Some(3),
                ..Default::default()
            })
            .build();
        let settings = RunSettings::for_problem(&problem).unwrap();

        let outcome = GeneticOptimizer::new(&problem, &settings).optimize(&CancellationToken::new());
        let best = outcome.best.as_ref().unwrap();
        let history = &outcome.convergence_history;

        assert!(best.is_feasible());
        assert!(best.fitness() >= 5.0);
        assert_eq!(*history.last().unwrap(), best.fitness());
        assert!(history.iter().all(|fitness| *fitness >= 5.0));
        assert!(history.windows(2).all(|pair| pair[1] <= pair[0]));
    }

    #[test]
    fn roulette_selection_also_converges() {
        let problem = sphere(
            AlgorithmSettings {
                population_size: 40,
                max_iterations: 150,
                selection: SelectionMethod::Roulette,
                seed: Some(23),
                ..Default::default()
            },
            ConvergenceCriteria {
                stagnation_limit: 0,
                ..Default::default()
            },
        );
        let settings = RunSettings::for_problem(&problem).unwrap();

        let outcome = GeneticOptimizer::new(&problem, &settings).optimize(&CancellationToken::new());

        assert!(outcome.best.unwrap().fitness() < 0.5);
    }

    #[test]
    fn a_cancelled_run_stops_after_the_first_generation() {
        let problem = sphere(
            AlgorithmSettings {
                seed: Some(1),
                ..Default::default()
            },
            ConvergenceCriteria::default(),
        );
        let settings = RunSettings::for_problem(&problem).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let outcome = GeneticOptimizer::new(&problem, &settings).optimize(&token);

        assert_eq!(outcome.termination, TerminationReason::Cancelled);
        assert_eq!(outcome.generations_run, 1);
        assert_eq!(outcome.evaluations, settings.population_size);
        assert!(outcome.best.is_some());
    }
}
