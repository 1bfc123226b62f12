use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument, warn};

use crate::cancellation::CancellationToken;
use crate::evaluation::PopulationEvaluator;
use crate::individual::Individual;
use crate::optimizers::{EngineOutcome, Incumbent, Optimizer};
use crate::problem::{Problem, RunSettings};
use crate::termination::{StagnationTermination, TerminationCondition, TerminationReason};

const INITIAL_INERTIA: f64 = 0.9;
const INERTIA_DECAY: f64 = 0.99;
const MIN_INERTIA: f64 = 0.5;
const COGNITIVE_COEFFICIENT: f64 = 1.5;
const SOCIAL_COEFFICIENT: f64 = 1.5;
/// Velocity bound as a fraction of each variable's range
const MAX_VELOCITY_FRACTION: f64 = 0.2;

/// Global-best particle swarm for a single aggregated objective.
///
/// Positions are clamped to the bounds and discrete variables snap to the
/// nearest allowed value after every move.
pub struct ParticleSwarmOptimizer<'a> {
    problem: &'a Problem,
    settings: &'a RunSettings,
    rng: StdRng,
    inertia: f64,
}

#[derive(Debug, Clone)]
struct Particle {
    position: Individual,
    velocity: Vec<f64>,
    personal_best: Individual,
}

impl<'a> ParticleSwarmOptimizer<'a> {
    pub fn new(problem: &'a Problem, settings: &'a RunSettings) -> Self {
        ParticleSwarmOptimizer {
            problem,
            settings,
            rng: StdRng::seed_from_u64(settings.seed),
            inertia: INITIAL_INERTIA,
        }
    }

    fn max_velocities(&self) -> Vec<f64> {
        self.problem
            .variables()
            .iter()
            .map(|variable| variable.range() * MAX_VELOCITY_FRACTION)
            .collect()
    }

    fn initial_velocity(&mut self, max_velocities: &[f64]) -> Vec<f64> {
        max_velocities
            .iter()
            .map(|&max| {
                if max > 0.0 {
                    self.rng.gen_range(-max..=max)
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Move every particle towards its personal best and the swarm's best.
    fn fly(&mut self, swarm: &mut [Particle], global_best: &[f64], max_velocities: &[f64]) {
        let variables = self.problem.variables();

        for particle in swarm.iter_mut() {
            let mut position = particle.position.genome.clone();

            for (dim, variable) in variables.iter().enumerate() {
                let r1: f64 = self.rng.gen();
                let r2: f64 = self.rng.gen();

                let velocity = self.inertia * particle.velocity[dim]
                    + COGNITIVE_COEFFICIENT * r1 * (particle.personal_best.genome[dim] - position[dim])
                    + SOCIAL_COEFFICIENT * r2 * (global_best[dim] - position[dim]);

                let velocity = velocity.clamp(-max_velocities[dim], max_velocities[dim]);

                position[dim] = variable.repair(position[dim] + velocity);
                particle.velocity[dim] = velocity;
            }

            particle.position = Individual::new(position);
        }

        self.inertia = (self.inertia * INERTIA_DECAY).max(MIN_INERTIA);
    }
}

impl<'a> Optimizer for ParticleSwarmOptimizer<'a> {
    fn name(&self) -> &str {
        "PSO"
    }

    #[instrument(
        name = "particle_swarm",
        level = "info",
        skip_all,
        fields(
            variables = self.problem.variables().len(),
            swarm_size = self.settings.population_size,
            seed = self.settings.seed
        )
    )]
    fn optimize(&mut self, cancellation: &CancellationToken) -> EngineOutcome {
        let problem = self.problem;
        let settings = self.settings;
        let max_velocities = self.max_velocities();

        let mut evaluator = PopulationEvaluator::new(problem, settings);
        let mut termination = StagnationTermination::new(
            settings.max_iterations,
            settings.tolerance,
            settings.stagnation_limit,
        );

        let mut positions = Individual::initial_population(
            problem.variables(),
            settings.population_size,
            problem.initial_design(),
            &mut self.rng,
        );
        evaluator.evaluate(&mut positions);

        let mut swarm: Vec<Particle> = Vec::with_capacity(positions.len());
        for position in positions {
            let velocity = self.initial_velocity(&max_velocities);
            swarm.push(Particle {
                personal_best: position.clone(),
                position,
                velocity,
            });
        }

        let mut incumbent = Incumbent::default();
        incumbent.offer(swarm_best(&swarm));
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

            let global_best = match incumbent.best() {
                Some(best) => best.genome.clone(),
                None => break TerminationReason::IterationLimit,
            };

            self.fly(&mut swarm, &global_best, &max_velocities);

            let mut positions: Vec<Individual> = swarm.iter().map(|particle| particle.position.clone()).collect();
            evaluator.evaluate(&mut positions);

            for (particle, position) in swarm.iter_mut().zip(positions) {
                if position.is_better_than(&particle.personal_best) {
                    particle.personal_best = position.clone();
                }
                particle.position = position;
            }

            if incumbent.offer(swarm_best(&swarm)) {
                debug!(generation = generations_run, "first feasible design found");
                termination.reset();
            }

            generations_run += 1;
            history.push(incumbent.fitness());

            debug!(
                generation = generations_run,
                best_fitness = incumbent.fitness(),
                inertia = self.inertia,
                "swarm moved"
            );
        };

        info!(
            ?reason,
            generations_run,
            evaluations = evaluator.evaluations(),
            best_fitness = incumbent.fitness(),
            "particle swarm finished"
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

fn swarm_best(swarm: &[Particle]) -> Option<&Individual> {
    swarm
        .iter()
        .map(|particle| &particle.personal_best)
        .min_by(|a, b| a.preference(b))
}
