//! Stochastic operators shared by the evolutionary engines.
//!
//! Every operator draws from the caller's RNG only, in a fixed order, so a
//! seeded run replays exactly.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::instrument;

use crate::problem::{Domain, Variable};

/// Pick the lowest-fitness individual out of `size` uniformly drawn contestants.
pub(crate) fn tournament<R: Rng>(rng: &mut R, fitness: &[f64], size: usize) -> usize {
    let mut winner = rng.gen_range(0..fitness.len());

    for _ in 1..size {
        let contestant = rng.gen_range(0..fitness.len());

        if fitness[contestant] < fitness[winner] {
            winner = contestant;
        }
    }

    winner
}

/// Fitness-proportional selection for a minimized fitness.
///
/// Each individual's slice of the wheel is its distance to the worst fitness
/// plus a small offset, so even the worst keeps a non-zero chance.
pub(crate) fn roulette<R: Rng>(rng: &mut R, fitness: &[f64]) -> usize {
    let (best, worst) = fitness
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| (lo.min(*f), hi.max(*f)));

    let spread = worst - best;
    if !spread.is_finite() || spread <= 0.0 {
        return rng.gen_range(0..fitness.len());
    }

    let offset = spread * 0.01;
    let total: f64 = fitness.iter().map(|f| worst - f + offset).sum();
    let spin = rng.gen_range(0.0..total);

    let mut cumulative = 0.0;
    for (index, f) in fitness.iter().enumerate() {
        cumulative += worst - f + offset;
        if cumulative >= spin {
            return index;
        }
    }

    fitness.len() - 1
}

/// Recombine two parent genomes into two children.
///
/// Continuous genes are blended arithmetically with one random weight per
/// gene; discrete genes are inherited from either parent.
#[instrument(level = "trace", skip_all, fields(genome_length = lhs.len()))]
pub(crate) fn crossover<R: Rng>(
    rng: &mut R,
    variables: &[Variable],
    lhs: &[f64],
    rhs: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let mut first = Vec::with_capacity(lhs.len());
    let mut second = Vec::with_capacity(rhs.len());

    for ((variable, &a), &b) in variables.iter().zip(lhs).zip(rhs) {
        match variable.domain() {
            Domain::Continuous { .. } => {
                let alpha: f64 = rng.gen();

                first.push(variable.repair(alpha * a + (1.0 - alpha) * b));
                second.push(variable.repair((1.0 - alpha) * a + alpha * b));
            }
            Domain::Discrete { .. } => {
                if rng.gen_bool(0.5) {
                    first.push(a);
                    second.push(b);
                } else {
                    first.push(b);
                    second.push(a);
                }
            }
        }
    }

    (first, second)
}

/// Mutate each gene independently with probability `rate`.
///
/// Continuous genes receive a normally distributed delta with standard
/// deviation `scale * range`, bounded to one range and clamped to the domain.
/// Discrete genes are resampled uniformly. Returns whether any gene changed.
pub(crate) fn mutate<R: Rng>(
    rng: &mut R,
    variables: &[Variable],
    genome: &mut [f64],
    rate: f64,
    scale: f64,
) -> bool {
    let mut mutated = false;

    for (gene, variable) in genome.iter_mut().zip(variables) {
        if !rng.gen_bool(rate) {
            continue;
        }

        match variable.domain() {
            Domain::Continuous { .. } => {
                let range = variable.range();

                if let Ok(normal) = Normal::new(0.0, scale * range) {
                    let delta = normal.sample(rng).clamp(-range, range);

                    *gene = variable.repair(*gene + delta);
                    mutated = true;
                }
            }
            Domain::Discrete { values } => {
                if let Some(value) = values.choose(rng) {
                    *gene = *value;
                    mutated = true;
                }
            }
        }
    }

    mutated
}
