use tracing::trace;

use crate::crowding::crowding_distances;
use crate::individual::Individual;

/// Bounded external archive of mutually non-dominated individuals.
///
/// Accumulates the best trade-offs seen across all generations. When it
/// overflows, the most crowded member is dropped until it fits again.
#[derive(Debug, Clone)]
pub struct ParetoArchive {
    capacity: usize,
    diversity_threshold: f64,
    members: Vec<Individual>,
}

impl ParetoArchive {
    pub fn new(capacity: usize, diversity_threshold: f64) -> Self {
        ParetoArchive {
            capacity: capacity.max(1),
            diversity_threshold,
            members: Vec::with_capacity(capacity + 1),
        }
    }

    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_feasible(&self) -> bool {
        self.members.iter().any(Individual::is_feasible)
    }

    /// Offer several candidates; returns how many were accepted.
    pub fn update<'b>(&mut self, candidates: impl IntoIterator<Item = &'b Individual>) -> usize {
        candidates
            .into_iter()
            .filter(|candidate| self.insert(candidate))
            .count()
    }

    /// Offer one candidate. Returns whether it entered the archive.
    pub fn insert(&mut self, candidate: &Individual) -> bool {
        let rejected = self.members.iter().any(|member| {
            member.constrained_dominates(candidate)
                || (member.violation == candidate.violation && member.objectives == candidate.objectives)
        });

        if rejected {
            return false;
        }

        let before = self.members.len();
        self.members
            .retain(|member| !candidate.constrained_dominates(member));
        let displaced = before - self.members.len();

        if displaced == 0 && self.is_too_close(candidate) {
            return false;
        }

        self.members.push(candidate.clone());

        if self.members.len() > self.capacity {
            self.prune();
        }

        true
    }

    /// Whether the candidate falls within the diversity threshold of a member,
    /// measured in objective space normalized by the archive's spread.
    fn is_too_close(&self, candidate: &Individual) -> bool {
        if self.diversity_threshold <= 0.0 || self.members.is_empty() {
            return false;
        }

        let objectives = candidate.objectives.len();
        let ranges: Vec<f64> = (0..objectives)
            .map(|obj| {
                let (lo, hi) = self
                    .members
                    .iter()
                    .chain(std::iter::once(candidate))
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), member| {
                        (lo.min(member.objectives[obj]), hi.max(member.objectives[obj]))
                    });
                hi - lo
            })
            .collect();

        self.members.iter().any(|member| {
            let distance = member
                .objectives
                .iter()
                .zip(&candidate.objectives)
                .zip(&ranges)
                .filter(|(_, range)| **range > 0.0)
                .map(|((a, b), range)| ((a - b) / range).powi(2))
                .sum::<f64>()
                .sqrt();

            distance < self.diversity_threshold
        })
    }

    fn prune(&mut self) {
        while self.members.len() > self.capacity {
            let distances = {
                let points: Vec<&[f64]> = self.members.iter().map(|m| m.objectives.as_slice()).collect();
                crowding_distances(&points)
            };

            let most_crowded = distances
                .iter()
                .enumerate()
                .fold(0, |best, (index, distance)| {
                    if *distance < distances[best] {
                        index
                    } else {
                        best
                    }
                });

            trace!(index = most_crowded, "pruning most crowded archive member");
            self.members.remove(most_crowded);
        }
    }
}
