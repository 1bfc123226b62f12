use serde::{Deserialize, Serialize};

/// Why an engine stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The progress measure stopped improving by more than the tolerance
    Stagnation,
    /// The generation limit was reached first
    IterationLimit,
    /// The caller cancelled the run
    Cancelled,
}

/// Evaluate the termination condition after every generation.
pub trait TerminationCondition {
    /// Observe the progress measure (lower is better) of the generation just
    /// completed and decide whether the run can stop.
    fn can_terminate(&mut self, generations_run: usize, value: f64) -> Option<TerminationReason>;
}

/// Implements the default termination condition.
///
/// It saves the best progress value on every generation and stops when there
/// was no improvement larger than `tolerance` for `stagnation_limit`
/// consecutive generations, or when `max_iterations` generations have run.
#[derive(Debug, Clone)]
pub struct StagnationTermination {
    max_iterations: usize,
    tolerance: f64,
    stagnation_limit: usize,
    best_value: Option<f64>,
    no_improvements_count: usize,
}

impl StagnationTermination {
    pub fn new(max_iterations: usize, tolerance: f64, stagnation_limit: usize) -> Self {
        StagnationTermination {
            max_iterations,
            tolerance,
            stagnation_limit,
            best_value: None,
            no_improvements_count: 0,
        }
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    /// Forget the progress seen so far, keeping the limits.
    ///
    /// Used when the progress measure changes scale, e.g. when the first
    /// feasible design replaces a lower-fitness infeasible one.
    pub fn reset(&mut self) {
        self.best_value = None;
        self.no_improvements_count = 0;
    }
}

impl TerminationCondition for StagnationTermination {
    fn can_terminate(&mut self, generations_run: usize, value: f64) -> Option<TerminationReason> {
        match self.best_value {
            None => self.best_value = Some(value),
            Some(best) if best - value > self.tolerance => {
                self.best_value = Some(value);
                self.no_improvements_count = 0;
            }
            Some(best) => {
                self.best_value = Some(best.min(value));
                self.no_improvements_count += 1;
            }
        }

        if self.stagnation_limit > 0 && self.no_improvements_count >= self.stagnation_limit {
            Some(TerminationReason::Stagnation)
        } else if generations_run >= self.max_iterations {
            Some(TerminationReason::IterationLimit)
        } else {
            None
        }
    }
}
