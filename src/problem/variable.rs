use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ProblemDefect;

/// Whether a variable ranges over an interval or an enumerated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    Continuous,
    Discrete,
}

/// The set of values a design variable may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Domain {
    /// Any value in `[min, max]`
    Continuous { min: f64, max: f64 },
    /// One of an enumerated set, e.g. standard duct diameters
    Discrete { values: Vec<f64> },
}

/// A design variable of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    id: String,
    domain: Domain,
    value: Option<f64>,
}

impl Variable {
    pub fn continuous(id: impl Into<String>, min: f64, max: f64) -> Self {
        Variable {
            id: id.into(),
            domain: Domain::Continuous { min, max },
            value: None,
        }
    }

    pub fn discrete(id: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Variable {
            id: id.into(),
            domain: Domain::Discrete {
                values: values.into_iter().collect(),
            },
            value: None,
        }
    }

    /// Attach the current design value.
    ///
    /// When every variable of a problem carries one, that design is part of
    /// the initial population.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn kind(&self) -> VariableKind {
        match self.domain {
            Domain::Continuous { .. } => VariableKind::Continuous,
            Domain::Discrete { .. } => VariableKind::Discrete,
        }
    }

    /// Width of the continuous interval, or the spread of the discrete set
    pub fn range(&self) -> f64 {
        match &self.domain {
            Domain::Continuous { min, max } => max - min,
            Domain::Discrete { values } => {
                let (lo, hi) = values
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

                if lo <= hi {
                    hi - lo
                } else {
                    0.0
                }
            }
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        match &self.domain {
            Domain::Continuous { min, max } => (*min..=*max).contains(&value),
            Domain::Discrete { values } => values.iter().any(|v| *v == value),
        }
    }

    /// Draw a uniformly distributed value from the domain.
    pub(crate) fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match &self.domain {
            Domain::Continuous { min, max } => rng.gen_range(*min..=*max),
            Domain::Discrete { values } => values.choose(rng).copied().unwrap_or_default(),
        }
    }

    /// Bring an arbitrary value back into the domain.
    ///
    /// Continuous values are clamped, discrete values snap to the nearest member.
    pub(crate) fn repair(&self, value: f64) -> f64 {
        match &self.domain {
            Domain::Continuous { min, max } => {
                if value.is_nan() {
                    *min
                } else {
                    value.clamp(*min, *max)
                }
            }
            Domain::Discrete { values } => values
                .iter()
                .copied()
                .min_by(|a, b| (a - value).abs().total_cmp(&(b - value).abs()))
                .unwrap_or(value),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ProblemDefect> {
        match &self.domain {
            Domain::Continuous { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(ProblemDefect::NonFiniteBound {
                        id: self.id.clone(),
                    });
                }

                if min > max {
                    return Err(ProblemDefect::InvertedBounds {
                        id: self.id.clone(),
                        min: *min,
                        max: *max,
                    });
                }
            }
            Domain::Discrete { values } => {
                if values.is_empty() {
                    return Err(ProblemDefect::EmptyDiscreteSet {
                        id: self.id.clone(),
                    });
                }

                if values.iter().any(|v| !v.is_finite()) {
                    return Err(ProblemDefect::NonFiniteDiscreteValue {
                        id: self.id.clone(),
                    });
                }
            }
        }

        match self.value {
            Some(value) if !self.contains(value) => Err(ProblemDefect::InitialValueOutOfDomain {
                id: self.id.clone(),
                value,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn it_samples_inside_the_domain() {
        let mut rng = StdRng::seed_from_u64(7);
        let diameter = Variable::continuous("diameter", 0.1, 0.8);
        let material = Variable::discrete("roughness", [0.00015, 0.0009, 0.003]);

        for _ in 0..1000 {
            assert!(diameter.contains(diameter.sample(&mut rng)));
            assert!(material.contains(material.sample(&mut rng)));
        }
    }

    #[test]
    fn it_repairs_values_into_the_domain() {
        let diameter = Variable::continuous("diameter", 0.1, 0.8);
        let sizes = Variable::discrete("size", [100.0, 125.0, 160.0]);

        assert_eq!(diameter.repair(-3.0), 0.1);
        assert_eq!(diameter.repair(4.0), 0.8);
        assert_eq!(diameter.repair(f64::NAN), 0.1);
        assert_eq!(sizes.repair(130.0), 125.0);
        assert_eq!(sizes.repair(1000.0), 160.0);
    }

    #[test]
    fn discrete_ranges_span_the_value_set() {
        assert_eq!(Variable::discrete("size", [160.0, 100.0, 250.0]).range(), 150.0);
        assert_eq!(Variable::discrete("only", [3.0]).range(), 0.0);
        assert_eq!(Variable::discrete("none", Vec::<f64>::new()).range(), 0.0);
        assert_eq!(Variable::continuous("x", -1.0, 4.0).range(), 5.0);
    }

    #[test]
    fn it_rejects_malformed_domains() {
        assert_eq!(
            Variable::continuous("x", 2.0, 1.0).validate(),
            Err(ProblemDefect::InvertedBounds {
                id: "x".to_string(),
                min: 2.0,
                max: 1.0
            })
        );
        assert_eq!(
            Variable::discrete("d", []).validate(),
            Err(ProblemDefect::EmptyDiscreteSet { id: "d".to_string() })
        );
        assert_eq!(
            Variable::continuous("x", 0.0, f64::INFINITY).validate(),
            Err(ProblemDefect::NonFiniteBound { id: "x".to_string() })
        );
        assert!(matches!(
            Variable::continuous("x", 0.0, 1.0).with_value(2.0).validate(),
            Err(ProblemDefect::InitialValueOutOfDomain { .. })
        ));
        assert!(Variable::continuous("x", 1.0, 1.0).validate().is_ok());
    }
}
