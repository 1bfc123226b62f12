//! Quality indicators and trade-off analysis of a Pareto front.
//!
//! All functions work in minimization space: smaller objective values are better.

use itertools::Itertools;
use ndarray::{Array2, Axis};
use rand::Rng;

/// Above this many objectives the exact hypervolume grows too expensive and
/// [`front_hypervolume`] switches to a Monte Carlo estimate.
pub const EXACT_HYPERVOLUME_MAX_OBJECTIVES: usize = 4;

/// Samples drawn by [`front_hypervolume`] when it estimates.
pub const HYPERVOLUME_SAMPLES: usize = 20_000;

/// Hypervolume of a front: exact up to [`EXACT_HYPERVOLUME_MAX_OBJECTIVES`]
/// objectives, estimated with [`HYPERVOLUME_SAMPLES`] samples above that.
pub fn front_hypervolume<R: Rng>(points: &[Vec<f64>], reference: &[f64], rng: &mut R) -> f64 {
    if reference.len() <= EXACT_HYPERVOLUME_MAX_OBJECTIVES {
        hypervolume(points, reference)
    } else {
        hypervolume_estimate(points, reference, HYPERVOLUME_SAMPLES, rng)
    }
}

/// Exact hypervolume dominated by `points` and bounded by `reference`.
///
/// Points that do not strictly dominate the reference point contribute nothing.
/// Two objectives are swept directly; more are sliced recursively along the
/// last objective.
pub fn hypervolume(points: &[Vec<f64>], reference: &[f64]) -> f64 {
    let inside: Vec<Vec<f64>> = points
        .iter()
        .filter(|point| point.iter().zip(reference).all(|(p, r)| p < r))
        .cloned()
        .collect();

    hypervolume_recursive(inside, reference)
}

fn hypervolume_recursive(mut points: Vec<Vec<f64>>, reference: &[f64]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }

    let dims = reference.len();

    match dims {
        0 => 0.0,
        1 => reference[0] - points.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min),
        2 => {
            points.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));

            let mut volume = 0.0;
            let mut ceiling = reference[1];

            for point in &points {
                if point[1] < ceiling {
                    volume += (reference[0] - point[0]) * (ceiling - point[1]);
                    ceiling = point[1];
                }
            }

            volume
        }
        _ => {
            let last = dims - 1;
            points.sort_by(|a, b| a[last].total_cmp(&b[last]));

            let mut volume = 0.0;

            for i in 0..points.len() {
                let upper = points
                    .get(i + 1)
                    .map(|next| next[last])
                    .unwrap_or(reference[last]);
                let depth = upper - points[i][last];

                if depth > 0.0 {
                    let slice: Vec<Vec<f64>> = points[..=i].iter().map(|p| p[..last].to_vec()).collect();

                    volume += depth * hypervolume_recursive(slice, &reference[..last]);
                }
            }

            volume
        }
    }
}

/// Monte Carlo estimate of [`hypervolume`].
///
/// Samples uniformly inside the box between the front's per-objective minimum
/// and `reference`; the estimate is the box volume times the fraction of
/// samples dominated by at least one point. Linear in the number of objectives.
pub fn hypervolume_estimate<R: Rng>(points: &[Vec<f64>], reference: &[f64], samples: usize, rng: &mut R) -> f64 {
    let inside: Vec<&Vec<f64>> = points
        .iter()
        .filter(|point| point.iter().zip(reference).all(|(p, r)| p < r))
        .collect();

    if inside.is_empty() || samples == 0 {
        return 0.0;
    }

    let lower: Vec<f64> = (0..reference.len())
        .map(|obj| inside.iter().map(|point| point[obj]).fold(f64::INFINITY, f64::min))
        .collect();
    let box_volume: f64 = lower.iter().zip(reference).map(|(lo, r)| r - lo).product();

    let mut sample = vec![0.0; reference.len()];
    let hits = (0..samples)
        .filter(|_| {
            for (value, (lo, r)) in sample.iter_mut().zip(lower.iter().zip(reference)) {
                *value = rng.gen_range(*lo..*r);
            }

            inside
                .iter()
                .any(|point| point.iter().zip(&sample).all(|(p, s)| p <= s))
        })
        .count();

    box_volume * hits as f64 / samples as f64
}

/// Spread of nearest-neighbour distances: the sample standard deviation of
/// each point's Euclidean distance to its closest neighbour. Zero is perfectly even.
pub fn spacing(points: &[Vec<f64>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let nearest: Vec<f64> = points
        .iter()
        .enumerate()
        .map(|(i, a)| {
            points
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| euclidean(a, b))
                .fold(f64::INFINITY, f64::min)
        })
        .collect();

    let mean = nearest.iter().sum::<f64>() / nearest.len() as f64;
    let variance = nearest.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (nearest.len() - 1) as f64;

    variance.sqrt()
}

/// Knee points of a front, best first.
///
/// In range-normalized objective space the trade-off of moving from `i` to
/// `j` is `loss / gain`, summed over objectives where `j` is worse and better
/// respectively. A knee loses more than it gains against every other member,
/// i.e. its smallest trade-off ratio exceeds 1.
pub fn knee_points(points: &[Vec<f64>]) -> Vec<usize> {
    if points.len() < 3 {
        return Vec::new();
    }

    let normalized = normalize(points);

    let scores: Vec<f64> = normalized
        .outer_iter()
        .enumerate()
        .map(|(i, a)| {
            normalized
                .outer_iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| {
                    let (gain, loss) = a.iter().zip(b.iter()).fold((0.0, 0.0), |(gain, loss), (fa, fb)| {
                        (gain + (fa - fb).max(0.0), loss + (fb - fa).max(0.0))
                    });

                    if gain > 0.0 {
                        loss / gain
                    } else {
                        f64::INFINITY
                    }
                })
                .fold(f64::INFINITY, f64::min)
        })
        .collect();

    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > 1.0 + KNEE_TOLERANCE && score.is_finite())
        .sorted_by(|a, b| b.1.total_cmp(a.1))
        .map(|(index, _)| index)
        .collect()
}

const KNEE_TOLERANCE: f64 = 1.0e-9;

/// Best compromise: the member closest to the utopia point.
///
/// Distance is weighted Euclidean in range-normalized objective space, where
/// the utopia point is the origin.
pub fn compromise_solution(points: &[Vec<f64>], weights: &[f64]) -> Option<usize> {
    if points.is_empty() {
        return None;
    }

    let normalized = normalize(points);

    normalized
        .outer_iter()
        .map(|row| {
            row.iter()
                .zip(weights)
                .map(|(value, weight)| weight * value * value)
                .sum::<f64>()
                .sqrt()
        })
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Per-objective best values of the points.
pub fn utopia_point(points: &[Vec<f64>]) -> Vec<f64> {
    extreme_point(points, f64::INFINITY, f64::min)
}

/// Per-objective worst values of the points.
pub fn nadir_point(points: &[Vec<f64>]) -> Vec<f64> {
    extreme_point(points, f64::NEG_INFINITY, f64::max)
}

/// Reference point for hypervolume: `worst + offset * (worst - best)`, or
/// `worst + offset` where an objective has no spread.
pub fn reference_point(best: &[f64], worst: &[f64], offset: f64) -> Vec<f64> {
    best.iter()
        .zip(worst)
        .map(|(b, w)| {
            let range = w - b;
            if range > 0.0 {
                w + offset * range
            } else {
                w + offset
            }
        })
        .collect()
}

fn extreme_point(points: &[Vec<f64>], init: f64, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let objectives = points.first().map(Vec::len).unwrap_or(0);

    (0..objectives)
        .map(|obj| points.iter().map(|p| p[obj]).fold(init, pick))
        .collect()
}

/// Rescale every objective to `[0, 1]`; objectives without spread become 0.
fn normalize(points: &[Vec<f64>]) -> Array2<f64> {
    let objectives = points.first().map(Vec::len).unwrap_or(0);
    let mut matrix = Array2::from_shape_fn((points.len(), objectives), |(i, j)| points[i][j]);

    let mins = matrix.fold_axis(Axis(0), f64::INFINITY, |&a, &b| a.min(b));
    let maxs = matrix.fold_axis(Axis(0), f64::NEG_INFINITY, |&a, &b| a.max(b));

    for (mut column, (lo, hi)) in matrix.columns_mut().into_iter().zip(mins.iter().zip(maxs.iter())) {
        let range = hi - lo;

        if range > 0.0 {
            column.mapv_inplace(|value| (value - lo) / range);
        } else {
            column.fill(0.0);
        }
    }

    matrix
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}
