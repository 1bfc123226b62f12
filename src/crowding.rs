use crate::individual::Individual;

/// Crowding distance of each point of one front.
///
/// For every objective the points are sorted by that objective; the two
/// boundary points get an infinite distance and interior points accumulate
/// the normalized gap between their neighbours. Objectives with zero spread
/// contribute nothing.
pub fn crowding_distances(points: &[&[f64]]) -> Vec<f64> {
    let len = points.len();
    let mut distances = vec![0.0; len];

    if len <= 2 {
        return vec![f64::INFINITY; len];
    }

    let objectives = points[0].len();
    let mut order: Vec<usize> = (0..len).collect();

    for obj in 0..objectives {
        order.sort_by(|&a, &b| points[a][obj].total_cmp(&points[b][obj]));

        let first = order[0];
        let last = order[len - 1];

        distances[first] = f64::INFINITY;
        distances[last] = f64::INFINITY;

        let diff = points[last][obj] - points[first][obj];

        if diff > 0.0 {
            for i in 1..len - 1 {
                let current = order[i];

                if distances[current].is_finite() {
                    distances[current] +=
                        (points[order[i + 1]][obj] - points[order[i - 1]][obj]) / diff;
                }
            }
        }
    }

    distances
}

/// Compute and store crowding distances for every front of `pop`.
pub(crate) fn assign_crowding_distances(pop: &mut [Individual], fronts: &[Vec<usize>]) {
    for front in fronts {
        let distances = {
            let points: Vec<&[f64]> = front.iter().map(|&i| pop[i].objectives.as_slice()).collect();
            crowding_distances(&points)
        };

        for (&index, distance) in front.iter().zip(distances) {
            pop[index].crowding_distance = distance;
        }
    }
}
