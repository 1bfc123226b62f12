use std::cmp::Ordering;

use crate::individual::Individual;

/// Fast non-dominated sort under constrained dominance.
///
/// Uses the efficient non-dominated sort strategy: individuals are visited in
/// lexicographic order of `(violation, objectives...)`, an order in which no
/// individual can be dominated by one visited after it, and each is placed in
/// the first front holding no member that dominates it.
///
/// Returns fronts `F1, F2, ...` as index lists into `pop`.
pub fn ens_nondominated_sorting(pop: &[Individual]) -> Vec<Vec<usize>> {
    let mut indices = (0..pop.len()).collect::<Vec<usize>>();
    indices.sort_by(|&a, &b| {
        pop[a]
            .violation
            .total_cmp(&pop[b].violation)
            .then_with(|| lexicographic(&pop[a].objectives, &pop[b].objectives))
    });

    let mut fronts: Vec<Vec<usize>> = vec![];
    for &n in indices.iter() {
        let mut k = 0;
        while k < fronts.len() {
            let contain_dominating_n = fronts[k]
                .iter()
                .rev()
                .any(|&i| pop[i].constrained_dominates(&pop[n]));

            if !contain_dominating_n {
                fronts[k].push(n);
                break;
            }

            k += 1;
        }

        if k == fronts.len() {
            fronts.push(vec![n]);
        }
    }

    fronts
}

fn lexicographic(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(a_i, b_i)| a_i.total_cmp(b_i))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Write front membership into each individual's rank (0 = first front).
pub(crate) fn assign_ranks(pop: &mut [Individual], fronts: &[Vec<usize>]) {
    for (rank, front) in fronts.iter().enumerate() {
        for &index in front {
            pop[index].rank = rank;
        }
    }
}
