//! MORPH ranking (C5): intra-cluster aggregation, per-cluster z-normalisation,
//! leave-one-out self-evaluation and AUSR.
//!
//! Grounded on `morph/Ranking.cpp` in the source project: `rank_genes` +
//! `finalise_ranking` build the emitted ranking (§4.3 steps 1-2);
//! `rank_self` performs the leave-one-out recomputation used only to derive
//! AUSR (§4.3 step 3). The emitted ranking and the AUSR computation use two
//! independent finalisations of the same cluster, which is why this module
//! keeps them as two passes over the same per-cluster intermediate state
//! (`ClusterPartials`) rather than one.

use std::collections::HashSet;

use crate::clustering::Clustering;
use crate::correlation::CorrelationBlock;

/// Cutoff rank count for AUSR, per `spec.md` §4.3/GLOSSARY.
pub const K: usize = 1000;

/// Penalty rank assigned to a GOI member that cannot be ranked
/// (no candidates in its cluster, or fewer than 2 GOI members in it).
/// `2K - 1` never counts towards AUSR's `i < K` cutoffs.
const PENALTY_RANK: usize = 2 * K - 1;

/// Result of ranking one (matrix, clustering) pair against one GOI.
pub struct RankingOutcome {
    /// Length `matrix.rows()`; NaN for GOI members and genes in clusters
    /// without both GOI and candidates.
    pub scores: Vec<f64>,
    pub ausr: f64,
}

struct ClusterPartials {
    rows: Vec<usize>,
    goi_in: Vec<usize>,
    candidates: Vec<usize>,
    /// partial[g] = sum over GOI members h in this cluster of C[g, col(h)],
    /// for every g in `rows` (both GOI members and candidates).
    partial: Vec<f64>,
}

fn mean_and_sample_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

fn count_finite_greater(values: &[f64], threshold: f64) -> usize {
    values.iter().filter(|&&v| !v.is_nan() && v > threshold).count()
}

/// Ranks `goi` (row indices already resolved to `block`'s matrix and already
/// dropped of genes missing from it) against every cluster of `clustering`,
/// using the correlation block built with `goi` as its subset.
///
/// Returns `None` if `goi.len() < 5` (§4.3 edge case) or if every cluster
/// lacks either GOI members or candidates (nothing to rank).
pub fn rank(clustering: &Clustering, block: &CorrelationBlock, goi: &[usize]) -> Option<RankingOutcome> {
    if goi.len() < 5 {
        return None;
    }
    let goi_set: HashSet<usize> = goi.iter().copied().collect();
    let n = block.rows();

    let mut clusters = Vec::with_capacity(clustering.clusters().len());
    for cluster in clustering.clusters() {
        let rows = cluster.rows().to_vec();
        let goi_in: Vec<usize> = rows.iter().copied().filter(|r| goi_set.contains(r)).collect();
        let candidates: Vec<usize> = rows.iter().copied().filter(|r| !goi_set.contains(r)).collect();

        let partial: Vec<f64> = rows
            .iter()
            .map(|&g| {
                goi_in
                    .iter()
                    .map(|&h| block.get(g, block.column_of(h).expect("goi row must be in block's subset")))
                    .sum()
            })
            .collect();

        clusters.push(ClusterPartials { rows, goi_in, candidates, partial });
    }

    // Step 1-2: the emitted ranking. Candidates get z-scored partials;
    // everything else (GOI members, genes in GOI-or-candidate-less clusters)
    // stays NaN.
    let mut scores = vec![f64::NAN; n];
    let mut any_scored_cluster = false;
    for c in &clusters {
        if c.goi_in.is_empty() || c.candidates.is_empty() {
            continue;
        }
        any_scored_cluster = true;
        let goi_count = c.goi_in.len() as f64;
        let cand_finals: Vec<f64> = c
            .candidates
            .iter()
            .map(|&g| c.partial[local_index(&c.rows, g)] / goi_count)
            .collect();
        let (mean, sd) = mean_and_sample_sd(&cand_finals);
        for (i, &g) in c.candidates.iter().enumerate() {
            scores[g] = if sd > 0.0 { (cand_finals[i] - mean) / sd } else { f64::NAN };
        }
    }

    if !any_scored_cluster {
        return None;
    }

    // Step 3: leave-one-out self-evaluation (AUSR). Operates on a private
    // working copy; never perturbs `scores`.
    let mut rank_indices = Vec::with_capacity(goi.len());
    for c in &clusters {
        if c.goi_in.is_empty() {
            continue;
        }
        if c.candidates.is_empty() || c.goi_in.len() < 2 {
            rank_indices.extend(std::iter::repeat(PENALTY_RANK).take(c.goi_in.len()));
            continue;
        }

        // This cluster's rows masked out of the global snapshot; the LOO
        // recomputation for each excluded GOI member is compared against
        // this plus its own freshly recomputed combined set.
        let mut outside_cluster = scores.clone();
        for &r in &c.rows {
            outside_cluster[r] = f64::NAN;
        }

        let goi_count_minus_1 = (c.goi_in.len() - 1) as f64;
        for &g in &c.goi_in {
            let col_g = block.column_of(g).expect("goi row must be in block's subset");
            let mut combined: Vec<(usize, f64)> = c
                .candidates
                .iter()
                .map(|&cand| {
                    let raw = (c.partial[local_index(&c.rows, cand)] - block.get(cand, col_g)) / goi_count_minus_1;
                    (cand, raw)
                })
                .collect();
            let g_raw = (c.partial[local_index(&c.rows, g)] - block.get(g, col_g)) / goi_count_minus_1;
            combined.push((g, g_raw));

            let values: Vec<f64> = combined.iter().map(|&(_, v)| v).collect();
            let (mean, sd) = mean_and_sample_sd(&values);
            let normalised: Vec<f64> = values.iter().map(|&v| if sd > 0.0 { (v - mean) / sd } else { f64::NAN }).collect();
            let g_z = *normalised.last().expect("g appended last");

            if g_z.is_nan() {
                rank_indices.push(PENALTY_RANK);
            } else {
                let outside_count = count_finite_greater(&outside_cluster, g_z);
                let inside_count = count_finite_greater(&normalised, g_z);
                rank_indices.push(outside_count + inside_count);
            }
        }
    }

    debug_assert_eq!(rank_indices.len(), goi.len());
    rank_indices.sort_unstable();

    let mut auc = 0.0;
    for i in 0..K {
        let count = rank_indices.partition_point(|&r| r <= i);
        auc += count as f64 / rank_indices.len() as f64;
    }
    let ausr = auc / K as f64;

    Some(RankingOutcome { scores, ausr })
}

fn local_index(rows: &[usize], row: usize) -> usize {
    rows.iter().position(|&r| r == row).expect("row must belong to its own cluster")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::Clustering;
    use crate::correlation::correlation_block;
    use crate::gene::{CollectionHandle, Gene, GeneHandle};
    use crate::matrix::{ExpressionMatrix, MatrixHandle};
    use approx::assert_relative_eq;

    fn build_matrix(rows: &[Vec<f64>]) -> ExpressionMatrix {
        let k = rows[0].len();
        let mut m = ExpressionMatrix::new(MatrixHandle(0), "m".to_string(), k);
        for (i, row) in rows.iter().enumerate() {
            let _ = Gene::new(GeneHandle(i as u32), CollectionHandle(0), format!("g{i}"));
            m.push_row(GeneHandle(i as u32), row.clone());
        }
        m
    }

    /// Boundary scenario 1: GOI covers a whole cluster, leaving no
    /// candidates anywhere -> no ranking produced.
    #[test]
    fn perfect_recovery_no_candidates_yields_no_ranking() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut rows = vec![signal.clone(); 5];
        rows.extend((0..5).map(|i| vec![i as f64, 7.0, 2.0, 9.0, 1.0, 4.0, 6.0, 3.0]));
        let m = build_matrix(&rows);
        let clustering = Clustering::new(
            "c".to_string(),
            vec![("a".to_string(), vec![0, 1, 2, 3, 4]), ("b".to_string(), vec![5, 6, 7, 8, 9])],
            &m,
        );
        let goi = vec![0, 1, 2, 3, 4];
        let block = correlation_block(&m, &goi);
        assert!(rank(&clustering, &block, &goi).is_none());
    }

    /// Boundary scenario 2: leave-one-out top rank. `|G| = 5` is the minimum
    /// accepted size, with a clear best and a clear worst candidate left in
    /// the GOI's cluster.
    #[test]
    fn leave_one_out_top_rank_gives_perfect_ausr() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut rows = vec![signal.clone(); 5];
        rows.push(signal.clone()); // gene 5: identical signal, the best candidate
        rows.push(vec![8.0, 1.0, 6.0, 3.0, 4.0, 5.0, 2.0, 7.0]); // gene 6: scrambled, the worst candidate
        rows.extend((0..3).map(|i| vec![i as f64 * 3.0 + 1.0, 7.0, 2.0, 9.0, 1.0, 4.0, 6.0, 3.0]));
        let m = build_matrix(&rows);
        let clustering = Clustering::new(
            "c".to_string(),
            vec![("a".to_string(), vec![0, 1, 2, 3, 4, 5, 6]), ("b".to_string(), vec![7, 8, 9])],
            &m,
        );
        let goi = vec![0, 1, 2, 3, 4];
        let block = correlation_block(&m, &goi);
        let outcome = rank(&clustering, &block, &goi).expect("should produce a ranking");
        // gene 5 is the unique remaining identical-signal candidate: its z-score must be the max finite score.
        let max_finite = outcome
            .scores
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::MIN, f64::max);
        assert_relative_eq!(outcome.scores[5], max_finite, epsilon = 1e-9);
        assert!(outcome.scores[5] > outcome.scores[6]);
        assert!((0.0..=1.0).contains(&outcome.ausr));
    }

    #[test]
    fn ausr_is_bounded() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut rows = vec![signal.clone(); 6];
        rows.extend((0..6).map(|i| vec![i as f64, 4.0, 2.0, 8.0, 1.0, 3.0]));
        let m = build_matrix(&rows);
        let clustering = Clustering::new("c".to_string(), vec![("a".to_string(), (0..12).collect())], &m);
        let goi = vec![0, 1, 2, 3, 4];
        let block = correlation_block(&m, &goi);
        if let Some(outcome) = rank(&clustering, &block, &goi) {
            assert!((0.0..=1.0).contains(&outcome.ausr));
        }
    }

    /// Boundary scenario 3: split clusters, candidates scored independently per cluster.
    #[test]
    fn split_clusters_score_independently() {
        let m = build_matrix(&[
            vec![1.0, 2.0, 3.0, 4.0],
            vec![1.1, 2.1, 2.9, 4.2],
            vec![9.0, 1.0, 5.0, 2.0],
            vec![4.0, 3.0, 2.0, 1.0],
            vec![4.1, 2.9, 2.1, 1.1],
            vec![8.0, 1.0, 1.0, 9.0],
        ]);
        let clustering = Clustering::new(
            "c".to_string(),
            vec![("x".to_string(), vec![0, 1, 2]), ("y".to_string(), vec![3, 4, 5])],
            &m,
        );
        let goi = vec![0, 3];
        let block = correlation_block(&m, &goi);
        // |G| = 2 < 5, so this should be rejected per the edge case rule.
        assert!(rank(&clustering, &block, &goi).is_none());
    }
}
