//! Clusterings (C4): a partition of a matrix's rows into named clusters,
//! plus an implicit "unclustered" cluster covering the complement.
//!
//! The synthetic cluster is named `" unclustered"` (leading space) so it
//! cannot collide with an author-named cluster called `unclustered` — this
//! is load-bearing, not decorative, per the source project's
//! `GeneExpressionMatrixClustering` constructor.

use crate::matrix::ExpressionMatrix;

pub const UNCLUSTERED_NAME: &str = " unclustered";

#[derive(Debug, Clone)]
pub struct Cluster {
    name: String,
    rows: Vec<usize>,
}

impl Cluster {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }
}

/// A named sequence of clusters over one expression matrix.
#[derive(Debug)]
pub struct Clustering {
    name: String,
    clusters: Vec<Cluster>,
}

impl Clustering {
    /// Builds a clustering view from raw `(cluster_name, rows)` groups
    /// (already resolved to matrix row indices, genes missing from the
    /// matrix already dropped by the caller) and synthesises the
    /// `" unclustered"` complement cluster against `matrix`.
    pub fn new(name: String, groups: Vec<(String, Vec<usize>)>, matrix: &ExpressionMatrix) -> Self {
        let mut clusters: Vec<Cluster> = groups
            .into_iter()
            .map(|(name, rows)| Cluster { name, rows })
            .collect();

        let mut covered = vec![false; matrix.rows()];
        for cluster in &clusters {
            for &row in &cluster.rows {
                covered[row] = true;
            }
        }
        let complement: Vec<usize> = covered
            .iter()
            .enumerate()
            .filter(|(_, &c)| !c)
            .map(|(i, _)| i)
            .collect();
        if !complement.is_empty() {
            clusters.push(Cluster {
                name: UNCLUSTERED_NAME.to_string(),
                rows: complement,
            });
        }

        Clustering { name, clusters }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }
}
