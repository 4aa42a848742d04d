//! Neighbourhood finder + family projector (C6+C7).
//!
//! Grounded on `coexpr/main.cpp` (bait assignment, the correlation-threshold
//! sweep, the orphan-family filter) and `coexpr/OrthologGroupInfo.{h,cpp}` +
//! `coexpr/BaitCorrelation{,s}.{h,cpp}` (the per-family running max
//! correlation per bait, and the bait-group identity string).

use std::collections::HashMap;

use itertools::Itertools;

use crate::correlation::correlation_block;
use crate::family::FamilyHandle;
use crate::gene::GeneHandle;
use crate::matrix::MatrixHandle;
use crate::store::DomainStore;

/// Correlations of every target gene (within one family) to one bait,
/// mirroring `BaitCorrelations`.
pub struct BaitCorrelations {
    bait: GeneHandle,
    correlations: Vec<(GeneHandle, f64)>,
}

impl BaitCorrelations {
    fn new(bait: GeneHandle) -> Self {
        BaitCorrelations { bait, correlations: Vec::new() }
    }

    pub fn bait(&self) -> GeneHandle {
        self.bait
    }

    /// Max correlation among all targets of this family recorded against
    /// this bait (`BaitCorrelations::get_max_correlation`).
    pub fn max_correlation(&self) -> f64 {
        self.correlations
            .iter()
            .map(|&(_, c)| c)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn correlations(&self) -> &[(GeneHandle, f64)] {
        &self.correlations
    }
}

/// A target family that correlates with at least one bait
/// (`coexpr::OrthologGroupInfo`).
pub struct FamilyInfo {
    family: FamilyHandle,
    bait_correlations: Vec<BaitCorrelations>,
    /// Genes of this family that actually correlate with some bait, in
    /// discovery order; a gene correlating with more than one bait appears
    /// once per bait, faithfully mirroring the source's
    /// `correlating_genes.emplace_back` on every `add_bait_correlation`.
    correlating_genes: Vec<GeneHandle>,
}

impl FamilyInfo {
    fn new(family: FamilyHandle) -> Self {
        FamilyInfo { family, bait_correlations: Vec::new(), correlating_genes: Vec::new() }
    }

    pub fn family(&self) -> FamilyHandle {
        self.family
    }

    pub fn bait_correlations(&self) -> &[BaitCorrelations] {
        &self.bait_correlations
    }

    /// Targets of this family that correlate with a bait, deduplicated and
    /// in first-discovery order (the writer's unit of "genes in this node").
    pub fn correlating_genes_unique(&self) -> Vec<GeneHandle> {
        self.correlating_genes.iter().copied().unique().collect()
    }

    fn add_bait_correlation(&mut self, target: GeneHandle, bait: GeneHandle, correlation: f64) {
        match self.bait_correlations.iter_mut().find(|bc| bc.bait == bait) {
            Some(bc) => bc.correlations.push((target, correlation)),
            None => {
                let mut bc = BaitCorrelations::new(bait);
                bc.correlations.push((target, correlation));
                self.bait_correlations.push(bc);
            }
        }
        self.correlating_genes.push(target);
    }

    /// The bait-group identity string: bait names this family correlates
    /// with, insertion order, `;`-separated with a trailing `;`
    /// (`OrthologGroupInfo::init_bait_group`).
    pub fn bait_group_id(&self, store: &DomainStore) -> String {
        let mut id = String::new();
        for bc in &self.bait_correlations {
            id.push_str(store.gene(bc.bait).name());
            id.push(';');
        }
        id
    }
}

/// The assembled CoExpr network for one job: baits, the families they
/// correlate with, and bait-bait ortholog edges.
pub struct CoexprNetwork {
    pub baits: Vec<GeneHandle>,
    /// Families with at least one bait correlation, in discovery order
    /// (matrix-of-origin, then bait-column, then gene-row, per §4.4).
    pub families: Vec<FamilyInfo>,
    /// Ordered `(a, b)` pairs for every family containing >=2 baits, all
    /// `i != j` pairs emitted (§4.4 "Bait-bait orthology edges").
    pub bait_orthology_edges: Vec<(GeneHandle, GeneHandle)>,
}

/// Builds the CoExpr neighbourhood for `baits` against `matrices`.
///
/// `baits` is deduplicated by the caller (ingest of the baits file already
/// does this, matching `main.cpp`'s `sort`+`unique` before processing).
/// Thresholds are expected already range-validated by job configuration.
pub fn find_neighbourhood(
    store: &DomainStore,
    baits: &[GeneHandle],
    matrices: &[MatrixHandle],
    negative_threshold: f64,
    positive_threshold: f64,
) -> CoexprNetwork {
    let assigned: Vec<GeneHandle> = baits
        .iter()
        .copied()
        .filter(|&b| store.matrix_containing(b).is_some())
        .collect();

    let mut family_order: Vec<FamilyHandle> = Vec::new();
    let mut families: HashMap<FamilyHandle, FamilyInfo> = HashMap::new();

    for &matrix_handle in matrices {
        let matrix = store.matrix(matrix_handle);
        let bait_rows: Vec<usize> = assigned
            .iter()
            .filter_map(|&b| matrix.row_of(b))
            .collect();
        if bait_rows.is_empty() {
            continue;
        }
        let bait_row_set: std::collections::HashSet<usize> = bait_rows.iter().copied().collect();
        let block = correlation_block(matrix, &bait_rows);

        for (col, &bait_row) in bait_rows.iter().enumerate() {
            let bait_gene = matrix.gene_of(bait_row);
            for row in 0..matrix.rows() {
                if bait_row_set.contains(&row) {
                    continue;
                }
                let corr = block.get(row, col);
                if corr.is_nan() {
                    continue;
                }
                if !(corr < negative_threshold || corr > positive_threshold) {
                    continue;
                }

                let target = matrix.gene_of(row);
                let target_family = match richest_family(store, target) {
                    Some(f) => f,
                    None => continue, // orphan-family filter: no family of size >= 2
                };

                let info = families.entry(target_family).or_insert_with(|| {
                    family_order.push(target_family);
                    FamilyInfo::new(target_family)
                });
                info.add_bait_correlation(target, bait_gene, corr);
            }
        }
    }

    let ordered_families = family_order
        .into_iter()
        .map(|f| families.remove(&f).expect("family_order and families stay in sync"))
        .collect();

    let bait_orthology_edges = bait_bait_orthology_edges(store, &assigned);

    CoexprNetwork { baits: assigned, families: ordered_families, bait_orthology_edges }
}

/// A gene's first family with at least 2 members, if any. A gene normally
/// carries exactly one family (`assign_to_family` folds the initial
/// singleton into whichever real family it is assigned to), but a gene that
/// already had more than one family when a second assignment happened keeps
/// both — so picking `families_of(gene).first()` unconditionally can return
/// a leftover singleton ahead of the real, multi-gene family. Scanning for
/// the first family that actually clears the orphan-filter size avoids
/// that.
fn richest_family(store: &DomainStore, gene: GeneHandle) -> Option<FamilyHandle> {
    store
        .families_of(gene)
        .iter()
        .copied()
        .find(|&f| store.family(f).len() >= 2)
}

/// Every ordered `(b_i, b_j)` pair, `i != j`, for baits that share a family
/// (`CytoscapeWriter::get_bait_orthology_relations`).
fn bait_bait_orthology_edges(store: &DomainStore, baits: &[GeneHandle]) -> Vec<(GeneHandle, GeneHandle)> {
    let mut by_family: HashMap<FamilyHandle, Vec<GeneHandle>> = HashMap::new();
    let mut family_order = Vec::new();
    for &bait in baits {
        if let Some(family) = richest_family(store, bait) {
            by_family.entry(family).or_insert_with(|| {
                family_order.push(family);
                Vec::new()
            }).push(bait);
        }
    }

    let mut edges = Vec::new();
    for family in family_order {
        let genes = &by_family[&family];
        if genes.len() < 2 {
            continue;
        }
        for i in 0..genes.len() {
            for j in 0..genes.len() {
                if i != j {
                    edges.push((genes[i], genes[j]));
                }
            }
        }
    }
    edges
}
