//! Per-job orchestration (C8): ingest, run the algorithm, aggregate results.
//!
//! Mirrors `morph/main.cpp`'s/`coexpr/main.cpp`'s top-level flow: set up the
//! gene collections and cross-cutting ingest (orthologs, mappings,
//! annotations) once, ingest the job-specific inputs, then run the
//! algorithm. Library code never calls `process::exit`; the binary maps
//! `Error::exit_code()` at its own boundary.

use std::path::Path;

use log::warn;

use crate::clustering::Clustering;
use crate::coexpr::{find_neighbourhood, CoexprNetwork};
use crate::correlation::correlation_block;
use crate::error::Result;
use crate::gene::{GeneHandle, ParserRule};
use crate::ingest;
use crate::job::{CoexprJob, DatasetConfig, MorphJob};
use crate::matrix::MatrixHandle;
use crate::ranker::rank;
use crate::store::DomainStore;

/// One ranked candidate in a [`MorphResult`].
pub struct MorphCandidate {
    pub rank: usize,
    pub gene: String,
    pub score: f64,
    pub annotation: Option<String>,
    pub gene_web_page: Option<String>,
}

/// The emitted result for one GOI file: the best-AUSR `(matrix, clustering)`
/// pairing, per §1(a)/§4.5.
pub struct MorphResult {
    pub goi_file: String,
    pub best_ausr: f64,
    pub average_ausr: f64,
    pub gene_expression_name: String,
    pub clustering_name: String,
    pub goi_genes_present: Vec<String>,
    pub goi_genes_missing: Vec<String>,
    pub candidates: Vec<MorphCandidate>,
}

fn build_store(dataset: &DatasetConfig, base_dir: &Path) -> Result<DomainStore> {
    let mut store = DomainStore::new();

    for collection in &dataset.gene_collections {
        let rules: Result<Vec<ParserRule>> = collection
            .rules
            .iter()
            .map(|r| ParserRule::new(&r.pattern, &r.replace_template, r.splice_variant_group))
            .collect();
        let handle = store.new_collection(&collection.name, rules?)?;
        if let Some(template) = &collection.gene_web_page_template {
            store.collection_mut(handle).set_gene_web_page_template(template.clone());
        }
    }

    for file in &dataset.orthologs_files {
        let path = ingest::relative_to(base_dir, &file.path);
        ingest::ingest_orthologs(&mut store, &file.source_name, &path)?;
    }
    for path in &dataset.gene_mappings_files {
        let path = ingest::relative_to(base_dir, path);
        ingest::ingest_gene_mappings(&mut store, &path)?;
    }
    for path in &dataset.functional_annotation_files {
        let path = ingest::relative_to(base_dir, path);
        ingest::ingest_functional_annotations(&mut store, &path)?;
    }

    Ok(store)
}

/// Runs one MORPH job: for every GOI file, evaluates every
/// `(matrix, clustering)` pair named by the job and keeps only the
/// highest-AUSR pairing (§1(a), §4.5). A GOI yielding no viable pairing is
/// reported as a warning and omitted from the results.
pub fn run_morph_job(job: &MorphJob, base_dir: &Path) -> Result<Vec<MorphResult>> {
    let mut store = build_store(&job.dataset, base_dir)?;

    let mut matrices: Vec<(MatrixHandle, Vec<Clustering>)> = Vec::new();
    for matrix_config in &job.expression_matrices {
        let matrix_path = ingest::relative_to(base_dir, &matrix_config.path);
        let matrix = ingest::ingest_expression_matrix(&mut store, &matrix_path)?;
        let mut clusterings = Vec::with_capacity(matrix_config.clusterings.len());
        for clustering_path in &matrix_config.clusterings {
            let clustering_path = ingest::relative_to(base_dir, clustering_path);
            clusterings.push(ingest::ingest_clustering(&mut store, matrix, &clustering_path)?);
        }
        matrices.push((matrix, clusterings));
    }

    let mut results = Vec::with_capacity(job.goi_files.len());
    for goi_path in &job.goi_files {
        let goi_path_resolved = ingest::relative_to(base_dir, goi_path);
        let goi_file_label = goi_path.to_string_lossy().into_owned();
        let ingested = ingest::ingest_gene_list(&mut store, &goi_path_resolved)?;

        let mut ausr_sum = 0.0;
        let mut ausr_count = 0usize;
        let mut best: Option<(f64, MatrixHandle, String, crate::ranker::RankingOutcome, Vec<usize>)> = None;

        for (matrix, clusterings) in &matrices {
            let rows: Vec<usize> = ingested
                .resolved
                .iter()
                .filter_map(|&g| store.matrix(*matrix).row_of(g))
                .collect();
            if rows.len() < 5 {
                continue;
            }
            let block = correlation_block(store.matrix(*matrix), &rows);
            for clustering in clusterings {
                if let Some(outcome) = rank(clustering, &block, &rows) {
                    ausr_sum += outcome.ausr;
                    ausr_count += 1;
                    let is_better = match &best {
                        None => true,
                        Some((best_ausr, ..)) => outcome.ausr > *best_ausr,
                    };
                    if is_better {
                        best = Some((outcome.ausr, *matrix, clustering.name().to_string(), outcome, rows.clone()));
                    }
                }
            }
        }

        match best {
            None => {
                warn!("GOI file '{goi_file_label}' produced no viable (matrix, clustering) ranking; skipping");
            }
            Some((best_ausr, matrix, clustering_name, outcome, rows)) => {
                let average_ausr = ausr_sum / ausr_count as f64;
                let present: Vec<String> = rows.iter().map(|&r| store.gene(store.matrix(matrix).gene_of(r)).name().to_string()).collect();

                let mut ranked: Vec<(usize, f64)> = outcome
                    .scores
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| !s.is_nan())
                    .map(|(row, &s)| (row, s))
                    .collect();
                ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).expect("scores are never NaN here"));
                ranked.truncate(job.top_k);

                let candidates = ranked
                    .into_iter()
                    .enumerate()
                    .map(|(i, (row, score))| {
                        let gene = store.matrix(matrix).gene_of(row);
                        let name = store.gene(gene).name().to_string();
                        let collection = store.gene(gene).collection();
                        MorphCandidate {
                            rank: i + 1,
                            gene: name.clone(),
                            score,
                            annotation: store.gene(gene).annotation().map(|s| s.to_string()),
                            gene_web_page: store.collection(collection).gene_web_page(&name),
                        }
                    })
                    .collect();

                results.push(MorphResult {
                    goi_file: goi_file_label,
                    best_ausr,
                    average_ausr,
                    gene_expression_name: store.matrix(matrix).name().to_string(),
                    clustering_name,
                    goi_genes_present: present,
                    goi_genes_missing: ingested.missing.clone(),
                    candidates,
                });
            }
        }
    }

    Ok(results)
}

/// Runs one CoExpr job: ingests baits and matrices, builds the neighbourhood
/// of §4.4, and returns the assembled network plus the store it was built
/// against (writers need both to resolve gene names).
pub fn run_coexpr_job(job: &CoexprJob, base_dir: &Path) -> Result<(DomainStore, CoexprNetwork)> {
    let mut store = build_store(&job.dataset, base_dir)?;

    let mut matrices = Vec::with_capacity(job.expression_matrices.len());
    for matrix_path in &job.expression_matrices {
        let matrix_path = ingest::relative_to(base_dir, matrix_path);
        matrices.push(ingest::ingest_expression_matrix(&mut store, &matrix_path)?);
    }

    let baits_path = ingest::relative_to(base_dir, &job.baits);
    let ingested = ingest::ingest_gene_list(&mut store, &baits_path)?;
    if !ingested.missing.is_empty() {
        warn!("baits file '{}' had {} unresolved name(s)", job.baits.display(), ingested.missing.len());
    }

    let mut baits: Vec<GeneHandle> = ingested.resolved;
    let mut seen = std::collections::HashSet::new();
    baits.retain(|g| seen.insert(*g));
    let network = find_neighbourhood(&store, &baits, &matrices, job.negative_treshold, job.positive_treshold);
    Ok((store, network))
}
