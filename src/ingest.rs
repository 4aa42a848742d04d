//! Parsing of the external file formats of §6 into a [`DomainStore`].
//!
//! TSV formats (expression matrices, clusterings) are read with the `csv`
//! crate in tab-delimited mode, mirroring `dataset.rs`'s reader setup; the
//! orthologs/gene-mappings/GOI formats are ragged (not well-formed CSV) and
//! are hand-split, per `DataFileImport.cpp`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use log::warn;

use crate::clustering::Clustering;
use crate::error::{Error, Result};
use crate::family::ExternalId;
use crate::gene::GeneHandle;
use crate::matrix::MatrixHandle;
use crate::store::{DomainStore, Resolution};

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io { path: path.to_path_buf(), source }
}

fn csv_err(path: &Path, source: csv::Error) -> Error {
    Error::Csv { path: path.to_path_buf(), source }
}

fn lines_of(path: &Path) -> Result<impl Iterator<Item = Result<String>>> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let path = path.to_path_buf();
    Ok(BufReader::new(file)
        .lines()
        .map(move |l| l.map_err(|e| io_err(&path, e))))
}

/// Resolves `raw_name`, treating an unsupported splice variant as fatal.
/// Used by ingest sites where `spec.md` §9's Open Question is resolved
/// toward uniform rejection (matrices, clusterings, orthologs, mappings).
fn resolve_fatal(store: &mut DomainStore, path: &Path, line: usize, raw_name: &str) -> Result<GeneHandle> {
    match store.resolve(raw_name) {
        Resolution::Gene(g) => Ok(g),
        Resolution::NotFound => Err(Error::UnknownGene(raw_name.to_string())),
        Resolution::UnsupportedVariant { gene, variant } => {
            let _ = (path, line);
            Err(Error::UnsupportedVariant { gene, variant })
        }
    }
}

/// Ingests a `gene\tcond_1\t...\tcond_k` expression matrix TSV into a fresh
/// matrix named after the file stem.
///
/// Empty gene names are warned-and-skipped; duplicate gene names and
/// mismatched row arity are fatal (the `csv` reader itself rejects a
/// mismatched field count when `flexible` is left at its default `false`).
pub fn ingest_expression_matrix(store: &mut DomainStore, path: &Path) -> Result<MatrixHandle> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .buffer_capacity(16_384)
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;

    let headers = reader.headers().map_err(|e| csv_err(path, e))?.clone();
    let k = headers.len().saturating_sub(1);
    let matrix = store.new_matrix(name, k);

    for record in reader.records() {
        let record = record.map_err(|e| csv_err(path, e))?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let mut fields = record.iter();
        let gene_name = fields.next().unwrap_or("");
        if gene_name.is_empty() {
            warn!("{}: line {line} has an empty gene name, skipping", path.display());
            continue;
        }

        let values: Result<Vec<f64>> = fields
            .map(|cell| {
                fast_float::parse(cell).map_err(|_| Error::Validation {
                    path: path.to_path_buf(),
                    line,
                    message: format!("invalid numeric value '{cell}'"),
                })
            })
            .collect();
        let values = values?;

        let gene = resolve_fatal(store, path, line, gene_name)?;
        if store.matrix(matrix).has_gene(gene) {
            return Err(Error::Validation {
                path: path.to_path_buf(),
                line,
                message: format!("gene '{gene_name}' appears twice in this matrix"),
            });
        }
        store.push_matrix_row(matrix, gene, values)?;
    }

    Ok(matrix)
}

/// Ingests a `gene\tcluster_name` clustering TSV over an already-ingested
/// matrix. A gene assigned to more than one cluster (including the same
/// cluster twice) is fatal; a gene absent from the matrix is
/// warned-and-dropped, with the drop count logged once at the end.
pub fn ingest_clustering(store: &mut DomainStore, matrix: MatrixHandle, path: &Path) -> Result<Clustering> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let mut assigned: HashMap<GeneHandle, String> = HashMap::new();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0usize;

    for (idx, raw_line) in lines_of(path)?.enumerate() {
        let line_no = idx + 1;
        let raw_line = raw_line?;
        if raw_line.trim().is_empty() {
            continue;
        }
        let mut parts = raw_line.splitn(2, '\t');
        let gene_name = parts.next().unwrap_or("").trim();
        let cluster_name = parts
            .next()
            .ok_or_else(|| Error::Validation {
                path: path.to_path_buf(),
                line: line_no,
                message: "expected 'gene\\tcluster_name'".to_string(),
            })?
            .trim();

        let gene = resolve_fatal(store, path, line_no, gene_name)?;
        if assigned.contains_key(&gene) {
            return Err(Error::Validation {
                path: path.to_path_buf(),
                line: line_no,
                message: format!("gene '{gene_name}' assigned to more than one cluster"),
            });
        }

        let row = match store.matrix(matrix).row_of(gene) {
            Some(r) => r,
            None => {
                dropped += 1;
                continue;
            }
        };
        assigned.insert(gene, cluster_name.to_string());

        let idx = *group_index.entry(cluster_name.to_string()).or_insert_with(|| {
            groups.push((cluster_name.to_string(), Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(row);
    }

    if dropped > 0 {
        warn!("{}: dropped {dropped} gene(s) absent from matrix '{}'", path.display(), store.matrix(matrix).name());
    }

    Ok(Clustering::new(name, groups, store.matrix(matrix)))
}

/// Ingests an `external_id\tgene(\tgene)*` orthologs file. Lines with fewer
/// than 3 tokens are treated as singletons and ignored. Each valid line
/// creates a new family tagged with `(source_name, external_id)`; every
/// named gene is folded into it via [`DomainStore::assign_to_family`].
pub fn ingest_orthologs(store: &mut DomainStore, source_name: &str, path: &Path) -> Result<()> {
    for (idx, raw_line) in lines_of(path)?.enumerate() {
        let line_no = idx + 1;
        let raw_line = raw_line?;
        let tokens: Vec<&str> = raw_line.split_whitespace().collect();
        if tokens.len() < 3 {
            continue;
        }

        let family = store.add_family();
        store.add_family_external_id(
            family,
            ExternalId { source: source_name.to_string(), id: tokens[0].to_string() },
        );

        for &gene_name in &tokens[1..] {
            let gene = resolve_fatal(store, path, line_no, gene_name)?;
            store.assign_to_family(gene, family);
        }
    }
    Ok(())
}

/// Ingests a `gene(\tgene)+` gene-mappings file: the first gene of each line
/// is linked "highly similar" to every subsequent gene on that line. Fatal
/// if a mapped pair shares a gene collection.
pub fn ingest_gene_mappings(store: &mut DomainStore, path: &Path) -> Result<()> {
    for (idx, raw_line) in lines_of(path)?.enumerate() {
        let line_no = idx + 1;
        let raw_line = raw_line?;
        let tokens: Vec<&str> = raw_line.split_whitespace().collect();
        if tokens.len() < 2 {
            continue;
        }
        let first = resolve_fatal(store, path, line_no, tokens[0])?;
        for &rest in &tokens[1..] {
            let other = resolve_fatal(store, path, line_no, rest)?;
            store.add_highly_similar(first, other)?;
        }
    }
    Ok(())
}

/// Ingests a two-column `gene\tdescription` functional-annotation file.
/// Lines with fewer than 2 columns are warned-and-skipped (not fatal);
/// empty descriptions are ignored.
pub fn ingest_functional_annotations(store: &mut DomainStore, path: &Path) -> Result<()> {
    for (idx, raw_line) in lines_of(path)?.enumerate() {
        let line_no = idx + 1;
        let raw_line = raw_line?;
        if raw_line.trim().is_empty() {
            continue;
        }
        let mut parts = raw_line.splitn(2, '\t');
        let gene_name = parts.next().unwrap_or("");
        let description = match parts.next() {
            Some(d) => d,
            None => {
                warn!("{}: line {line_no} has no description column, skipping", path.display());
                continue;
            }
        };
        let gene = resolve_fatal(store, path, line_no, gene_name)?;
        store.set_annotation(gene, description.to_string());
    }
    Ok(())
}

/// Result of resolving a GOI/baits file: genes that matched some gene
/// collection, and the raw names that did not (not found, or an
/// unsupported splice variant — both count as "missing" for the
/// fewer-than-5-matched job-skip rule of §7 class 3).
pub struct IngestedNames {
    pub resolved: Vec<GeneHandle>,
    pub missing: Vec<String>,
}

/// Ingests a GOI/baits file: a whitespace-and-comma-separated list of gene
/// names, possibly spanning several lines.
pub fn ingest_gene_list(store: &mut DomainStore, path: &Path) -> Result<IngestedNames> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for token in contents.split(|c: char| c.is_whitespace() || c == ',') {
        let name = token.trim();
        if name.is_empty() {
            continue;
        }
        match store.resolve(name) {
            Resolution::Gene(g) => resolved.push(g),
            Resolution::NotFound | Resolution::UnsupportedVariant { .. } => missing.push(name.to_string()),
        }
    }
    Ok(IngestedNames { resolved, missing })
}

/// Resolves a path relative to `base` unless it is already absolute, so job
/// YAML files can use paths relative to their own location.
pub fn relative_to(base: &Path, candidate: &Path) -> PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::ParserRule;
    use tempfile::tempdir;

    fn with_collection(store: &mut DomainStore) {
        store.new_collection("species", vec![ParserRule::new("(.+)", "$1", None).unwrap()]).unwrap();
    }

    #[test]
    fn matrix_ingest_skips_empty_gene_name_and_resolves_rest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.tsv");
        std::fs::write(&path, "gene\tc1\tc2\n\t1.0\t2.0\nA\t1.0\t2.0\nB\t3.0\t4.0\n").unwrap();

        let mut store = DomainStore::new();
        with_collection(&mut store);
        let matrix = ingest_expression_matrix(&mut store, &path).unwrap();
        assert_eq!(store.matrix(matrix).rows(), 2);
    }

    #[test]
    fn matrix_ingest_rejects_duplicate_gene() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.tsv");
        std::fs::write(&path, "gene\tc1\nA\t1.0\nA\t2.0\n").unwrap();

        let mut store = DomainStore::new();
        with_collection(&mut store);
        assert!(ingest_expression_matrix(&mut store, &path).is_err());
    }

    #[test]
    fn clustering_ingest_rejects_gene_in_two_clusters() {
        let dir = tempdir().unwrap();
        let matrix_path = dir.path().join("m.tsv");
        std::fs::write(&matrix_path, "gene\tc1\nA\t1.0\nB\t2.0\n").unwrap();
        let clustering_path = dir.path().join("c.tsv");
        std::fs::write(&clustering_path, "A\tx\nA\ty\n").unwrap();

        let mut store = DomainStore::new();
        with_collection(&mut store);
        let matrix = ingest_expression_matrix(&mut store, &matrix_path).unwrap();
        assert!(ingest_clustering(&mut store, matrix, &clustering_path).is_err());
    }

    #[test]
    fn orthologs_ingest_folds_existing_singletons_into_new_family() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orth.txt");
        std::fs::write(&path, "fam1\tA\tB\tC\n").unwrap();

        let mut store = DomainStore::new();
        with_collection(&mut store);
        ingest_orthologs(&mut store, "testdb", &path).unwrap();

        let a = match store.resolve("A") {
            Resolution::Gene(g) => g,
            _ => panic!(),
        };
        assert_eq!(store.families_of(a).len(), 1);
        let family = store.families_of(a)[0];
        assert_eq!(store.family(family).len(), 3);
    }

    #[test]
    fn orthologs_ingest_ignores_short_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orth.txt");
        std::fs::write(&path, "fam1\tA\n").unwrap();

        let mut store = DomainStore::new();
        with_collection(&mut store);
        ingest_orthologs(&mut store, "testdb", &path).unwrap();
        assert_eq!(store.iter_families().count(), 0);
    }

    #[test]
    fn gene_mappings_same_collection_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.txt");
        std::fs::write(&path, "A\tB\n").unwrap();

        let mut store = DomainStore::new();
        with_collection(&mut store);
        assert!(ingest_gene_mappings(&mut store, &path).is_err());
    }

    #[test]
    fn gene_list_splits_on_comma_and_whitespace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("goi.txt");
        std::fs::write(&path, "A, B\nC\tD\n").unwrap();

        let mut store = DomainStore::new();
        with_collection(&mut store);
        let result = ingest_gene_list(&mut store, &path).unwrap();
        assert_eq!(result.resolved.len(), 4);
        assert!(result.missing.is_empty());
    }
}
