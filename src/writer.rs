//! Output writers (C14): MORPH plain-text/YAML ranking reports, and the
//! Cytoscape-compatible SIF/node-attr/edge-attr/YAML quadruple for CoExpr.
//!
//! Grounded on `Ranking::save` (MORPH's two output forms) and
//! `CytoscapeWriter.cpp` (exact line shapes transcribed below). The crate's
//! Non-goals (`spec.md` §1) exclude the *byte-for-byte* writer format from
//! being a tested contract, so these are the natural shapes rather than a
//! byte-identical port.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::coexpr::CoexprNetwork;
use crate::color::{ColourAssigner, BAIT_NODE_COLOUR};
use crate::driver::MorphResult;
use crate::error::{Error, Result};
use crate::family::FamilyHandle;
use crate::gene::GeneHandle;
use crate::store::DomainStore;

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io { path: path.to_path_buf(), source }
}

#[derive(Serialize)]
struct MorphCandidateYaml {
    rank: usize,
    gene: String,
    score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gene_web_page: Option<String>,
}

#[derive(Serialize)]
struct MorphResultYaml {
    best_ausr: f64,
    average_ausr: f64,
    gene_expression_name: String,
    clustering_name: String,
    goi_genes_present: Vec<String>,
    goi_genes_missing: Vec<String>,
    candidates: Vec<MorphCandidateYaml>,
}

impl From<&MorphResult> for MorphResultYaml {
    fn from(r: &MorphResult) -> Self {
        MorphResultYaml {
            best_ausr: r.best_ausr,
            average_ausr: r.average_ausr,
            gene_expression_name: r.gene_expression_name.clone(),
            clustering_name: r.clustering_name.clone(),
            goi_genes_present: r.goi_genes_present.clone(),
            goi_genes_missing: r.goi_genes_missing.clone(),
            candidates: r
                .candidates
                .iter()
                .map(|c| MorphCandidateYaml {
                    rank: c.rank,
                    gene: c.gene.clone(),
                    score: c.score,
                    annotation: c.annotation.clone(),
                    gene_web_page: c.gene_web_page.clone(),
                })
                .collect(),
        }
    }
}

/// Writes `result` as `network_genes.yaml`-style structured YAML (the MORPH
/// job's `output_yaml` flag, §6).
pub fn write_morph_yaml(result: &MorphResult, path: &Path) -> Result<()> {
    let view = MorphResultYaml::from(result);
    let text = serde_yaml::to_string(&view)?;
    std::fs::write(path, text).map_err(|e| io_err(path, e))
}

/// Writes `result` as the line-by-line plain text form: each top-level field
/// on its own line, then one line per candidate.
pub fn write_morph_text(result: &MorphResult, path: &Path) -> Result<()> {
    let mut out = String::new();
    writeln!(out, "best_ausr\t{}", result.best_ausr).ok();
    writeln!(out, "average_ausr\t{}", result.average_ausr).ok();
    writeln!(out, "gene_expression_name\t{}", result.gene_expression_name).ok();
    writeln!(out, "clustering_name\t{}", result.clustering_name).ok();
    writeln!(out, "goi_genes_present\t{}", result.goi_genes_present.join(",")).ok();
    writeln!(out, "goi_genes_missing\t{}", result.goi_genes_missing.join(",")).ok();
    writeln!(out, "rank\tgene\tscore\tannotation\tgene_web_page").ok();
    for c in &result.candidates {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            c.rank,
            c.gene,
            c.score,
            c.annotation.as_deref().unwrap_or(""),
            c.gene_web_page.as_deref().unwrap_or(""),
        )
        .ok();
    }
    std::fs::write(path, out).map_err(|e| io_err(path, e))
}

/// A node emitted by the Cytoscape writer: either a bait or a correlated
/// target family.
enum Node {
    Bait(GeneHandle),
    Family(FamilyHandle),
}

fn node_id(store: &DomainStore, node: &Node) -> String {
    match node {
        Node::Bait(g) => store.gene(*g).name().to_string(),
        Node::Family(f) => format!("family_{}", f.0),
    }
}

/// Writes the four CoExpr output files into `output_dir`:
/// `network.sif`, `network.node.attr`, `network.edge.attr`,
/// `network_genes.yaml` (§6), in that order (`CytoscapeWriter::write`).
pub fn write_coexpr_network(
    store: &DomainStore,
    network: &CoexprNetwork,
    colours: &dyn ColourAssigner,
    output_dir: &Path,
) -> Result<()> {
    write_sif(store, network, output_dir)?;
    write_node_attr(store, network, colours, output_dir)?;
    write_edge_attr(store, network, output_dir)?;
    write_genes_yaml(store, network, output_dir)?;
    Ok(())
}

fn create(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path).map_err(|e| io_err(path, e))
}

/// `<target> cor <bait1> <bait2> ...` (one line per target, all correlating
/// baits on that line) then `<bait_a> hom <bait_b>` per ortholog pair.
fn write_sif(store: &DomainStore, network: &CoexprNetwork, output_dir: &Path) -> Result<()> {
    let path = output_dir.join("network.sif");
    let mut file = create(&path)?;
    for info in &network.families {
        if info.bait_correlations().is_empty() {
            continue;
        }
        let target_id = node_id(store, &Node::Family(info.family()));
        let bait_ids: Vec<String> = info
            .bait_correlations()
            .iter()
            .map(|bc| node_id(store, &Node::Bait(bc.bait())))
            .collect();
        writeln!(file, "{target_id}\tcor\t{}", bait_ids.join("\t")).map_err(|e| io_err(&path, e))?;
    }
    for &(a, b) in &network.bait_orthology_edges {
        writeln!(file, "{}\thom\t{}", store.gene(a).name(), store.gene(b).name()).map_err(|e| io_err(&path, e))?;
    }
    Ok(())
}

/// `node_id\tfamilies\tgenes\tspecies\tcolor`. Baits get the fixed white,
/// families get their bait-group's hash colour.
fn write_node_attr(
    store: &DomainStore,
    network: &CoexprNetwork,
    colours: &dyn ColourAssigner,
    output_dir: &Path,
) -> Result<()> {
    let path = output_dir.join("network.node.attr");
    let mut file = create(&path)?;
    writeln!(file, "node_id\tfamilies\tgenes\tspecies\tcolor").map_err(|e| io_err(&path, e))?;

    for &bait in &network.baits {
        let gene = store.gene(bait);
        let families = families_label(store, bait);
        let species = store.collection(gene.collection()).name();
        writeln!(file, "{}\t{}\t{}\t{}\t{}", gene.name(), families, gene.name(), species, BAIT_NODE_COLOUR)
            .map_err(|e| io_err(&path, e))?;
    }

    for info in &network.families {
        let genes = info.correlating_genes_unique();
        if genes.is_empty() {
            continue;
        }
        let node = node_id(store, &Node::Family(info.family()));
        let families = store
            .family(info.family())
            .external_ids()
            .map(|id| format!("From {}: {}", id.source, id.id))
            .collect::<Vec<_>>()
            .join(". ");
        let gene_names: Vec<String> = genes.iter().map(|&g| store.gene(g).name().to_string()).collect();
        let species = genes
            .first()
            .map(|&g| store.collection(store.gene(g).collection()).name().to_string())
            .unwrap_or_default();
        let colour = colours.colour_for(&info.bait_group_id(store));
        writeln!(file, "{node}\t{families}\t{}\t{species}\t{colour}", gene_names.join(" ")).map_err(|e| io_err(&path, e))?;
    }
    Ok(())
}

fn families_label(store: &DomainStore, gene: GeneHandle) -> String {
    store
        .families_of(gene)
        .iter()
        .flat_map(|&f| store.family(f).external_ids())
        .map(|id| format!("From {}: {}", id.source, id.id))
        .collect::<Vec<_>>()
        .join(". ")
}

/// `edge\tr_value` header, then one row per `(target, bait)` correlation
/// (distinct from the `.sif`, which puts all of a target's baits on one
/// line) and one `NA`-valued row per bait-bait ortholog pair.
fn write_edge_attr(store: &DomainStore, network: &CoexprNetwork, output_dir: &Path) -> Result<()> {
    let path = output_dir.join("network.edge.attr");
    let mut file = create(&path)?;
    writeln!(file, "edge\tr_value").map_err(|e| io_err(&path, e))?;

    for info in &network.families {
        let target_id = node_id(store, &Node::Family(info.family()));
        for bc in info.bait_correlations() {
            let bait_name = store.gene(bc.bait()).name();
            writeln!(file, "{target_id} (cor) {bait_name}\t{}", bc.max_correlation()).map_err(|e| io_err(&path, e))?;
        }
    }
    for &(a, b) in &network.bait_orthology_edges {
        writeln!(file, "{} (hom) {}\tNA", store.gene(a).name(), store.gene(b).name()).map_err(|e| io_err(&path, e))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct BaitGeneYaml {
    node_id: String,
    is_bait: bool,
    families: String,
    orthologs: Vec<String>,
}

#[derive(Serialize)]
struct BaitRefYaml {
    node_id: String,
    r_value: f64,
}

#[derive(Serialize)]
struct TargetGeneYaml {
    node_id: String,
    is_bait: bool,
    baits: Vec<BaitRefYaml>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeneYaml {
    Bait(BaitGeneYaml),
    Target(TargetGeneYaml),
}

#[derive(Serialize)]
struct GenesYaml {
    genes: Vec<GeneYaml>,
}

/// `network_genes.yaml`: baits first (with their family provenance and
/// ortholog siblings), then targets (with their per-bait max correlations).
fn write_genes_yaml(store: &DomainStore, network: &CoexprNetwork, output_dir: &Path) -> Result<()> {
    let path = output_dir.join("network_genes.yaml");

    let mut genes = Vec::new();
    for &bait in &network.baits {
        let orthologs: Vec<String> = store
            .families_of(bait)
            .iter()
            .flat_map(|&f| store.family(f).genes().copied())
            .filter(|&g| g != bait)
            .map(|g| store.gene(g).name().to_string())
            .collect();
        genes.push(GeneYaml::Bait(BaitGeneYaml {
            node_id: store.gene(bait).name().to_string(),
            is_bait: true,
            families: families_label(store, bait),
            orthologs,
        }));
    }
    for info in &network.families {
        for target in info.correlating_genes_unique() {
            let baits: Vec<BaitRefYaml> = info
                .bait_correlations()
                .iter()
                .filter(|bc| bc.correlations().iter().any(|&(g, _)| g == target))
                .map(|bc| BaitRefYaml {
                    node_id: store.gene(bc.bait()).name().to_string(),
                    r_value: bc
                        .correlations()
                        .iter()
                        .filter(|&&(g, _)| g == target)
                        .map(|&(_, c)| c)
                        .fold(f64::NEG_INFINITY, f64::max),
                })
                .collect();
            genes.push(GeneYaml::Target(TargetGeneYaml {
                node_id: store.gene(target).name().to_string(),
                is_bait: false,
                baits,
            }));
        }
    }

    let text = serde_yaml::to_string(&GenesYaml { genes })?;
    std::fs::write(&path, text).map_err(|e| io_err(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MorphCandidate;
    use tempfile::tempdir;

    #[test]
    fn morph_text_writer_includes_all_fields() {
        let result = MorphResult {
            goi_file: "goi.txt".to_string(),
            best_ausr: 0.9,
            average_ausr: 0.7,
            gene_expression_name: "m".to_string(),
            clustering_name: "c".to_string(),
            goi_genes_present: vec!["A".to_string()],
            goi_genes_missing: vec![],
            candidates: vec![MorphCandidate {
                rank: 1,
                gene: "B".to_string(),
                score: 2.5,
                annotation: Some("desc".to_string()),
                gene_web_page: None,
            }],
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_morph_text(&result, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("best_ausr\t0.9"));
        assert!(contents.contains("B\t2.5\tdesc"));
    }

    #[test]
    fn morph_yaml_writer_round_trips_to_valid_yaml() {
        let result = MorphResult {
            goi_file: "goi.txt".to_string(),
            best_ausr: 1.0,
            average_ausr: 1.0,
            gene_expression_name: "m".to_string(),
            clustering_name: "c".to_string(),
            goi_genes_present: vec![],
            goi_genes_missing: vec![],
            candidates: vec![],
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        write_morph_yaml(&result, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&contents).unwrap();
        assert_eq!(parsed["best_ausr"].as_f64(), Some(1.0));
    }
}
