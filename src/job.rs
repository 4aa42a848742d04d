//! Job configuration (C11): `serde`/`serde_yaml` shapes for the MORPH and
//! CoExpr job YAML of §6, with range validation performed at parse time.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

const THRESHOLD_TOLERANCE: f64 = 1e-7;

#[derive(Debug, Deserialize)]
pub struct ParserRuleConfig {
    pub pattern: String,
    #[serde(default = "default_replace_template")]
    pub replace_template: String,
    #[serde(default)]
    pub splice_variant_group: Option<usize>,
}

fn default_replace_template() -> String {
    "$1".to_string()
}

#[derive(Debug, Deserialize)]
pub struct GeneCollectionConfig {
    pub name: String,
    pub rules: Vec<ParserRuleConfig>,
    #[serde(default)]
    pub gene_web_page_template: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrthologsFileConfig {
    pub source_name: String,
    pub path: PathBuf,
}

/// Inputs shared by both job kinds: the gene collections that give ingest
/// its parser rules, and the cross-cutting files (orthologs, mappings,
/// functional annotations).
#[derive(Debug, Default, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub gene_collections: Vec<GeneCollectionConfig>,
    #[serde(default)]
    pub orthologs_files: Vec<OrthologsFileConfig>,
    #[serde(default)]
    pub gene_mappings_files: Vec<PathBuf>,
    #[serde(default)]
    pub functional_annotation_files: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct MatrixConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub clusterings: Vec<PathBuf>,
}

/// One MORPH job: candidate ranking of one or more GOI files against one or
/// more `(matrix, clustering)` pairs, keeping the best-AUSR pairing per GOI.
#[derive(Debug, Deserialize)]
pub struct MorphJob {
    #[serde(flatten)]
    pub dataset: DatasetConfig,
    pub expression_matrices: Vec<MatrixConfig>,
    pub goi_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub top_k: usize,
    #[serde(default)]
    pub output_yaml: bool,
}

impl MorphJob {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidTopK(self.top_k));
        }
        Ok(())
    }
}

/// One CoExpr job: baits and thresholds against one or more expression
/// matrices, producing a Cytoscape-shaped network.
#[derive(Debug, Deserialize)]
pub struct CoexprJob {
    #[serde(flatten)]
    pub dataset: DatasetConfig,
    pub baits: PathBuf,
    pub negative_treshold: f64,
    pub positive_treshold: f64,
    pub expression_matrices: Vec<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl CoexprJob {
    pub fn validate(&self) -> Result<()> {
        for &t in &[self.negative_treshold, self.positive_treshold] {
            if t.abs() > 1.0 + THRESHOLD_TOLERANCE {
                return Err(Error::ThresholdOutOfRange(t));
            }
        }
        if self.negative_treshold > self.positive_treshold {
            return Err(Error::ThresholdOrder {
                negative: self.negative_treshold,
                positive: self.positive_treshold,
            });
        }
        Ok(())
    }
}

/// Parses and validates a MORPH job YAML.
pub fn load_morph_job(text: &str) -> Result<MorphJob> {
    let job: MorphJob = serde_yaml::from_str(text)?;
    job.validate()?;
    Ok(job)
}

/// Parses and validates a CoExpr job YAML.
pub fn load_coexpr_job(text: &str) -> Result<CoexprJob> {
    let job: CoexprJob = serde_yaml::from_str(text)?;
    job.validate()?;
    Ok(job)
}
