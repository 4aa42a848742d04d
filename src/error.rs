//! Error taxonomy, per the failure classes of the system's error handling design.
//!
//! Validation and ingest-semantic failures abort the batch; job-skip conditions
//! are reported as warnings by the caller and never constructed as an [`Error`].

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Splice-variant id carried by a gene name, when the parser rule that matched
/// it declared a capture group for one.
pub type SpliceVariantId = u32;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed input at {path}:{line}: {message}")]
    Validation {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("duplicate gene collection name '{0}'")]
    DuplicateCollection(String),

    #[error("gene collection '{0}' has no parser rules")]
    EmptyParserRules(String),

    #[error("gene '{gene}' resolves to an unsupported splice variant {variant} (only variant 1 is accepted)")]
    UnsupportedVariant { gene: String, variant: SpliceVariantId },

    #[error("gene '{0}' is not known to any gene collection")]
    UnknownGene(String),

    #[error("gene mapping links two genes of the same gene collection: '{0}' and '{1}'")]
    SameCollectionMapping(String, String),

    #[error("gene '{0}' is already present in another expression matrix of this run")]
    GeneInMultipleMatrices(String),

    #[error("threshold out of range: {0} (must satisfy |v| <= 1 + 1e-7)")]
    ThresholdOutOfRange(f64),

    #[error("negative_treshold ({negative}) must be <= positive_treshold ({positive})")]
    ThresholdOrder { negative: f64, positive: f64 },

    #[error("top_k must be > 0, got {0}")]
    InvalidTopK(usize),

    #[error("gene of interest '{0}' is not a valid gene")]
    InvalidGoiGene(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("persistence error at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<bincode::ErrorKind>,
    },

    #[error("assertion failed: {0}")]
    Invariant(String),
}

impl Error {
    /// Process exit code this error maps to, per the external interface's exit code table.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidGoiGene(_) => 2,
            Error::UnsupportedVariant { .. } => 3,
            _ => 1,
        }
    }
}
