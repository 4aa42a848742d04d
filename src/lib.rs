//! `morphcoexpr`: a batch analytics engine for gene co-expression discovery.
//!
//! Given expression measurements for genes across conditions, partitionings
//! of genes into clusters, and ortholog family assignments across species,
//! this crate answers two related questions:
//!
//! - **MORPH candidate ranking** ([`ranker`]): for a user-supplied set of
//!   genes of interest, rank the rest of an expression dataset by
//!   co-expression, using a precomputed clustering so only intra-cluster
//!   signal contributes, and self-evaluate the `(matrix, clustering)` choice
//!   with a leave-one-out AUSR score.
//! - **CoExpr network construction** ([`coexpr`]): given bait genes and one
//!   or more expression matrices, find non-bait genes correlated with some
//!   bait beyond a threshold, project them onto their ortholog families, and
//!   emit a Cytoscape-compatible network.
//!
//! The in-memory domain graph ([`store`], [`gene`], [`family`], [`matrix`],
//! [`clustering`]) is an arena of append-only entities referred to by opaque
//! handles; [`correlation`] builds the Pearson correlation blocks both
//! algorithms run on. [`ingest`] turns the external file formats into that
//! graph, [`job`] describes one run, [`driver`] orchestrates a run
//! end-to-end, and [`writer`]/[`persist`] are the two places a run touches
//! the filesystem beyond its own inputs.

pub mod clustering;
pub mod coexpr;
pub mod color;
pub mod correlation;
pub mod driver;
pub mod error;
pub mod family;
pub mod gene;
pub mod ingest;
pub mod job;
pub mod matrix;
pub mod persist;
pub mod ranker;
pub mod store;
pub mod writer;
