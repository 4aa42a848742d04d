//! Dense expression matrices (C2).
//!
//! An [`ExpressionMatrix`] is a named M×K matrix of `f64` with a bijection
//! between genes and row indices.

use std::collections::HashMap;

use crate::gene::GeneHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatrixHandle(pub(crate) u32);

/// A dense M×K matrix of conditions/samples, row-major, with a gene ↔ row
/// bijection.
#[derive(Debug)]
pub struct ExpressionMatrix {
    handle: MatrixHandle,
    name: String,
    /// Row-major storage: `data[row * k + col]`.
    data: Vec<f64>,
    k: usize,
    row_to_gene: Vec<GeneHandle>,
    gene_to_row: HashMap<GeneHandle, usize>,
}

impl ExpressionMatrix {
    pub fn new(handle: MatrixHandle, name: String, k: usize) -> Self {
        ExpressionMatrix {
            handle,
            name,
            data: Vec::new(),
            k,
            row_to_gene: Vec::new(),
            gene_to_row: HashMap::new(),
        }
    }

    pub fn handle(&self) -> MatrixHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows (genes).
    pub fn rows(&self) -> usize {
        self.row_to_gene.len()
    }

    /// Number of columns (conditions/samples).
    pub fn cols(&self) -> usize {
        self.k
    }

    /// Appends a row for `gene`. Panics on duplicate gene or wrong-arity row
    /// (both are checked at ingest before this is called).
    pub fn push_row(&mut self, gene: GeneHandle, values: Vec<f64>) {
        assert_eq!(values.len(), self.k, "row arity mismatch");
        assert!(
            !self.gene_to_row.contains_key(&gene),
            "duplicate gene row"
        );
        let row = self.row_to_gene.len();
        self.gene_to_row.insert(gene, row);
        self.row_to_gene.push(gene);
        self.data.extend(values);
    }

    pub fn has_gene(&self, gene: GeneHandle) -> bool {
        self.gene_to_row.contains_key(&gene)
    }

    pub fn row_of(&self, gene: GeneHandle) -> Option<usize> {
        self.gene_to_row.get(&gene).copied()
    }

    pub fn gene_of(&self, row: usize) -> GeneHandle {
        self.row_to_gene[row]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.k..(row + 1) * self.k]
    }

    pub fn genes(&self) -> impl Iterator<Item = GeneHandle> + '_ {
        self.row_to_gene.iter().copied()
    }
}
