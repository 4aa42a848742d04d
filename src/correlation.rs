//! Rectangular Pearson correlation engine (C3).
//!
//! Given a matrix M and a chosen subset S of its row indices, builds the
//! `(rows(M) x |S|)` correlation block `C[i, j] = pearson(row_i, row_S[j])`
//! in one pass over the columns, using the running-mean / running-sum-of-squares
//! form (this is `gsl_stats_correlation`'s algorithm in matrix form, carried
//! over verbatim from the source project's `GeneCorrelationMatrix`). Do not
//! replace this with the naive `sum(xy) - sum(x)*sum(y)/n` form: it is
//! numerically unstable for the sample sizes this engine is run over.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::matrix::ExpressionMatrix;

/// `C[i, j] = pearson(M.row(i), M.row(subset[j]))`, plus the map from a
/// subset row index back to its column in `C`.
pub struct CorrelationBlock {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
    row_to_column: HashMap<usize, usize>,
}

impl CorrelationBlock {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    pub fn rows(&self) -> usize {
        self.n_rows
    }

    pub fn cols(&self) -> usize {
        self.n_cols
    }

    /// Column in this block corresponding to subset row `row`, if `row` was
    /// part of the subset this block was built with.
    pub fn column_of(&self, row: usize) -> Option<usize> {
        self.row_to_column.get(&row).copied()
    }
}

/// Builds the correlation block of `matrix` against the given ordered,
/// non-empty subset of its row indices.
///
/// # Panics
/// Panics if `subset` is empty or `matrix` has fewer than 2 columns.
pub fn correlation_block(matrix: &ExpressionMatrix, subset: &[usize]) -> CorrelationBlock {
    assert!(!subset.is_empty(), "subset of rows must be non-empty");
    let n_rows = matrix.rows();
    let k = matrix.cols();
    assert!(k >= 2, "matrix must have at least 2 columns");
    let n_cols = subset.len();

    let mut row_to_column = HashMap::with_capacity(n_cols);
    for (j, &row) in subset.iter().enumerate() {
        row_to_column.insert(row, j);
    }

    // Running state. sum_cross is kept row-major (n_rows x n_cols) so rows
    // can be updated independently, in parallel, without aliasing.
    let mut mean: Vec<f64> = (0..n_rows).map(|i| matrix.row(i)[0]).collect();
    let mut sum_sq: Vec<f64> = vec![0.0; n_rows];
    let mut sum_cross: Vec<f64> = vec![0.0; n_rows * n_cols];

    for t in 1..k {
        let ratio = t as f64 / (t as f64 + 1.0);
        let inv_t1 = 1.0 / (t as f64 + 1.0);

        // delta projected onto the subset, needed for every row's outer product term.
        let subset_delta: Vec<f64> = subset
            .iter()
            .map(|&s| matrix.row(s)[t] - mean[s])
            .collect();

        sum_sq
            .par_iter_mut()
            .zip(sum_cross.par_chunks_mut(n_cols))
            .zip(mean.par_iter_mut())
            .enumerate()
            .for_each(|(i, ((ss, cross_row), mu))| {
                let delta_i = matrix.row(i)[t] - *mu;
                *ss += delta_i * delta_i * ratio;
                for (j, &delta_s) in subset_delta.iter().enumerate() {
                    cross_row[j] += delta_i * delta_s * ratio;
                }
                *mu += delta_i * inv_t1;
            });
    }

    let sd: Vec<f64> = sum_sq.iter().map(|v| v.sqrt()).collect();

    let mut data = vec![0.0; n_rows * n_cols];
    data.par_chunks_mut(n_cols)
        .enumerate()
        .for_each(|(i, row_out)| {
            for j in 0..n_cols {
                let denom = sd[i] * sd[subset[j]];
                row_out[j] = sum_cross[i * n_cols + j] / denom;
            }
        });

    CorrelationBlock {
        n_rows,
        n_cols,
        data,
        row_to_column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn diagonal_is_one_at_subset_entries() {
        let m = build_matrix(&[
            vec![1.0, 2.0, 3.0, 4.0],
            vec![4.0, 3.0, 2.0, 1.0],
            vec![1.0, 1.0, 1.0, 1.0],
        ]);
        let subset = [0usize, 1];
        let block = correlation_block(&m, &subset);
        for (j, &row) in subset.iter().enumerate() {
            let val = block.get(row, j);
            assert_relative_eq!(val, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn perfect_anticorrelation() {
        let m = build_matrix(&[vec![1.0, 2.0, 3.0, 4.0], vec![4.0, 3.0, 2.0, 1.0]]);
        let block = correlation_block(&m, &[0]);
        assert_relative_eq!(block.get(1, 0), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn constant_row_yields_nan() {
        let m = build_matrix(&[vec![1.0, 1.0, 1.0, 1.0], vec![1.0, 2.0, 3.0, 4.0]]);
        let block = correlation_block(&m, &[0]);
        assert!(block.get(0, 0).is_nan());
        assert!(block.get(1, 0).is_nan());
    }

    #[test]
    fn bounded_in_unit_interval() {
        let m = build_matrix(&[
            vec![1.0, 5.0, 2.0, 9.0, 3.0],
            vec![2.0, 1.0, 7.0, 0.0, 4.0],
            vec![9.0, 9.0, 1.0, 2.0, 0.0],
        ]);
        let block = correlation_block(&m, &[0, 1, 2]);
        for i in 0..block.rows() {
            for j in 0..block.cols() {
                let v = block.get(i, j);
                if !v.is_nan() {
                    assert!(v >= -1.0 - 1e-9 && v <= 1.0 + 1e-9, "out of range: {v}");
                }
            }
        }
    }
}
