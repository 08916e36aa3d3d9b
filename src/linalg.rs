//! Dense linear algebra kernel
//!
//! Gaussian elimination with partial pivoting and Gauss-Jordan inversion.
//! Both routines reject pivots whose magnitude falls below [`PIVOT_EPSILON`]
//! as well as NaN pivots.

use crate::error::{EngineError, Result};
use ndarray::{Array1, Array2};

/// Smallest pivot magnitude accepted before a matrix is treated as singular
pub const PIVOT_EPSILON: f64 = 1e-10;

fn check_square(a: &Array2<f64>) -> Result<usize> {
    let n = a.nrows();
    if n == 0 || n != a.ncols() {
        return Err(EngineError::InvalidInput(format!(
            "expected a non-empty square matrix, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    Ok(n)
}

/// Index of the row at or below `col` with the largest absolute value in `col`
fn pivot_row(m: &Array2<f64>, col: usize, n_rows: usize) -> usize {
    let mut max_row = col;
    for row in col + 1..n_rows {
        if m[[row, col]].abs() > m[[max_row, col]].abs() {
            max_row = row;
        }
    }
    max_row
}

fn swap_rows(m: &mut Array2<f64>, a: usize, b: usize) {
    if a == b {
        return;
    }
    for j in 0..m.ncols() {
        m.swap([a, j], [b, j]);
    }
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// Fails with [`EngineError::SingularMatrix`] when the selected pivot of any
/// column is smaller than [`PIVOT_EPSILON`] in magnitude.
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = check_square(a)?;
    if b.len() != n {
        return Err(EngineError::InvalidInput(format!(
            "right-hand side has length {}, expected {}",
            b.len(),
            n
        )));
    }

    // Augmented matrix [A | b]
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    // Forward elimination
    for col in 0..n {
        let max_row = pivot_row(&aug, col, n);
        swap_rows(&mut aug, col, max_row);

        let pivot = aug[[col, col]];
        // Negated so a NaN pivot is rejected too
        if !(pivot.abs() >= PIVOT_EPSILON) {
            return Err(EngineError::SingularMatrix { column: col, pivot });
        }

        for row in col + 1..n {
            let factor = aug[[row, col]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..=n {
                aug[[row, j]] -= factor * aug[[col, j]];
            }
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = aug[[i, n]];
        for j in i + 1..n {
            sum -= aug[[i, j]] * x[j];
        }
        x[i] = sum / aug[[i, i]];
    }

    Ok(x)
}

/// Invert `A` by reducing `[A | I]` to `[I | A^-1]`.
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = check_square(a)?;

    // Create augmented matrix [A | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    // Gauss-Jordan elimination
    for col in 0..n {
        let max_row = pivot_row(&aug, col, n);
        swap_rows(&mut aug, col, max_row);

        let pivot = aug[[col, col]];
        // Negated so a NaN pivot is rejected too
        if !(pivot.abs() >= PIVOT_EPSILON) {
            return Err(EngineError::SingularMatrix { column: col, pivot });
        }

        // Scale pivot row
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        // Eliminate column
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    // Extract inverse from right half
    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }

    Ok(inv)
}
