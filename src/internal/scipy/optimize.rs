//! SciPy optimization functions port.
//!
//! Ported from scipy.optimize.linear_sum_assignment
//! License: BSD 3-Clause (SciPy Developers)
#![allow(clippy::needless_range_loop)]

use nalgebra::DMatrix;

use crate::{Error, Result};

/// Result of linear sum assignment.
#[derive(Debug, Clone)]
pub struct AssignmentResult {
    /// Column assigned to each row (`None` only for surplus rows of a tall matrix)
    pub row_to_col: Vec<Option<usize>>,
    /// Row assigned to each column (`None` only for surplus columns of a wide matrix)
    pub col_to_row: Vec<Option<usize>>,
    /// Sum of the costs of all assigned cells
    pub total_cost: f64,
}

impl AssignmentResult {
    fn empty(num_rows: usize, num_cols: usize) -> Self {
        Self {
            row_to_col: vec![None; num_rows],
            col_to_row: vec![None; num_cols],
            total_cost: 0.0,
        }
    }

    /// Number of assigned (row, col) pairs.
    pub fn len(&self) -> usize {
        self.row_to_col.iter().filter(|c| c.is_some()).count()
    }
}

/// Solve the linear sum assignment problem.
///
/// Finds an assignment of `min(rows, cols)` rows to distinct columns with
/// minimum total cost. Non-finite cells (`NaN` or infinities) are forbidden
/// and never part of the result.
///
/// # Arguments
/// * `cost_matrix` - cost[i][j] is the cost of assigning row i to column j
///
/// # Returns
/// The optimal assignment, or `Error::Infeasible` when forbidden cells leave
/// no complete assignment.
///
/// # Algorithm
/// Shortest augmenting path with row/column potentials (Kuhn-Munkres in its
/// Jonker-Volgenant form), O(n^2 m). Ties are broken towards the lowest
/// column index, so the result is deterministic for a given matrix.
pub fn linear_sum_assignment(cost_matrix: &DMatrix<f64>) -> Result<AssignmentResult> {
    let (num_rows, num_cols) = cost_matrix.shape();
    if num_rows == 0 || num_cols == 0 {
        return Ok(AssignmentResult::empty(num_rows, num_cols));
    }

    // The augmenting path search needs rows <= cols
    if num_rows > num_cols {
        let transposed = linear_sum_assignment(&cost_matrix.transpose())?;
        return Ok(AssignmentResult {
            row_to_col: transposed.col_to_row,
            col_to_row: transposed.row_to_col,
            total_cost: transposed.total_cost,
        });
    }

    let row_match = shortest_augmenting_path(cost_matrix)?;

    let mut result = AssignmentResult::empty(num_rows, num_cols);
    for (row, &col) in row_match.iter().enumerate() {
        result.row_to_col[row] = Some(col);
        result.col_to_row[col] = Some(row);
        result.total_cost += cost_matrix[(row, col)];
    }
    Ok(result)
}

/// Returns `result[i] = j` for every row of a matrix with rows <= cols.
fn shortest_augmenting_path(cost: &DMatrix<f64>) -> Result<Vec<usize>> {
    let (n, m) = cost.shape();
    let cell = |i: usize, j: usize| -> f64 {
        let c = cost[(i, j)];
        if c.is_finite() {
            c
        } else {
            f64::INFINITY
        }
    };

    // 1-based bookkeeping, index 0 is the virtual source column
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut col_owner = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for row in 1..=n {
        col_owner[0] = row;
        let mut j0 = 0usize;
        let mut min_v = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = col_owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let reduced = cell(i0 - 1, j - 1) - u[i0] - v[j];
                if reduced < min_v[j] {
                    min_v[j] = reduced;
                    way[j] = j0;
                }
                if min_v[j] < delta {
                    delta = min_v[j];
                    j1 = j;
                }
            }

            if !delta.is_finite() {
                return Err(Error::Infeasible(format!(
                    "row {} cannot be assigned to any free column",
                    row - 1
                )));
            }

            for j in 0..=m {
                if used[j] {
                    u[col_owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_v[j] -= delta;
                }
            }

            j0 = j1;
            if col_owner[j0] == 0 {
                break;
            }
        }

        // Flip the augmenting path back to the source
        loop {
            let j1 = way[j0];
            col_owner[j0] = col_owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_match = vec![0usize; n];
    for j in 1..=m {
        if col_owner[j] != 0 {
            row_match[col_owner[j] - 1] = j - 1;
        }
    }
    Ok(row_match)
}
