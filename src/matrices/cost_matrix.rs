//! Block-structured cost matrix and its assignment.
//!
//! With `n_out` leaving and `n_in` entering candidates the composite matrix
//! is square with side `n_out + n_in`:
//!
//! ```text
//! [ LINK      (n_out x n_in)    DEATH_ALT (n_out x n_out) ]
//! [ BIRTH_ALT (n_in  x n_in)    AUXILIARY (n_in  x n_out) ]
//! ```
//!
//! The auxiliary block is `NaN` except at the transposed positions of
//! feasible links, where it holds the smallest link cost. A perfect matching
//! therefore always exists: every candidate can fall back to its diagonal
//! slot, and every accepted link frees exactly one auxiliary cell.
//!
//! Among equally cheap assignments the lower candidate position wins: when
//! two leaving candidates compete for one entering candidate at the same
//! total cost, the one with the lower position is linked, and likewise for
//! two entering candidates competing for one leaving candidate. Candidates
//! are ordered by key, so within a frame the lowest label wins.

use std::ops::Range;

use nalgebra::DMatrix;
use tracing::debug;

use super::blocks::{DiagBlock, LinkBlock};
use crate::internal::scipy::{linear_sum_assignment, AssignmentResult};
use crate::{Error, Result};

/// Relative tolerance under which two totals count as the same cost.
const TIE_TOLERANCE: f64 = 1e-9;

fn ties(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Role of a block in the composite matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Link,
    DeathAlt,
    BirthAlt,
    Auxiliary,
}

/// Where a block sits in the composite matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub kind: BlockKind,
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl BlockSpan {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.contains(&row) && self.cols.contains(&col)
    }
}

/// What happened to a leaving candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutDecision {
    /// Linked to the entering candidate at this position
    Link(usize),
    /// The segment stops here
    Death,
}

/// What happened to an entering candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InDecision {
    /// Linked from the leaving candidate at this position
    Link(usize),
    /// A new segment starts here
    Birth,
}

/// Composite cost matrix for one assignment problem.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    n_out: usize,
    n_in: usize,
    spans: [BlockSpan; 4],
    mat: DMatrix<f64>,
    solution: Option<AssignmentResult>,
}

impl CostMatrix {
    /// Assemble the composite matrix.
    ///
    /// # Arguments
    /// * `link` - Link block, `n_out x n_in`
    /// * `death` - Death alternatives, one per leaving candidate
    /// * `birth` - Birth alternatives, one per entering candidate
    ///
    /// # Returns
    /// `Error::BlockShape` if the diagonal blocks do not match the link block.
    pub fn new(link: &LinkBlock, death: &DiagBlock, birth: &DiagBlock) -> Result<Self> {
        let (n_out, n_in) = link.mat.shape();
        if death.mat.shape() != (n_out, n_out) {
            return Err(Error::BlockShape {
                expected: format!("death block {}x{}", n_out, n_out),
                got: format!("{}x{}", death.mat.nrows(), death.mat.ncols()),
            });
        }
        if birth.mat.shape() != (n_in, n_in) {
            return Err(Error::BlockShape {
                expected: format!("birth block {}x{}", n_in, n_in),
                got: format!("{}x{}", birth.mat.nrows(), birth.mat.ncols()),
            });
        }

        let n = n_out + n_in;
        let spans = [
            BlockSpan { kind: BlockKind::Link, rows: 0..n_out, cols: 0..n_in },
            BlockSpan { kind: BlockKind::DeathAlt, rows: 0..n_out, cols: n_in..n },
            BlockSpan { kind: BlockKind::BirthAlt, rows: n_out..n, cols: 0..n_in },
            BlockSpan { kind: BlockKind::Auxiliary, rows: n_out..n, cols: n_in..n },
        ];

        let mut mat = DMatrix::from_element(n, n, f64::NAN);
        mat.view_mut((0, 0), (n_out, n_in)).copy_from(&link.mat);
        mat.view_mut((0, n_in), (n_out, n_out)).copy_from(&death.mat);
        mat.view_mut((n_out, 0), (n_in, n_in)).copy_from(&birth.mat);

        if let Some(min_link) = link.min_cost() {
            for i in 0..n_out {
                for j in 0..n_in {
                    if link.mat[(i, j)].is_finite() {
                        mat[(n_out + j, n_in + i)] = min_link;
                    }
                }
            }
        }

        Ok(Self {
            n_out,
            n_in,
            spans,
            mat,
            solution: None,
        })
    }

    /// Solve the minimum-cost perfect matching.
    ///
    /// # Returns
    /// The total cost, or `Error::Infeasible` if some candidate has no
    /// feasible cell at all.
    pub fn solve(&mut self) -> Result<f64> {
        let solution = linear_sum_assignment(&self.mat)?;
        if solution.len() != self.mat.nrows() {
            return Err(Error::Infeasible(format!(
                "only {} of {} rows assigned",
                solution.len(),
                self.mat.nrows()
            )));
        }

        let solution = self.prefer_lower_candidates(&solution);

        debug!(
            n_out = self.n_out,
            n_in = self.n_in,
            total_cost = solution.total_cost,
            "Solved cost matrix"
        );
        let total_cost = solution.total_cost;
        self.solution = Some(solution);
        Ok(total_cost)
    }

    /// Composite matrix.
    pub fn mat(&self) -> &DMatrix<f64> {
        &self.mat
    }

    pub fn is_solved(&self) -> bool {
        self.solution.is_some()
    }

    /// Offset table of the four blocks.
    pub fn spans(&self) -> &[BlockSpan] {
        &self.spans
    }

    /// Shape of every block.
    pub fn get_shapes(&self) -> Vec<(BlockKind, (usize, usize))> {
        self.spans.iter().map(|s| (s.kind, s.shape())).collect()
    }

    /// Block a composite cell belongs to.
    pub fn block_of(&self, row: usize, col: usize) -> Option<BlockKind> {
        self.spans.iter().find(|s| s.contains(row, col)).map(|s| s.kind)
    }

    /// Column assigned to every composite row.
    pub fn out_links(&self) -> Result<Vec<usize>> {
        let solution = self.solution()?;
        solution
            .row_to_col
            .iter()
            .map(|c| c.ok_or(Error::NotSolved))
            .collect()
    }

    /// Row assigned to every composite column.
    pub fn in_links(&self) -> Result<Vec<usize>> {
        let solution = self.solution()?;
        solution
            .col_to_row
            .iter()
            .map(|r| r.ok_or(Error::NotSolved))
            .collect()
    }

    /// Decision for leaving candidate `i`.
    pub fn out_decision(&self, i: usize) -> Result<OutDecision> {
        let col = self.assigned_col(i)?;
        Ok(match self.block_of(i, col) {
            Some(BlockKind::Link) => OutDecision::Link(col),
            _ => OutDecision::Death,
        })
    }

    /// Decision for entering candidate `j`.
    pub fn in_decision(&self, j: usize) -> Result<InDecision> {
        let row = self.assigned_row(j)?;
        Ok(match self.block_of(row, j) {
            Some(BlockKind::Link) => InDecision::Link(row),
            _ => InDecision::Birth,
        })
    }

    /// Decisions for all leaving and all entering candidates.
    pub fn decisions(&self) -> Result<(Vec<OutDecision>, Vec<InDecision>)> {
        let outs = (0..self.n_out).map(|i| self.out_decision(i)).collect::<Result<_>>()?;
        let ins = (0..self.n_in).map(|j| self.in_decision(j)).collect::<Result<_>>()?;
        Ok((outs, ins))
    }

    /// Accepted links as `(leaving, entering)` positions, by leaving position.
    pub fn links(&self) -> Result<Vec<(usize, usize)>> {
        let mut links = Vec::new();
        for i in 0..self.n_out {
            if let OutDecision::Link(j) = self.out_decision(i)? {
                links.push((i, j));
            }
        }
        Ok(links)
    }

    /// Move contested links to the lowest candidate positions at equal cost.
    ///
    /// Only exchanges that keep the total cost are made, so the result stays
    /// optimal. Every exchange lowers the position sum of the linked
    /// candidates, so the loop ends.
    fn prefer_lower_candidates(&self, solution: &AssignmentResult) -> AssignmentResult {
        let (n_out, n_in) = (self.n_out, self.n_in);
        let link = |i: usize, j: usize| self.mat[(i, j)];
        let death = |i: usize| self.mat[(i, n_in + i)];
        let birth = |j: usize| self.mat[(n_out + j, j)];

        let mut out_link: Vec<Option<usize>> = (0..n_out)
            .map(|i| solution.row_to_col[i].filter(|&col| col < n_in))
            .collect();
        let mut in_taken = vec![false; n_in];
        for &j in out_link.iter().flatten() {
            in_taken[j] = true;
        }

        loop {
            let mut changed = false;

            // Leaving candidates competing for one entering candidate
            for i2 in 0..n_out {
                let j = match out_link[i2] {
                    Some(j) => j,
                    None => continue,
                };
                let lower = (0..i2).find(|&i1| {
                    out_link[i1].is_none()
                        && link(i1, j).is_finite()
                        && ties(link(i1, j) + death(i2), link(i2, j) + death(i1))
                });
                if let Some(i1) = lower {
                    out_link[i1] = Some(j);
                    out_link[i2] = None;
                    changed = true;
                }
            }

            // Entering candidates competing for one leaving candidate
            for i in 0..n_out {
                let j2 = match out_link[i] {
                    Some(j) => j,
                    None => continue,
                };
                let lower = (0..j2).find(|&j1| {
                    !in_taken[j1]
                        && link(i, j1).is_finite()
                        && ties(link(i, j1) + birth(j2), link(i, j2) + birth(j1))
                });
                if let Some(j1) = lower {
                    in_taken[j2] = false;
                    in_taken[j1] = true;
                    out_link[i] = Some(j1);
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        // Accepted links fix the whole permutation: each link (i, j) frees
        // the auxiliary cell mirroring it.
        let n = n_out + n_in;
        let mut result = AssignmentResult {
            row_to_col: vec![None; n],
            col_to_row: vec![None; n],
            total_cost: 0.0,
        };
        let mut assign = |row: usize, col: usize| {
            result.row_to_col[row] = Some(col);
            result.col_to_row[col] = Some(row);
            result.total_cost += self.mat[(row, col)];
        };
        for (i, decision) in out_link.iter().enumerate() {
            match *decision {
                Some(j) => {
                    assign(i, j);
                    assign(n_out + j, n_in + i);
                }
                None => assign(i, n_in + i),
            }
        }
        for (j, &taken) in in_taken.iter().enumerate() {
            if !taken {
                assign(n_out + j, j);
            }
        }
        result
    }

    fn solution(&self) -> Result<&AssignmentResult> {
        self.solution.as_ref().ok_or(Error::NotSolved)
    }

    fn assigned_col(&self, i: usize) -> Result<usize> {
        if i >= self.n_out {
            return Err(Error::InvalidInput(format!("no leaving candidate {}", i)));
        }
        self.solution()?.row_to_col[i].ok_or(Error::NotSolved)
    }

    fn assigned_row(&self, j: usize) -> Result<usize> {
        if j >= self.n_in {
            return Err(Error::InvalidInput(format!("no entering candidate {}", j)));
        }
        self.solution()?.col_to_row[j].ok_or(Error::NotSolved)
    }
}
