//! Cost matrices for linear assignment.
//!
//! - `LinkBlock` / `DiagBlock` - blocks filled from cost functions
//! - `CostMatrix` - the composite block matrix, its solution and decisions

mod blocks;
mod cost_matrix;

pub use blocks::{DiagBlock, LinkBlock};
pub use cost_matrix::{BlockKind, BlockSpan, CostMatrix, InDecision, OutDecision};
