//! # trajlink - Trajectory linking and gap closing
//!
//! Links spots detected in a sequence of frames into trajectories and repairs
//! the resulting track set by closing temporal gaps.
//!
//! Both stages are posed as a linear assignment problem over a block cost
//! matrix: a link block (candidate leaving spot x candidate entering spot),
//! two diagonal blocks holding the death and birth alternative costs, and an
//! auxiliary block that keeps the matching square. Cost functions are
//! pluggable.
//!
//! ## Features
//!
//! - Frame-by-frame linking with a Brownian motion cost and a speed cutoff
//! - Gap closing across a bounded number of frames with percentile-based
//!   alternative costs
//! - Exact minimum-cost perfect matching (shortest augmenting path)
//! - A labeled, time-indexed trajectory table with segment editing operations
//! - JSON configuration of the whole pipeline
//!
//! ## Example
//!
//! ```rust,ignore
//! use trajlink::{ByFrameSolver, GapCloseSolver, Solver, Trajectories};
//!
//! let trajs: Trajectories = load_spots();
//! let mut solver = ByFrameSolver::for_brownian_motion(trajs, 5.0, Some(2.0), &["x", "y"])?;
//! solver.track()?;
//!
//! let mut gap_closer = GapCloseSolver::for_constant_velocity(solver.into_trajs(), 5, None, &["x", "y"])?;
//! let trajs = gap_closer.track()?;
//! ```

// Internal modules (ports of scipy and numpy routines)
pub(crate) mod internal;

// Public modules
pub mod trajectories;
pub mod cost_function;
pub mod matrices;
pub mod solver;
pub mod config;

// Re-exports for convenience
pub use trajectories::{LabelArena, SpotKey, SpotRecord, Trajectories};
pub use cost_function::{
    cost_function_by_name, CostContext, CostFunction, CostFunctionKind, DiagCostFunction,
    LinkCostFunction,
};
pub use matrices::{BlockKind, CostMatrix, DiagBlock, InDecision, LinkBlock, OutDecision};
pub use solver::{
    check_cost_function_type, ByFrameSolver, CostFunctions, GapCloseSolver, ProgressBar,
    ProgressSink, Solver, SolverBase,
};
pub use config::{ByFrameConfig, CostFunctionSpec, GapCloseConfig, TrackingConfig};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    use crate::cost_function::CostFunctionKind;

    /// Errors that can occur while building or solving a tracking problem.
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Trajectories does not contain correct indexes: missing {0:?}")]
        MissingIndex(Vec<String>),

        #[error("Trajectories does not contain correct columns: missing {0:?}")]
        MissingColumns(Vec<String>),

        #[error("Cost function '{name}' is not a {expected} cost function")]
        CostFunctionType {
            name: String,
            expected: CostFunctionKind,
        },

        #[error("Unknown cost function: {0}")]
        UnknownCostFunction(String),

        #[error("Invalid cost {value} returned by '{function}' (expected a finite non-negative value or NaN)")]
        InvalidCost { function: String, value: f64 },

        #[error("Invalid block shape: expected {expected}, got {got}")]
        BlockShape { expected: String, got: String },

        #[error("Assignment is infeasible: {0}")]
        Infeasible(String),

        #[error("Cost matrix has not been solved yet")]
        NotSolved,

        #[error("Post-condition violated: {0}")]
        PostCondition(String),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for trajlink operations
    pub type Result<T> = std::result::Result<T, Error>;
}
