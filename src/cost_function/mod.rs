//! Cost functions used to fill cost-matrix blocks.
//!
//! This module provides:
//! - `LinkCostFunction` - pairwise cost between a leaving and an entering spot
//! - `DiagCostFunction` - per-spot birth or death alternative cost
//! - `CostContext` - the read-only data a cost function evaluates against
//! - Built-in costs: `BrownianLinkCost`, `GapCloseLinkCost`,
//!   `PenaltyDiagCost`, `FixedDiagCost`
//! - `CostFunction` and `cost_function_by_name` for configuration

mod traits;
mod brownian;
mod gap_close;
mod diagonal;
mod dispatch;

pub use traits::{validate_cost, CostContext, DiagCostFunction, LinkCostFunction};
pub use brownian::BrownianLinkCost;
pub use gap_close::GapCloseLinkCost;
pub use diagonal::{FixedDiagCost, PenaltyDiagCost, DEFAULT_PENALTY};
pub use dispatch::{cost_function_by_name, CostFunction, CostFunctionKind, DEFAULT_COORDS};
