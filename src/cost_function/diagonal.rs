//! Birth and death alternative costs.

use super::traits::{CostContext, DiagCostFunction};
use crate::trajectories::SpotKey;
use crate::{Error, Result};

/// Default factor applied to a data-derived alternative cost.
pub const DEFAULT_PENALTY: f64 = 1.05;

/// Alternative cost proportional to the context seed: `ctx.cost * penalty`.
#[derive(Debug, Clone, Copy)]
pub struct PenaltyDiagCost {
    penalty: f64,
}

impl PenaltyDiagCost {
    pub fn new(penalty: f64) -> Self {
        Self { penalty }
    }
}

impl Default for PenaltyDiagCost {
    fn default() -> Self {
        Self::new(DEFAULT_PENALTY)
    }
}

impl DiagCostFunction for PenaltyDiagCost {
    fn name(&self) -> &str {
        "penalty"
    }

    fn diag_cost(&self, _key: &SpotKey, ctx: &CostContext) -> Result<f64> {
        let seed = ctx
            .cost
            .ok_or_else(|| Error::InvalidConfig("penalty cost function needs a seed cost".to_string()))?;
        Ok(seed * self.penalty)
    }
}

/// Constant alternative cost.
#[derive(Debug, Clone, Copy)]
pub struct FixedDiagCost {
    cost: f64,
}

impl FixedDiagCost {
    pub fn new(cost: f64) -> Self {
        Self { cost }
    }
}

impl DiagCostFunction for FixedDiagCost {
    fn name(&self) -> &str {
        "fixed"
    }

    fn diag_cost(&self, _key: &SpotKey, _ctx: &CostContext) -> Result<f64> {
        Ok(self.cost)
    }
}
