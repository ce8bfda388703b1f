//! Cost function traits and their evaluation context.

use std::collections::HashSet;

use crate::trajectories::{SpotKey, Trajectories};
use crate::{Error, Result};

/// Everything a cost function may look at during one block evaluation.
///
/// Built fresh by the solver for every matrix it assembles and passed by
/// reference to each cell evaluation.
#[derive(Debug, Clone)]
pub struct CostContext<'a> {
    /// Table the keys refer to
    pub trajs: &'a Trajectories,
    /// Leaving candidates (aligned with `idxs_in` when pairs are given)
    pub idxs_out: Vec<SpotKey>,
    /// Entering candidates
    pub idxs_in: Vec<SpotKey>,
    /// Seed of data-derived alternative costs
    pub cost: Option<f64>,
    candidates: HashSet<(SpotKey, SpotKey)>,
}

impl<'a> CostContext<'a> {
    pub fn new(trajs: &'a Trajectories) -> Self {
        Self {
            trajs,
            idxs_out: Vec::new(),
            idxs_in: Vec::new(),
            cost: None,
            candidates: HashSet::new(),
        }
    }

    /// Set the candidate keys of both sides.
    pub fn with_keys(mut self, idxs_out: Vec<SpotKey>, idxs_in: Vec<SpotKey>) -> Self {
        self.idxs_out = idxs_out;
        self.idxs_in = idxs_in;
        self
    }

    /// Set aligned candidate pairs: `idxs_out[k]` may link to `idxs_in[k]`.
    pub fn with_candidates(mut self, idxs_out: Vec<SpotKey>, idxs_in: Vec<SpotKey>) -> Self {
        self.candidates = idxs_out.iter().copied().zip(idxs_in.iter().copied()).collect();
        self.idxs_out = idxs_out;
        self.idxs_in = idxs_in;
        self
    }

    /// Set the alternative cost seed.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Whether `(leaving, entering)` is one of the aligned candidate pairs.
    pub fn is_candidate(&self, leaving: &SpotKey, entering: &SpotKey) -> bool {
        self.candidates.contains(&(*leaving, *entering))
    }
}

/// Cost of linking a leaving spot to an entering spot.
pub trait LinkCostFunction: Send + Sync {
    /// Name used in configuration and error messages.
    fn name(&self) -> &str;

    /// Compute the cost of one link.
    ///
    /// # Returns
    /// A finite non-negative cost, or `NaN` when the link is infeasible.
    fn link_cost(&self, leaving: &SpotKey, entering: &SpotKey, ctx: &CostContext) -> Result<f64>;
}

/// Cost of a spot having no partner (birth or death).
pub trait DiagCostFunction: Send + Sync {
    /// Name used in configuration and error messages.
    fn name(&self) -> &str;

    /// Compute the alternative cost of one spot.
    ///
    /// # Returns
    /// A finite non-negative cost, or `NaN` when the alternative is forbidden.
    fn diag_cost(&self, key: &SpotKey, ctx: &CostContext) -> Result<f64>;
}

/// Reject infinite or negative costs; `NaN` passes through.
pub fn validate_cost(function: &str, value: f64) -> Result<f64> {
    if value.is_nan() || (value.is_finite() && value >= 0.0) {
        Ok(value)
    } else {
        Err(Error::InvalidCost {
            function: function.to_string(),
            value,
        })
    }
}

/// Row of `key` in `trajs`, or `Error::InvalidInput`.
pub(crate) fn row_of(trajs: &Trajectories, key: &SpotKey) -> Result<usize> {
    trajs
        .row_of(key)
        .ok_or_else(|| Error::InvalidInput(format!("spot {} not found", key)))
}
