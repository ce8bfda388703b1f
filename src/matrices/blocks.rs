//! Cost matrix blocks.
//!
//! A block is a dense matrix of costs with `NaN` marking infeasible cells,
//! plus the spot keys its rows and columns refer to.

use nalgebra::DMatrix;

use crate::cost_function::{validate_cost, CostContext, DiagCostFunction, LinkCostFunction};
use crate::internal::numpy::{finite_values, nanmax, nanmin};
use crate::trajectories::SpotKey;
use crate::{Error, Result};

/// Pairwise link costs between leaving spots (rows) and entering spots (columns).
#[derive(Debug, Clone)]
pub struct LinkBlock {
    pub row_keys: Vec<SpotKey>,
    pub col_keys: Vec<SpotKey>,
    pub mat: DMatrix<f64>,
}

impl LinkBlock {
    /// Evaluate `cost_function` on every (row, column) pair.
    ///
    /// # Returns
    /// `Error::InvalidCost` as soon as a cell is infinite or negative.
    pub fn new(
        row_keys: Vec<SpotKey>,
        col_keys: Vec<SpotKey>,
        cost_function: &dyn LinkCostFunction,
        ctx: &CostContext,
    ) -> Result<Self> {
        let mut mat = DMatrix::from_element(row_keys.len(), col_keys.len(), f64::NAN);
        for (i, leaving) in row_keys.iter().enumerate() {
            for (j, entering) in col_keys.iter().enumerate() {
                let cost = cost_function.link_cost(leaving, entering, ctx)?;
                mat[(i, j)] = validate_cost(cost_function.name(), cost)?;
            }
        }
        Ok(Self { row_keys, col_keys, mat })
    }

    /// Wrap precomputed costs.
    pub fn from_parts(row_keys: Vec<SpotKey>, col_keys: Vec<SpotKey>, mat: DMatrix<f64>) -> Result<Self> {
        if mat.shape() != (row_keys.len(), col_keys.len()) {
            return Err(Error::BlockShape {
                expected: format!("{}x{}", row_keys.len(), col_keys.len()),
                got: format!("{}x{}", mat.nrows(), mat.ncols()),
            });
        }
        for value in mat.iter() {
            validate_cost("link block", *value)?;
        }
        Ok(Self { row_keys, col_keys, mat })
    }

    /// Number of leaving spots.
    pub fn n_out(&self) -> usize {
        self.row_keys.len()
    }

    /// Number of entering spots.
    pub fn n_in(&self) -> usize {
        self.col_keys.len()
    }

    /// Set every cell whose pair is not kept to `NaN`.
    pub fn mask<F: Fn(&SpotKey, &SpotKey) -> bool>(&mut self, keep: F) {
        for (i, leaving) in self.row_keys.iter().enumerate() {
            for (j, entering) in self.col_keys.iter().enumerate() {
                if !keep(leaving, entering) {
                    self.mat[(i, j)] = f64::NAN;
                }
            }
        }
    }

    /// Feasible costs, column-major order.
    pub fn finite_costs(&self) -> Vec<f64> {
        finite_values(&self.mat)
    }

    pub fn min_cost(&self) -> Option<f64> {
        nanmin(&self.mat)
    }

    pub fn max_cost(&self) -> Option<f64> {
        nanmax(&self.mat)
    }

    /// Whether no cell is feasible.
    pub fn is_infeasible(&self) -> bool {
        self.mat.iter().all(|c| !c.is_finite())
    }
}

/// Alternative costs on the diagonal; off-diagonal cells are `NaN`.
#[derive(Debug, Clone)]
pub struct DiagBlock {
    pub keys: Vec<SpotKey>,
    pub mat: DMatrix<f64>,
}

impl DiagBlock {
    /// Evaluate `cost_function` once per key.
    pub fn new(keys: Vec<SpotKey>, cost_function: &dyn DiagCostFunction, ctx: &CostContext) -> Result<Self> {
        let mut mat = DMatrix::from_element(keys.len(), keys.len(), f64::NAN);
        for (i, key) in keys.iter().enumerate() {
            let cost = cost_function.diag_cost(key, ctx)?;
            mat[(i, i)] = validate_cost(cost_function.name(), cost)?;
        }
        Ok(Self { keys, mat })
    }

    /// Diagonal block holding `costs`.
    pub fn from_costs(keys: Vec<SpotKey>, costs: &[f64]) -> Result<Self> {
        if costs.len() != keys.len() {
            return Err(Error::BlockShape {
                expected: format!("{} costs", keys.len()),
                got: format!("{} costs", costs.len()),
            });
        }
        let mut mat = DMatrix::from_element(keys.len(), keys.len(), f64::NAN);
        for (i, &cost) in costs.iter().enumerate() {
            mat[(i, i)] = validate_cost("diagonal block", cost)?;
        }
        Ok(Self { keys, mat })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_function::{FixedDiagCost, PenaltyDiagCost};
    use crate::trajectories::Trajectories;
    use approx::assert_relative_eq;

    struct RowPlusCol;

    impl LinkCostFunction for RowPlusCol {
        fn name(&self) -> &str {
            "row_plus_col"
        }

        fn link_cost(&self, leaving: &SpotKey, entering: &SpotKey, _ctx: &CostContext) -> Result<f64> {
            if leaving.label == entering.label {
                return Ok(f64::NAN);
            }
            Ok((leaving.label + entering.label) as f64)
        }
    }

    struct Negative;

    impl LinkCostFunction for Negative {
        fn name(&self) -> &str {
            "negative"
        }

        fn link_cost(&self, _: &SpotKey, _: &SpotKey, _: &CostContext) -> Result<f64> {
            Ok(-1.0)
        }
    }

    fn keys(labels: &[i64]) -> Vec<SpotKey> {
        labels.iter().map(|&l| SpotKey::new(0, l)).collect()
    }

    #[test]
    fn test_link_block_evaluates_all_pairs() {
        let trajs = Trajectories::empty(&["t"]);
        let ctx = CostContext::new(&trajs);
        let block = LinkBlock::new(keys(&[0, 1]), keys(&[1, 2, 3]), &RowPlusCol, &ctx).unwrap();

        assert_eq!(block.mat.shape(), (2, 3));
        assert_relative_eq!(block.mat[(0, 2)], 3.0);
        assert!(block.mat[(1, 0)].is_nan());
        assert_eq!(block.finite_costs().len(), 5);
        assert_eq!(block.min_cost(), Some(1.0));
        assert_eq!(block.max_cost(), Some(4.0));
    }

    #[test]
    fn test_link_block_rejects_invalid_cost() {
        let trajs = Trajectories::empty(&["t"]);
        let ctx = CostContext::new(&trajs);
        let result = LinkBlock::new(keys(&[0]), keys(&[1]), &Negative, &ctx);
        assert!(matches!(result, Err(Error::InvalidCost { function, .. }) if function == "negative"));
    }

    #[test]
    fn test_link_block_mask() {
        let trajs = Trajectories::empty(&["t"]);
        let ctx = CostContext::new(&trajs);
        let mut block = LinkBlock::new(keys(&[0, 1]), keys(&[2, 3]), &RowPlusCol, &ctx).unwrap();
        block.mask(|out, inp| out.label == 0 && inp.label == 3);

        assert_eq!(block.finite_costs(), vec![3.0]);
        block.mask(|_, _| false);
        assert!(block.is_infeasible());
        assert_eq!(block.max_cost(), None);
    }

    #[test]
    fn test_link_block_from_parts_shape() {
        let result = LinkBlock::from_parts(keys(&[0]), keys(&[1]), DMatrix::zeros(2, 1));
        assert!(matches!(result, Err(Error::BlockShape { .. })));
    }

    #[test]
    fn test_diag_block() {
        let trajs = Trajectories::empty(&["t"]);
        let ctx = CostContext::new(&trajs).with_cost(2.0);
        let block = DiagBlock::new(keys(&[0, 1, 2]), &PenaltyDiagCost::new(1.5), &ctx).unwrap();

        assert_eq!(block.len(), 3);
        assert_relative_eq!(block.mat[(1, 1)], 3.0);
        assert!(block.mat[(0, 1)].is_nan());

        let fixed = DiagBlock::new(keys(&[0]), &FixedDiagCost::new(f64::INFINITY), &ctx);
        assert!(matches!(fixed, Err(Error::InvalidCost { .. })));
    }
}
