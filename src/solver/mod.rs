//! Solvers turning spot tables into linked trajectories.
//!
//! - `ByFrameSolver` - links spots of consecutive frames
//! - `GapCloseSolver` - joins segments separated by missed detections
//!
//! Both own their table through `SolverBase`, which validates its structure
//! and applies relabeling.

mod by_frame;
mod gap_close;
mod progress;

pub use by_frame::ByFrameSolver;
pub use gap_close::GapCloseSolver;
pub use progress::{ProgressBar, ProgressSink};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::CostFunctionSpec;
use crate::cost_function::{
    cost_function_by_name, CostFunction, CostFunctionKind, DiagCostFunction, LinkCostFunction,
};
use crate::trajectories::{Trajectories, INDEX_NAMES};
use crate::{Error, Result};

/// Alternative cost used when the data gives no usable seed.
pub const FALLBACK_ALTERNATIVE_COST: f64 = 1.0;

/// Common interface of the solvers.
pub trait Solver {
    /// Run the solver and relabel the owned table.
    fn track(&mut self) -> Result<&Trajectories>;

    /// Current table.
    fn trajs(&self) -> &Trajectories;

    /// Give the table back.
    fn into_trajs(self) -> Trajectories
    where
        Self: Sized;
}

/// Table ownership and relabeling shared by all solvers.
#[derive(Debug, Clone)]
pub struct SolverBase {
    trajs: Trajectories,
}

impl SolverBase {
    /// Take ownership of `trajs` after checking its structure.
    ///
    /// # Returns
    /// `Error::MissingIndex` or `Error::MissingColumns` naming what is missing.
    pub fn new(trajs: Trajectories, index: &[&str], columns: &[&str]) -> Result<Self> {
        trajs.check_structure(Some(index), Some(columns))?;
        Ok(Self { trajs })
    }

    /// Same as `new` with the default `(t_stamp, label)` index.
    pub fn with_columns<S: AsRef<str>>(trajs: Trajectories, columns: &[S]) -> Result<Self> {
        let columns: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
        Self::new(trajs, &INDEX_NAMES, &columns)
    }

    pub fn trajs(&self) -> &Trajectories {
        &self.trajs
    }

    pub fn into_trajs(self) -> Trajectories {
        self.trajs
    }

    /// Replace every row label; `new_labels` follows the current row order.
    pub fn relabel_trajs(&mut self, new_labels: &[i64]) -> Result<()> {
        self.trajs.relabel(new_labels)
    }
}

/// Check that `cost_function` is of the expected kind.
///
/// # Returns
/// `Error::CostFunctionType` naming the function otherwise.
pub fn check_cost_function_type(cost_function: &CostFunction, expected: CostFunctionKind) -> Result<()> {
    if cost_function.kind() == expected {
        Ok(())
    } else {
        Err(Error::CostFunctionType {
            name: cost_function.name().to_string(),
            expected,
        })
    }
}

/// The three cost functions of an assignment problem.
#[derive(Clone)]
pub struct CostFunctions {
    pub link: Arc<dyn LinkCostFunction>,
    pub birth: Arc<dyn DiagCostFunction>,
    pub death: Arc<dyn DiagCostFunction>,
}

impl CostFunctions {
    pub fn new(
        link: Arc<dyn LinkCostFunction>,
        birth: Arc<dyn DiagCostFunction>,
        death: Arc<dyn DiagCostFunction>,
    ) -> Self {
        Self { link, birth, death }
    }

    /// Build from a map holding exactly the keys `link`, `birth` and `death`.
    pub fn from_map(mut map: BTreeMap<String, CostFunction>) -> Result<Self> {
        let mut take = |key: &str, kind: CostFunctionKind| -> Result<CostFunction> {
            let cost_function = map
                .remove(key)
                .ok_or_else(|| Error::InvalidConfig(format!("missing '{}' cost function", key)))?;
            check_cost_function_type(&cost_function, kind)?;
            Ok(cost_function)
        };

        let link = take("link", CostFunctionKind::Link)?.into_link()?;
        let birth = take("birth", CostFunctionKind::Diag)?.into_diag()?;
        let death = take("death", CostFunctionKind::Diag)?.into_diag()?;

        if let Some(extra) = map.keys().next() {
            return Err(Error::InvalidConfig(format!("unexpected '{}' cost function", extra)));
        }
        Ok(Self::new(link, birth, death))
    }

    /// Build every function of `specs` by name, then as `from_map`.
    pub fn from_specs(specs: &BTreeMap<String, CostFunctionSpec>) -> Result<Self> {
        let map = specs
            .iter()
            .map(|(key, spec)| Ok((key.clone(), cost_function_by_name(spec)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Self::from_map(map)
    }
}

impl std::fmt::Debug for CostFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostFunctions")
            .field("link", &self.link.name())
            .field("birth", &self.birth.name())
            .field("death", &self.death.name())
            .finish()
    }
}

/// Seed of data-derived alternative costs, falling back to a positive value.
pub(crate) fn alternative_cost(seed: Option<f64>) -> f64 {
    match seed {
        Some(cost) if cost > 0.0 => cost,
        Some(cost) => {
            debug!(cost, fallback = FALLBACK_ALTERNATIVE_COST, "Non-positive alternative cost replaced");
            FALLBACK_ALTERNATIVE_COST
        }
        None => {
            debug!(fallback = FALLBACK_ALTERNATIVE_COST, "No feasible link to derive an alternative cost from");
            FALLBACK_ALTERNATIVE_COST
        }
    }
}
