//! Gap closing between segments.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::{alternative_cost, CostFunctions, Solver, SolverBase};
use crate::config::{GapCloseConfig, DEFAULT_PERCENTILE};
use crate::cost_function::{CostContext, GapCloseLinkCost, PenaltyDiagCost, DEFAULT_PENALTY};
use crate::internal::numpy::percentile;
use crate::matrices::{CostMatrix, DiagBlock, LinkBlock};
use crate::trajectories::{SpotKey, Trajectories};
use crate::{Error, Result};

/// Joins segments interrupted by missed detections.
///
/// A segment ending at `t_stamp` `stop` may be continued by a segment starting
/// at `start` when `0 < start - stop < maximum_gap`. All candidates are
/// weighed in a single assignment problem whose birth and death costs derive
/// from a percentile of the candidate link costs.
pub struct GapCloseSolver {
    base: SolverBase,
    cost_functions: CostFunctions,
    maximum_gap: i64,
    coords: Vec<String>,
    percentile: f64,
}

impl GapCloseSolver {
    /// Create a solver with explicit cost functions.
    ///
    /// # Arguments
    /// * `trajs` - Table indexed by `(t_stamp, label)` with a `t` column
    /// * `cost_functions` - Link, birth and death costs
    /// * `maximum_gap` - Gaps must be strictly shorter than this many frames
    /// * `coords` - Coordinate columns the cost functions read
    pub fn new<S: AsRef<str>>(
        trajs: Trajectories,
        cost_functions: CostFunctions,
        maximum_gap: i64,
        coords: &[S],
    ) -> Result<Self> {
        if maximum_gap <= 0 {
            return Err(Error::InvalidConfig(format!(
                "maximum_gap must be positive, got {}",
                maximum_gap
            )));
        }

        let coords: Vec<String> = coords.iter().map(|c| c.as_ref().to_string()).collect();
        let mut columns = vec!["t".to_string()];
        columns.extend(coords.iter().cloned());

        Ok(Self {
            base: SolverBase::with_columns(trajs, &columns)?,
            cost_functions,
            maximum_gap,
            coords,
            percentile: DEFAULT_PERCENTILE,
        })
    }

    /// Constant-velocity gap closing with the default penalty factor.
    pub fn for_constant_velocity<S: AsRef<str>>(
        trajs: Trajectories,
        maximum_gap: i64,
        max_speed: Option<f64>,
        coords: &[S],
    ) -> Result<Self> {
        Self::constant_velocity(trajs, maximum_gap, max_speed, DEFAULT_PENALTY, coords)
    }

    /// Build from a validated configuration.
    ///
    /// Explicit `cost_functions` take precedence over `max_speed` and
    /// `penalty`.
    pub fn from_config(trajs: Trajectories, config: &GapCloseConfig) -> Result<Self> {
        config.validate()?;
        let solver = match &config.cost_functions {
            Some(specs) => {
                let cost_functions = CostFunctions::from_specs(specs)?;
                Self::new(trajs, cost_functions, config.maximum_gap, &config.coords)?
            }
            None => Self::constant_velocity(
                trajs,
                config.maximum_gap,
                config.max_speed,
                config.penalty,
                &config.coords,
            )?,
        };
        solver.with_percentile(config.percentile)
    }

    fn constant_velocity<S: AsRef<str>>(
        trajs: Trajectories,
        maximum_gap: i64,
        max_speed: Option<f64>,
        penalty: f64,
        coords: &[S],
    ) -> Result<Self> {
        let alternative = Arc::new(PenaltyDiagCost::new(penalty));
        let cost_functions = CostFunctions::new(
            Arc::new(GapCloseLinkCost::new(coords, max_speed)),
            alternative.clone(),
            alternative,
        );
        Self::new(trajs, cost_functions, maximum_gap, coords)
    }

    /// Use the `q`-th percentile of link costs as alternative cost seed.
    pub fn with_percentile(mut self, q: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&q) {
            return Err(Error::InvalidConfig(format!(
                "percentile must be within [0, 100], got {}",
                q
            )));
        }
        self.percentile = q;
        Ok(self)
    }

    pub fn maximum_gap(&self) -> i64 {
        self.maximum_gap
    }

    pub fn coords(&self) -> &[String] {
        &self.coords
    }

    /// Candidate pairs as aligned key lists.
    ///
    /// `idxs_out[k]` is the last spot of a segment and `idxs_in[k]` the first
    /// spot of a segment starting `gap` frames later, `0 < gap < maximum_gap`.
    pub fn get_candidates(&self) -> (Vec<SpotKey>, Vec<SpotKey>) {
        let bounds = self.base.trajs().get_bounds();
        let mut idxs_out = Vec::new();
        let mut idxs_in = Vec::new();

        for (&out_label, &(_, stop)) in &bounds {
            for (&in_label, &(start, _)) in &bounds {
                let gap = start - stop;
                if gap > 0 && gap < self.maximum_gap {
                    idxs_out.push(SpotKey::new(stop, out_label));
                    idxs_in.push(SpotKey::new(start, in_label));
                }
            }
        }
        (idxs_out, idxs_in)
    }

    /// Solve the global assignment; returns accepted `(out_label, in_label)` links.
    fn close_gaps(&self, idxs_out: Vec<SpotKey>, idxs_in: Vec<SpotKey>) -> Result<Vec<(i64, i64)>> {
        let trajs = self.base.trajs();
        let bounds = trajs.get_bounds();
        let row_keys: Vec<SpotKey> = bounds.iter().map(|(&l, &(_, stop))| SpotKey::new(stop, l)).collect();
        let col_keys: Vec<SpotKey> = bounds.iter().map(|(&l, &(start, _))| SpotKey::new(start, l)).collect();

        let ctx = CostContext::new(trajs).with_candidates(idxs_out, idxs_in);
        let mut link = LinkBlock::new(row_keys, col_keys, self.cost_functions.link.as_ref(), &ctx)?;
        link.mask(|leaving, entering| ctx.is_candidate(leaving, entering));

        let seed = percentile(&link.finite_costs(), self.percentile)?;
        let ctx = ctx.with_cost(alternative_cost(seed));
        let death = DiagBlock::new(link.row_keys.clone(), self.cost_functions.death.as_ref(), &ctx)?;
        let birth = DiagBlock::new(link.col_keys.clone(), self.cost_functions.birth.as_ref(), &ctx)?;

        let mut cost_matrix = CostMatrix::new(&link, &death, &birth)?;
        let total_cost = cost_matrix.solve()?;
        debug!(
            segments = link.n_out(),
            alternative_cost = ctx.cost,
            total_cost,
            "Solved gap closing"
        );

        Ok(cost_matrix
            .links()?
            .into_iter()
            .map(|(i, j)| (link.row_keys[i].label, link.col_keys[j].label))
            .collect())
    }

    /// Relabel so that every chain of linked segments shares its head's label.
    fn assign(&mut self, links: &[(i64, i64)]) -> Result<()> {
        let trajs = self.base.trajs();
        let successor: BTreeMap<i64, i64> = links.iter().copied().collect();
        let linked_in: BTreeSet<i64> = links.iter().map(|&(_, in_label)| in_label).collect();

        let mut mapping: BTreeMap<i64, i64> = BTreeMap::new();
        for head in trajs.labels().into_iter().filter(|l| !linked_in.contains(l)) {
            mapping.insert(head, head);
            let mut current = head;
            while let Some(&next) = successor.get(&current) {
                if mapping.contains_key(&next) {
                    break;
                }
                mapping.insert(next, head);
                current = next;
            }
        }

        let new_labels: Vec<i64> = trajs
            .index()
            .iter()
            .map(|key| *mapping.get(&key.label).unwrap_or(&key.label))
            .collect();
        self.base.relabel_trajs(&new_labels)
    }
}

impl Solver for GapCloseSolver {
    fn track(&mut self) -> Result<&Trajectories> {
        if self.base.trajs().is_empty() {
            return Ok(self.base.trajs());
        }

        let (idxs_out, idxs_in) = self.get_candidates();
        if idxs_out.is_empty() {
            info!("No gap needs closing here");
            return Ok(self.base.trajs());
        }
        let n_candidates = idxs_out.len();

        let links = self.close_gaps(idxs_out, idxs_in)?;
        info!(candidates = n_candidates, closed = links.len(), "Closed gaps");

        self.assign(&links)?;
        Ok(self.base.trajs())
    }

    fn trajs(&self) -> &Trajectories {
        self.base.trajs()
    }

    fn into_trajs(self) -> Trajectories {
        self.base.into_trajs()
    }
}
