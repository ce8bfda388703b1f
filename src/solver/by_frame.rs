//! Frame-by-frame linking.

use std::sync::Arc;

use tracing::debug;

use super::{alternative_cost, CostFunctions, ProgressSink, Solver, SolverBase};
use crate::config::ByFrameConfig;
use crate::cost_function::{BrownianLinkCost, CostContext, DiagCostFunction, FixedDiagCost, PenaltyDiagCost};
use crate::matrices::{CostMatrix, DiagBlock, InDecision, LinkBlock};
use crate::trajectories::{LabelArena, SpotKey, Trajectories};
use crate::{Error, Result};

/// Links the spots of each frame to the spots of the next present frame.
///
/// One assignment problem is solved per pair of consecutive frames, in
/// ascending order. Linked spots carry the label of their predecessor,
/// unlinked spots start new segments.
pub struct ByFrameSolver {
    base: SolverBase,
    cost_functions: CostFunctions,
    coords: Vec<String>,
    progress: Option<Box<dyn ProgressSink>>,
}

impl ByFrameSolver {
    /// Create a solver with explicit cost functions.
    ///
    /// # Arguments
    /// * `trajs` - Table indexed by `(t_stamp, label)` with a `t` column
    /// * `cost_functions` - Link, birth and death costs
    /// * `coords` - Coordinate columns the cost functions read
    pub fn new<S: AsRef<str>>(trajs: Trajectories, cost_functions: CostFunctions, coords: &[S]) -> Result<Self> {
        let coords: Vec<String> = coords.iter().map(|c| c.as_ref().to_string()).collect();
        let mut columns = vec!["t".to_string()];
        columns.extend(coords.iter().cloned());

        Ok(Self {
            base: SolverBase::with_columns(trajs, &columns)?,
            cost_functions,
            coords,
            progress: None,
        })
    }

    /// Brownian motion linking.
    ///
    /// # Arguments
    /// * `max_speed` - Fastest acceptable displacement per time unit; `0`
    ///   forbids every link
    /// * `penalty` - Constant birth/death cost. When `None` it is `1.05` times
    ///   the largest feasible link cost of each frame pair
    /// * `coords` - Coordinate columns
    pub fn for_brownian_motion<S: AsRef<str>>(
        trajs: Trajectories,
        max_speed: f64,
        penalty: Option<f64>,
        coords: &[S],
    ) -> Result<Self> {
        if !max_speed.is_finite() || max_speed < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_speed must be finite and non-negative, got {}",
                max_speed
            )));
        }

        let alternative: Arc<dyn DiagCostFunction> = match penalty {
            Some(p) if p.is_finite() && p >= 0.0 => Arc::new(FixedDiagCost::new(p)),
            Some(p) => {
                return Err(Error::InvalidConfig(format!(
                    "penalty must be finite and non-negative, got {}",
                    p
                )))
            }
            None => Arc::new(PenaltyDiagCost::default()),
        };

        let cost_functions = CostFunctions::new(
            Arc::new(BrownianLinkCost::new(coords, max_speed)),
            alternative.clone(),
            alternative,
        );
        Self::new(trajs, cost_functions, coords)
    }

    /// Build from a validated configuration.
    pub fn from_config(trajs: Trajectories, config: &ByFrameConfig) -> Result<Self> {
        config.validate()?;
        Self::for_brownian_motion(trajs, config.max_speed, config.penalty, &config.coords)
    }

    /// Report progress to `sink` after each frame pair.
    pub fn with_progress(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn coords(&self) -> &[String] {
        &self.coords
    }

    pub fn cost_functions(&self) -> &CostFunctions {
        &self.cost_functions
    }

    /// Compute the new label of every row, in current row order.
    fn link_frames(&mut self) -> Result<Vec<i64>> {
        let trajs = self.base.trajs();
        let mut new_labels = vec![0i64; trajs.len()];
        let mut arena = LabelArena::new(0);

        // Rows grouped by frame, frames ascending
        let mut frames: Vec<(i64, Vec<usize>)> = Vec::new();
        for (row, key) in trajs.index().iter().enumerate() {
            match frames.last_mut() {
                Some((t_stamp, rows)) if *t_stamp == key.t_stamp => rows.push(row),
                _ => frames.push((key.t_stamp, vec![row])),
            }
        }

        let Some((_, first_rows)) = frames.first() else {
            return Ok(new_labels);
        };
        for &row in first_rows {
            new_labels[row] = arena.fresh();
        }

        let n_pairs = frames.len() - 1;
        for (k, pair) in frames.windows(2).enumerate() {
            let (t_out, rows_out) = (&pair[0].0, &pair[0].1);
            let (t_in, rows_in) = (&pair[1].0, &pair[1].1);

            let keys_out: Vec<SpotKey> = rows_out.iter().map(|&r| trajs.index()[r]).collect();
            let keys_in: Vec<SpotKey> = rows_in.iter().map(|&r| trajs.index()[r]).collect();

            let ctx = CostContext::new(trajs).with_keys(keys_out.clone(), keys_in.clone());
            let link = LinkBlock::new(keys_out, keys_in, self.cost_functions.link.as_ref(), &ctx)?;

            let ctx = ctx.with_cost(alternative_cost(link.max_cost()));
            let death = DiagBlock::new(link.row_keys.clone(), self.cost_functions.death.as_ref(), &ctx)?;
            let birth = DiagBlock::new(link.col_keys.clone(), self.cost_functions.birth.as_ref(), &ctx)?;

            let mut cost_matrix = CostMatrix::new(&link, &death, &birth)?;
            let total_cost = cost_matrix.solve()?;

            let (_, in_decisions) = cost_matrix.decisions()?;
            let mut n_links = 0;
            for (j, decision) in in_decisions.into_iter().enumerate() {
                new_labels[rows_in[j]] = match decision {
                    InDecision::Link(i) => {
                        n_links += 1;
                        new_labels[rows_out[i]]
                    }
                    InDecision::Birth => arena.fresh(),
                };
            }

            debug!(
                t_out = *t_out,
                t_in = *t_in,
                n_out = rows_out.len(),
                n_in = rows_in.len(),
                n_links,
                total_cost,
                "Linked frame pair"
            );

            if let Some(sink) = self.progress.as_mut() {
                sink.update(100.0 * (k + 1) as f64 / n_pairs as f64, *t_out, *t_in);
            }
        }

        debug!(frames = frames.len(), trajectories = arena.issued(), "Linked all frames");
        Ok(new_labels)
    }
}

impl Solver for ByFrameSolver {
    fn track(&mut self) -> Result<&Trajectories> {
        let new_labels = self.link_frames()?;
        self.base.relabel_trajs(&new_labels)?;
        Ok(self.base.trajs())
    }

    fn trajs(&self) -> &Trajectories {
        self.base.trajs()
    }

    fn into_trajs(self) -> Trajectories {
        self.base.into_trajs()
    }
}
