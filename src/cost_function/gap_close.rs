//! Constant-velocity link cost for gap closing.

use nalgebra::DVector;

use super::traits::{row_of, CostContext, LinkCostFunction};
use crate::trajectories::SpotKey;
use crate::Result;

/// Residual of a constant-velocity extrapolation across a gap.
///
/// The leaving segment's velocity is estimated from its last two spots (zero
/// for a one-spot segment) and extrapolated to the time of the entering spot.
/// The cost is the squared residual divided by the elapsed time. Pairs that
/// are not candidates in the context are infeasible. An optional
/// `max_speed` also gates the raw displacement.
#[derive(Debug, Clone)]
pub struct GapCloseLinkCost {
    coords: Vec<String>,
    max_speed: Option<f64>,
}

impl GapCloseLinkCost {
    pub fn new<S: AsRef<str>>(coords: &[S], max_speed: Option<f64>) -> Self {
        Self {
            coords: coords.iter().map(|c| c.as_ref().to_string()).collect(),
            max_speed,
        }
    }
}

impl LinkCostFunction for GapCloseLinkCost {
    fn name(&self) -> &str {
        "gap_close"
    }

    fn link_cost(&self, leaving: &SpotKey, entering: &SpotKey, ctx: &CostContext) -> Result<f64> {
        if !ctx.is_candidate(leaving, entering) {
            return Ok(f64::NAN);
        }

        let trajs = ctx.trajs;
        let cols = trajs.column_indices(&self.coords)?;
        let t = trajs.column_index("t")?;
        let (r_out, r_in) = (row_of(trajs, leaving)?, row_of(trajs, entering)?);

        let t_out = trajs.data()[(r_out, t)];
        let dt = trajs.data()[(r_in, t)] - t_out;
        if dt <= 0.0 {
            return Ok(f64::NAN);
        }

        let p_out = trajs.position(r_out, &cols);
        let p_in = trajs.position(r_in, &cols);

        if let Some(max_speed) = self.max_speed {
            if (&p_in - &p_out).norm() / dt > max_speed {
                return Ok(f64::NAN);
            }
        }

        // Previous spot of the leaving segment
        let velocity = match trajs.index()[..r_out].iter().rposition(|k| k.label == leaving.label) {
            Some(r_prev) => {
                let dt_prev = t_out - trajs.data()[(r_prev, t)];
                if dt_prev > 0.0 {
                    (&p_out - trajs.position(r_prev, &cols)) / dt_prev
                } else {
                    DVector::zeros(cols.len())
                }
            }
            None => DVector::zeros(cols.len()),
        };

        let predicted = p_out + velocity * dt;
        Ok((p_in - predicted).norm_squared() / dt)
    }
}
