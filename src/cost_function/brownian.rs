//! Brownian motion link cost for frame-to-frame linking.

use super::traits::{row_of, CostContext, LinkCostFunction};
use crate::trajectories::{SpotKey, Trajectories};
use crate::Result;

/// Squared displacement between two spots, gated by a maximum speed.
///
/// The link is infeasible (`NaN`) when both spots share the same time, when
/// `max_speed` is not positive, or when the spot moved faster than
/// `max_speed`. Time is read from column `t`.
#[derive(Debug, Clone)]
pub struct BrownianLinkCost {
    coords: Vec<String>,
    max_speed: f64,
}

impl BrownianLinkCost {
    pub fn new<S: AsRef<str>>(coords: &[S], max_speed: f64) -> Self {
        Self {
            coords: coords.iter().map(|c| c.as_ref().to_string()).collect(),
            max_speed,
        }
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }
}

impl LinkCostFunction for BrownianLinkCost {
    fn name(&self) -> &str {
        "brownian"
    }

    fn link_cost(&self, leaving: &SpotKey, entering: &SpotKey, ctx: &CostContext) -> Result<f64> {
        brownian_cost(ctx.trajs, &self.coords, self.max_speed, leaving, entering)
    }
}

fn brownian_cost(
    trajs: &Trajectories,
    coords: &[String],
    max_speed: f64,
    leaving: &SpotKey,
    entering: &SpotKey,
) -> Result<f64> {
    let cols = trajs.column_indices(coords)?;
    let t = trajs.column_index("t")?;
    let (r_out, r_in) = (row_of(trajs, leaving)?, row_of(trajs, entering)?);

    let dt = (trajs.data()[(r_in, t)] - trajs.data()[(r_out, t)]).abs();
    if dt == 0.0 || max_speed <= 0.0 {
        return Ok(f64::NAN);
    }

    let displacement = (trajs.position(r_in, &cols) - trajs.position(r_out, &cols)).norm();
    if displacement / dt > max_speed {
        return Ok(f64::NAN);
    }
    Ok(displacement * displacement)
}
