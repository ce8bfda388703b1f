//! Measures and geometric transformations of trajectories.

use nalgebra::{DMatrix, DVector};

use super::{SpotKey, Trajectories};
use crate::internal::scipy::CubicSpline;
use crate::{Error, Result};

/// Tolerance on the projected ordinate of reference spots.
const PROJECTION_TOLERANCE: f64 = 1e-6;

impl Trajectories {
    /// Multiply each of `coords` by the matching factor.
    pub fn scale<S: AsRef<str>>(&mut self, factors: &[f64], coords: &[S]) -> Result<()> {
        if factors.len() != coords.len() {
            return Err(Error::InvalidInput(format!(
                "{} factors given for {} coords",
                factors.len(),
                coords.len()
            )));
        }
        let cols = self.column_indices(coords)?;
        let data = self.data_mut();
        for (&j, &factor) in cols.iter().zip(factors) {
            for value in data.column_mut(j).iter_mut() {
                *value *= factor;
            }
        }
        Ok(())
    }

    /// Difference between consecutive spots of each segment.
    ///
    /// # Returns
    /// A table with the same index holding `columns`; the first spot of every
    /// segment is `NaN`.
    pub fn get_diff<S: AsRef<str>>(&self, columns: &[S]) -> Result<Trajectories> {
        let cols = self.column_indices(columns)?;
        let mut diff = DMatrix::from_element(self.len(), cols.len(), f64::NAN);

        for rows in self.segment_idxs().values() {
            for pair in rows.windows(2) {
                for (k, &j) in cols.iter().enumerate() {
                    diff[(pair[1], k)] = self.data()[(pair[1], j)] - self.data()[(pair[0], j)];
                }
            }
        }

        let mut out = Trajectories::empty(columns);
        out.replace_rows(self.index().to_vec(), diff)
            .map_err(|key| Error::PostCondition(format!("duplicate spot {}", key)))?;
        out.set_index_names(self.index_names());
        Ok(out)
    }

    /// Instantaneous speed of every spot, aligned with the rows.
    ///
    /// Speed is the euclidean displacement from the previous spot of the same
    /// segment divided by the elapsed `time_column`. First spots are `NaN`.
    pub fn get_speeds<S: AsRef<str>>(&self, time_column: &str, coords: &[S]) -> Result<Vec<f64>> {
        let diff = self.get_diff(coords)?;
        let dt = self.get_diff(&[time_column])?;

        Ok((0..self.len())
            .map(|row| {
                let displacement = diff.data().row(row).norm();
                displacement / dt.data()[(row, 0)].abs()
            })
            .collect())
    }

    /// Resample every segment along time with an interpolating spline.
    ///
    /// Adds `sampling - 1` points between consecutive spots. The returned table
    /// lives on the refined time base: spot `t_stamp` becomes
    /// `t_stamp * sampling`, and `t` is spread evenly between spots. Each
    /// coordinate is fitted against `t` with a not-a-knot cubic spline, which
    /// drops to a parabola for three-spot segments and a line for two-spot
    /// ones. Single-spot segments are carried over as they are, with `NaN`
    /// derivatives.
    ///
    /// # Arguments
    /// * `sampling` - Refinement factor, at least 1
    /// * `coords` - Columns to interpolate
    /// * `keep_speed` - Add a `v_<coord>` column per coord (first derivative)
    /// * `keep_acceleration` - Add an `a_<coord>` column per coord (second derivative)
    ///
    /// # Returns
    /// A table with columns `t`, `coords`, then the kept derivative columns.
    /// `Error::InvalidInput` if `t` does not strictly increase along a segment.
    pub fn time_interpolate<S: AsRef<str>>(
        &self,
        sampling: usize,
        coords: &[S],
        keep_speed: bool,
        keep_acceleration: bool,
    ) -> Result<Trajectories> {
        if sampling == 0 {
            return Err(Error::InvalidInput("sampling must be at least 1".to_string()));
        }

        let coords: Vec<String> = coords
            .iter()
            .map(|c| c.as_ref().to_string())
            .filter(|c| c != "t")
            .collect();
        let t_col = self.column_index("t")?;
        let coord_cols = self.column_indices(&coords)?;

        let mut columns: Vec<String> = vec!["t".to_string()];
        columns.extend(coords.iter().cloned());
        if keep_speed {
            columns.extend(coords.iter().map(|c| format!("v_{}", c)));
        }
        if keep_acceleration {
            columns.extend(coords.iter().map(|c| format!("a_{}", c)));
        }

        let step = sampling as i64;
        let mut rows: Vec<(SpotKey, Vec<f64>)> = Vec::new();
        for (label, idxs) in self.segment_idxs() {
            let times: Vec<f64> = idxs.iter().map(|&r| self.data()[(r, t_col)]).collect();

            if idxs.len() == 1 {
                let row = idxs[0];
                let mut values = vec![times[0]];
                values.extend(coord_cols.iter().map(|&j| self.data()[(row, j)]));
                values.resize(columns.len(), f64::NAN);
                rows.push((SpotKey::new(self.index()[row].t_stamp * step, label), values));
                continue;
            }

            let splines = coord_cols
                .iter()
                .map(|&j| {
                    let values: Vec<f64> = idxs.iter().map(|&r| self.data()[(r, j)]).collect();
                    CubicSpline::new(&times, &values)
                })
                .collect::<Result<Vec<_>>>()
                .map_err(|e| Error::InvalidInput(format!("segment {}: {}", label, e)))?;

            let mut samples: Vec<(i64, f64)> = Vec::new();
            for (k, pair) in idxs.windows(2).enumerate() {
                let (start, stop) = (self.index()[pair[0]].t_stamp, self.index()[pair[1]].t_stamp);
                let span = ((stop - start) * step) as f64;
                for n in (start * step)..(stop * step) {
                    let frac = (n - start * step) as f64 / span;
                    samples.push((n, times[k] + frac * (times[k + 1] - times[k])));
                }
            }
            let last = idxs[idxs.len() - 1];
            samples.push((self.index()[last].t_stamp * step, times[times.len() - 1]));

            for (n, t) in samples {
                let mut values = vec![t];
                values.extend(splines.iter().map(|s| s.evaluate(t)));
                if keep_speed {
                    values.extend(splines.iter().map(|s| s.derivative(t)));
                }
                if keep_acceleration {
                    values.extend(splines.iter().map(|s| s.second_derivative(t)));
                }
                rows.push((SpotKey::new(n, label), values));
            }
        }

        Trajectories::new(&columns, rows)
    }

    /// Project every spot on the line joining two reference segments.
    ///
    /// For every `t_stamp` the origin is the middle of the two reference
    /// spots and the abscissa points towards the first one. Adds `x_proj`
    /// (along the line) and `y_proj` (signed distance to it). Frames missing
    /// a reference spot get `NaN`. With `keep_first_time` the line of the first
    /// usable frame is reused for all frames.
    ///
    /// # Arguments
    /// * `ref_labels` - Labels of the two reference segments
    /// * `coords` - Two or three coordinate columns
    /// * `keep_first_time` - Reuse the first reference line
    ///
    /// # Returns
    /// `Error::PostCondition` if a reference spot does not end up on the
    /// projected abscissa.
    pub fn project<S: AsRef<str>>(&mut self, ref_labels: [i64; 2], coords: &[S], keep_first_time: bool) -> Result<()> {
        if !(2..=3).contains(&coords.len()) {
            return Err(Error::InvalidInput(format!(
                "projection needs 2 or 3 coords, got {}",
                coords.len()
            )));
        }
        let cols = self.column_indices(coords)?;

        let mut x_proj = vec![f64::NAN; self.len()];
        let mut y_proj = vec![f64::NAN; self.len()];
        let mut frame: Option<(DVector<f64>, DVector<f64>)> = None;

        let mut start = 0;
        while start < self.len() {
            let t_stamp = self.index()[start].t_stamp;
            let stop = start + self.index()[start..].iter().take_while(|k| k.t_stamp == t_stamp).count();

            let p1 = self.row_of(&SpotKey::new(t_stamp, ref_labels[0]));
            let p2 = self.row_of(&SpotKey::new(t_stamp, ref_labels[1]));

            if let (Some(r1), Some(r2)) = (p1, p2) {
                if frame.is_none() || !keep_first_time {
                    let p1 = self.position(r1, &cols);
                    let p2 = self.position(r2, &cols);
                    let origin = (&p1 + &p2) / 2.0;
                    let axis = &p1 - &origin;
                    let norm = axis.norm();
                    frame = if norm > 0.0 { Some((origin, axis / norm)) } else { None };
                }

                if let Some((origin, axis)) = &frame {
                    for row in start..stop {
                        let d = self.position(row, &cols) - origin;
                        let (x, y) = project_on_axis(&d, axis);
                        x_proj[row] = x;
                        y_proj[row] = y;
                    }
                }
            }

            start = stop;
        }

        for (row, key) in self.index().iter().enumerate() {
            if ref_labels.contains(&key.label) && y_proj[row].abs() > PROJECTION_TOLERANCE {
                return Err(Error::PostCondition(format!(
                    "reference spot {} projected at y_proj = {}",
                    key, y_proj[row]
                )));
            }
        }

        self.add_column("x_proj", x_proj)?;
        self.add_column("y_proj", y_proj)
    }
}

/// Coordinates of `d` along `axis` (unit) and across it.
fn project_on_axis(d: &DVector<f64>, axis: &DVector<f64>) -> (f64, f64) {
    let along = d.dot(axis);
    let across = if d.len() == 2 {
        axis[0] * d[1] - axis[1] * d[0]
    } else {
        let perp = d - axis * along;
        // Side of the line given by the z component of axis x d
        let side = axis[0] * d[1] - axis[1] * d[0];
        if side < 0.0 {
            -perp.norm()
        } else {
            perp.norm()
        }
    };
    (along, across)
}
