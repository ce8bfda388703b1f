//! Serializable configuration of the tracking pipeline.
//!
//! ```json
//! {
//!   "by_frame": { "max_speed": 5.0, "coords": ["x", "y"] },
//!   "gap_close": { "maximum_gap": 5, "coords": ["x", "y"], "percentile": 99.0 }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cost_function::{DEFAULT_COORDS, DEFAULT_PENALTY};
use crate::solver::{ByFrameSolver, GapCloseSolver, Solver};
use crate::trajectories::Trajectories;
use crate::{Error, Result};

/// Default percentile of link costs used as the gap-closing alternative cost.
pub const DEFAULT_PERCENTILE: f64 = 99.0;

fn default_coords() -> Vec<String> {
    DEFAULT_COORDS.iter().map(|c| c.to_string()).collect()
}

fn default_percentile() -> f64 {
    DEFAULT_PERCENTILE
}

fn default_penalty() -> f64 {
    DEFAULT_PENALTY
}

/// Configuration of one named cost function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostFunctionSpec {
    /// "brownian", "gap_close", "penalty" or "fixed"
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Vec<String>>,
}

impl CostFunctionSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_speed: None,
            penalty: None,
            cost: None,
            coords: None,
        }
    }
}

/// Frame-by-frame linking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByFrameConfig {
    /// Fastest acceptable displacement per time unit
    pub max_speed: f64,
    /// Constant birth/death cost; derived from the link costs when absent
    #[serde(default)]
    pub penalty: Option<f64>,
    #[serde(default = "default_coords")]
    pub coords: Vec<String>,
}

impl ByFrameConfig {
    pub fn new(max_speed: f64) -> Self {
        Self {
            max_speed,
            penalty: None,
            coords: default_coords(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_speed.is_finite() || self.max_speed < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_speed must be finite and non-negative, got {}",
                self.max_speed
            )));
        }
        if let Some(penalty) = self.penalty {
            if !penalty.is_finite() || penalty < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "penalty must be finite and non-negative, got {}",
                    penalty
                )));
            }
        }
        validate_coords(&self.coords)
    }
}

/// Gap-closing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapCloseConfig {
    /// Gaps must be strictly shorter than this many frames
    pub maximum_gap: i64,
    #[serde(default = "default_coords")]
    pub coords: Vec<String>,
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    /// Factor applied to the percentile cost
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    #[serde(default)]
    pub max_speed: Option<f64>,
    /// Explicit `link` / `birth` / `death` cost functions
    #[serde(default)]
    pub cost_functions: Option<BTreeMap<String, CostFunctionSpec>>,
}

impl GapCloseConfig {
    pub fn new(maximum_gap: i64) -> Self {
        Self {
            maximum_gap,
            coords: default_coords(),
            percentile: DEFAULT_PERCENTILE,
            penalty: DEFAULT_PENALTY,
            max_speed: None,
            cost_functions: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.maximum_gap <= 0 {
            return Err(Error::InvalidConfig(format!(
                "maximum_gap must be positive, got {}",
                self.maximum_gap
            )));
        }
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(Error::InvalidConfig(format!(
                "percentile must be within [0, 100], got {}",
                self.percentile
            )));
        }
        if !self.penalty.is_finite() || self.penalty < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "penalty must be finite and non-negative, got {}",
                self.penalty
            )));
        }
        if let Some(max_speed) = self.max_speed {
            if !max_speed.is_finite() || max_speed < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "max_speed must be finite and non-negative, got {}",
                    max_speed
                )));
            }
        }
        validate_coords(&self.coords)
    }
}

fn validate_coords(coords: &[String]) -> Result<()> {
    if coords.is_empty() {
        return Err(Error::InvalidConfig("coords must not be empty".to_string()));
    }
    Ok(())
}

/// Whole pipeline: frame-by-frame linking, then gap closing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub by_frame: Option<ByFrameConfig>,
    #[serde(default)]
    pub gap_close: Option<GapCloseConfig>,
}

impl TrackingConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(by_frame) = &self.by_frame {
            by_frame.validate()?;
        }
        if let Some(gap_close) = &self.gap_close {
            gap_close.validate()?;
        }
        Ok(())
    }

    /// Run the configured stages on `trajs`.
    ///
    /// # Returns
    /// The relabeled table. Without any stage the input is returned as is.
    pub fn run(&self, trajs: Trajectories) -> Result<Trajectories> {
        let mut trajs = trajs;

        if let Some(by_frame) = &self.by_frame {
            let mut solver = ByFrameSolver::from_config(trajs, by_frame)?;
            solver.track()?;
            trajs = solver.into_trajs();
            info!(segments = trajs.labels().len(), "Frame-by-frame linking done");
        }

        if let Some(gap_close) = &self.gap_close {
            let mut solver = GapCloseSolver::from_config(trajs, gap_close)?;
            solver.track()?;
            trajs = solver.into_trajs();
            info!(segments = trajs.labels().len(), "Gap closing done");
        }

        Ok(trajs)
    }
}
