//! Progress reporting for long solver runs.

use indicatif::{ProgressDrawTarget, ProgressStyle};

use crate::{Error, Result};

const TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {pos:>3}%";

/// Receives progress updates from a solver.
///
/// Updates are informational only; a sink cannot influence the result.
pub trait ProgressSink {
    /// Called after each processed frame pair.
    ///
    /// # Arguments
    /// * `percent` - Completion in `[0, 100]`
    /// * `t_out` - Frame the links leave from
    /// * `t_in` - Frame the links enter
    fn update(&mut self, percent: f64, t_out: i64, t_in: i64);
}

/// Terminal progress bar showing the frame pair being linked.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    bar: indicatif::ProgressBar,
}

impl ProgressBar {
    /// Bar drawn on stderr.
    pub fn new() -> Result<Self> {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Bar that keeps its state without drawing anything.
    pub fn hidden() -> Result<Self> {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Result<Self> {
        let style = ProgressStyle::with_template(TEMPLATE)
            .map_err(|e| Error::InvalidConfig(format!("progress bar template: {}", e)))?
            .progress_chars("#>-");
        let bar = indicatif::ProgressBar::with_draw_target(Some(100), target);
        bar.set_style(style);
        Ok(Self { bar })
    }

    /// Completion in percent, rounded.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Frame pair of the last update.
    pub fn message(&self) -> String {
        self.bar.message()
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}

impl ProgressSink for ProgressBar {
    fn update(&mut self, percent: f64, t_out: i64, t_in: i64) {
        let percent = percent.clamp(0.0, 100.0);
        self.bar.set_message(format!("t_out:{}|t_in:{}", t_out, t_in));
        self.bar.set_position(percent.round() as u64);
        if percent >= 100.0 {
            self.bar.finish();
        }
    }
}
