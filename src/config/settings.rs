//! Runtime plot settings that can be modified while the application runs
//!
//! These are the numeric inputs of the plot view: the manual Y range set by
//! the two axis sliders and the optional baseline marker. They travel to the
//! renderer together with each window snapshot; nothing in the data path
//! reads them.
//!
//! # Axis Range
//!
//! The two sliders may be dragged past each other. Whichever one moved last
//! wins, and the other is dragged along so that `lower <= upper` always holds.

use crate::error::{Result, SerialVisError};
use serde::{Deserialize, Serialize};

/// Default lower bound of the Y sliders
pub const DEFAULT_Y_MIN: f64 = 1000.0;

/// Default upper bound of the Y sliders
pub const DEFAULT_Y_MAX: f64 = 150000.0;

/// Which slider the user moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisBound {
    Lower,
    Upper,
}

/// Plot view settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSettings {
    /// Y-axis minimum (when not autoscaling)
    pub y_min: f64,

    /// Y-axis maximum (when not autoscaling)
    pub y_max: f64,

    /// Whether to fit the Y axis to the data instead of the sliders
    pub autoscale_y: bool,

    /// Horizontal reference line
    pub baseline: Option<f64>,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            y_min: DEFAULT_Y_MIN,
            y_max: DEFAULT_Y_MAX,
            autoscale_y: true,
            baseline: None,
        }
    }
}

impl PlotSettings {
    /// Create new plot settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Move one slider, dragging the other along if they cross
    pub fn set_bound(&mut self, bound: AxisBound, value: f64) {
        match bound {
            AxisBound::Lower => {
                self.y_min = value;
                if self.y_max < value {
                    self.y_max = value;
                }
            }
            AxisBound::Upper => {
                self.y_max = value;
                if self.y_min > value {
                    self.y_min = value;
                }
            }
        }
        self.autoscale_y = false;
    }

    /// Set both bounds at once, ordering them if needed
    pub fn set_y_range(&mut self, lower: f64, upper: f64) {
        self.y_min = lower.min(upper);
        self.y_max = lower.max(upper);
        self.autoscale_y = false;
    }

    /// Return to fitting the Y axis to the data
    pub fn clear_y_range(&mut self) {
        self.autoscale_y = true;
    }

    /// Manual range, or `None` while autoscaling
    pub fn y_range(&self) -> Option<(f64, f64)> {
        if self.autoscale_y {
            None
        } else {
            Some((self.y_min, self.y_max))
        }
    }

    /// Set the baseline marker from user-entered text
    pub fn set_baseline_text(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        let value: f64 = text.parse().map_err(|_| {
            SerialVisError::Config(format!("Baseline is not a number: {:?}", text))
        })?;
        if !value.is_finite() {
            return Err(SerialVisError::Config(format!(
                "Baseline must be finite, got {}",
                text
            )));
        }
        self.baseline = Some(value);
        Ok(())
    }

    /// Remove the baseline marker
    pub fn clear_baseline(&mut self) {
        self.baseline = None;
    }
}
