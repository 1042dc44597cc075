//! Run configuration: generation count, per-generation schedules and burst budget.
use std::time::Duration;

use crate::error::{Error, Result};

/// A value that may change from one generation to the next.
///
/// Sample-count schedules usually funnel from a wide early population to a
/// narrow late one; heuristic-scale schedules usually ramp down to zero so the
/// final generations are judged on real cost alone.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Schedule {
    /// Same value for every generation.
    Constant(f64),
    /// Linear interpolation from `start` (first generation) to `end` (last generation).
    Linear { start: f64, end: f64 },
    /// One value per generation; the last value repeats past the end.
    Explicit(Vec<f64>),
}

impl Schedule {
    /// Value for `generation` out of `generations` total.
    pub fn value_at(&self, generation: usize, generations: usize) -> f64 {
        match self {
            Schedule::Constant(v) => *v,
            Schedule::Linear { start, end } => {
                if generations <= 1 {
                    return *start;
                }
                let t = (generation as f64 / (generations - 1) as f64).min(1.0);
                start + (end - start) * t
            }
            Schedule::Explicit(values) => values
                .get(generation)
                .or_else(|| values.last())
                .copied()
                .unwrap_or(0.0),
        }
    }

    /// Value rounded to a population size of at least one.
    pub fn count_at(&self, generation: usize, generations: usize) -> usize {
        let v = self.value_at(generation, generations).round();
        if v.is_finite() && v >= 1.0 {
            v as usize
        } else {
            1
        }
    }

    fn check(&self, what: &str, generations: usize, min: f64) -> Result<()> {
        if let Schedule::Explicit(values) = self {
            if values.is_empty() {
                return Err(Error::InvalidConfig(format!("{what} schedule is empty")));
            }
        }
        for g in 0..generations {
            let v = self.value_at(g, generations);
            if !v.is_finite() || v < min {
                return Err(Error::InvalidConfig(format!(
                    "{what} at generation {g} must be finite and >= {min} (got {v})"
                )));
            }
        }
        Ok(())
    }
}

impl From<f64> for Schedule {
    fn from(value: f64) -> Self {
        Schedule::Constant(value)
    }
}

impl From<usize> for Schedule {
    fn from(value: usize) -> Self {
        Schedule::Constant(value as f64)
    }
}

/// Configuration of a SOSMC growth run.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SosmcConfig {
    /// Number of grow/resample generations.
    pub generations: usize,
    /// Population size per generation.
    pub sample_count: Schedule,
    /// Weight of heuristic cost in resampling weights per generation.
    pub heuristic_scale: Schedule,
    /// Wall-clock budget of one burst when driven through a [`crate::task::Task`].
    pub burst_budget: Duration,
}

impl Default for SosmcConfig {
    fn default() -> Self {
        Self {
            generations: 10,
            sample_count: Schedule::Constant(100.0),
            heuristic_scale: Schedule::Constant(0.0),
            burst_budget: Duration::from_millis(8),
        }
    }
}

impl SosmcConfig {
    /// Creates a new [`SosmcConfig`] running `generations` generations.
    pub fn new(generations: usize) -> Self {
        Self {
            generations,
            ..Default::default()
        }
    }

    /// Sets the population-size schedule.
    pub fn with_sample_count(mut self, sample_count: impl Into<Schedule>) -> Self {
        self.sample_count = sample_count.into();
        self
    }

    /// Sets the heuristic-scale schedule.
    pub fn with_heuristic_scale(mut self, heuristic_scale: impl Into<Schedule>) -> Self {
        self.heuristic_scale = heuristic_scale.into();
        self
    }

    /// Sets the per-burst time budget.
    pub fn with_burst_budget(mut self, burst_budget: Duration) -> Self {
        self.burst_budget = burst_budget;
        self
    }

    /// Population size of `generation`.
    pub fn sample_count_at(&self, generation: usize) -> usize {
        self.sample_count.count_at(generation, self.generations)
    }

    /// Heuristic scale of `generation`.
    pub fn heuristic_scale_at(&self, generation: usize) -> f64 {
        self.heuristic_scale.value_at(generation, self.generations)
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.generations == 0 {
            return Err(Error::InvalidConfig("generations must be > 0".into()));
        }
        self.sample_count
            .check("sample_count", self.generations, 1.0)?;
        self.heuristic_scale
            .check("heuristic_scale", self.generations, 0.0)?;
        if self.burst_budget.is_zero() {
            return Err(Error::InvalidConfig("burst_budget must be > 0".into()));
        }
        Ok(())
    }
}
