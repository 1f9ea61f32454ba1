//! Adaptive preference estimator
//!
//! Holds a single scalar preference that drifts toward observed readings at
//! a fixed learning rate, and classifies readings against a tolerance band
//! around it. The update is an exponential moving average:
//! `current ← current + learning_rate * (observed − current)`.

pub mod history;
pub mod thermostat;

use crate::error::{GuardError, Result};
use history::BoundedHistory;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use thermostat::{compare, ComparisonRow, StaticThermostat, Thermostat};

/// Action taken for one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Reading is below the band: raise it (heat)
    Increase,
    /// Reading is above the band: lower it (cool)
    Decrease,
    /// Reading is inside the band
    Maintain,
}

impl Action {
    /// Thermostat wording for demos
    pub fn device_label(&self) -> &'static str {
        match self {
            Action::Increase => "Turn ON Heater",
            Action::Decrease => "Turn ON AC",
            Action::Maintain => "Maintain",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Increase => write!(f, "increase"),
            Action::Decrease => write!(f, "decrease"),
            Action::Maintain => write!(f, "maintain"),
        }
    }
}

/// Estimator constants, fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub initial_value: f64,
    /// Half-width of the comfort band (>= 0)
    pub tolerance: f64,
    /// Fraction of the gap closed per observation, in [0, 1]
    pub learning_rate: f64,
    /// Observations kept (N)
    pub history_capacity: usize,
    /// Actions kept (M)
    pub action_capacity: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            initial_value: 22.0,
            tolerance: 2.0,
            learning_rate: 0.1,
            history_capacity: 10,
            action_capacity: 5,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.initial_value.is_finite() {
            return Err(GuardError::invalid_parameter(
                "initial_value",
                format!("{} is not finite", self.initial_value),
            ));
        }
        if !(self.tolerance >= 0.0) || !self.tolerance.is_finite() {
            return Err(GuardError::invalid_parameter(
                "tolerance",
                format!("{} must be a finite value >= 0", self.tolerance),
            ));
        }
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(GuardError::invalid_parameter(
                "learning_rate",
                format!("{} not in [0, 1]", self.learning_rate),
            ));
        }
        if self.history_capacity == 0 {
            return Err(GuardError::invalid_parameter(
                "history_capacity",
                "must be greater than 0",
            ));
        }
        if self.action_capacity == 0 {
            return Err(GuardError::invalid_parameter(
                "action_capacity",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Serializable view of an estimator's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceSnapshot {
    pub current: f64,
    pub tolerance: f64,
    pub learning_rate: f64,
    pub observations: Vec<f64>,
    pub actions: Vec<Action>,
}

impl PreferenceSnapshot {
    /// Preference rounded to one decimal, as shown to users
    pub fn display_preference(&self) -> f64 {
        (self.current * 10.0).round() / 10.0
    }
}

/// Tracks a drifting preference.
///
/// State is owned by one instance and only changed by [`observe`](Self::observe).
#[derive(Debug, Clone)]
pub struct PreferenceEstimator {
    current: f64,
    tolerance: f64,
    learning_rate: f64,
    observations: BoundedHistory<f64>,
    actions: BoundedHistory<Action>,
}

impl PreferenceEstimator {
    /// Build from a full config; fails with `InvalidParameter` on bad constants.
    pub fn new(config: &EstimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current: config.initial_value,
            tolerance: config.tolerance,
            learning_rate: config.learning_rate,
            observations: BoundedHistory::new(config.history_capacity),
            actions: BoundedHistory::new(config.action_capacity),
        })
    }

    /// Build with the default history capacities.
    pub fn initialize(initial_value: f64, tolerance: f64, learning_rate: f64) -> Result<Self> {
        Self::new(&EstimatorConfig {
            initial_value,
            tolerance,
            learning_rate,
            ..EstimatorConfig::default()
        })
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Comfort band `[current - tolerance, current + tolerance]`
    pub fn band(&self) -> (f64, f64) {
        (self.current - self.tolerance, self.current + self.tolerance)
    }

    pub fn observations(&self) -> &BoundedHistory<f64> {
        &self.observations
    }

    pub fn actions(&self) -> &BoundedHistory<Action> {
        &self.actions
    }

    /// Compare a reading to the band. No mutation.
    pub fn classify(&self, observed: f64) -> Action {
        let (lower, upper) = self.band();
        if observed < lower {
            Action::Increase
        } else if observed > upper {
            Action::Decrease
        } else {
            Action::Maintain
        }
    }

    /// Classify, then move the preference toward the reading and record both.
    ///
    /// Non-finite readings are classified `Maintain` and not applied.
    pub fn observe(&mut self, observed: f64) -> Action {
        if !observed.is_finite() {
            warn!(observed, "ignoring non-finite observation");
            return Action::Maintain;
        }

        let action = self.classify(observed);
        let previous = self.current;
        self.current = self.step_toward(observed);
        self.observations.push(observed);
        self.actions.push(action);

        debug!(
            observed,
            previous,
            current = self.current,
            action = %action,
            "preference updated"
        );
        action
    }

    fn step_toward(&self, observed: f64) -> f64 {
        let current = self.current;
        let rate = self.learning_rate;

        let mut next = current + rate * (observed - current);
        if !next.is_finite() {
            // `observed - current` overflowed; the convex form cannot.
            next = (1.0 - rate) * current + rate * observed;
        }
        if !next.is_finite() {
            return current;
        }

        // Never overshoot the reading, never move away from it.
        let (lo, hi) = if observed >= current {
            (current, observed)
        } else {
            (observed, current)
        };
        next.clamp(lo, hi)
    }

    pub fn snapshot(&self) -> PreferenceSnapshot {
        PreferenceSnapshot {
            current: self.current,
            tolerance: self.tolerance,
            learning_rate: self.learning_rate,
            observations: self.observations.to_vec(),
            actions: self.actions.to_vec(),
        }
    }
}
