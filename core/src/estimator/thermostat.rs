//! Static vs. adaptive thermostat controllers
//!
//! The static controller applies fixed thresholds and never changes; the
//! adaptive one is a [`PreferenceEstimator`] whose band follows the readings.

use super::{Action, PreferenceEstimator};
use crate::error::{GuardError, Result};
use serde::{Deserialize, Serialize};

/// A controller that turns a reading into an action
pub trait Thermostat {
    /// Decide for one reading; adaptive controllers may learn from it.
    fn decide(&mut self, reading: f64) -> Action;

    /// Whether decisions depend on previous readings
    fn adapts(&self) -> bool;
}

/// Rule-based controller with fixed thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticThermostat {
    /// Heat when the reading is strictly below this
    pub heat_below: f64,
    /// Cool when the reading is strictly above this
    pub cool_above: f64,
}

impl Default for StaticThermostat {
    fn default() -> Self {
        Self {
            heat_below: 18.0,
            cool_above: 25.0,
        }
    }
}

impl StaticThermostat {
    pub fn new(heat_below: f64, cool_above: f64) -> Result<Self> {
        let thermostat = Self {
            heat_below,
            cool_above,
        };
        thermostat.validate()?;
        Ok(thermostat)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.heat_below.is_finite() || !self.cool_above.is_finite() {
            return Err(GuardError::invalid_parameter(
                "thresholds",
                "thresholds must be finite",
            ));
        }
        if self.heat_below > self.cool_above {
            return Err(GuardError::invalid_parameter(
                "heat_below",
                format!(
                    "{} is above cool_above {}",
                    self.heat_below, self.cool_above
                ),
            ));
        }
        Ok(())
    }

    pub fn action_for(&self, reading: f64) -> Action {
        if reading < self.heat_below {
            Action::Increase
        } else if reading > self.cool_above {
            Action::Decrease
        } else {
            Action::Maintain
        }
    }
}

impl Thermostat for StaticThermostat {
    fn decide(&mut self, reading: f64) -> Action {
        self.action_for(reading)
    }

    fn adapts(&self) -> bool {
        false
    }
}

impl Thermostat for PreferenceEstimator {
    fn decide(&mut self, reading: f64) -> Action {
        self.observe(reading)
    }

    fn adapts(&self) -> bool {
        self.learning_rate() > 0.0
    }
}

/// One reading run through both controllers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub reading: f64,
    pub static_action: Action,
    pub adaptive_action: Action,
    /// Adaptive preference after this reading
    pub preference: f64,
}

impl ComparisonRow {
    pub fn diverged(&self) -> bool {
        self.static_action != self.adaptive_action
    }
}

/// Feed the same readings to a static and an adaptive controller.
pub fn compare(
    readings: &[f64],
    fixed: &mut StaticThermostat,
    adaptive: &mut PreferenceEstimator,
) -> Vec<ComparisonRow> {
    readings
        .iter()
        .map(|&reading| {
            let static_action = fixed.decide(reading);
            let adaptive_action = adaptive.decide(reading);
            ComparisonRow {
                reading,
                static_action,
                adaptive_action,
                preference: adaptive.current(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_thresholds_never_change() {
        let mut thermostat = StaticThermostat::default();
        let readings = [16.0, 18.0, 19.0, 22.0, 25.0, 26.0, 28.0];
        let first: Vec<Action> = readings.iter().map(|r| thermostat.decide(*r)).collect();
        let second: Vec<Action> = readings.iter().map(|r| thermostat.decide(*r)).collect();

        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                Action::Increase,
                Action::Maintain,
                Action::Maintain,
                Action::Maintain,
                Action::Maintain,
                Action::Decrease,
                Action::Decrease,
            ]
        );
        assert!(!thermostat.adapts());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        assert!(StaticThermostat::new(26.0, 18.0).is_err());
        assert!(StaticThermostat::new(f64::NAN, 18.0).is_err());
    }

    #[test]
    fn test_comparison_shows_drift() {
        let mut fixed = StaticThermostat::default();
        let mut adaptive = PreferenceEstimator::initialize(22.0, 2.0, 0.1).unwrap();
        let readings = [16.0, 19.0, 22.0, 26.0, 28.0, 24.0, 20.0, 21.0, 27.0, 18.0];

        let rows = compare(&readings, &mut fixed, &mut adaptive);
        assert_eq!(rows.len(), readings.len());

        // 19 is inside the static band but below the adaptive one
        assert_eq!(rows[1].static_action, Action::Maintain);
        assert_eq!(rows[1].adaptive_action, Action::Increase);
        assert!(rows.iter().any(ComparisonRow::diverged));

        assert_eq!(rows.last().unwrap().preference, adaptive.current());
        assert_eq!(adaptive.observations().len(), 10);
    }
}
