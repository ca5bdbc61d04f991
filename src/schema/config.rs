//! Configuration types for the reference hexapod simulation.

use serde::{Deserialize, Serialize};

fn default_max_unsupported_time() -> f64 {
    0.5
}

/// Robot and integrator parameters shared (read-only) by every evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Integration time step in seconds.
    pub dt: f64,
    /// Number of legs. Each leg consumes 6 controller parameters.
    pub leg_count: usize,
    /// Hip-to-foot distance in meters.
    pub leg_length: f64,
    /// Nominal body height in meters.
    pub body_height: f64,
    /// Maximum joint excursion in radians for a unit amplitude.
    pub max_joint_angle: f64,
    /// Gait period in seconds.
    pub period: f64,
    /// Legs removed from the robot (never touch the ground).
    #[serde(default)]
    pub damaged_legs: Vec<usize>,
    /// Fewer legs than this in contact counts as unsupported.
    pub min_support_legs: usize,
    /// Unsupported time after which the safety measure stops the run.
    #[serde(default = "default_max_unsupported_time")]
    pub max_unsupported_time: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.015,
            leg_count: 6,
            leg_length: 0.2,
            body_height: 0.15,
            max_joint_angle: std::f64::consts::FRAC_PI_4,
            period: 1.0,
            damaged_legs: Vec::new(),
            min_support_legs: 1,
            max_unsupported_time: default_max_unsupported_time(),
        }
    }
}

impl SimulationConfig {
    /// Number of controller parameters the robot expects.
    #[inline]
    pub fn parameter_count(&self) -> usize {
        self.leg_count * 6
    }

    /// Whether a leg has been removed.
    #[inline]
    pub fn is_damaged(&self, leg: usize) -> bool {
        self.damaged_legs.contains(&leg)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(ConfigError::InvalidTimeStep);
        }
        if self.leg_count == 0 {
            return Err(ConfigError::NoLegs);
        }
        if !(self.leg_length > 0.0) || !(self.body_height > 0.0) {
            return Err(ConfigError::InvalidGeometry);
        }
        if !(self.period > 0.0) {
            return Err(ConfigError::InvalidPeriod);
        }
        for &leg in &self.damaged_legs {
            if leg >= self.leg_count {
                return Err(ConfigError::InvalidLegIndex {
                    leg,
                    legs: self.leg_count,
                });
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Time step must be positive and finite")]
    InvalidTimeStep,
    #[error("Robot must have at least one leg")]
    NoLegs,
    #[error("Leg length and body height must be positive")]
    InvalidGeometry,
    #[error("Gait period must be positive")]
    InvalidPeriod,
    #[error("Damaged leg {leg} does not exist (robot has {legs} legs)")]
    InvalidLegIndex { leg: usize, legs: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parameter_count(), 36);
    }

    #[test]
    fn test_invalid_damage() {
        let config = SimulationConfig {
            damaged_legs: vec![7],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLegIndex { leg: 7, legs: 6 })
        ));
    }
}
