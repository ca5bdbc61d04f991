//! Reference kinematic hexapod simulator.
//!
//! Stands in for a rigid-body physics engine behind the [`Simulator`] trait.
//! The robot template is immutable and shared by reference; every call to
//! [`Simulator::simulate`] builds its own [`RobotState`].

use std::sync::Arc;

use crate::schema::{ConfigError, SimulationConfig};

use super::{GaitController, Observation, SimulationError, Simulator, Trajectory};

/// Distance reported when a safety measure stops the run.
pub const SAFETY_VIOLATION_DISTANCE: f64 = -10002.0;

const GRAVITY: f64 = 9.81;

/// Kinematic simulator for a legged robot driven by a [`GaitController`].
#[derive(Debug, Clone)]
pub struct HexapodSimulator {
    template: Arc<SimulationConfig>,
}

impl HexapodSimulator {
    /// Create a simulator from a validated robot template.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            template: Arc::new(config),
        })
    }
}

impl Simulator for HexapodSimulator {
    fn simulate(&self, params: &[f64], duration: f64) -> Result<Trajectory, SimulationError> {
        let config = &*self.template;
        let controller =
            GaitController::new(params, config.leg_count, config.max_joint_angle, config.period)?;
        let mut state = RobotState::from_template(config, &controller);

        let steps = (duration / config.dt).round().max(0.0) as usize;
        let mut trace = Vec::new();
        trace
            .try_reserve_exact(steps)
            .map_err(|e| SimulationError::ResourceExhausted(e.to_string()))?;

        for _ in 0..steps {
            match state.step(&controller, config)? {
                StepStatus::Running => trace.push(state.observation()),
                StepStatus::SafetyViolation => {
                    log::trace!("safety measure triggered at t={:.3}s", state.time);
                    return Ok(Trajectory {
                        covered_distance: SAFETY_VIOLATION_DISTANCE,
                        trace,
                    });
                }
            }
        }

        Ok(Trajectory {
            covered_distance: state.body_position[0],
            trace,
        })
    }

    fn expected_parameters(&self) -> Option<usize> {
        Some(self.template.parameter_count())
    }
}

/// Outcome of a single integration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    SafetyViolation,
}

/// Mutable state of one simulated robot.
#[derive(Debug, Clone)]
pub struct RobotState {
    /// Current simulation time.
    pub time: f64,
    /// Body position (x forward, y lateral, z up).
    pub body_position: [f64; 3],
    /// Ground contact per leg.
    pub contacts: Vec<bool>,
    /// Continuous time spent without enough supporting legs.
    pub unsupported_time: f64,
    swing: Vec<f64>,
}

impl RobotState {
    /// Fresh robot standing at the origin, joints at their t=0 commands.
    pub fn from_template(config: &SimulationConfig, controller: &GaitController) -> Self {
        let (swing, contacts) = (0..config.leg_count)
            .map(|leg| {
                let (swing, lift) = controller.joint_angles(leg, 0.0);
                (swing, !config.is_damaged(leg) && lift <= 0.0)
            })
            .unzip();

        Self {
            time: 0.0,
            body_position: [0.0, 0.0, config.body_height],
            contacts,
            unsupported_time: 0.0,
            swing,
        }
    }

    /// Advance by one time step.
    pub fn step(
        &mut self,
        controller: &GaitController,
        config: &SimulationConfig,
    ) -> Result<StepStatus, SimulationError> {
        let t = self.time + config.dt;

        let mut stance = 0usize;
        let mut push_x = 0.0f64;
        let mut push_lateral = 0.0f64;

        for leg in 0..config.leg_count {
            let (swing, lift) = controller.joint_angles(leg, t);
            let contact = !config.is_damaged(leg) && lift <= 0.0;

            if contact {
                // A planted foot sweeping backwards pushes the body forwards.
                let foot_dx = config.leg_length * (swing.sin() - self.swing[leg].sin());
                push_x -= foot_dx;
                let side = if leg % 2 == 0 { 1.0 } else { -1.0 };
                push_lateral += side * foot_dx;
                stance += 1;
            }

            self.contacts[leg] = contact;
            self.swing[leg] = swing;
        }

        if stance > 0 {
            self.body_position[0] += push_x / stance as f64;
            self.body_position[1] += 0.1 * push_lateral / stance as f64;
        }

        if stance < config.min_support_legs {
            self.unsupported_time += config.dt;
            let drop = 0.5 * GRAVITY * self.unsupported_time * self.unsupported_time;
            self.body_position[2] = (config.body_height - drop).max(0.0);
        } else {
            self.unsupported_time = 0.0;
            self.body_position[2] = config.body_height;
        }

        self.time = t;

        if self.body_position.iter().any(|v| !v.is_finite()) {
            return Err(SimulationError::Diverged { time: t });
        }
        if self.unsupported_time > config.max_unsupported_time {
            return Ok(StepStatus::SafetyViolation);
        }
        Ok(StepStatus::Running)
    }

    /// Snapshot the observable state.
    pub fn observation(&self) -> Observation {
        Observation {
            time: self.time,
            contacts: self.contacts.clone(),
            body_position: self.body_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tripod_params() -> Vec<f64> {
        (0..6)
            .flat_map(|leg| {
                let phase = if leg % 2 == 0 { 0.0 } else { 0.5 };
                [1.0, phase, 0.5, 0.5, phase, 0.5]
            })
            .collect()
    }

    #[test]
    fn test_deterministic() {
        let sim = HexapodSimulator::new(SimulationConfig::default()).unwrap();
        let a = sim.simulate(&tripod_params(), 2.0).unwrap();
        let b = sim.simulate(&tripod_params(), 2.0).unwrap();
        assert_eq!(a.covered_distance, b.covered_distance);
        assert_eq!(a.trace, b.trace);
    }

    #[test]
    fn test_trace_length() {
        let sim = HexapodSimulator::new(SimulationConfig::default()).unwrap();
        let traj = sim.simulate(&tripod_params(), 1.5).unwrap();
        assert_eq!(traj.trace.len(), 100);
        assert!(traj.trace.iter().all(|o| o.contacts.len() == 6));
    }

    #[test]
    fn test_standing_still() {
        // Zero amplitudes: every foot stays planted and nothing moves.
        let sim = HexapodSimulator::new(SimulationConfig::default()).unwrap();
        let traj = sim.simulate(&[0.0; 36], 1.0).unwrap();
        assert_eq!(traj.covered_distance, 0.0);
        assert!(traj.trace.iter().all(|o| o.contacts.iter().all(|&c| c)));
    }

    #[test]
    fn test_all_legs_lifted_triggers_safety() {
        let params: Vec<f64> = (0..6)
            .flat_map(|_| [0.5, 0.0, 0.5, 1.0, 0.0, 1.0])
            .collect();
        let sim = HexapodSimulator::new(SimulationConfig::default()).unwrap();
        let traj = sim.simulate(&params, 5.0).unwrap();
        assert_eq!(traj.covered_distance, SAFETY_VIOLATION_DISTANCE);
    }

    #[test]
    fn test_damaged_leg_never_touches() {
        let config = SimulationConfig {
            damaged_legs: vec![2],
            ..Default::default()
        };
        let sim = HexapodSimulator::new(config).unwrap();
        let traj = sim.simulate(&[0.0; 36], 1.0).unwrap();
        assert!(traj.trace.iter().all(|o| !o.contacts[2]));
        assert!(traj.trace.iter().all(|o| o.contacts[0]));
    }

    #[test]
    fn test_wrong_parameter_count() {
        let sim = HexapodSimulator::new(SimulationConfig::default()).unwrap();
        assert!(matches!(
            sim.simulate(&[0.5; 4], 1.0),
            Err(SimulationError::InvalidParameters { .. })
        ));
        assert_eq!(sim.expected_parameters(), Some(36));
    }
}
