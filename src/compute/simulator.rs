//! Simulator contract consumed by the evaluator.
//!
//! A simulator turns controller parameters into a covered distance and a
//! per-timestep observation trace. Implementations must build a private
//! simulation state for every call so that evaluations can run concurrently.

use serde::{Deserialize, Serialize};

/// Raw observation recorded at one simulation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Simulated time in seconds.
    pub time: f64,
    /// Ground contact flag per leg.
    pub contacts: Vec<bool>,
    /// Body position (x forward, y lateral, z up).
    pub body_position: [f64; 3],
}

/// Output of a single simulation run.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    /// Task performance: distance covered along the forward axis.
    pub covered_distance: f64,
    /// Observations, one per integration step.
    pub trace: Vec<Observation>,
}

/// Failures reported by a simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Controller expects {expected} parameters, got {actual}")]
    InvalidParameters { expected: usize, actual: usize },
    #[error("Parameter {index} is not finite")]
    NonFiniteParameter { index: usize },
    #[error("Simulation diverged at t={time:.3}s")]
    Diverged { time: f64 },
    #[error("Simulation resources unavailable: {0}")]
    ResourceExhausted(String),
}

/// External physics collaborator.
pub trait Simulator: Send + Sync {
    /// Run the controller described by `params` for `duration` seconds.
    fn simulate(&self, params: &[f64], duration: f64) -> Result<Trajectory, SimulationError>;

    /// Number of controller parameters this simulator requires, if fixed.
    fn expected_parameters(&self) -> Option<usize> {
        None
    }
}

impl<S: Simulator + ?Sized> Simulator for std::sync::Arc<S> {
    fn simulate(&self, params: &[f64], duration: f64) -> Result<Trajectory, SimulationError> {
        (**self).simulate(params, duration)
    }

    fn expected_parameters(&self) -> Option<usize> {
        (**self).expected_parameters()
    }
}
