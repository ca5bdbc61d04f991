//! Fitness and behavior-descriptor evaluation.
//!
//! The [`Evaluator`] runs a genotype through a [`Simulator`], applies the death
//! policy, and extracts the behavior descriptor from the observation trace.
//! Simulator errors and panics never escape: they become dead individuals.

use std::panic::{self, AssertUnwindSafe};

use crate::compute::{Observation, SimulationError, Simulator, Trajectory};
use crate::schema::{EvaluationConfig, Genotype, Individual};

/// Anything that can turn a genotype into an evaluated individual.
///
/// Implementations must be safe to call from many worker threads at once.
pub trait Evaluate: Send + Sync {
    /// Evaluate one genotype. Never fails: failures produce dead individuals.
    fn evaluate(&self, genotype: Genotype) -> Individual;

    /// Length of the descriptors this evaluator produces.
    fn descriptor_dimensions(&self) -> usize;

    /// Genotype length the evaluator requires, if fixed.
    fn genotype_length(&self) -> Option<usize> {
        None
    }
}

/// Pure summary of an observation trace.
pub trait DescriptorExtractor: Send + Sync {
    /// Descriptor length.
    fn dimensions(&self) -> usize;

    /// Compute the descriptor. Must return exactly `dimensions()` values.
    fn extract(&self, trace: &[Observation]) -> Vec<f32>;
}

/// Fraction of time each leg spends on the ground.
#[derive(Debug, Clone, Copy)]
pub struct DutyCycle {
    legs: usize,
}

impl DutyCycle {
    pub fn new(legs: usize) -> Self {
        Self { legs }
    }
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self::new(6)
    }
}

impl DescriptorExtractor for DutyCycle {
    fn dimensions(&self) -> usize {
        self.legs
    }

    fn extract(&self, trace: &[Observation]) -> Vec<f32> {
        if trace.is_empty() {
            return vec![0.0; self.legs];
        }

        let mut contacts = vec![0usize; self.legs];
        for obs in trace {
            for (count, &contact) in contacts.iter_mut().zip(&obs.contacts) {
                if contact {
                    *count += 1;
                }
            }
        }

        contacts
            .into_iter()
            .map(|c| c as f32 / trace.len() as f32)
            .collect()
    }
}

/// Why an individual was declared dead.
#[derive(Debug)]
enum Failure {
    BelowThreshold(f64),
    Simulation(SimulationError),
    Panicked(String),
    BadDescriptor { expected: usize, actual: usize },
}

/// Evaluates genotypes with a simulator and a descriptor extractor.
pub struct Evaluator<S, D> {
    simulator: S,
    extractor: D,
    config: EvaluationConfig,
}

impl<S: Simulator, D: DescriptorExtractor> Evaluator<S, D> {
    /// Create a new evaluator.
    pub fn new(simulator: S, extractor: D, config: EvaluationConfig) -> Self {
        Self {
            simulator,
            extractor,
            config,
        }
    }

    /// Run the simulator, converting panics into failures.
    fn run(&self, params: &[f64]) -> Result<Trajectory, Failure> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.simulator.simulate(params, self.config.duration)
        }));

        match outcome {
            Ok(Ok(trajectory)) => Ok(trajectory),
            Ok(Err(e)) => Err(Failure::Simulation(e)),
            Err(payload) => {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                Err(Failure::Panicked(msg))
            }
        }
    }

    /// Fitness and descriptor of a live individual, or the reason it died.
    fn assess(&self, params: &[f64]) -> Result<(f32, Vec<f32>), Failure> {
        let trajectory = self.run(params)?;

        let performance = trajectory.covered_distance;
        if !performance.is_finite() || performance < self.config.death_threshold as f64 {
            return Err(Failure::BelowThreshold(performance));
        }

        let descriptor = self.extractor.extract(&trajectory.trace);
        if descriptor.len() != self.extractor.dimensions() {
            return Err(Failure::BadDescriptor {
                expected: self.extractor.dimensions(),
                actual: descriptor.len(),
            });
        }

        Ok((performance as f32, descriptor))
    }
}

impl<S: Simulator, D: DescriptorExtractor> Evaluate for Evaluator<S, D> {
    fn evaluate(&self, genotype: Genotype) -> Individual {
        let params = genotype.to_params();

        match self.assess(&params) {
            Ok((fitness, descriptor)) => Individual::alive(genotype, fitness, descriptor),
            Err(failure) => {
                match &failure {
                    Failure::BelowThreshold(value) => {
                        log::trace!("individual below death threshold: {}", value)
                    }
                    other => log::warn!("evaluation failed, marking individual dead: {:?}", other),
                }
                Individual::dead(
                    genotype,
                    self.config.death_threshold,
                    self.extractor.dimensions(),
                )
            }
        }
    }

    fn descriptor_dimensions(&self) -> usize {
        self.extractor.dimensions()
    }

    fn genotype_length(&self) -> Option<usize> {
        self.simulator.expected_parameters()
    }
}
