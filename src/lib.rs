//! Hexapod Elites - MAP-Elites quality-diversity search for hexapod gaits.
//!
//! This crate evolves open-loop gait controllers for a six-legged robot and
//! keeps, for every behavior niche, the best controller found so far. A
//! niche is the discretized fraction of time each leg spends on the ground.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration types, genotypes and evaluated individuals
//! - `compute`: The simulator, gait controller, and MAP-Elites search
//!
//! # Example
//!
//! ```rust,no_run
//! use hexapod_elites::{
//!     EvolutionConfig, MapElitesEngine,
//!     compute::{HexapodSimulator, evolution::{DutyCycle, Evaluator}},
//! };
//!
//! let config = EvolutionConfig::default();
//! let simulator = HexapodSimulator::new(config.simulation.clone())?;
//! let evaluator = Evaluator::new(simulator, DutyCycle::default(), config.evaluation.clone());
//!
//! let mut engine = MapElitesEngine::new(config, evaluator)?;
//! let result = engine.run();
//!
//! println!("Elites: {}", result.stats.archive_size);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::HexapodSimulator;
pub use compute::evolution::{GridArchive, MapElitesEngine};
pub use schema::{EvolutionConfig, Genotype, Individual, SimulationConfig};
