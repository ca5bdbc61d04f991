//! MAP-Elites quality-diversity search over gait controllers.
//!
//! # Overview
//!
//! - **Archive** (`archive`): Grid of elites, one per behavior cell
//! - **Genome Operations** (`genome`): Random generation, crossover, and mutation
//! - **Fitness** (`fitness`): Simulator-backed evaluation and the death policy
//! - **Batch Evaluation** (`batch`): Sequential and rayon-parallel strategies
//! - **Search** (`search`): The generation loop
//!
//! # Example
//!
//! ```rust,no_run
//! use hexapod_elites::compute::HexapodSimulator;
//! use hexapod_elites::compute::evolution::{DutyCycle, Evaluator, MapElitesEngine};
//! use hexapod_elites::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig::default();
//! let simulator = HexapodSimulator::new(config.simulation.clone()).unwrap();
//! let evaluator = Evaluator::new(simulator, DutyCycle::default(), config.evaluation.clone());
//!
//! let mut engine = MapElitesEngine::new(config, evaluator).unwrap();
//! let result = engine.run_with_callback(|progress| {
//!     println!(
//!         "Generation {}: {} elites, best fitness = {:.3}",
//!         progress.generation, progress.archive_size, progress.best_fitness
//!     );
//! });
//!
//! println!("Coverage: {:.1}%", result.stats.coverage * 100.0);
//! ```
//!
//! # Death Policy
//!
//! An evaluation that errors, panics, produces a non-finite performance, or
//! falls below the death threshold yields a dead individual: fitness equal to
//! the threshold and an all-zero descriptor. Dead individuals are offered to
//! the archive like any other and can only occupy the origin cell.

mod archive;
mod batch;
mod fitness;
mod genome;
mod search;

pub use archive::{
    ArchiveEntry, ArchiveError, ArchiveExport, ArchiveStats, CellIndex, Elite, GridArchive,
    InsertOutcome, bin_index, cell_count,
};
pub use batch::{BatchEvaluator, ParallelEvaluator, SequentialEvaluator, batch_evaluator};
pub use fitness::{DescriptorExtractor, DutyCycle, Evaluate, Evaluator};
pub use genome::GenomeRng;
pub use search::{MapElitesEngine, ProgressCallback, SharedArchive};
