//! Evolution configuration types for MAP-Elites gait search.
//!
//! All values are static for the duration of a run. Defaults reproduce the
//! reference hexapod experiment: a 6-dimensional duty-cycle grid with 5 bins
//! per axis, 36 sampled genes, 200 offspring per generation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{
    GeneDomain, Genotype, Individual, SimulationConfig, genotype::DEFAULT_GENOTYPE_LENGTH,
};

/// Top-level configuration for a MAP-Elites run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Robot template used by the reference simulator.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Archive grid shape.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Genotype length and gene domain.
    #[serde(default)]
    pub genotype: GenotypeConfig,
    /// Mutation and crossover settings.
    #[serde(default)]
    pub variation: VariationConfig,
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Evaluation settings (duration, death threshold, backend).
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Directory for periodic archive snapshots.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            archive: ArchiveConfig::default(),
            genotype: GenotypeConfig::default(),
            variation: VariationConfig::default(),
            population: PopulationConfig::default(),
            evaluation: EvaluationConfig::default(),
            output_dir: None,
            random_seed: None,
        }
    }
}

/// Archive grid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Bins per behavior axis. Its length is the descriptor dimension.
    #[serde(default = "default_archive_shape")]
    pub shape: Vec<usize>,
}

impl ArchiveConfig {
    /// Grid with `dimensions` axes of `bins` bins each.
    pub fn uniform(dimensions: usize, bins: usize) -> Self {
        Self {
            shape: vec![bins; dimensions],
        }
    }

    /// Number of behavior dimensions.
    pub fn dimensions(&self) -> usize {
        self.shape.len()
    }

    /// Total cells, or `None` if the grid is too large to index.
    pub fn cells(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &bins| acc.checked_mul(bins))
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            shape: default_archive_shape(),
        }
    }
}

fn default_archive_shape() -> Vec<usize> {
    vec![5; 6]
}

/// Genotype encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenotypeConfig {
    /// Number of genes.
    #[serde(default = "default_genotype_length")]
    pub length: usize,
    /// Domain every gene is drawn from.
    #[serde(default)]
    pub domain: GeneDomain,
}

impl Default for GenotypeConfig {
    fn default() -> Self {
        Self {
            length: default_genotype_length(),
            domain: GeneDomain::default(),
        }
    }
}

fn default_genotype_length() -> usize {
    DEFAULT_GENOTYPE_LENGTH
}

/// Variation operator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationConfig {
    /// Per-gene mutation probability (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Probability that an offspring is produced by crossover (0.0-1.0).
    #[serde(default)]
    pub crossover_rate: f32,
    /// Mutation operator for continuous genes.
    #[serde(default)]
    pub mutation: MutationOperator,
    /// SBX distribution index for continuous genes.
    #[serde(default = "default_eta")]
    pub eta_c: f32,
}

impl Default for VariationConfig {
    fn default() -> Self {
        Self {
            mutation_rate: default_mutation_rate(),
            crossover_rate: 0.0,
            mutation: MutationOperator::default(),
            eta_c: default_eta(),
        }
    }
}

fn default_mutation_rate() -> f32 {
    0.05
}
fn default_eta() -> f32 {
    10.0
}

/// Mutation operator applied to continuous genes.
///
/// Sampled genes are always mutated by resampling from their value set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MutationOperator {
    /// Polynomial mutation with distribution index `eta_m`.
    Polynomial {
        #[serde(default = "default_eta")]
        eta_m: f32,
    },
    /// Gaussian noise scaled by the domain width.
    Gaussian { strength: f32 },
    /// Uniform reset inside the domain.
    Uniform,
}

impl Default for MutationOperator {
    fn default() -> Self {
        Self::Polynomial { eta_m: default_eta() }
    }
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Offspring produced per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Random genotypes evaluated to seed the archive.
    #[serde(default = "default_population_size")]
    pub init_size: usize,
    /// Number of generations to run.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Generations between archive snapshots. 0 disables periodic dumps.
    #[serde(default = "default_dump_period")]
    pub dump_period: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            init_size: default_population_size(),
            max_generations: default_max_generations(),
            dump_period: default_dump_period(),
        }
    }
}

fn default_population_size() -> usize {
    200
}
fn default_max_generations() -> usize {
    100_001
}
fn default_dump_period() -> usize {
    50
}

/// Evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Simulated duration per evaluation in seconds.
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// Performance below this value marks the individual dead.
    #[serde(default = "default_death_threshold")]
    pub death_threshold: f32,
    /// How a batch of genotypes is evaluated.
    #[serde(default)]
    pub backend: EvaluationBackend,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            death_threshold: default_death_threshold(),
            backend: EvaluationBackend::default(),
        }
    }
}

fn default_duration() -> f64 {
    5.0
}
fn default_death_threshold() -> f32 {
    -1000.0
}

/// Batch evaluation strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EvaluationBackend {
    /// One evaluation after another on the calling thread.
    Sequential,
    /// Rayon worker pool. `threads: None` uses the global pool.
    Parallel {
        #[serde(default)]
        threads: Option<usize>,
    },
}

impl Default for EvaluationBackend {
    fn default() -> Self {
        Self::Parallel { threads: None }
    }
}

// ============================================================================
// Progress and results
// ============================================================================

/// Current phase of the generation loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Seeding the archive with random genotypes.
    #[default]
    Initializing,
    /// Sampling parents and producing offspring.
    Generating,
    /// Running the batch evaluator.
    Evaluating,
    /// Inserting evaluated offspring into the archive.
    Updating,
    /// Run finished; archive handed to reporting.
    Terminated,
}

/// Progress report passed to callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Completed generations.
    pub generation: usize,
    /// Configured generation count.
    pub total_generations: usize,
    /// Evaluations performed so far (including initialization).
    pub evaluations: u64,
    /// Occupied cells.
    pub archive_size: usize,
    /// Total cells.
    pub archive_capacity: usize,
    /// Best fitness in the archive.
    pub best_fitness: f32,
    /// Mean fitness over occupied cells.
    pub mean_fitness: f32,
    /// Offspring accepted into the archive in the last batch.
    pub accepted_last: usize,
    /// Current phase.
    pub phase: EvolutionPhase,
}

/// Per-generation history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Occupied cells after each generation.
    pub archive_size: Vec<usize>,
    /// Best archive fitness after each generation.
    pub best_fitness: Vec<f32>,
    /// Mean archive fitness after each generation.
    pub mean_fitness: Vec<f32>,
    /// Offspring accepted per generation.
    pub accepted: Vec<usize>,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best elite found, if any cell is occupied.
    pub best: Option<Individual>,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Full history for analysis.
    pub history: EvolutionHistory,
}

/// Statistics from a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations completed.
    pub generations: usize,
    /// Total evaluations performed.
    pub total_evaluations: u64,
    /// Occupied cells at the end.
    pub archive_size: usize,
    /// Fraction of cells occupied.
    pub coverage: f32,
    /// Best fitness achieved.
    pub best_fitness: f32,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason the run stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Cancelled through the cancel handle.
    Cancelled,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Archive must have at least one behavior dimension")]
    NoDimensions,
    #[error("Archive axis {axis} has zero bins")]
    EmptyAxis { axis: usize },
    #[error("Archive shape {0:?} has more cells than can be indexed")]
    ArchiveTooLarge(Vec<usize>),
    #[error("Archive has {archive} dimensions but descriptors have {descriptor}")]
    DescriptorMismatch { archive: usize, descriptor: usize },
    #[error("Genotype length must be positive")]
    EmptyGenotype,
    #[error("Genotype has {genotype} genes but the simulator expects {simulator}")]
    GenotypeLengthMismatch { genotype: usize, simulator: usize },
    #[error("Invalid gene domain: {0}")]
    InvalidDomain(String),
    #[error("Invalid rate {name}: {value} (must be within 0.0-1.0)")]
    InvalidRate { name: &'static str, value: f32 },
    #[error("Population size and initial size must be positive")]
    PopulationTooSmall,
    #[error("Evaluation duration must be positive")]
    InvalidDuration,
    #[error("Death threshold must be finite")]
    InvalidThreshold,
    #[error("Worker thread count must be positive")]
    InvalidThreadCount,
    #[error("Genotype {index} does not fit the configured encoding")]
    InvalidGenotype { index: usize },
    #[error("Archive shape {actual:?} does not match configured shape {expected:?}")]
    ArchiveShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Simulation config validation failed: {0}")]
    SimulationConfigError(#[from] super::ConfigError),
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        self.simulation.validate()?;

        if self.archive.shape.is_empty() {
            return Err(EvolutionConfigError::NoDimensions);
        }
        if let Some(axis) = self.archive.shape.iter().position(|&bins| bins == 0) {
            return Err(EvolutionConfigError::EmptyAxis { axis });
        }
        if self.archive.cells().is_none() {
            return Err(EvolutionConfigError::ArchiveTooLarge(
                self.archive.shape.clone(),
            ));
        }

        if self.genotype.length == 0 {
            return Err(EvolutionConfigError::EmptyGenotype);
        }
        match &self.genotype.domain {
            GeneDomain::Sampled { values } => {
                if values.is_empty() {
                    return Err(EvolutionConfigError::InvalidDomain(
                        "sampled domain has no values".to_string(),
                    ));
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(EvolutionConfigError::InvalidDomain(
                        "sampled domain contains a non-finite value".to_string(),
                    ));
                }
            }
            GeneDomain::Continuous { min, max } => {
                if !(min.is_finite() && max.is_finite()) || min > max {
                    return Err(EvolutionConfigError::InvalidDomain(format!(
                        "min ({}) > max ({})",
                        min, max
                    )));
                }
            }
        }

        let check_rate = |value: f32, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(EvolutionConfigError::InvalidRate { name, value })
            }
        };
        check_rate(self.variation.mutation_rate, "mutation_rate")?;
        check_rate(self.variation.crossover_rate, "crossover_rate")?;

        if self.population.size == 0 || self.population.init_size == 0 {
            return Err(EvolutionConfigError::PopulationTooSmall);
        }

        if !(self.evaluation.duration > 0.0) {
            return Err(EvolutionConfigError::InvalidDuration);
        }
        if !self.evaluation.death_threshold.is_finite() {
            return Err(EvolutionConfigError::InvalidThreshold);
        }
        if let EvaluationBackend::Parallel { threads: Some(0) } = self.evaluation.backend {
            return Err(EvolutionConfigError::InvalidThreadCount);
        }

        Ok(())
    }

    /// Check that a genotype matches the configured length and domain.
    pub fn admits(&self, genotype: &Genotype) -> bool {
        genotype.len() == self.genotype.length
            && genotype
                .genes()
                .iter()
                .all(|&g| self.genotype.domain.contains(g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.archive.dimensions(), 6);
        assert_eq!(config.archive.shape.iter().product::<usize>(), 15625);
    }

    #[test]
    fn test_invalid_rate() {
        let config = EvolutionConfig {
            variation: VariationConfig {
                crossover_rate: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidRate {
                name: "crossover_rate",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_bins_rejected() {
        let config = EvolutionConfig {
            archive: ArchiveConfig {
                shape: vec![5, 0, 5],
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::EmptyAxis { axis: 1 })
        ));
    }

    #[test]
    fn test_oversized_archive_rejected() {
        let config = EvolutionConfig {
            archive: ArchiveConfig::uniform(64, 2),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::ArchiveTooLarge(_))
        ));
        assert_eq!(ArchiveConfig::uniform(6, 5).cells(), Some(15625));
    }

    #[test]
    fn test_default_backend_is_parallel() {
        assert_eq!(
            EvaluationBackend::default(),
            EvaluationBackend::Parallel { threads: None }
        );
        let parsed: EvaluationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.backend, EvaluationBackend::Parallel { threads: None });
        let parsed: EvaluationBackend =
            serde_json::from_str(r#"{ "type": "Parallel", "threads": 4 }"#).unwrap();
        assert_eq!(parsed, EvaluationBackend::Parallel { threads: Some(4) });
    }

    #[test]
    fn test_inverted_domain_rejected() {
        let config = EvolutionConfig {
            genotype: GenotypeConfig {
                length: 4,
                domain: GeneDomain::Continuous { min: 1.0, max: 0.0 },
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_serialization() {
        let config = EvolutionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population.size, config.population.size);
        assert_eq!(parsed.archive.shape, config.archive.shape);
        assert_eq!(parsed.evaluation.backend, config.evaluation.backend);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: EvolutionConfig =
            serde_json::from_str(r#"{ "population": { "max_generations": 10 } }"#).unwrap();
        assert_eq!(parsed.population.max_generations, 10);
        assert_eq!(parsed.population.size, 200);
        assert_eq!(parsed.evaluation.death_threshold, -1000.0);
    }
}
