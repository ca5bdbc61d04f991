//! MAP-Elites generation loop.
//!
//! One generation samples parents uniformly from occupied cells, produces
//! offspring, evaluates them through the configured [`BatchEvaluator`], and
//! offers every result to the archive under a single write lock.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use crate::schema::{
    EvolutionConfig, EvolutionConfigError, EvolutionHistory, EvolutionPhase, EvolutionProgress,
    EvolutionResult, EvolutionStats, Genotype, Individual, StopReason,
};

use super::archive::{ArchiveError, ArchiveExport, GridArchive};
use super::batch::{BatchEvaluator, batch_evaluator};
use super::fitness::Evaluate;
use super::genome::GenomeRng;

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(&EvolutionProgress) + Send + Sync>;

/// Archive shared between the engine and external readers.
pub type SharedArchive = Arc<RwLock<GridArchive>>;

fn read(archive: &RwLock<GridArchive>) -> RwLockReadGuard<'_, GridArchive> {
    archive.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(archive: &RwLock<GridArchive>) -> RwLockWriteGuard<'_, GridArchive> {
    archive.write().unwrap_or_else(PoisonError::into_inner)
}

/// Evolution engine that runs the MAP-Elites search.
pub struct MapElitesEngine<E: Evaluate> {
    config: EvolutionConfig,
    rng: GenomeRng,
    evaluator: E,
    batch: Box<dyn BatchEvaluator>,
    archive: SharedArchive,
    history: EvolutionHistory,
    generation: usize,
    evaluations: u64,
    accepted_last: usize,
    phase: EvolutionPhase,
    initialized: bool,
    cancelled: Arc<AtomicBool>,
}

impl<E: Evaluate> MapElitesEngine<E> {
    /// Create a new engine. Fails before any evaluation if the configuration
    /// is invalid or disagrees with the evaluator.
    pub fn new(config: EvolutionConfig, evaluator: E) -> Result<Self, EvolutionConfigError> {
        config.validate()?;

        let descriptor = evaluator.descriptor_dimensions();
        if descriptor != config.archive.dimensions() {
            return Err(EvolutionConfigError::DescriptorMismatch {
                archive: config.archive.dimensions(),
                descriptor,
            });
        }
        if let Some(simulator) = evaluator.genotype_length()
            && simulator != config.genotype.length
        {
            return Err(EvolutionConfigError::GenotypeLengthMismatch {
                genotype: config.genotype.length,
                simulator,
            });
        }

        let archive = GridArchive::from_config(&config.archive)
            .map_err(|e| EvolutionConfigError::InvalidArchive(e.to_string()))?;
        let batch = batch_evaluator(&config.evaluation.backend)?;
        let rng = match config.random_seed {
            Some(seed) => GenomeRng::new(seed),
            None => GenomeRng::random(),
        };

        Ok(Self {
            config,
            rng,
            evaluator,
            batch,
            archive: Arc::new(RwLock::new(archive)),
            history: EvolutionHistory::default(),
            generation: 0,
            evaluations: 0,
            accepted_last: 0,
            phase: EvolutionPhase::Initializing,
            initialized: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Resume from a previously saved archive instead of random initialization.
    pub fn with_archive(self, archive: GridArchive) -> Result<Self, EvolutionConfigError> {
        if archive.shape() != self.config.archive.shape.as_slice() {
            return Err(EvolutionConfigError::ArchiveShapeMismatch {
                expected: self.config.archive.shape.clone(),
                actual: archive.shape().to_vec(),
            });
        }
        if let Some(index) = archive
            .elites()
            .position(|e| !self.config.admits(&e.individual.genotype))
        {
            return Err(EvolutionConfigError::InvalidGenotype { index });
        }

        let initialized = !archive.is_empty();
        *write(&self.archive) = archive;
        Ok(Self {
            initialized,
            ..self
        })
    }

    /// Continue a run from a snapshot written by [`MapElitesEngine::dump`].
    ///
    /// The generation counter picks up where the snapshot left off, so
    /// `max_generations` bounds the combined run and later snapshots do not
    /// overwrite earlier ones.
    pub fn resume(self, snapshot: ArchiveExport) -> Result<Self, EvolutionConfigError> {
        let generation = snapshot.generation;
        let archive = GridArchive::from_export(snapshot)
            .map_err(|e| EvolutionConfigError::InvalidArchive(e.to_string()))?;
        let engine = self.with_archive(archive)?;
        log::info!("resuming at generation {}", generation);
        Ok(Self {
            generation,
            ..engine
        })
    }

    /// Get cancellation handle. Cancellation takes effect between generations.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Shared handle for reading the archive from other threads.
    pub fn archive_handle(&self) -> SharedArchive {
        Arc::clone(&self.archive)
    }

    /// Read access to the archive.
    pub fn archive(&self) -> RwLockReadGuard<'_, GridArchive> {
        read(&self.archive)
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    /// Completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Evaluations performed so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Seed the archive with randomly sampled genotypes.
    pub fn initialize(&mut self) {
        self.phase = EvolutionPhase::Initializing;
        let genotypes: Vec<Genotype> = (0..self.config.population.init_size)
            .map(|_| self.rng.random_genotype(&self.config.genotype))
            .collect();

        let evaluated = self.evaluate(genotypes);
        let accepted = self.update(evaluated);
        self.initialized = true;

        log::info!(
            "initialized archive: {} of {} random genotypes accepted",
            accepted,
            self.config.population.init_size
        );
    }

    /// Produce one generation of offspring from archive parents.
    fn generate(&mut self) -> Vec<Genotype> {
        self.phase = EvolutionPhase::Generating;

        let archive = Arc::clone(&self.archive);
        let archive = read(&archive);
        let variation = &self.config.variation;
        let domain = &self.config.genotype.domain;

        (0..self.config.population.size)
            .map(|_| match archive.sample_parent(&mut self.rng) {
                Some(parent) => {
                    let mate = if self.rng.chance(variation.crossover_rate) {
                        archive.sample_parent(&mut self.rng)
                    } else {
                        None
                    };
                    self.rng.offspring(parent, mate, domain, variation)
                }
                // Nothing to select from yet: keep exploring at random.
                None => self.rng.random_genotype(&self.config.genotype),
            })
            .collect()
    }

    /// Evaluate a batch with the configured strategy.
    fn evaluate(&mut self, genotypes: Vec<Genotype>) -> Vec<Individual> {
        self.phase = EvolutionPhase::Evaluating;
        let count = genotypes.len() as u64;
        let evaluated = self.batch.evaluate_batch(&self.evaluator, genotypes);
        self.evaluations += count;
        evaluated
    }

    /// Offer every evaluated individual to the archive.
    fn update(&mut self, evaluated: Vec<Individual>) -> usize {
        self.phase = EvolutionPhase::Updating;

        let dead = evaluated.iter().filter(|i| !i.alive).count();
        let mut archive = write(&self.archive);
        let accepted = evaluated
            .into_iter()
            .map(|individual| archive.insert(individual))
            .filter(|outcome| outcome.accepted)
            .count();
        drop(archive);

        if dead > 0 {
            log::debug!("{} dead individuals in batch", dead);
        }
        self.accepted_last = accepted;
        accepted
    }

    /// Run a single generation step.
    pub fn step_generation(&mut self) {
        let offspring = self.generate();
        let evaluated = self.evaluate(offspring);
        let accepted = self.update(evaluated);
        self.generation += 1;

        let stats = self.archive().stats();
        self.history.archive_size.push(stats.occupied);
        self.history.best_fitness.push(stats.best_fitness);
        self.history.mean_fitness.push(stats.mean_fitness);
        self.history.accepted.push(accepted);

        log::debug!(
            "generation {}: {} accepted, archive {}/{}",
            self.generation,
            accepted,
            stats.occupied,
            stats.capacity
        );

        let period = self.config.population.dump_period;
        if period > 0 && self.generation % period == 0 {
            log::info!(
                "generation {}: archive {} ({:.2}% coverage), best {:.4}, mean {:.4}",
                self.generation,
                stats.occupied,
                stats.coverage * 100.0,
                stats.best_fitness,
                stats.mean_fitness
            );
            if let Err(e) = self.dump() {
                log::warn!("failed to write archive snapshot: {}", e);
            }
        }
    }

    /// Write the archive to `<output_dir>/archive_<generation>.json`.
    ///
    /// Returns `None` when no output directory is configured.
    pub fn dump(&self) -> Result<Option<PathBuf>, ArchiveError> {
        let Some(dir) = &self.config.output_dir else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("archive_{}.json", self.generation));
        let mut snapshot = self.archive().export();
        snapshot.generation = self.generation;
        snapshot.save_json(&path)?;
        Ok(Some(path))
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let stats = self.archive().stats();
        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.population.max_generations,
            evaluations: self.evaluations,
            archive_size: stats.occupied,
            archive_capacity: stats.capacity,
            best_fitness: stats.best_fitness,
            mean_fitness: stats.mean_fitness,
            accepted_last: self.accepted_last,
            phase: self.phase,
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }
        if self.generation >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }
        None
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<F>(&mut self, callback: F) -> EvolutionResult
    where
        F: Fn(&EvolutionProgress),
    {
        let start_time = Instant::now();

        if !self.initialized && !self.cancelled.load(Ordering::Relaxed) {
            self.initialize();
            callback(&self.progress());
        }

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }
            self.step_generation();
            callback(&self.progress());
        };

        self.phase = EvolutionPhase::Terminated;
        if let Err(e) = self.dump() {
            log::warn!("failed to write final archive snapshot: {}", e);
        }
        callback(&self.progress());

        let elapsed = start_time.elapsed().as_secs_f64();
        let archive = self.archive();
        let stats = archive.stats();

        log::info!(
            "stopped after {} generations ({:?}): archive {}/{}, best {:.4}",
            self.generation,
            stop_reason,
            stats.occupied,
            stats.capacity,
            stats.best_fitness
        );

        EvolutionResult {
            best: archive.best().cloned(),
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.evaluations,
                archive_size: stats.occupied,
                coverage: stats.coverage,
                best_fitness: stats.best_fitness,
                elapsed_seconds: elapsed,
                evaluations_per_second: self.evaluations as f64 / elapsed.max(1e-9),
                stop_reason,
            },
            history: self.history.clone(),
        }
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> EvolutionResult {
        self.run_with_callback(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::{DutyCycle, Evaluator};
    use crate::compute::{HexapodSimulator, Observation, SimulationError, Simulator, Trajectory};
    use crate::schema::{
        ArchiveConfig, EvaluationBackend, EvaluationConfig, GeneDomain, GenotypeConfig,
        PopulationConfig, SimulationConfig,
    };

    /// Fitness is the gene mean; descriptor is the first two genes.
    struct PlaneEvaluator;

    impl Evaluate for PlaneEvaluator {
        fn evaluate(&self, genotype: Genotype) -> Individual {
            let genes = genotype.genes();
            let fitness = genes.iter().sum::<f32>() / genes.len() as f32;
            let descriptor = vec![genes[0], genes[1]];
            Individual::alive(genotype, fitness, descriptor)
        }

        fn descriptor_dimensions(&self) -> usize {
            2
        }
    }

    fn plane_config(max_generations: usize) -> EvolutionConfig {
        EvolutionConfig {
            archive: ArchiveConfig::uniform(2, 5),
            genotype: GenotypeConfig {
                length: 4,
                domain: GeneDomain::Continuous { min: 0.0, max: 1.0 },
            },
            population: PopulationConfig {
                size: 20,
                init_size: 20,
                max_generations,
                dump_period: 0,
            },
            evaluation: EvaluationConfig {
                backend: EvaluationBackend::Sequential,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = MapElitesEngine::new(plane_config(5), PlaneEvaluator).unwrap();
        assert_eq!(engine.phase(), EvolutionPhase::Initializing);
        assert!(engine.archive().is_empty());
    }

    #[test]
    fn test_descriptor_mismatch_rejected() {
        let config = EvolutionConfig {
            archive: ArchiveConfig::uniform(3, 5),
            ..plane_config(5)
        };
        assert!(matches!(
            MapElitesEngine::new(config, PlaneEvaluator),
            Err(EvolutionConfigError::DescriptorMismatch {
                archive: 3,
                descriptor: 2
            })
        ));
    }

    #[test]
    fn test_genotype_length_mismatch_rejected() {
        let sim = HexapodSimulator::new(SimulationConfig::default()).unwrap();
        let evaluator = Evaluator::new(sim, DutyCycle::default(), EvaluationConfig::default());
        let config = EvolutionConfig {
            genotype: GenotypeConfig {
                length: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            MapElitesEngine::new(config, evaluator),
            Err(EvolutionConfigError::GenotypeLengthMismatch {
                genotype: 4,
                simulator: 36
            })
        ));
    }

    #[test]
    fn test_run() {
        let mut engine = MapElitesEngine::new(plane_config(10), PlaneEvaluator).unwrap();
        let result = engine.run();

        assert_eq!(result.stats.generations, 10);
        assert_eq!(result.stats.total_evaluations, 20 + 10 * 20);
        for (i, pair) in result.history.archive_size.windows(2).enumerate() {
            // New cells can only come from accepted offspring.
            assert!(pair[1] - pair[0] <= result.history.accepted[i + 1]);
        }
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.history.archive_size.len(), 10);
        assert!(result.stats.archive_size > 0 && result.stats.archive_size <= 25);
        assert_eq!(engine.phase(), EvolutionPhase::Terminated);
    }

    #[test]
    fn test_unseeded_engine_runs() {
        let config = EvolutionConfig {
            random_seed: None,
            ..plane_config(3)
        };
        let result = MapElitesEngine::new(config, PlaneEvaluator).unwrap().run();
        assert_eq!(result.stats.generations, 3);
        assert!(result.history.accepted.iter().all(|&a| a <= 20));
        assert!(result.stats.archive_size > 0);
    }

    #[test]
    fn test_archive_never_regresses() {
        let mut engine = MapElitesEngine::new(plane_config(15), PlaneEvaluator).unwrap();
        let result = engine.run();

        for pair in result.history.archive_size.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        for pair in result.history.best_fitness.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let a = MapElitesEngine::new(plane_config(5), PlaneEvaluator)
            .unwrap()
            .run();
        let b = MapElitesEngine::new(plane_config(5), PlaneEvaluator)
            .unwrap()
            .run();
        assert_eq!(a.history.archive_size, b.history.archive_size);
        assert_eq!(a.history.best_fitness, b.history.best_fitness);
        assert_eq!(a.best, b.best);
    }

    #[test]
    fn test_parallel_backend_matches_sequential() {
        let sequential = MapElitesEngine::new(plane_config(5), PlaneEvaluator)
            .unwrap()
            .run();
        let config = EvolutionConfig {
            evaluation: EvaluationConfig {
                backend: EvaluationBackend::Parallel { threads: Some(3) },
                ..Default::default()
            },
            ..plane_config(5)
        };
        let parallel = MapElitesEngine::new(config, PlaneEvaluator).unwrap().run();
        assert_eq!(sequential.history.archive_size, parallel.history.archive_size);
        assert_eq!(sequential.best, parallel.best);
    }

    #[test]
    fn test_cancellation() {
        let mut engine = MapElitesEngine::new(plane_config(100), PlaneEvaluator).unwrap();
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.store(true, Ordering::Relaxed);

        let result = engine.run();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
    }

    #[test]
    fn test_cancel_from_callback_finishes_generation() {
        let mut engine = MapElitesEngine::new(plane_config(100), PlaneEvaluator).unwrap();
        let cancel = engine.cancel_handle();

        let result = engine.run_with_callback(|progress| {
            if progress.generation >= 3 {
                cancel.store(true, Ordering::Relaxed);
            }
        });
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 3);
    }

    #[test]
    fn test_dead_individuals_do_not_corrupt_archive() {
        /// Every other call fails.
        struct FlakySimulator;

        impl Simulator for FlakySimulator {
            fn simulate(
                &self,
                params: &[f64],
                _duration: f64,
            ) -> Result<Trajectory, SimulationError> {
                if params[0] < 0.5 {
                    return Err(SimulationError::Diverged { time: 0.0 });
                }
                Ok(Trajectory {
                    covered_distance: params.iter().sum(),
                    trace: vec![Observation {
                        time: 0.0,
                        contacts: vec![true, params[1] > 0.5],
                        body_position: [0.0; 3],
                    }],
                })
            }
        }

        let evaluator = Evaluator::new(
            FlakySimulator,
            DutyCycle::new(2),
            EvaluationConfig::default(),
        );
        let mut engine = MapElitesEngine::new(plane_config(5), evaluator).unwrap();
        engine.run();

        let archive = engine.archive();
        for elite in archive.elites() {
            if elite.individual.alive {
                assert!(elite.individual.fitness > -1000.0);
            } else {
                assert_eq!(elite.cell.as_slice(), &[0, 0]);
                assert_eq!(elite.individual.fitness, -1000.0);
            }
        }
    }

    #[test]
    fn test_dump_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvolutionConfig {
            output_dir: Some(dir.path().to_path_buf()),
            population: PopulationConfig {
                dump_period: 2,
                ..plane_config(4).population
            },
            ..plane_config(4)
        };

        let mut engine = MapElitesEngine::new(config.clone(), PlaneEvaluator).unwrap();
        engine.run();
        assert!(dir.path().join("archive_2.json").exists());
        assert!(dir.path().join("archive_4.json").exists());

        let earlier = fs::read_to_string(dir.path().join("archive_2.json")).unwrap();
        let snapshot = ArchiveExport::load_json(dir.path().join("archive_4.json")).unwrap();
        assert_eq!(snapshot.generation, 4);
        let occupied = snapshot.entries.len();

        let config = EvolutionConfig {
            population: PopulationConfig {
                max_generations: 6,
                ..config.population
            },
            ..config
        };
        let mut resumed = MapElitesEngine::new(config, PlaneEvaluator)
            .unwrap()
            .resume(snapshot)
            .unwrap();
        assert_eq!(resumed.generation(), 4);
        let result = resumed.run();

        // Resumed runs skip random initialization and continue the count.
        assert_eq!(result.stats.generations, 6);
        assert_eq!(result.stats.total_evaluations, 2 * 20);
        assert!(result.stats.archive_size >= occupied);
        assert!(dir.path().join("archive_6.json").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("archive_2.json")).unwrap(),
            earlier
        );
    }

    #[test]
    fn test_resume_past_limit_runs_nothing() {
        let mut engine = MapElitesEngine::new(plane_config(3), PlaneEvaluator).unwrap();
        engine.run();
        let mut snapshot = engine.archive().export();
        snapshot.generation = 3;

        let result = MapElitesEngine::new(plane_config(3), PlaneEvaluator)
            .unwrap()
            .resume(snapshot)
            .unwrap()
            .run();
        assert_eq!(result.stats.generations, 3);
        assert_eq!(result.stats.total_evaluations, 0);
    }

    #[test]
    fn test_one_callback_per_generation_then_terminated() {
        let phases = std::sync::Mutex::new(Vec::new());
        let mut engine = MapElitesEngine::new(plane_config(4), PlaneEvaluator).unwrap();
        engine.run_with_callback(|progress| {
            phases
                .lock()
                .unwrap()
                .push((progress.generation, progress.phase));
        });

        let phases = phases.into_inner().unwrap();
        let (last, running) = phases.split_last().unwrap();
        assert_eq!(*last, (4, EvolutionPhase::Terminated));
        let generations: Vec<usize> = running.iter().map(|(g, _)| *g).collect();
        assert_eq!(generations, vec![0, 1, 2, 3, 4]);
        assert!(running.iter().all(|(_, p)| *p != EvolutionPhase::Terminated));
    }

    #[test]
    fn test_resume_rejects_wrong_shape() {
        let engine = MapElitesEngine::new(plane_config(1), PlaneEvaluator).unwrap();
        let other = GridArchive::new(vec![4, 4]).unwrap();
        assert!(matches!(
            engine.with_archive(other),
            Err(EvolutionConfigError::ArchiveShapeMismatch { .. })
        ));
    }
}
