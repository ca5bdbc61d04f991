//! Batch evaluation strategies.
//!
//! The engine hands each generation's offspring to a [`BatchEvaluator`].
//! Evaluations are independent, so the only contract is that the output has
//! one individual per input genotype, in input order.

use rayon::prelude::*;

use crate::schema::{EvaluationBackend, EvolutionConfigError, Genotype, Individual};

use super::fitness::Evaluate;

/// Evaluates a whole generation.
pub trait BatchEvaluator: Send + Sync {
    /// Evaluate every genotype; result `i` belongs to genotype `i`.
    fn evaluate_batch(&self, evaluator: &dyn Evaluate, genotypes: Vec<Genotype>)
    -> Vec<Individual>;
}

/// Evaluates one genotype after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialEvaluator;

impl BatchEvaluator for SequentialEvaluator {
    fn evaluate_batch(
        &self,
        evaluator: &dyn Evaluate,
        genotypes: Vec<Genotype>,
    ) -> Vec<Individual> {
        genotypes.into_iter().map(|g| evaluator.evaluate(g)).collect()
    }
}

/// Evaluates genotypes on a rayon worker pool.
#[derive(Debug, Default)]
pub struct ParallelEvaluator {
    /// Dedicated pool; `None` uses the global rayon pool.
    pool: Option<rayon::ThreadPool>,
}

impl ParallelEvaluator {
    /// Use the global rayon pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Use a dedicated pool with `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("evaluator-{}", i))
            .build()?;
        Ok(Self { pool: Some(pool) })
    }
}

impl BatchEvaluator for ParallelEvaluator {
    fn evaluate_batch(
        &self,
        evaluator: &dyn Evaluate,
        genotypes: Vec<Genotype>,
    ) -> Vec<Individual> {
        let run = || -> Vec<Individual> {
            genotypes
                .into_par_iter()
                .map(|g| evaluator.evaluate(g))
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

/// Build the batch evaluator selected in configuration.
pub fn batch_evaluator(
    backend: &EvaluationBackend,
) -> Result<Box<dyn BatchEvaluator>, EvolutionConfigError> {
    let evaluator: Box<dyn BatchEvaluator> = match backend {
        EvaluationBackend::Sequential => Box::new(SequentialEvaluator),
        EvaluationBackend::Parallel { threads: None } => Box::new(ParallelEvaluator::new()),
        EvaluationBackend::Parallel {
            threads: Some(threads),
        } => Box::new(ParallelEvaluator::with_threads(*threads)?),
    };
    Ok(evaluator)
}
