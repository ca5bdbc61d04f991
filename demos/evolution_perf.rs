//! Quick evolution performance test

use hexapod_elites::{
    EvolutionConfig, MapElitesEngine,
    compute::{
        HexapodSimulator,
        evolution::{DutyCycle, Evaluator},
    },
    schema::{EvaluationBackend, EvaluationConfig, PopulationConfig},
};
use std::time::Instant;

fn run(config: EvolutionConfig) {
    let simulator = HexapodSimulator::new(config.simulation.clone()).unwrap();
    let evaluator = Evaluator::new(simulator, DutyCycle::default(), config.evaluation.clone());

    let start = Instant::now();
    let mut engine = MapElitesEngine::new(config, evaluator).unwrap();
    let result = engine.run();
    let elapsed = start.elapsed();

    let total_evals = result.stats.total_evaluations;
    let evals_per_sec = total_evals as f64 / elapsed.as_secs_f64();

    println!("  Generations:    {}", result.stats.generations);
    println!("  Evaluations:    {}", total_evals);
    println!("  Elapsed:        {:.2}s", elapsed.as_secs_f64());
    println!("  Evals/sec:      {:.1}", evals_per_sec);
    println!("  Elites:         {}", result.stats.archive_size);
    println!("  Best fitness:   {:.4}", result.stats.best_fitness);
    println!();
}

fn main() {
    println!("=== Evolution Performance Test ===\n");

    for backend in [
        EvaluationBackend::Sequential,
        EvaluationBackend::Parallel { threads: None },
    ] {
        println!("Backend: {:?}", backend);

        run(EvolutionConfig {
            population: PopulationConfig {
                size: 64,
                init_size: 64,
                max_generations: 10,
                dump_period: 0,
            },
            evaluation: EvaluationConfig {
                duration: 3.0,
                backend,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        });
    }

    println!("=== Scalability Test (parallel backend) ===\n");

    for pop_size in [16, 32, 64, 128] {
        println!("Population: {}", pop_size);

        run(EvolutionConfig {
            population: PopulationConfig {
                size: pop_size,
                init_size: pop_size,
                max_generations: 5,
                dump_period: 0,
            },
            evaluation: EvaluationConfig {
                duration: 3.0,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        });
    }
}
