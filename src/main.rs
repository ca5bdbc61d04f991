//! Hexapod Elites CLI - Run a MAP-Elites search from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use hexapod_elites::{
    compute::{
        HexapodSimulator,
        evolution::{ArchiveExport, DutyCycle, Evaluator, MapElitesEngine},
    },
    schema::{EvolutionConfig, EvolutionPhase},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [resume.json]", args[0]);
        eprintln!();
        eprintln!("Run a MAP-Elites gait search from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to evolution configuration file");
        eprintln!("  resume.json  Archive snapshot to continue from (optional)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: EvolutionConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let simulator = HexapodSimulator::new(config.simulation.clone()).unwrap_or_else(|e| {
        eprintln!("Invalid simulation config: {}", e);
        std::process::exit(1);
    });
    let extractor = DutyCycle::new(config.simulation.leg_count);
    let evaluator = Evaluator::new(simulator, extractor, config.evaluation.clone());

    println!("Hexapod Elites");
    println!("==============");
    match config.archive.cells() {
        Some(cells) => println!("Archive: {:?} ({} cells)", config.archive.shape, cells),
        None => println!("Archive: {:?}", config.archive.shape),
    }
    println!(
        "Genotype: {} genes, {:?}",
        config.genotype.length, config.genotype.domain
    );
    println!(
        "Population: {} per generation, {} initial",
        config.population.size, config.population.init_size
    );
    println!("Generations: {}", config.population.max_generations);
    println!("Backend: {:?}", config.evaluation.backend);
    println!();

    let output_dir = config.output_dir.clone();
    let total = config.population.max_generations;

    let mut engine = MapElitesEngine::new(config, evaluator).unwrap_or_else(|e| {
        eprintln!("Invalid evolution config: {}", e);
        std::process::exit(1);
    });

    if let Some(resume) = args.get(2) {
        let snapshot = ArchiveExport::load_json(resume).unwrap_or_else(|e| {
            eprintln!("Error loading archive {}: {}", resume, e);
            std::process::exit(1);
        });
        println!(
            "Resuming from {} ({} elites, generation {})",
            resume,
            snapshot.entries.len(),
            snapshot.generation
        );
        engine = engine.resume(snapshot).unwrap_or_else(|e| {
            eprintln!("Archive does not fit configuration: {}", e);
            std::process::exit(1);
        });
    }

    // Run search
    println!("Running search...");
    let start = Instant::now();
    let report_every = (total / 10).max(1);

    let result = engine.run_with_callback(|progress| {
        if progress.phase != EvolutionPhase::Terminated
            && progress.generation > 0
            && progress.generation % report_every == 0
        {
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "  Generation {}/{}: {} elites, best={:.4}, mean={:.4}, {:.1} evals/s",
                progress.generation,
                progress.total_generations,
                progress.archive_size,
                progress.best_fitness,
                progress.mean_fitness,
                progress.evaluations as f64 / elapsed.max(1e-9)
            );
        }
    });

    println!();
    println!("Final archive:");
    println!(
        "  Elites: {} ({:.2}% coverage)",
        result.stats.archive_size,
        result.stats.coverage * 100.0
    );
    println!("  Best fitness: {:.4}", result.stats.best_fitness);
    println!("  Generations: {}", result.stats.generations);
    println!("  Stop reason: {:?}", result.stats.stop_reason);
    println!(
        "Time: {:.2}s ({:.1} evals/s)",
        result.stats.elapsed_seconds, result.stats.evaluations_per_second
    );

    if let Some(dir) = output_dir {
        let path = dir.join("archive_final.dat");
        match engine.archive().save_text(&path) {
            Ok(()) => println!("Archive written to {}", path.display()),
            Err(e) => eprintln!("Error writing archive: {}", e),
        }
    }
}

fn print_example_config() {
    let config = EvolutionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
