//! netclimb CLI - Run a hill-climbing project from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use log::{error, warn};

use netclimb::{
    compute::evolution::{Capabilities, GenerationController, ManagerState},
    schema::{
        Dataset, DatasetError, DatasetProvider, EvolutionPhase, JsonDatasetProvider,
        ProjectConfig, StopReason, SyntheticDataset,
    },
    storage::StorageLayout,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <project.json> [dataset.json]", args[0]);
        eprintln!();
        eprintln!("Run a resumable hill-climbing search over neural networks.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  project.json  Path to project configuration file");
        eprintln!("  dataset.json  Labeled samples (default: synthetic clusters)");
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

    let mut config: ProjectConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    // Resume from the project's own save state unless told otherwise
    if config.resume_from.is_none() {
        let layout = StorageLayout::new(&config.model_location, &config.project_name);
        config.resume_from = Some(layout.state_path());
    }

    let dataset = load_dataset(args.get(2), &config).unwrap_or_else(|e| {
        eprintln!("Error loading dataset: {}", e);
        std::process::exit(1);
    });
    if dataset.input_size() != config.input_size {
        warn!(
            "Dataset samples have {} features but the network expects {}",
            dataset.input_size(),
            config.input_size
        );
    }
    let split = dataset.split(config.train_split);

    println!("netclimb");
    println!("========");
    println!("Project: {}", config.project_name);
    println!(
        "Network: {} -> {:?} -> {}",
        config.input_size, config.hidden_layers, config.output_size
    );
    println!(
        "Population: {} (keeping {})",
        config.population_size, config.retention
    );
    println!(
        "Samples: {} train, {} validation",
        split.train.len(),
        split.validation.len()
    );
    println!();

    let final_generation = config.generations;
    let state = ManagerState::init(config).unwrap_or_else(|e| {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    if state.resumed {
        println!("Resuming at generation {}", state.history.current_generation);
    }

    let mut controller = GenerationController::new(state, Capabilities::dense());
    if !split.validation.is_empty() {
        controller = controller.with_validation(split.validation);
    }

    let summary = controller
        .run_with_callback(final_generation, &split.train, |progress| {
            if let Some(best) = progress.generation_best
                && progress.phase == EvolutionPhase::Checkpointed
            {
                println!(
                    "  Generation {}/{}: best={:.4}, overall={:.4}",
                    progress.generation + 1,
                    progress.final_generation,
                    best,
                    progress.best_fitness.unwrap_or(best)
                );
            }
        })
        .unwrap_or_else(|e| {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    println!();
    match summary.stop_reason {
        StopReason::Completed => println!("Completed."),
        StopReason::Cancelled => println!("Cancelled."),
    }
    println!(
        "Generations: {} (next: {})",
        summary.generations_completed, summary.next_generation
    );
    println!("Evaluations: {}", summary.evaluations);
    if let Some(best) = &summary.best {
        println!("Best model: {} ({:.4})", best.model_name, best.accuracy);
    }
    println!("Time: {:.2}s", summary.elapsed_seconds);
}

fn load_dataset(
    path: Option<&String>,
    config: &ProjectConfig,
) -> Result<Dataset, DatasetError> {
    match path {
        Some(path) => JsonDatasetProvider::new(path).with_scale(255.0).load(),
        None => SyntheticDataset {
            classes: config.output_size,
            features: config.input_size,
            ..Default::default()
        }
        .load(),
    }
}

fn print_example_config() {
    let config = ProjectConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example config: {}", e),
    }
}
