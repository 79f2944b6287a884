//! TSP GA Solver - Command Line Interface
//!
//! Solves TSP-LIB style instances with a budgeted genetic algorithm.

use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use serde::Serialize;
use tsp_ga_solver::benchmark::{Benchmark, BenchmarkConfig};
use tsp_ga_solver::heuristics::construction::{ConstructionHeuristic, NearestNeighborHeuristic};
use tsp_ga_solver::heuristics::genetic::{GAConfig, GeneticAlgorithm};
use tsp_ga_solver::instance::{load_instance, DistanceModel, DEFAULT_MAX_EVALUATIONS};
use tsp_ga_solver::rng::RngHandle;
use tsp_ga_solver::TspError;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "tsp-ga-solver")]
#[command(version = "1.0")]
#[command(about = "A genetic algorithm solver for the Traveling Salesman Problem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance once
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        /// Only route through these 1-based city indices (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        cities: Option<Vec<usize>>,

        /// Population size
        #[arg(short, long, default_value = "100")]
        population: usize,

        /// Crossover probability
        #[arg(long, default_value = "0.8")]
        crossover: f64,

        /// Mutation probability
        #[arg(long, default_value = "0.1")]
        mutation: f64,

        /// Evaluation budget
        #[arg(short = 'e', long, default_value_t = DEFAULT_MAX_EVALUATIONS)]
        max_evaluations: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Output route to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run repeated seeded searches and report statistics
    Benchmark {
        #[arg(short, long)]
        instance: PathBuf,

        /// Only route through these 1-based city indices (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        cities: Option<Vec<usize>>,

        /// Number of runs per budget
        #[arg(short, long, default_value = "30")]
        runs: usize,

        /// Evaluation budgets (comma separated)
        #[arg(short, long, value_delimiter = ',', default_value = "100")]
        budgets: Vec<usize>,

        /// Population size
        #[arg(short, long, default_value = "100")]
        population: usize,

        /// Crossover probability
        #[arg(long, default_value = "0.8")]
        crossover: f64,

        /// Mutation probability
        #[arg(long, default_value = "0.1")]
        mutation: f64,

        /// Base random seed
        #[arg(short, long, default_value = "123")]
        seed: u64,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Run the batch on all cores
        #[arg(long)]
        parallel: bool,
    },

    /// Analyze an instance
    Analyze {
        #[arg(short, long)]
        instance: PathBuf,

        /// Only consider these 1-based city indices (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        cities: Option<Vec<usize>>,
    },
}

/// One stop of a solved route, as handed to route renderers
#[derive(Serialize)]
struct RouteStop {
    index: usize,
    source_index: Option<usize>,
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct RouteOutput {
    instance: String,
    distance: f64,
    evaluations: usize,
    generations: usize,
    seed: u64,
    config: GAConfig,
    start: RouteStop,
    route: Vec<RouteStop>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve { instance, cities, population, crossover, mutation, max_evaluations, seed, output, verbose } => {
            let config = GAConfig {
                population_size: population,
                crossover_chance: crossover,
                mutation_chance: mutation,
            };
            solve_instance(&instance, cities.as_deref(), config, max_evaluations, seed, output, verbose)
        }

        Commands::Benchmark { instance, cities, runs, budgets, population, crossover, mutation, seed, output, parallel } => {
            let config = BenchmarkConfig {
                runs,
                budgets,
                seed,
                ga: GAConfig {
                    population_size: population,
                    crossover_chance: crossover,
                    mutation_chance: mutation,
                },
                parallel,
            };
            run_benchmark(&instance, cities.as_deref(), config, &output)
        }

        Commands::Analyze { instance, cities } => analyze_instance(&instance, cities.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn load(path: &Path, cities: Option<&[usize]>) -> Result<DistanceModel, TspError> {
    println!("Loading instance from {:?}...", path);
    load_instance(path, cities)
}

fn stop(model: &DistanceModel, city: &tsp_ga_solver::City) -> RouteStop {
    RouteStop {
        index: city.index,
        source_index: model.source_index(city.index),
        x: city.x,
        y: city.y,
    }
}

fn solve_instance(
    path: &Path,
    cities: Option<&[usize]>,
    config: GAConfig,
    max_evaluations: usize,
    seed: u64,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<(), TspError> {
    let rng = RngHandle::seeded(seed);
    let mut model = load(path, cities)?
        .with_rng(rng.clone())
        .with_max_evaluations(max_evaluations);

    if verbose {
        println!("{}", model.statistics());
    }

    let mut ga = GeneticAlgorithm::new(config, rng)?;

    println!("Solving with population {} and budget {}...", config.population_size, max_evaluations);
    let start = Instant::now();
    let best = ga.run(&mut model);
    let elapsed = start.elapsed();

    println!("\n========== Results ==========");
    println!("Distance: {:.2}", best.distance());
    println!("Evaluations: {}", model.evaluations());
    println!("Generations: {}", ga.current_generation());
    println!("Time: {:.4}s", elapsed.as_secs_f64());

    if verbose {
        let route: Vec<String> = best
            .path()
            .iter()
            .map(|c| model.source_index(c.index).unwrap_or(c.index).to_string())
            .collect();
        let start_city = model.start();
        println!(
            "\nRoute (source indices): {} -> {} -> {}",
            model.source_index(start_city.index).unwrap_or(start_city.index),
            route.join(" -> "),
            model.source_index(start_city.index).unwrap_or(start_city.index)
        );
    }

    if let Some(out_path) = output {
        let route = RouteOutput {
            instance: model.name.clone(),
            distance: best.distance(),
            evaluations: model.evaluations(),
            generations: ga.current_generation(),
            seed,
            config,
            start: stop(&model, &model.start()),
            route: best.path().iter().map(|c| stop(&model, c)).collect(),
        };
        let json = serde_json::to_string_pretty(&route)?;
        std::fs::write(&out_path, json)?;
        println!("\nRoute saved to {:?}", out_path);
    }

    Ok(())
}

fn run_benchmark(
    path: &Path,
    cities: Option<&[usize]>,
    config: BenchmarkConfig,
    output: &Path,
) -> Result<(), TspError> {
    let model = load(path, cities)?;
    std::fs::create_dir_all(output)?;

    println!(
        "Running {} runs on {} (n={})...",
        config.total_runs(),
        model.name,
        model.num_cities()
    );

    let progress = ProgressBar::new(config.total_runs() as u64);
    let mut benchmark = Benchmark::new(config)?;
    benchmark.run_instance(&model, &progress)?;
    progress.finish_and_clear();

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("Results exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn analyze_instance(path: &Path, cities: Option<&[usize]>) -> Result<(), TspError> {
    let mut model = load(path, cities)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", model.statistics());

    let nn = NearestNeighborHeuristic::new();
    let mut tour = nn.construct(&model);
    let distance = model.evaluate(&mut tour);

    println!("Quick Solution Estimate:");
    println!("  {}: {:.2}", nn.name(), distance);

    Ok(())
}
