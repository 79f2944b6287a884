//! Benchmarking and experimentation module.
//!
//! Runs batches of independent, seeded GA runs on one instance for one or
//! more evaluation budgets, aggregates the best distances, and exports the
//! results.

use crate::error::TspResult;
use crate::heuristics::genetic::{GAConfig, GeneticAlgorithm};
use crate::instance::DistanceModel;
use crate::rng::RngHandle;
use crate::stats::RunStatistics;

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Result of a single GA run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Instance name
    pub instance: String,
    /// Evaluation budget of the run
    pub max_evaluations: usize,
    /// Run number, starting at 1
    pub run: usize,
    /// Seed of the run's random stream
    pub seed: u64,
    /// Best tour distance
    pub distance: f64,
    /// Evaluations actually consumed
    pub evaluations: usize,
    /// Generations completed
    pub generations: usize,
    /// Computation time in seconds
    pub time: f64,
}

/// Aggregated statistics for one evaluation budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStatistics {
    pub max_evaluations: usize,
    pub runs: usize,
    pub min_distance: f64,
    pub avg_distance: f64,
    pub std_distance: f64,
    pub avg_evaluations: f64,
    pub avg_time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of runs per budget
    pub runs: usize,
    /// Evaluation budgets to test
    pub budgets: Vec<usize>,
    /// Base seed; run `r` uses `seed + r - 1`
    pub seed: u64,
    /// GA parameters shared by every run
    pub ga: GAConfig,
    /// Run the batch on the rayon thread pool
    pub parallel: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            runs: 30,
            budgets: vec![100],
            seed: 123,
            ga: GAConfig::default(),
            parallel: false,
        }
    }
}

impl BenchmarkConfig {
    /// Total number of runs a full benchmark performs
    pub fn total_runs(&self) -> usize {
        self.runs * self.budgets.len()
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunRecord>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> TspResult<Self> {
        config.ga.validate()?;
        Ok(Benchmark {
            config,
            results: Vec::new(),
        })
    }

    /// Run every configured budget on `model`
    pub fn run_instance(&mut self, model: &DistanceModel, progress: &ProgressBar) -> TspResult<()> {
        log::info!(
            "Running benchmark on instance: {} ({} runs x {} budgets)",
            model.name,
            self.config.runs,
            self.config.budgets.len()
        );

        for budget in self.config.budgets.clone() {
            let records = self.run_budget(model, budget, progress)?;
            if let Some(stats) = Self::aggregate(budget, &records) {
                log::info!(
                    "budget {}: min {:.2} avg {:.2} std {:.2}",
                    budget,
                    stats.min_distance,
                    stats.avg_distance,
                    stats.std_distance
                );
            }
            self.results.extend(records);
        }

        Ok(())
    }

    fn run_budget(&self, model: &DistanceModel, budget: usize, progress: &ProgressBar) -> TspResult<Vec<RunRecord>> {
        let ga = self.config.ga;
        let base_seed = self.config.seed;
        let single = |run: usize| {
            let record = run_single(model, ga, budget, run, base_seed.wrapping_add(run as u64 - 1));
            progress.inc(1);
            record
        };

        if self.config.parallel {
            (1..=self.config.runs).into_par_iter().map(single).collect()
        } else {
            (1..=self.config.runs).map(single).collect()
        }
    }

    /// Compute statistics for each budget
    pub fn statistics(&self) -> Vec<BudgetStatistics> {
        let mut by_budget: BTreeMap<usize, Vec<RunRecord>> = BTreeMap::new();
        for record in &self.results {
            by_budget
                .entry(record.max_evaluations)
                .or_default()
                .push(record.clone());
        }

        by_budget
            .into_iter()
            .filter_map(|(budget, records)| Self::aggregate(budget, &records))
            .collect()
    }

    fn aggregate(budget: usize, records: &[RunRecord]) -> Option<BudgetStatistics> {
        if records.is_empty() {
            return None;
        }

        let distances: Vec<f64> = records.iter().map(|r| r.distance).collect();
        let summary = RunStatistics::from_values(&distances);
        let n = records.len() as f64;

        Some(BudgetStatistics {
            max_evaluations: budget,
            runs: records.len(),
            min_distance: summary.min,
            avg_distance: summary.mean,
            std_distance: summary.std_dev,
            avg_evaluations: records.iter().map(|r| r.evaluations as f64).sum::<f64>() / n,
            avg_time: records.iter().map(|r| r.time).sum::<f64>() / n,
        })
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> TspResult<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> TspResult<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("        TSP GA Benchmark Report\n");
        report.push_str("========================================\n\n");

        let ga = &self.config.ga;
        report.push_str(&format!(
            "Population: {}  Crossover: {}  Mutation: {}  Seed: {}\n\n",
            ga.population_size, ga.crossover_chance, ga.mutation_chance, self.config.seed
        ));

        report.push_str(&format!(
            "{:<12} {:>6} {:>12} {:>12} {:>12} {:>14} {:>10}\n",
            "Budget", "Runs", "MIN", "AVG", "STD", "Avg Evals", "Avg Time"
        ));
        report.push_str("-".repeat(84).as_str());
        report.push('\n');

        for stat in self.statistics() {
            report.push_str(&format!(
                "{:<12} {:>6} {:>12.2} {:>12.2} {:>12.2} {:>14.1} {:>10.4}\n",
                stat.max_evaluations,
                stat.runs,
                stat.min_distance,
                stat.avg_distance,
                stat.std_distance,
                stat.avg_evaluations,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(84).as_str());
        report.push('\n');

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunRecord] {
        &self.results
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }
}

/// One independent run on a private copy of `model` with its own random stream.
pub fn run_single(model: &DistanceModel, ga: GAConfig, budget: usize, run: usize, seed: u64) -> TspResult<RunRecord> {
    let rng = RngHandle::seeded(seed);
    let mut model = model
        .clone()
        .with_rng(rng.clone())
        .with_max_evaluations(budget);
    model.reset_evaluations();

    let mut engine = GeneticAlgorithm::new(ga, rng)?;
    let start = std::time::Instant::now();
    let best = engine.run(&mut model);

    Ok(RunRecord {
        instance: model.name.clone(),
        max_evaluations: budget,
        run,
        seed,
        distance: best.distance(),
        evaluations: model.evaluations(),
        generations: engine.current_generation(),
        time: start.elapsed().as_secs_f64(),
    })
}
