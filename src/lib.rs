//! TSP GA Solver Library
//!
//! Solves the Traveling Salesman Problem over TSP-LIB style instances with a
//! generational genetic algorithm bounded by an evaluation budget.
//!
//! # Features
//!
//! - `EXPLICIT` and `EUC_2D` instance loading, optionally restricted to a subset of cities
//! - Genetic algorithm with elitism, binary tournaments, PMX crossover and swap mutation
//! - Reproducible runs through an injectable, seedable random stream
//! - Nearest Neighbor baseline
//! - Batch experiments with CSV export and summary statistics
//!
//! # Example
//!
//! ```no_run
//! use tsp_ga_solver::instance::load_instance;
//! use tsp_ga_solver::heuristics::genetic::run_search;
//! use tsp_ga_solver::rng::RngHandle;
//!
//! // Load three locations of an instance
//! let mut model = load_instance("locations.tsp", Some(&[1, 4, 7]))
//!     .unwrap()
//!     .with_rng(RngHandle::seeded(123))
//!     .with_max_evaluations(10_000);
//!
//! let best = run_search(&mut model, 100, 0.8, 0.1).unwrap();
//! println!("Tour: {} ({:.2})", best, best.distance());
//! ```

pub mod error;
pub mod rng;
pub mod instance;
pub mod tour;
pub mod heuristics;
pub mod stats;
pub mod benchmark;

pub use error::{TspError, TspResult};
pub use instance::{load_instance, City, DistanceModel};
pub use tour::Tour;
pub use heuristics::genetic::{run_search, GAConfig, GeneticAlgorithm};
