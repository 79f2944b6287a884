//! Heuristics module for the TSP.
//!
//! This module exports the genetic algorithm and the construction baseline.

pub mod construction;
pub mod genetic;

pub use construction::*;
pub use genetic::*;
