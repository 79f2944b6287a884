//! Tour (chromosome) representation.
//!
//! A tour owns its cities by value, so cloning a tour never aliases another
//! tour's path and operators can overwrite slots freely.

use crate::instance::City;
use serde::Serialize;
use std::collections::HashSet;

/// One candidate closed route: a permutation of all active cities plus its cost.
#[derive(Debug, Clone, Serialize)]
pub struct Tour {
    path: Vec<City>,
    /// Total cycle distance, `f64::INFINITY` while not evaluated
    distance: f64,
    dimension: usize,
}

impl Tour {
    /// Create an empty tour filled with placeholder cities.
    pub fn new(dimension: usize) -> Self {
        Tour {
            path: vec![City::placeholder(); dimension],
            distance: f64::INFINITY,
            dimension,
        }
    }

    /// Create an unevaluated tour from a path.
    pub fn from_path(path: Vec<City>) -> Self {
        let dimension = path.len();
        Tour {
            path,
            distance: f64::INFINITY,
            dimension,
        }
    }

    pub fn path(&self) -> &[City] {
        &self.path
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Cached cycle distance; `f64::INFINITY` until the model evaluates the tour.
    ///
    /// An evaluated cost is always finite: models reject non-finite weights
    /// and coordinates, so `INFINITY` only ever means "not evaluated".
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Distance if the tour has been evaluated since its last modification.
    pub fn evaluated_distance(&self) -> Option<f64> {
        self.is_evaluated().then_some(self.distance)
    }

    pub fn is_evaluated(&self) -> bool {
        self.distance.is_finite()
    }

    pub(crate) fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }

    /// Place `city` at `index` and invalidate the cached distance.
    pub fn set_city(&mut self, index: usize, city: City) {
        self.path[index] = city;
        self.distance = f64::INFINITY;
    }

    /// Exchange the cities at two positions.
    pub fn swap_cities(&mut self, i: usize, j: usize) {
        let first = self.path[i];
        let second = self.path[j];
        self.set_city(i, second);
        self.set_city(j, first);
    }

    /// City indices in visiting order.
    pub fn city_indices(&self) -> Vec<usize> {
        self.path.iter().map(|c| c.index).collect()
    }

    /// Coordinates in visiting order, as consumed by route renderers.
    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        self.path.iter().map(|c| (c.x, c.y)).collect()
    }

    /// Check that the path visits every index in `1..=n` exactly once.
    pub fn is_permutation_of(&self, n: usize) -> bool {
        if self.path.len() != n {
            return false;
        }
        let unique: HashSet<usize> = self.path.iter().map(|c| c.index).collect();
        unique.len() == n && unique.iter().all(|&i| (1..=n).contains(&i))
    }
}

impl std::fmt::Display for Tour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let indices: Vec<String> = self.path.iter().map(|c| c.index.to_string()).collect();
        if self.is_evaluated() {
            write!(f, "[{}] ({:.2})", indices.join(" "), self.distance)
        } else {
            write!(f, "[{}] (not evaluated)", indices.join(" "))
        }
    }
}
