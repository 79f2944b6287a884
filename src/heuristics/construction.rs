use crate::instance::{City, DistanceModel};
use crate::tour::Tour;
use ordered_float::OrderedFloat;

pub trait ConstructionHeuristic {
    /// Build an unevaluated tour over every active city of `model`.
    fn construct(&self, model: &DistanceModel) -> Tour;
    fn name(&self) -> &str;
}

/// Nearest Neighbor Heuristic
///
/// Starts at the model's start city and repeatedly moves to the closest
/// unvisited city. Ties go to the lower index. Used as a baseline for the GA.
#[derive(Debug, Clone, Default)]
pub struct NearestNeighborHeuristic;

impl NearestNeighborHeuristic {
    pub fn new() -> Self {
        NearestNeighborHeuristic
    }

    fn find_nearest(&self, model: &DistanceModel, current: &City, visited: &[bool]) -> Option<City> {
        model
            .cities()
            .iter()
            .filter(|c| !visited[c.index - 1])
            .min_by_key(|c| (OrderedFloat(model.distance(current, c)), c.index))
            .copied()
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, model: &DistanceModel) -> Tour {
        let n = model.num_cities();
        let mut visited = vec![false; n];
        let mut path = Vec::with_capacity(n);

        let mut current = model.start();
        visited[current.index - 1] = true;
        path.push(current);

        while let Some(next) = self.find_nearest(model, &current, &visited) {
            visited[next.index - 1] = true;
            path.push(next);
            current = next;
        }

        Tour::from_path(path)
    }

    fn name(&self) -> &str {
        "NearestNeighbor"
    }
}
