//! Genetic Algorithm for the TSP.
//!
//! A generational GA with:
//! - Elitism (the best tour of a generation is always carried over)
//! - Binary tournament selection
//! - Partially Mapped Crossover (PMX)
//! - Swap mutation
//!
//! The search stops on the evaluation budget of the [`DistanceModel`]. The
//! budget is only checked between generations, so a run may overshoot it by
//! less than one population.

use crate::error::{TspError, TspResult};
use crate::instance::{City, DistanceModel};
use crate::rng::RngHandle;
use crate::tour::Tour;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Genetic Algorithm configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GAConfig {
    /// Population size
    pub population_size: usize,
    /// Probability that two selected parents are recombined
    pub crossover_chance: f64,
    /// Probability that an offspring is mutated
    pub mutation_chance: f64,
}

impl Default for GAConfig {
    fn default() -> Self {
        GAConfig {
            population_size: 100,
            crossover_chance: 0.8,
            mutation_chance: 0.1,
        }
    }
}

impl GAConfig {
    pub fn validate(&self) -> TspResult<()> {
        if self.population_size == 0 {
            return Err(TspError::InvalidParameter {
                name: "population_size",
                reason: "must be at least 1".to_string(),
            });
        }
        for (name, chance) in [
            ("crossover_chance", self.crossover_chance),
            ("mutation_chance", self.mutation_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(TspError::InvalidParameter {
                    name,
                    reason: format!("{} is not a probability", chance),
                });
            }
        }
        Ok(())
    }
}

/// Where a [`GeneticAlgorithm`] is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    GenerationLoop,
    Terminated,
}

/// Genetic Algorithm implementation
pub struct GeneticAlgorithm {
    config: GAConfig,
    rng: RngHandle,
    population: Vec<Tour>,
    offspring: Vec<Tour>,
    best: Tour,
    generation: usize,
    phase: Phase,
}

impl GeneticAlgorithm {
    pub fn new(config: GAConfig, rng: RngHandle) -> TspResult<Self> {
        config.validate()?;

        Ok(GeneticAlgorithm {
            config,
            rng,
            population: Vec::with_capacity(config.population_size),
            offspring: Vec::with_capacity(config.population_size),
            best: Tour::new(0),
            generation: 0,
            phase: Phase::Init,
        })
    }

    /// Engine drawing from the same random stream as `model`.
    pub fn for_model(config: GAConfig, model: &DistanceModel) -> TspResult<Self> {
        Self::new(config, model.rng().clone())
    }

    /// Fill the population with evaluated random tours
    fn initialize_population(&mut self, model: &mut DistanceModel) {
        self.population.clear();
        self.offspring.clear();
        self.generation = 0;
        self.best = Tour::new(model.num_cities());

        for _ in 0..self.config.population_size {
            let mut tour = model.generate_tour();
            model.evaluate(&mut tour);
            if tour.distance() < self.best.distance() {
                self.best = tour.clone();
            }
            self.population.push(tour);
        }

        self.phase = Phase::GenerationLoop;
        log::debug!(
            "[GA] Initialized population: {} (best {:.3})",
            self.population.len(),
            self.best.distance()
        );
    }

    /// Best tour of the current population; the first one wins ties.
    fn population_best(&self) -> &Tour {
        let mut best = &self.population[0];
        for tour in &self.population[1..] {
            if tour.distance() < best.distance() {
                best = tour;
            }
        }
        best
    }

    /// Binary tournament selection
    fn tournament_select(&self) -> Tour {
        let len = self.population.len();
        let (first, mut second) = self
            .rng
            .with(|rng| (rng.gen_range(0..len), rng.gen_range(0..len)));
        if first == second {
            second = (second + 1) % len;
        }

        if self.population[first].distance() < self.population[second].distance() {
            self.population[first].clone()
        } else {
            self.population[second].clone()
        }
    }

    /// Push into the offspring buffer unless it is already full
    fn push_offspring(&mut self, tour: Tour) {
        if self.offspring.len() < self.config.population_size {
            self.offspring.push(tour);
        }
    }

    /// Create new generation
    fn evolve(&mut self, model: &mut DistanceModel) {
        let elite = self.population_best().clone();
        self.offspring.push(elite);

        while self.offspring.len() < self.config.population_size {
            let parent1 = self.tournament_select();
            let parent2 = self.tournament_select();

            let recombine = self.rng.with(|rng| rng.gen::<f64>() < self.config.crossover_chance);
            if recombine {
                let (child1, child2) = self.rng.with(|rng| pmx_crossover(&parent1, &parent2, rng));
                self.push_offspring(child1);
                self.push_offspring(child2);
            } else {
                self.push_offspring(parent1);
                self.push_offspring(parent2);
            }
        }

        for member in self.offspring.iter_mut() {
            self.rng.with(|rng| {
                if rng.gen::<f64>() < self.config.mutation_chance {
                    swap_mutation(member, rng);
                }
            });

            model.evaluate(member);
            if member.distance() < self.best.distance() {
                self.best = member.clone();
            }
        }

        self.population = std::mem::take(&mut self.offspring);
        self.offspring = Vec::with_capacity(self.config.population_size);
        self.generation += 1;
    }

    /// Run the genetic algorithm until the model's evaluation budget is spent
    pub fn run(&mut self, model: &mut DistanceModel) -> Tour {
        let start = std::time::Instant::now();
        log::info!(
            "[GA] {} cities, population {}, crossover {}, mutation {}, budget {}",
            model.num_cities(),
            self.config.population_size,
            self.config.crossover_chance,
            self.config.mutation_chance,
            model.max_evaluations()
        );

        self.initialize_population(model);

        while !model.budget_exhausted() {
            self.evolve(model);
            log::debug!(
                "[GA] Gen {}  Best {:.3}  Evaluations {}/{}",
                self.generation,
                self.best.distance(),
                model.evaluations(),
                model.max_evaluations()
            );
        }

        self.phase = Phase::Terminated;
        log::info!(
            "[GA] Finished after {} generations, {} evaluations, best {:.3}, elapsed {:.2}s",
            self.generation,
            model.evaluations(),
            self.best.distance(),
            start.elapsed().as_secs_f64()
        );

        self.best.clone()
    }

    /// Best tour evaluated so far
    pub fn best(&self) -> &Tour {
        &self.best
    }

    pub fn population(&self) -> &[Tour] {
        &self.population
    }

    /// Get current generation
    pub fn current_generation(&self) -> usize {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &GAConfig {
        &self.config
    }
}

/// Run one complete search on `model` with its own random stream.
pub fn run_search(
    model: &mut DistanceModel,
    population_size: usize,
    crossover_chance: f64,
    mutation_chance: f64,
) -> TspResult<Tour> {
    let config = GAConfig {
        population_size,
        crossover_chance,
        mutation_chance,
    };
    let mut ga = GeneticAlgorithm::for_model(config, model)?;
    Ok(ga.run(model))
}

/// Partially Mapped Crossover (PMX) with a random window.
///
/// The window `[i1, i2)` has `i1` in `[0, n/2)` and `i2` in `[n/2 + 1, n)`,
/// so it spans at least two positions and never wraps. Paths shorter than
/// three cities admit no such window and are returned as copies.
pub fn pmx_crossover<R: Rng + ?Sized>(parent1: &Tour, parent2: &Tour, rng: &mut R) -> (Tour, Tour) {
    let n = parent1.dimension();
    if n < 3 {
        return (parent1.clone(), parent2.clone());
    }

    let i1 = rng.gen_range(0..n / 2);
    let i2 = rng.gen_range(n / 2 + 1..n);
    let (child1, child2) = pmx_with_window(parent1.path(), parent2.path(), i1, i2);

    (Tour::from_path(child1), Tour::from_path(child2))
}

/// PMX on an explicit window `[i1, i2)`.
///
/// The first child keeps `parent1` inside the window and `parent2` outside it,
/// the second child the other way round. Conflicts outside the window are
/// resolved by following the window's position mapping.
pub fn pmx_with_window(parent1: &[City], parent2: &[City], i1: usize, i2: usize) -> (Vec<City>, Vec<City>) {
    (
        pmx_build_child(parent1, parent2, i1, i2),
        pmx_build_child(parent2, parent1, i1, i2),
    )
}

/// Copy the window from `template`, fill the rest from `donor`.
fn pmx_build_child(template: &[City], donor: &[City], i1: usize, i2: usize) -> Vec<City> {
    // template[k] -> donor[k] for every k in the window
    let mapping: HashMap<usize, City> = (i1..i2)
        .map(|k| (template[k].index, donor[k]))
        .collect();

    let mut child = donor.to_vec();
    child[i1..i2].copy_from_slice(&template[i1..i2]);

    for i in (0..i1).chain(i2..donor.len()) {
        let mut city = donor[i];
        // A chase visits each window slot at most once.
        let mut steps = 0;
        while let Some(&mapped) = mapping.get(&city.index) {
            city = mapped;
            steps += 1;
            if steps > i2 - i1 {
                break;
            }
        }
        child[i] = city;
    }

    child
}

/// Swap mutation: exchange two distinct positions.
pub fn swap_mutation<R: Rng + ?Sized>(tour: &mut Tour, rng: &mut R) {
    let n = tour.dimension();
    if n == 0 {
        return;
    }

    let i = rng.gen_range(0..n);
    let mut j = rng.gen_range(0..n);
    if i == j {
        j = (j + 1) % n;
    }
    tour.swap_cities(i, j);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::construction::{ConstructionHeuristic, NearestNeighborHeuristic};
    use crate::instance::tests::{explicit_ten, SQUARE};
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn cities(n: usize) -> Vec<City> {
        (1..=n).map(|i| City::new(i, i as f64, 0.0)).collect()
    }

    fn indices(path: &[City]) -> Vec<usize> {
        path.iter().map(|c| c.index).collect()
    }

    fn is_permutation(path: &[City], n: usize) -> bool {
        let unique: HashSet<usize> = path.iter().map(|c| c.index).collect();
        path.len() == n && unique.len() == n && unique.iter().all(|&i| (1..=n).contains(&i))
    }

    fn circle(n: usize) -> DistanceModel {
        let coords: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                (100.0 * angle.cos(), 100.0 * angle.sin())
            })
            .collect();
        DistanceModel::from_coordinates("circle", &coords).unwrap()
    }

    #[test]
    fn test_pmx_known_example() {
        let p1 = cities(8);
        let order = [3, 7, 5, 1, 6, 8, 2, 4];
        let p2: Vec<City> = order.iter().map(|&i| City::new(i, i as f64, 0.0)).collect();

        let (c1, c2) = pmx_with_window(&p1, &p2, 3, 6);
        assert_eq!(indices(&c1), vec![3, 7, 8, 4, 5, 6, 2, 1]);
        assert_eq!(indices(&c2), vec![4, 2, 3, 1, 6, 8, 7, 5]);
    }

    #[test]
    fn test_pmx_every_window_is_valid() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for n in 3..12 {
            for _ in 0..10 {
                let mut p1 = cities(n);
                let mut p2 = cities(n);
                p1.shuffle(&mut rng);
                p2.shuffle(&mut rng);

                for i1 in 0..n / 2 {
                    for i2 in n / 2 + 1..n {
                        let (c1, c2) = pmx_with_window(&p1, &p2, i1, i2);
                        assert!(is_permutation(&c1, n), "n={} window=[{}, {})", n, i1, i2);
                        assert!(is_permutation(&c2, n), "n={} window=[{}, {})", n, i1, i2);
                        assert_eq!(indices(&c1[i1..i2]), indices(&p1[i1..i2]));
                        assert_eq!(indices(&c2[i1..i2]), indices(&p2[i1..i2]));
                    }
                }
            }
        }
    }

    #[test]
    fn test_pmx_boundary_windows() {
        let p1 = cities(6);
        let mut p2 = cities(6);
        p2.reverse();

        // Degenerate length-two window and a window touching both ends.
        for (i1, i2) in [(2, 4), (0, 5), (0, 4), (2, 5)] {
            let (c1, c2) = pmx_with_window(&p1, &p2, i1, i2);
            assert!(is_permutation(&c1, 6));
            assert!(is_permutation(&c2, 6));
        }
    }

    #[test]
    fn test_pmx_crossover_returns_unevaluated_permutations() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut p1 = Tour::from_path(cities(9));
        let mut p2 = Tour::from_path(cities(9).into_iter().rev().collect());
        p1.set_distance(10.0);
        p2.set_distance(11.0);

        for _ in 0..50 {
            let (c1, c2) = pmx_crossover(&p1, &p2, &mut rng);
            assert!(c1.is_permutation_of(9));
            assert!(c2.is_permutation_of(9));
            assert!(!c1.is_evaluated());
            assert!(!c2.is_evaluated());
        }

        let short = Tour::from_path(cities(2));
        let (c1, c2) = pmx_crossover(&short, &short, &mut rng);
        assert_eq!(c1.city_indices(), vec![1, 2]);
        assert_eq!(c2.city_indices(), vec![1, 2]);
    }

    #[test]
    fn test_swap_mutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..50 {
            let mut tour = Tour::from_path(cities(5));
            tour.set_distance(3.0);
            swap_mutation(&mut tour, &mut rng);

            assert!(tour.is_permutation_of(5));
            assert!(!tour.is_evaluated());
            let moved = tour
                .city_indices()
                .iter()
                .enumerate()
                .filter(|&(i, &c)| c != i + 1)
                .count();
            assert_eq!(moved, 2);
        }

        let mut single = Tour::from_path(cities(1));
        swap_mutation(&mut single, &mut rng);
        assert_eq!(single.city_indices(), vec![1]);
    }

    #[test]
    fn test_invalid_config() {
        let bad = [
            GAConfig { population_size: 0, ..Default::default() },
            GAConfig { crossover_chance: 1.5, ..Default::default() },
            GAConfig { mutation_chance: -0.1, ..Default::default() },
        ];
        for config in bad {
            let err = GeneticAlgorithm::new(config, RngHandle::seeded(0)).err();
            assert!(matches!(err, Some(TspError::InvalidParameter { .. })));
        }
    }

    #[test]
    fn test_no_variation_keeps_genetic_material() {
        let rng = RngHandle::seeded(9);
        let mut model = DistanceModel::parse(&explicit_ten(), None)
            .unwrap()
            .with_rng(rng.clone());
        let config = GAConfig {
            population_size: 12,
            crossover_chance: 0.0,
            mutation_chance: 0.0,
        };
        let mut ga = GeneticAlgorithm::new(config, rng).unwrap();

        ga.initialize_population(&mut model);
        let before: HashSet<Vec<usize>> = ga.population().iter().map(Tour::city_indices).collect();
        let elite = ga.population_best().city_indices();

        ga.evolve(&mut model);
        let after = ga.population();
        assert_eq!(after.len(), 12);
        assert_eq!(after[0].city_indices(), elite);
        for tour in after {
            assert!(before.contains(&tour.city_indices()));
            assert!(tour.is_evaluated());
        }
        assert_eq!(model.evaluations(), 24);
        assert_eq!(ga.current_generation(), 1);
    }

    #[test]
    fn test_phases_and_budget_overshoot() {
        let rng = RngHandle::seeded(21);
        let mut model = circle(12).with_rng(rng.clone()).with_max_evaluations(1_000);
        let config = GAConfig { population_size: 30, ..Default::default() };
        let mut ga = GeneticAlgorithm::new(config, rng).unwrap();
        assert_eq!(ga.phase(), Phase::Init);

        let best = ga.run(&mut model);
        assert_eq!(ga.phase(), Phase::Terminated);
        assert!(best.is_permutation_of(12));
        assert!(best.is_evaluated());

        // Budget is checked per generation: 30 + 30k evaluations.
        assert!(model.evaluations() >= 1_000);
        assert!(model.evaluations() < 1_000 + 30);
        assert_eq!(model.evaluations() % 30, 0);
        assert_eq!(ga.current_generation(), model.evaluations() / 30 - 1);
    }

    #[test]
    fn test_best_is_never_worse_than_population() {
        let rng = RngHandle::seeded(2);
        let mut model = circle(15).with_rng(rng.clone()).with_max_evaluations(3_000);
        let mut ga = GeneticAlgorithm::new(GAConfig::default(), rng).unwrap();
        let best = ga.run(&mut model);

        for tour in ga.population() {
            assert!(best.distance() <= tour.distance());
        }
        let recomputed = model.tour_length(best.path());
        assert!((recomputed - best.distance()).abs() < 1e-9);
    }

    #[test]
    fn test_reproducible_with_fixed_seed() {
        let run = |seed: u64| {
            let rng = RngHandle::seeded(seed);
            let mut model = DistanceModel::parse(&explicit_ten(), None)
                .unwrap()
                .with_rng(rng.clone())
                .with_max_evaluations(2_000);
            let mut ga = GeneticAlgorithm::new(GAConfig { population_size: 20, ..Default::default() }, rng).unwrap();
            ga.run(&mut model)
        };

        let a = run(123);
        let b = run(123);
        assert_eq!(a.city_indices(), b.city_indices());
        assert_eq!(a.distance().to_bits(), b.distance().to_bits());
    }

    #[test]
    fn test_square_reaches_perimeter() {
        let rng = RngHandle::seeded(8);
        let mut model = DistanceModel::parse(SQUARE, None)
            .unwrap()
            .with_rng(rng)
            .with_max_evaluations(5_000);
        let best = run_search(&mut model, 20, 0.8, 0.1).unwrap();
        assert!((best.distance() - 40.0).abs() < 1e-9);

        let mut baseline_model = DistanceModel::parse(SQUARE, None).unwrap();
        let mut baseline = NearestNeighborHeuristic::new().construct(&baseline_model);
        baseline_model.evaluate(&mut baseline);
        assert!(best.distance() <= baseline.distance() + 1e-9);
    }

    #[test]
    fn test_budget_smaller_than_population() {
        let rng = RngHandle::seeded(5);
        let mut model = circle(6).with_rng(rng).with_max_evaluations(3);
        let best = run_search(&mut model, 10, 0.8, 0.1).unwrap();
        assert_eq!(model.evaluations(), 10);
        assert!(best.is_permutation_of(6));
    }
}
