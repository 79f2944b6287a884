//! Module for parsing and representing TSP instances.
//!
//! This module handles the TSP-LIB style files the solver consumes. Two edge
//! weight types are supported: `EXPLICIT` (full weight matrix plus display
//! coordinates) and `EUC_2D` (node coordinates, Euclidean distances). Both are
//! materialized into a dense matrix so that every lookup is O(1).
//!
//! A model also owns the evaluation budget of a search: [`DistanceModel::evaluate`]
//! is the only place where tour costs are computed and counted.

use crate::error::{TspError, TspResult};
use crate::rng::RngHandle;
use crate::tour::Tour;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Evaluation budget used when the caller does not set one.
pub const DEFAULT_MAX_EVALUATIONS: usize = 200_000;

/// A location of the instance.
///
/// Equality and hashing only look at `index`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct City {
    /// Identifier, 1-based and dense within a model
    pub index: usize,
    /// X coordinate (Euclidean or display)
    pub x: f64,
    /// Y coordinate (Euclidean or display)
    pub y: f64,
}

impl City {
    pub fn new(index: usize, x: f64, y: f64) -> Self {
        City { index, x, y }
    }

    /// Slot filler of an empty tour. Never part of a model.
    pub fn placeholder() -> Self {
        City::new(0, 0.0, 0.0)
    }

    pub fn euclidean_distance(&self, other: &City) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl PartialEq for City {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for City {}

impl std::hash::Hash for City {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

/// How [`DistanceModel::distance`] resolves a pair of cities
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DistanceType {
    /// Computed from coordinates on every lookup
    Euclidean,
    /// Looked up in the weight matrix
    Weighted,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
enum Section {
    EdgeWeight,
    DisplayData,
    NodeCoord,
}

impl Section {
    fn keyword(self) -> &'static str {
        match self {
            Section::EdgeWeight => "EDGE_WEIGHT_SECTION",
            Section::DisplayData => "DISPLAY_DATA_SECTION",
            Section::NodeCoord => "NODE_COORD_SECTION",
        }
    }
}

/// A data row together with its 1-based line number in the source text.
type Row<'a> = (usize, &'a str);

/// Header fields and raw section rows, before any numeric conversion.
#[derive(Default)]
struct RawInstance<'a> {
    name: String,
    comment: String,
    dimension: Option<usize>,
    edge_weight_type: Option<(usize, String)>,
    edge_weight_format: Option<(usize, String)>,
    sections: HashMap<Section, Vec<Row<'a>>>,
}

impl<'a> RawInstance<'a> {
    fn scan(text: &'a str) -> TspResult<Self> {
        let mut raw = RawInstance::default();
        let mut section: Option<Section> = None;

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line == "EOF" {
                break;
            }

            if !line.starts_with(|c: char| c.is_ascii_alphabetic()) {
                match section {
                    Some(s) => raw.sections.entry(s).or_default().push((line_no, line)),
                    None => log::debug!("ignoring data outside of a section at line {}", line_no),
                }
                continue;
            }

            let (key, value) = match line.split_once(':') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (line, ""),
            };

            section = match key {
                "EDGE_WEIGHT_SECTION" => Some(Section::EdgeWeight),
                "DISPLAY_DATA_SECTION" => Some(Section::DisplayData),
                "NODE_COORD_SECTION" => Some(Section::NodeCoord),
                _ => None,
            };
            if let Some(s) = section {
                raw.sections.entry(s).or_default();
                continue;
            }

            match key {
                "NAME" => raw.name = value.to_string(),
                "COMMENT" => raw.comment = value.to_string(),
                "DIMENSION" => {
                    let dimension = value.parse().map_err(|_| {
                        TspError::malformed(Some(line_no), format!("invalid DIMENSION value '{}'", value))
                    })?;
                    raw.dimension = Some(dimension);
                }
                "EDGE_WEIGHT_TYPE" => raw.edge_weight_type = Some((line_no, value.to_string())),
                "EDGE_WEIGHT_FORMAT" => raw.edge_weight_format = Some((line_no, value.to_string())),
                other => log::debug!("skipping header '{}' at line {}", other, line_no),
            }
        }

        Ok(raw)
    }

    fn section(&self, section: Section) -> TspResult<&[Row<'a>]> {
        self.sections
            .get(&section)
            .map(Vec::as_slice)
            .ok_or_else(|| TspError::malformed(None, format!("{} not found", section.keyword())))
    }
}

/// Represents a loaded TSP instance together with the evaluation budget of a search.
///
/// Cloning a model shares its random stream; use [`DistanceModel::with_rng`]
/// to give a clone its own.
#[derive(Debug, Clone)]
pub struct DistanceModel {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    /// Dimension declared by the source, before filtering
    pub dimension: usize,
    cities: Vec<City>,
    /// Index each active city had in the source, by dense position
    source_indices: Vec<usize>,
    start: City,
    weights: Vec<Vec<f64>>,
    distance_type: DistanceType,
    max_evaluations: usize,
    evaluations: usize,
    rng: RngHandle,
}

impl DistanceModel {
    /// Load an instance file, optionally keeping only the given 1-based indices.
    pub fn from_file<P: AsRef<Path>>(path: P, selected: Option<&[usize]>) -> TspResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TspError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, selected)
    }

    /// Parse instance text, optionally keeping only the given 1-based indices.
    pub fn parse(text: &str, selected: Option<&[usize]>) -> TspResult<Self> {
        let raw = RawInstance::scan(text)?;

        let dimension = raw
            .dimension
            .ok_or_else(|| TspError::malformed(None, "missing DIMENSION header"))?;
        let (type_line, edge_weight_type) = raw
            .edge_weight_type
            .clone()
            .ok_or_else(|| TspError::malformed(None, "missing EDGE_WEIGHT_TYPE header"))?;

        log::debug!("instance '{}': dimension {}, edge weights {}", raw.name, dimension, edge_weight_type);

        let (cities, source_indices, weights) = match edge_weight_type.as_str() {
            "EXPLICIT" => {
                if let Some((line, format)) = &raw.edge_weight_format {
                    if format != "FULL_MATRIX" {
                        return Err(TspError::malformed(
                            Some(*line),
                            format!("unsupported EDGE_WEIGHT_FORMAT '{}'", format),
                        ));
                    }
                }
                let weight_rows = raw.section(Section::EdgeWeight)?;
                let display_rows = raw.section(Section::DisplayData)?;
                let active = active_indices(dimension, selected)?;

                let weights = read_explicit(weight_rows, &active)?;
                let (cities, source_indices) = read_cities(display_rows, &active, Section::DisplayData)?;
                (cities, source_indices, weights)
            }
            "EUC_2D" => {
                let coord_rows = raw.section(Section::NodeCoord)?;
                let active = active_indices(dimension, selected)?;

                let (cities, source_indices) = read_cities(coord_rows, &active, Section::NodeCoord)?;
                let weights = euclidean_matrix(&cities);
                (cities, source_indices, weights)
            }
            other => {
                return Err(TspError::malformed(
                    Some(type_line),
                    format!("unsupported EDGE_WEIGHT_TYPE '{}'", other),
                ))
            }
        };

        let model = Self::assemble(
            raw.name,
            raw.comment,
            dimension,
            cities,
            source_indices,
            weights,
            DistanceType::Weighted,
        )?;
        log::debug!(
            "start city: {} ({}, {}), {} active cities",
            model.start.index,
            model.start.x,
            model.start.y,
            model.num_cities()
        );
        Ok(model)
    }

    /// Build a Euclidean model from planar coordinates; city `i` gets index `i + 1`.
    pub fn from_coordinates(name: &str, coords: &[(f64, f64)]) -> TspResult<Self> {
        check_coordinates(coords)?;
        let cities: Vec<City> = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| City::new(i + 1, x, y))
            .collect();
        let weights = euclidean_matrix(&cities);
        let source_indices = (1..=cities.len()).collect();

        Self::assemble(
            name.to_string(),
            String::new(),
            coords.len(),
            cities,
            source_indices,
            weights,
            DistanceType::Euclidean,
        )
    }

    /// Build a weighted model from a square matrix and display coordinates.
    pub fn from_matrix(name: &str, weights: Vec<Vec<f64>>, coords: &[(f64, f64)]) -> TspResult<Self> {
        let n = weights.len();
        if coords.len() != n {
            return Err(TspError::malformed(
                None,
                format!("{} display coordinates for a {}x{} matrix", coords.len(), n, n),
            ));
        }
        for (i, row) in weights.iter().enumerate() {
            if row.len() != n {
                return Err(TspError::malformed(
                    None,
                    format!("matrix row {} has {} entries, expected {}", i + 1, row.len(), n),
                ));
            }
            if let Some(w) = row.iter().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(TspError::malformed(
                    None,
                    format!("matrix row {} holds invalid weight {}", i + 1, w),
                ));
            }
        }

        check_coordinates(coords)?;

        let cities = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| City::new(i + 1, x, y))
            .collect();

        Self::assemble(
            name.to_string(),
            String::new(),
            n,
            cities,
            (1..=n).collect(),
            weights,
            DistanceType::Weighted,
        )
    }

    fn assemble(
        name: String,
        comment: String,
        dimension: usize,
        cities: Vec<City>,
        source_indices: Vec<usize>,
        weights: Vec<Vec<f64>>,
        distance_type: DistanceType,
    ) -> TspResult<Self> {
        let start = *cities.first().ok_or(TspError::EmptyInstance)?;

        Ok(DistanceModel {
            name,
            comment,
            dimension,
            cities,
            source_indices,
            start,
            weights,
            distance_type,
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            evaluations: 0,
            rng: RngHandle::global(),
        })
    }

    /// Keep only the given 1-based indices of this model, renumbered densely.
    ///
    /// Consumes the model: a model borrowed by a running search cannot be restricted.
    pub fn restrict(self, selected: &[usize]) -> TspResult<Self> {
        let active = active_indices(self.num_cities(), Some(selected))?;

        let cities = active
            .iter()
            .enumerate()
            .map(|(k, &i)| {
                let city = self.cities[i - 1];
                City::new(k + 1, city.x, city.y)
            })
            .collect();
        let source_indices = active.iter().map(|&i| self.source_indices[i - 1]).collect();
        let weights = active
            .iter()
            .map(|&i| active.iter().map(|&j| self.weights[i - 1][j - 1]).collect())
            .collect();

        let mut model = Self::assemble(
            self.name,
            self.comment,
            self.dimension,
            cities,
            source_indices,
            weights,
            self.distance_type,
        )?;
        model.max_evaluations = self.max_evaluations;
        model.rng = self.rng;
        Ok(model)
    }

    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = max_evaluations;
        self
    }

    pub fn with_rng(mut self, rng: RngHandle) -> Self {
        self.rng = rng;
        self
    }

    /// Get the distance between two cities of this model
    #[inline]
    pub fn distance(&self, a: &City, b: &City) -> f64 {
        match self.distance_type {
            DistanceType::Euclidean => a.euclidean_distance(b),
            DistanceType::Weighted => self.weights[a.index - 1][b.index - 1],
        }
    }

    /// A uniformly random permutation of all active cities, not yet evaluated.
    pub fn generate_tour(&self) -> Tour {
        let mut path = self.cities.clone();
        self.rng.with(|rng| path.shuffle(rng));
        Tour::from_path(path)
    }

    /// Compute and store the closed-cycle distance of `tour`, consuming one evaluation.
    pub fn evaluate(&mut self, tour: &mut Tour) -> f64 {
        let distance = self.tour_length(tour.path());
        tour.set_distance(distance);
        self.evaluations += 1;
        distance
    }

    /// Closed-cycle length of a path from and back to the start city.
    ///
    /// Not counted against the budget; searches must go through [`Self::evaluate`].
    pub fn tour_length(&self, path: &[City]) -> f64 {
        let (Some(first), Some(last)) = (path.first(), path.last()) else {
            return 0.0;
        };

        let mut length = self.distance(&self.start, first);
        for pair in path.windows(2) {
            length += self.distance(&pair[0], &pair[1]);
        }
        length + self.distance(last, &self.start)
    }

    pub fn reset_evaluations(&mut self) {
        self.evaluations = 0;
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// Number of active cities
    pub fn num_cities(&self) -> usize {
        self.cities.len()
    }

    /// Index a dense city index had in the source file
    pub fn source_index(&self, index: usize) -> Option<usize> {
        index
            .checked_sub(1)
            .and_then(|i| self.source_indices.get(i))
            .copied()
    }

    pub fn start(&self) -> City {
        self.start
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    pub fn distance_type(&self) -> DistanceType {
        self.distance_type
    }

    pub fn max_evaluations(&self) -> usize {
        self.max_evaluations
    }

    /// Evaluations consumed so far
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn budget_exhausted(&self) -> bool {
        self.evaluations >= self.max_evaluations
    }

    pub fn rng(&self) -> &RngHandle {
        &self.rng
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let mut distances: Vec<f64> = Vec::new();
        for (i, a) in self.cities.iter().enumerate() {
            for b in &self.cities[i + 1..] {
                distances.push(self.distance(a, b));
            }
        }

        let (avg_distance, min_distance, max_distance) = if distances.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                distances.iter().sum::<f64>() / distances.len() as f64,
                distances.iter().cloned().fold(f64::INFINITY, f64::min),
                distances.iter().cloned().fold(0.0, f64::max),
            )
        };

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension,
            num_cities: self.num_cities(),
            distance_type: self.distance_type,
            start: self.start.index,
            avg_distance,
            min_distance,
            max_distance,
        }
    }
}

/// Load an instance file; the entry point used by collaborators.
pub fn load_instance<P: AsRef<Path>>(path: P, selected: Option<&[usize]>) -> TspResult<DistanceModel> {
    DistanceModel::from_file(path, selected)
}

/// Sorted, de-duplicated 1-based indices to keep out of `dimension`.
fn active_indices(dimension: usize, selected: Option<&[usize]>) -> TspResult<Vec<usize>> {
    let active = match selected {
        None => (1..=dimension).collect::<Vec<_>>(),
        Some(selected) => {
            let mut active = selected.to_vec();
            active.sort_unstable();
            active.dedup();
            if active.len() < selected.len() {
                log::warn!("duplicate city indices in selection were collapsed");
            }
            if let Some(&bad) = active.iter().find(|&&i| i == 0 || i > dimension) {
                return Err(TspError::malformed(
                    None,
                    format!("selected index {} outside 1..={}", bad, dimension),
                ));
            }
            active
        }
    };

    if active.is_empty() {
        return Err(TspError::EmptyInstance);
    }
    Ok(active)
}

fn section_row<'a>(rows: &[Row<'a>], index: usize, section: Section) -> TspResult<Row<'a>> {
    rows.get(index - 1).copied().ok_or_else(|| {
        TspError::malformed(
            None,
            format!("{} has {} rows, city {} is missing", section.keyword(), rows.len(), index),
        )
    })
}

fn parse_field<T: std::str::FromStr>(field: &str, what: &str, line: usize) -> TspResult<T> {
    field
        .parse()
        .map_err(|_| TspError::malformed(Some(line), format!("invalid {} '{}'", what, field)))
}

/// Induced weight sub-matrix on the active rows and columns.
fn read_explicit(rows: &[Row<'_>], active: &[usize]) -> TspResult<Vec<Vec<f64>>> {
    let mut weights = Vec::with_capacity(active.len());

    for &i in active {
        let (line, text) = section_row(rows, i, Section::EdgeWeight)?;
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() < active.len() {
            return Err(TspError::malformed(
                Some(line),
                format!("insufficient weights: {} fields, expected {}", fields.len(), active.len()),
            ));
        }

        let mut row = Vec::with_capacity(active.len());
        for &j in active {
            let field = fields.get(j - 1).ok_or_else(|| {
                TspError::malformed(Some(line), format!("no weight for column {}", j))
            })?;
            let weight: f64 = parse_field(field, "weight", line)?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(TspError::malformed(Some(line), format!("invalid weight '{}'", field)));
            }
            row.push(weight);
        }
        weights.push(row);
    }

    Ok(weights)
}

/// Active cities renumbered `1..=k`, plus the index each row declared.
fn read_cities(rows: &[Row<'_>], active: &[usize], section: Section) -> TspResult<(Vec<City>, Vec<usize>)> {
    let mut cities = Vec::with_capacity(active.len());
    let mut source_indices = Vec::with_capacity(active.len());

    for (k, &i) in active.iter().enumerate() {
        let (line, text) = section_row(rows, i, section)?;
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(TspError::malformed(
                Some(line),
                format!("invalid city line '{}', expected '<index> <x> <y>'", text),
            ));
        }

        let id: usize = parse_field(parts[0], "city index", line)?;
        let x: f64 = parse_field(parts[1], "x coordinate", line)?;
        let y: f64 = parse_field(parts[2], "y coordinate", line)?;
        if !x.is_finite() || !y.is_finite() {
            return Err(TspError::malformed(
                Some(line),
                format!("non-finite coordinates ({}, {}) for city {}", parts[1], parts[2], id),
            ));
        }

        cities.push(City::new(k + 1, x, y));
        source_indices.push(id);
    }

    Ok((cities, source_indices))
}

fn check_coordinates(coords: &[(f64, f64)]) -> TspResult<()> {
    match coords.iter().position(|(x, y)| !x.is_finite() || !y.is_finite()) {
        Some(i) => Err(TspError::malformed(
            None,
            format!("non-finite coordinates {:?} for city {}", coords[i], i + 1),
        )),
        None => Ok(()),
    }
}

/// Compute Euclidean distance matrix
fn euclidean_matrix(cities: &[City]) -> Vec<Vec<f64>> {
    cities
        .iter()
        .map(|a| cities.iter().map(|b| a.euclidean_distance(b)).collect())
        .collect()
}

/// Statistics about a TSP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub num_cities: usize,
    pub distance_type: DistanceType,
    pub start: usize,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Declared dimension: {}", self.dimension)?;
        writeln!(f, "  Active cities: {}", self.num_cities)?;
        writeln!(f, "  Distance type: {:?}", self.distance_type)?;
        writeln!(f, "  Start city: {}", self.start)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Min distance: {:.2}", self.min_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rng::reseed_global;

    pub(crate) const SQUARE: &str = "\
NAME: square4
COMMENT: unit test square
TYPE: TSP
DIMENSION: 4
EDGE_WEIGHT_TYPE: EUC_2D
NODE_COORD_SECTION
1 0 0
2 10 0
3 10 10
4 0 10
EOF
";

    fn weight(i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else {
            (10 * i.abs_diff(j) + i + j) as f64
        }
    }

    /// Ten cities with an explicit symmetric matrix where w(i, j) = 10|i-j| + i + j.
    pub(crate) fn explicit_ten() -> String {
        let mut text = String::from(
            "NAME : ten\nTYPE : TSP\nDIMENSION : 10\nEDGE_WEIGHT_TYPE : EXPLICIT\n\
             EDGE_WEIGHT_FORMAT : FULL_MATRIX\nDISPLAY_DATA_TYPE : TWOD_DISPLAY\nEDGE_WEIGHT_SECTION\n",
        );
        for i in 1..=10 {
            let row: Vec<String> = (1..=10).map(|j| weight(i, j).to_string()).collect();
            text.push_str(&format!("  {}\n", row.join(" ")));
        }
        text.push_str("DISPLAY_DATA_SECTION\n");
        for i in 1..=10 {
            text.push_str(&format!("{} {}.5 {}.25\n", i, i * 3, 100 - i));
        }
        text.push_str("EOF\n");
        text
    }

    #[test]
    fn test_parse_euc_2d() {
        let model = DistanceModel::parse(SQUARE, None).unwrap();
        assert_eq!(model.name, "square4");
        assert_eq!(model.comment, "unit test square");
        assert_eq!(model.num_cities(), 4);
        assert_eq!(model.distance_type(), DistanceType::Weighted);
        assert_eq!(model.start().index, 1);
        assert_eq!(model.weights().len(), 4);

        let c = model.cities();
        assert!((model.distance(&c[0], &c[2]) - 200f64.sqrt()).abs() < 1e-10);
        assert!((model.distance(&c[1], &c[2]) - 10.0).abs() < 1e-10);
        assert_eq!(model.distance(&c[3], &c[3]), 0.0);
    }

    #[test]
    fn test_parse_explicit() {
        let model = DistanceModel::parse(&explicit_ten(), None).unwrap();
        assert_eq!(model.num_cities(), 10);
        assert_eq!(model.dimension, 10);
        for i in 1..=10 {
            for j in 1..=10 {
                assert_eq!(model.weights()[i - 1][j - 1], weight(i, j));
            }
        }
        assert_eq!(model.cities()[4].x, 15.5);
        assert_eq!(model.cities()[4].y, 95.25);
    }

    #[test]
    fn test_filter_explicit_to_three() {
        let model = DistanceModel::parse(&explicit_ten(), Some(&[9, 2, 5])).unwrap();
        assert_eq!(model.num_cities(), 3);
        assert_eq!(model.weights().len(), 3);

        let selected = [2, 5, 9];
        for (a, &i) in selected.iter().enumerate() {
            assert_eq!(model.weights()[a].len(), 3);
            for (b, &j) in selected.iter().enumerate() {
                assert_eq!(model.weights()[a][b], weight(i, j));
            }
        }

        let indices: Vec<usize> = model.cities().iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);

        // Start is the lowest selected city, renumbered but with its coordinates.
        assert_eq!(model.start().index, 1);
        assert_eq!(model.start().x, 6.5);
        assert_eq!(model.start().y, 98.25);
        assert_eq!(model.source_index(1), Some(2));
        assert_eq!(model.source_index(3), Some(9));
        assert_eq!(model.source_index(4), None);
    }

    #[test]
    fn test_filter_euc_2d_and_duplicates() {
        let model = DistanceModel::parse(SQUARE, Some(&[4, 2, 4])).unwrap();
        assert_eq!(model.num_cities(), 2);
        assert_eq!(model.start().x, 10.0);
        assert_eq!(model.start().y, 0.0);
        let c = model.cities();
        assert!((model.distance(&c[0], &c[1]) - 200f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn test_restrict_matches_load_time_filter() {
        let loaded = DistanceModel::parse(&explicit_ten(), Some(&[3, 4, 7, 8])).unwrap();
        let restricted = loaded.clone().restrict(&[2, 4]).unwrap();
        let direct = DistanceModel::parse(&explicit_ten(), Some(&[4, 8])).unwrap();

        assert_eq!(restricted.weights(), direct.weights());
        assert_eq!(restricted.source_index(1), Some(4));
        assert_eq!(restricted.source_index(2), Some(8));
        assert_eq!(restricted.start().x, direct.start().x);
    }

    #[test]
    fn test_missing_dimension_is_malformed() {
        let text = SQUARE.replace("DIMENSION: 4\n", "");
        let err = DistanceModel::parse(&text, None).unwrap_err();
        assert!(matches!(err, TspError::MalformedInstance { .. }));
        assert!(err.to_string().contains("DIMENSION"));
    }

    #[test]
    fn test_missing_edge_weight_type_is_malformed() {
        let text = SQUARE.replace("EDGE_WEIGHT_TYPE: EUC_2D\n", "");
        let err = DistanceModel::parse(&text, None).unwrap_err();
        assert!(err.to_string().contains("EDGE_WEIGHT_TYPE"));
    }

    #[test]
    fn test_unknown_edge_weight_type_is_malformed() {
        let text = SQUARE.replace("EUC_2D", "GEO");
        let err = DistanceModel::parse(&text, None).unwrap_err();
        assert!(matches!(err, TspError::MalformedInstance { line: Some(5), .. }));
    }

    #[test]
    fn test_missing_sections_are_malformed() {
        let text = SQUARE.replace("NODE_COORD_SECTION", "DEMAND_SECTION");
        assert!(DistanceModel::parse(&text, None).unwrap_err().is_malformed());

        let text = explicit_ten().replace("DISPLAY_DATA_SECTION", "FIXED_EDGES_SECTION");
        let err = DistanceModel::parse(&text, None).unwrap_err();
        assert!(err.to_string().contains("DISPLAY_DATA_SECTION"));
    }

    #[test]
    fn test_short_row_is_malformed() {
        let text = explicit_ten().replace("  0 13 24 ", "  0 13 ");
        let err = DistanceModel::parse(&text, None).unwrap_err();
        assert!(matches!(err, TspError::MalformedInstance { line: Some(8), .. }));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let text = SQUARE.replace("3 10 10", "3 10 ten");
        let err = DistanceModel::parse(&text, None).unwrap_err();
        match err {
            TspError::MalformedInstance { line, reason } => {
                assert_eq!(line, Some(9));
                assert!(reason.contains("'ten'"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_coordinates_are_malformed() {
        for bad in ["NaN", "inf", "-inf"] {
            let text = SQUARE.replace("3 10 10", &format!("3 {} 10", bad));
            let err = DistanceModel::parse(&text, None).unwrap_err();
            assert!(matches!(err, TspError::MalformedInstance { line: Some(9), .. }), "{}", bad);
        }

        let text = explicit_ten().replace("4 12.5 96.25", "4 12.5 NaN");
        assert!(DistanceModel::parse(&text, None).unwrap_err().is_malformed());

        // Rows outside the selection are never read.
        let text = SQUARE.replace("3 10 10", "3 NaN 10");
        let model = DistanceModel::parse(&text, Some(&[1, 2, 4])).unwrap();
        assert_eq!(model.num_cities(), 3);

        let err = DistanceModel::from_coordinates("nan", &[(0.0, 0.0), (f64::NAN, 1.0), (2.0, 2.0)]).unwrap_err();
        assert!(err.is_malformed());
        let err = DistanceModel::from_matrix("inf", vec![vec![0.0; 2]; 2], &[(0.0, f64::INFINITY), (1.0, 1.0)]).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_unsupported_edge_weight_format_is_malformed() {
        let text = explicit_ten().replace("FULL_MATRIX", "UPPER_ROW");
        let err = DistanceModel::parse(&text, None).unwrap_err();
        match err {
            TspError::MalformedInstance { line, reason } => {
                assert_eq!(line, Some(5));
                assert!(reason.contains("UPPER_ROW"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_default_models_draw_from_global_stream() {
        let first = DistanceModel::parse(&explicit_ten(), None).unwrap();
        let second = DistanceModel::parse(&explicit_ten(), None).unwrap();
        assert!(first.rng().shares_stream_with(&RngHandle::global()));
        assert!(first.rng().shares_stream_with(second.rng()));

        reseed_global(2024);
        let a = first.generate_tour();
        let b = first.generate_tour();
        reseed_global(2024);
        let c = second.generate_tour();
        let d = second.generate_tour();

        assert_eq!(a.city_indices(), c.city_indices());
        assert_eq!(b.city_indices(), d.city_indices());
    }

    #[test]
    fn test_missing_rows_are_malformed() {
        let text = SQUARE.replace("4 0 10\n", "");
        assert!(DistanceModel::parse(&text, None).unwrap_err().is_malformed());
    }

    #[test]
    fn test_empty_selection_and_out_of_range() {
        let err = DistanceModel::parse(SQUARE, Some(&[])).unwrap_err();
        assert!(matches!(err, TspError::EmptyInstance));

        let err = DistanceModel::parse(SQUARE, Some(&[1, 5])).unwrap_err();
        assert!(err.is_malformed());

        let text = SQUARE.replace("DIMENSION: 4", "DIMENSION: 0");
        assert!(matches!(DistanceModel::parse(&text, None), Err(TspError::EmptyInstance)));
    }

    #[test]
    fn test_evaluate_counts_and_is_deterministic() {
        let mut model = DistanceModel::parse(SQUARE, None).unwrap();
        let mut tour = Tour::from_path(model.cities().to_vec());

        let first = model.evaluate(&mut tour);
        let second = model.evaluate(&mut tour);
        assert_eq!(first, 40.0);
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(model.evaluations(), 2);

        model.reset_evaluations();
        assert_eq!(model.evaluations(), 0);
    }

    #[test]
    fn test_start_city_inside_path_is_revisited() {
        let mut model = DistanceModel::parse(SQUARE, None).unwrap();
        let c = model.cities().to_vec();
        // 1 -> 2 -> 1 -> 3 -> 4 -> 1
        let mut tour = Tour::from_path(vec![c[1], c[0], c[2], c[3]]);
        let expected = 10.0 + 10.0 + 200f64.sqrt() + 10.0 + 10.0;
        assert!((model.evaluate(&mut tour) - expected).abs() < 1e-10);
    }

    #[test]
    fn test_generate_tour_is_permutation() {
        let model = DistanceModel::parse(&explicit_ten(), None)
            .unwrap()
            .with_rng(RngHandle::seeded(5));
        for _ in 0..20 {
            let tour = model.generate_tour();
            assert!(tour.is_permutation_of(10));
            assert!(!tour.is_evaluated());
        }
    }

    #[test]
    fn test_from_coordinates_and_matrix() {
        let model = DistanceModel::from_coordinates("tri", &[(0.0, 0.0), (3.0, 4.0), (3.0, 0.0)]).unwrap();
        assert_eq!(model.distance_type(), DistanceType::Euclidean);
        assert!((model.tour_length(model.cities()) - 12.0).abs() < 1e-10);

        let err = DistanceModel::from_matrix("bad", vec![vec![0.0, 1.0]], &[(0.0, 0.0)]).unwrap_err();
        assert!(err.is_malformed());
        assert!(matches!(
            DistanceModel::from_coordinates("none", &[]),
            Err(TspError::EmptyInstance)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("tsp-ga-square-{}.tsp", std::process::id()));
        std::fs::write(&path, SQUARE).unwrap();
        let model = load_instance(&path, Some(&[1, 3])).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(model.num_cities(), 2);

        let err = load_instance(path.with_extension("missing"), None).unwrap_err();
        assert!(matches!(err, TspError::Unreadable { .. }));
    }

    #[test]
    fn test_statistics() {
        let stats = DistanceModel::parse(SQUARE, None).unwrap().statistics();
        assert_eq!(stats.num_cities, 4);
        assert_eq!(stats.min_distance, 10.0);
        assert!((stats.max_distance - 200f64.sqrt()).abs() < 1e-10);
    }
}
