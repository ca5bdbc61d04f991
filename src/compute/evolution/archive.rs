//! MAP-Elites grid archive.
//!
//! Each behavior axis is split into equal-width bins over `[0, 1]`; a cell
//! holds at most one individual. Storage is sparse: occupied cells map to a
//! slot in a dense elite vector, so memory follows the number of occupied
//! cells rather than the grid size. Slots are never freed; an elite is only
//! ever replaced in place.

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::schema::{ArchiveConfig, Genotype, Individual};

use super::genome::GenomeRng;

/// Discretized behavior coordinates, one bin index per axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex(Vec<usize>);

impl CellIndex {
    pub fn new(bins: Vec<usize>) -> Self {
        Self(bins)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for CellIndex {
    fn from(bins: Vec<usize>) -> Self {
        Self(bins)
    }
}

/// Result of offering an individual to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertOutcome {
    /// The individual now occupies its cell.
    pub accepted: bool,
    /// A previous occupant was evicted.
    pub replaced_existing: bool,
}

/// An occupied cell.
#[derive(Debug, Clone)]
pub struct Elite {
    /// Cell coordinates.
    pub cell: CellIndex,
    /// Best individual offered to this cell so far.
    pub individual: Individual,
}

/// Map a descriptor component to a bin in `0..bins`.
///
/// Total over all floats: values outside `[0, 1]` clamp to the edge bins and
/// NaN maps to bin 0.
#[inline]
pub fn bin_index(value: f32, bins: usize) -> usize {
    let last = bins.saturating_sub(1);
    if value.is_nan() {
        return 0;
    }
    let scaled = (value.clamp(0.0, 1.0) * bins as f32).floor();
    (scaled as usize).min(last)
}

/// Number of cells in a grid, or `None` if it does not fit in `usize`.
pub fn cell_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &bins| acc.checked_mul(bins))
}

/// MAP-Elites archive with grid-based niching.
#[derive(Debug, Clone)]
pub struct GridArchive {
    /// Bins per behavior axis.
    shape: Vec<usize>,
    /// Product of `shape`.
    capacity: usize,
    /// Occupied cell -> slot in `elites`.
    slots: HashMap<CellIndex, usize>,
    /// Elites in order of first occupation.
    elites: Vec<Elite>,
    /// Total insertion attempts.
    offers: u64,
}

impl GridArchive {
    /// Create an empty archive with the given bins per axis.
    pub fn new(shape: Vec<usize>) -> Result<Self, ArchiveError> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(ArchiveError::InvalidShape(shape));
        }
        let Some(capacity) = cell_count(&shape) else {
            return Err(ArchiveError::TooManyCells(shape));
        };
        Ok(Self {
            shape,
            capacity,
            slots: HashMap::new(),
            elites: Vec::new(),
            offers: 0,
        })
    }

    /// Create an empty archive from configuration.
    pub fn from_config(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        Self::new(config.shape.clone())
    }

    /// Bins per axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of behavior dimensions.
    pub fn dimensions(&self) -> usize {
        self.shape.len()
    }

    /// Total possible cells.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.elites.len()
    }

    /// Check if archive is empty.
    pub fn is_empty(&self) -> bool {
        self.elites.is_empty()
    }

    /// Coverage ratio (0 to 1).
    pub fn coverage(&self) -> f32 {
        (self.len() as f64 / self.capacity as f64) as f32
    }

    /// Total insertion attempts so far.
    pub fn offers(&self) -> u64 {
        self.offers
    }

    /// Cell a descriptor falls into. Missing components count as 0, extra
    /// components are ignored.
    pub fn cell_index(&self, descriptor: &[f32]) -> CellIndex {
        let bins = self
            .shape
            .iter()
            .enumerate()
            .map(|(axis, &bins)| bin_index(descriptor.get(axis).copied().unwrap_or(0.0), bins))
            .collect();
        CellIndex(bins)
    }

    /// Offer an individual to its cell.
    ///
    /// An empty cell always accepts. An occupied cell is taken over only by
    /// strictly greater fitness; on a tie the incumbent stays. NaN fitness is
    /// never accepted.
    pub fn insert(&mut self, individual: Individual) -> InsertOutcome {
        self.offers += 1;

        if individual.fitness.is_nan() {
            log::debug!("rejecting individual with NaN fitness");
            return InsertOutcome::default();
        }

        let cell = self.cell_index(&individual.descriptor);
        match self.slots.get(&cell).copied() {
            None => {
                self.slots.insert(cell.clone(), self.elites.len());
                self.elites.push(Elite { cell, individual });
                InsertOutcome {
                    accepted: true,
                    replaced_existing: false,
                }
            }
            Some(slot) => {
                let incumbent = &mut self.elites[slot].individual;
                if individual.fitness > incumbent.fitness {
                    *incumbent = individual;
                    InsertOutcome {
                        accepted: true,
                        replaced_existing: true,
                    }
                } else {
                    InsertOutcome::default()
                }
            }
        }
    }

    /// Get the occupant of a cell.
    pub fn get(&self, cell: &CellIndex) -> Option<&Individual> {
        self.slots.get(cell).map(|&slot| &self.elites[slot].individual)
    }

    /// Genotype of a uniformly chosen occupied cell.
    pub fn sample_parent(&self, rng: &mut GenomeRng) -> Option<&Genotype> {
        if self.elites.is_empty() {
            return None;
        }
        let slot = rng.index(self.elites.len());
        Some(&self.elites[slot].individual.genotype)
    }

    /// All elites, in order of first occupation.
    pub fn elites(&self) -> impl Iterator<Item = &Elite> {
        self.elites.iter()
    }

    /// Highest-fitness elite.
    pub fn best(&self) -> Option<&Individual> {
        self.elites
            .iter()
            .map(|e| &e.individual)
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    /// Summary statistics.
    pub fn stats(&self) -> ArchiveStats {
        let fitnesses: Vec<f32> = self.elites.iter().map(|e| e.individual.fitness).collect();

        ArchiveStats {
            occupied: self.len(),
            capacity: self.capacity(),
            coverage: self.coverage(),
            best_fitness: fitnesses.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            mean_fitness: if fitnesses.is_empty() {
                0.0
            } else {
                fitnesses.iter().sum::<f32>() / fitnesses.len() as f32
            },
            min_fitness: fitnesses.iter().copied().fold(f32::INFINITY, f32::min),
            dead: self.elites.iter().filter(|e| !e.individual.alive).count(),
        }
    }

    /// Flat enumeration of occupied cells.
    pub fn export(&self) -> ArchiveExport {
        ArchiveExport {
            shape: self.shape.clone(),
            generation: 0,
            entries: self
                .elites
                .iter()
                .map(|e| ArchiveEntry {
                    cell: e.cell.0.clone(),
                    fitness: e.individual.fitness,
                    descriptor: e.individual.descriptor.clone(),
                    genotype: e.individual.genotype.genes().to_vec(),
                    alive: e.individual.alive,
                })
                .collect(),
        }
    }

    /// Rebuild an archive from an export, re-applying the replacement rule.
    pub fn from_export(export: ArchiveExport) -> Result<Self, ArchiveError> {
        let mut archive = Self::new(export.shape)?;
        for entry in export.entries {
            if entry.descriptor.len() != archive.dimensions() {
                return Err(ArchiveError::DimensionMismatch {
                    expected: archive.dimensions(),
                    actual: entry.descriptor.len(),
                });
            }
            archive.insert(Individual {
                genotype: Genotype::new(entry.genotype),
                fitness: entry.fitness,
                descriptor: entry.descriptor,
                alive: entry.alive,
            });
        }
        archive.offers = 0;
        Ok(archive)
    }

    /// Save the archive as JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ArchiveError> {
        self.export().save_json(path)
    }

    /// Save the archive as whitespace-separated text, one elite per line:
    /// cell indices, descriptor, fitness, genes.
    pub fn save_text<P: AsRef<Path>>(&self, path: P) -> Result<(), ArchiveError> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        for elite in &self.elites {
            write_row(&mut out, elite)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Load an archive saved with [`GridArchive::save_json`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        Self::from_export(ArchiveExport::load_json(path)?)
    }
}

fn write_row<W: Write>(out: &mut W, elite: &Elite) -> io::Result<()> {
    for c in elite.cell.as_slice() {
        write!(out, "{} ", c)?;
    }
    for d in &elite.individual.descriptor {
        write!(out, "{} ", d)?;
    }
    write!(out, "{}", elite.individual.fitness)?;
    for g in elite.individual.genotype.genes() {
        write!(out, " {}", g)?;
    }
    writeln!(out)
}

/// Summary of archive contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub occupied: usize,
    pub capacity: usize,
    pub coverage: f32,
    pub best_fitness: f32,
    pub mean_fitness: f32,
    pub min_fitness: f32,
    /// Occupied cells holding dead individuals.
    pub dead: usize,
}

/// Exported archive format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveExport {
    /// Bins per axis.
    pub shape: Vec<usize>,
    /// Completed generations when the snapshot was taken.
    #[serde(default)]
    pub generation: usize,
    /// Occupied cells.
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveExport {
    /// Write as pretty-printed JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ArchiveError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a snapshot written by [`ArchiveExport::save_json`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// One occupied cell in an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub cell: Vec<usize>,
    pub fitness: f32,
    pub descriptor: Vec<f32>,
    pub genotype: Vec<f32>,
    pub alive: bool,
}

/// Archive construction and persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive shape {0:?} must have at least one axis and no empty axes")]
    InvalidShape(Vec<usize>),
    #[error("Archive shape {0:?} has more cells than can be indexed")]
    TooManyCells(Vec<usize>),
    #[error("Entry has {actual} descriptor dimensions, archive has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
