//! Genotype and individual types shared by the search, evaluator and archive.

use serde::{Deserialize, Serialize};

/// Default number of controller parameters (6 legs x 6 parameters).
pub const DEFAULT_GENOTYPE_LENGTH: usize = 36;

/// Domain a single gene is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneDomain {
    /// Gene takes one of a fixed set of values.
    Sampled { values: Vec<f32> },
    /// Gene is a real number in `[min, max]`.
    Continuous { min: f32, max: f32 },
}

impl Default for GeneDomain {
    /// 0.00, 0.05, ..., 1.00
    fn default() -> Self {
        Self::Sampled {
            values: (0..=20).map(|i| i as f32 / 20.0).collect(),
        }
    }
}

impl GeneDomain {
    /// Check whether a value lies inside the domain.
    pub fn contains(&self, value: f32) -> bool {
        match self {
            Self::Sampled { values } => values.iter().any(|&v| v == value),
            Self::Continuous { min, max } => value >= *min && value <= *max,
        }
    }

    /// Smallest admissible value.
    pub fn lower(&self) -> f32 {
        match self {
            Self::Sampled { values } => values.iter().copied().fold(f32::INFINITY, f32::min),
            Self::Continuous { min, .. } => *min,
        }
    }

    /// Largest admissible value.
    pub fn upper(&self) -> f32 {
        match self {
            Self::Sampled { values } => values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            Self::Continuous { max, .. } => *max,
        }
    }
}

/// Fixed-length controller encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genotype {
    genes: Vec<f32>,
}

impl Genotype {
    /// Wrap a gene vector.
    pub fn new(genes: Vec<f32>) -> Self {
        Self { genes }
    }

    /// Genotype with every gene set to `value`.
    pub fn filled(len: usize, value: f32) -> Self {
        Self {
            genes: vec![value; len],
        }
    }

    pub fn genes(&self) -> &[f32] {
        &self.genes
    }

    pub(crate) fn genes_mut(&mut self) -> &mut [f32] {
        &mut self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Controller parameters handed to the simulator.
    pub fn to_params(&self) -> Vec<f64> {
        self.genes.iter().map(|&g| g as f64).collect()
    }
}

/// An evaluated genotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// The evaluated controller encoding.
    pub genotype: Genotype,
    /// Task performance (distance covered), or the death threshold.
    pub fitness: f32,
    /// Behavior descriptor, nominally in `[0, 1]^D`.
    pub descriptor: Vec<f32>,
    /// False when the simulation failed catastrophically.
    pub alive: bool,
}

impl Individual {
    /// Individual produced by a successful simulation.
    pub fn alive(genotype: Genotype, fitness: f32, descriptor: Vec<f32>) -> Self {
        Self {
            genotype,
            fitness,
            descriptor,
            alive: true,
        }
    }

    /// Individual forced to the death sentinel: threshold fitness, zero descriptor.
    pub fn dead(genotype: Genotype, threshold: f32, dimensions: usize) -> Self {
        Self {
            genotype,
            fitness: threshold,
            descriptor: vec![0.0; dimensions],
            alive: false,
        }
    }
}
