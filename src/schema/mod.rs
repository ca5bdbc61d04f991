//! Schema module - Configuration, genotype and result types for gait search.

mod config;
mod evolution;
mod genotype;

pub use config::*;
pub use evolution::*;
pub use genotype::{GeneDomain, Genotype, Individual};
