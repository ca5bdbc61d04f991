//! Compute module - Simulation collaborators and the MAP-Elites search.

mod controller;
mod hexapod;
mod simulator;

pub mod evolution;

pub use controller::*;
pub use hexapod::*;
pub use simulator::*;
