#![doc = include_str!("../README.md")]

/// Contains the chemistry needed to relate fragments: elements, molecular formulas and ionisation.
#[macro_use]
pub mod chemistry;
pub mod batch;
pub mod candidates;
pub mod config;
mod error;
pub mod graph;

pub use error::{FragTreeError, Result};

/// The types and functions that are used the most, importing this is a good starting point for working with the crate
pub mod prelude {
    pub use crate::batch::{CompoundResult, process_table, process_tables};
    pub use crate::candidates::{Candidate, CandidateTable, Peak, ScoredPeak};
    pub use crate::chemistry::{Element, Ionization, MolecularFormula, Tolerance};
    pub use crate::config::{FragTreeConfig, GraphBuildingConfig, ReductionConfig};
    pub use crate::error::{FragTreeError, Result};
    pub use crate::graph::{
        FragmentId, FragmentationGraph, GraphBuilder, GraphReducer, LossId, LossScorer,
        LossValidator, ReductionSummary,
    };
    pub use crate::molecular_formula;
}

#[cfg(test)]
use rand as _;
#[cfg(test)]
use tracing_subscriber as _;
