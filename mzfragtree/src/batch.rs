//! Build and reduce the graphs for many compounds at once

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info_span, warn};

use crate::{
    candidates::CandidateTable,
    config::FragTreeConfig,
    error::Result,
    graph::{FragmentationGraph, GraphBuilder, GraphReducer, ReductionSummary},
};

/// A reduced graph together with the statistics of its reduction
#[derive(Clone, Debug)]
pub struct CompoundResult {
    /// The name of the compound, with the root formula appended if roots were separated
    pub name: String,
    /// The reduced graph, empty if no subtree reached the lower bound
    pub graph: FragmentationGraph,
    /// What the reduction deleted
    pub summary: ReductionSummary,
}

/// The sizes of a processed compound, for reporting
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct CompoundReport<'a> {
    /// The name of the compound
    pub name: &'a str,
    /// The number of fragments left
    pub fragments: usize,
    /// The number of losses left
    pub losses: usize,
    /// The reduction statistics
    pub summary: &'a ReductionSummary,
}

impl CompoundResult {
    /// A serialisable overview of this result
    pub fn report(&self) -> CompoundReport<'_> {
        CompoundReport {
            name: &self.name,
            fragments: self.graph.fragment_count(),
            losses: self.graph.loss_count(),
            summary: &self.summary,
        }
    }
}

/// Build and reduce the graph of a single compound. With `separate_roots` set one graph per root
/// candidate is made, otherwise a single graph with all roots.
/// # Errors
/// If the configuration or the candidate table is invalid.
pub fn process_table(
    table: &CandidateTable,
    config: &FragTreeConfig,
) -> Result<Vec<CompoundResult>> {
    config.validate()?;
    table.validate()?;
    let _span = info_span!("compound", name = %table.name).entered();
    let builder = GraphBuilder::from_config(&config.building);
    let reducer = GraphReducer::from_config(&config.reduction);
    let tables = if config.separate_roots {
        table.split_roots()
    } else {
        vec![table.clone()]
    };
    Ok(tables
        .iter()
        .map(|table| {
            let mut graph = builder.build(table);
            let summary = reducer.reduce(&mut graph);
            CompoundResult {
                name: table.name.clone(),
                graph,
                summary,
            }
        })
        .collect())
}

/// Process all compounds, in parallel if the `rayon` feature is enabled. Every compound gets its
/// own result in the same order as the input, so a failing compound does not affect the others.
pub fn process_tables(
    tables: &[CandidateTable],
    config: &FragTreeConfig,
) -> Vec<Result<Vec<CompoundResult>>> {
    #[cfg(feature = "rayon")]
    let iter = tables.par_iter();
    #[cfg(not(feature = "rayon"))]
    let iter = tables.iter();
    iter.map(|table| {
        process_table(table, config).inspect_err(|err| {
            warn!(compound = %table.name, %err, "Could not process compound");
        })
    })
    .collect()
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::{
        candidates::{Candidate, ScoredPeak},
        chemistry::Ionization,
    };

    fn table(name: &str) -> CandidateTable {
        CandidateTable::new(
            name,
            Ionization::protonated(),
            ScoredPeak::new(
                0,
                181.0707,
                [
                    Candidate::new(molecular_formula!(C 6 H 12 O 6), 1.0),
                    Candidate::new(molecular_formula!(C 7 H 4 O 5), 0.5),
                ],
            ),
            vec![
                ScoredPeak::new(
                    1,
                    163.0601,
                    [Candidate::new(molecular_formula!(C 6 H 10 O 5), 0.8)],
                ),
                ScoredPeak::new(
                    2,
                    145.0495,
                    [Candidate::new(molecular_formula!(C 6 H 8 O 4), -0.4)],
                ),
            ],
        )
    }

    #[test]
    fn single() {
        let results = process_table(&table("glucose"), &FragTreeConfig::default()).unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.name, "glucose");
        assert_eq!(result.graph.roots().count(), 2);
        assert!(result.summary.passes.last().unwrap().is_empty());
        assert_eq!(result.report().fragments, result.graph.fragment_count());
    }

    #[test]
    fn separate_roots() {
        let config = FragTreeConfig {
            separate_roots: true,
            ..FragTreeConfig::default()
        };
        let results = process_table(&table("glucose"), &config).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.graph.roots().count() == 1));
        assert_eq!(results[0].name, "glucose (C6H12O6)");
    }

    #[test]
    fn failures_are_isolated() {
        let mut broken = table("broken");
        broken.peaks[0].peak.index = 0;
        let results = process_tables(
            &[table("a"), broken, table("b")],
            &FragTreeConfig::default(),
        );
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap()[0].name, "b");
    }
}
