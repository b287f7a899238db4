use std::{collections::HashSet, fmt::Debug, sync::Arc};

use tracing::{debug, instrument, trace};

use crate::{
    candidates::{Candidate, CandidateTable, Peak, ScoredPeak},
    chemistry::{MolecularFormula, Tolerance},
    config::GraphBuildingConfig,
    graph::{FragmentId, FragmentationGraph, LossScorer, LossValidator, ProposedLoss},
};

/// Builds a [`FragmentationGraph`] from a [`CandidateTable`].
///
/// The roots are added first, after which all other peaks are added in order of decreasing m/z.
/// A candidate fragment is connected to every already present fragment of a heavier peak that
/// contains its formula, the fragment itself is only created if at least one such loss exists.
pub struct GraphBuilder {
    validators: Vec<Box<dyn LossValidator>>,
    scorers: Vec<Box<dyn LossScorer>>,
    max_deviation: Option<Tolerance>,
}

impl Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("validators", &self.validators.len())
            .field("scorers", &self.scorers.len())
            .field("max_deviation", &self.max_deviation)
            .finish()
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// A builder without any validators or scorers that does not check the peak m/z
    pub const fn new() -> Self {
        Self {
            validators: Vec::new(),
            scorers: Vec::new(),
            max_deviation: None,
        }
    }

    /// A builder with the validators and m/z check set in the configuration
    pub fn from_config(config: &GraphBuildingConfig) -> Self {
        Self {
            validators: config.validators(),
            scorers: Vec::new(),
            max_deviation: config.max_deviation,
        }
    }

    /// Add a validator, a loss is only added if all validators allow it
    #[must_use]
    pub fn with_validator(mut self, validator: impl LossValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Add a scorer, its score is added to the weight of every loss
    #[must_use]
    pub fn with_scorer(mut self, scorer: impl LossScorer + 'static) -> Self {
        self.scorers.push(Box::new(scorer));
        self
    }

    /// Reject candidates whose ion m/z is higher than the peak m/z plus this tolerance
    #[must_use]
    pub const fn with_max_deviation(mut self, tolerance: Option<Tolerance>) -> Self {
        self.max_deviation = tolerance;
        self
    }

    /// Build the full graph: initialise, add the roots, and fill it with all other peaks
    #[instrument(level = "debug", skip_all, fields(compound = %table.name))]
    pub fn build(&self, table: &CandidateTable) -> FragmentationGraph {
        let mut graph = self.initialize_empty_graph(Arc::new(table.clone()));
        let parent = table.parent.peak;
        self.add_root(&mut graph, parent, table.roots());
        self.fill_graph(&mut graph);
        debug!(
            fragments = graph.fragment_count(),
            losses = graph.loss_count(),
            "Built fragmentation graph"
        );
        graph
    }

    /// Create an empty graph for this input
    pub fn initialize_empty_graph(&self, input: Arc<CandidateTable>) -> FragmentationGraph {
        FragmentationGraph::new(input)
    }

    /// Add one root fragment for every candidate root formula, returns the number of added roots.
    /// Roots with a non finite score, a non positive mass, or an ion m/z above the parent peak are
    /// skipped.
    pub fn add_root(
        &self,
        graph: &mut FragmentationGraph,
        parent: Peak,
        roots: &[Candidate],
    ) -> usize {
        let mut added = 0;
        for root in roots {
            if !root.score.is_finite() {
                trace!(formula = %root.formula, score = root.score, "Rejected root with non finite score");
                continue;
            }
            let mass = root.formula.monoisotopic_mass();
            if mass <= 0.0 || root.formula.contains_negative_amount() {
                trace!(formula = %root.formula, "Rejected root with non positive mass");
                continue;
            }
            if !self.below_peak(graph, parent, mass) {
                trace!(formula = %root.formula, mz = parent.mz, "Rejected root heavier than its peak");
                continue;
            }
            if graph.find(parent.index, &root.formula).is_some() {
                trace!(formula = %root.formula, "Rejected duplicate root");
                continue;
            }
            graph.add_fragment(root.formula.clone(), parent, root.score, true);
            graph.record_score(&root.formula, root.score);
            added += 1;
        }
        added
    }

    /// Add all non parent peaks to the graph in order of strictly decreasing m/z
    pub fn fill_graph(&self, graph: &mut FragmentationGraph) {
        let input = Arc::clone(&graph.input);
        let union = graph
            .roots()
            .fold(MolecularFormula::default(), |acc, root| acc.union(root.formula()));
        let union_mass = union.monoisotopic_mass();
        for scored in input.peaks_by_decreasing_mz() {
            self.add_peak(graph, scored, &union, union_mass);
        }
    }

    fn add_peak(
        &self,
        graph: &mut FragmentationGraph,
        scored: &ScoredPeak,
        union: &MolecularFormula,
        union_mass: f64,
    ) {
        let peak = scored.peak;
        let mut seen = HashSet::new();
        for candidate in &scored.candidates {
            if !seen.insert(&candidate.formula) {
                trace!(formula = %candidate.formula, peak = peak.index, "Skipped duplicate candidate");
                continue;
            }
            if !candidate.score.is_finite() {
                trace!(formula = %candidate.formula, peak = peak.index, score = candidate.score, "Rejected candidate with non finite score");
                continue;
            }
            let mass = candidate.formula.monoisotopic_mass();
            if mass >= union_mass
                || candidate.formula.contains_negative_amount()
                || !union.contains(&candidate.formula)
            {
                trace!(formula = %candidate.formula, peak = peak.index, "Rejected candidate not contained in the precursor");
                continue;
            }
            if !self.below_peak(graph, peak, mass) {
                trace!(formula = %candidate.formula, peak = peak.index, "Rejected candidate heavier than its peak");
                continue;
            }
            graph.record_score(&candidate.formula, candidate.score);

            let ancestors = self.ancestors(graph, peak, candidate, mass);
            if ancestors.is_empty() {
                continue;
            }
            let target =
                graph.add_fragment(candidate.formula.clone(), peak, candidate.score, false);
            for (source, weight) in ancestors {
                graph.add_loss(source, target, weight);
            }
        }
    }

    /// Find all fragments that can lose some atoms to give this candidate, with the weight of that loss
    fn ancestors(
        &self,
        graph: &FragmentationGraph,
        peak: Peak,
        candidate: &Candidate,
        mass: f64,
    ) -> Vec<(FragmentId, f64)> {
        graph
            .fragments()
            .filter(|f| f.colour() != peak.index && f.peak().mz > peak.mz)
            .filter(|f| f.mass() > mass && f.formula().contains(&candidate.formula))
            .filter_map(|source| {
                let loss = source.formula() - &candidate.formula;
                let proposal = ProposedLoss {
                    source,
                    target: &candidate.formula,
                    target_peak: peak,
                    loss: &loss,
                };
                self.validators
                    .iter()
                    .all(|v| v.is_valid(&proposal))
                    .then(|| {
                        let bonus = self.scorers.iter().map(|s| s.score(&proposal)).sum::<f64>();
                        (source.id(), candidate.score + bonus)
                    })
            })
            .collect()
    }

    fn below_peak(&self, graph: &FragmentationGraph, peak: Peak, mass: f64) -> bool {
        self.max_deviation.is_none_or(|tolerance| {
            graph.ionization().mz(mass) <= peak.mz + tolerance.deviation(peak.mz)
        })
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::{
        candidates::ScoredPeak,
        chemistry::Ionization,
        graph::MaximumLossMass,
    };

    fn candidate(formula: MolecularFormula, score: f64) -> Candidate {
        Candidate::new(formula, score)
    }

    fn glucose() -> CandidateTable {
        CandidateTable::new(
            "glucose",
            Ionization::protonated(),
            ScoredPeak::new(0, 181.071, [candidate(molecular_formula!(C 6 H 12 O 6), 1.0)]),
            vec![
                ScoredPeak::new(2, 145.05, [candidate(molecular_formula!(C 6 H 8 O 4), 0.5)]),
                ScoredPeak::new(1, 163.06, [candidate(molecular_formula!(C 6 H 10 O 5), 0.8)]),
                ScoredPeak::new(
                    3,
                    85.03,
                    [
                        candidate(molecular_formula!(C 4 H 4 O 2), 0.3),
                        candidate(molecular_formula!(C 4 H 4 O 2), 9.0),
                        candidate(molecular_formula!(C 3 N 1 O 2), 0.1),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn build() {
        let graph = GraphBuilder::new().build(&glucose());
        assert_eq!(graph.fragment_count(), 4);
        // root -> 1, root -> 2, root -> 3, 1 -> 2, 1 -> 3, 2 -> 3
        assert_eq!(graph.loss_count(), 6);
        assert_eq!(graph.roots().count(), 1);
        let order = graph
            .fragments()
            .map(|f| f.colour())
            .collect::<Vec<_>>();
        assert_eq!(order, vec![0, 1, 2, 3]);
        let last = graph.find(3, &molecular_formula!(C 4 H 4 O 2)).unwrap();
        assert!(
            graph.incoming(last).all(|l| (l.weight() - 0.3).abs() < f64::EPSILON),
            "the first duplicate candidate wins"
        );
        assert_eq!(graph.score_of(&molecular_formula!(C 4 H 4 O 2)), Some(0.3));
        assert_eq!(graph.score_of(&molecular_formula!(C 3 N 1 O 2)), None);
    }

    #[test]
    fn validators() {
        let graph = GraphBuilder::new()
            .with_validator(MaximumLossMass(40.0))
            .build(&glucose());
        // Every loss towards C4H4O2 is at least 60 Da, so that fragment disappears
        assert!(graph.find(3, &molecular_formula!(C 4 H 4 O 2)).is_none());
        assert!(graph.losses().all(|l| graph.loss_formula(l).monoisotopic_mass() <= 40.0));
        let forbid_water = |loss: &ProposedLoss<'_>| *loss.loss != molecular_formula!(H 2 O 1);
        let graph = GraphBuilder::new()
            .with_validator(forbid_water)
            .build(&glucose());
        assert!(
            graph
                .losses()
                .all(|l| graph.loss_formula(l) != molecular_formula!(H 2 O 1))
        );
        assert!(graph.find(1, &molecular_formula!(C 6 H 10 O 5)).is_none());
    }

    #[test]
    fn scorers() {
        let graph = GraphBuilder::new()
            .with_scorer(|_: &ProposedLoss<'_>| -1.0)
            .build(&glucose());
        let water_loss = graph.find(1, &molecular_formula!(C 6 H 10 O 5)).unwrap();
        let loss = graph.incoming(water_loss).next().unwrap();
        assert!((loss.weight() - (0.8 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn heavier_than_peak() {
        let mut table = glucose();
        table.peaks[1].peak.mz = 150.0;
        let graph = GraphBuilder::new()
            .with_max_deviation(Some(Tolerance::Ppm(10.0)))
            .build(&table);
        assert!(graph.find(1, &molecular_formula!(C 6 H 10 O 5)).is_none());
        let graph = GraphBuilder::new().build(&table);
        assert!(graph.find(1, &molecular_formula!(C 6 H 10 O 5)).is_some());
    }

    #[test]
    fn non_finite_scores() {
        let mut table = glucose();
        table.peaks[2].candidates = vec![
            candidate(molecular_formula!(C 4 H 4 O 2), f64::NEG_INFINITY),
            candidate(molecular_formula!(C 3 N 1 O 2), f64::NAN),
        ];
        let graph = GraphBuilder::new().build(&table);
        assert_eq!(graph.fragment_count(), 3);
        assert!(graph.fragments().all(|f| f.colour() != 3));
        assert_eq!(graph.score_of(&molecular_formula!(C 4 H 4 O 2)), None);

        table
            .parent
            .candidates
            .insert(0, candidate(molecular_formula!(C 6 H 12 O 6), f64::INFINITY));
        let graph = GraphBuilder::new().build(&table);
        assert_eq!(graph.roots().count(), 1);
        assert!(graph.roots().all(|r| r.score().is_finite()));
        assert!(graph.losses().all(|l| l.weight().is_finite()));
    }

    #[test]
    fn multiple_roots() {
        let mut table = glucose();
        table
            .parent
            .candidates
            .push(candidate(molecular_formula!(C 5 H 12 N 1 O 5), 0.5));
        let graph = GraphBuilder::new().build(&table);
        assert_eq!(graph.roots().count(), 2);
        assert!(graph.roots().all(|r| r.colour() == 0));
        assert!(graph.roots().all(|r| graph.in_degree(r.id()) == 0));
        // C3NO2 is contained in the union of both roots
        assert!(graph.find(3, &molecular_formula!(C 3 N 1 O 2)).is_some());
    }
}
