//! Shrink a fragmentation graph without losing any subtree that scores at least the lower bound.
//!
//! Every pass computes, bottom up, an upper bound for the score that can still be gained below
//! every fragment. Because a colourful subtree uses every colour at most once, the sum over all
//! reachable colours of the best edge into that colour is such a bound. Losses that cannot be part
//! of any subtree reaching the lower bound are deleted, as are fragments that lost all incoming
//! losses. This is repeated until a pass deletes nothing.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    config::ReductionConfig,
    graph::{FragmentId, FragmentationGraph},
};

/// The number of elements deleted in one pass
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PassStatistics {
    /// Deleted losses, including those removed together with a fragment
    pub losses: usize,
    /// Deleted fragments
    pub fragments: usize,
}

impl PassStatistics {
    /// If nothing was deleted in this pass
    pub const fn is_empty(&self) -> bool {
        self.losses == 0 && self.fragments == 0
    }
}

/// The result of a full reduction
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReductionSummary {
    /// The statistics of every pass, the last pass deleted nothing unless the pass limit was hit
    pub passes: Vec<PassStatistics>,
    /// The number of fragments before the reduction
    pub fragments_before: usize,
    /// The number of losses before the reduction
    pub losses_before: usize,
    /// The number of fragments after the reduction
    pub fragments_after: usize,
    /// The number of losses after the reduction
    pub losses_after: usize,
}

impl ReductionSummary {
    /// The total number of deleted fragments and losses
    pub fn deleted(&self) -> PassStatistics {
        self.passes
            .iter()
            .fold(PassStatistics::default(), |acc, pass| PassStatistics {
                losses: acc.losses + pass.losses,
                fragments: acc.fragments + pass.fragments,
            })
    }
}

/// The bounds kept between passes. Use [`GraphReducer`] for a full reduction, this is only
/// needed to inspect the bounds of single passes.
///
/// The state is bound to the arena layout of the graph it was made for, so it cannot be used
/// anymore after [`FragmentationGraph::compact`].
#[derive(Clone, Debug)]
pub struct ReductionState {
    upperbounds: Vec<f64>,
    colours: Vec<BTreeMap<usize, f64>>,
}

impl ReductionState {
    /// Create a state for the given graph, with all bounds infinite
    pub fn new(graph: &FragmentationGraph) -> Self {
        Self {
            upperbounds: vec![f64::INFINITY; graph.arena_len()],
            colours: vec![BTreeMap::new(); graph.arena_len()],
        }
    }

    /// The upper bound for the score of any subtree hanging below this fragment (excluding the
    /// fragment itself)
    pub fn upperbound(&self, id: FragmentId) -> f64 {
        self.upperbounds[id.index()]
    }

    /// The upper bounds for all fragments, indexed by arena index, deleted fragments keep their last bound
    pub fn upperbounds(&self) -> &[f64] {
        &self.upperbounds
    }

    /// Compute the upper bounds for all fragments, children before parents. A bound never
    /// increases compared to the previous pass.
    pub fn compute_bounds(&mut self, graph: &FragmentationGraph) -> &[f64] {
        for fragment in graph.fragments().rev() {
            let u = fragment.id().index();
            let mut direct: BTreeMap<usize, f64> = BTreeMap::new();
            let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
            for loss in graph.outgoing(fragment.id()) {
                let v = loss.target().index();
                let colour = graph.fragments[v].peak.index;
                debug_assert!(v > u, "Bounds are computed in topological order");

                let through = (self.upperbounds[v] + loss.weight()).max(0.0);
                keep_max(&mut direct, colour, through);
                keep_max(&mut merged, colour, loss.weight().max(0.0));
                for (deeper, score) in &self.colours[v] {
                    keep_max(&mut merged, *deeper, *score);
                }
            }
            let provisional = direct.values().sum::<f64>();
            let colourful = merged.values().sum::<f64>();
            self.upperbounds[u] = provisional.min(colourful).min(self.upperbounds[u]).max(0.0);
            self.colours[u] = merged;
        }
        &self.upperbounds
    }

    /// Delete all losses and fragments that cannot be part of a subtree scoring at least
    /// `lowerbound`, using the bounds from the last [`Self::compute_bounds`].
    ///
    /// Fragments are visited parents first. For every fragment the best `root score + root bound`
    /// of all roots that still reach it is tracked, any subtree using a loss `u→v` scores at most
    /// that plus `min(0, weight + bound(v))`.
    pub fn delete(&self, graph: &mut FragmentationGraph, lowerbound: f64) -> PassStatistics {
        let mut statistics = PassStatistics::default();
        let mut reach = vec![f64::NEG_INFINITY; graph.arena_len()];
        for u in 0..graph.arena_len() {
            let Some(fragment) = graph.fragment(FragmentId(u)) else {
                continue;
            };
            let (id, root) = (fragment.id(), fragment.is_root());
            let best = if root {
                fragment.score() + self.upperbounds[u]
            } else {
                graph
                    .incoming(id)
                    .map(|loss| reach[loss.source().index()])
                    .fold(f64::NEG_INFINITY, f64::max)
            };
            reach[u] = best;

            if (root && best < lowerbound) || (!root && graph.in_degree(id) == 0) {
                statistics.losses += graph.delete_fragment(id);
                statistics.fragments += 1;
                continue;
            }

            let doomed = graph
                .outgoing(id)
                .filter(|loss| {
                    best + (loss.weight() + self.upperbounds[loss.target().index()]).min(0.0)
                        < lowerbound
                })
                .map(|loss| loss.id())
                .collect::<Vec<_>>();
            for loss in doomed {
                if graph.delete_loss(loss) {
                    statistics.losses += 1;
                }
            }
        }
        statistics
    }
}

fn keep_max(map: &mut BTreeMap<usize, f64>, colour: usize, score: f64) {
    map.entry(colour)
        .and_modify(|current| *current = current.max(score))
        .or_insert(score);
}

/// Reduce fragmentation graphs to a fixpoint, see the [module documentation](self)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphReducer {
    lowerbound: f64,
    max_passes: Option<usize>,
}

impl GraphReducer {
    /// A reducer keeping every subtree that scores at least `lowerbound`
    pub const fn new(lowerbound: f64) -> Self {
        Self {
            lowerbound,
            max_passes: None,
        }
    }

    /// Create a reducer from the configuration
    pub const fn from_config(config: &ReductionConfig) -> Self {
        Self {
            lowerbound: config.lowerbound,
            max_passes: config.max_passes,
        }
    }

    /// Stop after this many passes even if the fixpoint is not reached yet. Every pass only
    /// deletes what is provably not needed so stopping early is always safe.
    #[must_use]
    pub const fn with_max_passes(mut self, max_passes: Option<usize>) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// The lower bound
    pub const fn lowerbound(&self) -> f64 {
        self.lowerbound
    }

    /// Reduce the graph in place, afterwards the graph is compacted. An empty graph signals that
    /// no subtree reaches the lower bound.
    #[instrument(level = "debug", skip_all, fields(compound = %graph.name(), lowerbound = self.lowerbound))]
    pub fn reduce(&self, graph: &mut FragmentationGraph) -> ReductionSummary {
        let mut summary = ReductionSummary {
            fragments_before: graph.fragment_count(),
            losses_before: graph.loss_count(),
            ..ReductionSummary::default()
        };
        let mut state = ReductionState::new(graph);
        loop {
            state.compute_bounds(graph);
            let pass = state.delete(graph, self.lowerbound);
            debug!(
                pass = summary.passes.len() + 1,
                losses = pass.losses,
                fragments = pass.fragments,
                "Reduction pass"
            );
            summary.passes.push(pass);
            if pass.is_empty() || self.max_passes.is_some_and(|max| summary.passes.len() >= max) {
                break;
            }
        }
        graph.compact();
        summary.fragments_after = graph.fragment_count();
        summary.losses_after = graph.loss_count();
        debug!(
            fragments = summary.fragments_after,
            losses = summary.losses_after,
            passes = summary.passes.len(),
            "Reduced fragmentation graph"
        );
        summary
    }
}

/// Reduce the graph with the given lower bound, see [`GraphReducer::reduce`]
pub fn reduce(mut graph: FragmentationGraph, lowerbound: f64) -> FragmentationGraph {
    GraphReducer::new(lowerbound).reduce(&mut graph);
    graph
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
#[allow(clippy::float_cmp)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        candidates::{CandidateTable, Peak, ScoredPeak},
        chemistry::Ionization,
    };

    fn peak(index: usize, mz: f64) -> Peak {
        Peak { index, mz }
    }

    /// A root with two children of the same colour and one grandchild reachable from both
    fn diamond() -> FragmentationGraph {
        let mut graph = FragmentationGraph::new(Arc::new(CandidateTable::new(
            "diamond",
            Ionization::protonated(),
            ScoredPeak::new(0, 200.0, []),
            Vec::new(),
        )));
        let root = graph.add_fragment(molecular_formula!(C 6 H 12 O 6), peak(0, 181.0), 1.0, true);
        let a = graph.add_fragment(molecular_formula!(C 6 H 10 O 5), peak(1, 163.0), 2.0, false);
        let b = graph.add_fragment(molecular_formula!(C 5 H 12 O 5), peak(1, 163.0), 3.0, false);
        let c = graph.add_fragment(molecular_formula!(C 4 H 8 O 4), peak(2, 121.0), 0.5, false);
        graph.add_loss(root, a, 2.0);
        graph.add_loss(root, b, 3.0);
        graph.add_loss(a, c, 0.5);
        graph.add_loss(b, c, -1.0);
        graph
    }

    #[test]
    fn colours_are_counted_once() {
        let graph = diamond();
        let mut state = ReductionState::new(&graph);
        state.compute_bounds(&graph);
        assert_eq!(state.upperbound(FragmentId(3)), 0.0);
        assert_eq!(state.upperbound(FragmentId(1)), 0.5);
        assert_eq!(state.upperbound(FragmentId(2)), 0.0);
        // Direct: max(2.5, 3.0) for colour 1, merged: 3.0 for colour 1 plus 0.5 for colour 2
        assert_eq!(state.upperbound(FragmentId(0)), 3.0);
    }

    #[test]
    fn nothing_to_delete() {
        let mut graph = diamond();
        let summary = GraphReducer::new(-10.0).reduce(&mut graph);
        assert_eq!(summary.passes, vec![PassStatistics::default()]);
        assert_eq!(summary.deleted(), PassStatistics::default());
        assert_eq!(graph.fragment_count(), 4);
        assert_eq!(graph.loss_count(), 4);
    }

    #[test]
    fn negative_loss_removed() {
        let mut graph = diamond();
        // The best tree is root -> b at 4.0, b -> c can only lead to 3.0
        let summary = GraphReducer::new(3.8).reduce(&mut graph);
        assert_eq!(summary.deleted().losses, 1);
        assert_eq!(summary.deleted().fragments, 0);
        assert_eq!(graph.loss_count(), 3);
        let b = graph.find(1, &molecular_formula!(C 5 H 12 O 5)).unwrap();
        assert_eq!(graph.out_degree(b), 0);

        // At zero root -> b -> c still scores 3.0 so it has to stay
        let graph = reduce(diamond(), 0.0);
        assert_eq!(graph.loss_count(), 4);
    }

    #[test]
    fn high_lowerbound() {
        let reduced = reduce(diamond(), 4.5);
        assert!(reduced.is_empty());
        assert_eq!(reduced.loss_count(), 0);
    }

    #[test]
    fn empty_graph() {
        let mut graph = FragmentationGraph::new(Arc::new(CandidateTable::new(
            "empty",
            Ionization::protonated(),
            ScoredPeak::new(0, 200.0, []),
            Vec::new(),
        )));
        let summary = GraphReducer::new(0.0).reduce(&mut graph);
        assert_eq!(summary.passes.len(), 1);
        assert!(graph.is_empty());
    }
}
