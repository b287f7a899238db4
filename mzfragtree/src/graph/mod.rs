//! The fragmentation graph: fragments (vertices) coloured by the peak they explain, connected by
//! losses (edges) from heavier to lighter fragments.
//!
//! The graph is an arena. Fragments are stored in insertion order, and because the builder only
//! ever adds losses from an already present fragment to a newly added one, the insertion order is
//! a topological order. Deletion marks an element as removed, [`FragmentationGraph::compact`]
//! drops all removed elements and renumbers the arena.

mod builder;
mod reduction;
mod validation;

use std::{
    collections::{HashMap, VecDeque},
    fmt::Display,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

pub use builder::*;
pub use reduction::*;
pub use validation::*;

use crate::{
    candidates::{CandidateTable, Peak},
    chemistry::{Ionization, MolecularFormula},
};

/// The index of a fragment in its graph, also its topological rank
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct FragmentId(usize);

impl FragmentId {
    /// The index into the arena
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Display for FragmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// The index of a loss in its graph
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct LossId(usize);

impl LossId {
    /// The index into the arena
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A vertex: one candidate formula explaining one peak
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Fragment {
    id: FragmentId,
    formula: MolecularFormula,
    mass: f64,
    peak: Peak,
    score: f64,
    root: bool,
    outgoing: Vec<LossId>,
    incoming: Vec<LossId>,
    deleted: bool,
}

impl Fragment {
    /// The id of this fragment in its graph
    pub const fn id(&self) -> FragmentId {
        self.id
    }

    /// The neutral molecular formula
    pub const fn formula(&self) -> &MolecularFormula {
        &self.formula
    }

    /// The monoisotopic mass of the formula
    pub const fn mass(&self) -> f64 {
        self.mass
    }

    /// The colour, this is the index of the peak this fragment explains
    pub const fn colour(&self) -> usize {
        self.peak.index
    }

    /// The peak this fragment explains
    pub const fn peak(&self) -> Peak {
        self.peak
    }

    /// The score for choosing this fragment
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// If this is one of the candidate precursor formulas
    pub const fn is_root(&self) -> bool {
        self.root
    }
}

/// An edge: the loss of atoms going from the source fragment to the lighter target fragment
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Loss {
    id: LossId,
    source: FragmentId,
    target: FragmentId,
    weight: f64,
    deleted: bool,
}

impl Loss {
    /// The id of this loss in its graph
    pub const fn id(&self) -> LossId {
        self.id
    }

    /// The heavier fragment
    pub const fn source(&self) -> FragmentId {
        self.source
    }

    /// The lighter fragment
    pub const fn target(&self) -> FragmentId {
        self.target
    }

    /// The score gained by taking this loss, this includes the score of the target fragment
    pub const fn weight(&self) -> f64 {
        self.weight
    }
}

/// A directed acyclic graph of fragments of a single compound. Only the [`GraphBuilder`] adds
/// elements and only the [`GraphReducer`] removes them.
///
/// The score of a subtree is the score of its root plus the weights of all its losses.
#[derive(Clone, Debug)]
pub struct FragmentationGraph {
    input: Arc<CandidateTable>,
    fragments: Vec<Fragment>,
    losses: Vec<Loss>,
    lookup: HashMap<(usize, MolecularFormula), FragmentId>,
    scores: HashMap<MolecularFormula, f64>,
    live_fragments: usize,
    live_losses: usize,
}

impl FragmentationGraph {
    /// Create an empty graph for the given input
    pub(crate) fn new(input: Arc<CandidateTable>) -> Self {
        Self {
            input,
            fragments: Vec::new(),
            losses: Vec::new(),
            lookup: HashMap::new(),
            scores: HashMap::new(),
            live_fragments: 0,
            live_losses: 0,
        }
    }

    /// The candidate table this graph was built from
    pub fn input(&self) -> &CandidateTable {
        &self.input
    }

    /// The name of the compound
    pub fn name(&self) -> &str {
        &self.input.name
    }

    /// The ionisation of all fragments
    pub fn ionization(&self) -> &Ionization {
        &self.input.ionization
    }

    /// The score of the given formula, as recorded while building the graph
    pub fn score_of(&self, formula: &MolecularFormula) -> Option<f64> {
        self.scores.get(formula).copied()
    }

    /// All recorded formula scores
    pub const fn scores(&self) -> &HashMap<MolecularFormula, f64> {
        &self.scores
    }

    /// Record the score of a formula, only the first score for every formula is kept
    pub(crate) fn record_score(&mut self, formula: &MolecularFormula, score: f64) {
        if !self.scores.contains_key(formula) {
            self.scores.insert(formula.clone(), score);
        }
    }

    /// The number of fragments that are not deleted
    pub const fn fragment_count(&self) -> usize {
        self.live_fragments
    }

    /// The number of losses that are not deleted
    pub const fn loss_count(&self) -> usize {
        self.live_losses
    }

    /// If all fragments are deleted (or none were ever added)
    pub const fn is_empty(&self) -> bool {
        self.live_fragments == 0
    }

    /// The size of the fragment arena, including deleted fragments
    pub(crate) const fn arena_len(&self) -> usize {
        self.fragments.len()
    }

    /// All fragments that are not deleted, in topological order
    pub fn fragments(&self) -> impl DoubleEndedIterator<Item = &Fragment> {
        self.fragments.iter().filter(|f| !f.deleted)
    }

    /// All losses that are not deleted
    pub fn losses(&self) -> impl Iterator<Item = &Loss> {
        self.losses.iter().filter(|l| !l.deleted)
    }

    /// Get a fragment, if it exists and is not deleted
    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id.0).filter(|f| !f.deleted)
    }

    /// Get a loss, if it exists and is not deleted
    pub fn loss(&self, id: LossId) -> Option<&Loss> {
        self.losses.get(id.0).filter(|l| !l.deleted)
    }

    /// Find the fragment explaining the given peak with the given formula
    pub fn find(&self, peak_index: usize, formula: &MolecularFormula) -> Option<FragmentId> {
        self.lookup
            .get(&(peak_index, formula.clone()))
            .copied()
            .filter(|id| !self.fragments[id.0].deleted)
    }

    /// All root fragments that are not deleted
    pub fn roots(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments().filter(|f| f.root)
    }

    /// Check if the given fragment is a root
    pub fn is_root(&self, id: FragmentId) -> bool {
        self.fragment(id).is_some_and(|f| f.root)
    }

    /// The losses leaving the given fragment
    pub fn outgoing(&self, id: FragmentId) -> impl Iterator<Item = &Loss> {
        self.fragments[id.0]
            .outgoing
            .iter()
            .map(|l| &self.losses[l.0])
            .filter(|l| !l.deleted)
    }

    /// The losses arriving at the given fragment
    pub fn incoming(&self, id: FragmentId) -> impl Iterator<Item = &Loss> {
        self.fragments[id.0]
            .incoming
            .iter()
            .map(|l| &self.losses[l.0])
            .filter(|l| !l.deleted)
    }

    /// The number of losses arriving at the given fragment
    pub fn in_degree(&self, id: FragmentId) -> usize {
        self.incoming(id).count()
    }

    /// The number of losses leaving the given fragment
    pub fn out_degree(&self, id: FragmentId) -> usize {
        self.outgoing(id).count()
    }

    /// The formula that is lost going over this loss
    pub fn loss_formula(&self, loss: &Loss) -> MolecularFormula {
        &self.fragments[loss.source.0].formula - &self.fragments[loss.target.0].formula
    }

    /// The score of a subtree given as its root and its losses: the root score plus the weight
    /// of all losses. Returns `None` if any element is deleted.
    pub fn tree_score(&self, root: FragmentId, losses: &[LossId]) -> Option<f64> {
        let mut score = self.fragment(root)?.score;
        for id in losses {
            score += self.loss(*id)?.weight;
        }
        Some(score)
    }

    /// Sort all fragments topologically with Kahn's algorithm, independent of the arena order.
    /// # Panics
    /// If the graph contains a cycle.
    pub fn topological_order(&self) -> Vec<FragmentId> {
        let mut in_degree = self
            .fragments
            .iter()
            .map(|f| if f.deleted { 0 } else { self.in_degree(f.id) })
            .collect::<Vec<_>>();
        let mut queue = self
            .fragments()
            .filter(|f| in_degree[f.id.0] == 0)
            .map(|f| f.id)
            .collect::<VecDeque<_>>();
        let mut order = Vec::with_capacity(self.live_fragments);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for loss in self.outgoing(id) {
                in_degree[loss.target.0] -= 1;
                if in_degree[loss.target.0] == 0 {
                    queue.push_back(loss.target);
                }
            }
        }
        assert_eq!(
            order.len(),
            self.live_fragments,
            "The fragmentation graph of '{}' contains a cycle",
            self.name()
        );
        order
    }

    /// Add a fragment, roots have to be added before any other fragment.
    /// # Panics
    /// If a fragment with the same formula already exists for this peak or if a root is added
    /// after a non root fragment.
    pub(crate) fn add_fragment(
        &mut self,
        formula: MolecularFormula,
        peak: Peak,
        score: f64,
        root: bool,
    ) -> FragmentId {
        assert!(
            !root || self.fragments.iter().all(|f| f.root),
            "Root {formula} added after non root fragments"
        );
        let id = FragmentId(self.fragments.len());
        let previous = self.lookup.insert((peak.index, formula.clone()), id);
        assert!(
            previous.is_none(),
            "Duplicate fragment {formula} for peak {}",
            peak.index
        );
        self.fragments.push(Fragment {
            id,
            mass: formula.monoisotopic_mass(),
            formula,
            peak,
            score,
            root,
            outgoing: Vec::new(),
            incoming: Vec::new(),
            deleted: false,
        });
        self.live_fragments += 1;
        id
    }

    /// Add a loss from a heavier to a lighter fragment.
    /// # Panics
    /// If the loss would break the topological order, the mass is not strictly decreasing, the
    /// target formula is not contained in the source formula, the target is a root, or the
    /// weight is not finite.
    pub(crate) fn add_loss(&mut self, source: FragmentId, target: FragmentId, weight: f64) -> LossId {
        let (from, to) = (&self.fragments[source.0], &self.fragments[target.0]);
        assert!(
            source < target,
            "Loss {source}->{target} breaks the topological order"
        );
        assert!(
            from.mass > to.mass,
            "Loss {}->{} does not decrease in mass",
            from.formula,
            to.formula
        );
        assert!(
            from.formula.contains(&to.formula),
            "Loss {}->{} is chemically impossible",
            from.formula,
            to.formula
        );
        assert!(!to.root, "Loss into root {}", to.formula);
        assert!(!from.deleted && !to.deleted, "Loss between deleted fragments");
        assert!(weight.is_finite(), "Loss weight {weight} is not finite");
        let id = LossId(self.losses.len());
        self.losses.push(Loss {
            id,
            source,
            target,
            weight,
            deleted: false,
        });
        self.fragments[source.0].outgoing.push(id);
        self.fragments[target.0].incoming.push(id);
        self.live_losses += 1;
        id
    }

    /// Mark a loss as deleted, returns if it was not yet deleted
    pub(crate) fn delete_loss(&mut self, id: LossId) -> bool {
        let loss = &mut self.losses[id.0];
        if loss.deleted {
            false
        } else {
            loss.deleted = true;
            self.live_losses -= 1;
            true
        }
    }

    /// Mark a fragment and all its losses as deleted, returns the number of deleted losses
    pub(crate) fn delete_fragment(&mut self, id: FragmentId) -> usize {
        if self.fragments[id.0].deleted {
            return 0;
        }
        self.fragments[id.0].deleted = true;
        self.live_fragments -= 1;
        let attached = self.fragments[id.0]
            .outgoing
            .iter()
            .chain(&self.fragments[id.0].incoming)
            .copied()
            .collect::<Vec<_>>();
        attached
            .into_iter()
            .filter(|loss| self.delete_loss(*loss))
            .count()
    }

    /// Remove all deleted elements from the arena, this renumbers all fragments and losses while
    /// keeping their relative order.
    pub fn compact(&mut self) {
        let mut fragment_map = vec![None; self.fragments.len()];
        let mut fragments = Vec::with_capacity(self.live_fragments);
        for fragment in std::mem::take(&mut self.fragments) {
            if !fragment.deleted {
                let id = FragmentId(fragments.len());
                fragment_map[fragment.id.0] = Some(id);
                fragments.push(Fragment {
                    id,
                    outgoing: Vec::new(),
                    incoming: Vec::new(),
                    ..fragment
                });
            }
        }
        let mut losses = Vec::with_capacity(self.live_losses);
        for loss in std::mem::take(&mut self.losses) {
            if loss.deleted {
                continue;
            }
            let (Some(source), Some(target)) =
                (fragment_map[loss.source.0], fragment_map[loss.target.0])
            else {
                unreachable!("A live loss is attached to a deleted fragment");
            };
            let id = LossId(losses.len());
            fragments[source.0].outgoing.push(id);
            fragments[target.0].incoming.push(id);
            losses.push(Loss {
                id,
                source,
                target,
                ..loss
            });
        }
        self.lookup = fragments
            .iter()
            .map(|f| ((f.peak.index, f.formula.clone()), f.id))
            .collect();
        self.fragments = fragments;
        self.losses = losses;
    }
}
