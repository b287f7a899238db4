use std::collections::HashSet;

use crate::{
    candidates::Peak,
    chemistry::MolecularFormula,
    graph::Fragment,
};

/// A loss that the builder is about to add to the graph
#[derive(Clone, Copy, Debug)]
pub struct ProposedLoss<'a> {
    /// The heavier fragment already in the graph
    pub source: &'a Fragment,
    /// The formula of the lighter fragment
    pub target: &'a MolecularFormula,
    /// The peak explained by the lighter fragment
    pub target_peak: Peak,
    /// The formula lost, `source - target`
    pub loss: &'a MolecularFormula,
}

/// Veto losses before they are added to the graph. A loss is only added if all validators allow it.
pub trait LossValidator: Send + Sync {
    /// Check if this loss is allowed
    fn is_valid(&self, loss: &ProposedLoss<'_>) -> bool;
}

impl<F: Fn(&ProposedLoss<'_>) -> bool + Send + Sync> LossValidator for F {
    fn is_valid(&self, loss: &ProposedLoss<'_>) -> bool {
        self(loss)
    }
}

/// Score a loss, the scores of all scorers are added to the weight of the loss.
pub trait LossScorer: Send + Sync {
    /// The score for this loss
    fn score(&self, loss: &ProposedLoss<'_>) -> f64;
}

impl<F: Fn(&ProposedLoss<'_>) -> f64 + Send + Sync> LossScorer for F {
    fn score(&self, loss: &ProposedLoss<'_>) -> f64 {
        self(loss)
    }
}

/// Only allow losses up to a maximal monoisotopic mass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaximumLossMass(pub f64);

impl LossValidator for MaximumLossMass {
    fn is_valid(&self, loss: &ProposedLoss<'_>) -> bool {
        loss.loss.monoisotopic_mass() <= self.0
    }
}

/// Forbid losses with exactly one of these formulas
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForbiddenLosses(pub HashSet<MolecularFormula>);

impl LossValidator for ForbiddenLosses {
    fn is_valid(&self, loss: &ProposedLoss<'_>) -> bool {
        !self.0.contains(loss.loss)
    }
}

impl FromIterator<MolecularFormula> for ForbiddenLosses {
    fn from_iter<T: IntoIterator<Item = MolecularFormula>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
