//! The scored molecular formula candidates for all peaks of a single spectrum

use std::{cmp::Reverse, collections::HashSet, io::Read};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    chemistry::{Ionization, MolecularFormula},
    error::{FragTreeError, Result},
};

/// A measured peak, the index is the identity of the peak and is used as the colour of all
/// fragments explaining this peak.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Peak {
    /// The 0-based index of this peak
    pub index: usize,
    /// The measured m/z
    pub mz: f64,
}

/// A possible explanation for a peak as given by the mass decomposer together with its score
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Candidate {
    /// The neutral molecular formula
    pub formula: MolecularFormula,
    /// The score for explaining the peak with this formula
    pub score: f64,
}

impl Candidate {
    /// Create a new candidate
    pub const fn new(formula: MolecularFormula, score: f64) -> Self {
        Self { formula, score }
    }
}

/// A peak with all its candidate formulas, in the order they were given
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScoredPeak {
    /// The peak itself
    #[serde(flatten)]
    pub peak: Peak,
    /// The candidate formulas, may be empty
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl ScoredPeak {
    /// Create a new peak with its candidates
    pub fn new(index: usize, mz: f64, candidates: impl IntoIterator<Item = Candidate>) -> Self {
        Self {
            peak: Peak { index, mz },
            candidates: candidates.into_iter().collect(),
        }
    }
}

/// The candidate table of one compound: the parent peak with the candidate root (precursor)
/// formulas and all other peaks with their candidate fragment formulas.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CandidateTable {
    /// A name to identify the compound in logs and errors
    #[serde(default)]
    pub name: String,
    /// The ionisation of the precursor and all its fragments
    #[serde(default)]
    pub ionization: Ionization,
    /// The parent peak, its candidates are the possible root formulas
    pub parent: ScoredPeak,
    /// All fragment peaks
    #[serde(default)]
    pub peaks: Vec<ScoredPeak>,
}

impl CandidateTable {
    /// Create a new candidate table
    pub fn new(
        name: impl Into<String>,
        ionization: Ionization,
        parent: ScoredPeak,
        peaks: Vec<ScoredPeak>,
    ) -> Self {
        Self {
            name: name.into(),
            ionization,
            parent,
            peaks,
        }
    }

    /// Parse a candidate table from JSON and validate it.
    /// # Errors
    /// If the JSON is not valid or the table does not pass [`Self::validate`].
    pub fn from_json(text: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(text)?;
        table.validate()?;
        Ok(table)
    }

    /// Read a candidate table as JSON from the given reader and validate it.
    /// # Errors
    /// If the reader fails, the JSON is not valid or the table does not pass [`Self::validate`].
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let table: Self = serde_json::from_reader(reader)?;
        table.validate()?;
        Ok(table)
    }

    /// Check that the peak indices are unique and all numbers are finite.
    /// # Errors
    /// When any of the rules is broken.
    pub fn validate(&self) -> Result<()> {
        self.ionization.validate()?;
        let mut seen = HashSet::new();
        for scored in std::iter::once(&self.parent).chain(&self.peaks) {
            if !seen.insert(scored.peak.index) {
                return Err(self.invalid(format!("duplicate peak index {}", scored.peak.index)));
            }
            if !scored.peak.mz.is_finite() || scored.peak.mz <= 0.0 {
                return Err(self.invalid(format!(
                    "peak {} has an invalid m/z of {}",
                    scored.peak.index, scored.peak.mz
                )));
            }
            if let Some(candidate) = scored.candidates.iter().find(|c| !c.score.is_finite()) {
                return Err(self.invalid(format!(
                    "candidate {} of peak {} has a non finite score",
                    candidate.formula, scored.peak.index
                )));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> FragTreeError {
        FragTreeError::InvalidInput {
            context: self.name.clone(),
            reason,
        }
    }

    /// The candidate root formulas
    pub fn roots(&self) -> &[Candidate] {
        &self.parent.candidates
    }

    /// All fragment peaks (so not the parent) in strictly decreasing m/z order, ties are broken on
    /// peak index.
    pub fn peaks_by_decreasing_mz(&self) -> Vec<&ScoredPeak> {
        let mut peaks = self
            .peaks
            .iter()
            .filter(|p| p.peak.index != self.parent.peak.index)
            .collect::<Vec<_>>();
        peaks.sort_by_key(|p| (Reverse(OrderedFloat(p.peak.mz)), p.peak.index));
        peaks
    }

    /// Split this table into one table per root candidate, to build a separate graph for every
    /// possible precursor formula.
    pub fn split_roots(&self) -> Vec<Self> {
        self.parent
            .candidates
            .iter()
            .map(|root| Self {
                name: format!("{} ({})", self.name, root.formula),
                ionization: self.ionization.clone(),
                parent: ScoredPeak {
                    peak: self.parent.peak,
                    candidates: vec![root.clone()],
                },
                peaks: self.peaks.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    fn table() -> CandidateTable {
        CandidateTable::new(
            "test",
            Ionization::protonated(),
            ScoredPeak::new(
                0,
                181.07,
                [
                    Candidate::new(molecular_formula!(C 6 H 12 O 6), 2.0),
                    Candidate::new(molecular_formula!(C 7 H 16 O 5), 1.0),
                ],
            ),
            vec![
                ScoredPeak::new(2, 85.03, []),
                ScoredPeak::new(1, 163.06, []),
                ScoredPeak::new(3, 163.06, []),
            ],
        )
    }

    #[test]
    fn decreasing_order() {
        let table = table();
        assert_eq!(
            table
                .peaks_by_decreasing_mz()
                .iter()
                .map(|p| p.peak.index)
                .collect::<Vec<_>>(),
            vec![1, 3, 2]
        );
    }

    #[test]
    fn split() {
        let split = table().split_roots();
        assert_eq!(split.len(), 2);
        assert!(split.iter().all(|t| t.roots().len() == 1));
        assert_eq!(split[1].roots()[0].formula, molecular_formula!(C 7 H 16 O 5));
        assert_eq!(split[1].peaks.len(), 3);
    }

    #[test]
    fn validation() {
        assert!(table().validate().is_ok());
        let mut duplicate = table();
        duplicate.peaks.push(ScoredPeak::new(0, 50.0, []));
        assert!(duplicate.validate().is_err());
        let mut nan = table();
        nan.peaks[0].candidates.push(Candidate::new(molecular_formula!(C 1), f64::NAN));
        assert!(nan.validate().is_err());
    }

    #[test]
    fn json() {
        let table = CandidateTable::from_json(
            r#"{
                "name": "glucose",
                "parent": {"index": 0, "mz": 181.0707, "candidates": [{"formula": "C6H12O6", "score": 1.5}]},
                "peaks": [
                    {"index": 1, "mz": 163.0601, "candidates": [{"formula": "C6H10O5", "score": 0.5}]},
                    {"index": 2, "mz": 85.0284}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(table.ionization, Ionization::protonated());
        assert_eq!(table.roots()[0].formula, molecular_formula!(C 6 H 12 O 6));
        assert!(table.peaks[1].candidates.is_empty());
        assert!(CandidateTable::from_json(r#"{"name": "broken"}"#).is_err());
    }

    #[test]
    fn json_count_overflow() {
        let err = CandidateTable::from_json(
            r#"{
                "name": "overflow",
                "parent": {"index": 0, "mz": 181.0707, "candidates": [{"formula": "C2147483647C1", "score": 1.0}]},
                "peaks": []
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, FragTreeError::Json(_)));
        assert!(err.to_string().contains("overflows"), "{err}");
    }
}
