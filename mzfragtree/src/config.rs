//! The settings for building and reducing graphs, read from JSON. Every field is optional and
//! falls back to its default.

use serde::{Deserialize, Serialize};

use crate::{
    chemistry::{MolecularFormula, Tolerance},
    error::{FragTreeError, Result},
    graph::{ForbiddenLosses, LossValidator, MaximumLossMass},
};

/// All settings for processing a compound
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct FragTreeConfig {
    /// The settings for building the graph
    pub building: GraphBuildingConfig,
    /// The settings for reducing the graph
    pub reduction: ReductionConfig,
    /// Build a separate graph for every root candidate instead of one graph with all roots
    pub separate_roots: bool,
}

impl FragTreeConfig {
    /// Parse the configuration from JSON and validate it.
    /// # Errors
    /// If the JSON is invalid or a value is out of range, see [`Self::validate`].
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are in range.
    /// # Errors
    /// If the lower bound is not finite, the pass limit is zero, a tolerance or maximal loss
    /// mass is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        self.building.validate()?;
        self.reduction.validate()
    }
}

/// The settings for the [`crate::graph::GraphBuilder`]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct GraphBuildingConfig {
    /// Reject candidates whose ion m/z is higher than the peak m/z plus this tolerance, `None`
    /// disables the check
    pub max_deviation: Option<Tolerance>,
    /// Reject losses with a higher monoisotopic mass
    pub max_loss_mass: Option<f64>,
    /// Reject losses with exactly these formulas
    pub forbidden_losses: Vec<MolecularFormula>,
}

impl Default for GraphBuildingConfig {
    fn default() -> Self {
        Self {
            max_deviation: Some(Tolerance::default()),
            max_loss_mass: None,
            forbidden_losses: Vec::new(),
        }
    }
}

impl GraphBuildingConfig {
    /// The loss validators for these settings
    pub fn validators(&self) -> Vec<Box<dyn LossValidator>> {
        let mut validators: Vec<Box<dyn LossValidator>> = Vec::new();
        if let Some(mass) = self.max_loss_mass {
            validators.push(Box::new(MaximumLossMass(mass)));
        }
        if !self.forbidden_losses.is_empty() {
            validators.push(Box::new(
                self.forbidden_losses
                    .iter()
                    .cloned()
                    .collect::<ForbiddenLosses>(),
            ));
        }
        validators
    }

    fn validate(&self) -> Result<()> {
        let deviation = self.max_deviation.map(|tolerance| match tolerance {
            Tolerance::Absolute(value) | Tolerance::Ppm(value) => value,
        });
        for (name, value) in [("max_deviation", deviation), ("max_loss_mass", self.max_loss_mass)] {
            if let Some(value) = value
                && (!value.is_finite() || value < 0.0)
            {
                return Err(FragTreeError::InvalidConfig(format!(
                    "{name} has to be a non negative number, not {value}"
                )));
            }
        }
        if let Some(empty) = self.forbidden_losses.iter().find(|f| f.is_empty()) {
            return Err(FragTreeError::InvalidConfig(format!(
                "forbidden loss '{empty}' is empty"
            )));
        }
        Ok(())
    }
}

/// The settings for the [`crate::graph::GraphReducer`]
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Every subtree scoring at least this survives the reduction
    pub lowerbound: f64,
    /// Stop after this many passes, `None` runs until nothing changes anymore
    pub max_passes: Option<usize>,
}

impl ReductionConfig {
    fn validate(self) -> Result<()> {
        if !self.lowerbound.is_finite() {
            return Err(FragTreeError::InvalidConfig(format!(
                "lowerbound has to be finite, not {}",
                self.lowerbound
            )));
        }
        if self.max_passes == Some(0) {
            return Err(FragTreeError::InvalidConfig(
                "max_passes has to be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FragTreeConfig::from_json("{}").unwrap();
        assert_eq!(config, FragTreeConfig::default());
        assert_eq!(config.building.max_deviation, Some(Tolerance::Ppm(20.0)));
        assert!(config.building.validators().is_empty());
        assert!(config.reduction.lowerbound.abs() < f64::EPSILON);
        assert!(!config.separate_roots);
    }

    #[test]
    fn full() {
        let config = FragTreeConfig::from_json(
            r#"{
                "building": {"max_deviation": {"da": 0.01}, "max_loss_mass": 150.0, "forbidden_losses": ["C2H2", "N2"]},
                "reduction": {"lowerbound": 1.5, "max_passes": 3},
                "separate_roots": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.building.max_deviation, Some(Tolerance::Absolute(0.01)));
        assert_eq!(config.building.validators().len(), 2);
        assert_eq!(config.building.forbidden_losses[1], molecular_formula!(N 2));
        assert_eq!(config.reduction.max_passes, Some(3));
        assert!(config.separate_roots);
    }

    #[test]
    fn disabled_deviation() {
        let config = FragTreeConfig::from_json(r#"{"building": {"max_deviation": null}}"#).unwrap();
        assert_eq!(config.building.max_deviation, None);
    }

    #[test]
    fn invalid() {
        for text in [
            r#"{"reduction": {"max_passes": 0}}"#,
            r#"{"building": {"max_loss_mass": -1.0}}"#,
            r#"{"building": {"max_deviation": {"ppm": -5.0}}}"#,
            r#"{"reduction": {"lowerbound": "high"}}"#,
            r#"{"building": {"forbidden_losses": ["Xx2"]}}"#,
            r#"{"building": {"forbidden_losses": [""]}}"#,
        ] {
            assert!(FragTreeConfig::from_json(text).is_err(), "{text}");
        }
    }
}
