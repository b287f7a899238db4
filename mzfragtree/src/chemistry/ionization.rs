use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    chemistry::{ELECTRON_MASS, MolecularFormula},
    error::FragTreeError,
};

/// The ionisation of a compound, the adduct that is gained (or lost) to give the molecule its
/// charge. All fragments in one fragmentation graph share the ionisation of their precursor.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Ionization {
    /// The formula gained by the neutral molecule, this is `H-1` for a deprotonation
    pub adduct: MolecularFormula,
    /// The charge of the ion, the number of electrons missing (positive) or gained (negative)
    pub charge: i32,
}

impl Default for Ionization {
    fn default() -> Self {
        Self::protonated()
    }
}

impl Ionization {
    /// Create a new ionisation
    pub const fn new(adduct: MolecularFormula, charge: i32) -> Self {
        Self { adduct, charge }
    }

    /// `[M+H]+`
    pub fn protonated() -> Self {
        Self::new(molecular_formula!(H 1), 1)
    }

    /// `[M-H]-`
    pub fn deprotonated() -> Self {
        Self::new(molecular_formula!(H -1), -1)
    }

    /// `[M+Na]+`
    pub fn sodiated() -> Self {
        Self::new(molecular_formula!(Na 1), 1)
    }

    /// The mass difference between the ion and the neutral molecule
    pub fn mass_shift(&self) -> f64 {
        f64::from(self.charge).mul_add(-ELECTRON_MASS, self.adduct.monoisotopic_mass())
    }

    /// The m/z of the ion of a neutral molecule with the given mass
    pub fn mz(&self, neutral_mass: f64) -> f64 {
        (neutral_mass + self.mass_shift()) / f64::from(self.charge.unsigned_abs().max(1))
    }

    /// Check that this ionisation carries a charge.
    /// # Errors
    /// If the charge is zero, an ion needs a charge to be measured.
    pub fn validate(&self) -> Result<(), FragTreeError> {
        if self.charge == 0 {
            Err(FragTreeError::InvalidInput {
                context: format!("ionization {self}"),
                reason: "the charge of an ionization cannot be zero".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Display for Ionization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let adduct = if self.adduct.contains_negative_amount() {
            format!("-{}", MolecularFormula::default() - self.adduct.clone())
        } else {
            format!("+{}", self.adduct)
        };
        let sign = if self.charge < 0 { '-' } else { '+' };
        if self.charge.unsigned_abs() == 1 {
            write!(f, "[M{adduct}]{sign}")
        } else {
            write!(f, "[M{adduct}]{}{sign}", self.charge.unsigned_abs())
        }
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use crate::chemistry::{Ionization, PROTON_MASS};

    #[test]
    fn protonated() {
        let ion = Ionization::protonated();
        assert!((ion.mass_shift() - PROTON_MASS).abs() < 1e-7);
        assert!((ion.mz(100.0) - 101.007_276_466_621).abs() < 1e-7);
        assert!((ion.mz(250.0) - 251.007_276_466_621).abs() < 1e-7);
        let doubly = Ionization::new(molecular_formula!(H 2), 2);
        assert!((doubly.mz(100.0) - 51.007_276_466_621).abs() < 1e-7);
        assert_eq!(ion.to_string(), "[M+H]+");
    }

    #[test]
    fn deprotonated() {
        let ion = Ionization::deprotonated();
        assert!((ion.mass_shift() + PROTON_MASS).abs() < 1e-7);
        assert_eq!(ion.to_string(), "[M-H]-");
        assert_eq!(
            Ionization::new(molecular_formula!(H -2), -2).to_string(),
            "[M-H2]2-"
        );
        assert_eq!(Ionization::sodiated().to_string(), "[M+Na]+");
    }

    #[test]
    fn zero_charge() {
        assert!(Ionization::new(molecular_formula!(H 1), 0).validate().is_err());
        assert!(Ionization::sodiated().validate().is_ok());
    }
}
