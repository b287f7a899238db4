use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::FragTreeError;

/// The mass of an electron in Dalton
pub const ELECTRON_MASS: f64 = 5.485_799_090_65e-4;

/// The mass of a proton in Dalton
pub const PROTON_MASS: f64 = 1.007_276_466_621;

/// The elements that are found in small molecule fragmentation spectra. The variants are sorted on
/// their symbol so that a sorted list of elements is in alphabetical order.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[allow(missing_docs)]
pub enum Element {
    B,
    Br,
    C,
    Cl,
    F,
    H,
    I,
    K,
    N,
    Na,
    O,
    P,
    S,
    Se,
    Si,
}

impl Element {
    /// All supported elements, in alphabetical order
    pub const ALL: &'static [Self] = &[
        Self::B,
        Self::Br,
        Self::C,
        Self::Cl,
        Self::F,
        Self::H,
        Self::I,
        Self::K,
        Self::N,
        Self::Na,
        Self::O,
        Self::P,
        Self::S,
        Self::Se,
        Self::Si,
    ];

    /// The monoisotopic mass of the most abundant isotope of this element
    pub const fn monoisotopic_mass(self) -> f64 {
        match self {
            Self::B => 11.009_305_36,
            Self::Br => 78.918_337_6,
            Self::C => 12.0,
            Self::Cl => 34.968_852_682,
            Self::F => 18.998_403_162_73,
            Self::H => 1.007_825_032_23,
            Self::I => 126.904_471_9,
            Self::K => 38.963_706_486_4,
            Self::N => 14.003_074_004_43,
            Self::Na => 22.989_769_282,
            Self::O => 15.994_914_619_57,
            Self::P => 30.973_761_998_42,
            Self::S => 31.972_071_174_4,
            Self::Se => 79.916_521_8,
            Self::Si => 27.976_926_534_65,
        }
    }

    /// The chemical symbol
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::Br => "Br",
            Self::C => "C",
            Self::Cl => "Cl",
            Self::F => "F",
            Self::H => "H",
            Self::I => "I",
            Self::K => "K",
            Self::N => "N",
            Self::Na => "Na",
            Self::O => "O",
            Self::P => "P",
            Self::S => "S",
            Self::Se => "Se",
            Self::Si => "Si",
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Element {
    type Err = FragTreeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|e| e.symbol() == s)
            .copied()
            .ok_or_else(|| FragTreeError::UnknownElement(s.to_string()))
    }
}
