use serde::{Deserialize, Serialize};

/// A symmetric mass tolerance, either absolute in Dalton or relative in parts per million
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum Tolerance {
    /// An absolute tolerance in Dalton
    #[serde(rename = "da")]
    Absolute(f64),
    /// A relative tolerance in ppm
    #[serde(rename = "ppm")]
    Ppm(f64),
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::Ppm(20.0)
    }
}

impl Tolerance {
    /// The allowed deviation around the given value
    pub fn deviation(self, value: f64) -> f64 {
        match self {
            Self::Absolute(da) => da,
            Self::Ppm(ppm) => value.abs() * ppm * 1e-6,
        }
    }
}
