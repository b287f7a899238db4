mod element;
#[macro_use]
mod formula;
mod ionization;
mod tolerance;

pub use element::*;
pub use formula::*;
pub use ionization::*;
pub use tolerance::*;
