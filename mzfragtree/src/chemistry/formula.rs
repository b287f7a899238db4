use std::{
    fmt::{Display, Write},
    ops::{Add, Sub},
    str::FromStr,
};

use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

use crate::{chemistry::Element, error::FragTreeError};

/// A molecular formula, a selection of elements with their counts. The elements are kept sorted
/// and elements with a zero count are removed, so two formulas with the same composition always
/// compare equal. Negative counts are allowed to represent differences between formulas.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MolecularFormula {
    elements: ThinVec<(Element, i32)>,
}

/// Easily define molecular formulas using the following syntax: `<element> <number>`
/// ```
/// # use mzfragtree::molecular_formula;
/// molecular_formula!(C 12 H 22 O 11);
/// molecular_formula!(H -1);
/// ```
#[macro_export]
macro_rules! molecular_formula {
    ($($element:ident $count:literal)*) => {
        $crate::chemistry::MolecularFormula::new(&[$(($crate::chemistry::Element::$element, $count)),*])
    };
}

impl MolecularFormula {
    /// Create a new molecular formula, the elements may be given in any order and may repeat
    /// # Panics
    /// If the total count of an element does not fit in an `i32`.
    pub fn new(elements: &[(Element, i32)]) -> Self {
        let mut result = Self::default();
        for (element, count) in elements {
            assert!(
                result.add_element((*element, *count)),
                "Count of {element} overflows"
            );
        }
        result
    }

    /// Add the given number of atoms of an element to this formula. Returns false, and leaves the
    /// formula unchanged, if the resulting count of the element would overflow.
    #[must_use]
    pub fn add_element(&mut self, (element, count): (Element, i32)) -> bool {
        match self.elements.binary_search_by(|(e, _)| e.cmp(&element)) {
            Ok(index) => {
                let Some(total) = self.elements[index].1.checked_add(count) else {
                    return false;
                };
                if total == 0 {
                    self.elements.remove(index);
                } else {
                    self.elements[index].1 = total;
                }
            }
            Err(index) => {
                if count != 0 {
                    self.elements.insert(index, (element, count));
                }
            }
        }
        true
    }

    /// The elements and their counts, sorted on element
    pub fn elements(&self) -> &[(Element, i32)] {
        &self.elements
    }

    /// The number of atoms of this element
    pub fn count(&self, element: Element) -> i32 {
        self.elements
            .binary_search_by(|(e, _)| e.cmp(&element))
            .map_or(0, |index| self.elements[index].1)
    }

    /// If this formula does not contain any element
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The monoisotopic mass
    pub fn monoisotopic_mass(&self) -> f64 {
        self.elements.iter().fold(0.0, |acc, (element, count)| {
            element.monoisotopic_mass().mul_add(f64::from(*count), acc)
        })
    }

    /// Check if this formula contains a negative number of any element.
    pub fn contains_negative_amount(&self) -> bool {
        self.elements.iter().any(|(_, n)| *n < 0)
    }

    /// Check if the other formula can be removed from this formula without any element count
    /// going below zero. In other words if every element count in `other` is at most the count in
    /// `self`.
    pub fn contains(&self, other: &Self) -> bool {
        self.elements
            .iter()
            .merge_join_by(other.elements.iter(), |a, b| a.0.cmp(&b.0))
            .all(|pair| match pair {
                EitherOrBoth::Both(a, b) => a.1 >= b.1,
                EitherOrBoth::Left(a) => a.1 >= 0,
                EitherOrBoth::Right(b) => b.1 <= 0,
            })
    }

    /// Check if this formula can be subtracted from the other formula, the inverse of [`Self::contains`].
    pub fn is_subtractable_from(&self, other: &Self) -> bool {
        other.contains(self)
    }

    /// Subtract the other formula from this formula, if no element count goes negative (or
    /// overflows) in the process.
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        if self.contains(other) {
            self.merge(other, i32::checked_sub)
        } else {
            None
        }
    }

    /// The elementwise maximum of both formulas, the smallest formula that contains both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.merge(other, |a, b| Some(a.max(b)))
            .unwrap_or_else(|| unreachable!("max cannot overflow"))
    }

    /// Combine the counts of both formulas element by element, `None` if any combination fails
    fn merge(&self, other: &Self, combine: impl Fn(i32, i32) -> Option<i32>) -> Option<Self> {
        let mut elements = ThinVec::new();
        for pair in self
            .elements
            .iter()
            .merge_join_by(other.elements.iter(), |a, b| a.0.cmp(&b.0))
        {
            let (element, count) = match pair {
                EitherOrBoth::Both(a, b) => (a.0, combine(a.1, b.1)?),
                EitherOrBoth::Left(a) => (a.0, combine(a.1, 0)?),
                EitherOrBoth::Right(b) => (b.0, combine(0, b.1)?),
            };
            if count != 0 {
                elements.push((element, count));
            }
        }
        Some(Self { elements })
    }

    /// Create a [Hill notation](https://en.wikipedia.org/wiki/Chemical_formula#Hill_system) from
    /// this formula. Carbon first, hydrogen second, and then all other elements alphabetically. If
    /// there is no carbon all elements are alphabetical.
    pub fn hill_notation(&self) -> String {
        let mut buffer = String::new();
        let write = |buffer: &mut String, (element, count): (Element, i32)| {
            if count == 1 {
                write!(buffer, "{element}").unwrap();
            } else {
                write!(buffer, "{element}{count}").unwrap();
            }
        };
        let carbon = self.count(Element::C);
        if carbon == 0 {
            for element in &self.elements {
                write(&mut buffer, *element);
            }
        } else {
            write(&mut buffer, (Element::C, carbon));
            let hydrogen = self.count(Element::H);
            if hydrogen != 0 {
                write(&mut buffer, (Element::H, hydrogen));
            }
            for element in self
                .elements
                .iter()
                .filter(|(e, _)| *e != Element::C && *e != Element::H)
            {
                write(&mut buffer, *element);
            }
        }
        buffer
    }
}

impl Display for MolecularFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hill_notation())
    }
}

impl FromStr for MolecularFormula {
    type Err = FragTreeError;

    /// Parse a formula like `C6H12O6`. Whitespace between the parts is ignored, counts default to
    /// one and may be negative (`H-1`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let error = |reason: String| FragTreeError::InvalidFormula {
            formula: value.to_string(),
            reason,
        };
        let chars = value
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<Vec<_>>();
        let mut formula = Self::default();
        let mut index = 0;
        while index < chars.len() {
            if !chars[index].is_ascii_uppercase() {
                return Err(error(format!(
                    "expected an element symbol but found '{}'",
                    chars[index]
                )));
            }
            let mut symbol = chars[index].to_string();
            index += 1;
            while index < chars.len() && chars[index].is_ascii_lowercase() {
                symbol.push(chars[index]);
                index += 1;
            }
            let element = symbol
                .parse::<Element>()
                .map_err(|err| error(err.to_string()))?;

            let start = index;
            if index < chars.len() && chars[index] == '-' {
                index += 1;
            }
            while index < chars.len() && chars[index].is_ascii_digit() {
                index += 1;
            }
            let number = chars[start..index].iter().collect::<String>();
            let count = match number.as_str() {
                "" => 1,
                "-" => return Err(error(format!("missing number after '{symbol}-'"))),
                number => number
                    .parse::<i32>()
                    .map_err(|err| error(format!("invalid count '{number}': {err}")))?,
            };
            if !formula.add_element((element, count)) {
                return Err(error(format!("the count of {element} overflows")));
            }
        }
        Ok(formula)
    }
}

impl TryFrom<String> for MolecularFormula {
    type Error = FragTreeError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MolecularFormula> for String {
    fn from(value: MolecularFormula) -> Self {
        value.hill_notation()
    }
}

impl Add<&MolecularFormula> for &MolecularFormula {
    type Output = MolecularFormula;
    fn add(self, rhs: &MolecularFormula) -> Self::Output {
        self.merge(rhs, i32::checked_add)
            .unwrap_or_else(|| panic!("Element count overflow in {self} + {rhs}"))
    }
}

impl Sub<&MolecularFormula> for &MolecularFormula {
    type Output = MolecularFormula;
    fn sub(self, rhs: &MolecularFormula) -> Self::Output {
        self.merge(rhs, i32::checked_sub)
            .unwrap_or_else(|| panic!("Element count overflow in {self} - {rhs}"))
    }
}

impl Add for MolecularFormula {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        &self + &rhs
    }
}

impl Sub for MolecularFormula {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        &self - &rhs
    }
}
