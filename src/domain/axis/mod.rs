// Axis model - Controller axes and stages

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::errors::DomainError;

bitflags! {
    /// Set of controller axes.
    ///
    /// X, Y and Z drive the positioning stage, A and B the galvo scanner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Axis: u8 {
        const X = 0b0000_0001;
        const Y = 0b0000_0010;
        const Z = 0b0000_0100;
        const A = 0b0000_1000;
        const B = 0b0001_0000;

        const XY = Self::X.bits() | Self::Y.bits();
        const XZ = Self::X.bits() | Self::Z.bits();
        const YZ = Self::Y.bits() | Self::Z.bits();
        const XYZ = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
        const AB = Self::A.bits() | Self::B.bits();
    }
}

/// Axes in the order the controller expects them
pub const CANONICAL_ORDER: [(Axis, char); 5] = [
    (Axis::X, 'X'),
    (Axis::Y, 'Y'),
    (Axis::Z, 'Z'),
    (Axis::A, 'A'),
    (Axis::B, 'B'),
];

/// Mechanical stage an axis belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Positioning stage (X, Y, Z)
    Xyz,
    /// Galvo scanner (A, B)
    Ab,
}

impl Stage {
    /// Axes driven by this stage
    pub fn axes(self) -> Axis {
        match self {
            Stage::Xyz => Axis::XYZ,
            Stage::Ab => Axis::AB,
        }
    }

    /// Stage that drives every axis in the set, if there is exactly one
    pub fn of(axis: Axis) -> Option<Stage> {
        if axis.is_empty() {
            None
        } else if Axis::XYZ.contains(axis) {
            Some(Stage::Xyz)
        } else if Axis::AB.contains(axis) {
            Some(Stage::Ab)
        } else {
            None
        }
    }
}

impl Axis {
    /// Parse an axis set from its letters (case-insensitive, e.g. "xy" or "AB")
    pub fn parse(name: &str) -> Result<Self, DomainError> {
        if name.is_empty() {
            return Err(DomainError::Axis(
                "Cannot instantiate an empty axis".to_string(),
            ));
        }

        let mut axis = Axis::empty();
        for letter in name.chars() {
            axis |= Self::from_letter(letter).ok_or_else(|| {
                DomainError::Axis(format!("Could not identify axis with name '{}'", letter))
            })?;
        }
        Ok(axis)
    }

    fn from_letter(letter: char) -> Option<Axis> {
        let upper = letter.to_ascii_uppercase();
        CANONICAL_ORDER
            .iter()
            .find(|(_, name)| *name == upper)
            .map(|(axis, _)| *axis)
    }

    /// Single axes contained in this set, in canonical order
    pub fn iter_single(self) -> impl Iterator<Item = Axis> {
        CANONICAL_ORDER
            .into_iter()
            .filter(move |(axis, _)| self.contains(*axis))
            .map(|(axis, _)| axis)
    }

    /// Letter of a single axis
    pub fn letter(self) -> Option<char> {
        CANONICAL_ORDER
            .iter()
            .find(|(axis, _)| *axis == self)
            .map(|(_, name)| *name)
    }

    /// Axis names joined the way AeroBasic expects them ("X Y")
    pub fn parameter_name(self) -> String {
        CANONICAL_ORDER
            .iter()
            .filter(|(axis, _)| self.contains(*axis))
            .map(|(_, name)| name.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True when the set holds exactly one axis
    pub fn is_single_axis(self) -> bool {
        self.bits().count_ones() == 1
    }

    /// True when all axes are driven by the same stage
    pub fn is_from_same_stage(self) -> bool {
        Stage::of(self).is_some()
    }

    /// Fail unless the set holds exactly one axis
    pub fn require_single(self, context: &str) -> Result<Axis, DomainError> {
        if self.is_single_axis() {
            Ok(self)
        } else {
            Err(DomainError::Axis(format!(
                "{} requires a single axis, got '{}'",
                context,
                self.parameter_name()
            )))
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parameter_name())
    }
}

impl FromStr for Axis {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Axis::parse(s)
    }
}

impl Serialize for Axis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let letters: String = self.iter_single().filter_map(Axis::letter).collect();
        serializer.serialize_str(&letters)
    }
}

impl<'de> Deserialize<'de> for Axis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Axis::parse(&name).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests;
