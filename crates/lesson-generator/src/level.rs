//! CEFR proficiency levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LessonError;

/// Common European Framework of Reference proficiency tier.
///
/// Ordered from lowest (`A1`) to highest (`C2`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CefrLevel {
    /// Beginner.
    A1,
    /// Elementary.
    A2,
    /// Intermediate (default).
    #[default]
    B1,
    /// Upper intermediate.
    B2,
    /// Advanced.
    C1,
    /// Proficient.
    C2,
}

impl CefrLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 6] = [Self::A1, Self::A2, Self::B1, Self::B2, Self::C1, Self::C2];

    /// Returns the canonical upper-case code, e.g. `"B1"`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::C1 => "C1",
            Self::C2 => "C2",
        }
    }

    /// Number of example sentences each vocabulary entry needs.
    ///
    /// Lower levels get more repetition.
    #[must_use]
    pub const fn vocabulary_example_count(self) -> usize {
        match self {
            Self::A1 | Self::A2 => 5,
            Self::B1 => 4,
            Self::B2 => 3,
            Self::C1 | Self::C2 => 2,
        }
    }

    /// `A1` or `A2`.
    #[must_use]
    pub const fn is_beginner(self) -> bool {
        matches!(self, Self::A1 | Self::A2)
    }

    /// `C1` or `C2`.
    #[must_use]
    pub const fn is_advanced(self) -> bool {
        matches!(self, Self::C1 | Self::C2)
    }

    /// Short description used inside prompts.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::A1 => "beginner (A1): very short sentences, present tense, everyday words",
            Self::A2 => "elementary (A2): short sentences, common past and future forms",
            Self::B1 => "intermediate (B1): connected sentences, familiar topics, some opinions",
            Self::B2 => "upper intermediate (B2): varied structures, abstract topics, clear arguments",
            Self::C1 => "advanced (C1): complex structures, nuanced vocabulary, implicit meaning",
            Self::C2 => "proficient (C2): native-like range, idiomatic and precise language",
        }
    }

    /// Parses a level code case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Some(Self::A1),
            "A2" => Some(Self::A2),
            "B1" => Some(Self::B1),
            "B2" => Some(Self::B2),
            "C1" => Some(Self::C1),
            "C2" => Some(Self::C2),
            _ => None,
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CefrLevel {
    type Err = LessonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_case_insensitive(s).ok_or_else(|| LessonError::invalid_level(s))
    }
}

impl<'de> Deserialize<'de> for CefrLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid CEFR level '{s}': expected one of 'A1', 'A2', 'B1', 'B2', 'C1', 'C2'"
            ))
        })
    }
}

impl Serialize for CefrLevel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}
