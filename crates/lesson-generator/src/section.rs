//! Section types: what callers request and what the generator returns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LessonError, Result};

// ============================================================================
// SectionKind
// ============================================================================

/// The closed set of lesson sections the generator knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Discussion starters that stand alone from the source material.
    Warmup,
    /// Key terms with meanings and example sentences.
    Vocabulary,
    /// A level-appropriate reading passage.
    Reading,
    /// Questions about the generated reading passage.
    Comprehension,
    /// Open-ended discussion questions.
    Discussion,
    /// A two-speaker conversation.
    Dialogue,
    /// A grammar focus with examples and exercises.
    Grammar,
    /// A pronunciation drill for one target word.
    Pronunciation,
    /// Reflective closing questions.
    Wrapup,
}

impl SectionKind {
    /// Every section kind, in default lesson order.
    pub const ALL: [Self; 9] = [
        Self::Warmup,
        Self::Vocabulary,
        Self::Reading,
        Self::Comprehension,
        Self::Discussion,
        Self::Dialogue,
        Self::Grammar,
        Self::Pronunciation,
        Self::Wrapup,
    ];

    /// Returns the wire name, e.g. `"warmup"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Warmup => "warmup",
            Self::Vocabulary => "vocabulary",
            Self::Reading => "reading",
            Self::Comprehension => "comprehension",
            Self::Discussion => "discussion",
            Self::Dialogue => "dialogue",
            Self::Grammar => "grammar",
            Self::Pronunciation => "pronunciation",
            Self::Wrapup => "wrapup",
        }
    }

    /// Human-readable label used in progress messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Warmup => "warm-up questions",
            Self::Vocabulary => "vocabulary",
            Self::Reading => "reading passage",
            Self::Comprehension => "comprehension questions",
            Self::Discussion => "discussion questions",
            Self::Dialogue => "dialogue",
            Self::Grammar => "grammar focus",
            Self::Pronunciation => "pronunciation practice",
            Self::Wrapup => "wrap-up reflection",
        }
    }

    /// Resolves a section name, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::UnknownSection` when the name is not recognized.
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| LessonError::unknown_section(name))
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// LessonSection (request)
// ============================================================================

/// A request to generate one named section.
///
/// `dependencies` is declarative: the generator does not reorder or block
/// requests. Plans are checked for ordering when configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSection {
    /// Section name (one of the `SectionKind` wire names).
    pub name: String,
    /// Ordering hint; lower runs first.
    #[serde(default)]
    pub priority: u32,
    /// Sections that must already be generated.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl LessonSection {
    /// Creates a section request with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            dependencies: Vec::new(),
        }
    }

    /// Adds a dependency on another section.
    #[must_use]
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }
}

// ============================================================================
// Content shapes
// ============================================================================

/// One vocabulary entry.
///
/// The first entry of a vocabulary section is an instruction sentinel whose
/// `word` is `"INSTRUCTION"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    /// Title-cased term.
    pub word: String,
    /// Learner-facing definition.
    pub meaning: String,
    /// Example sentences, one per line.
    pub example: String,
}

impl VocabularyEntry {
    /// Word value of the leading instruction entry.
    pub const INSTRUCTION_WORD: &'static str = "INSTRUCTION";

    /// Returns `true` for the leading instruction sentinel.
    #[must_use]
    pub fn is_instruction(&self) -> bool {
        self.word == Self::INSTRUCTION_WORD
    }

    /// Iterates the individual example sentences.
    pub fn examples(&self) -> impl Iterator<Item = &str> {
        self.example.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// Grammar focus produced by the grammar section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarContent {
    /// Name of the grammar point, e.g. "Present Simple Tense".
    pub focus: String,
    /// Example sentences.
    pub examples: Vec<String>,
    /// Practice exercises.
    #[serde(alias = "exercises")]
    pub exercise: Vec<String>,
}

/// Pronunciation drill produced by the pronunciation section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationContent {
    /// Target word.
    pub word: String,
    /// IPA transcription.
    pub ipa: String,
    /// Practice instructions, including the stress tip.
    pub practice: String,
}

/// Section-kind-specific content.
///
/// Serialized without a tag so each shape appears as-is: a list of strings,
/// a list of vocabulary entries, or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionContent {
    /// Instruction line followed by questions, passage, or dialogue lines.
    Lines(Vec<String>),
    /// Instruction sentinel followed by word entries.
    Vocabulary(Vec<VocabularyEntry>),
    /// Grammar focus object.
    Grammar(GrammarContent),
    /// Pronunciation drill object.
    Pronunciation(PronunciationContent),
}

impl SectionContent {
    /// Returns the lines for line-shaped content.
    #[must_use]
    pub fn as_lines(&self) -> Option<&[String]> {
        match self {
            Self::Lines(lines) => Some(lines),
            _ => None,
        }
    }

    /// Returns the entries for vocabulary content.
    #[must_use]
    pub fn as_vocabulary(&self) -> Option<&[VocabularyEntry]> {
        match self {
            Self::Vocabulary(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the grammar object.
    #[must_use]
    pub const fn as_grammar(&self) -> Option<&GrammarContent> {
        match self {
            Self::Grammar(grammar) => Some(grammar),
            _ => None,
        }
    }

    /// Returns the pronunciation object.
    #[must_use]
    pub const fn as_pronunciation(&self) -> Option<&PronunciationContent> {
        match self {
            Self::Pronunciation(drill) => Some(drill),
            _ => None,
        }
    }
}

// ============================================================================
// GeneratedSection (result)
// ============================================================================

/// Which code path produced a section's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// Content came from the completion service and passed validation.
    Progressive,
    /// Deterministic content built from the shared context.
    Fallback,
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progressive => write!(f, "progressive"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A finished section. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSection {
    /// Name of the section that was generated.
    pub section_name: String,
    /// The section content.
    pub content: SectionContent,
    /// Estimated tokens spent on prompts and responses.
    pub tokens_used: usize,
    /// Which code path produced the content.
    pub generation_strategy: GenerationStrategy,
}

impl GeneratedSection {
    /// Returns the kind of this section, if its name is recognized.
    #[must_use]
    pub fn kind(&self) -> Option<SectionKind> {
        SectionKind::from_name(&self.section_name).ok()
    }
}
