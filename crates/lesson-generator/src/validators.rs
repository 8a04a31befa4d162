//! Section validators.
//!
//! Each validator is a pure function over a section's content. Findings are
//! split into issues, which make the content unacceptable, and warnings,
//! which are reported but never block.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::level::CefrLevel;
use crate::optimizer::{DISCUSSION_QUESTION_COUNT, MIN_DIALOGUE_LINES};
use crate::section::VocabularyEntry;
use crate::text::words;

/// Minimum number of warm-up questions.
pub const MIN_WARMUP_QUESTIONS: usize = 3;

/// Dialogue lines that must mention key vocabulary before no warning is raised.
pub const VOCABULARY_LINE_THRESHOLD: usize = 3;

/// Minimum grammar examples.
pub const MIN_GRAMMAR_EXAMPLES: usize = 3;

/// Minimum grammar exercises.
pub const MIN_GRAMMAR_EXERCISES: usize = 5;

/// Minimum pronunciation words.
pub const MIN_PRONUNCIATION_WORDS: usize = 5;

/// Minimum tongue-twisters.
pub const MIN_TONGUE_TWISTERS: usize = 2;

/// Phrases that point back at the source material. A bare noun such as "the
/// text" is not enough: it must close a clause ("in the story?") or be the
/// subject of a reporting verb ("the article says", "what is the text about").
static CONTENT_REFERENCE_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?ix)\b(?:
            (?:in|from|about|according\s+to|enjoy(?:ed)?|like[ds]?|read|understand|wr[io]te|summari[sz]e)
            \s+(?:the|this)\s+(?:text|story|article|passage|reading)\s*(?:[?.!,;:]|$)
          | (?:the|this)\s+(?:text|story|article|passage|reading)\s+
            (?:(?:say|said|mention|describe|explain|suggest|tell|told)(?:s|d|ed)?|(?:is|was)\s+about)\b
          | (?:is|was)\s+(?:the|this)\s+(?:text|story|article|passage|reading)\s+about\b
        )",
    )
    .ok()
});

// ============================================================================
// Results
// ============================================================================

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A standalone question refers to the source material.
    ContentAssumption,
    /// Too few (or too many) items.
    CountError,
    /// Language complexity does not fit the CEFR level.
    ComplexityMismatch,
    /// Key vocabulary is under-used.
    VocabularyIntegration,
    /// An item has the wrong shape, e.g. a question without `?`.
    FormatError,
    /// Items are structurally repetitive.
    VarietyIssue,
    /// A required field is missing or short.
    CompletenessError,
    /// An item is present but unusable.
    QualityIssue,
    /// An optional field is missing.
    CompletenessWarning,
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Finding category.
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// Human-readable explanation.
    pub message: String,
}

/// Outcome of validating one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// `true` when there are no issues.
    pub is_valid: bool,
    /// Blocking findings.
    pub issues: Vec<ValidationIssue>,
    /// Advisory findings.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if any issue or warning has the given kind.
    #[must_use]
    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().chain(&self.warnings).any(|i| i.kind == kind)
    }

    /// Message of the first issue, if any.
    #[must_use]
    pub fn first_issue(&self) -> Option<&str> {
        self.issues.first().map(|i| i.message.as_str())
    }
}

#[derive(Default)]
struct Findings {
    issues: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Findings {
    fn issue(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            kind,
            message: message.into(),
        });
    }

    fn warn(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            kind,
            message: message.into(),
        });
    }

    fn finish(self) -> ValidationResult {
        ValidationResult {
            is_valid: self.issues.is_empty(),
            issues: self.issues,
            warnings: self.warnings,
        }
    }
}

// ============================================================================
// Complexity heuristics
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Complexity {
    avg_words: f64,
    long_word_ratio: f64,
}

impl Complexity {
    fn of<S: AsRef<str>>(lines: &[S]) -> Self {
        let tokens: Vec<Vec<String>> = lines.iter().map(|l| words(l.as_ref())).collect();
        let total_words: usize = tokens.iter().map(Vec::len).sum();
        let long_words = tokens
            .iter()
            .flatten()
            .filter(|w| w.chars().count() >= 10)
            .count();

        #[allow(clippy::cast_precision_loss)]
        let avg_words = if lines.is_empty() {
            0.0
        } else {
            total_words as f64 / lines.len() as f64
        };
        #[allow(clippy::cast_precision_loss)]
        let long_word_ratio = if total_words == 0 {
            0.0
        } else {
            long_words as f64 / total_words as f64
        };
        Self {
            avg_words,
            long_word_ratio,
        }
    }

    /// Sharp over-complexity for a beginner level: used for blocking checks.
    fn clashes_with(self, level: CefrLevel) -> Option<String> {
        if level.is_beginner() && (self.avg_words > 18.0 || self.long_word_ratio > 0.3) {
            Some(format!(
                "Language is too complex for {level}: {:.1} words per line, {:.0}% long words",
                self.avg_words,
                self.long_word_ratio * 100.0
            ))
        } else {
            None
        }
    }

    /// Milder disagreement: used for advisory checks.
    fn drifts_from(self, level: CefrLevel) -> Option<String> {
        if level.is_beginner() && (self.avg_words > 14.0 || self.long_word_ratio > 0.2) {
            Some(format!("Vocabulary may be too advanced for {level}"))
        } else if level.is_advanced() && self.avg_words < 6.0 {
            Some(format!("Sentences may be too simple for {level}"))
        } else {
            None
        }
    }
}

// ============================================================================
// Validators
// ============================================================================

/// Warm-up questions must stand alone from the source material.
#[must_use]
pub fn validate_warmup<S: AsRef<str>>(questions: &[S], level: CefrLevel) -> ValidationResult {
    let mut findings = Findings::default();

    if let Some(re) = CONTENT_REFERENCE_RE.as_ref() {
        for question in questions.iter().map(AsRef::as_ref) {
            if let Some(m) = re.find(question) {
                let phrase = m
                    .as_str()
                    .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
                findings.issue(
                    IssueKind::ContentAssumption,
                    format!("Warm-up question refers to \"{phrase}\": {question}"),
                );
            }
        }
    }

    if questions.len() < MIN_WARMUP_QUESTIONS {
        findings.issue(
            IssueKind::CountError,
            format!(
                "Expected at least {MIN_WARMUP_QUESTIONS} warm-up questions, found {}",
                questions.len()
            ),
        );
    }

    let complexity = Complexity::of(questions);
    if let Some(message) = complexity.clashes_with(level) {
        findings.issue(IssueKind::ComplexityMismatch, message);
    } else if let Some(message) = complexity.drifts_from(level) {
        findings.warn(IssueKind::ComplexityMismatch, message);
    }

    findings.finish()
}

/// Vocabulary entries need a meaning and the level's example count.
#[must_use]
pub fn validate_vocabulary(entries: &[VocabularyEntry], level: CefrLevel) -> ValidationResult {
    let mut findings = Findings::default();
    let required = level.vocabulary_example_count();
    let words: Vec<&VocabularyEntry> = entries.iter().filter(|e| !e.is_instruction()).collect();

    if words.is_empty() {
        findings.issue(IssueKind::CountError, "Vocabulary section has no words");
    }
    for entry in words {
        if entry.meaning.trim().is_empty() {
            findings.issue(
                IssueKind::CompletenessError,
                format!("\"{}\" has no meaning", entry.word),
            );
        }
        let examples = entry.examples().count();
        if examples < required {
            findings.issue(
                IssueKind::CountError,
                format!(
                    "\"{}\" has {examples} examples; {level} needs {required}",
                    entry.word
                ),
            );
        }
    }

    findings.finish()
}

/// Dialogues need enough lines and should reuse key vocabulary.
#[must_use]
pub fn validate_dialogue<S: AsRef<str>>(
    lines: &[S],
    level: CefrLevel,
    key_vocabulary: &[String],
) -> ValidationResult {
    let mut findings = Findings::default();

    if lines.len() < MIN_DIALOGUE_LINES {
        findings.issue(
            IssueKind::CountError,
            format!(
                "Expected at least {MIN_DIALOGUE_LINES} dialogue lines, found {}",
                lines.len()
            ),
        );
    }

    if let Some(message) = Complexity::of(lines).drifts_from(level) {
        findings.warn(IssueKind::ComplexityMismatch, message);
    }

    if !key_vocabulary.is_empty() {
        let using = lines
            .iter()
            .filter(|line| {
                let lower = line.as_ref().to_lowercase();
                key_vocabulary.iter().any(|w| lower.contains(&w.to_lowercase()))
            })
            .count();
        let threshold = VOCABULARY_LINE_THRESHOLD.min(lines.len());
        if using < threshold {
            findings.warn(
                IssueKind::VocabularyIntegration,
                format!("Only {using} lines use key vocabulary; aim for {threshold}"),
            );
        }
    }

    findings.finish()
}

/// Discussion needs exactly five varied questions.
#[must_use]
pub fn validate_discussion<S: AsRef<str>>(questions: &[S], level: CefrLevel) -> ValidationResult {
    let mut findings = Findings::default();

    if questions.len() != DISCUSSION_QUESTION_COUNT {
        findings.issue(
            IssueKind::CountError,
            format!(
                "Expected exactly {DISCUSSION_QUESTION_COUNT} discussion questions, found {}",
                questions.len()
            ),
        );
    }

    for question in questions.iter().map(AsRef::as_ref) {
        if !question.trim_end().ends_with('?') {
            findings.issue(
                IssueKind::FormatError,
                format!("Not a question: {question}"),
            );
        }
    }

    if let Some(message) = Complexity::of(questions).drifts_from(level) {
        findings.warn(IssueKind::ComplexityMismatch, message);
    }

    let openers: Vec<String> = questions
        .iter()
        .filter_map(|q| words(q.as_ref()).into_iter().next())
        .collect();
    if openers.len() > 1 && openers.iter().all(|w| *w == openers[0]) {
        findings.warn(
            IssueKind::VarietyIssue,
            format!("Every question starts with \"{}\"", openers[0]),
        );
    }

    findings.finish()
}

/// One grammar exercise with its answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarExercise {
    /// Task shown to the learner.
    #[serde(default)]
    pub prompt: String,
    /// Expected answer.
    #[serde(default)]
    pub answer: String,
}

/// A full grammar lesson section as edited in the lesson editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarSection {
    /// The rule in plain words.
    pub rule: String,
    /// How the form is built.
    pub form: String,
    /// When it is used.
    pub usage: String,
    /// Example sentences.
    pub examples: Vec<String>,
    /// Practice exercises.
    pub exercises: Vec<GrammarExercise>,
}

/// Grammar sections need rule, form, usage, examples and answered exercises.
#[must_use]
pub fn validate_grammar(section: &GrammarSection) -> ValidationResult {
    let mut findings = Findings::default();

    for (field, value) in [
        ("rule", &section.rule),
        ("form", &section.form),
        ("usage", &section.usage),
    ] {
        if value.trim().is_empty() {
            findings.issue(
                IssueKind::CompletenessError,
                format!("Grammar section is missing its {field}"),
            );
        }
    }

    if section.examples.len() < MIN_GRAMMAR_EXAMPLES {
        findings.issue(
            IssueKind::CompletenessError,
            format!(
                "Expected at least {MIN_GRAMMAR_EXAMPLES} examples, found {}",
                section.examples.len()
            ),
        );
    }
    if section.exercises.len() < MIN_GRAMMAR_EXERCISES {
        findings.issue(
            IssueKind::CompletenessError,
            format!(
                "Expected at least {MIN_GRAMMAR_EXERCISES} exercises, found {}",
                section.exercises.len()
            ),
        );
    }

    for (idx, exercise) in section.exercises.iter().enumerate() {
        if exercise.prompt.trim().is_empty() || exercise.answer.trim().is_empty() {
            findings.issue(
                IssueKind::QualityIssue,
                format!("Exercise {} needs both a prompt and an answer", idx + 1),
            );
        }
    }

    findings.finish()
}

/// One word to practise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PronunciationWord {
    /// The word.
    pub word: String,
    /// IPA transcription.
    pub ipa: String,
}

/// A tongue-twister and the sounds it trains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TongueTwister {
    /// The tongue-twister.
    pub text: String,
    /// Sounds targeted, e.g. `/θ/`.
    pub target_sounds: Vec<String>,
}

/// A full pronunciation lesson section as edited in the lesson editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PronunciationSection {
    /// Words with transcriptions.
    pub words: Vec<PronunciationWord>,
    /// Tongue-twisters.
    pub tongue_twisters: Vec<TongueTwister>,
    /// Articulation tips.
    pub tips: Vec<String>,
    /// Sentences for practice.
    pub practice_sentences: Vec<String>,
}

/// Pronunciation sections need transcribed words and tongue-twisters.
#[must_use]
pub fn validate_pronunciation(section: &PronunciationSection) -> ValidationResult {
    let mut findings = Findings::default();

    if section.words.len() < MIN_PRONUNCIATION_WORDS {
        findings.issue(
            IssueKind::CountError,
            format!(
                "Expected at least {MIN_PRONUNCIATION_WORDS} words, found {}",
                section.words.len()
            ),
        );
    }
    if section.tongue_twisters.len() < MIN_TONGUE_TWISTERS {
        findings.issue(
            IssueKind::CountError,
            format!(
                "Expected at least {MIN_TONGUE_TWISTERS} tongue-twisters, found {}",
                section.tongue_twisters.len()
            ),
        );
    }

    for word in &section.words {
        if word.ipa.trim().is_empty() {
            findings.issue(
                IssueKind::CompletenessError,
                format!("\"{}\" has no IPA transcription", word.word),
            );
        }
    }
    for (idx, twister) in section.tongue_twisters.iter().enumerate() {
        if twister.text.trim().is_empty() || twister.target_sounds.is_empty() {
            findings.issue(
                IssueKind::CompletenessError,
                format!("Tongue-twister {} needs text and target sounds", idx + 1),
            );
        }
    }

    if section.tips.is_empty() {
        findings.warn(IssueKind::CompletenessWarning, "No pronunciation tips");
    }
    if section.practice_sentences.is_empty() {
        findings.warn(IssueKind::CompletenessWarning, "No practice sentences");
    }

    findings.finish()
}

// ============================================================================
// Dispatch
// ============================================================================

/// Section content that has a validator, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatableContent {
    /// Warm-up questions.
    Warmup {
        /// The questions, without the instruction line.
        questions: Vec<String>,
    },
    /// Vocabulary entries.
    Vocabulary {
        /// The entries; an instruction sentinel is ignored.
        entries: Vec<VocabularyEntry>,
    },
    /// Dialogue lines.
    Dialogue {
        /// The lines, without the instruction line.
        lines: Vec<String>,
    },
    /// Discussion questions.
    Discussion {
        /// The questions, without the instruction line.
        questions: Vec<String>,
    },
    /// Grammar section.
    Grammar(GrammarSection),
    /// Pronunciation section.
    Pronunciation(PronunciationSection),
}

impl ValidatableContent {
    /// Runs the validator for this content kind.
    #[must_use]
    pub fn validate(&self, level: CefrLevel, key_vocabulary: &[String]) -> ValidationResult {
        match self {
            Self::Warmup { questions } => validate_warmup(questions, level),
            Self::Vocabulary { entries } => validate_vocabulary(entries, level),
            Self::Dialogue { lines } => validate_dialogue(lines, level, key_vocabulary),
            Self::Discussion { questions } => validate_discussion(questions, level),
            Self::Grammar(section) => validate_grammar(section),
            Self::Pronunciation(section) => validate_pronunciation(section),
        }
    }
}
