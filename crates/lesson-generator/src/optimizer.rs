//! Prompt and token optimizer.
//!
//! Every section prompt is built here from the shared context rather than
//! the raw source, and each is tagged with the strategy that shaped it. The
//! remaining helpers shrink text (`extract_key_terms`, `summarize_content`)
//! or group prompts into token-bounded batches (`batch_prompts`).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::SharedContext;
use crate::level::CefrLevel;
use crate::section::{GeneratedSection, SectionKind};
use crate::text::{estimate_tokens, is_stopword, sentences, truncate_chars, words};

/// Default per-batch token ceiling for [`batch_prompts`].
pub const DEFAULT_BATCH_TOKEN_LIMIT: usize = 1000;

/// Maximum number of terms returned by [`extract_key_terms`].
pub const MAX_KEY_TERMS: usize = 10;

/// Number of warm-up questions requested.
pub const WARMUP_QUESTION_COUNT: usize = 3;

/// Number of comprehension questions requested.
pub const COMPREHENSION_QUESTION_COUNT: usize = 5;

/// Number of discussion questions requested (and required).
pub const DISCUSSION_QUESTION_COUNT: usize = 5;

/// Minimum dialogue length in lines.
pub const MIN_DIALOGUE_LINES: usize = 12;

/// Number of wrap-up questions requested.
pub const WRAPUP_QUESTION_COUNT: usize = 3;

/// Characters of a reading passage quoted in the comprehension prompt.
const PASSAGE_PROMPT_CHARS: usize = 1500;

/// Characters of the summary quoted in most prompts.
const SUMMARY_PROMPT_CHARS: usize = 400;

// ============================================================================
// Strategies
// ============================================================================

/// Named reason a section's prompt is shaped the way it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStrategy {
    /// Questions built from themes only, never from source details.
    ThemeBasedQuestions,
    /// One short prompt per term instead of the whole source.
    FocusedVocabularyExtraction,
    /// Passage written from the summary and key vocabulary.
    ContentSummarization,
    /// All comprehension questions in a single round-trip.
    BatchQuestionGeneration,
    /// Open-ended questions from themes and summary.
    AnalyticalQuestionGeneration,
    /// Dialogue that recycles the key vocabulary.
    VocabularyReuse,
    /// Compact JSON object that parses without post-processing.
    StructuredJsonOutput,
    /// Single target word picked from key vocabulary.
    TargetedWordSelection,
    /// Closing questions from themes and vocabulary.
    ReflectionSummary,
}

impl OptimizationStrategy {
    /// Returns the wire name, e.g. `"vocabulary_reuse"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ThemeBasedQuestions => "theme_based_questions",
            Self::FocusedVocabularyExtraction => "focused_vocabulary_extraction",
            Self::ContentSummarization => "content_summarization",
            Self::BatchQuestionGeneration => "batch_question_generation",
            Self::AnalyticalQuestionGeneration => "analytical_question_generation",
            Self::VocabularyReuse => "vocabulary_reuse",
            Self::StructuredJsonOutput => "structured_json_output",
            Self::TargetedWordSelection => "targeted_word_selection",
            Self::ReflectionSummary => "reflection_summary",
        }
    }

    /// Strategy used for a section kind.
    #[must_use]
    pub const fn for_section(kind: SectionKind) -> Self {
        match kind {
            SectionKind::Warmup => Self::ThemeBasedQuestions,
            SectionKind::Vocabulary => Self::FocusedVocabularyExtraction,
            SectionKind::Reading => Self::ContentSummarization,
            SectionKind::Comprehension => Self::BatchQuestionGeneration,
            SectionKind::Discussion => Self::AnalyticalQuestionGeneration,
            SectionKind::Dialogue => Self::VocabularyReuse,
            SectionKind::Grammar => Self::StructuredJsonOutput,
            SectionKind::Pronunciation => Self::TargetedWordSelection,
            SectionKind::Wrapup => Self::ReflectionSummary,
        }
    }
}

impl fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A prompt ready to send, with its estimated size and strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedPrompt {
    /// The prompt text.
    pub prompt: String,
    /// Estimated token count of `prompt`.
    pub estimated_tokens: usize,
    /// Why the prompt looks the way it does.
    pub optimization_strategy: OptimizationStrategy,
}

impl OptimizedPrompt {
    fn new(prompt: String, strategy: OptimizationStrategy) -> Self {
        Self {
            estimated_tokens: estimate_tokens(&prompt),
            prompt,
            optimization_strategy: strategy,
        }
    }
}

// ============================================================================
// Prompt builders
// ============================================================================

/// Builds the prompt for one section from the shared context.
///
/// `previous` is only consulted by comprehension, which asks about the
/// generated reading passage. For vocabulary this returns the definition
/// prompt of the first key term; the generator uses [`word_prompts`] for
/// every term.
#[must_use]
pub fn optimize_prompt(
    kind: SectionKind,
    context: &SharedContext,
    previous: &[GeneratedSection],
) -> OptimizedPrompt {
    let strategy = OptimizationStrategy::for_section(kind);
    let level = context.difficulty_level();
    let language = context.target_language();
    let themes = context.main_themes().join(", ");
    let vocabulary = context.key_vocabulary().join(", ");
    let summary = truncate_chars(context.content_summary(), SUMMARY_PROMPT_CHARS);

    let prompt = match kind {
        SectionKind::Warmup => format!(
            "Write {WARMUP_QUESTION_COUNT} warm-up discussion questions for {language} learners at \
             {level_desc} level about these themes: {themes}.\n\
             Ask about the learners' own experiences and opinions. Do not mention any text, \
             article, story, or passage.\n\
             Return one question per line with no numbering.",
            level_desc = level.description(),
        ),
        SectionKind::Vocabulary => {
            let word = context.key_vocabulary().first().map_or("", String::as_str);
            let [definition, _] = word_prompts(word, context);
            return definition;
        }
        SectionKind::Reading => format!(
            "Write a reading passage of about {words} words in {language} for learners at \
             {level_desc} level.\n\
             Base it on this summary: {summary}\n\
             Use these words naturally: {vocabulary}.\n\
             Return only the passage.",
            words = reading_length(level),
            level_desc = level.description(),
        ),
        SectionKind::Comprehension => {
            let passage = reading_passage(previous)
                .map_or_else(|| summary.clone(), |p| truncate_chars(&p, PASSAGE_PROMPT_CHARS));
            format!(
                "Write {COMPREHENSION_QUESTION_COUNT} comprehension questions in {language} for \
                 {level} learners about this passage:\n{passage}\n\
                 Return one question per line with no numbering or answers."
            )
        }
        SectionKind::Discussion => {
            let style = if level.is_beginner() {
                "simple questions about personal experience"
            } else {
                "analytical questions that ask for opinions, comparisons, and reasons"
            };
            format!(
                "Write exactly {DISCUSSION_QUESTION_COUNT} open-ended discussion questions in \
                 {language} for {level} learners. Use {style}.\n\
                 Themes: {themes}. Context: {summary}\n\
                 Start the questions with different question words.\n\
                 Return one question per line with no numbering."
            )
        }
        SectionKind::Dialogue => format!(
            "Write a dialogue of at least {MIN_DIALOGUE_LINES} lines in {language} between two \
             speakers, A and B, for learners at {level_desc} level.\n\
             Topic: {themes}. Use these words: {vocabulary}.\n\
             Format every line as \"A: ...\" or \"B: ...\".",
            level_desc = level.description(),
        ),
        SectionKind::Grammar => format!(
            "Choose one grammar point suitable for {level} learners of {language} that fits this \
             context: {summary}\n\
             Return only JSON: {{\"focus\": \"grammar point\", \"examples\": [3 example \
             sentences], \"exercise\": [3 practice exercises]}}"
        ),
        SectionKind::Pronunciation => {
            let word = pronunciation_target(context).unwrap_or("communication");
            format!(
                "Create a pronunciation drill in {language} for the word \"{word}\" for {level} \
                 learners.\n\
                 Return only JSON: {{\"word\": \"{word}\", \"ipa\": \"IPA transcription\", \
                 \"practice\": \"how to practise it, including which syllable is stressed\"}}"
            )
        }
        SectionKind::Wrapup => format!(
            "Write {WRAPUP_QUESTION_COUNT} short reflective questions in {language} for {level} \
             learners to close a lesson about {themes}. Encourage them to reuse: {vocabulary}.\n\
             Return one question per line with no numbering."
        ),
    };

    OptimizedPrompt::new(prompt, strategy)
}

/// Definition and example prompts for one vocabulary term.
#[must_use]
pub fn word_prompts(word: &str, context: &SharedContext) -> [OptimizedPrompt; 2] {
    let level = context.difficulty_level();
    let language = context.target_language();
    let count = level.vocabulary_example_count();
    let topic = context.main_themes().first().map_or("the lesson topic", String::as_str);
    let strategy = OptimizationStrategy::FocusedVocabularyExtraction;

    [
        OptimizedPrompt::new(
            format!(
                "Define \"{word}\" in one short sentence in {language} for {level} learners, as \
                 used in the context of {topic}. Return only the definition."
            ),
            strategy,
        ),
        OptimizedPrompt::new(
            format!(
                "Write {count} different example sentences in {language} using \"{word}\", \
                 suitable for {level} learners. Return one sentence per line with no numbering."
            ),
            strategy,
        ),
    ]
}

/// Key vocabulary term chosen for the pronunciation drill: the longest one.
#[must_use]
pub fn pronunciation_target(context: &SharedContext) -> Option<&str> {
    context
        .key_vocabulary()
        .iter()
        .map(String::as_str)
        .fold(None, |best: Option<&str>, word| match best {
            Some(current) if current.chars().count() >= word.chars().count() => Some(current),
            _ => Some(word),
        })
}

/// The passage text of the most recent reading section, if any.
#[must_use]
pub fn reading_passage(previous: &[GeneratedSection]) -> Option<String> {
    previous
        .iter()
        .rev()
        .find(|section| section.kind() == Some(SectionKind::Reading))
        .and_then(|section| section.content.as_lines())
        .map(|lines| lines.iter().skip(1).cloned().collect::<Vec<_>>().join("\n"))
        .filter(|passage| !passage.trim().is_empty())
}

const fn reading_length(level: CefrLevel) -> usize {
    match level {
        CefrLevel::A1 => 120,
        CefrLevel::A2 => 150,
        CefrLevel::B1 => 200,
        CefrLevel::B2 => 250,
        CefrLevel::C1 => 300,
        CefrLevel::C2 => 350,
    }
}

// ============================================================================
// Text reduction
// ============================================================================

/// Extracts up to ten key terms, preferring repeated two-word phrases.
///
/// A two-word phrase (adjacent non-stopwords in one sentence) that occurs at
/// least twice scores three points per occurrence; single words score one
/// point per occurrence. Single words already covered by a chosen phrase are
/// skipped.
#[must_use]
pub fn extract_key_terms(text: &str) -> Vec<String> {
    let mut scores: HashMap<String, (usize, usize)> = HashMap::new();
    let mut bigram_counts: HashMap<String, usize> = HashMap::new();
    let mut order = 0usize;
    let mut first_seen = |scores: &mut HashMap<String, (usize, usize)>, term: &str| {
        order += 1;
        scores.entry(term.to_string()).or_insert((0, order));
    };

    for sentence in sentences(text) {
        let tokens = words(&sentence);
        for token in &tokens {
            if is_content_word(token) {
                first_seen(&mut scores, token);
                if let Some(entry) = scores.get_mut(token.as_str()) {
                    entry.0 += 1;
                }
            }
        }
        for pair in tokens.windows(2) {
            if is_content_word(&pair[0]) && is_content_word(&pair[1]) {
                let phrase = format!("{} {}", pair[0], pair[1]);
                first_seen(&mut scores, &phrase);
                *bigram_counts.entry(phrase).or_insert(0) += 1;
            }
        }
    }

    for (phrase, count) in &bigram_counts {
        if let Some(entry) = scores.get_mut(phrase) {
            entry.0 = if *count >= 2 { count * 3 } else { 0 };
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = scores
        .into_iter()
        .filter(|(_, (score, _))| *score > 0)
        .map(|(term, (score, seen))| (term, score, seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let mut chosen: Vec<String> = Vec::new();
    for (term, _, _) in ranked {
        if chosen.len() == MAX_KEY_TERMS {
            break;
        }
        let covered = !term.contains(' ')
            && chosen
                .iter()
                .any(|c| c.contains(' ') && c.split(' ').any(|part| part == term));
        if !covered {
            chosen.push(term);
        }
    }
    chosen
}

fn is_content_word(word: &str) -> bool {
    word.chars().count() > 3 && !is_stopword(word)
}

/// Shortens text to at most `max_length` characters without cutting words.
///
/// Text that already fits is returned unchanged. Otherwise whole sentences
/// are kept: the opening sentence first, then the sentences richest in key
/// terms, emitted in their original order. If not even one sentence fits,
/// the text is cut at the last word boundary before the limit, or at the
/// limit itself when there is no boundary to cut at.
#[must_use]
pub fn summarize_content(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let parts = sentences(text);
    let key_terms = extract_key_terms(text);
    let mut candidates: Vec<(usize, usize)> = parts
        .iter()
        .enumerate()
        .map(|(idx, sentence)| {
            let lower = sentence.to_lowercase();
            let hits = key_terms.iter().filter(|t| lower.contains(t.as_str())).count();
            (idx, if idx == 0 { usize::MAX } else { hits })
        })
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut kept: Vec<usize> = Vec::new();
    let mut length = 0usize;
    for (idx, _) in candidates {
        let sentence_len = parts[idx].chars().count();
        let added = if kept.is_empty() { sentence_len } else { sentence_len + 1 };
        if length + added <= max_length {
            kept.push(idx);
            length += added;
        }
    }

    if !kept.is_empty() {
        kept.sort_unstable();
        return kept
            .iter()
            .map(|idx| parts[*idx].as_str())
            .collect::<Vec<_>>()
            .join(" ");
    }

    let head = truncate_chars(text, max_length + 1);
    let boundary = head.rfind(char::is_whitespace).unwrap_or(0);
    let cut = head[..boundary].trim_end();
    if cut.is_empty() {
        return truncate_chars(text, max_length);
    }
    cut.to_string()
}

/// Groups prompts into batches under a token ceiling, preserving order.
///
/// Prompts are packed greedily in their original order. A prompt larger than
/// the ceiling on its own forms a single-prompt batch.
#[must_use]
pub fn batch_prompts<S: AsRef<str>>(prompts: &[S], max_tokens: usize) -> Vec<Vec<String>> {
    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for prompt in prompts {
        let prompt = prompt.as_ref();
        let tokens = estimate_tokens(prompt);
        if !current.is_empty() && current_tokens + tokens > max_tokens {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current.push(prompt.to_string());
        current_tokens += tokens;
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
