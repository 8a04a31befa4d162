//! The shared context: a one-time analysis of the source text reused by
//! every section prompt.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::completion::CompletionService;
use crate::level::CefrLevel;
use crate::optimizer::summarize_content;
use crate::section::{GeneratedSection, SectionKind};
use crate::text::{
    detect_themes, estimate_tokens, is_stopword, parse_list, truncate_chars, words,
    DEFAULT_THEMES,
};

/// Default number of characters of source text kept in the context.
pub const DEFAULT_SOURCE_TEXT_LIMIT: usize = 1000;

/// Default number of key vocabulary terms requested.
pub const DEFAULT_KEY_VOCABULARY_SIZE: usize = 6;

/// Upper bound on key vocabulary after updates.
pub const MAX_KEY_VOCABULARY: usize = 10;

/// Number of themes extracted when the context is built.
pub const INITIAL_THEME_LIMIT: usize = 3;

/// Upper bound on themes after updates.
pub const MAX_THEMES: usize = 5;

/// Upper bound on the summary length in characters.
pub const SUMMARY_LIMIT: usize = 500;

/// Length of the locally extracted summary used as fallback.
const FALLBACK_SUMMARY_LENGTH: usize = 300;

/// Cross-section analysis of the source text.
///
/// `difficulty_level`, `source_text`, `lesson_type` and `target_language` are
/// fixed at construction. Vocabulary and themes only change through
/// [`update_context`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedContext {
    key_vocabulary: Vec<String>,
    main_themes: Vec<String>,
    difficulty_level: CefrLevel,
    content_summary: String,
    source_text: String,
    lesson_type: String,
    target_language: String,
}

impl SharedContext {
    /// Creates a context with an empty analysis.
    ///
    /// The source text is truncated to [`DEFAULT_SOURCE_TEXT_LIMIT`] characters.
    #[must_use]
    pub fn new(
        source_text: &str,
        lesson_type: impl Into<String>,
        difficulty_level: CefrLevel,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            key_vocabulary: Vec::new(),
            main_themes: Vec::new(),
            difficulty_level,
            content_summary: String::new(),
            source_text: truncate_chars(source_text, DEFAULT_SOURCE_TEXT_LIMIT),
            lesson_type: lesson_type.into(),
            target_language: target_language.into(),
        }
    }

    /// Sets the key vocabulary, lower-casing and de-duplicating terms.
    #[must_use]
    pub fn with_key_vocabulary(mut self, terms: Vec<String>) -> Self {
        self.key_vocabulary.clear();
        for term in terms {
            push_distinct(&mut self.key_vocabulary, term.trim().to_lowercase());
        }
        self
    }

    /// Sets the main themes.
    #[must_use]
    pub fn with_main_themes(mut self, themes: Vec<String>) -> Self {
        self.main_themes = themes;
        self
    }

    /// Sets the content summary.
    #[must_use]
    pub fn with_content_summary(mut self, summary: impl Into<String>) -> Self {
        self.content_summary = summary.into();
        self
    }

    fn with_source_limit(mut self, source_text: &str, limit: usize) -> Self {
        self.source_text = truncate_chars(source_text, limit);
        self
    }

    /// Key terms in relevance order.
    #[must_use]
    pub fn key_vocabulary(&self) -> &[String] {
        &self.key_vocabulary
    }

    /// Short topic phrases.
    #[must_use]
    pub fn main_themes(&self) -> &[String] {
        &self.main_themes
    }

    /// Target CEFR level.
    #[must_use]
    pub const fn difficulty_level(&self) -> CefrLevel {
        self.difficulty_level
    }

    /// One-paragraph summary of the source.
    #[must_use]
    pub fn content_summary(&self) -> &str {
        &self.content_summary
    }

    /// Leading portion of the original input.
    #[must_use]
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Lesson type the context was built for.
    #[must_use]
    pub fn lesson_type(&self) -> &str {
        &self.lesson_type
    }

    /// Language the lesson is written in.
    #[must_use]
    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Returns the theme at `index`, cycling, or a default theme if none exist.
    #[must_use]
    pub fn theme(&self, index: usize) -> &str {
        if self.main_themes.is_empty() {
            DEFAULT_THEMES[index % DEFAULT_THEMES.len()]
        } else {
            &self.main_themes[index % self.main_themes.len()]
        }
    }
}

fn push_distinct(list: &mut Vec<String>, item: String) {
    if !item.is_empty() && !list.contains(&item) {
        list.push(item);
    }
}

// ============================================================================
// Building
// ============================================================================

/// Tunables for [`build_shared_context_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSettings {
    /// Number of key vocabulary terms to request.
    pub key_vocabulary_size: usize,
    /// Characters of source text kept and sent to the completion service.
    pub source_text_limit: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            key_vocabulary_size: DEFAULT_KEY_VOCABULARY_SIZE,
            source_text_limit: DEFAULT_SOURCE_TEXT_LIMIT,
        }
    }
}

/// Builds the shared context with default settings.
pub async fn build_shared_context(
    service: &dyn CompletionService,
    source_text: &str,
    lesson_type: &str,
    difficulty_level: CefrLevel,
    target_language: &str,
) -> SharedContext {
    build_shared_context_with(
        service,
        source_text,
        lesson_type,
        difficulty_level,
        target_language,
        ContextSettings::default(),
    )
    .await
}

/// Builds the shared context from three completion prompts.
///
/// Each of vocabulary, themes and summary falls back to local extraction
/// on its own when its prompt fails or yields nothing usable, so this never
/// fails.
pub async fn build_shared_context_with(
    service: &dyn CompletionService,
    source_text: &str,
    lesson_type: &str,
    difficulty_level: CefrLevel,
    target_language: &str,
    settings: ContextSettings,
) -> SharedContext {
    let source = truncate_chars(source_text, settings.source_text_limit);
    let vocab_size = settings.key_vocabulary_size.min(MAX_KEY_VOCABULARY);
    let mut tokens = 0usize;

    let vocabulary_prompt = format!(
        "List the {vocab_size} most useful vocabulary words from this text for \
         {difficulty_level} learners of {target_language}. Return one word per line, lower \
         case, with no numbering or explanations.\n\nText:\n{source}"
    );
    let key_vocabulary = match ask(service, "vocabulary", &vocabulary_prompt, &mut tokens).await {
        Some(response) => parse_vocabulary(&response, vocab_size),
        None => Vec::new(),
    };
    let key_vocabulary = if key_vocabulary.is_empty() {
        warn!(field = "vocabulary", "Using frequency-based key vocabulary");
        frequent_terms(&source, vocab_size)
    } else {
        key_vocabulary
    };

    let themes_prompt = format!(
        "List up to {INITIAL_THEME_LIMIT} main themes of this text as short phrases. Return one \
         theme per line with no numbering.\n\nText:\n{source}"
    );
    let main_themes: Vec<String> = match ask(service, "themes", &themes_prompt, &mut tokens).await
    {
        Some(response) => parse_list(&response)
            .into_iter()
            .take(INITIAL_THEME_LIMIT)
            .collect(),
        None => Vec::new(),
    };
    let main_themes = if main_themes.is_empty() {
        warn!(field = "themes", "Using keyword-based themes");
        fallback_themes(&source)
    } else {
        main_themes
    };

    let summary_prompt = format!(
        "Summarize this text in one short paragraph for a {target_language} teacher.\n\n\
         Text:\n{source}"
    );
    let content_summary = match ask(service, "summary", &summary_prompt, &mut tokens).await {
        Some(response) => {
            let paragraph = response.split("\n\n").next().unwrap_or("").trim().to_string();
            summarize_content(&paragraph, SUMMARY_LIMIT)
        }
        None => String::new(),
    };
    let content_summary = if content_summary.is_empty() {
        warn!(field = "summary", "Using extracted summary");
        summarize_content(source.trim(), FALLBACK_SUMMARY_LENGTH)
    } else {
        content_summary
    };

    debug!(
        vocabulary = key_vocabulary.len(),
        themes = main_themes.len(),
        tokens,
        "Shared context built"
    );

    SharedContext::new(source_text, lesson_type, difficulty_level, target_language)
        .with_source_limit(source_text, settings.source_text_limit)
        .with_key_vocabulary(key_vocabulary)
        .with_main_themes(main_themes)
        .with_content_summary(content_summary)
}

async fn ask(
    service: &dyn CompletionService,
    field: &str,
    prompt: &str,
    tokens: &mut usize,
) -> Option<String> {
    *tokens += estimate_tokens(prompt);
    match service.prompt(prompt).await {
        Ok(response) => {
            *tokens += estimate_tokens(&response);
            Some(response)
        }
        Err(e) => {
            warn!(field, kind = %e.kind(), error = %e, "Context completion failed");
            None
        }
    }
}

fn parse_vocabulary(response: &str, limit: usize) -> Vec<String> {
    let mut terms = Vec::new();
    for item in parse_list(response) {
        if terms.len() == limit {
            break;
        }
        push_distinct(&mut terms, item.to_lowercase());
    }
    terms
}

/// Most frequent content words, ties broken by first occurrence.
fn frequent_terms(text: &str, limit: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for word in words(text) {
        if word.chars().count() <= 3 || is_stopword(&word) {
            continue;
        }
        match counts.iter_mut().find(|(w, _)| *w == word) {
            Some((_, count)) => *count += 1,
            None => counts.push((word, 1)),
        }
    }
    // stable sort keeps first-occurrence order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(w, _)| w).collect()
}

fn fallback_themes(text: &str) -> Vec<String> {
    let detected = detect_themes(text, INITIAL_THEME_LIMIT);
    if detected.is_empty() {
        DEFAULT_THEMES.iter().map(|t| (*t).to_string()).collect()
    } else {
        detected
    }
}

// ============================================================================
// Updating
// ============================================================================

/// Absorbs a finished section into the context.
///
/// Vocabulary sections append newly seen words (up to
/// [`MAX_KEY_VOCABULARY`]); reading sections append newly detected themes (up
/// to [`MAX_THEMES`]). Other sections leave the context untouched.
pub fn update_context(context: &mut SharedContext, section: &GeneratedSection) {
    match section.kind() {
        Some(SectionKind::Vocabulary) => {
            let Some(entries) = section.content.as_vocabulary() else {
                return;
            };
            for entry in entries.iter().filter(|e| !e.is_instruction()) {
                if context.key_vocabulary.len() >= MAX_KEY_VOCABULARY {
                    break;
                }
                push_distinct(&mut context.key_vocabulary, entry.word.trim().to_lowercase());
            }
        }
        Some(SectionKind::Reading) => {
            let Some(lines) = section.content.as_lines() else {
                return;
            };
            let passage = lines.iter().skip(1).cloned().collect::<Vec<_>>().join(" ");
            for theme in detect_themes(&passage, MAX_THEMES) {
                if context.main_themes.len() >= MAX_THEMES {
                    break;
                }
                push_distinct(&mut context.main_themes, theme);
            }
        }
        _ => {}
    }
}
