//! The section generator.
//!
//! [`LessonGenerator::generate_section`] turns one section request into a
//! [`GeneratedSection`]: build a focused prompt, call the completion service,
//! parse and validate the response, and fall back to deterministic content
//! whenever any of those steps fails.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::completion::CompletionService;
use crate::context::{build_shared_context_with, ContextSettings, SharedContext};
use crate::error::{LessonError, Result};
use crate::fallback;
use crate::level::CefrLevel;
use crate::optimizer::{
    optimize_prompt, word_prompts, COMPREHENSION_QUESTION_COUNT, DISCUSSION_QUESTION_COUNT,
    WARMUP_QUESTION_COUNT, WRAPUP_QUESTION_COUNT,
};
use crate::progress::{notify, PhaseWeights, ProgressCallback, ProgressTracker, ProgressUpdate};
use crate::section::{
    GeneratedSection, GenerationStrategy, GrammarContent, LessonSection, PronunciationContent,
    SectionContent, SectionKind, VocabularyEntry,
};
use crate::text::{estimate_tokens, parse_list, title_case, words};
use crate::validators::{
    validate_dialogue, validate_discussion, validate_vocabulary, validate_warmup,
    ValidationResult,
};

/// Leading line of the warm-up section.
pub const WARMUP_INSTRUCTION: &str = "Discuss these warm-up questions with a partner:";

/// Meaning of the vocabulary instruction sentinel.
pub const VOCABULARY_INSTRUCTION: &str = "Study these words. Read each meaning and the example \
                                          sentences, then use each word in a sentence of your own.";

/// Leading line of the reading section.
pub const READING_INSTRUCTION: &str = "Read the following passage carefully:";

/// Leading line of the comprehension section.
pub const COMPREHENSION_INSTRUCTION: &str = "Answer these questions about the reading passage:";

/// Leading line of the discussion section.
pub const DISCUSSION_INSTRUCTION: &str = "Discuss these questions in pairs or small groups:";

/// Leading line of the dialogue section.
pub const DIALOGUE_INSTRUCTION: &str = "Read the dialogue aloud with a partner, then swap roles:";

/// Leading line of the wrap-up section.
pub const WRAPUP_INSTRUCTION: &str = "Reflect on today's lesson:";

/// Shortest reading passage accepted from the completion service, in words.
const MIN_READING_WORDS: usize = 25;

/// Section content plus the path that produced it.
struct Draft {
    content: SectionContent,
    strategy: GenerationStrategy,
}

impl Draft {
    const fn progressive(content: SectionContent) -> Self {
        Self {
            content,
            strategy: GenerationStrategy::Progressive,
        }
    }

    const fn fallback(content: SectionContent) -> Self {
        Self {
            content,
            strategy: GenerationStrategy::Fallback,
        }
    }
}

/// Generates lesson sections against a completion service.
///
/// Cheap to clone; clones share the completion service.
#[derive(Clone)]
pub struct LessonGenerator {
    service: Arc<dyn CompletionService>,
    tracker: ProgressTracker,
    callback: Option<ProgressCallback>,
    context_settings: ContextSettings,
}

impl fmt::Debug for LessonGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LessonGenerator")
            .field("tracker", &self.tracker)
            .field("has_callback", &self.callback.is_some())
            .field("context_settings", &self.context_settings)
            .finish_non_exhaustive()
    }
}

impl LessonGenerator {
    /// Creates a generator with default weights and no progress callback.
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            tracker: ProgressTracker::default(),
            callback: None,
            context_settings: ContextSettings::default(),
        }
    }

    /// Uses the given phase weights for progress reporting.
    #[must_use]
    pub fn with_weights(mut self, weights: PhaseWeights) -> Self {
        self.tracker = ProgressTracker::new(weights);
        self
    }

    /// Uses the given settings when building the shared context.
    #[must_use]
    pub const fn with_context_settings(mut self, settings: ContextSettings) -> Self {
        self.context_settings = settings;
        self
    }

    /// Registers a progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Replaces or clears the progress callback.
    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>) {
        self.callback = callback;
    }

    /// The progress tracker in use.
    #[must_use]
    pub const fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Builds the shared context with this generator's settings.
    pub async fn build_shared_context(
        &self,
        source_text: &str,
        lesson_type: &str,
        level: CefrLevel,
        target_language: &str,
    ) -> SharedContext {
        build_shared_context_with(
            self.service.as_ref(),
            source_text,
            lesson_type,
            level,
            target_language,
            self.context_settings,
        )
        .await
    }

    /// Generates one section.
    ///
    /// Dependencies listed on `section` are not enforced here; callers
    /// request sections in dependency order.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::UnknownSection` for unrecognized names, and
    /// `LessonError::GenerationFailed` when even the fallback path cannot
    /// produce content (for example, vocabulary with no key terms).
    pub async fn generate_section(
        &self,
        section: &LessonSection,
        context: &SharedContext,
        previous: &[GeneratedSection],
    ) -> Result<GeneratedSection> {
        let kind = SectionKind::from_name(&section.name)?;

        let mut completed: Vec<&str> = previous.iter().map(|s| s.section_name.as_str()).collect();
        for dependency in &section.dependencies {
            if !completed.iter().any(|name| name.eq_ignore_ascii_case(dependency)) {
                debug!(section = %kind, dependency = %dependency, "Dependency not generated yet");
            }
        }

        let lesson_type = context.lesson_type();
        let start = self.tracker.calculate(&completed, Some(kind.name()), lesson_type);
        self.report(format!("Generating {}", kind.label()), start, kind, None);

        let mut tokens = 0usize;
        let draft = match kind {
            SectionKind::Warmup => self.warmup(context, &mut tokens).await,
            SectionKind::Vocabulary => self.vocabulary(context, start, &mut tokens).await?,
            SectionKind::Reading => self.reading(context, &mut tokens).await?,
            SectionKind::Comprehension => self.comprehension(context, previous, &mut tokens).await,
            SectionKind::Discussion => self.discussion(context, &mut tokens).await,
            SectionKind::Dialogue => self.dialogue(context, &mut tokens).await,
            SectionKind::Grammar => self.grammar(context, &mut tokens).await,
            SectionKind::Pronunciation => self.pronunciation(context, &mut tokens).await,
            SectionKind::Wrapup => self.wrapup(context, &mut tokens).await,
        };

        info!(
            section = %kind,
            tokens,
            strategy = %draft.strategy,
            "Section generated"
        );

        completed.push(kind.name());
        let end = self.tracker.calculate(&completed, None, lesson_type);
        self.report(format!("Finished {}", kind.label()), end, kind, None);

        Ok(GeneratedSection {
            section_name: kind.name().to_string(),
            content: draft.content,
            tokens_used: tokens,
            generation_strategy: draft.strategy,
        })
    }

    fn report(&self, step: String, progress: u8, kind: SectionKind, section: Option<String>) {
        let update = ProgressUpdate {
            step,
            progress,
            phase: kind.name().to_string(),
            section,
        };
        notify(self.callback.as_ref(), &update);
    }

    /// One completion round-trip. `None` on any failure or blank output.
    async fn complete(&self, kind: SectionKind, prompt: &str, tokens: &mut usize) -> Option<String> {
        *tokens += estimate_tokens(prompt);
        match self.service.prompt(prompt).await {
            Ok(response) => {
                *tokens += estimate_tokens(&response);
                let trimmed = response.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(e) => {
                warn!(section = %kind, kind = %e.kind(), error = %e, "Completion call failed");
                None
            }
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    async fn warmup(&self, context: &SharedContext, tokens: &mut usize) -> Draft {
        let kind = SectionKind::Warmup;
        let prompt = optimize_prompt(kind, context, &[]);
        let questions = self
            .complete(kind, &prompt.prompt, tokens)
            .await
            .map(|r| first_items(&r, WARMUP_QUESTION_COUNT));
        let level = context.difficulty_level();

        lines_or_fallback(
            kind,
            WARMUP_INSTRUCTION,
            questions,
            |q| verdict(kind, &validate_warmup(q, level)),
            || fallback::warmup_questions(context),
        )
    }

    async fn vocabulary(
        &self,
        context: &SharedContext,
        progress: u8,
        tokens: &mut usize,
    ) -> Result<Draft> {
        let kind = SectionKind::Vocabulary;
        if context.key_vocabulary().is_empty() {
            return Err(LessonError::generation_failed(
                kind.name(),
                "no key vocabulary available",
            ));
        }

        let level = context.difficulty_level();
        let required = level.vocabulary_example_count();
        let mut answered = 0usize;
        let mut entries = vec![VocabularyEntry {
            word: VocabularyEntry::INSTRUCTION_WORD.to_string(),
            meaning: VOCABULARY_INSTRUCTION.to_string(),
            example: String::new(),
        }];

        for word in context.key_vocabulary() {
            self.report(
                format!("Defining \"{word}\""),
                progress,
                kind,
                Some(word.clone()),
            );
            let [definition_prompt, examples_prompt] = word_prompts(word, context);

            let meaning = self
                .complete(kind, &definition_prompt.prompt, tokens)
                .await
                .and_then(|r| parse_list(&r).into_iter().next());
            let meaning = match meaning {
                Some(meaning) => {
                    answered += 1;
                    meaning
                }
                None => fallback::vocabulary_meaning(word, context),
            };

            let mut examples = match self.complete(kind, &examples_prompt.prompt, tokens).await {
                Some(response) => {
                    answered += 1;
                    first_items(&response, required)
                }
                None => Vec::new(),
            };
            if examples.len() < required {
                debug!(word = %word, have = examples.len(), required, "Padding vocabulary examples");
                fallback::pad_examples(word, required, context, &mut examples);
            }

            entries.push(VocabularyEntry {
                word: title_case(word),
                meaning,
                example: examples.join("\n"),
            });
        }

        verdict(kind, &validate_vocabulary(&entries, level))
            .map_err(|reason| LessonError::generation_failed(kind.name(), reason))?;

        let content = SectionContent::Vocabulary(entries);
        Ok(if answered == 0 {
            warn!(section = %kind, "No completion succeeded; vocabulary built from fallbacks");
            Draft::fallback(content)
        } else {
            Draft::progressive(content)
        })
    }

    async fn reading(&self, context: &SharedContext, tokens: &mut usize) -> Result<Draft> {
        let kind = SectionKind::Reading;
        let prompt = optimize_prompt(kind, context, &[]);
        let passage = self.complete(kind, &prompt.prompt, tokens).await;

        match passage {
            Some(passage) if words(&passage).len() >= MIN_READING_WORDS => Ok(Draft::progressive(
                SectionContent::Lines(vec![READING_INSTRUCTION.to_string(), passage]),
            )),
            other => {
                let reason = if other.is_some() {
                    "passage too short"
                } else {
                    "completion call failed"
                };
                warn!(section = %kind, reason, "Using fallback content");
                let passage = fallback::reading_passage(context).ok_or_else(|| {
                    LessonError::generation_failed(kind.name(), "no content summary available")
                })?;
                Ok(Draft::fallback(SectionContent::Lines(vec![
                    READING_INSTRUCTION.to_string(),
                    passage,
                ])))
            }
        }
    }

    async fn comprehension(
        &self,
        context: &SharedContext,
        previous: &[GeneratedSection],
        tokens: &mut usize,
    ) -> Draft {
        let kind = SectionKind::Comprehension;
        let prompt = optimize_prompt(kind, context, previous);
        let questions = self
            .complete(kind, &prompt.prompt, tokens)
            .await
            .map(|r| first_items(&r, COMPREHENSION_QUESTION_COUNT));

        lines_or_fallback(
            kind,
            COMPREHENSION_INSTRUCTION,
            questions,
            |q| all_questions(q, 3),
            || fallback::comprehension_questions(context),
        )
    }

    async fn discussion(&self, context: &SharedContext, tokens: &mut usize) -> Draft {
        let kind = SectionKind::Discussion;
        let prompt = optimize_prompt(kind, context, &[]);
        let questions = self
            .complete(kind, &prompt.prompt, tokens)
            .await
            .map(|r| first_items(&r, DISCUSSION_QUESTION_COUNT));
        let level = context.difficulty_level();

        lines_or_fallback(
            kind,
            DISCUSSION_INSTRUCTION,
            questions,
            |q| verdict(kind, &validate_discussion(q, level)),
            || fallback::discussion_questions(context),
        )
    }

    async fn dialogue(&self, context: &SharedContext, tokens: &mut usize) -> Draft {
        let kind = SectionKind::Dialogue;
        let prompt = optimize_prompt(kind, context, &[]);
        let lines = self.complete(kind, &prompt.prompt, tokens).await.map(|r| {
            r.lines()
                .map(|line| line.replace("**", "").trim().to_string())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
        });
        let level = context.difficulty_level();

        lines_or_fallback(
            kind,
            DIALOGUE_INSTRUCTION,
            lines,
            |l| verdict(kind, &validate_dialogue(l, level, context.key_vocabulary())),
            || fallback::dialogue_lines(context),
        )
    }

    async fn grammar(&self, context: &SharedContext, tokens: &mut usize) -> Draft {
        let kind = SectionKind::Grammar;
        let prompt = optimize_prompt(kind, context, &[]);
        let parsed = self
            .complete(kind, &prompt.prompt, tokens)
            .await
            .and_then(|r| parse_json::<GrammarContent>(kind, &r));

        match parsed {
            Some(mut grammar)
                if !grammar.focus.trim().is_empty()
                    && grammar.examples.len() >= 3
                    && grammar.exercise.len() >= 3 =>
            {
                grammar.examples.truncate(3);
                grammar.exercise.truncate(3);
                Draft::progressive(SectionContent::Grammar(grammar))
            }
            _ => {
                warn!(section = %kind, "Using canned grammar focus");
                Draft::fallback(SectionContent::Grammar(fallback::grammar_focus(
                    context.difficulty_level(),
                )))
            }
        }
    }

    async fn pronunciation(&self, context: &SharedContext, tokens: &mut usize) -> Draft {
        let kind = SectionKind::Pronunciation;
        let prompt = optimize_prompt(kind, context, &[]);
        let parsed = self
            .complete(kind, &prompt.prompt, tokens)
            .await
            .and_then(|r| parse_json::<PronunciationContent>(kind, &r));

        match parsed {
            Some(drill)
                if !drill.word.trim().is_empty()
                    && !drill.ipa.trim().is_empty()
                    && !drill.practice.trim().is_empty() =>
            {
                Draft::progressive(SectionContent::Pronunciation(drill))
            }
            _ => {
                warn!(section = %kind, "Using canned pronunciation drill");
                Draft::fallback(SectionContent::Pronunciation(fallback::pronunciation_drill()))
            }
        }
    }

    async fn wrapup(&self, context: &SharedContext, tokens: &mut usize) -> Draft {
        let kind = SectionKind::Wrapup;
        let prompt = optimize_prompt(kind, context, &[]);
        let questions = self
            .complete(kind, &prompt.prompt, tokens)
            .await
            .map(|r| first_items(&r, WRAPUP_QUESTION_COUNT));

        lines_or_fallback(
            kind,
            WRAPUP_INSTRUCTION,
            questions,
            |q| all_questions(q, WRAPUP_QUESTION_COUNT),
            || fallback::wrapup_questions(context),
        )
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn first_items(response: &str, limit: usize) -> Vec<String> {
    parse_list(response).into_iter().take(limit).collect()
}

/// Logs a validation outcome and turns it into accept/reject.
fn verdict(kind: SectionKind, result: &ValidationResult) -> std::result::Result<(), String> {
    debug!(
        section = %kind,
        valid = result.is_valid,
        issues = result.issues.len(),
        warnings = result.warnings.len(),
        "Validated section content"
    );
    if result.is_valid {
        Ok(())
    } else {
        Err(result
            .first_issue()
            .unwrap_or("validation failed")
            .to_string())
    }
}

fn all_questions(items: &[String], minimum: usize) -> std::result::Result<(), String> {
    if items.len() < minimum {
        return Err(format!("expected {minimum} questions, got {}", items.len()));
    }
    match items.iter().find(|q| !q.trim_end().ends_with('?')) {
        Some(item) => Err(format!("not a question: {item}")),
        None => Ok(()),
    }
}

/// Accepts checked lines or substitutes the fallback, prefixing the instruction.
fn lines_or_fallback(
    kind: SectionKind,
    instruction: &str,
    candidate: Option<Vec<String>>,
    check: impl FnOnce(&[String]) -> std::result::Result<(), String>,
    fallback: impl FnOnce() -> Vec<String>,
) -> Draft {
    let outcome = match candidate {
        Some(lines) if !lines.is_empty() => check(&lines).map(|()| lines),
        Some(_) => Err("response contained no usable lines".to_string()),
        None => Err("completion call failed".to_string()),
    };

    match outcome {
        Ok(lines) => Draft::progressive(SectionContent::Lines(with_instruction(instruction, lines))),
        Err(reason) => {
            warn!(section = %kind, %reason, "Using fallback content");
            Draft::fallback(SectionContent::Lines(with_instruction(
                instruction,
                fallback(),
            )))
        }
    }
}

fn with_instruction(instruction: &str, lines: Vec<String>) -> Vec<String> {
    std::iter::once(instruction.to_string()).chain(lines).collect()
}

/// Parses the first JSON object in a response, ignoring code fences and prose.
fn parse_json<T: DeserializeOwned>(kind: SectionKind, response: &str) -> Option<T> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str(&response[start..=end]) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(section = %kind, error = %e, "Response is not the expected JSON");
            None
        }
    }
}
