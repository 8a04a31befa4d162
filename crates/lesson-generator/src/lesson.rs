//! Lesson plans and the sequential lesson run.

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

use crate::context::{update_context, SharedContext};
use crate::error::{LessonError, Result};
use crate::generator::LessonGenerator;
use crate::level::CefrLevel;
use crate::progress::extra_section;
use crate::section::{GeneratedSection, LessonSection, SectionKind};

/// Language used when a request does not name one.
pub const DEFAULT_TARGET_LANGUAGE: &str = "English";

// ============================================================================
// LessonPlan
// ============================================================================

/// Ordered section requests for one lesson type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    /// Lesson type the plan belongs to.
    pub lesson_type: String,
    /// Sections in generation order.
    pub sections: Vec<LessonSection>,
}

impl LessonPlan {
    /// Derives the default plan for a lesson type.
    ///
    /// Base sections in order, with the lesson type's extra section (if any)
    /// placed before the wrap-up.
    #[must_use]
    pub fn for_lesson_type(lesson_type: &str) -> Self {
        let mut sections = vec![
            LessonSection::new(SectionKind::Warmup.name(), 1),
            LessonSection::new(SectionKind::Vocabulary.name(), 2),
            LessonSection::new(SectionKind::Reading.name(), 3)
                .depends_on(SectionKind::Vocabulary.name()),
            LessonSection::new(SectionKind::Comprehension.name(), 4)
                .depends_on(SectionKind::Reading.name()),
        ];

        if let Some(extra) = extra_section(lesson_type) {
            let dependency = match extra {
                SectionKind::Dialogue | SectionKind::Pronunciation => SectionKind::Vocabulary,
                _ => SectionKind::Reading,
            };
            sections.push(LessonSection::new(extra.name(), 5).depends_on(dependency.name()));
        }

        sections.push(LessonSection::new(SectionKind::Wrapup.name(), 6));

        Self {
            lesson_type: lesson_type.to_string(),
            sections,
        }
    }

    /// Section names in order.
    #[must_use]
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    /// Checks that every section is known and every dependency comes earlier.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::UnknownSection` for an unrecognized section or
    /// dependency name, and `LessonError::ConfigValidationError` when a
    /// dependency is missing or placed after the section that needs it.
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<SectionKind> = Vec::new();
        for section in &self.sections {
            let kind = SectionKind::from_name(&section.name)?;
            for dependency in &section.dependencies {
                let needed = SectionKind::from_name(dependency)?;
                if !seen.contains(&needed) {
                    return Err(LessonError::config_validation(
                        format!(
                            "Section '{kind}' in the '{}' plan depends on '{needed}', which is not \
                             generated before it",
                            self.lesson_type
                        ),
                        format!("Place '{needed}' earlier in the plan or remove the dependency"),
                    ));
                }
            }
            seen.push(kind);
        }
        Ok(())
    }
}

// ============================================================================
// Request and result
// ============================================================================

/// Everything needed to generate a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRequest {
    /// Raw source text.
    pub source_text: String,
    /// Lesson type, e.g. `"discussion"`.
    pub lesson_type: String,
    /// Target CEFR level.
    #[serde(default)]
    pub level: CefrLevel,
    /// Lesson language.
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

fn default_target_language() -> String {
    DEFAULT_TARGET_LANGUAGE.to_string()
}

impl LessonRequest {
    /// Creates a request with the default level and language.
    #[must_use]
    pub fn new(source_text: impl Into<String>, lesson_type: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            lesson_type: lesson_type.into(),
            level: CefrLevel::default(),
            target_language: default_target_language(),
        }
    }

    /// Sets the level.
    #[must_use]
    pub const fn with_level(mut self, level: CefrLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the target language.
    #[must_use]
    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    /// Rejects blank source text.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptySource` when the source is whitespace only.
    pub fn validate(&self) -> Result<()> {
        if self.source_text.trim().is_empty() {
            return Err(LessonError::EmptySource);
        }
        Ok(())
    }
}

/// A finished lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedLesson {
    /// Lesson type.
    pub lesson_type: String,
    /// Target level.
    pub level: CefrLevel,
    /// Lesson language.
    pub target_language: String,
    /// Final shared context, after all updates.
    pub context: SharedContext,
    /// Sections in generation order.
    pub sections: Vec<GeneratedSection>,
    /// Sum of `tokens_used` over all sections.
    pub total_tokens: usize,
}

impl GeneratedLesson {
    /// Finds a section by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&GeneratedSection> {
        self.sections
            .iter()
            .find(|s| s.section_name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Lesson run
// ============================================================================

impl LessonGenerator {
    /// Builds the shared context once, then generates every section of
    /// `plan` in order, absorbing each into the context.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptySource` for blank source text, and any
    /// error from [`LessonGenerator::generate_section`].
    pub async fn generate_lesson(
        &self,
        request: &LessonRequest,
        plan: &LessonPlan,
    ) -> Result<GeneratedLesson> {
        request.validate()?;
        let span = info_span!(
            "lesson",
            lesson_type = %request.lesson_type,
            level = %request.level
        );

        async move {
            info!(sections = plan.sections.len(), "Starting lesson generation");
            let mut context = self
                .build_shared_context(
                    &request.source_text,
                    &request.lesson_type,
                    request.level,
                    &request.target_language,
                )
                .await;

            let mut sections: Vec<GeneratedSection> = Vec::with_capacity(plan.sections.len());
            for requested in &plan.sections {
                let section = self
                    .generate_section(requested, &context, &sections)
                    .await?;
                update_context(&mut context, &section);
                sections.push(section);
            }

            let total_tokens = sections.iter().map(|s| s.tokens_used).sum();
            info!(total_tokens, "Lesson generation complete");

            Ok::<_, LessonError>(GeneratedLesson {
                lesson_type: request.lesson_type.clone(),
                level: request.level,
                target_language: request.target_language.clone(),
                context,
                sections,
                total_tokens,
            })
        }
        .instrument(span)
        .await
    }
}
