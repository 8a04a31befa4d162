//! Configuration for the lesson generator.
//!
//! Loaded from `lesson.json`. Every field has a default, so a missing file or
//! a partial file is fine; values are validated after loading.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::completion::CompletionProvider;
use crate::context::{
    ContextSettings, DEFAULT_KEY_VOCABULARY_SIZE, DEFAULT_SOURCE_TEXT_LIMIT, MAX_KEY_VOCABULARY,
};
use crate::error::{LessonError, Result};
use crate::lesson::{LessonPlan, DEFAULT_TARGET_LANGUAGE};
use crate::level::CefrLevel;
use crate::progress::PhaseWeights;
use crate::section::{LessonSection, SectionKind};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "lesson.json";

/// Default timeout in seconds for one completion call.
const fn default_completion_timeout() -> u64 {
    60
}

const fn default_source_text_limit() -> usize {
    DEFAULT_SOURCE_TEXT_LIMIT
}

const fn default_key_vocabulary_size() -> usize {
    DEFAULT_KEY_VOCABULARY_SIZE
}

fn default_target_language() -> String {
    DEFAULT_TARGET_LANGUAGE.to_string()
}

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Command-line completion tool to use.
    #[serde(default)]
    pub provider: CompletionProvider,

    /// Timeout for a single completion call in seconds.
    #[serde(default = "default_completion_timeout")]
    pub completion_timeout: u64,

    /// Characters of source text kept in the shared context.
    #[serde(default = "default_source_text_limit")]
    pub source_text_limit: usize,

    /// Number of key vocabulary terms extracted from the source.
    #[serde(default = "default_key_vocabulary_size")]
    pub key_vocabulary_size: usize,

    /// Level used when a request does not specify one.
    #[serde(default)]
    pub default_level: CefrLevel,

    /// Language used when a request does not specify one.
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Per-section overrides of the default phase weights.
    #[serde(default)]
    pub phase_weights: BTreeMap<SectionKind, u32>,

    /// Section plans that replace the derived plan for a lesson type.
    #[serde(default)]
    pub lesson_plans: BTreeMap<String, Vec<LessonSection>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: CompletionProvider::default(),
            completion_timeout: default_completion_timeout(),
            source_text_limit: default_source_text_limit(),
            key_vocabulary_size: default_key_vocabulary_size(),
            default_level: CefrLevel::default(),
            target_language: default_target_language(),
            phase_weights: BTreeMap::new(),
            lesson_plans: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `lesson.json` exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            LessonError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `lesson.json` from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::ConfigParseError` for unreadable files, malformed
    /// JSON, or invalid enum values, and `LessonError::ConfigValidationError`
    /// (or `UnknownSection`) when values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(LessonError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| LessonError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::ConfigValidationError` for out-of-range values
    /// or misordered plan dependencies, and `LessonError::UnknownSection` for
    /// unrecognized section names in a plan.
    pub fn validate(&self) -> Result<()> {
        if self.completion_timeout == 0 {
            return Err(LessonError::config_validation(
                "completionTimeout must be greater than 0",
                "Set completionTimeout to at least 1 second in your lesson.json",
            ));
        }

        if self.source_text_limit == 0 {
            return Err(LessonError::config_validation(
                "sourceTextLimit must be greater than 0",
                "Set sourceTextLimit to the number of characters to analyze (default 1000)",
            ));
        }

        if !(1..=MAX_KEY_VOCABULARY).contains(&self.key_vocabulary_size) {
            return Err(LessonError::config_validation(
                format!(
                    "keyVocabularySize must be between 1 and {MAX_KEY_VOCABULARY}, got {}",
                    self.key_vocabulary_size
                ),
                "Set keyVocabularySize to a value such as 6 in your lesson.json",
            ));
        }

        if self.target_language.trim().is_empty() {
            return Err(LessonError::config_validation(
                "targetLanguage must not be empty",
                "Set targetLanguage, for example \"English\", in your lesson.json",
            ));
        }

        for (lesson_type, sections) in &self.lesson_plans {
            if sections.is_empty() {
                return Err(LessonError::config_validation(
                    format!("lessonPlans.{lesson_type} has no sections"),
                    "Remove the plan to use the derived one, or list at least one section",
                ));
            }
            plan_from(lesson_type, sections).validate()?;
        }

        Ok(())
    }

    /// Weight table: defaults with this config's overrides applied.
    #[must_use]
    pub fn weights(&self) -> PhaseWeights {
        PhaseWeights::with_overrides(&self.phase_weights)
    }

    /// Settings for building the shared context.
    #[must_use]
    pub const fn context_settings(&self) -> ContextSettings {
        ContextSettings {
            key_vocabulary_size: self.key_vocabulary_size,
            source_text_limit: self.source_text_limit,
        }
    }

    /// Completion timeout as a `Duration`.
    #[must_use]
    pub const fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout)
    }

    /// The configured plan for a lesson type, or the derived one.
    ///
    /// Lesson type names are matched case-insensitively.
    #[must_use]
    pub fn plan_for(&self, lesson_type: &str) -> LessonPlan {
        self.lesson_plans
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(lesson_type.trim()))
            .map_or_else(
                || LessonPlan::for_lesson_type(lesson_type),
                |(_, sections)| plan_from(lesson_type, sections),
            )
    }
}

fn plan_from(lesson_type: &str, sections: &[LessonSection]) -> LessonPlan {
    LessonPlan {
        lesson_type: lesson_type.to_string(),
        sections: sections.to_vec(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert_eq!(config.provider, CompletionProvider::Claude);
        assert_eq!(config.completion_timeout, 60);
        assert_eq!(config.source_text_limit, 1000);
        assert_eq!(config.key_vocabulary_size, 6);
        assert_eq!(config.default_level, CefrLevel::B1);
        assert_eq!(config.target_language, "English");
        assert_eq!(config.weights(), PhaseWeights::default());
    }

    #[test]
    fn test_config_deserialization_with_overrides() {
        let json = r#"{
            "provider": "Gemini",
            "completionTimeout": 30,
            "defaultLevel": "a2",
            "phaseWeights": {"wrapup": 20},
            "unknownField": true
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.provider, CompletionProvider::Gemini);
        assert_eq!(config.completion_timeout(), Duration::from_secs(30));
        assert_eq!(config.default_level, CefrLevel::A2);
        assert_eq!(config.weights().weight(SectionKind::Wrapup), 20);
        assert_eq!(config.weights().weight(SectionKind::Reading), 20);
        assert_eq!(config.key_vocabulary_size, 6);
    }

    #[test]
    fn test_invalid_level_is_parse_error() {
        let err = serde_json::from_str::<Config>(r#"{"defaultLevel": "Z9"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid CEFR level"));
    }

    #[test]
    fn test_load_from_file_valid_json() {
        let config_path = std::env::temp_dir().join("test_lesson_valid.json");
        let json = r#"{"provider": "codex", "keyVocabularySize": 8}"#;
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.provider, CompletionProvider::Codex);
        assert_eq!(config.context_settings().key_vocabulary_size, 8);

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let config_path = std::env::temp_dir().join("test_lesson_invalid.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(b"{ not valid json }").unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(
            matches!(&err, LessonError::ConfigParseError { path, message } if *path == config_path && !message.is_empty()),
            "Expected ConfigParseError with correct path, got: {err:?}"
        );

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_file_nonexistent_returns_default() {
        let config = Config::load_from_file(&PathBuf::from("/nonexistent/path/lesson.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_dir_finds_lesson_json() {
        let temp_dir = std::env::temp_dir().join("test_lesson_dir");
        std::fs::create_dir_all(&temp_dir).unwrap();
        let config_path = temp_dir.join("lesson.json");
        std::fs::write(&config_path, r#"{"targetLanguage": "Spanish"}"#).unwrap();

        let config = Config::load_from_dir(&temp_dir).unwrap();
        assert_eq!(config.target_language, "Spanish");

        std::fs::remove_file(&config_path).ok();
        std::fs::remove_dir(&temp_dir).ok();
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let config = Config {
            completion_timeout: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("completionTimeout"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_validation_rejects_vocabulary_size_out_of_range() {
        for size in [0, 11] {
            let config = Config {
                key_vocabulary_size: size,
                ..Config::default()
            };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_validation_rejects_blank_language() {
        let config = Config {
            target_language: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_plan_override_and_dependency_check() {
        let json = r#"{
            "lessonPlans": {
                "Exam": [
                    {"name": "vocabulary", "priority": 1},
                    {"name": "reading", "priority": 2, "dependencies": ["vocabulary"]},
                    {"name": "wrapup", "priority": 3}
                ]
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.plan_for("exam").section_names(),
            ["vocabulary", "reading", "wrapup"]
        );
        assert_eq!(config.plan_for("discussion").sections.len(), 6);

        let bad = r#"{"lessonPlans": {"exam": [
            {"name": "comprehension", "dependencies": ["reading"]},
            {"name": "reading"}
        ]}}"#;
        let config: Config = serde_json::from_str(bad).unwrap();
        assert!(config.validate().is_err());

        let unknown = r#"{"lessonPlans": {"exam": [{"name": "karaoke"}]}}"#;
        let config: Config = serde_json::from_str(unknown).unwrap();
        assert!(matches!(
            config.validate(),
            Err(LessonError::UnknownSection { .. })
        ));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config {
            provider: CompletionProvider::Codex,
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""provider":"codex""#));
        assert!(json.contains(r#""completionTimeout":60"#));
    }
}
