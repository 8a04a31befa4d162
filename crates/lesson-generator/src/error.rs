//! Error types for the lesson generator.
//!
//! Recoverable problems (completion failures, unparsable responses, rejected
//! content) never reach this type: they are absorbed by fallbacks inside the
//! pipeline. What remains here are configuration mistakes and the rare case
//! where a section cannot be produced at all.

use std::path::PathBuf;

/// A specialized `Result` type for lesson generation operations.
pub type Result<T> = std::result::Result<T, LessonError>;

/// Errors that can surface from lesson generation.
#[derive(Debug, thiserror::Error)]
pub enum LessonError {
    // ========================================================================
    // Section Errors
    // ========================================================================
    /// A section name that does not map to any known section kind.
    #[error("Unknown section: {name}")]
    UnknownSection {
        /// The unrecognized section name.
        name: String,
    },

    /// Every generation strategy for a section, including its fallback, failed.
    #[error("Failed to generate {section} section: {reason}")]
    GenerationFailed {
        /// Name of the section that could not be produced.
        section: String,
        /// Why the fallback path could not produce content.
        reason: String,
    },

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// A CEFR level string that is not one of A1..C2.
    #[error("Invalid CEFR level '{value}'\n\nSuggestion: Use one of A1, A2, B1, B2, C1, C2")]
    InvalidLevel {
        /// The rejected level string.
        value: String,
    },

    /// The source text was empty or whitespace only.
    #[error("Source text is empty\n\nSuggestion: Provide the article or passage the lesson should be built from")]
    EmptySource,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your lesson.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LessonError {
    /// Creates a new `UnknownSection` error.
    #[must_use]
    pub fn unknown_section(name: impl Into<String>) -> Self {
        Self::UnknownSection { name: name.into() }
    }

    /// Creates a new `GenerationFailed` error.
    #[must_use]
    pub fn generation_failed(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GenerationFailed {
            section: section.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidLevel` error.
    #[must_use]
    pub fn invalid_level(value: impl Into<String>) -> Self {
        Self::InvalidLevel {
            value: value.into(),
        }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Returns `true` for mistakes in configuration or caller input, as
    /// opposed to failures that happened while generating content.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSection { .. }
                | Self::InvalidLevel { .. }
                | Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_section_message() {
        let err = LessonError::unknown_section("unknown");
        assert_eq!(err.to_string(), "Unknown section: unknown");
    }

    #[test]
    fn test_generation_failed_names_section() {
        let err = LessonError::generation_failed("vocabulary", "no key vocabulary available");
        let msg = err.to_string();
        assert!(msg.contains("Failed to generate vocabulary section"));
        assert!(msg.contains("no key vocabulary available"));
    }

    #[test]
    fn test_invalid_level_has_suggestion() {
        let msg = LessonError::invalid_level("Z9").to_string();
        assert!(msg.contains("Z9"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_is_configuration_error() {
        assert!(LessonError::unknown_section("x").is_configuration_error());
        assert!(LessonError::config_validation("bad", "fix it").is_configuration_error());
        assert!(LessonError::invalid_level("Q").is_configuration_error());
        assert!(!LessonError::generation_failed("grammar", "boom").is_configuration_error());
        assert!(!LessonError::EmptySource.is_configuration_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LessonError = io_err.into();
        assert!(matches!(err, LessonError::Io(_)));
    }
}
