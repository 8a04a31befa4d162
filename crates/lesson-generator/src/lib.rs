//! Progressive Lesson Generator
//!
//! Turns a source text into a CEFR-levelled language lesson one section at a
//! time: a shared context is built once, every section is generated against a
//! completion service with validation and deterministic fallbacks, and
//! weighted progress is reported as sections complete.

pub mod api;
pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod fallback;
pub mod generator;
pub mod lesson;
pub mod level;
pub mod optimizer;
pub mod progress;
pub mod section;
pub mod text;
pub mod validators;

pub use api::{create_router, AppState, ErrorResponse, GenerateRequest, ValidateRequest};
pub use completion::{
    CliCompletion, CompletionError, CompletionErrorKind, CompletionProvider, CompletionService,
};
pub use config::Config;
pub use context::{build_shared_context, update_context, ContextSettings, SharedContext};
pub use error::{LessonError, Result};
pub use events::{EventBroadcaster, LessonEvent};
pub use generator::LessonGenerator;
pub use lesson::{GeneratedLesson, LessonPlan, LessonRequest};
pub use level::CefrLevel;
pub use optimizer::{
    batch_prompts, extract_key_terms, optimize_prompt, summarize_content, OptimizationStrategy,
    OptimizedPrompt,
};
pub use progress::{
    calculate_progress, PhaseWeights, ProgressCallback, ProgressTracker, ProgressUpdate,
};
pub use section::{
    GeneratedSection, GenerationStrategy, LessonSection, SectionContent, SectionKind,
    VocabularyEntry,
};
pub use validators::{IssueKind, ValidatableContent, ValidationIssue, ValidationResult};
