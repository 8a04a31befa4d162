//! The text-completion capability and its command-line backed implementation.
//!
//! The pipeline only ever sees [`CompletionService::prompt`]: one prompt in,
//! one string out, or a failure. Any failure is treated the same way by the
//! generator (use the fallback), so the error kinds here exist for logging.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

/// Failure of a single completion call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    /// The backing tool or service could not be reached.
    #[error("completion service unavailable: {0}")]
    Unavailable(String),

    /// The service ran but reported an error.
    #[error("completion failed: {0}")]
    Failed(String),

    /// The call did not finish in time.
    #[error("completion timed out after {0}s")]
    Timeout(u64),

    /// The service returned nothing usable.
    #[error("completion returned an empty response")]
    EmptyResponse,
}

impl CompletionError {
    /// Returns the coarse category of this failure.
    #[must_use]
    pub const fn kind(&self) -> CompletionErrorKind {
        match self {
            Self::Unavailable(_) => CompletionErrorKind::Unavailable,
            Self::Failed(_) => CompletionErrorKind::Failed,
            Self::Timeout(_) => CompletionErrorKind::Timeout,
            Self::EmptyResponse => CompletionErrorKind::EmptyResponse,
        }
    }
}

/// Categories of completion failures for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Tool missing or service unreachable.
    Unavailable,
    /// Non-success result.
    Failed,
    /// Deadline exceeded.
    Timeout,
    /// Blank output.
    EmptyResponse,
}

impl std::fmt::Display for CompletionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::Failed => write!(f, "failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::EmptyResponse => write!(f, "empty_response"),
        }
    }
}

/// An asynchronous `prompt(text) -> string` capability.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Sends one prompt and returns the raw completion text.
    async fn prompt(&self, text: &str) -> Result<String, CompletionError>;
}

// ============================================================================
// Command-line provider
// ============================================================================

/// Supported command-line LLM tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionProvider {
    /// Anthropic Claude CLI (default).
    #[default]
    Claude,
    /// `OpenAI` `Codex` CLI.
    Codex,
    /// Google Gemini CLI.
    Gemini,
}

impl CompletionProvider {
    /// Parses a string into a `CompletionProvider`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "claude" => Some(Self::Claude),
            "codex" => Some(Self::Codex),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Name of the executable.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
        }
    }

    /// Arguments placed before the prompt text.
    #[must_use]
    pub const fn prompt_args(self) -> &'static [&'static str] {
        match self {
            Self::Claude | Self::Gemini => &["-p"],
            Self::Codex => &["exec"],
        }
    }
}

impl<'de> Deserialize<'de> for CompletionProvider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid completion provider '{s}': expected one of 'claude', 'codex', 'gemini'"
            ))
        })
    }
}

impl Serialize for CompletionProvider {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.program())
    }
}

/// Completion service that shells out to a provider's CLI per prompt.
#[derive(Debug, Clone)]
pub struct CliCompletion {
    provider: CompletionProvider,
    timeout: Duration,
}

impl CliCompletion {
    /// Creates a CLI-backed completion service.
    #[must_use]
    pub const fn new(provider: CompletionProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Returns the configured provider.
    #[must_use]
    pub const fn provider(&self) -> CompletionProvider {
        self.provider
    }
}

#[async_trait]
impl CompletionService for CliCompletion {
    async fn prompt(&self, text: &str) -> Result<String, CompletionError> {
        let started = Instant::now();
        let program = self.provider.program();

        let mut command = Command::new(program);
        command
            .args(self.provider.prompt_args())
            .arg(text)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CompletionError::Unavailable(format!(
                    "'{program}' is not installed or not on PATH"
                )));
            }
            Ok(Err(e)) => return Err(CompletionError::Unavailable(e.to_string())),
            Err(_) => return Err(CompletionError::Timeout(self.timeout.as_secs())),
        };

        debug!(
            provider = program,
            prompt_len = text.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            status = ?output.status.code(),
            "Completion call finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(provider = program, stderr = %stderr.trim(), "Completion CLI exited with failure");
            return Err(CompletionError::Failed(format!(
                "'{program}' exited with {}",
                output.status
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if response.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(response)
    }
}
