//! Completion service doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lesson_generator::{CompletionError, CompletionService};

/// Answers each prompt with the response of the first rule whose needle the
/// prompt contains; prompts matching no rule fail.
pub struct Keyed {
    rules: Vec<(&'static str, &'static str)>,
    calls: AtomicUsize,
}

impl Keyed {
    pub fn new(rules: &[(&'static str, &'static str)]) -> Self {
        Self {
            rules: rules.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of prompts received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for Keyed {
    async fn prompt(&self, text: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rules
            .iter()
            .find(|(needle, _)| text.contains(needle))
            .map(|(_, response)| (*response).to_string())
            .ok_or_else(|| CompletionError::Failed("no canned response".to_string()))
    }
}

/// Rejects every prompt.
pub struct Unavailable;

#[async_trait]
impl CompletionService for Unavailable {
    async fn prompt(&self, _text: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable("service offline".to_string()))
    }
}

/// Answers every prompt with the same unparsable text.
pub struct Garbage;

#[async_trait]
impl CompletionService for Garbage {
    async fn prompt(&self, _text: &str) -> Result<String, CompletionError> {
        Ok("~~~ ??? ~~~".to_string())
    }
}

pub const TECH_SOURCE: &str = "Technology has revolutionized how we communicate. Smartphones \
    let people send messages instantly across the world. Social media platforms connect \
    friends and families, while video calls make remote work possible. Many people worry \
    that constant notifications reduce concentration. Still, digital communication is now \
    part of daily life for billions of people.";

/// Canned responses for the shared-context prompts.
pub const CONTEXT_RULES: [(&str, &str); 3] = [
    (
        "most useful vocabulary words",
        "technology\ncommunication\nsmartphone\nnotification\nconcentration\nplatform",
    ),
    ("main themes", "Technology\nCommunication\nRemote work"),
    (
        "Summarize this text",
        "Technology has changed how people communicate, bringing both connection and \
         distraction.",
    ),
];
