//! Weighted progress tracking.
//!
//! Progress is proportional to the summed phase weights of the sections that
//! are finished, out of the sections that apply to the active lesson type.
//! Weights are an explicit value passed to the tracker, so concurrent runs
//! with different tables cannot interfere.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::section::SectionKind;

// ============================================================================
// Phase weights
// ============================================================================

/// Relative cost of each section, used only for progress arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseWeights(BTreeMap<SectionKind, u32>);

impl Default for PhaseWeights {
    fn default() -> Self {
        Self(
            [
                (SectionKind::Warmup, 10),
                (SectionKind::Vocabulary, 15),
                (SectionKind::Reading, 20),
                (SectionKind::Comprehension, 10),
                (SectionKind::Discussion, 10),
                (SectionKind::Dialogue, 15),
                (SectionKind::Grammar, 15),
                (SectionKind::Pronunciation, 15),
                (SectionKind::Wrapup, 5),
            ]
            .into_iter()
            .collect(),
        )
    }
}

impl PhaseWeights {
    /// Builds a table from explicit entries; sections not listed weigh zero.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (SectionKind, u32)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Returns the default table with the given entries replaced.
    #[must_use]
    pub fn with_overrides(overrides: &BTreeMap<SectionKind, u32>) -> Self {
        let mut weights = Self::default();
        for (kind, weight) in overrides {
            weights.0.insert(*kind, *weight);
        }
        weights
    }

    /// Weight of one section (zero if absent).
    #[must_use]
    pub fn weight(&self, kind: SectionKind) -> u32 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    /// Iterates the table entries.
    pub fn iter(&self) -> impl Iterator<Item = (SectionKind, u32)> + '_ {
        self.0.iter().map(|(k, w)| (*k, *w))
    }
}

/// Sections that count toward progress for a lesson type.
///
/// The base set plus at most one lesson-type-specific extra section.
/// Matching is case-insensitive; unrecognized types get the base set only.
pub fn applicable_sections(lesson_type: &str) -> Vec<SectionKind> {
    let mut sections = vec![
        SectionKind::Warmup,
        SectionKind::Vocabulary,
        SectionKind::Reading,
        SectionKind::Comprehension,
    ];
    if let Some(extra) = extra_section(lesson_type) {
        sections.push(extra);
    }
    sections.push(SectionKind::Wrapup);
    sections
}

/// The lesson-type-specific section, if any.
pub fn extra_section(lesson_type: &str) -> Option<SectionKind> {
    match lesson_type.trim().to_lowercase().as_str() {
        "discussion" => Some(SectionKind::Discussion),
        "grammar" => Some(SectionKind::Grammar),
        "pronunciation" => Some(SectionKind::Pronunciation),
        "travel" | "business" => Some(SectionKind::Dialogue),
        _ => None,
    }
}

// ============================================================================
// Progress tracker
// ============================================================================

/// Computes 0-100 progress from completed section names.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    weights: PhaseWeights,
}

impl ProgressTracker {
    /// Creates a tracker using the given weight table.
    #[must_use]
    pub const fn new(weights: PhaseWeights) -> Self {
        Self { weights }
    }

    /// Returns the weight table in use.
    #[must_use]
    pub const fn weights(&self) -> &PhaseWeights {
        &self.weights
    }

    /// Percentage of the lesson finished, in `0..=100`.
    ///
    /// Only distinct, applicable names count, and the section currently in
    /// flight contributes nothing. Unknown names are ignored. A table whose
    /// applicable weights sum to zero always yields 0.
    pub fn calculate<S: AsRef<str>>(
        &self,
        completed: &[S],
        current: Option<&str>,
        lesson_type: &str,
    ) -> u8 {
        let applicable = applicable_sections(lesson_type);
        let total: u64 = applicable
            .iter()
            .map(|kind| u64::from(self.weights.weight(*kind)))
            .sum();
        if total == 0 {
            return 0;
        }

        let current = current.and_then(|name| SectionKind::from_name(name).ok());
        let finished: BTreeSet<SectionKind> = completed
            .iter()
            .filter_map(|name| SectionKind::from_name(name.as_ref()).ok())
            .filter(|kind| applicable.contains(kind) && Some(*kind) != current)
            .collect();

        let done: u64 = finished
            .iter()
            .map(|kind| u64::from(self.weights.weight(*kind)))
            .sum();

        #[allow(clippy::cast_precision_loss)]
        let ratio = done as f64 / total as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;
        percent
    }
}

/// Percentage using the default weight table.
pub fn calculate_progress<S: AsRef<str>>(
    completed: &[S],
    current: Option<&str>,
    lesson_type: &str,
) -> u8 {
    ProgressTracker::default().calculate(completed, current, lesson_type)
}

// ============================================================================
// Progress updates and callbacks
// ============================================================================

/// One progress report delivered to the registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Human-readable description of the current step.
    pub step: String,
    /// Percentage complete, `0..=100`.
    pub progress: u8,
    /// Section name the update belongs to.
    pub phase: String,
    /// Optional sub-phase label, e.g. the vocabulary word being defined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// Caller-supplied progress callback.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Delivers an update to the callback, containing any panic it raises.
///
/// Callback failures never interrupt generation.
pub fn notify(callback: Option<&ProgressCallback>, update: &ProgressUpdate) {
    let Some(callback) = callback else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| callback(update))).is_err() {
        debug!(phase = %update.phase, "Progress callback panicked; ignoring");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_default_weights() {
        let w = PhaseWeights::default();
        assert_eq!(w.weight(SectionKind::Warmup), 10);
        assert_eq!(w.weight(SectionKind::Vocabulary), 15);
        assert_eq!(w.weight(SectionKind::Reading), 20);
        assert_eq!(w.weight(SectionKind::Comprehension), 10);
        assert_eq!(w.weight(SectionKind::Discussion), 10);
        assert_eq!(w.weight(SectionKind::Dialogue), 15);
        assert_eq!(w.weight(SectionKind::Grammar), 15);
        assert_eq!(w.weight(SectionKind::Pronunciation), 15);
        assert_eq!(w.weight(SectionKind::Wrapup), 5);
    }

    #[test]
    fn test_applicable_sections_per_lesson_type() {
        assert!(applicable_sections("Discussion").contains(&SectionKind::Discussion));
        assert!(applicable_sections("TRAVEL").contains(&SectionKind::Dialogue));
        assert!(applicable_sections("business").contains(&SectionKind::Dialogue));
        assert_eq!(applicable_sections("poetry").len(), 5);
        assert_eq!(applicable_sections("grammar").len(), 6);
    }

    #[test]
    fn test_empty_and_full() {
        let empty: [&str; 0] = [];
        assert_eq!(calculate_progress(&empty, None, "discussion"), 0);

        let all = [
            "warmup",
            "vocabulary",
            "reading",
            "comprehension",
            "discussion",
            "wrapup",
        ];
        assert_eq!(calculate_progress(&all, None, "discussion"), 100);
    }

    #[test]
    fn test_partial_progress_rounds() {
        // discussion total = 10+15+20+10+10+5 = 70; warmup+vocabulary = 25 -> 35.7 -> 36
        assert_eq!(
            calculate_progress(&["warmup", "vocabulary"], None, "discussion"),
            36
        );
    }

    #[test]
    fn test_current_section_contributes_nothing() {
        let completed = ["warmup", "vocabulary"];
        assert_eq!(
            calculate_progress(&completed, Some("vocabulary"), "discussion"),
            calculate_progress(&["warmup"], None, "discussion")
        );
    }

    #[test]
    fn test_inapplicable_and_unknown_names_ignored() {
        let base = calculate_progress(&["warmup"], None, "discussion");
        assert_eq!(
            calculate_progress(&["warmup", "grammar", "mystery"], None, "discussion"),
            base
        );
    }

    #[test]
    fn test_duplicates_count_once() {
        assert_eq!(
            calculate_progress(&["reading", "reading", "reading"], None, "grammar"),
            calculate_progress(&["reading"], None, "grammar")
        );
    }

    #[test]
    fn test_zero_weights_yield_zero() {
        let tracker = ProgressTracker::new(PhaseWeights::from_entries([]));
        assert_eq!(tracker.calculate(&["warmup", "wrapup"], None, "discussion"), 0);
    }

    #[test]
    fn test_overrides_replace_single_entries() {
        let overrides: BTreeMap<_, _> = [(SectionKind::Wrapup, 50)].into_iter().collect();
        let weights = PhaseWeights::with_overrides(&overrides);
        assert_eq!(weights.weight(SectionKind::Wrapup), 50);
        assert_eq!(weights.weight(SectionKind::Reading), 20);
    }

    #[test]
    fn test_weights_serialize_by_section_name() {
        let json = serde_json::to_string(&PhaseWeights::from_entries([(SectionKind::Reading, 7)]))
            .unwrap_or_default();
        assert_eq!(json, r#"{"reading":7}"#);
    }

    #[test]
    fn test_notify_contains_panics() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: ProgressCallback = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            #[allow(clippy::panic)]
            {
                panic!("listener exploded");
            }
        });
        let update = ProgressUpdate {
            step: "Generating".to_string(),
            progress: 10,
            phase: "warmup".to_string(),
            section: None,
        };

        notify(Some(&callback), &update);
        notify(Some(&callback), &update);
        notify(None, &update);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_update_omits_missing_section() {
        let update = ProgressUpdate {
            step: "Done".to_string(),
            progress: 100,
            phase: "wrapup".to_string(),
            section: None,
        };
        let json = serde_json::to_string(&update).unwrap_or_default();
        assert!(!json.contains("section"));
        assert!(json.contains(r#""progress":100"#));
    }
}
