//! End-to-end tests for the lesson pipeline through the public library API.

mod common;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use common::{Garbage, Keyed, Unavailable, CONTEXT_RULES, TECH_SOURCE};
use lesson_generator::generator::WARMUP_INSTRUCTION;
use lesson_generator::{
    build_shared_context, CefrLevel, GenerationStrategy, LessonGenerator, LessonPlan,
    LessonRequest, LessonSection, PhaseWeights, ProgressCallback, ProgressUpdate, SectionKind,
};

const WARMUP_RULE: (&str, &str) = (
    "warm-up discussion questions",
    "How do you usually contact your friends?\nWhich apps do you use every day?\nDo you prefer phone calls or messages?",
);

/// Records every progress update it sees.
fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Arc::new(move |update: &ProgressUpdate| {
        sink.lock().unwrap().push(update.clone());
    });
    (callback, seen)
}

// ============================================================================
// Shared context
// ============================================================================

#[tokio::test]
async fn test_shared_context_from_canned_responses() {
    let service = Keyed::new(&CONTEXT_RULES);

    let context =
        build_shared_context(&service, TECH_SOURCE, "discussion", CefrLevel::B1, "English").await;

    assert_eq!(
        context.key_vocabulary(),
        ["technology", "communication", "smartphone", "notification", "concentration", "platform"]
    );
    assert_eq!(context.difficulty_level(), CefrLevel::B1);
    assert_eq!(context.source_text(), TECH_SOURCE);
    assert_eq!(service.calls(), 3);
}

#[tokio::test]
async fn test_shared_context_truncates_long_source() {
    let source = "abcd".repeat(400);
    let context =
        build_shared_context(&Keyed::new(&CONTEXT_RULES), &source, "discussion", CefrLevel::B1, "English")
            .await;

    assert_eq!(context.source_text().chars().count(), 1000);
}

#[tokio::test]
async fn test_shared_context_survives_unavailable_service() {
    let context =
        build_shared_context(&Unavailable, TECH_SOURCE, "discussion", CefrLevel::A2, "English").await;

    assert!(!context.key_vocabulary().is_empty());
    assert!(!context.main_themes().is_empty());
    assert!(!context.content_summary().is_empty());
    assert_eq!(context.difficulty_level(), CefrLevel::A2);
}

// ============================================================================
// Section generation
// ============================================================================

#[tokio::test]
async fn test_warmup_section_from_completion() {
    let service = Arc::new(Keyed::new(&[CONTEXT_RULES[0], CONTEXT_RULES[1], CONTEXT_RULES[2], WARMUP_RULE]));
    let generator = LessonGenerator::new(service);
    let context = generator
        .build_shared_context(TECH_SOURCE, "discussion", CefrLevel::B1, "English")
        .await;

    let section = generator
        .generate_section(&LessonSection::new("warmup", 1), &context, &[])
        .await
        .unwrap();

    assert_eq!(
        section.content.as_lines().unwrap(),
        [
            WARMUP_INSTRUCTION,
            "How do you usually contact your friends?",
            "Which apps do you use every day?",
            "Do you prefer phone calls or messages?",
        ]
    );
    assert_eq!(section.generation_strategy, GenerationStrategy::Progressive);
}

#[tokio::test]
async fn test_unknown_section_is_rejected() {
    let generator = LessonGenerator::new(Arc::new(Unavailable));
    let context = generator
        .build_shared_context(TECH_SOURCE, "discussion", CefrLevel::B1, "English")
        .await;

    let err = generator
        .generate_section(&LessonSection::new("unknown", 1), &context, &[])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Unknown section: unknown"));
}

#[tokio::test]
async fn test_grammar_falls_back_on_unparsable_output() {
    let context =
        build_shared_context(&Unavailable, TECH_SOURCE, "grammar", CefrLevel::B1, "English").await;
    let generator = LessonGenerator::new(Arc::new(Garbage));

    let section = generator
        .generate_section(&LessonSection::new("grammar", 5), &context, &[])
        .await
        .unwrap();

    let grammar = section.content.as_grammar().unwrap();
    assert_eq!(grammar.focus, "Present Simple Tense");
    assert_eq!(grammar.examples.len(), 3);
    assert_eq!(grammar.exercise.len(), 3);
    assert_eq!(section.generation_strategy, GenerationStrategy::Fallback);
}

#[tokio::test]
async fn test_panicking_callback_does_not_fail_generation() {
    let callback: ProgressCallback = Arc::new(|_update: &ProgressUpdate| {
        panic!("progress sink exploded");
    });
    let generator = LessonGenerator::new(Arc::new(Unavailable)).with_progress_callback(callback);
    let context = generator
        .build_shared_context(TECH_SOURCE, "discussion", CefrLevel::B1, "English")
        .await;

    let section = generator
        .generate_section(&LessonSection::new("warmup", 1), &context, &[])
        .await;

    assert!(section.is_ok());
}

// ============================================================================
// Whole lessons
// ============================================================================

#[tokio::test]
async fn test_full_lesson_reports_monotonic_progress() {
    let service = Arc::new(Keyed::new(&[CONTEXT_RULES[0], CONTEXT_RULES[1], CONTEXT_RULES[2], WARMUP_RULE]));
    let (callback, seen) = recorder();
    let generator = LessonGenerator::new(service).with_progress_callback(callback);

    let request = LessonRequest::new(TECH_SOURCE, "discussion");
    let plan = LessonPlan::for_lesson_type("discussion");
    let lesson = generator.generate_lesson(&request, &plan).await.unwrap();

    let names: Vec<&str> = lesson.sections.iter().map(|s| s.section_name.as_str()).collect();
    assert_eq!(names, plan.section_names());
    assert_eq!(
        lesson.section("warmup").unwrap().generation_strategy,
        GenerationStrategy::Progressive
    );

    let updates = seen.lock().unwrap();
    let progress: Vec<u8> = updates.iter().map(|u| u.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert!(updates
        .iter()
        .any(|u| u.phase == "vocabulary" && u.section.is_some()));
}

#[tokio::test]
async fn test_concurrent_runs_keep_their_own_weights() {
    let (default_callback, default_seen) = recorder();
    let (heavy_callback, heavy_seen) = recorder();

    let default_run = LessonGenerator::new(Arc::new(Unavailable))
        .with_progress_callback(default_callback);
    let heavy_run = LessonGenerator::new(Arc::new(Unavailable))
        .with_weights(PhaseWeights::with_overrides(&BTreeMap::from([(
            SectionKind::Warmup,
            70,
        )])))
        .with_progress_callback(heavy_callback);

    let request = LessonRequest::new(TECH_SOURCE, "discussion");
    let plan = LessonPlan::for_lesson_type("discussion");
    let (a, b) = tokio::join!(
        default_run.generate_lesson(&request, &plan),
        heavy_run.generate_lesson(&request, &plan)
    );
    assert!(a.is_ok());
    assert!(b.is_ok());

    // Second update is the end of the warm-up.
    assert_eq!(default_seen.lock().unwrap()[1].progress, 14);
    assert_eq!(heavy_seen.lock().unwrap()[1].progress, 54);
    assert_eq!(default_seen.lock().unwrap().last().unwrap().progress, 100);
    assert_eq!(heavy_seen.lock().unwrap().last().unwrap().progress, 100);
}

#[tokio::test]
async fn test_every_lesson_type_completes_offline() {
    for lesson_type in ["discussion", "grammar", "pronunciation", "travel", "business", "storytelling"] {
        let generator = LessonGenerator::new(Arc::new(Unavailable));
        let request = LessonRequest::new(TECH_SOURCE, lesson_type).with_level(CefrLevel::C1);
        let plan = LessonPlan::for_lesson_type(lesson_type);

        let lesson = generator.generate_lesson(&request, &plan).await.unwrap();

        assert_eq!(lesson.sections.len(), plan.sections.len(), "{lesson_type}");
        assert!(lesson
            .sections
            .iter()
            .all(|s| s.generation_strategy == GenerationStrategy::Fallback));
    }
}
