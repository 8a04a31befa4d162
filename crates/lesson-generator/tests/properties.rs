use lesson_generator::optimizer::{batch_prompts, summarize_content};
use lesson_generator::progress::{applicable_sections, calculate_progress};
use lesson_generator::text::estimate_tokens;
use lesson_generator::SectionKind;
use proptest::prelude::*;

const LESSON_TYPES: [&str; 6] = [
    "discussion",
    "grammar",
    "pronunciation",
    "travel",
    "business",
    "storytelling",
];

fn section_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(SectionKind::ALL.map(SectionKind::name).to_vec())
}

fn lesson_type() -> impl Strategy<Value = &'static str> {
    prop::sample::select(LESSON_TYPES.to_vec())
}

proptest! {
    #[test]
    fn progress_never_decreases_as_sections_complete(
        names in prop::collection::vec(section_name(), 0..12),
        lesson_type in lesson_type(),
    ) {
        let mut previous = 0u8;
        for end in 0..=names.len() {
            let progress = calculate_progress(&names[..end], None, lesson_type);
            prop_assert!(progress >= previous, "{} < {} at prefix {}", progress, previous, end);
            prop_assert!(progress <= 100);
            previous = progress;
        }
    }

    #[test]
    fn order_and_duplicates_do_not_matter(
        names in prop::collection::vec(section_name(), 0..12),
        lesson_type in lesson_type(),
    ) {
        let forward = calculate_progress(&names, None, lesson_type);

        let mut reversed = names.clone();
        reversed.reverse();
        reversed.extend(names.iter().copied());

        prop_assert_eq!(forward, calculate_progress(&reversed, None, lesson_type));
    }

    #[test]
    fn inapplicable_sections_are_ignored(
        names in prop::collection::vec(section_name(), 0..12),
        lesson_type in lesson_type(),
    ) {
        let applicable = applicable_sections(lesson_type);
        let filtered: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| applicable.iter().any(|kind| kind.name() == *name))
            .collect();

        prop_assert_eq!(
            calculate_progress(&names, None, lesson_type),
            calculate_progress(&filtered, None, lesson_type)
        );
    }

    #[test]
    fn current_section_contributes_nothing(
        names in prop::collection::vec(section_name(), 0..12),
        current in section_name(),
        lesson_type in lesson_type(),
    ) {
        let without: Vec<&str> = names.iter().copied().filter(|n| *n != current).collect();
        prop_assert_eq!(
            calculate_progress(&names, Some(current), lesson_type),
            calculate_progress(&without, None, lesson_type)
        );
    }

    #[test]
    fn all_applicable_sections_reach_one_hundred(lesson_type in lesson_type()) {
        let names: Vec<&str> = applicable_sections(lesson_type)
            .into_iter()
            .map(SectionKind::name)
            .collect();
        let none: [&str; 0] = [];

        prop_assert_eq!(calculate_progress(&none, None, lesson_type), 0);
        prop_assert_eq!(calculate_progress(&names, None, lesson_type), 100);
    }

    #[test]
    fn summaries_fit_the_limit(text in "[a-z]{1,12}( [a-z]{1,12}[.]?){0,60}", max in 10usize..200) {
        let summary = summarize_content(&text, max);
        prop_assert!(summary.chars().count() <= max);
    }

    #[test]
    fn batching_preserves_order_and_respects_limit(
        prompts in prop::collection::vec("[a-z ]{0,80}", 0..20),
        max_tokens in 1usize..60,
    ) {
        let batches = batch_prompts(&prompts, max_tokens);

        let flattened: Vec<String> = batches.iter().flatten().cloned().collect();
        prop_assert_eq!(&flattened, &prompts);

        for batch in &batches {
            prop_assert!(!batch.is_empty());
            let tokens: usize = batch.iter().map(|p| estimate_tokens(p)).sum();
            prop_assert!(batch.len() == 1 || tokens <= max_tokens);
        }
    }
}
