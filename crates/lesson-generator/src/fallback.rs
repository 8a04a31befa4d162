//! Deterministic section content built from the shared context alone.
//!
//! Used whenever a completion call fails or its output is rejected.

use crate::context::SharedContext;
use crate::level::CefrLevel;
use crate::section::{GrammarContent, PronunciationContent};
use crate::text::{sentences, truncate_chars, words};

/// Longest source sentence reused as a vocabulary example.
const MAX_SOURCE_EXAMPLE_CHARS: usize = 160;

fn vocab<'a>(context: &'a SharedContext, index: usize, default: &'a str) -> &'a str {
    context
        .key_vocabulary()
        .get(index)
        .map_or(default, String::as_str)
}

/// Free-standing questions about the themes.
#[must_use]
pub fn warmup_questions(context: &SharedContext) -> Vec<String> {
    vec![
        format!("What do you already know about {}?", context.theme(0)),
        format!("How does {} affect your daily life?", context.theme(1)),
        format!(
            "What is your personal experience with {}?",
            context.theme(2)
        ),
    ]
}

/// A generic meaning for a key term.
#[must_use]
pub fn vocabulary_meaning(word: &str, context: &SharedContext) -> String {
    format!(
        "\"{word}\" is a key word in this lesson about {}.",
        context.theme(0)
    )
}

/// Tops `examples` up to `required` distinct sentences using `word`.
///
/// The first candidate is a sentence from the source text containing the
/// word; the rest are templates.
pub fn pad_examples(
    word: &str,
    required: usize,
    context: &SharedContext,
    examples: &mut Vec<String>,
) {
    let from_source = sentences(context.source_text()).into_iter().find(|sentence| {
        words(sentence).iter().any(|w| w == &word.to_lowercase())
            && sentence.chars().count() <= MAX_SOURCE_EXAMPLE_CHARS
    });

    let templates = [
        format!("I want to learn more about {word}."),
        format!("Can you explain what \"{word}\" means?"),
        format!("We talked about {word} in class today."),
        format!("The word \"{word}\" is connected to {}.", context.theme(0)),
        format!("Try to use \"{word}\" when you talk about {}.", context.theme(1)),
    ];

    for candidate in from_source.into_iter().chain(templates) {
        if examples.len() >= required {
            break;
        }
        if !examples.contains(&candidate) {
            examples.push(candidate);
        }
    }
}

/// A passage assembled from the summary and key vocabulary.
///
/// Returns `None` when there is no summary to build from.
#[must_use]
pub fn reading_passage(context: &SharedContext) -> Option<String> {
    let summary = context.content_summary().trim();
    if summary.is_empty() {
        return None;
    }

    let terms = context.key_vocabulary();
    let passage = match terms {
        [] => summary.to_string(),
        [only] => format!("{summary} An important word in this passage is \"{only}\"."),
        [init @ .., last] => format!(
            "{summary} Important words in this passage include {} and {last}.",
            init.join(", ")
        ),
    };
    Some(passage)
}

/// Template comprehension questions.
#[must_use]
pub fn comprehension_questions(context: &SharedContext) -> Vec<String> {
    vec![
        "What is the main idea of the passage?".to_string(),
        "Which details support the main idea?".to_string(),
        format!("What does the passage say about {}?", context.theme(0)),
        format!(
            "How is the word \"{}\" used in the passage?",
            vocab(context, 0, "key")
        ),
        "Do you agree with the ideas in the passage? Why or why not?".to_string(),
    ]
}

/// Five template discussion questions, experiential for beginners and
/// analytical otherwise.
#[must_use]
pub fn discussion_questions(context: &SharedContext) -> Vec<String> {
    let (t0, t1, t2) = (context.theme(0), context.theme(1), context.theme(2));
    if context.difficulty_level().is_beginner() {
        vec![
            format!("Do you like {t0}? Why or why not?"),
            format!("How often do you think about {t1}?"),
            format!("What is your favourite thing about {t2}?"),
            format!("Who do you talk to about {t0}?"),
            format!("What would you like to learn about {t1}?"),
        ]
    } else {
        vec![
            format!("How has {t0} changed in recent years?"),
            format!("What are the advantages and disadvantages of {t1}?"),
            format!("Why do you think people disagree about {t2}?"),
            format!("How might {t0} look different in ten years?"),
            format!("Should governments play a role in {t1}? Why?"),
        ]
    }
}

/// A twelve-line dialogue that recycles three key terms.
#[must_use]
pub fn dialogue_lines(context: &SharedContext) -> Vec<String> {
    let (t0, t1) = (context.theme(0), context.theme(1));
    let v0 = vocab(context, 0, t0);
    let v1 = vocab(context, 1, t1);
    let v2 = vocab(context, 2, v0);
    vec![
        format!("A: Hi! Have you heard much about {t0} lately?"),
        "B: A little. I was reading about it yesterday.".to_string(),
        "A: What did you think?".to_string(),
        format!("B: It made me think about the word \"{v0}\"."),
        format!("A: Interesting. How would you use \"{v0}\" in a sentence?"),
        format!("B: Maybe when I talk about {t0} with friends."),
        format!("A: I also learned the word \"{v1}\" this week."),
        "B: Really? What does it mean to you?".to_string(),
        format!("A: It reminds me of {t1}."),
        format!("B: That's a good connection. Let's practise \"{v2}\" too."),
        "A: Good idea. Let's use all these words in our next conversation.".to_string(),
        "B: Agreed. See you next time!".to_string(),
    ]
}

/// Canned grammar focus appropriate to the level.
#[must_use]
pub fn grammar_focus(level: CefrLevel) -> GrammarContent {
    let (focus, examples, exercise): (&str, [&str; 3], [&str; 3]) = match level {
        CefrLevel::A1 | CefrLevel::A2 | CefrLevel::B1 => (
            "Present Simple Tense",
            [
                "She works in an office.",
                "They live near the city centre.",
                "He doesn't eat meat.",
            ],
            [
                "Complete: My brother ___ (play) football every weekend.",
                "Make a question: you / like / coffee?",
                "Correct the mistake: She go to school by bus.",
            ],
        ),
        CefrLevel::B2 => (
            "Present Perfect Continuous",
            [
                "I have been studying English for three years.",
                "She has been working on this project since March.",
                "They have been waiting for the bus for twenty minutes.",
            ],
            [
                "Complete: We ___ (live) here since 2015.",
                "Rewrite: I started reading this book two hours ago and I am still reading it.",
                "Ask a partner how long they have been doing their favourite hobby.",
            ],
        ),
        CefrLevel::C1 | CefrLevel::C2 => (
            "Mixed Conditionals",
            [
                "If I had taken that job, I would be living in London now.",
                "If she were more organised, she wouldn't have missed the deadline.",
                "If we had invested earlier, we would be much better off today.",
            ],
            [
                "Complete: If I ___ (study) medicine, I would be a doctor now.",
                "Combine: He didn't save money. He can't buy a house now.",
                "Write a mixed conditional sentence about a decision you regret.",
            ],
        ),
    };

    GrammarContent {
        focus: focus.to_string(),
        examples: examples.iter().map(|s| (*s).to_string()).collect(),
        exercise: exercise.iter().map(|s| (*s).to_string()).collect(),
    }
}

/// Canned pronunciation drill with a stock transcription and stress tip.
#[must_use]
pub fn pronunciation_drill() -> PronunciationContent {
    PronunciationContent {
        word: "communication".to_string(),
        ipa: "/kəˌmjuːnɪˈkeɪʃən/".to_string(),
        practice: "Say it slowly in five syllables: com-mu-ni-CA-tion. The main stress falls \
                   on the fourth syllable, CA. Then say it at normal speed: Good communication \
                   makes teamwork easier."
            .to_string(),
    }
}

/// Template reflection questions.
#[must_use]
pub fn wrapup_questions(context: &SharedContext) -> Vec<String> {
    vec![
        "What is the most useful thing you learned in this lesson?".to_string(),
        format!(
            "How will you use the word \"{}\" this week?",
            vocab(context, 0, "communication")
        ),
        format!(
            "Has your opinion about {} changed after this lesson? How?",
            truncate_chars(context.theme(0), 60)
        ),
    ]
}
