//! Small text utilities shared by the context builder, optimizer, and validators.

use once_cell::sync::Lazy;
use regex::Regex;

/// Common English function words ignored by keyword extraction.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "around", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each",
    "even", "every", "few", "for", "from", "further", "get", "gets", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however",
    "i", "if", "in", "into", "is", "it", "its", "itself", "just", "like", "made", "make", "many",
    "may", "me", "might", "more", "most", "much", "must", "my", "myself", "new", "no", "nor",
    "not", "now", "of", "off", "often", "on", "once", "one", "only", "or", "other", "our",
    "ours", "ourselves", "out", "over", "own", "same", "she", "should", "since", "so", "some",
    "still", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "us", "use", "used", "very", "was", "way", "ways", "we", "well", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "within", "without",
    "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Keyword stems mapped to the theme they indicate, in lookup priority order.
const THEME_KEYWORDS: &[(&[&str], &str)] = &[
    (&["technolog", "digital", "computer", "internet", "online", "smartphone", "software"], "technology"),
    (&["communicat", "conversation", "message", "social media", "language"], "communication"),
    (&["travel", "trip", "flight", "tourism", "holiday", "vacation", "journey"], "travel"),
    (&["business", "company", "market", "economy", "customer", "finance"], "business"),
    (&["work", "job", "career", "office", "employ"], "work and careers"),
    (&["health", "medical", "doctor", "exercise", "disease", "wellbeing"], "health and wellness"),
    (&["food", "cook", "restaurant", "meal", "recipe", "diet"], "food and cooking"),
    (&["environment", "climate", "pollution", "nature", "energy", "recycl"], "environment"),
    (&["school", "education", "student", "teacher", "learn", "university"], "education"),
    (&["sport", "football", "athlete", "team", "olympic"], "sports"),
    (&["music", "film", "movie", "artist", "painting", "culture", "museum"], "arts and culture"),
    (&["family", "friend", "relationship", "parent", "children"], "relationships"),
    (&["science", "research", "scientist", "experiment", "discovery"], "science"),
    (&["city", "urban", "housing", "transport", "traffic"], "city life"),
];

/// Themes used when nothing in the text matches the keyword table.
pub const DEFAULT_THEMES: [&str; 3] = ["general topic", "communication", "daily life"];

static WORD_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\p{L}[\p{L}\p{M}'-]*").ok());

static LIST_MARKER_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]+|\(?\d{1,2}[.):]|[A-Za-z][.)])\s+").ok());

/// Returns `true` if the lower-case word is a stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

/// Splits text into lower-cased words, stripping surrounding apostrophes and hyphens.
pub fn words(text: &str) -> Vec<String> {
    let Some(re) = WORD_RE.as_ref() else {
        return Vec::new();
    };

    re.find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_matches(|c| c == '\'' || c == '-')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Splits text into trimmed sentences, keeping terminal punctuation.
pub fn sentences(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let ends_sentence = match c {
            '.' | '!' | '?' => chars.peek().map_or(true, |next| next.is_whitespace()),
            // full-width terminators need no trailing space
            '。' | '！' | '？' => true,
            _ => false,
        };
        if ends_sentence {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                result.push(sentence);
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        result.push(tail.to_string());
    }
    result
}

/// Matches text against the keyword table and returns up to `limit` themes.
///
/// Single-word keywords match word prefixes ("communicat" matches
/// "communication"); multi-word keywords match anywhere in the text.
pub fn detect_themes(text: &str, limit: usize) -> Vec<String> {
    let lower = text.to_lowercase();
    let tokens = words(&lower);
    let mentions = |keyword: &str| {
        if keyword.contains(' ') {
            lower.contains(keyword)
        } else {
            tokens.iter().any(|w| w.starts_with(keyword))
        }
    };

    THEME_KEYWORDS
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|k| mentions(k)))
        .map(|(_, theme)| (*theme).to_string())
        .take(limit)
        .collect()
}

/// Parses a newline-delimited completion response into clean items.
///
/// Strips bullets and numbering, surrounding quotes, and blank lines.
pub fn parse_list(response: &str) -> Vec<String> {
    response
        .lines()
        .map(|line| {
            let stripped = LIST_MARKER_RE
                .as_ref()
                .map_or(std::borrow::Cow::Borrowed(line), |re| re.replace(line, ""));
            stripped
                .trim()
                .trim_matches(|c| c == '"' || c == '*')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Title-cases each whitespace-separated word.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
