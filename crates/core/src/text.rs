//! Keyword text helpers: topic similarity, priority scoring and the
//! English filter applied to discovered keywords.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Word similarity in `[0, 1]`: one minus the Levenshtein distance of the
/// lowercased inputs over the longer length.
pub fn word_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(&a, &b) as f64 / longest as f64
}

/// Priority of a keyword whose classified topic is `topic`, scored against
/// the channels' interest topics.
///
/// | best similarity | priority |
/// |-----------------|----------|
/// | `>= 1.0`        | 1.0      |
/// | `>= 0.7`        | 0.7      |
/// | `>= 0.4`        | 0.5      |
/// | otherwise       | 0.0      |
///
/// The best-matching interest topic is returned alongside unless the
/// priority is zero.
pub fn calculate_priority(topic: &str, interest_topics: &[String]) -> (f64, Option<String>) {
    let best = interest_topics
        .iter()
        .map(|candidate| (word_similarity(topic, candidate), candidate))
        .fold(None::<(f64, &String)>, |best, current| match best {
            Some(b) if b.0 >= current.0 => Some(b),
            _ => Some(current),
        });

    let Some((similarity, matched)) = best else {
        return (0.0, None);
    };

    let priority = if similarity >= 1.0 {
        1.0
    } else if similarity >= 0.7 {
        0.7
    } else if similarity >= 0.4 {
        0.5
    } else {
        return (0.0, None);
    };

    (priority, Some(matched.clone()))
}

static ENGLISH_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\x20-\x7E\t\r\n]+$").unwrap());

/// Whether `text` is plain ASCII English: printable ASCII and whitespace
/// only, with at least one letter or digit.
pub fn is_english_text(text: &str) -> bool {
    ENGLISH_TEXT.is_match(text) && text.chars().any(|c| c.is_ascii_alphanumeric())
}
