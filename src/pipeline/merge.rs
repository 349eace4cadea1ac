//! Merging chunk summaries into the final document.
//!
//! Summaries are joined in chunk order with single spaces. The joined text is restricted to the
//! Latin-1 repertoire (characters above U+00FF are dropped, which loses data on purpose: the
//! persisted summary is written as single-byte text) and then run through the contraction table.

use super::types::ChunkSummary;

/// Literal substring rewrites restoring apostrophes the model tends to drop.
///
/// Rules apply in order, unconditionally, and without word-boundary checks. Forms that are not
/// listed (for example `its`) are left untouched.
pub const CONTRACTION_RULES: &[(&str, &str)] = &[
    ("Gods", "God's"),
    ("yours", "your's"),
    ("dont", "don't"),
    ("doesnt", "doesn't"),
    ("isnt", "isn't"),
    ("havent", "haven't"),
    ("hasnt", "hasn't"),
    ("wouldnt", "wouldn't"),
    ("theyre", "they're"),
    ("youve", "you've"),
    ("arent", "aren't"),
    ("youre", "you're"),
    ("cant", "can't"),
    ("whore", "who're"),
    ("whos", "who's"),
    ("whatre", "what're"),
    ("whats", "what's"),
    ("hadnt", "hadn't"),
    ("didnt", "didn't"),
    ("couldnt", "couldn't"),
    ("theyll", "they'll"),
    ("youd", "you'd"),
];

/// Join summaries in order with a single space.
pub fn join_summaries(summaries: &[ChunkSummary]) -> String {
    summaries
        .iter()
        .map(|summary| summary.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Apply [`CONTRACTION_RULES`] to `text`.
pub fn restore_contractions(text: &str) -> String {
    apply_rules(text, CONTRACTION_RULES)
}

/// Apply an ordered table of literal replacements.
pub fn apply_rules(text: &str, rules: &[(&str, &str)]) -> String {
    rules
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Drop every character that has no single-byte Latin-1 encoding.
pub fn restrict_to_latin1(text: &str) -> String {
    text.chars().filter(|ch| u32::from(*ch) <= 0xFF).collect()
}

/// Full post-processing: join, Latin-1 restriction, contraction restoration.
pub fn merge_summaries(summaries: &[ChunkSummary]) -> String {
    let joined = join_summaries(summaries);
    restore_contractions(&restrict_to_latin1(&joined))
}
