//! Readability metrics over the merged summary.
//!
//! Three grade-level estimates are computed from surface features of the text:
//!
//! - Flesch–Kincaid grade: `0.39 · words/sentences + 11.8 · syllables/words − 15.59`
//! - Gunning Fog: `0.4 · (words/sentences + 100 · complex/words)` where complex words have three
//!   or more syllables
//! - Coleman–Liau: `0.0588 · L − 0.296 · S − 15.8` with `L` letters and `S` sentences per 100
//!   words
//!
//! Syllables are estimated from vowel groups. Scores are rounded to two decimals so identical
//! text always yields identical output.

use crate::pipeline::chunking::split_sentences;
use crate::pipeline::types::ReadabilityScores;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct TextStats {
    words: usize,
    sentences: usize,
    syllables: usize,
    complex_words: usize,
    letters: usize,
}

fn text_stats(text: &str) -> TextStats {
    let mut stats = TextStats {
        sentences: split_sentences(text).len().max(1),
        ..TextStats::default()
    };

    for token in text.split_whitespace() {
        let word: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
        if word.is_empty() {
            continue;
        }
        let syllables = count_syllables(&word);
        stats.words += 1;
        stats.syllables += syllables;
        stats.letters += word.chars().filter(|c| c.is_alphabetic()).count();
        if syllables >= 3 {
            stats.complex_words += 1;
        }
    }
    stats
}

/// Estimate the syllable count of a single word.
pub fn count_syllables(word: &str) -> usize {
    let lower: Vec<char> = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();
    if lower.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut previous_vowel = false;
    for &c in &lower {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }

    let len = lower.len();
    let silent_e = len > 2 && lower[len - 1] == 'e' && lower[len - 2] != 'l';
    if silent_e && count > 1 {
        count -= 1;
    }
    count.max(1)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute all three readability scores for `text`.
///
/// Text without words scores `0.0` across the board.
pub fn score(text: &str) -> ReadabilityScores {
    let stats = text_stats(text);
    if stats.words == 0 {
        return ReadabilityScores {
            flesch_kincaid_grade: 0.0,
            gunning_fog: 0.0,
            coleman_liau: 0.0,
        };
    }

    let words = stats.words as f64;
    let sentences = stats.sentences as f64;
    let words_per_sentence = words / sentences;
    let syllables_per_word = stats.syllables as f64 / words;

    let flesch_kincaid_grade = 0.39 * words_per_sentence + 11.8 * syllables_per_word - 15.59;
    let gunning_fog = 0.4 * (words_per_sentence + 100.0 * stats.complex_words as f64 / words);
    let letters_per_100 = stats.letters as f64 / words * 100.0;
    let sentences_per_100 = sentences / words * 100.0;
    let coleman_liau = 0.0588 * letters_per_100 - 0.296 * sentences_per_100 - 15.8;

    ReadabilityScores {
        flesch_kincaid_grade: round2(flesch_kincaid_grade),
        gunning_fog: round2(gunning_fog),
        coleman_liau: round2(coleman_liau),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 0.011
    }

    #[test]
    fn syllable_heuristic_handles_common_shapes() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("readability"), 5);
        assert_eq!(count_syllables("the"), 1);
        assert_eq!(count_syllables("42"), 0);
    }

    #[test]
    fn simple_sentence_scores_match_formulas() {
        let scores = score("The cat sat on the mat.");
        assert!(close(scores.flesch_kincaid_grade, -1.45), "{scores:?}");
        assert!(close(scores.gunning_fog, 2.4), "{scores:?}");
        assert!(close(scores.coleman_liau, -4.07), "{scores:?}");
    }

    #[test]
    fn identical_text_yields_identical_scores() {
        let text = "Summaries condense information. Readers appreciate brevity!";
        assert_eq!(score(text), score(text));
    }

    #[test]
    fn complex_text_scores_higher_than_simple_text() {
        let simple = score("The dog ran. The dog sat. The dog ate.");
        let complex = score(
            "Institutional considerations necessitate comprehensive evaluation of organizational capabilities.",
        );
        assert!(complex.flesch_kincaid_grade > simple.flesch_kincaid_grade);
        assert!(complex.gunning_fog > simple.gunning_fog);
        assert!(complex.coleman_liau > simple.coleman_liau);
    }

    #[test]
    fn empty_text_scores_zero() {
        let scores = score("   ");
        assert_eq!(scores.flesch_kincaid_grade, 0.0);
        assert_eq!(scores.gunning_fog, 0.0);
        assert_eq!(scores.coleman_liau, 0.0);
    }
}
