// wabot Engine — Similarity Matcher
//
// "Did you mean …" suggestions for unknown commands, scored by normalized
// Levenshtein distance (strsim).

use crate::atoms::constants::SIMILARITY_THRESHOLD;

/// Similarity in `0.0..=1.0`: `(len(longer) - distance) / len(longer)`,
/// compared case-insensitively. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    (longest - distance) as f64 / longest as f64
}

/// Up to `max` candidates resembling `input`, best first.
///
/// A candidate qualifies when one string contains the other, or when both
/// have at least two characters and score above the similarity threshold.
pub fn find_similar<'a, I>(input: &str, candidates: I, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let input = input.to_lowercase();
    let mut scored: Vec<(f64, &str)> = candidates
        .into_iter()
        .filter_map(|cand| {
            let lowered = cand.to_lowercase();
            let score = similarity(&lowered, &input);
            let contains = lowered.contains(input.as_str()) || input.contains(lowered.as_str());
            let min_len = lowered.chars().count().min(input.chars().count());
            if contains || (min_len >= 2 && score > SIMILARITY_THRESHOLD) {
                Some((score, cand))
            } else {
                None
            }
        })
        .collect();

    // Stable: equal scores keep candidate order.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(max).map(|(_, c)| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity("ping", "PING"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn one_edit_on_four_chars() {
        assert!((similarity("pong", "ping") - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_chars_not_bytes() {
        // "menú" vs "menu": one substitution over four characters.
        assert!((similarity("menú", "menu") - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn suggests_close_typo() {
        let names = ["help", "ping", "hora", "status"];
        let out = find_similar("pinf", names.iter().copied(), 3);
        assert_eq!(out.first().map(String::as_str), Some("ping"));
    }

    #[test]
    fn substring_always_qualifies() {
        let names = ["status"];
        assert_eq!(find_similar("stat", names.iter().copied(), 3), vec!["status"]);
    }

    #[test]
    fn unrelated_word_has_no_suggestions() {
        let names = ["help", "ping", "hora"];
        assert!(find_similar("xyzzy", names.iter().copied(), 3).is_empty());
    }

    #[test]
    fn single_char_input_needs_containment() {
        let names = ["ab", "zz"];
        assert_eq!(find_similar("a", names.iter().copied(), 3), vec!["ab"]);
    }

    #[test]
    fn respects_max() {
        let names = ["hola1", "hola2", "hola3", "hola4"];
        assert_eq!(find_similar("hola", names.iter().copied(), 2).len(), 2);
    }
}
