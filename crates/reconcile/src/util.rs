/// Levenshtein edit distance over bytes, single working row.
pub fn edit_distance(s1: &str, s2: &str) -> usize {
    let a = s1.as_bytes();
    let b = s2.as_bytes();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, &ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            let next = (diag + cost).min(row[j] + 1).min(row[j + 1] + 1);
            diag = row[j + 1];
            row[j + 1] = next;
        }
    }

    row[b.len()]
}

/// Similarity between two account display names in [0.0, 1.0], computed over
/// lowercased alphanumeric words so punctuation and casing differences don't
/// penalize the score.
pub fn name_similarity(s1: &str, s2: &str) -> f32 {
    let a = normalize(s1);
    let b = normalize(s2);

    if a == b {
        return 1.0;
    }

    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }

    1.0 - (edit_distance(&a, &b) as f32 / max_len as f32)
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_zero_distance() {
        assert_eq!(edit_distance("checking", "checking"), 0);
        assert_eq!(edit_distance("", ""), 0);
    }

    #[test]
    fn empty_string_costs_length_of_other() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
    }

    #[test]
    fn single_edits() {
        assert_eq!(edit_distance("cat", "bat"), 1);
        assert_eq!(edit_distance("abc", "abcd"), 1);
        assert_eq!(edit_distance("abcd", "abc"), 1);
    }

    #[test]
    fn distance_is_commutative() {
        assert_eq!(
            edit_distance("everyday", "evryday"),
            edit_distance("evryday", "everyday")
        );
    }

    #[test]
    fn similarity_ignores_case_and_punctuation() {
        assert_eq!(name_similarity("Rainy-Day Fund", "rainy day fund"), 1.0);
    }

    #[test]
    fn similarity_distinguishes_unrelated_names() {
        assert!(name_similarity("Checking", "Mortgage") < 0.5);
    }
}
