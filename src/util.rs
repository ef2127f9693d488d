//! Small shared helpers: edit-distance suggestions and key casing.

/// Maximum edit distance for a candidate to qualify as a suggestion.
const SUGGESTION_DISTANCE: usize = 2;

/// Levenshtein distance between two strings, computed over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub_cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + sub_cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Candidates within edit distance of `input`, closest first, ties broken
/// alphabetically.
pub fn suggestions<I, S>(input: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scored: Vec<(usize, String)> = candidates
        .into_iter()
        .filter_map(|c| {
            let d = edit_distance(input, c.as_ref());
            (d <= SUGGESTION_DISTANCE).then(|| (d, c.as_ref().to_string()))
        })
        .collect();
    scored.sort();
    scored.dedup();
    scored.into_iter().map(|(_, c)| c).collect()
}

/// Convert a data key to its kebab-cased flag spelling
/// (`log_level` -> `log-level`).
pub fn to_kebab_case(key: &str) -> String {
    key.replace('_', "-")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn distance_identical_is_zero() {
        assert_eq!(edit_distance("abc", "abc"), 0);
    }

    #[test]
    fn distance_insert_delete_substitute() {
        assert_eq!(edit_distance("abc", "abcd"), 1);
        assert_eq!(edit_distance("abcd", "abc"), 1);
        assert_eq!(edit_distance("abc", "abd"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn suggestions_sorted_by_distance() {
        let got = suggestions("Ara", ["Robb", "Sansa", "Arya"]);
        assert_eq!(got, vec!["Arya".to_string()]);
    }

    #[test]
    fn suggestions_exclude_distant_candidates() {
        let got = suggestions("--abcd", ["--abcde", "--zzzzzz"]);
        assert_eq!(got, vec!["--abcde".to_string()]);
    }

    #[test]
    fn kebab_case_replaces_underscores() {
        assert_eq!(to_kebab_case("log_level"), "log-level");
        assert_eq!(to_kebab_case("verbose"), "verbose");
    }
}
