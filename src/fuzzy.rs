//! Token-set similarity used to match free-text items against dictionaries.

use std::collections::BTreeSet;

fn tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Insertions plus deletions needed to turn `a` into `b`, counted in characters.
pub fn indel_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    a.len() + b.len() - 2 * lcs_len(&a, &b)
}

fn similarity(distance: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    1.0 - distance as f64 / total as f64
}

fn join(set: &BTreeSet<&String>) -> String {
    set.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
}

/// Token-set ratio in `[0, 1]`.
///
/// Word order and repeated words are ignored, and one side being a token subset of
/// the other scores 1.0.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let sect: BTreeSet<&String> = ta.intersection(&tb).collect();
    let diff_ab: BTreeSet<&String> = ta.difference(&tb).collect();
    let diff_ba: BTreeSet<&String> = tb.difference(&ta).collect();

    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 1.0;
    }

    let diff_ab = join(&diff_ab);
    let diff_ba = join(&diff_ba);
    let sect_len = join(&sect).chars().count();
    let ab_len = diff_ab.chars().count();
    let ba_len = diff_ba.chars().count();

    let separator = usize::from(sect_len != 0);
    let sect_ab_len = sect_len + separator + ab_len;
    let sect_ba_len = sect_len + separator + ba_len;

    let diffs = similarity(indel_distance(&diff_ab, &diff_ba), sect_ab_len + sect_ba_len);
    if sect_len == 0 {
        return diffs;
    }

    let sect_ab = similarity(separator + ab_len, sect_len + sect_ab_len);
    let sect_ba = similarity(separator + ba_len, sect_len + sect_ba_len);
    diffs.max(sect_ab).max(sect_ba)
}

/// Best-scoring term at or above `threshold`. Ties go to the earlier term.
pub fn best_match<'a, I>(item: &str, terms: I, threshold: f64) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut best: Option<(&'a str, f64)> = None;
    for term in terms {
        let score = token_set_ratio(item, term);
        if score >= threshold && best.map_or(true, |(_, b)| score > b) {
            best = Some((term.as_str(), score));
        }
    }
    best
}

/// Case-insensitive literal containment of any term in `item`.
pub fn contains_any<'a, I>(item: &str, terms: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    let item = item.to_lowercase();
    terms
        .into_iter()
        .find(|term| {
            let term = term.trim().to_lowercase();
            !term.is_empty() && item.contains(&term)
        })
        .map(String::as_str)
}
