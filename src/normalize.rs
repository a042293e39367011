use std::collections::HashSet;

/// Dedup key for evidence strings: trimmed, lower-cased, whitespace collapsed.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Keeps the first occurrence of each normalized key, in order, dropping blank
/// entries. `cap` applies after deduplication.
pub fn dedup<S: AsRef<str>>(items: &[S], cap: Option<usize>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for item in items {
        let trimmed = item.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(normalize(trimmed)) {
            out.push(trimmed.to_string());
        }
    }

    if let Some(cap) = cap {
        out.truncate(cap);
    }
    out
}

/// Integer formed by every digit in the label, 0 when there are none.
pub fn homework_number(label: &str) -> u64 {
    label
        .chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0u64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(u64::from(digit))
        })
}

/// Stable ascending sort by `homework_number`.
pub fn sort_homeworks(labels: &mut [String]) {
    labels.sort_by_key(|label| homework_number(label));
}
