use indexmap::IndexMap;

use crate::documents::AdvancedAnalytics;
use crate::models::{Cell, ComparisonResult};
use crate::normalize::normalize;

pub const COMPARE_DISPLAY_LIMIT: usize = 8;

#[derive(Debug, Clone)]
pub struct CellComparison<'a> {
    pub homework: String,
    pub model_a: String,
    pub model_b: String,
    pub cell_a: &'a Cell,
    pub cell_b: &'a Cell,
    pub strengths: ComparisonResult,
    pub weaknesses: ComparisonResult,
}

/// Partitions two evidence lists into A-only, B-only and shared items.
pub fn compare<S: AsRef<str>>(list_a: &[S], list_b: &[S]) -> ComparisonResult {
    let keyed_a = first_occurrences(list_a);
    let keyed_b = first_occurrences(list_b);

    let mut result = ComparisonResult::default();
    for (key, original) in &keyed_a {
        if keyed_b.contains_key(key) {
            result.both.push(original.to_string());
        } else {
            result.only_a.push(original.to_string());
        }
    }
    for (key, original) in &keyed_b {
        if !keyed_a.contains_key(key) {
            result.only_b.push(original.to_string());
        }
    }
    result
}

fn first_occurrences<S: AsRef<str>>(items: &[S]) -> IndexMap<String, &str> {
    let mut keyed = IndexMap::new();
    for item in items {
        let key = normalize(item.as_ref());
        if key.is_empty() {
            continue;
        }
        keyed.entry(key).or_insert(item.as_ref());
    }
    keyed
}

/// Compares two models on a single homework. `None` unless both cells exist.
pub fn compare_cells<'a>(
    doc: &'a AdvancedAnalytics,
    homework: &str,
    model_a: &str,
    model_b: &str,
) -> Option<CellComparison<'a>> {
    let cell_a = doc.cell(homework, model_a)?;
    let cell_b = doc.cell(homework, model_b)?;

    Some(CellComparison {
        homework: homework.to_string(),
        model_a: model_a.to_string(),
        model_b: model_b.to_string(),
        cell_a,
        cell_b,
        strengths: compare(&cell_a.strengths, &cell_b.strengths),
        weaknesses: compare(&cell_a.weaknesses, &cell_b.weaknesses),
    })
}

/// Fallback selection: first homework, then the first two models by name
/// (or the same model twice). Caller ordering of `models` does not matter.
pub fn default_selection(
    homeworks: &[String],
    models: &[String],
) -> Option<(String, String, String)> {
    let homework = homeworks.first()?;
    let mut by_name: Vec<&String> = models.iter().collect();
    by_name.sort();
    let model_a = *by_name.first()?;
    let model_b = by_name.get(1).copied().unwrap_or(model_a);
    Some((homework.clone(), model_a.clone(), model_b.clone()))
}
