use indexmap::IndexMap;
use tracing::debug;

use crate::documents::{AdvancedAnalytics, AnalyticsDocument, UpstreamModelSummary};
use crate::models::ModelEvidenceAggregate;
use crate::normalize::{dedup, sort_homeworks};

pub const EVIDENCE_CAP: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceSource {
    /// Document A's `insights.model_comparison`, adopted whole.
    Upstream,
    /// Folded from document B's per-cell analysis.
    Cells,
    Empty,
}

#[derive(Debug, Clone)]
pub struct EvidenceRollup {
    pub source: EvidenceSource,
    pub models: Vec<ModelEvidenceAggregate>,
}

impl EvidenceRollup {
    pub fn get(&self, model: &str) -> Option<&ModelEvidenceAggregate> {
        self.models.iter().find(|record| record.model == model)
    }
}

/// Builds one evidence record per model.
///
/// An upstream summary wins for every model it lists as soon as any one of
/// them carries strengths or weaknesses; otherwise it is ignored entirely and
/// the homework cells are folded instead.
pub fn aggregate_evidence(
    analytics: Option<&AnalyticsDocument>,
    advanced: Option<&AdvancedAnalytics>,
) -> EvidenceRollup {
    if let Some(summary) = analytics.and_then(|doc| doc.insights.model_comparison.as_ref()) {
        if summary.values().flatten().any(UpstreamModelSummary::has_evidence) {
            let models: Vec<ModelEvidenceAggregate> = summary
                .iter()
                .filter_map(|(model, entry)| entry.as_ref().map(|entry| from_upstream(model, entry)))
                .collect();
            debug!(models = models.len(), "adopting upstream model comparison");
            return EvidenceRollup {
                source: EvidenceSource::Upstream,
                models,
            };
        }
        debug!("upstream model comparison has no evidence, folding cells");
    }

    match advanced {
        Some(doc) if !doc.hw_model_analysis.is_empty() => EvidenceRollup {
            source: EvidenceSource::Cells,
            models: fold_cells(doc),
        },
        _ => EvidenceRollup {
            source: EvidenceSource::Empty,
            models: Vec::new(),
        },
    }
}

/// Upstream entries are adopted as-is. A reported `total_homeworks` wins over
/// `homeworks_tested.len()` even when the two disagree, and ranking sorts on
/// that reported value.
fn from_upstream(model: &str, entry: &UpstreamModelSummary) -> ModelEvidenceAggregate {
    ModelEvidenceAggregate {
        model: model.to_string(),
        total_homeworks: entry
            .total_homeworks
            .unwrap_or(entry.homeworks_tested.len()),
        homeworks_tested: entry.homeworks_tested.clone(),
        post_count: entry.post_count.unwrap_or(0),
        strengths: entry.strengths.clone(),
        weaknesses: entry.weaknesses.clone(),
        distinctive_terms: entry.distinctive_terms.clone(),
        summary: entry.summary.clone(),
    }
}

#[derive(Default)]
struct Working {
    homeworks: Vec<String>,
    post_count: u64,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    terms: Vec<String>,
}

fn fold_cells(doc: &AdvancedAnalytics) -> Vec<ModelEvidenceAggregate> {
    let mut working: IndexMap<&str, Working> = IndexMap::new();

    for (homework, models) in &doc.hw_model_analysis {
        for (model, cell) in models {
            let Some(cell) = cell else {
                continue;
            };
            let entry = working.entry(model.as_str()).or_default();
            if !cell.has_posts() {
                continue;
            }

            entry.post_count += cell.post_count;
            entry.homeworks.push(homework.clone());
            entry.strengths.extend(cell.strengths.iter().cloned());
            entry.weaknesses.extend(cell.weaknesses.iter().cloned());
            entry
                .terms
                .extend(cell.top_terms.iter().map(|term| term.term.clone()));
        }
    }

    working
        .into_iter()
        .map(|(model, work)| {
            let mut homeworks_tested = dedup(&work.homeworks, None);
            sort_homeworks(&mut homeworks_tested);
            ModelEvidenceAggregate {
                model: model.to_string(),
                total_homeworks: homeworks_tested.len(),
                homeworks_tested,
                post_count: work.post_count,
                strengths: dedup(&work.strengths, Some(EVIDENCE_CAP)),
                weaknesses: dedup(&work.weaknesses, Some(EVIDENCE_CAP)),
                distinctive_terms: dedup(&work.terms, Some(EVIDENCE_CAP)),
                summary: None,
            }
        })
        .collect()
}
