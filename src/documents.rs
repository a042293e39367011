use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::models::{Cell, TermEntry};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsDocument {
    #[serde(deserialize_with = "null_default")]
    pub statistics: Statistics,
    #[serde(deserialize_with = "null_default")]
    pub insights: Insights,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Statistics {
    #[serde(deserialize_with = "null_default")]
    pub total_posts: u64,
    #[serde(deserialize_with = "null_default")]
    pub total_authors: u64,
    #[serde(deserialize_with = "null_default")]
    pub models: IndexMap<String, u64>,
    #[serde(deserialize_with = "null_default")]
    pub homeworks: IndexMap<String, u64>,
    /// Model-major: model -> homework -> count.
    #[serde(deserialize_with = "null_default")]
    pub model_homework_matrix: IndexMap<String, IndexMap<String, u64>>,
    #[serde(deserialize_with = "null_default")]
    pub timeline: IndexMap<String, u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Insights {
    #[serde(deserialize_with = "null_default")]
    pub key_findings: Vec<String>,
    pub model_comparison: Option<IndexMap<String, Option<UpstreamModelSummary>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpstreamModelSummary {
    pub summary: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub weaknesses: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub homeworks_tested: Vec<String>,
    pub post_count: Option<u64>,
    pub total_homeworks: Option<usize>,
    #[serde(deserialize_with = "null_default")]
    pub distinctive_terms: Vec<String>,
}

impl UpstreamModelSummary {
    pub fn has_evidence(&self) -> bool {
        !self.strengths.is_empty() || !self.weaknesses.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdvancedAnalytics {
    pub generated_at: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub heatmap: Heatmap,
    #[serde(deserialize_with = "null_default")]
    pub hw_model_analysis: IndexMap<String, IndexMap<String, Option<Cell>>>,
    #[serde(deserialize_with = "null_default")]
    pub statistics: AdvancedStatistics,
}

impl AdvancedAnalytics {
    /// Cell for one homework and model; `None` when absent or null.
    pub fn cell(&self, homework: &str, model: &str) -> Option<&Cell> {
        self.hw_model_analysis
            .get(homework)
            .and_then(|models| models.get(model))
            .and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Heatmap {
    #[serde(deserialize_with = "null_default")]
    pub homeworks: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub models: Vec<String>,
    /// Homework-major: homework -> model -> count.
    #[serde(deserialize_with = "null_default")]
    pub matrix: IndexMap<String, IndexMap<String, u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdvancedStatistics {
    #[serde(deserialize_with = "null_default")]
    pub global_top_terms: Vec<TermEntry>,
}

pub fn load_analytics(path: Option<&Path>) -> anyhow::Result<Option<AnalyticsDocument>> {
    load_optional(path)
}

pub fn load_advanced(path: Option<&Path>) -> anyhow::Result<Option<AdvancedAnalytics>> {
    load_optional(path)
}

/// Reads a field that may be absent or `null` as its default value.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn load_optional<T: DeserializeOwned>(path: Option<&Path>) -> anyhow::Result<Option<T>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid analytics document", path.display()))?;
    debug!(path = %path.display(), bytes = raw.len(), "loaded analytics document");
    Ok(Some(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn missing_fields_default_to_empty() {
        let doc: AdvancedAnalytics = serde_json::from_value(json!({})).unwrap();
        assert!(doc.heatmap.homeworks.is_empty());
        assert!(doc.hw_model_analysis.is_empty());
        assert!(doc.statistics.global_top_terms.is_empty());

        let doc: AnalyticsDocument =
            serde_json::from_value(json!({ "statistics": { "total_posts": 4 } })).unwrap();
        assert_eq!(doc.statistics.total_posts, 4);
        assert!(doc.insights.model_comparison.is_none());
    }

    #[test]
    fn empty_and_null_cells_are_distinguished() {
        let doc: AdvancedAnalytics = serde_json::from_value(json!({
            "hw_model_analysis": {
                "HW1": { "GPT-4": {}, "Claude": null }
            }
        }))
        .unwrap();

        let cell = doc.cell("HW1", "GPT-4").unwrap();
        assert_eq!(cell.post_count, 0);
        assert!(!cell.has_posts());
        assert!(doc.cell("HW1", "Claude").is_none());
        assert!(doc.cell("HW9", "GPT-4").is_none());
    }

    #[test]
    fn null_fields_read_as_empty() {
        let doc: AdvancedAnalytics = serde_json::from_value(json!({
            "generated_at": null,
            "heatmap": { "homeworks": null, "models": ["GPT-4"], "matrix": null },
            "hw_model_analysis": {
                "HW1": {
                    "GPT-4": {
                        "post_count": null,
                        "strengths": null,
                        "weaknesses": ["Verbose"],
                        "top_terms": [{ "term": null, "score": null }],
                        "representative_posts": [{ "title": "Setup", "url": null }]
                    }
                }
            },
            "statistics": null
        }))
        .unwrap();

        assert!(doc.heatmap.homeworks.is_empty());
        assert!(doc.heatmap.matrix.is_empty());
        let cell = doc.cell("HW1", "GPT-4").unwrap();
        assert_eq!(cell.post_count, 0);
        assert!(cell.strengths.is_empty());
        assert_eq!(cell.weaknesses, ["Verbose"]);
        assert_eq!(cell.top_terms[0].term, "");
        assert_eq!(cell.top_terms[0].score, 0.0);
        assert_eq!(cell.representative_posts[0].url, "");
        assert!(doc.statistics.global_top_terms.is_empty());

        let doc: AnalyticsDocument = serde_json::from_value(json!({
            "statistics": { "total_posts": null, "models": null },
            "insights": null
        }))
        .unwrap();
        assert_eq!(doc.statistics.total_posts, 0);
        assert!(doc.statistics.models.is_empty());
        assert!(doc.insights.model_comparison.is_none());

        let doc: AnalyticsDocument = serde_json::from_value(json!({
            "insights": {
                "key_findings": null,
                "model_comparison": {
                    "Claude": { "strengths": ["Careful"], "weaknesses": null, "homeworks_tested": null }
                }
            }
        }))
        .unwrap();
        assert!(doc.insights.key_findings.is_empty());
        let claude = doc.insights.model_comparison.as_ref().unwrap()["Claude"]
            .as_ref()
            .unwrap();
        assert_eq!(claude.strengths, ["Careful"]);
        assert!(claude.weaknesses.is_empty());
        assert!(claude.homeworks_tested.is_empty());
    }

    #[test]
    fn global_terms_accept_frequency_field() {
        let doc: AdvancedAnalytics = serde_json::from_value(json!({
            "statistics": { "global_top_terms": [{ "term": "proof", "frequency": 0.25 }] }
        }))
        .unwrap();
        assert_eq!(doc.statistics.global_top_terms[0].score, 0.25);
    }

    #[test]
    fn object_order_is_preserved() {
        let doc: AdvancedAnalytics = serde_json::from_str(
            r#"{"hw_model_analysis": {"HW3": {"Zeta": {}, "Alpha": {}}, "HW1": {}}}"#,
        )
        .unwrap();
        let homeworks: Vec<&String> = doc.hw_model_analysis.keys().collect();
        assert_eq!(homeworks, ["HW3", "HW1"]);
        let models: Vec<&String> = doc.hw_model_analysis["HW3"].keys().collect();
        assert_eq!(models, ["Zeta", "Alpha"]);
    }

    #[test]
    fn loading_without_path_yields_none() {
        assert!(load_advanced(None).unwrap().is_none());
        assert!(load_analytics(None).unwrap().is_none());
    }

    #[test]
    fn loading_reports_invalid_json_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_advanced(Some(file.path())).unwrap_err();
        assert!(format!("{err}").contains("not a valid analytics document"));
    }

    #[test]
    fn loading_reads_document_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"statistics": {{"total_posts": 12, "models": {{"GPT-4": 12}}}}}}"#
        )
        .unwrap();
        let doc = load_analytics(Some(file.path())).unwrap().unwrap();
        assert_eq!(doc.statistics.total_posts, 12);
        assert_eq!(doc.statistics.models["GPT-4"], 12);
    }
}
