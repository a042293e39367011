use serde::{Deserialize, Serialize};

use crate::documents::null_default;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    #[serde(default, deserialize_with = "null_default")]
    pub term: String,
    #[serde(default, alias = "frequency", deserialize_with = "null_default")]
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepresentativePost {
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    #[serde(deserialize_with = "null_default")]
    pub author: String,
    #[serde(deserialize_with = "null_default")]
    pub url: String,
    #[serde(deserialize_with = "null_default")]
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cell {
    #[serde(deserialize_with = "null_default")]
    pub post_count: u64,
    #[serde(deserialize_with = "null_default")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub weaknesses: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub top_terms: Vec<TermEntry>,
    #[serde(deserialize_with = "null_default")]
    pub representative_posts: Vec<RepresentativePost>,
}

impl Cell {
    pub fn has_posts(&self) -> bool {
        self.post_count > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelEvidenceAggregate {
    pub model: String,
    pub total_homeworks: usize,
    pub homeworks_tested: Vec<String>,
    pub post_count: u64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub distinctive_terms: Vec<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    #[serde(rename = "onlyA")]
    pub only_a: Vec<String>,
    #[serde(rename = "onlyB")]
    pub only_b: Vec<String>,
    pub both: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneLiner {
    pub pro: String,
    pub con: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineStats {
    pub total_posts: u64,
    pub total_authors: u64,
    pub total_models: usize,
    pub total_homeworks: usize,
}
