use clap::ValueEnum;
use indexmap::{IndexMap, IndexSet};

use crate::documents::{AnalyticsDocument, Heatmap};
use crate::normalize::sort_homeworks;

pub const INTENSITY_FLOOR: f64 = 0.2;
pub const INTENSITY_SPAN: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModelOrder {
    /// Alphabetical by model name.
    Name,
    /// Most posts across all homeworks first.
    #[default]
    Count,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageMatrix {
    pub homeworks: Vec<String>,
    pub models: Vec<String>,
    pub matrix: IndexMap<String, IndexMap<String, u64>>,
    pub max_value: u64,
}

impl CoverageMatrix {
    pub fn from_heatmap(heatmap: &Heatmap, order: ModelOrder) -> Self {
        let mut homeworks: IndexSet<String> = heatmap.homeworks.iter().cloned().collect();
        let mut models: IndexSet<String> = heatmap.models.iter().cloned().collect();
        for (homework, row) in &heatmap.matrix {
            homeworks.insert(homework.clone());
            models.extend(row.keys().cloned());
        }

        Self::build(
            homeworks.into_iter().collect(),
            models.into_iter().collect(),
            heatmap.matrix.clone(),
            order,
        )
    }

    pub fn from_model_major(doc: &AnalyticsDocument, order: ModelOrder) -> Self {
        let mut homeworks: IndexSet<String> = IndexSet::new();
        let mut matrix: IndexMap<String, IndexMap<String, u64>> = IndexMap::new();

        for (model, row) in &doc.statistics.model_homework_matrix {
            for (homework, count) in row {
                homeworks.insert(homework.clone());
                matrix
                    .entry(homework.clone())
                    .or_default()
                    .insert(model.clone(), *count);
            }
        }

        Self::build(
            homeworks.into_iter().collect(),
            doc.statistics.model_homework_matrix.keys().cloned().collect(),
            matrix,
            order,
        )
    }

    fn build(
        mut homeworks: Vec<String>,
        models: Vec<String>,
        matrix: IndexMap<String, IndexMap<String, u64>>,
        order: ModelOrder,
    ) -> Self {
        sort_homeworks(&mut homeworks);
        let max_value = matrix
            .values()
            .flat_map(|row| row.values().copied())
            .max()
            .unwrap_or(0);

        let mut built = Self {
            homeworks,
            models,
            matrix,
            max_value,
        };
        built.sort_models(order);
        built
    }

    pub fn sort_models(&mut self, order: ModelOrder) {
        match order {
            ModelOrder::Name => self.models.sort(),
            ModelOrder::Count => {
                let mut keyed: Vec<(u64, String)> = std::mem::take(&mut self.models)
                    .into_iter()
                    .map(|model| (self.model_total(&model), model))
                    .collect();
                keyed.sort_by(|a, b| b.0.cmp(&a.0));
                self.models = keyed.into_iter().map(|(_, model)| model).collect();
            }
        }
    }

    pub fn value(&self, homework: &str, model: &str) -> u64 {
        self.matrix
            .get(homework)
            .and_then(|row| row.get(model))
            .copied()
            .unwrap_or(0)
    }

    pub fn model_total(&self, model: &str) -> u64 {
        self.matrix
            .values()
            .filter_map(|row| row.get(model))
            .sum()
    }

    pub fn homework_total(&self, homework: &str) -> u64 {
        self.matrix
            .get(homework)
            .map(|row| row.values().sum())
            .unwrap_or(0)
    }

    /// `0.0` for empty cells, else `INTENSITY_FLOOR + ratio * INTENSITY_SPAN`.
    pub fn intensity(&self, value: u64) -> f64 {
        if value == 0 || self.max_value == 0 {
            return 0.0;
        }
        INTENSITY_FLOOR + self.ratio(value) * INTENSITY_SPAN
    }

    /// `true` above half of `max_value`.
    pub fn high_contrast(&self, value: u64) -> bool {
        value > 0 && self.max_value > 0 && self.ratio(value) > 0.5
    }

    pub fn is_empty(&self) -> bool {
        self.homeworks.is_empty() || self.models.is_empty()
    }

    fn ratio(&self, value: u64) -> f64 {
        value as f64 / self.max_value as f64
    }
}
