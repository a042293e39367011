use crate::models::ModelEvidenceAggregate;

pub const DEFAULT_TOP_MODELS: usize = 6;
pub const UNKNOWN_MODEL: &str = "Unknown";

/// Most-tested models first, then by post volume. Equal records keep their
/// input order.
pub fn rank_models(
    aggregates: &[ModelEvidenceAggregate],
    limit: usize,
) -> Vec<&ModelEvidenceAggregate> {
    let mut ranked: Vec<&ModelEvidenceAggregate> = aggregates
        .iter()
        .filter(|record| !record.model.is_empty() && record.model != UNKNOWN_MODEL)
        .collect();

    ranked.sort_by(|a, b| {
        b.total_homeworks
            .cmp(&a.total_homeworks)
            .then_with(|| b.post_count.cmp(&a.post_count))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: &str, total_homeworks: usize, post_count: u64) -> ModelEvidenceAggregate {
        ModelEvidenceAggregate {
            total_homeworks,
            post_count,
            model: model.to_string(),
            ..ModelEvidenceAggregate::default()
        }
    }

    fn names(ranked: &[&ModelEvidenceAggregate]) -> Vec<String> {
        ranked.iter().map(|r| r.model.clone()).collect()
    }

    #[test]
    fn orders_by_homeworks_then_posts() {
        let records = vec![
            record("A", 2, 50),
            record("B", 3, 4),
            record("C", 3, 9),
            record("D", 1, 100),
        ];
        assert_eq!(names(&rank_models(&records, 6)), ["C", "B", "A", "D"]);
    }

    #[test]
    fn full_ties_keep_emission_order() {
        let records = vec![record("First", 3, 5), record("Second", 3, 5)];
        assert_eq!(names(&rank_models(&records, 6)), ["First", "Second"]);
    }

    #[test]
    fn excludes_unknown_sentinel() {
        let records = vec![record(UNKNOWN_MODEL, 9, 99), record("A", 1, 1), record("", 5, 5)];
        assert_eq!(names(&rank_models(&records, 6)), ["A"]);
    }

    #[test]
    fn truncates_to_limit() {
        let records: Vec<ModelEvidenceAggregate> =
            (0..10).map(|i| record(&format!("M{i}"), i, 0)).collect();
        let ranked = rank_models(&records, DEFAULT_TOP_MODELS);
        assert_eq!(ranked.len(), DEFAULT_TOP_MODELS);
        assert_eq!(ranked[0].model, "M9");
        assert!(rank_models(&records, 0).is_empty());
    }
}
