use chrono::NaiveDate;
use tracing::debug;

use crate::documents::AnalyticsDocument;
use crate::models::HeadlineStats;
use crate::normalize::homework_number;

pub const TOP_MODELS_CHART: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    pub days: Vec<(NaiveDate, u64)>,
    /// Keys that are not `YYYY-MM-DD` dates, in document order.
    pub undated: Vec<(String, u64)>,
}

impl Timeline {
    pub fn busiest_day(&self) -> Option<(NaiveDate, u64)> {
        self.days
            .iter()
            .copied()
            .reduce(|best, day| if day.1 > best.1 { day } else { best })
    }
}

pub fn headline(doc: &AnalyticsDocument) -> HeadlineStats {
    HeadlineStats {
        total_posts: doc.statistics.total_posts,
        total_authors: doc.statistics.total_authors,
        total_models: doc.statistics.models.len(),
        total_homeworks: doc.statistics.homeworks.len(),
    }
}

pub fn top_models_by_posts(doc: &AnalyticsDocument, limit: usize) -> Vec<(String, u64)> {
    let mut models: Vec<(String, u64)> = doc
        .statistics
        .models
        .iter()
        .map(|(name, count)| (name.clone(), *count))
        .collect();
    models.sort_by(|a, b| b.1.cmp(&a.1));
    models.truncate(limit);
    models
}

pub fn homework_series(doc: &AnalyticsDocument) -> Vec<(String, u64)> {
    let mut series: Vec<(String, u64)> = doc
        .statistics
        .homeworks
        .iter()
        .map(|(name, count)| (name.clone(), *count))
        .collect();
    series.sort_by_key(|(name, _)| homework_number(name));
    series
}

pub fn timeline(doc: &AnalyticsDocument) -> Timeline {
    let mut timeline = Timeline::default();

    for (key, count) in &doc.statistics.timeline {
        match NaiveDate::parse_from_str(key, "%Y-%m-%d") {
            Ok(date) => timeline.days.push((date, *count)),
            Err(_) => {
                debug!(key = %key, "timeline key is not a date");
                timeline.undated.push((key.clone(), *count));
            }
        }
    }

    timeline.days.sort_by_key(|(date, _)| *date);
    timeline
}
