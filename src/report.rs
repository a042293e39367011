use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::Utc;

use crate::aggregate::{EvidenceRollup, EvidenceSource};
use crate::compare::{CellComparison, COMPARE_DISPLAY_LIMIT};
use crate::documents::{AdvancedAnalytics, AnalyticsDocument};
use crate::matrix::CoverageMatrix;
use crate::models::ComparisonResult;
use crate::rank;
use crate::stats;

pub const GLOBAL_TERMS_LIMIT: usize = 30;

pub struct ReportInputs<'a> {
    pub analytics: Option<&'a AnalyticsDocument>,
    pub advanced: Option<&'a AdvancedAnalytics>,
    pub rollup: &'a EvidenceRollup,
    pub matrix: &'a CoverageMatrix,
    pub comparison: Option<&'a CellComparison<'a>>,
    pub limit: usize,
}

pub fn build_report(inputs: &ReportInputs<'_>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Model Evidence Report");
    let _ = writeln!(output, "Generated {}", Utc::now().format("%Y-%m-%d %H:%M UTC"));
    if let Some(source) = inputs.advanced.and_then(|doc| doc.generated_at.as_deref()) {
        let _ = writeln!(output, "Analytics computed {source}");
    }
    let _ = writeln!(output);

    write_overview(&mut output, inputs.analytics);
    write_model_cards(&mut output, inputs.rollup, inputs.limit);
    write_coverage(&mut output, inputs.matrix);
    if let Some(comparison) = inputs.comparison {
        write_comparison(&mut output, comparison);
    }
    write_global_terms(&mut output, inputs.advanced);

    output
}

fn write_overview(output: &mut String, analytics: Option<&AnalyticsDocument>) {
    let _ = writeln!(output, "## Overview");
    let Some(doc) = analytics else {
        let _ = writeln!(output, "No basic analytics loaded.");
        let _ = writeln!(output);
        return;
    };

    let headline = stats::headline(doc);
    let _ = writeln!(
        output,
        "- {} posts by {} authors across {} models and {} homeworks",
        headline.total_posts, headline.total_authors, headline.total_models, headline.total_homeworks
    );
    if let Some((day, count)) = stats::timeline(doc).busiest_day() {
        let _ = writeln!(output, "- Busiest day: {day} ({count} posts)");
    }

    if !doc.insights.key_findings.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Key Findings");
        for finding in &doc.insights.key_findings {
            let _ = writeln!(output, "- {finding}");
        }
    }
    let _ = writeln!(output);
}

fn write_model_cards(output: &mut String, rollup: &EvidenceRollup, limit: usize) {
    let _ = writeln!(output, "## Most Tested Models");
    let source = match rollup.source {
        EvidenceSource::Upstream => "upstream model comparison",
        EvidenceSource::Cells => "homework cell analysis",
        EvidenceSource::Empty => "no evidence",
    };
    let _ = writeln!(output, "Evidence source: {source}");

    let ranked = rank::rank_models(&rollup.models, limit);
    if ranked.is_empty() {
        let _ = writeln!(output, "No model evidence available.");
        let _ = writeln!(output);
        return;
    }

    for record in ranked {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} ({} homeworks, {} posts)",
            record.model, record.total_homeworks, record.post_count
        );
        if let Some(summary) = &record.summary {
            let _ = writeln!(output, "{summary}");
        }
        if !record.homeworks_tested.is_empty() {
            let _ = writeln!(output, "Tested on: {}", record.homeworks_tested.join(", "));
        }
        write_list(output, "Strengths", &record.strengths);
        write_list(output, "Weaknesses", &record.weaknesses);
        if !record.distinctive_terms.is_empty() {
            let _ = writeln!(output, "Distinctive terms: {}", record.distinctive_terms.join(", "));
        }
    }
    let _ = writeln!(output);
}

fn write_list(output: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(output, "{title}:");
    for item in items {
        let _ = writeln!(output, "- {item}");
    }
}

fn write_coverage(output: &mut String, matrix: &CoverageMatrix) {
    let _ = writeln!(output, "## Homework Coverage");
    if matrix.is_empty() {
        let _ = writeln!(output, "No coverage data.");
        let _ = writeln!(output);
        return;
    }

    let _ = writeln!(output, "| Model | {} | Total |", matrix.homeworks.join(" | "));
    let _ = writeln!(output, "|---{}|---|", "|---".repeat(matrix.homeworks.len()));
    for model in &matrix.models {
        let cells: Vec<String> = matrix
            .homeworks
            .iter()
            .map(|homework| match matrix.value(homework, model) {
                0 => "-".to_string(),
                value => value.to_string(),
            })
            .collect();
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            model,
            cells.join(" | "),
            matrix.model_total(model)
        );
    }
    let _ = writeln!(output);
}

fn write_comparison(output: &mut String, comparison: &CellComparison<'_>) {
    let _ = writeln!(
        output,
        "## {} vs {} on {}",
        comparison.model_a, comparison.model_b, comparison.homework
    );
    let _ = writeln!(
        output,
        "{} posts vs {} posts",
        comparison.cell_a.post_count, comparison.cell_b.post_count
    );
    write_delta(output, "Strengths", comparison, &comparison.strengths);
    write_delta(output, "Weaknesses", comparison, &comparison.weaknesses);
    let _ = writeln!(output);
}

fn write_delta(
    output: &mut String,
    title: &str,
    comparison: &CellComparison<'_>,
    delta: &ComparisonResult,
) {
    let _ = writeln!(output);
    let _ = writeln!(output, "### {title}");
    let blocks = [
        (format!("{} only", comparison.model_a), &delta.only_a),
        (format!("{} only", comparison.model_b), &delta.only_b),
        ("Overlap".to_string(), &delta.both),
    ];
    for (label, items) in blocks {
        if items.is_empty() {
            let _ = writeln!(output, "- {label}: None");
            continue;
        }
        let _ = writeln!(output, "- {label}:");
        for item in items.iter().take(COMPARE_DISPLAY_LIMIT) {
            let _ = writeln!(output, "  - {item}");
        }
    }
}

fn write_global_terms(output: &mut String, advanced: Option<&AdvancedAnalytics>) {
    let terms = advanced
        .map(|doc| doc.statistics.global_top_terms.as_slice())
        .unwrap_or_default();
    if terms.is_empty() {
        return;
    }
    let _ = writeln!(output, "## Global Top Terms");
    let listed: Vec<String> = terms
        .iter()
        .take(GLOBAL_TERMS_LIMIT)
        .map(|entry| format!("{} ({:.3})", entry.term, entry.score))
        .collect();
    let _ = writeln!(output, "{}", listed.join(", "));
}

pub fn write_matrix_csv(matrix: &CoverageMatrix, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut header = vec!["model".to_string()];
    header.extend(matrix.homeworks.iter().cloned());
    header.push("total".to_string());
    writer.write_record(&header)?;

    for model in &matrix.models {
        let mut row = vec![model.clone()];
        row.extend(
            matrix
                .homeworks
                .iter()
                .map(|homework| matrix.value(homework, model).to_string()),
        );
        row.push(matrix.model_total(model).to_string());
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
