use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod compare;
mod documents;
mod matrix;
mod models;
mod normalize;
mod rank;
mod report;
mod stats;
mod summary;

use compare::COMPARE_DISPLAY_LIMIT;
use matrix::{CoverageMatrix, ModelOrder};
use models::Cell;
use summary::{
    ChatCompletionsProvider, OfflineProvider, SummaryOutcome, SummaryProvider, SummaryRequest,
    SummaryScope, SummarySession,
};

#[derive(Parser)]
#[command(name = "hw-model-insights")]
#[command(about = "Evidence rollups, comparisons and coverage for homework x model analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the most tested models with their aggregated evidence
    Rank {
        #[arg(long)]
        analytics: Option<PathBuf>,
        #[arg(long)]
        advanced: Option<PathBuf>,
        #[arg(long, default_value_t = rank::DEFAULT_TOP_MODELS)]
        limit: usize,
    },
    /// Compare two models on the same homework
    Compare {
        #[arg(long)]
        advanced: PathBuf,
        #[arg(long)]
        homework: Option<String>,
        #[arg(long)]
        model_a: Option<String>,
        #[arg(long)]
        model_b: Option<String>,
        /// Add a one-line pro/con for each side
        #[arg(long)]
        summaries: bool,
        #[command(flatten)]
        summary: SummaryArgs,
    },
    /// Print the homework x model coverage matrix
    Heatmap {
        #[arg(long)]
        advanced: PathBuf,
        #[arg(long, value_enum, default_value_t = ModelOrder::Count)]
        order: ModelOrder,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Headline statistics and the posting timeline
    Stats {
        #[arg(long)]
        analytics: PathBuf,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        analytics: Option<PathBuf>,
        #[arg(long)]
        advanced: Option<PathBuf>,
        #[arg(long, default_value_t = rank::DEFAULT_TOP_MODELS)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Request a one-line pro/con summary for a model
    Summarize {
        #[arg(long)]
        advanced: PathBuf,
        #[arg(long)]
        model: String,
        /// Summarize one homework cell instead of the cross-homework rollup
        #[arg(long)]
        homework: Option<String>,
        #[command(flatten)]
        summary: SummaryArgs,
    },
}

#[derive(Args)]
struct SummaryArgs {
    #[arg(long, value_enum, default_value_t = ProviderKind::Chat)]
    provider: ProviderKind,
    #[arg(long, default_value = summary::DEFAULT_ENDPOINT)]
    endpoint: String,
    #[arg(long, default_value = summary::DEFAULT_CHAT_MODEL)]
    ai_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Chat,
    Offline,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hw_model_insights=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            analytics,
            advanced,
            limit,
        } => {
            let analytics = documents::load_analytics(analytics.as_deref())?;
            let advanced = documents::load_advanced(advanced.as_deref())?;
            let rollup = aggregate::aggregate_evidence(analytics.as_ref(), advanced.as_ref());
            let ranked = rank::rank_models(&rollup.models, limit);

            if ranked.is_empty() {
                println!("No model evidence found.");
                return Ok(());
            }

            println!("Most tested models:");
            for record in ranked {
                println!(
                    "- {} tested on {} homeworks across {} posts",
                    record.model, record.total_homeworks, record.post_count
                );
                if let Some(summary) = &record.summary {
                    println!("  {summary}");
                }
                print_items("  strengths", &record.strengths, aggregate::EVIDENCE_CAP);
                print_items("  weaknesses", &record.weaknesses, aggregate::EVIDENCE_CAP);
                print_items("  terms", &record.distinctive_terms, aggregate::EVIDENCE_CAP);
            }
        }
        Commands::Compare {
            advanced,
            homework,
            model_a,
            model_b,
            summaries,
            summary,
        } => {
            let doc = documents::load_advanced(Some(advanced.as_path()))?.unwrap_or_default();
            let matrix = CoverageMatrix::from_heatmap(&doc.heatmap, ModelOrder::Name);
            let defaults = compare::default_selection(&matrix.homeworks, &matrix.models);

            let (homework, model_a, model_b) = match (homework, model_a, model_b, defaults) {
                (Some(hw), Some(a), Some(b), _) => (hw, a, b),
                (hw, a, b, Some((default_hw, default_a, default_b))) => (
                    hw.unwrap_or(default_hw),
                    a.unwrap_or(default_a),
                    b.unwrap_or(default_b),
                ),
                _ => bail!(
                    "no homeworks or models in {}; pass --homework, --model-a and --model-b",
                    advanced.display()
                ),
            };

            let Some(comparison) = compare::compare_cells(&doc, &homework, &model_a, &model_b)
            else {
                println!(
                    "Pick two models that both have posts under {homework}. (If a side is empty, there were no posts.)"
                );
                return Ok(());
            };

            println!("{model_a} vs {model_b} on {homework}");
            print_side(&model_a, comparison.cell_a);
            print_side(&model_b, comparison.cell_b);

            println!("Evidence differences:");
            for (label, delta) in [
                ("Strengths", &comparison.strengths),
                ("Weaknesses", &comparison.weaknesses),
            ] {
                println!("{label}:");
                print_items(&format!("  {model_a} only"), &delta.only_a, COMPARE_DISPLAY_LIMIT);
                print_items(&format!("  {model_b} only"), &delta.only_b, COMPARE_DISPLAY_LIMIT);
                print_items("  overlap", &delta.both, COMPARE_DISPLAY_LIMIT);
            }

            if summaries {
                let requests = [
                    SummaryRequest::from_cell(
                        SummaryScope::CompareA,
                        &model_a,
                        &homework,
                        comparison.cell_a,
                    ),
                    SummaryRequest::from_cell(
                        SummaryScope::CompareB,
                        &model_b,
                        &homework,
                        comparison.cell_b,
                    ),
                ];
                run_summaries(&summary, &requests).await?;
            }
        }
        Commands::Heatmap {
            advanced,
            order,
            csv,
        } => {
            let doc = documents::load_advanced(Some(advanced.as_path()))?.unwrap_or_default();
            let matrix = CoverageMatrix::from_heatmap(&doc.heatmap, order);

            if matrix.is_empty() {
                println!("No coverage data found.");
                return Ok(());
            }

            println!("Cells show count@opacity; * marks cells above half the peak.");
            println!("{:<24} {} total", "model", matrix.homeworks.join(" "));
            for model in &matrix.models {
                let cells: Vec<String> = matrix
                    .homeworks
                    .iter()
                    .map(|hw| {
                        let value = matrix.value(hw, model);
                        let marker = if matrix.high_contrast(value) { "*" } else { "" };
                        format!("{value}@{:.2}{marker}", matrix.intensity(value))
                    })
                    .collect();
                println!(
                    "{:<24} {} {}",
                    model,
                    cells.join(" "),
                    matrix.model_total(model)
                );
            }

            if let Some(path) = csv {
                report::write_matrix_csv(&matrix, &path)?;
                println!("Matrix written to {}.", path.display());
            }
        }
        Commands::Stats { analytics } => {
            let doc = documents::load_analytics(Some(analytics.as_path()))?.unwrap_or_default();
            let headline = stats::headline(&doc);
            println!(
                "{} posts, {} authors, {} models, {} homeworks",
                headline.total_posts,
                headline.total_authors,
                headline.total_models,
                headline.total_homeworks
            );

            println!("Posts by model:");
            for (model, count) in stats::top_models_by_posts(&doc, stats::TOP_MODELS_CHART) {
                println!("- {model}: {count}");
            }
            println!("Posts by homework:");
            for (homework, count) in stats::homework_series(&doc) {
                println!("- {homework}: {count}");
            }

            let timeline = stats::timeline(&doc);
            println!("Posts per day:");
            for (day, count) in &timeline.days {
                println!("- {}: {count}", day.format("%b %d"));
            }
            for (key, count) in &timeline.undated {
                println!("- {key}: {count}");
            }
        }
        Commands::Report {
            analytics,
            advanced,
            limit,
            out,
        } => {
            let analytics = documents::load_analytics(analytics.as_deref())?;
            let advanced = documents::load_advanced(advanced.as_deref())?;
            let rollup = aggregate::aggregate_evidence(analytics.as_ref(), advanced.as_ref());
            let matrix = match (&advanced, &analytics) {
                (Some(doc), _) => CoverageMatrix::from_heatmap(&doc.heatmap, ModelOrder::Count),
                (None, Some(doc)) => CoverageMatrix::from_model_major(doc, ModelOrder::Count),
                (None, None) => CoverageMatrix::default(),
            };
            let comparison = advanced.as_ref().and_then(|doc| {
                let (homework, model_a, model_b) =
                    compare::default_selection(&matrix.homeworks, &matrix.models)?;
                compare::compare_cells(doc, &homework, &model_a, &model_b)
            });

            let report = report::build_report(&report::ReportInputs {
                analytics: analytics.as_ref(),
                advanced: advanced.as_ref(),
                rollup: &rollup,
                matrix: &matrix,
                comparison: comparison.as_ref(),
                limit,
            });
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Summarize {
            advanced,
            model,
            homework,
            summary,
        } => {
            let doc = documents::load_advanced(Some(advanced.as_path()))?.unwrap_or_default();
            let request = match &homework {
                Some(hw) => {
                    let cell = doc
                        .cell(hw, &model)
                        .with_context(|| format!("no posts for {model} under {hw}"))?;
                    SummaryRequest::from_cell(SummaryScope::Cell, &model, hw, cell)
                }
                None => {
                    let rollup = aggregate::aggregate_evidence(None, Some(&doc));
                    let record = rollup
                        .get(&model)
                        .with_context(|| format!("no evidence for {model}"))?;
                    SummaryRequest::from_aggregate(record)
                }
            };

            run_summaries(&summary, &[request]).await?;
        }
    }

    Ok(())
}

async fn run_summaries(args: &SummaryArgs, requests: &[SummaryRequest]) -> anyhow::Result<()> {
    match args.provider {
        ProviderKind::Chat => {
            let api_key = std::env::var("SUMMARY_API_KEY")
                .context("SUMMARY_API_KEY must be set to use the chat provider")?;
            let provider = ChatCompletionsProvider::new(&args.endpoint, &api_key, &args.ai_model)?;
            print_summaries(&SummarySession::new(true, provider), requests).await;
        }
        ProviderKind::Offline => {
            print_summaries(&SummarySession::new(true, OfflineProvider), requests).await;
        }
    }
    Ok(())
}

async fn print_summaries<P: SummaryProvider>(
    session: &SummarySession<P>,
    requests: &[SummaryRequest],
) {
    for request in requests {
        let label = request.homework.as_deref().unwrap_or("all homeworks");
        match session.request(request).await {
            SummaryOutcome::Generated(line) | SummaryOutcome::Cached(line) => {
                println!("{} on {label}:", request.model_name);
                println!("  Pro: {}", line.pro);
                println!("  Con: {}", line.con);
            }
            SummaryOutcome::InFlight => {
                println!("A summary for {} is already pending.", request.model_name)
            }
            SummaryOutcome::Disabled => println!("One-line summaries are disabled."),
            SummaryOutcome::Failed(err) => {
                println!("Summary for {} unavailable: {err}", request.model_name)
            }
        }
    }
}

fn print_side(model: &str, cell: &Cell) {
    println!("{model}: {} posts", cell.post_count);
    let terms: Vec<String> = cell.top_terms.iter().map(|t| t.term.clone()).collect();
    print_items("  top terms", &terms, COMPARE_DISPLAY_LIMIT);
    print_items("  strengths", &cell.strengths, COMPARE_DISPLAY_LIMIT);
    print_items("  weaknesses", &cell.weaknesses, COMPARE_DISPLAY_LIMIT);
    for post in &cell.representative_posts {
        println!("  post: {} by {} ({})", post.title, post.author, post.url);
        if !post.snippet.is_empty() {
            println!("    {}", post.snippet);
        }
    }
}

fn print_items(label: &str, items: &[String], limit: usize) {
    if items.is_empty() {
        println!("{label}: none");
        return;
    }
    println!("{label}:");
    for item in items.iter().take(limit) {
        println!("    - {item}");
    }
}
