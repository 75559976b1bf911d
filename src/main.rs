//! # Budget Harness CLI (`budget`)
//!
//! Search historical construction components and draft new, rule-checked
//! budget components from a task description.
//!
//! ## Usage
//!
//! ```bash
//! budget --config ./config/budget.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `budget search "<query>"` | Ranked similar components |
//! | `budget category "<query>" <category>` | Search within one category |
//! | `budget cost-range "<query>" --min N [--max N]` | Search within a price range |
//! | `budget summary "<query>"` | Price and category/trade overview of matches |
//! | `budget generate "<query>"` | Draft a priced component |
//! | `budget index rebuild` | Reload the collection and rebuild vectors |
//! | `budget index status` | Show index and cache state |
//! | `budget stats` | Collection statistics |
//!
//! Diagnostics go to stderr and are controlled with `RUST_LOG`
//! (default `warn`).

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use budget_harness::config;
use budget_harness::export;
use budget_harness::llm;
use budget_harness::models::{GeneratedComponent, SearchResult};
use budget_harness::search::SearchSummary;
use budget_harness::service::{BudgetService, CacheState, IndexStatus};
use budget_harness::stats::{self, KnowledgeBaseStats};

/// Budget Harness CLI: retrieval and rule-enforced generation of
/// construction budget components.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/budget.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "budget",
    about = "Budget Harness: search historical construction components and draft new ones",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/budget.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank historical components by similarity to a task description.
    Search {
        query: String,

        /// Maximum number of results (default: `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// Similarity floor (default: `retrieval.min_similarity`).
        #[arg(long)]
        min_similarity: Option<f64>,

        /// Quality floor; 1.0 keeps only fully priced, consistent records.
        #[arg(long, default_value_t = 0.0)]
        min_quality: f64,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search within one category.
    Category {
        query: String,
        category: String,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Search within a total-price range.
    CostRange {
        query: String,

        /// Lowest total price.
        #[arg(long, default_value_t = 0.0)]
        min: f64,

        /// Highest total price; open-ended when omitted.
        #[arg(long)]
        max: Option<f64>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Summarize prices, categories, and trades of the matches for a query.
    Summary {
        query: String,

        /// Number of matches to summarize (default: `retrieval.summary_top_k`).
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Draft a priced component for a task description.
    ///
    /// Retrieves comparable components, asks the configured completion
    /// provider for a draft, and enforces the pricing rules on the result.
    Generate {
        query: String,

        /// Use the whole collection as context instead of preferring
        /// high-quality components.
        #[arg(long)]
        all_quality: bool,

        /// Write the component as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the component as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Manage the vector index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Show collection statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Reload the collection and rebuild its vectors.
    Rebuild {
        /// Ignore a fresh cache and recompute every vector.
        #[arg(long)]
        force: bool,
    },
    /// Show index and cache state.
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let service = BudgetService::open(cfg);
    let retrieval = service.config().retrieval.clone();

    match cli.command {
        Commands::Search {
            query,
            limit,
            min_similarity,
            min_quality,
            json,
        } => {
            let results = service.search(
                &query,
                limit.unwrap_or(retrieval.top_k),
                min_similarity.unwrap_or(retrieval.min_similarity),
                min_quality,
            );
            print_results(&results, json)?;
        }
        Commands::Category {
            query,
            category,
            limit,
            json,
        } => {
            let results =
                service.search_by_category(&query, &category, limit.unwrap_or(retrieval.top_k));
            print_results(&results, json)?;
        }
        Commands::CostRange {
            query,
            min,
            max,
            limit,
            json,
        } => {
            if let Some(max) = max {
                if max < min {
                    bail!("--max ({}) must not be below --min ({})", max, min);
                }
            }
            let results =
                service.search_by_cost_range(&query, min, max, limit.unwrap_or(retrieval.top_k));
            print_results(&results, json)?;
        }
        Commands::Summary { query, limit, json } => {
            let summary = service.summarize(&query, limit.unwrap_or(retrieval.summary_top_k));
            print_summary(summary.as_ref(), json)?;
        }
        Commands::Generate {
            query,
            all_quality,
            output,
            json,
        } => {
            let provider = llm::create_provider(&service.config().llm)?;
            let component = service.generate(&query, !all_quality, provider.as_ref())?;
            if let Some(path) = output.as_deref() {
                export::write_component(&query, &component, Some(path))?;
            } else if json {
                export::write_component(&query, &component, None)?;
            } else {
                print_component(&component);
            }
        }
        Commands::Index { action } => match action {
            IndexAction::Rebuild { force } => {
                if !service.rebuild_index(force) {
                    bail!(
                        "Could not load {}",
                        service.config().data.components.display()
                    );
                }
                let status = service.index_status();
                println!(
                    "Index rebuilt: {} components, {} dimensions.",
                    status.index.component_count, status.index.dims
                );
            }
            IndexAction::Status { json } => {
                print_status(&service.index_status(), json)?;
            }
        },
        Commands::Stats { json } => {
            let searcher = service.searcher();
            let kb_stats = KnowledgeBaseStats::compute(searcher.corpus());
            if json {
                println!("{}", serde_json::to_string_pretty(&kb_stats)?);
            } else {
                stats::print_stats(&kb_stats, &service.config().data.components);
            }
        }
    }

    Ok(())
}

fn print_results(results: &[SearchResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, r) in results.iter().enumerate() {
        let c = &r.component;
        println!(
            "{}. [sim {:.3} | quality {:.1}] {}",
            i + 1,
            r.similarity_score,
            r.quality_score,
            c.task_text
        );
        println!(
            "    category: {}  trade: {}  total: {:.2}  source: {}",
            or_unknown(&c.category),
            or_unknown(&c.trade),
            c.total(),
            or_unknown(&c.source_id)
        );
    }
    Ok(())
}

fn print_summary(summary: Option<&SearchSummary>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    let s = match summary {
        Some(s) => s,
        None => {
            println!("No results.");
            return Ok(());
        }
    };
    println!("Summary for \"{}\"", s.query);
    println!("  Results:  {}", s.total_results);
    println!("  Total:    {:.2}", s.total_cost);
    println!("  Average:  {:.2}", s.average_cost);
    println!("  Range:    {:.2} .. {:.2}", s.min_cost, s.max_cost);
    println!("  Top categories:");
    for (label, count) in &s.top_categories {
        println!("    {:<32} {:>4}", label, count);
    }
    println!("  Top trades:");
    for (label, count) in &s.top_trades {
        println!("    {:<32} {:>4}", label, count);
    }
    Ok(())
}

fn print_component(c: &GeneratedComponent) {
    println!("{}", c.task_text);
    println!("  category: {}  trade: {}", or_unknown(&c.category), or_unknown(&c.trade));
    println!("  admin fee:          {:>12.2}", c.admin_fee);
    println!(
        "  labor:              {:>12.2}  ({} h x {:.2})",
        c.labor_cost, c.labor_hours, c.hourly_rate
    );
    println!(
        "  materials:          {:>12.2}  ({:.2} + {}%)",
        c.material_sale_price, c.material_cost, c.material_markup_pct
    );
    println!(
        "  subcontract:        {:>12.2}  ({:.2} + {}%)",
        c.subcontract_sale_price, c.subcontract_cost, c.subcontract_markup_pct
    );
    println!(
        "  total:              {:>12.2}{}",
        c.total_price,
        if c.flat_fee { "  (flat fee)" } else { "" }
    );
    println!();
    println!("  context: {} [{}]", c.context_source, c.context_quality.as_str());
    let adjustments: Vec<_> = c.enforcement.adjustments().collect();
    if adjustments.is_empty() {
        println!("  rules: draft was already compliant");
    } else {
        println!("  rules: {} adjustment(s)", adjustments.len());
        for a in adjustments {
            let from = a
                .from
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "absent".to_string());
            println!("    {:<24} {} -> {:.2}", a.field, from, a.to);
        }
    }
}

fn print_status(status: &IndexStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }
    println!("Collection:  {}", status.components_path.display());
    println!("Cache:       {}", status.cache_path.display());
    println!("Available:   {}", if status.available { "yes" } else { "no" });
    println!("Components:  {}", status.index.component_count);
    println!("Dimensions:  {}", status.index.dims);
    println!("Digest:      {}", status.index.source_digest);
    println!(
        "Built at:    {}",
        status.index.built_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let cache = match &status.cache {
        CacheState::Fresh => "fresh".to_string(),
        CacheState::Missing => "missing".to_string(),
        CacheState::Stale(reason) => format!("stale ({})", reason),
    };
    println!("Cache state: {}", cache);
    Ok(())
}

fn or_unknown(s: &str) -> &str {
    if s.trim().is_empty() {
        "unknown"
    } else {
        s
    }
}

