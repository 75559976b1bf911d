//! Knowledge-base statistics.
//!
//! A quick overview of what the loaded collection contains: format mix,
//! category and trade breakdowns, price/labor/material figures, and how
//! the quality scorer rates the records. Used by `budget stats`.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::FormatTag;
use crate::search::SearchCorpus;

/// Min/max/mean/median over the positive values of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStats {
    pub count: usize,
    pub total: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl FieldStats {
    /// `None` when no value is positive.
    fn positive(values: impl Iterator<Item = Option<f64>>) -> Option<Self> {
        let mut values: Vec<f64> = values.flatten().filter(|v| *v > 0.0).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let total: f64 = values.iter().sum();
        let count = values.len();
        Some(Self {
            count,
            total,
            min: values[0],
            max: values[count - 1],
            mean: total / count as f64,
            median: median_of_sorted(&values),
        })
    }
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityDistribution {
    /// Scored exactly 1.0.
    pub high: usize,
    pub medium: usize,
    /// At or below the basic score.
    pub basic: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeBaseStats {
    pub total_components: usize,
    pub detailed_components: usize,
    pub legacy_components: usize,
    pub sources: usize,
    pub categories: Vec<(String, usize)>,
    pub trades: Vec<(String, usize)>,
    pub total_price: Option<FieldStats>,
    pub labor_hours: Option<FieldStats>,
    pub material_cost: Option<FieldStats>,
    pub quality: QualityDistribution,
}

impl KnowledgeBaseStats {
    pub fn compute(corpus: &SearchCorpus) -> Self {
        let components = corpus.knowledge_base().components();

        let legacy_components = components
            .iter()
            .filter(|c| c.format_tag == FormatTag::Legacy)
            .count();

        let mut sources: Vec<&str> = components
            .iter()
            .map(|c| c.source_id.as_str())
            .filter(|s| !s.trim().is_empty())
            .collect();
        sources.sort_unstable();
        sources.dedup();

        let mut quality = QualityDistribution::default();
        for &score in corpus.quality_scores() {
            if score >= 1.0 {
                quality.high += 1;
            } else if score <= crate::quality::BASIC_QUALITY {
                quality.basic += 1;
            } else {
                quality.medium += 1;
            }
        }

        Self {
            total_components: components.len(),
            detailed_components: components.len() - legacy_components,
            legacy_components,
            sources: sources.len(),
            categories: count_labels(components.iter().map(|c| c.category.as_str())),
            trades: count_labels(components.iter().map(|c| c.trade.as_str())),
            total_price: FieldStats::positive(components.iter().map(|c| c.total_price)),
            labor_hours: FieldStats::positive(components.iter().map(|c| c.labor_hours)),
            material_cost: FieldStats::positive(components.iter().map(|c| c.material_cost)),
            quality,
        }
    }
}

/// Every label with its count, most frequent first, then by name.
fn count_labels<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in labels {
        let label = if label.trim().is_empty() {
            "Unknown"
        } else {
            label.trim()
        };
        *counts.entry(label.to_string()).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Print a human-readable report.
pub fn print_stats(stats: &KnowledgeBaseStats, collection: &std::path::Path) {
    println!("Budget Harness: Knowledge Base Stats");
    println!("====================================");
    println!();
    println!("  Collection:  {}", collection.display());
    println!("  Components:  {}", stats.total_components);
    println!(
        "  Formats:     {} detailed, {} legacy",
        stats.detailed_components, stats.legacy_components
    );
    println!("  Sources:     {}", stats.sources);
    println!(
        "  Quality:     {} high, {} medium, {} basic",
        stats.quality.high, stats.quality.medium, stats.quality.basic
    );

    print_field("Total price", stats.total_price.as_ref());
    print_field("Labor hours", stats.labor_hours.as_ref());
    print_field("Materials", stats.material_cost.as_ref());

    print_counts("By category", "CATEGORY", &stats.categories);
    print_counts("By trade", "TRADE", &stats.trades);
    println!();
}

fn print_field(label: &str, field: Option<&FieldStats>) {
    println!();
    match field {
        Some(f) => {
            println!("  {} ({} records):", label, f.count);
            println!(
                "    total {:.2}  min {:.2}  max {:.2}  mean {:.2}  median {:.2}",
                f.total, f.min, f.max, f.mean, f.median
            );
        }
        None => println!("  {}: no positive values", label),
    }
}

fn print_counts(title: &str, header: &str, counts: &[(String, usize)]) {
    if counts.is_empty() {
        return;
    }
    println!();
    println!("  {}:", title);
    println!("  {:<32} {:>6}", header, "COUNT");
    println!("  {}", "-".repeat(39));
    for (label, count) in counts {
        println!("  {:<32} {:>6}", label, count);
    }
}
