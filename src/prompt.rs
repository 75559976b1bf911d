//! Prompt assembly for component drafting.
//!
//! The prompt carries three parts: the rule sheet, the context components
//! serialized as JSON, and the user's task description. The rule sheet is
//! rendered from [`RulesConfig`] so the model is asked for exactly the
//! policy the rule pipeline will enforce afterwards.

use serde_json::{json, Value};
use std::fmt::Write as _;

use crate::config::RulesConfig;
use crate::models::SearchResult;

/// Output fields the model is asked to fill, in order.
pub const DRAFT_FIELDS: [&str; 14] = [
    "task_text",
    "category",
    "trade",
    "admin_fee",
    "labor_hours",
    "hourly_rate",
    "labor_cost",
    "material_cost",
    "material_markup_pct",
    "material_sale_price",
    "subcontract_cost",
    "subcontract_markup_pct",
    "subcontract_sale_price",
    "total_price",
];

/// Build the full drafting prompt for `query`.
pub fn build_prompt(query: &str, context: &[SearchResult], rules: &RulesConfig) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Draft one priced construction budget component for:");
    let _ = writeln!(prompt, "\"{}\"", query.trim());
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "## Comparable historical components");
    let _ = writeln!(
        prompt,
        "Use these as patterns for realistic values. Do not copy them."
    );
    let context_json = serde_json::to_string_pretty(&context_rows(context)).unwrap_or_default();
    let _ = writeln!(prompt, "{}", context_json);
    let _ = writeln!(prompt);

    prompt.push_str(&rule_sheet(rules));
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "## Output");
    let _ = writeln!(
        prompt,
        "Reply with one JSON object and nothing else. Fields: {}.",
        DRAFT_FIELDS.join(", ")
    );
    let _ = writeln!(prompt, "Set task_text to \"{}\".", query.trim());
    let _ = writeln!(
        prompt,
        "All numeric fields are plain numbers; use 0 for anything that does not apply."
    );

    prompt
}

/// The pricing rules, rendered from the active configuration.
pub fn rule_sheet(rules: &RulesConfig) -> String {
    let mut sheet = String::new();

    let _ = writeln!(sheet, "## Pricing rules");
    let _ = writeln!(sheet, "Formulas (always recompute):");
    let _ = writeln!(sheet, "- labor_cost = labor_hours * hourly_rate");
    let _ = writeln!(
        sheet,
        "- material_sale_price = material_cost * (1 + material_markup_pct / 100)"
    );
    let _ = writeln!(
        sheet,
        "- subcontract_sale_price = subcontract_cost * (1 + subcontract_markup_pct / 100)"
    );
    let _ = writeln!(
        sheet,
        "- total_price = admin_fee + labor_cost + material_sale_price + subcontract_sale_price"
    );
    let _ = writeln!(sheet);

    let _ = writeln!(sheet, "Trade:");
    let _ = writeln!(
        sheet,
        "- trade \"{}\" is in-house work: subcontract_cost, subcontract_markup_pct and subcontract_sale_price are 0",
        rules.in_house_trade
    );
    let _ = writeln!(sheet, "- any other trade may carry subcontractor costs");
    let _ = writeln!(sheet);

    let _ = writeln!(sheet, "Hourly rates:");
    let _ = writeln!(
        sheet,
        "- {} DKK/hour for {}",
        rules.demolition_hourly_rate,
        rules.demolition_categories.join(" / ")
    );
    let _ = writeln!(
        sheet,
        "- {} DKK/hour for every other category",
        rules.standard_hourly_rate
    );
    let _ = writeln!(sheet);

    let _ = writeln!(sheet, "Material markup:");
    let _ = writeln!(
        sheet,
        "- at least {}%; use {}% when unsure",
        rules.material_markup_floor_pct, rules.material_markup_default_pct
    );
    let _ = writeln!(sheet, "- 0% when there are no materials");
    let _ = writeln!(sheet);

    let _ = writeln!(
        sheet,
        "Administrative categories ({}):",
        rules.administrative_categories.join(" / ")
    );
    let _ = writeln!(sheet, "- only admin_fee is priced; every other cost field is 0");
    let _ = writeln!(
        sheet,
        "- exception: if the task mentions {}, it is a flat-fee service. admin_fee and all cost fields are 0 and total_price is a flat fee estimated from the comparable components",
        quoted_list(&rules.flat_fee_keywords)
    );

    sheet
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|k| format!("'{}'", k))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Context components as the model sees them.
fn context_rows(context: &[SearchResult]) -> Vec<Value> {
    context
        .iter()
        .map(|r| {
            let c = &r.component;
            json!({
                "task_text": c.task_text,
                "category": c.category,
                "trade": c.trade,
                "admin_fee": c.admin_fee.unwrap_or(0.0),
                "labor_hours": c.labor_hours.unwrap_or(0.0),
                "hourly_rate": c.hourly_rate.unwrap_or(0.0),
                "labor_cost": c.labor_cost.unwrap_or(0.0),
                "material_cost": c.material_cost.unwrap_or(0.0),
                "material_markup_pct": c.material_markup_pct.unwrap_or(0.0),
                "material_sale_price": c.material_sale_price.unwrap_or(0.0),
                "subcontract_cost": c.subcontract_cost.unwrap_or(0.0),
                "subcontract_markup_pct": c.subcontract_markup_pct.unwrap_or(0.0),
                "subcontract_sale_price": c.subcontract_sale_price.unwrap_or(0.0),
                "total_price": c.total(),
                "quality_score": r.quality_score,
                "similarity_score": r.similarity_score,
                "source_id": c.source_id,
            })
        })
        .collect()
}
