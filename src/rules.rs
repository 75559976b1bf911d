//! Rule enforcement for drafted components.
//!
//! The completion service only proposes a component. This module is the
//! sole authority for arithmetic and trade/category policy: it rewrites a
//! [`DraftComponent`] in place through a fixed sequence of passes, each of
//! which may read fields set by an earlier one.
//!
//! | # | Pass | Effect |
//! |---|------|--------|
//! | 1 | labor cost | `labor_cost = hours × rate` when both are present |
//! | 2 | material markup | no materials ⇒ markup and sale price 0; markup below floor ⇒ default; recompute sale price |
//! | 3 | subcontract | recompute sale price from cost and markup, or 0 without cost |
//! | 4 | trade | in-house work carries no subcontract fields |
//! | 5 | labor rate | hours > 0 ⇒ category default rate, recompute labor cost |
//! | 6 | category | administrative categories keep only the admin fee, or only a flat fee when the query names a flat-fee service |
//! | 7 | total | `admin + labor + material sale + subcontract sale`, skipped for flat fees |
//!
//! Traceability metadata is attached afterwards by [`finalize`], which does
//! not touch pricing.
//!
//! The pipeline is total (absent numbers read as zero) and idempotent:
//! enforcing an already compliant draft reports every pass as unchanged
//! or skipped.

use serde::Serialize;
use tracing::debug;

use crate::config::RulesConfig;
use crate::models::{ContextQuality, DraftComponent, GeneratedComponent, SearchResult};

/// One field rewrite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adjustment {
    pub field: &'static str,
    pub from: Option<f64>,
    pub to: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    LaborCost,
    MaterialMarkup,
    SubcontractCost,
    TradeRule,
    DefaultLaborRate,
    CategoryRule,
    FinalTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PassOutcome {
    Unchanged,
    Adjusted(Vec<Adjustment>),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassRecord {
    pub pass: Pass,
    pub outcome: PassOutcome,
}

/// What the pipeline did to one draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnforcementReport {
    pub passes: Vec<PassRecord>,
    /// True when the flat-fee exception applied and the total was kept.
    pub flat_fee: bool,
    /// The query keyword that triggered the flat-fee exception.
    pub flat_fee_keyword: Option<String>,
}

impl EnforcementReport {
    pub fn adjustments(&self) -> impl Iterator<Item = &Adjustment> {
        self.passes.iter().flat_map(|p| match &p.outcome {
            PassOutcome::Adjusted(changes) => changes.as_slice(),
            _ => &[][..],
        })
    }

    /// True when no pass had to rewrite anything.
    pub fn is_compliant(&self) -> bool {
        self.adjustments().next().is_none()
    }

    pub fn outcome(&self, pass: Pass) -> Option<&PassOutcome> {
        self.passes
            .iter()
            .find(|p| p.pass == pass)
            .map(|p| &p.outcome)
    }
}

/// Applies [`RulesConfig`] policy to drafts.
pub struct RuleEngine<'a> {
    rules: &'a RulesConfig,
}

impl<'a> RuleEngine<'a> {
    pub fn new(rules: &'a RulesConfig) -> Self {
        Self { rules }
    }

    /// Run every pass over `draft`. `query` drives the flat-fee keyword
    /// check; `context` supplies the fallback flat fee.
    pub fn enforce(
        &self,
        draft: &mut DraftComponent,
        query: &str,
        context: &[SearchResult],
    ) -> EnforcementReport {
        let mut report = EnforcementReport::default();

        let outcome = labor_cost(draft);
        record(&mut report, Pass::LaborCost, outcome);

        let outcome = self.material_markup(draft);
        record(&mut report, Pass::MaterialMarkup, outcome);

        let outcome = subcontract_cost(draft);
        record(&mut report, Pass::SubcontractCost, outcome);

        let outcome = self.trade_rule(draft);
        record(&mut report, Pass::TradeRule, outcome);

        let outcome = self.default_labor_rate(draft);
        record(&mut report, Pass::DefaultLaborRate, outcome);

        let outcome = self.category_rule(draft, query, context, &mut report);
        record(&mut report, Pass::CategoryRule, outcome);

        let outcome = if report.flat_fee {
            PassOutcome::Skipped("flat fee keeps its total".to_string())
        } else {
            final_total(draft)
        };
        record(&mut report, Pass::FinalTotal, outcome);

        report
    }

    fn material_markup(&self, draft: &mut DraftComponent) -> PassOutcome {
        let mut changes = Vec::new();
        let material = amount(draft.material_cost);

        if material == 0.0 {
            set(&mut changes, "material_markup_pct", &mut draft.material_markup_pct, 0.0);
            set(&mut changes, "material_sale_price", &mut draft.material_sale_price, 0.0);
            return outcome(changes);
        }

        if amount(draft.material_markup_pct) < self.rules.material_markup_floor_pct {
            set(
                &mut changes,
                "material_markup_pct",
                &mut draft.material_markup_pct,
                self.rules.material_markup_default_pct,
            );
        }
        let sale = material * (1.0 + amount(draft.material_markup_pct) / 100.0);
        set(&mut changes, "material_sale_price", &mut draft.material_sale_price, sale);
        outcome(changes)
    }

    fn trade_rule(&self, draft: &mut DraftComponent) -> PassOutcome {
        let trade = draft.trade.as_deref().unwrap_or_default();
        if !self.rules.is_in_house(trade) {
            return PassOutcome::Skipped(format!("trade '{}' may subcontract", trade));
        }
        let mut changes = Vec::new();
        set(&mut changes, "subcontract_cost", &mut draft.subcontract_cost, 0.0);
        set(&mut changes, "subcontract_markup_pct", &mut draft.subcontract_markup_pct, 0.0);
        set(&mut changes, "subcontract_sale_price", &mut draft.subcontract_sale_price, 0.0);
        outcome(changes)
    }

    fn default_labor_rate(&self, draft: &mut DraftComponent) -> PassOutcome {
        let hours = amount(draft.labor_hours);
        if hours <= 0.0 {
            return PassOutcome::Skipped("no labor hours".to_string());
        }
        let category = draft.category.as_deref().unwrap_or_default();
        let rate = self.rules.default_rate_for(category);

        let mut changes = Vec::new();
        set(&mut changes, "hourly_rate", &mut draft.hourly_rate, rate);
        set(&mut changes, "labor_cost", &mut draft.labor_cost, hours * rate);
        outcome(changes)
    }

    fn category_rule(
        &self,
        draft: &mut DraftComponent,
        query: &str,
        context: &[SearchResult],
        report: &mut EnforcementReport,
    ) -> PassOutcome {
        let category = draft.category.as_deref().unwrap_or_default();
        if !self.rules.is_administrative(category) {
            return PassOutcome::Skipped(format!("category '{}' is not administrative", category));
        }

        let mut changes = Vec::new();

        if let Some(keyword) = self.rules.flat_fee_keyword(query) {
            report.flat_fee = true;
            report.flat_fee_keyword = Some(keyword.to_string());

            set(&mut changes, "admin_fee", &mut draft.admin_fee, 0.0);
            zero_cost_structure(draft, &mut changes);

            if amount(draft.total_price) == 0.0 {
                if let Some(fee) = context_flat_fee(context) {
                    set(&mut changes, "total_price", &mut draft.total_price, fee);
                }
            }
        } else {
            zero_cost_structure(draft, &mut changes);
        }

        outcome(changes)
    }
}

fn labor_cost(draft: &mut DraftComponent) -> PassOutcome {
    match (draft.labor_hours, draft.hourly_rate) {
        (Some(hours), Some(rate)) => {
            let mut changes = Vec::new();
            set(&mut changes, "labor_cost", &mut draft.labor_cost, hours * rate);
            outcome(changes)
        }
        _ => PassOutcome::Skipped("hours or rate missing".to_string()),
    }
}

fn subcontract_cost(draft: &mut DraftComponent) -> PassOutcome {
    let cost = amount(draft.subcontract_cost);
    let sale = if cost > 0.0 {
        cost * (1.0 + amount(draft.subcontract_markup_pct) / 100.0)
    } else {
        0.0
    };
    let mut changes = Vec::new();
    set(&mut changes, "subcontract_sale_price", &mut draft.subcontract_sale_price, sale);
    outcome(changes)
}

fn final_total(draft: &mut DraftComponent) -> PassOutcome {
    let total = amount(draft.admin_fee)
        + amount(draft.labor_cost)
        + amount(draft.material_sale_price)
        + amount(draft.subcontract_sale_price);
    let mut changes = Vec::new();
    set(&mut changes, "total_price", &mut draft.total_price, total);
    outcome(changes)
}

/// Everything except the admin fee and total.
fn zero_cost_structure(draft: &mut DraftComponent, changes: &mut Vec<Adjustment>) {
    set(changes, "labor_hours", &mut draft.labor_hours, 0.0);
    set(changes, "hourly_rate", &mut draft.hourly_rate, 0.0);
    set(changes, "labor_cost", &mut draft.labor_cost, 0.0);
    set(changes, "material_cost", &mut draft.material_cost, 0.0);
    set(changes, "material_markup_pct", &mut draft.material_markup_pct, 0.0);
    set(changes, "material_sale_price", &mut draft.material_sale_price, 0.0);
    set(changes, "subcontract_cost", &mut draft.subcontract_cost, 0.0);
    set(changes, "subcontract_markup_pct", &mut draft.subcontract_markup_pct, 0.0);
    set(changes, "subcontract_sale_price", &mut draft.subcontract_sale_price, 0.0);
}

/// Rounded mean of the positive context totals.
fn context_flat_fee(context: &[SearchResult]) -> Option<f64> {
    let totals: Vec<f64> = context
        .iter()
        .map(|r| r.component.total())
        .filter(|t| *t > 0.0)
        .collect();
    if totals.is_empty() {
        return None;
    }
    Some((totals.iter().sum::<f64>() / totals.len() as f64).round())
}

fn amount(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

fn set(changes: &mut Vec<Adjustment>, field: &'static str, slot: &mut Option<f64>, value: f64) {
    if *slot == Some(value) {
        return;
    }
    debug!(field, from = ?slot, to = value, "rule adjustment");
    changes.push(Adjustment {
        field,
        from: *slot,
        to: value,
    });
    *slot = Some(value);
}

fn outcome(changes: Vec<Adjustment>) -> PassOutcome {
    if changes.is_empty() {
        PassOutcome::Unchanged
    } else {
        PassOutcome::Adjusted(changes)
    }
}

fn record(report: &mut EnforcementReport, pass: Pass, outcome: PassOutcome) {
    report.passes.push(PassRecord { pass, outcome });
}

/// How the context set for a generation was chosen.
#[derive(Debug, Clone)]
pub struct ContextTrace {
    pub quality: ContextQuality,
    pub source: String,
    pub components: Vec<SearchResult>,
}

/// Attach traceability and freeze the enforced draft.
///
/// Absent numbers become zero; the task falls back to `query`.
pub fn finalize(
    draft: DraftComponent,
    report: EnforcementReport,
    query: &str,
    trace: ContextTrace,
) -> GeneratedComponent {
    let task_text = draft
        .task_text
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| query.to_string());

    GeneratedComponent {
        task_text,
        category: draft.category.unwrap_or_default(),
        trade: draft.trade.unwrap_or_default(),
        admin_fee: amount(draft.admin_fee),
        labor_hours: amount(draft.labor_hours),
        hourly_rate: amount(draft.hourly_rate),
        labor_cost: amount(draft.labor_cost),
        material_cost: amount(draft.material_cost),
        material_markup_pct: amount(draft.material_markup_pct),
        material_sale_price: amount(draft.material_sale_price),
        subcontract_cost: amount(draft.subcontract_cost),
        subcontract_markup_pct: amount(draft.subcontract_markup_pct),
        subcontract_sale_price: amount(draft.subcontract_sale_price),
        total_price: amount(draft.total_price),
        flat_fee: report.flat_fee,
        context_quality: trace.quality,
        context_source: trace.source,
        context_components_used: trace.components,
        enforcement: report,
    }
}
