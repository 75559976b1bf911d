//! Core data models used throughout Budget Harness.
//!
//! These types represent the historical components loaded from the cost
//! database, the ranked search results built over them, the untrusted draft
//! proposed by the completion service, and the final generated component
//! handed to export.
//!
//! Field names are English snake_case. The keys of the legacy unified
//! knowledge base (`Opgave`, `kategori`, `Fag`, `Tilbud`, ...) are accepted
//! as aliases so existing collections load without conversion.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::rules::EnforcementReport;

/// Provenance format of a historical record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    /// Structured, detailed pricing (`"new"` in legacy collections).
    #[default]
    #[serde(alias = "new")]
    Detailed,
    /// Summary record synthesized into the detailed schema (`"old"`).
    #[serde(alias = "old")]
    Legacy,
}

impl FormatTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Detailed => "detailed",
            FormatTag::Legacy => "legacy",
        }
    }
}

/// One priced line item from the historical cost database.
///
/// Pricing fields are optional: an absent field is different from a zero
/// field, and the quality scorer relies on that distinction. Numeric strings
/// are read as numbers and unreadable values as absent, so one malformed
/// record cannot fail the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalComponent {
    #[serde(default, alias = "Opgave")]
    pub task_text: String,
    #[serde(default, alias = "kategori")]
    pub category: String,
    #[serde(default, alias = "Fag")]
    pub trade: String,
    #[serde(
        default,
        alias = "Admin",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub admin_fee: Option<f64>,
    #[serde(
        default,
        alias = "Timer",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub labor_hours: Option<f64>,
    #[serde(
        default,
        alias = "Takst",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub hourly_rate: Option<f64>,
    #[serde(
        default,
        alias = "Kostpris_EP",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub labor_cost: Option<f64>,
    #[serde(
        default,
        alias = "Materialer",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub material_cost: Option<f64>,
    #[serde(
        default,
        alias = "Påslag_MAT",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub material_markup_pct: Option<f64>,
    #[serde(
        default,
        alias = "Salgspris_MAT",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub material_sale_price: Option<f64>,
    #[serde(
        default,
        alias = "UE",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub subcontract_cost: Option<f64>,
    #[serde(
        default,
        alias = "Påslag_UE",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub subcontract_markup_pct: Option<f64>,
    #[serde(
        default,
        alias = "Salgspris_UE",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub subcontract_sale_price: Option<f64>,
    #[serde(
        default,
        alias = "Tilbud",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_price: Option<f64>,
    #[serde(default, alias = "source_file")]
    pub source_id: String,
    #[serde(default, alias = "original_format")]
    pub format_tag: FormatTag,
}

impl HistoricalComponent {
    /// A detailed record with every field zeroed, for building fixtures.
    pub fn new(task_text: &str, category: &str, trade: &str) -> Self {
        Self {
            task_text: task_text.to_string(),
            category: category.to_string(),
            trade: trade.to_string(),
            admin_fee: None,
            labor_hours: None,
            hourly_rate: None,
            labor_cost: None,
            material_cost: None,
            material_markup_pct: None,
            material_sale_price: None,
            subcontract_cost: None,
            subcontract_markup_pct: None,
            subcontract_sale_price: None,
            total_price: None,
            source_id: String::new(),
            format_tag: FormatTag::Detailed,
        }
    }

    /// Final price, zero when absent.
    pub fn total(&self) -> f64 {
        self.total_price.unwrap_or(0.0)
    }
}

/// A historical component ranked against a query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Position of the component in the loaded collection.
    pub component_index: usize,
    /// Cosine similarity to the query, in `[0, 1]`.
    pub similarity_score: f64,
    /// Reliability score from the quality scorer, in `[0, 1]`.
    pub quality_score: f64,
    #[serde(flatten)]
    pub component: HistoricalComponent,
}

/// Which context set informed a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextQuality {
    High,
    Mixed,
}

impl ContextQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextQuality::High => "high",
            ContextQuality::Mixed => "mixed",
        }
    }
}

/// The untrusted record extracted from a completion.
///
/// Every numeric field tolerates being absent, `null`, or a numeric string;
/// anything else reads as absent. The rule pipeline works on this type in
/// place and treats absent numbers as zero where it needs a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftComponent {
    #[serde(default, alias = "Opgave", deserialize_with = "lenient_text")]
    pub task_text: Option<String>,
    #[serde(default, alias = "kategori", deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(default, alias = "Fag", deserialize_with = "lenient_text")]
    pub trade: Option<String>,
    #[serde(default, alias = "Admin", deserialize_with = "lenient_amount")]
    pub admin_fee: Option<f64>,
    #[serde(default, alias = "Timer", deserialize_with = "lenient_amount")]
    pub labor_hours: Option<f64>,
    #[serde(default, alias = "Takst", deserialize_with = "lenient_amount")]
    pub hourly_rate: Option<f64>,
    #[serde(default, alias = "Kostpris_EP", deserialize_with = "lenient_amount")]
    pub labor_cost: Option<f64>,
    #[serde(default, alias = "Materialer", deserialize_with = "lenient_amount")]
    pub material_cost: Option<f64>,
    #[serde(default, alias = "Påslag_MAT", deserialize_with = "lenient_amount")]
    pub material_markup_pct: Option<f64>,
    #[serde(default, alias = "Salgspris_MAT", deserialize_with = "lenient_amount")]
    pub material_sale_price: Option<f64>,
    #[serde(default, alias = "UE", deserialize_with = "lenient_amount")]
    pub subcontract_cost: Option<f64>,
    #[serde(default, alias = "Påslag_UE", deserialize_with = "lenient_amount")]
    pub subcontract_markup_pct: Option<f64>,
    #[serde(default, alias = "Salgspris_UE", deserialize_with = "lenient_amount")]
    pub subcontract_sale_price: Option<f64>,
    #[serde(default, alias = "Tilbud", deserialize_with = "lenient_amount")]
    pub total_price: Option<f64>,
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let amount = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(amount.filter(|v| v.is_finite()))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A priced component produced by generation and finalized by the rule
/// pipeline. Handed to export as-is; never mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedComponent {
    pub task_text: String,
    pub category: String,
    pub trade: String,
    pub admin_fee: f64,
    pub labor_hours: f64,
    pub hourly_rate: f64,
    pub labor_cost: f64,
    pub material_cost: f64,
    pub material_markup_pct: f64,
    pub material_sale_price: f64,
    pub subcontract_cost: f64,
    pub subcontract_markup_pct: f64,
    pub subcontract_sale_price: f64,
    pub total_price: f64,
    /// True when the flat-fee exception replaced the cost structure.
    pub flat_fee: bool,
    pub context_quality: ContextQuality,
    pub context_source: String,
    pub context_components_used: Vec<SearchResult>,
    pub enforcement: EnforcementReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_historical_accepts_legacy_keys() {
        let json = r#"{
            "Opgave": "Nedrivning af vægfliser",
            "kategori": "Nedrivning",
            "Fag": "Bnord",
            "Timer": 8,
            "Takst": 500,
            "Kostpris_EP": 4000,
            "Påslag_MAT": 0,
            "Tilbud": 4000,
            "source_file": "projekt_a",
            "original_format": "old"
        }"#;
        let c: HistoricalComponent = serde_json::from_str(json).unwrap();
        assert_eq!(c.task_text, "Nedrivning af vægfliser");
        assert_eq!(c.category, "Nedrivning");
        assert_eq!(c.labor_hours, Some(8.0));
        assert_eq!(c.material_cost, None);
        assert_eq!(c.format_tag, FormatTag::Legacy);
        assert_eq!(c.source_id, "projekt_a");
    }

    #[test]
    fn test_historical_defaults_to_detailed() {
        let c: HistoricalComponent =
            serde_json::from_str(r#"{"task_text": "paint walls"}"#).unwrap();
        assert_eq!(c.format_tag, FormatTag::Detailed);
        assert_eq!(c.total(), 0.0);
    }

    #[test]
    fn test_draft_lenient_numbers() {
        let json = r#"{
            "task_text": "tile floor",
            "labor_hours": "6.5",
            "hourly_rate": 585,
            "material_cost": null,
            "material_markup_pct": "lots",
            "total_price": [1, 2]
        }"#;
        let d: DraftComponent = serde_json::from_str(json).unwrap();
        assert_eq!(d.labor_hours, Some(6.5));
        assert_eq!(d.hourly_rate, Some(585.0));
        assert_eq!(d.material_cost, None);
        assert_eq!(d.material_markup_pct, None);
        assert_eq!(d.total_price, None);
        assert_eq!(d.admin_fee, None);
    }

    #[test]
    fn test_draft_legacy_keys() {
        let d: DraftComponent =
            serde_json::from_str(r#"{"Fag": "Bnord", "UE": 1200, "Påslag_UE": 20}"#).unwrap();
        assert_eq!(d.trade.as_deref(), Some("Bnord"));
        assert_eq!(d.subcontract_cost, Some(1200.0));
        assert_eq!(d.subcontract_markup_pct, Some(20.0));
    }
}
