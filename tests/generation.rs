use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use budget_harness::config::Config;
use budget_harness::error::GenerationError;
use budget_harness::llm::{CompletionProvider, CompletionRequest};
use budget_harness::models::ContextQuality;
use budget_harness::service::BudgetService;
use tempfile::TempDir;

/// Replies with a fixed text and records every prompt it receives.
struct ScriptedProvider {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl CompletionProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => bail!("connection reset"),
        }
    }
}

const DEMOLITION_COLLECTION: &str = r#"{"components": [
    {"task_text": "demolition of wall tiles in bathroom", "category": "Demolition", "trade": "in-house",
     "labor_hours": 8, "hourly_rate": 500, "labor_cost": 4000, "material_cost": 0,
     "material_markup_pct": 0, "subcontract_markup_pct": 0, "total_price": 4000, "source_id": "villa_2023"},
    {"task_text": "demolition of floor tiles", "category": "Demolition", "trade": "in-house",
     "labor_hours": 6, "hourly_rate": 500, "labor_cost": 3000, "material_cost": 0,
     "material_markup_pct": 0, "subcontract_markup_pct": 0, "total_price": 3000, "source_id": "villa_2023"}
]}"#;

const PICKUP_COLLECTION: &str = r#"[
    {"Opgave": "big bag waste pickup", "kategori": "Service", "Fag": "Hauler", "Tilbud": 5850},
    {"Opgave": "waste container pickup", "kategori": "Service", "Fag": "Hauler", "Tilbud": 7020},
    {"Opgave": "paint ceiling", "kategori": "Painting", "Fag": "Painters", "Tilbud": 3000}
]"#;

fn service_with(collection: &str) -> (TempDir, BudgetService) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("components.json");
    fs::write(&path, collection).unwrap();
    let service = BudgetService::open(Config::for_components(&path));
    (tmp, service)
}

#[test]
fn test_demolition_draft_is_corrected() {
    let (_tmp, service) = service_with(DEMOLITION_COLLECTION);
    let provider = ScriptedProvider::replying(
        r#"Here you go:
```json
{"task_text": "demolition of wall tiles", "category": "Demolition", "trade": "in-house",
 "admin_fee": 0, "labor_hours": 10, "hourly_rate": 650, "labor_cost": 6500,
 "material_cost": 0, "material_markup_pct": 20,
 "subcontract_cost": 1200, "subcontract_markup_pct": 15, "subcontract_sale_price": 1380,
 "total_price": 9000}
```"#,
    );

    let generated = service
        .generate("demolition of wall tiles", true, &provider)
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(generated.context_quality, ContextQuality::High);
    assert_eq!(generated.context_source, "high-quality (2 components)");
    assert_eq!(generated.context_components_used.len(), 2);

    assert_eq!(generated.trade, "in-house");
    assert_eq!(generated.subcontract_cost, 0.0);
    assert_eq!(generated.subcontract_markup_pct, 0.0);
    assert_eq!(generated.subcontract_sale_price, 0.0);
    assert_eq!(generated.hourly_rate, 500.0);
    assert_eq!(generated.labor_cost, 5000.0);
    assert_eq!(generated.material_markup_pct, 0.0);
    assert_eq!(generated.total_price, generated.labor_cost);
    assert!(!generated.flat_fee);
    assert!(!generated.enforcement.is_compliant());
}

#[test]
fn test_flat_fee_pickup_uses_context_average() {
    let (_tmp, service) = service_with(PICKUP_COLLECTION);
    let provider = ScriptedProvider::replying(
        r#"{"category": "Service", "trade": "Hauler", "admin_fee": 500,
            "labor_hours": 2, "hourly_rate": 585, "material_cost": 100, "total_price": 0}"#,
    );

    let generated = service
        .generate("big bag waste pickup", true, &provider)
        .unwrap();

    assert!(generated.flat_fee);
    assert_eq!(generated.enforcement.flat_fee_keyword.as_deref(), Some("big bag"));
    assert_eq!(generated.admin_fee, 0.0);
    assert_eq!(generated.labor_hours, 0.0);
    assert_eq!(generated.hourly_rate, 0.0);
    assert_eq!(generated.labor_cost, 0.0);
    assert_eq!(generated.material_cost, 0.0);
    assert_eq!(generated.material_sale_price, 0.0);
    assert_eq!(generated.subcontract_sale_price, 0.0);
    assert_eq!(generated.total_price, 6435.0);
    assert_eq!(generated.task_text, "big bag waste pickup");
}

#[test]
fn test_low_quality_collection_falls_back_to_mixed() {
    let (_tmp, service) = service_with(PICKUP_COLLECTION);
    let provider = ScriptedProvider::replying(r#"{"category": "Service", "total_price": 6000}"#);

    let generated = service.generate("waste pickup", true, &provider).unwrap();

    assert_eq!(generated.context_quality, ContextQuality::Mixed);
    assert!(generated
        .context_source
        .starts_with("full database (2 components"));
    assert!(generated
        .context_components_used
        .iter()
        .all(|r| r.component.category == "Service"));
}

#[test]
fn test_all_quality_skips_high_quality_attempt() {
    let (_tmp, service) = service_with(DEMOLITION_COLLECTION);
    let provider = ScriptedProvider::replying(r#"{"category": "Demolition", "trade": "in-house"}"#);

    let generated = service
        .generate("demolition of wall tiles", false, &provider)
        .unwrap();

    assert_eq!(generated.context_quality, ContextQuality::Mixed);
}

#[test]
fn test_prompt_carries_rules_and_context() {
    let (_tmp, service) = service_with(DEMOLITION_COLLECTION);
    let provider = ScriptedProvider::replying("{}");

    service
        .generate("demolition of wall tiles", true, &provider)
        .unwrap();

    let prompt = provider.last_prompt();
    assert!(prompt.contains("demolition of wall tiles in bathroom"));
    assert!(prompt.contains("labor_cost = labor_hours * hourly_rate"));
    assert!(prompt.contains("trade \"in-house\" is in-house work"));
}

#[test]
fn test_no_context_fails_without_calling_provider() {
    let (_tmp, service) = service_with(DEMOLITION_COLLECTION);
    let provider = ScriptedProvider::replying("{}");

    let err = service.generate("zzz qqq", true, &provider).unwrap_err();

    assert_eq!(
        err,
        GenerationError::NoComparableContext {
            query: "zzz qqq".to_string()
        }
    );
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_malformed_reply_is_an_error() {
    let (_tmp, service) = service_with(DEMOLITION_COLLECTION);

    let prose = ScriptedProvider::replying("I would estimate about 4000 DKK.");
    assert!(matches!(
        service.generate("demolition of wall tiles", true, &prose),
        Err(GenerationError::MalformedCompletion { .. })
    ));

    let empty = ScriptedProvider::replying("");
    assert!(matches!(
        service.generate("demolition of wall tiles", true, &empty),
        Err(GenerationError::MalformedCompletion { .. })
    ));
    assert_eq!(empty.calls(), 1);
}

#[test]
fn test_transport_failure_is_not_retried() {
    let (_tmp, service) = service_with(DEMOLITION_COLLECTION);
    let provider = ScriptedProvider::failing();

    let err = service
        .generate("demolition of wall tiles", true, &provider)
        .unwrap_err();

    assert!(matches!(err, GenerationError::Completion(ref msg) if msg.contains("connection reset")));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn test_repeated_search_is_identical() {
    let (_tmp, service) = service_with(PICKUP_COLLECTION);
    let first = service.search("waste pickup", 5, 0.0, 0.0);
    let second = service.search("waste pickup", 5, 0.0, 0.0);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}
