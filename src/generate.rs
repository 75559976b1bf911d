//! Retrieval-augmented component generation.
//!
//! One request runs four steps:
//!
//! 1. **Context selection**: search with the high-quality floor first and
//!    fall back to the full collection when nothing qualifies.
//! 2. **Prompt**: rule sheet, context, and query (see [`crate::prompt`]).
//! 3. **Completion**: exactly one provider call; no retries.
//! 4. **Extraction and enforcement**: pull the first JSON object out of
//!    the reply, run the rule pipeline, and attach traceability.
//!
//! Failures are [`GenerationError`]s. Nothing is retried.

use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::GenerationError;
use crate::llm::{CompletionProvider, CompletionRequest};
use crate::models::{ContextQuality, DraftComponent, GeneratedComponent};
use crate::prompt;
use crate::rules::{self, ContextTrace, RuleEngine};
use crate::search::ComponentSearch;

/// Drafts components from a search snapshot and configuration.
pub struct Generator<'a> {
    search: &'a ComponentSearch,
    config: &'a Config,
}

impl<'a> Generator<'a> {
    pub fn new(search: &'a ComponentSearch, config: &'a Config) -> Self {
        Self { search, config }
    }

    /// Pick the context set for `query`.
    ///
    /// With `use_high_quality_only`, components below the high-quality
    /// floor are excluded unless that leaves nothing, in which case the
    /// whole collection is searched and the context is tagged mixed.
    pub fn select_context(
        &self,
        query: &str,
        use_high_quality_only: bool,
    ) -> Result<ContextTrace, GenerationError> {
        let retrieval = &self.config.retrieval;

        if use_high_quality_only {
            let components = self.search.search(
                query,
                retrieval.top_k,
                retrieval.min_similarity,
                retrieval.high_quality_floor,
            );
            if !components.is_empty() {
                return Ok(ContextTrace {
                    quality: ContextQuality::High,
                    source: format!("high-quality ({} components)", components.len()),
                    components,
                });
            }
            debug!(query, "no high-quality context; falling back to full database");
        }

        let components = self
            .search
            .search(query, retrieval.top_k, retrieval.min_similarity, 0.0);
        if components.is_empty() {
            return Err(GenerationError::NoComparableContext {
                query: query.to_string(),
            });
        }
        Ok(ContextTrace {
            quality: ContextQuality::Mixed,
            source: format!(
                "full database ({} components, quality may vary)",
                components.len()
            ),
            components,
        })
    }

    /// Generate one priced component for `query`.
    pub fn generate(
        &self,
        query: &str,
        use_high_quality_only: bool,
        provider: &dyn CompletionProvider,
    ) -> Result<GeneratedComponent, GenerationError> {
        let trace = self.select_context(query, use_high_quality_only)?;
        info!(
            query,
            context = trace.components.len(),
            quality = trace.quality.as_str(),
            model = provider.model_name(),
            "generating component"
        );

        let prompt = prompt::build_prompt(query, &trace.components, &self.config.rules);
        let request = CompletionRequest {
            prompt: &prompt,
            temperature: self.config.llm.temperature,
            max_tokens: self.config.llm.max_tokens,
        };
        let reply = provider
            .complete(&request)
            .map_err(|e| GenerationError::Completion(format!("{:#}", e)))?;

        let mut draft = extract_draft(&reply)?;
        let report =
            RuleEngine::new(&self.config.rules).enforce(&mut draft, query, &trace.components);
        debug!(
            adjustments = report.adjustments().count(),
            flat_fee = report.flat_fee,
            "rules enforced"
        );

        Ok(rules::finalize(draft, report, query, trace))
    }
}

/// Extract the draft record from a completion reply.
///
/// A fenced ```` ```json ```` block wins when present; otherwise the first
/// well-formed JSON object anywhere in the text is used.
pub fn extract_draft(reply: &str) -> Result<DraftComponent, GenerationError> {
    if reply.trim().is_empty() {
        return Err(malformed("empty reply"));
    }

    let object = fenced_block(reply)
        .and_then(first_object)
        .or_else(|| first_object(reply))
        .ok_or_else(|| malformed("no JSON object in reply"))?;

    serde_json::from_value(object).map_err(|e| malformed(&e.to_string()))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// First `{` that starts a complete JSON object.
fn first_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(i, _)| {
        let mut values = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

fn malformed(reason: &str) -> GenerationError {
    GenerationError::MalformedCompletion {
        reason: reason.to_string(),
    }
}
