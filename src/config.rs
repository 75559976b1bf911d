//! TOML configuration.
//!
//! Only `[data]` is required. Every other section has defaults that match
//! the pricing policy the rule pipeline enforces.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Historical component collection (JSON).
    pub components: PathBuf,
    /// Vector cache file. Defaults to `component_vectors.json` beside the collection.
    #[serde(default)]
    pub cache: Option<PathBuf>,
}

impl DataConfig {
    pub fn cache_path(&self) -> PathBuf {
        match &self.cache {
            Some(path) => path.clone(),
            None => self
                .components
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("component_vectors.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_high_quality_floor")]
    pub high_quality_floor: f64,
    #[serde(default = "default_summary_top_k")]
    pub summary_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            high_quality_floor: default_high_quality_floor(),
            summary_top_k: default_summary_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_similarity() -> f64 {
    0.2
}
fn default_high_quality_floor() -> f64 {
    1.0
}
fn default_summary_top_k() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> usize {
    800
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Pricing policy shared by the prompt rule sheet and the rule pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct RulesConfig {
    /// Trade name for work done without a subcontractor.
    #[serde(default = "default_in_house_trade")]
    pub in_house_trade: String,
    #[serde(default = "default_markup_floor")]
    pub material_markup_floor_pct: f64,
    #[serde(default = "default_markup_default")]
    pub material_markup_default_pct: f64,
    #[serde(default = "default_demolition_rate")]
    pub demolition_hourly_rate: f64,
    #[serde(default = "default_standard_rate")]
    pub standard_hourly_rate: f64,
    #[serde(default = "default_demolition_categories")]
    pub demolition_categories: Vec<String>,
    #[serde(default = "default_administrative_categories")]
    pub administrative_categories: Vec<String>,
    #[serde(default = "default_flat_fee_keywords")]
    pub flat_fee_keywords: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            in_house_trade: default_in_house_trade(),
            material_markup_floor_pct: default_markup_floor(),
            material_markup_default_pct: default_markup_default(),
            demolition_hourly_rate: default_demolition_rate(),
            standard_hourly_rate: default_standard_rate(),
            demolition_categories: default_demolition_categories(),
            administrative_categories: default_administrative_categories(),
            flat_fee_keywords: default_flat_fee_keywords(),
        }
    }
}

impl RulesConfig {
    pub fn is_in_house(&self, trade: &str) -> bool {
        trade.trim().eq_ignore_ascii_case(self.in_house_trade.trim())
    }

    pub fn is_demolition(&self, category: &str) -> bool {
        contains_ignore_case(&self.demolition_categories, category)
    }

    pub fn is_administrative(&self, category: &str) -> bool {
        contains_ignore_case(&self.administrative_categories, category)
    }

    /// Hourly rate enforced for labor in `category`.
    pub fn default_rate_for(&self, category: &str) -> f64 {
        if self.is_demolition(category) {
            self.demolition_hourly_rate
        } else {
            self.standard_hourly_rate
        }
    }

    /// First flat-fee keyword found in `query`, matched as a lower-cased substring.
    pub fn flat_fee_keyword(&self, query: &str) -> Option<&str> {
        let query = query.to_lowercase();
        self.flat_fee_keywords
            .iter()
            .find(|k| !k.trim().is_empty() && query.contains(&k.to_lowercase()))
            .map(|k| k.as_str())
    }
}

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    let value = value.trim().to_lowercase();
    list.iter().any(|c| c.trim().to_lowercase() == value)
}

fn default_in_house_trade() -> String {
    "in-house".to_string()
}
fn default_markup_floor() -> f64 {
    15.0
}
fn default_markup_default() -> f64 {
    17.0
}
fn default_demolition_rate() -> f64 {
    500.0
}
fn default_standard_rate() -> f64 {
    585.0
}
fn default_demolition_categories() -> Vec<String> {
    vec!["Demolition".to_string(), "Nedrivning".to_string()]
}
fn default_administrative_categories() -> Vec<String> {
    vec![
        "Project".to_string(),
        "Projekt".to_string(),
        "Service".to_string(),
    ]
}
fn default_flat_fee_keywords() -> Vec<String> {
    [
        "afhentning",
        "affald",
        "garbage",
        "big bag",
        "waste",
        "pickup",
        "disposal",
        "collection",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

impl Config {
    /// Config pointing at a collection with every other section defaulted.
    pub fn for_components(path: &Path) -> Self {
        Self {
            data: DataConfig {
                components: path.to_path_buf(),
                cache: None,
            },
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.summary_top_k == 0 {
        anyhow::bail!("retrieval.summary_top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.min_similarity) {
        anyhow::bail!("retrieval.min_similarity must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.retrieval.high_quality_floor) {
        anyhow::bail!("retrieval.high_quality_floor must be in [0.0, 1.0]");
    }

    // Rules
    let rules = &config.rules;
    if rules.material_markup_floor_pct < 0.0 {
        anyhow::bail!("rules.material_markup_floor_pct must be >= 0");
    }
    if rules.material_markup_default_pct < rules.material_markup_floor_pct {
        anyhow::bail!("rules.material_markup_default_pct must be >= rules.material_markup_floor_pct");
    }
    if rules.demolition_hourly_rate <= 0.0 || rules.standard_hourly_rate <= 0.0 {
        anyhow::bail!("rules hourly rates must be > 0");
    }
    if rules.in_house_trade.trim().is_empty() {
        anyhow::bail!("rules.in_house_trade must not be empty");
    }

    // LLM
    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.llm.is_enabled() && config.llm.model.trim().is_empty() {
        anyhow::bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = parse("[data]\ncomponents = \"kb/components.json\"\n").unwrap();
        assert_eq!(cfg.retrieval.top_k, 5);
        assert!((cfg.retrieval.min_similarity - 0.2).abs() < 1e-12);
        assert_eq!(cfg.llm.provider, "disabled");
        assert!(!cfg.llm.is_enabled());
        assert_eq!(cfg.rules.material_markup_default_pct, 17.0);
        assert_eq!(
            cfg.data.cache_path(),
            PathBuf::from("kb/component_vectors.json")
        );
    }

    #[test]
    fn test_explicit_cache_path() {
        let cfg = parse("[data]\ncomponents = \"a.json\"\ncache = \"/tmp/v.json\"\n").unwrap();
        assert_eq!(cfg.data.cache_path(), PathBuf::from("/tmp/v.json"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse("[data]\ncomponents = \"a.json\"\n[llm]\nprovider = \"magic\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn test_rejects_markup_default_below_floor() {
        let src = "[data]\ncomponents = \"a.json\"\n[rules]\nmaterial_markup_floor_pct = 20\nmaterial_markup_default_pct = 17\n";
        assert!(parse(src).is_err());
    }

    #[test]
    fn test_rejects_zero_top_k() {
        assert!(parse("[data]\ncomponents = \"a.json\"\n[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = parse(include_str!("../config/budget.example.toml")).unwrap();
        assert_eq!(cfg.rules.flat_fee_keywords.len(), 8);
        assert_eq!(cfg.rules.material_markup_floor_pct, 15.0);
    }

    #[test]
    fn test_rule_lookups_ignore_case() {
        let rules = RulesConfig::default();
        assert!(rules.is_in_house("In-House"));
        assert!(rules.is_demolition("nedrivning"));
        assert!(rules.is_administrative("PROJECT"));
        assert_eq!(rules.default_rate_for("Demolition"), 500.0);
        assert_eq!(rules.default_rate_for("Tiling"), 585.0);
        assert_eq!(
            rules.flat_fee_keyword("Weekly WASTE pickup at site"),
            Some("waste")
        );
        assert_eq!(rules.flat_fee_keyword("tile the bathroom"), None);
    }
}
