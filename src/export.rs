//! Export generated components as JSON.
//!
//! The document carries the priced component, the context it was drafted
//! from, and the enforcement report, so a budget tool downstream can show
//! where every number came from.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::models::GeneratedComponent;

#[derive(Serialize)]
struct ExportDocument<'a> {
    query: &'a str,
    generated_at: DateTime<Utc>,
    component: &'a GeneratedComponent,
}

/// Render the export document.
pub fn to_json(query: &str, component: &GeneratedComponent) -> Result<String> {
    let doc = ExportDocument {
        query,
        generated_at: Utc::now(),
        component,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Write the export document.
///
/// If `output` is `Some`, writes to that file path, creating parent
/// directories. Otherwise writes to stdout for piping.
pub fn write_component(
    query: &str,
    component: &GeneratedComponent,
    output: Option<&Path>,
) -> Result<()> {
    let json = to_json(query, component)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
            }
            std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "Exported '{}' ({:.2} total) to {}",
                component.task_text,
                component.total_price,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContextQuality;
    use crate::rules::EnforcementReport;
    use tempfile::TempDir;

    fn component() -> GeneratedComponent {
        GeneratedComponent {
            task_text: "demolition of wall tiles".to_string(),
            category: "Demolition".to_string(),
            trade: "in-house".to_string(),
            admin_fee: 0.0,
            labor_hours: 8.0,
            hourly_rate: 500.0,
            labor_cost: 4000.0,
            material_cost: 0.0,
            material_markup_pct: 0.0,
            material_sale_price: 0.0,
            subcontract_cost: 0.0,
            subcontract_markup_pct: 0.0,
            subcontract_sale_price: 0.0,
            total_price: 4000.0,
            flat_fee: false,
            context_quality: ContextQuality::High,
            context_source: "high-quality (1 components)".to_string(),
            context_components_used: Vec::new(),
            enforcement: EnforcementReport::default(),
        }
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/nested/component.json");
        write_component("demolition of wall tiles", &component(), Some(&path)).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["query"], "demolition of wall tiles");
        assert_eq!(written["component"]["total_price"], 4000.0);
        assert_eq!(written["component"]["context_quality"], "high");
    }
}
