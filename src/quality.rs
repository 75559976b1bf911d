//! Reliability scoring for historical components.
//!
//! Scores are accumulated in tenths so the maximum is exactly `1.0`:
//!
//! | Check | Points |
//! |-------|--------|
//! | all structural pricing fields present | 4 |
//! | `material_cost + hours × rate` within 1.0 of `labor_cost` | 3 |
//! | both markups within `[0, 200]` | 2 |
//! | non-placeholder provenance | 1 |
//!
//! A record missing any structural field gets the flat basic score of 3
//! and the remaining checks are skipped.

use tracing::debug;

use crate::error::ScoringError;
use crate::models::HistoricalComponent;

/// Score for records that lack the detailed structure, and for failures.
pub const BASIC_QUALITY: f64 = 0.3;

const CONSISTENCY_TOLERANCE: f64 = 1.0;
const MAX_MARKUP_PCT: f64 = 200.0;
const PLACEHOLDER_SOURCES: &[&str] = &["", "n/a", "ai-genereret", "ai-generated"];

/// Reliability score in `[0, 1]`. Never fails.
pub fn quality_score(component: &HistoricalComponent) -> f64 {
    match try_quality_score(component) {
        Ok(score) => score,
        Err(e) => {
            debug!(task = %component.task_text, error = %e, "quality scoring failed");
            BASIC_QUALITY
        }
    }
}

fn try_quality_score(c: &HistoricalComponent) -> Result<f64, ScoringError> {
    let (labor_cost, material_cost, hours, rate, markup_mat, markup_ue) = match (
        c.labor_cost,
        c.material_cost,
        c.labor_hours,
        c.hourly_rate,
        c.material_markup_pct,
        c.subcontract_markup_pct,
    ) {
        (Some(lc), Some(mc), Some(h), Some(r), Some(mm), Some(mu)) => (lc, mc, h, r, mm, mu),
        _ => return Ok(BASIC_QUALITY),
    };

    finite("labor_cost", labor_cost)?;
    finite("material_cost", material_cost)?;
    finite("labor_hours", hours)?;
    finite("hourly_rate", rate)?;
    finite("material_markup_pct", markup_mat)?;
    finite("subcontract_markup_pct", markup_ue)?;

    let mut points: u8 = 4;

    let reconstructed = material_cost + hours * rate;
    if (reconstructed - labor_cost).abs() < CONSISTENCY_TOLERANCE {
        points += 3;
    }

    let sane = |pct: f64| (0.0..=MAX_MARKUP_PCT).contains(&pct);
    if sane(markup_mat) && sane(markup_ue) {
        points += 2;
    }

    let source = c.source_id.trim().to_lowercase();
    if !PLACEHOLDER_SOURCES.contains(&source.as_str()) {
        points += 1;
    }

    Ok((f64::from(points) / 10.0).min(1.0))
}

fn finite(field: &'static str, value: f64) -> Result<(), ScoringError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ScoringError::NonFinite { field })
    }
}
