//! CLI output: error mapping and human-readable reports.

use crate::error::EngineError;
use crate::health::HealthResult;
use crate::scheduler::Response;
use crate::session::SessionResult;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

/// Map engine errors to a string for CLI output.
pub fn map_error(e: &EngineError) -> String {
    match e {
        EngineError::ConfigError(msg) => format!("Configuration error: {}", msg),
        other => other.to_string(),
    }
}

pub fn format_health_report(result: &HealthResult) -> String {
    let mut out = String::new();
    let verdict = if result.is_healthy() {
        "healthy"
    } else if result.needs_immediate_recovery() {
        "needs immediate recovery"
    } else {
        "degraded"
    };
    out.push_str(&format!("Health score: {:.2} ({})\n", result.score, verdict));

    if result.indicators.is_empty() {
        out.push_str("No degradation indicators\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Indicator"]);
    for indicator in &result.indicators {
        table.add_row(vec![indicator.clone()]);
    }
    out.push_str(&format!("{}\n", table));

    out.push_str("Recommended actions:\n");
    for action in &result.recovery_actions {
        out.push_str(&format!("  - {}\n", action));
    }
    out
}

pub fn format_demo_report(response: &Response, session: &SessionResult, coherence: f64) -> String {
    let mut out = String::new();

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Stage", "Outcome", "Detail"]);
    table.add_row(vec![
        "Request".to_string(),
        if response.success { "ok" } else { "failed" }.to_string(),
        format!(
            "confidence {:.2}, {}ms",
            response.confidence, response.processing_time_ms
        ),
    ]);
    table.add_row(vec![
        "Session".to_string(),
        session.session.status.to_string(),
        format!(
            "{} ({}), {} findings",
            session.session.target,
            session.session.kind,
            session.findings.len()
        ),
    ]);
    table.add_row(vec![
        "Restore".to_string(),
        if session.context_restored { "restored" } else { "skipped" }.to_string(),
        format!("coherence {:.2}", coherence),
    ]);
    out.push_str(&format!("{}\n\n", table));

    out.push_str(&format!("Response: {}\n", response.content));
    if !session.recovery_steps.is_empty() {
        out.push_str("Restore steps:\n");
        for step in &session.recovery_steps {
            out.push_str(&format!("  - {}\n", step));
        }
    }
    if let Some(warning) = &session.integrity_warning {
        out.push_str(&format!("Integrity warning: {}\n", warning));
    }
    out
}
