//! Markdown report rendering

use std::fmt::Write;

use serde_json::Value;

use osprey_core::{validate_intelligence, AggregatedReport, ResultEnvelope};

/// Render a report as markdown
pub fn render_report(report: &AggregatedReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# OSINT Report: {}", report.query);
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Category**: {}", report.category);
    let _ = writeln!(
        out,
        "- **Generated**: {}",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "- **Sources**: {} queried, {} succeeded, {} failed",
        report.summary.total_sources,
        report.summary.successful_sources,
        report.summary.failed_sources
    );
    let _ = writeln!(
        out,
        "- **Data found**: {}",
        if report.summary.data_found { "yes" } else { "no" }
    );

    if report.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "No sources are available for this category.");
        return out;
    }

    // Highest-confidence sources first
    let mut envelopes: Vec<&ResultEnvelope> = report.sources.iter().collect();
    envelopes.sort_by(|a, b| b.confidence.cmp(&a.confidence).then(a.source_id.cmp(&b.source_id)));

    for envelope in envelopes {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "## {} (confidence {})",
            envelope.source_id, envelope.confidence
        );

        if !envelope.success {
            let _ = writeln!(
                out,
                "Failed: {}",
                envelope.data.error.as_deref().unwrap_or("unknown error")
            );
            continue;
        }

        let verdict = validate_intelligence(&envelope.data);
        if !verdict.valid {
            let _ = writeln!(
                out,
                "Result withheld: {}",
                verdict.reason.as_deref().unwrap_or("invalid payload")
            );
            continue;
        }

        if !envelope.data.found {
            let _ = writeln!(out, "Nothing found.");
            continue;
        }

        for (key, value) in &envelope.data.fields {
            let _ = writeln!(out, "- **{}**: {}", key, render_value(value));
        }
    }

    out
}

/// Short listing for the `sources` command
pub fn render_catalog(catalog: &osprey_core::SourceCatalog) -> String {
    let mut out = String::new();

    for category in osprey_core::Category::ALL {
        let sources = catalog.sources_for(category);
        let _ = writeln!(out, "{} ({} sources)", category, sources.len());
        for source in sources {
            let _ = writeln!(
                out,
                "  {:<22} confidence {:>3}  every {:>5}ms  {}",
                source.id, source.confidence, source.rate_limit_ms, source.description
            );
        }
    }

    out
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
