//! Report generation
//!
//! Renders decoded value maps as JSON or as aligned `id = value` text.

use crate::config::OutputFormat;
use anyhow::Result;
use obd_decoder::ValueMap;
use serde::Serialize;
use std::fmt::Write;

/// Decoded values of one dump
#[derive(Debug, Clone, Serialize)]
pub struct DumpReport {
    /// File name, or `<stdin>`
    pub source: String,
    pub values: ValueMap,
}

/// Render all reports in `format`
///
/// A single report renders as its bare value map.
pub fn render(reports: &[DumpReport], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(reports),
        OutputFormat::Text => Ok(render_text(reports)),
    }
}

fn render_json(reports: &[DumpReport]) -> Result<String> {
    let mut rendered = match reports {
        [report] => serde_json::to_string_pretty(&report.values)?,
        reports => serde_json::to_string_pretty(reports)?,
    };
    rendered.push('\n');
    Ok(rendered)
}

fn render_text(reports: &[DumpReport]) -> String {
    let mut out = String::new();
    let with_headers = reports.len() > 1;

    for (i, report) in reports.iter().enumerate() {
        if with_headers {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "== {} ==", report.source);
        }
        if report.values.is_empty() {
            out.push_str("(no signals decoded)\n");
            continue;
        }

        let width = report.values.keys().map(String::len).max().unwrap_or(0);
        for (signal_id, value) in &report.values {
            let _ = writeln!(out, "{:<width$} = {}", signal_id, value, width = width);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_decoder::SignalValue;

    fn report(source: &str, values: &[(&str, SignalValue)]) -> DumpReport {
        DumpReport {
            source: source.to_string(),
            values: values
                .iter()
                .map(|(id, value)| (id.to_string(), value.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_single_report_json() {
        let reports = [report(
            "odometer.txt",
            &[
                ("F150_ODO", SignalValue::Number(234652.4)),
                ("F150_GEAR", SignalValue::Absent),
            ],
        )];

        let rendered = render(&reports, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({"F150_GEAR": null, "F150_ODO": 234652.4})
        );
    }

    #[test]
    fn test_multiple_reports_json() {
        let reports = [
            report("a.txt", &[("SPEED", SignalValue::Number(50.0))]),
            report("b.txt", &[("GEAR", SignalValue::Text("D".to_string()))]),
        ];

        let rendered = render(&reports, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([
                {"source": "a.txt", "values": {"SPEED": 50.0}},
                {"source": "b.txt", "values": {"GEAR": "D"}}
            ])
        );
    }

    #[test]
    fn test_text_alignment() {
        let reports = [report(
            "<stdin>",
            &[
                ("F150_ODO", SignalValue::Number(234652.4)),
                ("GEAR", SignalValue::Absent),
            ],
        )];

        let rendered = render(&reports, OutputFormat::Text).unwrap();
        assert_eq!(rendered, "F150_ODO = 234652.4\nGEAR     = -\n");
    }

    #[test]
    fn test_text_headers_for_multiple_dumps() {
        let reports = [
            report("a.txt", &[("SPEED", SignalValue::Number(50.0))]),
            report("b.txt", &[]),
        ];

        let rendered = render(&reports, OutputFormat::Text).unwrap();
        assert_eq!(
            rendered,
            "== a.txt ==\nSPEED = 50\n\n== b.txt ==\n(no signals decoded)\n"
        );
    }
}
