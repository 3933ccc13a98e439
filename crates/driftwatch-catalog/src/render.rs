//! Markdown rendering of a finished catalog.

use std::fmt::Write;

use crate::catalog::{Catalog, Example};

fn fence_info(text: &str) -> &'static str {
    if text.trim_start().starts_with('{') {
        "json"
    } else {
        "text"
    }
}

fn direction_line<K: std::fmt::Display, V: std::fmt::Display>(
    counts: impl IntoIterator<Item = (K, V)>,
) -> String {
    counts
        .into_iter()
        .map(|(direction, count)| format!("{direction}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_example(out: &mut String, ordinal: usize, example: &Example) {
    let _ = writeln!(out, "{ordinal}. Raw event:");
    let _ = writeln!(out, "```{}", fence_info(&example.raw_event));
    let _ = writeln!(out, "{}", example.raw_event);
    let _ = writeln!(out, "```");
    if let Some(raw_payload) = &example.raw_payload {
        let _ = writeln!(out, "Raw payload:");
        let _ = writeln!(out, "```{}", fence_info(raw_payload));
        let _ = writeln!(out, "{raw_payload}");
        let _ = writeln!(out, "```");
    }
    if let Some(parsed) = &example.parsed_payload {
        let pretty = serde_json::to_string_pretty(parsed).unwrap_or_else(|_| parsed.to_string());
        let _ = writeln!(out, "Parsed payload:");
        let _ = writeln!(out, "```json\n{pretty}\n```");
    } else if let Some(error) = &example.parse_error {
        let _ = writeln!(out, "Parsed payload: (unparsable) {error}");
    }
    out.push('\n');
}

/// Scan summary, a shape table, then examples per shape.
pub fn render_markdown(catalog: &Catalog) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Tool IO Formats Report");
    let _ = writeln!(out, "Generated: {}\n", catalog.generated_at);

    let _ = writeln!(out, "## Scan Summary");
    for (family, roots) in &catalog.scan_roots {
        let count = catalog.files_scanned.get(family).copied().unwrap_or(0);
        let root_text = match roots.len() {
            0 => "(none)".to_string(),
            n if n <= 3 => roots.join(", "),
            n => format!("{}, ... (+{} more)", roots[..3].join(", "), n - 3),
        };
        let _ = writeln!(out, "- {family}: {count} files from {root_text}");
    }
    let _ = writeln!(
        out,
        "- total tool blocks: {} ({})\n",
        catalog.summary.total_tool_blocks,
        direction_line(&catalog.summary.direction_counts)
    );

    let _ = writeln!(out, "## Shape Summary");
    let _ = writeln!(out, "| Shape Signature | Count | Families | Directions |");
    let _ = writeln!(out, "| --- | --- | --- | --- |");
    for shape in &catalog.shape_signatures {
        let families: Vec<&str> = shape.families.iter().map(|f| f.as_str()).collect();
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            shape.shape_signature,
            shape.count,
            families.join(", "),
            direction_line(&shape.direction_counts)
        );
    }
    out.push('\n');

    for shape in &catalog.shape_signatures {
        let families: Vec<&str> = shape.families.iter().map(|f| f.as_str()).collect();
        let _ = writeln!(out, "## Shape: {}", shape.shape_signature);
        let _ = writeln!(out, "- Count: {}", shape.count);
        let _ = writeln!(out, "- Families: {}", families.join(", "));
        let _ = writeln!(out, "- Directions: {}\n", direction_line(&shape.direction_counts));
        let _ = writeln!(out, "Examples:");
        for (i, example) in shape.examples.iter().enumerate() {
            render_example(&mut out, i + 1, example);
        }
    }
    out
}
