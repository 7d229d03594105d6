//! Output formatting for CLI

use std::collections::BTreeMap;

use crate::path::Path;
use crate::schema::SchemaEntry;
use crate::value::Value;

/// How results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One item per line
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

fn pretty(json: &serde_json::Value) -> String {
    serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string())
}

/// Format a list of names
pub fn format_list(items: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => items.join("\n"),
        OutputFormat::Json => pretty(&serde_json::json!(items)),
    }
}

/// Format filled leaf paths
pub fn format_paths(paths: &[Path], format: OutputFormat) -> String {
    let items: Vec<String> = paths.iter().map(ToString::to_string).collect();
    format_list(&items, format)
}

/// Format a flat path to value view
pub fn format_flat(flat: &BTreeMap<String, Value>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => flat
            .iter()
            .map(|(path, value)| format!("{} = {}", path, value))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = flat
                .iter()
                .map(|(path, value)| (path.clone(), value.to_json()))
                .collect();
            pretty(&serde_json::Value::Object(map))
        }
    }
}

pub fn format_value(value: &Value, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => value.to_string(),
        OutputFormat::Json => pretty(&value.to_json()),
    }
}

/// Format a schema entry
pub fn format_entry(location: &str, entry: &SchemaEntry, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = format!("{}\n  data type: {}\n", location, entry.data_type);
            if let Some(units) = &entry.units {
                output.push_str(&format!("  units: {}\n", units));
            }
            if !entry.coordinates.is_empty() {
                output.push_str(&format!("  coordinates: {}\n", entry.coordinates.join(", ")));
            }
            if let Some(documentation) = &entry.documentation {
                output.push_str(&format!("  documentation: {}\n", documentation));
            }
            output
        }
        OutputFormat::Json => match serde_json::to_value(entry) {
            Ok(json) => pretty(&serde_json::json!({ "location": location, "entry": json })),
            Err(e) => format!("{{\"error\": \"{}\"}}", e),
        },
    }
}
