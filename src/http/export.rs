//! Log export encodings (spec.md §4.6 `/maintenance/export`): the three
//! wire formats are plain enough that hand-rolling them keeps this module
//! self-contained rather than pulling in a dedicated crate for one endpoint.

use crate::model::LogEntry;
use crate::http::types::ExportFormat;

const DEFAULT_FIELDS: &[&str] = &["id", "timestamp", "level", "message", "tabId", "url", "sessionId"];

fn field_value(log: &LogEntry, field: &str) -> String {
    match field {
        "id" => log.id.clone(),
        "timestamp" => log.timestamp.to_string(),
        "level" => serde_json::to_value(log.level)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        "message" => log.message.clone(),
        "args" => serde_json::to_string(&log.args).unwrap_or_default(),
        "stack" => log.stack.clone().unwrap_or_default(),
        "tabId" => log.tab_id.to_string(),
        "url" => log.url.clone(),
        "sessionId" => log.session_id.clone(),
        _ => String::new(),
    }
}

pub fn content_type(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Json => "application/json",
        ExportFormat::Csv => "text/csv",
        ExportFormat::Txt => "text/plain",
    }
}

pub fn encode(
    format: ExportFormat,
    logs: &[LogEntry],
    fields: Option<&[String]>,
    pretty_print: bool,
) -> String {
    match format {
        ExportFormat::Json => encode_json(logs, fields, pretty_print),
        ExportFormat::Csv => encode_csv(logs, fields),
        ExportFormat::Txt => encode_txt(logs, fields),
    }
}

fn selected_fields(fields: Option<&[String]>) -> Vec<String> {
    fields
        .filter(|f| !f.is_empty())
        .map(<[String]>::to_vec)
        .unwrap_or_else(|| DEFAULT_FIELDS.iter().map(|s| (*s).to_string()).collect())
}

fn encode_json(logs: &[LogEntry], fields: Option<&[String]>, pretty_print: bool) -> String {
    let cols = selected_fields(fields);
    let rows: Vec<serde_json::Value> = logs
        .iter()
        .map(|log| {
            let mut obj = serde_json::Map::new();
            for col in &cols {
                obj.insert(col.clone(), serde_json::Value::String(field_value(log, col)));
            }
            serde_json::Value::Object(obj)
        })
        .collect();
    let value = serde_json::Value::Array(rows);
    if pretty_print {
        serde_json::to_string_pretty(&value).unwrap_or_default()
    } else {
        serde_json::to_string(&value).unwrap_or_default()
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn encode_csv(logs: &[LogEntry], fields: Option<&[String]>) -> String {
    let cols = selected_fields(fields);
    let mut out = cols.join(",");
    out.push('\n');
    for log in logs {
        let row: Vec<String> = cols.iter().map(|c| csv_escape(&field_value(log, c))).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn encode_txt(logs: &[LogEntry], fields: Option<&[String]>) -> String {
    let cols = selected_fields(fields);
    let mut out = String::new();
    for log in logs {
        let line: Vec<String> = cols
            .iter()
            .map(|c| format!("{c}={}", field_value(log, c)))
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogLevel;

    fn log() -> LogEntry {
        LogEntry {
            id: "L1".into(),
            timestamp: 1000,
            level: LogLevel::Error,
            message: "a, \"quoted\" message".into(),
            args: vec![],
            stack: None,
            tab_id: 7,
            url: "http://x/".into(),
            session_id: "S".into(),
        }
    }

    #[test]
    fn csv_escapes_commas_and_quotes() {
        let csv = encode_csv(&[log()], None);
        assert!(csv.contains("\"a, \"\"quoted\"\" message\""));
    }

    #[test]
    fn json_round_trips_default_fields() {
        let json = encode_json(&[log()], None, false);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["id"], "L1");
    }

    #[test]
    fn txt_uses_selected_fields_only() {
        let fields = vec!["id".to_string(), "message".to_string()];
        let txt = encode_txt(&[log()], Some(&fields));
        assert!(txt.starts_with("id=L1 message="));
    }
}
