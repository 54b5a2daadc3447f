//! Search Engine (C3): regex and keyword search over a `LogStore` snapshot.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::model::LogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Message,
    Args,
    Stack,
}

fn default_fields() -> Vec<SearchField> {
    vec![SearchField::Message, SearchField::Args, SearchField::Stack]
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegexSearchParams {
    pub pattern: String,
    #[serde(rename = "caseSensitive", default)]
    pub case_sensitive: bool,
    #[serde(default = "default_fields")]
    pub fields: Vec<SearchField>,
    #[serde(rename = "contextLines", default)]
    pub context_lines: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordSearchParams {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub logic: KeywordLogic,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordLogic {
    #[default]
    And,
    Or,
}

fn default_limit() -> usize {
    100
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub log: LogEntry,
    #[serde(rename = "matchedField")]
    pub matched_field: Option<SearchField>,
    #[serde(rename = "matchedText")]
    pub matched_text: String,
    #[serde(rename = "contextBefore")]
    pub context_before: Vec<LogEntry>,
    #[serde(rename = "contextAfter")]
    pub context_after: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub matches: Vec<SearchMatch>,
    pub total: usize,
}

fn field_text(log: &LogEntry, field: SearchField) -> String {
    match field {
        SearchField::Message => log.message.clone(),
        SearchField::Args => serde_json::to_string(&log.args).unwrap_or_default(),
        SearchField::Stack => log.stack.clone().unwrap_or_default(),
    }
}

fn context_slices(logs: &[LogEntry], index: usize, n: usize) -> (Vec<LogEntry>, Vec<LogEntry>) {
    let start = index.saturating_sub(n);
    let before = logs[start..index].to_vec();
    let end = (index + 1 + n).min(logs.len());
    let after = logs[index + 1..end].to_vec();
    (before, after)
}

/// Search `logs` (in insertion order) by regex, testing `fields` in order
/// and recording the first field that matches per log.
pub fn regex_search(logs: &[LogEntry], params: &RegexSearchParams) -> SearchResult {
    let Ok(re) = RegexBuilder::new(&params.pattern)
        .case_insensitive(!params.case_sensitive)
        .build()
    else {
        return SearchResult {
            matches: vec![],
            total: 0,
        };
    };

    let mut matches = Vec::new();
    for (i, log) in logs.iter().enumerate() {
        if matches.len() >= params.limit {
            break;
        }
        for &field in &params.fields {
            let text = field_text(log, field);
            if let Some(m) = re.find(&text) {
                let matched_text = m.as_str().to_string();
                let (before, after) = if params.context_lines > 0 {
                    context_slices(logs, i, params.context_lines)
                } else {
                    (vec![], vec![])
                };
                matches.push(SearchMatch {
                    log: log.clone(),
                    matched_field: Some(field),
                    matched_text,
                    context_before: before,
                    context_after: after,
                });
                break;
            }
        }
    }

    let total = matches.len();
    SearchResult { matches, total }
}

/// Search `logs` for keyword combinations (AND/OR) with optional excludes.
pub fn keyword_search(logs: &[LogEntry], params: &KeywordSearchParams) -> SearchResult {
    let keywords: Vec<String> = params.keywords.iter().map(|k| k.to_lowercase()).collect();
    let excludes: Vec<String> = params.exclude.iter().map(|k| k.to_lowercase()).collect();

    let mut matches = Vec::new();
    for log in logs {
        if matches.len() >= params.limit {
            break;
        }

        let haystack = format!(
            "{} {} {}",
            log.message,
            serde_json::to_string(&log.args).unwrap_or_default(),
            log.stack.as_deref().unwrap_or_default()
        )
        .to_lowercase();

        let keyword_hit = match params.logic {
            KeywordLogic::And => keywords.iter().all(|k| haystack.contains(k.as_str())),
            KeywordLogic::Or => keywords.iter().any(|k| haystack.contains(k.as_str())),
        };
        let excluded = excludes.iter().any(|k| haystack.contains(k.as_str()));

        if keyword_hit && !excluded {
            let matched_text: String = log.message.chars().take(100).collect();
            matches.push(SearchMatch {
                log: log.clone(),
                matched_field: None,
                matched_text,
                context_before: vec![],
                context_after: vec![],
            });
        }
    }

    let total = matches.len();
    SearchResult { matches, total }
}
