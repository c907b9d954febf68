//! Row detail projection: turns one row into an ordered, labeled field list
//! for the detail modal. Fields declared in the dataset's column spec come
//! first, in spec order; every other field on the row follows in natural
//! order.

use crate::view::{Column, Row};
use serde_json::Value;
use std::cmp::Ordering;

/// Placeholder shown for null and empty values.
pub const EMPTY_PLACEHOLDER: &str = "—";

/// Excel exports encode embedded carriage returns as this marker; the
/// ingested comment fields still carry it.
const EXCEL_CR_MARKER: &str = "_x000D_";

/// A value prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayValue {
    /// Null or empty; rendered as [`EMPTY_PLACEHOLDER`].
    Missing,
    Text(String),
    /// Contains at least one line break; rendered as an indented block.
    MultiLine(String),
}

impl DisplayValue {
    pub fn text(&self) -> &str {
        match self {
            DisplayValue::Missing => EMPTY_PLACEHOLDER,
            DisplayValue::Text(s) | DisplayValue::MultiLine(s) => s,
        }
    }

    pub fn is_multi_line(&self) -> bool {
        matches!(self, DisplayValue::MultiLine(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailField {
    pub key: String,
    pub label: String,
    pub value: DisplayValue,
}

/// Projection of one row: spec'd fields first, the rest after, plus a short
/// summary for the modal title. An empty projection (null row, empty row)
/// is a valid "nothing to display" state, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailProjection {
    pub primary: Vec<DetailField>,
    pub remaining: Vec<DetailField>,
    pub summary: Option<String>,
}

impl DetailProjection {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.remaining.is_empty()
    }
}

/// Format a raw field value for the detail view.
///
/// Null and empty strings collapse to [`DisplayValue::Missing`]; strings
/// carrying CR/LF or the Excel `_x000D_` marker are normalized to plain
/// `\n` and flagged multi-line; booleans localize to Oui/Non; structured
/// values fall back to compact JSON.
pub fn format_value(value: &Value) -> DisplayValue {
    match value {
        Value::Null => DisplayValue::Missing,
        Value::Bool(true) => DisplayValue::Text("Oui".to_string()),
        Value::Bool(false) => DisplayValue::Text("Non".to_string()),
        Value::Number(n) => DisplayValue::Text(n.to_string()),
        Value::String(s) => {
            if s.is_empty() {
                return DisplayValue::Missing;
            }
            if s.contains('\r') || s.contains('\n') || s.contains(EXCEL_CR_MARKER) {
                let normalized = s
                    .replace(&format!("{EXCEL_CR_MARKER}\n"), "\n")
                    .replace(EXCEL_CR_MARKER, "\n")
                    .replace("\r\n", "\n")
                    .replace('\r', "\n");
                DisplayValue::MultiLine(normalized)
            } else {
                DisplayValue::Text(s.clone())
            }
        }
        other => DisplayValue::Text(other.to_string()),
    }
}

/// Derive a human label from a raw field key: underscores become spaces,
/// each word is title-cased ("pm_cluster" -> "Pm Cluster").
pub fn label_from_key(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive, numeric-aware field name ordering: digit runs compare
/// as numbers, so "module2" sorts before "module10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ia = a.chars().peekable();
    let mut ib = b.chars().peekable();

    loop {
        match (ia.peek().copied(), ib.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let mut na = String::new();
                    while let Some(c) = ia.peek().copied() {
                        if !c.is_ascii_digit() {
                            break;
                        }
                        na.push(c);
                        ia.next();
                    }
                    let mut nb = String::new();
                    while let Some(c) = ib.peek().copied() {
                        if !c.is_ascii_digit() {
                            break;
                        }
                        nb.push(c);
                        ib.next();
                    }
                    let va: u64 = na.parse().unwrap_or(u64::MAX);
                    let vb: u64 = nb.parse().unwrap_or(u64::MAX);
                    match va.cmp(&vb) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    let la = ca.to_lowercase().to_string();
                    let lb = cb.to_lowercase().to_string();
                    match la.cmp(&lb) {
                        Ordering::Equal => {
                            ia.next();
                            ib.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

/// Project one row against a column spec.
///
/// Every spec'd column yields a primary field (missing row fields show the
/// placeholder); every row field not covered by the spec yields a remaining
/// field. The summary is the first primary field's display text, falling
/// back to the first remaining field; an empty row has no summary.
pub fn project_detail(row: &Row, columns: &[Column]) -> DetailProjection {
    if row.is_empty() {
        return DetailProjection::default();
    }

    let primary: Vec<DetailField> = columns
        .iter()
        .map(|column| {
            let raw = column.value(row);
            let value = match column.formatter {
                Some(formatter) => {
                    let text = formatter(&raw, row);
                    if text.is_empty() {
                        DisplayValue::Missing
                    } else {
                        DisplayValue::Text(text)
                    }
                }
                None => format_value(&raw),
            };
            DetailField {
                key: column.key.to_string(),
                label: column.label.to_string(),
                value,
            }
        })
        .collect();

    let mut remaining: Vec<DetailField> = row
        .iter()
        .filter(|(key, _)| !columns.iter().any(|column| column.key == key.as_str()))
        .map(|(key, raw)| DetailField {
            key: key.clone(),
            label: label_from_key(key),
            value: format_value(raw),
        })
        .collect();
    remaining.sort_by(|a, b| natural_cmp(&a.key, &b.key));

    let summary = primary
        .first()
        .or_else(|| remaining.first())
        .map(|field| field.value.text().lines().next().unwrap_or("").to_string());

    DetailProjection {
        primary,
        remaining,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_derivation() {
        assert_eq!(label_from_key("pm_cluster"), "Pm Cluster");
        assert_eq!(label_from_key("site_name"), "Site Name");
        assert_eq!(label_from_key("b2b"), "B2b");
    }

    #[test]
    fn natural_order_on_numbered_keys() {
        let mut keys = vec!["module10", "module2", "Module1"];
        keys.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(keys, vec!["Module1", "module2", "module10"]);
    }

    #[test]
    fn excel_marker_normalizes_to_newline() {
        let value = Value::String("ligne 1_x000D_\nligne 2_x000D_ligne 3".to_string());
        match format_value(&value) {
            DisplayValue::MultiLine(text) => {
                assert_eq!(text, "ligne 1\nligne 2\nligne 3");
            }
            other => panic!("expected multi-line, got {other:?}"),
        }
    }
}
