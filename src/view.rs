//! Client-side table view: search, sort and pagination over rows fetched
//! from the backend. All transforms here are pure; panes recompute the view
//! whenever one of the inputs changes.

use serde_json::Value;
use std::cmp::Ordering;

/// One record from a list endpoint: an open field-name -> value map.
/// Field sets vary per dataset and are not statically known.
pub type Row = serde_json::Map<String, Value>;

/// Accessor resolving a display value from a row, overriding the raw field.
pub type Accessor = fn(&Row) -> Value;

/// Formatter turning a resolved value into cell text.
pub type Formatter = fn(&Value, &Row) -> String;

/// Column configuration: which field to show, under which label, and how.
#[derive(Clone)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
    pub width: Option<u16>,
    pub accessor: Option<Accessor>,
    pub formatter: Option<Formatter>,
}

impl Column {
    pub fn new(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            width: None,
            accessor: None,
            formatter: None,
        }
    }

    pub fn with_width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Resolve the raw display value for a row (accessor first, then field).
    pub fn value(&self, row: &Row) -> Value {
        match self.accessor {
            Some(accessor) => accessor(row),
            None => row.get(self.key).cloned().unwrap_or(Value::Null),
        }
    }

    /// Cell text for the table grid. Multi-line content is cut at the first
    /// line break; the detail view shows it in full.
    pub fn cell_text(&self, row: &Row) -> String {
        let value = self.value(row);
        if let Some(formatter) = self.formatter {
            return formatter(&value, row);
        }
        let text = match value {
            Value::Null => String::new(),
            Value::Bool(true) => "Oui".to_string(),
            Value::Bool(false) => "Non".to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s,
            other => other.to_string(),
        };
        match text.find(['\r', '\n']) {
            Some(idx) => format!("{}…", &text[..idx]),
            None => text,
        }
    }
}

/// Sort selection. Toggling the active key flips direction; selecting a
/// different key restarts ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    pub key: Option<String>,
    pub descending: bool,
}

impl SortState {
    pub fn toggle(&mut self, key: &str) {
        if self.key.as_deref() == Some(key) {
            self.descending = !self.descending;
        } else {
            self.key = Some(key.to_string());
            self.descending = false;
        }
    }

    pub fn clear(&mut self) {
        self.key = None;
        self.descending = false;
    }
}

/// Current page request. `page` is 1-based; `compute_view` clamps it into
/// the valid range, but panes also reset it to 1 whenever search, sort,
/// page size or the underlying dataset changes (the clamp is a safety net,
/// the reset is the UX contract).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub page: usize,
    pub page_size: usize,
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }
}

/// Derived output of one search+sort+paginate pass. Recomputed from scratch
/// on every input change, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewResult {
    pub page_items: Vec<Row>,
    pub total_filtered: usize,
    pub total_pages: usize,
    /// The clamped page actually served.
    pub page: usize,
}

/// Sort key normalization: null/absent -> empty text, bool -> 1/0,
/// number -> f64, string -> lowercased, anything else -> its JSON form.
/// When types mix within a column, numbers order before text.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => SortKey::Text(String::new()),
            Some(Value::Bool(b)) => SortKey::Number(if *b { 1.0 } else { 0.0 }),
            Some(Value::Number(n)) => SortKey::Number(n.as_f64().unwrap_or(0.0)),
            Some(Value::String(s)) => SortKey::Text(s.to_lowercase()),
            Some(other) => SortKey::Text(other.to_string()),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        }
    }
}

/// True when any primitive field of the row contains the needle. The scan
/// covers every string/number/bool field of the row, not just the visible
/// columns; nulls and nested structures never match. `needle` must already
/// be trimmed and lowercased.
fn row_matches(row: &Row, needle: &str) -> bool {
    row.values().any(|value| match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Number(n) => n.to_string().contains(needle),
        Value::Bool(b) => {
            if *b {
                "true".contains(needle)
            } else {
                "false".contains(needle)
            }
        }
        _ => false,
    })
}

/// Turn (rows, search, sort, page) into a paginated view.
///
/// Filtering matches a trimmed, case-insensitive substring against every
/// primitive field. Sorting is stable, so equal keys keep their relative
/// order. The requested page is clamped into `[1, total_pages]` and
/// `total_pages` is at least 1, so empty input yields an empty single page.
pub fn compute_view(rows: &[Row], search: &str, sort: &SortState, page: &PageState) -> ViewResult {
    let needle = search.trim().to_lowercase();

    let mut filtered: Vec<&Row> = if needle.is_empty() {
        rows.iter().collect()
    } else {
        rows.iter().filter(|row| row_matches(row, &needle)).collect()
    };

    if let Some(key) = sort.key.as_deref() {
        // Precompute keys so each row is normalized once.
        let mut keyed: Vec<(SortKey, &Row)> = filtered
            .into_iter()
            .map(|row| (SortKey::of(row.get(key)), row))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| {
            let ord = a.compare(b);
            if sort.descending {
                ord.reverse()
            } else {
                ord
            }
        });
        filtered = keyed.into_iter().map(|(_, row)| row).collect();
    }

    let total_filtered = filtered.len();
    let page_size = page.page_size.max(1);
    let total_pages = total_filtered.div_ceil(page_size).max(1);
    let current = page.page.clamp(1, total_pages);

    let start = (current - 1) * page_size;
    let page_items: Vec<Row> = filtered
        .into_iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();

    ViewResult {
        page_items,
        total_filtered,
        total_pages,
        page: current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn sort_toggle_flips_then_resets() {
        let mut sort = SortState::default();
        sort.toggle("province");
        assert_eq!(sort.key.as_deref(), Some("province"));
        assert!(!sort.descending);
        sort.toggle("province");
        assert!(sort.descending);
        sort.toggle("zone");
        assert_eq!(sort.key.as_deref(), Some("zone"));
        assert!(!sort.descending);
    }

    #[test]
    fn numbers_sort_before_text() {
        let rows = vec![
            row(&[("v", json!("abc"))]),
            row(&[("v", json!(12))]),
            row(&[("v", json!(null))]),
        ];
        let sort = SortState {
            key: Some("v".to_string()),
            descending: false,
        };
        let result = compute_view(&rows, "", &sort, &PageState::new(10));
        assert_eq!(result.page_items[0]["v"], json!(12));
        // Null normalizes to empty text, which sorts before "abc".
        assert_eq!(result.page_items[1]["v"], json!(null));
        assert_eq!(result.page_items[2]["v"], json!("abc"));
    }

    #[test]
    fn accessor_overrides_field() {
        let column = Column::new("site_id", "Site").with_accessor(|row| {
            json!(format!(
                "{} {}",
                row.get("site_id").and_then(Value::as_str).unwrap_or(""),
                row.get("site_name").and_then(Value::as_str).unwrap_or("")
            ))
        });
        let r = row(&[("site_id", json!("KIN001")), ("site_name", json!("Binza"))]);
        assert_eq!(column.cell_text(&r), "KIN001 Binza");
    }

    #[test]
    fn cell_text_truncates_multiline() {
        let column = Column::new("comment", "Commentaire");
        let r = row(&[("comment", json!("ligne 1\nligne 2"))]);
        assert_eq!(column.cell_text(&r), "ligne 1…");
    }
}
