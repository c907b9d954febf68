//! Prepare chart data from aggregate endpoint rows. The backend does all
//! the counting; this module only maps `{category, count}` pairs into bar
//! chart entries and formats their labels.

use serde::Deserialize;

/// One row of an aggregate endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// One bar of the dashboard chart. `meta` keeps the source aggregate so a
/// selected bar can drill through to the matching rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDatum {
    pub label: String,
    pub value: u64,
    pub meta: CategoryCount,
}

/// Map aggregate pairs into chart entries, in the order the backend
/// returned them. Blank categories get the placeholder label.
pub fn map_to_chart_data(aggregates: &[CategoryCount]) -> Vec<ChartDatum> {
    aggregates
        .iter()
        .map(|pair| ChartDatum {
            label: if pair.category.is_empty() {
                crate::detail::EMPTY_PLACEHOLDER.to_string()
            } else {
                pair.category.clone()
            },
            value: pair.count,
            meta: pair.clone(),
        })
        .collect()
}

/// Bar value label: `"<value> • <share>%"` with one decimal when a total is
/// known, bare value otherwise.
pub fn format_percent_label(value: u64, total: u64) -> String {
    if total > 0 {
        let pct = value as f64 * 100.0 / total as f64;
        format!("{value} • {pct:.1}%")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keeps_backend_order() {
        let aggregates = vec![
            CategoryCount {
                category: "Kinshasa".to_string(),
                count: 40,
            },
            CategoryCount {
                category: String::new(),
                count: 2,
            },
        ];
        let data = map_to_chart_data(&aggregates);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].label, "Kinshasa");
        assert_eq!(data[0].value, 40);
        assert_eq!(data[1].label, "—");
        assert_eq!(data[1].meta, aggregates[1]);
    }

    #[test]
    fn percent_label_with_and_without_total() {
        assert_eq!(format_percent_label(12, 48), "12 • 25.0%");
        assert_eq!(format_percent_label(1, 3), "1 • 33.3%");
        assert_eq!(format_percent_label(7, 0), "7");
    }
}
