use pegasus::detail::DisplayValue;
use pegasus::{project_detail, Column, Row};
use serde_json::{json, Value};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn primary_follows_column_order_remaining_holds_the_rest() {
    let columns = vec![Column::new("b", "B"), Column::new("a", "A")];
    let r = row(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);

    let projection = project_detail(&r, &columns);
    let primary_keys: Vec<&str> = projection.primary.iter().map(|f| f.key.as_str()).collect();
    let remaining_keys: Vec<&str> = projection
        .remaining
        .iter()
        .map(|f| f.key.as_str())
        .collect();

    assert_eq!(primary_keys, vec!["b", "a"]);
    assert_eq!(remaining_keys, vec!["c"]);
}

#[test]
fn booleans_localize_to_distinct_tokens() {
    let r = row(&[("has_genset", json!(true)), ("has_solar", json!(false))]);
    let projection = project_detail(&r, &[]);

    let by_key = |key: &str| {
        projection
            .remaining
            .iter()
            .find(|f| f.key == key)
            .unwrap()
            .value
            .text()
            .to_string()
    };
    let yes = by_key("has_genset");
    let no = by_key("has_solar");
    assert_eq!(yes, "Oui");
    assert_eq!(no, "Non");
    assert_ne!(yes, no);
}

#[test]
fn null_and_empty_collapse_to_placeholder() {
    let r = row(&[("fs", json!(null)), ("zm", json!(""))]);
    let projection = project_detail(&r, &[]);
    for field in &projection.remaining {
        assert_eq!(field.value, DisplayValue::Missing);
        assert_eq!(field.value.text(), "—");
    }
}

#[test]
fn multi_line_values_are_normalized_and_flagged() {
    let r = row(&[(
        "genset_description",
        json!("FG Wilson P150_x000D_\nRévisé 2024\r\nRéservoir 990L"),
    )]);
    let projection = project_detail(&r, &[]);
    let field = &projection.remaining[0];
    assert!(field.value.is_multi_line());
    assert_eq!(field.value.text(), "FG Wilson P150\nRévisé 2024\nRéservoir 990L");
}

#[test]
fn structured_values_fall_back_to_json() {
    let r = row(&[("geom", json!({"lat": -4.3, "lng": 15.3}))]);
    let projection = project_detail(&r, &[]);
    let text = projection.remaining[0].value.text().to_string();
    assert!(text.contains("lat"));
    assert!(text.contains("15.3"));
}

#[test]
fn labels_come_from_columns_else_from_keys() {
    let columns = vec![Column::new("pm_cluster", "Cluster PM")];
    let r = row(&[("pm_cluster", json!("GOMA-1")), ("cm_cluster", json!("EST"))]);
    let projection = project_detail(&r, &columns);

    assert_eq!(projection.primary[0].label, "Cluster PM");
    assert_eq!(projection.remaining[0].label, "Cm Cluster");
}

#[test]
fn remaining_fields_sort_naturally() {
    let r = row(&[
        ("module10", json!("a")),
        ("module2", json!("b")),
        ("module1", json!("c")),
    ]);
    let projection = project_detail(&r, &[]);
    let keys: Vec<&str> = projection
        .remaining
        .iter()
        .map(|f| f.key.as_str())
        .collect();
    assert_eq!(keys, vec!["module1", "module2", "module10"]);
}

#[test]
fn spec_columns_missing_from_the_row_show_placeholder() {
    let columns = vec![Column::new("site_id", "Site"), Column::new("energie", "Énergie")];
    let r = row(&[("site_id", json!("KIN001"))]);
    let projection = project_detail(&r, &columns);
    assert_eq!(projection.primary[1].value, DisplayValue::Missing);
}

#[test]
fn summary_is_first_primary_then_first_remaining() {
    let columns = vec![Column::new("site_name", "Site")];
    let r = row(&[("site_name", json!("Binza")), ("zone", json!("Ouest"))]);
    let projection = project_detail(&r, &columns);
    assert_eq!(projection.summary.as_deref(), Some("Binza"));

    let projection = project_detail(&r, &[]);
    // No spec'd columns: the first natural-ordered remaining field leads.
    assert_eq!(projection.summary.as_deref(), Some("Binza"));
}

#[test]
fn empty_row_projects_to_nothing() {
    let projection = project_detail(&Row::new(), &[Column::new("a", "A")]);
    assert!(projection.is_empty());
    assert!(projection.summary.is_none());
}

#[test]
fn accessor_and_formatter_feed_the_detail_view() {
    fn label(row: &Row) -> Value {
        json!(format!(
            "{} · {}",
            row.get("site_id").and_then(Value::as_str).unwrap_or(""),
            row.get("site_name").and_then(Value::as_str).unwrap_or("")
        ))
    }
    fn meters(value: &Value, _row: &Row) -> String {
        match value {
            Value::Number(n) => format!("{n} m"),
            _ => String::new(),
        }
    }

    let columns = vec![
        Column::new("site_id", "Site").with_accessor(label),
        Column::new("tower_height", "Pylône").with_formatter(meters),
    ];
    let r = row(&[
        ("site_id", json!("KIN001")),
        ("site_name", json!("Binza")),
        ("tower_height", json!(42)),
    ]);
    let projection = project_detail(&r, &columns);
    assert_eq!(projection.primary[0].value.text(), "KIN001 · Binza");
    assert_eq!(projection.primary[1].value.text(), "42 m");
}
