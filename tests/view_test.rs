use pegasus::{compute_view, PageState, Row, SortState};
use serde_json::{json, Value};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn site_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            row(&[
                ("site_id", json!(format!("KIN{i:03}"))),
                ("site_name", json!(format!("Site {i}"))),
                ("tenant_count", json!(i % 4)),
                ("is_under_maintenance", json!(i % 2 == 0)),
            ])
        })
        .collect()
}

#[test]
fn pages_partition_the_filtered_set() {
    let rows = site_rows(37);
    let sort = SortState::default();
    let page_size = 10;

    let first = compute_view(&rows, "", &sort, &PageState::new(page_size));
    assert!(first.total_filtered <= rows.len());

    let mut seen = 0;
    for page in 1..=first.total_pages {
        let state = PageState {
            page,
            page_size,
        };
        let view = compute_view(&rows, "", &sort, &state);
        seen += view.page_items.len();
    }
    assert_eq!(seen, first.total_filtered);
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let rows = site_rows(25);
    let sort = SortState {
        key: Some("tenant_count".to_string()),
        descending: true,
    };
    let page = PageState {
        page: 2,
        page_size: 7,
    };
    let a = compute_view(&rows, "site", &sort, &page);
    let b = compute_view(&rows, "site", &sort, &page);
    assert_eq!(a, b);
}

#[test]
fn sorting_is_stable_on_ties() {
    let rows = vec![
        row(&[("k", json!(1)), ("tag", json!("a"))]),
        row(&[("k", json!(1)), ("tag", json!("b"))]),
    ];
    let sort = SortState {
        key: Some("k".to_string()),
        descending: false,
    };
    let view = compute_view(&rows, "", &sort, &PageState::new(10));
    let tags: Vec<&str> = view
        .page_items
        .iter()
        .map(|r| r["tag"].as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["a", "b"]);
}

#[test]
fn search_is_case_insensitive_substring() {
    let rows = vec![row(&[("name", json!("North Site"))])];
    let sort = SortState::default();
    let page = PageState::new(10);

    assert_eq!(compute_view(&rows, "north", &sort, &page).total_filtered, 1);
    assert_eq!(compute_view(&rows, "RTH SI", &sort, &page).total_filtered, 1);
    assert_eq!(compute_view(&rows, "south", &sort, &page).total_filtered, 0);
}

#[test]
fn search_scans_all_primitive_fields_not_just_columns() {
    // "battery_count" has no grid column anywhere, but still matches.
    let rows = vec![
        row(&[("site_id", json!("KIN001")), ("battery_count", json!(48))]),
        row(&[("site_id", json!("KIN002")), ("battery_count", json!(24))]),
    ];
    let view = compute_view(&rows, "48", &SortState::default(), &PageState::new(10));
    assert_eq!(view.total_filtered, 1);
    assert_eq!(view.page_items[0]["site_id"], json!("KIN001"));
}

#[test]
fn non_primitive_fields_are_excluded_from_search() {
    let rows = vec![row(&[
        ("site_id", json!("KIN001")),
        ("geom", json!({"lat": 4.3, "lng": 15.3})),
    ])];
    let view = compute_view(&rows, "lat", &SortState::default(), &PageState::new(10));
    assert_eq!(view.total_filtered, 0);
}

#[test]
fn out_of_range_page_is_clamped_not_an_error() {
    let rows = site_rows(3);
    let page = PageState {
        page: 5,
        page_size: 10,
    };
    let view = compute_view(&rows, "", &SortState::default(), &page);
    assert_eq!(view.total_pages, 1);
    assert_eq!(view.page, 1);
    assert_eq!(view.page_items.len(), 3);
}

#[test]
fn empty_rows_yield_empty_single_page() {
    let view = compute_view(&[], "", &SortState::default(), &PageState::new(10));
    assert!(view.page_items.is_empty());
    assert_eq!(view.total_filtered, 0);
    assert_eq!(view.total_pages, 1);
}

#[test]
fn sort_normalizes_booleans_and_nulls() {
    let rows = vec![
        row(&[("flag", json!(true)), ("tag", json!("vrai"))]),
        row(&[("flag", json!(false)), ("tag", json!("faux"))]),
        row(&[("flag", json!(null)), ("tag", json!("nul"))]),
    ];
    let sort = SortState {
        key: Some("flag".to_string()),
        descending: false,
    };
    let view = compute_view(&rows, "", &sort, &PageState::new(10));
    let tags: Vec<&str> = view
        .page_items
        .iter()
        .map(|r| r["tag"].as_str().unwrap())
        .collect();
    // false (0) < true (1) < null ("" as text)
    assert_eq!(tags, vec!["faux", "vrai", "nul"]);
}

#[test]
fn descending_reverses_the_comparison() {
    let rows = vec![
        row(&[("h", json!(12))]),
        row(&[("h", json!(45))]),
        row(&[("h", json!(30))]),
    ];
    let sort = SortState {
        key: Some("h".to_string()),
        descending: true,
    };
    let view = compute_view(&rows, "", &sort, &PageState::new(10));
    let heights: Vec<i64> = view
        .page_items
        .iter()
        .map(|r| r["h"].as_i64().unwrap())
        .collect();
    assert_eq!(heights, vec![45, 30, 12]);
}

// End-to-end scenario from the dashboard's main workflow: a full site list
// paged at 50, then a search narrowing to a handful of rows.
#[test]
fn full_list_then_search_scenario() {
    let mut rows = site_rows(120);
    for (i, row) in rows.iter_mut().enumerate().take(5) {
        row.insert("pm_cluster".to_string(), json!(format!("GOMA-{i}")));
    }

    let sort = SortState::default();
    let mut page = PageState::new(50);

    let view = compute_view(&rows, "", &sort, &page);
    assert_eq!(view.total_pages, 3);
    assert_eq!(view.page_items.len(), 50);

    page.page = 3;
    let view = compute_view(&rows, "", &sort, &page);
    assert_eq!(view.page_items.len(), 20);

    // Typing a search resets the page to 1 (the pane contract) and the
    // result collapses to a single page.
    page.reset();
    let view = compute_view(&rows, "goma", &sort, &page);
    assert_eq!(view.total_filtered, 5);
    assert_eq!(view.total_pages, 1);
    assert_eq!(view.page, 1);
    assert_eq!(view.page_items.len(), 5);
}

#[test]
fn page_size_change_resets_to_first_page() {
    let mut page = PageState::new(50);
    page.page = 3;
    page.set_page_size(25);
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 25);
}
