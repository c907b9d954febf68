use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pegasus::{
    ActiveView, App, AppEvent, CategoryCount, Dataset, InputMode, PegasusClient, Row,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::Duration;

fn test_app() -> App {
    let (tx, _rx) = mpsc::channel();
    // Nothing listens on this port; tests inject responses as events.
    let client = PegasusClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
    App::new(tx, client)
}

fn press(app: &mut App, code: KeyCode) -> Option<AppEvent> {
    app.event(&AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
}

fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        press(app, KeyCode::Char(c));
    }
}

fn site_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let mut row = Row::new();
            row.insert("site_id".to_string(), json!(format!("KIN{i:03}")));
            row.insert("site_name".to_string(), json!(format!("Site {i}")));
            row.insert(
                "province".to_string(),
                json!(if i < 5 { "Nord-Kivu" } else { "Kinshasa" }),
            );
            row.insert("tenant_count".to_string(), json!(i % 4));
            row
        })
        .collect()
}

fn load_sites(app: &mut App, rows: Vec<Row>) {
    // Drive the two-phase load without dispatching the fetch thread.
    let next = app.event(&AppEvent::Load(Dataset::Sites));
    assert!(matches!(next, Some(AppEvent::DoFetchRows(..))));
    let generation = app.pane(Dataset::Sites).generation;
    app.event(&AppEvent::RowsLoaded {
        dataset: Dataset::Sites,
        generation,
        result: Ok(rows),
    });
}

#[test]
fn app_starts_on_sites_in_normal_mode() {
    let app = test_app();
    assert_eq!(app.active, ActiveView::Table(Dataset::Sites));
    assert_eq!(app.input_mode, InputMode::Normal);
}

#[test]
fn full_table_workflow() {
    let mut app = test_app();

    // 1. Load 120 sites: 3 pages of 50.
    load_sites(&mut app, site_rows(120));
    {
        let pane = app.pane(Dataset::Sites);
        assert_eq!(pane.view.total_filtered, 120);
        assert_eq!(pane.view.total_pages, 3);
        assert_eq!(pane.view.page_items.len(), 50);
    }

    // 2. Page forward twice, then a short last page.
    press(&mut app, KeyCode::Char('n'));
    press(&mut app, KeyCode::Char('n'));
    {
        let pane = app.pane(Dataset::Sites);
        assert_eq!(pane.page.page, 3);
        assert_eq!(pane.view.page_items.len(), 20);
    }

    // 3. Search narrows to the five Nord-Kivu sites and resets the page.
    press(&mut app, KeyCode::Char('/'));
    assert_eq!(app.input_mode, InputMode::Searching);
    type_text(&mut app, "nord-kivu");
    {
        let pane = app.pane(Dataset::Sites);
        assert_eq!(pane.view.total_filtered, 5);
        assert_eq!(pane.view.total_pages, 1);
        assert_eq!(pane.page.page, 1);
    }
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.input_mode, InputMode::Normal);

    // 4. Sort by the selected column, descending on the second press.
    press(&mut app, KeyCode::Char('s'));
    {
        let pane = app.pane(Dataset::Sites);
        assert_eq!(pane.sort.key.as_deref(), Some("site_id"));
        assert!(!pane.sort.descending);
        let first = pane.view.page_items[0]["site_id"].as_str().unwrap();
        assert_eq!(first, "KIN000");
    }
    press(&mut app, KeyCode::Char('s'));
    {
        let pane = app.pane(Dataset::Sites);
        assert!(pane.sort.descending);
        let first = pane.view.page_items[0]["site_id"].as_str().unwrap();
        assert_eq!(first, "KIN004");
    }

    // 5. Esc clears the search and the full set comes back.
    press(&mut app, KeyCode::Esc);
    assert_eq!(app.pane(Dataset::Sites).view.total_filtered, 120);
}

#[test]
fn sort_on_a_different_column_resets_ascending() {
    let mut app = test_app();
    load_sites(&mut app, site_rows(20));

    press(&mut app, KeyCode::Char('s'));
    press(&mut app, KeyCode::Char('s'));
    assert!(app.pane(Dataset::Sites).sort.descending);

    // Move to another column; a fresh sort starts ascending again.
    press(&mut app, KeyCode::Right);
    press(&mut app, KeyCode::Char('s'));
    let pane = app.pane(Dataset::Sites);
    assert!(!pane.sort.descending);
    assert_ne!(pane.sort.key.as_deref(), Some("site_id"));
}

#[test]
fn search_resets_pagination_from_a_deep_page() {
    let mut app = test_app();
    load_sites(&mut app, site_rows(120));

    for _ in 0..2 {
        press(&mut app, KeyCode::Char('n'));
    }
    assert_eq!(app.pane(Dataset::Sites).page.page, 3);

    press(&mut app, KeyCode::Char('/'));
    type_text(&mut app, "kin001");
    let pane = app.pane(Dataset::Sites);
    assert_eq!(pane.page.page, 1);
    assert_eq!(pane.view.total_filtered, 1);
}

#[test]
fn detail_modal_opens_on_the_selected_row() {
    let mut app = test_app();
    load_sites(&mut app, site_rows(3));

    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    // The modal swallows navigation keys while open.
    press(&mut app, KeyCode::Char('n'));
    assert_eq!(app.pane(Dataset::Sites).page.page, 1);
    // Esc closes it; table keys work again.
    press(&mut app, KeyCode::Esc);
    press(&mut app, KeyCode::Down);
}

#[test]
fn view_switching_triggers_a_single_load() {
    let mut app = test_app();

    let next = press(&mut app, KeyCode::Char('2'));
    assert!(matches!(next, Some(AppEvent::Load(Dataset::Trb))));
    assert_eq!(app.active, ActiveView::Table(Dataset::Trb));

    // While loading, switching back and forth must not refetch.
    app.event(&next.unwrap());
    let again = press(&mut app, KeyCode::Char('1'));
    assert!(again.is_none() || !matches!(again, Some(AppEvent::Load(Dataset::Trb))));
    let again = press(&mut app, KeyCode::Char('2'));
    assert!(again.is_none());
}

#[test]
fn dashboard_loads_aggregates_and_drills_through() {
    let mut app = test_app();

    let next = press(&mut app, KeyCode::Char('5'));
    assert!(matches!(next, Some(AppEvent::LoadDashboard)));
    assert_eq!(app.active, ActiveView::Dashboard);
    app.event(&next.unwrap());
    let generation = app.dashboard.generation;

    let mut stats = BTreeMap::new();
    stats.insert("total_sites".to_string(), 120.0);
    stats.insert("maintenance_ratio".to_string(), 0.62);
    app.event(&AppEvent::StatsLoaded {
        generation,
        result: Ok(stats),
    });
    app.event(&AppEvent::AggregateLoaded {
        generation,
        result: Ok(vec![
            CategoryCount {
                category: "Kinshasa".to_string(),
                count: 115,
            },
            CategoryCount {
                category: "Nord-Kivu".to_string(),
                count: 5,
            },
        ]),
    });

    assert_eq!(app.dashboard.chart.len(), 2);
    assert!(!app.dashboard.loading);

    // Select the second bar and drill through: the sites table opens with
    // the category as search text.
    press(&mut app, KeyCode::Right);
    let next = press(&mut app, KeyCode::Enter);
    assert_eq!(app.active, ActiveView::Table(Dataset::Sites));
    assert_eq!(app.pane(Dataset::Sites).search, "Nord-Kivu");
    // Sites were never loaded, so the drill-through also starts a fetch.
    assert!(matches!(next, Some(AppEvent::Load(Dataset::Sites))));
}

#[test]
fn stale_dashboard_aggregates_are_dropped() {
    let mut app = test_app();
    press(&mut app, KeyCode::Char('5'));
    app.event(&AppEvent::LoadDashboard);
    let stale = app.dashboard.generation;
    app.event(&AppEvent::LoadDashboard);

    app.event(&AppEvent::AggregateLoaded {
        generation: stale,
        result: Ok(vec![CategoryCount {
            category: "vieux".to_string(),
            count: 1,
        }]),
    });
    assert!(app.dashboard.chart.is_empty());
    assert!(app.dashboard.loading);
}

#[test]
fn group_cycle_requests_fresh_aggregates() {
    let mut app = test_app();
    press(&mut app, KeyCode::Char('5'));
    let before = app.dashboard.group_field();

    let next = press(&mut app, KeyCode::Char('g'));
    assert!(matches!(next, Some(AppEvent::DoFetchAggregate(_))));
    assert_ne!(app.dashboard.group_field(), before);
}
