use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::debug;
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

use ratatui::widgets::{Block, Borders, Clear, Paragraph, TableState, Tabs};

pub mod api;
pub mod chart_data;
pub mod config;
pub mod dataset;
pub mod detail;
pub mod view;
pub mod widgets;

pub use api::{ApiError, PegasusClient};
pub use chart_data::{format_percent_label, map_to_chart_data, CategoryCount, ChartDatum};
pub use config::{
    rgb_to_256_color, rgb_to_basic_ansi, AppConfig, ColorParser, ConfigManager, Theme,
};
pub use dataset::Dataset;
pub use detail::{project_detail, DetailProjection};
pub use view::{compute_view, Column, PageState, Row, SortState, ViewResult};

use widgets::controls::Controls;
use widgets::dashboard::Dashboard;
use widgets::datatable::DataTable;
use widgets::detail::DetailModal;
use widgets::text_input::{TextInput, TextInputEvent};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "pegasus";

pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    /// Mark a table pane as loading; answered with a DoFetchRows so the
    /// loading state renders before the fetch thread starts.
    Load(Dataset),
    DoFetchRows(Dataset, u64),
    LoadDashboard,
    DoFetchDashboard(u64),
    /// Refetch only the aggregates (group-by or filter changed).
    DoFetchAggregate(u64),
    RowsLoaded {
        dataset: Dataset,
        generation: u64,
        result: Result<Vec<Row>, ApiError>,
    },
    StatsLoaded {
        generation: u64,
        result: Result<BTreeMap<String, f64>, ApiError>,
    },
    AggregateLoaded {
        generation: u64,
        result: Result<Vec<CategoryCount>, ApiError>,
    },
    DistinctLoaded {
        generation: u64,
        result: Result<BTreeMap<String, Vec<String>>, ApiError>,
    },
    Exit,
    Crash(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    Table(Dataset),
    Dashboard,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    Searching,
}

/// Per-dataset container: rows, view state and its own fetch triple.
/// Nothing is shared between panes; a slow TRB fetch cannot touch Sites.
pub struct TablePane {
    pub dataset: Dataset,
    columns: Vec<Column>,
    rows: Vec<Row>,
    /// Bumped on every successful load. Page resets key off this, not off
    /// any notion of buffer identity.
    pub version: u64,
    /// Id of the latest issued fetch; responses carrying an older id are
    /// discarded (last-request-wins).
    pub generation: u64,
    pub search: String,
    pub sort: SortState,
    pub page: PageState,
    pub view: ViewResult,
    pub table_state: TableState,
    pub selected_column: usize,
    pub loading: bool,
    pub error: Option<String>,
    pub loaded_at: Option<DateTime<Local>>,
}

impl TablePane {
    fn new(dataset: Dataset, page_size: usize) -> Self {
        let mut pane = Self {
            dataset,
            columns: dataset.columns(),
            rows: Vec::new(),
            version: 0,
            generation: 0,
            search: String::new(),
            sort: SortState::default(),
            page: PageState::new(page_size),
            view: ViewResult::default(),
            table_state: TableState::default(),
            selected_column: 0,
            loading: false,
            error: None,
            loaded_at: None,
        };
        pane.refresh();
        pane
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Recompute the view from the current inputs and clamp the row
    /// selection onto the served page.
    pub fn refresh(&mut self) {
        self.view = compute_view(&self.rows, &self.search, &self.sort, &self.page);
        self.page.page = self.view.page;
        if self.view.page_items.is_empty() {
            self.table_state.select(None);
        } else {
            let selected = self
                .table_state
                .selected()
                .unwrap_or(0)
                .min(self.view.page_items.len() - 1);
            self.table_state.select(Some(selected));
        }
    }

    fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        self.generation
    }

    fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
        self.version += 1;
        self.loading = false;
        self.error = None;
        self.loaded_at = Some(Local::now());
        self.page.reset();
        self.refresh();
    }

    fn fail(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
    }

    pub fn set_search(&mut self, search: String) {
        if self.search == search {
            return;
        }
        self.search = search;
        self.page.reset();
        self.refresh();
    }

    pub fn toggle_sort_on_selected(&mut self) {
        if let Some(column) = self.columns.get(self.selected_column) {
            self.sort.toggle(column.key);
            self.page.reset();
            self.refresh();
        }
    }

    pub fn clear_sort(&mut self) {
        self.sort.clear();
        self.page.reset();
        self.refresh();
    }

    pub fn next_page(&mut self) {
        if self.page.page < self.view.total_pages {
            self.page.page += 1;
            self.refresh();
        }
    }

    pub fn prev_page(&mut self) {
        if self.page.page > 1 {
            self.page.page -= 1;
            self.refresh();
        }
    }

    pub fn first_page(&mut self) {
        self.page.reset();
        self.refresh();
    }

    pub fn last_page(&mut self) {
        self.page.page = self.view.total_pages;
        self.refresh();
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page.set_page_size(page_size);
        self.refresh();
    }

    pub fn select_next_row(&mut self) {
        if let Some(selected) = self.table_state.selected() {
            if selected + 1 < self.view.page_items.len() {
                self.table_state.select(Some(selected + 1));
            }
        }
    }

    pub fn select_prev_row(&mut self) {
        if let Some(selected) = self.table_state.selected() {
            self.table_state.select(Some(selected.saturating_sub(1)));
        }
    }

    pub fn select_next_column(&mut self) {
        if self.selected_column + 1 < self.columns.len() {
            self.selected_column += 1;
        }
    }

    pub fn select_prev_column(&mut self) {
        self.selected_column = self.selected_column.saturating_sub(1);
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.table_state
            .selected()
            .and_then(|index| self.view.page_items.get(index))
    }
}

/// KPI dashboard container: stats tiles, one aggregate series, and the
/// distinct-values map backing the filter selector. Owns its own fetch
/// triple, independent of the table panes.
pub struct DashboardPane {
    pub dataset: Dataset,
    pub generation: u64,
    pub stats: Option<BTreeMap<String, f64>>,
    pub aggregates: Vec<CategoryCount>,
    pub chart: Vec<ChartDatum>,
    pub distinct: BTreeMap<String, Vec<String>>,
    pub group_index: usize,
    /// Index into `distinct` keys; None means no filter.
    pub filter_field_index: Option<usize>,
    pub filter_value_index: usize,
    pub selected_bar: usize,
    pub loading: bool,
    pub error: Option<String>,
}

impl DashboardPane {
    fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            generation: 0,
            stats: None,
            aggregates: Vec::new(),
            chart: Vec::new(),
            distinct: BTreeMap::new(),
            group_index: 0,
            filter_field_index: None,
            filter_value_index: 0,
            selected_bar: 0,
            loading: false,
            error: None,
        }
    }

    fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        self.generation
    }

    pub fn group_field(&self) -> &'static str {
        let fields = self.dataset.group_fields();
        fields[self.group_index % fields.len()]
    }

    /// Active filter as (field, value), resolved against the distinct map.
    pub fn filter(&self) -> Option<(String, String)> {
        let field_index = self.filter_field_index?;
        let (field, values) = self.distinct.iter().nth(field_index)?;
        let value = values.get(self.filter_value_index)?;
        Some((field.clone(), value.clone()))
    }

    pub fn cycle_group(&mut self) {
        self.group_index = (self.group_index + 1) % self.dataset.group_fields().len();
        self.selected_bar = 0;
    }

    /// Cycle the filter field through "no filter" and each distinct field.
    pub fn cycle_filter_field(&mut self) {
        if self.distinct.is_empty() {
            return;
        }
        self.filter_value_index = 0;
        self.filter_field_index = match self.filter_field_index {
            None => Some(0),
            Some(index) if index + 1 < self.distinct.len() => Some(index + 1),
            Some(_) => None,
        };
    }

    pub fn cycle_filter_value(&mut self) {
        if let Some(field_index) = self.filter_field_index {
            if let Some((_, values)) = self.distinct.iter().nth(field_index) {
                if !values.is_empty() {
                    self.filter_value_index = (self.filter_value_index + 1) % values.len();
                }
            }
        }
    }

    fn set_stats(&mut self, stats: BTreeMap<String, f64>) {
        self.stats = Some(stats);
    }

    fn set_aggregates(&mut self, aggregates: Vec<CategoryCount>) {
        self.chart = map_to_chart_data(&aggregates);
        self.aggregates = aggregates;
        self.loading = false;
        self.error = None;
        if !self.chart.is_empty() {
            self.selected_bar = self.selected_bar.min(self.chart.len() - 1);
        } else {
            self.selected_bar = 0;
        }
    }

    fn fail(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
    }

    pub fn select_next_bar(&mut self) {
        if self.selected_bar + 1 < self.chart.len() {
            self.selected_bar += 1;
        }
    }

    pub fn select_prev_bar(&mut self) {
        self.selected_bar = self.selected_bar.saturating_sub(1);
    }

    pub fn selected_datum(&self) -> Option<&ChartDatum> {
        self.chart.get(self.selected_bar)
    }
}

/// Event, frame and key counters rendered as a strip when --debug is on.
#[derive(Default)]
pub struct DebugState {
    pub enabled: bool,
    num_events: u64,
    num_frames: u64,
    last_key: String,
}

impl DebugState {
    fn on_key(&mut self, event: &KeyEvent) {
        self.last_key = format!("{:?}", event.code);
    }

    fn line(&self, pane: &TablePane) -> String {
        format!(
            "events: {} | frames: {} | last key: {} | {}: {} lignes (v{})",
            self.num_events,
            self.num_frames,
            self.last_key,
            pane.dataset.path(),
            pane.rows.len(),
            pane.version,
        )
    }
}

struct DetailState {
    projection: DetailProjection,
    title: String,
    scroll: usize,
}

pub struct App {
    events: Sender<AppEvent>,
    client: PegasusClient,
    pub active: ActiveView,
    panes: [TablePane; 4],
    pub dashboard: DashboardPane,
    pub input_mode: InputMode,
    input: TextInput,
    detail: Option<DetailState>,
    show_help: bool,
    debug: DebugState,
    theme: Theme,
    config: AppConfig,
}

impl App {
    pub fn new(events: Sender<AppEvent>, client: PegasusClient) -> App {
        let theme = Theme::from_config(&AppConfig::default().theme).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to create default theme: {e}. Using fallback.");
            Theme {
                colors: std::collections::HashMap::new(),
            }
        });
        Self::new_with_config(events, client, theme, AppConfig::default())
    }

    pub fn new_with_config(
        events: Sender<AppEvent>,
        client: PegasusClient,
        theme: Theme,
        config: AppConfig,
    ) -> App {
        let page_size = config.display.page_size;
        let input = TextInput::new()
            .with_text_color(theme.get("text_primary"))
            .with_background(theme.get("background"));
        App {
            events,
            client,
            active: ActiveView::Table(Dataset::Sites),
            panes: [
                TablePane::new(Dataset::Sites, page_size),
                TablePane::new(Dataset::Trb, page_size),
                TablePane::new(Dataset::Pmwo, page_size),
                TablePane::new(Dataset::Swo, page_size),
            ],
            dashboard: DashboardPane::new(Dataset::Sites),
            input_mode: InputMode::default(),
            input,
            detail: None,
            show_help: false,
            debug: DebugState::default(),
            theme,
            config,
        }
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn pane(&self, dataset: Dataset) -> &TablePane {
        &self.panes[dataset.index()]
    }

    pub fn pane_mut(&mut self, dataset: Dataset) -> &mut TablePane {
        &mut self.panes[dataset.index()]
    }

    pub fn send_event(&self, event: AppEvent) {
        let _ = self.events.send(event);
    }

    fn color(&self, name: &str) -> ratatui::style::Color {
        self.theme.get(name)
    }

    /// Switch views, kicking off a first load when the target has no data.
    fn activate(&mut self, view: ActiveView) -> Option<AppEvent> {
        self.active = view;
        self.input_mode = InputMode::Normal;
        match view {
            ActiveView::Table(dataset) => {
                let pane = self.pane(dataset);
                if pane.rows.is_empty() && !pane.loading && pane.error.is_none() {
                    return Some(AppEvent::Load(dataset));
                }
            }
            ActiveView::Dashboard => {
                let pane = &self.dashboard;
                if pane.aggregates.is_empty() && !pane.loading && pane.error.is_none() {
                    return Some(AppEvent::LoadDashboard);
                }
            }
        }
        None
    }

    fn view_index(&self) -> usize {
        match self.active {
            ActiveView::Table(dataset) => dataset.index(),
            ActiveView::Dashboard => Dataset::ALL.len(),
        }
    }

    fn view_at(index: usize) -> ActiveView {
        match Dataset::ALL.get(index) {
            Some(dataset) => ActiveView::Table(*dataset),
            None => ActiveView::Dashboard,
        }
    }

    fn cycle_view(&mut self, forward: bool) -> Option<AppEvent> {
        let count = Dataset::ALL.len() + 1;
        let current = self.view_index();
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        self.activate(Self::view_at(next))
    }

    fn open_detail(&mut self) {
        if let ActiveView::Table(dataset) = self.active {
            let pane = self.pane(dataset);
            if let Some(row) = pane.selected_row() {
                let projection = project_detail(row, &pane.columns);
                let title = match &projection.summary {
                    Some(summary) => format!("{} — {}", dataset.title(), summary),
                    None => dataset.title().to_string(),
                };
                self.detail = Some(DetailState {
                    projection,
                    title,
                    scroll: 0,
                });
            }
        }
    }

    /// Jump from a dashboard bar to the backing rows: the category value
    /// becomes the table search.
    fn drill_through(&mut self) -> Option<AppEvent> {
        let dataset = self.dashboard.dataset;
        let category = self.dashboard.selected_datum()?.meta.category.clone();
        let pane = self.pane_mut(dataset);
        pane.set_search(category);
        self.activate(ActiveView::Table(dataset))
    }

    fn spawn_rows_fetch(&self, dataset: Dataset, generation: u64) {
        let client = self.client.clone();
        let events = self.events.clone();
        std::thread::spawn(move || {
            let result = client.list_rows(dataset);
            let _ = events.send(AppEvent::RowsLoaded {
                dataset,
                generation,
                result,
            });
        });
    }

    fn spawn_dashboard_fetch(&self, generation: u64, include_distinct: bool) {
        let client = self.client.clone();
        let events = self.events.clone();
        let dataset = self.dashboard.dataset;
        let group_field = self.dashboard.group_field().to_string();
        let filter = self.dashboard.filter();
        std::thread::spawn(move || {
            let result = client.stats(dataset);
            let _ = events.send(AppEvent::StatsLoaded { generation, result });

            let filter_ref = filter
                .as_ref()
                .map(|(field, value)| (field.as_str(), value.as_str()));
            let result = client.aggregate(dataset, &group_field, filter_ref);
            let _ = events.send(AppEvent::AggregateLoaded { generation, result });

            if include_distinct {
                let result = client.distinct(dataset);
                let _ = events.send(AppEvent::DistinctLoaded { generation, result });
            }
        });
    }

    fn spawn_aggregate_fetch(&self, generation: u64) {
        let client = self.client.clone();
        let events = self.events.clone();
        let dataset = self.dashboard.dataset;
        let group_field = self.dashboard.group_field().to_string();
        let filter = self.dashboard.filter();
        std::thread::spawn(move || {
            let filter_ref = filter
                .as_ref()
                .map(|(field, value)| (field.as_str(), value.as_str()));
            let result = client.aggregate(dataset, &group_field, filter_ref);
            let _ = events.send(AppEvent::AggregateLoaded { generation, result });
        });
    }

    /// Restart the dashboard aggregate fetch after a selector change.
    fn reload_aggregates(&mut self) -> Option<AppEvent> {
        let generation = self.dashboard.begin_load();
        Some(AppEvent::DoFetchAggregate(generation))
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Resize(_, _) => None,
            AppEvent::Load(dataset) => {
                let generation = self.pane_mut(*dataset).begin_load();
                Some(AppEvent::DoFetchRows(*dataset, generation))
            }
            AppEvent::DoFetchRows(dataset, generation) => {
                self.spawn_rows_fetch(*dataset, *generation);
                None
            }
            AppEvent::LoadDashboard => {
                let generation = self.dashboard.begin_load();
                Some(AppEvent::DoFetchDashboard(generation))
            }
            AppEvent::DoFetchDashboard(generation) => {
                let include_distinct = self.dashboard.distinct.is_empty();
                self.spawn_dashboard_fetch(*generation, include_distinct);
                None
            }
            AppEvent::DoFetchAggregate(generation) => {
                self.spawn_aggregate_fetch(*generation);
                None
            }
            AppEvent::RowsLoaded {
                dataset,
                generation,
                result,
            } => {
                let pane = self.pane_mut(*dataset);
                if *generation != pane.generation {
                    debug!(
                        "réponse périmée ignorée: {} (génération {} < {})",
                        dataset.path(),
                        generation,
                        pane.generation
                    );
                    return None;
                }
                match result {
                    Ok(rows) => pane.set_rows(rows.clone()),
                    Err(error) => pane.fail(error.to_string()),
                }
                None
            }
            AppEvent::StatsLoaded { generation, result } => {
                if *generation != self.dashboard.generation {
                    return None;
                }
                match result {
                    Ok(stats) => self.dashboard.set_stats(stats.clone()),
                    Err(error) => self.dashboard.fail(error.to_string()),
                }
                None
            }
            AppEvent::AggregateLoaded { generation, result } => {
                if *generation != self.dashboard.generation {
                    debug!(
                        "agrégats périmés ignorés (génération {} < {})",
                        generation, self.dashboard.generation
                    );
                    return None;
                }
                match result {
                    Ok(aggregates) => self.dashboard.set_aggregates(aggregates.clone()),
                    Err(error) => self.dashboard.fail(error.to_string()),
                }
                None
            }
            AppEvent::DistinctLoaded { generation, result } => {
                if *generation != self.dashboard.generation {
                    return None;
                }
                match result {
                    Ok(distinct) => self.dashboard.distinct = distinct.clone(),
                    // The dashboard still works without filters.
                    Err(error) => debug!("valeurs distinctes indisponibles: {error}"),
                }
                None
            }
            _ => None,
        }
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        self.debug.on_key(event);

        // Detail modal has priority over everything else.
        if self.detail.is_some() {
            if matches!(event.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.detail = None;
            } else if let Some(detail) = &mut self.detail {
                let max = DetailModal::content_height(&detail.projection).saturating_sub(1);
                match event.code {
                    KeyCode::Down | KeyCode::Char('j') => {
                        detail.scroll = (detail.scroll + 1).min(max);
                    }
                    KeyCode::Up | KeyCode::Char('k') => {
                        detail.scroll = detail.scroll.saturating_sub(1);
                    }
                    KeyCode::PageDown => {
                        detail.scroll = (detail.scroll + 10).min(max);
                    }
                    KeyCode::PageUp => {
                        detail.scroll = detail.scroll.saturating_sub(10);
                    }
                    _ => {}
                }
            }
            return None;
        }

        if self.show_help {
            if matches!(event.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return None;
        }

        if self.input_mode == InputMode::Searching {
            match self.input.handle_key(event) {
                TextInputEvent::Changed => {
                    if let ActiveView::Table(dataset) = self.active {
                        let search = self.input.value().to_string();
                        self.pane_mut(dataset).set_search(search);
                    }
                }
                TextInputEvent::Submit => {
                    self.input_mode = InputMode::Normal;
                    self.input.set_focused(false);
                }
                TextInputEvent::Cancel => {
                    // Esc drops the search entirely.
                    self.input.clear();
                    if let ActiveView::Table(dataset) = self.active {
                        self.pane_mut(dataset).set_search(String::new());
                    }
                    self.input_mode = InputMode::Normal;
                    self.input.set_focused(false);
                }
                TextInputEvent::None => {}
            }
            return None;
        }

        match event.code {
            KeyCode::Char('q') => return Some(AppEvent::Exit),
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                return Some(AppEvent::Exit)
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                return None;
            }
            KeyCode::Char('1') => return self.activate(ActiveView::Table(Dataset::Sites)),
            KeyCode::Char('2') => return self.activate(ActiveView::Table(Dataset::Trb)),
            KeyCode::Char('3') => return self.activate(ActiveView::Table(Dataset::Pmwo)),
            KeyCode::Char('4') => return self.activate(ActiveView::Table(Dataset::Swo)),
            KeyCode::Char('5') | KeyCode::Char('d') => return self.activate(ActiveView::Dashboard),
            KeyCode::Tab => return self.cycle_view(true),
            KeyCode::BackTab => return self.cycle_view(false),
            _ => {}
        }

        match self.active {
            ActiveView::Table(dataset) => self.table_key(dataset, event),
            ActiveView::Dashboard => self.dashboard_key(event),
        }
    }

    fn table_key(&mut self, dataset: Dataset, event: &KeyEvent) -> Option<AppEvent> {
        match event.code {
            KeyCode::Char('/') => {
                let search = self.pane(dataset).search.clone();
                self.input.set_value(search);
                self.input.set_focused(true);
                self.input_mode = InputMode::Searching;
            }
            KeyCode::Char('r') => return Some(AppEvent::Load(dataset)),
            KeyCode::Char('s') => self.pane_mut(dataset).toggle_sort_on_selected(),
            KeyCode::Char('S') => self.pane_mut(dataset).clear_sort(),
            KeyCode::Left | KeyCode::Char('h') => self.pane_mut(dataset).select_prev_column(),
            KeyCode::Right | KeyCode::Char('l') => self.pane_mut(dataset).select_next_column(),
            KeyCode::Up | KeyCode::Char('k') => self.pane_mut(dataset).select_prev_row(),
            KeyCode::Down | KeyCode::Char('j') => self.pane_mut(dataset).select_next_row(),
            KeyCode::Char('n') | KeyCode::PageDown => self.pane_mut(dataset).next_page(),
            KeyCode::Char('p') | KeyCode::PageUp => self.pane_mut(dataset).prev_page(),
            KeyCode::Home => self.pane_mut(dataset).first_page(),
            KeyCode::End => self.pane_mut(dataset).last_page(),
            KeyCode::Char('[') => {
                let page_size = self.pane(dataset).page.page_size.saturating_sub(10).max(10);
                self.pane_mut(dataset).set_page_size(page_size);
            }
            KeyCode::Char(']') => {
                let page_size = (self.pane(dataset).page.page_size + 10).min(500);
                self.pane_mut(dataset).set_page_size(page_size);
            }
            KeyCode::Enter => self.open_detail(),
            KeyCode::Esc => {
                if !self.pane(dataset).search.is_empty() {
                    self.input.clear();
                    self.pane_mut(dataset).set_search(String::new());
                }
            }
            _ => {}
        }
        None
    }

    fn dashboard_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        match event.code {
            KeyCode::Char('r') => return Some(AppEvent::LoadDashboard),
            KeyCode::Left | KeyCode::Char('h') => self.dashboard.select_prev_bar(),
            KeyCode::Right | KeyCode::Char('l') => self.dashboard.select_next_bar(),
            KeyCode::Char('g') => {
                self.dashboard.cycle_group();
                return self.reload_aggregates();
            }
            KeyCode::Char('f') => {
                self.dashboard.cycle_filter_field();
                return self.reload_aggregates();
            }
            KeyCode::Char('v') => {
                if self.dashboard.filter_field_index.is_some() {
                    self.dashboard.cycle_filter_value();
                    return self.reload_aggregates();
                }
            }
            KeyCode::Enter => return self.drill_through(),
            _ => {}
        }
        None
    }

    fn render_tabs(&self, area: Rect, buf: &mut Buffer) {
        let mut titles: Vec<String> = Dataset::ALL
            .iter()
            .enumerate()
            .map(|(index, dataset)| format!("{} {}", index + 1, dataset.title()))
            .collect();
        titles.push("5 Dashboard".to_string());

        let layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Fill(1), Constraint::Length(16)])
            .split(area);

        Tabs::new(titles)
            .select(self.view_index())
            .style(Style::default().fg(self.color("text_secondary")))
            .highlight_style(
                Style::default()
                    .fg(self.color("primary"))
                    .add_modifier(Modifier::BOLD),
            )
            .render(layout[0], buf);

        if let ActiveView::Table(dataset) = self.active {
            if let Some(loaded_at) = self.pane(dataset).loaded_at {
                Paragraph::new(format!("MAJ {}", loaded_at.format("%H:%M:%S")))
                    .style(Style::default().fg(self.color("text_secondary")))
                    .right_aligned()
                    .render(layout[1], buf);
            }
        }
    }

    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let lines = [
            "1-4        Vues Sites / TRB / PMWO / SWO",
            "5, d       Dashboard KPI",
            "Tab        Vue suivante",
            "/          Recherche plein texte (toutes colonnes)",
            "←/→        Choisir une colonne",
            "s          Trier sur la colonne choisie (re-appui: inverse)",
            "S          Annuler le tri",
            "n/p        Page suivante / précédente",
            "[ ]        Taille de page -10 / +10",
            "↑/↓        Sélectionner une ligne",
            "Entrée     Détail de la ligne",
            "r          Recharger la vue",
            "",
            "Dashboard:",
            "g          Changer le champ de regroupement",
            "f          Changer le champ de filtre",
            "v          Changer la valeur du filtre",
            "Entrée     Ouvrir la table filtrée sur la barre choisie",
            "",
            "Esc ferme cette aide.",
        ];

        let height = (lines.len() as u16 + 2).min(area.height);
        let width = 60u16.min(area.width);
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(height),
                Constraint::Fill(1),
            ])
            .split(area);
        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(width),
                Constraint::Fill(1),
            ])
            .split(vertical[1]);
        let help_area = horizontal[1];

        Clear.render(help_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.color("modal_border")))
            .title(" Aide ");
        let inner = block.inner(help_area);
        block.render(help_area, buf);

        let text: Vec<Line> = lines.iter().map(|line| Line::from(*line)).collect();
        Paragraph::new(text)
            .style(Style::default().fg(self.color("text_primary")))
            .render(inner, buf);
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;

        Block::default()
            .style(Style::default().bg(self.theme.get("background")))
            .render(area, buf);

        let mut constraints = vec![Constraint::Length(1), Constraint::Fill(1)];
        if self.input_mode == InputMode::Searching {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Length(1)); // Controls
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        self.render_tabs(layout[0], buf);
        let main_area = layout[1];

        // Extract colors before the mutable pane borrows below.
        let header_bg = self.color("table_header_bg");
        let header_fg = self.color("table_header");
        let error_fg = self.color("error");
        let dimmed_fg = self.color("dimmed");
        let modal_border = self.color("modal_border");
        let text_secondary = self.color("text_secondary");
        let text_primary = self.color("text_primary");
        let tile_value = self.color("tile_value");
        let bar = self.color("bar");
        let bar_selected = self.color("bar_selected");

        let row_numbers = self.config.display.row_numbers;
        let mut controls = Controls::new().with_dimmed(self.show_help || self.detail.is_some());

        match self.active {
            ActiveView::Table(dataset) => {
                let pane = &mut self.panes[dataset.index()];
                controls = controls
                    .with_page(pane.view.page, pane.view.total_pages)
                    .with_row_count(pane.view.total_filtered)
                    .with_search_active(!pane.search.is_empty());
                let row_offset = (pane.view.page - 1) * pane.page.page_size;
                let widget = DataTable::new(&pane.columns, &pane.view, &pane.sort)
                    .with_error(pane.error.as_deref())
                    .with_loading(pane.loading)
                    .with_filtered(!pane.search.is_empty())
                    .with_selected_column(pane.selected_column)
                    .with_row_numbers(row_numbers, row_offset)
                    .with_colors(header_bg, header_fg, error_fg, dimmed_fg);
                ratatui::widgets::StatefulWidget::render(
                    widget,
                    main_area,
                    buf,
                    &mut pane.table_state,
                );
            }
            ActiveView::Dashboard => {
                let pane = &self.dashboard;
                let filter = pane.filter();
                let filter_ref = filter
                    .as_ref()
                    .map(|(field, value)| (field.as_str(), value.as_str()));
                Dashboard::new(&pane.chart, pane.group_field())
                    .with_stats(pane.stats.as_ref())
                    .with_filter(filter_ref)
                    .with_selected_bar(pane.selected_bar)
                    .with_error(pane.error.as_deref())
                    .with_loading(pane.loading)
                    .with_colors(
                        tile_value,
                        bar,
                        bar_selected,
                        modal_border,
                        text_primary,
                        dimmed_fg,
                        error_fg,
                    )
                    .render(main_area, buf);
            }
        }

        let mut controls_area = layout[2];
        if self.input_mode == InputMode::Searching {
            let input_area = layout[2];
            controls_area = layout[3];

            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(modal_border))
                .title(" Recherche ");
            let inner = block.inner(input_area);
            block.render(input_area, buf);
            (&self.input).render(inner, buf);
        }

        (&controls).render(controls_area, buf);

        if self.debug.enabled {
            let debug_area = layout[layout.len() - 1];
            let pane = match self.active {
                ActiveView::Table(dataset) => self.pane(dataset),
                ActiveView::Dashboard => self.pane(self.dashboard.dataset),
            };
            Paragraph::new(self.debug.line(pane))
                .style(Style::default().fg(text_secondary))
                .render(debug_area, buf);
        }

        if let Some(detail) = &self.detail {
            DetailModal::new(&detail.projection, &detail.title)
                .with_scroll(detail.scroll)
                .with_colors(modal_border, text_secondary, text_primary, dimmed_fg)
                .render(area, buf);
        }

        if self.show_help {
            self.render_help(area, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    fn test_app() -> App {
        let (tx, _rx) = channel();
        let client = PegasusClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        App::new(tx, client)
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("site_id".to_string(), json!(format!("KIN{i:03}")));
                row.insert("province".to_string(), json!("Kinshasa"));
                row
            })
            .collect()
    }

    #[test]
    fn load_bumps_generation_and_marks_loading() {
        let mut app = test_app();
        let next = app.event(&AppEvent::Load(Dataset::Sites));
        assert!(matches!(next, Some(AppEvent::DoFetchRows(Dataset::Sites, 1))));
        assert!(app.pane(Dataset::Sites).loading);
    }

    #[test]
    fn stale_rows_are_discarded() {
        let mut app = test_app();
        app.event(&AppEvent::Load(Dataset::Sites));
        app.event(&AppEvent::Load(Dataset::Sites));
        assert_eq!(app.pane(Dataset::Sites).generation, 2);

        // First response arrives late; it must not land.
        app.event(&AppEvent::RowsLoaded {
            dataset: Dataset::Sites,
            generation: 1,
            result: Ok(rows(3)),
        });
        assert!(app.pane(Dataset::Sites).rows().is_empty());
        assert!(app.pane(Dataset::Sites).loading);

        app.event(&AppEvent::RowsLoaded {
            dataset: Dataset::Sites,
            generation: 2,
            result: Ok(rows(3)),
        });
        assert_eq!(app.pane(Dataset::Sites).rows().len(), 3);
        assert!(!app.pane(Dataset::Sites).loading);
    }

    #[test]
    fn failed_fetch_surfaces_error_string() {
        let mut app = test_app();
        app.event(&AppEvent::Load(Dataset::Trb));
        app.event(&AppEvent::RowsLoaded {
            dataset: Dataset::Trb,
            generation: 1,
            result: Err(ApiError::Status {
                status: 502,
                url: "http://x/api/v1/trb/".to_string(),
            }),
        });
        let pane = app.pane(Dataset::Trb);
        assert!(!pane.loading);
        assert!(pane.error.as_deref().unwrap_or("").contains("502"));
    }

    #[test]
    fn reload_resets_page_even_with_identical_rows() {
        let mut app = test_app();
        app.event(&AppEvent::Load(Dataset::Sites));
        app.event(&AppEvent::RowsLoaded {
            dataset: Dataset::Sites,
            generation: 1,
            result: Ok(rows(120)),
        });
        let pane = app.pane_mut(Dataset::Sites);
        pane.next_page();
        assert_eq!(pane.page.page, 2);
        let version = pane.version;

        app.event(&AppEvent::Load(Dataset::Sites));
        app.event(&AppEvent::RowsLoaded {
            dataset: Dataset::Sites,
            generation: 2,
            result: Ok(rows(120)),
        });
        let pane = app.pane(Dataset::Sites);
        assert_eq!(pane.version, version + 1);
        assert_eq!(pane.page.page, 1);
    }
}
