use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Padding, Paragraph, Widget},
};
use std::collections::BTreeMap;

use crate::chart_data::{format_percent_label, ChartDatum};
use crate::detail::label_from_key;

const TILE_HEIGHT: u16 = 4;
const MAX_TILES: usize = 6;
const BAR_WIDTH: u16 = 9;

/// KPI dashboard: a row of stat tiles over a category bar chart, with the
/// group-by field and active filter shown above the chart. All numbers are
/// backend aggregates; nothing is counted here.
pub struct Dashboard<'a> {
    stats: Option<&'a BTreeMap<String, f64>>,
    chart: &'a [ChartDatum],
    group_field: &'a str,
    filter: Option<(&'a str, &'a str)>,
    selected_bar: usize,
    error: Option<&'a str>,
    loading: bool,
    tile_value_color: Color,
    bar_color: Color,
    bar_selected_color: Color,
    border_color: Color,
    text_color: Color,
    dimmed_color: Color,
    error_color: Color,
}

impl<'a> Dashboard<'a> {
    pub fn new(chart: &'a [ChartDatum], group_field: &'a str) -> Self {
        Self {
            stats: None,
            chart,
            group_field,
            filter: None,
            selected_bar: 0,
            error: None,
            loading: false,
            tile_value_color: Color::Cyan,
            bar_color: Color::Cyan,
            bar_selected_color: Color::Yellow,
            border_color: Color::Cyan,
            text_color: Color::White,
            dimmed_color: Color::DarkGray,
            error_color: Color::Red,
        }
    }

    pub fn with_stats(mut self, stats: Option<&'a BTreeMap<String, f64>>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_filter(mut self, filter: Option<(&'a str, &'a str)>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_selected_bar(mut self, selected_bar: usize) -> Self {
        self.selected_bar = selected_bar;
        self
    }

    pub fn with_error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    pub fn with_loading(mut self, loading: bool) -> Self {
        self.loading = loading;
        self
    }

    pub fn with_colors(
        mut self,
        tile_value_color: Color,
        bar_color: Color,
        bar_selected_color: Color,
        border_color: Color,
        text_color: Color,
        dimmed_color: Color,
        error_color: Color,
    ) -> Self {
        self.tile_value_color = tile_value_color;
        self.bar_color = bar_color;
        self.bar_selected_color = bar_selected_color;
        self.border_color = border_color;
        self.text_color = text_color;
        self.dimmed_color = dimmed_color;
        self.error_color = error_color;
        self
    }

    fn render_tiles(&self, area: Rect, buf: &mut Buffer) {
        let stats = match self.stats {
            Some(stats) if !stats.is_empty() => stats,
            _ => {
                let message = if self.loading { "Chargement…" } else { "Aucune statistique" };
                Paragraph::new(message)
                    .style(Style::default().fg(self.dimmed_color))
                    .render(area, buf);
                return;
            }
        };

        let tiles: Vec<(&String, &f64)> = stats.iter().take(MAX_TILES).collect();
        let constraints: Vec<Constraint> =
            tiles.iter().map(|_| Constraint::Fill(1)).collect();
        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        for (index, (name, value)) in tiles.iter().enumerate() {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.border_color))
                .title(Span::styled(
                    label_from_key(name),
                    Style::default().fg(self.dimmed_color),
                ));
            let inner = block.inner(layout[index]);
            block.render(layout[index], buf);

            // Ratios print with two decimals, plain counts without any.
            let text = if value.fract() == 0.0 {
                format!("{}", **value as i64)
            } else {
                format!("{value:.2}")
            };
            Paragraph::new(text)
                .centered()
                .style(
                    Style::default()
                        .fg(self.tile_value_color)
                        .add_modifier(Modifier::BOLD),
                )
                .render(inner, buf);
        }
    }

    fn render_chart(&self, area: Rect, buf: &mut Buffer) {
        let mut title_spans = vec![
            Span::styled("Répartition par ", Style::default().fg(self.dimmed_color)),
            Span::styled(
                label_from_key(self.group_field),
                Style::default()
                    .fg(self.text_color)
                    .add_modifier(Modifier::BOLD),
            ),
        ];
        if let Some((field, value)) = self.filter {
            title_spans.push(Span::styled(
                format!("  ({} = {})", label_from_key(field), value),
                Style::default().fg(self.dimmed_color),
            ));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.border_color))
            .padding(Padding::horizontal(1))
            .title(Line::from(title_spans));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.chart.is_empty() {
            let message = if self.loading { "Chargement…" } else { "Aucune donnée" };
            Paragraph::new(message)
                .centered()
                .style(Style::default().fg(self.dimmed_color))
                .render(inner, buf);
            return;
        }

        let total: u64 = self.chart.iter().map(|datum| datum.value).sum();
        // Only as many bars as fit; the selection is clamped by the app.
        let capacity = (inner.width / (BAR_WIDTH + 1)).max(1) as usize;
        let first = self.selected_bar.saturating_sub(capacity.saturating_sub(1));

        let bars: Vec<Bar> = self
            .chart
            .iter()
            .enumerate()
            .skip(first)
            .take(capacity)
            .map(|(index, datum)| {
                let style = if index == self.selected_bar {
                    Style::default().fg(self.bar_selected_color)
                } else {
                    Style::default().fg(self.bar_color)
                };
                Bar::default()
                    .value(datum.value)
                    .text_value(format_percent_label(datum.value, total))
                    .label(Line::from(datum.label.as_str()))
                    .style(style)
            })
            .collect();

        BarChart::default()
            .data(BarGroup::default().bars(&bars))
            .bar_width(BAR_WIDTH)
            .bar_gap(1)
            .render(inner, buf);
    }
}

impl Widget for Dashboard<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if let Some(error) = self.error {
            Paragraph::new(format!("Erreur: {error} (r pour recharger)"))
                .centered()
                .style(Style::default().fg(self.error_color))
                .block(
                    Block::default()
                        .borders(Borders::NONE)
                        .padding(Padding::top(area.height / 2)),
                )
                .wrap(ratatui::widgets::Wrap { trim: true })
                .render(area, buf);
            return;
        }

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(TILE_HEIGHT), Constraint::Fill(1)])
            .split(area);

        self.render_tiles(layout[0], buf);
        self.render_chart(layout[1], buf);
    }
}
