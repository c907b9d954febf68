use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph, Widget},
};

use crate::detail::{DetailField, DetailProjection};

/// Centered modal showing one projected row: the spec'd fields first, then
/// the rest under a separator. Multi-line values are printed as indented
/// blocks. Scrolls with the offset kept by the app.
pub struct DetailModal<'a> {
    projection: &'a DetailProjection,
    title: &'a str,
    scroll: usize,
    border_color: Color,
    label_color: Color,
    text_color: Color,
    dimmed_color: Color,
}

impl<'a> DetailModal<'a> {
    pub fn new(projection: &'a DetailProjection, title: &'a str) -> Self {
        Self {
            projection,
            title,
            scroll: 0,
            border_color: Color::Cyan,
            label_color: Color::DarkGray,
            text_color: Color::White,
            dimmed_color: Color::DarkGray,
        }
    }

    pub fn with_scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn with_colors(
        mut self,
        border_color: Color,
        label_color: Color,
        text_color: Color,
        dimmed_color: Color,
    ) -> Self {
        self.border_color = border_color;
        self.label_color = label_color;
        self.text_color = text_color;
        self.dimmed_color = dimmed_color;
        self
    }

    /// Total content height in lines, used by the app to clamp scrolling.
    pub fn content_height(projection: &DetailProjection) -> usize {
        let field_lines = |fields: &[DetailField]| {
            fields
                .iter()
                .map(|field| {
                    if field.value.is_multi_line() {
                        1 + field.value.text().lines().count()
                    } else {
                        1
                    }
                })
                .sum::<usize>()
        };
        let mut height = field_lines(&projection.primary);
        if !projection.remaining.is_empty() {
            height += 2 + field_lines(&projection.remaining);
        }
        height
    }

    fn push_field_lines(&self, lines: &mut Vec<Line<'a>>, field: &'a DetailField, label_width: usize) {
        let label = format!("{:label_width$}", field.label);
        if field.value.is_multi_line() {
            lines.push(Line::from(vec![Span::styled(
                label,
                Style::default().fg(self.label_color),
            )]));
            for text_line in field.value.text().lines() {
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(text_line, Style::default().fg(self.text_color)),
                ]));
            }
        } else {
            lines.push(Line::from(vec![
                Span::styled(label, Style::default().fg(self.label_color)),
                Span::raw(" "),
                Span::styled(field.value.text(), Style::default().fg(self.text_color)),
            ]));
        }
    }
}

impl Widget for DetailModal<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Center the modal: 2/3 width, 3/4 height.
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Fill(1),
                Constraint::Percentage(75),
                Constraint::Fill(1),
            ])
            .split(area);
        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Fill(1),
                Constraint::Percentage(66),
                Constraint::Fill(1),
            ])
            .split(vertical[1]);
        let modal_area = horizontal[1];

        Clear.render(modal_area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.border_color))
            .padding(Padding::horizontal(1))
            .title(format!(" {} ", self.title));
        let inner = block.inner(modal_area);
        block.render(modal_area, buf);

        if self.projection.is_empty() {
            Paragraph::new("Rien à afficher")
                .centered()
                .style(Style::default().fg(self.dimmed_color))
                .render(inner, buf);
            return;
        }

        let label_width = self
            .projection
            .primary
            .iter()
            .chain(self.projection.remaining.iter())
            .map(|field| field.label.chars().count())
            .max()
            .unwrap_or(0);

        let mut lines: Vec<Line> = Vec::new();
        for field in &self.projection.primary {
            self.push_field_lines(&mut lines, field, label_width);
        }
        if !self.projection.remaining.is_empty() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                "Autres champs",
                Style::default()
                    .fg(self.dimmed_color)
                    .add_modifier(Modifier::BOLD),
            )));
            for field in &self.projection.remaining {
                self.push_field_lines(&mut lines, field, label_width);
            }
        }

        let visible: Vec<Line> = lines
            .into_iter()
            .skip(self.scroll)
            .take(inner.height as usize)
            .collect();
        Paragraph::new(visible).render(inner, buf);
    }
}
