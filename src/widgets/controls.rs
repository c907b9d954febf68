use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

/// Bottom key-hint strip, with the current page and row counts on the
/// right when a table view is active.
#[derive(Default)]
pub struct Controls {
    pub page: Option<(usize, usize)>,
    pub row_count: Option<usize>,
    pub dimmed: bool,
    pub search_active: bool,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: usize, total_pages: usize) -> Self {
        self.page = Some((page, total_pages));
        self
    }

    pub fn with_row_count(mut self, row_count: usize) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    pub fn with_search_active(mut self, search_active: bool) -> Self {
        self.search_active = search_active;
        self
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        const CONTROLS: [(&str, &str); 8] = [
            ("/", "Recherche"),
            ("s", "Tri"),
            ("↵", "Détail"),
            ("n/p", "Page"),
            ("r", "Recharger"),
            ("1-5", "Vues"),
            ("?", "Aide"),
            ("q", "Quitter"),
        ];

        let mut constraints = CONTROLS.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });

        // Space for "Page 12/34 · 12345 lignes"
        if self.page.is_some() || self.row_count.is_some() {
            constraints.push(Constraint::Length(28));
        }
        constraints.push(Constraint::Fill(1));

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);
        let color = Color::DarkGray;

        let base_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        for (i, (key, action)) in CONTROLS.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(base_style.bold())
                .centered()
                .render(layout[j], buf);
            // Highlight the search hint while a search is narrowing the view
            let action_style = if *action == "Recherche" && self.search_active {
                base_style.bg(color).fg(Color::Cyan)
            } else {
                base_style.bg(color)
            };
            Paragraph::new(*action)
                .style(action_style)
                .render(layout[j + 1], buf);
        }

        let mut fill_start_idx = CONTROLS.len() * 2;
        if self.page.is_some() || self.row_count.is_some() {
            let mut parts: Vec<String> = Vec::new();
            if let Some((page, total)) = self.page {
                parts.push(format!("Page {page}/{total}"));
            }
            if let Some(count) = self.row_count {
                parts.push(format!("{count} lignes"));
            }
            Paragraph::new(parts.join(" · "))
                .style(base_style.bg(color).fg(if self.dimmed {
                    Color::DarkGray
                } else {
                    Color::White
                }))
                .right_aligned()
                .render(layout[fill_start_idx], buf);
            fill_start_idx += 1;
        }

        Paragraph::new("")
            .style(base_style.bg(color))
            .render(layout[fill_start_idx], buf);
    }
}
