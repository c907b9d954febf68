use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Padding, Paragraph, Row as TableRow, StatefulWidget, Table, TableState, Widget},
};

use crate::view::{Column, SortState, ViewResult};

/// Renders one page of a table pane: column headers with a sort indicator,
/// the page rows, and distinct empty/error placeholders. Selection is
/// tracked with a ratatui TableState owned by the pane.
pub struct DataTable<'a> {
    columns: &'a [Column],
    view: &'a ViewResult,
    sort: &'a SortState,
    error: Option<&'a str>,
    loading: bool,
    filtered: bool,
    selected_column: usize,
    row_numbers: bool,
    /// Absolute index of the first row of the served page.
    row_offset: usize,
    header_fg: Color,
    header_bg: Color,
    error_fg: Color,
    dimmed_fg: Color,
    cell_padding: u16,
}

impl<'a> DataTable<'a> {
    pub fn new(columns: &'a [Column], view: &'a ViewResult, sort: &'a SortState) -> Self {
        Self {
            columns,
            view,
            sort,
            error: None,
            loading: false,
            filtered: false,
            selected_column: 0,
            row_numbers: false,
            row_offset: 0,
            header_fg: Color::White,
            header_bg: Color::Reset,
            error_fg: Color::Red,
            dimmed_fg: Color::DarkGray,
            cell_padding: 1,
        }
    }

    pub fn with_error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    pub fn with_loading(mut self, loading: bool) -> Self {
        self.loading = loading;
        self
    }

    /// Marks that a search is active, so zero rows means "no match" rather
    /// than "no data".
    pub fn with_filtered(mut self, filtered: bool) -> Self {
        self.filtered = filtered;
        self
    }

    pub fn with_selected_column(mut self, selected_column: usize) -> Self {
        self.selected_column = selected_column;
        self
    }

    pub fn with_row_numbers(mut self, row_numbers: bool, row_offset: usize) -> Self {
        self.row_numbers = row_numbers;
        self.row_offset = row_offset;
        self
    }

    pub fn with_colors(mut self, header_bg: Color, header_fg: Color, error_fg: Color, dimmed_fg: Color) -> Self {
        self.header_bg = header_bg;
        self.header_fg = header_fg;
        self.error_fg = error_fg;
        self.dimmed_fg = dimmed_fg;
        self
    }

    fn centered_message(&self, text: &str, fg: Color, area: Rect, buf: &mut Buffer) {
        Paragraph::new(text)
            .centered()
            .style(Style::default().fg(fg))
            .block(
                Block::default()
                    .borders(Borders::NONE)
                    .padding(Padding::top(area.height / 2)),
            )
            .wrap(ratatui::widgets::Wrap { trim: true })
            .render(area, buf);
    }

    fn header_cell(&self, index: usize, column: &Column) -> Span<'a> {
        let sorted = self.sort.key.as_deref() == Some(column.key);
        let mut text = column.label.to_string();
        if sorted {
            text.push(if self.sort.descending { '▼' } else { '▲' });
        }
        let mut style = Style::default();
        if index == self.selected_column {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        if sorted {
            style = style.add_modifier(Modifier::BOLD);
        }
        Span::styled(text, style)
    }
}

impl StatefulWidget for DataTable<'_> {
    type State = TableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        if let Some(error) = self.error {
            self.centered_message(
                &format!("Erreur: {error} (r pour recharger)"),
                self.error_fg,
                area,
                buf,
            );
            return;
        }

        if self.loading && self.view.page_items.is_empty() {
            self.centered_message("Chargement…", self.dimmed_fg, area, buf);
            return;
        }

        if self.view.page_items.is_empty() {
            let message = if self.filtered {
                "Aucun résultat pour cette recherche"
            } else {
                "Aucune donnée"
            };
            self.centered_message(message, self.dimmed_fg, area, buf);
            return;
        }

        // Column widths: content-sized, capped by the declared width;
        // columns that do not fit the terminal are dropped from the right.
        let mut widths: Vec<u16> = Vec::with_capacity(self.columns.len() + 1);
        let mut headers: Vec<Span> = Vec::with_capacity(self.columns.len() + 1);
        let mut cells_per_row: Vec<Vec<Cell>> = vec![Vec::new(); self.view.page_items.len()];
        let mut used_width = 0u16;
        let mut visible_columns = 0usize;

        if self.row_numbers {
            let last = self.row_offset + self.view.page_items.len();
            let num_width = last.to_string().chars().count() as u16;
            for (i, row_cells) in cells_per_row.iter_mut().enumerate() {
                row_cells.push(Cell::from(
                    Line::from((self.row_offset + i + 1).to_string()).right_aligned(),
                ));
            }
            widths.push(num_width);
            headers.push(Span::raw(""));
            used_width += num_width + self.cell_padding;
            visible_columns += 1;
        }

        for (index, column) in self.columns.iter().enumerate() {
            let mut max_len = column.label.chars().count() as u16 + 1;
            let mut column_cells: Vec<Cell> = Vec::with_capacity(self.view.page_items.len());
            for row in &self.view.page_items {
                let text = column.cell_text(row);
                max_len = max_len.max(text.chars().count() as u16);
                column_cells.push(Cell::from(Line::from(text)));
            }
            if let Some(cap) = column.width {
                max_len = max_len.min(cap);
            }

            if used_width + max_len > area.width {
                break;
            }
            for (row_cells, cell) in cells_per_row.iter_mut().zip(column_cells) {
                row_cells.push(cell);
            }
            widths.push(max_len);
            headers.push(self.header_cell(index, column));
            used_width += max_len + self.cell_padding;
            visible_columns += 1;
        }

        if visible_columns == 0 {
            return;
        }

        let rows: Vec<TableRow> = cells_per_row.into_iter().map(TableRow::new).collect();

        let header_row_style = if self.header_bg == Color::Reset {
            Style::default().fg(self.header_fg)
        } else {
            Style::default().bg(self.header_bg).fg(self.header_fg)
        };

        StatefulWidget::render(
            Table::new(rows, widths)
                .column_spacing(self.cell_padding)
                .header(TableRow::new(headers).style(header_row_style))
                .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            area,
            buf,
            state,
        );
    }
}
