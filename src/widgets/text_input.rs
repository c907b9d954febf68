use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use tui_textarea::{CursorMove, Input, Key, TextArea};

/// Event emitted by TextInput widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInputEvent {
    None,
    /// The value changed; callers recompute whatever depends on it.
    Changed,
    /// Enter pressed
    Submit,
    /// Esc pressed
    Cancel,
}

/// Single-line text input wrapping tui-textarea. Used for the live search
/// box: every edit is reported so the owning pane can recompute its view.
pub struct TextInput {
    textarea: TextArea<'static>,
    pub value: String,
    pub cursor: usize,
    text_color: Option<Color>,
    background_color: Option<Color>,
    focused: bool,
}

impl TextInput {
    pub fn new() -> Self {
        let mut textarea = TextArea::default();
        textarea.set_cursor_line_style(Style::default());

        Self {
            textarea,
            value: String::new(),
            cursor: 0,
            text_color: None,
            background_color: None,
            focused: false,
        }
    }

    /// Sync value and cursor from textarea
    fn sync_from_textarea(&mut self) {
        self.value = self.textarea.lines().first().cloned().unwrap_or_default();
        self.cursor = self.textarea.cursor().1;
    }

    fn apply_colors_to_textarea(&mut self) {
        let mut style = Style::default();
        if let Some(text_color) = self.text_color {
            style = style.fg(text_color);
        }
        if let Some(bg_color) = self.background_color {
            style = style.bg(bg_color);
        }
        self.textarea.set_style(style);
        self.textarea.set_cursor_line_style(Style::default());
    }

    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self.apply_colors_to_textarea();
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self.apply_colors_to_textarea();
        self
    }

    /// Set focused state; the cursor is only visible while focused.
    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        if focused {
            self.textarea
                .set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
        } else {
            let textarea_style = self.textarea.style();
            self.textarea.set_cursor_style(textarea_style);
        }
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: String) {
        let single_line = value.replace(['\n', '\r'], " ");
        self.cursor = single_line.chars().count();
        self.value = single_line.clone();
        self.textarea = TextArea::new(vec![single_line]);
        self.apply_colors_to_textarea();
        let was_focused = self.focused;
        self.set_focused(was_focused);
        self.textarea.move_cursor(CursorMove::End);
    }

    pub fn clear(&mut self) {
        self.set_value(String::new());
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Handle a key event
    pub fn handle_key(&mut self, event: &KeyEvent) -> TextInputEvent {
        match event.code {
            KeyCode::Enter => return TextInputEvent::Submit,
            KeyCode::Esc => return TextInputEvent::Cancel,
            _ => {}
        }

        let before = self.value.clone();
        let input = key_event_to_input(event);
        self.textarea.input(input);
        self.sync_from_textarea();

        if self.value != before {
            TextInputEvent::Changed
        } else {
            TextInputEvent::None
        }
    }
}

impl Default for TextInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &TextInput {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.textarea.render(area, buf);
    }
}

/// Convert a crossterm key event into the tui-textarea input type,
/// keeping only the editing keys a single-line field needs.
fn key_event_to_input(event: &KeyEvent) -> Input {
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let alt = event.modifiers.contains(KeyModifiers::ALT);
    let shift = event.modifiers.contains(KeyModifiers::SHIFT);

    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        _ => Key::Null,
    };

    Input {
        key,
        ctrl,
        alt,
        shift,
    }
}
