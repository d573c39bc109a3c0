use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::model::{ColumnView, Model, UIData};
use crate::store::Level;

pub const BORDER_WIDTH: usize = 2;
pub const BORDER_HEIGHT: usize = 2;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const CMDLINE_HEIGH: usize = 2; // Status line and input prompt
pub const COLUMN_WIDTH_MARGIN: usize = 2;
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);
const POPUP_WIDTH_PERCENT: u16 = 60;

/// Column widths arrive already fitted to the screen by the model.
#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area, cmd_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_table(uidata, frame, table_area);
        Self::draw_statusline(uidata, frame, status_area);
        Self::draw_cmdline(uidata, frame, cmd_area);
        if uidata.show_popup {
            Self::draw_popup(&uidata.popup_message, frame, table_area);
        }
    }

    fn cell<'a>(&self, text: &'a str, view: &ColumnView) -> Cell<'a> {
        let line = Line::from(text);
        let line = match view.style.as_deref() {
            Some("currency") | Some("numeric") => line.right_aligned(),
            Some("badge") => line.yellow(),
            _ => line,
        };
        Cell::from(line)
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut title = vec![Span::from(" ")];
        for (idx, page) in uidata.pages.iter().enumerate() {
            if idx == uidata.current_page {
                title.push(Span::from(page.as_str()).bold().reversed());
            } else {
                title.push(Span::from(page.as_str()).dim());
            }
            title.push(Span::from(" "));
        }
        let block = Block::bordered()
            .title(Line::from(title))
            .title(Line::from(format!(" {} ", uidata.user)).right_aligned())
            .title_bottom(
                Line::from(format!(
                    " {} · {}/{} ",
                    uidata.name,
                    (uidata.abs_selected_row + 1).min(uidata.nrows),
                    uidata.nrows
                ))
                .centered(),
            )
            .border_set(border::ROUNDED);

        let widths: Vec<u16> = uidata
            .table
            .iter()
            .map(|c| c.width.min(u16::MAX as usize) as u16)
            .collect();
        let headers: Vec<Cell> = uidata
            .table
            .iter()
            .map(|c| Cell::from(c.name.as_str()))
            .collect();
        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows: Vec<Row> = (0..nrows)
            .map(|r| {
                Row::new(
                    uidata
                        .table
                        .iter()
                        .map(|c| self.cell(c.data.get(r).map(String::as_str).unwrap_or(""), c)),
                )
            })
            .collect();

        let table = Table::new(rows, widths)
            .column_spacing(1)
            .header(Row::new(headers).bold().underlined())
            .row_highlight_style(Style::new().bg(Color::Blue))
            .cell_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
            .block(block);

        let mut state = TableState::default();
        if nrows > 0 {
            state = state
                .with_selected(Some(uidata.selected_row))
                .with_selected_column(Some(uidata.selected_column));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_statusline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let [left, right] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).areas(area);
        let mut summary = uidata.summary.clone();
        if !uidata.query.is_empty() && !uidata.active_cmdinput {
            summary = format!("{summary} for \"{}\"", uidata.query);
        }
        frame.render_widget(Paragraph::new(summary), left);

        if uidata.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
            let style = match uidata.status_level {
                Level::Info => Style::new(),
                Level::Success => Style::new().fg(Color::Green),
                Level::Error => Style::new().fg(Color::Red).bold(),
            };
            let line = Line::styled(uidata.status_message.as_str(), style).right_aligned();
            frame.render_widget(Paragraph::new(line), right);
        }
    }

    fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        if !uidata.active_cmdinput {
            let hint = Line::from(" / search  s sort  ⏎ open/edit  n new  ? help  q quit").dim();
            frame.render_widget(Paragraph::new(hint), area);
            return;
        }
        let prompt = uidata.cmd_prompt.as_str();
        let line = Line::from(vec![prompt.bold(), Span::from(uidata.cmdinput.input.as_str())]);
        frame.render_widget(Paragraph::new(line), area);
        let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
    }

    fn draw_popup(message: &str, frame: &mut Frame, area: Rect) {
        let lines = message.lines().count() as u16 + BORDER_HEIGHT as u16;
        let width = (u32::from(area.width) * u32::from(POPUP_WIDTH_PERCENT) / 100) as u16;
        let height = lines.min(area.height);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };
        let block = Block::bordered()
            .title(Line::from(" Help ").centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(message).wrap(Wrap { trim: false }).block(block),
            popup,
        );
    }
}
