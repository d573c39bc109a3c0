use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

use crate::domain::{DeskConfig, DeskError, Message};
use crate::export::ExportFormat;
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DeskConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DeskError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(Self::handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn handle_key(key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::MoveBeginning),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::MoveEnd),
            (KeyCode::Char('s'), _) => Some(Message::SortColumn),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Char('y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('c'), _) => Some(Message::CopyCell),
            (KeyCode::Char('e'), _) => Some(Message::Export(ExportFormat::Csv)),
            (KeyCode::Char('x'), _) => Some(Message::Export(ExportFormat::Spreadsheet)),
            (KeyCode::Char('p'), _) => Some(Message::Export(ExportFormat::Print)),
            (KeyCode::Char('D'), _) => Some(Message::DeleteRow),
            (KeyCode::Char('n'), _) => Some(Message::NewRecord),
            (KeyCode::Tab, _) => Some(Message::NextPage),
            (KeyCode::BackTab, _) => Some(Message::PrevPage),
            (KeyCode::Char('r'), _) => Some(Message::Refresh),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
