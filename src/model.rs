use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::access::Permission;
use crate::domain::{DeskConfig, DeskError, HELP_TEXT, Message};
use crate::engine::{SortDirection, TableView};
use crate::export::{ExportFormat, csv_line, write_export};
use crate::inputter::{InputResult, Inputter};
use crate::pages::columns_for_data;
use crate::record::{Record, Value, field, parse_input, value_text};
use crate::repository::{Entity, record_id};
use crate::session::Session;
use crate::store::{EntityStore, Level};
use crate::ui::{
    BORDER_HEIGHT, BORDER_WIDTH, CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, TABLE_HEADER_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    SEARCH,
    EDIT,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub style: Option<String>,
    pub data: Vec<String>,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_width = ui_width.saturating_sub(BORDER_WIDTH);
        let table_height = ui_height
            .saturating_sub(BORDER_HEIGHT + CMDLINE_HEIGH + TABLE_HEADER_HEIGHT)
            .max(1);
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Everything the ui needs to draw one frame.
#[derive(Debug, Clone)]
pub struct UIData {
    pub name: String,
    pub user: String,
    pub pages: Vec<String>,
    pub current_page: usize,
    pub table: Vec<ColumnView>,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub summary: String,
    pub query: String,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmd_prompt: String,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub status_level: Level,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            user: String::new(),
            pages: Vec::new(),
            current_page: 0,
            table: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            summary: String::new(),
            query: String::new(),
            show_popup: false,
            popup_message: String::new(),
            cmd_prompt: String::new(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            status_level: Level::Info,
            last_status_message_update: Instant::now(),
        }
    }
}

struct RecordField {
    key: String,
    label: String,
    text: String,
}

struct RecordView {
    record_idx: usize, // View index of the shown record
    fields: Vec<RecordField>,
    curser_row: usize,
    curser_offset: usize,
}

pub struct Model {
    config: DeskConfig,
    session: Session,
    store: EntityStore,
    pages: Vec<Entity>,
    page_idx: usize,
    table: TableView,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    record_view: RecordView,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    last_input: InputResult,
    active_cmdinput: bool,
    cmd_prompt: String,
    status_message: String,
    status_level: Level,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &DeskConfig,
        session: Session,
        store: EntityStore,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, DeskError> {
        let pages = session.pages();
        if pages.is_empty() {
            return Err(DeskError::Forbidden(format!(
                "{} has no pages",
                session.role().label()
            )));
        }
        let mut model = Self {
            config: config.clone(),
            session,
            store,
            pages,
            page_idx: 0,
            table: TableView::empty(Vec::new()),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            record_view: RecordView {
                record_idx: 0,
                fields: Vec::new(),
                curser_row: 0,
                curser_offset: 0,
            },
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            active_cmdinput: false,
            cmd_prompt: String::new(),
            status_message: String::new(),
            status_level: Level::Info,
            last_status_message_update: Instant::now(),
        };
        model.open_page(0);
        model.set_status_message(Level::Info, "Press ? for help");
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn table(&self) -> &TableView {
        &self.table
    }

    pub fn current_entity(&self) -> Entity {
        self.pages[self.page_idx]
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Ends the session; the model stays readable for a last frame.
    pub fn shutdown(&mut self) {
        self.session.end();
    }

    /// Switch to the page of `entity` if this session may open it.
    pub fn open_entity(&mut self, entity: Entity) -> bool {
        match self.pages.iter().position(|&e| e == entity) {
            Some(idx) => {
                self.open_page(idx);
                true
            }
            None => {
                warn!("{entity:?} is not available to {:?}", self.session.role());
                self.set_status_message(
                    Level::Error,
                    format!("{} is not available for your role", entity.title()),
                );
                false
            }
        }
    }

    /// Apply a search query as if typed at the prompt.
    pub fn apply_query(&mut self, query: &str) {
        self.table.set_query(query);
        self.move_table_selection_beginning();
    }

    fn open_page(&mut self, idx: usize) {
        self.page_idx = idx;
        let entity = self.current_entity();
        let records = self.store.records(entity);
        let columns = columns_for_data(entity, &records);
        debug!("Opening {} with {} columns", entity.title(), columns.len());
        self.table = TableView::new(records, columns);
        self.curser_row = 0;
        self.offset_row = 0;
        self.curser_column = 0;
        self.offset_column = 0;
        self.modus = Modus::TABLE;
        self.pull_notifications();
        self.update_table_data();
    }

    fn reload_records(&mut self) {
        let records = self.store.records(self.current_entity());
        self.table.set_records(records);
        self.clamp_selection();
        self.pull_notifications();
    }

    fn set_status_message(&mut self, level: Level, message: impl Into<String>) {
        self.status_message = message.into();
        self.status_level = level;
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.status_level = level;
        self.uidata.last_status_message_update = self.last_status_message_update;
    }

    fn pull_notifications(&mut self) {
        if let Some(last) = self.store.take_notifications().pop() {
            self.set_status_message(last.level, last.message);
            self.last_status_message_update = last.created;
            self.uidata.last_status_message_update = last.created;
        }
    }

    fn abs_row(&self) -> usize {
        self.offset_row + self.curser_row
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.clamp_selection();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DeskError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MoveBeginning => self.move_table_selection_beginning(),
                    Message::MoveEnd => self.move_table_selection_end(),
                    Message::SortColumn => self.sort_current_column(),
                    Message::Search => self.enter_cmd_mode(),
                    Message::Enter => self.enter(),
                    Message::Exit => self.exit(),
                    Message::Help => self.show_help(),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Export(format) => self.export(format),
                    Message::DeleteRow => self.delete_current_row(),
                    Message::NewRecord => self.new_record(),
                    Message::NextPage => self.open_page((self.page_idx + 1) % self.pages.len()),
                    Message::PrevPage => self
                        .open_page((self.page_idx + self.pages.len() - 1) % self.pages.len()),
                    Message::Refresh => self.refresh(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::RawKey(_) => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_record_selection_down(1),
                    Message::MoveUp => self.move_record_selection_up(1),
                    Message::MoveLeft => self.previous_record(),
                    Message::MoveRight => self.next_record(),
                    Message::MovePageUp => self.move_record_selection_up(10),
                    Message::MovePageDown => self.move_record_selection_down(10),
                    Message::CopyCell => self.copy_record_cell(),
                    Message::Enter => self.edit_record_field(),
                    Message::Help => self.show_help(),
                    Message::Exit => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::SEARCH => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::EDIT => match msg {
                    Message::RawKey(key) => self.edit_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }

        match self.modus {
            Modus::RECORD | Modus::EDIT => self.update_record_data(),
            Modus::POPUP => {}
            Modus::TABLE | Modus::SEARCH => self.update_table_data(),
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        if self.table.is_empty() {
            return;
        }
        // Row activation opens the record
        self.previous_modus = Modus::TABLE;
        self.modus = Modus::RECORD;
        self.record_view.record_idx = self.abs_row();
        self.record_view.curser_row = 0;
        self.record_view.curser_offset = 0;
        trace!("Activated row {}", self.record_view.record_idx);
        self.update_record_data();
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                if !self.table.query().is_empty() {
                    self.table.clear_query();
                    self.clamp_selection();
                    self.set_status_message(Level::Info, "Search cleared");
                }
            }
            Modus::RECORD => {
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
            }
            Modus::SEARCH | Modus::EDIT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    fn enter_cmd_mode(&mut self) {
        trace!("Entering search mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::SEARCH;
        self.active_cmdinput = true;
        self.cmd_prompt = "Search: ".to_string();
        self.input.set(self.table.query());
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.changed {
            let query = self.last_input.input.clone();
            self.apply_query(&query);
        }
        if self.last_input.finished {
            self.active_cmdinput = false;
            self.modus = self.previous_modus;
            self.previous_modus = Modus::SEARCH;
            if self.last_input.canceled {
                self.apply_query("");
            }
            info!("Search \"{}\": {}", self.table.query(), self.table.summary());
        }
    }

    fn sort_current_column(&mut self) {
        let Some(column) = self.table.columns().get(self.curser_column) else {
            return;
        };
        let key = column.key.clone();
        let label = column.label.clone();
        if !self.table.click_column(&key) {
            self.set_status_message(Level::Info, format!("{label} is not sortable"));
            return;
        }
        let message = match self.table.sort_state().direction() {
            Some(SortDirection::Ascending) => format!("Sorted by {label} ascending"),
            Some(SortDirection::Descending) => format!("Sorted by {label} descending"),
            None => "Sorting cleared".to_string(),
        };
        debug!("Sort key now {:?}", self.table.sort_state().key());
        self.set_status_message(Level::Info, message);
        self.move_table_selection_beginning();
    }

    fn refresh(&mut self) {
        let entity = self.current_entity();
        self.store.invalidate(entity);
        self.reload_records();
        self.set_status_message(Level::Info, format!("Reloaded {}", entity.title()));
    }

    fn export(&mut self, format: ExportFormat) {
        if let Err(e) = self.session.require(Permission::ExportData) {
            self.set_status_message(Level::Error, e.to_string());
            return;
        }
        let entity = self.current_entity();
        match write_export(
            &self.config.export_dir,
            entity.name(),
            entity.title(),
            format,
            &self.table,
        ) {
            Ok(path) => self.set_status_message(
                Level::Success,
                format!("Exported {} rows to {}", self.table.len(), path.display()),
            ),
            Err(e) => self.set_status_message(Level::Error, format!("Export failed: {e}")),
        }
    }

    fn delete_current_row(&mut self) {
        if let Err(e) = self.session.require(Permission::DeleteRecords) {
            self.set_status_message(Level::Error, e.to_string());
            return;
        }
        let Some(id) = self.table.record(self.abs_row()).map(record_id) else {
            return;
        };
        if id.is_empty() {
            self.set_status_message(Level::Error, "Record has no id");
            return;
        }
        match self.store.delete(self.current_entity(), &id) {
            Ok(_) => self.reload_records(),
            Err(e) => {
                warn!("Record {id} was not deleted: {e}");
                self.pull_notifications();
            }
        }
    }

    /// Adds an empty record to the current page and opens it.
    fn new_record(&mut self) {
        if let Err(e) = self.session.require(Permission::CreateRecords) {
            self.set_status_message(Level::Error, e.to_string());
            return;
        }
        let mut record = Record::new();
        for column in self.table.columns().iter().filter(|c| c.key != "id") {
            record.insert(column.key.clone(), Value::Null);
        }
        let response = match self.store.insert(self.current_entity(), record) {
            Ok(response) => response,
            Err(e) => {
                warn!("Record was not created: {e}");
                self.pull_notifications();
                return;
            }
        };
        // The new record is empty and would not match a query.
        self.table.clear_query();
        self.reload_records();
        let found = response
            .id
            .as_deref()
            .is_some_and(|id| self.follow_record(id));
        if found {
            self.previous_modus = Modus::TABLE;
            self.modus = Modus::RECORD;
            self.record_view.curser_row = 0;
            self.record_view.curser_offset = 0;
        }
    }

    fn edit_record_field(&mut self) {
        if let Err(e) = self.session.require(Permission::EditRecords) {
            self.set_status_message(Level::Error, e.to_string());
            return;
        }
        let view = &self.record_view;
        let Some(selected) = view.fields.get(view.curser_offset + view.curser_row) else {
            return;
        };
        if selected.key == "id" {
            self.set_status_message(Level::Info, "ID cannot be edited");
            return;
        }
        let Some(record) = self.table.record(view.record_idx) else {
            return;
        };
        let text = value_text(field(record, &selected.key)).into_owned();
        self.cmd_prompt = format!("{}: ", selected.label);
        trace!("Editing {} of row {}", selected.key, view.record_idx);
        self.previous_modus = Modus::RECORD;
        self.modus = Modus::EDIT;
        self.active_cmdinput = true;
        self.input.set(&text);
        self.last_input = self.input.get();
    }

    fn edit_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if !self.last_input.finished {
            return;
        }
        self.active_cmdinput = false;
        self.modus = Modus::RECORD;
        self.previous_modus = Modus::EDIT;
        if self.last_input.canceled {
            self.set_status_message(Level::Info, "Edit canceled");
            return;
        }
        let text = self.last_input.input.clone();
        self.save_field(&text);
    }

    fn save_field(&mut self, text: &str) {
        let view = &self.record_view;
        let Some(key) = view
            .fields
            .get(view.curser_offset + view.curser_row)
            .map(|f| f.key.clone())
        else {
            return;
        };
        let Some(record) = self.table.record(view.record_idx) else {
            return;
        };
        let id = record_id(record);
        let previous = field(record, &key);
        let value = parse_input(text, previous);
        if &value == previous {
            self.set_status_message(Level::Info, "No changes");
            return;
        }
        if id.is_empty() {
            self.set_status_message(Level::Error, "Record has no id");
            return;
        }
        debug!("Set {key} of record {id} to {value}");
        let mut changes = Record::new();
        changes.insert(key, value);
        match self.store.update(self.current_entity(), &id, changes) {
            Ok(_) => {
                self.reload_records();
                if !self.follow_record(&id) {
                    // Edited out of the current search
                    self.modus = Modus::TABLE;
                }
            }
            Err(e) => {
                warn!("Record {id} was not updated: {e}");
                self.pull_notifications();
            }
        }
    }

    /// Select the row showing record `id`, if it is visible.
    fn follow_record(&mut self, id: &str) -> bool {
        let position = (0..self.table.len())
            .find(|&idx| self.table.record(idx).is_some_and(|r| record_id(r) == id));
        match position {
            Some(idx) => {
                self.record_view.record_idx = idx;
                self.select_row(idx);
                true
            }
            None => false,
        }
    }

    fn copy_to_clipboard(&mut self, text: String) {
        trace!("Clipboard content: {}", text);
        let clipboard = match self.clipboard.take() {
            Some(cb) => Ok(cb),
            None => Clipboard::new(),
        };
        let result = clipboard.and_then(|mut cb| {
            let res = cb.set_text(text);
            self.clipboard = Some(cb);
            res
        });
        match result {
            Ok(_) => self.set_status_message(Level::Info, "Copied to clipboard"),
            Err(e) => {
                warn!("Error copying to clipboard: {:?}", e);
                self.set_status_message(Level::Error, DeskError::from(e).to_string());
            }
        }
    }

    fn copy_table_cell(&mut self) {
        if let Some(cell) = self.table.cell(self.abs_row(), self.curser_column) {
            self.copy_to_clipboard(cell);
        }
    }

    fn copy_table_row(&mut self) {
        if let Some(record) = self.table.record(self.abs_row()) {
            let line = csv_line(record, self.table.columns());
            self.copy_to_clipboard(line);
        }
    }

    fn copy_record_cell(&mut self) {
        let record = &self.record_view;
        if let Some(selected) = record.fields.get(record.curser_offset + record.curser_row) {
            let text = selected.text.clone();
            self.copy_to_clipboard(text);
        }
    }

    // -------------------- Table view ---------------------- //

    fn clamp_selection(&mut self) {
        let nrows = self.table.len();
        let abs = self.abs_row().min(nrows.saturating_sub(1));
        self.select_row(abs);
        let ncols = self.table.columns().len();
        self.curser_column = self.curser_column.min(ncols.saturating_sub(1));
    }

    fn select_row(&mut self, abs: usize) {
        let height = self.uilayout.table_height.max(1);
        if abs < self.offset_row {
            self.offset_row = abs;
        } else if abs >= self.offset_row + height {
            self.offset_row = abs + 1 - height;
        }
        self.curser_row = abs - self.offset_row;
    }

    fn move_table_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
    }

    fn move_table_selection_end(&mut self) {
        self.select_row(self.table.len().saturating_sub(1));
    }

    fn move_table_selection_up(&mut self, size: usize) {
        self.select_row(self.abs_row().saturating_sub(size));
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let last = self.table.len().saturating_sub(1);
        self.select_row((self.abs_row() + size).min(last));
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
    }

    fn move_table_selection_right(&mut self) {
        if self.curser_column + 1 < self.table.columns().len() {
            self.curser_column += 1;
        }
    }

    fn header_name(&self, idx: usize) -> String {
        let column = &self.table.columns()[idx];
        match self.table.sort_state().direction_of(&column.key) {
            Some(SortDirection::Ascending) => format!("{} ▲", column.label),
            Some(SortDirection::Descending) => format!("{} ▼", column.label),
            None => column.label.clone(),
        }
    }

    fn column_view(&self, idx: usize, rbegin: usize, rend: usize) -> ColumnView {
        let column = &self.table.columns()[idx];
        let name = self.header_name(idx);
        let data: Vec<String> = (rbegin..rend)
            .map(|r| {
                self.table
                    .cell(r, idx)
                    .unwrap_or_default()
                    .replace("\r\n", " ↵ ")
                    .replace('\n', " ↵ ")
            })
            .collect();
        let content_width = data
            .iter()
            .map(|s| s.chars().count())
            .chain(std::iter::once(name.chars().count()))
            .max()
            .unwrap_or(0);
        ColumnView {
            name,
            width: (content_width + COLUMN_WIDTH_MARGIN).min(self.config.max_column_width),
            style: column.style.clone(),
            data,
        }
    }

    fn update_table_data(&mut self) {
        let ncols = self.table.columns().len();
        let rbegin = self.offset_row.min(self.table.len());
        let rend = (rbegin + self.uilayout.table_height).min(self.table.len());

        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }

        // Shift right until the selected column fits on screen.
        let mut views = Vec::new();
        loop {
            views.clear();
            let mut visible_width = 0;
            for idx in self.offset_column..ncols {
                let view = self.column_view(idx, rbegin, rend);
                if visible_width + view.width + 1 > self.uilayout.table_width && !views.is_empty()
                {
                    break;
                }
                visible_width += view.width + 1;
                views.push(view);
            }
            if self.curser_column < self.offset_column + views.len()
                || self.offset_column >= self.curser_column
            {
                break;
            }
            self.offset_column += 1;
        }

        trace!(
            "Table: Cr {}, Cc {}, Or {}, Oc {}, Rb {}, Re {}, visible columns {}",
            self.curser_row,
            self.curser_column,
            self.offset_row,
            self.offset_column,
            rbegin,
            rend,
            views.len()
        );

        let entity = self.current_entity();
        self.uidata = UIData {
            name: entity.title().to_string(),
            user: format!(
                "{} ({}) since {}",
                self.session.user().name,
                self.session.role().label(),
                self.session.started_at().format("%H:%M")
            ),
            pages: self.pages.iter().map(|e| e.title().to_string()).collect(),
            current_page: self.page_idx,
            table: views,
            nrows: self.table.len(),
            selected_row: self.curser_row,
            selected_column: self.curser_column - self.offset_column,
            abs_selected_row: self.abs_row(),
            summary: self.table.summary(),
            query: self.table.query().to_string(),
            show_popup: false,
            popup_message: String::new(),
            cmd_prompt: self.cmd_prompt.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            status_level: self.status_level,
            last_status_message_update: self.last_status_message_update,
        };
    }

    // -------------------- Record view ---------------------- //

    fn record_fields(&self, record: &Record) -> Vec<RecordField> {
        let columns = self.table.columns();
        let mut fields: Vec<RecordField> = columns
            .iter()
            .map(|c| RecordField {
                key: c.key.clone(),
                label: c.label.clone(),
                text: c.display(record),
            })
            .collect();
        // Fields that no column shows are listed raw.
        for (key, value) in record.iter() {
            if !columns.iter().any(|c| &c.key == key) {
                fields.push(RecordField {
                    key: key.clone(),
                    label: key.clone(),
                    text: value_text(value).into_owned(),
                });
            }
        }
        fields
    }

    fn update_record_data(&mut self) {
        let Some(record) = self.table.record(self.record_view.record_idx) else {
            self.modus = Modus::TABLE;
            self.update_table_data();
            return;
        };
        self.record_view.fields = self.record_fields(record);

        let record = &self.record_view;
        let height = self.uilayout.table_height;
        let rbegin = record.curser_offset.min(record.fields.len());
        let rend = (rbegin + height).min(record.fields.len());
        let header_data: Vec<String> = record.fields[rbegin..rend]
            .iter()
            .map(|f| f.label.clone())
            .collect();
        let header_width = record
            .fields
            .iter()
            .map(|f| f.label.chars().count())
            .max()
            .unwrap_or(0)
            + COLUMN_WIDTH_MARGIN;
        let row_data: Vec<String> = record.fields[rbegin..rend]
            .iter()
            .map(|f| f.text.clone())
            .collect();
        let row_width = self.uilayout.table_width.saturating_sub(header_width + 1);

        trace!(
            "Record: rIdx {}, rb {}, re {}, rows {}",
            record.record_idx,
            rbegin,
            rend,
            record.fields.len()
        );

        self.uidata.name = format!("{} record", self.current_entity().title());
        self.uidata.table = vec![
            ColumnView {
                name: "Field".to_string(),
                width: header_width,
                style: None,
                data: header_data,
            },
            ColumnView {
                name: "Value".to_string(),
                width: row_width,
                style: None,
                data: row_data,
            },
        ];
        self.uidata.nrows = self.table.len();
        self.uidata.selected_row = record.curser_row;
        self.uidata.selected_column = 1;
        self.uidata.abs_selected_row = record.record_idx;
        self.uidata.show_popup = false;
        self.uidata.cmd_prompt = self.cmd_prompt.clone();
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.status_message = self.status_message.clone();
        self.uidata.status_level = self.status_level;
        self.uidata.last_status_message_update = self.last_status_message_update;
    }

    fn move_record_selection_up(&mut self, size: usize) {
        let record = &mut self.record_view;
        let abs = (record.curser_offset + record.curser_row).saturating_sub(size);
        if abs < record.curser_offset {
            record.curser_offset = abs;
        }
        record.curser_row = abs - record.curser_offset;
    }

    fn move_record_selection_down(&mut self, size: usize) {
        let height = self.uilayout.table_height.max(1);
        let record = &mut self.record_view;
        let last = record.fields.len().saturating_sub(1);
        let abs = (record.curser_offset + record.curser_row + size).min(last);
        if abs >= record.curser_offset + height {
            record.curser_offset = abs + 1 - height;
        }
        record.curser_row = abs - record.curser_offset;
    }

    fn previous_record(&mut self) {
        let record = &mut self.record_view;
        record.record_idx = record.record_idx.saturating_sub(1);
    }

    fn next_record(&mut self) {
        let record = &mut self.record_view;
        if record.record_idx + 1 < self.table.len() {
            record.record_idx += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::repository::{
        DeleteRequest, FetchRequest, FetchResponse, InsertRequest, MemoryRepository,
        MutationResponse, Repository, UpdateRequest,
    };
    use crate::session::User;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    /// Demo data that refuses every write.
    struct ReadOnlyRepository(MemoryRepository);

    impl Repository for ReadOnlyRepository {
        fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, DeskError> {
            self.0.fetch(request)
        }

        fn insert(&mut self, _: InsertRequest) -> Result<MutationResponse, DeskError> {
            Err(DeskError::PermissionDenied)
        }

        fn update(&mut self, _: UpdateRequest) -> Result<MutationResponse, DeskError> {
            Err(DeskError::PermissionDenied)
        }

        fn delete(&mut self, _: DeleteRequest) -> Result<MutationResponse, DeskError> {
            Err(DeskError::PermissionDenied)
        }
    }

    fn model(role: Role) -> Model {
        model_with_config(role, DeskConfig::default())
    }

    fn model_with_config(role: Role, config: DeskConfig) -> Model {
        model_with(role, config, Box::new(MemoryRepository::demo()))
    }

    fn model_with(role: Role, config: DeskConfig, repository: Box<dyn Repository>) -> Model {
        let session = Session::start(User::new("tester", role));
        let store = EntityStore::new(repository);
        Model::init(&config, session, store, 120, 30).unwrap()
    }

    fn press(m: &mut Model, code: KeyCode) {
        send(m, Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn send(m: &mut Model, msg: Message) {
        m.update(Some(msg)).unwrap();
    }

    fn type_keys(m: &mut Model, s: &str) {
        for c in s.chars() {
            send(m, Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
    }

    fn first_cells(m: &Model) -> Vec<String> {
        m.get_uidata().table[0].data.clone()
    }

    #[test]
    fn starts_on_first_allowed_page() {
        let m = model(Role::Accountant);
        assert_eq!(m.current_entity(), Entity::Customers);
        let ui = m.get_uidata();
        assert_eq!(ui.pages, vec!["Customers", "Suppliers", "Sales Orders", "Invoices"]);
        assert_eq!(ui.summary, "Showing 5 of 5 results");
    }

    #[test]
    fn live_search_filters_on_each_key() {
        let mut m = model(Role::Admin);
        send(&mut m, Message::Search);
        assert!(m.raw_keyevents());
        type_keys(&mut m, "de");
        assert_eq!(m.get_uidata().summary, "Showing 4 of 5 results");
        type_keys(&mut m, "l");
        assert_eq!(m.get_uidata().summary, "Showing 1 of 5 results");
        send(&mut m, Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        assert!(!m.raw_keyevents());
        assert_eq!(m.table().query(), "del");

        send(&mut m, Message::Exit);
        assert_eq!(m.table().query(), "");
        assert_eq!(m.get_uidata().summary, "Showing 5 of 5 results");
    }

    #[test]
    fn escape_cancels_search() {
        let mut m = model(Role::Admin);
        send(&mut m, Message::Search);
        type_keys(&mut m, "zzz");
        assert_eq!(m.table().len(), 0);
        send(&mut m, Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert_eq!(m.table().len(), 5);
        assert!(!m.raw_keyevents());
    }

    #[test]
    fn sort_cycles_on_selected_column() {
        let mut m = model(Role::Admin);
        send(&mut m, Message::MoveRight); // name
        send(&mut m, Message::SortColumn);
        assert_eq!(m.get_uidata().table[1].name, "Name ▲");
        send(&mut m, Message::SortColumn);
        assert_eq!(m.get_uidata().table[1].name, "Name ▼");
        assert_eq!(m.get_uidata().table[1].data[0], "Elbe Logistics");
        send(&mut m, Message::SortColumn);
        assert_eq!(m.get_uidata().table[1].name, "Name");
        assert_eq!(m.get_uidata().table[1].data[0], "Alpine Tools GmbH");
    }

    #[test]
    fn unsortable_column_reports() {
        let mut m = model(Role::Admin);
        send(&mut m, Message::MoveRight);
        send(&mut m, Message::MoveRight); // email
        send(&mut m, Message::SortColumn);
        assert_eq!(m.get_uidata().status_message, "Email is not sortable");
        assert_eq!(m.table().sort_state().key(), None);
    }

    #[test]
    fn enter_opens_record_and_navigates() {
        let mut m = model(Role::Admin);
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::Enter);
        let ui = m.get_uidata();
        assert_eq!(ui.table.len(), 2);
        assert_eq!(ui.table[0].data[1], "Name");
        assert_eq!(ui.table[1].data[1], "Baltic Fasteners");
        assert_eq!(ui.table[1].data[3], "Riga, LV");

        send(&mut m, Message::MoveRight);
        assert_eq!(m.get_uidata().table[1].data[1], "Cobalt Machining");
        send(&mut m, Message::Exit);
        assert_eq!(m.get_uidata().table.len(), 6);
        assert_eq!(m.get_uidata().abs_selected_row, 1);
    }

    #[test]
    fn pages_cycle_with_tab() {
        let mut m = model(Role::SalesRep);
        send(&mut m, Message::NextPage);
        assert_eq!(m.current_entity(), Entity::SalesOrders);
        send(&mut m, Message::NextPage);
        assert_eq!(m.current_entity(), Entity::Customers);
        send(&mut m, Message::PrevPage);
        assert_eq!(m.current_entity(), Entity::SalesOrders);
        assert!(!m.open_entity(Entity::Employees));
        assert_eq!(m.current_entity(), Entity::SalesOrders);
    }

    #[test]
    fn delete_needs_permission() {
        let mut m = model(Role::SalesRep);
        send(&mut m, Message::DeleteRow);
        assert_eq!(m.table().len(), 5);
        assert_eq!(m.get_uidata().status_level, Level::Error);

        let mut m = model(Role::Admin);
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::DeleteRow);
        assert_eq!(m.table().len(), 4);
        assert_eq!(m.get_uidata().status_message, "Deleted 1 Customers record(s)");
        assert_eq!(first_cells(&m), vec!["1", "3", "4", "5"]);
    }

    #[test]
    fn failed_writes_keep_the_table() {
        let repository = Box::new(ReadOnlyRepository(MemoryRepository::demo()));
        let mut m = model_with(Role::Admin, DeskConfig::default(), repository);
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::DeleteRow);
        assert_eq!(m.table().len(), 5);
        assert_eq!(first_cells(&m), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(m.get_uidata().status_level, Level::Error);
        assert_eq!(
            m.get_uidata().status_message,
            "Customers not deleted: permission denied"
        );

        send(&mut m, Message::NewRecord);
        assert_eq!(m.table().len(), 5);
        assert_eq!(m.get_uidata().status_message, "Customers not created: permission denied");
        assert_eq!(m.get_uidata().table.len(), 6);

        send(&mut m, Message::Enter);
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::Enter);
        type_keys(&mut m, " KG");
        press(&mut m, KeyCode::Enter);
        let ui = m.get_uidata();
        assert_eq!(ui.status_message, "Customers not updated: permission denied");
        assert_eq!(ui.table[1].data[1], "Baltic Fasteners");
        assert_eq!(ui.name, "Customers record");
    }

    #[test]
    fn edit_and_create_need_permission() {
        let mut m = model(Role::Viewer);
        send(&mut m, Message::NewRecord);
        assert_eq!(m.table().len(), 5);
        assert_eq!(m.get_uidata().status_level, Level::Error);

        send(&mut m, Message::Enter);
        send(&mut m, Message::MoveDown);
        m.set_status_message(Level::Info, "");
        send(&mut m, Message::Enter);
        assert!(!m.raw_keyevents());
        assert_eq!(m.get_uidata().status_level, Level::Error);
        assert_eq!(m.get_uidata().table[1].data[1], "Alpine Tools GmbH");
    }

    #[test]
    fn edit_field_updates_record_and_table() {
        let mut m = model(Role::Admin);
        send(&mut m, Message::Enter);
        send(&mut m, Message::MoveDown); // Name
        send(&mut m, Message::Enter);
        assert!(m.raw_keyevents());
        assert_eq!(m.get_uidata().cmd_prompt, "Name: ");
        assert_eq!(m.get_uidata().cmdinput.input, "Alpine Tools GmbH");
        press(&mut m, KeyCode::Esc);
        assert!(!m.raw_keyevents());
        assert_eq!(m.get_uidata().status_message, "Edit canceled");

        send(&mut m, Message::Enter);
        send(
            &mut m,
            Message::RawKey(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)),
        );
        type_keys(&mut m, "Zenith AG");
        press(&mut m, KeyCode::Enter);
        assert!(!m.raw_keyevents());
        let ui = m.get_uidata();
        assert_eq!(ui.table[1].data[1], "Zenith AG");
        assert_eq!(ui.status_message, "Updated 1 Customers record(s)");

        send(&mut m, Message::Exit);
        assert_eq!(m.get_uidata().table[1].data[0], "Zenith AG");
    }

    #[test]
    fn id_field_is_not_editable() {
        let mut m = model(Role::Admin);
        send(&mut m, Message::Enter);
        send(&mut m, Message::Enter);
        assert!(!m.raw_keyevents());
        assert_eq!(m.get_uidata().status_message, "ID cannot be edited");
    }

    #[test]
    fn new_record_opens_in_record_view() {
        let mut m = model(Role::SalesRep);
        send(&mut m, Message::Search);
        type_keys(&mut m, "alp");
        press(&mut m, KeyCode::Enter);
        assert_eq!(m.table().len(), 1);

        send(&mut m, Message::NewRecord);
        assert_eq!(m.table().query(), "");
        assert_eq!(m.table().len(), 6);
        let ui = m.get_uidata();
        assert_eq!(ui.name, "Customers record");
        assert_eq!(ui.table[1].data[0], "6");
        assert_eq!(ui.abs_selected_row, 5);
        assert_eq!(ui.status_message, "Created Customers record 6");
    }

    #[test]
    fn export_writes_file_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeskConfig {
            export_dir: dir.path().to_path_buf(),
            ..DeskConfig::default()
        };
        let mut m = model_with_config(Role::Manager, config.clone());
        send(&mut m, Message::Export(ExportFormat::Csv));
        assert_eq!(m.get_uidata().status_level, Level::Success);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let mut m = model_with_config(Role::Viewer, config);
        send(&mut m, Message::Export(ExportFormat::Print));
        assert_eq!(m.get_uidata().status_level, Level::Error);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn selection_scrolls_with_small_screen() {
        let session = Session::start(User::new("tester", Role::Admin));
        let store = EntityStore::new(Box::new(MemoryRepository::demo()));
        // Two visible rows
        let mut m = Model::init(&DeskConfig::default(), session, store, 80, 7).unwrap();
        send(&mut m, Message::MoveEnd);
        let ui = m.get_uidata();
        assert_eq!(ui.abs_selected_row, 4);
        assert_eq!(ui.selected_row, 1);
        assert_eq!(first_cells(&m), vec!["4", "5"]);
        send(&mut m, Message::MoveBeginning);
        assert_eq!(first_cells(&m), vec!["1", "2"]);
    }

    #[test]
    fn help_popup_closes_on_escape() {
        let mut m = model(Role::Admin);
        send(&mut m, Message::Help);
        assert!(m.get_uidata().show_popup);
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::Exit);
        assert!(!m.get_uidata().show_popup);
        assert_eq!(m.get_uidata().abs_selected_row, 0);
    }

    #[test]
    fn quit_sets_status() {
        let mut m = model(Role::Viewer);
        send(&mut m, Message::Quit);
        assert_eq!(m.status, Status::QUITTING);
        m.shutdown();
    }
}
