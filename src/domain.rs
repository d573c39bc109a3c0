use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::export::ExportFormat;

#[derive(Debug)]
pub enum DeskError {
    IoError(Error),
    PolarsError(PolarsError),
    JsonError(serde_json::Error),
    ClipboardError(arboard::Error),
    LoadingFailed(String),
    InvalidPath(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    NotFound(String),
    Forbidden(String),
}

impl fmt::Display for DeskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeskError::IoError(e) => write!(f, "io error: {e}"),
            DeskError::PolarsError(e) => write!(f, "data error: {e}"),
            DeskError::JsonError(e) => write!(f, "json error: {e}"),
            DeskError::ClipboardError(e) => write!(f, "clipboard error: {e}"),
            DeskError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            DeskError::InvalidPath(msg) => write!(f, "invalid path: {msg}"),
            DeskError::FileNotFound => write!(f, "file not found"),
            DeskError::PermissionDenied => write!(f, "permission denied"),
            DeskError::UnknownFileType => write!(f, "unknown file type"),
            DeskError::NotFound(what) => write!(f, "{what} not found"),
            DeskError::Forbidden(what) => write!(f, "not allowed: {what}"),
        }
    }
}

impl std::error::Error for DeskError {}

impl From<Error> for DeskError {
    fn from(err: Error) -> Self {
        DeskError::IoError(err)
    }
}

impl From<PolarsError> for DeskError {
    fn from(err: PolarsError) -> Self {
        DeskError::PolarsError(err)
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(err: serde_json::Error) -> Self {
        DeskError::JsonError(err)
    }
}

impl From<arboard::Error> for DeskError {
    fn from(err: arboard::Error) -> Self {
        DeskError::ClipboardError(err)
    }
}

#[derive(Debug, Clone)]
pub struct DeskConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub export_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        DeskConfig {
            event_poll_time: 100,
            max_column_width: 32,
            export_dir: PathBuf::from("."),
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    SortColumn,
    Search,
    Enter,
    Exit,
    Help,
    CopyCell,
    CopyRow,
    Export(ExportFormat),
    DeleteRow,
    NewRecord,
    NextPage,
    PrevPage,
    Refresh,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
q          quit
h/j/k/l    move (arrow keys work too)
PgUp/PgDn  move one page
g/G        first/last row
s          cycle sort on column (asc, desc, off)
/          search all fields (Esc clears)
Enter      open record, edit field in the record view
Esc        back
Tab        next page, Shift+Tab previous page
e/x/p      export csv/spreadsheet/print
y/c        copy row/cell
n          new record
D          delete record
r          refresh
?          this help";
