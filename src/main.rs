use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};

mod access;
mod column;
mod controller;
mod demo;
mod domain;
mod engine;
mod export;
mod inputter;
mod logging;
mod model;
mod pages;
mod record;
mod repository;
mod session;
mod store;
mod ui;

use access::{Permission, Role};
use controller::Controller;
use domain::{DeskConfig, DeskError};
use engine::TableView;
use export::{ExportFormat, write_export};
use model::{Model, Status};
use pages::columns_for_data;
use repository::{Entity, FileRepository, MemoryRepository, Repository};
use session::{Session, User};
use store::EntityStore;
use ui::TableUI;

/// A tui based role-aware admin desk for ERP tables.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory with one csv, parquet, arrow or json file per entity (e.g. customers.csv).
    /// Demo data is used when omitted.
    #[arg(short, long)]
    data_dir: Option<String>,

    #[arg(short, long, default_value = "admin")]
    user: String,

    #[arg(short, long, value_enum, default_value_t = Role::Admin)]
    role: Role,

    /// Page to open first
    #[arg(short, long, value_enum)]
    page: Option<Entity>,

    /// Initial search query
    #[arg(short, long)]
    query: Option<String>,

    /// Export the page and exit without starting the ui
    #[arg(short, long, value_enum)]
    export: Option<ExportFormat>,

    #[arg(long, default_value = ".")]
    export_dir: String,

    #[arg(long, default_value = "~/.erpdesk.log")]
    log_file: String,

    #[arg(long, default_value_t = 32)]
    max_column_width: usize,

    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn expand_path(path: &str) -> Result<PathBuf, DeskError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| DeskError::InvalidPath(format!("{path}: {e}")))
}

impl Args {
    fn config(&self) -> Result<DeskConfig, DeskError> {
        Ok(DeskConfig {
            event_poll_time: self.poll_ms,
            max_column_width: self.max_column_width,
            export_dir: expand_path(&self.export_dir)?,
            data_dir: self.data_dir.as_deref().map(expand_path).transpose()?,
        })
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn open_repository(cfg: &DeskConfig) -> Result<Box<dyn Repository>, DeskError> {
    match &cfg.data_dir {
        Some(dir) => {
            info!("Reading tables from {}", dir.display());
            Ok(Box::new(FileRepository::open(dir.clone())?))
        }
        None => {
            info!("No data directory given, using demo data");
            Ok(Box::new(MemoryRepository::demo()))
        }
    }
}

fn run(args: Args) -> Result<(), DeskError> {
    logging::init(&expand_path(&args.log_file)?)?;
    let cfg = args.config()?;
    info!("Starting erpdesk with {:?}", cfg);

    let session = Session::start(User::new(args.user.clone(), args.role));
    let store = EntityStore::new(open_repository(&cfg)?);

    match args.export {
        Some(format) => export_headless(&cfg, session, store, &args, format),
        None => run_tui(&cfg, session, store, &args),
    }
}

/// Write one export of the requested page and leave.
fn export_headless(
    cfg: &DeskConfig,
    mut session: Session,
    mut store: EntityStore,
    args: &Args,
    format: ExportFormat,
) -> Result<(), DeskError> {
    session.require(Permission::ExportData)?;
    let entity = match args.page {
        Some(entity) => entity,
        None => *session
            .pages()
            .first()
            .ok_or_else(|| DeskError::Forbidden("no pages".to_string()))?,
    };
    if !session.can_open(entity) {
        return Err(DeskError::Forbidden(entity.title().to_string()));
    }

    let records = store.records(entity);
    if let Some(failure) = store.take_notifications().into_iter().next() {
        return Err(DeskError::LoadingFailed(failure.message));
    }
    let columns = columns_for_data(entity, &records);
    let mut view = TableView::new(records, columns);
    if let Some(query) = &args.query {
        view.set_query(query);
    }
    let path = write_export(&cfg.export_dir, entity.name(), entity.title(), format, &view)?;
    println!("{}: {} -> {}", entity.title(), view.summary(), path.display());
    session.end();
    Ok(())
}

fn run_tui(
    cfg: &DeskConfig,
    session: Session,
    store: EntityStore,
    args: &Args,
) -> Result<(), DeskError> {
    let mut terminal = ratatui::init();
    let result = run_loop(&mut terminal, cfg, session, store, args);
    ratatui::restore();
    info!("Bye");
    result
}

fn run_loop(
    terminal: &mut DefaultTerminal,
    cfg: &DeskConfig,
    session: Session,
    store: EntityStore,
    args: &Args,
) -> Result<(), DeskError> {
    let size = terminal.size()?;

    let mut model = Model::init(cfg, session, store, size.width as usize, size.height as usize)?;
    if let Some(entity) = args.page {
        model.open_entity(entity);
    }
    if let Some(query) = &args.query {
        model.apply_query(query);
    }
    model.update(None)?;

    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    model.shutdown();
    Ok(())
}
