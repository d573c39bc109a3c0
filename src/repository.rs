use polars::prelude::*;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, trace};

use crate::access::Department;
use crate::domain::DeskError;
use crate::record::{Record, Value, field, value_text};

/// Business entities, one admin page each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Entity {
    Customers,
    Suppliers,
    Products,
    Inventory,
    SalesOrders,
    ProductionOrders,
    Invoices,
    Employees,
}

impl Entity {
    pub const ALL: [Entity; 8] = [
        Entity::Customers,
        Entity::Suppliers,
        Entity::Products,
        Entity::Inventory,
        Entity::SalesOrders,
        Entity::ProductionOrders,
        Entity::Invoices,
        Entity::Employees,
    ];

    /// File stem and export base name.
    pub fn name(self) -> &'static str {
        match self {
            Entity::Customers => "customers",
            Entity::Suppliers => "suppliers",
            Entity::Products => "products",
            Entity::Inventory => "inventory",
            Entity::SalesOrders => "sales_orders",
            Entity::ProductionOrders => "production_orders",
            Entity::Invoices => "invoices",
            Entity::Employees => "employees",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Entity::Customers => "Customers",
            Entity::Suppliers => "Suppliers",
            Entity::Products => "Products",
            Entity::Inventory => "Inventory",
            Entity::SalesOrders => "Sales Orders",
            Entity::ProductionOrders => "Production Orders",
            Entity::Invoices => "Invoices",
            Entity::Employees => "Employees",
        }
    }

    pub fn department(self) -> Department {
        match self {
            Entity::Customers | Entity::SalesOrders => Department::Sales,
            Entity::Suppliers => Department::Purchasing,
            Entity::Products | Entity::Inventory => Department::Warehouse,
            Entity::ProductionOrders => Department::Production,
            Entity::Invoices => Department::Finance,
            Entity::Employees => Department::HumanResources,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub entity: Entity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertRequest {
    pub entity: Entity,
    pub record: Record,
}

/// Fields in `changes` replace those of the record whose `id` is `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub entity: Entity,
    pub id: String,
    pub changes: Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub entity: Entity,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationResponse {
    pub entity: Entity,
    pub affected: usize,
    /// Id of the inserted record, when an insert happened.
    pub id: Option<String>,
}

/// Per-entity data access. The view layer never sees the transport.
pub trait Repository: Send {
    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, DeskError>;
    fn insert(&mut self, request: InsertRequest) -> Result<MutationResponse, DeskError>;
    fn update(&mut self, request: UpdateRequest) -> Result<MutationResponse, DeskError>;
    fn delete(&mut self, request: DeleteRequest) -> Result<MutationResponse, DeskError>;
}

pub fn record_id(record: &Record) -> String {
    value_text(field(record, "id")).into_owned()
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: HashMap<Entity, Vec<Record>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, entity: Entity, records: Vec<Record>) -> Self {
        self.tables.insert(entity, records);
        self
    }

    fn next_id(records: &[Record]) -> i64 {
        records
            .iter()
            .filter_map(|r| field(r, "id").as_i64())
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl Repository for MemoryRepository {
    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, DeskError> {
        let records = self
            .tables
            .get(&request.entity)
            .cloned()
            .unwrap_or_default();
        Ok(FetchResponse { records })
    }

    fn insert(&mut self, request: InsertRequest) -> Result<MutationResponse, DeskError> {
        let table = self.tables.entry(request.entity).or_default();
        let mut record = request.record;
        if field(&record, "id").is_null() {
            record.insert("id".to_string(), Value::from(Self::next_id(table)));
        }
        let id = record_id(&record);
        trace!("Insert {:?} id {}", request.entity, id);
        table.push(record);
        Ok(MutationResponse {
            entity: request.entity,
            affected: 1,
            id: Some(id),
        })
    }

    fn update(&mut self, request: UpdateRequest) -> Result<MutationResponse, DeskError> {
        let table = self.tables.entry(request.entity).or_default();
        let mut affected = 0;
        for record in table.iter_mut().filter(|r| record_id(r) == request.id) {
            for (k, v) in request.changes.iter() {
                record.insert(k.clone(), v.clone());
            }
            affected += 1;
        }
        if affected == 0 {
            return Err(DeskError::NotFound(format!(
                "{} record {}",
                request.entity.title(),
                request.id
            )));
        }
        Ok(MutationResponse {
            entity: request.entity,
            affected,
            id: None,
        })
    }

    fn delete(&mut self, request: DeleteRequest) -> Result<MutationResponse, DeskError> {
        let table = self.tables.entry(request.entity).or_default();
        let before = table.len();
        table.retain(|r| record_id(r) != request.id);
        let affected = before - table.len();
        if affected == 0 {
            return Err(DeskError::NotFound(format!(
                "{} record {}",
                request.entity.title(),
                request.id
            )));
        }
        Ok(MutationResponse {
            entity: request.entity,
            affected,
            id: None,
        })
    }
}

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
    JSON,
}

const KNOWN_EXTENSIONS: [&str; 7] = ["csv", "parquet", "pq", "arrow", "ipc", "feather", "json"];

/// Reads `<dir>/<entity>.<ext>` on first access.
///
/// Writes only change the loaded copy; nothing is written back to disk.
#[derive(Debug)]
pub struct FileRepository {
    dir: PathBuf,
    loaded: HashSet<Entity>,
    memory: MemoryRepository,
}

impl FileRepository {
    pub fn open(dir: PathBuf) -> Result<Self, DeskError> {
        let metadata = fs::metadata(&dir).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DeskError::FileNotFound,
            ErrorKind::PermissionDenied => DeskError::PermissionDenied,
            _ => DeskError::IoError(e),
        })?;
        if !metadata.is_dir() {
            return Err(DeskError::LoadingFailed("Not a directory!".into()));
        }
        info!("Using data directory {}", dir.display());
        Ok(FileRepository {
            dir,
            loaded: HashSet::new(),
            memory: MemoryRepository::new(),
        })
    }

    fn find_file(&self, entity: Entity) -> Option<PathBuf> {
        KNOWN_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{ext}", entity.name())))
            .find(|p| p.is_file())
    }

    fn ensure_loaded(&mut self, entity: Entity) -> Result<(), DeskError> {
        if self.loaded.contains(&entity) {
            return Ok(());
        }
        let path = self.find_file(entity).ok_or(DeskError::FileNotFound)?;
        let records = load_records(&path)?;
        self.memory.tables.insert(entity, records);
        self.loaded.insert(entity);
        Ok(())
    }
}

impl Repository for FileRepository {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, DeskError> {
        self.ensure_loaded(request.entity)?;
        self.memory.fetch(request)
    }

    fn insert(&mut self, request: InsertRequest) -> Result<MutationResponse, DeskError> {
        self.ensure_loaded(request.entity)?;
        self.memory.insert(request)
    }

    fn update(&mut self, request: UpdateRequest) -> Result<MutationResponse, DeskError> {
        self.ensure_loaded(request.entity)?;
        self.memory.update(request)
    }

    fn delete(&mut self, request: DeleteRequest) -> Result<MutationResponse, DeskError> {
        self.ensure_loaded(request.entity)?;
        self.memory.delete(request)
    }
}

fn detect_file_type(path: &Path) -> Result<FileType, DeskError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        Some("JSON") => Ok(FileType::JSON),
        _ => Err(DeskError::UnknownFileType),
    }
}

fn scan(path: &Path) -> Result<LazyFrame, DeskError> {
    let pl_path = PlPath::Local(path.into());
    let frame = match detect_file_type(path)? {
        FileType::CSV => LazyCsvReader::new(pl_path).with_has_header(true).finish()?,
        FileType::PARQUET => LazyFrame::scan_parquet(pl_path, ScanArgsParquet::default())?,
        FileType::ARROW => LazyFrame::scan_ipc(
            pl_path,
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )?,
        FileType::JSON => return Err(DeskError::UnknownFileType),
    };
    Ok(frame)
}

/// Load a data file as records, converting columns in parallel.
pub fn load_records(path: &Path) -> Result<Vec<Record>, DeskError> {
    let start_time = Instant::now();
    let records = match detect_file_type(path)? {
        FileType::JSON => read_json_records(path)?,
        _ => frame_to_records(&scan(path)?.collect()?)?,
    };
    info!(
        "Loaded {} rows from {} in {}ms",
        records.len(),
        path.display(),
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

/// A JSON array of objects. Nested objects are kept as they are.
fn read_json_records(path: &Path) -> Result<Vec<Record>, DeskError> {
    let text = fs::read_to_string(path)?;
    let records: Vec<Record> = serde_json::from_str(&text)?;
    Ok(records)
}

pub fn frame_to_records(df: &DataFrame) -> Result<Vec<Record>, DeskError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let columns: Result<Vec<Vec<Value>>, PolarsError> =
        names.par_iter().map(|name| load_column(df, name)).collect();
    let columns = columns?;
    for (name, column) in names.iter().zip(columns.iter()) {
        debug!("Column \"{}\": {} values", name, column.len());
    }

    let records = (0..df.height())
        .map(|row| {
            names
                .iter()
                .zip(columns.iter())
                .map(|(name, column)| (name.clone(), column[row].clone()))
                .collect::<Record>()
        })
        .collect();
    Ok(records)
}

fn load_column(df: &DataFrame, name: &str) -> Result<Vec<Value>, PolarsError> {
    let column = df.column(name)?;
    let dtype = column.dtype().clone();
    let values = if dtype.is_integer() {
        let casted = column.cast(&DataType::Int64)?;
        casted
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect()
    } else if dtype.is_float() {
        let casted = column.cast(&DataType::Float64)?;
        casted
            .f64()?
            .into_iter()
            .map(|v| {
                v.and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            })
            .collect()
    } else if dtype == DataType::Boolean {
        column
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect()
    } else {
        let casted = column.cast(&DataType::String)?;
        casted
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
            .collect()
    };
    Ok(values)
}
