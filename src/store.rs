use chrono::Utc;
use log::{debug, info};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::model::Recipe;

/// Field holding the records when the store is an object
pub const RECIPES_FIELD: &str = "recipes";

/// Top-level layout of a store file
#[derive(Debug, Clone, PartialEq)]
pub enum StoreShape {
    /// `[ {...}, {...} ]`
    Array,
    /// `{ "recipes": [...], ...other fields }`; the other fields are kept as-is
    Object(Map<String, Value>),
}

/// The store content as read at the start of a run
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Stored records as read, written back verbatim
    pub items: Vec<Value>,
    /// Typed view of `items`, used for identity and labels only
    pub records: Vec<Recipe>,
    pub shape: StoreShape,
    /// Exact bytes read, used for the backup copy
    pub raw: Vec<u8>,
}

impl StoreSnapshot {
    /// Encode the stored records followed by `accepted`, in the same shape as
    /// this snapshot. Stored records are not re-encoded from their typed view.
    pub fn encode(&self, accepted: &[Recipe]) -> Result<Vec<u8>, StoreError> {
        let mut items = self.items.clone();
        for recipe in accepted {
            items.push(serde_json::to_value(recipe)?);
        }
        let records = Value::Array(items);
        let value = match &self.shape {
            StoreShape::Array => records,
            StoreShape::Object(fields) => {
                let mut fields = fields.clone();
                // insert on an existing key keeps its position
                fields.insert(RECIPES_FIELD.to_string(), records);
                Value::Object(fields)
            }
        };
        let mut bytes = serde_json::to_vec_pretty(&value)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Backing storage for the recipe set.
///
/// A run calls `load` once, then, only if records were accepted, `backup`
/// followed by `replace`. `replace` is never called when `backup` failed.
pub trait RecipeStore {
    fn load(&self) -> Result<StoreSnapshot, StoreError>;

    /// Persist a copy of the pre-merge content and return a token naming it
    fn backup(&self, snapshot: &StoreSnapshot) -> Result<String, StoreError>;

    /// Rewrite the store as the snapshot's records followed by `accepted`,
    /// all or nothing
    fn replace(
        &self,
        snapshot: &StoreSnapshot,
        accepted: &[Recipe],
        backup: &str,
    ) -> Result<(), StoreError>;
}

/// Parse store bytes, accepting either an array of records or an object with a
/// `recipes` array. Anything else is rejected rather than read as empty.
pub fn parse_store(path: &Path, raw: Vec<u8>) -> Result<StoreSnapshot, StoreError> {
    let shape_error = |reason: String| StoreError::Shape {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value =
        serde_json::from_slice(&raw).map_err(|e| shape_error(format!("not valid JSON: {e}")))?;

    let (items, shape) = match value {
        Value::Array(items) => (items, StoreShape::Array),
        Value::Object(fields) => {
            let items = match fields.get(RECIPES_FIELD) {
                Some(Value::Array(items)) => items.clone(),
                Some(_) => return Err(shape_error(format!("`{RECIPES_FIELD}` is not an array"))),
                None => return Err(shape_error(format!("object has no `{RECIPES_FIELD}` array"))),
            };
            (items, StoreShape::Object(fields))
        }
        other => {
            return Err(shape_error(format!(
                "expected an array or an object, found {}",
                json_kind(&other)
            )))
        }
    };

    let records = items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let Value::Object(fields) = item else {
                return Err(shape_error(format!(
                    "record {position} is {}, not an object",
                    json_kind(item)
                )));
            };
            Ok(serde_json::from_value::<Recipe>(item.clone()).unwrap_or_else(|e| {
                debug!("Record {position} read for identity only: {e}");
                Recipe::identity_view(fields)
            }))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StoreSnapshot {
        items,
        records,
        shape,
        raw,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A store kept in a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: None,
        }
    }

    /// Write backups to `dir` instead of next to the store file
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_dir(&self) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recipes".to_string())
    }
}

impl RecipeStore for JsonFileStore {
    fn load(&self) -> Result<StoreSnapshot, StoreError> {
        let raw = fs::read(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        let snapshot = parse_store(&self.path, raw)?;
        debug!(
            "Loaded {} records from {}",
            snapshot.records.len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    fn backup(&self, snapshot: &StoreSnapshot) -> Result<String, StoreError> {
        let dir = self.backup_dir();
        let path = write_new_file(&dir, &self.file_stem(), &snapshot.raw).map_err(|(path, source)| {
            StoreError::Backup { path, source }
        })?;
        info!("Backup written to {}", path.display());
        Ok(path.display().to_string())
    }

    fn replace(
        &self,
        snapshot: &StoreSnapshot,
        accepted: &[Recipe],
        backup: &str,
    ) -> Result<(), StoreError> {
        let bytes = snapshot.encode(accepted)?;
        write_atomic(&self.path, &bytes).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            backup: backup.to_string(),
            source,
        })?;
        info!(
            "Store {} now holds {} records",
            self.path.display(),
            snapshot.items.len() + accepted.len()
        );
        Ok(())
    }
}

/// Create a timestamped file that did not exist before. Names sort by time;
/// a numeric suffix separates runs that land on the same microsecond.
fn write_new_file(dir: &Path, stem: &str, bytes: &[u8]) -> Result<PathBuf, (PathBuf, io::Error)> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).map_err(|e| (dir.to_path_buf(), e))?;
    }

    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.backup-{stamp}.json")
        } else {
            format!("{stem}.backup-{stamp}-{attempt}.json")
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                return file
                    .write_all(bytes)
                    .and_then(|_| file.sync_all())
                    .map(|_| path.clone())
                    .map_err(|e| (path, e));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err((path, e)),
        }
    }
}

/// Write to a sibling temp file, then rename over the target.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
