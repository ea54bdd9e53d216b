//! Durable storage for records and auxiliary documents.
//!
//! [`Persistence`] is the collaborator contract used by the dashboard. Every
//! call may fail and returns an [`Error::Persistence`] in that case; callers
//! decide whether to surface it. Implementations:
//!
//! - [`JsonDirectory`]: `records.json` plus `aux/<name>.json` under a directory.
//! - [`FallbackPersistence`]: a primary store mirrored into an optional cache
//!   that serves reads and absorbs writes when the primary is unavailable.
//! - [`MemoryPersistence`]: in-process store with failure switches.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    error::{Error, Result},
    schema::CanonicalRow,
};

pub const RECORDS_FILE: &str = "records.json";
pub const AUX_DIR: &str = "aux";

pub trait Persistence {
    fn load_all(&self) -> Result<Vec<CanonicalRow>>;
    fn save_all(&self, rows: &[CanonicalRow]) -> Result<()>;
    /// Stores a single row, replacing the stored row with the same key.
    fn save_one(&self, row: &CanonicalRow) -> Result<()>;
    fn load_auxiliary(&self, name: &str) -> Result<Option<JsonValue>>;
    fn save_auxiliary(&self, name: &str, value: &JsonValue) -> Result<()>;
}

pub fn load_auxiliary_as<T: DeserializeOwned>(
    store: &dyn Persistence,
    name: &str,
) -> Result<Option<T>> {
    match store.load_auxiliary(name)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|err| Error::persistence(format!("decoding '{name}'"), err)),
        None => Ok(None),
    }
}

pub fn save_auxiliary_as<T: Serialize>(store: &dyn Persistence, name: &str, value: &T) -> Result<()> {
    let json = serde_json::to_value(value)
        .map_err(|err| Error::persistence(format!("encoding '{name}'"), err))?;
    store.save_auxiliary(name, &json)
}

fn upsert_row(rows: &mut Vec<CanonicalRow>, row: &CanonicalRow) {
    let key = row.key();
    match rows.iter_mut().find(|existing| existing.key() == key) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

#[derive(Debug, Clone)]
pub struct JsonDirectory {
    root: PathBuf,
}

impl JsonDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn records_path(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    fn aux_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::persistence(
                "resolving auxiliary document",
                format!("invalid name '{name}'"),
            ));
        }
        Ok(self.root.join(AUX_DIR).join(format!("{name}.json")))
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let operation = format!("reading {}", path.display());
        let file = File::open(path).map_err(|err| Error::persistence(&operation, err))?;
        let value = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| Error::persistence(&operation, err))?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let operation = format!("writing {}", path.display());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::persistence(&operation, err))?;
        }
        let file = File::create(path).map_err(|err| Error::persistence(&operation, err))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|err| Error::persistence(&operation, err))?;
        writer
            .flush()
            .map_err(|err| Error::persistence(&operation, err))
    }
}

impl Persistence for JsonDirectory {
    fn load_all(&self) -> Result<Vec<CanonicalRow>> {
        let rows = Self::read_json(&self.records_path())?.unwrap_or_default();
        Ok(rows)
    }

    fn save_all(&self, rows: &[CanonicalRow]) -> Result<()> {
        debug!("Writing {} record(s) to {:?}", rows.len(), self.records_path());
        Self::write_json(&self.records_path(), rows)
    }

    fn save_one(&self, row: &CanonicalRow) -> Result<()> {
        let mut rows = self.load_all()?;
        upsert_row(&mut rows, row);
        Self::write_json(&self.records_path(), &rows)
    }

    fn load_auxiliary(&self, name: &str) -> Result<Option<JsonValue>> {
        Self::read_json(&self.aux_path(name)?)
    }

    fn save_auxiliary(&self, name: &str, value: &JsonValue) -> Result<()> {
        Self::write_json(&self.aux_path(name)?, value)
    }
}

/// Primary store with a mirrored cache. Writes succeed when either side
/// accepted them; only a failure of both is reported.
pub struct FallbackPersistence {
    primary: Box<dyn Persistence>,
    cache: Option<Box<dyn Persistence>>,
}

impl FallbackPersistence {
    pub fn new(primary: Box<dyn Persistence>, cache: Option<Box<dyn Persistence>>) -> Self {
        Self { primary, cache }
    }

    fn write<F>(&self, operation: &str, write: F) -> Result<()>
    where
        F: Fn(&dyn Persistence) -> Result<()>,
    {
        let primary = write(self.primary.as_ref());
        let Some(cache) = self.cache.as_deref() else {
            return primary;
        };
        let cached = write(cache);
        match (primary, cached) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(err)) => {
                warn!("Cache write failed during {operation}: {err}");
                Ok(())
            }
            (Err(err), Ok(())) => {
                warn!("Primary store failed during {operation}, kept in cache only: {err}");
                Ok(())
            }
            (Err(primary_err), Err(cache_err)) => Err(Error::persistence(
                operation,
                format!("primary: {primary_err}; cache: {cache_err}"),
            )),
        }
    }

    fn read<T, F>(&self, operation: &str, read: F) -> Result<T>
    where
        F: Fn(&dyn Persistence) -> Result<T>,
    {
        match read(self.primary.as_ref()) {
            Ok(value) => Ok(value),
            Err(primary_err) => match self.cache.as_deref() {
                Some(cache) => {
                    warn!("Primary store failed during {operation}, reading cache: {primary_err}");
                    read(cache).map_err(|cache_err| {
                        Error::persistence(
                            operation,
                            format!("primary: {primary_err}; cache: {cache_err}"),
                        )
                    })
                }
                None => Err(primary_err),
            },
        }
    }
}

impl Persistence for FallbackPersistence {
    fn load_all(&self) -> Result<Vec<CanonicalRow>> {
        self.read("load_all", |store| store.load_all())
    }

    fn save_all(&self, rows: &[CanonicalRow]) -> Result<()> {
        self.write("save_all", |store| store.save_all(rows))
    }

    fn save_one(&self, row: &CanonicalRow) -> Result<()> {
        self.write("save_one", |store| store.save_one(row))
    }

    fn load_auxiliary(&self, name: &str) -> Result<Option<JsonValue>> {
        self.read("load_auxiliary", |store| store.load_auxiliary(name))
    }

    fn save_auxiliary(&self, name: &str, value: &JsonValue) -> Result<()> {
        self.write("save_auxiliary", |store| store.save_auxiliary(name, value))
    }
}

#[derive(Debug, Default)]
pub struct MemoryPersistence {
    rows: RefCell<Vec<CanonicalRow>>,
    auxiliary: RefCell<BTreeMap<String, JsonValue>>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
    fail_auxiliary_writes: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<CanonicalRow>) -> Self {
        let store = Self::default();
        *store.rows.borrow_mut() = rows;
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Fails auxiliary document writes only; row writes keep working.
    pub fn set_fail_auxiliary_writes(&self, fail: bool) {
        self.fail_auxiliary_writes.set(fail);
    }

    pub fn auxiliary(&self, name: &str) -> Option<JsonValue> {
        self.auxiliary.borrow().get(name).cloned()
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn rows(&self) -> Vec<CanonicalRow> {
        self.rows.borrow().clone()
    }

    fn check_read(&self, operation: &str) -> Result<()> {
        if self.fail_reads.get() {
            return Err(Error::persistence(operation, "store unavailable"));
        }
        Ok(())
    }

    fn check_write(&self, operation: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(Error::persistence(operation, "store unavailable"));
        }
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

impl Persistence for MemoryPersistence {
    fn load_all(&self) -> Result<Vec<CanonicalRow>> {
        self.check_read("load_all")?;
        Ok(self.rows.borrow().clone())
    }

    fn save_all(&self, rows: &[CanonicalRow]) -> Result<()> {
        self.check_write("save_all")?;
        *self.rows.borrow_mut() = rows.to_vec();
        Ok(())
    }

    fn save_one(&self, row: &CanonicalRow) -> Result<()> {
        self.check_write("save_one")?;
        upsert_row(&mut self.rows.borrow_mut(), row);
        Ok(())
    }

    fn load_auxiliary(&self, name: &str) -> Result<Option<JsonValue>> {
        self.check_read("load_auxiliary")?;
        Ok(self.auxiliary.borrow().get(name).cloned())
    }

    fn save_auxiliary(&self, name: &str, value: &JsonValue) -> Result<()> {
        if self.fail_auxiliary_writes.get() {
            return Err(Error::persistence("save_auxiliary", "document store unavailable"));
        }
        self.check_write("save_auxiliary")?;
        self.auxiliary
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        Ok(())
    }
}

impl<P: Persistence + ?Sized> Persistence for std::rc::Rc<P> {
    fn load_all(&self) -> Result<Vec<CanonicalRow>> {
        (**self).load_all()
    }

    fn save_all(&self, rows: &[CanonicalRow]) -> Result<()> {
        (**self).save_all(rows)
    }

    fn save_one(&self, row: &CanonicalRow) -> Result<()> {
        (**self).save_one(row)
    }

    fn load_auxiliary(&self, name: &str) -> Result<Option<JsonValue>> {
        (**self).load_auxiliary(name)
    }

    fn save_auxiliary(&self, name: &str, value: &JsonValue) -> Result<()> {
        (**self).save_auxiliary(name, value)
    }
}
