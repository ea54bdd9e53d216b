use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::schema::SOURCE_FIELDS;

pub const DEFAULT_SOURCE_COLUMNS: [usize; 9] = [0, 1, 5, 6, 12, 7, 8, 15, 16];
pub const DEFAULT_SERIAL_DATE_THRESHOLD: f64 = 20000.0;
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_DEPARTMENTS: [&str; 6] = ["Cabin", "Ortak Cabin", "AVI", "MEC", "STR", "OTHER"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub import: ImportConfig,
    pub view: ViewConfig,
    /// Allowed department tags; empty accepts any tag.
    pub departments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    /// Raw column index for each source field, in canonical order.
    pub source_columns: Vec<usize>,
    /// Numbers below this in the date column are not treated as serial dates.
    pub serial_date_threshold: f64,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            import: ImportConfig::default(),
            view: ViewConfig::default(),
            departments: DEFAULT_DEPARTMENTS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            source_columns: DEFAULT_SOURCE_COLUMNS.to_vec(),
            serial_date_threshold: DEFAULT_SERIAL_DATE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let mut raw = String::new();
        file.read_to_string(&mut raw)?;
        let config: Config =
            serde_yaml::from_str(&raw).with_context(|| format!("Parsing config file {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_yaml::to_string(self).context("Serializing config")?;
        let mut file =
            File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.import.source_columns.len() == SOURCE_FIELDS.len(),
            "import.source_columns must list {} column indices, found {}",
            SOURCE_FIELDS.len(),
            self.import.source_columns.len()
        );
        ensure!(self.import.chunk_size > 0, "import.chunk_size must be positive");
        ensure!(self.view.page_size > 0, "view.page_size must be positive");
        Ok(())
    }

    pub fn department_allowed(&self, tag: &str) -> bool {
        self.departments.is_empty() || self.departments.iter().any(|d| d == tag)
    }
}
