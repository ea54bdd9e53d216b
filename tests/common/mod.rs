#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use nrc_tracker::data::{Cell, RawTable};
use tempfile::{TempDir, tempdir};

pub const EXPORT_WIDTH: usize = 17;

/// One work card as it appears in an export.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub work_order: String,
    pub task_card: String,
    pub description: String,
    pub status: String,
    pub date: Cell,
    pub planned: Cell,
    pub actual: Cell,
}

impl ExportRow {
    pub fn new(work_order: &str, task_card: &str, status: &str) -> Self {
        Self {
            work_order: work_order.to_string(),
            task_card: task_card.to_string(),
            description: format!("Inspect {work_order}/{task_card}"),
            status: status.to_string(),
            date: Cell::Number(44927.0),
            planned: Cell::Number(40.0),
            actual: Cell::Number(10.0),
        }
    }

    pub fn description(mut self, value: &str) -> Self {
        self.description = value.to_string();
        self
    }

    pub fn hours(mut self, planned: f64, actual: f64) -> Self {
        self.planned = Cell::Number(planned);
        self.actual = Cell::Number(actual);
        self
    }

    pub fn date(mut self, date: Cell) -> Self {
        self.date = date;
        self
    }

    pub fn to_cells(&self) -> Vec<Cell> {
        let mut cells = vec![Cell::Empty; EXPORT_WIDTH];
        cells[0] = Cell::Text(self.work_order.clone());
        cells[1] = Cell::Text(self.task_card.clone());
        cells[5] = Cell::Text(self.description.clone());
        cells[6] = Cell::Text("Replaced".to_string());
        cells[7] = Cell::Text("Z100".to_string());
        cells[8] = Cell::Text(self.status.clone());
        cells[12] = self.date.clone();
        cells[15] = self.planned.clone();
        cells[16] = self.actual.clone();
        cells
    }
}

pub fn export_header() -> Vec<Cell> {
    (0..EXPORT_WIDTH)
        .map(|idx| match idx {
            0 => Cell::Text("WO".to_string()),
            1 => Cell::Text("Task Card".to_string()),
            8 => Cell::Text("Status".to_string()),
            12 => Cell::Text("Date".to_string()),
            other => Cell::Text(format!("Column {other}")),
        })
        .collect()
}

pub fn export_table(rows: &[ExportRow]) -> RawTable {
    RawTable::new(export_header(), rows.iter().map(ExportRow::to_cells).collect())
}

/// Renders rows the way a spreadsheet would save them as CSV.
pub fn export_csv(rows: &[ExportRow]) -> String {
    let table = export_table(rows);
    let mut out = String::new();
    for line in std::iter::once(&table.header).chain(table.rows.iter()) {
        let rendered = line
            .iter()
            .map(|cell| cell.as_display().replace(',', " "))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&rendered);
        out.push('\n');
    }
    out
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn store_dir(&self) -> PathBuf {
        self.temp_dir.path().join("store")
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
