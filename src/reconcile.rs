//! Chunked merge of a raw import into the record store.
//!
//! A [`ReconcilePass`] validates the import up front, then works through the
//! data rows one chunk at a time against a *staged* copy of the store. Each
//! call to [`Iterator::next`] processes a single chunk and yields the progress
//! so far, which gives the host a natural point to hand control back to its
//! scheduler. Nothing becomes visible until [`ReconcilePass::finish`] returns
//! the staged store; a pass whose [`CancellationToken`] fired can never finish.
//!
//! Merge rules per row:
//!
//! - key already stored: source and derived fields come from the import,
//!   sticky fields are carried over from the stored row;
//! - key unknown: the projected row is inserted with empty sticky fields;
//! - key repeated within the same import: the later row wins (file order)
//!   and the repeat is counted as a collision.
//!
//! Stored rows whose key does not occur in the import are left untouched.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    config::ImportConfig,
    data::{Cell, RawTable},
    error::{Error, Result},
    mapper::{AircraftMapping, SchemaMapper},
    schema::RecordKey,
    store::RecordStore,
};

/// The key columns must be present for any import to make sense.
pub const MIN_HEADER_WIDTH: usize = 2;

/// Shared flag used to abandon an in-flight pass.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileProgress {
    pub processed: usize,
    pub total: usize,
}

impl ReconcileProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Data rows read from the import.
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Existing keys whose imported fields did not change.
    pub unchanged: usize,
    /// Existing keys absent from the import.
    pub untouched: usize,
    /// Rows repeating a key seen earlier in the same import.
    pub collisions: usize,
    /// Rows with no content at all.
    pub skipped: usize,
}

impl ReconcileStats {
    pub fn changed_anything(&self) -> bool {
        self.inserted > 0 || self.updated > 0
    }
}

/// Result of a completed pass, ready to replace the live store.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub store: RecordStore,
    pub headers: Vec<String>,
    pub stats: ReconcileStats,
}

pub struct ReconcilePass {
    table: RawTable,
    config: ImportConfig,
    mapping: AircraftMapping,
    staged: RecordStore,
    existing_len: usize,
    seen: HashSet<RecordKey>,
    next_row: usize,
    token: CancellationToken,
    stats: ReconcileStats,
    halted: bool,
}

impl ReconcilePass {
    /// Validates the import shape and prepares a pass over a copy of `existing`.
    pub fn new(
        existing: &RecordStore,
        table: RawTable,
        config: &ImportConfig,
        mapping: &AircraftMapping,
        token: CancellationToken,
    ) -> Result<Self> {
        validate_shape(&table)?;
        SchemaMapper::new(config, mapping).check_header(&table.header)?;
        debug!(
            "Reconciling {} data row(s) against {} stored record(s) in chunks of {}",
            table.rows.len(),
            existing.len(),
            config.chunk_size
        );
        Ok(Self {
            table,
            config: config.clone(),
            mapping: mapping.clone(),
            staged: existing.clone(),
            existing_len: existing.len(),
            seen: HashSet::new(),
            next_row: 0,
            token,
            stats: ReconcileStats::default(),
            halted: false,
        })
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn progress(&self) -> ReconcileProgress {
        ReconcileProgress {
            processed: self.next_row,
            total: self.table.rows.len(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_row >= self.table.rows.len()
    }

    fn process_chunk(&mut self) -> Result<ReconcileProgress> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let chunk_size = self.config.chunk_size.max(1);
        let end = (self.next_row + chunk_size).min(self.table.rows.len());
        let mapper = SchemaMapper::new(&self.config, &self.mapping);
        for idx in self.next_row..end {
            let raw = &self.table.rows[idx];
            self.stats.processed += 1;
            if raw.iter().all(|cell| matches!(cell, Cell::Empty)) {
                self.stats.skipped += 1;
                continue;
            }
            let mut fresh = mapper.project_unchecked(raw);
            let key = fresh.key();
            let repeated = !self.seen.insert(key.clone());
            match self.staged.get(&key) {
                Some(previous) => {
                    fresh.preserve_sticky_from(previous);
                    if repeated {
                        self.stats.collisions += 1;
                        warn!(
                            "Row {} repeats key '{key}' from earlier in this import; keeping the later row",
                            idx + 2
                        );
                    } else if fresh.same_import_fields(previous) {
                        self.stats.unchanged += 1;
                    } else {
                        self.stats.updated += 1;
                    }
                }
                None => self.stats.inserted += 1,
            }
            self.staged.set(key, fresh);
        }
        self.next_row = end;
        let progress = self.progress();
        debug!(
            "Reconciled {}/{} row(s) ({}%)",
            progress.processed,
            progress.total,
            progress.percent()
        );
        Ok(progress)
    }

    /// Drains any remaining chunks and hands back the merged store.
    pub fn finish(mut self) -> Result<ReconcileOutcome> {
        while !self.is_complete() {
            self.process_chunk()?;
        }
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.stats.untouched = self
            .existing_len
            .saturating_sub(self.stats.updated + self.stats.unchanged);
        let headers = SchemaMapper::new(&self.config, &self.mapping).headers(&self.table.header);
        Ok(ReconcileOutcome {
            store: self.staged,
            headers,
            stats: self.stats,
        })
    }
}

impl Iterator for ReconcilePass {
    type Item = Result<ReconcileProgress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted || self.is_complete() {
            return None;
        }
        let step = self.process_chunk();
        if step.is_err() {
            self.halted = true;
        }
        Some(step)
    }
}

fn validate_shape(table: &RawTable) -> Result<()> {
    if table.total_rows() < 2 {
        return Err(Error::invalid_format(format!(
            "expected a header and at least one data row, found {} row(s)",
            table.total_rows()
        )));
    }
    if table.header.len() < MIN_HEADER_WIDTH {
        return Err(Error::invalid_format(format!(
            "header has {} column(s), at least {MIN_HEADER_WIDTH} required",
            table.header.len()
        )));
    }
    Ok(())
}

/// Runs a full pass in one go.
pub fn reconcile(
    existing: &RecordStore,
    table: RawTable,
    config: &ImportConfig,
    mapping: &AircraftMapping,
) -> Result<ReconcileOutcome> {
    ReconcilePass::new(existing, table, config, mapping, CancellationToken::new())?.finish()
}
