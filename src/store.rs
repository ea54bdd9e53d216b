use std::collections::HashMap;

use crate::{
    error::{Error, Result},
    schema::{CanonicalRow, Field, RecordKey},
};

/// Authoritative key → row mapping. Rows keep the order in which their key
/// first appeared so unsorted views are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    rows: Vec<CanonicalRow>,
    positions: HashMap<RecordKey, usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from persisted rows; a later duplicate key replaces the earlier row.
    pub fn from_rows(rows: impl IntoIterator<Item = CanonicalRow>) -> Self {
        let mut store = Self::new();
        for row in rows {
            store.set(row.key(), row);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn get(&self, key: &RecordKey) -> Option<&CanonicalRow> {
        self.positions.get(key).map(|&idx| &self.rows[idx])
    }

    /// Inserts or wholly replaces the row for `key`. Sticky fields are not
    /// merged here; callers combine them first.
    pub fn set(&mut self, key: RecordKey, row: CanonicalRow) -> Option<CanonicalRow> {
        match self.positions.get(&key) {
            Some(&idx) => Some(std::mem::replace(&mut self.rows[idx], row)),
            None => {
                self.positions.insert(key, self.rows.len());
                self.rows.push(row);
                None
            }
        }
    }

    pub fn values(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn keys(&self) -> impl Iterator<Item = RecordKey> + '_ {
        self.rows.iter().map(CanonicalRow::key)
    }

    pub fn into_rows(self) -> Vec<CanonicalRow> {
        self.rows
    }

    /// Applies a user edit to a sticky field and returns the updated row.
    pub fn mutate_sticky_field(
        &mut self,
        key: &RecordKey,
        field: Field,
        value: impl Into<String>,
    ) -> Result<&CanonicalRow> {
        if !field.is_sticky() {
            return Err(Error::NotSticky(field.name().to_string()));
        }
        let idx = *self
            .positions
            .get(key)
            .ok_or_else(|| Error::UnknownRecord(key.to_string()))?;
        let row = &mut self.rows[idx];
        row.set(field, value);
        Ok(row)
    }

    /// Rewrites a derived field on every row.
    pub(crate) fn refresh_derived<F>(&mut self, field: Field, mut compute: F)
    where
        F: FnMut(&CanonicalRow) -> String,
    {
        for row in &mut self.rows {
            let value = compute(row);
            row.set(field, value);
        }
    }
}
