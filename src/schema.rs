//! Canonical row model and its field schema.
//!
//! Every record in the store is a [`CanonicalRow`]: a named-field struct whose
//! layout is described by [`FIELDS`], an ordered list of [`FieldSpec`]s giving
//! each field's display label, value kind and [`Ownership`] class. Positional
//! access (column index in a rendered table) always goes through that list.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Separator placed between the work order and task card in a [`RecordKey`].
pub const KEY_SEPARATOR: char = '_';

/// Separator used when a row carries several department tags.
pub const TAG_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Aircraft,
    Department,
    WorkOrder,
    TaskCard,
    Description,
    CorrectiveAction,
    Date,
    Zone,
    Status,
    PlannedHours,
    ActualHours,
    Ratio,
    Note,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Tags,
    Date,
    Number,
}

/// Who owns a field's value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Ownership {
    /// Refreshed from the import on every reconciliation.
    Source,
    /// Recomputed from source fields (or the auxiliary mapping) on every reconciliation.
    Derived,
    /// Set by the user; survives re-imports of the same key.
    Sticky,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub ownership: Ownership,
}

const fn spec(
    field: Field,
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
    ownership: Ownership,
) -> FieldSpec {
    FieldSpec {
        field,
        name,
        label,
        kind,
        ownership,
    }
}

/// Field layout in display order.
pub const FIELDS: [FieldSpec; 13] = [
    spec(Field::Aircraft, "aircraft", "Aircraft", FieldKind::Text, Ownership::Derived),
    spec(Field::Department, "department", "Department", FieldKind::Tags, Ownership::Sticky),
    spec(Field::WorkOrder, "work_order", "WO", FieldKind::Text, Ownership::Source),
    spec(Field::TaskCard, "task_card", "Task Card", FieldKind::Text, Ownership::Source),
    spec(Field::Description, "description", "Description", FieldKind::Text, Ownership::Source),
    spec(
        Field::CorrectiveAction,
        "corrective_action",
        "Corrective Action",
        FieldKind::Text,
        Ownership::Source,
    ),
    spec(Field::Date, "date", "Date", FieldKind::Date, Ownership::Source),
    spec(Field::Zone, "zone", "Zone", FieldKind::Text, Ownership::Source),
    spec(Field::Status, "status", "Status", FieldKind::Text, Ownership::Source),
    spec(Field::PlannedHours, "planned_hours", "Planned", FieldKind::Number, Ownership::Source),
    spec(Field::ActualHours, "actual_hours", "Actual", FieldKind::Number, Ownership::Source),
    spec(Field::Ratio, "ratio", "Ratio %", FieldKind::Number, Ownership::Derived),
    spec(Field::Note, "note", "Note", FieldKind::Text, Ownership::Sticky),
];

/// Source fields in the order the import column list populates them.
pub const SOURCE_FIELDS: [Field; 9] = [
    Field::WorkOrder,
    Field::TaskCard,
    Field::Description,
    Field::CorrectiveAction,
    Field::Date,
    Field::Zone,
    Field::Status,
    Field::PlannedHours,
    Field::ActualHours,
];

impl Field {
    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self.index()]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Field> {
        FIELDS.get(index).map(|spec| spec.field)
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn kind(self) -> FieldKind {
        self.spec().kind
    }

    pub fn ownership(self) -> Ownership {
        self.spec().ownership
    }

    pub fn is_sticky(self) -> bool {
        self.ownership() == Ownership::Sticky
    }

    /// Resolves a column by snake_case name, display label or numeric position.
    pub fn resolve(column: &str) -> Option<Field> {
        let trimmed = column.trim();
        if let Ok(index) = trimmed.parse::<usize>() {
            return Field::from_index(index);
        }
        FIELDS
            .iter()
            .find(|spec| {
                spec.name.eq_ignore_ascii_case(trimmed) || spec.label.eq_ignore_ascii_case(trimmed)
            })
            .map(|spec| spec.field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::resolve(s).ok_or_else(|| Error::UnknownColumn(s.to_string()))
    }
}

/// Identity of a record across imports: work order and task card joined by [`KEY_SEPARATOR`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(work_order: &str, task_card: &str) -> Self {
        RecordKey(format!("{work_order}{KEY_SEPARATOR}{task_card}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        RecordKey(value.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalRow {
    #[serde(default)]
    pub aircraft: String,
    #[serde(default)]
    pub department: String,
    pub work_order: String,
    pub task_card: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub corrective_action: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub planned_hours: String,
    #[serde(default)]
    pub actual_hours: String,
    #[serde(default)]
    pub ratio: String,
    #[serde(default)]
    pub note: String,
}

impl CanonicalRow {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.work_order, &self.task_card)
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Aircraft => &self.aircraft,
            Field::Department => &self.department,
            Field::WorkOrder => &self.work_order,
            Field::TaskCard => &self.task_card,
            Field::Description => &self.description,
            Field::CorrectiveAction => &self.corrective_action,
            Field::Date => &self.date,
            Field::Zone => &self.zone,
            Field::Status => &self.status,
            Field::PlannedHours => &self.planned_hours,
            Field::ActualHours => &self.actual_hours,
            Field::Ratio => &self.ratio,
            Field::Note => &self.note,
        }
    }

    pub fn slot_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Aircraft => &mut self.aircraft,
            Field::Department => &mut self.department,
            Field::WorkOrder => &mut self.work_order,
            Field::TaskCard => &mut self.task_card,
            Field::Description => &mut self.description,
            Field::CorrectiveAction => &mut self.corrective_action,
            Field::Date => &mut self.date,
            Field::Zone => &mut self.zone,
            Field::Status => &mut self.status,
            Field::PlannedHours => &mut self.planned_hours,
            Field::ActualHours => &mut self.actual_hours,
            Field::Ratio => &mut self.ratio,
            Field::Note => &mut self.note,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        *self.slot_mut(field) = value.into();
    }

    /// Copies every sticky field from `previous` into `self`.
    pub fn preserve_sticky_from(&mut self, previous: &CanonicalRow) {
        for spec in FIELDS.iter().filter(|spec| spec.ownership == Ownership::Sticky) {
            self.set(spec.field, previous.get(spec.field));
        }
    }

    /// True when source and derived fields are identical.
    pub fn same_import_fields(&self, other: &CanonicalRow) -> bool {
        FIELDS
            .iter()
            .filter(|spec| spec.ownership != Ownership::Sticky)
            .all(|spec| self.get(spec.field) == other.get(spec.field))
    }

    pub fn cells(&self) -> impl Iterator<Item = &str> + '_ {
        FIELDS.iter().map(move |spec| self.get(spec.field))
    }

    pub fn to_record(&self) -> Vec<String> {
        self.cells().map(str::to_string).collect()
    }

    /// Department tags of this row, trimmed and without empties.
    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        split_tags(&self.department)
    }
}

pub fn split_tags(value: &str) -> impl Iterator<Item = &str> + '_ {
    value
        .split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
}

/// Labels used for columns that do not come from the import header.
pub fn default_headers() -> Vec<String> {
    FIELDS.iter().map(|spec| spec.label.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_indices_follow_display_order() {
        for (idx, spec) in FIELDS.iter().enumerate() {
            assert_eq!(spec.field.index(), idx, "{}", spec.name);
        }
    }

    #[test]
    fn resolve_accepts_names_labels_and_positions() {
        assert_eq!(Field::resolve("status"), Some(Field::Status));
        assert_eq!(Field::resolve("Ratio %"), Some(Field::Ratio));
        assert_eq!(Field::resolve("6"), Some(Field::Date));
        assert_eq!(Field::resolve("13"), None);
        assert!("bogus".parse::<Field>().is_err());
    }

    #[test]
    fn preserve_sticky_only_touches_user_fields() {
        let previous = CanonicalRow {
            work_order: "W1".into(),
            task_card: "T1".into(),
            status: "OPEN".into(),
            note: "check hinge".into(),
            department: "AVI".into(),
            ..Default::default()
        };
        let mut fresh = CanonicalRow {
            work_order: "W1".into(),
            task_card: "T1".into(),
            status: "CLOSED".into(),
            ..Default::default()
        };
        fresh.preserve_sticky_from(&previous);
        assert_eq!(fresh.note, "check hinge");
        assert_eq!(fresh.department, "AVI");
        assert_eq!(fresh.status, "CLOSED");
        assert!(!fresh.same_import_fields(&previous));
    }

    #[test]
    fn tags_skip_blank_entries() {
        let row = CanonicalRow {
            department: "AVI, ,MEC,".into(),
            ..Default::default()
        };
        assert_eq!(row.tags().collect::<Vec<_>>(), vec!["AVI", "MEC"]);
    }

    #[test]
    fn key_joins_work_order_and_task_card() {
        assert_eq!(RecordKey::new("W1", "T9").as_str(), "W1_T9");
    }
}
