use std::collections::BTreeMap;

use crate::{
    config::ImportConfig,
    data::{Cell, format_dotted_date, ratio_percentage, serial_to_date},
    error::{Error, Result},
    schema::{CanonicalRow, Field, SOURCE_FIELDS},
};

/// Work order → aircraft label lookup joined onto every projected row.
pub type AircraftMapping = BTreeMap<String, String>;

/// Projects raw import rows onto [`CanonicalRow`].
#[derive(Debug, Clone)]
pub struct SchemaMapper<'a> {
    columns: &'a [usize],
    serial_date_threshold: f64,
    mapping: &'a AircraftMapping,
}

impl<'a> SchemaMapper<'a> {
    pub fn new(config: &'a ImportConfig, mapping: &'a AircraftMapping) -> Self {
        Self {
            columns: &config.source_columns,
            serial_date_threshold: config.serial_date_threshold,
            mapping,
        }
    }

    /// Minimum header width needed to populate every source field.
    pub fn required_width(&self) -> usize {
        self.columns.iter().copied().max().map_or(0, |max| max + 1)
    }

    pub fn check_header(&self, header: &[Cell]) -> Result<()> {
        let expected = self.required_width();
        if header.len() < expected {
            return Err(Error::SchemaMismatch {
                expected,
                found: header.len(),
            });
        }
        Ok(())
    }

    pub fn project(&self, raw: &[Cell], header: &[Cell]) -> Result<CanonicalRow> {
        self.check_header(header)?;
        Ok(self.project_unchecked(raw))
    }

    /// Projects a row whose header was already validated with [`Self::check_header`].
    pub(crate) fn project_unchecked(&self, raw: &[Cell]) -> CanonicalRow {
        let mut row = CanonicalRow::default();
        let mut planned = None;
        let mut actual = None;
        for (field, &column) in SOURCE_FIELDS.iter().zip(self.columns) {
            let cell = raw.get(column).unwrap_or(&Cell::Empty);
            match field {
                Field::Date => row.set(*field, self.normalize_date(cell)),
                Field::PlannedHours => planned = cell.as_number(),
                Field::ActualHours => actual = cell.as_number(),
                _ => {}
            }
            if *field != Field::Date {
                row.set(*field, cell.as_display());
            }
        }
        row.ratio = ratio_percentage(planned, actual);
        row.aircraft = self.aircraft_for(&row.work_order);
        row
    }

    pub fn aircraft_for(&self, work_order: &str) -> String {
        self.mapping.get(work_order).cloned().unwrap_or_default()
    }

    fn normalize_date(&self, cell: &Cell) -> String {
        match cell {
            Cell::Number(serial) if *serial != 0.0 && *serial >= self.serial_date_threshold => {
                serial_to_date(*serial)
                    .map(format_dotted_date)
                    .unwrap_or_else(|| cell.as_display())
            }
            other => other.as_display(),
        }
    }

    /// Header labels for the canonical layout, taking source labels from the raw header.
    pub fn headers(&self, header: &[Cell]) -> Vec<String> {
        let mut labels = crate::schema::default_headers();
        for (field, &column) in SOURCE_FIELDS.iter().zip(self.columns) {
            if let Some(label) = header.get(column).map(Cell::as_display)
                && !label.trim().is_empty()
            {
                labels[field.index()] = label;
            }
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_row(values: &[(usize, Cell)]) -> Vec<Cell> {
        let mut row = vec![Cell::Empty; 17];
        for (idx, cell) in values {
            row[*idx] = cell.clone();
        }
        row
    }

    fn header() -> Vec<Cell> {
        (0..17).map(|i| Cell::Text(format!("col{i}"))).collect()
    }

    #[test]
    fn project_converts_serial_dates_and_ratio() {
        let config = ImportConfig::default();
        let mapping = AircraftMapping::from([("W1".to_string(), "TC-ABC".to_string())]);
        let mapper = SchemaMapper::new(&config, &mapping);
        let raw = raw_row(&[
            (0, "W1".into()),
            (1, "T1".into()),
            (8, "OPEN".into()),
            (12, Cell::Number(44927.0)),
            (15, Cell::Number(40.0)),
            (16, Cell::Number(10.0)),
        ]);
        let row = mapper.project(&raw, &header()).unwrap();
        assert_eq!(row.date, "01.01.2023");
        assert_eq!(row.ratio, "25.00");
        assert_eq!(row.aircraft, "TC-ABC");
        assert_eq!(row.status, "OPEN");
        assert_eq!(row.planned_hours, "40");
        assert!(row.note.is_empty());
        assert!(row.department.is_empty());
    }

    #[test]
    fn small_numbers_in_date_column_pass_through() {
        let config = ImportConfig::default();
        let mapping = AircraftMapping::new();
        let mapper = SchemaMapper::new(&config, &mapping);
        let raw = raw_row(&[(12, Cell::Number(150.0)), (15, "n/a".into())]);
        let row = mapper.project(&raw, &header()).unwrap();
        assert_eq!(row.date, "150");
        assert_eq!(row.ratio, "0.00");
        assert_eq!(row.aircraft, "");
    }

    #[test]
    fn missing_cells_become_empty() {
        let config = ImportConfig::default();
        let mapping = AircraftMapping::new();
        let mapper = SchemaMapper::new(&config, &mapping);
        let row = mapper.project(&[Cell::from("W2")], &header()).unwrap();
        assert_eq!(row.work_order, "W2");
        assert_eq!(row.task_card, "");
        assert_eq!(row.ratio, "0.00");
    }

    #[test]
    fn narrow_header_is_a_schema_mismatch() {
        let config = ImportConfig::default();
        let mapping = AircraftMapping::new();
        let mapper = SchemaMapper::new(&config, &mapping);
        let err = mapper.project(&[], &header()[..10]).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaMismatch {
                expected: 17,
                found: 10
            }
        ));
    }

    #[test]
    fn headers_take_source_labels_from_import() {
        let config = ImportConfig::default();
        let mapping = AircraftMapping::new();
        let mapper = SchemaMapper::new(&config, &mapping);
        let labels = mapper.headers(&header());
        assert_eq!(labels[0], "Aircraft");
        assert_eq!(labels[2], "col0");
        assert_eq!(labels[6], "col12");
        assert_eq!(labels[12], "Note");
    }
}
