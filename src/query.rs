use std::{
    cmp::{Ordering, Reverse},
    collections::{BTreeMap, BTreeSet},
};

use chrono::NaiveDate;
use itertools::Itertools;

use crate::{
    data::{parse_dotted_date, parse_number},
    error::{Error, Result},
    schema::{CanonicalRow, Field, FieldKind, split_tags},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    /// Row value must equal one of the selected values.
    Exact(Field),
    /// Row's comma-joined tag list must share a tag with the selection.
    Membership(Field),
}

impl FacetKind {
    pub fn field(self) -> Field {
        match self {
            FacetKind::Exact(field) | FacetKind::Membership(field) => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    pub name: String,
    pub kind: FacetKind,
}

impl Facet {
    pub fn exact(name: &str, field: Field) -> Self {
        Self {
            name: name.to_string(),
            kind: FacetKind::Exact(field),
        }
    }

    pub fn membership(name: &str, field: Field) -> Self {
        Self {
            name: name.to_string(),
            kind: FacetKind::Membership(field),
        }
    }

    /// An empty selection never excludes a row.
    pub fn matches(&self, row: &CanonicalRow, selected: &[String]) -> bool {
        if selected.is_empty() {
            return true;
        }
        match self.kind {
            FacetKind::Exact(field) => {
                let value = row.get(field);
                selected.iter().any(|candidate| candidate == value)
            }
            FacetKind::Membership(field) => {
                split_tags(row.get(field)).any(|tag| selected.iter().any(|s| s == tag))
            }
        }
    }
}

pub fn default_facets() -> Vec<Facet> {
    vec![
        Facet::exact("aircraft", Field::Aircraft),
        Facet::exact("status", Field::Status),
        Facet::exact("zone", Field::Zone),
        Facet::membership("department", Field::Department),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Stored lowercased; matched as a substring of any field.
    global: String,
    facets: BTreeMap<String, Vec<String>>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> &str {
        &self.global
    }

    pub fn set_global(&mut self, term: &str) {
        self.global = term.to_lowercase();
    }

    /// Replaces a facet's selection; blank values are dropped and an empty
    /// selection clears the facet.
    pub fn set_facet<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cleaned = values
            .into_iter()
            .map(|v| v.as_ref().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect::<BTreeSet<_>>();
        if cleaned.is_empty() {
            self.facets.remove(name);
        } else {
            self.facets
                .insert(name.to_string(), cleaned.into_iter().collect());
        }
    }

    pub fn selection(&self, name: &str) -> &[String] {
        self.facets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.global.clear();
        self.facets.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.facets.is_empty()
    }

    /// Confirms every selected facet is known.
    pub fn validate(&self, facets: &[Facet]) -> Result<()> {
        for name in self.facets.keys() {
            if !facets.iter().any(|facet| &facet.name == name) {
                return Err(Error::UnknownFacet(name.clone()));
            }
        }
        Ok(())
    }

    pub fn matches(&self, row: &CanonicalRow, facets: &[Facet]) -> bool {
        if !self.global.is_empty()
            && !row
                .cells()
                .any(|cell| cell.to_lowercase().contains(&self.global))
        {
            return false;
        }
        facets
            .iter()
            .all(|facet| facet.matches(row, self.selection(&facet.name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub field: Field,
    pub ascending: bool,
}

impl SortState {
    pub fn new(field: Field, ascending: bool) -> Self {
        Self { field, ascending }
    }

    /// Parses `column[:asc|desc]`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(2, ':');
        let column = parts.next().map(str::trim).unwrap_or_default();
        let field = column.parse::<Field>()?;
        let ascending = match parts.next().map(|d| d.trim().to_ascii_lowercase()) {
            None => true,
            Some(direction) if direction == "asc" => true,
            Some(direction) if direction == "desc" => false,
            Some(direction) => return Err(Error::UnknownColumn(format!("{column}:{direction}"))),
        };
        Ok(Self { field, ascending })
    }
}

/// Header-click behaviour: same column flips direction, a new column starts ascending.
pub fn toggle_sort(current: Option<SortState>, field: Field) -> SortState {
    match current {
        Some(state) if state.field == field => SortState::new(field, !state.ascending),
        _ => SortState::new(field, true),
    }
}

/// Sort key for one cell. Empty cells order first, then numbers, then text.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Missing,
    Date(NaiveDate),
    Number(f64),
    Text(String),
}

impl SortKey {
    fn for_cell(value: &str, kind: FieldKind) -> Self {
        if kind == FieldKind::Date {
            return parse_dotted_date(value).map_or(SortKey::Missing, SortKey::Date);
        }
        if value.trim().is_empty() {
            return SortKey::Missing;
        }
        match parse_number(value) {
            Some(number) => SortKey::Number(number),
            None => SortKey::Text(value.to_lowercase()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Date(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::Text(_) => 3,
        }
    }
}

impl Eq for SortKey {}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Stable in-place sort of a view.
pub fn sort_rows(rows: &mut [&CanonicalRow], sort: SortState) {
    let kind = sort.field.kind();
    if sort.ascending {
        rows.sort_by_cached_key(|row| SortKey::for_cell(row.get(sort.field), kind));
    } else {
        rows.sort_by_cached_key(|row| Reverse(SortKey::for_cell(row.get(sort.field), kind)));
    }
}

/// Filters the full record set, then applies the active sort.
pub fn apply<'a>(
    rows: &'a [CanonicalRow],
    filter: &FilterState,
    facets: &[Facet],
    sort: Option<SortState>,
) -> Vec<&'a CanonicalRow> {
    let mut view = rows
        .iter()
        .filter(|row| filter.matches(row, facets))
        .collect::<Vec<_>>();
    if let Some(sort) = sort {
        sort_rows(&mut view, sort);
    }
    view
}

/// Distinct non-empty values of a field (tags split for tag fields), sorted.
pub fn facet_options(rows: &[CanonicalRow], field: Field) -> Vec<String> {
    let values = rows.iter().map(|row| row.get(field));
    if field.kind() == FieldKind::Tags {
        values
            .flat_map(split_tags)
            .unique()
            .sorted()
            .map(str::to_string)
            .collect()
    } else {
        values
            .filter(|value| !value.is_empty())
            .unique()
            .sorted()
            .map(str::to_string)
            .collect()
    }
}
