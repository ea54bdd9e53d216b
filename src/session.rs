//! The dashboard context: record store, view state and collaborators in one
//! explicit object. Rendering code calls the `on_*` handlers and reads
//! [`Dashboard::snapshot`]; nothing here is global.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{StatusCounts, aggregate},
    config::Config,
    data::RawTable,
    error::{Error, Result},
    mapper::AircraftMapping,
    pager::{PageInfo, PageRequest, PageState, paginate},
    persist::{Persistence, load_auxiliary_as, save_auxiliary_as},
    query::{Facet, FilterState, SortState, apply, default_facets, facet_options, toggle_sort},
    reconcile::{CancellationToken, ReconcilePass, ReconcileProgress, ReconcileStats},
    schema::{CanonicalRow, FIELDS, Field, RecordKey, default_headers, split_tags},
    store::RecordStore,
};

pub const HEADERS_DOC: &str = "headers";
pub const MAPPING_DOC: &str = "aircraft_mapping";
pub const IMPORT_META_DOC: &str = "import_meta";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMeta {
    pub imported_at: DateTime<Utc>,
    /// SHA-256 of the imported file, when known.
    #[serde(default)]
    pub source_digest: Option<String>,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub stats: ReconcileStats,
    pub meta: ImportMeta,
    /// The same file was imported last time.
    pub repeated_source: bool,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub headers: Vec<String>,
    pub rows: Vec<CanonicalRow>,
    pub page: PageInfo,
    pub counts: StatusCounts,
    pub sort: Option<SortState>,
    pub last_import: Option<DateTime<Utc>>,
}

pub struct Dashboard {
    config: Config,
    persistence: Box<dyn Persistence>,
    store: RecordStore,
    headers: Vec<String>,
    mapping: AircraftMapping,
    facets: Vec<Facet>,
    filter: FilterState,
    sort: Option<SortState>,
    page: PageState,
    import_meta: Option<ImportMeta>,
    active_import: Option<CancellationToken>,
}

impl Dashboard {
    /// Rehydrates the dashboard from persistence.
    pub fn open(config: Config, persistence: Box<dyn Persistence>) -> Result<Self> {
        let rows = persistence.load_all()?;
        let mapping: AircraftMapping =
            load_auxiliary_as(persistence.as_ref(), MAPPING_DOC)?.unwrap_or_default();
        let headers = load_auxiliary_as::<Vec<String>>(persistence.as_ref(), HEADERS_DOC)?
            .filter(|headers| headers.len() == FIELDS.len())
            .unwrap_or_else(default_headers);
        let import_meta = load_auxiliary_as(persistence.as_ref(), IMPORT_META_DOC)?;
        let page = PageState::new(config.view.page_size);
        let mut dashboard = Self {
            config,
            persistence,
            store: RecordStore::from_rows(rows),
            headers,
            mapping,
            facets: default_facets(),
            filter: FilterState::new(),
            sort: None,
            page,
            import_meta,
            active_import: None,
        };
        dashboard.apply_mapping();
        debug!("Loaded {} record(s)", dashboard.store.len());
        Ok(dashboard)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn mapping(&self) -> &AircraftMapping {
        &self.mapping
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort(&self) -> Option<SortState> {
        self.sort
    }

    pub fn page_state(&self) -> &PageState {
        &self.page
    }

    pub fn import_meta(&self) -> Option<&ImportMeta> {
        self.import_meta.as_ref()
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Starts a reconciliation pass, cancelling any pass still in flight.
    pub fn begin_import(&mut self, table: RawTable) -> Result<ReconcilePass> {
        if let Some(previous) = self.active_import.take() {
            debug!("Cancelling the import already in progress");
            previous.cancel();
        }
        let token = CancellationToken::new();
        let pass = ReconcilePass::new(
            &self.store,
            table,
            &self.config.import,
            &self.mapping,
            token.clone(),
        )?;
        self.active_import = Some(token);
        Ok(pass)
    }

    /// Finishes `pass`, persists the merged records and only then makes them live.
    pub fn commit_import(
        &mut self,
        pass: ReconcilePass,
        source_digest: Option<String>,
    ) -> Result<ImportReport> {
        let is_active = self
            .active_import
            .as_ref()
            .is_some_and(|token| token.same_as(pass.token()));
        if !is_active {
            return Err(if pass.token().is_cancelled() {
                Error::Cancelled
            } else {
                Error::ImportInProgress
            });
        }
        self.active_import = None;
        let outcome = pass.finish()?;
        let meta = ImportMeta {
            imported_at: Utc::now(),
            source_digest,
            rows: outcome.stats.processed,
        };
        let repeated_source = match (&meta.source_digest, &self.import_meta) {
            (Some(digest), Some(previous)) => previous.source_digest.as_ref() == Some(digest),
            _ => false,
        };

        self.persistence.save_all(outcome.store.values())?;
        self.store = outcome.store;
        self.headers = outcome.headers;
        self.import_meta = Some(meta.clone());
        self.page.reset();
        info!(
            "Import merged: {} inserted, {} updated, {} unchanged, {} untouched, {} collision(s)",
            outcome.stats.inserted,
            outcome.stats.updated,
            outcome.stats.unchanged,
            outcome.stats.untouched,
            outcome.stats.collisions
        );
        self.save_document(HEADERS_DOC, &self.headers)?;
        self.save_document(IMPORT_META_DOC, &meta)?;
        Ok(ImportReport {
            stats: outcome.stats,
            meta,
            repeated_source,
        })
    }

    /// Runs a whole import, reporting progress after every chunk.
    pub fn on_file_selected<F>(
        &mut self,
        table: RawTable,
        source_digest: Option<String>,
        mut progress: F,
    ) -> Result<ImportReport>
    where
        F: FnMut(ReconcileProgress),
    {
        let mut pass = self.begin_import(table)?;
        for step in pass.by_ref() {
            match step {
                Ok(step) => progress(step),
                Err(err) => {
                    self.active_import = None;
                    return Err(err);
                }
            }
        }
        self.commit_import(pass, source_digest)
    }

    pub fn on_global_search_changed(&mut self, term: &str) {
        self.filter.set_global(term);
        self.page.reset();
    }

    pub fn on_facet_changed<I, S>(&mut self, name: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.facets.iter().any(|facet| facet.name == name) {
            return Err(Error::UnknownFacet(name.to_string()));
        }
        self.filter.set_facet(name, values);
        self.page.reset();
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
        self.page.reset();
    }

    /// Header click on the column at `index`; leaves the current page alone.
    pub fn on_sort_column_clicked(&mut self, index: usize) -> Result<SortState> {
        let field = Field::from_index(index).ok_or_else(|| Error::UnknownColumn(index.to_string()))?;
        let sort = toggle_sort(self.sort, field);
        self.sort = Some(sort);
        Ok(sort)
    }

    pub fn set_sort(&mut self, sort: Option<SortState>) {
        self.sort = sort;
    }

    /// Returns whether the page changed; out-of-range requests are ignored.
    pub fn on_page_changed(&mut self, request: PageRequest) -> bool {
        let total = self.view().len();
        self.page.navigate(request, total)
    }

    pub fn on_page_size_changed(&mut self, page_size: usize) {
        self.page.set_page_size(page_size);
    }

    /// Applies a user edit to a sticky field and stores the row. The edit is
    /// rolled back when the store rejects it.
    pub fn on_sticky_field_edited(
        &mut self,
        key: &RecordKey,
        field: Field,
        value: &str,
    ) -> Result<()> {
        let value = if field == Field::Department {
            let tags = split_tags(value).collect::<Vec<_>>();
            if let Some(unknown) = tags.iter().find(|tag| !self.config.department_allowed(tag)) {
                return Err(Error::UnknownDepartment(unknown.to_string()));
            }
            tags.into_iter().unique().join(",")
        } else {
            value.to_string()
        };
        let previous = self
            .store
            .get(key)
            .map(|row| row.get(field).to_string())
            .ok_or_else(|| Error::UnknownRecord(key.to_string()))?;
        let updated = self.store.mutate_sticky_field(key, field, value)?.clone();
        if let Err(err) = self.persistence.save_one(&updated) {
            self.store.mutate_sticky_field(key, field, previous)?;
            return Err(err);
        }
        debug!("Updated {field} on '{key}'");
        Ok(())
    }

    /// Replaces the aircraft mapping and refreshes the aircraft column. The
    /// rows are stored before the new mapping goes live.
    pub fn set_aircraft_mapping(&mut self, mapping: AircraftMapping) -> Result<()> {
        let mut staged = self.store.clone();
        materialise_aircraft(&mut staged, &mapping);
        self.persistence.save_all(staged.values())?;
        self.store = staged;
        self.mapping = mapping;
        self.save_document(MAPPING_DOC, &self.mapping)
    }

    fn apply_mapping(&mut self) {
        materialise_aircraft(&mut self.store, &self.mapping);
    }

    /// Saves an auxiliary document once the records it describes are already stored.
    fn save_document<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        save_auxiliary_as(self.persistence.as_ref(), name, value).map_err(|err| {
            Error::AuxiliaryPersistence {
                document: name.to_string(),
                reason: err.to_string(),
            }
        })
    }

    /// Filtered and sorted rows of the whole store.
    pub fn view(&self) -> Vec<&CanonicalRow> {
        apply(self.store.values(), &self.filter, &self.facets, self.sort)
    }

    pub fn facet_options(&self, name: &str) -> Result<Vec<String>> {
        let facet = self
            .facets
            .iter()
            .find(|facet| facet.name == name)
            .ok_or_else(|| Error::UnknownFacet(name.to_string()))?;
        Ok(facet_options(self.store.values(), facet.kind.field()))
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let view = self.view();
        let counts = aggregate(view.iter().copied());
        let page = paginate(&view, self.page.page_size(), self.page.current_page());
        ViewSnapshot {
            headers: self.headers.clone(),
            rows: page.items.iter().map(|row| (*row).clone()).collect(),
            page: page.info,
            counts,
            sort: self.sort,
            last_import: self.import_meta.as_ref().map(|meta| meta.imported_at),
        }
    }
}

fn materialise_aircraft(store: &mut RecordStore, mapping: &AircraftMapping) {
    store.refresh_derived(Field::Aircraft, |row| {
        mapping.get(&row.work_order).cloned().unwrap_or_default()
    });
}
