pub mod aggregate;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod mapper;
pub mod pager;
pub mod persist;
pub mod query;
pub mod reconcile;
pub mod schema;
pub mod session;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, ConfigCommand, StoreArgs, parse_assignment},
    config::Config,
    pager::PageRequest,
    persist::{FallbackPersistence, JsonDirectory, Persistence},
    query::SortState,
    schema::{Field, RecordKey},
    session::Dashboard,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("nrc_tracker", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => handle_import(&args),
        Commands::View(args) => handle_view(&args),
        Commands::Annotate(args) => handle_annotate(&args),
        Commands::Map(args) => handle_map(&args),
        Commands::Facets(args) => handle_facets(&args),
        Commands::Config(ConfigCommand::Init { path }) => {
            Config::default()
                .save(&path)
                .with_context(|| format!("Writing default config to {path:?}"))?;
            info!("Default configuration written to {path:?}");
            Ok(())
        }
    }
}

fn open_dashboard(args: &StoreArgs) -> Result<Dashboard> {
    let config = Config::load_or_default(args.config.as_deref())?;
    let primary: Box<dyn Persistence> = Box::new(JsonDirectory::new(&args.store));
    let persistence: Box<dyn Persistence> = match &args.cache {
        Some(cache) => Box::new(FallbackPersistence::new(
            primary,
            Some(Box::new(JsonDirectory::new(cache))),
        )),
        None => primary,
    };
    Dashboard::open(config, persistence)
        .with_context(|| format!("Opening store {:?}", args.store))
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Importing '{}' into {:?} (delimiter '{}')",
        args.input.display(),
        args.store.store,
        printable_delimiter(delimiter)
    );
    let mut dashboard = open_dashboard(&args.store)?;
    let (table, digest) = io_utils::read_raw_table(&args.input, delimiter, encoding)?;
    let report = dashboard
        .on_file_selected(table, Some(digest), |progress| {
            debug!("Import progress: {}%", progress.percent());
        })
        .with_context(|| format!("Importing {:?}", args.input))?;
    if report.repeated_source {
        info!("This file matches the previous import");
    }
    if report.stats.collisions > 0 {
        warn!(
            "{} row(s) repeated a key already seen in this file; the later rows were kept",
            report.stats.collisions
        );
    }
    let stats = &report.stats;
    println!(
        "Imported {} row(s): {} new, {} updated, {} unchanged, {} not in file, {} skipped",
        stats.processed,
        stats.inserted,
        stats.updated,
        stats.unchanged,
        stats.untouched,
        stats.skipped
    );
    println!("Store now holds {} record(s)", dashboard.store().len());
    Ok(())
}

fn handle_view(args: &cli::ViewArgs) -> Result<()> {
    let mut dashboard = open_dashboard(&args.store)?;
    if let Some(term) = &args.search {
        dashboard.on_global_search_changed(term);
    }
    for spec in &args.facets {
        let (name, value) = parse_assignment(spec).map_err(|err| anyhow!(err))?;
        dashboard.on_facet_changed(&name, value.split(schema::TAG_SEPARATOR))?;
    }
    if let Some(sort) = &args.sort {
        dashboard.set_sort(Some(SortState::parse(sort)?));
    }
    if let Some(page_size) = args.page_size {
        dashboard.on_page_size_changed(page_size);
    }
    debug!(
        "View filter: {:?}, sort: {:?}",
        dashboard.filter(),
        dashboard.sort()
    );

    if let Some(output) = &args.output {
        let delimiter = io_utils::resolve_output_delimiter(Some(output), args.output_delimiter);
        let mut writer = io_utils::open_csv_writer(Some(output), delimiter)?;
        writer
            .write_record(dashboard.headers())
            .context("Writing output headers")?;
        let view = dashboard.view();
        for row in &view {
            writer
                .write_record(row.cells())
                .context("Writing output row")?;
        }
        writer.flush().context("Flushing output")?;
        info!("Wrote {} row(s) to {:?}", view.len(), output);
        return Ok(());
    }

    if args.page != 1 && !dashboard.on_page_changed(PageRequest::To(args.page)) {
        warn!("Page {} is out of range; showing page 1", args.page);
    }
    print!("{}", table::render_view(&dashboard.snapshot()));
    Ok(())
}

fn handle_annotate(args: &cli::AnnotateArgs) -> Result<()> {
    if args.note.is_none() && args.department.is_none() {
        return Err(anyhow!("Nothing to change: pass --note and/or --department"));
    }
    let mut dashboard = open_dashboard(&args.store)?;
    let key = RecordKey::from(args.key.as_str());
    if let Some(note) = &args.note {
        dashboard.on_sticky_field_edited(&key, Field::Note, note)?;
    }
    if let Some(department) = &args.department {
        dashboard.on_sticky_field_edited(&key, Field::Department, department)?;
    }
    info!("Updated record '{key}'");
    Ok(())
}

fn handle_map(args: &cli::MapArgs) -> Result<()> {
    let mut dashboard = open_dashboard(&args.store)?;
    if !args.set.is_empty() || !args.remove.is_empty() {
        let mut mapping = dashboard.mapping().clone();
        for spec in &args.set {
            let (work_order, aircraft) = parse_assignment(spec).map_err(|err| anyhow!(err))?;
            mapping.insert(work_order, aircraft);
        }
        for work_order in &args.remove {
            if mapping.remove(work_order.trim()).is_none() {
                warn!("Work order '{work_order}' was not mapped");
            }
        }
        dashboard.set_aircraft_mapping(mapping)?;
        info!(
            "Aircraft mapping saved with {} entr(ies)",
            dashboard.mapping().len()
        );
    }
    if args.list {
        for (work_order, aircraft) in dashboard.mapping() {
            println!("{work_order}\t{aircraft}");
        }
    }
    Ok(())
}

fn handle_facets(args: &cli::FacetsArgs) -> Result<()> {
    let dashboard = open_dashboard(&args.store)?;
    for value in dashboard.facet_options(&args.facet)? {
        println!("{value}");
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
