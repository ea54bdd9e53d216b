use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Track non-routine work cards across periodic exports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge an export into the store, keeping notes and departments
    Import(ImportArgs),
    /// Filter, sort and page through the stored records
    View(ViewArgs),
    /// Set the note or departments of a record
    Annotate(AnnotateArgs),
    /// Edit the work order to aircraft mapping
    Map(MapArgs),
    /// List the values available for a facet
    Facets(FacetsArgs),
    /// Manage configuration files
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Directory holding the record store
    #[arg(short, long)]
    pub store: PathBuf,
    /// Fallback cache directory used when the store cannot be read or written
    #[arg(long)]
    pub cache: Option<PathBuf>,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Export file to import: CSV/TSV or an xlsx/xls/ods workbook ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub store: StoreArgs,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Case-insensitive text searched in every column
    #[arg(long)]
    pub search: Option<String>,
    /// Facet selections such as `status=OPEN` or `department=AVI,MEC`
    #[arg(long = "facet", action = clap::ArgAction::Append)]
    pub facets: Vec<String>,
    /// Sort directive of the form `column[:asc|desc]`
    #[arg(long)]
    pub sort: Option<String>,
    /// Page to display (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per page (defaults to the configured page size)
    #[arg(long = "page-size")]
    pub page_size: Option<usize>,
    /// Write the whole filtered view as CSV instead of printing a page
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter for --output
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct AnnotateArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Record key (`<work order>_<task card>`)
    #[arg(short, long)]
    pub key: String,
    /// Free-text note
    #[arg(long)]
    pub note: Option<String>,
    /// Comma-separated department tags (empty string clears them)
    #[arg(long)]
    pub department: Option<String>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Assignments of the form `WO=AIRCRAFT`
    #[arg(long = "set", action = clap::ArgAction::Append)]
    pub set: Vec<String>,
    /// Work orders to remove from the mapping
    #[arg(long = "remove", action = clap::ArgAction::Append)]
    pub remove: Vec<String>,
    /// Print the mapping after applying changes
    #[arg(long)]
    pub list: bool,
}

#[derive(Debug, Args)]
pub struct FacetsArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Facet name (aircraft, status, zone, department)
    #[arg(short, long)]
    pub facet: String,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write the default configuration to a file
    Init {
        /// Destination YAML file
        path: PathBuf,
    },
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

/// Splits `name=value` into its trimmed parts.
pub fn parse_assignment(spec: &str) -> Result<(String, String), String> {
    let (name, value) = spec
        .split_once('=')
        .ok_or_else(|| format!("Expected name=value, got '{spec}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Missing name in '{spec}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
