//! Reading work-order exports and writing views as delimited text.
//!
//! - **Delimiter resolution**: `.tsv` → tab, anything else → comma, unless
//!   overridden on the command line.
//! - **Encoding**: the whole input is decoded up front via `encoding_rs`
//!   (BOM sniffing included), defaulting to UTF-8.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **Digest**: the raw input bytes are hashed with SHA-256 so repeat imports
//!   of the same file can be recognised.
//! - **Workbooks**: inputs whose bytes carry a zip or OLE signature are read
//!   with `calamine`; only the first sheet is imported.

use std::{
    fs::File,
    io::{self, BufWriter, Cursor, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use sha2::{Digest, Sha256};

use crate::data::{Cell, RawTable};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading input from stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(bytes)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!("Failed to decode text with encoding {}", actual.name()))
    } else {
        Ok(text.into_owned())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Parses delimited text into a raw grid. Rows may be ragged.
pub fn parse_raw_table(text: &str, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut grid = Vec::new();
    for (ordinal, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", ordinal + 1))?;
        grid.push(record.iter().map(Cell::from_text).collect::<Vec<_>>());
    }
    Ok(RawTable::from_grid(grid))
}

/// True when the bytes start like an xlsx/xlsb/ods (zip) or xls (OLE) file.
pub fn is_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_SIGNATURE) || bytes.starts_with(OLE_SIGNATURE)
}

fn workbook_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::DateTime(v) => Cell::Number(v.as_f64()),
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Cell::Text(format!("{e:?}")),
        other => Cell::Text(other.to_string()),
    }
}

/// Reads the first sheet of a workbook into a raw grid. Leading blank
/// columns are kept so column positions match the sheet.
pub fn parse_workbook_table(bytes: Vec<u8>) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).context("Opening workbook")?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Reading sheet '{sheet_name}'"))?;
    let (_, first_col) = range.start().unwrap_or((0, 0));
    let grid = range
        .rows()
        .map(|row| {
            std::iter::repeat_n(Cell::Empty, first_col as usize)
                .chain(row.iter().map(workbook_cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    Ok(RawTable::from_grid(grid))
}

/// Reads an export file, returning its grid and the SHA-256 of its bytes.
/// Workbooks are detected by signature; everything else is delimited text.
pub fn read_raw_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<(RawTable, String)> {
    let bytes = read_input_bytes(path)?;
    let digest = sha256_hex(&bytes);
    if is_workbook(&bytes) {
        let table = parse_workbook_table(bytes)
            .with_context(|| format!("Parsing workbook {path:?}"))?;
        return Ok((table, digest));
    }
    let text = decode_bytes(&bytes, encoding)
        .with_context(|| format!("Decoding input file {path:?}"))?;
    let table = parse_raw_table(&text, delimiter)
        .with_context(|| format!("Parsing input file {path:?}"))?;
    Ok((table, digest))
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(base))
}
