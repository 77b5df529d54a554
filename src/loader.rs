// 📂 Generic Loader - .csv and .xlsx files into string tables
// Delimited text: UTF-8 then Windows-1252, delimiter candidates tried in order

use crate::error::RecordError;
use crate::table::{Cell, Table};
use calamine::{open_workbook, Data, Reader, Xlsx};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// SOURCE DESCRIPTION
// ============================================================================

/// Container kind, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    DelimitedText,
    Spreadsheet,
}

impl ContainerFormat {
    pub fn from_path(path: &Path) -> Result<Self, RecordError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(ContainerFormat::DelimitedText),
            Some("xlsx") => Ok(ContainerFormat::Spreadsheet),
            _ => Err(RecordError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// File extension without the dot
    pub fn extension(&self) -> &str {
        match self {
            ContainerFormat::DelimitedText => "csv",
            ContainerFormat::Spreadsheet => "xlsx",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ContainerFormat::DelimitedText => "CSV",
            ContainerFormat::Spreadsheet => "Excel (.xlsx)",
        }
    }
}

/// Text encoding a delimited file was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    Utf8,
    Windows1252,
}

/// A loaded file and how it was read
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub format: ContainerFormat,

    /// Set for delimited text only
    pub encoding: Option<TextEncoding>,

    /// Set for delimited text only
    pub delimiter: Option<u8>,

    pub table: Table,
}

impl LoadedSource {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// ============================================================================
// LOADER
// ============================================================================

pub struct Loader {
    /// Delimiters tried in order (default: ';' then ',')
    pub delimiters: Vec<u8>,
}

impl Loader {
    pub fn new() -> Self {
        Loader {
            delimiters: vec![b';', b','],
        }
    }

    /// Use a different delimiter order; non-ASCII candidates are ignored
    pub fn with_delimiters(mut self, delimiters: &[char]) -> Self {
        let parsed: Vec<u8> = delimiters
            .iter()
            .filter(|c| c.is_ascii())
            .map(|&c| c as u8)
            .collect();
        if !parsed.is_empty() {
            self.delimiters = parsed;
        }
        self
    }

    /// Load a file into a table of strings.
    ///
    /// # Arguments
    /// * `path` - .csv or .xlsx file
    ///
    /// # Returns
    /// * `Ok(LoadedSource)` - at least one column and one row
    /// * `Err(RecordError)` - UnsupportedFormat, EmptyData or Load
    pub fn load(&self, path: &Path) -> Result<LoadedSource, RecordError> {
        let format = ContainerFormat::from_path(path)?;
        let source = match format {
            ContainerFormat::DelimitedText => self.load_delimited(path)?,
            ContainerFormat::Spreadsheet => LoadedSource {
                path: path.to_path_buf(),
                format,
                encoding: None,
                delimiter: None,
                table: read_spreadsheet(path)?,
            },
        };

        if source.table.width() == 0 || source.table.is_empty() {
            return Err(RecordError::EmptyData {
                path: path.to_path_buf(),
            });
        }

        debug!(
            path = %path.display(),
            rows = source.table.len(),
            columns = source.table.width(),
            "loaded source"
        );
        Ok(source)
    }

    /// Header names of a file (a header-only file is accepted here)
    pub fn read_header(&self, path: &Path) -> Result<Vec<String>, RecordError> {
        match ContainerFormat::from_path(path)? {
            ContainerFormat::DelimitedText => Ok(self.load_delimited(path)?.table.columns().to_vec()),
            ContainerFormat::Spreadsheet => Ok(read_spreadsheet(path)?.columns().to_vec()),
        }
    }

    /// Supported files directly inside `dir`, sorted by name
    pub fn list_sources(&self, dir: &Path, format: Option<ContainerFormat>) -> Result<Vec<PathBuf>, RecordError> {
        let entries = fs::read_dir(dir).map_err(|e| RecordError::Load {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| match (ContainerFormat::from_path(p), format) {
                (Ok(found), Some(wanted)) => found == wanted,
                (Ok(_), None) => true,
                (Err(_), _) => false,
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn load_delimited(&self, path: &Path) -> Result<LoadedSource, RecordError> {
        let bytes = fs::read(path).map_err(|e| RecordError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let (text, encoding) = decode_text(&bytes);

        let (delimiter, table) = self.detect_and_parse(&text).ok_or_else(|| RecordError::Load {
            path: path.to_path_buf(),
            reason: "no delimiter candidate produced a consistent table".to_string(),
        })?;

        Ok(LoadedSource {
            path: path.to_path_buf(),
            format: ContainerFormat::DelimitedText,
            encoding: Some(encoding),
            delimiter: Some(delimiter),
            table,
        })
    }

    /// First candidate giving more than one column wins; otherwise the first that parsed
    fn detect_and_parse(&self, text: &str) -> Option<(u8, Table)> {
        let mut single_column: Option<(u8, Table)> = None;
        for &delimiter in &self.delimiters {
            match parse_delimited(text, delimiter) {
                Ok(table) if table.width() > 1 => return Some((delimiter, table)),
                Ok(table) => {
                    if single_column.is_none() {
                        single_column = Some((delimiter, table));
                    }
                }
                Err(err) => {
                    debug!(delimiter = %(delimiter as char), error = %err, "delimiter rejected");
                }
            }
        }
        single_column
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// DECODING AND PARSING
// ============================================================================

/// Decode bytes as UTF-8 (BOM stripped), falling back to Windows-1252
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(_) => {
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(body);
            (text.into_owned(), TextEncoding::Windows1252)
        }
    }
}

/// Strict parse: every record must have the header's field count
fn parse_delimited(text: &str, delimiter: u8) -> Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut table = Table::new(header);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(to_cell).collect());
    }
    Ok(table)
}

fn to_cell(raw: &str) -> Cell {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// First worksheet, first row as header
fn read_spreadsheet(path: &Path) -> Result<Table, RecordError> {
    let load_err = |reason: String| RecordError::Load {
        path: path.to_path_buf(),
        reason,
    };

    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e: calamine::XlsxError| load_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RecordError::EmptyData {
            path: path.to_path_buf(),
        })?
        .map_err(|e| load_err(e.to_string()))?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(first) => first.iter().map(|c| render_cell(c).unwrap_or_default()).collect(),
        None => Vec::new(),
    };

    let mut table = Table::new(header);
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(render_cell).collect();
        if cells.iter().all(|c| c.is_none()) {
            continue;
        }
        table.push_row(cells);
    }
    Ok(table)
}

/// Spreadsheet cell as text; integral floats lose the trailing ".0"
fn render_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => None,
        Data::String(s) => to_cell(s),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", *f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => Some(value.format("%Y-%m-%d").to_string()),
            Some(value) => Some(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Some(dt.as_f64().to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => to_cell(s),
        Data::Error(e) => Some(format!("{:?}", e)),
    }
}
