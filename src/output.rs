// 💾 Output Writer - naming, staging and committing result files
// Results are staged to a partial file and renamed, never written over an input

use crate::error::RecordError;
use crate::loader::ContainerFormat;
use crate::table::Table;
use anyhow::{bail, Context, Result};
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Delimiter of every CSV this tool writes unless an action keeps the input's
pub const OUTPUT_DELIMITER: u8 = b';';

// ============================================================================
// DIRECTORIES AND NAMES
// ============================================================================

/// Existing directory named by user input
pub fn resolve_output_dir(text: &str) -> Result<PathBuf, RecordError> {
    let path = PathBuf::from(text.trim());
    if path.as_os_str().is_empty() || !path.is_dir() {
        return Err(RecordError::InvalidOutputDir { path });
    }
    Ok(path)
}

fn file_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<dir>/<prefix><file name>`
pub fn prefixed(dir: &Path, prefix: &str, source: &Path) -> PathBuf {
    dir.join(format!("{}{}", prefix, file_name(source)))
}

/// `<dir>/<prefix><stem>.csv`
pub fn prefixed_csv(dir: &Path, prefix: &str, source: &Path) -> PathBuf {
    dir.join(format!("{}{}.csv", prefix, file_stem(source)))
}

/// `<dir>/<stem><suffix>.<ext>`
pub fn suffixed(dir: &Path, source: &Path, suffix: &str, format: ContainerFormat) -> PathBuf {
    dir.join(format!("{}{}.{}", file_stem(source), suffix, format.extension()))
}

// ============================================================================
// CSV OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: csv::QuoteStyle,
}

impl CsvOptions {
    /// `;` with minimal quoting: only fields holding the delimiter, a quote or a line break are quoted
    pub fn new() -> Self {
        CsvOptions {
            delimiter: OUTPUT_DELIMITER,
            quote: csv::QuoteStyle::Necessary,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn quote_all(mut self) -> Self {
        self.quote = csv::QuoteStyle::Always;
        self
    }
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// WRITERS
// ============================================================================

/// Write a table; `.xlsx` goes to a workbook, anything else to CSV
pub fn write_table(table: &Table, path: &Path, options: CsvOptions) -> Result<()> {
    let partial = partial_path(path);
    let written = match ContainerFormat::from_path(path) {
        Ok(ContainerFormat::Spreadsheet) => write_xlsx(table, &partial),
        _ => write_csv(table, &partial, options),
    };

    if let Err(err) = written {
        let _ = fs::remove_file(&partial);
        return Err(err);
    }

    fs::rename(&partial, path).with_context(|| format!("Failed to move output into place: {}", path.display()))?;
    debug!(path = %path.display(), rows = table.len(), "output written");
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = format!(".{}.{}.partial", file_name(path), uuid::Uuid::new_v4());
    path.with_file_name(name)
}

fn write_csv(table: &Table, path: &Path, options: CsvOptions) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .quote_style(options.quote)
        .from_path(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;

    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(())
}

fn write_xlsx(table: &Table, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let ws = workbook.add_worksheet();

    for (c, name) in table.columns().iter().enumerate() {
        ws.write_string_with_format(0, c as u16, name, &header_format)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if let Some(value) = cell {
                ws.write_string(r as u32 + 1, c as u16, value)?;
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to write workbook: {}", path.display()))?;
    Ok(())
}

// ============================================================================
// OUTPUT PLAN
// ============================================================================

/// Outputs collected during an action and written together at the end
#[derive(Default)]
pub struct OutputPlan {
    entries: Vec<(PathBuf, Table, CsvOptions)>,
    protected: Vec<PathBuf>,
}

impl OutputPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an input file; committing a target with this path fails
    pub fn protect(&mut self, path: &Path) {
        self.protected.push(path.to_path_buf());
    }

    pub fn add(&mut self, path: PathBuf, table: Table) {
        self.entries.push((path, table, CsvOptions::new()));
    }

    pub fn add_with(&mut self, path: PathBuf, table: Table, options: CsvOptions) {
        self.entries.push((path, table, options));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every planned output; returns the paths in plan order
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        for (path, _, _) in &self.entries {
            if self.protected.iter().any(|p| same_file(p, path)) {
                bail!("Refusing to overwrite input file: {}", path.display());
            }
        }

        let mut written = Vec::with_capacity(self.entries.len());
        for (path, table, options) in self.entries {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
                }
            }
            write_table(&table, &path, options)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Loader;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn create_test_table() -> Table {
        Table::from_rows(
            vec!["CPF".into(), "Obs".into()],
            vec![
                vec![Some("00011122233".into()), Some("a;b".into())],
                vec![Some("12345678909".into()), None],
            ],
        )
    }

    #[test]
    fn test_output_names() {
        let dir = Path::new("/out");
        let source = Path::new("/in/base.xlsx");
        assert_eq!(prefixed(dir, "filtered_", source), PathBuf::from("/out/filtered_base.xlsx"));
        assert_eq!(prefixed_csv(dir, "cpf_corresp_", source), PathBuf::from("/out/cpf_corresp_base.csv"));
        assert_eq!(
            suffixed(dir, source, "_remov55", ContainerFormat::Spreadsheet),
            PathBuf::from("/out/base_remov55.xlsx")
        );
    }

    #[test]
    fn test_output_dir_must_exist() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_output_dir(dir.path().to_str().unwrap()).is_ok());
        let err = resolve_output_dir("/definitely/not/here").unwrap_err();
        assert_eq!(err.code(), "invalid_output_dir");
        assert!(resolve_output_dir("  ").is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let table = create_test_table();
        write_table(&table, &path, CsvOptions::new()).unwrap();

        let loaded = Loader::new().load(&path).unwrap();
        assert_eq!(loaded.delimiter, Some(b';'));
        assert_eq!(loaded.table, table);
    }

    #[test]
    fn test_xlsx_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.xlsx");
        let table = create_test_table();
        write_table(&table, &path, CsvOptions::new()).unwrap();

        let loaded = Loader::new().load(&path).unwrap();
        assert_eq!(loaded.table, table);
    }

    #[test]
    fn test_no_partial_files_left_behind() {
        let dir = TempDir::new().unwrap();
        write_table(&create_test_table(), &dir.path().join("x.csv"), CsvOptions::new()).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["x.csv"]);
    }

    #[test]
    fn test_plan_refuses_to_overwrite_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.csv");
        write_table(&create_test_table(), &input, CsvOptions::new()).unwrap();

        let mut plan = OutputPlan::new();
        plan.protect(&input);
        plan.add(input.clone(), Table::new(vec!["x".into()]));
        assert!(plan.commit().is_err());
        assert_eq!(Loader::new().load(&input).unwrap().table, create_test_table());
    }

    #[test]
    fn test_plan_creates_subfolders() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("sub").join("r.csv");
        let mut plan = OutputPlan::new();
        plan.add_with(target.clone(), create_test_table(), CsvOptions::new().quote_all());
        let written = plan.commit().unwrap();
        assert_eq!(written, vec![target.clone()]);
        assert!(target.exists());
    }

    #[test]
    fn test_delimiter_inside_value_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nomes.csv");
        let table = Table::from_rows(
            vec!["nome".into(), "cpf".into()],
            vec![vec![Some("Silva; Jr".into()), Some("12345678901".into())]],
        );
        write_table(&table, &path, CsvOptions::new()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "nome;cpf\n\"Silva; Jr\";12345678901\n");
        assert_eq!(Loader::new().load(&path).unwrap().table, table);
    }

    fn cells() -> impl Strategy<Value = Vec<(Option<String>, Option<String>)>> {
        let cell = "[a-zA-Z0-9 ;,\"'\\\\\r\n.-]{0,8}".prop_map(|s| if s.is_empty() { None } else { Some(s) });
        proptest::collection::vec((cell.clone(), cell), 1..8)
    }

    fn reloads_unchanged(rows: Vec<(Option<String>, Option<String>)>, options: CsvOptions) -> Result<(), TestCaseError> {
        let table = Table::from_rows(
            vec!["nome".into(), "obs".into()],
            rows.into_iter().map(|(a, b)| vec![a, b]).collect(),
        );
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        write_table(&table, &path, options).unwrap();

        let loader = Loader::new().with_delimiters(&[options.delimiter as char]);
        let loaded = loader.load(&path).unwrap();
        prop_assert_eq!(loaded.table, table);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_minimal_quoting_reloads_unchanged(rows in cells()) {
            reloads_unchanged(rows, CsvOptions::new())?;
        }

        #[test]
        fn prop_quote_all_reloads_unchanged(rows in cells()) {
            reloads_unchanged(rows, CsvOptions::new().quote_all())?;
        }

        #[test]
        fn prop_comma_delimiter_reloads_unchanged(rows in cells()) {
            reloads_unchanged(rows.clone(), CsvOptions::new().with_delimiter(b','))?;
            reloads_unchanged(rows, CsvOptions::new().with_delimiter(b',').quote_all())?;
        }
    }
}
