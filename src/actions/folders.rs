// 🗂️ Folder actions - many files in, aligned or deduplicated tables out
// Files that fail to load are reported and skipped; the rest still run

use super::{ActionContext, ActionReport};
use crate::error::RecordError;
use crate::loader::{ContainerFormat, LoadedSource};
use crate::output::OutputPlan;
use crate::prompt::ask_existing_dir;
use crate::table::{common_columns, Table};
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Priority given to a file whose answer is not a whole number
pub const LOWEST_PRIORITY: i64 = 999_999;

// ============================================================================
// FOLDER LOADING
// ============================================================================

/// Load every supported file of `dir`; unreadable files are skipped with a warning
fn load_folder(ctx: &ActionContext, dir: &Path, format: Option<ContainerFormat>) -> Result<Vec<LoadedSource>> {
    let paths = ctx.loader.list_sources(dir, format)?;
    if paths.is_empty() {
        bail!("No supported files in {}", dir.display());
    }
    println!("📂 Found {} files in {}", paths.len(), dir.display());

    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        match ctx.loader.load(&path) {
            Ok(source) => {
                println!("   ✓ {} ({} rows)", source.file_name(), source.table.len());
                loaded.push(source);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file");
                println!("   ⚠️  Skipping {}: {}", path.display(), err);
            }
        }
    }
    if loaded.is_empty() {
        bail!("No file in {} could be loaded", dir.display());
    }
    Ok(loaded)
}

fn ask_container(ctx: &mut ActionContext, message: &str) -> Result<ContainerFormat> {
    let options = vec!["CSV (.csv)".to_string(), "Excel (.xlsx)".to_string()];
    let choice = ctx.prompt.select_one(message, &options)?;
    Ok(if choice == options[0] {
        ContainerFormat::DelimitedText
    } else {
        ContainerFormat::Spreadsheet
    })
}

fn protect_all(plan: &mut OutputPlan, sources: &[LoadedSource]) {
    for source in sources {
        plan.protect(&source.path);
    }
}

/// Header names of every table, first-seen order
pub fn union_columns(tables: &[&Table]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for table in tables {
        for name in table.columns() {
            if seen.insert(name.clone()) {
                columns.push(name.clone());
            }
        }
    }
    columns
}

/// Stack tables under the union of their headers
pub fn concat_tables(tables: &[&Table]) -> Table {
    let mut unified = Table::new(union_columns(tables));
    for table in tables {
        unified.append_reindexed(table);
    }
    unified
}

// ============================================================================
// COMMON COLUMNS
// ============================================================================

pub fn reduce_to_common_columns(ctx: &mut ActionContext) -> Result<ActionReport> {
    let dir = ask_existing_dir(ctx.prompt, "Folder with .xlsx/.csv files:")?;
    let sources = load_folder(ctx, &dir, None)?;

    let mut common = common_columns(sources.iter().map(|s| s.table.columns()));
    if common.is_empty() {
        bail!("The files share no column");
    }
    common.sort();
    let selected = ctx.prompt.select_many("Columns to keep:", &common)?;
    if selected.is_empty() {
        bail!("No column selected");
    }

    let out_dir = dir.join("only_selected_cols");
    let mut plan = OutputPlan::new();
    protect_all(&mut plan, &sources);
    for source in &sources {
        let path = out_dir.join(format!("{}_reduced.csv", source.stem()));
        plan.add(path, source.table.reindexed(&selected));
    }

    ActionReport::new("Select common columns and reduce")
        .count("Files", sources.len())
        .count("Common columns", common.len())
        .count("Kept columns", selected.len())
        .commit(plan)
}

// ============================================================================
// CROSS-FILE DEDUP BY PRIORITY
// ============================================================================

/// Priority typed by the user; anything but a whole number sorts last
pub fn parse_priority(text: &str) -> i64 {
    text.trim().parse().unwrap_or(LOWEST_PRIORITY)
}

/// Dedup each table on `key`, then keep a key only in the highest-priority
/// table that has it (lowest number first, ties in input order).
///
/// Returns tables in input order. Blank keys are never marked as seen.
pub fn dedup_by_priority(tables: &[Table], priorities: &[i64], key: &str) -> Result<Vec<Table>, RecordError> {
    let mut order: Vec<usize> = (0..tables.len()).collect();
    order.sort_by_key(|&i| priorities.get(i).copied().unwrap_or(LOWEST_PRIORITY));

    let mut seen: HashSet<String> = HashSet::new();
    let mut results: Vec<Option<Table>> = vec![None; tables.len()];
    for i in order {
        let table = &tables[i];
        let column = table.column(key)?;
        let own = table.dedup_by_key(|row| table.value_or_empty(row, &column).trim().to_string());
        let kept = own.filter_rows(|row| !seen.contains(own.value_or_empty(row, &column).trim()));
        for value in kept.column_values(&column).flatten() {
            let value = value.trim();
            if !value.is_empty() {
                seen.insert(value.to_string());
            }
        }
        results[i] = Some(kept);
    }
    Ok(results.into_iter().map(Option::unwrap_or_default).collect())
}

pub fn dedup_cpfs_across_files(ctx: &mut ActionContext) -> Result<ActionReport> {
    let dir = ask_existing_dir(ctx.prompt, "Folder with the files:")?;
    let format = ask_container(ctx, "File type to deduplicate:")?;
    let sources = load_folder(ctx, &dir, Some(format))?;

    let mut common = common_columns(sources.iter().map(|s| s.table.columns()));
    if common.is_empty() {
        bail!("The files share no column");
    }
    common.sort();
    let cpf = ctx.prompt.select_one("CPF column (among the common columns):", &common)?;

    println!("   Priority: 1 = most recent, larger = older");
    let mut priorities = Vec::with_capacity(sources.len());
    for source in &sources {
        let answer = ctx.prompt.ask_text(&format!("Priority of '{}':", source.file_name()))?;
        priorities.push(parse_priority(&answer));
    }

    let tables: Vec<Table> = sources.iter().map(|s| s.table.clone()).collect();
    let deduped = dedup_by_priority(&tables, &priorities, &cpf)?;
    let before: usize = tables.iter().map(Table::len).sum();
    let after: usize = deduped.iter().map(Table::len).sum();

    let out_dir = dir.join("dedup_priority");
    let mut plan = OutputPlan::new();
    protect_all(&mut plan, &sources);
    for (source, table) in sources.iter().zip(deduped) {
        plan.add(out_dir.join(format!("{}_dedup.csv", source.stem())), table);
    }

    ActionReport::new("Deduplicate CPFs across files")
        .count("Files", sources.len())
        .count("Rows before", before)
        .count("Rows after", after)
        .commit(plan)
}

// ============================================================================
// CHUNKED UNIFICATION
// ============================================================================

/// Consecutive slices of at most `size` rows
pub fn split_chunks(table: &Table, size: usize) -> Vec<Table> {
    let size = size.max(1);
    (0..table.len())
        .step_by(size)
        .map(|start| {
            let end = (start + size).min(table.len());
            table.subset(&(start..end).collect::<Vec<_>>())
        })
        .collect()
}

pub fn unify_csv_in_chunks(ctx: &mut ActionContext) -> Result<ActionReport> {
    let dir = ask_existing_dir(ctx.prompt, "Folder containing only CSV files:")?;
    let sources = load_folder(ctx, &dir, Some(ContainerFormat::DelimitedText))?;

    let mut common = common_columns(sources.iter().map(|s| s.table.columns()));
    if common.is_empty() {
        bail!("The CSV files share no column");
    }
    common.sort();

    let mut unified = Table::new(common.clone());
    for source in &sources {
        unified.append_reindexed(&source.table);
    }
    let chunks = split_chunks(&unified, ctx.config.chunk_rows);
    let chunk_count = chunks.len();

    let out_dir = dir.join("unified_csv_1m");
    let mut plan = OutputPlan::new();
    protect_all(&mut plan, &sources);
    for (n, chunk) in chunks.into_iter().enumerate() {
        let path = out_dir.join(format!("unified_chunk_{}.csv", n + 1));
        plan.add(path, chunk);
    }

    ActionReport::new("Unify CSVs in blocks")
        .count("Files", sources.len())
        .count("Common columns", common.len())
        .count("Rows", unified.len())
        .count("Chunks", chunk_count)
        .commit(plan)
}

// ============================================================================
// FOLDER UNIFICATION
// ============================================================================

/// Column every file must carry to take part in the CPF unification
pub const CPF_COLUMN: &str = "CPF";

pub fn unify_folder_by_cpf(ctx: &mut ActionContext) -> Result<ActionReport> {
    println!("   Files must share column names; column '{}' is required", CPF_COLUMN);
    let dir = ask_existing_dir(ctx.prompt, "Folder with the files:")?;
    let out_dir = ctx.output_dir()?;
    let sources = load_folder(ctx, &dir, None)?;

    let with_cpf: Vec<&LoadedSource> = sources
        .iter()
        .filter(|s| {
            let has = s.table.has_column(CPF_COLUMN);
            if !has {
                println!("   ⚠️  {} has no '{}' column, ignored", s.file_name(), CPF_COLUMN);
            }
            has
        })
        .collect();
    if with_cpf.is_empty() {
        bail!("No file has a '{}' column", CPF_COLUMN);
    }

    let tables: Vec<&Table> = with_cpf.iter().map(|s| &s.table).collect();
    let unified = concat_tables(&tables);
    let cpf = unified.column(CPF_COLUMN)?;
    let deduped = unified.dedup_by_key(|row| unified.value_or_empty(row, &cpf).to_string());

    let report = ActionReport::new("Unify folder files without repeating CPF")
        .count("Files", with_cpf.len())
        .count("Rows", unified.len())
        .count("Unique CPFs", deduped.len());

    let mut plan = OutputPlan::new();
    protect_all(&mut plan, &sources);
    plan.add(out_dir.join("unified_excel.xlsx"), deduped);
    report.commit(plan)
}

pub fn concatenate_folder(ctx: &mut ActionContext) -> Result<ActionReport> {
    let dir = ask_existing_dir(ctx.prompt, "Folder with the .xlsx files:")?;
    let sources = load_folder(ctx, &dir, Some(ContainerFormat::Spreadsheet))?;
    let out_dir = ctx.output_dir()?;

    let tables: Vec<&Table> = sources.iter().map(|s| &s.table).collect();
    let unified = concat_tables(&tables);
    let rows = unified.len();

    let mut plan = OutputPlan::new();
    protect_all(&mut plan, &sources);
    plan.add(out_dir.join("unifique_one_result.xlsx"), unified);

    ActionReport::new("Concatenate every spreadsheet in a folder")
        .count("Files", sources.len())
        .count("Rows", rows)
        .commit(plan)
}

// ============================================================================
// MERGE FOLDER INTO ONE CSV
// ============================================================================

/// Columns whose value in the second data row (first when there is only one) is a number
pub fn detect_monetary_columns(table: &Table) -> Vec<String> {
    let row = if table.len() < 2 { 0 } else { 1 };
    table
        .columns()
        .iter()
        .filter(|name| {
            table
                .column(name)
                .ok()
                .and_then(|c| table.get(row, &c).map(|v| v.trim().parse::<f64>().is_ok()))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// `.` becomes `,` and the value is wrapped in double quotes; blank becomes `""`
pub fn to_monetary(value: Option<&str>) -> String {
    format!("\"{}\"", value.unwrap_or("").replace('.', ","))
}

fn apply_monetary(table: &mut Table, columns: &[String]) {
    for name in columns {
        if let Ok(column) = table.column(name) {
            table.map_column(&column, |v| Some(to_monetary(v)));
        }
    }
}

/// Monetary columns come from the first table; every table is aligned to it
pub fn merge_with_money(tables: &[Table]) -> Option<(Table, Vec<String>)> {
    let first = tables.first()?;
    let monetary = detect_monetary_columns(first);
    let mut merged = Table::new(first.columns().to_vec());
    for table in tables {
        let mut converted = table.clone();
        apply_monetary(&mut converted, &monetary);
        merged.append_reindexed(&converted);
    }
    Some((merged, monetary))
}

pub fn merge_folder_to_csv(ctx: &mut ActionContext) -> Result<ActionReport> {
    let format = ask_container(ctx, "File type to merge:")?;
    let dir = ask_existing_dir(ctx.prompt, "Folder with the files:")?;
    let out_dir = ctx.output_dir()?;
    let sources = load_folder(ctx, &dir, Some(format))?;

    let tables: Vec<Table> = sources.iter().map(|s| s.table.clone()).collect();
    let Some((merged, monetary)) = merge_with_money(&tables) else {
        bail!("Nothing to merge in {}", dir.display());
    };
    if !monetary.is_empty() {
        println!("   Monetary columns: {}", monetary.join(", "));
    }
    let rows = merged.len();

    let target = out_dir.join("merged_files.csv");
    let mut plan = OutputPlan::new();
    protect_all(&mut plan, &sources);
    plan.add(target, merged);

    ActionReport::new("Merge folder files into one CSV")
        .count("Files", sources.len())
        .count("Monetary columns", monetary.len())
        .count("Rows", rows)
        .commit(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{column, create_test_table, dir_text, read, write_csv};
    use crate::config::AppConfig;
    use crate::prompt::{Answer, ScriptedPrompt};
    use tempfile::TempDir;

    fn run_with(config: &AppConfig, answers: Vec<Answer>, action: fn(&mut ActionContext) -> Result<ActionReport>) -> ActionReport {
        let mut prompt = ScriptedPrompt::new(answers);
        let mut ctx = ActionContext::new(&mut prompt, config);
        action(&mut ctx).unwrap()
    }

    #[test]
    fn test_dedup_by_priority_prefers_lower_number() {
        let old = create_test_table(&["cpf", "src"], &[&["1", "old"], &["2", "old"], &["2", "old-dup"]]);
        let new = create_test_table(&["cpf", "src"], &[&["2", "new"], &["3", "new"]]);
        let out = dedup_by_priority(&[old, new], &[2, 1], "cpf").unwrap();

        assert_eq!(column(&out[1], "cpf"), vec!["2", "3"]);
        assert_eq!(column(&out[0], "cpf"), vec!["1"]);
    }

    #[test]
    fn test_dedup_by_priority_blank_keys_not_seen() {
        let a = Table::from_rows(vec!["cpf".into()], vec![vec![None], vec![None], vec![Some("1".into())]]);
        let b = Table::from_rows(vec!["cpf".into()], vec![vec![None]]);
        let out = dedup_by_priority(&[a, b], &[1, 2], "cpf").unwrap();
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[1].len(), 1);
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority(" 3 "), 3);
        assert_eq!(parse_priority("first"), LOWEST_PRIORITY);
    }

    #[test]
    fn test_split_chunks() {
        let table = create_test_table(&["a"], &[&["1"], &["2"], &["3"], &["4"], &["5"]]);
        let chunks = split_chunks(&table, 2);
        let sizes: Vec<usize> = chunks.iter().map(Table::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(split_chunks(&Table::new(vec!["a".into()]), 2).is_empty());
    }

    #[test]
    fn test_monetary_detection_and_merge() {
        let first = create_test_table(&["nome", "valor"], &[&["Ana", "x"], &["Bia", "10.5"]]);
        let second = create_test_table(&["valor", "extra"], &[&["3.25", "z"]]);
        let (merged, monetary) = merge_with_money(&[first, second]).unwrap();

        assert_eq!(monetary, vec!["valor"]);
        assert_eq!(merged.columns(), &["nome", "valor"]);
        assert_eq!(column(&merged, "valor"), vec!["\"x\"", "\"10,5\"", "\"3,25\""]);
        assert_eq!(column(&merged, "nome"), vec!["Ana", "Bia", ""]);
        assert_eq!(to_monetary(None), "\"\"");
    }

    #[test]
    fn test_concat_tables_unions_columns() {
        let a = create_test_table(&["CPF", "a"], &[&["1", "x"]]);
        let b = create_test_table(&["b", "CPF"], &[&["y", "2"]]);
        let out = concat_tables(&[&a, &b]);
        assert_eq!(out.columns(), &["CPF", "a", "b"]);
        assert_eq!(column(&out, "CPF"), vec!["1", "2"]);
    }

    #[test]
    fn test_reduce_to_common_columns_end_to_end() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "a.csv", &["cpf;nome;x", "1;Ana;q"]);
        write_csv(dir.path(), "b.csv", &["nome;cpf", "Bia;2"]);
        let config = AppConfig::default();
        let report = run_with(
            &config,
            vec![Answer::text(dir_text(dir.path())), Answer::choose_many(&["cpf"])],
            reduce_to_common_columns,
        );
        assert_eq!(report.get("Common columns"), Some(2));
        let out = read(&dir.path().join("only_selected_cols").join("b_reduced.csv"));
        assert_eq!(out.columns(), &["cpf"]);
        assert_eq!(column(&out, "cpf"), vec!["2"]);
    }

    #[test]
    fn test_dedup_across_files_end_to_end() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "jan.csv", &["cpf;v", "1;a", "2;b"]);
        write_csv(dir.path(), "feb.csv", &["cpf;v", "2;c", "2;d"]);
        let config = AppConfig::default();
        run_with(
            &config,
            vec![
                Answer::text(dir_text(dir.path())),
                Answer::choose("CSV (.csv)"),
                Answer::choose("cpf"),
                Answer::text("1"),
                Answer::text("2"),
            ],
            dedup_cpfs_across_files,
        );
        let out_dir = dir.path().join("dedup_priority");
        assert_eq!(column(&read(&out_dir.join("feb_dedup.csv")), "v"), vec!["c"]);
        assert_eq!(column(&read(&out_dir.join("jan_dedup.csv")), "v"), vec!["a"]);
    }

    #[test]
    fn test_unify_in_chunks_uses_configured_size() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "a.csv", &["z;b;only_a", "1;2;x", "3;4;x"]);
        write_csv(dir.path(), "b.csv", &["b;z", "6;5"]);
        let config = AppConfig {
            chunk_rows: 2,
            ..AppConfig::default()
        };
        let report = run_with(&config, vec![Answer::text(dir_text(dir.path()))], unify_csv_in_chunks);
        assert_eq!(report.get("Chunks"), Some(2));

        let out_dir = dir.path().join("unified_csv_1m");
        let first = read(&out_dir.join("unified_chunk_1.csv"));
        assert_eq!(first.columns(), &["b", "z"]);
        assert_eq!(column(&read(&out_dir.join("unified_chunk_2.csv")), "z"), vec!["5"]);
    }

    #[test]
    fn test_unify_folder_by_cpf_skips_files_without_cpf() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_csv(dir.path(), "a.csv", &["CPF;nome", "1;Ana", "2;Bia"]);
        write_csv(dir.path(), "b.csv", &["CPF;nome", "2;Bia again"]);
        write_csv(dir.path(), "c.csv", &["doc;nome", "3;Caio"]);
        let config = AppConfig::default();
        let report = run_with(
            &config,
            vec![Answer::text(dir_text(dir.path())), Answer::text(dir_text(out.path()))],
            unify_folder_by_cpf,
        );
        assert_eq!(report.get("Files"), Some(2));
        let unified = read(&out.path().join("unified_excel.xlsx"));
        assert_eq!(column(&unified, "nome"), vec!["Ana", "Bia"]);
    }

    #[test]
    fn test_merge_folder_keeps_quoted_money() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_csv(dir.path(), "a.csv", &["id;valor", "x;1.5", "y;2.75"]);
        let config = AppConfig::default();
        run_with(
            &config,
            vec![
                Answer::choose("CSV (.csv)"),
                Answer::text(dir_text(dir.path())),
                Answer::text(dir_text(out.path())),
            ],
            merge_folder_to_csv,
        );
        let merged = read(&out.path().join("merged_files.csv"));
        assert_eq!(column(&merged, "valor"), vec!["\"1,5\"", "\"2,75\""]);
        assert_eq!(column(&merged, "id"), vec!["x", "y"]);
    }

    #[test]
    fn test_merge_folder_keeps_delimiter_inside_values() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_csv(dir.path(), "a.csv", &["nome;cpf", "\"Silva; Jr\";12345678901", "Ana;2"]);
        let config = AppConfig::default();
        run_with(
            &config,
            vec![
                Answer::choose("CSV (.csv)"),
                Answer::text(dir_text(dir.path())),
                Answer::text(dir_text(out.path())),
            ],
            merge_folder_to_csv,
        );
        let merged = read(&out.path().join("merged_files.csv"));
        assert_eq!(merged.columns(), &["nome", "cpf"]);
        assert_eq!(column(&merged, "nome"), vec!["Silva; Jr", "Ana"]);
    }

    #[test]
    fn test_unify_in_chunks_keeps_delimiter_inside_values() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "a.csv", &["nome;cpf", "\"Silva; Jr\";12345678901"]);
        write_csv(dir.path(), "b.csv", &["cpf;nome", "2;Ana"]);
        let config = AppConfig::default();
        run_with(&config, vec![Answer::text(dir_text(dir.path()))], unify_csv_in_chunks);

        let unified = read(&dir.path().join("unified_csv_1m").join("unified_chunk_1.csv"));
        assert_eq!(unified.columns(), &["cpf", "nome"]);
        assert_eq!(column(&unified, "nome"), vec!["Silva; Jr", "Ana"]);
        assert_eq!(column(&unified, "cpf"), vec!["12345678901", "2"]);
    }
}
