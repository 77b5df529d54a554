// 🔀 Merges - combine two or more files by CPF, columns or mapping
// Keys are normalized before matching; blank keys never match anything

use super::folders::concat_tables;
use super::{ActionContext, ActionReport};
use crate::loader::ContainerFormat;
use crate::matcher::{CrossFileMatcher, ReferenceIndex};
use crate::normalize::{is_all_digits, normalize_identifier, KeyNormalization};
use crate::output::{prefixed, prefixed_csv, suffixed, OutputPlan};
use crate::prompt::{ask_existing_file, clean_path, select_column, select_columns_loop};
use crate::table::{Cell, ColumnRef, Table};
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};

/// Header of the combined DDD + number column
pub const AREA_CODE_AND_NUMBER: &str = "DDD+Número";

/// Option meaning "leave this model column empty"
pub const IGNORE_COLUMN: &str = "Ignore";

// ============================================================================
// JOIN BY CPF
// ============================================================================

/// Inner join on normalized CPF: every matching (left, right) pair, left order first.
///
/// Both key columns come out normalized. Repeated header names get `.1`, `.2`.
pub fn inner_join(left: &Table, left_key: &ColumnRef, right: &Table, right_key: &ColumnRef) -> Table {
    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..right.len() {
        let key = normalize_identifier(right.get(row, right_key));
        if !key.is_empty() {
            by_key.entry(key).or_default().push(row);
        }
    }

    let mut columns = left.columns().to_vec();
    columns.extend(right.columns().iter().cloned());
    let mut joined = Table::new(columns);

    for row in 0..left.len() {
        let key = normalize_identifier(left.get(row, left_key));
        let Some(matches) = by_key.get(&key) else {
            continue;
        };
        for &other in matches {
            let mut cells: Vec<Cell> = left.rows()[row].clone();
            cells[left_key.index()] = Some(key.clone());
            let mut right_cells = right.rows()[other].clone();
            right_cells[right_key.index()] = Some(key.clone());
            cells.extend(right_cells);
            joined.push_row(cells);
        }
    }
    joined
}

pub fn join_by_cpf(ctx: &mut ActionContext) -> Result<ActionReport> {
    let base = ctx.load_file("Base file (.xlsx or .csv):")?;
    let base_cpf = select_column(ctx.prompt, &base.table, "CPF column of the base file:")?;
    let second = ctx.load_file("Second file (.xlsx or .csv):")?;
    let second_cpf = select_column(ctx.prompt, &second.table, "CPF column of the second file:")?;
    let dir = ctx.output_dir()?;

    let joined = inner_join(&base.table, &base_cpf, &second.table, &second_cpf);
    let rows = joined.len();

    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    plan.protect(&second.path);
    plan.add(dir.join("unified_by_cpf.xlsx"), joined);

    ActionReport::new("Join two files by CPF")
        .count("Base rows", base.table.len())
        .count("Second file rows", second.table.len())
        .count("Joined rows", rows)
        .commit(plan)
}

// ============================================================================
// DDD + NUMBER
// ============================================================================

pub fn area_code_and_number_valid(ddd: Option<&str>, number: Option<&str>) -> bool {
    let exact = |v: Option<&str>, len: usize| v.map_or(false, |v| v.len() == len && is_all_digits(v));
    exact(ddd, 2) && exact(number, 9)
}

/// (valid rows with the combined column, invalid rows untouched)
pub fn merge_area_codes(table: &Table, ddd: &ColumnRef, number: &ColumnRef) -> (Table, Table) {
    let (mut valid, invalid) =
        table.partition_by(|i| area_code_and_number_valid(table.get(i, ddd), table.get(i, number)));
    let combined = valid.add_column(AREA_CODE_AND_NUMBER);
    for row in 0..valid.len() {
        let value = format!(
            "{}{}",
            valid.value_or_empty(row, ddd).trim(),
            valid.value_or_empty(row, number).trim()
        );
        valid.set(row, &combined, Some(value));
    }
    (valid, invalid)
}

pub fn merge_area_code_and_number(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with DDD and number columns (.xlsx or .csv):")?;
    let ddd = select_column(ctx.prompt, &source.table, "DDD column:")?;
    let number = select_column(ctx.prompt, &source.table, "Number column:")?;
    let dir = ctx.output_dir()?;

    let (valid, invalid) = merge_area_codes(&source.table, &ddd, &number);
    let (valid_rows, invalid_rows) = (valid.len(), invalid.len());

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "merged_ddd_number_validos_", &source.path), valid);
    plan.add(prefixed(&dir, "merged_ddd_number_invalidos_", &source.path), invalid);

    ActionReport::new("Merge DDD and number columns")
        .count("Rows", source.table.len())
        .count("Valid rows", valid_rows)
        .count("Invalid rows", invalid_rows)
        .commit(plan)
}

// ============================================================================
// ENRICH BY CPF FROM SEARCH FILES
// ============================================================================

/// CPFs still looking for data, and the rows found for the others
pub struct CpfEnricher {
    pending: Vec<String>,
    matched: Table,
}

impl CpfEnricher {
    /// Distinct normalized CPFs of the base, first-seen order; blanks are skipped
    pub fn new(base: &Table, cpf: &ColumnRef) -> Self {
        let mut seen = HashSet::new();
        let pending = base
            .column_values(cpf)
            .map(normalize_identifier)
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .collect();
        CpfEnricher {
            pending,
            matched: Table::new(vec!["CPF".to_string()]),
        }
    }

    /// Each pending CPF present in `search` takes its first row there.
    /// Returns how many CPFs were matched by this file.
    pub fn absorb(&mut self, search: &Table, cpf: &ColumnRef) -> usize {
        let mut first_row: HashMap<String, usize> = HashMap::new();
        for row in 0..search.len() {
            let key = normalize_identifier(search.get(row, cpf));
            if !key.is_empty() {
                first_row.entry(key).or_insert(row);
            }
        }

        let others: Vec<usize> = (0..search.width()).filter(|&c| c != cpf.index()).collect();
        let mut columns = vec!["CPF".to_string()];
        columns.extend(others.iter().map(|&c| search.columns()[c].clone()));
        let mut found = Table::new(columns);

        let mut still_pending = Vec::with_capacity(self.pending.len());
        for key in std::mem::take(&mut self.pending) {
            match first_row.get(&key) {
                Some(&row) => {
                    let mut cells = vec![Some(key)];
                    cells.extend(others.iter().map(|&c| search.rows()[row][c].clone()));
                    found.push_row(cells);
                }
                None => still_pending.push(key),
            }
        }
        self.pending = still_pending;

        let count = found.len();
        if count > 0 {
            self.matched = concat_tables(&[&self.matched, &found]);
        }
        count
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn matched(&self) -> &Table {
        &self.matched
    }

    /// Remaining CPFs as a one-column table
    pub fn unmatched(&self) -> Table {
        Table::from_rows(
            vec!["CPF".to_string()],
            self.pending.iter().map(|c| vec![Some(c.clone())]).collect(),
        )
    }
}

pub fn enrich_by_cpf(ctx: &mut ActionContext) -> Result<ActionReport> {
    let base = ctx.load_file("Base file with CPFs (.xlsx or .csv):")?;
    let cpf = select_column(ctx.prompt, &base.table, "CPF column of the base file:")?;
    let mut enricher = CpfEnricher::new(&base.table, &cpf);
    let total = enricher.pending.len();

    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    let mut search_files = 0;

    while !enricher.is_done() && ctx.prompt.confirm("Add a search file?", true)? {
        let text = ctx.prompt.ask_text("Search file (.xlsx or .csv):")?;
        let search = match ctx.loader.load(&clean_path(&text)) {
            Ok(search) => search,
            Err(err) => {
                println!("❌ {}", err);
                continue;
            }
        };
        let search_cpf = select_column(ctx.prompt, &search.table, "CPF column of the search file:")?;
        let found = enricher.absorb(&search.table, &search_cpf);
        println!("   {}: {} CPFs found", search.file_name(), found);
        plan.protect(&search.path);
        search_files += 1;
    }
    if enricher.is_done() {
        println!("   Every CPF was found");
    }
    let dir = ctx.output_dir()?;

    let matched_rows = enricher.matched().len();
    let unmatched = enricher.unmatched();
    let unmatched_rows = unmatched.len();
    plan.add(prefixed_csv(&dir, "cpf_corresp_", &base.path), enricher.matched().clone());
    plan.add(prefixed_csv(&dir, "semnada_", &base.path), unmatched);

    ActionReport::new("Add data to CPFs from search files")
        .count("Distinct CPFs in base", total)
        .count("Search files", search_files)
        .count("Matched", matched_rows)
        .count("Without match", unmatched_rows)
        .commit(plan)
}

// ============================================================================
// MAP COLUMNS ONTO A MODEL
// ============================================================================

/// Model header with mapped columns copied from `data`; unmapped ones stay empty.
/// With no mapping at all the result has no rows.
pub fn map_onto_model(model_columns: &[String], data: &Table, mapping: &[(usize, ColumnRef)]) -> Table {
    let mut out = Table::new(model_columns.to_vec());
    if mapping.is_empty() {
        return out;
    }
    for row in 0..data.len() {
        let mut cells: Vec<Cell> = vec![None; model_columns.len()];
        for (target, source) in mapping {
            cells[*target] = data.get(row, source).map(str::to_string);
        }
        out.push_row(cells);
    }
    out
}

pub fn map_columns(ctx: &mut ActionContext) -> Result<ActionReport> {
    let model_path = ask_existing_file(ctx.prompt, "Model file (.xlsx or .csv):")?;
    let model_columns = ctx.loader.read_header(&model_path)?;
    if model_columns.is_empty() {
        bail!("The model file has no header");
    }
    let data = ctx.load_file("Data file (.xlsx or .csv):")?;

    let mut used: HashSet<String> = HashSet::new();
    let mut mapping = Vec::new();
    for (target, model_column) in model_columns.iter().enumerate() {
        let mut options: Vec<String> = data
            .table
            .columns()
            .iter()
            .filter(|c| !used.contains(*c))
            .cloned()
            .collect();
        options.push(IGNORE_COLUMN.to_string());
        let choice = ctx
            .prompt
            .select_one(&format!("Data column for '{}':", model_column), &options)?;
        if choice != IGNORE_COLUMN {
            mapping.push((target, data.table.column(&choice)?));
            used.insert(choice);
        }
    }
    let dir = ctx.output_dir()?;

    let result = map_onto_model(&model_columns, &data.table, &mapping);
    let rows = result.len();

    let mut plan = OutputPlan::new();
    plan.protect(&model_path);
    plan.protect(&data.path);
    plan.add(prefixed(&dir, "resultado_", &model_path), result);

    ActionReport::new("Map columns onto a model file")
        .count("Model columns", model_columns.len())
        .count("Mapped columns", mapping.len())
        .count("Rows", rows)
        .commit(plan)
}

// ============================================================================
// PHONE × CPF CHECK
// ============================================================================

pub fn check_phones_by_cpf(ctx: &mut ActionContext) -> Result<ActionReport> {
    let base = ctx.load_file("Base file (.xlsx or .csv):")?;
    let cpf = select_column(ctx.prompt, &base.table, "CPF column of the base file:")?;
    let phones = select_columns_loop(ctx.prompt, &base.table, "Phone column:", "Select another phone column?")?;
    if phones.contains(&cpf) {
        bail!("The CPF column cannot also be a phone column");
    }

    let reference = ctx.load_file("Reference file with CPF + phone (CPF may repeat):")?;
    let ref_cpf = select_column(ctx.prompt, &reference.table, "CPF column of the reference file:")?;
    let ref_phone = select_column(ctx.prompt, &reference.table, "Phone column of the reference file:")?;
    if ref_phone == ref_cpf {
        bail!("The phone column must differ from the CPF column");
    }
    let dir = ctx.output_dir()?;

    let index = ReferenceIndex::build(
        &reference.table,
        &ref_cpf,
        &ref_phone,
        KeyNormalization::Trimmed,
        KeyNormalization::Trimmed,
    );
    println!("   CPFs in reference: {}", index.len());
    let partition = CrossFileMatcher::new(&index).partition(&base.table, &cpf, &phones);
    println!("   {}", partition.summary());

    let csv = ContainerFormat::DelimitedText;
    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    plan.protect(&reference.path);
    plan.add(suffixed(&dir, &base.path, "_found_matched", csv), base.table.subset(&partition.matched));
    plan.add(suffixed(&dir, &base.path, "_found_mismatch", csv), base.table.subset(&partition.mismatched));
    plan.add(suffixed(&dir, &base.path, "_not_found", csv), base.table.subset(&partition.not_found));

    ActionReport::new("Check phone × CPF")
        .count("Rows", base.table.len())
        .count("Found and matched", partition.matched.len())
        .count("Found with other phone", partition.mismatched.len())
        .count("Not found", partition.not_found.len())
        .commit(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{column, create_test_table, dir_text, read, write_csv};
    use crate::config::AppConfig;
    use crate::prompt::{Answer, ScriptedPrompt};
    use tempfile::TempDir;

    fn run(answers: Vec<Answer>, action: fn(&mut ActionContext) -> Result<ActionReport>) -> ActionReport {
        let config = AppConfig::default();
        let mut prompt = ScriptedPrompt::new(answers);
        let mut ctx = ActionContext::new(&mut prompt, &config);
        action(&mut ctx).unwrap()
    }

    #[test]
    fn test_inner_join_all_pairs_and_blank_keys() {
        let left = create_test_table(&["cpf", "nome"], &[&["123", "Ana"], &["", "Sem"], &["9", "Zé"]]);
        let right = create_test_table(&["CPF", "banco"], &[&["00000000123", "001"], &["123", "237"], &["", "x"]]);
        let joined = inner_join(&left, &left.column("cpf").unwrap(), &right, &right.column("CPF").unwrap());

        assert_eq!(joined.columns(), &["cpf", "nome", "CPF", "banco"]);
        assert_eq!(column(&joined, "banco"), vec!["001", "237"]);
        assert_eq!(column(&joined, "cpf"), vec!["00000000123", "00000000123"]);
    }

    #[test]
    fn test_inner_join_renames_repeated_headers() {
        let left = create_test_table(&["cpf", "nome"], &[&["1", "a"]]);
        let right = create_test_table(&["cpf", "nome"], &[&["1", "b"]]);
        let joined = inner_join(&left, &left.column("cpf").unwrap(), &right, &right.column("cpf").unwrap());
        assert_eq!(joined.columns(), &["cpf", "nome", "cpf.1", "nome.1"]);
        assert_eq!(column(&joined, "nome.1"), vec!["b"]);
    }

    #[test]
    fn test_merge_area_codes() {
        let table = create_test_table(&["ddd", "num"], &[&["11", "999998888"], &["1", "999998888"], &["11", "99999888a"]]);
        let (valid, invalid) = merge_area_codes(&table, &table.column("ddd").unwrap(), &table.column("num").unwrap());
        assert_eq!(column(&valid, AREA_CODE_AND_NUMBER), vec!["11999998888"]);
        assert_eq!(invalid.len(), 2);
        assert!(!invalid.has_column(AREA_CODE_AND_NUMBER));
    }

    #[test]
    fn test_enricher_first_file_wins() {
        let base = create_test_table(&["cpf"], &[&["1"], &["2"], &["1"], &["3"], &[""]]);
        let mut enricher = CpfEnricher::new(&base, &base.column("cpf").unwrap());

        let first = create_test_table(&["doc", "tel"], &[&["2", "222"], &["2", "other"]]);
        assert_eq!(enricher.absorb(&first, &first.column("doc").unwrap()), 1);

        let second = create_test_table(&["cpf", "email"], &[&["1", "a@x"], &["2", "ignored"]]);
        assert_eq!(enricher.absorb(&second, &second.column("cpf").unwrap()), 1);
        assert!(!enricher.is_done());

        let matched = enricher.matched();
        assert_eq!(matched.columns(), &["CPF", "tel", "email"]);
        assert_eq!(column(matched, "CPF"), vec!["00000000002", "00000000001"]);
        assert_eq!(column(matched, "tel"), vec!["222", ""]);
        assert_eq!(column(&enricher.unmatched(), "CPF"), vec!["00000000003"]);
    }

    #[test]
    fn test_map_onto_model() {
        let data = create_test_table(&["nome", "doc"], &[&["Ana", "1"], &["Bia", "2"]]);
        let model = vec!["CPF".to_string(), "NOME".to_string(), "OBS".to_string()];
        let mapping = vec![(0, data.column("doc").unwrap()), (1, data.column("nome").unwrap())];
        let out = map_onto_model(&model, &data, &mapping);
        assert_eq!(column(&out, "CPF"), vec!["1", "2"]);
        assert_eq!(column(&out, "OBS"), vec!["", ""]);
        assert!(map_onto_model(&model, &data, &[]).is_empty());
    }

    #[test]
    fn test_map_columns_end_to_end_header_only_model() {
        let dir = TempDir::new().unwrap();
        let model = write_csv(dir.path(), "modelo.csv", &["CPF;NOME"]);
        let data = write_csv(dir.path(), "dados.csv", &["nome;cpf", "Ana;1"]);
        let report = run(
            vec![
                Answer::text(dir_text(&model)),
                Answer::text(dir_text(&data)),
                Answer::choose("cpf"),
                Answer::choose(IGNORE_COLUMN),
                Answer::text(dir_text(dir.path())),
            ],
            map_columns,
        );
        assert_eq!(report.get("Mapped columns"), Some(1));
        let out = read(&dir.path().join("resultado_modelo.csv"));
        assert_eq!(out.columns(), &["CPF", "NOME"]);
        assert_eq!(column(&out, "CPF"), vec!["1"]);
    }

    #[test]
    fn test_enrich_skips_unreadable_search_file() {
        let dir = TempDir::new().unwrap();
        let base = write_csv(dir.path(), "base.csv", &["cpf", "1", "2"]);
        let search = write_csv(dir.path(), "s.csv", &["cpf;nome", "1;Ana"]);
        let report = run(
            vec![
                Answer::text(dir_text(&base)),
                Answer::choose("cpf"),
                Answer::Confirm(true),
                Answer::text("/no/such/file.csv"),
                Answer::Confirm(true),
                Answer::text(dir_text(&search)),
                Answer::choose("cpf"),
                Answer::Confirm(false),
                Answer::text(dir_text(dir.path())),
            ],
            enrich_by_cpf,
        );
        assert_eq!(report.get("Search files"), Some(1));
        assert_eq!(report.get("Matched"), Some(1));
        let missing = read(&dir.path().join("semnada_base.csv"));
        assert_eq!(column(&missing, "CPF"), vec!["00000000002"]);
    }

    #[test]
    fn test_check_phones_by_cpf_end_to_end() {
        let dir = TempDir::new().unwrap();
        let base = write_csv(
            dir.path(),
            "base.csv",
            &["cpf;t1;t2", "1;111;", "2;999;888", "3;333;"],
        );
        let reference = write_csv(dir.path(), "ref.csv", &["cpf;tel", "1;000", "1;111", "2;555"]);
        let report = run(
            vec![
                Answer::text(dir_text(&base)),
                Answer::choose("cpf"),
                Answer::choose("t1"),
                Answer::Confirm(true),
                Answer::choose("t2"),
                Answer::Confirm(false),
                Answer::text(dir_text(&reference)),
                Answer::choose("cpf"),
                Answer::choose("tel"),
                Answer::text(dir_text(dir.path())),
            ],
            check_phones_by_cpf,
        );
        assert_eq!(report.get("Found and matched"), Some(1));
        assert_eq!(report.get("Found with other phone"), Some(1));
        assert_eq!(report.get("Not found"), Some(1));
        let not_found = read(&dir.path().join("base_not_found.csv"));
        assert_eq!(column(&not_found, "cpf"), vec!["3"]);
    }
}
