// 🔎 Single-file filters and validators
// Row predicates over one loaded file; outputs keep the input's container

use super::{ActionContext, ActionReport};
use crate::normalize::{digits_only, is_all_digits, split_area_code, NATIONAL_PHONE_DIGITS};
use crate::output::{prefixed, prefixed_csv, OutputPlan};
use crate::prompt::{ask_number, parse_number, select_column, select_columns, select_columns_loop};
use crate::table::{ColumnRef, Table};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// VALUE FILTERS
// ============================================================================

/// Rows whose column equals `value` exactly
pub fn rows_equal(table: &Table, column: &ColumnRef, value: &str) -> Table {
    table.filter_rows(|i| table.get(i, column) == Some(value))
}

pub fn filter_by_value(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File to filter (.xlsx or .csv):")?;
    let table = &source.table;
    let column = select_column(ctx.prompt, table, "Column to filter:")?;
    let values = table.unique_values(&column);
    if values.is_empty() {
        bail!("Column '{}' has no values", column.name());
    }
    let value = ctx.prompt.select_one("Value to keep:", &values)?;
    let dir = ctx.output_dir()?;

    let filtered = rows_equal(table, &column, &value);
    let kept = filtered.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "filtered_", &source.path), filtered);

    ActionReport::new("Filter by one value")
        .count("Original rows", table.len())
        .count("Kept rows", kept)
        .commit(plan)
}

/// Rows matching every (column, value) pair
pub fn rows_matching_all(table: &Table, filters: &[(ColumnRef, String)]) -> Table {
    table.filter_rows(|i| filters.iter().all(|(c, v)| table.get(i, c) == Some(v.as_str())))
}

pub fn filter_by_values(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File to filter (.xlsx or .csv):")?;
    let table = &source.table;

    let mut filters: Vec<(ColumnRef, String)> = Vec::new();
    loop {
        let narrowed = rows_matching_all(table, &filters);
        let column = select_column(ctx.prompt, table, "Column to filter:")?;
        let values = narrowed.unique_values(&narrowed.column(column.name())?);
        if values.is_empty() {
            println!("   ⚠️  No values left in '{}' for the filters so far", column.name());
        } else {
            let value = ctx.prompt.select_one("Value to keep:", &values)?;
            filters.push((column, value));
        }
        if !ctx.prompt.confirm("Add another filter?", false)? {
            break;
        }
    }
    if filters.is_empty() {
        bail!("No filter was defined");
    }
    let dir = ctx.output_dir()?;

    let filtered = rows_matching_all(table, &filters);
    let kept = filtered.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "filtered_", &source.path), filtered);

    ActionReport::new("Filter by several values")
        .count("Original rows", table.len())
        .count("Filters", filters.len())
        .count("Kept rows", kept)
        .commit(plan)
}

// ============================================================================
// NUMERIC FILTER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumericCondition {
    GreaterThan(f64),
    /// Inclusive on both ends
    Between(f64, f64),
}

impl NumericCondition {
    pub fn matches(&self, value: f64) -> bool {
        match *self {
            NumericCondition::GreaterThan(min) => value > min,
            NumericCondition::Between(low, high) => value >= low && value <= high,
        }
    }
}

/// Columns with at least one value where every filled value is a number
pub fn numeric_columns(table: &Table) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|name| {
            let Ok(column) = table.column(name) else {
                return false;
            };
            let mut filled = table.column_values(&column).flatten().filter(|v| !v.trim().is_empty()).peekable();
            filled.peek().is_some() && filled.all(|v| parse_number(v).is_some())
        })
        .cloned()
        .collect()
}

pub fn rows_numeric(table: &Table, column: &ColumnRef, condition: NumericCondition) -> Table {
    table.filter_rows(|i| {
        table
            .get(i, column)
            .and_then(parse_number)
            .map_or(false, |v| condition.matches(v))
    })
}

pub fn numeric_filter(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File to filter (.xlsx or .csv):")?;
    let table = &source.table;

    let candidates = numeric_columns(table);
    if candidates.is_empty() {
        bail!("No numeric column found");
    }
    let name = ctx.prompt.select_one("Numeric column:", &candidates)?;
    let column = table.column(&name)?;

    let kinds = vec!["Greater than".to_string(), "Between".to_string()];
    let condition = if ctx.prompt.select_one("Filter type:", &kinds)? == kinds[0] {
        NumericCondition::GreaterThan(ask_number(ctx.prompt, "Minimum value (exclusive):")?)
    } else {
        let low = ask_number(ctx.prompt, "Lowest value:")?;
        let high = ask_number(ctx.prompt, "Highest value:")?;
        if low > high {
            bail!("Lowest value {} is above highest value {}", low, high);
        }
        NumericCondition::Between(low, high)
    };
    let dir = ctx.output_dir()?;

    let filtered = rows_numeric(table, &column, condition);
    let kept = filtered.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "numeric_filtered_", &source.path), filtered);

    ActionReport::new("Filter numeric values")
        .count("Original rows", table.len())
        .count("Kept rows", kept)
        .commit(plan)
}

// ============================================================================
// COLUMN SELECTION
// ============================================================================

pub fn keep_columns(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File (.xlsx or .csv):")?;
    let columns = select_columns(ctx.prompt, &source.table, "Columns to keep:")?;
    let dir = ctx.output_dir()?;

    let reduced = source.table.keep_columns(&columns);
    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "kept_columns_", &source.path), reduced);

    ActionReport::new("Keep selected columns")
        .count("Original columns", source.table.width())
        .count("Kept columns", columns.len())
        .commit(plan)
}

pub fn remove_columns(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File (.xlsx or .csv):")?;
    let columns = select_columns(ctx.prompt, &source.table, "Columns to remove:")?;
    let dir = ctx.output_dir()?;

    let reduced = source.table.drop_columns(&columns);
    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "removed_columns_", &source.path), reduced);

    ActionReport::new("Remove selected columns")
        .count("Original columns", source.table.width())
        .count("Removed columns", columns.len())
        .commit(plan)
}

// ============================================================================
// PHONE AND BANK VALIDATORS
// ============================================================================

/// Move the DDD of 11-digit phones into `ddd`; other rows get both cells emptied.
/// Returns (valid, invalid) counts.
pub fn extract_area_codes(table: &mut Table, phone: &ColumnRef, ddd: &ColumnRef) -> (usize, usize) {
    let mut valid = 0;
    for row in 0..table.len() {
        match table.get(row, phone).and_then(split_area_code) {
            Some((area, number)) => {
                table.set(row, ddd, Some(area));
                table.set(row, phone, Some(number));
                valid += 1;
            }
            None => {
                table.set(row, ddd, None);
                table.set(row, phone, None);
            }
        }
    }
    (valid, table.len() - valid)
}

pub fn extract_area_code(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with phone numbers (.xlsx or .csv):")?;
    let phone = select_column(ctx.prompt, &source.table, "Phone column (DDD + number):")?;
    let ddd = select_column(ctx.prompt, &source.table, "Column that receives the DDD:")?;
    if ddd == phone {
        bail!("The DDD column must differ from the phone column");
    }
    let dir = ctx.output_dir()?;

    let (valid, invalid) = extract_area_codes(&mut source.table, &phone, &ddd);
    let rows = source.table.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "extracted_number_ddd_", &source.path), source.table);

    ActionReport::new("Extract area code (DDD) and number")
        .count("Rows", rows)
        .count("Valid numbers", valid)
        .count("Invalid numbers", invalid)
        .commit(plan)
}

/// Agency present and at least 4 characters long
pub fn agency_is_complete(value: Option<&str>) -> bool {
    value.map_or(false, |v| v.chars().count() >= 4)
}

pub fn filter_agencies(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with agencies (.xlsx or .csv):")?;
    let table = &source.table;
    let agency = select_column(ctx.prompt, table, "Agency column:")?;
    let dir = ctx.output_dir()?;

    let kept = table.filter_rows(|i| agency_is_complete(table.get(i, &agency)));
    let removed = table.len() - kept.len();
    let kept_rows = kept.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "filtro_agencias_", &source.path), kept);

    ActionReport::new("Filter agencies")
        .count("Original rows", table.len())
        .count("Kept rows", kept_rows)
        .count("Removed rows", removed)
        .commit(plan)
}

/// Bank 1–3 digits, agency 1–4 digits, account one or more digits
pub fn bank_fields_valid(bank: Option<&str>, agency: Option<&str>, account: Option<&str>) -> bool {
    let digits_within = |v: Option<&str>, max: usize| v.map_or(false, |v| is_all_digits(v) && v.len() <= max);
    digits_within(bank, 3) && digits_within(agency, 4) && account.map_or(false, is_all_digits)
}

/// Bank, agency and account columns picked in that order
fn select_bank_columns(ctx: &mut ActionContext, table: &Table) -> Result<[ColumnRef; 3]> {
    Ok([
        select_column(ctx.prompt, table, "Bank column:")?,
        select_column(ctx.prompt, table, "Agency column:")?,
        select_column(ctx.prompt, table, "Account column:")?,
    ])
}

pub fn validate_banks(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with bank data (.xlsx or .csv):")?;
    let table = &source.table;
    let [bank, agency, account] = select_bank_columns(ctx, table)?;
    let dir = ctx.output_dir()?;

    let (valid, invalid) = table.partition_by(|i| {
        bank_fields_valid(table.get(i, &bank), table.get(i, &agency), table.get(i, &account))
    });
    let (valid_rows, invalid_rows) = (valid.len(), invalid.len());

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "filtrar_bank_validos_", &source.path), valid);
    plan.add(prefixed(&dir, "filtrar_bank_invalidos_", &source.path), invalid);

    ActionReport::new("Validate banks")
        .count("Original rows", table.len())
        .count("Valid rows", valid_rows)
        .count("Invalid rows", invalid_rows)
        .commit(plan)
}

/// Blank, "0", or containing a letter or a space
pub fn bank_value_is_invalid(value: Option<&str>) -> bool {
    let Some(raw) = value else {
        return true;
    };
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "0" || raw.chars().any(|c| c.is_alphabetic() || c == ' ')
}

pub fn validate_bank_agency_account(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with bank data (.xlsx or .csv):")?;
    let table = &source.table;
    let columns = select_bank_columns(ctx, table)?;
    let dir = ctx.output_dir()?;

    let (valid, invalid) = table.partition_by(|i| !columns.iter().any(|c| bank_value_is_invalid(table.get(i, c))));
    let (valid_rows, invalid_rows) = (valid.len(), invalid.len());

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "filter_back_age_validos_", &source.path), valid);
    plan.add(prefixed(&dir, "filter_back_age_invalidos_", &source.path), invalid);

    ActionReport::new("Validate bank, agency and account")
        .count("Original rows", table.len())
        .count("Valid rows", valid_rows)
        .count("Invalid rows", invalid_rows)
        .commit(plan)
}

/// Exactly 11 digits after trimming, nothing else
pub fn is_national_mobile(value: Option<&str>) -> bool {
    value.map_or(false, |v| {
        let v = v.trim();
        v.len() == NATIONAL_PHONE_DIGITS && is_all_digits(v)
    })
}

pub fn validate_mobiles(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with CPF and mobile columns (.xlsx or .csv):")?;
    let table = &source.table;
    let cpf = select_column(ctx.prompt, table, "CPF column:")?;
    let mobile = select_column(ctx.prompt, table, "Mobile column:")?;
    let dir = ctx.output_dir()?;

    let (valid, invalid) = table.partition_by(|i| is_national_mobile(table.get(i, &mobile)));
    let (valid_rows, invalid_rows) = (valid.len(), invalid.len());
    let cpf_only = std::slice::from_ref(&cpf);

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed_csv(&dir, "Valido_", &source.path), valid.keep_columns(cpf_only));
    plan.add(prefixed_csv(&dir, "Invalido_", &source.path), invalid.keep_columns(cpf_only));

    ActionReport::new("Validate mobile numbers (simple)")
        .count("Original rows", table.len())
        .count("Valid numbers", valid_rows)
        .count("Invalid numbers", invalid_rows)
        .commit(plan)
}

/// Digits of the value, 11 of them
pub fn has_eleven_digits(value: Option<&str>) -> bool {
    value.map_or(false, |v| digits_only(v).len() == NATIONAL_PHONE_DIGITS)
}

pub fn validate_mobile_columns(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with mobile columns (.xlsx or .csv):")?;
    let table = &source.table;
    let columns = select_columns_loop(ctx.prompt, table, "Mobile column:", "Add another mobile column?")?;
    let first = &columns[0];
    println!("   Only '{}' decides validity", first.name());
    let dir = ctx.output_dir()?;

    let (valid, invalid) = table.partition_by(|i| has_eleven_digits(table.get(i, first)));
    let (valid_rows, invalid_rows) = (valid.len(), invalid.len());

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "val_mult_phone_valid_", &source.path), valid);
    plan.add(prefixed(&dir, "val_mult_phone_invalid_", &source.path), invalid);

    ActionReport::new("Validate several mobile columns")
        .count("Original rows", table.len())
        .count("Valid rows", valid_rows)
        .count("Invalid rows", invalid_rows)
        .commit(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{column, dir_text, read, write_csv};
    use crate::config::AppConfig;
    use crate::prompt::{Answer, ScriptedPrompt};
    use tempfile::TempDir;

    fn run<F>(answers: Vec<Answer>, action: F) -> ActionReport
    where
        F: Fn(&mut ActionContext) -> Result<ActionReport>,
    {
        let config = AppConfig::default();
        let mut prompt = ScriptedPrompt::new(answers);
        let mut ctx = ActionContext::new(&mut prompt, &config);
        action(&mut ctx).unwrap()
    }

    #[test]
    fn test_numeric_condition() {
        assert!(NumericCondition::GreaterThan(10.0).matches(10.5));
        assert!(!NumericCondition::GreaterThan(10.0).matches(10.0));
        assert!(NumericCondition::Between(1.0, 2.0).matches(2.0));
    }

    #[test]
    fn test_numeric_columns_detection() {
        let table = Table::from_rows(
            vec!["valor".into(), "nome".into(), "vazio".into()],
            vec![
                vec![Some("10,5".into()), Some("Ana".into()), None],
                vec![Some("3".into()), Some("7".into()), None],
            ],
        );
        assert_eq!(numeric_columns(&table), vec!["valor"]);
    }

    #[test]
    fn test_bank_rules() {
        assert!(bank_fields_valid(Some("1"), Some("1234"), Some("99")));
        assert!(!bank_fields_valid(Some("1234"), Some("1"), Some("9")));
        assert!(!bank_fields_valid(Some("1"), Some("12a"), Some("9")));
        assert!(!bank_fields_valid(Some("1"), Some("1"), None));

        assert!(bank_value_is_invalid(None));
        assert!(bank_value_is_invalid(Some(" 0 ")));
        assert!(bank_value_is_invalid(Some("12 3")));
        assert!(bank_value_is_invalid(Some("12X")));
        assert!(!bank_value_is_invalid(Some("12-3")));
    }

    #[test]
    fn test_extract_area_codes() {
        let mut table = Table::from_rows(
            vec!["tel".into(), "ddd".into()],
            vec![vec![Some("11999998888".into()), None], vec![Some("999998888".into()), Some("x".into())]],
        );
        let tel = table.column("tel").unwrap();
        let ddd = table.column("ddd").unwrap();
        assert_eq!(extract_area_codes(&mut table, &tel, &ddd), (1, 1));
        assert_eq!(table.get(0, &ddd), Some("11"));
        assert_eq!(table.get(0, &tel), Some("999998888"));
        assert_eq!(table.get(1, &ddd), None);
        assert_eq!(table.get(1, &tel), None);
    }

    #[test]
    fn test_filter_by_value_end_to_end() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(dir.path(), "base.csv", &["uf;nome", "SP;Ana", "RJ;Bia", "SP;Caio"]);
        let report = run(
            vec![
                Answer::text(dir_text(&input)),
                Answer::choose("uf"),
                Answer::choose("SP"),
                Answer::text(dir_text(dir.path())),
            ],
            filter_by_value,
        );
        assert_eq!(report.get("Kept rows"), Some(2));
        let out = read(&dir.path().join("filtered_base.csv"));
        assert_eq!(column(&out, "nome"), vec!["Ana", "Caio"]);
    }

    #[test]
    fn test_filter_by_values_narrows_choices() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(dir.path(), "base.csv", &["uf;cidade", "SP;Santos", "RJ;Niteroi", "SP;Campinas"]);
        let report = run(
            vec![
                Answer::text(dir_text(&input)),
                Answer::choose("uf"),
                Answer::choose("SP"),
                Answer::Confirm(true),
                Answer::choose("cidade"),
                Answer::choose("Campinas"),
                Answer::Confirm(false),
                Answer::text(dir_text(dir.path())),
            ],
            filter_by_values,
        );
        assert_eq!(report.get("Kept rows"), Some(1));
    }

    #[test]
    fn test_numeric_filter_between() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(dir.path(), "v.csv", &["id;valor", "a;5", "b;15", "c;25"]);
        let report = run(
            vec![
                Answer::text(dir_text(&input)),
                Answer::choose("valor"),
                Answer::choose("Between"),
                Answer::text("10"),
                Answer::text("25"),
                Answer::text(dir_text(dir.path())),
            ],
            numeric_filter,
        );
        assert_eq!(report.get("Kept rows"), Some(2));
        let out = read(&dir.path().join("numeric_filtered_v.csv"));
        assert_eq!(column(&out, "id"), vec!["b", "c"]);
    }

    #[test]
    fn test_filter_agencies_output() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(dir.path(), "ag.csv", &["agencia;nome", "1234;a", "123;b", ";c", "00012;d"]);
        let report = run(
            vec![Answer::text(dir_text(&input)), Answer::choose("agencia"), Answer::text(dir_text(dir.path()))],
            filter_agencies,
        );
        assert_eq!(report.get("Removed rows"), Some(2));
        let out = read(&dir.path().join("filtro_agencias_ag.csv"));
        assert_eq!(column(&out, "nome"), vec!["a", "d"]);
    }

    #[test]
    fn test_validate_mobiles_keeps_only_cpf() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(dir.path(), "cel.csv", &["cpf;cel;nome", "1;11999998888;a", "2;1199999;b"]);
        run(
            vec![
                Answer::text(dir_text(&input)),
                Answer::choose("cpf"),
                Answer::choose("cel"),
                Answer::text(dir_text(dir.path())),
            ],
            validate_mobiles,
        );
        let valid = read(&dir.path().join("Valido_cel.csv"));
        assert_eq!(valid.columns(), &["cpf"]);
        assert_eq!(column(&valid, "cpf"), vec!["1"]);
        assert_eq!(column(&read(&dir.path().join("Invalido_cel.csv")), "cpf"), vec!["2"]);
    }

    #[test]
    fn test_validate_mobile_columns_uses_first_column() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(
            dir.path(),
            "m.csv",
            &["t1;t2", "(11) 99999-8888;1", "123;11999998888"],
        );
        let report = run(
            vec![
                Answer::text(dir_text(&input)),
                Answer::choose("t1"),
                Answer::Confirm(true),
                Answer::choose("t2"),
                Answer::Confirm(false),
                Answer::text(dir_text(dir.path())),
            ],
            validate_mobile_columns,
        );
        assert_eq!(report.get("Valid rows"), Some(1));
        assert_eq!(report.get("Invalid rows"), Some(1));
    }

    #[test]
    fn test_keep_columns_output() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(dir.path(), "k.csv", &["a;b;c", "1;2;3"]);
        run(
            vec![
                Answer::text(dir_text(&input)),
                Answer::choose_many(&["c", "a"]),
                Answer::text(dir_text(dir.path())),
            ],
            keep_columns,
        );
        assert_eq!(read(&dir.path().join("kept_columns_k.csv")).columns(), &["a", "c"]);
    }

    #[test]
    fn test_unknown_column_aborts_action() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(dir.path(), "x.csv", &["a;b", "1;2"]);
        let config = AppConfig::default();
        let mut prompt = ScriptedPrompt::new(vec![Answer::text(dir_text(&input)), Answer::choose("zzz")]);
        let mut ctx = ActionContext::new(&mut prompt, &config);
        assert!(filter_agencies(&mut ctx).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
