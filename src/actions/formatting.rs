// ✏️ Formatting - rewrite values of one or more columns in place
// Row-dropping formatters write the kept rows; the others keep every row

use super::{ActionContext, ActionReport};
use crate::normalize::{self, digits_only, is_all_digits, IDENTIFIER_WIDTH};
use crate::output::{prefixed, suffixed, CsvOptions, OutputPlan};
use crate::progress::row_progress;
use crate::prompt::{confirm_with_example, select_column, select_columns_loop};
use crate::table::{ColumnRef, Table};
use anyhow::{bail, Result};
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Width of a formatted RG
pub const RG_WIDTH: usize = 10;

/// Shortest RG accepted
pub const RG_MIN_DIGITS: usize = 5;

/// Name of the column added by the age action
pub const AGE_COLUMN: &str = "idade";

/// São Paulo offset from UTC, in seconds
const SAO_PAULO_OFFSET_SECS: i32 = -3 * 3600;

// ============================================================================
// CPF AND MONEY
// ============================================================================

/// Digits of the value left-padded to 11 when there are 1 to 11 of them
pub fn pad_cpf(raw: &str) -> Option<String> {
    let digits = digits_only(raw.trim());
    (!digits.is_empty() && digits.len() <= IDENTIFIER_WIDTH)
        .then(|| format!("{:0>width$}", digits, width = IDENTIFIER_WIDTH))
}

pub fn pad_cpfs(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with CPFs (.xlsx or .csv):")?;
    let cpf = select_column(ctx.prompt, &source.table, "CPF column:")?;

    let adjusted = source
        .table
        .map_column(&cpf, |v| v.map(|raw| pad_cpf(raw).unwrap_or_else(|| raw.to_string())));
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "cpfs_ajustados_", &source.path), source.table);

    ActionReport::new("Pad CPFs to 11 digits")
        .count("Rows", rows)
        .count("CPFs adjusted", adjusted)
        .commit(plan)
}

/// Integer cents as Brazilian money text.
///
/// # Examples
/// * `"123456"` → `"1.234,56"`
/// * `"-5"` → `"-0,05"`
/// * `"12.5"` → `None`
pub fn money_text(raw: &str) -> Option<String> {
    let cents: i64 = raw.trim().parse().ok()?;
    let abs = cents.unsigned_abs();
    let whole = (abs / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if cents < 0 { "-" } else { "" };
    Some(format!("{}{},{:02}", sign, grouped, abs % 100))
}

pub fn format_money(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with values (.xlsx or .csv):")?;
    let column = select_column(ctx.prompt, &source.table, "Column with the values to format:")?;

    let formatted = source
        .table
        .map_column(&column, |v| v.map(|raw| money_text(raw).unwrap_or_else(|| raw.to_string())));
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "format_money_", &source.path), source.table);

    ActionReport::new("Format values as money")
        .count("Rows", rows)
        .count("Values formatted", formatted)
        .commit(plan)
}

// ============================================================================
// PHONE PREFIX
// ============================================================================

/// Columns picked in a loop, each kept only if the user confirms its example value
fn confirmed_columns(ctx: &mut ActionContext, table: &Table, message: &str) -> Result<Vec<ColumnRef>> {
    let picked = select_columns_loop(ctx.prompt, table, message, "Select another column?")?;
    let mut confirmed = Vec::with_capacity(picked.len());
    for column in picked {
        if confirm_with_example(ctx.prompt, table, &column, "Does this column hold phone numbers?")? {
            confirmed.push(column);
        } else {
            println!("   Column '{}' left out", column.name());
        }
    }
    if confirmed.is_empty() {
        bail!("No column confirmed");
    }
    Ok(confirmed)
}

/// Apply `f` to every listed column; values it rejects are kept trimmed
fn rewrite_columns<F>(table: &mut Table, columns: &[ColumnRef], f: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    columns
        .iter()
        .map(|column| {
            table.map_column(column, |v| v.map(|raw| f(raw).unwrap_or_else(|| raw.trim().to_string())))
        })
        .sum()
}

pub fn add_country_prefix(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with phone numbers (.xlsx or .csv):")?;
    let columns = confirmed_columns(ctx, &source.table, "Phone column:")?;

    let changed = rewrite_columns(&mut source.table, &columns, normalize::add_country_prefix);
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "num_format_", &source.path), source.table);

    ActionReport::new("Add '55' prefix to numbers")
        .count("Rows", rows)
        .count("Columns", columns.len())
        .count("Values changed", changed)
        .commit(plan)
}

pub fn remove_country_prefix(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with phone numbers (.xlsx or .csv):")?;
    let columns = confirmed_columns(ctx, &source.table, "Phone column:")?;
    if !ctx
        .prompt
        .confirm("Remove '55' from numbers with 13 digits that start with it?", true)?
    {
        bail!("Nothing to do");
    }

    let changed = rewrite_columns(&mut source.table, &columns, normalize::strip_country_prefix);
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(suffixed(&dir, &source.path, "_remov55", source.format), source.table);

    ActionReport::new("Remove '55' prefix from phone columns")
        .count("Rows", rows)
        .count("Columns", columns.len())
        .count("Values changed", changed)
        .commit(plan)
}

// ============================================================================
// DOCUMENTS AND PERSONAL FIELDS
// ============================================================================

pub fn rg_is_valid(value: Option<&str>) -> bool {
    value.map_or(false, |v| {
        let v = v.trim();
        v.len() >= RG_MIN_DIGITS && is_all_digits(v)
    })
}

/// (valid rows padded to 10, invalid rows untouched)
pub fn split_rgs(table: &Table, rg: &ColumnRef) -> (Table, Table) {
    let (mut valid, invalid) = table.partition_by(|i| rg_is_valid(table.get(i, rg)));
    valid.map_column(rg, |v| v.map(|raw| format!("{:0>width$}", raw.trim(), width = RG_WIDTH)));
    (valid, invalid)
}

pub fn format_rgs(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with RGs (.xlsx or .csv):")?;
    let rg = select_column(ctx.prompt, &source.table, "RG column:")?;
    let dir = ctx.output_dir()?;

    let (valid, invalid) = split_rgs(&source.table, &rg);
    let (valid_rows, invalid_rows) = (valid.len(), invalid.len());

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "valid_rgs_", &source.path), valid);
    plan.add(prefixed(&dir, "invalid_rgs_", &source.path), invalid);

    ActionReport::new("Filter and format RGs")
        .count("Rows", source.table.len())
        .count("Valid RGs", valid_rows)
        .count("Invalid RGs", invalid_rows)
        .commit(plan)
}

/// `M`/`F` spelled out; anything else unchanged
pub fn sex_label(raw: &str) -> Option<&'static str> {
    match raw.trim() {
        "M" => Some("Masculino"),
        "F" => Some("Feminino"),
        _ => None,
    }
}

pub fn format_benefits(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("Benefit file (.xlsx or .csv):")?;
    let sex = select_column(ctx.prompt, &source.table, "Sex column:")?;
    let benefit = select_column(ctx.prompt, &source.table, "Benefit type column:")?;

    let sex_changed = source.table.map_column(&sex, |v| {
        v.map(|raw| sex_label(raw).map(str::to_string).unwrap_or_else(|| raw.to_string()))
    });
    let benefit_changed = source
        .table
        .map_column(&benefit, |v| v.map(|raw| raw.chars().take(2).collect()));
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "format_benf_", &source.path), source.table);

    ActionReport::new("Format benefit file")
        .count("Rows", rows)
        .count("Sex values changed", sex_changed)
        .count("Benefit types shortened", benefit_changed)
        .commit(plan)
}

/// Digit-only value as integer text (leading zeros dropped); anything else is `0`
pub fn address_number(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if is_all_digits(v) => {
            let stripped = v.trim_start_matches('0');
            if stripped.is_empty() { "0".to_string() } else { stripped.to_string() }
        }
        _ => "0".to_string(),
    }
}

pub fn validate_address_numbers(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with address numbers (.xlsx or .csv):")?;
    let column = select_column(ctx.prompt, &source.table, "Address number column:")?;

    source.table.map_column(&column, |v| Some(address_number(v)));
    let zeros = source.table.column_values(&column).filter(|v| *v == Some("0")).count();
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "validated_address_numbers_", &source.path), source.table);

    ActionReport::new("Validate address numbers")
        .count("Rows", rows)
        .count("Empty or invalid (now 0)", zeros)
        .commit(plan)
}

/// Rows whose sex value is, or maps to, `Masculino`/`Feminino`, with the mapped value
pub fn valid_sex_rows(table: &Table, sex: &ColumnRef) -> Table {
    let mut mapped = table.clone();
    mapped.map_column(sex, |v| {
        v.map(|raw| sex_label(raw).map(str::to_string).unwrap_or_else(|| raw.to_string()))
    });
    mapped.filter_rows(|i| matches!(mapped.get(i, sex), Some("Masculino") | Some("Feminino")))
}

pub fn validate_sex_column(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with a sex column (.xlsx or .csv):")?;
    let sex = select_column(ctx.prompt, &source.table, "Sex column:")?;
    let dir = ctx.output_dir()?;

    let valid = valid_sex_rows(&source.table, &sex);
    let valid_rows = valid.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "validated_sex_column_", &source.path), valid);

    ActionReport::new("Validate sex column")
        .count("Rows", source.table.len())
        .count("Valid rows", valid_rows)
        .count("Removed rows", source.table.len() - valid_rows)
        .commit(plan)
}

// ============================================================================
// BANK AGENCY
// ============================================================================

/// Blank or `0` → `1`; two or more characters lose the trailing check digit
pub fn agency_without_check_digit(value: Option<&str>) -> String {
    let v = value.map(str::trim).unwrap_or("");
    if v.is_empty() || v == "0" {
        return "1".to_string();
    }
    let mut chars: Vec<char> = v.chars().collect();
    if chars.len() > 1 {
        chars.pop();
    }
    chars.into_iter().collect()
}

pub fn format_agency_column(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with agencies (.xlsx or .csv):")?;
    let agency = select_column(ctx.prompt, &source.table, "Agency column:")?;

    let modified = source
        .table
        .map_column(&agency, |v| Some(agency_without_check_digit(v)));
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "agencia_format_", &source.path), source.table);

    ActionReport::new("Format agency column")
        .count("Rows", rows)
        .count("Modified rows", modified)
        .commit(plan)
}

// ============================================================================
// MOBILE DIGITS
// ============================================================================

/// (rows with a 13-character number, rows whose number was neither 12 nor 13 characters)
pub fn split_mobile_nine(table: &Table, phone: &ColumnRef) -> (Table, Table) {
    let (mut valid, invalid) =
        table.partition_by(|i| table.get(i, phone).and_then(normalize::insert_mobile_nine).is_some());
    valid.map_column(phone, |v| v.and_then(normalize::insert_mobile_nine));
    (valid, invalid)
}

pub fn insert_mobile_nine(ctx: &mut ActionContext) -> Result<ActionReport> {
    println!("   Numbers must start with 55 followed by the DDD");
    let source = ctx.load_file("File with mobile numbers (.xlsx or .csv):")?;
    let phone = select_column(ctx.prompt, &source.table, "Mobile number column:")?;
    let dir = ctx.output_dir()?;

    let (valid, invalid) = split_mobile_nine(&source.table, &phone);
    let (valid_rows, invalid_rows) = (valid.len(), invalid.len());

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "filtrer_num_nine_validos_", &source.path), valid);
    plan.add(prefixed(&dir, "filtrer_num_nine_invalidos_", &source.path), invalid);

    ActionReport::new("Format mobile numbers missing the '9'")
        .count("Rows", source.table.len())
        .count("Valid numbers", valid_rows)
        .count("Invalid numbers", invalid_rows)
        .commit(plan)
}

pub fn trim_to_eleven_digits(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with mobile numbers (.xlsx or .csv):")?;
    let phone = select_column(ctx.prompt, &source.table, "Mobile number column:")?;
    if !confirm_with_example(ctx.prompt, &source.table, &phone, "Is this the right column?")? {
        bail!("Cancelled by the user");
    }

    let trimmed = rewrite_columns(&mut source.table, std::slice::from_ref(&phone), normalize::trim_to_eleven);
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "formatado_11_digitos_", &source.path), source.table);

    ActionReport::new("Format mobile numbers to 11 digits")
        .count("Rows", rows)
        .count("Numbers changed", trimmed)
        .commit(plan)
}

// ============================================================================
// DATES
// ============================================================================

/// Today's date in São Paulo
pub fn today_in_sao_paulo() -> NaiveDate {
    match FixedOffset::east_opt(SAO_PAULO_OFFSET_SECS) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Whole years between `birth` and `today`
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let before_birthday = (today.month(), today.day()) < (birth.month(), birth.day());
    today.year() - birth.year() - i32::from(before_birthday)
}

/// Age for a `dd/mm/yyyy` birth date; `None` when the date does not parse
pub fn age_from_text(raw: Option<&str>, today: NaiveDate) -> Option<String> {
    let birth = NaiveDate::parse_from_str(raw?.trim(), "%d/%m/%Y").ok()?;
    Some(age_on(birth, today).to_string())
}

/// Rows with a valid birth date and a new `idade` column
pub fn with_ages(table: &Table, birth: &ColumnRef, today: NaiveDate) -> Table {
    let ages: Vec<Option<String>> = (0..table.len())
        .map(|i| age_from_text(table.get(i, birth), today))
        .collect();
    let keep: Vec<usize> = (0..table.len()).filter(|&i| ages[i].is_some()).collect();

    let mut out = table.subset(&keep);
    let age = out.add_column(AGE_COLUMN);
    for (row, &source_row) in keep.iter().enumerate() {
        out.set(row, &age, ages[source_row].clone());
    }
    out
}

pub fn add_age_column(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with birth dates (.xlsx or .csv):")?;
    let birth = select_column(ctx.prompt, &source.table, "Birth date column (dd/mm/yyyy):")?;

    let today = today_in_sao_paulo();
    let bar = row_progress(source.table.len(), "computing ages");
    let aged = with_ages(&source.table, &birth, today);
    bar.set_position(source.table.len() as u64);
    bar.finish_with_message("done");
    let kept = aged.len();
    let dir = ctx.output_dir()?;

    let options = CsvOptions::new()
        .quote_all()
        .with_delimiter(source.delimiter.unwrap_or(b';'));
    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add_with(prefixed(&dir, "arquivo_com_idade_", &source.path), aged, options);

    ActionReport::new("Add age column")
        .count("Rows", source.table.len())
        .count("Rows with age", kept)
        .count("Dropped (invalid date)", source.table.len() - kept)
        .commit(plan)
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Common date and date-time shapes rendered as `dd/mm/yyyy`
pub fn format_date(raw: &str) -> Option<String> {
    let v = raw.trim();
    let date = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(v, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(v, f).ok())
                .map(|dt| dt.date())
        })?;
    Some(date.format("%d/%m/%Y").to_string())
}

pub fn format_dates(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut source = ctx.load_file("File with dates (.xlsx or .csv):")?;
    let column = select_column(ctx.prompt, &source.table, "Date column:")?;

    source.table.map_column(&column, |v| v.and_then(format_date));
    let blank = source.table.column_values(&column).filter(Option::is_none).count();
    let rows = source.table.len();
    let dir = ctx.output_dir()?;

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "data_formatada_", &source.path), source.table);

    ActionReport::new("Format a date column")
        .count("Rows", rows)
        .count("Blank after formatting", blank)
        .commit(plan)
}
