// 🧹 Removals - blacklists, duplicates and unusable rows
// Blacklists are indexed once with ReferenceIndex, then every base row is checked

use super::{ActionContext, ActionReport};
use crate::matcher::ReferenceIndex;
use crate::normalize::{digits_only, normalize_identifier, KeyNormalization, COUNTRY_CODE, INTERNATIONAL_PHONE_DIGITS};
use crate::output::{prefixed, prefixed_csv, OutputPlan};
use crate::prompt::{confirm_with_example, select_column, select_columns_loop};
use crate::table::{ColumnRef, Table};
use anyhow::{bail, Result};

/// Value written over a phone found in a blacklist
pub const REMOVED_PHONE: &str = "0";

// ============================================================================
// CPF LISTS
// ============================================================================

/// Drop rows whose normalized CPF is listed; surviving CPFs come out canonical
pub fn remove_listed(base: &Table, cpf: &ColumnRef, listed: &ReferenceIndex) -> Table {
    let mut kept = base.filter_rows(|i| !listed.contains_key(&normalize_identifier(base.get(i, cpf))));
    kept.map_column(cpf, |v| Some(normalize_identifier(v)));
    kept
}

pub fn remove_listed_cpfs(ctx: &mut ActionContext) -> Result<ActionReport> {
    let base = ctx.load_file("Base file (.xlsx or .csv):")?;
    let base_cpf = select_column(ctx.prompt, &base.table, "CPF column of the base file:")?;
    let removal = ctx.load_file("File with the CPFs to remove (.xlsx or .csv):")?;
    let removal_cpf = select_column(ctx.prompt, &removal.table, "CPF column of the removal file:")?;
    let dir = ctx.output_dir()?;

    let listed = ReferenceIndex::keys_only(&removal.table, &removal_cpf, KeyNormalization::Identifier);
    let filtered = remove_listed(&base.table, &base_cpf, &listed);
    let remaining = filtered.len();

    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    plan.protect(&removal.path);
    plan.add(prefixed(&dir, "cpf_filtered_", &base.path), filtered);

    ActionReport::new("Remove CPFs listed in another file")
        .count("Original rows", base.table.len())
        .count("Rows after removal", remaining)
        .count("Removed rows", base.table.len() - remaining)
        .commit(plan)
}

/// Rows whose trimmed CPF is listed go second
pub fn split_by_blacklist(base: &Table, cpf: &ColumnRef, blacklist: &ReferenceIndex) -> (Table, Table) {
    base.partition_by(|i| !blacklist.contains_key(&KeyNormalization::Trimmed.apply(base.get(i, cpf))))
}

pub fn split_cpf_blacklist(ctx: &mut ActionContext) -> Result<ActionReport> {
    let base = ctx.load_file("Base file (.xlsx or .csv):")?;
    let base_cpf = select_column(ctx.prompt, &base.table, "CPF column of the base file:")?;
    let black = ctx.load_file("Blacklist file (.xlsx or .csv):")?;
    let black_cpf = select_column(ctx.prompt, &black.table, "CPF column of the blacklist:")?;
    let dir = ctx.output_dir()?;

    let blacklist = ReferenceIndex::keys_only(&black.table, &black_cpf, KeyNormalization::Trimmed);
    let (white, listed) = split_by_blacklist(&base.table, &base_cpf, &blacklist);
    let (white_rows, listed_rows) = (white.len(), listed.len());

    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    plan.protect(&black.path);
    plan.add(prefixed(&dir, "whitelist_", &base.path), white);
    plan.add(prefixed(&dir, "blacklist_", &base.path), listed);

    ActionReport::new("Split CPFs by blacklist")
        .count("Original rows", base.table.len())
        .count("Removed rows (CPF in blacklist)", listed_rows)
        .count("Remaining rows", white_rows)
        .commit(plan)
}

/// Normalize the CPF column, then keep the first row of each CPF
pub fn dedup_cpf_column(table: &Table, cpf: &ColumnRef) -> Table {
    let mut normalized = table.clone();
    normalized.map_column(cpf, |v| Some(normalize_identifier(v)));
    let view = &normalized;
    view.dedup_by_key(|i| view.value_or_empty(i, cpf).to_string())
}

pub fn dedup_by_cpf(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File (.xlsx or .csv):")?;
    let cpf = select_column(ctx.prompt, &source.table, "CPF column:")?;
    let dir = ctx.output_dir()?;

    let unique = dedup_cpf_column(&source.table, &cpf);
    let unique_rows = unique.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "sem_duplicatas_", &source.path), unique);

    ActionReport::new("Remove duplicates by CPF")
        .count("Original rows", source.table.len())
        .count("Unique rows", unique_rows)
        .count("Removed duplicates", source.table.len() - unique_rows)
        .commit(plan)
}

// ============================================================================
// NAMES, UPAG, EMPTY CELLS
// ============================================================================

pub fn remove_by_name(ctx: &mut ActionContext) -> Result<ActionReport> {
    let base = ctx.load_file("Base file (.xlsx or .csv):")?;
    let base_name = select_column(ctx.prompt, &base.table, "NAME column of the base file:")?;
    let black = ctx.load_file("Blacklist file (.xlsx or .csv):")?;
    let black_name = select_column(ctx.prompt, &black.table, "NAME column of the blacklist:")?;
    let dir = ctx.output_dir()?;

    let names = ReferenceIndex::keys_only(&black.table, &black_name, KeyNormalization::Uppercase);
    let kept = base
        .table
        .filter_rows(|i| !names.contains_key(&KeyNormalization::Uppercase.apply(base.table.get(i, &base_name))));
    let remaining = kept.len();

    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    plan.protect(&black.path);
    plan.add(prefixed(&dir, "filtra_name_remove_", &base.path), kept);

    ActionReport::new("Remove by name")
        .count("Original rows", base.table.len())
        .count("Removed rows", base.table.len() - remaining)
        .count("Remaining rows", remaining)
        .commit(plan)
}

pub fn remove_upag_blacklist(ctx: &mut ActionContext) -> Result<ActionReport> {
    let base = ctx.load_file("Base file (.xlsx or .csv):")?;
    let base_upag = select_column(ctx.prompt, &base.table, "UPAG column of the base file:")?;
    let black = ctx.load_file("Blacklist file (.xlsx or .csv):")?;
    let black_upag = select_column(ctx.prompt, &black.table, "UPAG column of the blacklist:")?;
    let dir = ctx.output_dir()?;

    let upags = ReferenceIndex::keys_only(&black.table, &black_upag, KeyNormalization::Trimmed);
    println!("   UPAGs in blacklist: {}", upags.len());
    let (kept, _) = split_by_blacklist(&base.table, &base_upag, &upags);
    let remaining = kept.len();

    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    plan.protect(&black.path);
    plan.add(prefixed_csv(&dir, "sem_blacklist_upag_", &base.path), kept);

    ActionReport::new("Remove rows with blacklisted UPAG")
        .count("Original rows", base.table.len())
        .count("Removed rows (UPAG in blacklist)", base.table.len() - remaining)
        .count("Remaining rows", remaining)
        .commit(plan)
}

pub fn delete_empty_rows(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File (.xlsx or .csv):")?;
    let column = select_column(ctx.prompt, &source.table, "Column to check for empty cells:")?;
    let dir = ctx.output_dir()?;

    let kept = source.table.filter_rows(|i| source.table.get(i, &column).is_some());
    let remaining = kept.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "rows_removed_", &source.path), kept);

    ActionReport::new("Remove rows with empty cells")
        .count("Original rows", source.table.len())
        .count("Removed rows", source.table.len() - remaining)
        .count("Remaining rows", remaining)
        .commit(plan)
}

// ============================================================================
// PHONES
// ============================================================================

/// Digits-only value has 13 digits and starts with the country code
pub fn is_international_mobile(value: Option<&str>) -> bool {
    value.map_or(false, |v| {
        let digits = digits_only(v);
        digits.len() == INTERNATIONAL_PHONE_DIGITS && digits.starts_with(COUNTRY_CODE)
    })
}

pub fn filter_phone_numbers(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with phone numbers (.xlsx or .csv):")?;
    let phone = select_column(ctx.prompt, &source.table, "Phone column:")?;
    let dir = ctx.output_dir()?;

    let kept = source.table.filter_rows(|i| is_international_mobile(source.table.get(i, &phone)));
    let remaining = kept.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "filtro_cel_num_", &source.path), kept);

    ActionReport::new("Remove landlines and empty phones")
        .count("Original rows", source.table.len())
        .count("Removed rows", source.table.len() - remaining)
        .count("Remaining rows", remaining)
        .commit(plan)
}

/// Overwrite with `0` every phone cell whose normalized (CPF, phone) pair is in
/// `blacklist`. Returns the number of replaced cells.
pub fn blank_listed_phones(
    table: &mut Table,
    cpf: &ColumnRef,
    phones: &[ColumnRef],
    blacklist: &ReferenceIndex,
) -> usize {
    let key_norm = blacklist.key_normalization();
    let value_norm = blacklist.value_normalization();
    let mut replaced = 0;
    for row in 0..table.len() {
        let key = key_norm.apply(table.get(row, cpf));
        if key.is_empty() || !blacklist.contains_key(&key) {
            continue;
        }
        for phone in phones {
            let value = value_norm.apply(table.get(row, phone));
            if !value.is_empty() && blacklist.contains_pair(&key, &value) {
                table.set(row, phone, Some(REMOVED_PHONE.to_string()));
                replaced += 1;
            }
        }
    }
    replaced
}

pub fn blank_blacklisted_phones(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut base = ctx.load_file("Base file (.xlsx or .csv):")?;
    let cpf = select_column(ctx.prompt, &base.table, "CPF column of the base file:")?;
    let phones = select_columns_loop(ctx.prompt, &base.table, "Phone column:", "Select another phone column?")?;
    if phones.contains(&cpf) {
        bail!("The CPF column cannot also be a phone column");
    }
    for phone in &phones {
        match base.table.first_non_blank(phone) {
            Some(example) => println!("   {}: {}", phone.name(), example.trim()),
            None => println!("   {}: no filled value", phone.name()),
        }
    }

    let black = ctx.load_file("Blacklist file (.xlsx or .csv):")?;
    let black_cpf = select_column(ctx.prompt, &black.table, "CPF column of the blacklist:")?;
    let black_phone = select_column(ctx.prompt, &black.table, "Wrong-phone column of the blacklist:")?;
    if black_phone == black_cpf {
        bail!("The wrong-phone column must differ from the CPF column");
    }
    let dir = ctx.output_dir()?;

    let blacklist = ReferenceIndex::build(
        &black.table,
        &black_cpf,
        &black_phone,
        KeyNormalization::Trimmed,
        KeyNormalization::Trimmed,
    );
    println!("   CPFs in blacklist: {}", blacklist.len());
    let replaced = blank_listed_phones(&mut base.table, &cpf, &phones, &blacklist);
    let rows = base.table.len();

    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    plan.protect(&black.path);
    plan.add(prefixed_csv(&dir, "tel_incorretos_removidos_", &base.path), base.table);

    ActionReport::new("Remove blacklisted numbers (by CPF)")
        .count("Rows", rows)
        .count("Phones replaced by '0'", replaced)
        .commit(plan)
}

pub fn apply_phone_blacklist(ctx: &mut ActionContext) -> Result<ActionReport> {
    let mut base = ctx.load_file("Base file (.xlsx or .csv):")?;
    let cpf = select_column(ctx.prompt, &base.table, "CPF column of the base file:")?;
    let phone = select_column(ctx.prompt, &base.table, "Mobile column of the base file:")?;
    let black = ctx.load_file("Blacklist file (.xlsx or .csv):")?;
    let black_cpf = select_column(ctx.prompt, &black.table, "CPF column of the blacklist:")?;
    let black_phone = select_column(ctx.prompt, &black.table, "Mobile column of the blacklist:")?;
    let dir = ctx.output_dir()?;

    let blacklist = ReferenceIndex::build(
        &black.table,
        &black_cpf,
        &black_phone,
        KeyNormalization::Identifier,
        KeyNormalization::Digits,
    );
    let replaced = blank_listed_phones(&mut base.table, &cpf, std::slice::from_ref(&phone), &blacklist);
    let rows = base.table.len();

    let mut plan = OutputPlan::new();
    plan.protect(&base.path);
    plan.protect(&black.path);
    plan.add(prefixed(&dir, "blacklist_aplicado_", &base.path), base.table);

    ActionReport::new("Apply mobile blacklist (CPF + phone)")
        .count("Rows", rows)
        .count("Phones replaced by '0'", replaced)
        .commit(plan)
}

/// Trim the column, then keep the first row of each value
pub fn dedup_trimmed(table: &Table, column: &ColumnRef) -> Table {
    let mut trimmed = table.clone();
    trimmed.map_column(column, |v| v.map(|s| s.trim().to_string()));
    let view = &trimmed;
    view.dedup_by_key(|i| view.value_or_empty(i, column).to_string())
}

pub fn dedup_by_phone(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File (.xlsx or .csv):")?;
    let phone = select_column(ctx.prompt, &source.table, "Phone column:")?;
    if !confirm_with_example(ctx.prompt, &source.table, &phone, "Is this the phone column?")? {
        bail!("Column '{}' not confirmed", phone.name());
    }
    let dir = ctx.output_dir()?;

    let unique = dedup_trimmed(&source.table, &phone);
    let unique_rows = unique.len();

    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "sem_duplicatas_", &source.path), unique);

    ActionReport::new("Remove duplicates by phone")
        .count("Original rows", source.table.len())
        .count("Unique rows", unique_rows)
        .count("Removed duplicates", source.table.len() - unique_rows)
        .commit(plan)
}
