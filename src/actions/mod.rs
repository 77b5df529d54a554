// 🧰 Actions - one menu entry each: load → select → transform → report → write
// Each action has a pure table function; the interactive wrapper only gathers inputs

pub mod filters;
pub mod folders;
pub mod formatting;
pub mod merges;
pub mod postal;
pub mod removals;

use crate::cep::CepLookup;
use crate::config::AppConfig;
use crate::loader::{LoadedSource, Loader};
use crate::output::OutputPlan;
use crate::prompt::{ask_existing_file, ask_output_dir, Prompt};
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

// ============================================================================
// ACTION CONTEXT
// ============================================================================

/// Everything an action may use; nothing here outlives one menu selection
pub struct ActionContext<'a> {
    pub prompt: &'a mut dyn Prompt,
    pub config: &'a AppConfig,
    pub loader: Loader,

    /// Injected postal-code service; the postal action builds one from config when absent
    pub lookup: Option<&'a dyn CepLookup>,
}

impl<'a> ActionContext<'a> {
    pub fn new(prompt: &'a mut dyn Prompt, config: &'a AppConfig) -> Self {
        ActionContext {
            prompt,
            config,
            loader: Loader::new().with_delimiters(&config.delimiter_candidates),
            lookup: None,
        }
    }

    pub fn with_lookup(mut self, lookup: &'a dyn CepLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Ask for a file path and load it
    pub fn load_file(&mut self, message: &str) -> Result<LoadedSource> {
        let path = ask_existing_file(self.prompt, message)?;
        let source = self.loader.load(&path)?;
        println!(
            "📂 Loaded {}: {} rows × {} columns",
            source.file_name(),
            source.table.len(),
            source.table.width()
        );
        Ok(source)
    }

    pub fn output_dir(&mut self) -> Result<PathBuf> {
        ask_output_dir(self.prompt)
    }
}

// ============================================================================
// ACTION REPORT
// ============================================================================

/// Summary printed after an action: labelled counts and written files
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionReport {
    pub title: String,
    pub counts: Vec<(String, usize)>,
    pub outputs: Vec<PathBuf>,
}

impl ActionReport {
    pub fn new(title: &str) -> Self {
        ActionReport {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Builder pattern: add a labelled count
    pub fn count(mut self, label: &str, value: usize) -> Self {
        self.counts.push((label.to_string(), value));
        self
    }

    /// Builder pattern: record written files
    pub fn outputs(mut self, paths: Vec<PathBuf>) -> Self {
        self.outputs.extend(paths);
        self
    }

    /// Write the plan and record its paths
    pub fn commit(self, plan: OutputPlan) -> Result<Self> {
        let paths = plan.commit()?;
        Ok(self.outputs(paths))
    }

    /// Value of a labelled count
    pub fn get(&self, label: &str) -> Option<usize> {
        self.counts.iter().find(|(l, _)| l == label).map(|(_, v)| *v)
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!("✅ {}", self.title)];
        for (label, value) in &self.counts {
            lines.push(format!("   {}: {}", label, value));
        }
        for path in &self.outputs {
            lines.push(format!("   💾 {}", path.display()));
        }
        lines.join("\n")
    }
}

// ============================================================================
// ACTION REGISTRY
// ============================================================================

/// Top-level menu groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    SingleFilters,
    MultipleFilters,
    Removals,
    Unifications,
    Formatting,
    ColumnMapping,
    DateFormatting,
    PostalCodes,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::SingleFilters,
            Category::MultipleFilters,
            Category::Removals,
            Category::Unifications,
            Category::Formatting,
            Category::ColumnMapping,
            Category::DateFormatting,
            Category::PostalCodes,
        ]
    }

    pub fn name(&self) -> &str {
        match self {
            Category::SingleFilters => "Single filters",
            Category::MultipleFilters => "Multiple filters",
            Category::Removals => "Removals",
            Category::Unifications => "Additions / unifications",
            Category::Formatting => "Formatting",
            Category::ColumnMapping => "Column mapping",
            Category::DateFormatting => "Date formatting",
            Category::PostalCodes => "Look up and validate CEPs",
        }
    }

    /// Actions of this category in menu order
    pub fn actions(&self) -> Vec<Action> {
        Action::all().iter().copied().filter(|a| a.category() == *self).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Single filters
    FilterByValue,
    NumericFilter,
    ExtractAreaCode,
    FilterAgencies,
    ValidateBanks,
    ValidateBankAgencyAccount,
    ValidateMobiles,
    ValidateMobileColumns,
    KeepColumns,
    RemoveColumns,

    // Multiple filters
    FilterByValues,
    ReduceToCommonColumns,
    DedupCpfsAcrossFiles,
    UnifyCsvInChunks,

    // Removals
    RemoveListedCpfs,
    RemoveByName,
    FilterPhoneNumbers,
    DeleteEmptyRows,
    BlankBlacklistedPhones,
    SplitCpfBlacklist,
    DedupByCpf,
    ApplyPhoneBlacklist,
    DedupByPhone,
    RemoveUpagBlacklist,

    // Additions / unifications
    UnifyFolderByCpf,
    JoinByCpf,
    EnrichByCpf,
    ConcatenateFolder,
    MergeAreaCodeAndNumber,
    MergeFolderToCsv,

    // Formatting
    PadCpfs,
    FormatMoney,
    AddCountryPrefix,
    FormatRgs,
    FormatBenefits,
    ValidateAddressNumbers,
    ValidateSexColumn,
    FormatAgencyColumn,
    InsertMobileNine,
    TrimToElevenDigits,
    AddAgeColumn,
    RemoveCountryPrefix,
    CheckPhonesByCpf,

    // Direct entries
    MapColumns,
    FormatDates,
    ValidateCeps,
}

impl Action {
    pub fn all() -> &'static [Action] {
        use Action::*;
        &[
            FilterByValue,
            NumericFilter,
            ExtractAreaCode,
            FilterAgencies,
            ValidateBanks,
            ValidateBankAgencyAccount,
            ValidateMobiles,
            ValidateMobileColumns,
            KeepColumns,
            RemoveColumns,
            FilterByValues,
            ReduceToCommonColumns,
            DedupCpfsAcrossFiles,
            UnifyCsvInChunks,
            RemoveListedCpfs,
            RemoveByName,
            FilterPhoneNumbers,
            DeleteEmptyRows,
            BlankBlacklistedPhones,
            SplitCpfBlacklist,
            DedupByCpf,
            ApplyPhoneBlacklist,
            DedupByPhone,
            RemoveUpagBlacklist,
            UnifyFolderByCpf,
            JoinByCpf,
            EnrichByCpf,
            ConcatenateFolder,
            MergeAreaCodeAndNumber,
            MergeFolderToCsv,
            PadCpfs,
            FormatMoney,
            AddCountryPrefix,
            FormatRgs,
            FormatBenefits,
            ValidateAddressNumbers,
            ValidateSexColumn,
            FormatAgencyColumn,
            InsertMobileNine,
            TrimToElevenDigits,
            AddAgeColumn,
            RemoveCountryPrefix,
            CheckPhonesByCpf,
            MapColumns,
            FormatDates,
            ValidateCeps,
        ]
    }

    pub fn category(&self) -> Category {
        use Action::*;
        match self {
            FilterByValue | NumericFilter | ExtractAreaCode | FilterAgencies | ValidateBanks
            | ValidateBankAgencyAccount | ValidateMobiles | ValidateMobileColumns | KeepColumns
            | RemoveColumns => Category::SingleFilters,
            FilterByValues | ReduceToCommonColumns | DedupCpfsAcrossFiles | UnifyCsvInChunks => {
                Category::MultipleFilters
            }
            RemoveListedCpfs | RemoveByName | FilterPhoneNumbers | DeleteEmptyRows | BlankBlacklistedPhones
            | SplitCpfBlacklist | DedupByCpf | ApplyPhoneBlacklist | DedupByPhone | RemoveUpagBlacklist => {
                Category::Removals
            }
            UnifyFolderByCpf | JoinByCpf | EnrichByCpf | ConcatenateFolder | MergeAreaCodeAndNumber
            | MergeFolderToCsv => Category::Unifications,
            PadCpfs | FormatMoney | AddCountryPrefix | FormatRgs | FormatBenefits | ValidateAddressNumbers
            | ValidateSexColumn | FormatAgencyColumn | InsertMobileNine | TrimToElevenDigits | AddAgeColumn
            | RemoveCountryPrefix | CheckPhonesByCpf => Category::Formatting,
            MapColumns => Category::ColumnMapping,
            FormatDates => Category::DateFormatting,
            ValidateCeps => Category::PostalCodes,
        }
    }

    /// Menu label
    pub fn name(&self) -> &str {
        use Action::*;
        match self {
            FilterByValue => "Filter by one value",
            NumericFilter => "Filter numeric values",
            ExtractAreaCode => "Extract area code (DDD) and number",
            FilterAgencies => "Filter agencies",
            ValidateBanks => "Validate banks",
            ValidateBankAgencyAccount => "Validate bank, agency and account",
            ValidateMobiles => "Validate mobile numbers (simple)",
            ValidateMobileColumns => "Validate several mobile columns",
            KeepColumns => "Keep selected columns",
            RemoveColumns => "Remove selected columns",
            FilterByValues => "Filter by several values",
            ReduceToCommonColumns => "Select common columns and reduce",
            DedupCpfsAcrossFiles => "Deduplicate CPFs across files",
            UnifyCsvInChunks => "Unify CSVs in blocks of 1 million rows",
            RemoveListedCpfs => "Remove CPFs listed in another file",
            RemoveByName => "Remove by name",
            FilterPhoneNumbers => "Remove landlines and empty phones",
            DeleteEmptyRows => "Remove rows with empty cells",
            BlankBlacklistedPhones => "Remove blacklisted numbers (by CPF)",
            SplitCpfBlacklist => "Split CPFs by blacklist",
            DedupByCpf => "Remove duplicates by CPF",
            ApplyPhoneBlacklist => "Apply mobile blacklist (CPF + phone)",
            DedupByPhone => "Remove duplicates by phone",
            RemoveUpagBlacklist => "Remove rows with blacklisted UPAG",
            UnifyFolderByCpf => "Unify folder files without repeating CPF",
            JoinByCpf => "Join two files by CPF",
            EnrichByCpf => "Add data to CPFs from search files",
            ConcatenateFolder => "Concatenate every spreadsheet in a folder",
            MergeAreaCodeAndNumber => "Merge DDD and number columns",
            MergeFolderToCsv => "Merge folder files into one CSV",
            PadCpfs => "Pad CPFs to 11 digits",
            FormatMoney => "Format values as money",
            AddCountryPrefix => "Add '55' prefix to numbers",
            FormatRgs => "Filter and format RGs",
            FormatBenefits => "Format benefit file",
            ValidateAddressNumbers => "Validate address numbers",
            ValidateSexColumn => "Validate sex column",
            FormatAgencyColumn => "Format agency column",
            InsertMobileNine => "Format mobile numbers missing the '9'",
            TrimToElevenDigits => "Format mobile numbers to 11 digits",
            AddAgeColumn => "Add age column",
            RemoveCountryPrefix => "Remove '55' prefix from phone columns",
            CheckPhonesByCpf => "Check phone × CPF",
            MapColumns => "Map columns onto a model file",
            FormatDates => "Format a date column",
            ValidateCeps => "Look up and validate CEPs",
        }
    }

    pub fn run(&self, ctx: &mut ActionContext) -> Result<ActionReport> {
        use Action::*;
        match self {
            FilterByValue => filters::filter_by_value(ctx),
            NumericFilter => filters::numeric_filter(ctx),
            ExtractAreaCode => filters::extract_area_code(ctx),
            FilterAgencies => filters::filter_agencies(ctx),
            ValidateBanks => filters::validate_banks(ctx),
            ValidateBankAgencyAccount => filters::validate_bank_agency_account(ctx),
            ValidateMobiles => filters::validate_mobiles(ctx),
            ValidateMobileColumns => filters::validate_mobile_columns(ctx),
            KeepColumns => filters::keep_columns(ctx),
            RemoveColumns => filters::remove_columns(ctx),
            FilterByValues => filters::filter_by_values(ctx),
            ReduceToCommonColumns => folders::reduce_to_common_columns(ctx),
            DedupCpfsAcrossFiles => folders::dedup_cpfs_across_files(ctx),
            UnifyCsvInChunks => folders::unify_csv_in_chunks(ctx),
            RemoveListedCpfs => removals::remove_listed_cpfs(ctx),
            RemoveByName => removals::remove_by_name(ctx),
            FilterPhoneNumbers => removals::filter_phone_numbers(ctx),
            DeleteEmptyRows => removals::delete_empty_rows(ctx),
            BlankBlacklistedPhones => removals::blank_blacklisted_phones(ctx),
            SplitCpfBlacklist => removals::split_cpf_blacklist(ctx),
            DedupByCpf => removals::dedup_by_cpf(ctx),
            ApplyPhoneBlacklist => removals::apply_phone_blacklist(ctx),
            DedupByPhone => removals::dedup_by_phone(ctx),
            RemoveUpagBlacklist => removals::remove_upag_blacklist(ctx),
            UnifyFolderByCpf => folders::unify_folder_by_cpf(ctx),
            JoinByCpf => merges::join_by_cpf(ctx),
            EnrichByCpf => merges::enrich_by_cpf(ctx),
            ConcatenateFolder => folders::concatenate_folder(ctx),
            MergeAreaCodeAndNumber => merges::merge_area_code_and_number(ctx),
            MergeFolderToCsv => folders::merge_folder_to_csv(ctx),
            PadCpfs => formatting::pad_cpfs(ctx),
            FormatMoney => formatting::format_money(ctx),
            AddCountryPrefix => formatting::add_country_prefix(ctx),
            FormatRgs => formatting::format_rgs(ctx),
            FormatBenefits => formatting::format_benefits(ctx),
            ValidateAddressNumbers => formatting::validate_address_numbers(ctx),
            ValidateSexColumn => formatting::validate_sex_column(ctx),
            FormatAgencyColumn => formatting::format_agency_column(ctx),
            InsertMobileNine => formatting::insert_mobile_nine(ctx),
            TrimToElevenDigits => formatting::trim_to_eleven_digits(ctx),
            AddAgeColumn => formatting::add_age_column(ctx),
            RemoveCountryPrefix => formatting::remove_country_prefix(ctx),
            CheckPhonesByCpf => merges::check_phones_by_cpf(ctx),
            MapColumns => merges::map_columns(ctx),
            FormatDates => formatting::format_dates(ctx),
            ValidateCeps => postal::validate_ceps(ctx),
        }
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================
