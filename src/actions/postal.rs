// 📮 CEP validation - clean postal codes, look each one up, fill the address
// Lookups run one row at a time; failures are logged and the row goes to the invalid output

use super::{ActionContext, ActionReport};
use crate::cep::{clean_cep, Address, CepLookup, OpenCepClient};
use crate::logging::LookupLog;
use crate::output::{prefixed, OutputPlan};
use crate::progress::row_progress;
use crate::prompt::select_column;
use crate::table::{ColumnRef, Table};
use anyhow::Result;
use indicatif::ProgressBar;
use std::time::Duration;
use tracing::debug;

/// Columns that receive the address of a found CEP
#[derive(Debug, Clone)]
pub struct AddressColumns {
    pub street: ColumnRef,
    pub district: ColumnRef,
    pub city: ColumnRef,
    pub state: ColumnRef,
}

impl AddressColumns {
    /// Service values replace the row's values; missing or blank ones leave them alone
    fn fill(&self, table: &mut Table, row: usize, address: &Address) {
        let pairs = [
            (&self.street, &address.logradouro),
            (&self.district, &address.bairro),
            (&self.city, &address.localidade),
            (&self.state, &address.uf),
        ];
        for (column, value) in pairs {
            if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                table.set(row, column, Some(v.to_string()));
            }
        }
    }
}

/// Result of validating every row
#[derive(Debug, Default)]
pub struct CepOutcome {
    pub valid: Table,
    pub invalid: Table,
    pub malformed: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// Validate and enrich every row.
///
/// # Arguments
/// * `table` - rows to check; found rows come out with the cleaned code and address
/// * `cep` - postal-code column
/// * `fields` - address columns to fill
/// * `lookup` - remote service
/// * `log` - sink for lookup failures
/// * `bar` - advanced once per row
///
/// # Returns
/// * `CepOutcome` - valid and invalid rows in original order, plus counts
pub fn validate_cep_rows(
    table: &Table,
    cep: &ColumnRef,
    fields: &AddressColumns,
    lookup: &dyn CepLookup,
    log: &LookupLog,
    bar: &ProgressBar,
) -> CepOutcome {
    let mut enriched = table.clone();
    let mut outcome = CepOutcome::default();
    let mut valid_rows = Vec::new();
    let mut invalid_rows = Vec::new();

    for row in 0..table.len() {
        bar.inc(1);
        let Some(code) = table.get(row, cep).and_then(clean_cep) else {
            outcome.malformed += 1;
            invalid_rows.push(row);
            continue;
        };

        match lookup.lookup(&code) {
            Ok(Some(address)) => {
                enriched.set(row, cep, Some(code));
                fields.fill(&mut enriched, row, &address);
                valid_rows.push(row);
            }
            Ok(None) => {
                debug!(cep = %code, "CEP not found");
                outcome.not_found += 1;
                invalid_rows.push(row);
            }
            Err(err) => {
                log.warn(&format!("CEP {} lookup failed: {}", code, err));
                outcome.failed += 1;
                invalid_rows.push(row);
            }
        }
    }

    outcome.valid = enriched.subset(&valid_rows);
    outcome.invalid = table.subset(&invalid_rows);
    outcome
}

pub fn validate_ceps(ctx: &mut ActionContext) -> Result<ActionReport> {
    let source = ctx.load_file("File with CEPs (.xlsx or .csv):")?;
    let table = &source.table;
    let cep = select_column(ctx.prompt, table, "CEP column:")?;
    let fields = AddressColumns {
        street: select_column(ctx.prompt, table, "Street column:")?,
        district: select_column(ctx.prompt, table, "District column:")?,
        city: select_column(ctx.prompt, table, "City column:")?,
        state: select_column(ctx.prompt, table, "State column:")?,
    };
    let dir = ctx.output_dir()?;

    let log = LookupLog::open(&ctx.config.log_file)?;
    log.info(&format!("CEP validation started: {}", source.file_name()));

    let owned_client;
    let lookup: &dyn CepLookup = match ctx.lookup {
        Some(lookup) => lookup,
        None => {
            owned_client = OpenCepClient::new(
                &ctx.config.cep_base_url,
                Duration::from_secs(ctx.config.cep_timeout_secs),
            )?;
            &owned_client
        }
    };

    let bar = row_progress(table.len(), "looking up CEPs");
    let outcome = validate_cep_rows(table, &cep, &fields, lookup, &log, &bar);
    bar.finish_with_message("done");
    log.info(&format!(
        "CEP validation finished: {} valid, {} malformed, {} not found, {} failed",
        outcome.valid.len(),
        outcome.malformed,
        outcome.not_found,
        outcome.failed
    ));
    if outcome.failed > 0 {
        println!("   ⚠️  {} lookups failed, see {}", outcome.failed, log.path().display());
    }

    let (valid_rows, invalid_rows) = (outcome.valid.len(), outcome.invalid.len());
    let mut plan = OutputPlan::new();
    plan.protect(&source.path);
    plan.add(prefixed(&dir, "cep_validos_", &source.path), outcome.valid);
    plan.add(prefixed(&dir, "cep_invalidos_", &source.path), outcome.invalid);

    ActionReport::new("Look up and validate CEPs")
        .count("Rows", table.len())
        .count("Valid CEPs", valid_rows)
        .count("Invalid rows", invalid_rows)
        .count("Malformed", outcome.malformed)
        .count("Not found", outcome.not_found)
        .count("Lookup errors", outcome.failed)
        .commit(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{column, dir_text, read, write_csv};
    use crate::config::AppConfig;
    use crate::error::RecordError;
    use crate::prompt::{Answer, ScriptedPrompt};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Known codes answer with an address, "99999999" fails, the rest are not found
    struct FakeLookup {
        known: HashMap<String, Address>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeLookup {
        fn new() -> Self {
            let mut known = HashMap::new();
            known.insert(
                "01001000".to_string(),
                Address {
                    logradouro: Some("Praça da Sé".to_string()),
                    bairro: Some("Sé".to_string()),
                    localidade: Some("São Paulo".to_string()),
                    uf: Some("SP".to_string()),
                },
            );
            known.insert(
                "20040002".to_string(),
                Address {
                    logradouro: None,
                    bairro: Some("Centro".to_string()),
                    localidade: Some("Rio de Janeiro".to_string()),
                    uf: Some("RJ".to_string()),
                },
            );
            FakeLookup {
                known,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CepLookup for FakeLookup {
        fn lookup(&self, cep: &str) -> Result<Option<Address>, RecordError> {
            self.calls.borrow_mut().push(cep.to_string());
            if cep == "99999999" {
                return Err(RecordError::RemoteLookup {
                    key: cep.to_string(),
                    reason: "timed out".to_string(),
                });
            }
            Ok(self.known.get(cep).cloned())
        }
    }

    fn create_fixture(dir: &TempDir) -> std::path::PathBuf {
        write_csv(
            dir.path(),
            "enderecos.csv",
            &[
                "cep;rua;bairro;cidade;uf",
                "01001-000;;;;",
                "20040002;Rua antiga;;;",
                "123;x;;;",
                "88888888;y;;;",
                "99999999;z;;;",
            ],
        )
    }

    #[test]
    fn test_validate_ceps_end_to_end() {
        let dir = TempDir::new().unwrap();
        let path = create_fixture(&dir);
        let mut config = AppConfig::default();
        config.log_file = dir.path().join("app.log");

        let fake = FakeLookup::new();
        let mut prompt = ScriptedPrompt::new(vec![
            Answer::text(dir_text(&path)),
            Answer::choose("cep"),
            Answer::choose("rua"),
            Answer::choose("bairro"),
            Answer::choose("cidade"),
            Answer::choose("uf"),
            Answer::text(dir_text(dir.path())),
        ]);
        let mut ctx = ActionContext::new(&mut prompt, &config).with_lookup(&fake);
        let report = validate_ceps(&mut ctx).unwrap();

        assert_eq!(report.get("Valid CEPs"), Some(2));
        assert_eq!(report.get("Malformed"), Some(1));
        assert_eq!(report.get("Not found"), Some(1));
        assert_eq!(report.get("Lookup errors"), Some(1));
        assert_eq!(fake.calls.borrow().len(), 4);

        let valid = read(&dir.path().join("cep_validos_enderecos.csv"));
        assert_eq!(column(&valid, "cep"), vec!["01001000", "20040002"]);
        assert_eq!(column(&valid, "rua"), vec!["Praça da Sé", "Rua antiga"]);
        assert_eq!(column(&valid, "uf"), vec!["SP", "RJ"]);

        let invalid = read(&dir.path().join("cep_invalidos_enderecos.csv"));
        assert_eq!(column(&invalid, "cep"), vec!["123", "88888888", "99999999"]);

        let log = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert!(log.contains("CEP 99999999 lookup failed"));
    }
}
