// 🗂️ Menu - category loop that dispatches one action per selection
// Action failures are reported and the loop goes on; only a failing top-level prompt ends it

use crate::actions::{Action, ActionContext, Category};
use crate::cep::CepLookup;
use crate::config::AppConfig;
use crate::prompt::Prompt;
use anyhow::{anyhow, Result};
use tracing::{info, warn};

pub const EXIT: &str = "Exit";
pub const BACK: &str = "Back";

/// What happened during one menu session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuStats {
    pub completed: usize,
    pub failed: usize,
}

pub struct Menu<'a> {
    config: &'a AppConfig,
    lookup: Option<&'a dyn CepLookup>,
}

impl<'a> Menu<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Menu { config, lookup: None }
    }

    /// Builder pattern: postal-code service handed to every action
    pub fn with_lookup(mut self, lookup: &'a dyn CepLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Run until "Exit".
    ///
    /// # Returns
    /// * `Ok(MenuStats)` - the user chose "Exit"
    /// * `Err` - the category prompt itself failed (e.g. closed input)
    pub fn run(&self, prompt: &mut dyn Prompt) -> Result<MenuStats> {
        let mut stats = MenuStats::default();
        let mut options: Vec<String> = Category::all().iter().map(|c| c.name().to_string()).collect();
        options.push(EXIT.to_string());

        loop {
            println!();
            let choice = prompt.select_one("Choose a category:", &options)?;
            if choice == EXIT {
                info!(completed = stats.completed, failed = stats.failed, "menu closed");
                return Ok(stats);
            }
            let category = Category::all()
                .iter()
                .copied()
                .find(|c| c.name() == choice)
                .ok_or_else(|| anyhow!("Unknown category: {}", choice))?;

            let action = match self.pick_action(prompt, category) {
                Ok(Some(action)) => action,
                Ok(None) => continue,
                Err(err) => {
                    println!("❌ {:#}", err);
                    continue;
                }
            };

            if self.run_action(prompt, action) {
                stats.completed += 1;
            } else {
                stats.failed += 1;
            }
        }
    }

    /// Single-action categories skip the sub-menu; `None` means "Back"
    fn pick_action(&self, prompt: &mut dyn Prompt, category: Category) -> Result<Option<Action>> {
        let actions = category.actions();
        if let [only] = actions.as_slice() {
            return Ok(Some(*only));
        }

        let mut options: Vec<String> = actions.iter().map(|a| a.name().to_string()).collect();
        options.push(BACK.to_string());
        let choice = prompt.select_one(&format!("{}:", category.name()), &options)?;
        Ok(actions.into_iter().find(|a| a.name() == choice))
    }

    /// Run one action and print its report or its error
    fn run_action(&self, prompt: &mut dyn Prompt, action: Action) -> bool {
        println!("\n━━━ {} ━━━", action.name());
        let mut ctx = ActionContext::new(prompt, self.config);
        if let Some(lookup) = self.lookup {
            ctx = ctx.with_lookup(lookup);
        }

        match action.run(&mut ctx) {
            Ok(report) => {
                info!(action = action.name(), outputs = report.outputs.len(), "action completed");
                println!("\n{}", report.summary());
                true
            }
            Err(err) => {
                warn!(action = action.name(), error = %err, "action failed");
                println!("❌ {}: {:#}", action.name(), err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{column, dir_text, read, write_csv};
    use crate::prompt::{Answer, ScriptedPrompt};
    use tempfile::TempDir;

    fn run_script(answers: Vec<Answer>) -> Result<MenuStats> {
        let config = AppConfig::default();
        let mut prompt = ScriptedPrompt::new(answers);
        Menu::new(&config).run(&mut prompt)
    }

    #[test]
    fn test_exit_right_away() {
        let stats = run_script(vec![Answer::choose(EXIT)]).unwrap();
        assert_eq!(stats, MenuStats::default());
    }

    #[test]
    fn test_back_returns_to_categories() {
        let stats = run_script(vec![
            Answer::choose("Single filters"),
            Answer::choose(BACK),
            Answer::choose(EXIT),
        ])
        .unwrap();
        assert_eq!(stats.completed + stats.failed, 0);
    }

    #[test]
    fn test_action_error_keeps_the_loop_alive() {
        let stats = run_script(vec![
            Answer::choose("Date formatting"),
            Answer::text("/no/such/file.csv"),
            Answer::choose(EXIT),
        ])
        .unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
    }

    #[test]
    fn test_closed_input_at_top_level_is_error() {
        assert!(run_script(vec![]).is_err());
    }

    #[test]
    fn test_single_action_category_runs_directly() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "datas.csv", &["nome;data", "Ana;2024-03-07", "Bia;x"]);
        let stats = run_script(vec![
            Answer::choose("Date formatting"),
            Answer::text(dir_text(&path)),
            Answer::choose("data"),
            Answer::text(dir_text(dir.path())),
            Answer::choose(EXIT),
        ])
        .unwrap();
        assert_eq!(stats.completed, 1);
        let out = read(&dir.path().join("data_formatada_datas.csv"));
        assert_eq!(column(&out, "data"), vec!["07/03/2024", ""]);
    }

    #[test]
    fn test_sub_menu_runs_the_chosen_action() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "base.csv", &["cpf;nome", "1;a", "001;b", "2;c"]);
        let stats = run_script(vec![
            Answer::choose("Removals"),
            Answer::choose("Remove duplicates by CPF"),
            Answer::text(dir_text(&path)),
            Answer::choose("cpf"),
            Answer::text(dir_text(dir.path())),
            Answer::choose(EXIT),
        ])
        .unwrap();
        assert_eq!(stats.completed, 1);
        let out = read(&dir.path().join("sem_duplicatas_base.csv"));
        assert_eq!(column(&out, "nome"), vec!["a", "c"]);
    }
}
