// 💬 Prompt - user interaction behind a trait so actions run headless in tests
// Three implementations: scripted (tests), line-based (stdin), terminal (ratatui)

use crate::output::resolve_output_dir;
use crate::table::{ColumnRef, Table};
use anyhow::{anyhow, bail, Result};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

// ============================================================================
// PROMPT TRAIT
// ============================================================================

/// Every question an action can ask.
///
/// An `Err` means the interaction itself failed (closed input, cancelled
/// selection, exhausted script); the action aborts and control returns to
/// the menu.
pub trait Prompt {
    /// Pick exactly one of `options`; returns the chosen option text
    fn select_one(&mut self, message: &str, options: &[String]) -> Result<String>;

    /// Pick any subset of `options`, in option order
    fn select_many(&mut self, message: &str, options: &[String]) -> Result<Vec<String>>;

    /// Free text, trimmed
    fn ask_text(&mut self, message: &str) -> Result<String>;

    /// Yes/no; an empty answer takes `default`
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
}

// ============================================================================
// SCRIPTED PROMPT
// ============================================================================

/// One pre-recorded answer
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Choose(String),
    ChooseMany(Vec<String>),
    Text(String),
    Confirm(bool),
}

impl Answer {
    pub fn choose(option: &str) -> Self {
        Answer::Choose(option.to_string())
    }

    pub fn choose_many(options: &[&str]) -> Self {
        Answer::ChooseMany(options.iter().map(|o| o.to_string()).collect())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Answer::Text(text.into())
    }
}

/// Answers questions from a queue; any unexpected question is an error
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<Answer>,

    /// Every message asked, in order
    pub asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: Vec<Answer>) -> Self {
        ScriptedPrompt {
            answers: answers.into(),
            asked: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, message: &str) -> Result<Answer> {
        self.asked.push(message.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("No scripted answer left for: {}", message))
    }
}

impl Prompt for ScriptedPrompt {
    fn select_one(&mut self, message: &str, options: &[String]) -> Result<String> {
        match self.next(message)? {
            Answer::Choose(choice) if options.contains(&choice) => Ok(choice),
            Answer::Choose(choice) => bail!("'{}' is not one of the options for: {}", choice, message),
            other => bail!("Expected a choice for '{}', script has {:?}", message, other),
        }
    }

    fn select_many(&mut self, message: &str, options: &[String]) -> Result<Vec<String>> {
        match self.next(message)? {
            Answer::ChooseMany(choices) => {
                if let Some(bad) = choices.iter().find(|c| !options.contains(*c)) {
                    bail!("'{}' is not one of the options for: {}", bad, message);
                }
                Ok(options.iter().filter(|o| choices.contains(*o)).cloned().collect())
            }
            other => bail!("Expected several choices for '{}', script has {:?}", message, other),
        }
    }

    fn ask_text(&mut self, message: &str) -> Result<String> {
        match self.next(message)? {
            Answer::Text(text) => Ok(text.trim().to_string()),
            other => bail!("Expected text for '{}', script has {:?}", message, other),
        }
    }

    fn confirm(&mut self, message: &str, _default: bool) -> Result<bool> {
        match self.next(message)? {
            Answer::Confirm(yes) => Ok(yes),
            other => bail!("Expected yes/no for '{}', script has {:?}", message, other),
        }
    }
}

// ============================================================================
// LINE PROMPT
// ============================================================================

/// Numbered-list prompt over any reader/writer pair
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl LinePrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        LinePrompt::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        LinePrompt { input, output }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("Input closed");
        }
        Ok(line.trim().to_string())
    }

    fn print_options(&mut self, message: &str, options: &[String]) -> Result<()> {
        writeln!(self.output, "? {}", message)?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {:>2}) {}", i + 1, option)?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn select_one(&mut self, message: &str, options: &[String]) -> Result<String> {
        if options.is_empty() {
            bail!("Nothing to choose for: {}", message);
        }
        self.print_options(message, options)?;
        loop {
            write!(self.output, "  number: ")?;
            self.output.flush()?;
            let line = self.read_line()?;
            match line.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(options[n - 1].clone()),
                _ => writeln!(self.output, "  ❌ choose a number from 1 to {}", options.len())?,
            }
        }
    }

    fn select_many(&mut self, message: &str, options: &[String]) -> Result<Vec<String>> {
        self.print_options(message, options)?;
        loop {
            write!(self.output, "  numbers (comma or space separated, empty for none): ")?;
            self.output.flush()?;
            let line = self.read_line()?;
            let picked: Result<Vec<usize>, _> = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .map(|p| p.parse::<usize>())
                .collect();
            match picked {
                Ok(numbers) if numbers.iter().all(|n| (1..=options.len()).contains(n)) => {
                    return Ok(options
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| numbers.contains(&(i + 1)))
                        .map(|(_, o)| o.clone())
                        .collect());
                }
                _ => writeln!(self.output, "  ❌ use numbers from 1 to {}", options.len())?,
            }
        }
    }

    fn ask_text(&mut self, message: &str) -> Result<String> {
        write!(self.output, "? {} ", message)?;
        self.output.flush()?;
        self.read_line()
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            write!(self.output, "? {} {} ", message, hint)?;
            self.output.flush()?;
            let line = self.read_line()?.to_lowercase();
            match line.as_str() {
                "" => return Ok(default),
                "y" | "yes" | "s" | "sim" => return Ok(true),
                "n" | "no" | "nao" | "não" => return Ok(false),
                _ => writeln!(self.output, "  ❌ answer y or n")?,
            }
        }
    }
}

// ============================================================================
// TERMINAL PROMPT (arrow-key lists)
// ============================================================================

#[cfg(feature = "tui")]
pub use terminal::TerminalPrompt;

#[cfg(feature = "tui")]
mod terminal {
    use super::{LinePrompt, Prompt};
    use anyhow::{bail, Result};
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
        terminal::{disable_raw_mode, enable_raw_mode},
    };
    use ratatui::{
        backend::CrosstermBackend,
        style::{Color, Modifier, Style},
        widgets::{Block, Borders, List, ListItem, ListState},
        Terminal, TerminalOptions, Viewport,
    };
    use std::io;

    const MAX_VISIBLE: usize = 15;

    /// Select lists drawn inline with ratatui; text and yes/no stay line-based
    pub struct TerminalPrompt {
        line: LinePrompt<io::StdinLock<'static>, io::Stdout>,
    }

    impl TerminalPrompt {
        pub fn new() -> Self {
            TerminalPrompt {
                line: LinePrompt::stdio(),
            }
        }
    }

    impl Default for TerminalPrompt {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Prompt for TerminalPrompt {
        fn select_one(&mut self, message: &str, options: &[String]) -> Result<String> {
            if options.is_empty() {
                bail!("Nothing to choose for: {}", message);
            }
            let picked = run_select(message, options, false)?;
            let choice = picked
                .first()
                .map(|&i| options[i].clone())
                .ok_or_else(|| anyhow::anyhow!("Nothing selected for: {}", message))?;
            println!("? {} › {}", message, choice);
            Ok(choice)
        }

        fn select_many(&mut self, message: &str, options: &[String]) -> Result<Vec<String>> {
            if options.is_empty() {
                return Ok(Vec::new());
            }
            let picked = run_select(message, options, true)?;
            let choices: Vec<String> = picked.into_iter().map(|i| options[i].clone()).collect();
            println!("? {} › {}", message, choices.join(", "));
            Ok(choices)
        }

        fn ask_text(&mut self, message: &str) -> Result<String> {
            self.line.ask_text(message)
        }

        fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
            self.line.confirm(message, default)
        }
    }

    /// Draw the list until Enter; returns selected indices in option order
    fn run_select(message: &str, options: &[String], multi: bool) -> Result<Vec<usize>> {
        enable_raw_mode()?;
        let height = options.len().min(MAX_VISIBLE) as u16 + 2;
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Inline(height),
            },
        );

        let res = match terminal {
            Ok(mut terminal) => {
                let res = select_loop(&mut terminal, message, options, multi);
                let _ = terminal.clear();
                res
            }
            Err(err) => Err(err.into()),
        };

        disable_raw_mode()?;
        res
    }

    fn select_loop<B: ratatui::backend::Backend>(
        terminal: &mut Terminal<B>,
        message: &str,
        options: &[String],
        multi: bool,
    ) -> Result<Vec<usize>> {
        let mut state = ListState::default();
        state.select(Some(0));
        let mut checked = vec![false; options.len()];
        let hint = if multi {
            "space: mark · enter: done"
        } else {
            "enter: choose"
        };

        loop {
            terminal.draw(|f| {
                let items: Vec<ListItem> = options
                    .iter()
                    .enumerate()
                    .map(|(i, o)| {
                        let text = if multi {
                            format!("[{}] {}", if checked[i] { "x" } else { " " }, o)
                        } else {
                            o.clone()
                        };
                        ListItem::new(text)
                    })
                    .collect();
                let list = List::new(items)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(Color::Cyan))
                            .title(format!(" {} ({}) ", message, hint)),
                    )
                    .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
                    .highlight_symbol("> ");
                f.render_stateful_widget(list, f.size(), &mut state);
            })?;

            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let current = state.selected().unwrap_or(0);
                match key.code {
                    KeyCode::Down | KeyCode::Char('j') => state.select(Some((current + 1) % options.len())),
                    KeyCode::Up | KeyCode::Char('k') => {
                        state.select(Some((current + options.len() - 1) % options.len()))
                    }
                    KeyCode::Char(' ') if multi => checked[current] = !checked[current],
                    KeyCode::Enter if multi => {
                        return Ok((0..options.len()).filter(|&i| checked[i]).collect());
                    }
                    KeyCode::Enter => return Ok(vec![current]),
                    KeyCode::Esc => bail!("Selection cancelled"),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        bail!("Selection cancelled")
                    }
                    _ => {}
                }
            }
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Pick one column of `table`; the answer is resolved against the header
pub fn select_column(prompt: &mut dyn Prompt, table: &Table, message: &str) -> Result<ColumnRef> {
    let choice = prompt.select_one(message, table.columns())?;
    Ok(table.column(&choice)?)
}

/// Pick one or more columns at once
pub fn select_columns(prompt: &mut dyn Prompt, table: &Table, message: &str) -> Result<Vec<ColumnRef>> {
    let choices = prompt.select_many(message, table.columns())?;
    if choices.is_empty() {
        bail!("No column selected");
    }
    choices
        .iter()
        .map(|c| table.column(c).map_err(Into::into))
        .collect()
}

/// One column, then more while the user says yes; a column is offered only once
pub fn select_columns_loop(
    prompt: &mut dyn Prompt,
    table: &Table,
    message: &str,
    more_message: &str,
) -> Result<Vec<ColumnRef>> {
    let mut picked = vec![select_column(prompt, table, message)?];
    loop {
        let remaining: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| !picked.iter().any(|p| p.name() == c.as_str()))
            .cloned()
            .collect();
        if remaining.is_empty() || !prompt.confirm(more_message, false)? {
            break;
        }
        let choice = prompt.select_one(message, &remaining)?;
        picked.push(table.column(&choice)?);
    }
    Ok(picked)
}

/// User-typed path without surrounding spaces or quotes
pub fn clean_path(text: &str) -> PathBuf {
    PathBuf::from(text.trim().trim_matches(|c| c == '"' || c == '\''))
}

pub fn ask_existing_file(prompt: &mut dyn Prompt, message: &str) -> Result<PathBuf> {
    let path = clean_path(&prompt.ask_text(message)?);
    if !path.is_file() {
        bail!("File not found: {}", path.display());
    }
    Ok(path)
}

pub fn ask_existing_dir(prompt: &mut dyn Prompt, message: &str) -> Result<PathBuf> {
    let path = clean_path(&prompt.ask_text(message)?);
    if !path.is_dir() {
        bail!("Folder not found: {}", path.display());
    }
    Ok(path)
}

pub fn ask_output_dir(prompt: &mut dyn Prompt) -> Result<PathBuf> {
    let text = prompt.ask_text("Output folder:")?;
    Ok(resolve_output_dir(clean_path(&text).to_string_lossy().as_ref())?)
}

/// Number with either '.' or ',' as decimal separator
pub fn ask_number(prompt: &mut dyn Prompt, message: &str) -> Result<f64> {
    let text = prompt.ask_text(message)?;
    parse_number(&text).ok_or_else(|| anyhow!("Not a number: {}", text))
}

pub fn parse_number(text: &str) -> Option<f64> {
    let t = text.trim();
    t.parse::<f64>()
        .ok()
        .or_else(|| t.replace(',', ".").parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Show the first filled value of a column and ask the user to confirm it
pub fn confirm_with_example(
    prompt: &mut dyn Prompt,
    table: &Table,
    column: &ColumnRef,
    message: &str,
) -> Result<bool> {
    match table.first_non_blank(column) {
        Some(example) => {
            println!("   Example from '{}': {}", column.name(), example.trim());
            prompt.confirm(message, true)
        }
        None => {
            println!("   ⚠️  Column '{}' has no filled value to show", column.name());
            Ok(true)
        }
    }
}
