use anyhow::Result;
use record_cleaner::{init_console_logging, AppConfig, Menu, Prompt, VERSION};

fn main() -> Result<()> {
    init_console_logging();
    let config = AppConfig::load()?;

    println!("🧹 Record Cleaner v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut prompt = make_prompt();
    let stats = Menu::new(&config).run(prompt.as_mut())?;

    println!("\n✅ Done: {} actions completed, {} failed", stats.completed, stats.failed);
    Ok(())
}

#[cfg(feature = "tui")]
fn make_prompt() -> Box<dyn Prompt> {
    Box::new(record_cleaner::TerminalPrompt::new())
}

#[cfg(not(feature = "tui"))]
fn make_prompt() -> Box<dyn Prompt> {
    Box::new(record_cleaner::LinePrompt::stdio())
}
