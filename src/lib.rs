// Record Cleaner - Core Library
// Exposes every module so the CLI menu and the tests drive the same actions

pub mod actions;
pub mod cep;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod matcher;
pub mod menu;
pub mod normalize;
pub mod output;
pub mod progress;
pub mod prompt;
pub mod table;

// Re-export commonly used types
pub use actions::{Action, ActionContext, ActionReport, Category};
pub use cep::{clean_cep, Address, CepLookup, OpenCepClient};
pub use config::AppConfig;
pub use error::RecordError;
pub use loader::{ContainerFormat, LoadedSource, Loader, TextEncoding};
pub use logging::{init_console_logging, LookupLog};
pub use matcher::{CrossFileMatcher, MatchPartition, ReferenceIndex};
pub use menu::{Menu, MenuStats};
pub use normalize::{
    add_country_prefix, digits_only, format_identifier, insert_mobile_nine, is_valid_phone_digits,
    normalize_identifier, strip_country_prefix, trim_to_eleven, KeyNormalization,
};
pub use output::{CsvOptions, OutputPlan};
pub use prompt::{Answer, LinePrompt, Prompt, ScriptedPrompt};
pub use table::{Cell, ColumnRef, Table};

#[cfg(feature = "tui")]
pub use prompt::TerminalPrompt;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
