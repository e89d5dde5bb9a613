//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// probar-dom: inspect HTML fixtures and run DOM queries against them
#[derive(Parser, Debug)]
#[command(name = "probar-dom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Query config as JSON (missing fields take their defaults)
    #[arg(long, global = true, env = "PROBAR_DOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Attribute read by test id queries
    #[arg(long, global = true, env = "PROBAR_DOM_TEST_ID_ATTRIBUTE")]
    pub test_id_attribute: Option<String>,

    /// Maximum characters of markup in snapshots and error messages
    #[arg(long, global = true)]
    pub print_limit: Option<usize>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pretty-print an HTML file
    Debug(DebugArgs),

    /// Run a query against an HTML file
    ///
    /// Exits non-zero when the query finds no element, or more than one
    /// without `--all`. The error includes a snapshot of the document.
    Query(QueryArgs),

    /// List the accessible roles in an HTML file
    Roles(RolesArgs),

    /// Show the effective query configuration
    Config,
}

/// Arguments for the debug command
#[derive(Args, Debug)]
pub struct DebugArgs {
    /// HTML file to print
    pub file: PathBuf,

    /// Print only the first element matching this selector
    #[arg(short, long)]
    pub selector: Option<String>,

    /// Maximum element depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Keep comment nodes
    #[arg(long)]
    pub comments: bool,
}

/// Arguments for the query command
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct QueryArgs {
    /// HTML file to query
    pub file: PathBuf,

    /// Query kind
    #[arg(short, long, value_enum)]
    pub by: QueryKind,

    /// Text to match (the role name for `--by role`)
    pub value: String,

    /// Return every match instead of exactly one
    #[arg(short, long)]
    pub all: bool,

    /// Case-insensitive substring matching
    #[arg(long)]
    pub no_exact: bool,

    /// Treat the value as a regular expression
    #[arg(long)]
    pub regex: bool,

    /// Accessible name filter for role queries
    #[arg(long)]
    pub name: Option<String>,

    /// Heading level filter for role queries
    #[arg(long)]
    pub level: Option<u32>,

    /// Include inaccessible elements in role queries
    #[arg(long)]
    pub hidden: bool,

    /// Restrict matches to this selector (text and label queries)
    #[arg(short, long)]
    pub selector: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the roles command
#[derive(Args, Debug)]
pub struct RolesArgs {
    /// HTML file to inspect
    pub file: PathBuf,

    /// Include inaccessible elements
    #[arg(long)]
    pub hidden: bool,
}

/// Query kinds
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// ARIA role
    Role,
    /// Element text
    Text,
    /// Associated label text
    LabelText,
    /// Placeholder attribute
    PlaceholderText,
    /// Alt attribute
    AltText,
    /// Title attribute or svg title
    Title,
    /// Current value of form controls
    DisplayValue,
    /// Test id attribute
    TestId,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed markup
    #[default]
    Text,
    /// JSON summary of each match
    Json,
}
