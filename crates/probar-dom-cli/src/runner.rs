//! Command execution. Each command renders its output to a string so `main`
//! owns all printing.

use std::collections::BTreeMap;
use std::path::Path;

use probar_dom::{
    pretty_dom, pretty_roles, within_with_config, Config, Document, LabelTextQuery, Matcher,
    MatchQuery, MatcherOptions, Node, PrettyDomOptions, Queries, RoleQuery, TextQuery,
};
use regex::Regex;
use serde::Serialize;

use crate::commands::{
    Cli, Commands, DebugArgs, OutputFormat, QueryArgs, QueryKind, RolesArgs,
};
use crate::error::{CliError, CliResult};

/// JSON view of one matched element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementSummary {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes, sorted by name
    pub attributes: BTreeMap<String, String>,
    /// Whitespace-normalized text content
    pub text: String,
}

impl ElementSummary {
    fn of(node: &Node) -> Self {
        Self {
            tag: node.tag_name().unwrap_or_default(),
            attributes: node.attributes().into_iter().collect(),
            text: probar_dom::normalize(&node.text_content(), true, true),
        }
    }
}

/// Effective config: `--config` file or the environment defaults, then flag overrides
pub fn load_config(cli: &Cli) -> CliResult<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Config::from_json(&raw).map_err(|e| {
                CliError::config(format!("{}: {e}", path.display()))
            })?
        }
        None => Config::from_env(),
    };
    if let Some(attribute) = &cli.test_id_attribute {
        if attribute.trim().is_empty() {
            return Err(CliError::invalid_argument("test id attribute must not be empty"));
        }
        config.test_id_attribute.clone_from(attribute);
    }
    if let Some(limit) = cli.print_limit {
        config.debug_print_limit = limit;
    }
    tracing::debug!(test_id_attribute = %config.test_id_attribute, "config loaded");
    Ok(config)
}

/// Run the selected command and return what should go to stdout
pub fn execute(cli: &Cli) -> CliResult<String> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::Debug(args) => run_debug(&config, args),
        Commands::Query(args) => run_query(&config, args),
        Commands::Roles(args) => run_roles(args),
        Commands::Config => Ok(config.to_json()?),
    }
}

fn load_document(path: &Path) -> CliResult<Document> {
    let html = std::fs::read_to_string(path)?;
    let document = Document::parse(&html);
    tracing::info!(path = %path.display(), nodes = document.node_count(), "document loaded");
    Ok(document)
}

fn run_debug(config: &Config, args: &DebugArgs) -> CliResult<String> {
    let document = load_document(&args.file)?;
    let target = match &args.selector {
        Some(selector) => document.root().query_selector(selector)?.ok_or_else(|| {
            CliError::invalid_argument(format!("no element matches selector '{selector}'"))
        })?,
        None => document.root(),
    };
    let mut options = PrettyDomOptions::from_config(config).with_filter_comments(!args.comments);
    if let Some(depth) = args.max_depth {
        options = options.with_max_depth(depth);
    }
    Ok(pretty_dom(&target, &options))
}

fn run_roles(args: &RolesArgs) -> CliResult<String> {
    let document = load_document(&args.file)?;
    Ok(pretty_roles(&document.body(), args.hidden))
}

fn build_matcher(value: &str, regex: bool) -> CliResult<Matcher> {
    if regex {
        let compiled = Regex::new(value)
            .map_err(|e| CliError::invalid_argument(format!("invalid regex '{value}': {e}")))?;
        return Ok(Matcher::from(compiled));
    }
    Ok(Matcher::from(value))
}

fn run_query(config: &Config, args: &QueryArgs) -> CliResult<String> {
    let document = load_document(&args.file)?;
    let queries = within_with_config(&document.body(), config.clone());
    let found = run_family(&queries, args)?;
    tracing::info!(kind = ?args.by, matches = found.len(), "query finished");
    render(config, &found, args.format)
}

fn run_family(queries: &Queries, args: &QueryArgs) -> CliResult<Vec<Node>> {
    let options = MatcherOptions::default().exact(!args.no_exact);
    let matcher = build_matcher(&args.value, args.regex)?;
    let plain = || MatchQuery::new(matcher.clone()).with_options(options.clone());

    macro_rules! run {
        ($all:ident, $one:ident, $query:expr) => {
            if args.all {
                queries.$all($query)?
            } else {
                vec![queries.$one($query)?]
            }
        };
    }

    let found = match args.by {
        QueryKind::Role => {
            let mut query = RoleQuery::new(args.value.clone()).hidden(args.hidden);
            if let Some(name) = &args.name {
                query = query.name(build_matcher(name, args.regex)?);
            }
            if let Some(level) = args.level {
                query = query.level(level);
            }
            run!(get_all_by_role, get_by_role, query)
        }
        QueryKind::Text => {
            let mut query = TextQuery::new(matcher.clone()).with_options(options.clone());
            if let Some(selector) = &args.selector {
                query = query.selector(selector.clone());
            }
            run!(get_all_by_text, get_by_text, query)
        }
        QueryKind::LabelText => {
            let mut query = LabelTextQuery::new(matcher.clone()).with_options(options.clone());
            if let Some(selector) = &args.selector {
                query = query.selector(selector.clone());
            }
            run!(get_all_by_label_text, get_by_label_text, query)
        }
        QueryKind::PlaceholderText => {
            run!(get_all_by_placeholder_text, get_by_placeholder_text, plain())
        }
        QueryKind::AltText => run!(get_all_by_alt_text, get_by_alt_text, plain()),
        QueryKind::Title => run!(get_all_by_title, get_by_title, plain()),
        QueryKind::DisplayValue => run!(get_all_by_display_value, get_by_display_value, plain()),
        QueryKind::TestId => run!(get_all_by_test_id, get_by_test_id, plain()),
    };
    Ok(found)
}

fn render(config: &Config, found: &[Node], format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Text => {
            let options = PrettyDomOptions::from_config(config);
            Ok(found
                .iter()
                .map(|node| pretty_dom(node, &options))
                .collect::<Vec<_>>()
                .join("\n\n"))
        }
        OutputFormat::Json => {
            let summaries: Vec<ElementSummary> = found.iter().map(ElementSummary::of).collect();
            Ok(serde_json::to_string_pretty(&summaries)?)
        }
    }
}
