use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use indicatif::ProgressBar;
use output::{OutputFormat, Renderer};
use progress::spinner;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};
use zoning_core::{bootstrap, AppStore, SearchStatus};
use zoning_providers::{
    registry::{canonical_state, US_STATES},
    types::{is_validated, ProviderUpdate, SearchMode, SearchParams},
};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "zoning-finder",
    version,
    about = "Find ArcGIS feature server URLs for county zoning layers using AI and search providers."
)]
struct Cli {
    /// Preferred renderer for command output.
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,
    /// Override the directory holding persisted providers and search history.
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,
    /// Settings file (TOML); defaults to ./zoning-finder.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Disable ANSI colors in CLI output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Suppress non-critical CLI output.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable progress indicators for long-running tasks.
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Search every usable provider for a county's zoning feature server.
    Search {
        #[arg(long)]
        state: String,
        #[arg(long)]
        county: String,
    },
    /// Inspect and configure search providers.
    Providers {
        #[command(subcommand)]
        command: ProviderCommand,
    },
    /// Show past searches, newest first.
    History {
        /// Maximum number of searches to display (0 = all).
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Annotate stored results.
    Results {
        #[command(subcommand)]
        command: ResultCommand,
    },
    /// List the state names accepted by `search`.
    States,
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand, Clone)]
enum ProviderCommand {
    /// List providers with their enablement and credential status.
    List,
    /// Enable, disable or re-key a provider.
    #[command(group(ArgGroup::new("toggle").args(["enable", "disable"])))]
    #[command(group(ArgGroup::new("key").args(["api_key", "clear_api_key"])))]
    Update {
        id: String,
        #[arg(long)]
        enable: bool,
        #[arg(long)]
        disable: bool,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        clear_api_key: bool,
    },
}

#[derive(Debug, Subcommand, Clone)]
enum ResultCommand {
    /// Update notes, confidence or validation of a result found in history.
    Edit {
        id: String,
        #[arg(long)]
        notes: Option<String>,
        /// New confidence between 0 and 1; re-derives `validated` unless it is given.
        #[arg(long, value_parser = parse_confidence)]
        confidence: Option<f64>,
        /// Override the validation flag (`--validated` alone means true).
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        validated: Option<bool>,
    },
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if cli.no_color {
        std::env::set_var("NO_COLOR", "1");
    }

    if let Command::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "zoning-finder", &mut std::io::stdout());
        return Ok(());
    }

    let renderer = Renderer::new(cli.format);
    if matches!(cli.command, Command::States) {
        if !cli.quiet {
            renderer.states(US_STATES)?;
        }
        return Ok(());
    }

    let settings = settings::Settings::load(cli.config.as_deref(), cli.storage_dir.clone())?;
    debug!(target: "zoning_cli", ?settings, "settings resolved");
    let store = bootstrap(settings.into_core_config()).await?;

    match cli.command.clone() {
        Command::Search { state, county } => {
            handle_search(&state, &county, &cli, &renderer, &store).await
        }
        Command::Providers { command } => {
            handle_provider_command(command, &cli, &renderer, &store).await
        }
        Command::History { limit } => {
            let history = store.search_history().await;
            if cli.quiet {
                return Ok(());
            }
            let shown = if limit == 0 {
                &history[..]
            } else {
                &history[..limit.min(history.len())]
            };
            if shown.is_empty() {
                renderer.notice("No searches recorded yet.");
                return Ok(());
            }
            renderer.history(shown)
        }
        Command::Results { command } => {
            handle_result_command(command, &cli, &renderer, &store).await
        }
        Command::States | Command::Completions { .. } => Ok(()),
    }
}

async fn handle_search(
    state: &str,
    county: &str,
    cli: &Cli,
    renderer: &Renderer,
    store: &AppStore,
) -> Result<()> {
    let state = canonical_state(state)
        .ok_or_else(|| anyhow!("unknown state `{state}`; run `zoning-finder states` for the list"))?;
    let county = county.trim();
    if county.is_empty() {
        bail!("county must not be empty");
    }

    let spinner = spinner(
        cli.progress_enabled(),
        format!("Searching for {county} County, {state} zoning services..."),
    );
    store.start_search(SearchParams::new(state, county)).await;

    if store.search_status().await == SearchStatus::Error {
        finish_spinner(spinner, None);
        let message = store
            .last_error()
            .await
            .unwrap_or_else(|| "search failed".to_string());
        bail!(message);
    }

    let results = store.search_results().await;
    finish_spinner(
        spinner,
        Some(format!("Found {} candidate service(s)", results.len())),
    );
    info!(
        target: "zoning_cli",
        state,
        county,
        results = results.len(),
        "search complete"
    );

    if cli.quiet {
        return Ok(());
    }
    renderer.search(&results, &store.provider_outcomes().await)
}

async fn handle_provider_command(
    command: ProviderCommand,
    cli: &Cli,
    renderer: &Renderer,
    store: &AppStore,
) -> Result<()> {
    match command {
        ProviderCommand::List => {
            let providers = store.providers().await;
            if cli.quiet {
                return Ok(());
            }
            renderer.providers(&providers)?;
            if !store.has_configured_providers().await {
                renderer.notice(&format!(
                    "No provider is enabled with an API key; `search` will {}.",
                    match store.mode() {
                        SearchMode::Multi => "return demo results",
                        SearchMode::TavilyOnly => "fail",
                    }
                ));
            }
        }
        ProviderCommand::Update {
            id,
            enable,
            disable,
            api_key,
            clear_api_key,
        } => {
            let mut update = ProviderUpdate::default();
            if enable {
                update = update.enabled(true);
            }
            if disable {
                update = update.enabled(false);
            }
            if let Some(key) = api_key {
                update = update.api_key(key);
            }
            if clear_api_key {
                update = update.clear_api_key();
            }
            if update.is_empty() {
                bail!("nothing to update; pass --enable, --disable, --api-key or --clear-api-key");
            }

            if !store.update_provider(&id, update).await {
                bail!("unknown provider `{id}`");
            }
            info!(target: "zoning_cli", provider = %id, "provider updated");

            if cli.quiet {
                return Ok(());
            }
            let providers = store.providers().await;
            let updated: Vec<_> = providers.into_iter().filter(|p| p.id == id).collect();
            renderer.providers(&updated)?;
        }
    }
    Ok(())
}

async fn handle_result_command(
    command: ResultCommand,
    cli: &Cli,
    renderer: &Renderer,
    store: &AppStore,
) -> Result<()> {
    match command {
        ResultCommand::Edit {
            id,
            notes,
            confidence,
            validated,
        } => {
            if notes.is_none() && confidence.is_none() && validated.is_none() {
                bail!("nothing to edit; pass --notes, --confidence or --validated");
            }
            let mut result = store
                .find_result(&id)
                .await
                .with_context(|| format!("no stored result with id `{id}`"))?;

            if let Some(notes) = notes {
                result.notes = (!notes.trim().is_empty()).then_some(notes);
            }
            if let Some(confidence) = confidence {
                result.confidence = confidence;
                result.validated = is_validated(confidence);
            }
            if let Some(validated) = validated {
                result.validated = validated;
            }

            store.save_result(result.clone()).await;
            info!(target: "zoning_cli", result = %id, "result updated");
            if !cli.quiet {
                renderer.results(std::slice::from_ref(&result))?;
            }
        }
    }
    Ok(())
}

fn parse_confidence(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("confidence must be between 0 and 1, got {value}"))
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,zoning_cli=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<ProgressBar>, message: Option<String>) {
    if let Some(progress) = spinner {
        if let Some(msg) = message {
            progress.finish_with_message(msg);
        } else {
            progress.finish_and_clear();
        }
    }
}

mod settings {
    use std::{
        path::{Path, PathBuf},
        time::Duration,
    };

    use anyhow::{Context, Result};
    use config::{Config, Environment, File};
    use serde::Deserialize;
    use zoning_core::{secrets::DEFAULT_ENV_PREFIX, CoreConfig};
    use zoning_providers::{types::SearchMode, AdapterSettings};

    /// File looked up in the working directory when `--config` is not given.
    const DEFAULT_CONFIG_FILE: &str = "zoning-finder";
    const ENV_PREFIX: &str = "ZONING_FINDER";

    /// CLI-facing settings: TOML file, then `ZONING_FINDER__*` variables, then flags.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct Settings {
        pub storage_dir: Option<PathBuf>,
        pub ephemeral: bool,
        pub mode: SearchMode,
        /// Per-provider time limit; 0 waits indefinitely.
        pub adapter_timeout_secs: u64,
        pub secret_prefix: String,
        pub adapters: AdapterSettings,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                storage_dir: None,
                ephemeral: false,
                mode: SearchMode::Multi,
                adapter_timeout_secs: 60,
                secret_prefix: DEFAULT_ENV_PREFIX.to_string(),
                adapters: AdapterSettings::default(),
            }
        }
    }

    impl Settings {
        pub fn load(config_file: Option<&Path>, storage_dir: Option<PathBuf>) -> Result<Self> {
            let file = match config_file {
                Some(path) => File::from(path).required(true),
                None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
            };
            let mut settings: Self = Config::builder()
                .add_source(file)
                .add_source(
                    Environment::with_prefix(ENV_PREFIX)
                        .prefix_separator("__")
                        .separator("__")
                        .try_parsing(true),
                )
                .build()
                .context("failed to read settings")?
                .try_deserialize()
                .context("invalid settings")?;

            if storage_dir.is_some() {
                settings.storage_dir = storage_dir;
            }
            Ok(settings)
        }

        pub fn into_core_config(self) -> CoreConfig {
            CoreConfig {
                storage_dir: self.storage_dir,
                ephemeral: self.ephemeral,
                mode: self.mode,
                adapter_timeout: (self.adapter_timeout_secs > 0)
                    .then(|| Duration::from_secs(self.adapter_timeout_secs)),
                env_prefix: self.secret_prefix,
                adapters: self.adapters,
                ..CoreConfig::default()
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use std::io::Write;

        use super::*;

        #[test]
        fn file_values_and_flags_are_layered() {
            let mut file = tempfile::Builder::new()
                .suffix(".toml")
                .tempfile()
                .expect("tempfile");
            writeln!(
                file,
                "mode = \"tavily\"\nadapter_timeout_secs = 0\n\n[adapters]\nopenai_model = \"gpt-4o-mini\""
            )
            .expect("write");

            let settings = Settings::load(Some(file.path()), Some(PathBuf::from("/tmp/zf")))
                .expect("settings load");
            assert_eq!(settings.mode, SearchMode::TavilyOnly);
            assert_eq!(settings.adapters.openai_model, "gpt-4o-mini");
            assert_eq!(settings.adapters.anthropic_model, "claude-3-opus-20240229");

            let core = settings.into_core_config();
            assert_eq!(core.storage_dir, Some(PathBuf::from("/tmp/zf")));
            assert_eq!(core.adapter_timeout, None);
        }

        #[test]
        fn defaults_match_core_defaults() {
            let core = Settings::default().into_core_config();
            let defaults = CoreConfig::default();
            assert_eq!(core.adapter_timeout, defaults.adapter_timeout);
            assert_eq!(core.env_prefix, defaults.env_prefix);
            assert_eq!(core.mode, defaults.mode);
        }
    }
}

mod output {
    use std::fmt::Write;

    use anyhow::Result;
    use clap::ValueEnum;
    use serde::Serialize;
    use serde_json::json;
    use zoning_core::SearchHistoryEntry;
    use zoning_providers::{
        types::{Provider, SearchResult},
        ProviderOutcome,
    };

    #[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
    pub enum OutputFormat {
        Json,
        Markdown,
        Table,
        Text,
    }

    /// Provider as shown to the user; the key itself is never printed.
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct ProviderView<'a> {
        id: &'a str,
        name: &'a str,
        description: &'a str,
        enabled: bool,
        api_key_required: bool,
        has_api_key: bool,
        usable: bool,
    }

    impl<'a> From<&'a Provider> for ProviderView<'a> {
        fn from(provider: &'a Provider) -> Self {
            Self {
                id: &provider.id,
                name: &provider.name,
                description: &provider.description,
                enabled: provider.enabled,
                api_key_required: provider.api_key_required,
                has_api_key: provider.credential().is_some(),
                usable: provider.is_usable(),
            }
        }
    }

    #[derive(Copy, Clone, Debug)]
    pub struct Renderer {
        format: OutputFormat,
    }

    impl Renderer {
        pub fn new(format: OutputFormat) -> Self {
            Self { format }
        }

        pub fn results(&self, results: &[SearchResult]) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    let payload = json!({ "results": results });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => {
                    println!("| Title | URL | Provider | Confidence | Validated |");
                    println!("| --- | --- | --- | --- | --- |");
                    for result in results {
                        println!(
                            "| {} | <{}> | {} | {:.2} | {} |",
                            sanitize(&result.title),
                            result.url,
                            result.provider,
                            result.confidence,
                            yes_no(result.validated)
                        );
                    }
                }
                OutputFormat::Table => {
                    let rows: Vec<Vec<String>> = results
                        .iter()
                        .map(|result| {
                            vec![
                                result.id.clone(),
                                result.provider.clone(),
                                format!("{:.2}", result.confidence),
                                yes_no(result.validated).to_string(),
                                truncate(&sanitize(&result.title), 40),
                                result.url.clone(),
                            ]
                        })
                        .collect();
                    render_table(
                        &["Id", "Provider", "Confidence", "Validated", "Title", "URL"],
                        &rows,
                    );
                }
                OutputFormat::Text => {
                    for result in results {
                        let mark = if result.validated { "✓" } else { " " };
                        println!(
                            "{mark} {} ({}, {:.2})\n    {}",
                            sanitize(&result.title),
                            result.provider,
                            result.confidence,
                            result.url
                        );
                        if let Some(notes) = &result.notes {
                            println!("    note: {}", sanitize(notes));
                        }
                    }
                }
            }
            Ok(())
        }

        /// Results of one search; provider failures go to stderr outside JSON output.
        pub fn search(&self, results: &[SearchResult], outcomes: &[ProviderOutcome]) -> Result<()> {
            if self.format == OutputFormat::Json {
                let payload = json!({ "results": results, "providers": outcomes });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }
            if results.is_empty() {
                self.notice("No feature server URLs found.");
            } else {
                self.results(results)?;
            }
            for outcome in outcomes {
                if let Some(error) = &outcome.error {
                    eprintln!("warning: {} failed: {}", outcome.provider, sanitize(error));
                }
            }
            Ok(())
        }

        pub fn providers(&self, providers: &[Provider]) -> Result<()> {
            let views: Vec<ProviderView<'_>> = providers.iter().map(ProviderView::from).collect();
            match self.format {
                OutputFormat::Json => {
                    let payload = json!({ "providers": views });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => {
                    println!("| Id | Name | Enabled | API key | Description |");
                    println!("| --- | --- | --- | --- | --- |");
                    for view in &views {
                        println!(
                            "| `{}` | {} | {} | {} | {} |",
                            view.id,
                            view.name,
                            yes_no(view.enabled),
                            key_status(view),
                            sanitize(view.description)
                        );
                    }
                }
                OutputFormat::Table => {
                    let rows: Vec<Vec<String>> = views
                        .iter()
                        .map(|view| {
                            vec![
                                view.id.to_string(),
                                view.name.to_string(),
                                yes_no(view.enabled).to_string(),
                                key_status(view).to_string(),
                                truncate(&sanitize(view.description), 60),
                            ]
                        })
                        .collect();
                    render_table(&["Id", "Name", "Enabled", "API key", "Description"], &rows);
                }
                OutputFormat::Text => {
                    for view in &views {
                        let state = if view.usable { "ready" } else { "inactive" };
                        println!("• {} [{}] {state}: {}", view.name, view.id, view.description);
                    }
                }
            }
            Ok(())
        }

        pub fn history(&self, entries: &[SearchHistoryEntry]) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    let payload = json!({ "history": entries });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => {
                    for entry in entries {
                        println!(
                            "### {} County, {} ({})\n",
                            entry.county, entry.state, entry.timestamp
                        );
                        for result in &entry.results {
                            println!(
                                "- [{}]({}) `{}` {:.2}{}",
                                sanitize(&result.title),
                                result.url,
                                result.id,
                                result.confidence,
                                if result.validated { " ✓" } else { "" }
                            );
                        }
                        println!();
                    }
                }
                OutputFormat::Table => {
                    let rows: Vec<Vec<String>> = entries
                        .iter()
                        .flat_map(|entry| {
                            entry.results.iter().map(move |result| {
                                vec![
                                    entry.timestamp.date().to_string(),
                                    format!("{}, {}", entry.county, entry.state),
                                    result.id.clone(),
                                    format!("{:.2}", result.confidence),
                                    result.url.clone(),
                                ]
                            })
                        })
                        .collect();
                    render_table(&["Date", "County", "Result", "Confidence", "URL"], &rows);
                }
                OutputFormat::Text => {
                    for entry in entries {
                        println!(
                            "{} County, {}: {} result(s) at {}",
                            entry.county,
                            entry.state,
                            entry.results.len(),
                            entry.timestamp
                        );
                    }
                }
            }
            Ok(())
        }

        pub fn states(&self, states: &[&str]) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "states": states }))?);
                }
                OutputFormat::Markdown => {
                    for state in states {
                        println!("- {state}");
                    }
                }
                OutputFormat::Table | OutputFormat::Text => {
                    for state in states {
                        println!("{state}");
                    }
                }
            }
            Ok(())
        }

        pub fn notice(&self, message: &str) {
            if self.format == OutputFormat::Json {
                eprintln!("{message}");
            } else {
                println!("{message}");
            }
        }
    }

    fn key_status(view: &ProviderView<'_>) -> &'static str {
        match (view.has_api_key, view.api_key_required) {
            (true, _) => "set",
            (false, true) => "missing",
            (false, false) => "not needed",
        }
    }

    fn yes_no(value: bool) -> &'static str {
        if value {
            "yes"
        } else {
            "no"
        }
    }

    fn render_table(headers: &[&str], rows: &[Vec<String>]) {
        fn render_line(columns: &[&str], widths: &[usize]) -> String {
            let mut line = String::new();
            for (value, width) in columns.iter().zip(widths.iter().copied()) {
                let _ = write!(line, "| {value:width$} ");
            }
            line.push('|');
            line
        }

        let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
        for row in rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        println!("{}", render_line(headers, &widths));
        let separator: String = widths
            .iter()
            .map(|width| format!("|{:-^1$}", "", width + 2))
            .collect();
        println!("{separator}|");

        for row in rows {
            let cols: Vec<&str> = row.iter().map(String::as_str).collect();
            println!("{}", render_line(&cols, &widths));
        }
    }

    fn sanitize(value: &str) -> String {
        value
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn truncate(value: &str, max: usize) -> String {
        if value.chars().count() <= max {
            value.to_string()
        } else {
            let mut truncated = value
                .chars()
                .take(max.saturating_sub(1))
                .collect::<String>();
            truncated.push('…');
            truncated
        }
    }

}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    pub fn spinner(message_enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !message_enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(80));
        Some(progress)
    }
}
