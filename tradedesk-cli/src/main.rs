//! Tradedesk CLI: inspect and edit portfolio/strategy configurations.
//!
//! Commands:
//! - `show`: print a stored configuration, or the defaults if none exists
//! - `set`: apply `field=value` edits, validate, and save
//! - `delete`: remove a stored configuration
//! - `list`: search, filter and sort a collection
//! - `defaults`: print the documented defaults for a kind
//! - `check`: run local rules, then the server's dry-run validation
//! - `export`: write dashboard widgets out as CSV sheets

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tradedesk_client::{
    ClientSettings, ConfigApi, ConfigEditor, DeleteOutcome, HttpTransport, ListView, LoadOutcome,
    SaveOutcome, Session,
};
use tradedesk_core::listing::{CategoryFilter, SortDirection, SortSpec};
use tradedesk_core::{validate, ConfigRecord, ConfigValue, ResourceKind, SystemClock, Widget};

#[derive(Parser)]
#[command(
    name = "tradedesk",
    about = "Tradedesk CLI: portfolio and strategy configuration client"
)]
struct Cli {
    /// Settings file (TOML). Environment overrides still apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configuration for one portfolio or strategy.
    Show {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        id: String,
    },
    /// Apply field edits (e.g. tradingMode=live) and save.
    Set {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        id: String,
        /// Edits as field=value. Values: null, true, false, numbers, or text.
        #[arg(required = true)]
        edits: Vec<String>,
    },
    /// Delete a stored configuration.
    Delete {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        id: String,
    },
    /// List a collection with optional search, filter and sort.
    List {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        /// Case-insensitive text search.
        #[arg(long, default_value = "")]
        search: String,
        /// Exact-match filter as field=value.
        #[arg(long)]
        filter: Option<String>,
        /// Field to sort by.
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending.
        #[arg(long, default_value_t = false)]
        desc: bool,
    },
    /// Print the documented defaults.
    Defaults {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        /// Owner id to stamp on the record.
        #[arg(default_value = "new")]
        id: String,
    },
    /// Validate a configuration, optionally with edits, without saving.
    Check {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        id: String,
        edits: Vec<String>,
    },
    /// Export dashboard widgets (JSON file) as CSV.
    Export {
        /// JSON file holding one widget or an array of widgets.
        path: PathBuf,
    },
}

fn parse_kind(s: &str) -> Result<ResourceKind, String> {
    s.parse()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Defaults { kind, id } => run_defaults(kind, &id),
        Commands::Export { path } => run_export(&path),
        Commands::Show { kind, id } => {
            let ctx = Backend::new(cli.config.as_deref())?;
            run_show(&ctx, kind, &id)
        }
        Commands::Set { kind, id, edits } => {
            let ctx = Backend::new(cli.config.as_deref())?;
            run_set(&ctx, kind, &id, &edits)
        }
        Commands::Delete { kind, id } => {
            let ctx = Backend::new(cli.config.as_deref())?;
            run_delete(&ctx, kind, &id)
        }
        Commands::List {
            kind,
            search,
            filter,
            sort,
            desc,
        } => {
            let ctx = Backend::new(cli.config.as_deref())?;
            run_list(&ctx, kind, search, filter.as_deref(), sort, desc)
        }
        Commands::Check { kind, id, edits } => {
            let ctx = Backend::new(cli.config.as_deref())?;
            run_check(&ctx, kind, &id, &edits)
        }
    }
}

/// Wiring shared by the commands that talk to the backend.
struct Backend {
    settings: ClientSettings,
    session: Arc<Session>,
    api: ConfigApi,
}

impl Backend {
    fn new(config: Option<&Path>) -> Result<Self> {
        let settings = ClientSettings::load(config).context("failed to load settings")?;
        let session = Session::init(&settings, Arc::new(SystemClock));
        let transport = HttpTransport::new(
            &settings.api_url,
            settings.request_timeout(),
            session.tokens().clone(),
        )
        .context("failed to set up HTTP transport")?;
        let api = ConfigApi::new(Arc::new(transport), settings.retry_policy());
        debug!(api_url = %settings.api_url, "client ready");
        Ok(Self {
            settings,
            session,
            api,
        })
    }

    fn editor(&self, kind: ResourceKind) -> ConfigEditor {
        ConfigEditor::new(
            kind,
            self.api.clone(),
            self.session.clone(),
            Arc::new(SystemClock),
            self.settings.cache_ttl(),
        )
    }
}

fn run_defaults(kind: ResourceKind, id: &str) -> Result<()> {
    print_record(kind, &kind.default_record(id))
}

fn run_show(ctx: &Backend, kind: ResourceKind, id: &str) -> Result<()> {
    let mut editor = ctx.editor(kind);
    let stored = load(&mut editor, id)?;
    let record = editor.current().ok_or_else(|| anyhow!("nothing loaded"))?;
    print_record(kind, record)?;
    if !stored {
        eprintln!("(no stored configuration for {kind} {id}; showing defaults)");
    }
    print_validation(&editor);
    Ok(())
}

fn run_set(ctx: &Backend, kind: ResourceKind, id: &str, edits: &[String]) -> Result<()> {
    let mut editor = ctx.editor(kind);
    load(&mut editor, id)?;
    for (field, value) in parse_edits(edits)? {
        editor.set_field(&field, value)?;
    }

    if !editor.is_dirty() {
        println!("No changes.");
        return Ok(());
    }
    if !editor.is_valid() {
        print_validation(&editor);
        bail!("Please fix the validation errors before saving.");
    }

    match editor.save() {
        SaveOutcome::Created => println!("Created {kind} configuration for {id}."),
        SaveOutcome::Updated => println!("Updated {kind} configuration for {id}."),
        SaveOutcome::Failed(failure) => {
            for (field, message) in failure.field_errors.iter() {
                eprintln!("  {field}: {message}");
            }
            bail!("{failure}");
        }
        SaveOutcome::Blocked(block) => bail!("save blocked: {block:?}"),
        SaveOutcome::Discarded => bail!("save response discarded"),
    }
    if let Some(record) = editor.current() {
        print_record(kind, record)?;
    }
    Ok(())
}

fn run_delete(ctx: &Backend, kind: ResourceKind, id: &str) -> Result<()> {
    let mut editor = ctx.editor(kind);
    load(&mut editor, id)?;
    match editor.delete() {
        DeleteOutcome::Deleted => println!("Deleted {kind} configuration for {id}."),
        DeleteOutcome::Skipped => println!("No stored configuration for {kind} {id}."),
        DeleteOutcome::Failed(failure) => bail!("{failure}"),
    }
    Ok(())
}

fn run_list(
    ctx: &Backend,
    kind: ResourceKind,
    search: String,
    filter: Option<&str>,
    sort: Option<String>,
    desc: bool,
) -> Result<()> {
    let mut view = ListView::new(kind, Arc::new(SystemClock), ctx.settings.search_debounce());
    view.set_search(search);
    view.flush_search();
    if let Some(raw) = filter {
        let (field, value) = parse_edit(raw)?;
        view.set_category(Some(CategoryFilter::new(field, value)));
    }
    if let Some(field) = sort {
        view.set_sort(Some(SortSpec {
            field,
            direction: if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            },
        }));
    }

    view.refresh(&ctx.api, &ctx.session)
        .map_err(|failure| anyhow!("{failure}"))?;

    let columns = kind.search_fields();
    println!("{:<24} {}", kind.owner_field(), columns.join("  "));
    for row in view.visible() {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| row.get(c).map(ToString::to_string).unwrap_or_default())
            .collect();
        println!("{:<24} {}", row.owner_id, cells.join("  "));
    }
    println!("{} of {} shown", view.visible().len(), view.source().len());
    Ok(())
}

fn run_check(ctx: &Backend, kind: ResourceKind, id: &str, edits: &[String]) -> Result<()> {
    let mut editor = ctx.editor(kind);
    load(&mut editor, id)?;
    for (field, value) in parse_edits(edits)? {
        editor.set_field(&field, value)?;
    }
    let record = editor.current().ok_or_else(|| anyhow!("nothing loaded"))?;

    let report = ctx
        .api
        .check_locally_then_remote(kind, record)
        .map_err(|e| anyhow!("check failed: {e}"))?;

    for (field, message) in report.field_errors.iter() {
        println!("  {field}: {message}");
    }
    if let Some(message) = &report.message {
        println!("{message}");
    }
    if report.valid {
        println!("Configuration is valid.");
        Ok(())
    } else {
        bail!("configuration is invalid")
    }
}

fn run_export(path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw).context("invalid JSON")?;
    let widgets: Vec<Widget> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };

    for widget in &widgets {
        let sheet = widget.export_sheet();
        println!("# {}", sheet.name);
        print!("{}", sheet.to_csv()?);
    }
    Ok(())
}

/// Load `id`; returns whether a stored configuration exists.
fn load(editor: &mut ConfigEditor, id: &str) -> Result<bool> {
    match editor.load_config(id) {
        LoadOutcome::Loaded { .. } => Ok(true),
        LoadOutcome::Defaulted => Ok(false),
        LoadOutcome::Failed(failure) => bail!("{failure}"),
        LoadOutcome::Discarded => bail!("load response discarded"),
    }
}

fn parse_edit(raw: &str) -> Result<(String, ConfigValue)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected field=value, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        bail!("empty field name in '{raw}'");
    }
    Ok((field.to_string(), ConfigValue::from_literal(value)))
}

fn parse_edits(raw: &[String]) -> Result<Vec<(String, ConfigValue)>> {
    raw.iter().map(|r| parse_edit(r)).collect()
}

fn print_record(kind: ResourceKind, record: &ConfigRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&record.to_json(kind))?);
    Ok(())
}

fn print_validation(editor: &ConfigEditor) {
    let Some(record) = editor.current() else {
        return;
    };
    let errors = validate(record, editor.kind().rules());
    for (field, message) in errors.iter() {
        eprintln!("  {field}: {message}");
    }
}
