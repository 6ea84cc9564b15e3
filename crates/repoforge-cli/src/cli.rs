//! repoforge command-line entry point.
//!
//! Precedence for every option: CLI flag over config file over built-in
//! default. Exit code is 0 on success and 1 on any fatal error; the first
//! error of the run is the one reported.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use repoforge_core::{Config, MockProvider};
use repoforge_generate::Coordinator;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "repoforge",
    version,
    about = "Generate a Go repository layer from a live PostgreSQL schema"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database connection string
    #[arg(long, env = "REPOFORGE_DSN")]
    dsn: Option<String>,

    /// Source schema
    #[arg(long)]
    schema: Option<String>,

    /// Only generate for these tables (comma separated)
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Skip these tables (comma separated)
    #[arg(long, value_delimiter = ',')]
    ignore_tables: Vec<String>,

    /// Output base directory
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory of replacement templates
    #[arg(long)]
    template_dir: Option<PathBuf>,

    /// Mock idiom: testify or mock
    #[arg(long)]
    mock_provider: Option<String>,

    /// Skip test skeleton generation
    #[arg(long)]
    no_tests: bool,

    /// Worker pool size
    #[arg(long)]
    workers: Option<usize>,

    /// Disable parallel generation
    #[arg(long)]
    sequential: bool,

    /// Discard incremental state and regenerate everything
    #[arg(long)]
    force: bool,

    /// Emit goose migration files for table-level changes
    #[arg(long)]
    migrations: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "repoforge=info",
        1 => "repoforge=debug",
        _ => "repoforge=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Load the config file when given, otherwise start from defaults
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

/// Overlay CLI flags onto the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(dsn) = &cli.dsn {
        config.dsn = dsn.clone();
    }
    if let Some(schema) = &cli.schema {
        config.schema = schema.clone();
    }
    if !cli.tables.is_empty() {
        config.tables = cli.tables.clone();
    }
    if !cli.ignore_tables.is_empty() {
        config.ignore_tables = cli.ignore_tables.clone();
    }
    if let Some(output) = &cli.output {
        config.output_dirs.base = output.clone();
    }
    if let Some(template_dir) = &cli.template_dir {
        config.template_dir = Some(template_dir.clone());
    }
    if let Some(provider) = &cli.mock_provider {
        config.mock_provider = provider.parse::<MockProvider>()?;
    }
    if cli.no_tests {
        config.with_tests = false;
    }
    if let Some(workers) = cli.workers {
        config.parallel.workers = workers;
    }
    if cli.sequential {
        config.parallel.enabled = false;
    }
    if cli.force {
        config.incremental.force = true;
    }
    if cli.migrations {
        config.migrations.enabled = true;
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_ref())?;
    apply_overrides(&mut config, &cli)?;

    let coordinator = Coordinator::new(config)?;
    let summary = coordinator.run().await?;

    if summary.up_to_date {
        tracing::info!(tables = summary.tables, "schema unchanged, nothing generated");
    } else {
        tracing::info!(
            tables = summary.tables,
            written = summary.written,
            deleted = summary.deleted,
            migrations = summary.migrations.len(),
            cache_hit_ratio = %format!("{:.2}", summary.cache.hit_ratio()),
            "generation complete"
        );
    }
    for cross in &summary.cross_references {
        tracing::info!(
            table = %cross.table,
            foreign_key = %cross.foreign_key,
            references = %format!("{}.{}", cross.schema, cross.referenced_table),
            "cross-schema reference"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "generation failed");
            ExitCode::FAILURE
        }
    }
}
