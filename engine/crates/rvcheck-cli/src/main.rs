// engine/crates/rvcheck-cli/src/main.rs
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rvcheck::{Checkpoint, DetailMode, RunConfig};

mod render;

/// Reconciles the resourceVersions each watch-path checkpoint observed.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Disable coloured output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare every checkpoint's versions against the baseline.
    Check(CheckArgs),
    /// List the known checkpoints and the labels that map to them.
    Checkpoints,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Directory holding the component logs, flat or one directory per host.
    #[arg(long, default_value = "/var/log")]
    log_dir: PathBuf,

    /// TOML run configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Checkpoint used as ground truth (machine name or legacy alias).
    #[arg(long)]
    baseline: Option<Checkpoint>,

    #[arg(long)]
    tracked_type: Option<String>,

    /// Report detail for this entity, or `all`.
    #[arg(long)]
    entity_name: Option<String>,

    /// Report detail for entities whose name contains this string.
    #[arg(long)]
    entity_name_contains: Option<String>,

    #[arg(long, value_enum)]
    detail: Option<DetailArg>,

    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Exit with status 2 when any entity is inconsistent.
    #[arg(long)]
    fail_on_inconsistent: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DetailArg {
    Versions,
    Events,
}

impl From<DetailArg> for DetailMode {
    fn from(arg: DetailArg) -> Self {
        match arg {
            DetailArg::Versions => DetailMode::Versions,
            DetailArg::Events => DetailMode::Events,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl CheckArgs {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load_from_path(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(baseline) = self.baseline {
            config.baseline = baseline;
        }
        if let Some(tracked_type) = &self.tracked_type {
            config.tracked_type = tracked_type.clone();
        }
        if let Some(name) = &self.entity_name {
            config.entity_name = Some(name.clone());
        }
        if let Some(needle) = &self.entity_name_contains {
            config.entity_name_contains = Some(needle.clone());
        }
        if let Some(detail) = self.detail {
            config.detail = detail.into();
        }

        config.validate().context("invalid command-line overrides")?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    rvcheck::logging::init(&cli.log_level);
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(1)
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Check(args) => check(args),
        Command::Checkpoints => {
            render::legend(&mut io::stdout().lock())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check(args: CheckArgs) -> Result<ExitCode> {
    let config = args.run_config()?;
    let report = rvcheck::check_log_dir(&args.log_dir, &config)
        .with_context(|| format!("failed to check logs under {}", args.log_dir.display()))?;

    let mut stdout = io::stdout().lock();
    match args.format {
        Format::Text => render::report(&mut stdout, &report)?,
        Format::Json => {
            serde_json::to_writer_pretty(&mut stdout, &report)
                .context("failed to serialize report")?;
            writeln!(stdout)?;
        }
    }

    tracing::info!(
        entities = report.entities_examined,
        inconsistent = report.inconsistent_count,
        clean = report.is_clean(),
        "check finished"
    );
    if args.fail_on_inconsistent && report.inconsistent_count > 0 {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
