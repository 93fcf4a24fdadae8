use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use seerprep::config::{self, ConfigBuilder, SeerConfig};
use seerprep::logging::{init_logging, LogConfig, LogFormat};
use seerprep::prelude::*;

#[derive(Parser)]
#[command(name = "seercli")]
#[command(version, about = "Normalise cancer-registry extracts into canonical tumour and patient tables", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatOpt::Pretty)]
    log_format: LogFormatOpt,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Configuration file (defaults to the per-user config, then SEERPREP_* variables)
    #[arg(long, global = true, env = "SEERPREP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalise a raw extract into a canonical record table
    Normalize(NormalizeArgs),
    /// Build patient summaries from a canonical record table
    Aggregate(AggregateArgs),
    /// Normalise and aggregate in a single pass
    Run(RunArgs),
    /// Show or write the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct OutputOpts {
    /// Output format
    #[arg(long, value_enum)]
    format: Option<ExportFormatOpt>,
    /// Columns written to the record table
    #[arg(long, value_enum)]
    field_set: Option<FieldSetOpt>,
    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,
    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct NormalizeArgs {
    /// Raw tab-separated registry extract
    input: PathBuf,
    /// Canonical record table to write
    #[arg(short, long)]
    output: PathBuf,
    #[command(flatten)]
    opts: OutputOpts,
}

#[derive(Args)]
struct AggregateArgs {
    /// Tab-separated canonical record table, grouped by patient id (JSON Lines output cannot be aggregated)
    input: PathBuf,
    /// Patient summary table to write
    #[arg(short, long)]
    output: PathBuf,
    /// Output format
    #[arg(long, value_enum)]
    format: Option<ExportFormatOpt>,
    /// Drop each patient's records after the first with brain metastasis
    #[arg(long)]
    truncate_after_brain_met: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Raw tab-separated registry extract
    input: PathBuf,
    /// Canonical record table to write
    #[arg(long)]
    records: PathBuf,
    /// Patient summary table to write
    #[arg(long)]
    patients: PathBuf,
    /// Drop each patient's records after the first with brain metastasis
    #[arg(long)]
    truncate_after_brain_met: bool,
    #[command(flatten)]
    opts: OutputOpts,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Write a configuration file with default values
    Init {
        /// Destination (defaults to the per-user config path)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ExportFormatOpt {
    Tsv,
    Jsonl,
}

impl From<ExportFormatOpt> for ExportFormat {
    fn from(opt: ExportFormatOpt) -> Self {
        match opt {
            ExportFormatOpt::Tsv => ExportFormat::Tsv,
            ExportFormatOpt::Jsonl => ExportFormat::JsonLines,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FieldSetOpt {
    Full,
    Core,
}

impl From<FieldSetOpt> for FieldSet {
    fn from(opt: FieldSetOpt) -> Self {
        match opt {
            FieldSetOpt::Full => FieldSet::Full,
            FieldSetOpt::Core => FieldSet::Core,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogFormatOpt {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatOpt> for LogFormat {
    fn from(opt: LogFormatOpt) -> Self {
        match opt {
            LogFormatOpt::Pretty => LogFormat::Pretty,
            LogFormatOpt::Compact => LogFormat::Compact,
            LogFormatOpt::Json => LogFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose)
        .with_format(cli.log_format.into())
        .with_log_file(cli.log_file.clone());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Cannot initialise logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = dispatch(cli) {
        match e.downcast_ref::<SeerError>() {
            Some(seer) => eprintln!("Error: {}", seer.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let base = match &cli.config {
        Some(path) => SeerConfig::from_file(path)?,
        None => SeerConfig::load(),
    };

    match cli.command {
        Commands::Normalize(args) => cmd_normalize(base, args),
        Commands::Aggregate(args) => cmd_aggregate(base, args),
        Commands::Run(args) => cmd_run(base, args),
        Commands::Config(ConfigCommand::Show) => cmd_config_show(base),
        Commands::Config(ConfigCommand::Init { path, force }) => cmd_config_init(path, force),
    }
}

fn apply_output_opts(base: SeerConfig, opts: &OutputOpts) -> SeerConfig {
    let mut builder = ConfigBuilder::from_config(base);
    if let Some(format) = opts.format {
        builder = builder.export_format(format.into());
    }
    if let Some(field_set) = opts.field_set {
        builder = builder.field_set(field_set.into());
    }
    if opts.no_progress {
        builder = builder.progress_bar(false);
    }
    builder.build()
}

fn cmd_normalize(base: SeerConfig, args: NormalizeArgs) -> anyhow::Result<()> {
    config::set_global_config(apply_output_opts(base, &args.opts));

    let report = Pipeline::builder()
        .input(&args.input)
        .records_output(&args.output)
        .build()?
        .run()?;

    report.print_summary();
    write_report(&report, args.opts.report.as_deref())
}

fn cmd_run(base: SeerConfig, args: RunArgs) -> anyhow::Result<()> {
    let mut config = apply_output_opts(base, &args.opts);
    if args.truncate_after_brain_met {
        config.truncate_after_brain_met = true;
    }
    config::set_global_config(config);

    let report = Pipeline::builder()
        .input(&args.input)
        .records_output(&args.records)
        .patients_output(&args.patients)
        .build()?
        .run()?;

    report.print_summary();
    write_report(&report, args.opts.report.as_deref())
}

fn cmd_aggregate(base: SeerConfig, args: AggregateArgs) -> anyhow::Result<()> {
    let format = args.format.map(ExportFormat::from).unwrap_or(base.default_export_format);
    let truncate = args.truncate_after_brain_met || base.truncate_after_brain_met;

    let patients = Pipeline::aggregate_file(&args.input, &args.output, format, truncate)?;
    println!("Wrote {} patients to {}", patients, args.output.display());
    Ok(())
}

fn cmd_config_show(config: SeerConfig) -> anyhow::Result<()> {
    let text = toml::to_string_pretty(&config).context("serialising configuration")?;
    print!("{}", text);
    Ok(())
}

fn cmd_config_init(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = match path.or_else(SeerConfig::default_config_path) {
        Some(path) => path,
        None => anyhow::bail!("no home directory found; pass --path"),
    };
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    SeerConfig::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn write_report(report: &RunReport, path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = path {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
    }
    Ok(())
}
