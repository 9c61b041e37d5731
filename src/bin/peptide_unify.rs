use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use peptide_unify::config::{ConfigLoader, ResolvedConfig};
use peptide_unify::dbaasp::{self, DbaaspHttpClient};
use peptide_unify::domain::{IdentityResolver, SourceKind};
use peptide_unify::error::UnifyError;
use peptide_unify::fs_util;
use peptide_unify::output::{self, JsonOutput};
use peptide_unify::pipeline::{Pipeline, PipelineInputs, TracingProgress};
use peptide_unify::tables::{self, ActivityTable, LipophilicityTable, PhyschemTable};

#[derive(Parser)]
#[command(name = "peptide-unify")]
#[command(about = "Normalize and unify per-peptide activity, physchem, lipophilicity and self-assembly data")]
#[command(version, author)]
struct Cli {
    /// Config file (defaults to ./peptide-unify.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Raise log verbosity when RUST_LOG is unset (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Merge all sources into one row per peptide")]
    Merge(MergeArgs),
    #[command(about = "Summarize an activity table per peptide and organism")]
    Normalize(NormalizeArgs),
    #[command(about = "Fetch peptide cards from DBAASP into physchem and activity tables")]
    Fetch(FetchArgs),
}

#[derive(Args)]
struct MergeArgs {
    #[arg(long)]
    physchem: Option<Utf8PathBuf>,
    #[arg(long)]
    activity: Option<Utf8PathBuf>,
    #[arg(long)]
    lipophilicity: Option<Utf8PathBuf>,
    #[arg(long)]
    self_assembly: Option<Utf8PathBuf>,
    #[arg(long, short)]
    output: Option<Utf8PathBuf>,
    /// Write the run report as JSON here instead of stdout
    #[arg(long)]
    report: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct NormalizeArgs {
    #[arg(long)]
    activity: Option<Utf8PathBuf>,
    /// Physchem table used for molecular weights
    #[arg(long)]
    physchem: Option<Utf8PathBuf>,
    #[arg(long, short)]
    output: Utf8PathBuf,
}

#[derive(Args)]
struct FetchArgs {
    /// CSV with a "Peptide ID" or "ID" column
    #[arg(long)]
    ids: Utf8PathBuf,
    #[arg(long, default_value = "physchem.csv")]
    physchem_out: Utf8PathBuf,
    #[arg(long, default_value = "activity.csv")]
    activity_out: Utf8PathBuf,
    /// N-terminus applied to the Net Charge adjustment
    #[arg(long)]
    n_terminus: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<UnifyError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &UnifyError) -> u8 {
    match error {
        UnifyError::MissingRequiredSource(_)
        | UnifyError::MissingRequiredColumn { .. }
        | UnifyError::ConfigRead(_)
        | UnifyError::ConfigParse(_) => 2,
        UnifyError::DbaaspHttp(_) | UnifyError::DbaaspStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    match cli.command {
        Commands::Merge(args) => run_merge(args, &config),
        Commands::Normalize(args) => run_normalize(args, &config),
        Commands::Fetch(args) => run_fetch(args, &config),
    }
}

fn run_merge(args: MergeArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let inputs = &config.inputs;
    let physchem_path = args.physchem.or_else(|| inputs.physchem.clone());
    let activity_path = args.activity.or_else(|| inputs.activity.clone());
    let lipophilicity_path = args.lipophilicity.or_else(|| inputs.lipophilicity.clone());
    let self_assembly_path = args.self_assembly.or_else(|| inputs.self_assembly.clone());
    let output_path = args
        .output
        .or_else(|| inputs.output.clone())
        .unwrap_or_else(|| Utf8PathBuf::from("unified.csv"));
    let report_path = args.report.or_else(|| inputs.report.clone());

    let pipeline_inputs = PipelineInputs {
        physchem: load_physchem(physchem_path.as_deref())?,
        activity: load_activity(activity_path.as_deref())?,
        lipophilicity: match lipophilicity_path.as_deref() {
            Some(path) => Some(LipophilicityTable::from_raw(&fs_util::read_table(path)?)?),
            None => None,
        },
        self_assembly: match self_assembly_path.as_deref() {
            Some(path) => Some(fs_util::read_text(path)?),
            None => None,
        },
    };

    let pipeline = Pipeline::new(config.engine.clone());
    let result = pipeline.run(&pipeline_inputs, &TracingProgress)?;
    fs_util::write_table_atomic(
        &output_path,
        &result.table.to_raw(&config.engine.empty_marker),
    )?;
    tracing::info!(path = %output_path, rows = result.table.records.len(), "wrote unified table");

    match report_path {
        Some(path) => JsonOutput::write(&path, &result.report)?,
        None => JsonOutput::print(&result.report).into_diagnostic()?,
    }
    Ok(())
}

fn run_normalize(args: NormalizeArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let activity_path = args.activity.or_else(|| config.inputs.activity.clone());
    let physchem_path = args.physchem.or_else(|| config.inputs.physchem.clone());
    let activity = load_activity(activity_path.as_deref())?.ok_or(
        UnifyError::MissingRequiredSource(SourceKind::Activity),
    )?;
    let physchem = load_physchem(physchem_path.as_deref())?;

    let pipeline = Pipeline::new(config.engine.clone());
    let (summaries, report) = pipeline.summarize(&activity, physchem.as_ref());
    fs_util::write_table_atomic(
        &args.output,
        &output::summaries_table(&summaries, &config.engine.empty_marker),
    )?;
    JsonOutput::print(&report).into_diagnostic()?;
    Ok(())
}

fn run_fetch(args: FetchArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let resolver = IdentityResolver::new(config.engine.default_prefix.as_deref());
    let (ids, skipped) = tables::read_peptide_ids(&fs_util::read_table(&args.ids)?, &resolver)?;
    if ids.is_empty() {
        return Err(miette::Report::msg(format!("no peptide ids found in {}", args.ids)));
    }
    tracing::info!(ids = ids.len(), skipped, "loaded peptide ids");

    let client = DbaaspHttpClient::new(config.fetch.clone())?;
    let n_terminus = args.n_terminus.or_else(|| config.fetch.n_terminus.clone());
    let result = dbaasp::fetch_all(&client, &ids, n_terminus.as_deref())?;
    if result.report.fetched == 0 {
        tracing::error!("no peptide cards fetched; nothing written");
        JsonOutput::print(&result.report).into_diagnostic()?;
        return Err(UnifyError::DbaaspHttp("every peptide card request failed".to_string()).into());
    }

    fs_util::write_table_atomic(&args.physchem_out, &result.physchem.to_raw())?;
    fs_util::write_table_atomic(&args.activity_out, &result.activity.to_raw())?;
    JsonOutput::print(&result.report).into_diagnostic()?;
    Ok(())
}

fn load_physchem(path: Option<&Utf8Path>) -> Result<Option<PhyschemTable>, UnifyError> {
    path.map(|path| PhyschemTable::from_raw(&fs_util::read_table(path)?))
        .transpose()
}

fn load_activity(path: Option<&Utf8Path>) -> Result<Option<ActivityTable>, UnifyError> {
    path.map(|path| ActivityTable::from_raw(&fs_util::read_table(path)?))
        .transpose()
}
