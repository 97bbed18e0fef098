mod inputs;
mod logging;
mod settings;
mod sink;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use synthdoc_core::{
    DependencyReport, Error as CoreError, Model, NormalizeOptions, ValidationIssue,
    build_dependency_report, model_json_schema, normalize_models, validate_model_json,
};
use synthdoc_generate::{
    DeliveryMode, GenerationEngine, GenerationError, GenerationReport, HookRegistry, LocaleKey,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use inputs::FileInputSource;
use settings::{Overrides, load_settings};
use sink::JsonLinesSink;

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("{0} model file(s) failed validation")]
    Validation(usize),
}

#[derive(Parser, Debug)]
#[command(name = "synthdoc", version, about = "Synthetic document generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate documents and print them as JSON lines.
    Generate(GenerateArgs),
    /// Check model files without generating anything.
    Validate(ValidateArgs),
    /// Print the JSON Schema for model files.
    Schema,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Model files (JSON).
    #[arg(required = true, value_name = "MODEL")]
    models: Vec<PathBuf>,
    /// Documents per model, overriding every model's count.
    #[arg(long)]
    count: Option<u64>,
    /// Seed for every model, overriding model seeds.
    #[arg(long)]
    seed: Option<u64>,
    /// Maximum builds in flight.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Delivery mode: batch or stream.
    #[arg(long)]
    mode: Option<DeliveryMode>,
    /// Treat hook errors as fatal.
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Faker locale (en_US, pt_BR).
    #[arg(long)]
    locale: Option<LocaleKey>,
    /// Write documents here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Write the run report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Model files (JSON).
    #[arg(required = true, value_name = "MODEL")]
    models: Vec<PathBuf>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Config file; defaults to ./synthdoc.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    log_json: bool,
    /// Append logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Validate(args) => run_validate(args),
        Command::Schema => run_schema(),
    }
}

async fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs {
        models,
        count,
        seed,
        concurrency,
        mode,
        strict,
        locale,
        out,
        report,
        common,
    } = args;

    let settings = load_settings(common.config.as_deref())?.apply(Overrides {
        mode,
        concurrency,
        count,
        seed,
        strict,
        locale,
        out,
        log_json: common.log_json,
        log_file: common.log_file,
    });
    logging::init_logging(settings.log_json(), settings.logging.file.as_deref())?;

    let paths = models;
    let models = load_models(&paths)?;
    let fallback_root = paths
        .first()
        .and_then(|path| path.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let writer: Box<dyn Write + Send> = match &settings.generate.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let sink = JsonLinesSink::new(writer);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            on_signal.cancel();
        }
    });

    let engine = GenerationEngine::new(settings.generate_options())
        .with_hooks(HookRegistry::new())
        .with_inputs(FileInputSource::new(fallback_root));
    let outcome = engine.run(models, &sink, &cancel).await;
    sink.flush()?;
    let result = outcome?;

    log_summary(&result.report);
    if let Some(path) = report {
        write_json(&path, &result.report)?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn log_summary(report: &GenerationReport) {
    for model in &report.models {
        info!(
            model = %model.model,
            requested = model.requested,
            documents = model.delivered,
            duplicates = model.duplicates,
            hook_errors = model.hook_errors,
            "model summary"
        );
    }
    info!(
        run_id = %report.run_id,
        documents = report.documents_total,
        warnings = report.warnings.len(),
        cancelled = report.cancelled,
        duration_ms = report.duration_ms,
        "run summary"
    );
}

/// Per-file result printed by `validate`.
#[derive(Debug, Serialize)]
struct ValidationOutput {
    ok: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    dependencies: Option<DependencyReport>,
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    let settings = load_settings(args.common.config.as_deref())?.apply(Overrides {
        log_json: args.common.log_json,
        log_file: args.common.log_file,
        ..Overrides::default()
    });
    logging::init_logging(settings.log_json(), settings.logging.file.as_deref())?;

    let mut output = ValidationOutput {
        ok: true,
        errors: Vec::new(),
        warnings: Vec::new(),
        dependencies: None,
    };
    let mut failed_files = 0;
    let mut models = Vec::new();
    for path in &args.models {
        let raw = read_json(path)?;
        let report = validate_model_json(&raw)?;
        if !report.is_ok() {
            failed_files += 1;
            output.errors.extend(report.errors);
            output.warnings.extend(report.warnings);
            continue;
        }
        models.push(Model::from_value(raw)?);
    }

    let normalized = normalize_models(models, &NormalizeOptions::default())?;
    let rejected: std::collections::BTreeSet<_> = normalized
        .report
        .errors
        .iter()
        .filter_map(|issue| issue.model.clone())
        .collect();
    failed_files += rejected.len();
    output.errors.extend(normalized.report.errors);
    output.warnings.extend(normalized.report.warnings);

    let hooks = HookRegistry::new();
    for model in &normalized.models {
        if let Err(err) = hooks.check_model(model) {
            failed_files += 1;
            output.errors.push(ValidationIssue::error(
                "hook",
                Some(&model.name),
                "/",
                err.to_string(),
            ));
        }
    }

    let dependencies = build_dependency_report(&normalized.models)?;
    if dependencies.cycle.is_some() {
        failed_files += 1;
    }
    output.dependencies = Some(dependencies);
    output.ok = failed_files == 0;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &output)?;
    writeln!(handle)?;

    if failed_files > 0 {
        return Err(CliError::Validation(failed_files));
    }
    info!(models = normalized.models.len(), "models valid");
    Ok(())
}

fn run_schema() -> Result<(), CliError> {
    let schema = model_json_schema()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &schema)?;
    writeln!(handle)?;
    Ok(())
}

/// Parse model files; a model without `root` resolves inputs next to its file.
fn load_models(paths: &[PathBuf]) -> Result<Vec<Model>, CliError> {
    let mut models = Vec::with_capacity(paths.len());
    for path in paths {
        let mut model = Model::from_value(read_json(path)?)?;
        if model.root.is_none() {
            model.root = path
                .parent()
                .map(|parent| parent.display().to_string());
        }
        models.push(model);
    }
    Ok(models)
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        CliError::InvalidConfig(format!("cannot read {}: {err}", path.display()))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
