//! Breadboard CLI - run, check and migrate circuit documents from the command line.

use anyhow::{bail, Context, Result};
use breadboard::components::default_properties;
use breadboard::schema::{self, document_version, IssueKind, SchemaIssue};
use breadboard::{
    ComponentKind, DiagnosticsPolicy, Engine, EngineConfig, Severity, Snapshot, Warning,
    WarningCode, CURRENT_VERSION,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "breadboard")]
#[command(about = "Deterministic breadboard circuit simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Log engine activity to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a circuit document and simulate it for a number of ticks
    Run {
        /// Path to a circuit document (.json)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of 1 ms ticks to simulate
        #[arg(short, long, default_value_t = 1000)]
        ticks: u64,

        /// Override the document's RNG seed
        #[arg(long)]
        seed: Option<u32>,

        /// Engine config file (.json)
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Skip unknown components and unresolvable wires instead of failing
        #[arg(long)]
        lenient: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if warnings were raised at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,
    },

    /// Check a circuit document against the current schema
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Upgrade a circuit document to the current schema version
    Migrate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Write the migrated document here instead of stdout
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },

    /// List the available component kinds (pins and defaults with --verbose)
    Kinds,

    /// List the warning codes the simulator can raise
    Codes,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts and CI
    Json,
    /// GitHub Actions annotations
    Github,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailOnSeverity {
    Error,
    Warning,
    Info,
}

impl FailOnSeverity {
    fn includes(self, severity: Severity) -> bool {
        match self {
            FailOnSeverity::Error => severity == Severity::Error,
            FailOnSeverity::Warning => severity != Severity::Info,
            FailOnSeverity::Info => true,
        }
    }
}

/// A warning seen during a run, with how many ticks raised it.
struct Finding {
    first: Warning,
    ticks: u64,
}

struct RunReport {
    snapshot: Snapshot,
    findings: Vec<Finding>,
    skipped: Vec<SchemaIssue>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "breadboard=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            ticks,
            seed,
            config,
            lenient,
            format,
            fail_on,
        } => handle_run(&file, ticks, seed, config.as_deref(), lenient, format, fail_on),
        Commands::Validate { file, format } => handle_validate(&file, format),
        Commands::Migrate { file, output } => handle_migrate(&file, output.as_deref()),
        Commands::Kinds => {
            handle_kinds(cli.verbose);
            Ok(0)
        }
        Commands::Codes => {
            handle_codes();
            Ok(0)
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn read_document(file: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", file.display()))
}

fn simulate(
    file: &Path,
    ticks: u64,
    seed: Option<u32>,
    config: Option<&Path>,
    lenient: bool,
) -> Result<RunReport> {
    let mut config = match config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    // Findings are collected tick by tick below.
    config.diagnostics_policy = DiagnosticsPolicy::PerTick;

    let mut document = schema::migrate(read_document(file)?)
        .with_context(|| format!("failed to migrate {}", file.display()))?;
    if let Some(seed) = seed {
        if !document["simulation"].is_object() {
            document["simulation"] = json!({});
        }
        document["simulation"]["seed"] = json!(seed);
    }

    let loaded = if lenient {
        Engine::from_document_lenient(document, config)
    } else {
        Engine::from_document(document, config).map(|engine| (engine, Vec::new()))
    };
    let (mut engine, skipped) =
        loaded.with_context(|| format!("failed to load {}", file.display()))?;

    tracing::info!(ticks, seed = engine.seed(), "running circuit");
    let mut findings: BTreeMap<(WarningCode, String), Finding> = BTreeMap::new();
    for _ in 0..ticks {
        engine.run_ticks(1);
        for warning in engine.warnings() {
            findings
                .entry(warning.dedup_key())
                .and_modify(|f| f.ticks += 1)
                .or_insert_with(|| Finding {
                    first: warning.clone(),
                    ticks: 1,
                });
        }
    }

    let mut findings: Vec<Finding> = findings.into_values().collect();
    findings.sort_by(|a, b| {
        (a.first.severity, a.first.timestamp, &a.first.id)
            .cmp(&(b.first.severity, b.first.timestamp, &b.first.id))
    });
    Ok(RunReport {
        snapshot: engine.snapshot(),
        findings,
        skipped,
    })
}

fn handle_run(
    file: &Path,
    ticks: u64,
    seed: Option<u32>,
    config: Option<&Path>,
    lenient: bool,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
) -> Result<i32> {
    let report = simulate(file, ticks, seed, config, lenient)?;
    match format {
        OutputFormat::Human => output_run_human(file, &report),
        OutputFormat::Json => output_run_json(file, &report)?,
        OutputFormat::Github => output_run_github(file, &report),
    }

    if let Some(threshold) = fail_on {
        if report
            .findings
            .iter()
            .any(|f| threshold.includes(f.first.severity))
        {
            return Ok(1);
        }
    }
    Ok(0)
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "ERROR",
        Severity::Warning => "WARNING",
        Severity::Info => "INFO",
    }
}

fn output_run_human(file: &Path, report: &RunReport) {
    let state = &report.snapshot.state;
    println!("\nFile: {}", file.display());
    println!("{}", "─".repeat(60));
    println!(
        "  Simulated {} ms (seed {}, {} components, {} wires)",
        state.sim_time_ms,
        state.seed,
        state.components.len(),
        state.wires.len()
    );

    for issue in &report.skipped {
        println!("  Skipped: {}", issue);
    }

    println!("\n  Components:");
    for component in &state.components {
        let outputs: Vec<String> = component
            .outputs
            .iter()
            .map(|(key, value)| format!("{}={}", key, serde_json::to_string(value).unwrap_or_default()))
            .collect();
        let fault = if component.faulted { " [FAULTED]" } else { "" };
        println!(
            "    {:<10} {:<20}{} {}",
            component.id,
            component.kind.as_str(),
            fault,
            outputs.join(" ")
        );
    }

    if report.findings.is_empty() {
        println!("\n  No warnings raised");
        return;
    }

    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        let group: Vec<&Finding> = report
            .findings
            .iter()
            .filter(|f| f.first.severity == severity)
            .collect();
        if group.is_empty() {
            continue;
        }
        println!("\n  {}:", severity_label(severity));
        for finding in group {
            println!(
                "    - [{}] {} (first at {} ms, {} ticks)",
                finding.first.code, finding.first.message, finding.first.timestamp, finding.ticks
            );
            if let Some(ref component) = finding.first.component_id {
                println!("      Component: {}", component);
            }
        }
    }

    let count = |severity| {
        report
            .findings
            .iter()
            .filter(|f| f.first.severity == severity)
            .count()
    };
    println!("\n  Summary:");
    println!("    Errors:   {}", count(Severity::Error));
    println!("    Warnings: {}", count(Severity::Warning));
    println!("    Info:     {}", count(Severity::Info));
}

fn output_run_json(file: &Path, report: &RunReport) -> Result<()> {
    let findings: Vec<Value> = report
        .findings
        .iter()
        .map(|f| {
            json!({
                "warning": f.first,
                "ticks": f.ticks,
            })
        })
        .collect();
    let output = json!({
        "file": file.display().to_string(),
        "snapshot": report.snapshot,
        "findings": findings,
        "skipped": report.skipped,
        "summary": {
            "simTimeMs": report.snapshot.state.sim_time_ms,
            "errors": report.findings.iter().filter(|f| f.first.severity == Severity::Error).count(),
            "total": report.findings.len(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_run_github(file: &Path, report: &RunReport) {
    for finding in &report.findings {
        let level = match finding.first.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "notice",
        };
        println!(
            "::{} file={},title={}::{}",
            level,
            file.display(),
            finding.first.code,
            finding.first.message.replace('\n', " ")
        );
    }
}

fn handle_validate(file: &Path, format: OutputFormat) -> Result<i32> {
    let original = read_document(file)?;
    let version = document_version(&original)
        .with_context(|| format!("failed to read schema version of {}", file.display()))?;
    let migrated = schema::migrate(original)
        .with_context(|| format!("failed to migrate {}", file.display()))?;
    let issues = schema::validate_document(&migrated);

    match format {
        OutputFormat::Human => {
            println!("\nFile: {}", file.display());
            println!("{}", "─".repeat(60));
            if version != CURRENT_VERSION {
                println!("  Schema version {} (migrated to {})", version, CURRENT_VERSION);
            }
            if issues.is_empty() {
                println!("  Document is valid");
            }
            for issue in &issues {
                let kind = match issue.kind {
                    IssueKind::Structural => "structural",
                    IssueKind::Reference => "reference",
                };
                println!("    - [{}] {}", kind, issue);
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "file": file.display().to_string(),
                "schemaVersion": version,
                "valid": issues.is_empty(),
                "issues": issues,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Github => {
            for issue in &issues {
                println!("::error file={}::{}", file.display(), issue);
            }
        }
    }

    Ok(if issues.is_empty() { 0 } else { 1 })
}

fn handle_migrate(file: &Path, output: Option<&Path>) -> Result<i32> {
    let original = read_document(file)?;
    let from = document_version(&original)?;
    let migrated = schema::migrate(original)
        .with_context(|| format!("failed to migrate {}", file.display()))?;
    let issues = schema::validate_schema(&migrated);
    if !issues.is_empty() {
        bail!("migrated document is invalid: {}", issues.join("; "));
    }

    let text = serde_json::to_string_pretty(&migrated)?;
    match output {
        Some(path) => {
            std::fs::write(path, text + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "Migrated {} from version {} to {} -> {}",
                file.display(),
                from,
                CURRENT_VERSION,
                path.display()
            );
        }
        None => println!("{}", text),
    }
    Ok(0)
}

fn handle_kinds(verbose: bool) {
    println!("Available component kinds:\n");
    for kind in ComponentKind::ALL {
        println!("  {}", kind.as_str());
        println!("    {}", kind.description());
        if verbose {
            println!("    Pins: {}", kind.pin_names().join(", "));
            println!("    Defaults: {}", default_properties(kind));
        }
        println!();
    }
}

fn handle_codes() {
    println!("Warning codes:\n");
    for code in WarningCode::ALL {
        println!("  {:<18} {}", code.as_str(), code.severity());
    }
}
