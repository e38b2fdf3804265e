//! Update Orchestrator - Main entry point

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use update_orchestrator::cli::{Cli, Commands};
use update_orchestrator::config::Settings;
use update_orchestrator::gate::ConsoleOperator;
use update_orchestrator::paths::{RunCalendar, derive_backup_path};
use update_orchestrator::remote::powershell::{SECRET_ENV, USER_ENV};
use update_orchestrator::remote::{PowerShellTransport, RemoteTransport, SimulatedTransport};
use update_orchestrator::run_log::{RunLog, summarize_file};
use update_orchestrator::sequencer::{Orchestrator, SequencerState};
use update_orchestrator::types::{Credentials, ServiceState};
use update_orchestrator::workflow::Workflow;

/// Initialize tracing; diagnostics go to stderr so stdout stays the operator's
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);
    debug!("CLI arguments parsed");

    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("WARNING - run interrupted by operator");
        std::process::exit(130);
    }) {
        warn!("Failed to install interrupt handler: {}", e);
    }

    let result = match cli.command {
        Commands::Run {
            config,
            dry_run,
            username,
        } => run_workflow(&config, dry_run, username),
        Commands::Validate { config } => validate_settings(&config).map(|()| 0),
        Commands::Plan { config } => print_plan(&config).map(|()| 0),
        Commands::Summarize { log } => summarize_log(&log).map(|()| 0),
        Commands::BackupPath {
            root,
            prefix,
            month,
            year,
            sub_area,
        } => {
            let path = derive_backup_path(&root, &prefix, &month, &year, &sub_area);
            println!("{}", path.display());
            Ok(0)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn load_settings(path: &Path) -> Result<Settings> {
    info!("Loading settings from {:?}", path);
    let settings = Settings::load_from_file(path)?;
    settings
        .validate()
        .with_context(|| format!("Invalid settings in {:?}", path))?;
    Ok(settings)
}

fn validate_settings(path: &Path) -> Result<()> {
    let settings = load_settings(path)?;
    println!(
        "✓ Settings are valid: {} host(s), service '{}'",
        settings.all_hosts().len(),
        settings.service_name
    );
    Ok(())
}

fn print_plan(path: &Path) -> Result<()> {
    let settings = load_settings(path)?;
    let workflow = Workflow::from_settings(&settings, &RunCalendar::today());
    print!("{}", workflow.describe());
    Ok(())
}

fn summarize_log(path: &Path) -> Result<()> {
    let summary = summarize_file(path)
        .with_context(|| format!("Cannot summarize log {:?}", path))?;
    print!("{}", summary.render());
    Ok(())
}

/// Credentials are read once per run and never logged
fn acquire_credentials(username: Option<String>, dry_run: bool) -> Result<Credentials> {
    let username = username
        .or_else(|| std::env::var(USER_ENV).ok())
        .unwrap_or_default();
    let secret = std::env::var(SECRET_ENV).unwrap_or_default();

    if !dry_run {
        if username.is_empty() {
            bail!("No username given (use --username or set {})", USER_ENV);
        }
        if secret.is_empty() {
            bail!("No secret available (set {})", SECRET_ENV);
        }
    }
    Ok(Credentials::new(username, secret))
}

/// Simulated fleet: every configured host reachable with the service running
fn simulated_fleet(settings: &Settings) -> SimulatedTransport {
    let mut transport = SimulatedTransport::new();
    for host in settings.service_hosts() {
        transport =
            transport.with_service(host.name(), &settings.service_name, ServiceState::Running);
    }
    for host in settings.fleet_hosts() {
        transport = transport.with_host(host.name());
    }
    transport
}

fn run_workflow(config: &Path, dry_run: bool, username: Option<String>) -> Result<u8> {
    let settings = load_settings(config)?;
    let credentials = acquire_credentials(username, dry_run)?;
    let workflow = Workflow::from_settings(&settings, &RunCalendar::today());

    let mut transport: Box<dyn RemoteTransport> = if dry_run {
        info!("Dry run: using simulated transport");
        Box::new(simulated_fleet(&settings))
    } else {
        Box::new(PowerShellTransport::new())
    };
    let mut operator = ConsoleOperator;
    let mut log = RunLog::open(Path::new(&settings.log_root));

    let report = Orchestrator::new(
        transport.as_mut(),
        &mut operator,
        &credentials,
        settings.settle_interval(),
    )
    .run(&workflow, &mut log);

    match &report.summary {
        Ok(summary) => print!("\n{}", summary.render()),
        Err(e) => eprintln!("NOTICE: summary unavailable: {}", e),
    }

    if report.aborted_at_gate() {
        eprintln!("✗ Run aborted at the validation gate");
    } else if report.final_state == SequencerState::Aborted {
        eprintln!(
            "✗ Run aborted after {} of {} step(s)",
            report.run.outcomes.len(),
            workflow.steps().len()
        );
    }
    if let Some(path) = &report.run.log_path {
        info!("Run log: {}", path.display());
    }
    for step in report.run.problem_steps() {
        warn!("step {} ({}) ended {}", step.ordinal, step.label, step.overall());
    }

    Ok(report.exit_code())
}
