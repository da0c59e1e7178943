//! tunekit - Main CLI Entry Point

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tunekit::{
    cli::{Args, Commands, Verbosity},
    config::Config,
    display::Reporter,
    errors::TuneError,
    execution::{build_executor, DiagnosticsSession, OptimizationSession},
    network::{HttpThroughputProbe, NetworkDiagnosticsEngine, OptimizeStep, PingProbe},
    pipeline::catalog::{default_tasks, filter_by_phase, NETWORK_RESET_ACTION},
    pipeline::{CancelToken, ChannelSink, RunConfig},
    profiler::{DiskQuery, HardwareProbe, SysinfoProbe, SystemProfiler},
    types::EndpointCandidate,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;

    let default_verbosity =
        Verbosity::from_name(&config.telemetry.default_verbosity).unwrap_or(Verbosity::Normal);
    let verbosity = args.verbosity_or(default_verbosity);
    init_tracing(verbosity);

    if args.no_color || !config.telemetry.color_output {
        colored::control::set_override(false);
    }

    let mut reporter = Reporter::new(verbosity, args.json)
        .with_progress_bars(config.telemetry.show_progress_bars);

    let outcome = match &args.command {
        Commands::Profile => return show_profile(&config, &reporter).await,
        Commands::Tasks => {
            reporter.show_tasks(&default_tasks());
            return Ok(());
        }
        Commands::Config { init, force } => return show_config(&args, &config, *init, *force),
        Commands::Optimize {
            aggressive,
            restore_point,
            dry_run,
            phases,
        } => {
            let cancel = watch_ctrl_c();
            let run_config = RunConfig::new()
                .with_aggressive(*aggressive || config.pipeline.aggressive)
                .with_restore_point(*restore_point || config.pipeline.create_restore_point)
                .with_cancel(cancel);
            run_optimize(&config, run_config, *dry_run, phases, &mut reporter).await
        }
        Commands::Network { optimize, targets } => {
            let cancel = watch_ctrl_c();
            run_network(&config, *optimize, targets, cancel, &mut reporter).await
        }
    };

    // Errors raised before the worker starts, or a worker that died, never
    // reached the event stream
    if let Err(e) = outcome {
        debug!(error = %e, "Run ended with a fatal error");
        if !reporter.error_reported() {
            reporter.show_error(&e.to_string());
        }
        let code = if matches!(e, TuneError::Cancelled) { 130 } else { 1 };
        std::process::exit(code);
    }

    Ok(())
}

/// Tracing goes to stderr; RUST_LOG overrides the verbosity flags
fn init_tracing(verbosity: Verbosity) {
    let default_filter = format!("tunekit={}", verbosity.tracing_level());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Cancel between steps on the first Ctrl-C
fn watch_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current step");
            token.cancel();
        }
    });
    cancel
}

async fn show_profile(config: &Config, reporter: &Reporter) -> Result<()> {
    let probe = SysinfoProbe::new(config.system_path());
    let snapshot = probe.snapshot().await.context("Hardware probe failed")?;

    let disk_probe = probe.clone();
    let path = config.system_path();
    let disk_free_gb = tokio::task::spawn_blocking(move || disk_probe.free_gb(&path)).await?;

    let profile = SystemProfiler::new()
        .with_settings(config.profiler.scoring.clone())
        .build_profile(&snapshot, disk_free_gb);
    reporter.show_profile(&snapshot, &profile);
    Ok(())
}

async fn run_optimize(
    config: &Config,
    run_config: RunConfig,
    dry_run: bool,
    phases: &[String],
    reporter: &mut Reporter,
) -> tunekit::Result<()> {
    let tasks = filter_by_phase(default_tasks(), phases);
    if dry_run {
        info!("Dry run: no action will be performed");
    }

    let probe = Arc::new(SysinfoProbe::new(config.system_path()));
    let session = OptimizationSession::new(
        probe.clone(),
        probe,
        build_executor(config, dry_run),
        tasks,
    )
    .with_profiler(SystemProfiler::new().with_settings(config.profiler.scoring.clone()))
    .with_system_path(config.system_path())
    .with_run_config(run_config);

    let (sink, receiver) = ChannelSink::new();
    let handle = session.spawn(sink);
    reporter.consume(receiver).await;
    handle.await??;
    Ok(())
}

async fn run_network(
    config: &Config,
    optimize: bool,
    targets: &[String],
    cancel: CancelToken,
    reporter: &mut Reporter,
) -> tunekit::Result<()> {
    let settings = config.network.clone();
    let candidates = if targets.is_empty() {
        settings.targets.clone()
    } else {
        targets
            .iter()
            .map(|address| EndpointCandidate::new(address.clone(), address.clone()))
            .collect()
    };

    let engine = NetworkDiagnosticsEngine::new(
        Arc::new(PingProbe::new(settings.ping_timeout())),
        Arc::new(HttpThroughputProbe::new(settings.probe_timeout())?),
    )
    .with_settings(settings);

    let mut session = DiagnosticsSession::new(Arc::new(engine), candidates).with_cancel(cancel);
    if optimize {
        session = session.with_optimize(OptimizeStep::new(
            build_executor(config, false),
            NETWORK_RESET_ACTION,
        ));
    }

    let (sink, receiver) = ChannelSink::new();
    let handle = session.spawn(sink);
    reporter.consume(receiver).await;
    handle.await??;
    Ok(())
}

fn show_config(args: &Args, config: &Config, init: bool, force: bool) -> Result<()> {
    let path: PathBuf = match args.config.clone().or_else(Config::default_path) {
        Some(path) => path,
        None => bail!("Cannot determine a configuration path; pass --config"),
    };

    if init {
        if path.exists() && !force {
            bail!("{} already exists; use --force to overwrite", path.display());
        }
        Config::default().save(&path)?;
        println!("{} Wrote default configuration to {}", "✓".green(), path.display());
        return Ok(());
    }

    println!("{}", format!("# {}", path.display()).dimmed());
    println!("{}", toml::to_string_pretty(config).context("Failed to render configuration")?);
    Ok(())
}
