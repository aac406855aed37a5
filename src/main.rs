use anyhow::Result;
use clap::Parser;
use gpumon::cli::{Cli, Command};
use gpumon::collector::CollectionLoop;
use gpumon::device_query::CommandRunner;
use gpumon::store::JsonSegmentStore;
use gpumon::validator::Validator;
use gpumon::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Command::Version = cli.command {
        println!("{} {}", version::NAME, version::VERSION);
        return Ok(());
    }

    let mut app_config = config::AppConfig::load()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&app_config.logging.level));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Monitor { output } => {
            if let Some(output) = output {
                app_config.monitoring.output_path = output.to_string_lossy().into_owned();
            }
            monitor(app_config).await
        }
        Command::Analyze { input, hosts } => analyze(&app_config, &input, &hosts),
        Command::Version => Ok(()),
    }
}

async fn monitor(app_config: config::AppConfig) -> Result<()> {
    let visibility = std::env::var(&app_config.device_query.visibility_env).ok();
    let runner = CommandRunner::new(app_config.device_query.command.clone());
    let sink = JsonSegmentStore::new(&app_config.monitoring.output_path);

    let mut collection =
        CollectionLoop::start(runner, sink, &app_config, visibility.as_deref()).await?;
    let interrupt = collection.interrupt_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Received shutdown signal");
        interrupt.interrupt();
    });

    let report = collection.run().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn analyze(app_config: &config::AppConfig, input: &std::path::Path, hosts: &[String]) -> Result<()> {
    let validator = Validator::new(app_config.validation.clone());
    let hosts = reducer::discover_hosts(input, hosts)?;
    let mut reports = Vec::with_capacity(hosts.len());
    for host in &hosts {
        match reducer::analyze_host(input, host, &app_config.analysis, &validator) {
            Ok(report) => reports.push(report),
            Err(e) => tracing::error!(host = %host, error = %e, "host analysis failed"),
        }
    }
    tracing::info!(analyzed = reports.len(), requested = hosts.len(), "analysis complete");
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
