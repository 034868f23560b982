//! Binary runner
//!
//! Initialises logging, resolves configuration, and runs commands for one
//! agent session.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::Cli;
use crate::diagnostics::{ErrorTraceExt, ResultTraceExt};
use crate::manager::TerminalManager;
use crate::settings::SettingsManager;
use crate::types::TerminalConfig;

#[cfg(feature = "otel")]
use opentelemetry::global;
#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otel")]
use opentelemetry_sdk::trace::SdkTracerProvider;

#[cfg(feature = "otel")]
static OTEL_PROVIDER: std::sync::OnceLock<SdkTracerProvider> = std::sync::OnceLock::new();

/// Shutdown OpenTelemetry provider (flush all pending spans)
#[cfg(feature = "otel")]
pub fn shutdown_otel() {
    if let Some(provider) = OTEL_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to shutdown OpenTelemetry provider: {:?}", e);
        }
    }
}

/// Shutdown OpenTelemetry provider (no-op when feature is disabled)
#[cfg(not(feature = "otel"))]
pub fn shutdown_otel() {}

#[cfg(feature = "otel")]
fn init_otel(endpoint: &str, service_name: &str) -> anyhow::Result<SdkTracerProvider> {
    use opentelemetry_sdk::Resource;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_owned())
                .build(),
        )
        .build();

    global::set_tracer_provider(provider.clone());

    Ok(provider)
}

/// Build an EnvFilter based on CLI args and RUST_LOG environment variable
///
/// Priority: RUST_LOG environment variable > CLI arguments (-v, -vv, -q)
fn build_env_filter(cli: &Cli) -> tracing_subscriber::EnvFilter {
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        if !rust_log.is_empty() {
            return tracing_subscriber::EnvFilter::new(rust_log);
        }
    }

    let level = cli.log_level();
    tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into())
}

fn fmt_layer<S, W>(cli: &Cli, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    if cli.json_logs {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

fn init_subscriber<W>(cli: &Cli, writer: W) -> anyhow::Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry()
        .with(build_env_filter(cli))
        .with(fmt_layer(cli, writer));

    #[cfg(feature = "otel")]
    {
        if let (true, Some(endpoint)) = (cli.is_otel_enabled(), cli.otel_endpoint.as_deref()) {
            let service_name = &cli.otel_service_name;
            eprintln!(
                "OpenTelemetry enabled: endpoint={}, service={}",
                endpoint, service_name
            );

            let provider = init_otel(endpoint, service_name)?;
            let tracer = provider.tracer("agent-terminal-pool");
            drop(OTEL_PROVIDER.set(provider));

            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
            return Ok(());
        }
    }

    registry.try_init()?;
    Ok(())
}

/// Initialize logging based on CLI arguments
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    if cli.is_diagnostic() {
        let log_path = cli.log_path();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(&log_path)?;
        eprintln!("Diagnostic mode: logging to {}", log_path.display());
        init_subscriber(cli, std::sync::Mutex::new(file))
    } else {
        init_subscriber(cli, std::io::stderr)
    }
}

/// Resolve the configuration for this run
///
/// Priority: CLI flags > environment > settings files > defaults.
pub fn resolve_config(cli: &Cli) -> TerminalConfig {
    let settings = SettingsManager::new(cli.project_dir());
    let mut config = settings.terminal_config();
    cli.apply_to(&mut config);
    config
}

/// Run the binary with parsed CLI arguments
pub async fn run_with_cli(cli: &Cli) -> anyhow::Result<()> {
    init_logging(cli)?;

    let config = resolve_config(cli);
    tracing::info!(
        version = %env!("CARGO_PKG_VERSION"),
        pid = %std::process::id(),
        adapter = %config.adapter,
        pool_size = config.pool_size,
        recycle_after = config.recycle_after,
        "Starting terminal pool"
    );

    let manager = Arc::new(TerminalManager::new(config)?);
    manager.initialize().await?;
    let maintenance = manager.start_maintenance();

    let result = tokio::select! {
        result = run_session(&manager, cli) => result,
        () = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    maintenance.stop().await;
    if let Err(e) = manager.shutdown().await {
        e.trace_error();
    }
    tracing::info!("Terminal pool stopped");

    result
}

async fn run_session(manager: &TerminalManager, cli: &Cli) -> anyhow::Result<()> {
    let session_id = manager.spawn_terminal(cli.profile()).await?;
    let mut stdout = tokio::io::stdout();
    let mut failures = 0usize;

    if cli.commands.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if !run_command(manager, &session_id, command, &mut stdout).await? {
                failures += 1;
            }
        }
    } else {
        for command in &cli.commands {
            if !run_command(manager, &session_id, command, &mut stdout).await? {
                failures += 1;
            }
        }
    }

    if cli.health {
        let status = manager.get_health_status().await;
        let json = serde_json::to_string_pretty(&status)?;
        stdout.write_all(json.as_bytes()).await.trace_context()?;
        stdout.write_all(b"\n").await.trace_context()?;
        stdout.flush().await.trace_context()?;
    }

    manager.terminate_terminal(&session_id).await?;

    if failures > 0 {
        anyhow::bail!("{failures} command(s) failed");
    }
    Ok(())
}

/// Run one command; `Ok(false)` when the command itself failed
async fn run_command<W>(
    manager: &TerminalManager,
    session_id: &str,
    command: &str,
    out: &mut W,
) -> anyhow::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    match manager.execute_command(session_id, command).await {
        Ok(output) => {
            if !output.is_empty() {
                out.write_all(output.as_bytes()).await.trace_context()?;
                out.write_all(b"\n").await.trace_context()?;
            }
            out.flush().await.trace_context()?;
            Ok(true)
        }
        Err(e) => {
            e.trace_error();
            eprintln!("{e}");
            Ok(false)
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
