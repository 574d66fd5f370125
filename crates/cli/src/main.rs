mod config_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tokio::{net::TcpListener, sync::oneshot},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    wagpt_auto_reply::Dispatcher,
    wagpt_channels::ChatSession,
    wagpt_config::{Severity, WagptConfig},
    wagpt_gateway::{AppState, shutdown_signal},
    wagpt_metrics::{MetricsRecorderConfig, init_metrics},
    wagpt_providers::OpenAiProvider,
    wagpt_whatsapp::{SessionConfig, WhatsAppSession},
};

#[derive(Parser)]
#[command(
    name = "wagpt",
    version,
    about = "WhatsApp bridge that answers !chatgpt commands"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Defaults to debug in
    /// development and info elsewhere; RUST_LOG takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON. Always on outside development.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Health server port (overrides config and PORT).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Config file (default: ./wagpt.toml, then the user config dir).
    #[arg(long, global = true, env = "WAGPT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge (default when no subcommand is given).
    Run,
    /// Validate the configuration and report errors/warnings.
    CheckConfig {
        /// Show informational diagnostics too.
        #[arg(long)]
        verbose: bool,
    },
}

fn default_log_level(config: &WagptConfig) -> &'static str {
    if config.is_development() {
        "debug"
    } else {
        "info"
    }
}

fn init_telemetry(cli: &Cli, config: &WagptConfig) {
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| default_log_level(config));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs || !config.is_development() {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

async fn run(cli: &Cli, config: WagptConfig) -> anyhow::Result<()> {
    let diagnostics = wagpt_config::validate(&config)
        .into_result()
        .context("invalid configuration")?;
    for d in diagnostics {
        match d.severity {
            Severity::Warning => warn!(path = d.path, "{}", d.message),
            _ => info!(path = d.path, "{}", d.message),
        }
    }

    let port = cli.port.unwrap_or(config.server.port);
    let metrics = init_metrics(MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: vec![("service".into(), "wagpt".into())],
    })
    .context("failed to initialize metrics")?;

    let provider = Arc::new(OpenAiProvider::new(
        config.provider.api_key.clone(),
        config.provider.model.clone(),
        config.provider.base_url.clone(),
    ));

    let (session, inbound) = WhatsAppSession::new(SessionConfig {
        account_id: config.whatsapp.account_id.clone(),
        auth_dir: config.whatsapp.session_data_path.clone(),
        sidecar_port: config.whatsapp.sidecar_port,
        sidecar_dir: config.whatsapp.sidecar_dir.clone(),
        auto_start_sidecar: config.whatsapp.auto_start_sidecar,
        ..SessionConfig::default()
    });
    let session = Arc::new(session);

    let dispatcher = Arc::new(
        Dispatcher::new(Arc::clone(&session) as Arc<dyn ChatSession>, provider)
            .with_max_concurrent(config.dispatch.max_concurrent_requests),
    );
    tokio::spawn(dispatcher.run(inbound));

    let listener = TcpListener::bind((config.server.bind.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{port}", config.server.bind))?;
    info!(
        port,
        environment = %config.environment,
        model = %config.provider.model,
        "wagpt starting"
    );

    let (stop_server, server_stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(wagpt_gateway::serve(
        listener,
        AppState {
            version: env!("CARGO_PKG_VERSION"),
            session: session.observe(),
            metrics,
        },
        async {
            let _ = server_stopped.await;
        },
    ));

    // Login may wait on a QR scan; health stays reachable meanwhile.
    let initializing = Arc::clone(&session);
    tokio::spawn(async move {
        if let Err(e) = initializing.initialize().await {
            error!(error = %e, "failed to initialize whatsapp session");
        }
    });

    shutdown_signal().await;

    if let Err(e) = session.shutdown().await {
        warn!(error = %e, "whatsapp session did not shut down cleanly");
    }
    let _ = stop_server.send(());
    server.await.context("health server task failed")??;
    info!("wagpt stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let loaded = wagpt_config::load(cli.config.as_deref());
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => WagptConfig::default(),
    };
    init_telemetry(&cli, &config);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return Err(e).context("failed to load configuration");
        },
    };

    match cli.command {
        None | Some(Commands::Run) => run(&cli, config).await,
        Some(Commands::CheckConfig { verbose }) => config_commands::check(&config, verbose),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["wagpt", "--port", "8080", "--json-logs"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.port, Some(8080));
        assert!(cli.json_logs);
    }

    #[test]
    fn check_config_takes_verbose() {
        let cli = Cli::try_parse_from(["wagpt", "check-config", "--verbose"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::CheckConfig { verbose: true })
        ));
    }

    #[test]
    fn log_level_follows_environment() {
        let mut config = WagptConfig::default();
        assert_eq!(default_log_level(&config), "debug");
        config.environment = "production".into();
        assert_eq!(default_log_level(&config), "info");
    }

    #[test]
    fn missing_api_key_fails_check() {
        assert!(config_commands::check(&WagptConfig::default(), false).is_err());
    }
}
