use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use palisade::{
    audit,
    config::{GatewayConfig, LogFormat},
    routes, AppState,
};

#[derive(Parser)]
#[command(name = "palisade", about = "Security gateway for internal APIs", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the configuration file.
    #[arg(short, long, global = true, default_value = "palisade.toml")]
    config: PathBuf,

    /// Override the configured log filter.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway (default).
    Serve,
    /// Write a starter configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Validate the configuration file and exit.
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Init { force } => init(&cli.config, force),
        Command::Check => check(&cli.config),
        Command::Serve => serve(&cli.config, cli.log_level.as_deref()).await,
    }
}

async fn serve(config_path: &PathBuf, log_level: Option<&str>) -> ExitCode {
    let config = match GatewayConfig::from_file(config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Configuration error: {error}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(
        log_level.unwrap_or(&config.observability.log_level),
        config.observability.log_format,
    );

    let sink = match audit::sink_from_config(&config.audit) {
        Ok(sink) => sink,
        Err(error) => {
            tracing::error!(error = %error, "Failed to open audit sink");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(sink = sink.name(), "Audit sink ready");

    let bind_addr = std::net::SocketAddr::new(config.server.host, config.server.port);
    let state = match AppState::new(config, sink, Some(config_path.clone())) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!(error = %error, "Failed to build gateway state");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        tenants = state.policy.snapshot().tenant_count(),
        backend = %state.config.backend.base_url,
        "Gateway configured"
    );

    let app = routes::router(state);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(address = %bind_addr, error = %error, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(address = %bind_addr, "Gateway listening");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %error, "Server error");
        return ExitCode::FAILURE;
    }
    tracing::info!("Gateway stopped");
    ExitCode::SUCCESS
}

fn check(config_path: &PathBuf) -> ExitCode {
    match GatewayConfig::from_file(config_path) {
        Ok(config) => {
            println!(
                "{}: OK ({} tenants, {} credentials)",
                config_path.display(),
                config.tenants.policies.len(),
                config.credentials.keys.len()
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}: {error}", config_path.display());
            ExitCode::FAILURE
        }
    }
}

fn init(config_path: &PathBuf, force: bool) -> ExitCode {
    if config_path.exists() && !force {
        eprintln!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
        return ExitCode::FAILURE;
    }
    if let Err(error) = std::fs::write(config_path, DEFAULT_CONFIG) {
        eprintln!("Failed to write {}: {error}", config_path.display());
        return ExitCode::FAILURE;
    }
    println!("Wrote {}", config_path.display());
    ExitCode::SUCCESS
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

const DEFAULT_CONFIG: &str = r#"# Palisade gateway configuration.
# Values of the form ${VAR} are read from the environment at load time.

[server]
host = "127.0.0.1"
port = 8080
# Uncomment to enable POST /admin/reload.
# admin_key = "${PALISADE_ADMIN_KEY}"

[backend]
base_url = "http://localhost:8000"
api_key = "${BACKEND_API_KEY}"
timeout_secs = 30

[credentials]
# Principals allowed to hold the system_admin role. Leave empty to allow
# any credential whose roles include it.
allowed_admins = []

[[credentials.keys]]
principal = "alice"
key = "${ALICE_GATEWAY_KEY}"
roles = ["org_admin"]
tenant = "acme"

[[tenants.policies]]
id = "acme"
admins = ["alice"]
operations = ["modules.list", "modules.deploy"]

[limits]
rate_limit = { max_requests = 60, window_secs = 60 }

[audit]
sink = "file"
path = "palisade-audit.jsonl"

[observability]
log_level = "info"
log_format = "pretty"
"#;
