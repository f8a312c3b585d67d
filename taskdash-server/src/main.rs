use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod motion;
mod service;
mod web;

use config::{Config, Overrides};
use motion::{MotionClient, TaskSource};
use service::TaskService;
use web::{AppState, PageTemplate};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "taskdash", version, about = "Current and next task from Motion, on one page")]
struct Cli {
    /// Config file (default: ~/.taskdash/config.toml)
    #[arg(long = "config", global = true, env = "TASKDASH_CONFIG")]
    config_file: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(flatten)]
    serve: ServeArgs,

    /// Without a subcommand the dashboard server runs.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Motion API key
    #[arg(long, env = "MOTION_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Motion API base URL
    #[arg(long, env = "MOTION_BASE_URL")]
    base_url: Option<String>,

    /// Web server port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Directory holding index.html
    #[arg(long = "templates")]
    templates_dir: Option<PathBuf>,

    /// Timezone for rendered times (IANA name)
    #[arg(long, env = "TASKDASH_TIMEZONE")]
    timezone: Option<String>,

    /// Task refresh interval, e.g. "60s" or "5m"
    #[arg(long = "refresh", env = "REFRESH_INTERVAL", value_parser = humantime::parse_duration)]
    refresh_interval: Option<Duration>,
}

impl ServeArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            port: self.port,
            templates_dir: self.templates_dir.clone(),
            timezone: self.timezone.clone(),
            refresh_interval: self.refresh_interval,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,

    /// Print the effective configuration
    Show,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config_path = match cli.config_file {
        Some(p) => p,
        None => config::default_config_path()?,
    };
    let mut cfg = config::load_config(&config_path)?;
    cfg.apply(cli.serve.overrides());

    match cli.command {
        Some(Command::Config { command }) => match command {
            ConfigCommand::Init => config::init_config(&config_path)?,
            ConfigCommand::Show => show_config(&cfg, cli.serve.api_key.as_deref())?,
        },
        None => {
            if let Err(e) = run_server(&cfg, cli.serve.api_key.as_deref()).await {
                tracing::error!(error = ?e, "taskdash exited with error");
                return Err(e);
            }
        }
    }

    Ok(())
}

fn show_config(cfg: &Config, api_key: Option<&str>) -> Result<()> {
    print!("{}", toml::to_string_pretty(cfg).context("serialize config")?);
    match api_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(k) => println!("\n# api key: set ({} chars)", k.len()),
        None => println!("\n# api key: NOT SET (use --api-key or MOTION_API_KEY)"),
    }
    Ok(())
}

async fn run_server(cfg: &Config, api_key: Option<&str>) -> Result<()> {
    let settings = cfg.settings(api_key)?;
    info!(build = env!("TASKDASH_BUILD_SHA"), "taskdash starting");

    let page = PageTemplate::load(&settings.templates_dir)?;

    let client = MotionClient::new(
        settings.api_key.clone(),
        settings.base_url.clone(),
        settings.timeout,
        settings.max_pages,
    )?;
    client
        .validate_api_key()
        .await
        .context("API key validation failed")?;

    let source: Arc<dyn TaskSource> = Arc::new(client);
    let service = Arc::new(TaskService::new(source).with_cache_ttl(settings.cache_ttl));

    info!(refresh_interval = ?settings.refresh_interval, "fetching initial task data");
    service
        .refresh()
        .await
        .context("error fetching initial tasks")?;
    info!(last_update = ?service.last_update().await, "initial task data loaded");

    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(cancel.clone()));

    let refresher = service.spawn_periodic_refresh(cancel.child_token(), settings.refresh_interval);
    let heartbeat = tokio::spawn(web::run_heartbeat(cancel.child_token(), HEARTBEAT_INTERVAL));

    let listener = TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("binding port {}", settings.port))?;
    let state = AppState {
        service,
        page: Arc::new(page),
        timezone: settings.timezone,
    };

    let served = web::serve(listener, state, cancel.clone()).await;
    cancel.cancel();

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = refresher.await;
        let _ = heartbeat.await;
    })
    .await;
    if drained.is_err() {
        warn!(grace = ?SHUTDOWN_GRACE, "background tasks did not stop in time");
    }

    served?;
    info!("shutdown complete");
    Ok(())
}

/// Cancel `token` on SIGINT/Ctrl-C or SIGTERM.
async fn wait_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!(signal = "SIGINT", "shutdown signal received"),
                    _ = sigterm.recv() => info!(signal = "SIGTERM", "shutdown signal received"),
                }
            }
            Err(e) => {
                warn!(error = %e, "could not register SIGTERM handler");
                ctrl_c.await.ok();
                info!(signal = "SIGINT", "shutdown signal received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!(signal = "SIGINT", "shutdown signal received");
    }

    token.cancel();
}
