use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use shift_fill::config::{Config, ConfigOverrides};
use shift_fill::credential::{CredentialSlot, FileKeyValueStore};
use shift_fill::notify::sink_for;
use shift_fill::output::json::render_json;
use shift_fill::output::table::{render_preview, render_session_summary};
use shift_fill::recommender::HttpConnector;
use shift_fill::server::run_server;
use shift_fill::snapshot::{read_snapshot, FileSnapshotSource, SnapshotSource};
use shift_fill::{AssignmentSession, RecommendationClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "shift-fill",
    about = "Fill store-day staffing gaps with recommender-proposed shifts"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },
    Fill {
        #[arg(long, conflicts_with_all = ["store", "date"])]
        snapshot: Option<PathBuf>,
        #[arg(long, requires = "date")]
        store: Option<String>,
        #[arg(long, requires = "store")]
        date: Option<NaiveDate>,
    },
    Notify {
        text: String,
    },
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Subcommand)]
enum CredentialAction {
    Set { key: String },
    Clear,
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        endpoint: cli.endpoint.clone(),
        model: cli.model.clone(),
    });

    match &cli.command {
        Commands::Config { init, show } => {
            if *init {
                Config::write_template(&config_path)?;
                println!("Wrote config template to {}", config_path.display());
            }
            if *show || !*init {
                println!("{}", render_json(&config, true)?);
            }
            return Ok(());
        }
        Commands::Notify { text } => {
            let sink = sink_for(&config.notify.webhook_url)?;
            sink.send(text).await?;
            return Ok(());
        }
        _ => {}
    }

    let session = Arc::new(build_session(&config)?);
    session.restore()?;
    let snapshots: Arc<dyn SnapshotSource> =
        Arc::new(FileSnapshotSource::new(config.resolved_snapshot_root()));

    match &cli.command {
        Commands::Credential { action } => match action {
            CredentialAction::Set { key } => {
                session.set_credential(key.trim()).await?;
                println!("Credential validated and stored.");
            }
            CredentialAction::Clear => {
                session.clear_credential()?;
                println!("Credential cleared.");
            }
            CredentialAction::Status => match cli.output {
                OutputFormat::Table => print!("{}", render_session_summary(&session.view())),
                OutputFormat::Json => println!("{}", render_json(&session.view(), true)?),
            },
        },
        Commands::Fill {
            snapshot,
            store,
            date,
        } => {
            let input = match (snapshot, store, date) {
                (Some(path), _, _) => read_snapshot(path).await?,
                (None, Some(store), Some(date)) => snapshots.load_day(store, *date).await?,
                _ => return Err(anyhow!("either --snapshot or --store with --date is required")),
            };
            let preview = session.request_assignment(&input).await?;
            match cli.output {
                OutputFormat::Table => print!("{}", render_preview(&preview)),
                OutputFormat::Json => println!("{}", render_json(&preview, true)?),
            }
        }
        Commands::Serve { host, port } => {
            let host = host.clone().unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address {bind}"))?;
            info!(initialized = session.is_initialized(), "serving session");
            run_server(session, snapshots, addr).await?;
        }
        Commands::Config { .. } | Commands::Notify { .. } => {}
    }

    Ok(())
}

fn build_session(config: &Config) -> Result<AssignmentSession> {
    let connector = HttpConnector::from_config(&config.recommender)?;
    let store = FileKeyValueStore::open(&config.resolved_credential_path())?;
    let slot = CredentialSlot::new(Arc::new(store), config.credential.slot.clone());
    Ok(
        AssignmentSession::new(RecommendationClient::new(Arc::new(connector)), slot)
            .with_verified_coverage(config.coverage.verify_improvement),
    )
}
