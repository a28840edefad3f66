use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use backoffice_dashboard::backoffice::{AdminActions, ClientDraft};
use backoffice_dashboard::classifier::Classify;
use backoffice_dashboard::config::AppConfig;
use backoffice_dashboard::feed::{AdminDashboard, DashboardFeed, DashboardState, ReferenceClock};
use backoffice_dashboard::intake::ContactSubmission;
use backoffice_dashboard::logging::{init_logging, OperationTimer};
use backoffice_dashboard::metrics::MetricsCollector;
use backoffice_dashboard::models::FromDocument;
use backoffice_dashboard::report::{render, DashboardReport, ReportFormat, ReportSection};
use backoffice_dashboard::snapshot_file::{load_documents, load_documents_or_empty, save_documents};
use backoffice_dashboard::store::{InMemoryRecordStore, RecordWriter};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file layered over the defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SummaryArgs {
    /// Messages snapshot (JSON array of documents)
    #[arg(short, long)]
    messages: Option<PathBuf>,

    /// Clients snapshot (JSON array of documents)
    #[arg(long)]
    clients: Option<PathBuf>,

    /// Days covered by the activity series
    #[arg(short, long)]
    window: Option<u32>,

    /// Entries in the recent lists
    #[arg(short, long)]
    recent: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Reference time (RFC 3339, or YYYY-MM-DD for noon that day)
    #[arg(long)]
    reference: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dashboard for exported messages and clients
    Summary(SummaryArgs),
    /// Store a contact form submission in a messages snapshot
    SubmitContact {
        /// Messages snapshot to update
        #[arg(short, long)]
        messages: PathBuf,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        company: Option<String>,

        /// Low, Normal, High or Critical
        #[arg(long)]
        urgency: Option<String>,

        #[arg(long)]
        message: String,
    },
    /// Mark a message read, or unread with --unread
    MarkMessage {
        /// Messages snapshot to update
        #[arg(short, long)]
        messages: PathBuf,

        /// Message id
        #[arg(long)]
        id: String,

        #[arg(long)]
        unread: bool,
    },
    /// Create or update a client in a clients snapshot
    SaveClient {
        /// Clients snapshot to update
        #[arg(long)]
        clients: PathBuf,

        /// Existing client id; a new client is created when omitted
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        company: Option<String>,

        /// new, active, paused or inactive
        #[arg(long)]
        status: Option<String>,
    },
    /// Create or refresh the client behind a message
    ClientFromMessage {
        #[arg(short, long)]
        messages: PathBuf,

        #[arg(long)]
        clients: PathBuf,

        /// Message id
        #[arg(long)]
        id: String,
    },
    /// Validate and print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Initialize logging
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _log_guard = init_logging(Some(&config.get_log_level()), &config.logging.format, log_file)?;

    if let Err(e) = MetricsCollector::init() {
        warn!("Metrics recorder not installed: {}", e);
    }

    info!("Starting backoffice-dashboard");

    // Process command
    match cli.command {
        Commands::Summary(args) => summary(config, args).await?,
        Commands::SubmitContact {
            messages,
            name,
            email,
            company,
            urgency,
            message,
        } => {
            let submission = ContactSubmission {
                name,
                email,
                company,
                urgency,
                message,
            };
            let id = with_snapshots(&config, Some(messages.as_path()), None, |actions| {
                Ok(actions.submit_contact(&submission)?)
            })?;
            println!("{id}");
        }
        Commands::MarkMessage {
            messages,
            id,
            unread,
        } => {
            with_snapshots(&config, Some(messages.as_path()), None, |actions| {
                Ok(actions.set_read(&id, !unread)?)
            })?;
        }
        Commands::SaveClient {
            clients,
            id,
            name,
            email,
            company,
            status,
        } => {
            let draft = ClientDraft {
                name,
                email,
                company,
                status,
            };
            let saved = with_snapshots(&config, None, Some(clients.as_path()), |actions| {
                Ok(actions.save_client(&draft, id.as_deref())?)
            })?;
            println!("{saved}");
        }
        Commands::ClientFromMessage {
            messages,
            clients,
            id,
        } => {
            let client = with_snapshots(&config, Some(messages.as_path()), Some(clients.as_path()), |actions| {
                Ok(actions.upsert_client_from_message(&id)?)
            })?;
            println!("{client}");
        }
        Commands::CheckConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            println!("Configuration is valid");
        }
    }

    Ok(())
}

/// Aggregate exported snapshots and print the dashboard
async fn summary(mut config: AppConfig, args: SummaryArgs) -> Result<()> {
    let timer = OperationTimer::new("summary");

    if let Some(window) = args.window {
        config.dashboard.window_days = window;
    }
    if let Some(recent) = args.recent {
        config.dashboard.recent_cap = recent;
    }
    config.validate()?;

    let clock = ReferenceClock::from_offset_minutes(config.dashboard.utc_offset_minutes)?;
    let generated_at = reference_time(args.reference.as_deref(), clock)?;

    let store = InMemoryRecordStore::new();
    if let Some(path) = &args.messages {
        let documents = load_documents(path)
            .with_context(|| format!("Failed to read messages from {}", path.display()))?;
        store.seed(&config.dashboard.messages_collection, documents)?;
    }
    if let Some(path) = &args.clients {
        let documents = load_documents(path)
            .with_context(|| format!("Failed to read clients from {}", path.display()))?;
        store.seed(&config.dashboard.clients_collection, documents)?;
    }

    let dashboard = AdminDashboard::open_with_clock(
        &store,
        &config.dashboard,
        ReferenceClock::Frozen(generated_at),
    )?;

    let report = DashboardReport {
        generated_at,
        messages: settled_section(dashboard.messages()).await?,
        clients: settled_section(dashboard.clients()).await?,
    };

    debug!("{}", dashboard.messages().metrics().get_summary());
    dashboard.close();

    println!("{}", render(&report, args.format)?);
    timer.finish();
    Ok(())
}

/// Wait for the first snapshot or error of a feed
async fn settled_section<R>(feed: &DashboardFeed<R>) -> Result<ReportSection>
where
    R: FromDocument + Classify + Clone + 'static,
{
    let mut state = feed.watch();
    let settled = tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|state: &DashboardState| !state.is_loading()),
    )
    .await
    .context("Timed out waiting for a snapshot")?
    .context("Dashboard feed closed")?
    .clone();

    Ok(ReportSection::from_state(feed.collection(), &settled))
}

/// Resolve the report's reference time in the configured zone
fn reference_time(reference: Option<&str>, clock: ReferenceClock) -> Result<DateTime<FixedOffset>> {
    let now = match clock {
        ReferenceClock::Fixed(offset) => Utc::now().with_timezone(&offset),
        ReferenceClock::Frozen(at) => at,
        ReferenceClock::Local => Local::now().fixed_offset(),
    };

    let Some(text) = reference else {
        return Ok(now);
    };

    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at);
    }

    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("Invalid reference time: {text}"))?;
    date.and_hms_opt(12, 0, 0)
        .and_then(|noon| noon.and_local_timezone(*now.offset()).single())
        .with_context(|| format!("Invalid reference time: {text}"))
}

/// Load the given snapshot files into a store, run `action` and write the
/// collections back
fn with_snapshots<T>(
    config: &AppConfig,
    messages: Option<&Path>,
    clients: Option<&Path>,
    action: impl FnOnce(&mut AdminActions<InMemoryRecordStore>) -> Result<T>,
) -> Result<T> {
    let store = InMemoryRecordStore::new();
    let collections = [
        (messages, config.dashboard.messages_collection.as_str()),
        (clients, config.dashboard.clients_collection.as_str()),
    ];

    for (path, collection) in collections {
        if let Some(path) = path {
            let documents = load_documents_or_empty(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            store.seed(collection, documents)?;
        }
    }

    let mut actions = AdminActions::new(store, &config.dashboard);
    let value = action(&mut actions)?;

    for (path, collection) in collections {
        if let Some(path) = path {
            let documents = actions.writer().documents(collection)?;
            save_documents(&documents, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    debug!("{}", actions.metrics().get_summary());
    Ok(value)
}
