//! `vidbir` binary: the bridge bot and the admin panel as subcommands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use vidbir_admin::{run_admin_server, AdminServerConfig, AdminServerState};
use vidbir_bot::{run_bridge, BridgeRuntimeConfig};
use vidbir_relay::{RelayGateway, StatusCoordinator, ThreadDirectory};
use vidbir_storage::{IntakeStore, SqliteIntakeStore};
use vidbir_telegram::{TelegramApiClient, TelegramApiConfig, TelegramRelayGateway};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(name = "vidbir", about = "Applicant intake and chat-relay bot", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the Telegram bridge (intake form, staff actions, relay).
    Bot(BotArgs),
    /// Run the web admin panel.
    Admin(AdminArgs),
}

#[derive(Debug, Args)]
struct SharedArgs {
    #[arg(long, env = "VIDBIR_BOT_TOKEN", help = "Telegram bot token")]
    bot_token: String,
    #[arg(
        long,
        env = "VIDBIR_GROUP_ID",
        allow_hyphen_values = true,
        help = "Staff group chat id (forum-enabled supergroup)"
    )]
    group_id: i64,
    #[arg(
        long,
        env = "VIDBIR_DB_PATH",
        default_value = "vidbir.db",
        help = "SQLite database path"
    )]
    db_path: String,
    #[arg(
        long,
        env = "VIDBIR_API_BASE",
        default_value = "https://api.telegram.org",
        help = "Bot API base URL"
    )]
    api_base: String,
    #[arg(
        long,
        env = "VIDBIR_TOKEN_TTL_SECONDS",
        default_value_t = 900,
        value_parser = parse_positive_u64,
        help = "Admin panel token lifetime in seconds"
    )]
    token_ttl_seconds: u64,
}

#[derive(Debug, Args)]
struct BotArgs {
    #[command(flatten)]
    shared: SharedArgs,
    #[arg(
        long,
        env = "VIDBIR_ADMIN_ID",
        help = "Primary admin Telegram user id"
    )]
    admin_id: i64,
    #[arg(
        long,
        env = "VIDBIR_PUBLIC_BASE_URL",
        help = "Public base URL for admin panel links"
    )]
    public_base_url: Option<String>,
    #[arg(
        long,
        env = "VIDBIR_POLL_TIMEOUT_SECONDS",
        default_value_t = 50,
        help = "getUpdates long-poll timeout in seconds"
    )]
    poll_timeout_seconds: u64,
    #[arg(
        long,
        env = "VIDBIR_POLL_RETRY_DELAY_MS",
        default_value_t = 3_000,
        value_parser = parse_positive_u64,
        help = "Delay before retrying a failed getUpdates call"
    )]
    poll_retry_delay_ms: u64,
    #[arg(
        long,
        env = "VIDBIR_ACCEPTANCE_TTL_SECONDS",
        default_value_t = 900,
        value_parser = parse_positive_u64,
        help = "How long a pending acceptance waits for metadata"
    )]
    acceptance_ttl_seconds: u64,
    #[arg(
        long,
        env = "VIDBIR_REQUEST_TIMEOUT_MS",
        default_value_t = 90_000,
        value_parser = parse_positive_u64,
        help = "Bot API request timeout (must exceed the poll timeout)"
    )]
    request_timeout_ms: u64,
}

#[derive(Debug, Args)]
struct AdminArgs {
    #[command(flatten)]
    shared: SharedArgs,
    #[arg(
        long,
        env = "VIDBIR_ADMIN_BIND",
        default_value = "127.0.0.1:8080",
        help = "Bind address for the panel server"
    )]
    bind: String,
    #[arg(
        long,
        env = "VIDBIR_ENFORCE_MEMBERSHIP",
        help = "Require panel operators to be current staff-group members"
    )]
    enforce_membership: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn build_client(shared: &SharedArgs, request_timeout_ms: u64) -> Result<TelegramApiClient> {
    TelegramApiClient::new(TelegramApiConfig {
        api_base: shared.api_base.clone(),
        bot_token: shared.bot_token.clone(),
        request_timeout_ms,
        ..TelegramApiConfig::default()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Bot(args) => run_bot(args).await,
        Command::Admin(args) => run_admin(args).await,
    }
}

async fn run_bot(args: BotArgs) -> Result<()> {
    let client = build_client(&args.shared, args.request_timeout_ms)?;
    let store: Arc<dyn IntakeStore> = Arc::new(SqliteIntakeStore::new(&args.shared.db_path)?);
    let gateway: Arc<dyn RelayGateway> = Arc::new(TelegramRelayGateway::new(
        client.clone(),
        args.shared.group_id,
    ));
    run_bridge(
        BridgeRuntimeConfig {
            group_id: args.shared.group_id,
            admin_id: args.admin_id,
            public_base_url: args.public_base_url,
            poll_timeout_seconds: args.poll_timeout_seconds,
            poll_retry_delay: Duration::from_millis(args.poll_retry_delay_ms),
            admin_token_ttl_seconds: args.shared.token_ttl_seconds,
            acceptance_ttl_seconds: args.acceptance_ttl_seconds,
        },
        client,
        store,
        gateway,
    )
    .await
}

async fn run_admin(args: AdminArgs) -> Result<()> {
    let client = build_client(&args.shared, 30_000)?;
    let store: Arc<dyn IntakeStore> = Arc::new(SqliteIntakeStore::new(&args.shared.db_path)?);
    let gateway: Arc<dyn RelayGateway> = Arc::new(TelegramRelayGateway::new(
        client.clone(),
        args.shared.group_id,
    ));
    let directory = ThreadDirectory::new(store.clone(), gateway);
    run_admin_server(AdminServerState {
        config: AdminServerConfig {
            bind: args.bind,
            group_id: args.shared.group_id,
            enforce_membership: args.enforce_membership,
            token_ttl_seconds: args.shared.token_ttl_seconds,
        },
        coordinator: StatusCoordinator::new(store.clone(), directory),
        store,
        client,
    })
    .await
}
