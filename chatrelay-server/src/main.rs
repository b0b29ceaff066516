use std::sync::Arc;

use chatrelay_core::{
    create_booker, AgentPlatform, AzureAgentsClient, ChatStore, PgChatStore, RelayConfig,
};
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use chatrelay_server::http::{self, HttpState};
use chatrelay_server::subsystems::conversation::Conversations;
use chatrelay_server::subsystems::runner::RunWaitPolicy;
use chatrelay_server::subsystems::summarize::Summarizer;
use chatrelay_server::subsystems::sweeper;
use chatrelay_server::subsystems::tracker::ActiveThreads;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chatrelay.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present for local development
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match RelayConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.service.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Connect to DB
    let pool = match chatrelay_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match chatrelay_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ chatrelay DB health check passed");
        return Ok(());
    }

    let platform: Arc<dyn AgentPlatform> = Arc::new(AzureAgentsClient::new(&config.agents)?);
    let store: Arc<dyn ChatStore> = Arc::new(PgChatStore::new(pool, &config.database)?);
    let booker = create_booker(&config.booking)?;
    let policy = RunWaitPolicy::from(&config.run_wait);
    let active = ActiveThreads::new();

    let summarizer = Arc::new(
        Summarizer::create(
            platform.clone(),
            store.clone(),
            config.agents.data_agent_id.clone(),
            config.agents.summary_agent_id.clone(),
            policy,
        )
        .await?,
    );

    tracing::info!(
        data_agent = %config.agents.data_agent_id,
        summary_agent = %config.agents.summary_agent_id,
        booker = booker.name(),
        "Agents configured"
    );

    let conversations = Arc::new(Conversations::new(
        platform,
        store,
        booker,
        summarizer.clone(),
        active.clone(),
        config.agents.data_agent_id.clone(),
        policy,
        config.timezone(),
    ));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Spawn idle-conversation sweeper
    let sweeper_task = tokio::spawn(sweeper::run_sweeper(
        active,
        summarizer,
        config.sweeper.clone(),
        tx.subscribe(),
    ));

    let state = Arc::new(HttpState { conversations });
    let http_result = http::start_http_server(state, config.http.clone(), tx.subscribe()).await;

    // HTTP server exited on its own (e.g. bind failure); stop the sweeper too
    let _ = tx.send(());
    let _ = sweeper_task.await;

    http_result
}
