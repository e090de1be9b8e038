//! Channel digest server binary.
//!
//! Start the server with:
//! ```bash
//! GOOGLE_API_KEY=xxx SCRAPER_BRIDGE_URL=http://127.0.0.1:9000 cargo run -p digest-server
//! ```

use std::sync::Arc;

use clap::Parser;
use digest_api::{serve, ApiConfig, AppState};
use digest_core::{AppConfig, JobRegistry, Reclaimer, RetentionService};
use digest_persistence::RetentionSweeper;
use digest_server::{build_pipeline, log_filter};
use digest_telegram::{BotConfig, BotState, DigestBot};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Channel digest server - scrape channels and generate reports over HTTP and Telegram
#[derive(Parser, Debug)]
#[command(name = "digest-server")]
#[command(about = "REST API and Telegram bot for channel digest reports")]
struct Args {
    /// Host to bind (overrides DIGEST_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides DIGEST_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not start the Telegram bot even if TELEGRAM_BOT_TOKEN is set
    #[arg(long)]
    no_bot: bool,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Resolves once the shutdown flag is raised.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new(log_filter(args.verbose)).unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = AppConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    info!(
        data_dir = %config.data_dir.display(),
        offset_hours = config.utc_offset_hours,
        today_cache_max_age_secs = config.today_cache_max_age.as_secs(),
        "starting digest server"
    );
    if config.scraper_bridge_url.is_none() {
        warn!("SCRAPER_BRIDGE_URL is not set; scrape requests will fail until it is configured");
    }

    let registry = Arc::new(JobRegistry::new());
    let pipeline = build_pipeline(&config, Arc::clone(&registry))?;

    // Background maintenance
    let mut reclaimer = Reclaimer::new(Arc::clone(&registry), config.reclaimer_config());
    if config.memory_cleanup_enabled {
        reclaimer.start()?;
    } else {
        info!("memory cleanup loop disabled");
    }

    let mut retention = RetentionService::new(RetentionSweeper::new(config.retention_config()));
    if config.file_cleanup_enabled {
        retention.start()?;
    } else {
        info!("file cleanup loop disabled");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    // Telegram bot
    let bot_handle = match (&config.telegram_bot_token, args.no_bot) {
        (Some(_), false) => {
            let bot_state = Arc::new(BotState::new(
                Arc::new(pipeline.clone()),
                BotConfig::new()
                    .with_allowed_users(config.allowed_users.iter().copied())
                    .with_rate_limit(config.bot_rate_limit),
            ));
            let bot = DigestBot::new(config.telegram_bot_token.clone(), bot_state)?;
            match bot.get_me().await {
                Ok(username) => info!(username = %username, "bot initialized"),
                Err(e) => warn!(error = %e, "could not fetch bot info"),
            }
            Some(tokio::spawn(bot.run(wait_for_shutdown(shutdown_rx.clone()))))
        }
        (Some(_), true) => {
            info!("Telegram bot disabled by --no-bot");
            None
        }
        (None, _) => {
            info!("TELEGRAM_BOT_TOKEN not set, bot disabled");
            None
        }
    };

    // REST API
    let api_config = ApiConfig::new(config.host.clone(), config.port)
        .with_admin_token(config.admin_token.clone());
    let state = AppState::new(
        api_config.clone(),
        pipeline,
        config.reclaimer_config(),
        retention.sweeper(),
    )
    .with_reclaim_cycles(reclaimer.cycle_reports());
    let served = serve(api_config, state, wait_for_shutdown(shutdown_rx.clone())).await;
    if let Err(e) = &served {
        error!(error = %e, "API server stopped with an error");
    }

    // Drain
    if let Some(handle) = bot_handle {
        if served.is_err() {
            handle.abort();
        }
        match handle.await {
            Err(e) if !e.is_cancelled() => warn!(error = %e, "bot task failed"),
            _ => {}
        }
    }
    if reclaimer.is_started() {
        reclaimer.shutdown().await?;
    }
    if retention.is_started() {
        retention.shutdown().await?;
    }
    let report = reclaimer.force_reclaim_now().await;
    info!(
        evicted = report.evicted,
        remaining_jobs = registry.len().await,
        "final reclaim done, server stopped"
    );

    served?;
    Ok(())
}
