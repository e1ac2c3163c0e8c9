use std::sync::Arc;

use anyhow::Context;
use dealbot_deals::{PgDealStore, PgSessionStore, SessionManager};
use dealbot_geo::PostalIndex;
use dealbot_reminders::{PgReminderStore, ReminderScheduler};
use dealbot_server::{
    build_app, scheduler, AppState, BotRegistry, Conversation, DefaultRuntimeBuilder,
    PgBotConfigSource, WhatsAppReminderSink, DEFAULT_GRAPH_BASE_URL,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(dealbot_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = dealbot_db::PoolConfig::from_app_config(&config);
    let pool = dealbot_db::connect_pool(&config.database_url, pool_config).await?;
    dealbot_db::run_migrations(&pool).await?;

    let index = Arc::new(load_postal_index(&pool, &config).await?);

    let sessions = Arc::new(SessionManager::new(Arc::new(PgSessionStore::new(
        pool.clone(),
    ))));
    let builder = DefaultRuntimeBuilder {
        config: Arc::clone(&config),
        store: Arc::new(PgDealStore::new(pool.clone())),
        index,
        sessions: Arc::clone(&sessions),
        graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
    };
    let bots = Arc::new(BotRegistry::new(
        Arc::new(PgBotConfigSource::new(pool.clone())),
        Arc::new(builder),
    ));

    let reminders = Arc::new(
        ReminderScheduler::new(Arc::new(PgReminderStore::new(pool.clone())))
            .with_batch_size(config.reminder_batch_size),
    );
    let sink = Arc::new(WhatsAppReminderSink::new(Arc::clone(&bots)));
    let _scheduler =
        scheduler::build_scheduler(Arc::clone(&reminders), sink, sessions, &config).await?;

    let conversation = Arc::new(Conversation::new(reminders, config.deals_per_page));
    let app = build_app(AppState {
        pool,
        bots,
        conversation,
        verify_token: config.webhook_verify_token.clone(),
    });

    tracing::info!(bind_addr = %config.bind_addr, env = %config.env, "dealbot server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// The `postal_codes` table when populated, otherwise the CSV export.
async fn load_postal_index(
    pool: &sqlx::PgPool,
    config: &dealbot_core::AppConfig,
) -> anyhow::Result<PostalIndex> {
    let index = PostalIndex::load_from_db(pool).await?;
    if !index.is_empty() {
        return Ok(index);
    }

    tracing::warn!(
        path = %config.postal_csv_path.display(),
        "postal_codes table is empty; loading the CSV export"
    );
    let (index, report) = PostalIndex::from_csv_path(&config.postal_csv_path)
        .with_context(|| format!("loading {}", config.postal_csv_path.display()))?;
    tracing::info!(
        ingested = report.ingested,
        skipped = report.skipped,
        "postal index loaded from CSV"
    );
    Ok(index)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
