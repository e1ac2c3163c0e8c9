//! `sweep-reminders`: a single scheduler tick run by hand.

use std::sync::Arc;

use dealbot_core::AppConfig;
use dealbot_deals::{PgDealStore, SessionManager};
use dealbot_geo::PostalIndex;
use dealbot_reminders::{PgReminderStore, ReminderScheduler};
use dealbot_server::scheduler::{run_sweep, SweepGuard};
use dealbot_server::{
    BotRegistry, DefaultRuntimeBuilder, PgBotConfigSource, WhatsAppReminderSink,
    DEFAULT_GRAPH_BASE_URL,
};

pub(crate) async fn run_sweep_reminders(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    dry_run: bool,
) -> anyhow::Result<()> {
    let reminders = ReminderScheduler::new(Arc::new(PgReminderStore::new(pool.clone())))
        .with_batch_size(config.reminder_batch_size);

    if dry_run {
        let due = reminders.sweep().await?;
        println!("dry-run: {} reminder(s) due", due.len());
        for reminder in &due {
            println!(
                "  {} {} {}",
                reminder.reminder_time.format("%Y-%m-%d %H:%M UTC"),
                reminder.user_id,
                reminder.title
            );
        }
        return Ok(());
    }

    let config = Arc::new(config.clone());
    // Delivery never resolves locations, so the runtimes get an empty index.
    let builder = DefaultRuntimeBuilder {
        config: Arc::clone(&config),
        store: Arc::new(PgDealStore::new(pool.clone())),
        index: Arc::new(PostalIndex::default()),
        sessions: Arc::new(SessionManager::in_memory()),
        graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
    };
    let bots = Arc::new(BotRegistry::new(
        Arc::new(PgBotConfigSource::new(pool.clone())),
        Arc::new(builder),
    ));
    let sink = WhatsAppReminderSink::new(bots);

    match run_sweep(&reminders, &sink, &SweepGuard::default()).await? {
        Some(report) => println!(
            "delivered {}, failed {}, abandoned {}{}",
            report.delivered,
            report.failed,
            report.abandoned,
            if report.deferred { ", more pending" } else { "" }
        ),
        None => println!("sweep skipped"),
    }
    Ok(())
}
