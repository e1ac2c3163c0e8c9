mod deals;
mod postal;
mod reminders;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dealbot_core::Category;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dealbot-cli")]
#[command(about = "Deal bot operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Load the postal directory CSV into the `postal_codes` table
    IngestPostal {
        /// Path to the CSV export; defaults to `DEALBOT_POSTAL_CSV_PATH`
        csv: Option<PathBuf>,
        /// Parse and report without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one deal lookup for a point and print the results
    FindDeals {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// food, groceries, fashion or events
        #[arg(long)]
        category: Category,
        /// Bot whose keys to use; optional when only one bot is configured
        #[arg(long)]
        phone_number_id: Option<String>,
        /// Maximum deals to print; defaults to `DEALBOT_DEALS_PER_PAGE`
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run one reminder sweep and exit
    SweepReminders {
        /// List due reminders without delivering them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("dealbot-cli: pass --help to list commands");
        return Ok(());
    };

    let config = dealbot_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = dealbot_db::PoolConfig::from_app_config(&config);
    let pool = dealbot_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            dealbot_db::health_check(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = dealbot_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::IngestPostal { csv, dry_run } => {
            let path = csv.unwrap_or_else(|| config.postal_csv_path.clone());
            postal::run_ingest_postal(&pool, &config, &path, dry_run).await?;
        }
        Commands::FindDeals {
            lat,
            lon,
            category,
            phone_number_id,
            limit,
        } => {
            let limit = limit.unwrap_or(config.deals_per_page);
            deals::run_find_deals(
                &pool,
                &config,
                lat,
                lon,
                category,
                phone_number_id.as_deref(),
                limit,
            )
            .await?;
        }
        Commands::SweepReminders { dry_run } => {
            reminders::run_sweep_reminders(&pool, &config, dry_run).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
