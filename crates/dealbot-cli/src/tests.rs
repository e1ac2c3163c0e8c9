use super::*;

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["dealbot-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["dealbot-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn ingest_postal_path_is_optional() {
    let cli = Cli::try_parse_from(["dealbot-cli", "ingest-postal"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::IngestPostal {
            csv: None,
            dry_run: false
        })
    ));

    let cli =
        Cli::try_parse_from(["dealbot-cli", "ingest-postal", "data/sg.csv", "--dry-run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::IngestPostal {
            csv: Some(ref p),
            dry_run: true
        }) if p == &PathBuf::from("data/sg.csv")
    ));
}

#[test]
fn find_deals_parses_category_aliases() {
    let cli = Cli::try_parse_from([
        "dealbot-cli",
        "find-deals",
        "--lat",
        "1.3718",
        "--lon",
        "103.8995",
        "--category",
        "Grocery",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::FindDeals {
            category: Category::Groceries,
            phone_number_id: None,
            limit: None,
            ..
        })
    ));
}

#[test]
fn find_deals_rejects_unknown_category() {
    let result = Cli::try_parse_from([
        "dealbot-cli",
        "find-deals",
        "--lat",
        "1.3",
        "--lon",
        "103.8",
        "--category",
        "cars",
    ]);
    assert!(result.is_err());
}

#[test]
fn sweep_reminders_dry_run() {
    let cli = Cli::try_parse_from(["dealbot-cli", "sweep-reminders", "--dry-run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::SweepReminders { dry_run: true })
    ));
}

#[test]
fn postal_batches_hold_at_most_25_records() {
    assert_eq!(postal::INGEST_BATCH_SIZE, 25);
    assert_eq!(postal::batch_count(0), 0);
    assert_eq!(postal::batch_count(25), 1);
    assert_eq!(postal::batch_count(26), 2);
}
