// Leader draft entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database, store configured strategies
// 4. Import the leader CSV when configured
// 5. Register the configured roster
// 6. Run the configured engine for every active player
// 7. Print the offerings

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use leaderdraft_app::config;
use leaderdraft_app::db::{self, Database};
use leaderdraft_app::registration::register_players;
use leaderdraft_app::repo::PlayerRoster;
use leaderdraft_app::service::deadline_after;
use leaderdraft_app::{DraftService, Stores};
use leaderdraft_core::{draft_rng, StrategyRegistry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Leader draft starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: engine={:?}, strategy={}, {} strategies",
        config.draft.engine,
        config.draft.strategy,
        config.strategies.len()
    );

    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);

    for strategy in &config.strategies {
        db.save_strategy(strategy)
            .with_context(|| format!("failed to store strategy {}", strategy.name))?;
    }

    if let Some(csv) = &config.catalog.csv {
        let leaders = leaderdraft_app::catalog::load_leaders(Path::new(csv))
            .context("failed to load leader catalog")?;
        let imported = db
            .import_leaders(&leaders)
            .context("failed to import leader catalog")?;
        info!("Imported {} leaders from {}", imported, csv);
    }

    if !config.roster.players.is_empty() {
        let roster: Arc<dyn PlayerRoster> = db.clone();
        register_players(roster, config.roster.players.clone())
            .await
            .context("failed to register roster")?;
    }

    let service = DraftService::new(
        Stores::shared(db),
        StrategyRegistry::with_builtins(),
        config.shuffle,
    );
    let draft_id = db::generate_draft_id();
    let mut rng = draft_rng(config.draft.seed);
    let deadline = deadline_after(config.draft.timeout_ms);

    let result = service
        .draft(
            config.draft.engine,
            &config.draft.strategy,
            &draft_id,
            deadline,
            &mut rng,
        )
        .await;

    match result {
        Ok(offerings) if offerings.is_empty() => {
            println!("No active players; nothing to draft.");
        }
        Ok(offerings) => {
            println!("Draft {draft_id} ({})", config.draft.strategy);
            for offering in &offerings {
                println!("{offering}");
            }
        }
        Err(e) if e.is_incomplete_draft() => {
            error!("Draft {} incomplete: {}", draft_id, e);
            eprintln!("could not complete the draft: {e}");
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("draft failed"),
    }

    info!("Leader draft finished");
    Ok(())
}

/// Initialize tracing to log to `logs/leaderdraft.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("leaderdraft.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("leaderdraft=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
