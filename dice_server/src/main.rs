//! Realtime dice betting server.
//!
//! Serves the play engine over WebSocket, backed by PostgreSQL or, for
//! development, by a seeded in-memory ledger.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use dice_server::{api, config::ServerConfig, logging, metrics};
use pico_args::Arguments;
use spicy_dice::{
    Dice, LedgerStore, MemoryLedger, PlayEngine,
    db::{Database, LedgerResult},
};
use tracing::info;

const HELP: &str = "\
Run the spicy dice WebSocket server

USAGE:
  dice_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --in-memory              Use a seeded in-memory ledger instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  MIN_BET / MAX_BET        Accepted bet range [default: 10 / 100]
  DICE_SIDES               Faces on the die [default: 6]
  WS_PING_INTERVAL_SECS    Liveness ping interval [default: 54]
  WS_READ_TIMEOUT_SECS     Read deadline without a pong [default: 60]
  WS_WRITE_TIMEOUT_SECS    Deadline for a single write [default: 10]
  WS_OUTBOUND_CAPACITY     Outbound queue size per connection [default: 64]
  METRICS_BIND             Prometheus listener address (disabled when unset)
  SEED_PLAYERS             Players seeded in memory mode [default: 10]
  SEED_BALANCE             Balance of each seeded player [default: 1000]
  (See .env.example for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        in_memory: pargs.contains("--in-memory"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.in_memory)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Metrics exported at http://{}/metrics", addr);
    }

    let database = match &config.database {
        Some(db_config) => {
            info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            db.apply_schema()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to apply schema: {}", e))?;
            info!("Database connected successfully");
            Some(db)
        }
        None => None,
    };

    let ledger: Arc<dyn LedgerStore> = match &database {
        Some(db) => Arc::new(db.ledger()),
        None => {
            let ledger = seeded_ledger(config.seed.players, config.seed.balance)?;
            info!(
                "Using in-memory ledger with {} player(s) at balance {}",
                config.seed.players, config.seed.balance
            );
            Arc::new(ledger)
        }
    };

    let dice = Dice::new(config.game.dice_sides)?;
    let engine = PlayEngine::new(ledger.clone(), Arc::new(dice), config.game)?;
    info!(
        "Bets accepted between {} and {} on a {}-sided die",
        config.game.min_bet, config.game.max_bet, config.game.dice_sides
    );

    let app = api::create_router(api::AppState {
        engine: Arc::new(engine),
        ledger,
        settings: config.connection,
    });

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at ws://{}/ws/spicy-dice. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// In-memory ledger with players `1..=players`
fn seeded_ledger(players: i64, balance: spicy_dice::Decimal) -> LedgerResult<MemoryLedger> {
    let ledger = MemoryLedger::new();
    for player_id in 1..=players {
        ledger.insert_player(player_id, balance)?;
    }
    Ok(ledger)
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
