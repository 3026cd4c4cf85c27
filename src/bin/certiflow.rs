//! CertiFlow server and maintenance commands.
//!
//! `certiflow serve --migrate`, `certiflow migrate`, `certiflow check-db`.

use certiflow::config::{AppConfig, ConnectionConfig};
use certiflow::record::Record;
use certiflow::{app_routes, build_app, controllers, ensure_schema, AppState, Database, DbPool};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "certiflow", version, about = "Electrical safety certificate management")]
struct Cli {
    /// JSON config file. Environment variables (and `.env`) are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// Create missing tables before serving.
        #[arg(long)]
        migrate: bool,
    },
    /// Create missing tables and exit.
    Migrate,
    /// Connect and exercise the database with a scratch table.
    CheckDb {
        /// Use an in-memory SQLite database instead of the configured connection.
        #[arg(long)]
        sqlite: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    let default_filter = if config.app.debug { "certiflow=debug" } else { "certiflow=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command.unwrap_or(Command::Serve { migrate: false }) {
        Command::Serve { migrate } => serve(config, migrate).await,
        Command::Migrate => {
            let mut db = Database::new(config.database.active()?.clone(), config.database.logging.clone());
            ensure_schema(&mut db).await?;
            Ok(())
        }
        Command::CheckDb { sqlite } => {
            let connection = if sqlite {
                ConnectionConfig::sqlite_memory()
            } else {
                config.database.active()?.clone()
            };
            check_db(connection, &config).await
        }
    }
}

async fn serve(config: AppConfig, migrate: bool) -> Result<(), Box<dyn std::error::Error>> {
    let pool = DbPool::connect(config.database.active()?).await?;
    if migrate {
        let mut db = Database::from_pool(pool.clone(), config.database.logging.clone());
        ensure_schema(&mut db).await?;
    }

    let bind_addr = config.server.bind_addr.clone();
    let state = AppState::new(pool.clone(), config, app_routes()?, controllers::registry());
    let app = build_app(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("CertiFlow listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    pool.close().await;
    Ok(())
}

/// Connect, `SELECT 1`, then create, write, read and drop a scratch table, reporting each step.
async fn check_db(connection: ConnectionConfig, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    const SCRATCH: &str = "certiflow_check";
    let target = format!("{} {}", connection.driver.as_str(), connection.database);
    let mut db = Database::new(connection, config.database.logging.clone());

    db.connect().await?;
    println!("connected: {}", target);

    let one = db.execute("SELECT 1 AS ok", ()).await?.fetch_one();
    println!("select 1: {}", one.and_then(|r| r.get_i64("ok")).unwrap_or(0));

    db.execute(
        &format!("CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY, label VARCHAR(50))", SCRATCH),
        (),
    )
    .await?;
    println!("created table {}", SCRATCH);

    let mut q = db.query();
    let inserted = q
        .insert(SCRATCH)
        .values(&Record::new().with("id", 1).with("label", "check"))
        .execute()
        .await?;
    println!("inserted rows: {}", inserted);

    let label = q
        .select("label")
        .from(SCRATCH)
        .and_where("id = ?", [1])
        .fetch_value()
        .await?;
    println!("read back: {}", label.unwrap_or_default());

    db.execute(&format!("DROP TABLE {}", SCRATCH), ()).await?;
    println!("dropped table {}", SCRATCH);
    println!("database check passed");
    Ok(())
}
