use clap::{Parser, Subcommand};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use minas_core::monte_carlo::{self, SimulationRequest};
use minas_core::{MultiplierParams, VerifyOutcome, GRID_SIZE};

#[derive(Parser)]
#[command(name = "minas-cli", about = "Admin CLI for minas server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://minas.db
    #[arg(long, value_parser, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// View last N games
    ViewGames {
        #[arg(default_value_t = 20)]
        n: i64,
    },
    /// Export games to CSV path
    ExportCsv { path: String },
    /// Recompute a finished game offline and check the claimed mines
    Verify {
        server_seed: String,
        client_seed: String,
        nonce: u64,
        /// Claimed mine positions, comma separated (e.g. 3,13,19)
        #[arg(value_delimiter = ',')]
        positions: Vec<u8>,
    },
    /// Run a Monte Carlo cash-out sweep
    Simulate {
        mine_count: usize,
        #[arg(default_value_t = 10_000)]
        iterations: usize,
        #[arg(default_value_t = 1.0)]
        bet: f64,
    },
    /// Update the payout house-edge factor
    SetHouseEdge { value: f64 },
}

async fn get_pool(url: Option<String>) -> anyhow::Result<SqlitePool> {
    let url = url.unwrap_or_else(|| "sqlite://minas.db".into());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ViewGames { n } => {
            let pool = get_pool(cli.database_url).await?;
            let rows = sqlx::query(
                "SELECT id, created_at, status, mine_count, bet_amount, tiles_revealed, \
                 current_multiplier FROM games ORDER BY created_at DESC LIMIT ?",
            )
            .bind(n)
            .fetch_all(&pool)
            .await?;
            for r in rows {
                let id: String = r.get("id");
                let created_at: String = r.get("created_at");
                let status: String = r.get("status");
                let mine_count: i64 = r.get("mine_count");
                let bet_amount: f64 = r.get("bet_amount");
                let tiles_revealed: i64 = r.get("tiles_revealed");
                let multiplier: f64 = r.get("current_multiplier");
                println!(
                    "{} {} {:>9} mines={:>2} bet={:>8.2} revealed={:>2} mult={:.4}",
                    id, created_at, status, mine_count, bet_amount, tiles_revealed, multiplier
                );
            }
        }
        Commands::ExportCsv { path } => {
            let pool = get_pool(cli.database_url).await?;
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record([
                "id",
                "created_at",
                "status",
                "mine_count",
                "bet_amount",
                "tiles_revealed",
                "current_multiplier",
                "server_seed_hash",
                "client_seed",
                "nonce",
                "mines_json",
            ])?;
            let rows = sqlx::query(
                "SELECT id, created_at, status, mine_count, bet_amount, tiles_revealed, \
                 current_multiplier, server_seed_hash, client_seed, nonce, mines_json \
                 FROM games ORDER BY created_at ASC",
            )
            .fetch_all(&pool)
            .await?;
            let total = rows.len();
            for r in &rows {
                wtr.write_record(&[
                    r.get::<String, _>("id"),
                    r.get::<String, _>("created_at"),
                    r.get::<String, _>("status"),
                    r.get::<i64, _>("mine_count").to_string(),
                    r.get::<f64, _>("bet_amount").to_string(),
                    r.get::<i64, _>("tiles_revealed").to_string(),
                    r.get::<f64, _>("current_multiplier").to_string(),
                    r.get::<String, _>("server_seed_hash"),
                    r.get::<String, _>("client_seed"),
                    r.get::<i64, _>("nonce").to_string(),
                    r.get::<String, _>("mines_json"),
                ])?;
            }
            wtr.flush()?;
            println!("Exported {} rows to {}", total, path);
        }
        Commands::Verify { server_seed, client_seed, nonce, positions } => {
            match minas_core::verify_game(&server_seed, &client_seed, nonce, &positions, GRID_SIZE)
            {
                VerifyOutcome::Valid { positions, verification_hash } => {
                    println!("VALID: positions {positions:?}");
                    println!("verification hash: {verification_hash}");
                }
                VerifyOutcome::Mismatch { expected, verification_hash } => {
                    println!("MISMATCH: derivation yields {expected:?}");
                    println!("verification hash: {verification_hash}");
                    std::process::exit(1);
                }
                VerifyOutcome::Unverifiable(err) => {
                    println!("UNVERIFIABLE: {err}");
                    std::process::exit(2);
                }
            }
        }
        Commands::Simulate { mine_count, iterations, bet } => {
            let request = SimulationRequest {
                mine_count,
                iterations,
                bet_amount: bet,
                cash_out_points: None,
            };
            let result = monte_carlo::run_simulation(
                &mut rand::thread_rng(),
                &MultiplierParams::default(),
                &request,
            )?;
            println!("mines={} iterations={}", result.mine_count, result.iterations);
            println!(
                "optimal cash-out point: {} (success rate {:.2}%, avg multiplier {:.4})",
                result.optimal_cash_out_point,
                result.success_rate * 100.0,
                result.average_multiplier
            );
            println!(
                "expected profit per game: {:.4} (95% CI on multiplier: {:.4}..{:.4})",
                result.expected_profit,
                result.confidence_interval.lower,
                result.confidence_interval.upper
            );
        }
        Commands::SetHouseEdge { value } => {
            if !(value > 0.0 && value <= 1.0) {
                anyhow::bail!("house edge must be in (0, 1]");
            }
            let pool = get_pool(cli.database_url).await?;
            sqlx::query("UPDATE params SET house_edge = ? WHERE id = 1")
                .bind(value)
                .execute(&pool)
                .await?;
            println!("Set house edge to {value}");
        }
    }

    Ok(())
}
