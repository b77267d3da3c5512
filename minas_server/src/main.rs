use axum::http::StatusCode;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use minas_core::analytics::{self, GameRecord, SessionSnapshot};
use minas_core::monte_carlo::{self, SimulationRequest, SimulationResult};
use minas_core::{
    GameStatus, Grid, MultiplierParams, ProbabilityAnalysis, Reveal, StrategyRecommendation,
    VerifyOutcome, GRID_SIZE,
};
use minas_shared::{
    AdminSetParamsRequest, CreateGameRequest, GameResponse, HealthResponse, OptimalPointsResponse,
    RevealRequest, RiskAnalysisQuery, RiskAnalysisResponse, SeedsQuery, SeedsResponse,
    VerifyRequest, VerifyResponse,
};

#[derive(Clone)]
struct AppState {
    db: SqlitePool,
    api_key: String,
}

// DB schema is defined in migrations (see migrations/ folder)

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
struct StoredParams {
    house_edge: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
struct StoredGame {
    id: String,
    created_at: DateTime<Utc>,
    mine_count: i64,
    bet_amount: f64,
    current_multiplier: f64,
    tiles_revealed: i64,
    status: String,
    mines_json: String,
    revealed_json: String,
    server_seed: String,
    server_seed_hash: String,
    client_seed: String,
    nonce: i64,
    cash_out_amount: Option<f64>,
    final_multiplier: Option<f64>,
}

async fn get_params(pool: &SqlitePool) -> anyhow::Result<StoredParams> {
    let row = sqlx::query_as::<_, StoredParams>("SELECT house_edge FROM params WHERE id = 1")
        .fetch_one(pool)
        .await?;
    Ok(row)
}

async fn set_params(pool: &SqlitePool, p: &StoredParams) -> anyhow::Result<()> {
    sqlx::query("UPDATE params SET house_edge = ? WHERE id = 1")
        .bind(p.house_edge)
        .execute(pool)
        .await?;
    Ok(())
}

async fn fetch_game(pool: &SqlitePool, id: &str) -> anyhow::Result<Option<StoredGame>> {
    let row = sqlx::query_as::<_, StoredGame>("SELECT * FROM games WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

async fn update_game(pool: &SqlitePool, g: &StoredGame) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE games SET current_multiplier = ?, tiles_revealed = ?, status = ?, \
         revealed_json = ?, cash_out_amount = ?, final_multiplier = ? WHERE id = ?",
    )
    .bind(g.current_multiplier)
    .bind(g.tiles_revealed)
    .bind(&g.status)
    .bind(&g.revealed_json)
    .bind(g.cash_out_amount)
    .bind(g.final_multiplier)
    .bind(&g.id)
    .execute(pool)
    .await?;
    Ok(())
}

fn engine_params(p: &StoredParams) -> MultiplierParams {
    MultiplierParams { house_edge: p.house_edge }
}

fn positions(json: &str) -> Result<Vec<u8>, StatusCode> {
    serde_json::from_str(json).map_err(|e| {
        error!("corrupt position list in store: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Rebuild the board from stored mines + reveal history and render the
/// session for disclosure. Active games leak neither mines nor the server
/// seed.
fn to_response(g: &StoredGame) -> Result<GameResponse, StatusCode> {
    let status = GameStatus::from_str(&g.status).ok_or_else(|| {
        error!("unknown game status {:?} for game {}", g.status, g.id);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let mines = positions(&g.mines_json)?;
    let revealed = positions(&g.revealed_json)?;

    let mut grid = Grid::with_mines(&mines);
    for position in revealed {
        grid.reveal(position).map_err(|e| {
            error!("stored reveal replay failed for game {}: {e}", g.id);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    }

    let active = status == GameStatus::Active;
    let grid = if active { grid.sanitized() } else { grid };

    Ok(GameResponse {
        id: g.id.clone(),
        created_at: g.created_at,
        mine_count: g.mine_count as usize,
        bet_amount: g.bet_amount,
        current_multiplier: g.current_multiplier,
        tiles_revealed: g.tiles_revealed as usize,
        status,
        tiles: grid.tiles,
        server_seed_hash: g.server_seed_hash.clone(),
        server_seed: if active { None } else { Some(g.server_seed.clone()) },
        client_seed: g.client_seed.clone(),
        nonce: g.nonce as u64,
        cash_out_amount: g.cash_out_amount,
        final_multiplier: g.final_multiplier,
    })
}

async fn route_create_game(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<GameResponse>, StatusCode> {
    if req.mine_count == 0 || req.mine_count >= GRID_SIZE || req.bet_amount <= 0.0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let setup = minas_core::create_game(req.client_seed, req.mine_count, GRID_SIZE)
        .map_err(|e| {
            error!("game setup failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let game = StoredGame {
        id: uuid::Uuid::new_v4().to_string(),
        created_at: Utc::now(),
        mine_count: req.mine_count as i64,
        bet_amount: req.bet_amount,
        current_multiplier: 1.0,
        tiles_revealed: 0,
        status: GameStatus::Active.as_str().to_string(),
        mines_json: serde_json::to_string(&setup.mine_positions)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
        revealed_json: "[]".to_string(),
        server_seed: setup.server_seed,
        server_seed_hash: setup.server_seed_hash,
        client_seed: setup.client_seed,
        nonce: setup.nonce as i64,
        cash_out_amount: None,
        final_multiplier: None,
    };

    sqlx::query(
        "INSERT INTO games (id, created_at, mine_count, bet_amount, current_multiplier, \
         tiles_revealed, status, mines_json, revealed_json, server_seed, server_seed_hash, \
         client_seed, nonce) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&game.id)
    .bind(game.created_at)
    .bind(game.mine_count)
    .bind(game.bet_amount)
    .bind(game.current_multiplier)
    .bind(game.tiles_revealed)
    .bind(&game.status)
    .bind(&game.mines_json)
    .bind(&game.revealed_json)
    .bind(&game.server_seed)
    .bind(&game.server_seed_hash)
    .bind(&game.client_seed)
    .bind(game.nonce)
    .execute(&state.db)
    .await
    .map_err(|e| {
        error!("failed to insert game: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!(game_id = %game.id, mine_count = game.mine_count, "game created");
    Ok(Json(to_response(&game)?))
}

async fn route_get_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GameResponse>, StatusCode> {
    let game = fetch_game(&state.db, &id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(to_response(&game)?))
}

async fn route_reveal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RevealRequest>,
) -> Result<Json<GameResponse>, StatusCode> {
    let mut game = fetch_game(&state.db, &id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    if game.status != GameStatus::Active.as_str() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.revealed_positions.iter().any(|&p| usize::from(p) >= GRID_SIZE) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let p = get_params(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let params = engine_params(&p);

    let mines = positions(&game.mines_json)?;
    let mut revealed = positions(&game.revealed_json)?;
    let mut grid = Grid::with_mines(&mines);
    for &position in &revealed {
        grid.reveal(position).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    }

    for position in req.revealed_positions {
        match grid.reveal(position).map_err(|_| StatusCode::BAD_REQUEST)? {
            Reveal::AlreadyRevealed => continue,
            Reveal::Mine => {
                revealed.push(position);
                game.status = GameStatus::Lost.as_str().to_string();
                break;
            }
            Reveal::Safe => {
                revealed.push(position);
                game.tiles_revealed += 1;
                game.current_multiplier =
                    params.multiplier(game.mine_count as usize, game.tiles_revealed as usize);
            }
        }
    }

    let safe_tiles_total = (GRID_SIZE as i64) - game.mine_count;
    if game.status == GameStatus::Active.as_str() && game.tiles_revealed >= safe_tiles_total {
        game.status = GameStatus::Completed.as_str().to_string();
        game.final_multiplier = Some(game.current_multiplier);
        game.cash_out_amount = Some(game.bet_amount * game.current_multiplier);
    }

    game.revealed_json =
        serde_json::to_string(&revealed).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    update_game(&state.db, &game)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(to_response(&game)?))
}

async fn route_cashout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GameResponse>, StatusCode> {
    let mut game = fetch_game(&state.db, &id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    if game.status != GameStatus::Active.as_str() {
        return Err(StatusCode::BAD_REQUEST);
    }

    game.cash_out_amount = Some(game.bet_amount * game.current_multiplier);
    game.final_multiplier = Some(game.current_multiplier);
    game.status = GameStatus::Completed.as_str().to_string();
    update_game(&state.db, &game)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!(game_id = %game.id, amount = game.cash_out_amount, "cashed out");
    Ok(Json(to_response(&game)?))
}

async fn route_probability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProbabilityAnalysis>, StatusCode> {
    let game = fetch_game(&state.db, &id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let p = get_params(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let analysis = engine_params(&p).analyze(
        game.mine_count as usize,
        game.tiles_revealed as usize,
        game.bet_amount,
        game.current_multiplier,
    );
    Ok(Json(analysis))
}

async fn route_strategy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StrategyRecommendation>, StatusCode> {
    let game = fetch_game(&state.db, &id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let p = get_params(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let recommendation = engine_params(&p).strategy_recommendation(
        game.mine_count as usize,
        game.tiles_revealed as usize,
        game.bet_amount,
        game.current_multiplier,
    );
    Ok(Json(recommendation))
}

async fn recent_history(pool: &SqlitePool) -> anyhow::Result<Vec<GameRecord>> {
    let rows = sqlx::query_as::<_, StoredGame>(
        "SELECT * FROM games WHERE status != 'active' ORDER BY created_at DESC LIMIT 50",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .filter_map(|g| {
            GameStatus::from_str(&g.status).map(|status| GameRecord {
                mine_count: g.mine_count as usize,
                bet_amount: g.bet_amount,
                tiles_revealed: g.tiles_revealed as usize,
                status,
            })
        })
        .collect())
}

async fn route_ensemble(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<analytics::EnsembleReport>, StatusCode> {
    let game = fetch_game(&state.db, &id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let p = get_params(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let history = recent_history(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let snapshot = SessionSnapshot {
        mine_count: game.mine_count as usize,
        tiles_revealed: game.tiles_revealed as usize,
        bet_amount: game.bet_amount,
        current_multiplier: game.current_multiplier,
    };
    Ok(Json(analytics::ensemble_prediction(&engine_params(&p), &snapshot, &history)))
}

async fn route_monte_carlo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulationRequest>,
) -> Result<Json<SimulationResult>, StatusCode> {
    let p = get_params(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let params = engine_params(&p);

    // simulation sweeps are CPU-bound; keep them off the async workers
    let result = tokio::task::spawn_blocking(move || {
        monte_carlo::run_simulation(&mut rand::thread_rng(), &params, &req)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|_| StatusCode::BAD_REQUEST)?;

    let result_json =
        serde_json::to_string(&result).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    sqlx::query(
        "INSERT INTO simulations (id, created_at, mine_count, iterations, result_json) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(Utc::now())
    .bind(result.mine_count as i64)
    .bind(result.iterations as i64)
    .bind(result_json)
    .execute(&state.db)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(result))
}

async fn route_risk_analysis(
    State(state): State<Arc<AppState>>,
    Path(mine_count): Path<usize>,
    Query(query): Query<RiskAnalysisQuery>,
) -> Result<Json<RiskAnalysisResponse>, StatusCode> {
    let iterations = query.iterations.unwrap_or(10_000);
    let p = get_params(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let params = engine_params(&p);

    let analysis = tokio::task::spawn_blocking(move || {
        monte_carlo::risk_reward_profile(&mut rand::thread_rng(), &params, mine_count, iterations)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(Json(RiskAnalysisResponse { mine_count, analysis }))
}

async fn route_verify(Json(req): Json<VerifyRequest>) -> Json<VerifyResponse> {
    let outcome = minas_core::verify_game(
        &req.server_seed,
        &req.client_seed,
        req.nonce,
        &req.game_result,
        GRID_SIZE,
    );
    let (is_valid, game_result, verification_hash) = match outcome {
        VerifyOutcome::Valid { positions, verification_hash } => {
            (true, positions, verification_hash)
        }
        VerifyOutcome::Mismatch { expected, verification_hash } => {
            (false, expected, verification_hash)
        }
        VerifyOutcome::Unverifiable(err) => {
            warn!("unverifiable payload: {err}");
            (false, Vec::new(), String::new())
        }
    };
    Json(VerifyResponse {
        server_seed: req.server_seed,
        client_seed: req.client_seed,
        nonce: req.nonce,
        game_result,
        is_valid,
        verification_hash,
    })
}

async fn route_generate_seeds(
    Query(query): Query<SeedsQuery>,
) -> Result<Json<SeedsResponse>, StatusCode> {
    // informational only; the commitment that binds a game is minted in
    // route_create_game and the seed behind this hash is never stored
    let server_seed = minas_core::generate_server_seed().map_err(|e| {
        error!("seed generation failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let client_seed = match query.client_seed {
        Some(seed) if !seed.is_empty() => seed,
        _ => minas_core::generate_client_seed().map_err(|e| {
            error!("seed generation failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?,
    };
    Ok(Json(SeedsResponse {
        server_seed_hash: minas_core::derive_hash_hex(server_seed.as_bytes()),
        client_seed,
    }))
}

async fn route_optimal_points(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OptimalPointsResponse>, StatusCode> {
    let p = get_params(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let params = engine_params(&p);
    let optimal_stopping_points: BTreeMap<usize, usize> = (1..GRID_SIZE)
        .map(|mine_count| (mine_count, params.optimal_stopping_point(mine_count, 1.0)))
        .collect();
    Ok(Json(OptimalPointsResponse { optimal_stopping_points }))
}

async fn route_admin_set_params(
    State(state): State<Arc<AppState>>,
    TypedHeader(axum_extra::headers::Authorization(bearer)): TypedHeader<
        axum_extra::headers::Authorization<axum_extra::headers::authorization::Bearer>,
    >,
    Json(req): Json<AdminSetParamsRequest>,
) -> Result<StatusCode, StatusCode> {
    if bearer.token() != state.api_key {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if !(req.house_edge > 0.0 && req.house_edge <= 1.0) {
        return Err(StatusCode::BAD_REQUEST);
    }
    set_params(&state.db, &StoredParams { house_edge: req.house_edge })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    info!(house_edge = req.house_edge, "updated payout params");
    Ok(StatusCode::NO_CONTENT)
}

async fn route_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "minas API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn route_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "healthy".to_string(),
        Err(e) => format!("error: {e}"),
    };
    Json(HealthResponse { status: "healthy".to_string(), database })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(
            &std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://minas.db?mode=rwc".to_string()),
        )
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let state = Arc::new(AppState {
        db,
        api_key: std::env::var("API_KEY").unwrap_or_else(|_| "dev-key".into()),
    });

    let api = Router::new()
        .route("/", get(route_root))
        .route("/health", get(route_health))
        .route("/game/create", post(route_create_game))
        .route("/game/:id", get(route_get_game))
        .route("/game/:id/reveal", post(route_reveal))
        .route("/game/:id/cashout", post(route_cashout))
        .route("/analysis/probability/:id", get(route_probability))
        .route("/analysis/strategy/:id", get(route_strategy))
        .route("/analysis/ensemble/:id", get(route_ensemble))
        .route("/simulation/monte-carlo", post(route_monte_carlo))
        .route("/simulation/risk-analysis/:mine_count", get(route_risk_analysis))
        .route("/provably-fair/verify", post(route_verify))
        .route("/provably-fair/generate-seeds", get(route_generate_seeds))
        .route("/stats/optimal-points", get(route_optimal_points))
        .route("/admin/set-params", post(route_admin_set_params));

    let app = Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = std::env::var("BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
