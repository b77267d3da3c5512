use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use minas_core::{GameStatus, Tile};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateGameRequest {
    pub mine_count: usize,
    pub bet_amount: f64,
    pub client_seed: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RevealRequest {
    pub revealed_positions: Vec<u8>,
}

/// A game session as disclosed to the player. While the game is active,
/// hidden tiles never carry mine information and `server_seed` is absent;
/// both are filled in once the game ends.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub mine_count: usize,
    pub bet_amount: f64,
    pub current_multiplier: f64,
    pub tiles_revealed: usize,
    pub status: GameStatus,
    pub tiles: Vec<Tile>,
    pub server_seed_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_seed: Option<String>,
    pub client_seed: String,
    pub nonce: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_out_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_multiplier: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeedsResponse {
    pub server_seed_hash: String,
    pub client_seed: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyRequest {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
    /// Mine positions the server claims were in play.
    pub game_result: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyResponse {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
    /// Recomputed positions; empty when the inputs were unverifiable.
    pub game_result: Vec<u8>,
    pub is_valid: bool,
    /// Empty when the inputs were unverifiable.
    pub verification_hash: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RiskAnalysisQuery {
    pub iterations: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeedsQuery {
    pub client_seed: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RiskAnalysisResponse {
    pub mine_count: usize,
    pub analysis: Vec<minas_core::monte_carlo::RiskRewardPoint>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OptimalPointsResponse {
    pub optimal_stopping_points: std::collections::BTreeMap<usize, usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminSetParamsRequest {
    pub house_edge: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;
