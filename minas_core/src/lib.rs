pub mod analytics;
pub mod engine;
pub mod error;
pub mod grid;
pub mod monte_carlo;
pub mod multiplier;
pub mod rng;

pub use crate::engine::{
    create_game, derive_mine_positions, verification_hash, verify_game, GameSetup, VerifyOutcome,
};
pub use crate::error::{EngineError, Result};
pub use crate::grid::{GameStatus, Grid, Reveal, Tile, TileStatus, GRID_SIZE};
pub use crate::monte_carlo::{
    risk_reward_profile, run_simulation, simulate_bankroll, SimulationRequest, SimulationResult,
};
pub use crate::multiplier::{
    Action, MultiplierParams, ProbabilityAnalysis, RiskLevel, StrategyRecommendation,
};
pub use crate::rng::{
    derive_hash_hex, generate_client_seed, generate_server_seed, ProvablyFairRng,
};
