use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::grid::GRID_SIZE;
use crate::multiplier::MultiplierParams;

pub const MIN_ITERATIONS: usize = 1_000;
pub const MAX_ITERATIONS: usize = 100_000;

// Cash-out sweeps cap out here; deeper points are dominated by busts anyway.
const MAX_SWEEP_POINT: usize = 14;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub mine_count: usize,
    pub iterations: usize,
    pub bet_amount: f64,
    pub cash_out_points: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub mine_count: usize,
    pub iterations: usize,
    pub average_multiplier: f64,
    pub success_rate: f64,
    pub variance: f64,
    pub optimal_cash_out_point: usize,
    pub expected_profit: f64,
    pub confidence_interval: ConfidenceInterval,
}

/// Per-cash-out-point metrics from a risk/reward sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRewardPoint {
    pub cash_out_point: usize,
    pub success_rate: f64,
    pub average_multiplier: f64,
    pub average_profit: f64,
    pub volatility: f64,
    pub downside_risk: f64,
    pub max_drawdown: f64,
    pub risk_adjusted_return: f64,
    pub expected_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankrollRequest {
    pub mine_count: usize,
    pub cash_out_point: usize,
    pub initial_bankroll: f64,
    pub bet_size: f64,
    pub num_games: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankrollResult {
    pub final_bankroll: f64,
    pub games_played: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub max_bankroll: f64,
    pub min_bankroll: f64,
    pub went_bankrupt: bool,
    /// Trailing window of the trajectory, newest last.
    pub bankroll_history: Vec<f64>,
}

/// Play one game with random mines and a random reveal order, cashing out
/// after `cash_out_point` safe reveals. Returns the final multiplier and
/// whether the game survived.
pub fn simulate_single_game<R: Rng + ?Sized>(
    rng: &mut R,
    params: &MultiplierParams,
    mine_count: usize,
    cash_out_point: usize,
) -> (f64, bool) {
    let mines = rand::seq::index::sample(rng, GRID_SIZE, mine_count);
    let is_mine = {
        let mut board = [false; GRID_SIZE];
        for position in mines {
            board[position] = true;
        }
        board
    };

    let mut reveal_order: Vec<usize> = (0..GRID_SIZE).collect();
    reveal_order.shuffle(rng);

    let mut multiplier = 1.0;
    for (revealed, &position) in reveal_order.iter().take(cash_out_point).enumerate() {
        if is_mine[position] {
            return (0.0, false);
        }
        multiplier = params.multiplier(mine_count, revealed + 1);
    }
    (multiplier, true)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator).
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn stdev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

fn validate(mine_count: usize, iterations: usize) -> Result<()> {
    if mine_count == 0 || mine_count >= GRID_SIZE {
        return Err(EngineError::InvalidMineCount {
            count: mine_count,
            grid_size: GRID_SIZE,
        });
    }
    if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
        return Err(EngineError::InvalidIterations(iterations));
    }
    Ok(())
}

/// Sweep candidate cash-out points and report the one with the best
/// expected value, with a 95% confidence interval on its multiplier.
pub fn run_simulation<R: Rng + ?Sized>(
    rng: &mut R,
    params: &MultiplierParams,
    request: &SimulationRequest,
) -> Result<SimulationResult> {
    validate(request.mine_count, request.iterations)?;
    if request.bet_amount <= 0.0 {
        return Err(EngineError::InvalidBetAmount);
    }

    let max_safe_tiles = GRID_SIZE - request.mine_count;
    let cash_out_points: Vec<usize> = match &request.cash_out_points {
        Some(points) => points.clone(),
        None => (1..=max_safe_tiles.min(MAX_SWEEP_POINT)).collect(),
    };

    let mut best_point = 1;
    let mut best_expected_value = 0.0;
    let mut best_multipliers: Vec<f64> = Vec::new();
    let mut best_success_rate = 0.0;

    for &cash_out_point in &cash_out_points {
        let mut multipliers = Vec::with_capacity(request.iterations);
        let mut successes = 0usize;
        for _ in 0..request.iterations {
            let (multiplier, won) =
                simulate_single_game(rng, params, request.mine_count, cash_out_point);
            multipliers.push(multiplier);
            if won {
                successes += 1;
            }
        }
        let success_rate = successes as f64 / request.iterations as f64;
        let expected_value = success_rate * mean(&multipliers) * request.bet_amount;

        if expected_value > best_expected_value || best_multipliers.is_empty() {
            best_expected_value = expected_value;
            best_point = cash_out_point;
            best_success_rate = success_rate;
            best_multipliers = multipliers;
        }
    }

    let average_multiplier = mean(&best_multipliers);
    let confidence_interval = if best_multipliers.len() > 1 {
        let std_error = stdev(&best_multipliers) / (best_multipliers.len() as f64).sqrt();
        ConfidenceInterval {
            lower: (average_multiplier - 1.96 * std_error).max(0.0),
            upper: average_multiplier + 1.96 * std_error,
        }
    } else {
        ConfidenceInterval { lower: 0.0, upper: 0.0 }
    };

    Ok(SimulationResult {
        mine_count: request.mine_count,
        iterations: request.iterations,
        average_multiplier,
        success_rate: best_success_rate,
        variance: variance(&best_multipliers),
        optimal_cash_out_point: best_point,
        expected_profit: best_expected_value - request.bet_amount,
        confidence_interval,
    })
}

/// Risk/reward metrics for every viable cash-out point (unit bet).
pub fn risk_reward_profile<R: Rng + ?Sized>(
    rng: &mut R,
    params: &MultiplierParams,
    mine_count: usize,
    iterations: usize,
) -> Result<Vec<RiskRewardPoint>> {
    validate(mine_count, iterations)?;

    let max_safe_tiles = GRID_SIZE - mine_count;
    let mut profile = Vec::new();

    for cash_out_point in 1..=max_safe_tiles.min(MAX_SWEEP_POINT + 1) {
        let mut multipliers = Vec::with_capacity(iterations);
        let mut profits = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let (multiplier, won) = simulate_single_game(rng, params, mine_count, cash_out_point);
            multipliers.push(multiplier);
            profits.push(if won { multiplier - 1.0 } else { -1.0 });
        }

        let success_rate =
            multipliers.iter().filter(|&&m| m > 0.0).count() as f64 / iterations as f64;
        let average_multiplier = mean(&multipliers);
        let average_profit = mean(&profits);
        let volatility = stdev(&profits);
        let negative: Vec<f64> = profits.iter().copied().filter(|&p| p < 0.0).collect();
        let downside_risk = stdev(&negative);
        let max_drawdown = profits.iter().copied().fold(f64::INFINITY, f64::min);
        let risk_adjusted_return = if volatility > 0.0 { average_profit / volatility } else { 0.0 };

        profile.push(RiskRewardPoint {
            cash_out_point,
            success_rate,
            average_multiplier,
            average_profit,
            volatility,
            downside_risk,
            max_drawdown: if max_drawdown.is_finite() { max_drawdown } else { 0.0 },
            risk_adjusted_return,
            expected_value: success_rate * average_multiplier,
        });
    }
    Ok(profile)
}

/// Fixed-strategy bankroll trajectory over repeated games.
pub fn simulate_bankroll<R: Rng + ?Sized>(
    rng: &mut R,
    params: &MultiplierParams,
    request: &BankrollRequest,
) -> Result<BankrollResult> {
    if request.mine_count == 0 || request.mine_count >= GRID_SIZE {
        return Err(EngineError::InvalidMineCount {
            count: request.mine_count,
            grid_size: GRID_SIZE,
        });
    }
    if request.bet_size <= 0.0 || request.initial_bankroll <= 0.0 {
        return Err(EngineError::InvalidBetAmount);
    }

    let mut bankroll = request.initial_bankroll;
    let mut history = vec![bankroll];
    let mut wins = 0usize;
    let mut losses = 0usize;

    for _ in 0..request.num_games {
        if bankroll < request.bet_size {
            break;
        }
        let (multiplier, won) =
            simulate_single_game(rng, params, request.mine_count, request.cash_out_point);
        if won {
            bankroll += request.bet_size * (multiplier - 1.0);
            wins += 1;
        } else {
            bankroll -= request.bet_size;
            losses += 1;
        }
        history.push(bankroll);
    }

    let played = wins + losses;
    let max_bankroll = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_bankroll = history.iter().copied().fold(f64::INFINITY, f64::min);
    let tail = history.len().saturating_sub(100);

    Ok(BankrollResult {
        final_bankroll: bankroll,
        games_played: played,
        wins,
        losses,
        win_rate: if played > 0 { wins as f64 / played as f64 } else { 0.0 },
        max_bankroll,
        min_bankroll,
        went_bankrupt: bankroll < request.bet_size,
        bankroll_history: history.split_off(tail),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x4d494e4153)
    }

    #[test]
    fn test_single_game_outcomes() {
        let params = MultiplierParams::default();
        let mut rng = rng();
        for _ in 0..100 {
            let (multiplier, won) = simulate_single_game(&mut rng, &params, 3, 5);
            if won {
                assert!(multiplier >= 1.0);
            } else {
                assert_eq!(multiplier, 0.0);
            }
        }
    }

    #[test]
    fn test_single_game_success_rate_matches_theory() {
        // 1 mine, cash out after 1 reveal: survival is exactly 24/25
        let params = MultiplierParams::default();
        let mut rng = rng();
        let trials = 20_000;
        let wins = (0..trials)
            .filter(|_| simulate_single_game(&mut rng, &params, 1, 1).1)
            .count();
        let rate = wins as f64 / trials as f64;
        assert!((rate - 24.0 / 25.0).abs() < 0.02, "observed {rate}");
    }

    #[test]
    fn test_run_simulation_smoke() {
        let params = MultiplierParams::default();
        let request = SimulationRequest {
            mine_count: 3,
            iterations: 1_000,
            bet_amount: 1.0,
            cash_out_points: None,
        };
        let result = run_simulation(&mut rng(), &params, &request).unwrap();
        assert_eq!(result.mine_count, 3);
        assert!(result.success_rate > 0.0 && result.success_rate <= 1.0);
        assert!(result.optimal_cash_out_point >= 1);
        assert!(result.confidence_interval.lower <= result.confidence_interval.upper);
    }

    #[test]
    fn test_simulation_validation() {
        let params = MultiplierParams::default();
        let mut bad = SimulationRequest {
            mine_count: 0,
            iterations: 10_000,
            bet_amount: 1.0,
            cash_out_points: None,
        };
        assert!(matches!(
            run_simulation(&mut rng(), &params, &bad),
            Err(EngineError::InvalidMineCount { .. })
        ));
        bad.mine_count = 3;
        bad.iterations = 100;
        assert!(matches!(
            run_simulation(&mut rng(), &params, &bad),
            Err(EngineError::InvalidIterations(100))
        ));
        bad.iterations = 1_000;
        bad.bet_amount = 0.0;
        assert!(matches!(
            run_simulation(&mut rng(), &params, &bad),
            Err(EngineError::InvalidBetAmount)
        ));
    }

    #[test]
    fn test_risk_reward_profile_shape() {
        let params = MultiplierParams::default();
        let profile = risk_reward_profile(&mut rng(), &params, 5, 1_000).unwrap();
        assert!(!profile.is_empty());
        let mut previous_rate = 1.1;
        for point in &profile {
            assert!(point.success_rate <= previous_rate + 0.05, "deeper points bust more");
            previous_rate = point.success_rate;
            assert!(point.max_drawdown <= 0.0 || point.success_rate == 1.0);
        }
    }

    #[test]
    fn test_bankroll_simulation() {
        let params = MultiplierParams::default();
        let request = BankrollRequest {
            mine_count: 3,
            cash_out_point: 3,
            initial_bankroll: 100.0,
            bet_size: 1.0,
            num_games: 500,
        };
        let result = simulate_bankroll(&mut rng(), &params, &request).unwrap();
        assert_eq!(result.games_played, result.wins + result.losses);
        assert!(result.games_played <= 500);
        assert!(result.bankroll_history.len() <= 100);
        assert!(result.max_bankroll >= result.min_bankroll);
    }
}
