use serde::{Deserialize, Serialize};

use crate::grid::GRID_SIZE;

/// Payout policy. The house-edge factor is deliberately a runtime parameter:
/// the curve below is placeholder policy, not a payout table to preserve
/// bit-for-bit, and operators tune the edge without recompiling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MultiplierParams {
    pub house_edge: f64,
}

impl Default for MultiplierParams {
    fn default() -> Self {
        Self { house_edge: 0.95 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Continue,
    CashOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbabilityAnalysis {
    pub safe_probability: f64,
    pub mine_probability: f64,
    pub expected_value: f64,
    pub optimal_cash_out: bool,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlternativeAction {
    pub action: Action,
    pub expected_value: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyRecommendation {
    pub action: Action,
    pub confidence: f64,
    pub reasoning: String,
    pub risk_assessment: RiskLevel,
    pub expected_value: f64,
    pub alternative_actions: Vec<AlternativeAction>,
}

/// Probability that the next reveal is safe. Consumes counts only, never
/// positions.
pub fn safe_probability(mines_remaining: usize, tiles_remaining: usize) -> f64 {
    if tiles_remaining == 0 {
        return 0.0;
    }
    let safe = tiles_remaining.saturating_sub(mines_remaining);
    safe as f64 / tiles_remaining as f64
}

pub fn mine_probability(mines_remaining: usize, tiles_remaining: usize) -> f64 {
    if tiles_remaining == 0 {
        return 0.0;
    }
    (mines_remaining as f64 / tiles_remaining as f64).min(1.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

impl MultiplierParams {
    /// Current multiplier after `tiles_revealed` safe reveals against
    /// `mine_count` mines. Each step pays the inverse survival odds scaled
    /// by the house edge, rounded to 4 decimals.
    pub fn multiplier(&self, mine_count: usize, tiles_revealed: usize) -> f64 {
        if tiles_revealed == 0 {
            return 1.0;
        }
        let safe_total = GRID_SIZE - mine_count;
        let mut multiplier = 1.0;
        for i in 0..tiles_revealed.min(safe_total) {
            let remaining_safe = (safe_total - i) as f64;
            let remaining_total = (GRID_SIZE - i) as f64;
            multiplier *= (remaining_total / remaining_safe) * self.house_edge;
        }
        round4(multiplier)
    }

    /// Expected value of revealing one more tile: win takes the bet to the
    /// next multiplier, a mine forfeits the current position.
    pub fn expected_value(
        &self,
        mine_count: usize,
        tiles_revealed: usize,
        bet_amount: f64,
        current_multiplier: f64,
    ) -> f64 {
        let tiles_remaining = GRID_SIZE - tiles_revealed;
        if tiles_remaining == 0 || tiles_remaining <= mine_count {
            return 0.0;
        }
        let safe_prob = safe_probability(mine_count, tiles_remaining);
        let mine_prob = mine_probability(mine_count, tiles_remaining);
        let next_multiplier = self.multiplier(mine_count, tiles_revealed + 1);

        let success_reward = bet_amount * next_multiplier;
        let failure_loss = bet_amount * current_multiplier;
        round4(safe_prob * success_reward - mine_prob * failure_loss)
    }

    pub fn analyze(
        &self,
        mine_count: usize,
        tiles_revealed: usize,
        bet_amount: f64,
        current_multiplier: f64,
    ) -> ProbabilityAnalysis {
        let tiles_remaining = GRID_SIZE - tiles_revealed;
        let safe_prob = safe_probability(mine_count, tiles_remaining);
        let mine_prob = mine_probability(mine_count, tiles_remaining);
        let expected_value =
            self.expected_value(mine_count, tiles_revealed, bet_amount, current_multiplier);

        let risk_level = if mine_prob <= 0.2 {
            RiskLevel::Low
        } else if mine_prob <= 0.5 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        };

        let current_value = bet_amount * current_multiplier;
        let optimal_cash_out = expected_value < current_value || mine_prob > 0.6;

        ProbabilityAnalysis {
            safe_probability: safe_prob,
            mine_probability: mine_prob,
            expected_value,
            optimal_cash_out,
            risk_level,
        }
    }

    pub fn strategy_recommendation(
        &self,
        mine_count: usize,
        tiles_revealed: usize,
        bet_amount: f64,
        current_multiplier: f64,
    ) -> StrategyRecommendation {
        let analysis = self.analyze(mine_count, tiles_revealed, bet_amount, current_multiplier);

        let (action, confidence, reasoning) = if analysis.mine_probability > 0.7 {
            (
                Action::CashOut,
                0.9,
                format!(
                    "High mine probability ({:.2}%). Recommended to secure current winnings.",
                    analysis.mine_probability * 100.0
                ),
            )
        } else if analysis.expected_value > bet_amount * current_multiplier * 0.1 {
            (
                Action::Continue,
                analysis.safe_probability.min(0.8),
                format!(
                    "Positive expected value. Safe probability: {:.2}%",
                    analysis.safe_probability * 100.0
                ),
            )
        } else if current_multiplier > 2.0 && analysis.mine_probability > 0.4 {
            (
                Action::CashOut,
                0.7,
                format!("Good multiplier achieved ({current_multiplier:.2}x) with moderate risk."),
            )
        } else {
            (
                Action::Continue,
                analysis.safe_probability,
                "Continue with caution. Monitor risk levels.".to_string(),
            )
        };

        let alternative_actions = match action {
            Action::Continue => vec![AlternativeAction {
                action: Action::CashOut,
                expected_value: bet_amount * current_multiplier,
                reasoning: "Secure current winnings".to_string(),
            }],
            Action::CashOut => vec![AlternativeAction {
                action: Action::Continue,
                expected_value: analysis.expected_value,
                reasoning: format!(
                    "Risk one more tile for {:.2}% chance of success",
                    analysis.safe_probability * 100.0
                ),
            }],
        };

        StrategyRecommendation {
            action,
            confidence,
            reasoning,
            risk_assessment: analysis.risk_level,
            expected_value: analysis.expected_value,
            alternative_actions,
        }
    }

    /// Last reveal count at which continuing still beats banking the current
    /// value, scanned over the whole safe range.
    pub fn optimal_stopping_point(&self, mine_count: usize, bet_amount: f64) -> usize {
        let safe_total = GRID_SIZE - mine_count;
        let mut best_value = 0.0;
        let mut optimal_point = 0;

        for tiles_revealed in 0..safe_total {
            let current_value = bet_amount * self.multiplier(mine_count, tiles_revealed);
            let tiles_remaining = GRID_SIZE - tiles_revealed;
            let safe_prob = safe_probability(mine_count, tiles_remaining);
            let continue_ev =
                safe_prob * bet_amount * self.multiplier(mine_count, tiles_revealed + 1);

            if continue_ev > current_value && current_value > best_value {
                best_value = current_value;
                optimal_point = tiles_revealed;
            }
        }
        optimal_point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_multiplier_known_values() {
        let params = MultiplierParams::default();
        assert!(close(params.multiplier(3, 0), 1.0));
        assert!(close(params.multiplier(3, 1), 1.0795));
        assert!(close(params.multiplier(3, 5), 1.5611));
        assert!(close(params.multiplier(5, 3), 1.7298));
        assert!(close(params.multiplier(24, 1), 23.75));
        assert!(close(params.multiplier(1, 24), 7.2997));
    }

    #[test]
    fn test_multiplier_house_edge_parameterized() {
        let fair_game = MultiplierParams { house_edge: 1.0 };
        assert!(close(fair_game.multiplier(10, 2), 2.8571));
        assert!(fair_game.multiplier(3, 5) > MultiplierParams::default().multiplier(3, 5));
    }

    #[test]
    fn test_multiplier_monotonic_in_reveals() {
        let params = MultiplierParams::default();
        let mut previous = params.multiplier(5, 1);
        for revealed in 2..=20 {
            let current = params.multiplier(5, revealed);
            assert!(current > previous, "multiplier must grow with each reveal");
            previous = current;
        }
    }

    #[test]
    fn test_probabilities() {
        assert!(close(safe_probability(3, 25), 22.0 / 25.0));
        assert!(close(mine_probability(3, 25), 3.0 / 25.0));
        assert!(close(safe_probability(5, 0), 0.0));
        assert!(close(mine_probability(30, 25), 1.0));
    }

    #[test]
    fn test_analyze_risk_levels() {
        let params = MultiplierParams::default();
        assert_eq!(params.analyze(3, 0, 1.0, 1.0).risk_level, RiskLevel::Low);
        assert_eq!(params.analyze(10, 0, 1.0, 1.0).risk_level, RiskLevel::Medium);
        assert_eq!(params.analyze(20, 0, 1.0, 1.0).risk_level, RiskLevel::High);
    }

    #[test]
    fn test_recommendation_extremes() {
        let params = MultiplierParams::default();
        // 24 mines, 0 revealed: 96% mine probability, must say cash out
        let desperate = params.strategy_recommendation(24, 0, 1.0, 1.0);
        assert_eq!(desperate.action, Action::CashOut);
        assert!(desperate.confidence >= 0.9);
        assert!(!desperate.alternative_actions.is_empty());
    }

    #[test]
    fn test_optimal_stopping_point_in_range() {
        let params = MultiplierParams::default();
        for mine_count in 1..25 {
            let point = params.optimal_stopping_point(mine_count, 1.0);
            assert!(point < GRID_SIZE - mine_count + 1);
        }
    }
}
