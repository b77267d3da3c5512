//! Heuristic behavior analysis and ensemble strategy voting.
//!
//! Every method reports through the same tagged `MethodPrediction` record
//! and the ensemble combination is an explicit struct, so callers never see
//! free-form maps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::grid::{GameStatus, GRID_SIZE};
use crate::multiplier::{Action, MultiplierParams};

/// One finished (or running) game as the analytics see it. The server maps
/// its session rows into this; analytics never touch storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub mine_count: usize,
    pub bet_amount: f64,
    pub tiles_revealed: usize,
    pub status: GameStatus,
}

/// Live game state for prediction, counts only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub mine_count: usize,
    pub tiles_revealed: usize,
    pub bet_amount: f64,
    pub current_multiplier: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

impl RiskProfile {
    fn from_tolerance(tolerance: f64) -> Self {
        if tolerance < 0.4 {
            RiskProfile::Conservative
        } else if tolerance > 0.6 {
            RiskProfile::Aggressive
        } else {
            RiskProfile::Balanced
        }
    }

    fn target_multiplier(self) -> f64 {
        match self {
            RiskProfile::Conservative => 1.5,
            RiskProfile::Balanced => 2.0,
            RiskProfile::Aggressive => 3.0,
        }
    }

    fn max_risk(self) -> f64 {
        match self {
            RiskProfile::Conservative => 0.3,
            RiskProfile::Balanced => 0.5,
            RiskProfile::Aggressive => 0.7,
        }
    }

    fn cash_out_adjustment(self) -> f64 {
        match self {
            RiskProfile::Conservative => 0.8,
            RiskProfile::Balanced => 1.0,
            RiskProfile::Aggressive => 1.3,
        }
    }

    fn default_mine_count(self) -> usize {
        match self {
            RiskProfile::Conservative => 3,
            RiskProfile::Balanced => 5,
            RiskProfile::Aggressive => 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashOutPattern {
    pub avg_cash_out_point: f64,
    pub early_cash_out_tendency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub risk_profile: RiskProfile,
    pub avg_bet_size: f64,
    pub preferred_mine_counts: Vec<usize>,
    pub risk_tolerance: f64,
    pub cash_out: CashOutPattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizedRecommendation {
    pub recommended_mine_count: usize,
    pub recommended_cash_out_point: usize,
    pub recommended_bet_size: f64,
    pub max_recommended_risk: f64,
    pub target_multiplier: f64,
}

/// Derive a behavior profile from game history; new players get the
/// balanced defaults.
pub fn analyze_behavior(history: &[GameRecord]) -> BehaviorProfile {
    if history.is_empty() {
        return BehaviorProfile {
            risk_profile: RiskProfile::Balanced,
            avg_bet_size: 1.0,
            preferred_mine_counts: vec![3, 5],
            risk_tolerance: 0.5,
            cash_out: CashOutPattern {
                avg_cash_out_point: 3.0,
                early_cash_out_tendency: 0.0,
            },
        };
    }

    let avg_bet_size =
        history.iter().map(|g| g.bet_amount).sum::<f64>() / history.len() as f64;

    // top 3 most frequent mine counts, ties broken low-first
    let mut frequency: HashMap<usize, usize> = HashMap::new();
    for game in history {
        *frequency.entry(game.mine_count).or_insert(0) += 1;
    }
    let mut counts: Vec<(usize, usize)> = frequency.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let preferred_mine_counts: Vec<usize> = counts.iter().take(3).map(|(c, _)| *c).collect();

    let high_mine_ratio = history.iter().filter(|g| g.mine_count >= 10).count() as f64
        / history.len() as f64;
    let completed: Vec<&GameRecord> = history
        .iter()
        .filter(|g| g.status == GameStatus::Completed)
        .collect();
    let risk_from_depth = if completed.is_empty() {
        0.5
    } else {
        let avg_depth = completed.iter().map(|g| g.tiles_revealed as f64).sum::<f64>()
            / completed.len() as f64;
        (avg_depth / 15.0).min(1.0)
    };
    let risk_tolerance = (high_mine_ratio * 0.4 + risk_from_depth * 0.6).clamp(0.1, 0.9);

    let cash_outs: Vec<f64> = completed
        .iter()
        .filter(|g| g.tiles_revealed > 0)
        .map(|g| g.tiles_revealed as f64)
        .collect();
    let cash_out = if cash_outs.is_empty() {
        CashOutPattern {
            avg_cash_out_point: 3.0,
            early_cash_out_tendency: 0.0,
        }
    } else {
        CashOutPattern {
            avg_cash_out_point: cash_outs.iter().sum::<f64>() / cash_outs.len() as f64,
            early_cash_out_tendency: cash_outs.iter().filter(|&&p| p <= 2.0).count() as f64
                / cash_outs.len() as f64,
        }
    };

    BehaviorProfile {
        risk_profile: RiskProfile::from_tolerance(risk_tolerance),
        avg_bet_size,
        preferred_mine_counts,
        risk_tolerance,
        cash_out,
    }
}

pub fn personalized_recommendation(profile: &BehaviorProfile) -> PersonalizedRecommendation {
    let recommended_mine_count = profile
        .preferred_mine_counts
        .first()
        .copied()
        .unwrap_or_else(|| profile.risk_profile.default_mine_count());
    let recommended_cash_out_point = ((profile.cash_out.avg_cash_out_point
        * profile.risk_profile.cash_out_adjustment()) as usize)
        .max(1);

    PersonalizedRecommendation {
        recommended_mine_count,
        recommended_cash_out_point,
        recommended_bet_size: profile.avg_bet_size,
        max_recommended_risk: profile.risk_profile.max_risk(),
        target_multiplier: profile.risk_profile.target_multiplier(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    Mathematical,
    Simulation,
    Behavioral,
    Historical,
}

/// One method's vote, always the same shape regardless of method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodPrediction {
    pub method: PredictionMethod,
    pub action: Action,
    pub confidence: f64,
    pub expected_value: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub mathematical: f64,
    pub simulation: f64,
    pub behavioral: f64,
    pub historical: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            mathematical: 0.4,
            simulation: 0.3,
            behavioral: 0.2,
            historical: 0.1,
        }
    }
}

impl EnsembleWeights {
    fn of(&self, method: PredictionMethod) -> f64 {
        match method {
            PredictionMethod::Mathematical => self.mathematical,
            PredictionMethod::Simulation => self.simulation,
            PredictionMethod::Behavioral => self.behavioral,
            PredictionMethod::Historical => self.historical,
        }
    }

    fn total(&self) -> f64 {
        self.mathematical + self.simulation + self.behavioral + self.historical
    }
}

/// The combined vote: explicit weights and agreement, no loose maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsemblePrediction {
    pub action: Action,
    pub confidence: f64,
    pub expected_value: f64,
    pub continue_weight: f64,
    pub cash_out_weight: f64,
    pub agreement_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleReport {
    pub ensemble: EnsemblePrediction,
    pub individual: Vec<MethodPrediction>,
}

fn mathematical_prediction(params: &MultiplierParams, snapshot: &SessionSnapshot) -> MethodPrediction {
    let recommendation = params.strategy_recommendation(
        snapshot.mine_count,
        snapshot.tiles_revealed,
        snapshot.bet_amount,
        snapshot.current_multiplier,
    );
    MethodPrediction {
        method: PredictionMethod::Mathematical,
        action: recommendation.action,
        confidence: recommendation.confidence,
        expected_value: recommendation.expected_value,
    }
}

fn simulation_prediction(params: &MultiplierParams, snapshot: &SessionSnapshot) -> MethodPrediction {
    let tiles_remaining = GRID_SIZE - snapshot.tiles_revealed;
    let safe_remaining = tiles_remaining.saturating_sub(snapshot.mine_count);
    let cash_out_value = snapshot.bet_amount * snapshot.current_multiplier;
    if safe_remaining == 0 {
        return MethodPrediction {
            method: PredictionMethod::Simulation,
            action: Action::CashOut,
            confidence: 1.0,
            expected_value: cash_out_value,
        };
    }

    let safe_prob = safe_remaining as f64 / tiles_remaining as f64;
    let continue_ev = safe_prob
        * snapshot.bet_amount
        * params.multiplier(snapshot.mine_count, snapshot.tiles_revealed + 1);

    if continue_ev > cash_out_value * 1.1 {
        MethodPrediction {
            method: PredictionMethod::Simulation,
            action: Action::Continue,
            confidence: 0.7,
            expected_value: continue_ev,
        }
    } else {
        MethodPrediction {
            method: PredictionMethod::Simulation,
            action: Action::CashOut,
            confidence: 0.8,
            expected_value: cash_out_value,
        }
    }
}

fn behavioral_prediction(snapshot: &SessionSnapshot, history: &[GameRecord]) -> MethodPrediction {
    let profile = analyze_behavior(history);
    let recommendation = personalized_recommendation(&profile);
    let position_value = snapshot.bet_amount * snapshot.current_multiplier;

    if snapshot.tiles_revealed >= recommendation.recommended_cash_out_point {
        MethodPrediction {
            method: PredictionMethod::Behavioral,
            action: Action::CashOut,
            confidence: 0.8,
            expected_value: position_value,
        }
    } else {
        MethodPrediction {
            method: PredictionMethod::Behavioral,
            action: Action::Continue,
            confidence: 0.5 + profile.risk_tolerance * 0.3,
            expected_value: position_value * 1.2,
        }
    }
}

fn historical_prediction(snapshot: &SessionSnapshot) -> MethodPrediction {
    let position_value = snapshot.bet_amount * snapshot.current_multiplier;
    if snapshot.tiles_revealed < 2 {
        MethodPrediction {
            method: PredictionMethod::Historical,
            action: Action::Continue,
            confidence: 0.6,
            expected_value: snapshot.bet_amount * 1.5,
        }
    } else if snapshot.tiles_revealed >= 5 {
        MethodPrediction {
            method: PredictionMethod::Historical,
            action: Action::CashOut,
            confidence: 0.7,
            expected_value: position_value,
        }
    } else {
        MethodPrediction {
            method: PredictionMethod::Historical,
            action: Action::Continue,
            confidence: 0.5,
            expected_value: position_value * 1.3,
        }
    }
}

/// Weighted vote across method predictions.
pub fn combine_predictions(
    predictions: &[MethodPrediction],
    weights: &EnsembleWeights,
) -> EnsemblePrediction {
    let mut continue_weight = 0.0;
    let mut cash_out_weight = 0.0;
    let mut weighted_confidence = 0.0;
    let mut weighted_ev = 0.0;

    for prediction in predictions {
        let weight = weights.of(prediction.method);
        match prediction.action {
            Action::Continue => continue_weight += weight,
            Action::CashOut => cash_out_weight += weight,
        }
        weighted_confidence += prediction.confidence * weight;
        weighted_ev += prediction.expected_value * weight;
    }

    let action = if continue_weight > cash_out_weight {
        Action::Continue
    } else {
        Action::CashOut
    };
    let agreement_score = continue_weight.max(cash_out_weight) / weights.total();

    EnsemblePrediction {
        action,
        confidence: (weighted_confidence * agreement_score).min(1.0),
        expected_value: weighted_ev,
        continue_weight,
        cash_out_weight,
        agreement_score,
    }
}

/// Run all four methods over the snapshot and combine their votes.
pub fn ensemble_prediction(
    params: &MultiplierParams,
    snapshot: &SessionSnapshot,
    history: &[GameRecord],
) -> EnsembleReport {
    let individual = vec![
        mathematical_prediction(params, snapshot),
        simulation_prediction(params, snapshot),
        behavioral_prediction(snapshot, history),
        historical_prediction(snapshot),
    ];
    let ensemble = combine_predictions(&individual, &EnsembleWeights::default());
    EnsembleReport { ensemble, individual }
}
