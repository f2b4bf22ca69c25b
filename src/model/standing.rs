use crate::model::UserId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormTrend {
    Improving,
    Declining,
    Stable,
}

/// Derived per-user summary. Never stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Standing {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub rank: usize,
    #[serde(rename = "totalPoints")]
    pub total_points: i64,
    #[serde(rename = "roundsPlayed")]
    pub rounds_played: usize,
    #[serde(rename = "roundWins")]
    pub round_wins: usize,
    #[serde(rename = "competitionRoundWins")]
    pub competition_round_wins: usize,
    #[serde(rename = "betsPlaced")]
    pub bets_placed: usize,
    #[serde(rename = "correctPredictions")]
    pub correct_predictions: usize,
    /// Percentage of scored bets that earned a point, 0 to 100.
    pub accuracy: f64,
    #[serde(rename = "currentStreak")]
    pub current_streak: usize,
    #[serde(rename = "bestStreak")]
    pub best_streak: usize,
    pub form: FormTrend,
}
