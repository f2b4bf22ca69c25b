use crate::model::fixture::Outcome;
use crate::model::{FixtureId, RoundId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user's prediction for one fixture. At most one exists per `(user_id, fixture_id)`.
///
/// Rows written by the retroactive points engine have the same shape as submitted ones.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bet {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "roundId")]
    pub round_id: RoundId,
    #[serde(rename = "fixtureId")]
    pub fixture_id: FixtureId,
    pub prediction: Outcome,
    #[serde(rename = "pointsAwarded")]
    pub points_awarded: Option<i32>,
    #[serde(rename = "submittedAt")]
    pub submitted_at: DateTime<Utc>,
}

impl Bet {
    pub fn points(&self) -> i32 {
        self.points_awarded.unwrap_or(0)
    }

    pub fn is_correct(&self) -> bool {
        self.points() > 0
    }
}

/// Points computed for an existing bet during a scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredBet {
    pub user_id: UserId,
    pub fixture_id: FixtureId,
    pub points: i32,
}
