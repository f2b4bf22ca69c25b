use crate::model::bet::{Bet, ScoredBet};
use crate::model::fixture::{Fixture, Outcome};
use crate::model::round::BettingRound;
use crate::model::{CompetitionId, FixtureId, RoundId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("could not get database connection from pool: {0}")]
    Pool(String),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("stored row is unreadable: {0}")]
    CorruptRow(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Everything a scoring pass writes, applied in one transaction.
#[derive(Debug, Clone)]
pub struct RoundScoreUpdate {
    pub round_id: RoundId,
    pub results: Vec<(FixtureId, Outcome)>,
    pub bets: Vec<ScoredBet>,
    pub scored_at: DateTime<Utc>,
}

/// Typed reads and writes over rounds, fixtures, bets and users. No business rules live here.
///
/// Missing rows are `Ok(None)`; every failure is an explicit `GatewayError`.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn get_round(&self, round_id: RoundId) -> Result<Option<BettingRound>>;

    /// All rounds ordered by id, optionally restricted to one competition.
    async fn get_rounds(&self, competition_id: Option<CompetitionId>) -> Result<Vec<BettingRound>>;

    async fn get_fixtures_for_round(&self, round_id: RoundId) -> Result<Vec<Fixture>>;

    /// Maps each known fixture to its round. Unknown ids are absent from the map.
    async fn get_fixture_rounds(
        &self,
        fixture_ids: &[FixtureId],
    ) -> Result<HashMap<FixtureId, RoundId>>;

    async fn get_bets_for_round(&self, round_id: RoundId) -> Result<Vec<Bet>>;

    async fn get_all_bets(&self) -> Result<Vec<Bet>>;

    /// Inserts or overwrites on `(user_id, fixture_id)`. The whole batch commits or none of it does.
    async fn upsert_bets(&self, bets: &[Bet]) -> Result<usize>;

    /// Plain atomic insert; a conflicting row fails the whole batch.
    async fn insert_bets(&self, bets: &[Bet]) -> Result<usize>;

    /// Ids of scored rounds in a competition in ascending order, starting at `from_round_id` when given.
    async fn get_scored_round_ids(
        &self,
        competition_id: CompetitionId,
        from_round_id: Option<RoundId>,
    ) -> Result<Vec<RoundId>>;

    async fn get_round_ids_with_user_bets(&self, user_id: UserId) -> Result<Vec<RoundId>>;

    async fn get_user_created_at(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>>;

    /// Users created strictly after `created_after`, oldest first.
    async fn get_users_created_after(&self, created_after: DateTime<Utc>) -> Result<Vec<UserId>>;

    async fn commit_round_scores(&self, update: RoundScoreUpdate) -> Result<()>;
}
