use crate::error::{PoolError, Result};
use crate::model::bet::{Bet, ScoredBet};
use crate::model::fixture::Outcome;
use crate::model::{CompetitionId, FixtureId, RoundId};
use crate::repository::gateway::{PersistenceGateway, RoundScoreUpdate};
use crate::service::clock::Clock;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A fixture never awards more than this to a single bet.
pub const MAX_POINTS_PER_FIXTURE: i32 = 1;

pub trait ScoringStrategy: Send + Sync {
    fn score(&self, bet: &Bet, result: Outcome) -> i32;
}

/// One point for the correct 1/X/2 outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutcomeScoring;

impl ScoringStrategy for OutcomeScoring {
    fn score(&self, bet: &Bet, result: Outcome) -> i32 {
        i32::from(bet.prediction == result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoringSummary {
    pub round_id: RoundId,
    pub competition_id: CompetitionId,
    pub fixtures_scored: usize,
    pub bets_scored: usize,
    pub points_awarded: i64,
}

pub struct RoundScorer {
    gateway: Arc<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
    strategy: Arc<dyn ScoringStrategy>,
}

impl RoundScorer {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, clock: Arc<dyn Clock>) -> Self {
        Self::with_strategy(gateway, clock, Arc::new(OutcomeScoring))
    }

    pub fn with_strategy(
        gateway: Arc<dyn PersistenceGateway>,
        clock: Arc<dyn Clock>,
        strategy: Arc<dyn ScoringStrategy>,
    ) -> Self {
        RoundScorer {
            gateway,
            clock,
            strategy,
        }
    }

    /// Applies final results to every fixture of the round, awards points to every bet and
    /// marks the round `scored`, all in one gateway transaction.
    pub async fn score_round(
        &self,
        round_id: RoundId,
        results: &HashMap<FixtureId, Outcome>,
    ) -> Result<ScoringSummary> {
        let round = self
            .gateway
            .get_round(round_id)
            .await?
            .ok_or_else(|| PoolError::NotFound(format!("round {round_id} does not exist")))?;
        if round.is_scored() {
            return Err(PoolError::Validation(format!(
                "Round {round_id} has already been scored"
            )));
        }

        let fixtures = self.gateway.get_fixtures_for_round(round_id).await?;
        if fixtures.is_empty() {
            return Err(PoolError::Validation(format!(
                "Round {round_id} has no fixtures to score"
            )));
        }
        let fixture_ids: HashSet<FixtureId> = fixtures.iter().map(|f| f.id).collect();
        let mut missing: Vec<FixtureId> = fixture_ids
            .iter()
            .copied()
            .filter(|id| !results.contains_key(id))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(PoolError::Validation(format!(
                "Missing results for fixture(s) {missing:?} in round {round_id}"
            )));
        }
        let mut foreign: Vec<FixtureId> = results
            .keys()
            .copied()
            .filter(|id| !fixture_ids.contains(id))
            .collect();
        if !foreign.is_empty() {
            foreign.sort_unstable();
            return Err(PoolError::Validation(format!(
                "Fixture(s) {foreign:?} do not belong to round {round_id}"
            )));
        }

        let bets = self.gateway.get_bets_for_round(round_id).await?;
        let scored: Vec<ScoredBet> = bets
            .iter()
            .filter_map(|bet| {
                let result = *results.get(&bet.fixture_id)?;
                Some(ScoredBet {
                    user_id: bet.user_id,
                    fixture_id: bet.fixture_id,
                    points: self.points_for(bet, result),
                })
            })
            .collect();
        let points_awarded = scored.iter().map(|s| i64::from(s.points)).sum();

        let mut ordered_results: Vec<(FixtureId, Outcome)> =
            results.iter().map(|(id, outcome)| (*id, *outcome)).collect();
        ordered_results.sort_unstable_by_key(|(id, _)| *id);

        let summary = ScoringSummary {
            round_id,
            competition_id: round.competition_id,
            fixtures_scored: ordered_results.len(),
            bets_scored: scored.len(),
            points_awarded,
        };
        self.gateway
            .commit_round_scores(RoundScoreUpdate {
                round_id,
                results: ordered_results,
                bets: scored,
                scored_at: self.clock.now(),
            })
            .await
            .map_err(|e| {
                error!("failed to commit scores for round {round_id}: {e}");
                PoolError::from(e)
            })?;

        info!(
            "scored round {round_id}: {} bets, {} points",
            summary.bets_scored, summary.points_awarded
        );
        Ok(summary)
    }

    fn points_for(&self, bet: &Bet, result: Outcome) -> i32 {
        let points = self.strategy.score(bet, result);
        if !(0..=MAX_POINTS_PER_FIXTURE).contains(&points) {
            warn!(
                "scoring strategy returned {points} for user {} fixture {}; clamping",
                bet.user_id, bet.fixture_id
            );
        }
        points.clamp(0, MAX_POINTS_PER_FIXTURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::round::RoundStatus;
    use crate::service::test_support::*;
    use chrono::Duration;

    struct Generous;

    impl ScoringStrategy for Generous {
        fn score(&self, _bet: &Bet, _result: Outcome) -> i32 {
            3
        }
    }

    fn seeded() -> (World, UserId, UserId) {
        let world = World::new();
        world.round(1, 10, RoundStatus::Closed);
        world.fixture(100, 1, world.now() - Duration::hours(3));
        world.fixture(101, 1, world.now() - Duration::hours(2));
        let alice = world.user(world.now() - Duration::days(10));
        let bob = world.user(world.now() - Duration::days(10));
        world.bet(alice, 1, 100, Outcome::Home, None);
        world.bet(alice, 1, 101, Outcome::Draw, None);
        world.bet(bob, 1, 100, Outcome::Away, None);
        (world, alice, bob)
    }

    fn results() -> HashMap<FixtureId, Outcome> {
        HashMap::from([(100, Outcome::Home), (101, Outcome::Draw)])
    }

    #[tokio::test]
    async fn awards_one_point_per_correct_outcome_and_marks_scored() {
        let (world, alice, bob) = seeded();

        let summary = world.scorer().score_round(1, &results()).await.unwrap();

        assert_eq!(summary.bets_scored, 3);
        assert_eq!(summary.points_awarded, 2);
        let round = world.gateway.round(1).unwrap();
        assert_eq!(round.status, RoundStatus::Scored);
        assert_eq!(round.scored_at, Some(world.now()));
        assert_eq!(world.gateway.fixture(101).unwrap().result, Some(Outcome::Draw));
        assert_eq!(points_of(&world, alice), 2);
        assert_eq!(points_of(&world, bob), 0);
        assert!(world
            .gateway
            .bets_for_user(bob)
            .iter()
            .all(|b| b.points_awarded == Some(0)));
    }

    #[tokio::test]
    async fn strategy_points_are_capped_per_fixture() {
        let (world, alice, _) = seeded();
        let scorer = RoundScorer::with_strategy(
            world.gateway.clone(),
            world.clock.clone(),
            Arc::new(Generous),
        );
        scorer.score_round(1, &results()).await.unwrap();
        assert_eq!(points_of(&world, alice), 2);
    }

    #[tokio::test]
    async fn scored_round_is_terminal() {
        let (world, _, _) = seeded();
        world.scorer().score_round(1, &results()).await.unwrap();
        let err = world.scorer().score_round(1, &results()).await.unwrap_err();
        assert!(matches!(err, PoolError::Validation(_)));
    }

    #[tokio::test]
    async fn requires_a_result_for_every_fixture_and_nothing_else() {
        let (world, _, _) = seeded();
        let partial = HashMap::from([(100, Outcome::Home)]);
        let err = world.scorer().score_round(1, &partial).await.unwrap_err();
        assert!(matches!(err, PoolError::Validation(_)));

        let mut extra = results();
        extra.insert(555, Outcome::Away);
        let err = world.scorer().score_round(1, &extra).await.unwrap_err();
        assert!(matches!(err, PoolError::Validation(_)));
        assert_eq!(world.gateway.round(1).unwrap().status, RoundStatus::Closed);
    }

    #[tokio::test]
    async fn round_without_fixtures_cannot_be_scored() {
        let world = World::new();
        world.round(1, 10, RoundStatus::Closed);
        let err = world
            .scorer()
            .score_round(1, &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Validation(_)));
        assert_eq!(world.gateway.round(1).unwrap().status, RoundStatus::Closed);
    }

    #[tokio::test]
    async fn unknown_round_is_not_found() {
        let world = World::new();
        let err = world.scorer().score_round(9, &results()).await.unwrap_err();
        assert!(matches!(err, PoolError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_commit_leaves_round_unscored() {
        let (world, alice, _) = seeded();
        world.gateway.fail_writes_for_round(1);
        let err = world.scorer().score_round(1, &results()).await.unwrap_err();
        assert!(matches!(err, PoolError::Persistence(_)));
        assert_eq!(world.gateway.round(1).unwrap().status, RoundStatus::Closed);
        assert!(world
            .gateway
            .bets_for_user(alice)
            .iter()
            .all(|b| b.points_awarded.is_none()));
    }
}
