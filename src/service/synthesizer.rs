//! Retroactive points for users who missed already-scored rounds.
//!
//! A user with no bets in a scored round is granted the lowest round total achieved by any
//! real participant, written as ordinary bet rows so standings need no special case.

use crate::error::{PoolError, Result};
use crate::model::bet::Bet;
use crate::model::fixture::{Fixture, Outcome};
use crate::model::{CompetitionId, RoundId, UserId};
use crate::repository::gateway::PersistenceGateway;
use crate::service::clock::Clock;
use crate::service::scorer::MAX_POINTS_PER_FIXTURE;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundBreakdown {
    pub round_id: RoundId,
    pub round_name: String,
    pub participants: usize,
    pub target_points: i32,
    pub fixtures: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundFailure {
    pub round_id: RoundId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetroactiveResult {
    pub user_id: UserId,
    pub dry_run: bool,
    pub rounds_processed: usize,
    pub total_points_awarded: i64,
    pub per_round_breakdown: Vec<RoundBreakdown>,
    pub errors: Vec<RoundFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFailure {
    pub user_id: UserId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkRetroactiveResult {
    pub dry_run: bool,
    pub users_considered: usize,
    pub users_processed: usize,
    pub rounds_processed: usize,
    pub total_points_awarded: i64,
    pub per_user: Vec<RetroactiveResult>,
    pub errors: Vec<UserFailure>,
}

/// Lowest round total among participants, or 0 when nobody took part.
pub fn minimum_participant_total(bets: &[Bet]) -> (usize, i32) {
    let mut totals: HashMap<UserId, i32> = HashMap::new();
    for bet in bets {
        *totals.entry(bet.user_id).or_insert(0) += bet.points();
    }
    let target = totals.values().copied().min().unwrap_or(0);
    (totals.len(), target.max(0))
}

/// Spreads `target` over the fixtures at one point each, in fixture order; the rest get 0.
///
/// Awarded rows carry the fixture's real result as their prediction and zero-point rows carry a
/// different outcome, so each row reads like a real scored bet.
pub fn synthesize_bets(
    user_id: UserId,
    fixtures: &[Fixture],
    target: i32,
    submitted_at: DateTime<Utc>,
) -> Vec<Bet> {
    let mut ordered: Vec<&Fixture> = fixtures.iter().collect();
    ordered.sort_by_key(|fixture| fixture.id);
    let mut remaining = target.max(0);
    ordered
        .into_iter()
        .map(|fixture| {
            let points = remaining.min(MAX_POINTS_PER_FIXTURE);
            remaining -= points;
            let result = fixture.result.unwrap_or(Outcome::Draw);
            let prediction = if points > 0 { result } else { result.other() };
            Bet {
                user_id,
                round_id: fixture.round_id,
                fixture_id: fixture.id,
                prediction,
                points_awarded: Some(points),
                submitted_at,
            }
        })
        .collect()
}

pub struct RetroactivePointsEngine {
    gateway: Arc<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
}

impl RetroactivePointsEngine {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, clock: Arc<dyn Clock>) -> Self {
        RetroactivePointsEngine { gateway, clock }
    }

    /// Scored rounds of the competition in which the user has no bet at all.
    pub async fn missed_rounds(
        &self,
        user_id: UserId,
        competition_id: CompetitionId,
        from_round_id: Option<RoundId>,
    ) -> Result<Vec<RoundId>> {
        let scored = self
            .gateway
            .get_scored_round_ids(competition_id, from_round_id)
            .await?;
        let played: BTreeSet<RoundId> = self
            .gateway
            .get_round_ids_with_user_bets(user_id)
            .await?
            .into_iter()
            .collect();
        let scored: BTreeSet<RoundId> = scored.into_iter().collect();
        Ok(scored.difference(&played).copied().collect())
    }

    /// Backfills every missed scored round for one user. A failing round is recorded in
    /// `errors` and does not undo rounds already written.
    pub async fn apply_retroactive_points(
        &self,
        user_id: UserId,
        competition_id: CompetitionId,
        from_round_id: Option<RoundId>,
        dry_run: bool,
    ) -> Result<RetroactiveResult> {
        if self.gateway.get_user_created_at(user_id).await?.is_none() {
            return Err(PoolError::NotFound(format!("user {user_id} does not exist")));
        }

        let missed = self
            .missed_rounds(user_id, competition_id, from_round_id)
            .await?;
        let mut result = RetroactiveResult {
            user_id,
            dry_run,
            rounds_processed: 0,
            total_points_awarded: 0,
            per_round_breakdown: Vec::with_capacity(missed.len()),
            errors: Vec::new(),
        };

        for round_id in missed {
            match self.backfill_round(user_id, round_id, dry_run).await {
                Ok(None) => {}
                Ok(Some(breakdown)) => {
                    result.rounds_processed += 1;
                    result.total_points_awarded += i64::from(breakdown.target_points);
                    result.per_round_breakdown.push(breakdown);
                }
                Err(e) => {
                    warn!("retroactive points for user {user_id} round {round_id} failed: {e}");
                    result.errors.push(RoundFailure {
                        round_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "retroactive points for user {user_id} (dry run: {dry_run}): {} rounds, {} points, {} errors",
            result.rounds_processed,
            result.total_points_awarded,
            result.errors.len()
        );
        Ok(result)
    }

    /// `None` when the round has no fixtures: there is nothing to write, so it is not counted
    /// and stays out of the breakdown.
    async fn backfill_round(
        &self,
        user_id: UserId,
        round_id: RoundId,
        dry_run: bool,
    ) -> Result<Option<RoundBreakdown>> {
        let round = self
            .gateway
            .get_round(round_id)
            .await?
            .ok_or_else(|| PoolError::NotFound(format!("round {round_id} does not exist")))?;
        let fixtures = self.gateway.get_fixtures_for_round(round_id).await?;
        if fixtures.is_empty() {
            warn!("scored round {round_id} has no fixtures; skipping retroactive points");
            return Ok(None);
        }
        let bets = self.gateway.get_bets_for_round(round_id).await?;

        let (participants, minimum) = minimum_participant_total(&bets);
        let cap = i32::try_from(fixtures.len())
            .unwrap_or(i32::MAX)
            .saturating_mul(MAX_POINTS_PER_FIXTURE);
        let target = minimum.min(cap);
        debug!(
            "round {round_id}: {participants} participants, minimum {minimum}, target {target} over {} fixtures",
            fixtures.len()
        );

        let rows = synthesize_bets(user_id, &fixtures, target, self.clock.now());
        if !dry_run {
            self.gateway.insert_bets(&rows).await?;
        }

        Ok(Some(RoundBreakdown {
            round_id,
            round_name: round.name,
            participants,
            target_points: target,
            fixtures: fixtures.len(),
            rows: rows.len(),
        }))
    }

    /// Runs the single-user backfill for every user created after `created_after`. One user's
    /// failure is recorded and the batch carries on.
    pub async fn apply_bulk(
        &self,
        competition_id: CompetitionId,
        created_after: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<BulkRetroactiveResult> {
        let users = self.gateway.get_users_created_after(created_after).await?;
        let mut bulk = BulkRetroactiveResult {
            dry_run,
            users_considered: users.len(),
            users_processed: 0,
            rounds_processed: 0,
            total_points_awarded: 0,
            per_user: Vec::new(),
            errors: Vec::new(),
        };

        for user_id in users {
            match self
                .apply_retroactive_points(user_id, competition_id, None, dry_run)
                .await
            {
                Ok(outcome) => {
                    bulk.users_processed += 1;
                    bulk.rounds_processed += outcome.rounds_processed;
                    bulk.total_points_awarded += outcome.total_points_awarded;
                    bulk.per_user.push(outcome);
                }
                Err(e) => {
                    warn!("retroactive points for user {user_id} aborted: {e}");
                    bulk.errors.push(UserFailure {
                        user_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "bulk retroactive points for users created after {created_after} (dry run: {dry_run}): {}/{} users, {} points",
            bulk.users_processed, bulk.users_considered, bulk.total_points_awarded
        );
        Ok(bulk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::round::RoundStatus;
    use crate::service::test_support::*;
    use chrono::Duration;

    /// A scored round with `fixtures` fixtures and one participant per entry of `totals`.
    fn scored_round(world: &World, round_id: RoundId, fixtures: i32, totals: &[i32]) {
        world.round(round_id, 10, RoundStatus::Scored);
        let first = round_id * 100;
        for offset in 0..fixtures {
            world.fixture_with_result(
                first + offset,
                round_id,
                world.now() - Duration::days(14),
                Outcome::Home,
            );
        }
        for &total in totals {
            let user = world.user(world.now() - Duration::days(60));
            for offset in 0..fixtures {
                let points = i32::from(offset < total);
                world.bet(user, round_id, first + offset, Outcome::Home, Some(points));
            }
        }
    }

    #[tokio::test]
    async fn grants_minimum_participant_total() {
        let world = World::new();
        scored_round(&world, 1, 6, &[3, 5, 2]);
        let late = world.user(world.now());

        let result = world
            .synthesizer()
            .apply_retroactive_points(late, 10, None, false)
            .await
            .unwrap();

        assert_eq!(result.rounds_processed, 1);
        assert_eq!(result.total_points_awarded, 2);
        assert!(result.errors.is_empty());
        let bets = world.gateway.bets_for_user(late);
        assert_eq!(bets.len(), 6);
        assert_eq!(bets.iter().map(Bet::points).sum::<i32>(), 2);
        assert!(bets.iter().all(|b| b.points() <= 1));
    }

    #[tokio::test]
    async fn four_fixture_round_with_minimum_of_one() {
        let world = World::new();
        scored_round(&world, 1, 4, &[2, 4, 1]);
        let late = world.user(world.now());

        world
            .synthesizer()
            .apply_retroactive_points(late, 10, None, false)
            .await
            .unwrap();

        let bets = world.gateway.bets_for_user(late);
        assert_eq!(bets.len(), 4);
        assert_eq!(bets.iter().filter(|b| b.points() == 1).count(), 1);
        assert_eq!(bets.iter().filter(|b| b.points() == 0).count(), 3);
        for bet in &bets {
            assert_eq!(bet.is_correct(), bet.prediction == Outcome::Home);
        }
    }

    #[tokio::test]
    async fn zero_participant_round_yields_zero_point_rows() {
        let world = World::new();
        scored_round(&world, 1, 3, &[]);
        let late = world.user(world.now());

        let result = world
            .synthesizer()
            .apply_retroactive_points(late, 10, None, false)
            .await
            .unwrap();

        assert_eq!(result.total_points_awarded, 0);
        assert!(result.errors.is_empty());
        assert_eq!(result.per_round_breakdown[0].participants, 0);
        let bets = world.gateway.bets_for_user(late);
        assert_eq!(bets.len(), 3);
        assert!(bets.iter().all(|b| b.points_awarded == Some(0)));
    }

    #[tokio::test]
    async fn second_run_finds_nothing_to_do() {
        let world = World::new();
        scored_round(&world, 1, 4, &[2, 3]);
        scored_round(&world, 2, 4, &[1, 4]);
        let late = world.user(world.now());
        let engine = world.synthesizer();

        let first = engine
            .apply_retroactive_points(late, 10, None, false)
            .await
            .unwrap();
        let before = world.gateway.bets_for_user(late);
        let second = engine
            .apply_retroactive_points(late, 10, None, false)
            .await
            .unwrap();

        assert_eq!(first.rounds_processed, 2);
        assert_eq!(first.total_points_awarded, 3);
        assert_eq!(second.rounds_processed, 0);
        assert!(second.per_round_breakdown.is_empty());
        assert_eq!(world.gateway.bets_for_user(late), before);
    }

    #[tokio::test]
    async fn scored_round_without_fixtures_is_never_counted() {
        let world = World::new();
        world.round(1, 10, RoundStatus::Scored);
        scored_round(&world, 2, 2, &[1]);
        let late = world.user(world.now());
        let engine = world.synthesizer();

        let first = engine
            .apply_retroactive_points(late, 10, None, false)
            .await
            .unwrap();
        let second = engine
            .apply_retroactive_points(late, 10, None, false)
            .await
            .unwrap();

        assert_eq!(first.rounds_processed, 1);
        assert_eq!(first.per_round_breakdown[0].round_id, 2);
        assert!(first.errors.is_empty());
        assert_eq!(second.rounds_processed, 0);
        assert!(second.per_round_breakdown.is_empty());
        assert!(second.errors.is_empty());
    }

    #[tokio::test]
    async fn dry_run_reports_without_writing() {
        let world = World::new();
        scored_round(&world, 1, 4, &[2, 3]);
        let late = world.user(world.now());

        let preview = world
            .synthesizer()
            .apply_retroactive_points(late, 10, None, true)
            .await
            .unwrap();

        assert!(preview.dry_run);
        assert_eq!(preview.total_points_awarded, 2);
        assert_eq!(preview.per_round_breakdown[0].rows, 4);
        assert!(world.gateway.bets_for_user(late).is_empty());
    }

    #[tokio::test]
    async fn skips_rounds_played_unscored_and_before_start() {
        let world = World::new();
        scored_round(&world, 1, 2, &[1]);
        scored_round(&world, 2, 2, &[2]);
        scored_round(&world, 3, 2, &[1]);
        world.round(4, 10, RoundStatus::Closed);
        let late = world.user(world.now());
        world.bet(late, 3, 300, Outcome::Away, Some(0));

        let missed = world
            .synthesizer()
            .missed_rounds(late, 10, Some(2))
            .await
            .unwrap();
        assert_eq!(missed, vec![2]);
    }

    #[tokio::test]
    async fn failing_round_is_reported_and_others_commit() {
        let world = World::new();
        scored_round(&world, 1, 2, &[1]);
        scored_round(&world, 2, 2, &[2]);
        world.gateway.fail_writes_for_round(1);
        let late = world.user(world.now());

        let result = world
            .synthesizer()
            .apply_retroactive_points(late, 10, None, false)
            .await
            .unwrap();

        assert_eq!(result.rounds_processed, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].round_id, 1);
        let bets = world.gateway.bets_for_user(late);
        assert_eq!(bets.len(), 2);
        assert!(bets.iter().all(|b| b.round_id == 2));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let world = World::new();
        let err = world
            .synthesizer()
            .apply_retroactive_points(uuid::Uuid::new_v4(), 10, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::NotFound(_)));
    }

    #[tokio::test]
    async fn bulk_covers_late_joiners_only_and_isolates_failures() {
        let world = World::new();
        scored_round(&world, 1, 3, &[2, 3]);
        let cutoff = world.now() - Duration::days(1);
        let late_a = world.user(world.now() - Duration::hours(5));
        let late_b = world.user(world.now() - Duration::hours(2));

        let bulk = world
            .synthesizer()
            .apply_bulk(10, cutoff, false)
            .await
            .unwrap();

        assert_eq!(bulk.users_considered, 2);
        assert_eq!(bulk.users_processed, 2);
        assert_eq!(bulk.total_points_awarded, 4);
        assert_eq!(world.gateway.bets_for_user(late_a).len(), 3);
        assert_eq!(world.gateway.bets_for_user(late_b).len(), 3);

        scored_round(&world, 2, 3, &[1]);
        world.gateway.fail_writes_for_round(2);
        let rerun = world
            .synthesizer()
            .apply_bulk(10, cutoff, false)
            .await
            .unwrap();
        assert_eq!(rerun.users_processed, 2);
        assert!(rerun.per_user.iter().all(|u| u.errors.len() == 1));
        assert_eq!(rerun.total_points_awarded, 0);
    }

    #[tokio::test]
    async fn bulk_records_a_failed_user_and_commits_the_rest() {
        let world = World::new();
        scored_round(&world, 1, 3, &[2, 3]);
        let cutoff = world.now() - Duration::days(1);
        let broken = world.user(world.now() - Duration::hours(5));
        let healthy = world.user(world.now() - Duration::hours(2));
        world.gateway.fail_lookups_for_user(broken);

        let bulk = world
            .synthesizer()
            .apply_bulk(10, cutoff, false)
            .await
            .unwrap();

        assert_eq!(bulk.users_considered, 2);
        assert_eq!(bulk.users_processed, 1);
        assert_eq!(bulk.errors.len(), 1);
        assert_eq!(bulk.errors[0].user_id, broken);
        assert_eq!(bulk.per_user.len(), 1);
        assert_eq!(bulk.per_user[0].user_id, healthy);
        assert_eq!(bulk.total_points_awarded, 2);
        assert!(world.gateway.bets_for_user(broken).is_empty());
        let committed = world.gateway.bets_for_user(healthy);
        assert_eq!(committed.len(), 3);
        assert_eq!(committed.iter().map(Bet::points).sum::<i32>(), 2);
    }

    #[test]
    fn synthesized_points_never_exceed_fixture_count() {
        let now = Utc::now();
        let fixtures: Vec<Fixture> = (1..=2)
            .map(|id| Fixture {
                id,
                round_id: 1,
                home_team: "A".into(),
                away_team: "B".into(),
                kickoff: now,
                result: None,
            })
            .collect();
        let rows = synthesize_bets(uuid::Uuid::new_v4(), &fixtures, 5, now);
        assert_eq!(rows.iter().map(Bet::points).sum::<i32>(), 2);
        assert!(rows.iter().all(|b| b.prediction == Outcome::Draw));
    }
}
