use crate::error::{PoolError, Result};
use crate::model::round::BettingRound;
use crate::model::RoundId;
use crate::repository::gateway::PersistenceGateway;
use crate::service::clock::Clock;
use chrono::{DateTime, Utc};
use log::warn;
use std::sync::Arc;

/// Decides whether a round still accepts bets.
///
/// The pool locks at the *first* kickoff of the round. A round with no resolvable kickoff stays
/// open, but gateway failures while resolving it are returned to the caller.
#[derive(Clone)]
pub struct RoundLockGuard {
    gateway: Arc<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
}

impl RoundLockGuard {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, clock: Arc<dyn Clock>) -> Self {
        RoundLockGuard { gateway, clock }
    }

    /// The betting deadline: the stored earliest kickoff, else the earliest fixture kickoff.
    pub async fn deadline(&self, round: &BettingRound) -> Result<Option<DateTime<Utc>>> {
        if let Some(kickoff) = round.earliest_fixture_kickoff {
            return Ok(Some(kickoff));
        }
        let fixtures = self.gateway.get_fixtures_for_round(round.id).await?;
        Ok(fixtures.iter().map(|fixture| fixture.kickoff).min())
    }

    pub async fn is_locked(&self, round: &BettingRound) -> Result<bool> {
        match self.deadline(round).await? {
            Some(deadline) => Ok(self.clock.now() >= deadline),
            None => {
                warn!(
                    "round {} ({}) has no known kickoff; accepting bets",
                    round.id, round.name
                );
                Ok(false)
            }
        }
    }

    pub async fn load_round(&self, round_id: RoundId) -> Result<BettingRound> {
        self.gateway
            .get_round(round_id)
            .await?
            .ok_or_else(|| PoolError::NotFound(format!("round {round_id} does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::*;
    use chrono::Duration;

    #[tokio::test]
    async fn locks_at_first_kickoff_not_last() {
        let world = World::new();
        let round = world.round(1, 10, RoundStatus::Open);
        world.fixture(100, 1, world.now() + Duration::hours(1));
        world.fixture(101, 1, world.now() + Duration::hours(3));
        let guard = world.lock_guard();

        assert!(!guard.is_locked(&round).await.unwrap());

        world.clock.set(world.now() + Duration::hours(2));
        assert!(guard.is_locked(&round).await.unwrap());
    }

    #[tokio::test]
    async fn locked_exactly_at_kickoff() {
        let world = World::new();
        let mut round = world.round(1, 10, RoundStatus::Open);
        round.earliest_fixture_kickoff = Some(world.now());
        assert!(world.lock_guard().is_locked(&round).await.unwrap());
    }

    #[tokio::test]
    async fn stored_kickoff_wins_over_fixture_scan() {
        let world = World::new();
        let mut round = world.round(1, 10, RoundStatus::Open);
        round.earliest_fixture_kickoff = Some(world.now() - Duration::minutes(5));
        world.fixture(100, 1, world.now() + Duration::hours(1));
        assert!(world.lock_guard().is_locked(&round).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_kickoff_is_open() {
        let world = World::new();
        let round = world.round(1, 10, RoundStatus::Open);
        assert!(!world.lock_guard().is_locked(&round).await.unwrap());
    }

    #[tokio::test]
    async fn kickoff_lookup_failure_is_an_error() {
        let world = World::new();
        let round = world.round(1, 10, RoundStatus::Open);
        world.gateway.fail_reads(true);
        let err = world.lock_guard().is_locked(&round).await.unwrap_err();
        assert!(matches!(err, PoolError::Persistence(_)));
    }
}
