use crate::error::{PoolError, Result};
use crate::model::bet::Bet;
use crate::model::fixture::Outcome;
use crate::model::round::RoundStatus;
use crate::model::{FixtureId, RoundId, UserId};
use crate::repository::gateway::PersistenceGateway;
use crate::service::clock::Clock;
use crate::service::lock_guard::RoundLockGuard;
use log::{error, info};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub fixture_id: FixtureId,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub round_id: RoundId,
    pub bets_written: usize,
}

/// Validates a coupon for one user and round, then writes it as one atomic upsert.
pub struct BetSubmissionCoordinator {
    gateway: Arc<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
    lock_guard: RoundLockGuard,
}

impl BetSubmissionCoordinator {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, clock: Arc<dyn Clock>) -> Self {
        let lock_guard = RoundLockGuard::new(gateway.clone(), clock.clone());
        BetSubmissionCoordinator {
            gateway,
            clock,
            lock_guard,
        }
    }

    /// Records `predictions` for `user_id`. When `expected_round` is given the coupon must
    /// resolve to that round. Nothing is written unless every check passes.
    pub async fn submit(
        &self,
        user_id: UserId,
        expected_round: Option<RoundId>,
        predictions: &[Prediction],
    ) -> Result<SubmissionReceipt> {
        if predictions.is_empty() {
            return Err(PoolError::Validation(
                "A coupon must contain at least one prediction".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(predictions.len());
        if let Some(dup) = predictions.iter().find(|p| !seen.insert(p.fixture_id)) {
            return Err(PoolError::Validation(format!(
                "Fixture {} appears more than once in the coupon",
                dup.fixture_id
            )));
        }

        if self.gateway.get_user_created_at(user_id).await?.is_none() {
            return Err(PoolError::NotFound(format!("user {user_id} does not exist")));
        }

        let fixture_ids: Vec<FixtureId> = predictions.iter().map(|p| p.fixture_id).collect();
        let round_id = self.resolve_round(&fixture_ids).await?;
        if let Some(expected) = expected_round {
            if expected != round_id {
                return Err(PoolError::Validation(format!(
                    "Coupon fixtures belong to round {round_id}, not round {expected}"
                )));
            }
        }

        let round = self.lock_guard.load_round(round_id).await?;
        if round.status != RoundStatus::Open || self.lock_guard.is_locked(&round).await? {
            return Err(PoolError::DeadlinePassed { round_id });
        }

        let submitted_at = self.clock.now();
        let rows: Vec<Bet> = predictions
            .iter()
            .map(|p| Bet {
                user_id,
                round_id,
                fixture_id: p.fixture_id,
                prediction: p.outcome,
                points_awarded: None,
                submitted_at,
            })
            .collect();

        let bets_written = self.gateway.upsert_bets(&rows).await.map_err(|e| {
            error!("failed to store coupon for user {user_id} in round {round_id}: {e}");
            PoolError::from(e)
        })?;
        info!("user {user_id} submitted {bets_written} predictions for round {round_id}");
        Ok(SubmissionReceipt {
            round_id,
            bets_written,
        })
    }

    async fn resolve_round(&self, fixture_ids: &[FixtureId]) -> Result<RoundId> {
        let mapping = self.gateway.get_fixture_rounds(fixture_ids).await?;
        let mut unknown: Vec<FixtureId> = fixture_ids
            .iter()
            .copied()
            .filter(|id| !mapping.contains_key(id))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(PoolError::NotFound(format!(
                "Unknown fixture(s): {}",
                unknown
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        let rounds: HashSet<RoundId> = mapping.values().copied().collect();
        if rounds.len() > 1 {
            return Err(PoolError::Validation(
                "All predictions in a coupon must belong to the same round".to_string(),
            ));
        }
        rounds
            .into_iter()
            .next()
            .ok_or_else(|| PoolError::Validation("Coupon resolved to no round".to_string()))
    }
}
