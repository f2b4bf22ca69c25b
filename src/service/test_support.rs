//! Shared fixtures for service tests: an in-memory gateway and a frozen clock.

pub use crate::error::PoolError;
pub use crate::model::bet::Bet;
pub use crate::model::fixture::{Fixture, Outcome};
pub use crate::model::round::{BettingRound, RoundStatus};
pub use crate::model::user::UserProfile;
pub use crate::model::{FixtureId, RoundId, UserId};
pub use crate::repository::memory::InMemoryGateway;
pub use crate::service::clock::{Clock, FixedClock};
use crate::service::lock_guard::RoundLockGuard;
use crate::service::scorer::RoundScorer;
use crate::service::submission::BetSubmissionCoordinator;
use crate::service::synthesizer::RetroactivePointsEngine;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct World {
    pub gateway: Arc<InMemoryGateway>,
    pub clock: Arc<FixedClock>,
}

impl World {
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2023, 9, 2, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        World {
            gateway: Arc::new(InMemoryGateway::new()),
            clock: Arc::new(FixedClock::new(start)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn round(&self, id: RoundId, competition_id: i32, status: RoundStatus) -> BettingRound {
        let round = BettingRound {
            id,
            competition_id,
            name: format!("Round {id}"),
            status,
            earliest_fixture_kickoff: None,
            latest_fixture_kickoff: None,
            scored_at: None,
        };
        self.gateway.add_round(round.clone());
        round
    }

    pub fn fixture(&self, id: FixtureId, round_id: RoundId, kickoff: DateTime<Utc>) {
        self.gateway.add_fixture(Fixture {
            id,
            round_id,
            home_team: format!("Home {id}"),
            away_team: format!("Away {id}"),
            kickoff,
            result: None,
        });
    }

    pub fn fixture_with_result(
        &self,
        id: FixtureId,
        round_id: RoundId,
        kickoff: DateTime<Utc>,
        result: Outcome,
    ) {
        self.gateway.add_fixture(Fixture {
            id,
            round_id,
            home_team: format!("Home {id}"),
            away_team: format!("Away {id}"),
            kickoff,
            result: Some(result),
        });
    }

    pub fn user(&self, created_at: DateTime<Utc>) -> UserId {
        let id = Uuid::new_v4();
        self.gateway.add_user(UserProfile {
            id,
            username: format!("user-{}", &id.to_string()[..8]),
            created_at,
        });
        id
    }

    pub fn bet(
        &self,
        user_id: UserId,
        round_id: RoundId,
        fixture_id: FixtureId,
        prediction: Outcome,
        points: Option<i32>,
    ) {
        self.gateway.add_bet(Bet {
            user_id,
            round_id,
            fixture_id,
            prediction,
            points_awarded: points,
            submitted_at: self.now(),
        });
    }

    pub fn lock_guard(&self) -> RoundLockGuard {
        RoundLockGuard::new(self.gateway.clone(), self.clock.clone())
    }

    pub fn coordinator(&self) -> BetSubmissionCoordinator {
        BetSubmissionCoordinator::new(self.gateway.clone(), self.clock.clone())
    }

    pub fn scorer(&self) -> RoundScorer {
        RoundScorer::new(self.gateway.clone(), self.clock.clone())
    }

    pub fn synthesizer(&self) -> RetroactivePointsEngine {
        RetroactivePointsEngine::new(self.gateway.clone(), self.clock.clone())
    }
}

pub fn points_of(world: &World, user_id: UserId) -> i32 {
    world
        .gateway
        .bets_for_user(user_id)
        .iter()
        .map(Bet::points)
        .sum()
}
