use crate::model::bet::Bet;
use crate::model::fixture::Fixture;
use crate::model::round::{BettingRound, RoundStatus};
use crate::model::user::UserProfile;
use crate::model::{CompetitionId, FixtureId, RoundId, UserId};
use crate::repository::gateway::{GatewayError, PersistenceGateway, Result, RoundScoreUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    users: BTreeMap<UserId, UserProfile>,
    rounds: BTreeMap<RoundId, BettingRound>,
    fixtures: BTreeMap<FixtureId, Fixture>,
    bets: BTreeMap<(UserId, FixtureId), Bet>,
    failing_rounds: HashSet<RoundId>,
    failing_users: HashSet<UserId>,
    reads_fail: bool,
}

/// Gateway backed by process memory. Enforces the same `(user_id, fixture_id)` uniqueness and
/// all-or-nothing batch writes as the Postgres gateway, and can be told to fail on demand.
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Unavailable("in-memory state poisoned".to_string()))
    }

    fn read(&self) -> Result<MutexGuard<'_, State>> {
        let state = self.lock()?;
        if state.reads_fail {
            return Err(GatewayError::Unavailable("reads disabled".to_string()));
        }
        Ok(state)
    }

    pub fn add_user(&self, user: UserProfile) {
        if let Ok(mut state) = self.lock() {
            state.users.insert(user.id, user);
        }
    }

    pub fn add_round(&self, round: BettingRound) {
        if let Ok(mut state) = self.lock() {
            state.rounds.insert(round.id, round);
        }
    }

    pub fn add_fixture(&self, fixture: Fixture) {
        if let Ok(mut state) = self.lock() {
            state.fixtures.insert(fixture.id, fixture);
        }
    }

    /// Seeds a bet directly, bypassing the gateway write paths.
    pub fn add_bet(&self, bet: Bet) {
        if let Ok(mut state) = self.lock() {
            state.bets.insert((bet.user_id, bet.fixture_id), bet);
        }
    }

    /// Every write touching `round_id` fails until cleared.
    pub fn fail_writes_for_round(&self, round_id: RoundId) {
        if let Ok(mut state) = self.lock() {
            state.failing_rounds.insert(round_id);
        }
    }

    /// Profile lookups for `user_id` fail; the user still shows up in created-after listings.
    pub fn fail_lookups_for_user(&self, user_id: UserId) {
        if let Ok(mut state) = self.lock() {
            state.failing_users.insert(user_id);
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.reads_fail = fail;
        }
    }

    pub fn bets(&self) -> Vec<Bet> {
        self.lock()
            .map(|state| state.bets.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn bets_for_user(&self, user_id: UserId) -> Vec<Bet> {
        self.bets()
            .into_iter()
            .filter(|bet| bet.user_id == user_id)
            .collect()
    }

    pub fn round(&self, round_id: RoundId) -> Option<BettingRound> {
        self.lock()
            .ok()
            .and_then(|state| state.rounds.get(&round_id).cloned())
    }

    pub fn fixture(&self, fixture_id: FixtureId) -> Option<Fixture> {
        self.lock()
            .ok()
            .and_then(|state| state.fixtures.get(&fixture_id).cloned())
    }
}

fn check_writable(state: &State, bets: &[Bet]) -> Result<()> {
    if let Some(bet) = bets
        .iter()
        .find(|bet| state.failing_rounds.contains(&bet.round_id))
    {
        return Err(GatewayError::Unavailable(format!(
            "writes to round {} are failing",
            bet.round_id
        )));
    }
    Ok(())
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn get_round(&self, round_id: RoundId) -> Result<Option<BettingRound>> {
        Ok(self.read()?.rounds.get(&round_id).cloned())
    }

    async fn get_rounds(&self, competition_id: Option<CompetitionId>) -> Result<Vec<BettingRound>> {
        Ok(self
            .read()?
            .rounds
            .values()
            .filter(|round| competition_id.is_none_or(|id| round.competition_id == id))
            .cloned()
            .collect())
    }

    async fn get_fixtures_for_round(&self, round_id: RoundId) -> Result<Vec<Fixture>> {
        Ok(self
            .read()?
            .fixtures
            .values()
            .filter(|fixture| fixture.round_id == round_id)
            .cloned()
            .collect())
    }

    async fn get_fixture_rounds(
        &self,
        fixture_ids: &[FixtureId],
    ) -> Result<HashMap<FixtureId, RoundId>> {
        let state = self.read()?;
        Ok(fixture_ids
            .iter()
            .filter_map(|id| state.fixtures.get(id).map(|f| (f.id, f.round_id)))
            .collect())
    }

    async fn get_bets_for_round(&self, round_id: RoundId) -> Result<Vec<Bet>> {
        Ok(self
            .read()?
            .bets
            .values()
            .filter(|bet| bet.round_id == round_id)
            .cloned()
            .collect())
    }

    async fn get_all_bets(&self) -> Result<Vec<Bet>> {
        Ok(self.read()?.bets.values().cloned().collect())
    }

    async fn upsert_bets(&self, bets: &[Bet]) -> Result<usize> {
        let mut state = self.lock()?;
        check_writable(&state, bets)?;
        for bet in bets {
            state.bets.insert((bet.user_id, bet.fixture_id), bet.clone());
        }
        Ok(bets.len())
    }

    async fn insert_bets(&self, bets: &[Bet]) -> Result<usize> {
        let mut state = self.lock()?;
        check_writable(&state, bets)?;
        let mut seen = HashSet::new();
        for bet in bets {
            let key = (bet.user_id, bet.fixture_id);
            if state.bets.contains_key(&key) || !seen.insert(key) {
                return Err(GatewayError::Unavailable(format!(
                    "duplicate key value violates bets_user_fixture_key ({}, {})",
                    bet.user_id, bet.fixture_id
                )));
            }
        }
        for bet in bets {
            state.bets.insert((bet.user_id, bet.fixture_id), bet.clone());
        }
        Ok(bets.len())
    }

    async fn get_scored_round_ids(
        &self,
        competition_id: CompetitionId,
        from_round_id: Option<RoundId>,
    ) -> Result<Vec<RoundId>> {
        Ok(self
            .read()?
            .rounds
            .values()
            .filter(|round| round.competition_id == competition_id && round.is_scored())
            .filter(|round| from_round_id.is_none_or(|from| round.id >= from))
            .map(|round| round.id)
            .collect())
    }

    async fn get_round_ids_with_user_bets(&self, user_id: UserId) -> Result<Vec<RoundId>> {
        let state = self.read()?;
        let mut ids: Vec<RoundId> = state
            .bets
            .values()
            .filter(|bet| bet.user_id == user_id)
            .map(|bet| bet.round_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn get_user_created_at(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>> {
        let state = self.read()?;
        if state.failing_users.contains(&user_id) {
            return Err(GatewayError::Unavailable(format!(
                "lookups for user {user_id} are failing"
            )));
        }
        Ok(state.users.get(&user_id).map(|user| user.created_at))
    }

    async fn get_users_created_after(&self, created_after: DateTime<Utc>) -> Result<Vec<UserId>> {
        let mut users: Vec<UserProfile> = self
            .read()?
            .users
            .values()
            .filter(|user| user.created_at > created_after)
            .cloned()
            .collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users.into_iter().map(|user| user.id).collect())
    }

    async fn commit_round_scores(&self, update: RoundScoreUpdate) -> Result<()> {
        let mut state = self.lock()?;
        if state.failing_rounds.contains(&update.round_id) {
            return Err(GatewayError::Unavailable(format!(
                "writes to round {} are failing",
                update.round_id
            )));
        }
        if !state.rounds.contains_key(&update.round_id) {
            return Err(GatewayError::Query(diesel::result::Error::NotFound));
        }
        for (fixture_id, outcome) in &update.results {
            if let Some(fixture) = state.fixtures.get_mut(fixture_id) {
                fixture.result = Some(*outcome);
            }
        }
        for scored in &update.bets {
            if let Some(bet) = state.bets.get_mut(&(scored.user_id, scored.fixture_id)) {
                bet.points_awarded = Some(scored.points);
            }
        }
        if let Some(round) = state.rounds.get_mut(&update.round_id) {
            round.status = RoundStatus::Scored;
            round.scored_at = Some(update.scored_at);
        }
        Ok(())
    }
}
