use crate::config::config::Config;
use crate::model::bet::Bet;
use crate::model::fixture::{Fixture, Outcome};
use crate::model::round::{BettingRound, RoundStatus};
use crate::model::schema::{bets, betting_rounds, fixtures, users};
use crate::model::{CompetitionId, FixtureId, RoundId, UserId};
use crate::repository::gateway::{GatewayError, PersistenceGateway, Result, RoundScoreUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool::managed::Object;
use diesel::upsert::excluded;
use diesel::{
    ConnectionError, ConnectionResult, ExpressionMethods, Insertable, OptionalExtension, QueryDsl,
    Queryable,
};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use std::collections::HashMap;

pub type DBPool = deadpool::managed::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub struct Database {
    pool: DBPool,
}

#[derive(Queryable)]
struct RoundRow {
    id: i32,
    competition_id: i32,
    name: String,
    status: String,
    earliest_fixture_kickoff: Option<DateTime<Utc>>,
    latest_fixture_kickoff: Option<DateTime<Utc>>,
    scored_at: Option<DateTime<Utc>>,
    _created_at: DateTime<Utc>,
}

#[derive(Queryable)]
struct FixtureRow {
    id: i32,
    round_id: i32,
    home_team: String,
    away_team: String,
    kickoff: DateTime<Utc>,
    result: Option<String>,
}

#[derive(Queryable)]
struct BetRow {
    _id: i32,
    user_id: UserId,
    round_id: i32,
    fixture_id: i32,
    prediction: String,
    points_awarded: Option<i32>,
    submitted_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = bets)]
struct NewBet<'a> {
    user_id: UserId,
    round_id: i32,
    fixture_id: i32,
    prediction: &'a str,
    points_awarded: Option<i32>,
    submitted_at: DateTime<Utc>,
}

impl<'a> From<&'a Bet> for NewBet<'a> {
    fn from(bet: &'a Bet) -> Self {
        NewBet {
            user_id: bet.user_id,
            round_id: bet.round_id,
            fixture_id: bet.fixture_id,
            prediction: bet.prediction.as_str(),
            points_awarded: bet.points_awarded,
            submitted_at: bet.submitted_at,
        }
    }
}

impl TryFrom<RoundRow> for BettingRound {
    type Error = GatewayError;

    fn try_from(row: RoundRow) -> Result<Self> {
        let status = row
            .status
            .parse::<RoundStatus>()
            .map_err(|e| GatewayError::CorruptRow(format!("betting_rounds.{}: {e}", row.id)))?;
        Ok(BettingRound {
            id: row.id,
            competition_id: row.competition_id,
            name: row.name,
            status,
            earliest_fixture_kickoff: row.earliest_fixture_kickoff,
            latest_fixture_kickoff: row.latest_fixture_kickoff,
            scored_at: row.scored_at,
        })
    }
}

impl TryFrom<FixtureRow> for Fixture {
    type Error = GatewayError;

    fn try_from(row: FixtureRow) -> Result<Self> {
        let result = row
            .result
            .as_deref()
            .map(str::parse::<Outcome>)
            .transpose()
            .map_err(|e| GatewayError::CorruptRow(format!("fixtures.{}: {e}", row.id)))?;
        Ok(Fixture {
            id: row.id,
            round_id: row.round_id,
            home_team: row.home_team,
            away_team: row.away_team,
            kickoff: row.kickoff,
            result,
        })
    }
}

impl TryFrom<BetRow> for Bet {
    type Error = GatewayError;

    fn try_from(row: BetRow) -> Result<Self> {
        let prediction = row.prediction.parse::<Outcome>().map_err(|e| {
            GatewayError::CorruptRow(format!("bets({}, {}): {e}", row.user_id, row.fixture_id))
        })?;
        Ok(Bet {
            user_id: row.user_id,
            round_id: row.round_id,
            fixture_id: row.fixture_id,
            prediction,
            points_awarded: row.points_awarded,
            submitted_at: row.submitted_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = GatewayError>,
{
    rows.into_iter().map(T::try_from).collect()
}

impl Database {
    pub fn new(config: Config) -> Self {
        let ca_file = config.database_ca_file.clone();
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_setup(
            config.database_url,
            move |url| Box::pin(Self::establish(url.to_string(), ca_file.clone())),
        );
        let pool = Pool::builder(manager)
            .build()
            .expect("Failed to create pool.");
        Database { pool }
    }

    async fn establish(
        database_url: String,
        ca_file: Option<String>,
    ) -> ConnectionResult<AsyncPgConnection> {
        let mut builder = SslConnector::builder(SslMethod::tls())
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        if let Some(ca_file) = ca_file {
            builder
                .set_ca_file(&ca_file)
                .map_err(|e| ConnectionError::BadConnection(format!("{ca_file}: {e}")))?;
        }
        let connector = MakeTlsConnector::new(builder.build());
        let (client, connection) = tokio_postgres::connect(&database_url, connector)
            .await
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {e}");
            }
        });
        AsyncPgConnection::try_from(client).await
    }

    async fn get_db_conn(
        &self,
    ) -> Result<Object<AsyncDieselConnectionManager<AsyncPgConnection>>> {
        self.pool.get().await.map_err(|e| {
            error!("could not acquire a database connection: {e}");
            GatewayError::Pool(e.to_string())
        })
    }
}

#[async_trait]
impl PersistenceGateway for Database {
    async fn get_round(&self, round_id: RoundId) -> Result<Option<BettingRound>> {
        let mut conn = self.get_db_conn().await?;
        let row = betting_rounds::table
            .find(round_id)
            .first::<RoundRow>(&mut conn)
            .await
            .optional()?;
        row.map(BettingRound::try_from).transpose()
    }

    async fn get_rounds(&self, competition_id: Option<CompetitionId>) -> Result<Vec<BettingRound>> {
        let mut conn = self.get_db_conn().await?;
        let mut query = betting_rounds::table
            .order(betting_rounds::id.asc())
            .into_boxed();
        if let Some(competition_id) = competition_id {
            query = query.filter(betting_rounds::competition_id.eq(competition_id));
        }
        let rows = query.load::<RoundRow>(&mut conn).await?;
        convert_all(rows)
    }

    async fn get_fixtures_for_round(&self, round_id: RoundId) -> Result<Vec<Fixture>> {
        let mut conn = self.get_db_conn().await?;
        let rows = fixtures::table
            .filter(fixtures::round_id.eq(round_id))
            .order(fixtures::id.asc())
            .load::<FixtureRow>(&mut conn)
            .await?;
        convert_all(rows)
    }

    async fn get_fixture_rounds(
        &self,
        fixture_ids: &[FixtureId],
    ) -> Result<HashMap<FixtureId, RoundId>> {
        let mut conn = self.get_db_conn().await?;
        let pairs = fixtures::table
            .filter(fixtures::id.eq_any(fixture_ids.to_vec()))
            .select((fixtures::id, fixtures::round_id))
            .load::<(FixtureId, RoundId)>(&mut conn)
            .await?;
        Ok(pairs.into_iter().collect())
    }

    async fn get_bets_for_round(&self, round_id: RoundId) -> Result<Vec<Bet>> {
        let mut conn = self.get_db_conn().await?;
        let rows = bets::table
            .filter(bets::round_id.eq(round_id))
            .order(bets::id.asc())
            .load::<BetRow>(&mut conn)
            .await?;
        convert_all(rows)
    }

    async fn get_all_bets(&self) -> Result<Vec<Bet>> {
        let mut conn = self.get_db_conn().await?;
        let rows = bets::table
            .order(bets::id.asc())
            .load::<BetRow>(&mut conn)
            .await?;
        convert_all(rows)
    }

    async fn upsert_bets(&self, rows: &[Bet]) -> Result<usize> {
        let mut conn = self.get_db_conn().await?;
        let values: Vec<NewBet<'_>> = rows.iter().map(NewBet::from).collect();
        // A single multi-row statement, so the batch is atomic without an explicit transaction.
        let written = diesel::insert_into(bets::table)
            .values(&values)
            .on_conflict((bets::user_id, bets::fixture_id))
            .do_update()
            .set((
                bets::round_id.eq(excluded(bets::round_id)),
                bets::prediction.eq(excluded(bets::prediction)),
                bets::submitted_at.eq(excluded(bets::submitted_at)),
            ))
            .execute(&mut conn)
            .await?;
        Ok(written)
    }

    async fn insert_bets(&self, rows: &[Bet]) -> Result<usize> {
        let mut conn = self.get_db_conn().await?;
        let values: Vec<NewBet<'_>> = rows.iter().map(NewBet::from).collect();
        let written = diesel::insert_into(bets::table)
            .values(&values)
            .execute(&mut conn)
            .await?;
        Ok(written)
    }

    async fn get_scored_round_ids(
        &self,
        competition_id: CompetitionId,
        from_round_id: Option<RoundId>,
    ) -> Result<Vec<RoundId>> {
        let mut conn = self.get_db_conn().await?;
        let mut query = betting_rounds::table
            .filter(betting_rounds::competition_id.eq(competition_id))
            .filter(betting_rounds::status.eq(RoundStatus::Scored.as_str()))
            .select(betting_rounds::id)
            .order(betting_rounds::id.asc())
            .into_boxed();
        if let Some(from_round_id) = from_round_id {
            query = query.filter(betting_rounds::id.ge(from_round_id));
        }
        Ok(query.load::<RoundId>(&mut conn).await?)
    }

    async fn get_round_ids_with_user_bets(&self, user_id: UserId) -> Result<Vec<RoundId>> {
        let mut conn = self.get_db_conn().await?;
        let ids = bets::table
            .filter(bets::user_id.eq(user_id))
            .select(bets::round_id)
            .distinct()
            .load::<RoundId>(&mut conn)
            .await?;
        Ok(ids)
    }

    async fn get_user_created_at(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.get_db_conn().await?;
        let created_at = users::table
            .find(user_id)
            .select(users::created_at)
            .first::<DateTime<Utc>>(&mut conn)
            .await
            .optional()?;
        Ok(created_at)
    }

    async fn get_users_created_after(&self, created_after: DateTime<Utc>) -> Result<Vec<UserId>> {
        let mut conn = self.get_db_conn().await?;
        let ids = users::table
            .filter(users::created_at.gt(created_after))
            .order(users::created_at.asc())
            .select(users::id)
            .load::<UserId>(&mut conn)
            .await?;
        Ok(ids)
    }

    async fn commit_round_scores(&self, update: RoundScoreUpdate) -> Result<()> {
        let mut conn = self.get_db_conn().await?;
        let RoundScoreUpdate {
            round_id,
            results,
            bets: scored_bets,
            scored_at,
        } = update;
        let updated = conn
            .transaction::<usize, diesel::result::Error, _>(move |conn| {
                async move {
                    for (fixture_id, outcome) in &results {
                        diesel::update(fixtures::table.find(*fixture_id))
                            .set(fixtures::result.eq(outcome.as_str()))
                            .execute(conn)
                            .await?;
                    }
                    for scored in &scored_bets {
                        diesel::update(
                            bets::table
                                .filter(bets::user_id.eq(scored.user_id))
                                .filter(bets::fixture_id.eq(scored.fixture_id)),
                        )
                        .set(bets::points_awarded.eq(scored.points))
                        .execute(conn)
                        .await?;
                    }
                    diesel::update(betting_rounds::table.find(round_id))
                        .set((
                            betting_rounds::status.eq(RoundStatus::Scored.as_str()),
                            betting_rounds::scored_at.eq(scored_at),
                        ))
                        .execute(conn)
                        .await
                }
                .scope_boxed()
            })
            .await?;
        if updated == 0 {
            warn!("scoring pass for round {round_id} updated no round row");
            return Err(GatewayError::Query(diesel::result::Error::NotFound));
        }
        Ok(())
    }
}
