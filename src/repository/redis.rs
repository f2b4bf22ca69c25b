use crate::model::standing::Standing;
use crate::model::CompetitionId;
use crate::repository::redis::CacheError::{RedisCMDError, RedisPoolError, RedisTypeError};
use log::error;
use mobc::{Connection, Pool};
use mobc_redis::{
    redis,
    redis::{AsyncCommands, FromRedisValue},
    RedisConnectionManager,
};
use std::time::Duration;
use thiserror::Error;

pub type MobcPool = Pool<RedisConnectionManager>;
pub type MobcConn = Connection<RedisConnectionManager>;
type Result<T> = std::result::Result<T, CacheError>;

const CACHE_POOL_MAX_OPEN: u64 = 16;
const CACHE_POOL_MAX_IDLE: u64 = 8;
const CACHE_POOL_TIMEOUT_SECONDS: u64 = 1;
const CACHE_POOL_EXPIRE_SECONDS: u64 = 60;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("could not get redis connection from pool : {0}")]
    RedisPoolError(mobc::Error<redis::RedisError>),
    #[error("error parsing string from redis result: {0}")]
    RedisTypeError(redis::RedisError),
    #[error("error executing redis command: {0}")]
    RedisCMDError(redis::RedisError),
    #[error("error creating Redis client: {0}")]
    RedisClientError(redis::RedisError),
    #[error("cached standings are not valid json: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Caches computed standings per competition. Callers treat every error as a miss.
pub struct StandingsCache {
    pool: MobcPool,
    ttl_seconds: usize,
}

impl StandingsCache {
    pub fn new(redis_url: &str, ttl_seconds: usize) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(CacheError::RedisClientError)?;
        let manager = RedisConnectionManager::new(client);
        let pool = Pool::builder()
            .get_timeout(Some(Duration::from_secs(CACHE_POOL_TIMEOUT_SECONDS)))
            .max_open(CACHE_POOL_MAX_OPEN)
            .max_idle(CACHE_POOL_MAX_IDLE)
            .max_lifetime(Some(Duration::from_secs(CACHE_POOL_EXPIRE_SECONDS)))
            .build(manager);

        Ok(StandingsCache { pool, ttl_seconds })
    }

    fn key(competition_id: CompetitionId) -> String {
        format!("standings:{competition_id}")
    }

    async fn get_conn(&self) -> Result<MobcConn> {
        self.pool.get().await.map_err(|e| {
            error!("error connecting to redis: {}", e);
            RedisPoolError(e)
        })
    }

    pub async fn get(&self, competition_id: CompetitionId) -> Result<Option<Vec<Standing>>> {
        let mut con = self.get_conn().await?;
        let value: redis::Value = con
            .get(Self::key(competition_id))
            .await
            .map_err(RedisCMDError)?;
        let raw: Option<String> = FromRedisValue::from_redis_value(&value).map_err(RedisTypeError)?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn put(&self, competition_id: CompetitionId, standings: &[Standing]) -> Result<()> {
        let raw = serde_json::to_string(standings)?;
        let mut con = self.get_conn().await?;
        let key = Self::key(competition_id);
        con.set::<_, _, ()>(&key, raw).await.map_err(RedisCMDError)?;
        if self.ttl_seconds > 0 {
            con.expire::<_, ()>(&key, self.ttl_seconds)
                .await
                .map_err(RedisCMDError)?;
        }
        Ok(())
    }

    pub async fn invalidate(&self, competition_id: CompetitionId) -> Result<()> {
        let mut con = self.get_conn().await?;
        con.del::<_, ()>(Self::key(competition_id))
            .await
            .map_err(RedisCMDError)?;
        Ok(())
    }
}
