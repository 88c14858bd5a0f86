//! Typed key/value layer over Redis.
//!
//! Everything that needs short-lived shared state (factor readings, the
//! cached composite, breaker state, webhook payloads, price caches) goes
//! through this wrapper so the rest of the workspace never touches raw
//! redis commands.

use bias_core::BiasError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod keys;

#[derive(Clone)]
pub struct KvStore {
    conn: ConnectionManager,
}

fn cache_err(err: redis::RedisError) -> BiasError {
    BiasError::CacheError(err.to_string())
}

impl KvStore {
    pub async fn connect(url: &str) -> Result<Self, BiasError> {
        let client = redis::Client::open(url).map_err(cache_err)?;
        let conn = ConnectionManager::new(client).await.map_err(cache_err)?;
        Ok(Self { conn })
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>, BiasError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(cache_err)
    }

    pub async fn set_string(&self, key: &str, value: &str) -> Result<(), BiasError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(cache_err)
    }

    pub async fn set_string_ex(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<(), BiasError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(cache_err)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, BiasError> {
        match self.get_string(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| BiasError::CacheError(format!("decode {key}: {e}"))),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), BiasError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| BiasError::CacheError(format!("encode {key}: {e}")))?;
        self.set_string(key, &raw).await
    }

    pub async fn set_json_ex<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), BiasError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| BiasError::CacheError(format!("encode {key}: {e}")))?;
        self.set_string_ex(key, &raw, ttl_secs).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), BiasError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(cache_err)
    }

    pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result<(), BiasError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl_secs).await.map_err(cache_err)
    }

    /// Add a member to a sorted set scored by `score` (epoch seconds for
    /// time-indexed history).
    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), BiasError> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(key, member, score)
            .await
            .map_err(cache_err)
    }

    /// Highest-scored member at or below `max_score`, if any.
    pub async fn zrev_first_at_or_below(
        &self,
        key: &str,
        max_score: f64,
    ) -> Result<Option<String>, BiasError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrevrangebyscore_limit(key, max_score, f64::NEG_INFINITY, 0, 1)
            .await
            .map_err(cache_err)?;
        Ok(members.into_iter().next())
    }

    /// Remove members with scores in [min_score, max_score].
    pub async fn zremrangebyscore(
        &self,
        key: &str,
        min_score: f64,
        max_score: f64,
    ) -> Result<(), BiasError> {
        let mut conn = self.conn.clone();
        conn.zrembyscore::<_, _, _, ()>(key, min_score, max_score)
            .await
            .map_err(cache_err)
    }

    pub async fn lpush(&self, key: &str, value: &str) -> Result<(), BiasError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(key, value).await.map_err(cache_err)
    }

    /// Trim a list to at most `max_len` entries, keeping the newest.
    pub async fn ltrim(&self, key: &str, max_len: isize) -> Result<(), BiasError> {
        let mut conn = self.conn.clone();
        conn.ltrim::<_, ()>(key, 0, max_len - 1)
            .await
            .map_err(cache_err)
    }

    pub async fn lrange(&self, key: &str, limit: isize) -> Result<Vec<String>, BiasError> {
        let mut conn = self.conn.clone();
        conn.lrange(key, 0, limit - 1).await.map_err(cache_err)
    }
}
