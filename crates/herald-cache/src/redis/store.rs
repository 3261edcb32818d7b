//! Redis-backed presence store using Lua scripts for atomicity.
//!
//! Suitable for multi-instance deployments: every connection mutation and
//! its transition are evaluated inside one script, so no other writer can
//! interleave between "was the set empty" and the mutation itself.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::Script;
use tracing::{debug, error};

use herald_core::error::{AppError, ErrorKind};
use herald_core::result::AppResult;
use herald_core::traits::PresenceStore;
use herald_core::types::{
    ConnectionChange, PresenceRecord, PresenceStatus, StatusChange, Transition,
};

use super::client::RedisClient;
use crate::keys;

/// Lua script for atomic connection add.
///
/// KEYS[1] = connection set
/// KEYS[2] = record hash
/// ARGV[1] = connection id
///
/// Returns {cardinality_before, added, status, last_seen_at, members}.
const ADD_SCRIPT: &str = r#"
    local before = redis.call('SCARD', KEYS[1])
    local added = redis.call('SADD', KEYS[1], ARGV[1])
    local status = redis.call('HGET', KEYS[2], 'status')
    if not status then
        status = 'available'
        redis.call('HSET', KEYS[2], 'status', status)
    end
    local last_seen = redis.call('HGET', KEYS[2], 'last_seen_at') or ''
    return {before, added, status, last_seen, redis.call('SMEMBERS', KEYS[1])}
"#;

/// Lua script for atomic connection removal.
///
/// KEYS[1] = connection set
/// KEYS[2] = record hash
/// ARGV[1] = connection id
/// ARGV[2] = current timestamp (RFC 3339)
///
/// Returns {removed, cardinality_after, status, last_seen_at, members}.
const REMOVE_SCRIPT: &str = r#"
    local removed = redis.call('SREM', KEYS[1], ARGV[1])
    local after = redis.call('SCARD', KEYS[1])
    if removed == 1 and after == 0 then
        redis.call('HSET', KEYS[2], 'last_seen_at', ARGV[2])
    end
    local status = redis.call('HGET', KEYS[2], 'status') or 'available'
    local last_seen = redis.call('HGET', KEYS[2], 'last_seen_at') or ''
    return {removed, after, status, last_seen, redis.call('SMEMBERS', KEYS[1])}
"#;

/// Lua script for a status overwrite.
///
/// KEYS[1] = connection set
/// KEYS[2] = record hash
/// ARGV[1] = new status
///
/// Returns {previous_status, last_seen_at, members}.
const STATUS_SCRIPT: &str = r#"
    local previous = redis.call('HGET', KEYS[2], 'status') or 'available'
    redis.call('HSET', KEYS[2], 'status', ARGV[1])
    local last_seen = redis.call('HGET', KEYS[2], 'last_seen_at') or ''
    return {previous, last_seen, redis.call('SMEMBERS', KEYS[1])}
"#;

/// Redis-backed presence store.
#[derive(Clone)]
pub struct RedisPresenceStore {
    /// Redis client.
    client: RedisClient,
    add: Script,
    remove: Script,
    status: Script,
}

impl std::fmt::Debug for RedisPresenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPresenceStore")
            .field("client", &self.client)
            .finish()
    }
}

impl RedisPresenceStore {
    /// Create a new Redis presence store.
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            add: Script::new(ADD_SCRIPT),
            remove: Script::new(REMOVE_SCRIPT),
            status: Script::new(STATUS_SCRIPT),
        }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Store, format!("Redis error: {e}"), e)
    }

    fn user_keys(&self, user_id: &str) -> (String, String) {
        (
            self.client.prefixed_key(&keys::presence_connections(user_id)),
            self.client.prefixed_key(&keys::presence_record(user_id)),
        )
    }
}

/// Rebuild a record from the raw fields a script returned.
fn build_record(
    user_id: &str,
    members: Vec<String>,
    status: &str,
    last_seen: &str,
) -> PresenceRecord {
    PresenceRecord {
        user_id: user_id.to_string(),
        status: PresenceStatus::parse(status).unwrap_or_default(),
        connections: members.into_iter().collect(),
        last_seen_at: parse_timestamp(last_seen),
    }
}

/// Rebuild records from a batch pipeline reply.
///
/// `rows` alternates, per user, the SMEMBERS reply and the
/// `HMGET status last_seen_at` reply.
fn records_from_rows(
    user_ids: &[String],
    rows: Vec<Vec<Option<String>>>,
) -> AppResult<Vec<PresenceRecord>> {
    if rows.len() != user_ids.len() * 2 {
        return Err(AppError::store(format!(
            "Batch presence read returned {} replies for {} users",
            rows.len(),
            user_ids.len()
        )));
    }

    let mut rows = rows.into_iter();
    let mut records = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        let members = rows.next().unwrap_or_default().into_iter().flatten().collect();
        let mut fields = rows.next().unwrap_or_default().into_iter();
        let status = fields.next().flatten().unwrap_or_default();
        let last_seen = fields.next().flatten().unwrap_or_default();
        records.push(build_record(user_id, members, &status, &last_seen));
    }
    Ok(records)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn add_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        let (conns_key, record_key) = self.user_keys(user_id);
        let mut conn = self.client.conn_mut();

        let (before, added, status, last_seen, members): (i64, i64, String, String, Vec<String>) =
            self.add
                .key(&conns_key)
                .key(&record_key)
                .arg(connection_id)
                .invoke_async(&mut conn)
                .await
                .map_err(Self::map_err)?;

        let transition = (before == 0 && added == 1).then_some(Transition::CameOnline);
        debug!(user_id, connection_id, before, added, "Connection added via Redis");

        Ok(ConnectionChange {
            transition,
            record: build_record(user_id, members, &status, &last_seen),
        })
    }

    async fn remove_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        let (conns_key, record_key) = self.user_keys(user_id);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut conn = self.client.conn_mut();

        let (removed, after, status, last_seen, members): (i64, i64, String, String, Vec<String>) =
            self.remove
                .key(&conns_key)
                .key(&record_key)
                .arg(connection_id)
                .arg(&now)
                .invoke_async(&mut conn)
                .await
                .map_err(Self::map_err)?;

        let transition = (removed == 1 && after == 0).then_some(Transition::WentOffline);
        debug!(user_id, connection_id, removed, after, "Connection removed via Redis");

        Ok(ConnectionChange {
            transition,
            record: build_record(user_id, members, &status, &last_seen),
        })
    }

    async fn set_status(&self, user_id: &str, status: PresenceStatus) -> AppResult<StatusChange> {
        let (conns_key, record_key) = self.user_keys(user_id);
        let mut conn = self.client.conn_mut();

        let (previous, last_seen, members): (String, String, Vec<String>) = self
            .status
            .key(&conns_key)
            .key(&record_key)
            .arg(status.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(StatusChange {
            previous: PresenceStatus::parse(&previous).unwrap_or_default(),
            record: build_record(user_id, members, status.as_str(), &last_seen),
        })
    }

    async fn get(&self, user_id: &str) -> AppResult<PresenceRecord> {
        let mut records = self.get_batch(&[user_id.to_string()]).await?;
        records.pop().ok_or_else(|| {
            error!(user_id, "Batch read returned no record");
            AppError::store(format!("No presence record returned for '{user_id}'"))
        })
    }

    async fn get_batch(&self, user_ids: &[String]) -> AppResult<Vec<PresenceRecord>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Single-key commands only, so the pipeline stays valid across cluster slots.
        let mut pipe = redis::pipe();
        for user_id in user_ids {
            let (conns_key, record_key) = self.user_keys(user_id);
            pipe.cmd("SMEMBERS").arg(conns_key);
            pipe.cmd("HMGET").arg(record_key).arg("status").arg("last_seen_at");
        }

        let mut conn = self.client.conn_mut();
        let rows: Vec<Vec<Option<String>>> =
            pipe.query_async(&mut conn).await.map_err(Self::map_err)?;

        records_from_rows(user_ids, rows)
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.client.ping().await.map_err(Self::map_err)
    }
}
