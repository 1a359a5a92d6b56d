use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;

use super::{Error, Result};

/// Time-to-live store holding this host's liveness marker.
pub trait HeartbeatStore: Send + Sync + 'static {
    /// Overwrites the marker of `host_id`; it expires after `ttl` unless renewed.
    fn beat(&self, host_id: &str, ttl: Duration) -> impl Future<Output = Result<()>> + Send;
}

pub fn heartbeat_key(host_id: &str) -> String {
    format!("heartbeat:{host_id}")
}

/// Writes `heartbeat:<host_id> = <unix seconds>` with an expiry to Redis.
///
/// A new multiplexed connection is opened per beat, so a Redis restart
/// only costs the beats that fall into the outage.
#[derive(Debug, Clone)]
pub struct RedisHeartbeat {
    client: redis::Client,
    timeout: Duration,
}

impl RedisHeartbeat {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|source| Error::RedisAddress {
            url: url.to_owned(),
            source,
        })?;
        Ok(Self { client, timeout })
    }
}

impl HeartbeatStore for RedisHeartbeat {
    async fn beat(&self, host_id: &str, ttl: Duration) -> Result<()> {
        let key = heartbeat_key(host_id);
        let now = Utc::now().timestamp();
        let write = async {
            let mut conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(Error::Redis)?;
            conn.set_ex::<_, _, ()>(&key, now, ttl.as_secs().max(1))
                .await
                .map_err(Error::Redis)
        };

        tokio::time::timeout(self.timeout, write)
            .await
            .map_err(|_| Error::HeartbeatTimeout(self.timeout))?
    }
}
