use redis::{AsyncCommands, Client, RedisError};
use thiserror::Error;

const IN_FLIGHT_MARKER: &str = "__in_flight__";
/// Upper bound on how long an unfinished request blocks its key
const IN_FLIGHT_TTL_SECONDS: u64 = 60;
const MAX_KEY_LENGTH: usize = 255;

#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid idempotency key: {0}")]
    InvalidKey(String),
}

/// Outcome of claiming an idempotency key
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyState {
    /// First use; the caller owns the key until it completes or releases it
    New,
    /// Another request holding this key has not finished
    InFlight,
    /// A previous request finished with this response
    Completed(serde_json::Value),
}

/// Redis-backed idempotency keys for booking creation.
///
/// A key is claimed with `SET NX EX`, so of two concurrent requests with the
/// same key exactly one proceeds.
pub struct IdempotencyStore {
    client: Client,
    ttl_seconds: u64,
}

impl IdempotencyStore {
    pub fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self, IdempotencyError> {
        let client = Client::open(redis_url)?;
        Ok(Self {
            client,
            ttl_seconds,
        })
    }

    /// Claim `idempotency_key`, or report what already holds it
    pub async fn claim(&self, idempotency_key: &str) -> Result<IdempotencyState, IdempotencyError> {
        validate_key(idempotency_key)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format_key(idempotency_key);

        let claimed: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(IN_FLIGHT_MARKER)
            .arg("NX")
            .arg("EX")
            .arg(in_flight_ttl(self.ttl_seconds))
            .query_async(&mut conn)
            .await?;

        if claimed.is_some() {
            tracing::debug!(idempotency_key = %idempotency_key, "Claimed idempotency key");
            return Ok(IdempotencyState::New);
        }

        let existing: Option<String> = conn.get(&key).await?;
        match existing.as_deref() {
            // Expired between SET and GET; the client can simply retry
            None | Some(IN_FLIGHT_MARKER) => Ok(IdempotencyState::InFlight),
            Some(data) => Ok(IdempotencyState::Completed(serde_json::from_str(data)?)),
        }
    }

    /// Store the response for a claimed key
    pub async fn complete(
        &self,
        idempotency_key: &str,
        response: &serde_json::Value,
    ) -> Result<(), IdempotencyError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format_key(idempotency_key);
        let value = serde_json::to_string(response)?;

        conn.set_ex::<_, _, ()>(&key, value, self.ttl_seconds).await?;

        tracing::debug!(
            idempotency_key = %idempotency_key,
            ttl_seconds = %self.ttl_seconds,
            "Recorded idempotency key"
        );

        Ok(())
    }

    /// Free a claimed key after a failed attempt so the client may retry
    pub async fn release(&self, idempotency_key: &str) -> Result<(), IdempotencyError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(format_key(idempotency_key)).await?;
        Ok(())
    }
}

pub fn validate_key(idempotency_key: &str) -> Result<(), IdempotencyError> {
    if idempotency_key.trim().is_empty() {
        return Err(IdempotencyError::InvalidKey("key is empty".to_string()));
    }
    if idempotency_key.len() > MAX_KEY_LENGTH {
        return Err(IdempotencyError::InvalidKey(format!(
            "key is longer than {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// The marker outlives any single booking attempt but not a lost `complete`
fn in_flight_ttl(ttl_seconds: u64) -> u64 {
    ttl_seconds.min(IN_FLIGHT_TTL_SECONDS)
}

fn format_key(idempotency_key: &str) -> String {
    format!("idempotency:booking:{}", idempotency_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_key() {
        assert_eq!(format_key("abc-123"), "idempotency:booking:abc-123");
    }

    #[test]
    fn test_in_flight_marker_expires_before_response() {
        assert_eq!(in_flight_ttl(86_400), IN_FLIGHT_TTL_SECONDS);
        assert_eq!(in_flight_ttl(30), 30);
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("order-42").is_ok());
        assert!(matches!(validate_key("  "), Err(IdempotencyError::InvalidKey(_))));
        assert!(matches!(
            validate_key(&"k".repeat(256)),
            Err(IdempotencyError::InvalidKey(_))
        ));
    }

    // Needs a running Redis at REDIS_URL
    #[tokio::test]
    #[ignore]
    async fn test_claim_complete_and_replay() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let store = IdempotencyStore::new(&url, 60).unwrap();
        let key = format!("test-{}", uuid::Uuid::new_v4());

        assert_eq!(store.claim(&key).await.unwrap(), IdempotencyState::New);
        assert_eq!(store.claim(&key).await.unwrap(), IdempotencyState::InFlight);

        let response = serde_json::json!({"bookingId": "BK0000000001"});
        store.complete(&key, &response).await.unwrap();
        assert_eq!(
            store.claim(&key).await.unwrap(),
            IdempotencyState::Completed(response)
        );

        store.release(&key).await.unwrap();
        assert_eq!(store.claim(&key).await.unwrap(), IdempotencyState::New);
        store.release(&key).await.unwrap();
    }
}
