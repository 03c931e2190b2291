//! The waitboard (C4): a Redis-backed key/value store mapping execution
//! ids and per-job dependency UUIDs to the report-store ids callers use
//! to resolve status (§4.4).
//!
//! Grounded on the original implementation's `worker/cache` and
//! `backend/cache` packages (`Init`/`Set`/`Get`/`GetWithDefault`/`Close`),
//! rebuilt on the `redis` crate's async `ConnectionManager` rather than
//! `go-redis`, following the Rust stack the closest matching example
//! manifest (`Kazy1014-ferrous-ci-cd`) uses for the same role.

pub mod error;

use redis::AsyncCommands;
pub use error::{CacheError, CacheResult};

/// A connected handle to the waitboard.
pub struct Waitboard {
    conn: redis::aio::ConnectionManager,
}

impl Waitboard {
    pub async fn connect(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
    ) -> CacheResult<Self> {
        let mut url = String::from("redis://");
        if let (Some(u), Some(p)) = (username, password) {
            url.push_str(&format!("{u}:{p}@"));
        } else if let Some(p) = password {
            url.push_str(&format!(":{p}@"));
        }
        url.push_str(&format!("{host}:{port}"));

        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Store `value` under `key`. `ttl_seconds == 0` means no expiration,
    /// matching the original's `0` sentinel.
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        if ttl_seconds == 0 {
            let _: () = conn.set(key, value).await?;
        } else {
            let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        }
        Ok(())
    }

    /// Look up `key`, failing with `CacheError::Miss` if it is absent.
    pub async fn get(&self, key: &str) -> CacheResult<String> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        value.ok_or_else(|| CacheError::Miss(key.to_string()))
    }

    /// Look up `key`, returning `default` instead of failing when absent.
    pub async fn get_with_default(&self, key: &str, default: &str) -> CacheResult<String> {
        match self.get(key).await {
            Ok(v) => Ok(v),
            Err(CacheError::Miss(_)) => Ok(default.to_string()),
            Err(e) => Err(e),
        }
    }

    pub async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
