//! External event source adapters
//!
//! One client per provider, each normalizing its own wire format into the
//! shared `Event` shape at this boundary. Clients are rate limited and
//! surface availability through `ProviderAdapter::available` so a missing
//! credential degrades to an empty contribution instead of failing the
//! aggregation.

pub mod predicthq;
pub mod scraper;
pub mod ticketmaster;

pub use predicthq::PredictHqClient;
pub use scraper::CityEventScraper;
pub use ticketmaster::TicketmasterClient;

use dscout_common::config::TomlConfig;
use dscout_common::Result;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{resolve_api_key, ApiKeyKind};
use crate::types::ProviderAdapter;

/// Minimum-interval rate limiter shared by the provider clients
pub(crate) struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with rate limit
    pub(crate) async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Build the production provider set from resolved credentials.
///
/// Every enabled provider is constructed even without a key; keyless
/// adapters report unavailable and the aggregator records them as such.
pub async fn build_providers(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Vec<Arc<dyn ProviderAdapter>>> {
    let tm_key = resolve_api_key(ApiKeyKind::Ticketmaster, db, toml_config).await?;
    let phq_key = resolve_api_key(ApiKeyKind::PredictHq, db, toml_config).await?;
    let firecrawl_key = resolve_api_key(ApiKeyKind::Firecrawl, db, toml_config).await?;

    let providers: Vec<Arc<dyn ProviderAdapter>> = vec![
        Arc::new(TicketmasterClient::new(tm_key)?),
        Arc::new(PredictHqClient::new(phq_key)?),
        Arc::new(CityEventScraper::new(firecrawl_key)?),
    ];

    for provider in &providers {
        if !provider.available() {
            tracing::warn!(
                provider = %provider.source(),
                "Provider has no credentials; it will contribute no events"
            );
        }
    }

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_creation() {
        let limiter = RateLimiter::new(200);
        assert_eq!(limiter.min_interval, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(100);

        let start = Instant::now();
        limiter.wait().await;
        let first_elapsed = start.elapsed();

        limiter.wait().await;
        let second_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(50));
        assert!(second_elapsed >= Duration::from_millis(90));
    }
}
