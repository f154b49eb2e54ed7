//! Country lookup for analytics
//!
//! Country codes are cached per session id. The cache is a bounded map that is cleared
//! wholesale when full; it only guards against unbounded growth. Lookups are bounded
//! by a short timeout and any failure simply yields no country.

use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use vinculo_common::config::GeoConfig;

/// Session id -> ISO country code
pub struct CountryCache {
    entries: Mutex<HashMap<String, String>>,
    capacity: usize,
}

impl CountryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<String> {
        self.entries.lock().ok()?.get(session_id).cloned()
    }

    /// Insert, clearing everything first if a new key would exceed capacity
    pub fn insert(&self, session_id: &str, country: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if !entries.contains_key(session_id) && entries.len() >= self.capacity {
            debug!(capacity = self.capacity, "Country cache full, clearing");
            entries.clear();
        }
        entries.insert(session_id.to_string(), country.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

/// Cached, time-bounded geo-IP resolver
pub struct GeoResolver {
    cache: CountryCache,
    http_client: Option<reqwest::Client>,
    endpoint: String,
    timeout: Duration,
}

impl GeoResolver {
    pub fn new(config: &GeoConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http_client = if config.enabled {
            reqwest::Client::builder().timeout(timeout).build().ok()
        } else {
            None
        };

        Self {
            cache: CountryCache::new(config.cache_capacity),
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Resolver that only serves cached values
    pub fn disabled(cache_capacity: usize) -> Self {
        Self {
            cache: CountryCache::new(cache_capacity),
            http_client: None,
            endpoint: String::new(),
            timeout: Duration::ZERO,
        }
    }

    pub fn cache(&self) -> &CountryCache {
        &self.cache
    }

    /// Country for a session, looking up the client IP on a cache miss
    pub async fn country_for(&self, session_id: &str, ip: Option<IpAddr>) -> Option<String> {
        if let Some(country) = self.cache.get(session_id) {
            return Some(country);
        }

        let ip = ip.filter(is_public)?;
        let client = self.http_client.as_ref()?;
        let url = format!("{}/{}?fields=countryCode", self.endpoint, ip);

        let lookup = async {
            let response = client.get(&url).send().await.ok()?;
            let body: GeoResponse = response.json().await.ok()?;
            body.country_code.filter(|c| c.len() == 2)
        };

        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Some(country)) => {
                self.cache.insert(session_id, &country);
                Some(country)
            }
            Ok(None) => None,
            Err(_) => {
                debug!(session_id, "Geo lookup timed out");
                None
            }
        }
    }
}

fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()),
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}
