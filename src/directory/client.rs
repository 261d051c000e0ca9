//! Directory API client
//!
//! Every GET carries a fresh `ts` query parameter to defeat intermediate
//! caches. Rate-limit and server-error responses are retried exactly once
//! after a fixed delay; anything else non-2xx is returned as an error.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL, PRAGMA};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::models::{
    canonical_tag, BattleRecord, ClanMember, ClanSummary, ItemList, Player,
};
use super::Directory;
use crate::config::ApiSettings;
use crate::error::{ConfigError, NetworkError};

/// Raw HTTP answer
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Blocking GET transport
pub trait Transport: Send + Sync {
    fn get(&self, path: &str, query: &[(String, String)]) -> Result<HttpResponse, NetworkError>;
}

/// Statuses that earn the single retry
pub fn is_retryable(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// reqwest-backed transport with auth and no-cache headers
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(settings: &ApiSettings, token: &str) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ConfigError::InvalidApi("token contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidApi(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, path: &str, query: &[(String, String)]) -> Result<HttpResponse, NetworkError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| NetworkError::Transport {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| NetworkError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Ok(HttpResponse { status, body })
    }
}

/// Strictly increasing unix-millisecond stamps
#[derive(Debug, Default)]
struct CacheBuster {
    last: AtomicU64,
}

impl CacheBuster {
    fn next(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Directory client over any transport
pub struct ApiClient<T: Transport> {
    transport: T,
    retry_delay: Duration,
    cache_buster: CacheBuster,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, retry_delay: Duration) -> Self {
        Self {
            transport,
            retry_delay,
            cache_buster: CacheBuster::default(),
        }
    }

    fn send(&self, path: &str, params: &[(&str, String)]) -> Result<HttpResponse, NetworkError> {
        let mut query: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        query.push(("ts".to_string(), self.cache_buster.next().to_string()));
        self.transport.get(path, &query)
    }

    /// GET with cache-busting and a single retry, decoded as JSON
    pub fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<R, NetworkError> {
        let mut response = self.send(path, params)?;
        if is_retryable(response.status) {
            warn!(
                "{} returned HTTP {}, retrying once in {:?}",
                path, response.status, self.retry_delay
            );
            std::thread::sleep(self.retry_delay);
            response = self.send(path, params)?;
        }

        if !(200..300).contains(&response.status) {
            return Err(NetworkError::Status {
                path: path.to_string(),
                status: response.status,
            });
        }

        debug!("{} -> HTTP {} ({} bytes)", path, response.status, response.body.len());
        serde_json::from_str(&response.body).map_err(|e| NetworkError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

fn clan_path(tag: &str, suffix: &str) -> String {
    format!("/clans/%23{}{}", canonical_tag(tag), suffix)
}

fn player_path(tag: &str, suffix: &str) -> String {
    format!("/players/%23{}{}", canonical_tag(tag), suffix)
}

impl<T: Transport> Directory for ApiClient<T> {
    fn search_clans(&self, name: &str, limit: u32) -> Result<Vec<ClanSummary>, NetworkError> {
        let list: ItemList<ClanSummary> = self.get_json(
            "/clans",
            &[("name", name.to_string()), ("limit", limit.to_string())],
        )?;
        Ok(list.items)
    }

    fn clan_members(&self, clan_tag: &str) -> Result<Vec<ClanMember>, NetworkError> {
        let list: ItemList<ClanMember> = self.get_json(&clan_path(clan_tag, "/members"), &[])?;
        Ok(list.items)
    }

    fn player(&self, player_tag: &str) -> Result<Player, NetworkError> {
        self.get_json(&player_path(player_tag, ""), &[])
    }

    fn battle_log(&self, player_tag: &str) -> Result<Vec<BattleRecord>, NetworkError> {
        self.get_json(&player_path(player_tag, "/battlelog"), &[])
    }
}
