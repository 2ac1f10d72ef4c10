//! REST-backed signal sources.
//!
//! One client over the dashboard backend's JSON endpoints. Wire-shape
//! quirks (list payloads nesting entries under different keys, activity
//! statistics split from recent events) are normalized here; nothing past
//! this boundary branches on field-name variants.

use super::{
    ActivitySource, BehaviorSignal, EventSummary, GeoSignal, GeoSource, SignalError,
    ThreatIntelSource, ThreatSignal,
};
use crate::config::BackendConfig;
use crate::membership::{ListEntry, ListKind, ListSource};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client over the backend REST API.
pub struct BackendClient {
    base_url: String,
    client: Client,
}

impl BackendClient {
    /// Build a client from backend settings.
    pub fn new(config: &BackendConfig) -> Result<Self, SignalError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SignalError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// GET a JSON resource; `Ok(None)` on 404.
    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, SignalError> {
        let response = self.client.get(self.url(path)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(SignalError::RateLimited),
            status if status.is_success() => {
                let body = response.json::<T>().await.map_err(|e| {
                    SignalError::InvalidResponse(format!("Failed to parse response: {}", e))
                })?;
                Ok(Some(body))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SignalError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status, body
                )))
            }
        }
    }

    /// POST to a forced-refresh endpoint; the body is required on success.
    async fn post_enrich<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, SignalError> {
        let response = self.client.post(self.url(path)).send().await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(SignalError::RateLimited),
            status if status.is_success() => response.json::<T>().await.map_err(|e| {
                SignalError::InvalidResponse(format!("Failed to parse response: {}", e))
            }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SignalError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status, body
                )))
            }
        }
    }
}

/// Activity endpoint payload: statistics plus the recent-event rows the
/// backend keeps alongside them.
#[derive(Debug, Deserialize)]
struct ActivityResponse {
    statistics: BehaviorSignal,
    #[serde(default)]
    recent_events: Vec<EventSummary>,
}

#[async_trait]
impl ThreatIntelSource for BackendClient {
    async fn lookup(&self, ip: &str) -> Result<Option<ThreatSignal>, SignalError> {
        debug!(ip = %ip, "Fetching threat intel");
        self.get_optional(&format!("threat-intel/{}", ip)).await
    }

    async fn enrich(&self, ip: &str) -> Result<ThreatSignal, SignalError> {
        debug!(ip = %ip, "Forcing threat intel refresh");
        self.post_enrich(&format!("threat-intel/{}/enrich", ip)).await
    }
}

#[async_trait]
impl GeoSource for BackendClient {
    async fn lookup(&self, ip: &str) -> Result<Option<GeoSignal>, SignalError> {
        debug!(ip = %ip, "Fetching geo data");
        self.get_optional(&format!("geo/{}", ip)).await
    }

    async fn enrich(&self, ip: &str) -> Result<GeoSignal, SignalError> {
        debug!(ip = %ip, "Forcing geo refresh");
        self.post_enrich(&format!("geo/{}/enrich", ip)).await
    }
}

#[async_trait]
impl ActivitySource for BackendClient {
    async fn lookup(&self, ip: &str) -> Result<Option<BehaviorSignal>, SignalError> {
        debug!(ip = %ip, "Fetching local activity");
        let response: Option<ActivityResponse> =
            self.get_optional(&format!("local-activity/{}", ip)).await?;

        Ok(response.map(|r| {
            let mut signal = r.statistics;
            if signal.recent_events.is_empty() {
                signal.recent_events = r.recent_events;
            }
            signal
        }))
    }
}

#[async_trait]
impl ListSource for BackendClient {
    async fn fetch_list(&self, kind: ListKind, limit: u32) -> Result<Vec<ListEntry>, SignalError> {
        debug!(list = kind.as_str(), limit, "Fetching membership list");
        let payload: Option<Value> = self
            .get_optional(&format!("list/{}?limit={}", kind.as_str(), limit))
            .await?;

        match payload {
            Some(value) => normalize_list_payload(&value),
            None => Ok(Vec::new()),
        }
    }
}

/// Normalize the shape-varying list payloads into flat entries.
///
/// Endpoints historically nested entries under `items`, `blocks`, or
/// `watchlist`; some return a bare array. Rows are either plain strings or
/// objects with an `ip` field.
fn normalize_list_payload(value: &Value) -> Result<Vec<ListEntry>, SignalError> {
    let rows = if let Some(arr) = value.as_array() {
        arr
    } else {
        ["items", "blocks", "watchlist"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                SignalError::InvalidResponse("List payload has no recognizable entry array".to_string())
            })?
    };

    Ok(rows
        .iter()
        .filter_map(|row| match row {
            Value::String(s) => ListEntry::parse(s),
            Value::Object(obj) => obj
                .get("ip")
                .and_then(Value::as_str)
                .and_then(ListEntry::parse),
            _ => None,
        })
        .collect())
}
