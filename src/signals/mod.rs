//! Signal types and collaborator traits.
//!
//! Each signal source is independently callable and independently fallible:
//! a lookup returns `Ok(None)` when the backend has no data for the address
//! (a valid, common outcome) and `Err` on transport failure. The engine
//! degrades both to "unavailable" when scoring.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Threat-intelligence reputation data for an IP.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ThreatSignal {
    /// Abuse confidence score (0-100, higher = worse).
    #[serde(default)]
    pub abuse_score: u8,

    /// Number of abuse reports behind the score.
    #[serde(default)]
    pub abuse_reports: u32,

    /// VirusTotal engines flagging this IP.
    #[serde(default)]
    pub vt_positives: Option<u32>,

    /// VirusTotal engines consulted.
    #[serde(default)]
    pub vt_total: Option<u32>,

    /// Open ports reported by Shodan.
    #[serde(default)]
    pub shodan_ports: Vec<u16>,

    /// Known vulnerabilities reported by Shodan.
    #[serde(default)]
    pub shodan_vulns: Vec<String>,

    /// Provider-assigned threat level, if any.
    #[serde(default)]
    pub threat_level: Option<String>,
}

/// Geolocation and network-infrastructure data for an IP.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeoSignal {
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub asn: Option<u32>,
    #[serde(default)]
    pub is_proxy: bool,
    #[serde(default)]
    pub is_vpn: bool,
    #[serde(default)]
    pub is_tor: bool,
    #[serde(default)]
    pub is_datacenter: bool,
}

impl GeoSignal {
    /// Human-readable "City, Country" label for display.
    pub fn location_label(&self) -> String {
        match (self.city.as_deref(), self.country_name.as_deref()) {
            (Some(city), Some(country)) => format!("{}, {}", city, country),
            (None, Some(country)) => country.to_string(),
            (Some(city), None) => city.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

/// One row of recent local activity, carried through for display.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventSummary {
    pub timestamp: String,
    pub event_type: String,
    #[serde(default)]
    pub risk_score: Option<f64>,
}

/// Local behavioral history for an IP.
///
/// Absence of this signal is meaningful on its own: the IP has never been
/// seen by our observation pipeline.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BehaviorSignal {
    #[serde(default)]
    pub total_events: u64,
    #[serde(default)]
    pub failed_events: u64,
    #[serde(default)]
    pub successful_events: u64,

    /// Average ML risk score over observed events (0.0-1.0).
    #[serde(default)]
    pub avg_risk_score: f64,

    /// Highest ML risk score over observed events (0.0-1.0).
    #[serde(default)]
    pub max_risk_score: f64,

    #[serde(default)]
    pub times_blocked: u64,
    #[serde(default)]
    pub first_seen: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub recent_events: Vec<EventSummary>,
}

/// Error from a signal source.
#[derive(Debug)]
pub enum SignalError {
    /// HTTP request failed.
    Http(reqwest::Error),
    /// Timeout.
    Timeout,
    /// Rate limited by the upstream provider.
    RateLimited,
    /// Invalid response.
    InvalidResponse(String),
    /// Other error.
    Other(String),
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalError::Http(e) => write!(f, "HTTP error: {}", e),
            SignalError::Timeout => write!(f, "Request timed out"),
            SignalError::RateLimited => write!(f, "Rate limited"),
            SignalError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            SignalError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SignalError {}

impl From<reqwest::Error> for SignalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SignalError::Timeout
        } else {
            SignalError::Http(e)
        }
    }
}

impl SignalError {
    /// Whether this error is a transport-level (network) failure rather
    /// than an upstream provider failure.
    pub fn is_network(&self) -> bool {
        matches!(self, SignalError::Http(_) | SignalError::Timeout)
    }
}

/// Threat-intelligence provider.
///
/// `lookup` reads whatever the backend already holds; `enrich` forces a
/// refetch from the upstream source, bypassing provider-side caches.
/// Forced refresh is slower and rate-limit-sensitive and must only be
/// invoked on explicit user action.
#[async_trait]
pub trait ThreatIntelSource: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<Option<ThreatSignal>, SignalError>;
    async fn enrich(&self, ip: &str) -> Result<ThreatSignal, SignalError>;
}

/// Geolocation / network-infrastructure provider.
#[async_trait]
pub trait GeoSource: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<Option<GeoSignal>, SignalError>;
    async fn enrich(&self, ip: &str) -> Result<GeoSignal, SignalError>;
}

/// Local observation-pipeline statistics. No enrich variant: the data is
/// ours, there is no upstream to refetch from.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<Option<BehaviorSignal>, SignalError>;
}
