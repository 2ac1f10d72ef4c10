//! Analysis orchestration.
//!
//! Entry point for a single-IP analysis: classify, fan out to the signal
//! sources, score, recommend. A failed source degrades to "unavailable"
//! and never fails the analysis; only IP validation and the user-triggered
//! enrich path return typed errors across this boundary.

use crate::classifier::{self, AddressClassification};
use crate::config::ScoringConfig;
use crate::policy::{self, Recommendation};
use crate::scoring::{CompositeResult, Scorer};
use crate::signals::{
    ActivitySource, BehaviorSignal, GeoSignal, GeoSource, SignalError, ThreatIntelSource,
    ThreatSignal,
};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fatal analysis error: the request never got past input validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Error from the user-triggered enrich path. Each variant maps to a
/// distinct operator-facing message.
#[derive(Debug)]
pub enum EnrichmentError {
    /// Malformed input; nothing was attempted.
    Validation(String),
    /// Private IPs have no external intelligence to refresh.
    PrivateIp,
    /// Upstream provider rate limit.
    RateLimited,
    /// Upstream provider returned an error.
    Upstream(String),
    /// Transport failure reaching the backend.
    Network(String),
}

impl EnrichmentError {
    /// Operator-facing message for this failure.
    pub fn user_message(&self) -> String {
        match self {
            EnrichmentError::Validation(msg) => msg.clone(),
            EnrichmentError::PrivateIp => {
                "Private IPs cannot be enriched from external sources.".to_string()
            }
            EnrichmentError::RateLimited => {
                "Upstream provider rate limit reached - try again shortly.".to_string()
            }
            EnrichmentError::Upstream(_) => {
                "The intelligence provider returned an error - try again.".to_string()
            }
            EnrichmentError::Network(_) => {
                "Network error while enriching - check connectivity and retry.".to_string()
            }
        }
    }

    /// Whether offering a retry makes sense. Enriching a private IP can
    /// never succeed.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            EnrichmentError::PrivateIp | EnrichmentError::Validation(_)
        )
    }
}

impl std::fmt::Display for EnrichmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentError::Validation(msg) => write!(f, "Validation error: {}", msg),
            EnrichmentError::PrivateIp => write!(f, "Private IP is not enrichable"),
            EnrichmentError::RateLimited => write!(f, "Rate limited by upstream provider"),
            EnrichmentError::Upstream(msg) => write!(f, "Upstream provider error: {}", msg),
            EnrichmentError::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for EnrichmentError {}

impl From<SignalError> for EnrichmentError {
    fn from(e: SignalError) -> Self {
        match e {
            SignalError::RateLimited => EnrichmentError::RateLimited,
            e if e.is_network() => EnrichmentError::Network(e.to_string()),
            e => EnrichmentError::Upstream(e.to_string()),
        }
    }
}

/// Completed analysis: the scoring result plus the raw signals it was
/// computed from, for display.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub classification: AddressClassification,
    pub result: CompositeResult,
    pub recommendation: Recommendation,
    pub threat: Option<ThreatSignal>,
    pub geo: Option<GeoSignal>,
    pub behavior: Option<BehaviorSignal>,
}

/// Terminal state of one analysis request.
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// Analysis completed.
    Resolved(Box<AnalysisReport>),
    /// No signal source had anything for this IP; the UI should offer a
    /// manual "Enrich" action.
    NotFound { ip: String },
    /// A newer request for this surface was issued while this one was in
    /// flight; the caller must discard this result.
    Superseded,
}

/// Top-level risk analysis engine.
pub struct RiskEngine {
    threat: Arc<dyn ThreatIntelSource>,
    geo: Arc<dyn GeoSource>,
    activity: Arc<dyn ActivitySource>,
    scorer: Scorer,
    latest_request: AtomicU64,
}

impl RiskEngine {
    pub fn new(
        threat: Arc<dyn ThreatIntelSource>,
        geo: Arc<dyn GeoSource>,
        activity: Arc<dyn ActivitySource>,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            threat,
            geo,
            activity,
            scorer: Scorer::new(scoring),
            latest_request: AtomicU64::new(0),
        }
    }

    /// Analyze one IP: classify, fan out, score, recommend.
    ///
    /// Individual source failures degrade to unavailable. The only hard
    /// failure is input validation.
    pub async fn analyze(&self, ip: &str) -> Result<AnalysisOutcome, ValidationError> {
        let ticket = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let ip = validate_ip(ip)?;
        let classification = classifier::classify(&ip);

        if classification.is_private {
            debug!(ip = %ip, "Private address, skipping external lookups");
            // Local activity on a private IP is still reported, but never
            // scored against external intelligence.
            let behavior = self.lookup_activity(&ip).await;
            let result = self
                .scorer
                .private_result(&ip, &classification, behavior.as_ref(), None);

            if self.is_superseded(ticket) {
                return Ok(AnalysisOutcome::Superseded);
            }
            return Ok(AnalysisOutcome::Resolved(Box::new(AnalysisReport {
                classification,
                recommendation: policy::recommend(result.composite_score),
                result,
                threat: None,
                geo: None,
                behavior,
            })));
        }

        // Concurrent fan-out; wait for all three to settle.
        let (threat, geo, behavior) = tokio::join!(
            self.lookup_threat(&ip),
            self.lookup_geo(&ip),
            self.lookup_activity(&ip),
        );

        if self.is_superseded(ticket) {
            debug!(ip = %ip, "Analysis superseded by a newer request");
            return Ok(AnalysisOutcome::Superseded);
        }

        if threat.is_none() && geo.is_none() && behavior.is_none() {
            debug!(ip = %ip, "No signal source had data");
            return Ok(AnalysisOutcome::NotFound { ip });
        }

        let result = self.scorer.score(
            &ip,
            &classification,
            threat.as_ref(),
            geo.as_ref(),
            behavior.as_ref(),
            None,
        );

        Ok(AnalysisOutcome::Resolved(Box::new(AnalysisReport {
            classification,
            recommendation: policy::recommend(result.composite_score),
            result,
            threat,
            geo,
            behavior,
        })))
    }

    /// Force-refresh external intelligence for one IP, then re-score.
    ///
    /// User-triggered only: forced refresh bypasses provider-side caches
    /// and is rate-limit-sensitive. Each call is one attempt; no retries.
    pub async fn enrich(&self, ip: &str) -> Result<AnalysisReport, EnrichmentError> {
        let ip = validate_ip(ip).map_err(|e| EnrichmentError::Validation(e.0))?;
        let classification = classifier::classify(&ip);

        if classification.is_private {
            return Err(EnrichmentError::PrivateIp);
        }

        let (threat, geo) = tokio::join!(self.threat.enrich(&ip), self.geo.enrich(&ip));
        let threat = threat?;
        let geo = geo?;

        let behavior = self.lookup_activity(&ip).await;

        let result = self.scorer.score(
            &ip,
            &classification,
            Some(&threat),
            Some(&geo),
            behavior.as_ref(),
            None,
        );

        Ok(AnalysisReport {
            classification,
            recommendation: policy::recommend(result.composite_score),
            result,
            threat: Some(threat),
            geo: Some(geo),
            behavior,
        })
    }

    fn is_superseded(&self, ticket: u64) -> bool {
        self.latest_request.load(Ordering::SeqCst) != ticket
    }

    async fn lookup_threat(&self, ip: &str) -> Option<ThreatSignal> {
        match self.threat.lookup(ip).await {
            Ok(signal) => signal,
            Err(e) => {
                warn!(ip = %ip, error = %e, "Threat intel lookup failed");
                None
            }
        }
    }

    async fn lookup_geo(&self, ip: &str) -> Option<GeoSignal> {
        match self.geo.lookup(ip).await {
            Ok(signal) => signal,
            Err(e) => {
                warn!(ip = %ip, error = %e, "Geo lookup failed");
                None
            }
        }
    }

    async fn lookup_activity(&self, ip: &str) -> Option<BehaviorSignal> {
        match self.activity.lookup(ip).await {
            Ok(signal) => signal,
            Err(e) => {
                warn!(ip = %ip, error = %e, "Local activity lookup failed");
                None
            }
        }
    }
}

/// Validate the IP input: non-empty and a well-formed IPv4 address.
fn validate_ip(ip: &str) -> Result<String, ValidationError> {
    let trimmed = ip.trim();
    if trimmed.is_empty() {
        return Err(ValidationError("IP address is required".to_string()));
    }
    if trimmed.parse::<Ipv4Addr>().is_err() {
        return Err(ValidationError(format!(
            "'{}' is not a valid IPv4 address",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Action;
    use crate::scoring::RiskClass;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Sources with canned responses; a per-source failure flag simulates
    /// transport errors, and `slow_ip` delays threat lookups for
    /// supersession tests.
    #[derive(Default)]
    struct MockSources {
        threat: Option<ThreatSignal>,
        geo: Option<GeoSignal>,
        behavior: Option<BehaviorSignal>,
        threat_fails: bool,
        enrich_error: Option<fn() -> SignalError>,
        slow_ip: Option<&'static str>,
    }

    #[async_trait]
    impl ThreatIntelSource for MockSources {
        async fn lookup(&self, ip: &str) -> Result<Option<ThreatSignal>, SignalError> {
            if self.slow_ip == Some(ip) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            if self.threat_fails {
                return Err(SignalError::Timeout);
            }
            Ok(self.threat.clone())
        }

        async fn enrich(&self, _ip: &str) -> Result<ThreatSignal, SignalError> {
            match self.enrich_error {
                Some(make) => Err(make()),
                None => Ok(self.threat.clone().unwrap_or_default()),
            }
        }
    }

    #[async_trait]
    impl GeoSource for MockSources {
        async fn lookup(&self, _ip: &str) -> Result<Option<GeoSignal>, SignalError> {
            Ok(self.geo.clone())
        }

        async fn enrich(&self, _ip: &str) -> Result<GeoSignal, SignalError> {
            Ok(self.geo.clone().unwrap_or_default())
        }
    }

    #[async_trait]
    impl ActivitySource for MockSources {
        async fn lookup(&self, _ip: &str) -> Result<Option<BehaviorSignal>, SignalError> {
            Ok(self.behavior.clone())
        }
    }

    fn engine(sources: MockSources) -> RiskEngine {
        let sources = Arc::new(sources);
        RiskEngine::new(
            sources.clone(),
            sources.clone(),
            sources,
            ScoringConfig::default(),
        )
    }

    fn resolved(outcome: AnalysisOutcome) -> AnalysisReport {
        match outcome {
            AnalysisOutcome::Resolved(report) => *report,
            other => panic!("expected Resolved, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let engine = engine(MockSources::default());
        assert!(engine.analyze("").await.is_err());
        assert!(engine.analyze("   ").await.is_err());
        assert!(engine.analyze("999.1.2.3").await.is_err());
        assert!(engine.analyze("hostname.example").await.is_err());
    }

    #[tokio::test]
    async fn test_clean_ip_resolves_allow() {
        let engine = engine(MockSources {
            threat: Some(ThreatSignal::default()),
            geo: Some(GeoSignal {
                country_code: Some("US".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });

        let report = resolved(engine.analyze("8.8.8.8").await.unwrap());
        assert_eq!(report.result.composite_score, 0);
        assert_eq!(report.recommendation.action, Action::Allow);
        assert!(!report.result.has_local_activity);
    }

    #[tokio::test]
    async fn test_threat_only_fallback_blocks() {
        let engine = engine(MockSources {
            threat: Some(ThreatSignal {
                abuse_score: 85,
                ..Default::default()
            }),
            ..Default::default()
        });

        let report = resolved(engine.analyze("45.33.12.9").await.unwrap());
        assert_eq!(report.result.behavioral_score, 85);
        assert_eq!(report.result.composite_score, 85);
        assert_eq!(report.result.risk_class, RiskClass::High);
        assert_eq!(report.recommendation.action, Action::Block);
    }

    #[tokio::test]
    async fn test_private_short_circuit() {
        let engine = engine(MockSources {
            // Even with hostile signals configured, a private IP must not
            // reach the external sources.
            threat: Some(ThreatSignal {
                abuse_score: 100,
                ..Default::default()
            }),
            geo: Some(GeoSignal {
                is_tor: true,
                ..Default::default()
            }),
            behavior: Some(BehaviorSignal {
                total_events: 9,
                avg_risk_score: 0.8,
                max_risk_score: 0.9,
                ..Default::default()
            }),
            ..Default::default()
        });

        let report = resolved(engine.analyze("192.168.1.50").await.unwrap());
        assert!(report.result.is_private);
        assert_eq!(report.result.composite_score, 0);
        assert_eq!(report.result.risk_class, RiskClass::Low);
        assert!(report.result.badges.contains("Private"));
        assert!(report.threat.is_none());
        assert!(report.geo.is_none());
        // Local activity is still merged into the private result.
        assert!(report.result.has_local_activity);
        assert_eq!(report.behavior.as_ref().unwrap().total_events, 9);
    }

    #[tokio::test]
    async fn test_all_sources_empty_is_not_found() {
        let engine = engine(MockSources::default());
        match engine.analyze("203.0.113.7").await.unwrap() {
            AnalysisOutcome::NotFound { ip } => assert_eq!(ip, "203.0.113.7"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_source_degrades_gracefully() {
        let engine = engine(MockSources {
            threat_fails: true,
            geo: Some(GeoSignal {
                is_proxy: true,
                ..Default::default()
            }),
            ..Default::default()
        });

        // Threat transport failure must not fail the analysis.
        let report = resolved(engine.analyze("203.0.113.7").await.unwrap());
        assert!(report.threat.is_none());
        assert_eq!(report.result.threat_intel_score, 0);
        assert_eq!(report.result.network_risk_score, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_analysis_is_discarded() {
        let engine = engine(MockSources {
            threat: Some(ThreatSignal {
                abuse_score: 50,
                ..Default::default()
            }),
            slow_ip: Some("203.0.113.1"),
            ..Default::default()
        });

        // The slow analysis is issued first; a newer request completes
        // while it is still in flight.
        let (first, second) = tokio::join!(
            engine.analyze("203.0.113.1"),
            engine.analyze("203.0.113.2"),
        );

        assert!(matches!(first.unwrap(), AnalysisOutcome::Superseded));
        assert!(matches!(second.unwrap(), AnalysisOutcome::Resolved(_)));
    }

    #[tokio::test]
    async fn test_enrich_private_ip_rejected() {
        let engine = engine(MockSources::default());
        let err = engine.enrich("10.0.0.1").await.unwrap_err();
        assert!(matches!(err, EnrichmentError::PrivateIp));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn test_enrich_validation() {
        let engine = engine(MockSources::default());
        let err = engine.enrich("bogus").await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Validation(_)));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn test_enrich_success_rescores() {
        let engine = engine(MockSources {
            threat: Some(ThreatSignal {
                abuse_score: 75,
                ..Default::default()
            }),
            geo: Some(GeoSignal {
                country_code: Some("US".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });

        let report = engine.enrich("203.0.113.7").await.unwrap();
        assert_eq!(report.result.composite_score, 75);
        assert_eq!(report.recommendation.action, Action::Block);
        assert!(report.threat.is_some());
        assert!(report.geo.is_some());
    }

    #[tokio::test]
    async fn test_enrich_error_mapping() {
        for (make, matcher) in [
            (
                (|| SignalError::RateLimited) as fn() -> SignalError,
                (|e: &EnrichmentError| matches!(e, EnrichmentError::RateLimited))
                    as fn(&EnrichmentError) -> bool,
            ),
            (
                || SignalError::Timeout,
                |e| matches!(e, EnrichmentError::Network(_)),
            ),
            (
                || SignalError::InvalidResponse("HTTP 502".to_string()),
                |e| matches!(e, EnrichmentError::Upstream(_)),
            ),
        ] {
            let engine = engine(MockSources {
                enrich_error: Some(make),
                ..Default::default()
            });
            let err = engine.enrich("203.0.113.7").await.unwrap_err();
            assert!(matcher(&err), "unexpected mapping: {:?}", err);
            assert!(err.retryable());
        }
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let errors = [
            EnrichmentError::PrivateIp,
            EnrichmentError::RateLimited,
            EnrichmentError::Upstream("x".to_string()),
            EnrichmentError::Network("y".to_string()),
        ];
        let messages: std::collections::HashSet<String> =
            errors.iter().map(|e| e.user_message()).collect();
        assert_eq!(messages.len(), errors.len());
    }
}
