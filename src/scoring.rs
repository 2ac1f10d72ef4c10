//! Composite risk scoring.
//!
//! Combines whatever signals actually arrived into fixed weighted
//! sub-scores and a single 0-100 composite. Every missing signal has an
//! explicit, named fallback; the scorer never branches on whichever field
//! happens to be populated.

use crate::classifier::AddressClassification;
use crate::config::{CompositeFormula, ScoringConfig};
use crate::membership::MembershipStatus;
use crate::policy::{self, Action};
use crate::signals::{BehaviorSignal, GeoSignal, ThreatSignal};
use serde::Serialize;
use std::collections::BTreeSet;

/// Risk tier for a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskClass {
    Low,
    Medium,
    High,
}

impl RiskClass {
    /// Same thresholds as the recommendation policy; class and action move
    /// together.
    pub fn for_score(composite_score: u8) -> Self {
        if composite_score >= policy::BLOCK_THRESHOLD {
            RiskClass::High
        } else if composite_score >= policy::MONITOR_THRESHOLD {
            RiskClass::Medium
        } else {
            RiskClass::Low
        }
    }

    fn badge(&self) -> &'static str {
        match self {
            RiskClass::High => "High Risk",
            RiskClass::Medium => "Medium Risk",
            RiskClass::Low => "Low Risk",
        }
    }
}

/// Full scoring breakdown for one IP. Purely a function of its inputs,
/// recomputed per request, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeResult {
    pub ip: String,
    pub is_private: bool,
    pub location_label: String,
    pub badges: BTreeSet<String>,
    pub threat_intel_score: u8,
    pub vt_score: u8,
    pub network_risk_score: u8,
    pub geo_risk_score: u8,
    pub behavioral_score: u8,
    pub composite_score: u8,
    pub risk_class: RiskClass,
    pub recommendation: Action,
    pub has_local_activity: bool,
}

/// Composite scorer with its configured formula and high-risk country set.
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a public IP from the signals that arrived.
    ///
    /// `membership`, when supplied by the caller, only contributes the
    /// "Blocked" badge - it never changes the score.
    pub fn score(
        &self,
        ip: &str,
        classification: &AddressClassification,
        threat: Option<&ThreatSignal>,
        geo: Option<&GeoSignal>,
        behavior: Option<&BehaviorSignal>,
        membership: Option<&MembershipStatus>,
    ) -> CompositeResult {
        if classification.is_private {
            return self.private_result(ip, classification, behavior, membership);
        }

        let mut badges = BTreeSet::new();

        let threat_intel_score = threat.map(|t| t.abuse_score.min(100)).unwrap_or(0);
        let vt_score = vt_score(threat);
        let network_risk_score = network_risk(geo, &mut badges);
        let geo_risk_score = self.geo_risk(geo);

        // Behavioral percentages, falling back to external intelligence
        // when the IP has no local history. The fallback is intentional: a
        // never-seen-locally IP must still score from threat intel alone.
        let intel_fallback = threat_intel_score.max(vt_score);
        let (avg_pct, max_pct) = match behavior {
            Some(b) => (percent(b.avg_risk_score), percent(b.max_risk_score)),
            None => (intel_fallback, intel_fallback),
        };
        let behavioral_score = avg_pct.max(max_pct);

        let composite_score = match self.config.composite_formula {
            CompositeFormula::Max => avg_pct.max(max_pct),
            CompositeFormula::Weighted => weighted_composite(
                intel_fallback,
                behavioral_score,
                network_risk_score,
                geo_risk_score,
            ),
        };

        let risk_class = RiskClass::for_score(composite_score);
        badges.insert(risk_class.badge().to_string());
        if membership.map(|m| m.is_blocked).unwrap_or(false) {
            badges.insert("Blocked".to_string());
        }

        CompositeResult {
            ip: ip.to_string(),
            is_private: false,
            location_label: geo.map(|g| g.location_label()).unwrap_or_else(|| "Unknown".to_string()),
            badges,
            threat_intel_score,
            vt_score,
            network_risk_score,
            geo_risk_score,
            behavioral_score,
            composite_score,
            risk_class,
            recommendation: policy::action_for(composite_score),
            has_local_activity: behavior.is_some(),
        }
    }

    /// Fixed result for private/reserved addresses. External intelligence
    /// is never scored against them; local activity is still reported.
    pub fn private_result(
        &self,
        ip: &str,
        classification: &AddressClassification,
        behavior: Option<&BehaviorSignal>,
        membership: Option<&MembershipStatus>,
    ) -> CompositeResult {
        let mut badges = BTreeSet::new();
        badges.insert("Private".to_string());
        if membership.map(|m| m.is_blocked).unwrap_or(false) {
            badges.insert("Blocked".to_string());
        }

        CompositeResult {
            ip: ip.to_string(),
            is_private: true,
            location_label: classification.usage_note.to_string(),
            badges,
            threat_intel_score: 0,
            vt_score: 0,
            network_risk_score: 0,
            geo_risk_score: 0,
            behavioral_score: 0,
            composite_score: 0,
            risk_class: RiskClass::Low,
            recommendation: Action::Allow,
            has_local_activity: behavior.is_some(),
        }
    }

    /// Fixed increment when the IP geolocates to a high-risk country.
    fn geo_risk(&self, geo: Option<&GeoSignal>) -> u8 {
        let in_high_risk = geo
            .and_then(|g| g.country_code.as_deref())
            .map(|cc| self.config.high_risk_countries.contains(cc))
            .unwrap_or(false);
        if in_high_risk {
            20
        } else {
            0
        }
    }
}

/// VirusTotal sub-score: 10 points per flagging engine, capped at 100.
fn vt_score(threat: Option<&ThreatSignal>) -> u8 {
    threat
        .and_then(|t| t.vt_positives)
        .map(|p| (p.saturating_mul(10)).min(100) as u8)
        .unwrap_or(0)
}

/// Network-infrastructure sub-score: fixed additive increments per flag,
/// each contributing its badge.
fn network_risk(geo: Option<&GeoSignal>, badges: &mut BTreeSet<String>) -> u8 {
    let Some(geo) = geo else { return 0 };

    let mut score: u32 = 0;
    if geo.is_proxy {
        score += 25;
        badges.insert("Proxy".to_string());
    }
    if geo.is_vpn {
        score += 20;
        badges.insert("VPN".to_string());
    }
    if geo.is_tor {
        score += 35;
        badges.insert("Tor Exit Node".to_string());
    }
    if geo.is_datacenter {
        score += 15;
        badges.insert("Data Center".to_string());
    }
    score.min(100) as u8
}

/// Convert a 0.0-1.0 risk score to a rounded 0-100 percentage.
fn percent(score: f64) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Alternative composite: weighted blend of the four sub-scores.
fn weighted_composite(threat: u8, behavioral: u8, network: u8, geo: u8) -> u8 {
    let blended = 0.40 * f64::from(threat)
        + 0.30 * f64::from(behavioral)
        + 0.20 * f64::from(network)
        + 0.10 * f64::from(geo);
    (blended.round() as u8).min(100)
}
