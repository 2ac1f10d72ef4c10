//! IP Risk Aggregation & Classification Engine.
//!
//! Given a single IP address, decides whether it is private/internal,
//! combines heterogeneous, partially-available signals (threat
//! intelligence, local behavioral statistics, network-infrastructure
//! flags, geography) into one 0-100 composite risk score, and maps that
//! score to a recommended action. A separate batch path classifies many
//! IPs against the blocked/whitelisted/watchlisted membership lists
//! through a TTL-bounded cache.
//!
//! # Features
//!
//! - **Address classification** - RFC 1918 / loopback / link-local
//!   detection; private IPs short-circuit with a fixed safe result
//! - **Composite scoring** - fixed weighted sub-scores (threat intel,
//!   VirusTotal, network infrastructure, geography, local behavior) with
//!   explicit per-signal fallbacks
//! - **Recommendations** - block / monitor / allow with tiered rationale
//! - **Membership cache** - at most one list fetch per 60s window
//!   regardless of batch size, with injectable time source for tests
//! - **On-demand enrichment** - user-triggered forced refresh of external
//!   intelligence, with typed failure reporting
//! - **Graceful degradation** - any signal source may fail or have no
//!   data without failing the analysis
//!
//! # Example Configuration
//!
//! ```yaml
//! backend:
//!   base_url: "http://127.0.0.1:8080/api"
//!   timeout_ms: 5000
//!
//! membership:
//!   cache_ttl_seconds: 60
//!   list_page_limit: 1000
//!
//! scoring:
//!   composite_formula: max
//!   high_risk_countries: ["CN", "RU", "KP", "IR"]
//! ```

pub mod classifier;
pub mod config;
pub mod engine;
pub mod membership;
pub mod policy;
pub mod scoring;
pub mod signals;

pub use classifier::{classify, AddressCategory, AddressClassification};
pub use config::Config;
pub use engine::{AnalysisOutcome, AnalysisReport, EnrichmentError, RiskEngine, ValidationError};
pub use membership::{MembershipCache, MembershipStatus};
pub use scoring::{CompositeResult, RiskClass};
