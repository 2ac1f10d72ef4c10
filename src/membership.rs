//! Batch membership classification with a TTL-bounded list cache.
//!
//! Annotating a live table of N IPs must cost at most one backend fetch per
//! list (three total), not one per IP per list. Each list snapshot carries
//! its own fetch timestamp; a stale snapshot is refetched synchronously
//! before being read.

use crate::signals::SignalError;
use async_trait::async_trait;
use ipnet::IpNet;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The three administrator-maintained membership lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Blocked,
    Whitelisted,
    Watchlisted,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [
        ListKind::Blocked,
        ListKind::Whitelisted,
        ListKind::Watchlisted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Blocked => "blocked",
            ListKind::Whitelisted => "whitelisted",
            ListKind::Watchlisted => "watchlisted",
        }
    }
}

/// Entry in a membership list - either a single IP or a CIDR range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    Single(IpAddr),
    Network(IpNet),
}

impl ListEntry {
    /// Parse a string into a list entry, trying single IP first.
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Some(ListEntry::Single(ip));
        }
        if let Ok(net) = s.parse::<IpNet>() {
            return Some(ListEntry::Network(net));
        }
        None
    }

    fn contains(&self, ip: &IpAddr) -> bool {
        match self {
            ListEntry::Single(addr) => addr == ip,
            ListEntry::Network(net) => net.contains(ip),
        }
    }
}

/// Membership of one IP across the three lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipStatus {
    pub ip: String,
    pub is_blocked: bool,
    pub is_whitelisted: bool,
    pub is_watched: bool,
}

impl MembershipStatus {
    /// The single badge to show, with precedence blocked > whitelisted >
    /// watched.
    pub fn badge(&self) -> Option<&'static str> {
        if self.is_blocked {
            Some("Blocked")
        } else if self.is_whitelisted {
            Some("Whitelisted")
        } else if self.is_watched {
            Some("Watched")
        } else {
            None
        }
    }
}

/// Collaborator that fetches one membership list.
///
/// Implementations normalize whatever shape the backend returns into a flat
/// entry list; the cache never sees field-name variants.
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch_list(&self, kind: ListKind, limit: u32) -> Result<Vec<ListEntry>, SignalError>;
}

/// Time source, injectable so tests control staleness without real delays.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// One cached list snapshot.
struct CacheEntry {
    entries: Vec<ListEntry>,
    fetched_at: Instant,
}

/// TTL-bounded cache over the three membership lists.
///
/// Read-mostly process-wide state: refresh-on-expiry is the only mutation,
/// and a second concurrent refresh overwriting the first with equally-fresh
/// data is acceptable, so no cross-await lock is held.
pub struct MembershipCache {
    source: Arc<dyn ListSource>,
    ttl: Duration,
    page_limit: u32,
    clock: Arc<dyn Clock>,
    lists: [RwLock<Option<CacheEntry>>; 3],
}

impl MembershipCache {
    /// Create a cache over the given list source with a TTL in seconds.
    pub fn new(source: Arc<dyn ListSource>, ttl_seconds: u64, page_limit: u32) -> Self {
        Self::with_clock(source, ttl_seconds, page_limit, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(
        source: Arc<dyn ListSource>,
        ttl_seconds: u64,
        page_limit: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            ttl: Duration::from_secs(ttl_seconds),
            page_limit,
            clock,
            lists: [RwLock::new(None), RwLock::new(None), RwLock::new(None)],
        }
    }

    /// Classify a batch of IPs against the three lists.
    ///
    /// Issues at most one fetch per stale/missing list regardless of batch
    /// size. Fetch failures degrade to the previous snapshot (or an empty
    /// list) and never fail the read path.
    pub async fn classify(&self, ips: &[String]) -> HashMap<String, MembershipStatus> {
        self.refresh_stale().await;

        let mut out = HashMap::with_capacity(ips.len());
        for ip_str in ips {
            let parsed: Option<IpAddr> = ip_str.trim().parse().ok();
            let status = match parsed {
                Some(ip) => MembershipStatus {
                    ip: ip_str.clone(),
                    is_blocked: self.list_contains(ListKind::Blocked, &ip),
                    is_whitelisted: self.list_contains(ListKind::Whitelisted, &ip),
                    is_watched: self.list_contains(ListKind::Watchlisted, &ip),
                },
                None => MembershipStatus {
                    ip: ip_str.clone(),
                    is_blocked: false,
                    is_whitelisted: false,
                    is_watched: false,
                },
            };
            out.insert(ip_str.clone(), status);
        }
        out
    }

    /// Refresh every stale or missing list snapshot, concurrently.
    async fn refresh_stale(&self) {
        let now = self.clock.now();

        let (blocked, whitelisted, watchlisted) = tokio::join!(
            self.fetch_if_stale(ListKind::Blocked, now),
            self.fetch_if_stale(ListKind::Whitelisted, now),
            self.fetch_if_stale(ListKind::Watchlisted, now),
        );

        self.store_fetched(ListKind::Blocked, blocked, now);
        self.store_fetched(ListKind::Whitelisted, whitelisted, now);
        self.store_fetched(ListKind::Watchlisted, watchlisted, now);
    }

    /// Fetch one list if its snapshot is missing or past TTL. `None` means
    /// the snapshot was still fresh.
    async fn fetch_if_stale(
        &self,
        kind: ListKind,
        now: Instant,
    ) -> Option<Result<Vec<ListEntry>, SignalError>> {
        if self.is_fresh(kind, now) {
            return None;
        }
        debug!(list = kind.as_str(), "Refreshing membership list");
        Some(self.source.fetch_list(kind, self.page_limit).await)
    }

    fn store_fetched(
        &self,
        kind: ListKind,
        fetched: Option<Result<Vec<ListEntry>, SignalError>>,
        now: Instant,
    ) {
        match fetched {
            None => {}
            Some(Ok(entries)) => {
                debug!(list = kind.as_str(), entries = entries.len(), "Membership list loaded");
                if let Ok(mut slot) = self.slot(kind).write() {
                    *slot = Some(CacheEntry {
                        entries,
                        fetched_at: now,
                    });
                }
            }
            Some(Err(e)) => {
                // Keep serving the stale snapshot rather than erroring the
                // read path.
                warn!(list = kind.as_str(), error = %e, "Membership list refresh failed");
            }
        }
    }

    fn is_fresh(&self, kind: ListKind, now: Instant) -> bool {
        match self.slot(kind).read() {
            Ok(slot) => match slot.as_ref() {
                Some(entry) => now.saturating_duration_since(entry.fetched_at) < self.ttl,
                None => false,
            },
            Err(_) => false,
        }
    }

    fn list_contains(&self, kind: ListKind, ip: &IpAddr) -> bool {
        match self.slot(kind).read() {
            Ok(slot) => slot
                .as_ref()
                .map(|entry| entry.entries.iter().any(|e| e.contains(ip)))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn slot(&self, kind: ListKind) -> &RwLock<Option<CacheEntry>> {
        match kind {
            ListKind::Blocked => &self.lists[0],
            ListKind::Whitelisted => &self.lists[1],
            ListKind::Watchlisted => &self.lists[2],
        }
    }
}
