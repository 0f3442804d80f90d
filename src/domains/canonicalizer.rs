//! Roll-up of host names and addresses into site-level keys.
//!
//! `a.example.com` and `b.example.com` both become `*.example.com`. Address
//! tokens are reverse-resolved first; an address that cannot be resolved is
//! kept as its own key so its counts are never lost.

use super::resolver::ReverseResolver;
use crate::analysis::Tally;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

fn is_alphabetic_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_numeric_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_digit())
}

/// Dot-separated labels, without the empty ones a trailing dot leaves.
fn labels(token: &str) -> Vec<&str> {
    let mut labels: Vec<&str> = token.split('.').collect();
    while labels.last().is_some_and(|label| label.is_empty()) {
        labels.pop();
    }
    labels
}

/// `*.` followed by the last two labels, or the only label.
fn wildcard(labels: &[&str]) -> String {
    match labels {
        [.., second, last] => format!("*.{}.{}", second, last),
        [last] => format!("*.{}", last),
        [] => "*.".to_string(),
    }
}

/// How a raw token is rolled up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenShape {
    /// Alphabetic last label; the key is already known.
    Named(String),
    /// Numeric last label; needs a reverse lookup.
    Address,
    /// Anything else is its own key.
    Opaque,
}

/// Classify a token without touching the network.
pub fn classify(token: &str) -> TokenShape {
    let labels = labels(token);
    let last = labels.last().copied().unwrap_or_default();

    if is_alphabetic_label(last) {
        TokenShape::Named(wildcard(&labels))
    } else if is_numeric_label(last) {
        TokenShape::Address
    } else {
        TokenShape::Opaque
    }
}

/// Key for a name returned by a reverse lookup.
pub fn resolved_key(name: &str) -> String {
    let labels = labels(name);
    let last = labels.last().copied().unwrap_or_default();

    if is_numeric_label(last) {
        // The resolver echoed the address back.
        name.to_string()
    } else {
        wildcard(&labels)
    }
}

/// Maps raw host tokens to canonical keys.
pub struct Canonicalizer {
    resolver: Arc<dyn ReverseResolver>,
    lookup_timeout: Duration,
    concurrency: usize,
    cache: Mutex<HashMap<IpAddr, Option<String>>>,
}

impl Canonicalizer {
    pub fn new(
        resolver: Arc<dyn ReverseResolver>,
        lookup_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            lookup_timeout,
            concurrency: concurrency.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Canonical key for `token`. Never fails: any lookup problem yields the
    /// token itself.
    pub async fn canonicalize(&self, token: &str) -> String {
        match classify(token) {
            TokenShape::Named(key) => key,
            TokenShape::Opaque => token.to_string(),
            TokenShape::Address => match self.lookup(token).await {
                Some(name) => resolved_key(&name),
                None => token.to_string(),
            },
        }
    }

    async fn lookup(&self, token: &str) -> Option<String> {
        let Ok(ip) = token.parse::<IpAddr>() else {
            debug!("{} looks numeric but is not an address", token);
            return None;
        };

        if let Some(cached) = self.cached(&ip) {
            return cached;
        }

        let lookup = tokio::time::timeout(self.lookup_timeout, self.resolver.reverse(ip));
        let name = match lookup.await {
            Ok(name) => name,
            Err(_) => {
                debug!(
                    "Reverse lookup timed out after {:?} for {}",
                    self.lookup_timeout, ip
                );
                None
            }
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(ip, name.clone());
        }
        name
    }

    fn cached(&self, ip: &IpAddr) -> Option<Option<String>> {
        self.cache.lock().ok().and_then(|cache| cache.get(ip).cloned())
    }

    /// Canonicalize every key of `raw` and sum the counts per canonical key.
    ///
    /// Lookups run with bounded concurrency; merging follows the order of
    /// `raw`, so the result is deterministic.
    pub async fn roll_up(&self, raw: &Tally) -> Tally {
        if raw.is_empty() {
            return Tally::new();
        }
        info!("Rolling up {} distinct hosts", raw.len());

        let keyed: Vec<(String, u64)> = stream::iter(raw.iter())
            .map(|(token, count)| async move { (self.canonicalize(token).await, count) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut rolled = Tally::new();
        for (key, count) in keyed {
            rolled.add(&key, count);
        }
        rolled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::resolver::NoopResolver;
    use futures::future::BoxFuture;

    struct StaticResolver(HashMap<IpAddr, String>);

    impl ReverseResolver for StaticResolver {
        fn reverse(&self, ip: IpAddr) -> BoxFuture<'_, Option<String>> {
            let name = self.0.get(&ip).cloned();
            Box::pin(async move { name })
        }
    }

    struct HangingResolver;

    impl ReverseResolver for HangingResolver {
        fn reverse(&self, _ip: IpAddr) -> BoxFuture<'_, Option<String>> {
            Box::pin(futures::future::pending())
        }
    }

    fn offline() -> Canonicalizer {
        Canonicalizer::new(Arc::new(NoopResolver), Duration::from_millis(50), 4)
    }

    fn with_names(names: &[(&str, &str)]) -> Canonicalizer {
        let map = names
            .iter()
            .map(|(ip, name)| (ip.parse().unwrap(), name.to_string()))
            .collect();
        Canonicalizer::new(Arc::new(StaticResolver(map)), Duration::from_millis(50), 4)
    }

    #[test]
    fn test_same_site_shares_key() {
        let canonicalizer = offline();
        let a = tokio_test::block_on(canonicalizer.canonicalize("a.example.com"));
        let b = tokio_test::block_on(canonicalizer.canonicalize("b.example.com"));
        let deep = tokio_test::block_on(canonicalizer.canonicalize("x.y.z.example.com"));

        assert_eq!(a, "*.example.com");
        assert_eq!(a, b);
        assert_eq!(a, deep);
    }

    #[test]
    fn test_single_label() {
        assert_eq!(classify("example"), TokenShape::Named("*.example".to_string()));
    }

    #[test]
    fn test_trailing_dot_rolls_up() {
        assert_eq!(
            classify("www.example.com."),
            TokenShape::Named("*.example.com".to_string())
        );
        assert_eq!(classify("www.example.com."), classify("www.example.com"));
        assert_eq!(resolved_key("edge-1.cdn.example.net."), "*.example.net");
        assert_eq!(classify("10.0.0.1."), TokenShape::Address);
    }

    #[test]
    fn test_mixed_label_is_kept() {
        assert_eq!(classify("host.local2"), TokenShape::Opaque);
        assert_eq!(classify("example.com:8080"), TokenShape::Opaque);
        assert_eq!(classify(""), TokenShape::Opaque);
    }

    #[tokio::test]
    async fn test_unresolvable_ip_keeps_literal() {
        let canonicalizer = offline();
        assert_eq!(canonicalizer.canonicalize("8.8.8.8").await, "8.8.8.8");
    }

    #[tokio::test]
    async fn test_resolved_ip_rolls_up() {
        let canonicalizer = with_names(&[("93.184.216.34", "edge-1.cdn.example.net")]);
        assert_eq!(
            canonicalizer.canonicalize("93.184.216.34").await,
            "*.example.net"
        );
    }

    #[tokio::test]
    async fn test_echoed_ip_is_kept_as_is() {
        let canonicalizer = with_names(&[("10.0.0.1", "10.0.0.1")]);
        assert_eq!(canonicalizer.canonicalize("10.0.0.1").await, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_numeric_non_address_keeps_literal() {
        let canonicalizer = offline();
        assert_eq!(canonicalizer.canonicalize("build.42").await, "build.42");
    }

    #[tokio::test]
    async fn test_lookup_timeout_falls_back() {
        let canonicalizer =
            Canonicalizer::new(Arc::new(HangingResolver), Duration::from_millis(10), 1);
        assert_eq!(canonicalizer.canonicalize("1.1.1.1").await, "1.1.1.1");
    }

    #[tokio::test]
    async fn test_roll_up_sums_per_key() {
        let canonicalizer = with_names(&[("151.101.1.69", "www.example.com")]);
        let mut raw = Tally::new();
        raw.add("a.example.com", 2);
        raw.add("203.0.113.7", 5);
        raw.add("151.101.1.69", 3);
        raw.add("b.example.com", 1);

        let rolled = canonicalizer.roll_up(&raw).await;

        assert_eq!(rolled.get("*.example.com"), Some(6));
        assert_eq!(rolled.get("203.0.113.7"), Some(5));
        assert_eq!(rolled.len(), 2);
        assert_eq!(rolled.total(), raw.total());
    }

    #[tokio::test]
    async fn test_roll_up_empty() {
        let rolled = offline().roll_up(&Tally::new()).await;
        assert!(rolled.is_empty());
    }
}
