//! Reverse DNS lookups.

use futures::future::BoxFuture;
use std::net::IpAddr;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Source of PTR names for IP addresses.
///
/// `None` means the lookup failed; callers fall back to the literal address.
pub trait ReverseResolver: Send + Sync {
    fn reverse(&self, ip: IpAddr) -> BoxFuture<'_, Option<String>>;
}

/// Resolver backed by the system DNS configuration.
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            debug!("System resolver config unavailable ({}), using defaults", e);
            TokioAsyncResolver::tokio(ResolverConfig::google(), ResolverOpts::default())
        });

        Self { resolver }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseResolver for SystemResolver {
    fn reverse(&self, ip: IpAddr) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move {
            match self.resolver.reverse_lookup(ip).await {
                Ok(lookup) => {
                    let name = lookup
                        .iter()
                        .next()
                        .map(|name| name.to_string().trim_end_matches('.').to_string());
                    debug!("Reverse lookup {} -> {:?}", ip, name);
                    name
                }
                Err(e) => {
                    debug!("Reverse lookup failed for {}: {}", ip, e);
                    None
                }
            }
        })
    }
}

/// Resolver that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl ReverseResolver for NoopResolver {
    fn reverse(&self, _ip: IpAddr) -> BoxFuture<'_, Option<String>> {
        Box::pin(async { None })
    }
}
