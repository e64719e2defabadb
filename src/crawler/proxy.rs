//! Proxy endpoint providers
//!
//! A provider turns the run's proxy configuration into endpoint URLs. The
//! coordinator asks once per worker when the crawl starts, so a single
//! configured proxy is shared by the whole run and several proxies are spread
//! across workers.

use crate::config::ProxyConfig;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Yields a proxy endpoint URL, or none for direct connections
pub trait ProxyProvider: Send + Sync {
    fn new_url(&self) -> Option<String>;
}

/// Direct connections only
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProxy;

impl ProxyProvider for NoProxy {
    fn new_url(&self) -> Option<String> {
        None
    }
}

/// Round-robin over a fixed list of proxy URLs
#[derive(Debug, Default)]
pub struct RotatingProxies {
    urls: Vec<String>,
    next: AtomicUsize,
}

impl RotatingProxies {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            next: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.urls.clone())
    }
}

impl ProxyProvider for RotatingProxies {
    fn new_url(&self) -> Option<String> {
        if self.urls.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.urls.len();
        Some(self.urls[index].clone())
    }
}
