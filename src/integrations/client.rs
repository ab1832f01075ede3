//! Shared plumbing every provider client in C4 is built on: timeout,
//! caching, quota accounting, fail-soft error collapsing, and usage
//! telemetry, built around a single `reqwest::Client` + retry pattern
//! generalized into one reusable `Invoker<K, V>` instead of one bespoke
//! client per data source.

use crate::cache::TtlCache;
use crate::models::ProviderStatus;
use crate::telemetry;
use crate::time_authority;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Daily/monthly call quota, keyed by ET calendar date so rollover lines up
/// with the day boundary every other component uses.
pub struct QuotaTracker {
    daily: DashMap<NaiveDate, u32>,
    monthly: DashMap<(i32, u32), u32>,
    daily_limit: Option<u32>,
    monthly_limit: Option<u32>,
}

impl QuotaTracker {
    pub fn new(daily_limit: Option<u32>, monthly_limit: Option<u32>) -> Self {
        Self {
            daily: DashMap::new(),
            monthly: DashMap::new(),
            daily_limit,
            monthly_limit,
        }
    }

    /// True if a call is currently allowed under both ceilings. Does not
    /// increment — callers must follow with `record_call` only after the
    /// call is actually issued.
    pub fn allows(&self, today: NaiveDate) -> bool {
        if let Some(limit) = self.daily_limit {
            if self.daily.get(&today).map(|v| *v).unwrap_or(0) >= limit {
                return false;
            }
        }
        if let Some(limit) = self.monthly_limit {
            let key = (today.year(), today.month0());
            if self.monthly.get(&key).map(|v| *v).unwrap_or(0) >= limit {
                return false;
            }
        }
        true
    }

    pub fn record_call(&self, today: NaiveDate) {
        *self.daily.entry(today).or_insert(0) += 1;
        let key = (today.year(), today.month0());
        *self.monthly.entry(key).or_insert(0) += 1;
    }
}

use chrono::Datelike;

pub struct ProviderConfig {
    pub name: &'static str,
    pub timeout: Duration,
    pub ttl: Duration,
    pub daily_quota: Option<u32>,
    pub monthly_quota: Option<u32>,
    pub shadow: bool,
}

/// Outcome of an `Invoker::call`, including enough detail to build a
/// `Provenance` record at the signal-computer layer.
pub struct InvokeOutcome<V> {
    pub value: V,
    pub status: ProviderStatus,
    pub cache_hit: bool,
}

pub struct Invoker<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Default,
{
    pub config: ProviderConfig,
    cache: TtlCache<K, V>,
    quota: QuotaTracker,
}

impl<K, V> Invoker<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Default,
{
    pub fn new(config: ProviderConfig) -> Self {
        let quota = QuotaTracker::new(config.daily_quota, config.monthly_quota);
        Self {
            config,
            cache: TtlCache::new(),
            quota,
        }
    }

    /// Run `fetch` under the full client contract: cache-first, quota-gated,
    /// timeout-bounded, fail-soft on any error. `fetch` is only invoked on a
    /// cache miss when quota allows it.
    pub async fn call<F, Fut>(&self, key: K, fetch: F) -> InvokeOutcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<V>>,
    {
        let started = Instant::now();

        if let Some(cached) = self.cache.get(&key) {
            telemetry::record(self.config.name, ProviderStatus::Success, true, 0.0);
            return InvokeOutcome {
                value: cached,
                status: ProviderStatus::Success,
                cache_hit: true,
            };
        }

        let today = time_authority::today_et();
        if !self.quota.allows(today) {
            telemetry::record(self.config.name, ProviderStatus::SkippedQuota, false, 0.0);
            return InvokeOutcome {
                value: V::default(),
                status: ProviderStatus::SkippedQuota,
                cache_hit: false,
            };
        }

        if self.config.shadow {
            // Shadow mode still executes and logs but must not affect scoring;
            // the signal computer calling us is responsible for zeroing its
            // contribution when `shadow` is set. We still run the fetch so the
            // shadow signal can be validated against historical picks.
        }

        let result = tokio::time::timeout(self.config.timeout, fetch()).await;
        self.quota.record_call(today);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(Ok(value)) => {
                self.cache.put(key, value.clone(), self.config.ttl);
                telemetry::record(self.config.name, ProviderStatus::Success, false, latency_ms);
                InvokeOutcome {
                    value,
                    status: ProviderStatus::Success,
                    cache_hit: false,
                }
            }
            Ok(Err(_)) => {
                telemetry::record(self.config.name, ProviderStatus::Error, false, latency_ms);
                InvokeOutcome {
                    value: V::default(),
                    status: ProviderStatus::Error,
                    cache_hit: false,
                }
            }
            Err(_) => {
                telemetry::record(self.config.name, ProviderStatus::Timeout, false, latency_ms);
                InvokeOutcome {
                    value: V::default(),
                    status: ProviderStatus::Timeout,
                    cache_hit: false,
                }
            }
        }
    }
}

pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quota_exhaustion_skips_without_calling() {
        let invoker: Invoker<String, f64> = Invoker::new(ProviderConfig {
            name: "test",
            timeout: Duration::from_secs(1),
            ttl: Duration::from_secs(60),
            daily_quota: Some(1),
            monthly_quota: None,
            shadow: false,
        });

        let calls = std::sync::atomic::AtomicU32::new(0);
        let out1 = invoker
            .call("k".to_string(), || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(1.0)
            })
            .await;
        assert_eq!(out1.status, ProviderStatus::Success);

        // second distinct key still within same day exhausts the daily=1 quota
        let out2 = invoker
            .call("k2".to_string(), || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(2.0)
            })
            .await;
        assert_eq!(out2.status, ProviderStatus::SkippedQuota);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_fetch() {
        let invoker: Invoker<String, f64> = Invoker::new(ProviderConfig {
            name: "test",
            timeout: Duration::from_secs(1),
            ttl: Duration::from_secs(60),
            daily_quota: None,
            monthly_quota: None,
            shadow: false,
        });
        let _ = invoker.call("k".to_string(), || async { Ok(1.0) }).await;
        let calls = std::sync::atomic::AtomicU32::new(0);
        let out = invoker
            .call("k".to_string(), || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(2.0)
            })
            .await;
        assert!(out.cache_hit);
        assert_eq!(out.value, 1.0);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timeout_is_fail_soft() {
        let invoker: Invoker<String, f64> = Invoker::new(ProviderConfig {
            name: "test",
            timeout: Duration::from_millis(5),
            ttl: Duration::from_secs(60),
            daily_quota: None,
            monthly_quota: None,
            shadow: false,
        });
        let out = invoker
            .call("k".to_string(), || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1.0)
            })
            .await;
        assert_eq!(out.status, ProviderStatus::Timeout);
        assert_eq!(out.value, 0.0);
    }
}
