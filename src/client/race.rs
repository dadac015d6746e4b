//! Cache-then-network reads.
//!
//! # Flow
//! ```text
//! fetch ──┬─► network task ─► normalize ─► cache.store ─► listeners(event) ─► settle?
//!         └─► cache task   ─► lookup ──────────────────────────────────────► settle? (only before network)
//!                                   │
//!                         first settle wins ─► caller
//! ```
//!
//! The network branch always runs to completion and refreshes the cache,
//! even when the cached answer has already been returned. Listeners run
//! after the refresh is stored.
//!
//! Only GET responses are read from or written to the cache; other methods
//! race against nothing and settle from the network.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::cache::{CachedResponse, ResponseCache};
use crate::client::api::Inner;
use crate::client::types::{FetchError, Outcome};
use crate::http::{Method, RequestSpec};
use crate::observability::metrics;

/// Shared between the two branches. One lock covers the flags and the
/// settle handle so checking and settling is atomic.
struct RaceState {
    network_received: bool,
    cache_received: bool,
    settle: Option<oneshot::Sender<Outcome>>,
}

pub(crate) async fn cache_then_network(
    inner: Arc<Inner>,
    cache: Arc<dyn ResponseCache>,
    request: RequestSpec,
    event: Option<String>,
) -> Outcome {
    let (tx, rx) = oneshot::channel();
    let state = Arc::new(Mutex::new(RaceState {
        network_received: false,
        cache_received: false,
        settle: Some(tx),
    }));
    let key = request.url.clone();
    let request_id = request.request_id;
    let cacheable = request.method == Method::Get;

    tokio::spawn({
        let state = state.clone();
        let cache = cache.clone();
        let key = key.clone();
        async move {
            let outcome = inner.send(request).await;

            let (settle, cache_answered) = {
                let mut race = state.lock();
                race.network_received = true;
                (race.settle.take(), race.cache_received)
            };

            if let (true, Ok(result)) = (cacheable, &outcome) {
                if let Err(e) = cache.store(&key, CachedResponse::from_result(result)).await {
                    tracing::debug!(%request_id, error = %e, "Failed to refresh cache entry");
                }
            }

            if let Some(event) = &event {
                inner.events.emit(event, &outcome);
            }

            match settle {
                Some(tx) => {
                    metrics::record_race_settled("network");
                    let _ = tx.send(outcome);
                }
                None => tracing::debug!(%request_id, cache_answered, "Network refresh after cached answer"),
            }
        }
    });

    tokio::spawn(async move {
        if !cacheable {
            return;
        }
        let entry = match cache.lookup(&key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!(%request_id, key = %key, "Cache miss");
                return;
            }
            Err(e) => {
                tracing::debug!(%request_id, error = %e, "Cache lookup failed");
                return;
            }
        };
        let result = match entry.to_result() {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(%request_id, error = %e, "Ignoring unreadable cache entry");
                return;
            }
        };

        let settle = {
            let mut race = state.lock();
            if race.network_received {
                None
            } else {
                race.cache_received = true;
                race.settle.take()
            }
        };

        match settle {
            Some(tx) => {
                metrics::record_race_settled("cache");
                let outcome = if result.is_success() {
                    Ok(result)
                } else {
                    Err(FetchError::rejection(result))
                };
                let _ = tx.send(outcome);
            }
            None => tracing::debug!(%request_id, "Cached answer arrived after network, suppressed"),
        }
    });

    // Both tasks own the only references to the sender; if neither settles
    // it is dropped with them.
    rx.await.unwrap_or(Err(FetchError::Abandoned))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use futures_util::future::{BoxFuture, FutureExt};
    use serde_json::json;

    use crate::cache::{CacheError, MemoryCache};
    use crate::client::ApiClient;
    use crate::config::ClientConfig;
    use crate::http::{Method, ResponseResult, TransportError, TransportResponse};

    use super::*;

    const URL: &str = "https://api.example.com/users";

    fn config() -> ClientConfig {
        ClientConfig {
            base_url: "https://api.example.com".to_string(),
            cache_then_network: true,
            ..Default::default()
        }
    }

    /// Network answering `body` with 200 after `delay`.
    fn slow_network(
        delay: Duration,
        body: &'static str,
        calls: Arc<AtomicU32>,
    ) -> impl Fn(RequestSpec) -> BoxFuture<'static, Result<TransportResponse, TransportError>> + Send + Sync + 'static {
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(delay).await;
                Ok(TransportResponse::new(200, body))
            }
            .boxed()
        }
    }

    /// Cache whose lookups take `delay`.
    struct SlowCache {
        inner: MemoryCache,
        delay: Duration,
    }

    impl ResponseCache for SlowCache {
        fn lookup(&self, key: &str) -> BoxFuture<'static, Result<Option<CachedResponse>, CacheError>> {
            let hit = self.inner.get(key);
            let delay = self.delay;
            async move {
                tokio::time::sleep(delay).await;
                Ok(hit)
            }
            .boxed()
        }

        fn store(&self, key: &str, response: CachedResponse) -> BoxFuture<'static, Result<(), CacheError>> {
            self.inner.store(key, response)
        }
    }

    fn recorder(client: &ApiClient, event: &str) -> Arc<Mutex<Vec<Outcome>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        client.on(event, move |outcome: &Outcome| sink.lock().push(outcome.clone()));
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_answers_first_then_listener_gets_network() {
        let cache = MemoryCache::new(None);
        cache.insert(URL, CachedResponse::new(200, r#"{"source": "cache"}"#));

        let calls = Arc::new(AtomicU32::new(0));
        let client = ApiClient::builder(config())
            .transport(slow_network(Duration::from_millis(100), r#"{"source": "network"}"#, calls.clone()))
            .cache(cache.clone())
            .build()
            .unwrap();
        let seen = recorder(&client, "users");

        let result = client.fetch("users", Method::Get, None, Some("users")).await.unwrap();
        assert_eq!(result, ResponseResult::new(200, json!({"source": "cache"})));
        assert!(seen.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], Ok(ResponseResult::new(200, json!({"source": "network"}))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let refreshed = cache.get(URL).unwrap();
        assert_eq!(refreshed.json().unwrap(), json!({"source": "network"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_miss_resolves_from_network() {
        let cache = MemoryCache::new(None);
        let client = ApiClient::builder(config())
            .transport(slow_network(Duration::from_millis(50), r#"{"source": "network"}"#, Arc::default()))
            .cache(cache.clone())
            .build()
            .unwrap();
        let seen = recorder(&client, "users");

        let result = client.fetch("users", Method::Get, None, Some("users")).await.unwrap();
        assert_eq!(result.body, json!({"source": "network"}));
        assert_eq!(seen.lock().len(), 1);
        assert!(cache.get(URL).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_first_suppresses_cache() {
        let memory = MemoryCache::new(None);
        memory.insert(URL, CachedResponse::new(200, r#"{"source": "cache"}"#));
        let cache = SlowCache {
            inner: memory,
            delay: Duration::from_millis(100),
        };

        let client = ApiClient::builder(config())
            .transport(slow_network(Duration::from_millis(10), r#"{"source": "network"}"#, Arc::default()))
            .cache(cache)
            .build()
            .unwrap();

        let result = client.fetch("users", Method::Get, None, None).await.unwrap();
        assert_eq!(result.body, json!({"source": "network"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_error_status_rejects() {
        let cache = MemoryCache::new(None);
        cache.insert(URL, CachedResponse::new(404, r#"{"error": "gone"}"#));
        let client = ApiClient::builder(config())
            .transport(slow_network(Duration::from_millis(100), "{}", Arc::default()))
            .cache(cache)
            .build()
            .unwrap();

        let err = client.fetch("users", Method::Get, None, None).await.unwrap_err();
        assert!(matches!(err, FetchError::ClientError(ref r) if r.body == json!({"error": "gone"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_entry_is_a_miss() {
        let cache = MemoryCache::new(None);
        cache.insert(URL, CachedResponse::new(200, "{broken"));
        let client = ApiClient::builder(config())
            .transport(slow_network(Duration::from_millis(100), r#"{"fresh": 1}"#, Arc::default()))
            .cache(cache)
            .build()
            .unwrap();

        let result = client.fetch("users", Method::Get, None, None).await.unwrap();
        assert_eq!(result.body, json!({"fresh": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_reaches_listener_and_keeps_cache() {
        let cache = MemoryCache::new(None);
        cache.insert(URL, CachedResponse::new(200, r#"{"source": "cache"}"#));
        let transport = |_: RequestSpec| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, TransportError>(TransportResponse::new(503, "Service Unavailable"))
        };
        let client = ApiClient::builder(config())
            .transport(transport)
            .cache(cache.clone())
            .build()
            .unwrap();
        let seen = recorder(&client, "users");

        assert!(client.fetch("users", Method::Get, None, Some("users")).await.is_ok());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let seen = seen.lock();
        assert!(matches!(&seen[0], Err(FetchError::DownstreamFailure(r)) if r.body == json!("Service Unavailable")));
        assert_eq!(cache.get(URL).unwrap().json().unwrap(), json!({"source": "cache"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_responses_never_answer_reads() {
        let cache = MemoryCache::new(None);
        let transport = |request: RequestSpec| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let body = match request.method {
                Method::Get => r#"[{"id": 1}, {"id": 5}]"#,
                _ => r#"{"id": 5}"#,
            };
            Ok::<_, TransportError>(TransportResponse::new(200, body))
        };
        let client = ApiClient::builder(config())
            .transport(transport)
            .cache(cache.clone())
            .build()
            .unwrap();

        let created = client.fetch("users", Method::Post, None, None).await.unwrap();
        assert_eq!(created.body, json!({"id": 5}));
        assert!(cache.get(URL).is_none());

        let listed = client.fetch("users", Method::Get, None, None).await.unwrap();
        assert_eq!(listed.body, json!([{"id": 1}, {"id": 5}]));
        assert_eq!(cache.get(URL).unwrap().json().unwrap(), json!([{"id": 1}, {"id": 5}]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_skip_cached_entry() {
        let cache = MemoryCache::new(None);
        cache.insert(URL, CachedResponse::new(200, r#"{"source": "cache"}"#));
        let client = ApiClient::builder(config())
            .transport(slow_network(Duration::from_millis(100), r#"{"source": "network"}"#, Arc::default()))
            .cache(cache.clone())
            .build()
            .unwrap();
        let seen = recorder(&client, "users");

        let result = client.fetch("users", Method::Put, None, Some("users")).await.unwrap();
        assert_eq!(result.body, json!({"source": "network"}));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(cache.get(URL).unwrap().json().unwrap(), json!({"source": "cache"}));
    }

    #[tokio::test]
    async fn test_without_cache_goes_straight_to_network() {
        let client = ApiClient::new(config(), slow_network(Duration::ZERO, "[]", Arc::default())).unwrap();
        let seen = recorder(&client, "users");

        let result = client.fetch("users", Method::Get, None, Some("users")).await.unwrap();
        assert_eq!(result.body, json!([]));
        assert!(seen.lock().is_empty());
    }
}
