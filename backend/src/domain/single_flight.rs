//! At-most-once deduplication of concurrent catalog builds.
//!
//! Builds are keyed by the canonical fingerprint string. The first caller
//! spawns the build on a detached task; every concurrent caller for the same
//! key awaits one shared future and receives the same result or the same
//! error. Because the build runs detached, waiter cancellation never cancels
//! it, so the result can still populate the caches. Entries are removed when
//! the build completes, so the table only ever holds in-flight work.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use crate::domain::Error;

type FlightFuture<T> = Shared<BoxFuture<'static, Result<T, Error>>>;

struct Flight<T: Clone> {
    token: u64,
    future: FlightFuture<T>,
}

/// Keyed single-flight table.
pub struct SingleFlight<T: Clone> {
    inflight: Arc<Mutex<HashMap<String, Flight<T>>>>,
    next_token: AtomicU64,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of builds currently in flight.
    pub fn in_flight(&self) -> usize {
        lock_unpoisoned(&self.inflight).len()
    }

    /// Run `build` for `key`, joining an in-flight build when one exists.
    ///
    /// The build future is spawned onto the runtime and owns its own
    /// lifetime; dropping the returned future (waiter cancellation) leaves
    /// the build running for other waiters and for cache population.
    pub async fn run<F>(&self, key: &str, build: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let flight = {
            let mut inflight = lock_unpoisoned(&self.inflight);
            if let Some(existing) = inflight.get(key) {
                existing.future.clone()
            } else {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                let table = Arc::clone(&self.inflight);
                let owned_key = key.to_owned();
                let handle = tokio::spawn(async move {
                    let result = build.await;
                    // Drop the entry as soon as the build completes so the
                    // table never retains finished results. Waiters keep
                    // their own handle on the shared future.
                    let mut table = lock_unpoisoned(&table);
                    if table.get(&owned_key).is_some_and(|f| f.token == token) {
                        table.remove(&owned_key);
                    }
                    result
                });
                let future: FlightFuture<T> = async move {
                    handle.await.unwrap_or_else(|join_err| {
                        Err(Error::internal(format!("catalog build task failed: {join_err}")))
                    })
                }
                .boxed()
                .shared();
                inflight.insert(key.to_owned(), Flight {
                    token,
                    future: future.clone(),
                });
                future
            }
        };
        flight.await
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    //! Single-flight coalescing, error sharing, and detachment behaviour.
    use super::SingleFlight;
    use crate::domain::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_build() {
        let flights = Arc::new(SingleFlight::<u64>::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut waiters = Vec::new();
        for _ in 0..32 {
            let flights = Arc::clone(&flights);
            let builds = Arc::clone(&builds);
            waiters.push(tokio::spawn(async move {
                flights
                    .run("catalog:en:*", async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(7)
                    })
                    .await
            }));
        }

        for waiter in waiters {
            let value = waiter.await.expect("join").expect("build succeeds");
            assert_eq!(value, 7);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1, "resolver ran once");
        assert_eq!(flights.in_flight(), 0, "entry removed after completion");
    }

    #[tokio::test]
    async fn all_waiters_receive_the_same_error() {
        let flights = Arc::new(SingleFlight::<u64>::new());

        let mut waiters = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            waiters.push(tokio::spawn(async move {
                flights
                    .run("catalog:de:*", async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err(Error::store("connection refused"))
                    })
                    .await
            }));
        }

        for waiter in waiters {
            let err = waiter.await.expect("join").expect_err("build fails");
            assert_eq!(err, Error::store("connection refused"));
        }
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_build_independently() {
        let flights = SingleFlight::<&'static str>::new();
        let en = flights.run("catalog:en:*", async { Ok("en") });
        let de = flights.run("catalog:de:*", async { Ok("de") });
        let (en, de) = tokio::join!(en, de);
        assert_eq!(en.expect("en builds"), "en");
        assert_eq!(de.expect("de builds"), "de");
    }

    #[tokio::test]
    async fn sequential_runs_build_again() {
        let flights = SingleFlight::<u64>::new();
        let builds = Arc::new(AtomicUsize::new(0));

        for expected in 1u64..=3 {
            let builds = Arc::clone(&builds);
            let value = flights
                .run("catalog:fr:*", async move {
                    Ok(builds.fetch_add(1, Ordering::SeqCst) as u64 + 1)
                })
                .await
                .expect("build succeeds");
            assert_eq!(value, expected);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_cancel_the_build() {
        let flights = Arc::new(SingleFlight::<u64>::new());
        let completed = Arc::new(AtomicUsize::new(0));

        let build_completed = Arc::clone(&completed);
        let waiter = flights.run("catalog:es:*", async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            build_completed.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        });

        // Poll once so the build is spawned, then drop the waiter.
        let cancelled = tokio::time::timeout(Duration::from_millis(5), waiter).await;
        assert!(cancelled.is_err(), "waiter should time out");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(
            completed.load(Ordering::SeqCst),
            1,
            "detached build ran to completion"
        );
        assert_eq!(flights.in_flight(), 0);
    }
}
