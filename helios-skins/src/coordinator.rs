//!
//! Fetches textures from the upstream provider when a record is missing or
//! stale, verifies them and writes them to the store.
//!
//! Concurrent refreshes of the same identity share one upstream fetch. The
//! fetch runs on its own task, so a caller that gives up waiting never cancels
//! it for the others. The in-flight entry is removed once the fetch settles,
//! before waiters are woken up.
//!

use std::{sync::Arc, time::Duration};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::watch;

use crate::{
    provider::{FetchError, TextureProvider},
    time::Timestamp,
    verify::TextureVerifier,
    Identity, ProfileRecord, ProfileStore, RecordSource, RefreshError, RetrySettings,
    TexturePayload,
};

type Outcome = Result<ProfileRecord, RefreshError>;

/// Deduplicating refresh of profile records.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ProfileStore>,
    provider: Arc<dyn TextureProvider>,
    verifier: Arc<dyn TextureVerifier>,
    retry_settings: RetrySettings,
    in_flight: DashMap<Identity, watch::Receiver<Option<Outcome>>>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("retry_settings", &self.inner.retry_settings)
            .field("in_flight", &self.inner.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<ProfileStore>,
        provider: Arc<dyn TextureProvider>,
        verifier: Arc<dyn TextureVerifier>,
        retry_settings: RetrySettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                provider,
                verifier,
                retry_settings,
                in_flight: DashMap::new(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.inner.store
    }

    pub fn retry_settings(&self) -> &RetrySettings {
        &self.inner.retry_settings
    }

    pub(crate) fn verifier(&self) -> &dyn TextureVerifier {
        self.inner.verifier.as_ref()
    }

    /// Number of identities with a fetch currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Fetch, verify and store a fresh record for `identity`.
    ///
    /// Joins the running fetch if there is one. On success the record is
    /// already in the store when this returns.
    pub async fn refresh(&self, identity: &Identity) -> Result<ProfileRecord, RefreshError> {
        self.refresh_with_ttl(identity, None).await
    }

    /// Like [RefreshCoordinator::refresh], but skips the fetch if a record no
    /// older than `ttl` is in the store by the time no fetch is running.
    ///
    /// Covers a caller that saw a stale record just before another caller's
    /// fetch completed.
    pub async fn refresh_stale(
        &self,
        identity: &Identity,
        ttl: Duration,
    ) -> Result<ProfileRecord, RefreshError> {
        self.refresh_with_ttl(identity, Some(ttl)).await
    }

    async fn refresh_with_ttl(&self, identity: &Identity, ttl: Option<Duration>) -> Outcome {
        let mut receiver = match self.attach_or_start(identity, ttl) {
            Attached::Fresh(record) => return Ok(record),
            Attached::Waiting(receiver) => receiver,
        };
        let settled = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| {
            Err(RefreshError::UpstreamUnavailable {
                identity: identity.clone(),
                attempts: 0,
                reason: "refresh task ended without an outcome".to_string(),
            })
        })
    }

    fn attach_or_start(&self, identity: &Identity, ttl: Option<Duration>) -> Attached {
        let sender = match self.inner.in_flight.entry(identity.clone()) {
            Entry::Occupied(entry) => {
                tracing::trace!("{identity} Joining in-flight refresh.");
                return Attached::Waiting(entry.get().clone());
            }
            Entry::Vacant(entry) => {
                // A finished fetch writes the store before it leaves the in-flight map.
                let fresh = ttl.and_then(|ttl| {
                    self.inner
                        .store
                        .get(identity)
                        .filter(|record| !ProfileStore::is_stale(record, ttl))
                });
                if let Some(record) = fresh {
                    tracing::trace!("{identity} Refreshed by a concurrent lookup.");
                    return Attached::Fresh(record);
                }
                let (sender, receiver) = watch::channel(None);
                entry.insert(receiver);
                sender
            }
        };
        let receiver = sender.subscribe();

        let inner = Arc::clone(&self.inner);
        let identity = identity.clone();
        tokio::spawn(async move {
            let guard = InFlightGuard {
                in_flight: &inner.in_flight,
                identity: &identity,
            };
            let outcome = inner.fetch_and_verify(&identity).await;
            drop(guard);
            sender.send_replace(Some(outcome));
        });

        Attached::Waiting(receiver)
    }
}

enum Attached {
    Fresh(ProfileRecord),
    Waiting(watch::Receiver<Option<Outcome>>),
}

/// Removes the in-flight entry when the fetch settles, or if its task unwinds.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<Identity, watch::Receiver<Option<Outcome>>>,
    identity: &'a Identity,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(self.identity);
    }
}

impl Inner {
    async fn fetch_and_verify(&self, identity: &Identity) -> Outcome {
        let payload = self.fetch_with_retry(identity).await?;

        if !self.verifier.verify(&payload) {
            tracing::warn!("{identity} Textures failed signature verification, discarding.");
            return Err(RefreshError::VerificationFailed(identity.clone()));
        }

        let record = ProfileRecord::new_verified(
            identity.clone(),
            payload,
            Timestamp::now(),
            RecordSource::Upstream,
        );
        self.store.put(record.clone());
        tracing::info!("{identity} Textures refreshed.");
        Ok(record)
    }

    /// Calls the provider, retrying transient failures with an exponential backoff.
    async fn fetch_with_retry(&self, identity: &Identity) -> Result<TexturePayload, RefreshError> {
        let max_retries = self.retry_settings.max_retries;
        let mut retry_count = 0;
        loop {
            match self.provider.fetch_texture(identity).await {
                Ok(payload) => return Ok(payload),
                Err(FetchError::NotFound) => {
                    tracing::debug!("{identity} Not found upstream.");
                    return Err(RefreshError::IdentityNotFound(identity.clone()));
                }
                Err(FetchError::Transient(reason)) => {
                    tracing::debug!(
                        "{identity} {retry_count}/{max_retries} Failed to fetch textures: {reason}"
                    );
                    if retry_count >= max_retries {
                        return Err(RefreshError::UpstreamUnavailable {
                            identity: identity.clone(),
                            attempts: retry_count as usize + 1,
                            reason,
                        });
                    }
                }
            }

            let delay = self.retry_settings.retry_delay(retry_count);
            retry_count += 1;
            tracing::debug!(
                "{identity} {retry_count}/{max_retries} Sleep for {delay:?} before trying again."
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;

    use super::*;
    use crate::{
        provider::testing::ScriptedProvider,
        verify::testing::{signed_payload, signing_key, verifier},
    };

    fn coordinator(provider: Arc<ScriptedProvider>) -> RefreshCoordinator {
        RefreshCoordinator::new(
            Arc::new(ProfileStore::new()),
            provider,
            Arc::new(verifier()),
            RetrySettings::new(),
        )
    }

    fn transient() -> Result<TexturePayload, FetchError> {
        Err(FetchError::Transient("connection reset".to_string()))
    }

    #[tokio::test]
    async fn refresh_stores_verified_record() {
        let payload = signed_payload(&signing_key(), "tex1");
        let provider = Arc::new(ScriptedProvider::always(Ok(payload.clone())));
        let coordinator = coordinator(provider.clone());
        let identity = Identity::from("A");

        let record = coordinator.refresh(&identity).await.unwrap();

        assert!(record.verified());
        assert_eq!(record.payload(), &payload);
        assert_eq!(record.source(), RecordSource::Upstream);
        assert_eq!(coordinator.store().get(&identity), Some(record));
        assert_eq!(coordinator.in_flight(), 0);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let payload = signed_payload(&signing_key(), "tex2");
        let provider = Arc::new(ScriptedProvider::scripted(
            vec![transient(), transient(), transient()],
            Ok(payload.clone()),
        ));
        let coordinator = coordinator(provider.clone());

        let started = tokio::time::Instant::now();
        let record = coordinator.refresh(&Identity::from("A")).await.unwrap();

        assert_eq!(record.payload(), &payload);
        assert_eq!(provider.calls(), 4);
        // 200ms + 400ms + 800ms
        assert!(started.elapsed() >= Duration::from_millis(1_400));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhaust_into_upstream_unavailable() {
        let provider = Arc::new(ScriptedProvider::always(transient()));
        let coordinator = coordinator(provider.clone());

        let err = coordinator.refresh(&Identity::from("A")).await.unwrap_err();

        assert_eq!(
            err,
            RefreshError::UpstreamUnavailable {
                identity: Identity::from("A"),
                attempts: 4,
                reason: "connection reset".to_string(),
            }
        );
        assert_eq!(provider.calls(), 4);
        assert!(coordinator.store().is_empty());
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let provider = Arc::new(ScriptedProvider::always(Err(FetchError::NotFound)));
        let coordinator = coordinator(provider.clone());

        let err = coordinator.refresh(&Identity::from("A")).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn tampered_payload_is_never_stored() {
        let good = signed_payload(&signing_key(), "tex1");
        let tampered = TexturePayload::new(signed_payload(&signing_key(), "tex2").texture(), good.signature());
        let provider = Arc::new(ScriptedProvider::always(Ok(tampered)));
        let coordinator = coordinator(provider);

        let err = coordinator.refresh(&Identity::from("A")).await.unwrap_err();

        assert!(err.is_verification_failed());
        assert!(coordinator.store().get(&Identity::from("A")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_fetch() {
        let payload = signed_payload(&signing_key(), "tex1");
        let provider = Arc::new(
            ScriptedProvider::always(Ok(payload.clone())).with_delay(Duration::from_millis(50)),
        );
        let coordinator = coordinator(provider.clone());
        let identity = Identity::from("A");

        let results = join_all((0..16).map(|_| coordinator.refresh(&identity))).await;

        assert_eq!(provider.calls(), 1);
        for result in results {
            assert_eq!(result.unwrap().payload(), &payload);
        }
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_identities_fetch_independently() {
        let provider = Arc::new(
            ScriptedProvider::always(Ok(signed_payload(&signing_key(), "tex1")))
                .with_delay(Duration::from_millis(50)),
        );
        let coordinator = coordinator(provider.clone());
        let a = Identity::from("A");
        let b = Identity::from("B");

        let (ra, rb) = tokio::join!(coordinator.refresh(&a), coordinator.refresh(&b));

        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_waiter_does_not_cancel_fetch() {
        let payload = signed_payload(&signing_key(), "tex1");
        let provider = Arc::new(
            ScriptedProvider::always(Ok(payload.clone())).with_delay(Duration::from_millis(100)),
        );
        let coordinator = coordinator(provider.clone());
        let identity = Identity::from("A");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), coordinator.refresh(&identity)).await;
        assert!(abandoned.is_err());
        assert_eq!(coordinator.in_flight(), 1);

        let record = coordinator.refresh(&identity).await.unwrap();
        assert_eq!(record.payload(), &payload);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_completes_even_when_every_waiter_leaves() {
        let provider = Arc::new(
            ScriptedProvider::always(Ok(signed_payload(&signing_key(), "tex1")))
                .with_delay(Duration::from_millis(100)),
        );
        let coordinator = coordinator(provider.clone());
        let identity = Identity::from("A");

        let _ = tokio::time::timeout(Duration::from_millis(10), coordinator.refresh(&identity)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(coordinator.store().get(&identity).is_some());
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn failure_is_not_terminal_for_the_identity() {
        let payload = signed_payload(&signing_key(), "tex1");
        let provider = Arc::new(ScriptedProvider::scripted(
            vec![Err(FetchError::NotFound)],
            Ok(payload.clone()),
        ));
        let coordinator = coordinator(provider.clone());
        let identity = Identity::from("A");

        assert!(coordinator.refresh(&identity).await.unwrap_err().is_not_found());
        assert_eq!(coordinator.in_flight(), 0);

        let record = coordinator.refresh(&identity).await.unwrap();
        assert_eq!(record.payload(), &payload);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn refresh_stale_returns_record_written_meanwhile() {
        let provider = Arc::new(ScriptedProvider::always(Ok(signed_payload(
            &signing_key(),
            "tex2",
        ))));
        let coordinator = coordinator(provider.clone());
        let identity = Identity::from("A");
        let current = ProfileRecord::new_verified(
            identity.clone(),
            signed_payload(&signing_key(), "tex1"),
            Timestamp::now(),
            RecordSource::Upstream,
        );
        coordinator.store().put(current.clone());

        let record = coordinator
            .refresh_stale(&identity, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(record, current);
        assert_eq!(provider.calls(), 0);

        // An expired record and a plain refresh both go upstream.
        coordinator.store().put(ProfileRecord::new_verified(
            identity.clone(),
            signed_payload(&signing_key(), "tex1"),
            Timestamp::from_micros(0),
            RecordSource::Upstream,
        ));
        coordinator
            .refresh_stale(&identity, Duration::from_secs(60))
            .await
            .unwrap();
        coordinator.refresh(&identity).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waiters_wake_after_in_flight_entry_is_removed() {
        let provider = Arc::new(
            ScriptedProvider::always(Ok(signed_payload(&signing_key(), "tex1")))
                .with_delay(Duration::from_millis(200)),
        );
        let coordinator = coordinator(provider.clone());
        let identity = Identity::from("A");

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                let identity = identity.clone();
                tokio::spawn(async move {
                    let outcome = coordinator.refresh(&identity).await;
                    (outcome, coordinator.in_flight())
                })
            })
            .collect();

        for waiter in join_all(waiters).await {
            let (outcome, in_flight) = waiter.unwrap();
            assert!(outcome.is_ok());
            assert_eq!(in_flight, 0);
        }
        assert_eq!(provider.calls(), 1);
    }
}
