//!
//! Entry point for the host runtime: look up verified textures by identity.
//!

use std::{path::Path, sync::Arc, time::Duration};

use crate::{
    config::{ConfigToml, VerifierKind},
    error::{BuildError, SnapshotError},
    persist,
    provider::{MojangProvider, TextureProvider},
    verify::{Ed25519Verifier, TextureVerifier, YggdrasilVerifier},
    Identity, ProfileRecord, ProfileStore, RecordSource, RefreshCoordinator, RefreshError,
    RetrySettings,
};

/// Default time a record is served from the store before it is refreshed.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Settings for creating a [Registry].
#[derive(Clone)]
pub struct RegistryBuilder {
    store: Option<Arc<ProfileStore>>,
    provider: Option<Arc<dyn TextureProvider>>,
    verifier: Option<Arc<dyn TextureVerifier>>,
    retry_settings: RetrySettings,
    default_ttl: Duration,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("retry_settings", &self.retry_settings)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            store: None,
            provider: None,
            verifier: None,
            retry_settings: RetrySettings::default(),
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl RegistryBuilder {
    /// Share an existing store instead of creating a fresh one.
    pub fn store(&mut self, store: Arc<ProfileStore>) -> &mut Self {
        self.store = Some(store);
        self
    }

    /// Set the upstream provider. Defaults to [MojangProvider].
    pub fn provider(&mut self, provider: Arc<dyn TextureProvider>) -> &mut Self {
        self.provider = Some(provider);
        self
    }

    /// Set the verifier holding the issuer key. Required.
    pub fn verifier(&mut self, verifier: Arc<dyn TextureVerifier>) -> &mut Self {
        self.verifier = Some(verifier);
        self
    }

    /// Set settings in relation to retries.
    pub fn retry_settings(&mut self, settings: RetrySettings) -> &mut Self {
        self.retry_settings = settings;
        self
    }

    /// TTL used by [Registry::lookup_default].
    pub fn default_ttl(&mut self, ttl: Duration) -> &mut Self {
        self.default_ttl = ttl;
        self
    }

    pub fn build(&self) -> Result<Registry, BuildError> {
        let verifier = self.verifier.clone().ok_or(BuildError::MissingVerifier)?;
        let provider: Arc<dyn TextureProvider> = match &self.provider {
            Some(provider) => Arc::clone(provider),
            None => Arc::new(MojangProvider::new()?),
        };
        let store = self.store.clone().unwrap_or_default();
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&store),
            provider,
            verifier,
            self.retry_settings.clone(),
        );
        Ok(Registry {
            store,
            coordinator,
            default_ttl: self.default_ttl,
        })
    }
}

/// Profile texture registry.
///
/// Serves records from its [ProfileStore] while they are fresh and refreshes
/// them through a [RefreshCoordinator] otherwise. Cloning is cheap and clones
/// share the same store.
#[derive(Debug, Clone)]
pub struct Registry {
    store: Arc<ProfileStore>,
    coordinator: RefreshCoordinator,
    default_ttl: Duration,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builds a registry talking to the configured Mojang endpoints.
    pub fn from_config(config: &ConfigToml) -> Result<Self, BuildError> {
        let verifier: Arc<dyn TextureVerifier> = match config.verifier.kind {
            VerifierKind::Yggdrasil => {
                let pem = config
                    .verifier
                    .public_key
                    .as_deref()
                    .ok_or(BuildError::MissingPublicKey("yggdrasil"))?;
                Arc::new(YggdrasilVerifier::from_pem(pem)?)
            }
            VerifierKind::Ed25519 => {
                let key = config
                    .verifier
                    .public_key
                    .as_deref()
                    .ok_or(BuildError::MissingPublicKey("ed25519"))?;
                Arc::new(Ed25519Verifier::from_hex(key)?)
            }
        };
        let provider = MojangProvider::with_endpoints(
            config.upstream.session_server.clone(),
            config.upstream.profile_api.clone(),
            Duration::from_millis(config.upstream.request_timeout_ms.get()),
        )?;

        Self::builder()
            .provider(Arc::new(provider))
            .verifier(verifier)
            .retry_settings(config.retry.to_settings())
            .default_ttl(Duration::from_secs(config.registry.ttl_s))
            .build()
    }

    /// Returns the cached record if it is not older than `ttl`, refreshes it otherwise.
    ///
    /// Refresh failures are returned as is. The stale record, if any, stays
    /// available through [Registry::cached].
    pub async fn lookup(
        &self,
        identity: &Identity,
        ttl: Duration,
    ) -> Result<ProfileRecord, RefreshError> {
        if let Some(record) = self.store.get(identity) {
            if !ProfileStore::is_stale(&record, ttl) {
                return Ok(record);
            }
            tracing::debug!("{identity} Cached textures are stale, refreshing.");
        }
        self.coordinator.refresh_stale(identity, ttl).await
    }

    /// [Registry::lookup] with the configured default TTL.
    pub async fn lookup_default(&self, identity: &Identity) -> Result<ProfileRecord, RefreshError> {
        self.lookup(identity, self.default_ttl).await
    }

    /// Whatever the store holds for `identity`, fresh or not.
    pub fn cached(&self, identity: &Identity) -> Option<ProfileRecord> {
        self.store.get(identity)
    }

    pub fn invalidate(&self, identity: &Identity) -> Option<ProfileRecord> {
        self.store.invalidate(identity)
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Persist every record in the store. Returns how many were written.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<usize, SnapshotError> {
        let records = self.store.records();
        let count = records.len();
        persist::write_snapshot(path.as_ref(), records)?;
        tracing::debug!("Saved {count} profile records to {}", path.as_ref().display());
        Ok(count)
    }

    /// Load a snapshot into the store, verifying every payload again.
    ///
    /// Records that fail verification are dropped. A record already in the
    /// store is only replaced by a newer one. Returns how many were restored.
    pub fn restore_snapshot(&self, path: impl AsRef<Path>) -> Result<usize, SnapshotError> {
        let persisted = persist::read_snapshot(path.as_ref())?;
        let total = persisted.len();
        let mut restored = 0;
        for entry in persisted {
            if !self.coordinator.verifier().verify(&entry.payload) {
                tracing::warn!(
                    "{} Snapshot textures failed signature verification, skipping.",
                    entry.identity
                );
                continue;
            }
            let record = ProfileRecord::new_verified(
                entry.identity,
                entry.payload,
                entry.fetched_at,
                RecordSource::Snapshot,
            );
            if self.store.put_if_newer(record) {
                restored += 1;
            }
        }
        tracing::info!(
            "Restored {restored}/{total} profile records from {}",
            path.as_ref().display()
        );
        Ok(restored)
    }
}
