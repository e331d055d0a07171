#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
mod coordinator;
mod error;
mod identity;
pub mod logging;
mod persist;
pub mod provider;
mod record;
mod registry;
mod retry;
mod store;
pub mod texture;
mod time;
pub mod verify;

pub use config::{ConfigReadError, ConfigToml};
pub use coordinator::RefreshCoordinator;
pub use error::{BuildError, RefreshError, SnapshotError};
pub use identity::Identity;
pub use provider::{FetchError, MojangProvider, TextureProvider};
pub use record::{ProfileRecord, RecordSource};
pub use registry::{Registry, RegistryBuilder, DEFAULT_TTL};
pub use retry::RetrySettings;
pub use store::ProfileStore;
pub use texture::{PayloadError, TexturePayload, TextureProperty};
pub use time::Timestamp;
pub use verify::{Ed25519Verifier, KeyError, TextureVerifier, YggdrasilVerifier};
